//! Expression validation: field references and builtin calls.

use crate::ast::{Expr, FieldDecl, Term};
use crate::error::Diagnostic;

/// Builtins usable as bare terms, without parentheses.
const BARE_BUILTINS: &[&str] = &["current_user"];

/// Where an expression came from, for diagnostic messages.
#[derive(Clone, Copy)]
pub(super) struct ExprScope<'a> {
    pub file: &'a str,
    /// e.g. "invariant on entity 'Task'" or "filter of block 'backlog'"
    pub what: &'a str,
}

pub(super) fn check_expr(
    expr: &Expr,
    fields: &[FieldDecl],
    scope: ExprScope<'_>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match expr {
        Expr::Compare { left, right, line, .. } => {
            check_compare_side(left, right, fields, scope, *line, diagnostics);
            check_compare_side(right, left, fields, scope, *line, diagnostics);
        }
        Expr::In { term, values, line } => {
            check_term(term, fields, scope, *line, diagnostics);
            // List items are symbolic constants; when the tested term is an
            // enum field they must belong to its value set.
            if let Some(allowed) = enum_values_of(term, fields) {
                for value in values {
                    if let crate::ast::Literal::Str(symbol) = value {
                        if !allowed.contains(symbol) {
                            diagnostics.push(Diagnostic::semantic(
                                scope.file,
                                *line,
                                format!(
                                    "'{}' is not a value of the enum tested in {}",
                                    symbol, scope.what
                                ),
                            ));
                        }
                    }
                }
            }
        }
        Expr::IsNull { term, line, .. } => {
            check_term(term, fields, scope, *line, diagnostics);
        }
        Expr::And(left, right) | Expr::Or(left, right) => {
            check_expr(left, fields, scope, diagnostics);
            check_expr(right, fields, scope, diagnostics);
        }
        Expr::Term(term, line) => {
            check_term(term, fields, scope, *line, diagnostics);
        }
    }
}

/// One side of a comparison. A bare identifier that is not a field is still
/// fine when the other side is an enum field and the identifier is one of
/// its values, as in `status = open`.
fn check_compare_side(
    term: &Term,
    other: &Term,
    fields: &[FieldDecl],
    scope: ExprScope<'_>,
    line: u32,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if let Term::Field(name) = term {
        if !BARE_BUILTINS.contains(&name.as_str()) && !fields.iter().any(|f| f.name == *name) {
            if enum_values_of(other, fields).is_some_and(|values| values.contains(name)) {
                return;
            }
        }
    }
    check_term(term, fields, scope, line, diagnostics);
}

fn enum_values_of<'a>(term: &Term, fields: &'a [FieldDecl]) -> Option<&'a Vec<String>> {
    let Term::Field(name) = term else {
        return None;
    };
    match &fields.iter().find(|f| f.name == *name)?.ty {
        crate::ast::FieldType::Enum { values } => Some(values),
        _ => None,
    }
}

fn check_term(
    term: &Term,
    fields: &[FieldDecl],
    scope: ExprScope<'_>,
    line: u32,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match term {
        Term::Literal(_) => {}
        Term::Field(name) => {
            if BARE_BUILTINS.contains(&name.as_str()) {
                return;
            }
            if !fields.iter().any(|f| f.name == *name) {
                diagnostics.push(Diagnostic::semantic(
                    scope.file,
                    line,
                    format!("unknown field '{}' in {}", name, scope.what),
                ));
            }
        }
        Term::Call { func, args, line } => {
            check_call(func, args, fields, scope, *line, diagnostics);
        }
    }
}

fn check_call(
    func: &str,
    args: &[Term],
    fields: &[FieldDecl],
    scope: ExprScope<'_>,
    line: u32,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match func {
        // role(admin) -- the argument is a role symbol, not a field
        "role" => {
            let symbolic = matches!(
                args,
                [Term::Field(_)] | [Term::Literal(crate::ast::Literal::Str(_))]
            );
            if !symbolic {
                diagnostics.push(Diagnostic::semantic(
                    scope.file,
                    line,
                    format!("role() takes exactly one role name in {}", scope.what),
                ));
            }
        }
        "count" => {
            if !args.is_empty() {
                diagnostics.push(Diagnostic::semantic(
                    scope.file,
                    line,
                    format!("count takes no arguments in {}", scope.what),
                ));
            }
        }
        // Single field-reference argument, resolved against the entity.
        "avg" | "days_since" | "hours_since" => match args {
            [Term::Field(name)] => {
                if !fields.iter().any(|f| f.name == *name) {
                    diagnostics.push(Diagnostic::semantic(
                        scope.file,
                        line,
                        format!(
                            "{}() references unknown field '{}' in {}",
                            func, name, scope.what
                        ),
                    ));
                }
            }
            _ => diagnostics.push(Diagnostic::semantic(
                scope.file,
                line,
                format!("{}() takes exactly one field reference in {}", func, scope.what),
            )),
        },
        other => diagnostics.push(Diagnostic::semantic(
            scope.file,
            line,
            format!("unknown function '{}' in {}", other, scope.what),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lexer, parser};

    fn fields(names: &[&str]) -> Vec<FieldDecl> {
        names
            .iter()
            .map(|n| FieldDecl {
                name: (*n).to_owned(),
                ty: crate::ast::FieldType::Str { length: None },
                constraints: Vec::new(),
                default: None,
                line: 1,
            })
            .collect()
    }

    fn parse_expr(src: &str) -> Expr {
        let (tokens, diags) = lexer::lex(src, "x.spec", None);
        assert!(diags.is_empty());
        let mut parser = parser::Parser::new(&tokens, "x.spec");
        parser.parse_expr().expect("expression parses")
    }

    fn check(src: &str, field_names: &[&str]) -> Vec<Diagnostic> {
        let expr = parse_expr(src);
        let mut diags = Vec::new();
        check_expr(
            &expr,
            &fields(field_names),
            ExprScope {
                file: "x.spec",
                what: "invariant on entity 'T'",
            },
            &mut diags,
        );
        diags
    }

    #[test]
    fn known_fields_and_builtins_pass() {
        let diags = check("owner = current_user and status in [open, held]", &["owner", "status"]);
        assert!(diags.is_empty(), "diags: {:?}", diags);
    }

    #[test]
    fn unknown_field_is_named() {
        let diags = check("ownr = current_user", &["owner"]);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("unknown field 'ownr'"));
        assert!(diags[0].message.contains("invariant on entity 'T'"));
    }

    #[test]
    fn days_since_checks_its_argument() {
        let diags = check("days_since(closed_at) > 30", &["created_at"]);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("unknown field 'closed_at'"));
    }

    #[test]
    fn role_argument_is_symbolic() {
        let diags = check("role(admin)", &[]);
        assert!(diags.is_empty(), "diags: {:?}", diags);
    }

    #[test]
    fn unknown_function_is_an_error() {
        let diags = check("median(score) > 3", &["score"]);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("unknown function 'median'"));
    }

    #[test]
    fn both_sides_of_a_comparison_are_checked() {
        let diags = check("a = b", &[]);
        assert_eq!(diags.len(), 2);
    }

    fn enum_field(name: &str, values: &[&str]) -> FieldDecl {
        FieldDecl {
            name: name.to_owned(),
            ty: crate::ast::FieldType::Enum {
                values: values.iter().map(|v| (*v).to_owned()).collect(),
            },
            constraints: Vec::new(),
            default: None,
            line: 1,
        }
    }

    #[test]
    fn comparing_an_enum_field_to_its_own_value_passes() {
        let expr = parse_expr("status = open");
        let mut diags = Vec::new();
        check_expr(
            &expr,
            &[enum_field("status", &["open", "done"])],
            ExprScope { file: "x.spec", what: "filter of block 'b'" },
            &mut diags,
        );
        assert!(diags.is_empty(), "diags: {:?}", diags);
    }

    #[test]
    fn in_list_members_must_belong_to_the_enum() {
        let expr = parse_expr("status in [open, archived]");
        let mut diags = Vec::new();
        check_expr(
            &expr,
            &[enum_field("status", &["open", "done"])],
            ExprScope { file: "x.spec", what: "filter of block 'b'" },
            &mut diags,
        );
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("'archived' is not a value"));
    }
}
