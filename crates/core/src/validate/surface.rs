//! Surface and workspace validation against their bound entities.

use std::collections::BTreeMap;

use crate::ast::{Aggregate, FieldDecl, SortKey};
use crate::error::{Diagnostic, DiagnosticCode};
use crate::link::SymbolTable;
use crate::validate::entity::EntityArtifacts;
use crate::validate::exprs::{self, ExprScope};

/// Field set a surface or block resolves against: a flattened entity or a
/// foreign model's declared fields.
fn source_fields<'a>(
    table: &'a SymbolTable,
    artifacts: &'a BTreeMap<String, EntityArtifacts>,
    name: &str,
) -> Option<&'a [FieldDecl]> {
    if let Some(a) = artifacts.get(name) {
        return Some(&a.fields);
    }
    table
        .foreign_models
        .get(name)
        .map(|f| f.decl.fields.as_slice())
}

pub(super) fn check_surfaces(
    table: &SymbolTable,
    artifacts: &BTreeMap<String, EntityArtifacts>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for surface in table.surfaces.values() {
        let decl = &surface.decl;
        let file = decl.prov.file.as_str();
        // An unresolved entity binding was already reported by the
        // reference pass; there is nothing to check fields against.
        let Some(entity) = artifacts.get(&decl.entity) else {
            continue;
        };

        for section in &decl.sections {
            for (field, line) in &section.fields {
                if !entity.fields.iter().any(|f| f.name == *field) {
                    diagnostics.push(Diagnostic::reference(
                        file,
                        *line,
                        format!(
                            "surface '{}' shows field '{}', which does not exist on entity '{}'",
                            decl.name, field, decl.entity
                        ),
                    ));
                }
            }
        }

        if let Some(ux) = &decl.ux {
            for (field, line) in ux.attention.iter().chain(&ux.search) {
                if !entity.fields.iter().any(|f| f.name == *field) {
                    diagnostics.push(Diagnostic::reference(
                        file,
                        *line,
                        format!(
                            "surface '{}' highlights field '{}', which does not exist on entity '{}'",
                            decl.name, field, decl.entity
                        ),
                    ));
                }
            }
            if let Some(sort) = &ux.sort {
                check_sort(sort, &entity.fields, file, &decl.name, "surface", diagnostics);
            }
            if let Some((filter, _)) = &ux.filter {
                let what = format!("filter of surface '{}'", decl.name);
                exprs::check_expr(
                    filter,
                    &entity.fields,
                    ExprScope { file, what: &what },
                    diagnostics,
                );
            }
        }
    }
}

pub(super) fn check_workspaces(
    table: &SymbolTable,
    artifacts: &BTreeMap<String, EntityArtifacts>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for workspace in table.workspaces.values() {
        let decl = &workspace.decl;
        let file = decl.prov.file.as_str();
        for block in &decl.blocks {
            let Some(fields) = source_fields(table, artifacts, &block.source) else {
                continue;
            };

            if let Some((filter, _)) = &block.filter {
                let what = format!("filter of block '{}'", block.name);
                exprs::check_expr(filter, fields, ExprScope { file, what: &what }, diagnostics);
            }
            if let Some(sort) = &block.sort {
                check_sort(sort, fields, file, &block.name, "block", diagnostics);
            }
            for (field, line) in &block.display {
                if !fields.iter().any(|f| f.name == *field) {
                    diagnostics.push(Diagnostic::reference(
                        file,
                        *line,
                        format!(
                            "block '{}' displays field '{}', which does not exist on '{}'",
                            block.name, field, block.source
                        ),
                    ));
                }
            }
            if let Some((group_by, line)) = &block.group_by {
                if !fields.iter().any(|f| f.name == *group_by) {
                    diagnostics.push(Diagnostic::semantic(
                        file,
                        *line,
                        format!(
                            "block '{}' groups by unknown field '{}'",
                            block.name, group_by
                        ),
                    ));
                }
            }
            for agg in &block.aggregates {
                check_aggregate(agg, fields, file, &block.name, diagnostics);
            }
        }
    }
}

fn check_sort(
    sort: &SortKey,
    fields: &[FieldDecl],
    file: &str,
    owner: &str,
    owner_kind: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if !fields.iter().any(|f| f.name == sort.field) {
        diagnostics.push(Diagnostic::semantic(
            file,
            sort.line,
            format!(
                "{} '{}' sorts by unknown field '{}'",
                owner_kind, owner, sort.field
            ),
        ));
    }
}

fn check_aggregate(
    agg: &Aggregate,
    fields: &[FieldDecl],
    file: &str,
    block: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match agg.func.as_str() {
        "count" => {
            if agg.field.is_some() {
                diagnostics.push(Diagnostic::semantic(
                    file,
                    agg.line,
                    format!("aggregate 'count' in block '{}' takes no field", block),
                ));
            }
        }
        "avg" => match &agg.field {
            Some(field) => {
                if !fields.iter().any(|f| f.name == *field) {
                    diagnostics.push(Diagnostic::semantic(
                        file,
                        agg.line,
                        format!(
                            "aggregate 'avg' in block '{}' references unknown field '{}'",
                            block, field
                        ),
                    ));
                }
            }
            None => diagnostics.push(Diagnostic::semantic(
                file,
                agg.line,
                format!("aggregate 'avg' in block '{}' needs a field", block),
            )),
        },
        other => diagnostics.push(Diagnostic::semantic(
            file,
            agg.line,
            format!("unknown aggregate '{}' in block '{}'", other, block),
        )),
    }
}

/// Warn about surfaces no workspace ever opens. Only meaningful once the
/// project wires surfaces into workspaces at all, so projects without any
/// workspace stay silent.
pub(super) fn warn_unused_surfaces(table: &SymbolTable, diagnostics: &mut Vec<Diagnostic>) {
    if table.workspaces.is_empty() {
        return;
    }
    for surface in table.surfaces.values() {
        let used = table.workspaces.values().any(|w| {
            w.decl
                .blocks
                .iter()
                .any(|b| b.action.as_ref().is_some_and(|(a, _)| *a == surface.decl.name))
        });
        if !used {
            diagnostics.push(Diagnostic::warning(
                DiagnosticCode::SemanticError,
                &surface.decl.prov.file,
                surface.decl.prov.line,
                format!(
                    "surface '{}' is never opened by any workspace block",
                    surface.decl.name
                ),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{link, FileAst};
    use crate::validate::entity::check_entities;
    use crate::{lexer, parser};

    fn check(src: &str) -> Vec<Diagnostic> {
        let (tokens, _) = lexer::lex(src, "s.spec", None);
        let (decls, parse_diags) = parser::parse(&tokens, "s.spec");
        assert!(parse_diags.is_empty(), "parse diags: {:?}", parse_diags);
        let (table, _, _) = link(vec![FileAst {
            file: "s.spec".to_owned(),
            decls,
        }]);
        let mut diags = Vec::new();
        let artifacts = check_entities(&table, &mut diags);
        assert!(diags.is_empty(), "entity diags: {:?}", diags);
        check_surfaces(&table, &artifacts, &mut diags);
        check_workspaces(&table, &artifacts, &mut diags);
        diags
    }

    #[test]
    fn nonexistent_section_field_yields_one_reference_error() {
        let src = "entity Task:\n  title: str\nsurface task_view:\n  mode view\n  entity Task\n  section main:\n    field title\n    field nonexistent_field\n";
        let diags = check(src);
        assert_eq!(diags.len(), 1, "diags: {:?}", diags);
        assert_eq!(diags[0].code, DiagnosticCode::ReferenceError);
        assert!(diags[0].message.contains("nonexistent_field"));
        assert!(diags[0].message.contains("task_view"));
    }

    #[test]
    fn archetype_fields_count_for_surfaces() {
        let src = "archetype timestamped:\n  created_at: datetime\nentity Task:\n  uses timestamped\n  title: str\nsurface task_view:\n  mode view\n  entity Task\n  section main:\n    field created_at\n";
        let diags = check(src);
        assert!(diags.is_empty(), "diags: {:?}", diags);
    }

    #[test]
    fn block_filter_is_checked_against_the_source() {
        let src = "entity Task:\n  title: str\nworkspace board:\n  block open:\n    source Task\n    filter done = true\n";
        let diags = check(src);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("unknown field 'done'"));
        assert!(diags[0].message.contains("block 'open'"));
    }

    #[test]
    fn avg_aggregate_needs_a_real_field() {
        let src = "entity Task:\n  score: int\nworkspace board:\n  block stats:\n    source Task\n    aggregate avg(points)\n";
        let diags = check(src);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("unknown field 'points'"));
    }

    #[test]
    fn foreign_model_fields_back_a_block() {
        let src = "foreign_model Invoice:\n  system billing\n  total: money\nworkspace finance:\n  block invoices:\n    source Invoice\n    display [total]\n    sort -total\n";
        let diags = check(src);
        assert!(diags.is_empty(), "diags: {:?}", diags);
    }

    #[test]
    fn unused_surface_warns_once_workspaces_exist() {
        let src = "entity Task:\n  title: str\nsurface task_view:\n  mode view\n  entity Task\nworkspace board:\n  block open:\n    source Task\n";
        let (tokens, _) = lexer::lex(src, "s.spec", None);
        let (decls, _) = parser::parse(&tokens, "s.spec");
        let (table, _, _) = link(vec![FileAst {
            file: "s.spec".to_owned(),
            decls,
        }]);
        let mut diags = Vec::new();
        warn_unused_surfaces(&table, &mut diags);
        assert_eq!(diags.len(), 1);
        assert!(!diags[0].is_error());
        assert!(diags[0].message.contains("task_view"));
    }

    #[test]
    fn no_workspaces_means_no_unused_warning() {
        let src = "entity Task:\n  title: str\nsurface task_view:\n  mode view\n  entity Task\n";
        let (tokens, _) = lexer::lex(src, "s.spec", None);
        let (decls, _) = parser::parse(&tokens, "s.spec");
        let (table, _, _) = link(vec![FileAst {
            file: "s.spec".to_owned(),
            decls,
        }]);
        let mut diags = Vec::new();
        warn_unused_surfaces(&table, &mut diags);
        assert!(diags.is_empty());
    }
}
