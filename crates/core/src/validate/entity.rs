//! Entity-internal validation: archetype flattening and state machines.

use crate::ast::*;
use crate::error::Diagnostic;
use crate::ir::StateMachine;
use crate::link::{Linked, SymbolTable};
use std::collections::BTreeMap;

/// Flatten an entity's archetype fields in front of its own declarations.
///
/// An archetype field colliding with a locally declared field of the same
/// name is a `SemanticError` naming both sides; the local field wins so
/// later passes still see a usable field set. Unknown archetypes are the
/// reference pass's problem and are skipped here.
pub(super) fn flatten_fields(
    entity: &EntityDecl,
    archetypes: &BTreeMap<String, Linked<ArchetypeDecl>>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<FieldDecl> {
    let mut fields: Vec<FieldDecl> = Vec::new();

    for (archetype_name, use_line) in &entity.archetypes_used {
        let Some(archetype) = archetypes.get(archetype_name) else {
            continue;
        };
        for field in &archetype.decl.fields {
            if entity.fields.iter().any(|f| f.name == field.name) {
                diagnostics.push(Diagnostic::semantic(
                    &entity.prov.file,
                    *use_line,
                    format!(
                        "field '{}' from archetype '{}' collides with a field declared on entity '{}'",
                        field.name, archetype_name, entity.name
                    ),
                ));
                continue;
            }
            if fields.iter().any(|f| f.name == field.name) {
                diagnostics.push(Diagnostic::semantic(
                    &entity.prov.file,
                    *use_line,
                    format!(
                        "field '{}' from archetype '{}' collides with a field of another archetype used by entity '{}'",
                        field.name, archetype_name, entity.name
                    ),
                ));
                continue;
            }
            fields.push(field.clone());
        }
    }

    for field in &entity.fields {
        if entity
            .fields
            .iter()
            .any(|f| f.name == field.name && f.line < field.line)
        {
            diagnostics.push(Diagnostic::semantic(
                &entity.prov.file,
                field.line,
                format!(
                    "duplicate field '{}' on entity '{}'",
                    field.name, entity.name
                ),
            ));
            continue;
        }
        fields.push(field.clone());
    }

    fields
}

/// Resolve and check an entity's state machine, when it declares one.
///
/// The governing field is the explicit `transitions on <field>` binding if
/// present; otherwise a field named `status`, then `state`; otherwise the
/// entity's sole enum field. Every transition endpoint must be a declared
/// enum value and every `requires` guard an existing field.
pub(super) fn check_state_machine(
    entity: &EntityDecl,
    fields: &[FieldDecl],
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<StateMachine> {
    if entity.transitions.is_empty() && entity.transitions_on.is_none() {
        return None;
    }
    let file = &entity.prov.file;

    let (field_name, bind_line) = match &entity.transitions_on {
        Some((name, line)) => (name.clone(), *line),
        None => {
            let by_convention = fields
                .iter()
                .find(|f| f.name == "status")
                .or_else(|| fields.iter().find(|f| f.name == "state"));
            match by_convention {
                Some(f) => (f.name.clone(), f.line),
                None => {
                    let enums: Vec<&FieldDecl> = fields
                        .iter()
                        .filter(|f| matches!(f.ty, FieldType::Enum { .. }))
                        .collect();
                    match enums.as_slice() {
                        [only] => (only.name.clone(), only.line),
                        [] => {
                            diagnostics.push(Diagnostic::semantic(
                                file,
                                entity.transitions.first().map_or(entity.prov.line, |t| t.line),
                                format!(
                                    "entity '{}' declares transitions but has no enum field to govern them",
                                    entity.name
                                ),
                            ));
                            return None;
                        }
                        _ => {
                            diagnostics.push(Diagnostic::semantic(
                                file,
                                entity.transitions.first().map_or(entity.prov.line, |t| t.line),
                                format!(
                                    "entity '{}' has multiple enum fields; bind one with 'transitions on <field>'",
                                    entity.name
                                ),
                            ));
                            return None;
                        }
                    }
                }
            }
        }
    };

    let Some(field) = fields.iter().find(|f| f.name == field_name) else {
        diagnostics.push(Diagnostic::semantic(
            file,
            bind_line,
            format!(
                "transitions field '{}' does not exist on entity '{}'",
                field_name, entity.name
            ),
        ));
        return None;
    };
    let FieldType::Enum { values } = &field.ty else {
        diagnostics.push(Diagnostic::semantic(
            file,
            bind_line,
            format!(
                "transitions field '{}' on entity '{}' is {}, not an enum",
                field_name,
                entity.name,
                field.ty.name()
            ),
        ));
        return None;
    };

    let mut ok = true;
    for t in &entity.transitions {
        for endpoint in [&t.from, &t.to] {
            if !values.contains(endpoint) {
                ok = false;
                diagnostics.push(Diagnostic::semantic(
                    file,
                    t.line,
                    format!(
                        "transition endpoint '{}' is not a value of enum field '{}' ({})",
                        endpoint,
                        field_name,
                        values.join(", ")
                    ),
                ));
            }
        }
        if let Some(guard) = &t.requires {
            if !fields.iter().any(|f| f.name == *guard) {
                ok = false;
                diagnostics.push(Diagnostic::semantic(
                    file,
                    t.line,
                    format!(
                        "transition guard 'requires {}' names a field that does not exist on entity '{}'",
                        guard, entity.name
                    ),
                ));
            }
        }
    }

    if !ok {
        return None;
    }
    Some(StateMachine {
        field: field_name,
        states: values.clone(),
        transitions: entity.transitions.clone(),
    })
}

/// Per-entity artifacts computed by this pass and reused downstream.
pub(super) struct EntityArtifacts {
    pub fields: Vec<FieldDecl>,
    pub machine: Option<StateMachine>,
}

pub(super) fn check_entities(
    table: &SymbolTable,
    diagnostics: &mut Vec<Diagnostic>,
) -> BTreeMap<String, EntityArtifacts> {
    let mut artifacts = BTreeMap::new();
    for (name, entity) in &table.entities {
        let fields = flatten_fields(&entity.decl, &table.archetypes, diagnostics);
        let machine = check_state_machine(&entity.decl, &fields, diagnostics);
        artifacts.insert(name.clone(), EntityArtifacts { fields, machine });
    }
    artifacts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{link, FileAst};
    use crate::{lexer, parser};

    fn table_for(src: &str) -> (SymbolTable, Vec<Diagnostic>) {
        let (tokens, lex_diags) = lexer::lex(src, "t.spec", None);
        assert!(lex_diags.is_empty());
        let (decls, parse_diags) = parser::parse(&tokens, "t.spec");
        assert!(parse_diags.is_empty(), "parse diags: {:?}", parse_diags);
        let (table, _, link_diags) = link(vec![FileAst {
            file: "t.spec".to_owned(),
            decls,
        }]);
        assert!(link_diags.is_empty());
        let mut diags = Vec::new();
        let _ = check_entities(&table, &mut diags);
        (table, diags)
    }

    fn artifacts_for(src: &str) -> (BTreeMap<String, EntityArtifacts>, Vec<Diagnostic>) {
        let (tokens, _) = lexer::lex(src, "t.spec", None);
        let (decls, _) = parser::parse(&tokens, "t.spec");
        let (table, _, _) = link(vec![FileAst {
            file: "t.spec".to_owned(),
            decls,
        }]);
        let mut diags = Vec::new();
        let artifacts = check_entities(&table, &mut diags);
        (artifacts, diags)
    }

    #[test]
    fn archetype_fields_flatten_in_front() {
        let src = "archetype timestamped:\n  created_at: datetime\nentity Note:\n  uses timestamped\n  body: text\n";
        let (artifacts, diags) = artifacts_for(src);
        assert!(diags.is_empty(), "diags: {:?}", diags);
        let names: Vec<&str> = artifacts["Note"].fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["created_at", "body"]);
    }

    #[test]
    fn archetype_collision_is_a_semantic_error() {
        let src = "archetype timestamped:\n  created_at: datetime\nentity Note:\n  uses timestamped\n  created_at: date\n";
        let (_, diags) = table_for(src);
        assert_eq!(diags.len(), 1);
        assert!(diags[0]
            .message
            .contains("field 'created_at' from archetype 'timestamped' collides"));
    }

    #[test]
    fn valid_state_machine_resolves_by_convention() {
        let src = "entity Ticket:\n  status: enum[open, closed]\n  transitions:\n    open -> closed\n";
        let (artifacts, diags) = artifacts_for(src);
        assert!(diags.is_empty(), "diags: {:?}", diags);
        let machine = artifacts["Ticket"].machine.as_ref().unwrap();
        assert_eq!(machine.field, "status");
        assert_eq!(machine.states, vec!["open".to_owned(), "closed".to_owned()]);
    }

    #[test]
    fn each_bad_endpoint_yields_one_error() {
        let src = "entity Ticket:\n  status: enum[open, closed]\n  transitions:\n    open -> gone\n    missing -> closed\n";
        let (artifacts, diags) = artifacts_for(src);
        assert_eq!(diags.len(), 2, "diags: {:?}", diags);
        assert!(diags[0].message.contains("'gone' is not a value"));
        assert!(diags[1].message.contains("'missing' is not a value"));
        assert!(artifacts["Ticket"].machine.is_none());
    }

    #[test]
    fn transitions_on_non_enum_field_is_an_error() {
        let src = "entity Doc:\n  title: str\n  transitions on title:\n    a -> b\n";
        let (_, diags) = table_for(src);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("not an enum"));
    }

    #[test]
    fn missing_guard_field_is_an_error() {
        let src = "entity Ticket:\n  status: enum[open, resolved]\n  transitions:\n    open -> resolved requires resolution\n";
        let (_, diags) = table_for(src);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("requires resolution"));
    }

    #[test]
    fn sole_enum_field_governs_without_convention_name() {
        let src = "entity Order:\n  phase: enum[draft, placed]\n  transitions:\n    draft -> placed\n";
        let (artifacts, diags) = artifacts_for(src);
        assert!(diags.is_empty(), "diags: {:?}", diags);
        assert_eq!(artifacts["Order"].machine.as_ref().unwrap().field, "phase");
    }

    #[test]
    fn ambiguous_enums_need_explicit_binding() {
        let src = "entity Order:\n  phase: enum[a, b]\n  kind: enum[x, y]\n  transitions:\n    a -> b\n";
        let (_, diags) = table_for(src);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("multiple enum fields"));
    }

    #[test]
    fn duplicate_local_field_is_reported() {
        let src = "entity T:\n  x: int\n  x: bool\n";
        let (_, diags) = table_for(src);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("duplicate field 'x'"));
    }
}
