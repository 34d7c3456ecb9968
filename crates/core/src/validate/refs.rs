//! Cross-declaration reference resolution.
//!
//! Every name one declaration uses to point at another is resolved against
//! the symbol table here: archetype uses, `ref` field types, surface
//! entities, workspace block sources and actions, and integration services.
//! In standalone compilation the definitions may legitimately live in files
//! that were not provided, so unresolved references downgrade to warnings.

use crate::ast::{FieldDecl, FieldType};
use crate::compile::CompileMode;
use crate::error::Diagnostic;
use crate::link::SymbolTable;

pub(super) fn check_references(
    table: &SymbolTable,
    mode: CompileMode,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let mut push = |d: Diagnostic| {
        diagnostics.push(match mode {
            CompileMode::Full => d,
            CompileMode::Standalone => d.downgraded(),
        });
    };

    for entity in table.entities.values() {
        let decl = &entity.decl;
        for (archetype, line) in &decl.archetypes_used {
            if !table.archetypes.contains_key(archetype) {
                push(Diagnostic::reference(
                    &decl.prov.file,
                    *line,
                    format!("entity '{}' uses unknown archetype '{}'", decl.name, archetype),
                ));
            }
        }
        check_ref_fields(table, &decl.prov.file, &decl.fields, &mut push);
    }

    for foreign in table.foreign_models.values() {
        check_ref_fields(table, &foreign.decl.prov.file, &foreign.decl.fields, &mut push);
    }

    for surface in table.surfaces.values() {
        let decl = &surface.decl;
        if !decl.entity.is_empty() && !table.entities.contains_key(&decl.entity) {
            push(Diagnostic::reference(
                &decl.prov.file,
                decl.entity_line,
                format!("surface '{}' is bound to unknown entity '{}'", decl.name, decl.entity),
            ));
        }
    }

    for workspace in table.workspaces.values() {
        let decl = &workspace.decl;
        for block in &decl.blocks {
            let known = table.entities.contains_key(&block.source)
                || table.foreign_models.contains_key(&block.source);
            if !known {
                push(Diagnostic::reference(
                    &decl.prov.file,
                    block.source_line,
                    format!(
                        "block '{}' draws from '{}', which is neither an entity nor a foreign model",
                        block.name, block.source
                    ),
                ));
            }
            if let Some((action, line)) = &block.action {
                if !table.surfaces.contains_key(action) {
                    push(Diagnostic::reference(
                        &decl.prov.file,
                        *line,
                        format!("block '{}' opens unknown surface '{}'", block.name, action),
                    ));
                }
            }
        }
    }

    for integration in table.integrations.values() {
        let decl = &integration.decl;
        if !table.services.contains_key(&decl.service) {
            push(Diagnostic::reference(
                &decl.prov.file,
                decl.service_line,
                format!(
                    "integration '{}' names unknown service '{}'",
                    decl.name, decl.service
                ),
            ));
        }
    }
}

fn check_ref_fields(
    table: &SymbolTable,
    file: &str,
    fields: &[FieldDecl],
    push: &mut impl FnMut(Diagnostic),
) {
    for field in fields {
        if let FieldType::Ref { entity } = &field.ty {
            let known = table.entities.contains_key(entity)
                || table.foreign_models.contains_key(entity);
            if !known {
                push(Diagnostic::reference(
                    file,
                    field.line,
                    format!("field '{}' references unknown entity '{}'", field.name, entity),
                ));
            }
        }
    }
}
