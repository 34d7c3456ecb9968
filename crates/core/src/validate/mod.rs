//! Semantic validation and IR construction.
//!
//! Runs a fixed sequence of passes over the merged symbol table, each
//! appending to one shared diagnostic list so a single run reports
//! everything it can find:
//!
//!   1. reference resolution ([`refs`])
//!   2. archetype flattening and state machines ([`entity`])
//!   3. invariant and access-rule expressions ([`exprs`])
//!   4. surface and workspace field checks ([`surface`])
//!   5. unused-surface warnings
//!
//! The [`AppSpec`] IR is built only when the passes report zero errors, and
//! only when every cross-reference actually resolved; in standalone mode an
//! unresolved reference is a warning, which still leaves nothing to point
//! the IR's indices at.

mod entity;
mod exprs;
mod refs;
mod surface;

use std::collections::BTreeMap;

use crate::ast::{BlockDecl, EntityDecl, SurfaceDecl, UxBlock};
use crate::compile::CompileMode;
use crate::error::Diagnostic;
use crate::ir::*;
use crate::link::SymbolTable;

use entity::EntityArtifacts;
use exprs::ExprScope;

/// Validate a merged symbol table. Returns the IR when validation holds
/// together, plus every diagnostic the passes produced. Validation never
/// mutates its input; running it twice yields the same diagnostics.
pub fn validate(table: &SymbolTable, mode: CompileMode) -> (Option<AppSpec>, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();

    refs::check_references(table, mode, &mut diagnostics);
    let unresolved_refs = !diagnostics.is_empty();
    let artifacts = entity::check_entities(table, &mut diagnostics);
    check_entity_exprs(table, &artifacts, &mut diagnostics);
    surface::check_surfaces(table, &artifacts, &mut diagnostics);
    surface::check_workspaces(table, &artifacts, &mut diagnostics);
    surface::warn_unused_surfaces(table, &mut diagnostics);

    // Even as downgraded warnings, unresolved references leave nothing for
    // the IR's indices to point at.
    if unresolved_refs || diagnostics.iter().any(Diagnostic::is_error) {
        return (None, diagnostics);
    }
    (build_appspec(table, &artifacts), diagnostics)
}

/// Invariants and access rules are scoped to their own entity's fields.
fn check_entity_exprs(
    table: &SymbolTable,
    artifacts: &BTreeMap<String, EntityArtifacts>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for entity in table.entities.values() {
        let decl = &entity.decl;
        let fields = &artifacts[&decl.name].fields;
        let file = decl.prov.file.as_str();

        for (expr, _) in &decl.invariants {
            let what = format!("invariant on entity '{}'", decl.name);
            exprs::check_expr(expr, fields, ExprScope { file, what: &what }, diagnostics);
        }
        for (rule, expr) in [("read", &decl.access.read), ("write", &decl.access.write)] {
            if let Some((expr, _)) = expr {
                let what = format!("{} rule of entity '{}'", rule, decl.name);
                exprs::check_expr(expr, fields, ExprScope { file, what: &what }, diagnostics);
            }
        }
    }
}

// ──────────────────────────────────────────────
// IR construction
// ──────────────────────────────────────────────

/// Name-to-index maps, fixed by the symbol table's sorted iteration order.
struct IndexMaps {
    entities: BTreeMap<String, EntityId>,
    surfaces: BTreeMap<String, SurfaceId>,
    services: BTreeMap<String, ServiceId>,
    foreign_models: BTreeMap<String, ForeignModelId>,
}

impl IndexMaps {
    fn of(table: &SymbolTable) -> Self {
        fn number<T>(map: &BTreeMap<String, T>) -> BTreeMap<String, usize> {
            map.keys().enumerate().map(|(i, k)| (k.clone(), i)).collect()
        }
        IndexMaps {
            entities: number(&table.entities),
            surfaces: number(&table.surfaces),
            services: number(&table.services),
            foreign_models: number(&table.foreign_models),
        }
    }

    fn source(&self, name: &str) -> Option<SourceRef> {
        self.entities
            .get(name)
            .map(|&id| SourceRef::Entity(id))
            .or_else(|| self.foreign_models.get(name).map(|&id| SourceRef::Foreign(id)))
    }
}

fn build_appspec(
    table: &SymbolTable,
    artifacts: &BTreeMap<String, EntityArtifacts>,
) -> Option<AppSpec> {
    let ids = IndexMaps::of(table);

    let entities = table
        .entities
        .values()
        .map(|e| build_entity(&e.decl, &e.module, &artifacts[&e.decl.name]))
        .collect();

    let mut surfaces = Vec::with_capacity(table.surfaces.len());
    for surface in table.surfaces.values() {
        surfaces.push(build_surface(&surface.decl, &ids)?);
    }

    let mut workspaces = Vec::with_capacity(table.workspaces.len());
    for workspace in table.workspaces.values() {
        let decl = &workspace.decl;
        let mut blocks = Vec::with_capacity(decl.blocks.len());
        for block in &decl.blocks {
            blocks.push(build_block(block, &ids)?);
        }
        workspaces.push(WorkspaceIr {
            name: decl.name.clone(),
            purpose: decl.purpose.clone(),
            stage: decl.stage.clone(),
            blocks,
        });
    }

    let services = table
        .services
        .values()
        .map(|s| ServiceIr {
            name: s.decl.name.clone(),
            operations: s
                .decl
                .operations
                .iter()
                .map(|op| ServiceOpIr {
                    name: op.name.clone(),
                    params: op.params.clone(),
                    returns: op.returns.clone(),
                })
                .collect(),
        })
        .collect();

    let foreign_models = table
        .foreign_models
        .values()
        .map(|f| ForeignModelIr {
            name: f.decl.name.clone(),
            system: f.decl.system.clone(),
            fields: f.decl.fields.clone(),
        })
        .collect();

    let mut integrations = Vec::with_capacity(table.integrations.len());
    for integration in table.integrations.values() {
        let decl = &integration.decl;
        integrations.push(IntegrationIr {
            name: decl.name.clone(),
            service: *ids.services.get(&decl.service)?,
            direction: decl.direction.clone(),
            trigger: decl.trigger.clone(),
        });
    }

    Some(AppSpec {
        app: table.app.as_ref().map(|a| AppMeta {
            name: a.decl.0.clone(),
            label: a.decl.1.clone(),
        }),
        entities,
        surfaces,
        workspaces,
        services,
        foreign_models,
        integrations,
    })
}

fn build_entity(decl: &EntityDecl, module: &str, artifacts: &EntityArtifacts) -> EntityIr {
    EntityIr {
        name: decl.name.clone(),
        label: decl.label.clone(),
        module: module.to_owned(),
        fields: artifacts.fields.clone(),
        intent: decl.intent.clone(),
        domain: decl.domain.clone(),
        patterns: decl.patterns.clone(),
        invariants: decl.invariants.iter().map(|(e, _)| e.clone()).collect(),
        state_machine: artifacts.machine.clone(),
        access: decl.access.clone(),
        indices: decl.indices.clone(),
    }
}

fn build_surface(decl: &SurfaceDecl, ids: &IndexMaps) -> Option<SurfaceIr> {
    Some(SurfaceIr {
        name: decl.name.clone(),
        label: decl.label.clone(),
        mode: decl.mode,
        entity: *ids.entities.get(&decl.entity)?,
        sections: decl
            .sections
            .iter()
            .map(|s| SectionIr {
                name: s.name.clone(),
                label: s.label.clone(),
                fields: s.fields.iter().map(|(f, _)| f.clone()).collect(),
            })
            .collect(),
        ux: decl.ux.as_ref().map(build_ux),
    })
}

fn build_ux(ux: &UxBlock) -> UxIr {
    UxIr {
        personas: ux.personas.clone(),
        attention: ux.attention.iter().map(|(f, _)| f.clone()).collect(),
        sort: ux.sort.clone(),
        filter: ux.filter.as_ref().map(|(e, _)| e.clone()),
        search: ux.search.iter().map(|(f, _)| f.clone()).collect(),
        empty: ux.empty.clone(),
    }
}

fn build_block(block: &BlockDecl, ids: &IndexMaps) -> Option<BlockIr> {
    let action = match &block.action {
        Some((name, _)) => Some(*ids.surfaces.get(name)?),
        None => None,
    };
    Some(BlockIr {
        name: block.name.clone(),
        source: ids.source(&block.source)?,
        filter: block.filter.as_ref().map(|(e, _)| e.clone()),
        sort: block.sort.clone(),
        limit: block.limit,
        display: block.display.iter().map(|(f, _)| f.clone()).collect(),
        action,
        aggregates: block.aggregates.clone(),
        group_by: block.group_by.clone().map(|(f, _)| f),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{link, FileAst};
    use crate::{lexer, parser};

    fn run(src: &str, mode: CompileMode) -> (Option<AppSpec>, Vec<Diagnostic>) {
        let (tokens, lex_diags) = lexer::lex(src, "v.spec", None);
        assert!(lex_diags.is_empty(), "lex diags: {:?}", lex_diags);
        let (decls, parse_diags) = parser::parse(&tokens, "v.spec");
        assert!(parse_diags.is_empty(), "parse diags: {:?}", parse_diags);
        let (table, _, link_diags) = link(vec![FileAst {
            file: "v.spec".to_owned(),
            decls,
        }]);
        assert!(link_diags.is_empty(), "link diags: {:?}", link_diags);
        validate(&table, mode)
    }

    #[test]
    fn well_formed_project_yields_an_appspec() {
        let src = "app tracker \"Tracker\"\n\
                   entity User:\n  name: str required\n\
                   entity Task:\n  title: str required\n  owner: ref User\n  status: enum[open, done]\n  transitions:\n    open -> done\n\
                   surface task_view:\n  mode view\n  entity Task\n  section main:\n    field title\n    field status\n\
                   workspace board:\n  block open_tasks:\n    source Task\n    filter status = open\n    action task_view\n";
        let (appspec, diags) = run(src, CompileMode::Full);
        assert!(diags.is_empty(), "diags: {:?}", diags);
        let appspec = appspec.expect("appspec built");
        assert_eq!(appspec.app.as_ref().unwrap().name, "tracker");
        assert_eq!(appspec.entities.len(), 2);

        // BTreeMap order: Task before User.
        let task = &appspec.entities[0];
        assert_eq!(task.name, "Task");
        let machine = task.state_machine.as_ref().unwrap();
        assert_eq!(machine.field, "status");

        let surface = &appspec.surfaces[0];
        assert_eq!(appspec.entities[surface.entity].name, "Task");

        let block = &appspec.workspaces[0].blocks[0];
        assert_eq!(block.source, SourceRef::Entity(0));
        assert_eq!(block.action, Some(0));
    }

    #[test]
    fn errors_suppress_the_ir_but_not_later_passes() {
        let src = "entity Task:\n  owner: ref User\n  status: enum[open, done]\n  transitions:\n    open -> gone\n";
        let (appspec, diags) = run(src, CompileMode::Full);
        assert!(appspec.is_none());
        // Both the bad ref and the bad transition are reported.
        assert_eq!(diags.len(), 2, "diags: {:?}", diags);
    }

    #[test]
    fn standalone_unresolved_ref_warns_and_skips_the_ir() {
        let src = "entity Task:\n  owner: ref User\n";
        let (appspec, diags) = run(src, CompileMode::Standalone);
        assert!(appspec.is_none());
        assert_eq!(diags.len(), 1);
        assert!(!diags[0].is_error());
    }

    #[test]
    fn validation_is_idempotent() {
        let src = "entity Task:\n  title: str\nsurface t:\n  mode view\n  entity Task\n  section main:\n    field missing\n";
        let (tokens, _) = lexer::lex(src, "v.spec", None);
        let (decls, _) = parser::parse(&tokens, "v.spec");
        let (table, _, _) = link(vec![FileAst {
            file: "v.spec".to_owned(),
            decls,
        }]);
        let (_, first) = validate(&table, CompileMode::Full);
        let (_, second) = validate(&table, CompileMode::Full);
        assert_eq!(first, second);
    }
}
