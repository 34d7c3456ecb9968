//! Module linking: merge per-file ASTs into one project-wide symbol table.
//!
//! Each file declares at most one `module` and any number of `use` edges;
//! files without a header join an implicit module named after the file stem.
//! The module graph is topologically sorted (a cycle is a `LinkError` naming
//! its members) and declarations are merged in that order into one flat
//! namespace per declaration kind. A name already taken by a different
//! module is a duplicate-definition `LinkError` citing both locations --
//! even when the two declarations are syntactically identical.
//!
//! The linker only establishes top-level visibility. Field-level and
//! expression-level references are the validator's concern.

use crate::ast::*;
use crate::error::Diagnostic;
use std::collections::{BTreeMap, HashMap};

/// A parsed file handed to the linker.
#[derive(Debug, Clone)]
pub struct FileAst {
    pub file: String,
    pub decls: Vec<Decl>,
}

/// The `module`/`use` dependency graph, kept for tooling and diagnostics.
#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    /// Declared (or implicit) module names in first-seen order.
    pub modules: Vec<String>,
    /// `use` edges: (using module, used module).
    pub edges: Vec<(String, String)>,
    /// Merge order after the topological sort; empty when the graph is cyclic.
    pub order: Vec<String>,
}

/// One merged declaration, tagged with its defining module.
#[derive(Debug, Clone)]
pub struct Linked<T> {
    pub decl: T,
    pub module: String,
}

/// The project-wide symbol table: one flat namespace per declaration kind.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    pub app: Option<Linked<(String, Option<String>, Provenance)>>,
    pub archetypes: BTreeMap<String, Linked<ArchetypeDecl>>,
    pub entities: BTreeMap<String, Linked<EntityDecl>>,
    pub surfaces: BTreeMap<String, Linked<SurfaceDecl>>,
    pub workspaces: BTreeMap<String, Linked<WorkspaceDecl>>,
    pub services: BTreeMap<String, Linked<ServiceDecl>>,
    pub foreign_models: BTreeMap<String, Linked<ForeignModelDecl>>,
    pub integrations: BTreeMap<String, Linked<IntegrationDecl>>,
}

/// Merge state threaded through the per-module merge, in place of any
/// process-wide "current module" registry.
struct LinkContext<'a> {
    table: SymbolTable,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl<'a> LinkContext<'a> {
    fn insert<T>(
        map: &mut BTreeMap<String, Linked<T>>,
        diagnostics: &mut Vec<Diagnostic>,
        kind: &str,
        name: &str,
        module: &str,
        prov: &Provenance,
        decl: T,
        prov_of: impl Fn(&T) -> &Provenance,
    ) {
        if let Some(existing) = map.get(name) {
            let first = prov_of(&existing.decl);
            diagnostics.push(Diagnostic::link(
                &prov.file,
                prov.line,
                format!(
                    "duplicate {} name '{}': first declared in module '{}' at {}:{}",
                    kind, name, existing.module, first.file, first.line
                ),
            ));
            return;
        }
        map.insert(
            name.to_owned(),
            Linked {
                decl,
                module: module.to_owned(),
            },
        );
    }

    fn merge_decl(&mut self, decl: Decl, module: &str) {
        match decl {
            Decl::Module { .. } | Decl::Use { .. } => {}
            Decl::App { name, label, prov } => {
                if let Some(existing) = &self.table.app {
                    let (_, _, first) = &existing.decl;
                    self.diagnostics.push(Diagnostic::link(
                        &prov.file,
                        prov.line,
                        format!(
                            "duplicate app declaration: first declared in module '{}' at {}:{}",
                            existing.module, first.file, first.line
                        ),
                    ));
                } else {
                    self.table.app = Some(Linked {
                        decl: (name, label, prov),
                        module: module.to_owned(),
                    });
                }
            }
            Decl::Archetype(d) => Self::insert(
                &mut self.table.archetypes,
                self.diagnostics,
                "archetype",
                &d.name.clone(),
                module,
                &d.prov.clone(),
                d,
                |d| &d.prov,
            ),
            Decl::Entity(d) => Self::insert(
                &mut self.table.entities,
                self.diagnostics,
                "entity",
                &d.name.clone(),
                module,
                &d.prov.clone(),
                d,
                |d| &d.prov,
            ),
            Decl::Surface(d) => Self::insert(
                &mut self.table.surfaces,
                self.diagnostics,
                "surface",
                &d.name.clone(),
                module,
                &d.prov.clone(),
                d,
                |d| &d.prov,
            ),
            Decl::Workspace(d) => Self::insert(
                &mut self.table.workspaces,
                self.diagnostics,
                "workspace",
                &d.name.clone(),
                module,
                &d.prov.clone(),
                d,
                |d| &d.prov,
            ),
            Decl::Service(d) => Self::insert(
                &mut self.table.services,
                self.diagnostics,
                "service",
                &d.name.clone(),
                module,
                &d.prov.clone(),
                d,
                |d| &d.prov,
            ),
            Decl::ForeignModel(d) => Self::insert(
                &mut self.table.foreign_models,
                self.diagnostics,
                "foreign_model",
                &d.name.clone(),
                module,
                &d.prov.clone(),
                d,
                |d| &d.prov,
            ),
            Decl::Integration(d) => Self::insert(
                &mut self.table.integrations,
                self.diagnostics,
                "integration",
                &d.name.clone(),
                module,
                &d.prov.clone(),
                d,
                |d| &d.prov,
            ),
        }
    }
}

/// Link all parsed files into one symbol table.
///
/// Always produces a (possibly incomplete) table and graph; problems are
/// reported through the diagnostics list rather than aborting, so the
/// validator can still check whatever merged cleanly.
pub fn link(files: Vec<FileAst>) -> (SymbolTable, ModuleGraph, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();
    let mut graph = ModuleGraph::default();
    // module -> (file of `module` header or first file, decls)
    let mut module_decls: HashMap<String, Vec<Decl>> = HashMap::new();
    let mut module_order: Vec<String> = Vec::new();
    // (module, used, prov) recorded before membership is known
    let mut pending_uses: Vec<(String, String, Provenance)> = Vec::new();

    for file in files {
        let module_name = file
            .decls
            .iter()
            .find_map(|d| match d {
                Decl::Module { name, .. } => Some(name.clone()),
                _ => None,
            })
            .unwrap_or_else(|| file_stem(&file.file));

        if !module_decls.contains_key(&module_name) {
            module_order.push(module_name.clone());
        }
        let bucket = module_decls.entry(module_name.clone()).or_default();

        for decl in file.decls {
            match &decl {
                Decl::Module { name, prov } => {
                    if *name != module_name {
                        diagnostics.push(Diagnostic::link(
                            &prov.file,
                            prov.line,
                            format!(
                                "file declares more than one module ('{}' after '{}')",
                                name, module_name
                            ),
                        ));
                    }
                }
                Decl::Use { module, prov } => {
                    pending_uses.push((module_name.clone(), module.clone(), prov.clone()));
                }
                _ => bucket.push(decl),
            }
        }
    }

    graph.modules = module_order.clone();

    let mut edges: Vec<(String, String)> = Vec::new();
    for (from, to, prov) in pending_uses {
        if !module_decls.contains_key(&to) {
            diagnostics.push(Diagnostic::link(
                &prov.file,
                prov.line,
                format!("use of undeclared module '{}'", to),
            ));
            continue;
        }
        if from == to {
            diagnostics.push(Diagnostic::link(
                &prov.file,
                prov.line,
                format!("module '{}' cannot use itself", from),
            ));
            continue;
        }
        edges.push((from, to));
    }
    graph.edges = edges.clone();

    match topo_sort(&module_order, &edges) {
        Ok(order) => graph.order = order,
        Err(cycle) => {
            diagnostics.push(Diagnostic::link(
                "<project>",
                0,
                format!("circular module dependency: {}", cycle.join(" -> ")),
            ));
            // Fall back to declaration order so merging (and duplicate
            // detection) still happens.
            graph.order = module_order.clone();
        }
    }

    let mut ctx = LinkContext {
        table: SymbolTable::default(),
        diagnostics: &mut diagnostics,
    };
    for module in &graph.order {
        if let Some(decls) = module_decls.remove(module) {
            for decl in decls {
                ctx.merge_decl(decl, module);
            }
        }
    }
    let table = ctx.table;

    (table, graph, diagnostics)
}

fn file_stem(file: &str) -> String {
    let base = file.rsplit(['/', '\\']).next().unwrap_or(file);
    base.strip_suffix(".spec").unwrap_or(base).to_owned()
}

/// Kahn's algorithm over the `use` graph, dependencies first. On a cycle,
/// returns its members in edge order for the error message.
fn topo_sort(modules: &[String], edges: &[(String, String)]) -> Result<Vec<String>, Vec<String>> {
    // A module must merge after the modules it uses.
    let mut in_degree: HashMap<&str, usize> = modules.iter().map(|m| (m.as_str(), 0)).collect();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for (from, to) in edges {
        *in_degree.entry(from.as_str()).or_insert(0) += 1;
        dependents.entry(to.as_str()).or_default().push(from.as_str());
    }

    let mut ready: Vec<&str> = modules
        .iter()
        .map(String::as_str)
        .filter(|m| in_degree.get(m) == Some(&0))
        .collect();
    let mut order = Vec::with_capacity(modules.len());

    while let Some(module) = ready.pop() {
        order.push(module.to_owned());
        if let Some(deps) = dependents.get(module) {
            for dep in deps {
                if let Some(d) = in_degree.get_mut(dep) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push(dep);
                    }
                }
            }
        }
    }

    if order.len() == modules.len() {
        return Ok(order);
    }

    // Walk the leftover subgraph to name one concrete cycle.
    let remaining: Vec<&str> = modules
        .iter()
        .map(String::as_str)
        .filter(|m| in_degree.get(m).is_some_and(|d| *d > 0))
        .collect();
    let uses: HashMap<&str, Vec<&str>> = edges.iter().fold(HashMap::new(), |mut acc, (f, t)| {
        acc.entry(f.as_str()).or_default().push(t.as_str());
        acc
    });
    let start = remaining[0];
    let mut path = vec![start];
    let mut cur = start;
    loop {
        let next = uses
            .get(cur)
            .and_then(|targets| targets.iter().find(|t| remaining.contains(t)))
            .copied();
        let Some(next) = next else { break };
        if let Some(idx) = path.iter().position(|m| *m == next) {
            let mut cycle: Vec<String> = path[idx..].iter().map(|s| s.to_string()).collect();
            cycle.push(next.to_owned());
            return Err(cycle);
        }
        path.push(next);
        cur = next;
    }
    Err(remaining.iter().map(|s| s.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;
    use crate::parser;

    fn file_ast(file: &str, src: &str) -> FileAst {
        let (tokens, lex_diags) = lexer::lex(src, file, None);
        assert!(lex_diags.is_empty());
        let (decls, diags) = parser::parse(&tokens, file);
        assert!(diags.is_empty(), "parse diags: {:?}", diags);
        FileAst {
            file: file.to_owned(),
            decls,
        }
    }

    #[test]
    fn merges_across_modules_in_use_order() {
        let a = file_ast("core.spec", "module core\nentity User:\n  id: uuid pk\n");
        let b = file_ast(
            "billing.spec",
            "module billing\nuse core\nentity Invoice:\n  id: uuid pk\n  customer: ref User\n",
        );
        let (table, graph, diags) = link(vec![a, b]);
        assert!(diags.is_empty(), "diags: {:?}", diags);
        assert_eq!(table.entities.len(), 2);
        assert_eq!(table.entities["User"].module, "core");
        let core_pos = graph.order.iter().position(|m| m == "core").unwrap();
        let billing_pos = graph.order.iter().position(|m| m == "billing").unwrap();
        assert!(core_pos < billing_pos);
    }

    #[test]
    fn file_without_module_header_gets_implicit_module() {
        let a = file_ast("tasks.spec", "entity Task:\n  id: uuid pk\n");
        let (table, graph, diags) = link(vec![a]);
        assert!(diags.is_empty());
        assert_eq!(graph.modules, vec!["tasks".to_owned()]);
        assert_eq!(table.entities["Task"].module, "tasks");
    }

    #[test]
    fn use_of_undeclared_module_is_a_link_error() {
        let a = file_ast("a.spec", "module a\nuse missing\n");
        let (_, _, diags) = link(vec![a]);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("undeclared module 'missing'"));
    }

    #[test]
    fn duplicate_entity_across_modules_cites_both_locations() {
        let a = file_ast("a.spec", "module a\nentity Task:\n  id: uuid pk\n");
        let b = file_ast("b.spec", "module b\nentity Task:\n  id: uuid pk\n");
        let c = file_ast("c.spec", "module c\nuse a\nuse b\n");
        let (_, _, diags) = link(vec![a, b, c]);
        assert_eq!(diags.len(), 1, "diags: {:?}", diags);
        let msg = &diags[0].message;
        assert!(msg.contains("duplicate entity name 'Task'"), "{}", msg);
        assert!(msg.contains("a.spec:2") || msg.contains("b.spec:2"), "{}", msg);
        // The diagnostic's own location is the other defining file.
        assert!(diags[0].file.ends_with(".spec"));
    }

    #[test]
    fn identical_duplicates_are_still_errors() {
        let a = file_ast("a.spec", "module a\nentity Same:\n  id: uuid pk\n");
        let b = file_ast("b.spec", "module b\nentity Same:\n  id: uuid pk\n");
        let (_, _, diags) = link(vec![a, b]);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("duplicate entity name 'Same'"));
    }

    #[test]
    fn module_cycle_is_named() {
        let a = file_ast("a.spec", "module a\nuse b\n");
        let b = file_ast("b.spec", "module b\nuse a\n");
        let (_, _, diags) = link(vec![a, b]);
        assert_eq!(diags.len(), 1);
        assert!(
            diags[0].message.contains("circular module dependency"),
            "{}",
            diags[0].message
        );
        assert!(
            diags[0].message.contains("a -> b -> a")
                || diags[0].message.contains("b -> a -> b"),
            "{}",
            diags[0].message
        );
    }
}
