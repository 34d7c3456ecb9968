//! Typed structs representing the AppSpec interchange JSON schema.
//!
//! These types are the wire-level view of a compiled AppSpec: every
//! cross-reference is a name rather than an index, so a document stays
//! meaningful when consumers filter or reorder its constructs. Expression
//! trees are stored as `serde_json::Value` to avoid forcing every consumer
//! to parse them.

use serde_json::Value;

/// Top-level interchange document containing all constructs.
#[derive(Debug, Clone)]
pub struct InterchangeDoc {
    /// Application name, or "appspec" when no `app` declaration exists.
    pub id: String,
    /// Optional human label from the `app` declaration.
    pub label: Option<String>,
    /// AppSpec language version (e.g. "1.0").
    pub appspec_version: String,
    /// All constructs in the document.
    pub constructs: Vec<Construct>,
}

/// A single construct, dispatched by its `kind` field.
#[derive(Debug, Clone)]
pub enum Construct {
    Entity(EntityConstruct),
    Surface(SurfaceConstruct),
    Workspace(WorkspaceConstruct),
    Service(ServiceConstruct),
    ForeignModel(ForeignModelConstruct),
    Integration(IntegrationConstruct),
}

impl Construct {
    pub fn name(&self) -> &str {
        match self {
            Construct::Entity(c) => &c.name,
            Construct::Surface(c) => &c.name,
            Construct::Workspace(c) => &c.name,
            Construct::Service(c) => &c.name,
            Construct::ForeignModel(c) => &c.name,
            Construct::Integration(c) => &c.name,
        }
    }
}

// ── Entity ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EntityConstruct {
    pub name: String,
    pub label: Option<String>,
    pub module: String,
    /// Archetype fields already flattened in by the compiler.
    pub fields: Vec<FieldSpec>,
    pub intent: Option<String>,
    pub domain: Option<String>,
    pub patterns: Vec<String>,
    /// Expression trees, kept as raw JSON.
    pub invariants: Vec<Value>,
    pub state_machine: Option<StateMachineSpec>,
    pub read_rule: Option<Value>,
    pub write_rule: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    /// Type descriptor, e.g. `{"name": "str", "max_length": 80}`.
    pub ty: Value,
    pub required: bool,
    pub unique: bool,
    pub pk: bool,
    pub default: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct StateMachineSpec {
    pub field: String,
    pub states: Vec<String>,
    pub transitions: Vec<TransitionSpec>,
}

#[derive(Debug, Clone)]
pub struct TransitionSpec {
    pub from: String,
    pub to: String,
    pub requires: Option<String>,
}

// ── Surface ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SurfaceConstruct {
    pub name: String,
    pub label: Option<String>,
    /// "list", "view", "create", or "edit".
    pub mode: String,
    /// Name of the bound entity.
    pub entity: String,
    pub sections: Vec<SectionSpec>,
    /// The `ux` block as raw JSON; absent when the surface has none.
    pub ux: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct SectionSpec {
    pub name: String,
    pub label: Option<String>,
    pub fields: Vec<String>,
}

// ── Workspace ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct WorkspaceConstruct {
    pub name: String,
    pub purpose: Option<String>,
    pub stage: Option<String>,
    pub blocks: Vec<BlockSpec>,
}

#[derive(Debug, Clone)]
pub struct BlockSpec {
    pub name: String,
    /// Name of the entity or foreign model this block draws from.
    pub source: String,
    /// "entity" or "foreign".
    pub source_kind: String,
    pub filter: Option<Value>,
    pub sort: Option<SortSpec>,
    pub limit: Option<u32>,
    pub display: Vec<String>,
    /// Name of the surface opened on row activation.
    pub action: Option<String>,
    pub aggregates: Vec<AggregateSpec>,
    pub group_by: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SortSpec {
    pub field: String,
    pub descending: bool,
}

#[derive(Debug, Clone)]
pub struct AggregateSpec {
    pub func: String,
    pub field: Option<String>,
}

// ── Service ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ServiceConstruct {
    pub name: String,
    pub operations: Vec<OperationSpec>,
}

#[derive(Debug, Clone)]
pub struct OperationSpec {
    pub name: String,
    /// (parameter name, type descriptor) pairs in declaration order.
    pub params: Vec<(String, Value)>,
    pub returns: Option<Value>,
}

// ── Foreign model ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ForeignModelConstruct {
    pub name: String,
    pub system: String,
    pub fields: Vec<FieldSpec>,
}

// ── Integration ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct IntegrationConstruct {
    pub name: String,
    /// Name of the service being integrated.
    pub service: String,
    pub direction: Option<String>,
    pub trigger: Option<String>,
}
