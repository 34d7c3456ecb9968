//! The AppSpec IR: the validated, fully reference-resolved product.
//!
//! Cross-references are indices into the owning [`AppSpec`] vectors rather
//! than name strings, so consumers never perform a lookup that can fail.
//! The IR is built once, after validation reports zero errors, and is never
//! mutated afterwards.

use crate::ast::{
    AccessRules, Aggregate, Expr, FieldDecl, FieldType, IndexDecl, SortKey, SurfaceMode,
    Transition,
};

#[derive(Debug, Clone)]
pub struct AppSpec {
    pub app: Option<AppMeta>,
    pub entities: Vec<EntityIr>,
    pub surfaces: Vec<SurfaceIr>,
    pub workspaces: Vec<WorkspaceIr>,
    pub services: Vec<ServiceIr>,
    pub foreign_models: Vec<ForeignModelIr>,
    pub integrations: Vec<IntegrationIr>,
}

#[derive(Debug, Clone)]
pub struct AppMeta {
    pub name: String,
    pub label: Option<String>,
}

/// Index into [`AppSpec::entities`].
pub type EntityId = usize;
/// Index into [`AppSpec::surfaces`].
pub type SurfaceId = usize;
/// Index into [`AppSpec::services`].
pub type ServiceId = usize;
/// Index into [`AppSpec::foreign_models`].
pub type ForeignModelId = usize;

/// A workspace block's data source: entity or foreign model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRef {
    Entity(EntityId),
    Foreign(ForeignModelId),
}

#[derive(Debug, Clone)]
pub struct EntityIr {
    pub name: String,
    pub label: Option<String>,
    pub module: String,
    /// Archetype fields flattened in, collision-free by construction.
    pub fields: Vec<FieldDecl>,
    pub intent: Option<String>,
    pub domain: Option<String>,
    pub patterns: Vec<String>,
    pub invariants: Vec<Expr>,
    pub state_machine: Option<StateMachine>,
    pub access: AccessRules,
    pub indices: Vec<IndexDecl>,
}

impl EntityIr {
    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A validated state machine: the governing enum field plus transitions
/// whose endpoints are all members of that field's value set.
#[derive(Debug, Clone)]
pub struct StateMachine {
    pub field: String,
    pub states: Vec<String>,
    pub transitions: Vec<Transition>,
}

#[derive(Debug, Clone)]
pub struct SurfaceIr {
    pub name: String,
    pub label: Option<String>,
    pub mode: SurfaceMode,
    pub entity: EntityId,
    pub sections: Vec<SectionIr>,
    pub ux: Option<UxIr>,
}

#[derive(Debug, Clone)]
pub struct SectionIr {
    pub name: String,
    pub label: Option<String>,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct UxIr {
    pub personas: Vec<String>,
    pub attention: Vec<String>,
    pub sort: Option<SortKey>,
    pub filter: Option<Expr>,
    pub search: Vec<String>,
    pub empty: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WorkspaceIr {
    pub name: String,
    pub purpose: Option<String>,
    pub stage: Option<String>,
    pub blocks: Vec<BlockIr>,
}

#[derive(Debug, Clone)]
pub struct BlockIr {
    pub name: String,
    pub source: SourceRef,
    pub filter: Option<Expr>,
    pub sort: Option<SortKey>,
    pub limit: Option<u32>,
    pub display: Vec<String>,
    pub action: Option<SurfaceId>,
    pub aggregates: Vec<Aggregate>,
    pub group_by: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServiceIr {
    pub name: String,
    pub operations: Vec<ServiceOpIr>,
}

#[derive(Debug, Clone)]
pub struct ServiceOpIr {
    pub name: String,
    pub params: Vec<(String, FieldType)>,
    pub returns: Option<FieldType>,
}

#[derive(Debug, Clone)]
pub struct ForeignModelIr {
    pub name: String,
    pub system: String,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone)]
pub struct IntegrationIr {
    pub name: String,
    pub service: ServiceId,
    pub direction: Option<String>,
    pub trigger: Option<String>,
}
