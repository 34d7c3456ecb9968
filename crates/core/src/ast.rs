//! Per-file AST produced by the parser.
//!
//! All declarations carry provenance (file, line, column of the opening
//! keyword). No reference resolution or semantic checking happens here --
//! that is the linker's and validator's job.

pub use crate::source::Provenance;

// ──────────────────────────────────────────────
// Top-level declarations
// ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Decl {
    Module {
        name: String,
        prov: Provenance,
    },
    Use {
        module: String,
        prov: Provenance,
    },
    App {
        name: String,
        label: Option<String>,
        prov: Provenance,
    },
    Archetype(ArchetypeDecl),
    Entity(EntityDecl),
    Surface(SurfaceDecl),
    Workspace(WorkspaceDecl),
    Service(ServiceDecl),
    ForeignModel(ForeignModelDecl),
    Integration(IntegrationDecl),
}

impl Decl {
    pub fn prov(&self) -> &Provenance {
        match self {
            Decl::Module { prov, .. } | Decl::Use { prov, .. } | Decl::App { prov, .. } => prov,
            Decl::Archetype(d) => &d.prov,
            Decl::Entity(d) => &d.prov,
            Decl::Surface(d) => &d.prov,
            Decl::Workspace(d) => &d.prov,
            Decl::Service(d) => &d.prov,
            Decl::ForeignModel(d) => &d.prov,
            Decl::Integration(d) => &d.prov,
        }
    }
}

/// A reusable bundle of fields an entity can pull in with `uses`.
#[derive(Debug, Clone)]
pub struct ArchetypeDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
    pub prov: Provenance,
}

#[derive(Debug, Clone)]
pub struct EntityDecl {
    pub name: String,
    pub label: Option<String>,
    pub fields: Vec<FieldDecl>,
    /// `uses <archetype>` lines: (archetype name, line)
    pub archetypes_used: Vec<(String, u32)>,
    pub intent: Option<String>,
    pub domain: Option<String>,
    pub patterns: Vec<String>,
    /// `invariant <expr>` lines
    pub invariants: Vec<(Expr, u32)>,
    /// Explicit `transitions on <field>:` binding, when present
    pub transitions_on: Option<(String, u32)>,
    pub transitions: Vec<Transition>,
    pub access: AccessRules,
    pub indices: Vec<IndexDecl>,
    pub prov: Provenance,
}

#[derive(Debug, Clone, Default)]
pub struct AccessRules {
    pub read: Option<(Expr, u32)>,
    pub write: Option<(Expr, u32)>,
}

#[derive(Debug, Clone)]
pub struct IndexDecl {
    pub fields: Vec<String>,
    pub unique: bool,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub from: String,
    pub to: String,
    /// `requires <field>` guard
    pub requires: Option<String>,
    pub line: u32,
}

// ──────────────────────────────────────────────
// Fields
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Uuid,
    /// `str` or `str(max_length)`
    Str { length: Option<u32> },
    Text,
    Int,
    /// `decimal` or `decimal(precision, scale)`
    Decimal { precision: Option<(u32, u32)> },
    Bool,
    Date,
    DateTime,
    Email,
    Money,
    Enum { values: Vec<String> },
    /// `ref <EntityName>`
    Ref { entity: String },
}

impl FieldType {
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Uuid => "uuid",
            FieldType::Str { .. } => "str",
            FieldType::Text => "text",
            FieldType::Int => "int",
            FieldType::Decimal { .. } => "decimal",
            FieldType::Bool => "bool",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
            FieldType::Email => "email",
            FieldType::Money => "money",
            FieldType::Enum { .. } => "enum",
            FieldType::Ref { .. } => "ref",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldConstraint {
    Required,
    Unique,
    Pk,
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub ty: FieldType,
    pub constraints: Vec<FieldConstraint>,
    pub default: Option<Literal>,
    pub line: u32,
}

impl FieldDecl {
    pub fn has_constraint(&self, c: FieldConstraint) -> bool {
        self.constraints.contains(&c)
    }
}

// ──────────────────────────────────────────────
// Surfaces
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceMode {
    List,
    View,
    Create,
    Edit,
}

impl SurfaceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurfaceMode::List => "list",
            SurfaceMode::View => "view",
            SurfaceMode::Create => "create",
            SurfaceMode::Edit => "edit",
        }
    }

    pub fn from_str(s: &str) -> Option<SurfaceMode> {
        match s {
            "list" => Some(SurfaceMode::List),
            "view" => Some(SurfaceMode::View),
            "create" => Some(SurfaceMode::Create),
            "edit" => Some(SurfaceMode::Edit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SurfaceDecl {
    pub name: String,
    pub label: Option<String>,
    pub mode: SurfaceMode,
    pub entity: String,
    pub entity_line: u32,
    pub sections: Vec<Section>,
    pub ux: Option<UxBlock>,
    pub prov: Provenance,
}

#[derive(Debug, Clone)]
pub struct Section {
    pub name: String,
    pub label: Option<String>,
    /// `field <name>` lines: (field name, line)
    pub fields: Vec<(String, u32)>,
    pub line: u32,
}

#[derive(Debug, Clone, Default)]
pub struct UxBlock {
    pub personas: Vec<String>,
    /// Fields to visually emphasize
    pub attention: Vec<(String, u32)>,
    pub sort: Option<SortKey>,
    pub filter: Option<(Expr, u32)>,
    pub search: Vec<(String, u32)>,
    pub empty: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
    pub line: u32,
}

// ──────────────────────────────────────────────
// Workspaces
// ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct WorkspaceDecl {
    pub name: String,
    pub purpose: Option<String>,
    pub stage: Option<String>,
    pub blocks: Vec<BlockDecl>,
    pub prov: Provenance,
}

/// One data block of a workspace dashboard.
#[derive(Debug, Clone)]
pub struct BlockDecl {
    pub name: String,
    pub source: String,
    pub source_line: u32,
    pub filter: Option<(Expr, u32)>,
    pub sort: Option<SortKey>,
    pub limit: Option<u32>,
    /// Fields shown per row: (field name, line)
    pub display: Vec<(String, u32)>,
    /// Surface opened when a row is activated
    pub action: Option<(String, u32)>,
    pub aggregates: Vec<Aggregate>,
    pub group_by: Option<(String, u32)>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    /// `count`, `avg`, ...
    pub func: String,
    /// `count` takes no field; `avg(field)` names one
    pub field: Option<String>,
    pub line: u32,
}

// ──────────────────────────────────────────────
// Services and integrations
// ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ServiceDecl {
    pub name: String,
    pub operations: Vec<ServiceOp>,
    pub prov: Provenance,
}

#[derive(Debug, Clone)]
pub struct ServiceOp {
    pub name: String,
    pub params: Vec<(String, FieldType)>,
    pub returns: Option<FieldType>,
    pub line: u32,
}

/// A model owned by an external system, usable as a workspace source and a
/// `ref` target but never validated for state machines or access rules.
#[derive(Debug, Clone)]
pub struct ForeignModelDecl {
    pub name: String,
    pub system: String,
    pub fields: Vec<FieldDecl>,
    pub prov: Provenance,
}

#[derive(Debug, Clone)]
pub struct IntegrationDecl {
    pub name: String,
    pub service: String,
    pub service_line: u32,
    pub direction: Option<String>,
    pub trigger: Option<String>,
    pub prov: Provenance,
}

// ──────────────────────────────────────────────
// Expressions
// ──────────────────────────────────────────────

/// Predicate expressions used by invariants, access rules, and workspace /
/// surface filters. Deliberately small: comparisons, membership, null tests,
/// and `and`/`or`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare {
        op: CmpOp,
        left: Term,
        right: Term,
        line: u32,
    },
    /// `term in [a, b, c]` -- list items are symbolic constants, not field refs
    In {
        term: Term,
        values: Vec<Literal>,
        line: u32,
    },
    /// `term is null` / `term is not null`
    IsNull {
        term: Term,
        negated: bool,
        line: u32,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    /// A bare term in boolean position (e.g. a bool field or builtin call)
    Term(Term, u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CmpOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Neq => "!=",
            CmpOp::Lt => "<",
            CmpOp::Lte => "<=",
            CmpOp::Gt => ">",
            CmpOp::Gte => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// Bare identifier -- resolved against the scoped entity's fields or the
    /// builtin table during validation
    Field(String),
    Literal(Literal),
    /// Builtin invocation: `role(admin)`, `days_since(created_at)`, `count`
    Call {
        func: String,
        args: Vec<Term>,
        line: u32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Float(String),
    Bool(bool),
    Null,
}
