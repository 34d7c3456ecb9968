//! appspec-core: the AppSpec language front end.
//!
//! Turns `.spec` source files into a validated [`AppSpec`] IR. The pipeline
//! is a fixed sequence of stages, each of which collects diagnostics and
//! keeps going:
//!
//!   1. [`expand`]  -- `@use` vocabulary expansion with a source map
//!   2. [`lexer`]   -- indentation-sensitive tokenization
//!   3. [`parser`]  -- recursive descent with per-declaration resync
//!   4. [`link`]    -- module graph and symbol-table merge
//!   5. [`validate`]-- reference, entity, expression, and surface checks
//!
//! [`compile`] runs the whole pipeline; the stages stay public so tooling
//! (formatters, language servers) can stop wherever it needs to.

pub mod ast;
pub mod compile;
pub mod error;
pub mod expand;
pub mod ir;
pub mod lexer;
pub mod link;
pub mod parser;
pub mod source;
pub mod validate;
pub mod vocab;

pub use compile::{compile, CompileMode, CompileResult};
pub use error::{Diagnostic, DiagnosticCode, Severity};
pub use ir::AppSpec;
pub use vocab::VocabManifest;

/// Version of the language accepted by this front end.
pub const LANGUAGE_VERSION: &str = "1.0";
