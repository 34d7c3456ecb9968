//! appspec-interchange: interchange JSON types, serialization, and
//! deserialization for AppSpec.
//!
//! Provides typed structs for every interchange construct kind (Entity,
//! Surface, Workspace, Service, ForeignModel, Integration), a
//! `to_interchange()` entry point that serializes a compiled
//! [`appspec_core::ir::AppSpec`] into a JSON document, and a
//! `from_interchange()` entry point that deserializes such a document back
//! into typed structs. Consumers that generate code or drive runtimes
//! depend on this crate instead of re-reading raw JSON.

pub mod deserialize;
pub mod serialize;
pub mod types;

pub use deserialize::{from_interchange, InterchangeError};
pub use serialize::{to_interchange, INTERCHANGE_VERSION};
pub use types::*;
