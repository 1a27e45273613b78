//! # fieldmanager
//!
//! Type-aware merging of Kubernetes-style objects with per-manager field
//! ownership ("server-side apply").
//!
//! Given a schema and the managed-fields records of a live object, the
//! [`merge::Updater`] computes the object that results from an apply or an
//! update and the ownership records that go with it.
//!
//! ## Modules
//!
//! - [`value`] - In-memory representation of YAML/JSON objects
//! - [`schema`] - Type schemas, their YAML document format and the kind registry
//! - [`openapi`] - Loading schemas from Swagger 2.0 and OpenAPI 3 documents
//! - [`fieldpath`] - Paths, field sets, the `FieldsV1` encoding and managed-fields records
//! - [`typed`] - Operations on values with a type (validation, extraction, merging, comparison)
//! - [`merge`] - Apply and update across multiple managers

pub mod fieldpath;
pub mod merge;
pub mod openapi;
pub mod schema;
pub mod typed;
pub mod value;

#[cfg(test)]
mod testing;

pub use fieldpath::{APIVersion, ManagedFields, ManagerId, Operation, Path, PathElement, Set};
pub use merge::{ApplyError, MergeResult, Request, Updater, UpdaterBuilder};
pub use schema::{GroupVersionKind, Schema, SchemaRegistry};
pub use typed::{Comparison, MergeError, ParseableType, TypedValue};
pub use value::Value;
