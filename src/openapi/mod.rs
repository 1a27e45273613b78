//! Loading Kubernetes OpenAPI v2/v3 documents into a [`SchemaRegistry`].
//!
//! [`SchemaRegistry`]: crate::schema::SchemaRegistry

mod converter;
mod schema;

pub use converter::*;
pub use schema::*;
