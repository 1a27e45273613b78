//! Field paths, field sets and the records of who owns them.
//!
//! A [`Set`] names the fields a manager owns. It is persisted next to the
//! object in the `FieldsV1` format (see [`Set::to_json`] and
//! [`Set::from_json`]) inside a [`ManagedFieldsEntry`].

mod managers;
mod path;
mod serialize;
mod set;

pub use managers::*;
pub use path::*;
pub use serialize::*;
pub use set::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// The API version an object had when a manager wrote it, e.g. `apps/v1`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct APIVersion(String);

impl APIVersion {
    pub fn new(version: impl Into<String>) -> Self {
        APIVersion(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for APIVersion {
    fn from(s: &str) -> Self {
        APIVersion(s.to_string())
    }
}

impl fmt::Display for APIVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
