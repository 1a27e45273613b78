//! Resolving type names and group/version/kind triples to parseable types.

use super::elements::{Schema, SchemaError, TypeRef};
use crate::typed::ParseableType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

/// Identifies a kind of object, e.g. `apps/v1, Kind=Deployment`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupVersionKind {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        GroupVersionKind {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// The `apiVersion` string: `version` for the core group, else
    /// `group/version`.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Kind={}", self.api_version(), self.kind)
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("invalid group/version/kind {0:?}: expected group/version/Kind or version/Kind")]
pub struct ParseGvkError(String);

impl FromStr for GroupVersionKind {
    type Err = ParseGvkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [version, kind] if !version.is_empty() && !kind.is_empty() => {
                Ok(GroupVersionKind::new("", *version, *kind))
            }
            [group, version, kind] if !version.is_empty() && !kind.is_empty() => {
                Ok(GroupVersionKind::new(*group, *version, *kind))
            }
            _ => Err(ParseGvkError(s.to_string())),
        }
    }
}

/// A kind that was mapped to two different types. The later mapping won.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateKind {
    pub gvk: GroupVersionKind,
    pub previous: String,
    pub replacement: String,
}

/// An immutable schema plus the kinds that map onto its types.
#[derive(Debug)]
pub struct SchemaRegistry {
    schema: Schema,
    kinds: HashMap<GroupVersionKind, String>,
    duplicates: Vec<DuplicateKind>,
}

/// Collects kind mappings before freezing them into a [`SchemaRegistry`].
#[derive(Debug)]
pub struct SchemaRegistryBuilder {
    schema: Schema,
    kinds: Vec<(GroupVersionKind, String)>,
}

impl SchemaRegistryBuilder {
    pub fn kind(mut self, gvk: GroupVersionKind, type_name: impl Into<String>) -> Self {
        self.kinds.push((gvk, type_name.into()));
        self
    }

    pub fn kinds(mut self, kinds: impl IntoIterator<Item = (GroupVersionKind, String)>) -> Self {
        self.kinds.extend(kinds);
        self
    }

    /// Fails if a kind maps to a type the schema does not define. A kind
    /// mapped twice to different types is logged and the later mapping wins.
    pub fn build(self) -> Result<SchemaRegistry, SchemaError> {
        let mut kinds: HashMap<GroupVersionKind, String> = HashMap::new();
        let mut duplicates = Vec::new();
        for (gvk, type_name) in self.kinds {
            if self.schema.find_named_type(&type_name).is_none() {
                return Err(SchemaError::UnknownKindType {
                    gvk: gvk.to_string(),
                    type_name,
                });
            }
            match kinds.get(&gvk) {
                Some(previous) if *previous != type_name => {
                    warn!(
                        gvk = %gvk,
                        previous = %previous,
                        replacement = %type_name,
                        "duplicate GVK entry in schema"
                    );
                    duplicates.push(DuplicateKind {
                        gvk: gvk.clone(),
                        previous: previous.clone(),
                        replacement: type_name.clone(),
                    });
                }
                _ => {}
            }
            kinds.insert(gvk, type_name);
        }
        debug!(
            types = self.schema.type_names().len(),
            kinds = kinds.len(),
            "built schema registry"
        );
        Ok(SchemaRegistry {
            schema: self.schema,
            kinds,
            duplicates,
        })
    }
}

impl SchemaRegistry {
    pub fn builder(schema: Schema) -> SchemaRegistryBuilder {
        SchemaRegistryBuilder {
            schema,
            kinds: Vec::new(),
        }
    }

    /// A registry without kind mappings.
    pub fn new(schema: Schema) -> Self {
        SchemaRegistry {
            schema,
            kinds: HashMap::new(),
            duplicates: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// A reference to the named type, or `None` if the schema lacks it.
    pub fn resolve(&self, type_name: &str) -> Option<TypeRef> {
        self.schema
            .find_named_type(type_name)
            .map(|_| TypeRef::named(type_name))
    }

    pub fn parseable_type(&self, type_name: &str) -> Option<ParseableType<'_>> {
        self.resolve(type_name)
            .map(|tr| ParseableType::new(&self.schema, tr))
    }

    pub fn type_name_for(&self, gvk: &GroupVersionKind) -> Option<&str> {
        self.kinds.get(gvk).map(String::as_str)
    }

    pub fn parseable_type_for(&self, gvk: &GroupVersionKind) -> Option<ParseableType<'_>> {
        let type_name = self.type_name_for(gvk)?;
        debug!(gvk = %gvk, type_name, "resolved kind");
        self.parseable_type(type_name)
    }

    /// Every kind mapping, sorted by kind.
    pub fn kinds(&self) -> Vec<(&GroupVersionKind, &str)> {
        let mut kinds: Vec<_> = self
            .kinds
            .iter()
            .map(|(gvk, name)| (gvk, name.as_str()))
            .collect();
        kinds.sort();
        kinds
    }

    pub fn duplicate_kinds(&self) -> &[DuplicateKind] {
        &self.duplicates
    }
}
