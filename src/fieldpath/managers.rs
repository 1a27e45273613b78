//! Managed-fields records.

use super::serialize::DecodeError;
use super::set::Set;
use super::APIVersion;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const FIELDS_V1: &str = "FieldsV1";

/// The kind of write that produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Operation {
    Apply,
    Update,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Apply => f.write_str("Apply"),
            Operation::Update => f.write_str("Update"),
        }
    }
}

/// Identifies a record: the same manager may hold one record per operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ManagerId {
    pub manager: String,
    pub operation: Operation,
}

impl ManagerId {
    pub fn new(manager: impl Into<String>, operation: Operation) -> Self {
        ManagerId {
            manager: manager.into(),
            operation,
        }
    }

    pub fn apply(manager: impl Into<String>) -> Self {
        ManagerId::new(manager, Operation::Apply)
    }

    pub fn update(manager: impl Into<String>) -> Self {
        ManagerId::new(manager, Operation::Update)
    }
}

impl fmt::Display for ManagerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.manager, self.operation)
    }
}

/// A manager's field set plus the version and time of its last change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedSet {
    pub set: Set,
    pub api_version: APIVersion,
    pub time: Option<DateTime<Utc>>,
    pub subresource: Option<String>,
}

impl VersionedSet {
    pub fn new(set: Set, api_version: APIVersion) -> Self {
        VersionedSet {
            set,
            api_version,
            time: None,
            subresource: None,
        }
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }
}

/// One element of an object's `metadata.managedFields` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedFieldsEntry {
    pub manager: String,
    pub operation: Operation,
    #[serde(default)]
    pub api_version: APIVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    #[serde(default = "default_fields_type")]
    pub fields_type: String,
    #[serde(rename = "fieldsV1", default)]
    pub fields_v1: Set,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subresource: Option<String>,
}

fn default_fields_type() -> String {
    FIELDS_V1.to_string()
}

/// Every manager's ownership of one object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagedFields {
    managers: BTreeMap<ManagerId, VersionedSet>,
}

impl ManagedFields {
    pub fn new() -> Self {
        ManagedFields::default()
    }

    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }

    pub fn get(&self, id: &ManagerId) -> Option<&VersionedSet> {
        self.managers.get(id)
    }

    pub fn insert(&mut self, id: ManagerId, vs: VersionedSet) -> Option<VersionedSet> {
        self.managers.insert(id, vs)
    }

    pub fn remove(&mut self, id: &ManagerId) -> Option<VersionedSet> {
        self.managers.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ManagerId, &VersionedSet)> {
        self.managers.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&ManagerId, &mut VersionedSet)> {
        self.managers.iter_mut()
    }

    /// Union of every set except the one recorded under `id`.
    pub fn owned_by_others(&self, id: &ManagerId) -> Set {
        self.managers
            .iter()
            .filter(|(other, _)| *other != id)
            .fold(Set::new(), |acc, (_, vs)| acc.union(&vs.set))
    }

    /// Union of every manager's set.
    pub fn owned(&self) -> Set {
        self.managers
            .values()
            .fold(Set::new(), |acc, vs| acc.union(&vs.set))
    }

    /// Managers whose set contains the path, in record order.
    pub fn owners_of(&self, path: &super::Path) -> Vec<&ManagerId> {
        self.managers
            .iter()
            .filter(|(_, vs)| vs.set.has(path))
            .map(|(id, _)| id)
            .collect()
    }

    /// Drops records that no longer own anything.
    pub fn remove_empty(&mut self) {
        self.managers.retain(|_, vs| !vs.set.is_empty());
    }

    pub fn from_entries(entries: Vec<ManagedFieldsEntry>) -> Result<Self, DecodeError> {
        let mut out = ManagedFields::new();
        for entry in entries {
            if entry.fields_type != FIELDS_V1 {
                return Err(DecodeError::UnsupportedFieldsType(entry.fields_type));
            }
            let id = ManagerId::new(entry.manager, entry.operation);
            if out.managers.contains_key(&id) {
                return Err(DecodeError::DuplicateManager {
                    manager: id.manager,
                    operation: id.operation.to_string(),
                });
            }
            out.managers.insert(
                id,
                VersionedSet {
                    set: entry.fields_v1,
                    api_version: entry.api_version,
                    time: entry.time,
                    subresource: entry.subresource,
                },
            );
        }
        Ok(out)
    }

    /// Decodes a JSON `managedFields` list.
    pub fn from_json(data: &[u8]) -> Result<Self, DecodeError> {
        let entries: Vec<ManagedFieldsEntry> = serde_json::from_slice(data)?;
        ManagedFields::from_entries(entries)
    }

    pub fn to_entries(&self) -> Vec<ManagedFieldsEntry> {
        self.managers
            .iter()
            .map(|(id, vs)| ManagedFieldsEntry {
                manager: id.manager.clone(),
                operation: id.operation,
                api_version: vs.api_version.clone(),
                time: vs.time,
                fields_type: default_fields_type(),
                fields_v1: vs.set.clone(),
                subresource: vs.subresource.clone(),
            })
            .collect()
    }
}

impl fmt::Display for ManagedFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, vs) in &self.managers {
            writeln!(f, "{} {}:", id, vs.api_version)?;
            for path in vs.set.paths() {
                writeln!(f, "  {}", path)?;
            }
        }
        Ok(())
    }
}
