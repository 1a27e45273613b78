//! The `FieldsV1` encoding of field sets.
//!
//! A set is a JSON object. Each key names one path element by a two
//! character marker followed by its payload:
//!
//! | marker | element                         | example                          |
//! |--------|---------------------------------|----------------------------------|
//! | `f:`   | field name                      | `f:metadata`                     |
//! | `k:`   | associative key (JSON object)   | `k:{"port":80,"protocol":"TCP"}` |
//! | `v:`   | set element (any JSON value)    | `v:"finalizer.example.com"`      |
//! | `i:`   | list index                      | `i:0`                            |
//!
//! Every value is itself an object holding the paths below that element.
//! An empty object is a leaf member. A non-empty object containing the
//! key `"."` is a member that also has children; without `"."` the node
//! only exists to reach deeper members. A `"."` at the top level marks
//! the root path.

use super::path::PathElement;
use super::set::Set;
use crate::value::{Field, FieldList, Value};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map as JsonMap, Value as Json};
use thiserror::Error;

/// Errors decoding field sets and managed-fields records.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected an object at {at}, found {found}")]
    NotAnObject { at: String, found: &'static str },

    #[error("unknown path segment marker in {key:?}")]
    UnknownMarker { key: String },

    #[error("invalid path segment {key:?}: {reason}")]
    InvalidSegment { key: String, reason: String },

    #[error("unsupported fieldsType {0:?} (only FieldsV1 is supported)")]
    UnsupportedFieldsType(String),

    #[error("duplicate managed fields entry for manager {manager:?} with operation {operation}")]
    DuplicateManager { manager: String, operation: String },
}

/// Renders a path element as a `FieldsV1` object key.
pub fn serialize_path_element(pe: &PathElement) -> String {
    match pe {
        PathElement::FieldName(name) => format!("f:{}", name),
        PathElement::Key(fields) => {
            let obj: JsonMap<String, Json> = fields
                .iter()
                .map(|f| (f.name.clone(), Json::from(&f.value)))
                .collect();
            format!("k:{}", Json::Object(obj))
        }
        PathElement::Value(v) => format!("v:{}", v),
        PathElement::Index(i) => format!("i:{}", i),
    }
}

/// Parses a `FieldsV1` object key back into a path element.
pub fn deserialize_path_element(key: &str) -> Result<PathElement, DecodeError> {
    let invalid = |reason: String| DecodeError::InvalidSegment {
        key: key.to_string(),
        reason,
    };
    let (marker, payload) = match (key.get(..2), key.get(2..)) {
        (Some(marker), Some(payload)) => (marker, payload),
        _ => {
            return Err(DecodeError::UnknownMarker {
                key: key.to_string(),
            })
        }
    };
    match marker {
        "f:" => Ok(PathElement::FieldName(payload.to_string())),
        "k:" => match serde_json::from_str::<Json>(payload) {
            Ok(Json::Object(obj)) => Ok(PathElement::Key(FieldList::with_fields(
                obj.into_iter()
                    .map(|(name, v)| Field::new(name, Value::from(v)))
                    .collect(),
            ))),
            Ok(other) => Err(invalid(format!(
                "key must be a JSON object, found {}",
                json_kind(&other)
            ))),
            Err(e) => Err(invalid(e.to_string())),
        },
        "v:" => serde_json::from_str::<Json>(payload)
            .map(|v| PathElement::Value(Value::from(v)))
            .map_err(|e| invalid(e.to_string())),
        "i:" => payload
            .parse::<usize>()
            .map(PathElement::Index)
            .map_err(|e| invalid(e.to_string())),
        _ => Err(DecodeError::UnknownMarker {
            key: key.to_string(),
        }),
    }
}

fn json_kind(v: &Json) -> &'static str {
    match v {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

impl Set {
    /// Encodes the set as `FieldsV1` JSON.
    pub fn to_json(&self) -> Vec<u8> {
        self.to_json_value().to_string().into_bytes()
    }

    /// Decodes a set from `FieldsV1` JSON.
    pub fn from_json(data: &[u8]) -> Result<Set, DecodeError> {
        let json: Json = serde_json::from_slice(data)?;
        Set::from_json_value(&json)
    }

    pub fn to_json_value(&self) -> Json {
        Json::Object(self.encode_node(self.root_in_set()))
    }

    pub fn from_json_value(json: &Json) -> Result<Set, DecodeError> {
        let (mut set, root) = decode_node(json, "<root>")?;
        set.set_root(root);
        Ok(set)
    }

    fn encode_node(&self, is_member: bool) -> JsonMap<String, Json> {
        let mut obj = JsonMap::new();
        if is_member {
            obj.insert(".".to_string(), Json::Object(JsonMap::new()));
        }
        for member in self.members().iter() {
            if self.child(member).is_none() {
                obj.insert(serialize_path_element(member), Json::Object(JsonMap::new()));
            }
        }
        for (pe, child) in self.children() {
            let node = child.encode_node(self.has_member(pe));
            obj.insert(serialize_path_element(pe), Json::Object(node));
        }
        obj
    }
}

/// Decodes one tree node, returning the subtree and whether the node
/// itself carried the `"."` member marker.
fn decode_node(json: &Json, at: &str) -> Result<(Set, bool), DecodeError> {
    let obj = json.as_object().ok_or_else(|| DecodeError::NotAnObject {
        at: at.to_string(),
        found: json_kind(json),
    })?;
    let mut set = Set::new();
    let mut is_member = false;
    for (key, child) in obj {
        if key == "." {
            if !child.is_object() {
                return Err(DecodeError::NotAnObject {
                    at: format!("{}/.", at),
                    found: json_kind(child),
                });
            }
            is_member = true;
            continue;
        }
        let pe = deserialize_path_element(key)?;
        let (subtree, child_is_member) = decode_node(child, key)?;
        if subtree.is_empty() || child_is_member {
            set.insert_member(pe.clone());
        }
        set.insert_child(pe, subtree);
    }
    Ok((set, is_member))
}

impl Serialize for Set {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Set {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = Json::deserialize(deserializer)?;
        Set::from_json_value(&json).map_err(serde::de::Error::custom)
    }
}
