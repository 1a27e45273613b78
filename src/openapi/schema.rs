//! OpenAPI document types for both v2 (Swagger) and v3.
//!
//! Only the parts that shape merge behaviour are modelled: definitions,
//! their structure, and the `x-kubernetes-*` extensions.

use crate::schema::GroupVersionKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// OpenAPI v2 (Swagger) document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenAPIv2 {
    #[serde(default)]
    pub swagger: String,

    #[serde(default)]
    pub info: Info,

    #[serde(default)]
    pub definitions: BTreeMap<String, SchemaObject>,
}

/// OpenAPI v3 document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenAPIv3 {
    #[serde(default)]
    pub openapi: String,

    #[serde(default)]
    pub info: Info,

    #[serde(default)]
    pub components: Components,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Info {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub version: String,
}

/// OpenAPI v3 components section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Components {
    #[serde(default)]
    pub schemas: BTreeMap<String, SchemaObject>,
}

/// A schema definition. Swagger 2.0 and OpenAPI 3 agree on every field
/// used here; the composition keywords only appear in v3 documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaObject {
    /// string, integer, number, boolean, array or object.
    #[serde(rename = "type", default)]
    pub schema_type: Option<String>,

    #[serde(default)]
    pub format: Option<String>,

    #[serde(rename = "$ref", default)]
    pub ref_path: Option<String>,

    #[serde(default)]
    pub properties: BTreeMap<String, SchemaObject>,

    #[serde(default)]
    pub additional_properties: Option<Box<AdditionalProperties>>,

    #[serde(default)]
    pub items: Option<Box<SchemaObject>>,

    #[serde(default)]
    pub default: Option<serde_json::Value>,

    #[serde(default)]
    pub all_of: Vec<SchemaObject>,

    #[serde(default)]
    pub any_of: Vec<SchemaObject>,

    #[serde(default)]
    pub one_of: Vec<SchemaObject>,

    #[serde(rename = "x-kubernetes-group-version-kind", default)]
    pub x_kubernetes_group_version_kind: Vec<GroupVersionKind>,

    /// atomic, set or map.
    #[serde(rename = "x-kubernetes-list-type", default)]
    pub x_kubernetes_list_type: Option<String>,

    #[serde(rename = "x-kubernetes-list-map-keys", default)]
    pub x_kubernetes_list_map_keys: Option<Vec<String>>,

    /// atomic or granular.
    #[serde(rename = "x-kubernetes-map-type", default)]
    pub x_kubernetes_map_type: Option<String>,

    #[serde(rename = "x-kubernetes-patch-strategy", default)]
    pub x_kubernetes_patch_strategy: Option<String>,

    #[serde(rename = "x-kubernetes-patch-merge-key", default)]
    pub x_kubernetes_patch_merge_key: Option<String>,

    #[serde(rename = "x-kubernetes-preserve-unknown-fields", default)]
    pub x_kubernetes_preserve_unknown_fields: Option<bool>,

    #[serde(rename = "x-kubernetes-embedded-resource", default)]
    pub x_kubernetes_embedded_resource: Option<bool>,

    #[serde(rename = "x-kubernetes-int-or-string", default)]
    pub x_kubernetes_int_or_string: Option<bool>,
}

impl SchemaObject {
    pub fn is_int_or_string(&self) -> bool {
        self.x_kubernetes_int_or_string == Some(true)
            || self.format.as_deref() == Some("int-or-string")
    }

    pub fn preserves_unknown_fields(&self) -> bool {
        self.x_kubernetes_preserve_unknown_fields == Some(true)
            || self.x_kubernetes_embedded_resource == Some(true)
    }

    /// True when nothing but a reference (and annotations) is declared.
    pub fn is_pure_ref(&self) -> bool {
        self.ref_path.is_some()
            && self.schema_type.is_none()
            && self.properties.is_empty()
            && self.items.is_none()
            && self.additional_properties.is_none()
    }
}

/// `additionalProperties` is either a boolean or a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Bool(bool),
    Schema(SchemaObject),
}

/// A parsed OpenAPI document of either major version.
#[derive(Debug, Clone)]
pub enum OpenAPIDocument {
    V2(OpenAPIv2),
    V3(OpenAPIv3),
}

#[derive(Debug, Error)]
pub enum OpenAPIParseError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("invalid YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    #[error("invalid OpenAPI document: {0}")]
    InvalidSchema(String),

    #[error("unknown OpenAPI version: expected a swagger 2.x or openapi 3.x document")]
    UnknownVersion,
}

impl OpenAPIDocument {
    pub fn from_json(json: &str) -> Result<Self, OpenAPIParseError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, OpenAPIParseError> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Detects the version from the `swagger` or `openapi` field.
    pub fn from_value(value: serde_json::Value) -> Result<Self, OpenAPIParseError> {
        let invalid = |e: serde_json::Error| OpenAPIParseError::InvalidSchema(e.to_string());

        if let Some(swagger) = value.get("swagger").and_then(|v| v.as_str()) {
            if swagger.starts_with("2.") {
                let doc: OpenAPIv2 = serde_json::from_value(value).map_err(invalid)?;
                return Ok(OpenAPIDocument::V2(doc));
            }
        }

        if let Some(openapi) = value.get("openapi").and_then(|v| v.as_str()) {
            if openapi.starts_with("3.") {
                let doc: OpenAPIv3 = serde_json::from_value(value).map_err(invalid)?;
                return Ok(OpenAPIDocument::V3(doc));
            }
        }

        Err(OpenAPIParseError::UnknownVersion)
    }

    pub fn is_v2(&self) -> bool {
        matches!(self, OpenAPIDocument::V2(_))
    }

    pub fn is_v3(&self) -> bool {
        matches!(self, OpenAPIDocument::V3(_))
    }

    /// Every named definition, whichever section it lives in.
    pub fn definitions(&self) -> &BTreeMap<String, SchemaObject> {
        match self {
            OpenAPIDocument::V2(v2) => &v2.definitions,
            OpenAPIDocument::V3(v3) => &v3.components.schemas,
        }
    }
}
