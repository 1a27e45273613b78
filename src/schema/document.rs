//! The native schema document format.
//!
//! ```yaml
//! types:
//! - name: service
//!   map:
//!     fields:
//!     - name: ports
//!       type:
//!         list:
//!           elementType:
//!             namedType: servicePort
//!           elementRelationship: associative
//!           keys: [port, protocol]
//! - name: servicePort
//!   map:
//!     fields:
//!     - name: port
//!       type:
//!         scalar: numeric
//!     - name: protocol
//!       type:
//!         scalar: string
//!       default: TCP
//! ```
//!
//! A `map` with `fields` is a structure, a `map` with only an
//! `elementType` is a map. A definition with `scalar: untyped` alongside a
//! `list` and a `map` is the untyped type whose map relationship decides
//! how it merges.

use super::elements::{
    Atom, ElementRelationship, List, Map, Scalar, Schema, SchemaError, Struct, StructField,
    TypeDef, TypeRef,
};
use crate::value::Value;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub types: Vec<TypeDefDoc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeDefDoc {
    pub name: String,
    #[serde(flatten)]
    pub atom: AtomDoc,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AtomDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scalar: Option<Scalar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<Box<ListDoc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<Box<MapDoc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeRefDoc {
    #[serde(default, rename = "namedType", skip_serializing_if = "Option::is_none")]
    pub named_type: Option<String>,
    #[serde(flatten)]
    pub inlined: AtomDoc,
    #[serde(
        default,
        rename = "elementRelationship",
        skip_serializing_if = "Option::is_none"
    )]
    pub element_relationship: Option<ElementRelationship>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapDoc {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<StructFieldDoc>,
    #[serde(default, rename = "elementType", skip_serializing_if = "Option::is_none")]
    pub element_type: Option<TypeRefDoc>,
    #[serde(default, rename = "elementRelationship")]
    pub element_relationship: ElementRelationship,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructFieldDoc {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: TypeRefDoc,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListDoc {
    #[serde(rename = "elementType")]
    pub element_type: TypeRefDoc,
    #[serde(default = "atomic", rename = "elementRelationship")]
    pub element_relationship: ElementRelationship,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
}

fn atomic() -> ElementRelationship {
    ElementRelationship::Atomic
}

impl AtomDoc {
    fn is_empty(&self) -> bool {
        self.scalar.is_none() && self.list.is_none() && self.map.is_none()
    }

    fn to_atom(&self, owner: &str) -> Result<Atom, SchemaError> {
        let invalid = |reason: &str| SchemaError::InvalidType {
            name: owner.to_string(),
            reason: reason.to_string(),
        };
        match (self.scalar, &self.list, &self.map) {
            (Some(Scalar::Untyped), list, map) if list.is_some() || map.is_some() => {
                Ok(Atom::Untyped(
                    map.as_ref()
                        .map(|m| m.element_relationship)
                        .unwrap_or_default(),
                ))
            }
            (Some(scalar), None, None) => Ok(Atom::Scalar(scalar)),
            (None, Some(list), None) => list.to_atom(owner),
            (None, None, Some(map)) => map.to_atom(owner),
            (None, None, None) => Err(invalid("no scalar, list or map declared")),
            _ => Err(invalid("more than one of scalar, list and map declared")),
        }
    }
}

impl ListDoc {
    fn to_atom(&self, owner: &str) -> Result<Atom, SchemaError> {
        if !self.keys.is_empty() && self.element_relationship != ElementRelationship::Associative {
            return Err(SchemaError::InvalidType {
                name: owner.to_string(),
                reason: "list keys require an associative element relationship".to_string(),
            });
        }
        Ok(Atom::List(List {
            element_type: self.element_type.to_type_ref(owner)?,
            element_relationship: self.element_relationship,
            keys: self.keys.clone(),
        }))
    }
}

impl MapDoc {
    fn to_atom(&self, owner: &str) -> Result<Atom, SchemaError> {
        let element_type = self
            .element_type
            .as_ref()
            .map(|t| t.to_type_ref(owner))
            .transpose()?;
        if self.fields.is_empty() {
            if let Some(element_type) = element_type {
                return Ok(Atom::Map(Map {
                    element_type,
                    element_relationship: self.element_relationship,
                }));
            }
        }
        let fields = self
            .fields
            .iter()
            .map(|f| f.to_field(owner))
            .collect::<Result<Vec<_>, _>>()?;
        let mut s = Struct::new(fields).with_element_relationship(self.element_relationship);
        if let Some(element_type) = element_type {
            s = s.with_element_type(element_type);
        }
        Ok(Atom::Struct(s))
    }
}

impl StructFieldDoc {
    fn to_field(&self, owner: &str) -> Result<StructField, SchemaError> {
        let field_owner = format!("{}.{}", owner, self.name);
        Ok(StructField {
            name: self.name.clone(),
            field_type: self.field_type.to_type_ref(&field_owner)?,
            default: self.default.clone().map(Value::from),
        })
    }
}

impl TypeRefDoc {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRefDoc {
            named_type: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn scalar(scalar: Scalar) -> Self {
        TypeRefDoc {
            inlined: AtomDoc {
                scalar: Some(scalar),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn to_type_ref(&self, owner: &str) -> Result<TypeRef, SchemaError> {
        let tr = match (&self.named_type, self.inlined.is_empty()) {
            (Some(name), true) => TypeRef::named(name.clone()),
            (None, false) => TypeRef::inline(self.inlined.to_atom(owner)?),
            (Some(_), false) => {
                return Err(SchemaError::InvalidType {
                    name: owner.to_string(),
                    reason: "type reference is both named and inline".to_string(),
                })
            }
            (None, true) => {
                return Err(SchemaError::InvalidType {
                    name: owner.to_string(),
                    reason: "empty type reference".to_string(),
                })
            }
        };
        Ok(match self.element_relationship {
            Some(er) => tr.with_element_relationship(er),
            None => tr,
        })
    }
}

impl SchemaDocument {
    pub fn from_yaml(yaml: &str) -> Result<Self, SchemaError> {
        serde_yaml::from_str(yaml).map_err(|e| SchemaError::Parse(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        serde_json::from_str(json).map_err(|e| SchemaError::Parse(e.to_string()))
    }

    pub fn to_schema(&self) -> Result<Schema, SchemaError> {
        let types = self
            .types
            .iter()
            .map(|t| Ok(TypeDef::new(t.name.clone(), t.atom.to_atom(&t.name)?)))
            .collect::<Result<Vec<_>, SchemaError>>()?;
        Schema::new(types)
    }
}

impl Schema {
    pub fn from_document(doc: &SchemaDocument) -> Result<Schema, SchemaError> {
        doc.to_schema()
    }

    pub fn from_yaml(yaml: &str) -> Result<Schema, SchemaError> {
        SchemaDocument::from_yaml(yaml)?.to_schema()
    }

    pub fn from_json(json: &str) -> Result<Schema, SchemaError> {
        SchemaDocument::from_json(json)?.to_schema()
    }
}
