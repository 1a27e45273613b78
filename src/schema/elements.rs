//! The parsed type model.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Name of the built-in type that accepts anything and merges maps key by key.
pub const UNTYPED_DEDUCED: &str = "__untyped_deduced_";
/// Name of the built-in type that accepts anything and replaces it wholesale.
pub const UNTYPED_ATOMIC: &str = "__untyped_atomic_";

/// Errors building a schema or a registry.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to parse schema document: {0}")]
    Parse(String),

    #[error("type {name:?}: {reason}")]
    InvalidType { name: String, reason: String },

    #[error("type {name:?} is defined twice with different definitions")]
    ConflictingDefinition { name: String },

    #[error("type {referenced_by:?} references undefined type {name:?}")]
    UnresolvedReference { name: String, referenced_by: String },

    #[error("kind {gvk} maps to undefined type {type_name:?}")]
    UnknownKindType { gvk: String, type_name: String },
}

/// A single-valued leaf type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scalar {
    Numeric,
    String,
    Boolean,
    /// Any of the above.
    Untyped,
}

impl Scalar {
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Scalar::Numeric, Value::Int(_) | Value::Float(_))
                | (Scalar::String, Value::String(_))
                | (Scalar::Boolean, Value::Bool(_))
                | (
                    Scalar::Untyped,
                    Value::Int(_) | Value::Float(_) | Value::String(_) | Value::Bool(_)
                )
        )
    }
}

/// How the elements of a container relate to each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementRelationship {
    /// List elements are identified by key fields (or by value for sets).
    Associative,
    /// The container is replaced as a whole and owned as a single leaf.
    Atomic,
    /// Elements are independent and merged one by one.
    #[default]
    Separable,
}

/// A type definition.
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Scalar(Scalar),
    Struct(Struct),
    List(List),
    Map(Map),
    /// A value with no declared shape. Maps merge key by key unless the
    /// relationship is atomic; lists and scalars are leaves.
    Untyped(ElementRelationship),
}

impl Atom {
    /// True when values of this type are owned and replaced as a whole.
    pub fn is_atomic(&self) -> bool {
        match self {
            Atom::Scalar(_) => true,
            Atom::Struct(s) => s.element_relationship == ElementRelationship::Atomic,
            Atom::List(l) => l.element_relationship == ElementRelationship::Atomic,
            Atom::Map(m) => m.element_relationship == ElementRelationship::Atomic,
            Atom::Untyped(er) => *er == ElementRelationship::Atomic,
        }
    }

    fn with_element_relationship(self, er: ElementRelationship) -> Atom {
        match self {
            Atom::Scalar(s) => Atom::Scalar(s),
            Atom::Struct(s) => Atom::Struct(Struct {
                element_relationship: er,
                ..s
            }),
            Atom::List(l) => Atom::List(List {
                element_relationship: er,
                ..l
            }),
            Atom::Map(m) => Atom::Map(Map {
                element_relationship: er,
                ..m
            }),
            Atom::Untyped(_) => Atom::Untyped(er),
        }
    }

    fn references(&self, out: &mut Vec<String>) {
        match self {
            Atom::Scalar(_) | Atom::Untyped(_) => {}
            Atom::Struct(s) => {
                for field in &s.fields {
                    field.field_type.references(out);
                }
                if let Some(extra) = &s.element_type {
                    extra.references(out);
                }
            }
            Atom::List(l) => l.element_type.references(out),
            Atom::Map(m) => m.element_type.references(out),
        }
    }
}

/// Where a type reference points.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeTarget {
    Named(String),
    Inline(Box<Atom>),
}

/// A named or inline type, optionally overriding the target's element
/// relationship.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeRef {
    pub target: TypeTarget,
    pub element_relationship: Option<ElementRelationship>,
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef {
            target: TypeTarget::Named(name.into()),
            element_relationship: None,
        }
    }

    pub fn inline(atom: Atom) -> Self {
        TypeRef {
            target: TypeTarget::Inline(Box::new(atom)),
            element_relationship: None,
        }
    }

    pub fn with_element_relationship(mut self, er: ElementRelationship) -> Self {
        self.element_relationship = Some(er);
        self
    }

    pub fn name(&self) -> Option<&str> {
        match &self.target {
            TypeTarget::Named(name) => Some(name),
            TypeTarget::Inline(_) => None,
        }
    }

    fn references(&self, out: &mut Vec<String>) {
        match &self.target {
            TypeTarget::Named(name) => out.push(name.clone()),
            TypeTarget::Inline(atom) => atom.references(out),
        }
    }
}

/// A struct field.
#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    pub name: String,
    pub field_type: TypeRef,
    pub default: Option<Value>,
}

impl StructField {
    pub fn new(name: impl Into<String>, field_type: TypeRef) -> Self {
        StructField {
            name: name.into(),
            field_type,
            default: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// A structure with declared fields. Undeclared fields are rejected unless
/// `element_type` gives them a type.
#[derive(Debug, Clone, PartialEq)]
pub struct Struct {
    fields: Vec<StructField>,
    index: HashMap<String, usize>,
    pub element_type: Option<TypeRef>,
    pub element_relationship: ElementRelationship,
}

impl Struct {
    pub fn new(fields: Vec<StructField>) -> Self {
        let index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();
        Struct {
            fields,
            index,
            element_type: None,
            element_relationship: ElementRelationship::Separable,
        }
    }

    pub fn with_element_type(mut self, element_type: TypeRef) -> Self {
        self.element_type = Some(element_type);
        self
    }

    pub fn with_element_relationship(mut self, er: ElementRelationship) -> Self {
        self.element_relationship = er;
        self
    }

    pub fn fields(&self) -> &[StructField] {
        &self.fields
    }

    pub fn find_field(&self, name: &str) -> Option<&StructField> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    /// The type of the member `name`: its declared field type, or the
    /// element type for undeclared names.
    pub fn member_type(&self, name: &str) -> Option<&TypeRef> {
        self.find_field(name)
            .map(|f| &f.field_type)
            .or(self.element_type.as_ref())
    }
}

/// An ordered sequence of elements of one type.
#[derive(Debug, Clone, PartialEq)]
pub struct List {
    pub element_type: TypeRef,
    pub element_relationship: ElementRelationship,
    /// Key fields of an associative list of structs. Empty for sets.
    pub keys: Vec<String>,
}

impl List {
    pub fn is_associative(&self) -> bool {
        self.element_relationship == ElementRelationship::Associative
    }
}

/// A string-keyed map with values of one type.
#[derive(Debug, Clone, PartialEq)]
pub struct Map {
    pub element_type: TypeRef,
    pub element_relationship: ElementRelationship,
}

/// A named type definition.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    pub name: String,
    pub atom: Atom,
}

impl TypeDef {
    pub fn new(name: impl Into<String>, atom: Atom) -> Self {
        TypeDef {
            name: name.into(),
            atom,
        }
    }
}

/// A set of named types. Immutable once built; every named reference
/// inside it resolves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    types: HashMap<String, Atom>,
    names: Vec<String>,
}

impl Schema {
    /// Builds a schema from type definitions.
    ///
    /// Repeated identical definitions collapse into one; a repeated name
    /// with a different definition, or a reference to a type that is not
    /// defined, is an error. The two untyped built-ins are always present.
    pub fn new(types: Vec<TypeDef>) -> Result<Schema, SchemaError> {
        let mut schema = Schema::default();
        for TypeDef { name, atom } in types {
            match schema.types.get(&name) {
                Some(existing) if *existing == atom => continue,
                Some(_) => return Err(SchemaError::ConflictingDefinition { name }),
                None => {
                    schema.names.push(name.clone());
                    schema.types.insert(name, atom);
                }
            }
        }
        schema.add_builtins();

        let known: HashSet<&String> = schema.types.keys().collect();
        for name in &schema.names {
            let mut refs = Vec::new();
            schema.types[name].references(&mut refs);
            if let Some(missing) = refs.into_iter().find(|r| !known.contains(r)) {
                return Err(SchemaError::UnresolvedReference {
                    name: missing,
                    referenced_by: name.clone(),
                });
            }
        }
        Ok(schema)
    }

    /// A schema holding only the untyped built-ins.
    pub fn untyped() -> Schema {
        let mut schema = Schema::default();
        schema.add_builtins();
        schema
    }

    fn add_builtins(&mut self) {
        for (name, er) in [
            (UNTYPED_DEDUCED, ElementRelationship::Separable),
            (UNTYPED_ATOMIC, ElementRelationship::Atomic),
        ] {
            self.types
                .entry(name.to_string())
                .or_insert(Atom::Untyped(er));
        }
    }

    pub fn find_named_type(&self, name: &str) -> Option<&Atom> {
        self.types.get(name)
    }

    /// Declared type names, in document order. Built-ins are not listed.
    pub fn type_names(&self) -> &[String] {
        &self.names
    }

    /// Returns the atom a reference points to, with any relationship
    /// override applied.
    pub fn resolve<'a>(&'a self, tr: &'a TypeRef) -> Option<Cow<'a, Atom>> {
        let atom = match &tr.target {
            TypeTarget::Named(name) => self.types.get(name)?,
            TypeTarget::Inline(atom) => atom.as_ref(),
        };
        match tr.element_relationship {
            None => Some(Cow::Borrowed(atom)),
            Some(er) => Some(Cow::Owned(atom.clone().with_element_relationship(er))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn string_field(name: &str) -> StructField {
        StructField::new(name, TypeRef::inline(Atom::Scalar(Scalar::String)))
    }

    #[test]
    fn test_scalar_accepts() {
        assert!(Scalar::Numeric.accepts(&Value::Int(1)));
        assert!(Scalar::Numeric.accepts(&Value::Float(1.5)));
        assert!(!Scalar::Numeric.accepts(&Value::from("1")));
        assert!(Scalar::Untyped.accepts(&Value::from("80")));
        assert!(Scalar::Untyped.accepts(&Value::Int(80)));
        assert!(!Scalar::Untyped.accepts(&Value::List(vec![])));
    }

    #[test]
    fn test_relationship_serialization() {
        assert_eq!(
            serde_json::to_string(&ElementRelationship::Associative).unwrap(),
            "\"associative\""
        );
        assert_eq!(serde_json::to_string(&Scalar::Untyped).unwrap(), "\"untyped\"");
    }

    #[test]
    fn test_struct_member_type() {
        let s = Struct::new(vec![string_field("name")])
            .with_element_type(TypeRef::named(UNTYPED_DEDUCED));
        assert_eq!(
            s.member_type("name"),
            Some(&TypeRef::inline(Atom::Scalar(Scalar::String)))
        );
        assert_eq!(s.member_type("other"), Some(&TypeRef::named(UNTYPED_DEDUCED)));
        assert_eq!(Struct::new(vec![]).member_type("other"), None);
    }

    #[test]
    fn test_resolve_with_override() {
        let schema = Schema::new(vec![TypeDef::new(
            "labels",
            Atom::Map(Map {
                element_type: TypeRef::inline(Atom::Scalar(Scalar::String)),
                element_relationship: ElementRelationship::Separable,
            }),
        )])
        .unwrap();

        let plain = TypeRef::named("labels");
        assert!(matches!(schema.resolve(&plain), Some(Cow::Borrowed(_))));
        assert!(!schema.resolve(&plain).unwrap().is_atomic());

        let atomic = TypeRef::named("labels").with_element_relationship(ElementRelationship::Atomic);
        assert!(schema.resolve(&atomic).unwrap().is_atomic());
        assert!(schema.resolve(&TypeRef::named("missing")).is_none());
    }

    #[test]
    fn test_builtins_are_available() {
        let schema = Schema::new(vec![]).unwrap();
        assert_eq!(
            schema.find_named_type(UNTYPED_DEDUCED),
            Some(&Atom::Untyped(ElementRelationship::Separable))
        );
        assert!(schema.type_names().is_empty());
    }

    #[test]
    fn test_duplicates() {
        let a = TypeDef::new("a", Atom::Struct(Struct::new(vec![string_field("x")])));
        let same = a.clone();
        let schema = Schema::new(vec![a.clone(), same]).unwrap();
        assert_eq!(schema.type_names(), ["a".to_string()]);

        let different = TypeDef::new("a", Atom::Scalar(Scalar::String));
        assert!(matches!(
            Schema::new(vec![a, different]),
            Err(SchemaError::ConflictingDefinition { name }) if name == "a"
        ));
    }

    #[test]
    fn test_unresolved_reference() {
        let err = Schema::new(vec![TypeDef::new(
            "service",
            Atom::Struct(Struct::new(vec![StructField::new(
                "spec",
                TypeRef::named("serviceSpec"),
            )])),
        )])
        .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::UnresolvedReference { ref name, ref referenced_by }
                if name == "serviceSpec" && referenced_by == "service"
        ));
    }
}
