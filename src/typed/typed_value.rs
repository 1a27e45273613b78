//! TypedValue implementation.

use super::keys::list_item_to_path_element;
use super::validation::{ValidationError, ValidationErrors, ValidationOption};
use crate::fieldpath::{Path, PathElement, Set};
use crate::schema::{Atom, List, Schema, TypeRef, UNTYPED_DEDUCED};
use crate::value::{Map, Value};
use std::borrow::Cow;

/// A value paired with its type and the schema the type lives in.
///
/// The schema is borrowed, so any number of typed values can share one.
#[derive(Debug, Clone)]
pub struct TypedValue<'s> {
    value: Value,
    type_ref: TypeRef,
    schema: &'s Schema,
}

/// Creates a new TypedValue after validating it conforms to the schema.
pub fn as_typed<'s>(
    value: Value,
    schema: &'s Schema,
    type_ref: TypeRef,
    opts: &[ValidationOption],
) -> Result<TypedValue<'s>, ValidationErrors> {
    let tv = as_typed_unvalidated(value, schema, type_ref);
    tv.validate(opts)?;
    Ok(tv)
}

/// Creates a new TypedValue without validation.
/// Use this only when validation has already been done.
pub fn as_typed_unvalidated(value: Value, schema: &Schema, type_ref: TypeRef) -> TypedValue<'_> {
    TypedValue {
        value,
        type_ref,
        schema,
    }
}

impl<'s> TypedValue<'s> {
    /// A null value of the given type.
    pub fn empty(schema: &'s Schema, type_ref: TypeRef) -> Self {
        as_typed_unvalidated(Value::Null, schema, type_ref)
    }

    pub fn as_value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// The value as a `serde_json::Value`.
    pub fn to_raw(&self) -> serde_json::Value {
        serde_json::Value::from(&self.value)
    }

    pub fn type_ref(&self) -> &TypeRef {
        &self.type_ref
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    /// A value of the same type.
    pub(crate) fn with_value(&self, value: Value) -> TypedValue<'s> {
        as_typed_unvalidated(value, self.schema, self.type_ref.clone())
    }

    /// Returns the set of fields this value sets.
    ///
    /// Scalars, atomic containers, nulls, empty maps and undeclared map
    /// entries are members, as is every element of a non-atomic list.
    /// The root itself is never a member.
    pub fn to_field_set(&self) -> Result<Set, ValidationErrors> {
        let mut set = Set::new();
        collect_field_set(
            self.schema,
            &self.value,
            &self.type_ref,
            &mut Path::new(),
            &mut set,
        )?;
        Ok(set)
    }
}

/// How a walker descends into a value of a given type.
pub(crate) enum Shape<'a, 'v> {
    Leaf,
    Map(&'v Map),
    List(&'a List, &'v [Value]),
}

impl<'a, 'v> Shape<'a, 'v> {
    pub(crate) fn of(atom: &'a Atom, value: &'v Value) -> Self {
        if atom.is_atomic() {
            return Shape::Leaf;
        }
        match (atom, value) {
            (Atom::Struct(_) | Atom::Map(_) | Atom::Untyped(_), Value::Map(m)) => Shape::Map(m),
            (Atom::List(list), Value::List(items)) => Shape::List(list, items),
            _ => Shape::Leaf,
        }
    }
}

pub(crate) fn resolve<'a>(
    schema: &'a Schema,
    tr: &'a TypeRef,
    path: &Path,
) -> Result<Cow<'a, Atom>, ValidationError> {
    schema.resolve(tr).ok_or_else(|| {
        ValidationError::unresolved_type(path, tr.name().unwrap_or("<inline>"))
    })
}

/// The type of map entry `name`, or `None` if the field is undeclared and
/// the type admits no extra fields.
pub(crate) fn member_type(atom: &Atom, name: &str) -> Option<TypeRef> {
    match atom {
        Atom::Struct(s) => s.member_type(name).cloned(),
        Atom::Map(m) => Some(m.element_type.clone()),
        Atom::Untyped(_) => Some(TypeRef::named(UNTYPED_DEDUCED)),
        Atom::Scalar(_) | Atom::List(_) => None,
    }
}

fn is_declared(atom: &Atom, name: &str) -> bool {
    matches!(atom, Atom::Struct(s) if s.find_field(name).is_some())
}

/// Adds the field set of `value` to `set`, every path prefixed by `path`.
pub(crate) fn collect_field_set(
    schema: &Schema,
    value: &Value,
    tr: &TypeRef,
    path: &mut Path,
    set: &mut Set,
) -> Result<(), ValidationError> {
    let atom = resolve(schema, tr, path)?;
    match Shape::of(&atom, value) {
        Shape::Leaf => {
            if !path.is_empty() {
                set.insert(path);
            }
        }
        Shape::Map(map) => {
            for (name, child) in map.iter() {
                let child_type = member_type(&atom, name).ok_or_else(|| {
                    ValidationError::unknown_field(&path.with(PathElement::field_name(name.clone())))
                })?;
                path.push(PathElement::field_name(name.clone()));
                collect_field_set(schema, child, &child_type, path, set)?;
                let is_empty_map = child.as_map().is_some_and(Map::is_empty);
                if child.is_null() || is_empty_map || !is_declared(&atom, name) {
                    set.insert(path);
                }
                path.pop();
            }
        }
        Shape::List(list, items) => {
            for (i, item) in items.iter().enumerate() {
                let pe = list_item_to_path_element(schema, list, i, item)
                    .map_err(|reason| ValidationError::invalid_list_element(path, i, reason))?;
                path.push(pe);
                collect_field_set(schema, item, &list.element_type, path, set)?;
                set.insert(path);
                path.pop();
            }
        }
    }
    Ok(())
}
