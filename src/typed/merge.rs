//! Merging two values of the same type.

use super::keys::{list_item_to_path_element, KeyError};
use super::typed_value::{member_type, Shape, TypedValue};
use super::validation::display_path;
use crate::fieldpath::{Path, PathElement};
use crate::schema::{List, Schema, TypeRef};
use crate::value::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Which operand of a merge a problem was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Lhs,
    Rhs,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Lhs => f.write_str("lhs"),
            Side::Rhs => f.write_str("rhs"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MergeError {
    #[error("cannot merge values of different types: {lhs} and {rhs}")]
    TypeMismatch { lhs: String, rhs: String },

    #[error("{path}: element {index}: {reason}")]
    InvalidListElement {
        side: Side,
        path: String,
        index: usize,
        reason: KeyError,
    },

    #[error("{path}: duplicate entries for key {key} in {side}")]
    DuplicateKey {
        side: Side,
        path: String,
        key: String,
    },

    #[error("{path}: field not declared in schema")]
    UnknownField { path: String },

    #[error("{path}: no type found matching: {name}")]
    UnresolvedType { path: String, name: String },
}

impl<'s> TypedValue<'s> {
    /// Merges `rhs` over this value and returns the result.
    ///
    /// Scalars and atomic containers are replaced by `rhs`. Maps and
    /// structs are merged entry by entry. Associative lists are matched by
    /// key: the order of this value's elements is kept and elements only in
    /// `rhs` follow their predecessor in `rhs` (or, lacking one, precede the
    /// first shared element or go last). Other lists are merged by
    /// index. A null `rhs` leaves this value as it is.
    ///
    /// Every element of both associative lists must be addressable before
    /// the merged list is built; an element missing a key field (without a
    /// default) or a repeated key is an error.
    pub fn merge(&self, rhs: &TypedValue<'_>) -> Result<TypedValue<'s>, MergeError> {
        if self.type_ref() != rhs.type_ref() {
            return Err(MergeError::TypeMismatch {
                lhs: format!("{:?}", self.type_ref()),
                rhs: format!("{:?}", rhs.type_ref()),
            });
        }
        let value = merge_values(
            self.schema(),
            self.as_value(),
            rhs.as_value(),
            self.type_ref(),
            &mut Path::new(),
        )?;
        Ok(self.with_value(value))
    }
}

fn merge_values(
    schema: &Schema,
    lhs: &Value,
    rhs: &Value,
    tr: &TypeRef,
    path: &mut Path,
) -> Result<Value, MergeError> {
    if rhs.is_null() {
        return Ok(lhs.clone());
    }
    let atom = schema.resolve(tr).ok_or_else(|| MergeError::UnresolvedType {
        path: display_path(path),
        name: tr.name().unwrap_or("<inline>").to_string(),
    })?;

    match Shape::of(&atom, rhs) {
        Shape::Leaf => Ok(rhs.clone()),
        Shape::Map(r) => {
            let mut out = match lhs {
                Value::Map(l) => l.clone(),
                _ => Map::new(),
            };
            for (name, rv) in r.iter() {
                path.push(PathElement::field_name(name.clone()));
                let child_type = member_type(&atom, name).ok_or_else(|| MergeError::UnknownField {
                    path: display_path(path),
                })?;
                let lv = out.get(name).cloned().unwrap_or_default();
                let merged = merge_values(schema, &lv, rv, &child_type, path)?;
                path.pop();
                out.set(name.clone(), merged);
            }
            Ok(Value::Map(out))
        }
        Shape::List(list, r) => {
            let l: &[Value] = lhs.as_list().unwrap_or_default();
            if list.is_associative() {
                merge_associative(schema, list, l, r, path)
            } else {
                merge_by_index(schema, list, l, r, path)
            }
        }
    }
}

fn merge_by_index(
    schema: &Schema,
    list: &List,
    l: &[Value],
    r: &[Value],
    path: &mut Path,
) -> Result<Value, MergeError> {
    let mut out = Vec::with_capacity(l.len().max(r.len()));
    for i in 0..l.len().max(r.len()) {
        let lv = l.get(i).cloned().unwrap_or_default();
        match r.get(i) {
            Some(rv) => {
                path.push(PathElement::Index(i));
                out.push(merge_values(schema, &lv, rv, &list.element_type, path)?);
                path.pop();
            }
            None => out.push(lv),
        }
    }
    Ok(Value::List(out))
}

fn merge_associative(
    schema: &Schema,
    list: &List,
    l: &[Value],
    r: &[Value],
    path: &mut Path,
) -> Result<Value, MergeError> {
    let lhs_keys = element_keys(schema, list, l, Side::Lhs, path)?;
    let rhs_keys = element_keys(schema, list, r, Side::Rhs, path)?;
    let rhs_index: BTreeMap<&PathElement, usize> =
        rhs_keys.iter().enumerate().map(|(i, pe)| (pe, i)).collect();

    let mut out: Vec<(PathElement, Value)> = Vec::with_capacity(l.len() + r.len());
    for (pe, lv) in lhs_keys.iter().zip(l) {
        let merged = match rhs_index.get(pe) {
            Some(&j) => {
                path.push(pe.clone());
                let merged = merge_values(schema, lv, &r[j], &list.element_type, path)?;
                path.pop();
                merged
            }
            None => lv.clone(),
        };
        out.push((pe.clone(), merged));
    }

    let mut predecessor: Option<&PathElement> = None;
    for (pe, rv) in rhs_keys.iter().zip(r) {
        if !lhs_keys.contains(pe) {
            path.push(pe.clone());
            let added = merge_values(schema, &Value::Null, rv, &list.element_type, path)?;
            path.pop();
            let position = |key: &PathElement| out.iter().position(|(k, _)| k == key);
            let at = match predecessor {
                Some(prev) => position(prev).map_or(out.len(), |i| i + 1),
                // Leading elements go before the first element both sides share.
                None => rhs_keys
                    .iter()
                    .find(|k| lhs_keys.contains(k))
                    .and_then(position)
                    .unwrap_or(out.len()),
            };
            out.insert(at, (pe.clone(), added));
        }
        predecessor = Some(pe);
    }

    Ok(Value::List(out.into_iter().map(|(_, v)| v).collect()))
}

/// The path element of every item, in order.
fn element_keys(
    schema: &Schema,
    list: &List,
    items: &[Value],
    side: Side,
    path: &Path,
) -> Result<Vec<PathElement>, MergeError> {
    let mut keys = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let pe = list_item_to_path_element(schema, list, index, item).map_err(|reason| {
            MergeError::InvalidListElement {
                side,
                path: display_path(path),
                index,
                reason,
            }
        })?;
        if keys.contains(&pe) {
            return Err(MergeError::DuplicateKey {
                side,
                path: display_path(path),
                key: pe.to_string(),
            });
        }
        keys.push(pe);
    }
    Ok(keys)
}
