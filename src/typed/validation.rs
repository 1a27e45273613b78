//! Validation of values against their schema.

use super::keys::{list_item_to_path_element, KeyError};
use super::typed_value::{resolve, TypedValue};
use crate::fieldpath::{Path, PathElement};
use crate::schema::{Atom, Scalar};
use crate::value::Value;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// ValidationOptions controls validation behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOption {
    /// Allow duplicate items in sets and associative lists.
    AllowDuplicates,
}

/// A single problem found while checking a value against its type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{path}: expected {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("{path}: field not declared in schema")]
    UnknownField { path: String },

    #[error("{path}: element {index}: {reason}")]
    InvalidListElement {
        path: String,
        index: usize,
        reason: KeyError,
    },

    #[error("{path}: duplicate entries for key {key}")]
    DuplicateKey { path: String, key: String },

    #[error("{path}: no type found matching: {name}")]
    UnresolvedType { path: String, name: String },
}

impl ValidationError {
    pub fn type_mismatch(path: &Path, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        ValidationError::TypeMismatch {
            path: display_path(path),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn unknown_field(path: &Path) -> Self {
        ValidationError::UnknownField {
            path: display_path(path),
        }
    }

    pub fn duplicate_key(path: &Path, key: &PathElement) -> Self {
        ValidationError::DuplicateKey {
            path: display_path(path),
            key: key.to_string(),
        }
    }

    pub fn invalid_list_element(path: &Path, index: usize, reason: KeyError) -> Self {
        ValidationError::InvalidListElement {
            path: display_path(path),
            index,
            reason,
        }
    }

    pub fn unresolved_type(path: &Path, name: impl Into<String>) -> Self {
        ValidationError::UnresolvedType {
            path: display_path(path),
            name: name.into(),
        }
    }
}

/// The root renders as `.`.
pub(crate) fn display_path(path: &Path) -> String {
    if path.is_empty() {
        ".".to_string()
    } else {
        path.to_string()
    }
}

/// ValidationErrors is a collection of validation errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        ValidationErrors { errors: Vec::new() }
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        ValidationErrors {
            errors: vec![error],
        }
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

fn scalar_name(scalar: Scalar) -> &'static str {
    match scalar {
        Scalar::Numeric => "numeric",
        Scalar::String => "string",
        Scalar::Boolean => "boolean",
        Scalar::Untyped => "scalar",
    }
}

impl TypedValue<'_> {
    /// Checks the value against its type and reports every problem found.
    ///
    /// Null is accepted anywhere. Atomic containers are still checked all
    /// the way down.
    pub fn validate(&self, opts: &[ValidationOption]) -> Result<(), ValidationErrors> {
        let mut validator = Validator {
            typed: self,
            allow_duplicates: opts.contains(&ValidationOption::AllowDuplicates),
            errors: ValidationErrors::new(),
        };
        validator.validate(self.as_value(), self.type_ref(), &mut Path::new());
        validator.errors.into_result()
    }
}

struct Validator<'a, 's> {
    typed: &'a TypedValue<'s>,
    allow_duplicates: bool,
    errors: ValidationErrors,
}

impl Validator<'_, '_> {
    fn validate(&mut self, value: &Value, tr: &crate::schema::TypeRef, path: &mut Path) {
        if value.is_null() {
            return;
        }
        let schema = self.typed.schema();
        let atom = match resolve(schema, tr, path) {
            Ok(atom) => atom,
            Err(e) => {
                self.errors.add(e);
                return;
            }
        };

        match (atom.as_ref(), value) {
            (Atom::Scalar(scalar), _) => {
                if !scalar.accepts(value) {
                    self.errors.add(ValidationError::type_mismatch(
                        path,
                        scalar_name(*scalar),
                        value.kind(),
                    ));
                }
            }
            (Atom::Untyped(_), _) => {}
            (Atom::Struct(s), Value::Map(map)) => {
                for (name, child) in map.iter() {
                    path.push(PathElement::field_name(name.clone()));
                    let Some(child_type) = s.member_type(name) else {
                        self.errors.add(ValidationError::unknown_field(path));
                        path.pop();
                        continue;
                    };
                    self.validate(child, child_type, path);
                    path.pop();
                }
            }
            (Atom::Map(m), Value::Map(map)) => {
                for (name, child) in map.iter() {
                    path.push(PathElement::field_name(name.clone()));
                    self.validate(child, &m.element_type, path);
                    path.pop();
                }
            }
            (Atom::List(list), Value::List(items)) => {
                let mut seen = HashSet::new();
                for (i, item) in items.iter().enumerate() {
                    let pe = match list_item_to_path_element(schema, list, i, item) {
                        Ok(pe) => pe,
                        Err(reason) => {
                            self.errors
                                .add(ValidationError::invalid_list_element(path, i, reason));
                            continue;
                        }
                    };
                    if list.is_associative() && !self.allow_duplicates && !seen.insert(pe.clone()) {
                        self.errors.add(ValidationError::duplicate_key(path, &pe));
                    }
                    path.push(pe);
                    self.validate(item, &list.element_type, path);
                    path.pop();
                }
            }
            (Atom::Struct(_) | Atom::Map(_), _) => {
                self.errors
                    .add(ValidationError::type_mismatch(path, "map", value.kind()));
            }
            (Atom::List(_), _) => {
                self.errors
                    .add(ValidationError::type_mismatch(path, "list", value.kind()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Schema, TypeRef};
    use crate::typed::as_typed;
    use pretty_assertions::assert_eq;

    const SCHEMA: &str = r#"
types:
- name: service
  map:
    fields:
    - name: name
      type:
        scalar: string
    - name: ports
      type:
        list:
          elementType:
            namedType: port
          elementRelationship: associative
          keys: [port, protocol]
    - name: finalizers
      type:
        list:
          elementType:
            scalar: string
          elementRelationship: associative
    - name: labels
      type:
        map:
          elementType:
            scalar: string
- name: port
  map:
    fields:
    - name: port
      type:
        scalar: numeric
    - name: protocol
      type:
        scalar: string
      default: TCP
    - name: name
      type:
        scalar: string
"#;

    fn errors(yaml: &str, opts: &[ValidationOption]) -> Vec<String> {
        let schema = Schema::from_yaml(SCHEMA).unwrap();
        let value = Value::from_yaml(yaml).unwrap();
        match as_typed(value, &schema, TypeRef::named("service"), opts) {
            Ok(_) => vec![],
            Err(errs) => errs.iter().map(|e| e.to_string()).collect(),
        }
    }

    #[test]
    fn test_valid_values() {
        assert_eq!(errors("{}", &[]), Vec::<String>::new());
        assert_eq!(errors("name: null", &[]), Vec::<String>::new());
        assert_eq!(
            errors("ports: [{port: 80}, {port: 80, protocol: UDP}]", &[]),
            Vec::<String>::new()
        );
        assert_eq!(errors("labels: {app: web}", &[]), Vec::<String>::new());
    }

    #[test]
    fn test_type_mismatches() {
        assert_eq!(
            errors("{name: 1, labels: [a], ports: {}}", &[]),
            vec![
                ".labels: expected map, got list",
                ".name: expected string, got int",
                ".ports: expected list, got map",
            ]
        );
    }

    #[test]
    fn test_unknown_field() {
        assert_eq!(
            errors("{ports: [{port: 80, bogus: 1}], other: 1}", &[]),
            vec![
                ".other: field not declared in schema",
                r#".ports[port=80,protocol="TCP"].bogus: field not declared in schema"#,
            ]
        );
    }

    #[test]
    fn test_missing_key_without_default() {
        assert_eq!(
            errors("ports: [{name: http, protocol: TCP}]", &[]),
            vec![
                r#".ports: element 0: associative list with keys has an element that omits key field "port" (and doesn't have default value)"#
            ]
        );
    }

    #[test]
    fn test_duplicates() {
        let doc = "{ports: [{port: 80}, {port: 80, protocol: TCP}], finalizers: [a, a]}";
        assert_eq!(
            errors(doc, &[]),
            vec![
                r#".finalizers: duplicate entries for key [="a"]"#,
                r#".ports: duplicate entries for key [port=80,protocol="TCP"]"#,
            ]
        );
        assert_eq!(
            errors(doc, &[ValidationOption::AllowDuplicates]),
            Vec::<String>::new()
        );
    }
}
