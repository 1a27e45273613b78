//! Identifying list elements.

use crate::fieldpath::PathElement;
use crate::schema::{Atom, List, Schema};
use crate::value::{Field, FieldList, Value};
use thiserror::Error;

/// Why a list element could not be given a path element.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("associative list with keys has an element that omits key field {0:?} (and doesn't have default value)")]
    MissingKey(String),

    #[error("associative list with keys has an element that is a {0}, not a map")]
    NotAMap(&'static str),
}

/// Returns the path element that addresses `item` inside `list`.
///
/// Elements of an associative list with keys are addressed by their key
/// fields, falling back to the key field's declared default. Elements of
/// a set are addressed by value. Everything else is addressed by index.
pub fn list_item_to_path_element(
    schema: &Schema,
    list: &List,
    index: usize,
    item: &Value,
) -> Result<PathElement, KeyError> {
    if !list.is_associative() {
        return Ok(PathElement::Index(index));
    }
    if list.keys.is_empty() {
        return Ok(PathElement::Value(item.clone()));
    }
    let Value::Map(map) = item else {
        return Err(KeyError::NotAMap(item.kind()));
    };

    let element = schema.resolve(&list.element_type);
    let default_of = |key: &str| match element.as_deref() {
        Some(Atom::Struct(s)) => s.find_field(key).and_then(|f| f.default.clone()),
        _ => None,
    };

    let mut fields = Vec::with_capacity(list.keys.len());
    for key in &list.keys {
        let value = map
            .get(key)
            .cloned()
            .or_else(|| default_of(key))
            .ok_or_else(|| KeyError::MissingKey(key.clone()))?;
        fields.push(Field::new(key.clone(), value));
    }
    Ok(PathElement::Key(FieldList::with_fields(fields)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ElementRelationship, TypeRef};
    use pretty_assertions::assert_eq;

    const SCHEMA: &str = r#"
types:
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
"#;

    fn list(er: ElementRelationship, keys: &[&str]) -> List {
        List {
            element_type: TypeRef::named("port"),
            element_relationship: er,
            keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }

    #[test]
    fn test_keyed_element_uses_default() {
        let schema = Schema::from_yaml(SCHEMA).unwrap();
        let ports = list(ElementRelationship::Associative, &["port", "protocol"]);
        let item = Value::from_json(r#"{"port": 80}"#).unwrap();

        assert_eq!(
            list_item_to_path_element(&schema, &ports, 3, &item).unwrap(),
            PathElement::Key(FieldList::with_fields(vec![
                Field::new("port", Value::Int(80)),
                Field::new("protocol", Value::from("TCP")),
            ]))
        );
    }

    #[test]
    fn test_missing_key_without_default() {
        let schema = Schema::from_yaml(SCHEMA).unwrap();
        let ports = list(ElementRelationship::Associative, &["port", "protocol"]);
        let item = Value::from_json(r#"{"nodePort": 30001}"#).unwrap();

        let err = list_item_to_path_element(&schema, &ports, 0, &item).unwrap_err();
        assert_eq!(err, KeyError::MissingKey("port".to_string()));
        assert_eq!(
            err.to_string(),
            r#"associative list with keys has an element that omits key field "port" (and doesn't have default value)"#
        );
        assert_eq!(
            list_item_to_path_element(&schema, &ports, 0, &Value::from("x")).unwrap_err(),
            KeyError::NotAMap("string")
        );
    }

    #[test]
    fn test_sets_and_plain_lists() {
        let schema = Schema::from_yaml(SCHEMA).unwrap();
        let item = Value::from("a");
        assert_eq!(
            list_item_to_path_element(&schema, &list(ElementRelationship::Associative, &[]), 2, &item)
                .unwrap(),
            PathElement::Value(item.clone())
        );
        assert_eq!(
            list_item_to_path_element(&schema, &list(ElementRelationship::Separable, &[]), 2, &item)
                .unwrap(),
            PathElement::Index(2)
        );
    }
}
