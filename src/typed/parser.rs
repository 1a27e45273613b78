//! Producing typed values from raw objects.

use super::typed_value::{as_typed, TypedValue};
use super::validation::{ValidationErrors, ValidationOption};
use crate::schema::{Schema, SchemaError, TypeRef, UNTYPED_DEDUCED};
use crate::value::Value;
use once_cell::sync::Lazy;
use thiserror::Error;

/// Parser owns a schema read from the native YAML schema format.
#[derive(Debug, Clone)]
pub struct Parser {
    pub schema: Schema,
}

impl Parser {
    pub fn new(schema_yaml: &str) -> Result<Parser, SchemaError> {
        Ok(Parser {
            schema: Schema::from_yaml(schema_yaml)?,
        })
    }

    pub fn type_names(&self) -> Vec<&str> {
        self.schema.type_names().iter().map(String::as_str).collect()
    }

    pub fn type_by_name(&self, name: &str) -> ParseableType<'_> {
        ParseableType::new(&self.schema, TypeRef::named(name))
    }
}

/// A type in a schema that raw objects can be parsed into.
#[derive(Debug, Clone)]
pub struct ParseableType<'s> {
    schema: &'s Schema,
    type_ref: TypeRef,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

impl<'s> ParseableType<'s> {
    pub fn new(schema: &'s Schema, type_ref: TypeRef) -> Self {
        ParseableType { schema, type_ref }
    }

    /// True if the type resolves in the schema.
    pub fn is_valid(&self) -> bool {
        self.schema.resolve(&self.type_ref).is_some()
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    pub fn type_ref(&self) -> &TypeRef {
        &self.type_ref
    }

    pub fn from_value(&self, value: Value) -> Result<TypedValue<'s>, ParseError> {
        self.from_value_with_opts(value, &[])
    }

    pub fn from_value_with_opts(
        &self,
        value: Value,
        opts: &[ValidationOption],
    ) -> Result<TypedValue<'s>, ParseError> {
        Ok(as_typed(value, self.schema, self.type_ref.clone(), opts)?)
    }

    pub fn from_raw(&self, raw: serde_json::Value) -> Result<TypedValue<'s>, ParseError> {
        self.from_value(Value::from(raw))
    }

    pub fn from_json(&self, json: &str) -> Result<TypedValue<'s>, ParseError> {
        self.from_value(Value::from_json(json)?)
    }

    pub fn from_yaml(&self, yaml: &str) -> Result<TypedValue<'s>, ParseError> {
        self.from_value(Value::from_yaml(yaml)?)
    }

    /// A null value of this type.
    pub fn empty(&self) -> TypedValue<'s> {
        TypedValue::empty(self.schema, self.type_ref.clone())
    }
}

static DEDUCED_SCHEMA: Lazy<Schema> = Lazy::new(Schema::untyped);

/// A type that accepts any value: maps merge key by key, lists and
/// scalars are replaced whole.
pub fn deduced_parseable_type() -> ParseableType<'static> {
    ParseableType::new(&DEDUCED_SCHEMA, TypeRef::named(UNTYPED_DEDUCED))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TEST_SCHEMA: &str = r#"types:
- name: stringPair
  map:
    fields:
    - name: key
      type:
        scalar: string
    - name: value
      type:
        scalar: string
"#;

    #[test]
    fn test_parser_new() {
        let parser = Parser::new(TEST_SCHEMA).unwrap();
        assert_eq!(parser.type_names(), vec!["stringPair"]);
        assert!(Parser::new("types: [{name: broken}]").is_err());
    }

    #[test]
    fn test_parseable_type_from_yaml() {
        let parser = Parser::new(TEST_SCHEMA).unwrap();
        let pt = parser.type_by_name("stringPair");

        let tv = pt.from_yaml(r#"{"key": "foo", "value": "bar"}"#).unwrap();
        assert!(tv.as_value().is_map());

        let err = pt.from_yaml("{key: 1}").unwrap_err();
        assert!(matches!(err, ParseError::Validation(_)));
        assert!(matches!(pt.from_json("{"), Err(ParseError::Json(_))));
    }

    #[test]
    fn test_parseable_type_is_valid() {
        let parser = Parser::new(TEST_SCHEMA).unwrap();
        assert!(parser.type_by_name("stringPair").is_valid());
        assert!(!parser.type_by_name("nonexistent").is_valid());
    }

    #[test]
    fn test_deduced_parseable_type() {
        let pt = deduced_parseable_type();
        assert!(pt.is_valid());

        let tv = pt
            .from_raw(serde_json::json!({"a": 1, "b": ["x"], "c": {"d": true}}))
            .unwrap();
        assert!(tv.as_value().is_map());
        assert!(pt.empty().as_value().is_null());
    }
}
