//! Conversion from OpenAPI definitions to the merge schema.
//!
//! Every definition becomes a named type. Properties that `$ref` another
//! definition become named references; inline properties become inline
//! types. Definitions that cannot be converted are reported as
//! [`ConversionWarning`]s and fall back to an untyped type, so a single odd
//! definition never prevents the rest of the document from loading.

use super::schema::{AdditionalProperties, OpenAPIDocument, SchemaObject};
use crate::schema::{
    Atom, ElementRelationship, GroupVersionKind, List, Map as SchemaMap, Scalar, Schema,
    SchemaError, SchemaRegistry, Struct, StructField, TypeDef, TypeRef, UNTYPED_ATOMIC,
    UNTYPED_DEDUCED,
};
use crate::value::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

/// A definition, or part of one, that could not be converted faithfully.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {message}")]
pub struct ConversionWarning {
    pub path: String,
    pub message: String,
}

/// The converted types and the kinds that map onto them.
#[derive(Debug)]
pub struct ConversionResult {
    pub types: Vec<TypeDef>,
    pub kinds: Vec<(GroupVersionKind, String)>,
    pub warnings: Vec<ConversionWarning>,
}

impl ConversionResult {
    pub fn into_registry(self) -> Result<SchemaRegistry, SchemaError> {
        let schema = Schema::new(self.types)?;
        SchemaRegistry::builder(schema).kinds(self.kinds).build()
    }
}

#[derive(Debug, Default)]
pub struct OpenAPIConverter {
    warnings: Vec<ConversionWarning>,
}

impl OpenAPIConverter {
    pub fn new() -> Self {
        OpenAPIConverter::default()
    }

    pub fn convert(&mut self, doc: &OpenAPIDocument) -> ConversionResult {
        self.warnings.clear();
        let definitions = doc.definitions();

        let mut types = Vec::with_capacity(definitions.len());
        let mut kinds = Vec::new();
        for (name, def) in definitions {
            let atom = self.definition_atom(name, def, definitions, 0);
            types.push(TypeDef::new(name.clone(), atom));
            for gvk in &def.x_kubernetes_group_version_kind {
                kinds.push((gvk.clone(), name.clone()));
            }
        }
        debug!(
            types = types.len(),
            kinds = kinds.len(),
            warnings = self.warnings.len(),
            "converted OpenAPI definitions"
        );

        ConversionResult {
            types,
            kinds,
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    /// A definition that only points at another one is a copy of it.
    fn definition_atom(
        &mut self,
        name: &str,
        def: &SchemaObject,
        definitions: &BTreeMap<String, SchemaObject>,
        depth: usize,
    ) -> Atom {
        let def = flatten(def);
        if !def.is_pure_ref() || def.is_int_or_string() {
            return self.atom(&def, definitions, name);
        }
        let target = def.ref_path.as_deref().map(ref_type_name).unwrap_or_default();
        match definitions.get(target) {
            Some(_) if depth >= definitions.len() => {
                self.add_warning(name, "reference cycle between definitions");
                Atom::Untyped(ElementRelationship::Separable)
            }
            Some(resolved) => self.definition_atom(name, resolved, definitions, depth + 1),
            None => {
                self.add_warning(name, &format!("reference to undefined type {:?}", target));
                Atom::Untyped(ElementRelationship::Separable)
            }
        }
    }

    fn type_ref(
        &mut self,
        schema: &SchemaObject,
        definitions: &BTreeMap<String, SchemaObject>,
        path: &str,
    ) -> TypeRef {
        let schema = flatten(schema);
        if schema.is_int_or_string() {
            return TypeRef::inline(Atom::Scalar(Scalar::Untyped));
        }
        let Some(ref_path) = schema.ref_path.as_deref() else {
            return TypeRef::inline(self.atom(&schema, definitions, path));
        };

        let name = ref_type_name(ref_path);
        if !definitions.contains_key(name) {
            self.add_warning(path, &format!("reference to undefined type {:?}", name));
            return TypeRef::named(UNTYPED_DEDUCED);
        }
        // A reference site may narrow the referenced type to atomic.
        let overridden = match (
            schema.x_kubernetes_map_type.as_deref(),
            schema.x_kubernetes_list_type.as_deref(),
        ) {
            (Some("atomic"), _) | (_, Some("atomic")) => Some(ElementRelationship::Atomic),
            (Some("granular"), _) => Some(ElementRelationship::Separable),
            _ => None,
        };
        match overridden {
            Some(er) => TypeRef::named(name).with_element_relationship(er),
            None => TypeRef::named(name),
        }
    }

    fn atom(
        &mut self,
        schema: &SchemaObject,
        definitions: &BTreeMap<String, SchemaObject>,
        path: &str,
    ) -> Atom {
        if schema.is_int_or_string() {
            return Atom::Scalar(Scalar::Untyped);
        }

        match schema.schema_type.as_deref().unwrap_or("") {
            "string" => Atom::Scalar(Scalar::String),
            "integer" | "number" => Atom::Scalar(Scalar::Numeric),
            "boolean" => Atom::Scalar(Scalar::Boolean),
            "array" => self.array(schema, definitions, path),
            "object" => self.object(schema, definitions, path),
            "" if !schema.properties.is_empty() || schema.additional_properties.is_some() => {
                self.object(schema, definitions, path)
            }
            "" => Atom::Untyped(self.map_relationship(schema, path)),
            other => {
                self.add_warning(path, &format!("unknown type {:?}", other));
                Atom::Untyped(ElementRelationship::Separable)
            }
        }
    }

    fn array(
        &mut self,
        schema: &SchemaObject,
        definitions: &BTreeMap<String, SchemaObject>,
        path: &str,
    ) -> Atom {
        let element_type = match &schema.items {
            Some(items) => self.type_ref(items, definitions, &format!("{}.items", path)),
            None => TypeRef::named(UNTYPED_ATOMIC),
        };
        let keys = schema.x_kubernetes_list_map_keys.clone().unwrap_or_default();

        let (element_relationship, keys) = match schema.x_kubernetes_list_type.as_deref() {
            Some("atomic") => (ElementRelationship::Atomic, Vec::new()),
            Some("set") => (ElementRelationship::Associative, Vec::new()),
            Some("map") if keys.is_empty() => {
                self.add_warning(path, "list-type map without list-map-keys, treating as atomic");
                (ElementRelationship::Atomic, Vec::new())
            }
            Some("map") => (ElementRelationship::Associative, keys),
            Some(other) => {
                self.add_warning(path, &format!("unknown list-type {:?}", other));
                (ElementRelationship::Atomic, Vec::new())
            }
            None => match (
                schema.x_kubernetes_patch_strategy.as_deref(),
                &schema.x_kubernetes_patch_merge_key,
            ) {
                (Some(strategy), merge_key) if strategy.split(',').any(|s| s == "merge") => {
                    (ElementRelationship::Associative, merge_key.iter().cloned().collect())
                }
                _ => (ElementRelationship::Atomic, Vec::new()),
            },
        };

        Atom::List(List {
            element_type,
            element_relationship,
            keys,
        })
    }

    fn object(
        &mut self,
        schema: &SchemaObject,
        definitions: &BTreeMap<String, SchemaObject>,
        path: &str,
    ) -> Atom {
        let element_relationship = self.map_relationship(schema, path);
        if schema.preserves_unknown_fields() && schema.properties.is_empty() {
            return Atom::Untyped(element_relationship);
        }

        let extra = if schema.preserves_unknown_fields() {
            Some(TypeRef::named(UNTYPED_DEDUCED))
        } else {
            match schema.additional_properties.as_deref() {
                None | Some(AdditionalProperties::Bool(false)) => None,
                Some(AdditionalProperties::Bool(true)) => Some(TypeRef::named(UNTYPED_DEDUCED)),
                Some(AdditionalProperties::Schema(s)) => Some(self.type_ref(
                    s,
                    definitions,
                    &format!("{}.additionalProperties", path),
                )),
            }
        };

        if schema.properties.is_empty() {
            return Atom::Map(SchemaMap {
                element_type: extra.unwrap_or_else(|| TypeRef::named(UNTYPED_DEDUCED)),
                element_relationship,
            });
        }

        let fields = schema
            .properties
            .iter()
            .map(|(name, prop)| {
                let field_path = format!("{}.{}", path, name);
                let field = StructField::new(name.clone(), self.type_ref(prop, definitions, &field_path));
                match property_default(prop) {
                    Some(default) => field.with_default(Value::from(default.clone())),
                    None => field,
                }
            })
            .collect();

        let s = Struct::new(fields).with_element_relationship(element_relationship);
        Atom::Struct(match extra {
            Some(extra) => s.with_element_type(extra),
            None => s,
        })
    }

    fn map_relationship(&mut self, schema: &SchemaObject, path: &str) -> ElementRelationship {
        match schema.x_kubernetes_map_type.as_deref() {
            Some("atomic") => ElementRelationship::Atomic,
            Some("granular") | None => ElementRelationship::Separable,
            Some(other) => {
                self.add_warning(path, &format!("unknown map-type {:?}", other));
                ElementRelationship::Separable
            }
        }
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ConversionWarning {
            path: path.to_string(),
            message: message.to_string(),
        });
    }
}

/// Strips `#/definitions/` or `#/components/schemas/`.
fn ref_type_name(ref_path: &str) -> &str {
    ref_path
        .strip_prefix("#/definitions/")
        .or_else(|| ref_path.strip_prefix("#/components/schemas/"))
        .unwrap_or_else(|| ref_path.rsplit('/').next().unwrap_or(ref_path))
}

/// v3 documents wrap `$ref`s in `allOf` to attach a default to them.
fn property_default(prop: &SchemaObject) -> Option<&serde_json::Value> {
    prop.default
        .as_ref()
        .or_else(|| prop.all_of.iter().find_map(|s| s.default.as_ref()))
}

/// Folds `allOf`, `anyOf` and `oneOf` into a single schema. `allOf`
/// members are absorbed in order; of `anyOf`/`oneOf` only an
/// integer-or-string pair or the first alternative is kept.
fn flatten(schema: &SchemaObject) -> Cow<'_, SchemaObject> {
    if schema.all_of.is_empty() && schema.any_of.is_empty() && schema.one_of.is_empty() {
        return Cow::Borrowed(schema);
    }
    let mut out = schema.clone();
    let all_of = std::mem::take(&mut out.all_of);
    for member in &all_of {
        absorb(&mut out, &flatten(member));
    }

    let alternatives = [std::mem::take(&mut out.any_of), std::mem::take(&mut out.one_of)];
    for group in alternatives.iter().filter(|a| !a.is_empty()) {
        let mut types: Vec<&str> = group
            .iter()
            .filter_map(|s| s.schema_type.as_deref())
            .collect();
        types.sort_unstable();
        if types == ["integer", "string"] {
            out.x_kubernetes_int_or_string = Some(true);
        } else if out.schema_type.is_none() && out.ref_path.is_none() {
            absorb(&mut out, &flatten(&group[0]));
        }
    }
    Cow::Owned(out)
}

fn absorb(target: &mut SchemaObject, member: &SchemaObject) {
    if target.ref_path.is_none() && target.schema_type.is_none() {
        target.ref_path = member.ref_path.clone();
    }
    if target.schema_type.is_none() {
        target.schema_type = member.schema_type.clone();
    }
    if target.format.is_none() {
        target.format = member.format.clone();
    }
    if target.items.is_none() {
        target.items = member.items.clone();
    }
    if target.additional_properties.is_none() {
        target.additional_properties = member.additional_properties.clone();
    }
    for (name, prop) in &member.properties {
        target
            .properties
            .entry(name.clone())
            .or_insert_with(|| prop.clone());
    }
    macro_rules! inherit {
        ($($field:ident),*) => {$(
            if target.$field.is_none() {
                target.$field = member.$field.clone();
            }
        )*};
    }
    inherit!(
        x_kubernetes_list_type,
        x_kubernetes_list_map_keys,
        x_kubernetes_map_type,
        x_kubernetes_preserve_unknown_fields,
        x_kubernetes_embedded_resource,
        x_kubernetes_int_or_string
    );
}

impl SchemaRegistry {
    /// Converts every definition of an OpenAPI document and maps the kinds
    /// declared by `x-kubernetes-group-version-kind`. Conversion warnings
    /// are logged, not returned; use [`OpenAPIConverter`] to inspect them.
    pub fn from_openapi(doc: &OpenAPIDocument) -> Result<SchemaRegistry, SchemaError> {
        let result = OpenAPIConverter::new().convert(doc);
        for warning in &result.warnings {
            warn!(path = %warning.path, "OpenAPI conversion: {}", warning.message);
        }
        result.into_registry()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use pretty_assertions::assert_eq;

    fn convert(json: &str) -> ConversionResult {
        OpenAPIConverter::new().convert(&OpenAPIDocument::from_json(json).unwrap())
    }

    fn type_of<'a>(result: &'a ConversionResult, name: &str) -> &'a Atom {
        &result.types.iter().find(|t| t.name == name).unwrap().atom
    }

    #[test]
    fn test_service_document() {
        let registry = testing::service_registry();
        assert_eq!(
            registry.type_name_for(&testing::service_gvk()),
            Some(testing::SERVICE_TYPE)
        );

        let schema = registry.schema();
        let Some(Atom::Struct(spec)) = schema.find_named_type("io.k8s.api.core.v1.ServiceSpec")
        else {
            panic!("ServiceSpec is not a struct");
        };

        let ports = schema.resolve(&spec.find_field("ports").unwrap().field_type).unwrap();
        let Atom::List(ports) = ports.as_ref() else {
            panic!("ports is not a list");
        };
        assert_eq!(ports.element_relationship, ElementRelationship::Associative);
        assert_eq!(ports.keys, vec!["port".to_string(), "protocol".to_string()]);
        assert_eq!(
            ports.element_type,
            TypeRef::named("io.k8s.api.core.v1.ServicePort")
        );

        let selector = schema.resolve(&spec.find_field("selector").unwrap().field_type).unwrap();
        assert!(matches!(selector.as_ref(), Atom::Map(m) if m.element_relationship == ElementRelationship::Atomic));
        let cluster_ips = schema.resolve(&spec.find_field("clusterIPs").unwrap().field_type).unwrap();
        assert!(cluster_ips.is_atomic());

        let Some(Atom::Struct(port)) = schema.find_named_type("io.k8s.api.core.v1.ServicePort")
        else {
            panic!("ServicePort is not a struct");
        };
        assert_eq!(
            port.find_field("protocol").unwrap().default,
            Some(Value::from("TCP"))
        );
        assert_eq!(
            schema.find_named_type("io.k8s.apimachinery.pkg.util.intstr.IntOrString"),
            Some(&Atom::Scalar(Scalar::Untyped))
        );
    }

    #[test]
    fn test_preserve_unknown_fields() {
        let result = convert(
            r#"{
                "swagger": "2.0",
                "definitions": {
                    "Raw": {"type": "object", "x-kubernetes-preserve-unknown-fields": true},
                    "Partial": {
                        "type": "object",
                        "properties": {"name": {"type": "string"}},
                        "x-kubernetes-preserve-unknown-fields": true
                    }
                }
            }"#,
        );
        assert!(result.warnings.is_empty());
        assert_eq!(
            type_of(&result, "Raw"),
            &Atom::Untyped(ElementRelationship::Separable)
        );
        let Atom::Struct(partial) = type_of(&result, "Partial") else {
            panic!("Partial is not a struct");
        };
        assert_eq!(partial.member_type("other"), Some(&TypeRef::named(UNTYPED_DEDUCED)));
    }

    #[test]
    fn test_list_types() {
        let result = convert(
            r#"{
                "swagger": "2.0",
                "definitions": {
                    "Lists": {
                        "type": "object",
                        "properties": {
                            "finalizers": {
                                "type": "array",
                                "items": {"type": "string"},
                                "x-kubernetes-patch-strategy": "merge"
                            },
                            "tags": {
                                "type": "array",
                                "items": {"type": "string"},
                                "x-kubernetes-list-type": "set"
                            },
                            "containers": {
                                "type": "array",
                                "items": {"type": "object", "properties": {"name": {"type": "string"}}},
                                "x-kubernetes-patch-strategy": "merge",
                                "x-kubernetes-patch-merge-key": "name"
                            },
                            "args": {"type": "array", "items": {"type": "string"}},
                            "broken": {
                                "type": "array",
                                "items": {"type": "string"},
                                "x-kubernetes-list-type": "map"
                            }
                        }
                    }
                }
            }"#,
        );
        let Atom::Struct(lists) = type_of(&result, "Lists") else {
            panic!("Lists is not a struct");
        };
        let list = |name: &str| match &lists.find_field(name).unwrap().field_type.target {
            crate::schema::TypeTarget::Inline(atom) => match atom.as_ref() {
                Atom::List(l) => (l.element_relationship, l.keys.clone()),
                other => panic!("{} is {:?}", name, other),
            },
            other => panic!("{} is {:?}", name, other),
        };

        assert_eq!(list("finalizers"), (ElementRelationship::Associative, vec![]));
        assert_eq!(list("tags"), (ElementRelationship::Associative, vec![]));
        assert_eq!(
            list("containers"),
            (ElementRelationship::Associative, vec!["name".to_string()])
        );
        assert_eq!(list("args"), (ElementRelationship::Atomic, vec![]));
        assert_eq!(list("broken"), (ElementRelationship::Atomic, vec![]));
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].path, "Lists.broken");
    }

    #[test]
    fn test_v3_all_of_reference_with_default() {
        let result = convert(
            r##"{
                "openapi": "3.0.0",
                "components": {"schemas": {
                    "Policy": {"type": "string"},
                    "Spec": {
                        "type": "object",
                        "properties": {
                            "policy": {
                                "allOf": [{"$ref": "#/components/schemas/Policy"}],
                                "default": "Cluster"
                            },
                            "port": {
                                "anyOf": [{"type": "integer"}, {"type": "string"}]
                            }
                        }
                    }
                }}
            }"##,
        );
        let Atom::Struct(spec) = type_of(&result, "Spec") else {
            panic!("Spec is not a struct");
        };
        let policy = spec.find_field("policy").unwrap();
        assert_eq!(policy.field_type, TypeRef::named("Policy"));
        assert_eq!(policy.default, Some(Value::from("Cluster")));
        assert_eq!(
            spec.find_field("port").unwrap().field_type,
            TypeRef::inline(Atom::Scalar(Scalar::Untyped))
        );
    }

    #[test]
    fn test_unconvertible_definitions_become_untyped() {
        let result = convert(
            r##"{
                "swagger": "2.0",
                "definitions": {
                    "Alias": {"$ref": "#/definitions/Target"},
                    "Dangling": {"$ref": "#/definitions/Nowhere"},
                    "Odd": {"type": "file"},
                    "Holder": {
                        "type": "object",
                        "properties": {"missing": {"$ref": "#/definitions/Nowhere"}}
                    },
                    "Target": {"type": "object", "properties": {"a": {"type": "string"}}}
                }
            }"##,
        );
        assert_eq!(type_of(&result, "Alias"), type_of(&result, "Target"));
        assert_eq!(
            type_of(&result, "Dangling"),
            &Atom::Untyped(ElementRelationship::Separable)
        );
        assert_eq!(
            type_of(&result, "Odd"),
            &Atom::Untyped(ElementRelationship::Separable)
        );
        let paths: Vec<&str> = result.warnings.iter().map(|w| w.path.as_str()).collect();
        assert_eq!(paths, vec!["Dangling", "Holder.missing", "Odd"]);

        // Every fallback still resolves, so the registry builds.
        assert!(result.into_registry().is_ok());
    }

    #[test]
    fn test_reference_cycle_terminates() {
        let result = convert(
            r##"{
                "swagger": "2.0",
                "definitions": {
                    "A": {"$ref": "#/definitions/B"},
                    "B": {"$ref": "#/definitions/A"}
                }
            }"##,
        );
        assert_eq!(type_of(&result, "A"), &Atom::Untyped(ElementRelationship::Separable));
        assert_eq!(result.warnings.len(), 2);
    }
}
