//! Comparing two values of the same type.

use super::keys::list_item_to_path_element;
use super::typed_value::{collect_field_set, member_type, resolve, Shape, TypedValue};
use super::validation::{ValidationError, ValidationErrors};
use crate::fieldpath::{Path, PathElement, Set};
use crate::schema::{Schema, TypeRef};
use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Comparison holds the result of comparing two TypedValues.
///
/// No field will appear in more than one of the three fieldsets.
/// If all of the fieldsets are empty, then the objects must have been equal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Comparison {
    /// Fields that were in the left-hand side but not the right-hand side.
    pub removed: Set,
    /// Fields that were in both but had different values.
    pub modified: Set,
    /// Fields that were in the right-hand side but not the left-hand side.
    pub added: Set,
}

impl Comparison {
    pub fn new() -> Self {
        Comparison::default()
    }

    pub fn is_same(&self) -> bool {
        self.removed.is_empty() && self.modified.is_empty() && self.added.is_empty()
    }

    /// Excludes the given fields from the comparison result.
    pub fn exclude_fields(&mut self, fields: &Set) {
        self.removed = self.removed.difference(fields);
        self.modified = self.modified.difference(fields);
        self.added = self.added.difference(fields);
    }

    /// Filters the comparison to only include the given fields.
    pub fn filter_fields(&mut self, fields: &Set) {
        self.removed = self.removed.intersection(fields);
        self.modified = self.modified.intersection(fields);
        self.added = self.added.intersection(fields);
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (title, set) in [
            ("Modified Fields", &self.modified),
            ("Added Fields", &self.added),
            ("Removed Fields", &self.removed),
        ] {
            if set.is_empty() {
                continue;
            }
            writeln!(f, "- {}:", title)?;
            for path in set.paths() {
                writeln!(f, "  {}", path)?;
            }
        }
        Ok(())
    }
}

impl TypedValue<'_> {
    /// Compares this value (the old one) with `rhs` (the new one).
    ///
    /// A subtree present on one side only contributes its own path and
    /// every field below it. Elements of associative lists are matched by
    /// key, so reordering a list is not a change.
    pub fn compare(&self, rhs: &TypedValue<'_>) -> Result<Comparison, ValidationErrors> {
        if self.type_ref() != rhs.type_ref() {
            return Err(ValidationError::type_mismatch(
                &Path::new(),
                format!("{:?}", self.type_ref()),
                format!("{:?}", rhs.type_ref()),
            )
            .into());
        }

        let mut comparison = Comparison::new();
        compare_values(
            self.schema(),
            self.as_value(),
            rhs.as_value(),
            self.type_ref(),
            &mut Path::new(),
            &mut comparison,
        )?;
        Ok(comparison)
    }
}

fn compare_values(
    schema: &Schema,
    lhs: &Value,
    rhs: &Value,
    tr: &TypeRef,
    path: &mut Path,
    cmp: &mut Comparison,
) -> Result<(), ValidationError> {
    let atom = resolve(schema, tr, path)?;
    match (Shape::of(&atom, lhs), Shape::of(&atom, rhs)) {
        (Shape::Map(l), Shape::Map(r)) => {
            let mut names: Vec<&String> = l.keys().chain(r.keys()).collect();
            names.sort();
            names.dedup();
            for name in names {
                let child_type = member_type(&atom, name).ok_or_else(|| {
                    ValidationError::unknown_field(&path.with(PathElement::field_name(name.clone())))
                })?;
                path.push(PathElement::field_name(name.clone()));
                compare_children(schema, l.get(name), r.get(name), &child_type, path, cmp)?;
                path.pop();
            }
        }
        (Shape::List(list, l), Shape::List(_, r)) => {
            let index = |items: &[Value]| -> Result<BTreeMap<PathElement, usize>, ValidationError> {
                let mut out = BTreeMap::new();
                for (i, item) in items.iter().enumerate() {
                    let pe = list_item_to_path_element(schema, list, i, item)
                        .map_err(|reason| ValidationError::invalid_list_element(path, i, reason))?;
                    out.insert(pe, i);
                }
                Ok(out)
            };
            let lhs_index = index(l)?;
            let rhs_index = index(r)?;

            let mut elements: Vec<&PathElement> = lhs_index.keys().chain(rhs_index.keys()).collect();
            elements.sort();
            elements.dedup();
            for pe in elements {
                let lhs_item = lhs_index.get(pe).map(|&i| &l[i]);
                let rhs_item = rhs_index.get(pe).map(|&i| &r[i]);
                path.push(pe.clone());
                compare_children(schema, lhs_item, rhs_item, &list.element_type, path, cmp)?;
                path.pop();
            }
        }
        _ => {
            if lhs != rhs {
                cmp.modified.insert(path);
                collect_below(schema, lhs, tr, path, &mut cmp.removed)?;
                collect_below(schema, rhs, tr, path, &mut cmp.added)?;
            }
        }
    }
    Ok(())
}

fn compare_children(
    schema: &Schema,
    lhs: Option<&Value>,
    rhs: Option<&Value>,
    tr: &TypeRef,
    path: &mut Path,
    cmp: &mut Comparison,
) -> Result<(), ValidationError> {
    match (lhs, rhs) {
        (Some(l), Some(r)) => compare_values(schema, l, r, tr, path, cmp),
        (Some(l), None) => {
            cmp.removed.insert(path);
            collect_field_set(schema, l, tr, path, &mut cmp.removed)
        }
        (None, Some(r)) => {
            cmp.added.insert(path);
            collect_field_set(schema, r, tr, path, &mut cmp.added)
        }
        (None, None) => Ok(()),
    }
}

/// The fields strictly below `path` in `value`.
fn collect_below(
    schema: &Schema,
    value: &Value,
    tr: &TypeRef,
    path: &mut Path,
    set: &mut Set,
) -> Result<(), ValidationError> {
    let mut below = Set::new();
    collect_field_set(schema, value, tr, path, &mut below)?;
    below = below.difference(&Set::from_paths([&*path]));
    *set = set.union(&below);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::ParseableType;
    use pretty_assertions::assert_eq;

    const SCHEMA: &str = r#"
types:
- name: object
  map:
    fields:
    - name: name
      type:
        scalar: string
    - name: replicas
      type:
        scalar: numeric
    - name: ports
      type:
        list:
          elementType:
            namedType: port
          elementRelationship: associative
          keys: [port]
    - name: args
      type:
        list:
          elementType:
            scalar: string
          elementRelationship: atomic
    - name: spec
      type:
        namedType: __untyped_deduced_
- name: port
  map:
    fields:
    - name: port
      type:
        scalar: numeric
    - name: name
      type:
        scalar: string
"#;

    fn compare(lhs: &str, rhs: &str) -> Comparison {
        let schema = Schema::from_yaml(SCHEMA).unwrap();
        let pt = ParseableType::new(&schema, TypeRef::named("object"));
        let lhs = pt.from_yaml(lhs).unwrap();
        let rhs = pt.from_yaml(rhs).unwrap();
        lhs.compare(&rhs).unwrap()
    }

    fn paths(set: &Set) -> Vec<String> {
        set.paths().iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_identical_values() {
        let doc = "{name: a, ports: [{port: 80}], args: [x]}";
        assert!(compare(doc, doc).is_same());
    }

    #[test]
    fn test_added_removed_modified() {
        let cmp = compare(
            "{name: a, replicas: 1, ports: [{port: 80, name: http}]}",
            "{name: b, args: [x], ports: [{port: 80}, {port: 443, name: https}]}",
        );
        assert_eq!(paths(&cmp.modified), vec![".name"]);
        assert_eq!(
            paths(&cmp.added),
            vec![".args", ".ports[port=443]", ".ports[port=443].name", ".ports[port=443].port"]
        );
        assert_eq!(paths(&cmp.removed), vec![".ports[port=80].name", ".replicas"]);
    }

    #[test]
    fn test_reordering_keyed_list_is_not_a_change() {
        assert!(compare(
            "{ports: [{port: 80}, {port: 443}]}",
            "{ports: [{port: 443}, {port: 80}]}"
        )
        .is_same());
    }

    #[test]
    fn test_atomic_and_untyped_leaves() {
        let cmp = compare("{args: [x], spec: {a: [1]}}", "{args: [y], spec: {a: [2]}}");
        assert_eq!(paths(&cmp.modified), vec![".args", ".spec.a"]);
        assert!(cmp.added.is_empty() && cmp.removed.is_empty());
    }

    #[test]
    fn test_changed_kind_reports_subtrees() {
        let cmp = compare("{spec: {a: 1}}", "{spec: 5}");
        assert_eq!(paths(&cmp.modified), vec![".spec"]);
        assert_eq!(paths(&cmp.removed), vec![".spec.a"]);
        assert!(cmp.added.is_empty());
    }

    #[test]
    fn test_exclude_and_filter() {
        let mut cmp = compare("{name: a, replicas: 1}", "{name: b, replicas: 2}");
        let name = Set::from_paths(&[Path::from_elements(vec![PathElement::field_name("name")])]);

        let mut filtered = cmp.clone();
        filtered.filter_fields(&name);
        assert_eq!(paths(&filtered.modified), vec![".name"]);

        cmp.exclude_fields(&name);
        assert_eq!(paths(&cmp.modified), vec![".replicas"]);
        assert_eq!(cmp.to_string(), "- Modified Fields:\n  .replicas\n");
    }

    #[test]
    fn test_root_scalar_change() {
        let pt = crate::typed::deduced_parseable_type();
        let cmp = pt
            .from_yaml("1")
            .unwrap()
            .compare(&pt.from_yaml("2").unwrap())
            .unwrap();
        assert!(cmp.modified.root_in_set());
    }
}
