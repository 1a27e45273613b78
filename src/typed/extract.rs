//! Extracting the part of a value a field set names.

use super::keys::list_item_to_path_element;
use super::typed_value::{member_type, Shape, TypedValue};
use crate::fieldpath::{PathElement, Set};
use crate::schema::{Schema, TypeRef};
use crate::value::{Map, Value};

impl<'s> TypedValue<'s> {
    /// Returns the sub-object holding exactly the fields in `items`.
    ///
    /// A member keeps its whole subtree. Maps on the way to a member are
    /// rebuilt with only the extracted entries. An associative-list element
    /// that is only partly extracted also keeps the key fields present on
    /// the original element, so the result can be merged back by key.
    /// Nothing is defaulted. If nothing is extracted the result is null.
    pub fn extract_items(&self, items: &Set) -> TypedValue<'s> {
        let value = if items.root_in_set() {
            self.as_value().clone()
        } else {
            extract(self.schema(), self.as_value(), self.type_ref(), items).unwrap_or_default()
        };
        self.with_value(value)
    }
}

fn extract(schema: &Schema, value: &Value, tr: &TypeRef, items: &Set) -> Option<Value> {
    let atom = schema.resolve(tr)?;
    match Shape::of(&atom, value) {
        Shape::Leaf => None,
        Shape::Map(map) => {
            let mut out = Map::new();
            for (name, child) in map.iter() {
                let pe = PathElement::field_name(name.clone());
                if items.has_member(&pe) {
                    out.set(name.clone(), child.clone());
                } else if let Some(below) = items.child(&pe) {
                    let extracted = member_type(&atom, name)
                        .and_then(|child_type| extract(schema, child, &child_type, below));
                    if let Some(extracted) = extracted {
                        out.set(name.clone(), extracted);
                    }
                }
            }
            (!out.is_empty()).then_some(Value::Map(out))
        }
        Shape::List(list, elements) => {
            let mut out = Vec::new();
            for (i, item) in elements.iter().enumerate() {
                // An element without its keys cannot be named by a keyed
                // path, so addressing it by index only ever misses.
                let pe = list_item_to_path_element(schema, list, i, item)
                    .unwrap_or(PathElement::Index(i));
                if items.has_member(&pe) {
                    out.push(item.clone());
                    continue;
                }
                let Some(below) = items.child(&pe) else {
                    continue;
                };
                let Some(mut extracted) = extract(schema, item, &list.element_type, below) else {
                    continue;
                };
                if let (Some(original), Some(partial)) = (item.as_map(), extracted.as_map_mut()) {
                    for key in &list.keys {
                        if let Some(key_value) = original.get(key) {
                            partial.set(key.clone(), key_value.clone());
                        }
                    }
                }
                out.push(extracted);
            }
            (!out.is_empty()).then_some(Value::List(out))
        }
    }
}
