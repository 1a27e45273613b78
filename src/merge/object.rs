//! Moving managed fields in and out of an object's metadata.

use crate::fieldpath::{DecodeError, ManagedFields, ManagedFieldsEntry, ManagerId};
use crate::typed::TypedValue;
use crate::value::{Map, Value};

const METADATA: &str = "metadata";
const MANAGED_FIELDS: &str = "managedFields";

/// Removes `metadata.managedFields` from `object` and decodes it.
///
/// An object without the field has no managers.
pub fn split_managed_fields(mut object: Value) -> Result<(Value, ManagedFields), DecodeError> {
    let raw = object
        .as_map_mut()
        .and_then(|m| m.get_mut(METADATA))
        .and_then(Value::as_map_mut)
        .and_then(|metadata| metadata.delete(MANAGED_FIELDS));

    let managers = match raw {
        None | Some(Value::Null) => ManagedFields::new(),
        Some(raw) => {
            let entries: Vec<ManagedFieldsEntry> =
                serde_json::from_value(serde_json::Value::from(&raw))?;
            ManagedFields::from_entries(entries)?
        }
    };
    Ok((object, managers))
}

/// Writes `managers` into `metadata.managedFields`, removing the field
/// when there are none. Objects that are not maps are returned as is.
pub fn join_managed_fields(
    mut object: Value,
    managers: &ManagedFields,
) -> Result<Value, serde_json::Error> {
    let Some(map) = object.as_map_mut() else {
        return Ok(object);
    };
    if managers.is_empty() {
        if let Some(metadata) = map.get_mut(METADATA).and_then(Value::as_map_mut) {
            metadata.delete(MANAGED_FIELDS);
        }
        return Ok(object);
    }

    let entries = Value::from(serde_json::to_value(managers.to_entries())?);
    match map.get_mut(METADATA).and_then(Value::as_map_mut) {
        Some(metadata) => metadata.set(MANAGED_FIELDS, entries),
        None => {
            let mut metadata = Map::new();
            metadata.set(MANAGED_FIELDS, entries);
            map.set(METADATA, Value::Map(metadata));
        }
    }
    Ok(object)
}

/// The part of `object` that `id` owns: its leaves plus the key fields
/// that locate them. `None` when `id` has no record.
///
/// A member with children only marks that the manager set the container;
/// the children are extracted only when the manager owns them too.
pub fn extract_owned<'s>(
    object: &TypedValue<'s>,
    managers: &ManagedFields,
    id: &ManagerId,
) -> Option<TypedValue<'s>> {
    let owned = managers.get(id)?;
    Some(object.extract_items(&owned.set.leaves()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fieldpath::{ManagerId, Operation};
    use crate::testing::SERVICE_LIVE;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_live_service() {
        let (object, managers) = split_managed_fields(Value::from_json(SERVICE_LIVE).unwrap()).unwrap();

        let ids: Vec<&ManagerId> = managers.iter().map(|(id, _)| id).collect();
        assert_eq!(
            ids,
            vec![
                &ManagerId::new("kubectl-client-side-apply", Operation::Update),
                &ManagerId::new("kubectl-edit", Operation::Update),
            ]
        );
        let metadata = object.as_map().unwrap().get(METADATA).unwrap().as_map().unwrap();
        assert!(!metadata.has(MANAGED_FIELDS));
        assert!(metadata.has("name"));
    }

    #[test]
    fn test_join_round_trip() {
        let original = Value::from_json(SERVICE_LIVE).unwrap();
        let (object, managers) = split_managed_fields(original.clone()).unwrap();
        assert_eq!(join_managed_fields(object, &managers).unwrap(), original);
    }

    #[test]
    fn test_join_without_managers_or_metadata() {
        let object = Value::from_json(r#"{"metadata":{"name":"a","managedFields":[]}}"#).unwrap();
        assert_eq!(
            join_managed_fields(object, &ManagedFields::new()).unwrap(),
            Value::from_json(r#"{"metadata":{"name":"a"}}"#).unwrap()
        );

        let (_, managers) = split_managed_fields(Value::from_json(SERVICE_LIVE).unwrap()).unwrap();
        let joined = join_managed_fields(Value::from_json("{}").unwrap(), &managers).unwrap();
        assert!(joined.as_map().unwrap().get(METADATA).is_some());

        assert_eq!(
            join_managed_fields(Value::from("x"), &managers).unwrap(),
            Value::from("x")
        );
    }

    #[test]
    fn test_split_rejects_bad_records() {
        let object = Value::from_json(
            r#"{"metadata":{"managedFields":[{"manager":"a","operation":"Apply","fieldsType":"FieldsV2"}]}}"#,
        )
        .unwrap();
        assert!(matches!(
            split_managed_fields(object),
            Err(DecodeError::UnsupportedFieldsType(_))
        ));
    }
}
