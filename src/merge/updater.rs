//! Updater: applies and updates over a live object and its managed fields.

use super::Conflicts;
use crate::fieldpath::{APIVersion, ManagedFields, ManagerId, Set, VersionedSet};
use crate::typed::{MergeError, TypedValue, ValidationErrors};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Who is writing, at which version and time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub manager: String,
    pub api_version: APIVersion,
    pub time: DateTime<Utc>,
    /// Take ownership of applied fields away from other managers.
    pub force: bool,
}

impl Request {
    pub fn new(manager: impl Into<String>, api_version: APIVersion, time: DateTime<Utc>) -> Self {
        Request {
            manager: manager.into(),
            api_version,
            time,
            force: false,
        }
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// The merged object and the managed fields that go with it.
#[derive(Debug, Clone)]
pub struct MergeResult<'s> {
    pub object: TypedValue<'s>,
    pub managers: ManagedFields,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApplyError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),

    #[error("apply failed with conflicts:\n{0}")]
    Conflicts(Conflicts),
}

/// UpdaterBuilder is a builder for creating an Updater.
#[derive(Debug, Clone, Default)]
pub struct UpdaterBuilder {
    ignored_fields: HashMap<APIVersion, Set>,
    detect_conflicts: bool,
}

impl UpdaterBuilder {
    pub fn new() -> Self {
        UpdaterBuilder::default()
    }

    /// Paths (and everything below them) that are never recorded as
    /// owned for writes at `version`.
    pub fn ignored_fields(mut self, version: APIVersion, fields: Set) -> Self {
        self.ignored_fields.insert(version, fields);
        self
    }

    /// Reject applies that change fields other managers own, unless forced.
    pub fn detect_conflicts(mut self, detect: bool) -> Self {
        self.detect_conflicts = detect;
        self
    }

    pub fn build(self) -> Updater {
        Updater {
            ignored_fields: self.ignored_fields,
            detect_conflicts: self.detect_conflicts,
        }
    }
}

/// Updater computes the result of a write and the ownership that follows
/// from it. Inputs are never modified.
#[derive(Debug, Clone, Default)]
pub struct Updater {
    ignored_fields: HashMap<APIVersion, Set>,
    detect_conflicts: bool,
}

impl Updater {
    pub fn builder() -> UpdaterBuilder {
        UpdaterBuilder::new()
    }

    fn tracked(&self, version: &APIVersion, set: &Set) -> Set {
        match self.ignored_fields.get(version) {
            Some(ignored) => set.recursive_difference(ignored),
            None => set.clone(),
        }
    }

    /// Applies `config` on behalf of `req.manager`.
    ///
    /// The result keeps every field another manager owns and every field
    /// nobody owns, takes the applier's fields from `config`, and drops
    /// fields the applier owned before but no longer sets. The applier's
    /// record becomes exactly the fields of `config`.
    pub fn apply<'s>(
        &self,
        live: &TypedValue<'s>,
        config: &TypedValue<'_>,
        managers: &ManagedFields,
        req: &Request,
    ) -> Result<MergeResult<'s>, ApplyError> {
        let me = ManagerId::apply(&req.manager);
        let config_set = config.to_field_set()?;
        let owned_set = self.tracked(&req.api_version, &config_set);

        let unowned = live.to_field_set()?.leaves().difference(&managers.owned());
        let retained = managers
            .owned_by_others(&me)
            .leaves()
            .union(&unowned)
            .difference(&config_set);
        // The applier's own leaves are extracted too, so live element
        // order survives the merge.
        let base = live.extract_items(&retained.union(&config_set.leaves()));
        let merged = base.merge(config)?;

        let cmp = live.compare(&merged)?;
        debug!(
            manager = %req.manager,
            modified = cmp.modified.size(),
            added = cmp.added.size(),
            removed = cmp.removed.size(),
            "applied configuration"
        );

        if self.detect_conflicts && !req.force {
            let changed = cmp.modified.union(&cmp.added);
            let conflicts = Conflicts::between(managers, &me, &self.tracked(&req.api_version, &changed));
            if !conflicts.is_empty() {
                debug!(manager = %req.manager, conflicts = conflicts.len(), "apply rejected");
                return Err(ApplyError::Conflicts(conflicts));
            }
        }

        let mut out = managers.clone();
        let taken = if req.force {
            owned_set.leaves()
        } else {
            Set::new()
        };
        for (id, vs) in out.iter_mut() {
            if *id != me {
                vs.set = vs.set.difference(&cmp.removed).difference(&taken);
            }
        }
        record(&mut out, me, owned_set, req);
        out.remove_empty();

        Ok(MergeResult {
            object: merged,
            managers: out,
        })
    }

    /// Updates the live object with `new` on behalf of `req.manager`.
    ///
    /// The updater gains every field the write adds or changes and the
    /// other managers lose them.
    pub fn update<'s>(
        &self,
        live: &TypedValue<'s>,
        new: &TypedValue<'_>,
        managers: &ManagedFields,
        req: &Request,
    ) -> Result<MergeResult<'s>, ApplyError> {
        let me = ManagerId::update(&req.manager);
        let merged = live.merge(new)?;
        let cmp = live.compare(&merged)?;
        debug!(
            manager = %req.manager,
            modified = cmp.modified.size(),
            added = cmp.added.size(),
            removed = cmp.removed.size(),
            "updated object"
        );

        let changed = self.tracked(&req.api_version, &cmp.modified.union(&cmp.added));
        let touched = changed.union(&cmp.removed);

        let mut out = managers.clone();
        for (id, vs) in out.iter_mut() {
            if *id != me {
                vs.set = vs.set.difference(&touched);
            }
        }
        let mine = managers
            .get(&me)
            .map(|vs| vs.set.difference(&cmp.removed))
            .unwrap_or_default()
            .union(&changed);
        record(&mut out, me, mine, req);
        out.remove_empty();

        Ok(MergeResult {
            object: merged,
            managers: out,
        })
    }
}

/// Stores `set` as the writer's record. The version and time move only
/// when the set changes or the record is new.
fn record(managers: &mut ManagedFields, id: ManagerId, set: Set, req: &Request) {
    if managers.get(&id).is_some_and(|vs| vs.set == set) {
        return;
    }
    managers.insert(
        id,
        VersionedSet::new(set, req.api_version.clone()).with_time(req.time),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fieldpath::{Path, PathElement};
    use crate::typed::deduced_parseable_type;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn request(manager: &str) -> Request {
        Request::new(
            manager,
            APIVersion::from("v1"),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    fn field(name: &str) -> Path {
        Path::from_elements(vec![PathElement::field_name(name)])
    }

    #[test]
    fn test_update_takes_changed_fields() {
        let pt = deduced_parseable_type();
        let live = pt.from_yaml("{a: '1'}").unwrap();
        let new = pt.from_yaml("{a: '2', b: '3'}").unwrap();

        let mut managers = ManagedFields::new();
        managers.insert(
            ManagerId::apply("owner"),
            VersionedSet::new(Set::from_paths(&[field("a")]), APIVersion::from("v1")),
        );

        let result = Updater::default()
            .update(&live, &new, &managers, &request("editor"))
            .unwrap();
        assert_eq!(result.object.as_value(), new.as_value());
        assert_eq!(
            result.managers.get(&ManagerId::update("editor")).unwrap().set,
            Set::from_paths(&[field("a"), field("b")])
        );
        assert!(result.managers.get(&ManagerId::apply("owner")).is_none());
    }

    #[test]
    fn test_apply_into_empty_object() {
        let pt = deduced_parseable_type();
        let config = pt.from_yaml("{b: '2'}").unwrap();

        let result = Updater::default()
            .apply(&pt.empty(), &config, &ManagedFields::new(), &request("applier"))
            .unwrap();
        assert_eq!(result.object.as_value(), config.as_value());

        let record = result.managers.get(&ManagerId::apply("applier")).unwrap();
        assert_eq!(record.set, Set::from_paths(&[field("b")]));
        assert_eq!(record.time, Some(request("applier").time));
    }

    #[test]
    fn test_builder_options() {
        let updater = Updater::builder()
            .ignored_fields(APIVersion::from("v1"), Set::from_paths(&[field("status")]))
            .detect_conflicts(true)
            .build();
        assert!(updater.detect_conflicts);
        assert_eq!(
            updater.tracked(
                &APIVersion::from("v1"),
                &Set::from_paths(&[field("status"), field("spec")])
            ),
            Set::from_paths(&[field("spec")])
        );
        assert_eq!(
            updater.tracked(&APIVersion::from("v2"), &Set::from_paths(&[field("status")])),
            Set::from_paths(&[field("status")])
        );
    }
}
