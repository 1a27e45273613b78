//! Conflicts between an applier and the other managers of an object.

use crate::fieldpath::{ManagedFields, ManagerId, Path, Set};
use std::fmt;

/// A field another manager owns whose value an apply would change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub manager: ManagerId,
    pub path: Path,
}

impl Conflict {
    pub fn new(manager: ManagerId, path: Path) -> Self {
        Conflict { manager, path }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conflict with {} at {}", self.manager, self.path)
    }
}

/// Conflicts is a collection of conflicts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conflicts {
    conflicts: Vec<Conflict>,
}

impl Conflicts {
    pub fn new() -> Self {
        Conflicts::default()
    }

    /// Every path in `changed` owned by a manager other than `writer`.
    pub fn between(managers: &ManagedFields, writer: &ManagerId, changed: &Set) -> Self {
        let mut conflicts = Conflicts::new();
        for (id, vs) in managers.iter() {
            if id == writer {
                continue;
            }
            for path in vs.set.intersection(changed).paths() {
                conflicts.add(Conflict::new(id.clone(), path));
            }
        }
        conflicts
    }

    pub fn add(&mut self, conflict: Conflict) {
        self.conflicts.push(conflict);
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Conflict> {
        self.conflicts.iter()
    }

    /// The conflicting paths, whoever owns them.
    pub fn to_set(&self) -> Set {
        Set::from_paths(self.conflicts.iter().map(|c| &c.path))
    }
}

impl IntoIterator for Conflicts {
    type Item = Conflict;
    type IntoIter = std::vec::IntoIter<Conflict>;

    fn into_iter(self) -> Self::IntoIter {
        self.conflicts.into_iter()
    }
}

impl fmt::Display for Conflicts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, conflict) in self.conflicts.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", conflict)?;
        }
        Ok(())
    }
}

impl std::error::Error for Conflicts {}
