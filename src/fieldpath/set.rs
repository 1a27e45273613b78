//! Field sets: sparse trees of paths.

use super::path::{Path, PathElement};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A sorted, deduplicated set of path elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathElementSet {
    members: Vec<PathElement>,
}

impl PathElementSet {
    pub fn new() -> Self {
        PathElementSet::default()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, element: &PathElement) -> bool {
        self.members.binary_search(element).is_ok()
    }

    pub fn insert(&mut self, element: PathElement) {
        if let Err(pos) = self.members.binary_search(&element) {
            self.members.insert(pos, element);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathElement> {
        self.members.iter()
    }

    pub fn union(&self, other: &PathElementSet) -> PathElementSet {
        self.merge_with(other, true, true, true)
    }

    pub fn intersection(&self, other: &PathElementSet) -> PathElementSet {
        self.merge_with(other, false, true, false)
    }

    pub fn difference(&self, other: &PathElementSet) -> PathElementSet {
        self.merge_with(other, true, false, false)
    }

    /// Walks both sorted lists once, keeping elements found only on the
    /// left, on both sides, or only on the right as requested.
    fn merge_with(
        &self,
        other: &PathElementSet,
        keep_left: bool,
        keep_both: bool,
        keep_right: bool,
    ) -> PathElementSet {
        let (a, b) = (&self.members, &other.members);
        let mut out = Vec::with_capacity(a.len().max(b.len()));
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                Ordering::Less => {
                    if keep_left {
                        out.push(a[i].clone());
                    }
                    i += 1;
                }
                Ordering::Greater => {
                    if keep_right {
                        out.push(b[j].clone());
                    }
                    j += 1;
                }
                Ordering::Equal => {
                    if keep_both {
                        out.push(a[i].clone());
                    }
                    i += 1;
                    j += 1;
                }
            }
        }
        if keep_left {
            out.extend(a[i..].iter().cloned());
        }
        if keep_right {
            out.extend(b[j..].iter().cloned());
        }
        PathElementSet { members: out }
    }
}

impl FromIterator<PathElement> for PathElementSet {
    fn from_iter<I: IntoIterator<Item = PathElement>>(iter: I) -> Self {
        let mut members: Vec<PathElement> = iter.into_iter().collect();
        members.sort();
        members.dedup();
        PathElementSet { members }
    }
}

/// A set of paths stored as a tree.
///
/// A path is in the set when its last element is a member of the node its
/// prefix leads to. Nodes in `children` exist only to reach deeper paths;
/// a child subtree is never left empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Set {
    members: PathElementSet,
    children: BTreeMap<PathElement, Set>,
    root_in_set: bool,
}

impl Set {
    pub fn new() -> Self {
        Set::default()
    }

    pub fn from_paths<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Self {
        let mut set = Set::new();
        for path in paths {
            set.insert(path);
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        !self.root_in_set && self.members.is_empty() && self.children.is_empty()
    }

    /// Number of paths in the set.
    pub fn size(&self) -> usize {
        usize::from(self.root_in_set)
            + self.members.len()
            + self.children.values().map(Set::size).sum::<usize>()
    }

    pub fn members(&self) -> &PathElementSet {
        &self.members
    }

    pub fn has_member(&self, element: &PathElement) -> bool {
        self.members.contains(element)
    }

    /// The subtree of paths below `element`, if any.
    pub fn child(&self, element: &PathElement) -> Option<&Set> {
        self.children.get(element)
    }

    pub fn children(&self) -> impl Iterator<Item = (&PathElement, &Set)> {
        self.children.iter()
    }

    pub fn root_in_set(&self) -> bool {
        self.root_in_set
    }

    pub fn has(&self, path: &Path) -> bool {
        let Some((last, prefix)) = path.as_slice().split_last() else {
            return self.root_in_set;
        };
        let mut node = self;
        for element in prefix {
            match node.children.get(element) {
                Some(child) => node = child,
                None => return false,
            }
        }
        node.members.contains(last)
    }

    pub fn insert(&mut self, path: &Path) {
        let Some((last, prefix)) = path.as_slice().split_last() else {
            self.root_in_set = true;
            return;
        };
        let mut node = self;
        for element in prefix {
            node = node.children.entry(element.clone()).or_default();
        }
        node.members.insert(last.clone());
    }

    pub(crate) fn insert_member(&mut self, element: PathElement) {
        self.members.insert(element);
    }

    pub(crate) fn insert_child(&mut self, element: PathElement, child: Set) {
        if !child.is_empty() {
            self.children.insert(element, child);
        }
    }

    pub(crate) fn set_root(&mut self, root: bool) {
        self.root_in_set = root;
    }

    pub fn union(&self, other: &Set) -> Set {
        let mut children = self.children.clone();
        for (key, theirs) in &other.children {
            let merged = match children.get(key) {
                Some(ours) => ours.union(theirs),
                None => theirs.clone(),
            };
            children.insert(key.clone(), merged);
        }
        Set {
            members: self.members.union(&other.members),
            children,
            root_in_set: self.root_in_set || other.root_in_set,
        }
    }

    pub fn intersection(&self, other: &Set) -> Set {
        let mut out = Set {
            members: self.members.intersection(&other.members),
            children: BTreeMap::new(),
            root_in_set: self.root_in_set && other.root_in_set,
        };
        for (key, ours) in &self.children {
            if let Some(theirs) = other.children.get(key) {
                out.insert_child(key.clone(), ours.intersection(theirs));
            }
        }
        out
    }

    /// Paths in `self` that are not in `other`. Membership is exact: a
    /// member of `other` does not remove the paths below it.
    pub fn difference(&self, other: &Set) -> Set {
        let mut out = Set {
            members: self.members.difference(&other.members),
            children: BTreeMap::new(),
            root_in_set: self.root_in_set && !other.root_in_set,
        };
        for (key, ours) in &self.children {
            let child = match other.children.get(key) {
                Some(theirs) => ours.difference(theirs),
                None => ours.clone(),
            };
            out.insert_child(key.clone(), child);
        }
        out
    }

    /// Paths in `self` that neither are in `other` nor lie below a path
    /// in `other`.
    pub fn recursive_difference(&self, other: &Set) -> Set {
        if other.root_in_set {
            return Set::new();
        }
        let mut out = Set {
            members: self.members.difference(&other.members),
            children: BTreeMap::new(),
            root_in_set: self.root_in_set,
        };
        for (key, ours) in &self.children {
            if other.members.contains(key) {
                continue;
            }
            let child = match other.children.get(key) {
                Some(theirs) => ours.recursive_difference(theirs),
                None => ours.clone(),
            };
            out.insert_child(key.clone(), child);
        }
        out
    }

    /// The paths with nothing below them in the set.
    pub fn leaves(&self) -> Set {
        let members = self
            .members
            .iter()
            .filter(|m| !self.children.contains_key(m))
            .cloned()
            .collect();
        let mut out = Set {
            members,
            children: BTreeMap::new(),
            root_in_set: false,
        };
        for (key, child) in &self.children {
            out.insert_child(key.clone(), child.leaves());
        }
        out
    }

    /// Visits every path in sorted order.
    pub fn iterate<F>(&self, mut f: F)
    where
        F: FnMut(&Path),
    {
        let mut path = Path::new();
        if self.root_in_set {
            f(&path);
        }
        self.iterate_from(&mut path, &mut f);
    }

    fn iterate_from<F>(&self, path: &mut Path, f: &mut F)
    where
        F: FnMut(&Path),
    {
        let mut children = self.children.iter().peekable();
        for member in self.members.iter() {
            while let Some((key, child)) = children.next_if(|(k, _)| *k < member) {
                path.push(key.clone());
                child.iterate_from(path, f);
                path.pop();
            }
            path.push(member.clone());
            f(path);
            path.pop();
        }
        for (key, child) in children {
            path.push(key.clone());
            child.iterate_from(path, f);
            path.pop();
        }
    }

    pub fn paths(&self) -> Vec<Path> {
        let mut out = Vec::with_capacity(self.size());
        self.iterate(|p| out.push(p.clone()));
        out
    }
}

impl fmt::Display for Set {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for path in self.paths() {
            writeln!(f, "{}", path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn path(names: &[&str]) -> Path {
        names.iter().map(|n| PathElement::field_name(*n)).collect()
    }

    fn set(paths: &[&[&str]]) -> Set {
        let paths: Vec<Path> = paths.iter().map(|p| path(p)).collect();
        Set::from_paths(&paths)
    }

    #[test]
    fn test_element_set_operations() {
        let a: PathElementSet = ["a", "b"].iter().map(|n| PathElement::field_name(*n)).collect();
        let b: PathElementSet = ["b", "c"].iter().map(|n| PathElement::field_name(*n)).collect();

        assert_eq!(a.union(&b).len(), 3);
        assert_eq!(
            a.intersection(&b).iter().collect::<Vec<_>>(),
            vec![&PathElement::field_name("b")]
        );
        assert_eq!(
            a.difference(&b).iter().collect::<Vec<_>>(),
            vec![&PathElement::field_name("a")]
        );
    }

    #[test]
    fn test_insert_and_has() {
        let mut s = Set::new();
        assert!(s.is_empty());
        s.insert(&path(&["metadata", "name"]));
        assert!(s.has(&path(&["metadata", "name"])));
        assert!(!s.has(&path(&["metadata"])));
        assert!(!s.has(&Path::new()));

        s.insert(&Path::new());
        assert!(s.has(&Path::new()));
        assert_eq!(s.size(), 2);
    }

    #[test]
    fn test_union_intersection_difference() {
        let a = set(&[&["a", "x"], &["b"]]);
        let b = set(&[&["a", "y"], &["b"]]);

        assert_eq!(a.union(&b), set(&[&["a", "x"], &["a", "y"], &["b"]]));
        assert_eq!(a.intersection(&b), set(&[&["b"]]));
        assert_eq!(a.difference(&b), set(&[&["a", "x"]]));
        assert!(a.difference(&a).is_empty());
    }

    #[test]
    fn test_difference_is_exact() {
        let owned = set(&[&["spec"], &["spec", "replicas"]]);
        let removed = set(&[&["spec"]]);
        assert_eq!(owned.difference(&removed), set(&[&["spec", "replicas"]]));
    }

    #[test]
    fn test_recursive_difference_drops_subtrees() {
        let owned = set(&[&["spec", "replicas"], &["status"], &["status", "phase"], &["kind"]]);
        let ignored = set(&[&["status"]]);
        assert_eq!(
            owned.recursive_difference(&ignored),
            set(&[&["spec", "replicas"], &["kind"]])
        );

        let mut everything = Set::new();
        everything.insert(&Path::new());
        assert!(owned.recursive_difference(&everything).is_empty());
    }

    #[test]
    fn test_leaves_drop_members_with_children() {
        let s = set(&[
            &["spec", "ports"],
            &["spec", "ports", "name"],
            &["spec", "selector"],
            &["metadata", "labels", "app"],
        ]);
        assert_eq!(
            s.leaves(),
            set(&[
                &["spec", "ports", "name"],
                &["spec", "selector"],
                &["metadata", "labels", "app"],
            ])
        );
    }

    #[test]
    fn test_iterate_in_order() {
        let s = set(&[&["b"], &["a", "c"], &["c"]]);
        let rendered: Vec<String> = s.paths().iter().map(|p| p.to_string()).collect();
        assert_eq!(rendered, vec![".a.c", ".b", ".c"]);
        assert_eq!(s.to_string(), ".a.c\n.b\n.c\n");
    }
}
