//! Tag Index: which tags apply to an item, counting bindings inherited from ancestors.
//!
//! The free functions are the reference semantics over a list of bindings (used by the
//! in-memory store); `TagIndex` asks the same questions of an `ItemStore`, which may push
//! them down to the database.

use crate::error::PublicResult;
use crate::models::{Item, TagBinding};
use crate::path::ItemPath;
use crate::repository::ItemStore;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Deduplicates a tag set, keeping first occurrences in order.
pub fn tag_set(tag_ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = Vec::with_capacity(tag_ids.len());
    for id in tag_ids {
        if !seen.contains(id) {
            seen.push(*id);
        }
    }
    seen
}

/// True iff every tag of `tag_ids` has a binding on `path` or one of its ancestors.
pub fn covers(bindings: &[TagBinding], path: &ItemPath, tag_ids: &[Uuid]) -> bool {
    tag_set(tag_ids).iter().all(|tag_id| {
        bindings
            .iter()
            .any(|binding| binding.tag_id == *tag_id && binding.item_path.is_ancestor_of(path))
    })
}

/// paths_with_all_tags
///
/// Count-based aggregate over the bindings of the requested tags: every distinct binding
/// path is a candidate; a candidate is kept when the number of distinct requested tags
/// bound on it or on one of its ancestors equals the size of the set. Counting covering
/// bindings rather than intersecting per-tag path sets keeps a candidate whose tags are
/// bound at different depths of its ancestry.
pub fn paths_with_all_tags(bindings: &[TagBinding], tag_ids: &[Uuid]) -> Vec<ItemPath> {
    let wanted = tag_set(tag_ids);
    if wanted.is_empty() {
        return Vec::new();
    }
    let relevant: Vec<&TagBinding> = bindings
        .iter()
        .filter(|binding| wanted.contains(&binding.tag_id))
        .collect();

    let candidates: BTreeSet<&ItemPath> = relevant.iter().map(|binding| &binding.item_path).collect();

    candidates
        .into_iter()
        .filter(|candidate| {
            let covering: BTreeSet<Uuid> = relevant
                .iter()
                .filter(|binding| binding.item_path.is_ancestor_of(candidate))
                .map(|binding| binding.tag_id)
                .collect();
            covering.len() == wanted.len()
        })
        .cloned()
        .collect()
}

/// TagIndex
///
/// Tag queries bound to one store, hence to one snapshot.
pub struct TagIndex<'a> {
    store: &'a mut dyn ItemStore,
}

impl<'a> TagIndex<'a> {
    pub fn new(store: &'a mut dyn ItemStore) -> Self {
        Self { store }
    }

    pub async fn has_tag(&mut self, item: &Item, tag_id: Uuid) -> PublicResult<bool> {
        self.store.has_tags(&item.path, &[tag_id]).await
    }

    pub async fn has_all_tags(&mut self, item: &Item, tag_ids: &[Uuid]) -> PublicResult<bool> {
        let wanted = tag_set(tag_ids);
        if wanted.is_empty() {
            return Ok(true);
        }
        self.store.has_tags(&item.path, &wanted).await
    }

    pub async fn paths_with_tag(&mut self, tag_id: Uuid) -> PublicResult<Vec<ItemPath>> {
        self.store.item_paths_with_tags(&[tag_id]).await
    }

    pub async fn paths_with_all_tags(&mut self, tag_ids: &[Uuid]) -> PublicResult<Vec<ItemPath>> {
        let wanted = tag_set(tag_ids);
        if wanted.is_empty() {
            return Ok(Vec::new());
        }
        self.store.item_paths_with_tags(&wanted).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(value: &str) -> ItemPath {
        value.parse().unwrap()
    }

    fn bind(tag_id: Uuid, item_path: &str) -> TagBinding {
        TagBinding {
            tag_id,
            item_path: path(item_path),
        }
    }

    #[test]
    fn binding_covers_descendants_not_siblings() {
        let public = Uuid::new_v4();
        let bindings = vec![bind(public, "root.a")];

        assert!(covers(&bindings, &path("root.a"), &[public]));
        assert!(covers(&bindings, &path("root.a.b.c"), &[public]));
        assert!(!covers(&bindings, &path("root"), &[public]));
        assert!(!covers(&bindings, &path("root.ab"), &[public]));
    }

    #[test]
    fn covers_requires_every_tag() {
        let public = Uuid::new_v4();
        let published = Uuid::new_v4();
        let bindings = vec![bind(public, "root"), bind(published, "root.a")];

        assert!(covers(&bindings, &path("root.a"), &[public, published]));
        assert!(!covers(&bindings, &path("root.b"), &[public, published]));
        // duplicates count once
        assert!(covers(&bindings, &path("root.b"), &[public, public]));
    }

    #[test]
    fn paths_with_single_tag_are_distinct_binding_paths() {
        let public = Uuid::new_v4();
        let other = Uuid::new_v4();
        let bindings = vec![
            bind(public, "b"),
            bind(public, "a"),
            bind(other, "a"),
            bind(public, "a"),
        ];

        assert_eq!(paths_with_all_tags(&bindings, &[public]), vec![path("a"), path("b")]);
    }

    #[test]
    fn paths_with_all_tags_counts_inherited_bindings() {
        let public = Uuid::new_v4();
        let published = Uuid::new_v4();
        let bindings = vec![
            bind(public, "root"),
            bind(published, "root.a"),
            bind(published, "other"),
            bind(public, "x"),
            bind(published, "x"),
        ];

        let found = paths_with_all_tags(&bindings, &[public, published]);
        assert_eq!(found, vec![path("root.a"), path("x")]);
    }

    #[test]
    fn empty_tag_set_matches_nothing() {
        let bindings = vec![bind(Uuid::new_v4(), "root")];
        assert!(paths_with_all_tags(&bindings, &[]).is_empty());
    }
}
