use crate::error::PublicResult;
use crate::models::{Item, ItemMembership, Member, TagBinding};
use crate::path::ItemPath;
use crate::repository::{ItemStore, Repository};
use crate::tags;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// MemoryData
///
/// The four host tables held in memory. Items keep insertion order, which stands in for
/// the host's creation order.
#[derive(Debug, Clone, Default)]
pub struct MemoryData {
    pub items: Vec<Item>,
    pub tags: Vec<TagBinding>,
    pub memberships: Vec<ItemMembership>,
    pub members: Vec<Member>,
}

/// MemoryRepository
///
/// An in-memory implementation of `Repository` used by tests and local demos. Every store
/// reads from its own copy of the data taken when it is opened, so concurrent writers are
/// never observed mid-operation. A writable store also records what it inserts, and
/// `commit` applies only those inserts to the shared data, so overlapping transactions
/// both land.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    data: Arc<RwLock<MemoryData>>,
}

impl MemoryRepository {
    pub fn new(data: MemoryData) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// Applies a change outside of any store, as the host would.
    pub async fn update<F>(&self, change: F)
    where
        F: FnOnce(&mut MemoryData),
    {
        let mut data = self.data.write().await;
        change(&mut data);
    }

    /// Copy of the current committed data.
    pub async fn data(&self) -> MemoryData {
        self.data.read().await.clone()
    }

    async fn open(&self, writable: bool) -> Box<dyn ItemStore> {
        let snapshot = self.data.read().await.clone();
        Box::new(MemoryStore {
            shared: self.data.clone(),
            snapshot,
            inserted: MemoryData::default(),
            writable,
        })
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn snapshot(&self) -> PublicResult<Box<dyn ItemStore>> {
        Ok(self.open(false).await)
    }

    async fn transaction(&self) -> PublicResult<Box<dyn ItemStore>> {
        Ok(self.open(true).await)
    }
}

/// MemoryStore
///
/// A private copy of the data; the same answers for the whole life of the store.
pub struct MemoryStore {
    shared: Arc<RwLock<MemoryData>>,
    snapshot: MemoryData,
    // Rows written through this store, replayed on commit.
    inserted: MemoryData,
    writable: bool,
}

impl MemoryStore {
    fn items_under(&self, root: &ItemPath) -> impl Iterator<Item = &Item> {
        self.snapshot
            .items
            .iter()
            .filter(move |item| root.is_ancestor_of(&item.path))
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn get_item(&mut self, id: Uuid) -> PublicResult<Option<Item>> {
        Ok(self.snapshot.items.iter().find(|item| item.id == id).cloned())
    }

    async fn get_items(&mut self, ids: &[Uuid]) -> PublicResult<Vec<Item>> {
        Ok(self
            .snapshot
            .items
            .iter()
            .filter(|item| ids.contains(&item.id))
            .cloned()
            .collect())
    }

    async fn get_children(&mut self, parent: &Item) -> PublicResult<Vec<Item>> {
        Ok(self
            .snapshot
            .items
            .iter()
            .filter(|item| item.path.parent().as_ref() == Some(&parent.path))
            .cloned()
            .collect())
    }

    async fn get_subtree(&mut self, root: &Item) -> PublicResult<Vec<Item>> {
        let mut items: Vec<Item> = self.items_under(&root.path).cloned().collect();
        items.sort_by_key(|item| item.path.depth());
        Ok(items)
    }

    async fn has_tags(&mut self, path: &ItemPath, tag_ids: &[Uuid]) -> PublicResult<bool> {
        Ok(tags::covers(&self.snapshot.tags, path, tag_ids))
    }

    async fn item_paths_with_tags(&mut self, tag_ids: &[Uuid]) -> PublicResult<Vec<ItemPath>> {
        Ok(tags::paths_with_all_tags(&self.snapshot.tags, tag_ids))
    }

    async fn tag_bindings_in(&mut self, root: &ItemPath) -> PublicResult<Vec<TagBinding>> {
        let mut bindings: Vec<TagBinding> = self
            .snapshot
            .tags
            .iter()
            .filter(|binding| root.is_ancestor_of(&binding.item_path))
            .cloned()
            .collect();
        bindings.sort_by_key(|binding| binding.item_path.depth());
        Ok(bindings)
    }

    async fn inherited_memberships(&mut self, item: &Item) -> PublicResult<Vec<ItemMembership>> {
        let mut memberships: Vec<ItemMembership> = self
            .snapshot
            .memberships
            .iter()
            .filter(|membership| membership.item_path.is_strict_ancestor_of(&item.path))
            .cloned()
            .collect();
        memberships.sort_by_key(|membership| membership.item_path.depth());
        Ok(memberships)
    }

    async fn subtree_memberships(&mut self, item: &Item) -> PublicResult<Vec<ItemMembership>> {
        let mut memberships: Vec<ItemMembership> = self
            .snapshot
            .memberships
            .iter()
            .filter(|membership| item.path.is_ancestor_of(&membership.item_path))
            .cloned()
            .collect();
        memberships.sort_by_key(|membership| membership.item_path.depth());
        Ok(memberships)
    }

    async fn get_member(&mut self, id: Uuid) -> PublicResult<Option<Member>> {
        Ok(self
            .snapshot
            .members
            .iter()
            .find(|member| member.id == id)
            .cloned())
    }

    async fn insert_item(&mut self, item: &Item) -> PublicResult<()> {
        self.snapshot.items.push(item.clone());
        self.inserted.items.push(item.clone());
        Ok(())
    }

    async fn insert_membership(&mut self, membership: &ItemMembership) -> PublicResult<()> {
        self.snapshot.memberships.push(membership.clone());
        self.inserted.memberships.push(membership.clone());
        Ok(())
    }

    async fn insert_tag_binding(&mut self, binding: &TagBinding, _creator: Uuid) -> PublicResult<()> {
        if !self.snapshot.tags.contains(binding) {
            self.snapshot.tags.push(binding.clone());
            self.inserted.tags.push(binding.clone());
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> PublicResult<()> {
        let MemoryStore {
            shared,
            inserted,
            writable,
            ..
        } = *self;
        if !writable {
            return Ok(());
        }
        let mut data = shared.write().await;
        data.items.extend(inserted.items);
        data.memberships.extend(inserted.memberships);
        // (tag, path) is the key of a binding.
        for binding in inserted.tags {
            if !data.tags.contains(&binding) {
                data.tags.push(binding);
            }
        }
        Ok(())
    }
}
