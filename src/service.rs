use crate::copy::copy_item;
use crate::error::{PublicError, PublicResult};
use crate::fetch::{get_items_by_ids, get_public_children, get_public_item};
use crate::memberships::merge_memberships;
use crate::models::{BatchEntry, Item, ItemMembership, Member, PublicItem};
use crate::pipeline::TaskRun;
use crate::repository::{ItemStore, RepositoryState};
use crate::visibility::Visibility;
use uuid::Uuid;

/// Most targets accepted by one member batch read.
pub const MAX_TARGETS: usize = 50;

/// PublicItemService
///
/// The query orchestrator. Each operation opens one snapshot through the repository, runs
/// its steps in sequence over that snapshot and reports its status through a `TaskRun`.
#[derive(Clone)]
pub struct PublicItemService {
    repo: RepositoryState,
    visibility: Visibility,
}

impl PublicItemService {
    pub fn new(repo: RepositoryState, visibility: Visibility) -> Self {
        Self { repo, visibility }
    }

    /// GetOne: a public item, with its memberships when asked.
    pub async fn get_one(&self, item_id: Uuid, with_memberships: bool) -> PublicResult<PublicItem> {
        let mut task = TaskRun::new("get-one");
        task.start();
        let mut store = task.opened(self.repo.snapshot().await)?;
        let result = self.read_one(store.as_mut(), item_id, with_memberships).await;
        task.finish(store, result).await
    }

    async fn read_one(
        &self,
        store: &mut dyn ItemStore,
        item_id: Uuid,
        with_memberships: bool,
    ) -> PublicResult<PublicItem> {
        let item = get_public_item(store, &self.visibility, item_id).await?;
        if !with_memberships {
            return Ok(PublicItem::Plain(item));
        }
        let mut merged = merge_memberships(store, std::slice::from_ref(&item)).await?;
        merged
            .pop()
            .map(PublicItem::WithMemberships)
            .ok_or(PublicError::ItemNotFound(item_id))
    }

    /// GetChildren: the direct children of a public item.
    pub async fn get_children(&self, item_id: Uuid, ordered: bool) -> PublicResult<Vec<Item>> {
        let mut task = TaskRun::new("get-children");
        task.start();
        let mut store = task.opened(self.repo.snapshot().await)?;
        let result = get_public_children(store.as_mut(), &self.visibility, item_id, ordered).await;
        task.finish(store, result).await
    }

    /// GetByTag: public items also carrying `tag_id`. Ids whose item is gone are dropped.
    pub async fn get_by_tag(&self, tag_id: Uuid, with_memberships: bool) -> PublicResult<Vec<PublicItem>> {
        let mut task = TaskRun::new("get-by-tag");
        task.start();
        let mut store = task.opened(self.repo.snapshot().await)?;
        let result = self.read_tagged(store.as_mut(), Some(tag_id), with_memberships).await;
        task.finish(store, result).await
    }

    /// GetPublished: items that are both public and published.
    pub async fn get_published(&self, with_memberships: bool) -> PublicResult<Vec<PublicItem>> {
        let mut task = TaskRun::new("get-published");
        task.start();
        let mut store = task.opened(self.repo.snapshot().await)?;
        let published = Some(self.visibility.published_tag_id);
        let result = self.read_tagged(store.as_mut(), published, with_memberships).await;
        task.finish(store, result).await
    }

    async fn read_tagged(
        &self,
        store: &mut dyn ItemStore,
        extra_tag: Option<Uuid>,
        with_memberships: bool,
    ) -> PublicResult<Vec<PublicItem>> {
        let ids = self.visibility.resolve_public_item_ids(store, extra_tag).await?;
        let items: Vec<Item> = get_items_by_ids(store, &ids).await?.into_iter().flatten().collect();

        if !with_memberships {
            return Ok(items.into_iter().map(PublicItem::Plain).collect());
        }
        let merged = merge_memberships(store, &items).await?;
        Ok(merged.into_iter().map(PublicItem::WithMemberships).collect())
    }

    /// GetMany: one entry per requested id, in request order.
    pub async fn get_many(&self, item_ids: &[Uuid]) -> PublicResult<Vec<BatchEntry<Item>>> {
        let mut task = TaskRun::new("get-many");
        task.start();
        let mut store = task.opened(self.repo.snapshot().await)?;
        let result = self
            .read_many(store.as_mut(), item_ids)
            .await
            .map(|entries| entries.into_iter().map(BatchEntry::from).collect());
        task.finish(store, result).await
    }

    /// Gate of the batch reads: each id is answered on its own, storage errors abort.
    async fn read_many(
        &self,
        store: &mut dyn ItemStore,
        item_ids: &[Uuid],
    ) -> PublicResult<Vec<PublicResult<Item>>> {
        let found = get_items_by_ids(store, item_ids).await?;
        let mut entries = Vec::with_capacity(found.len());
        for (id, item) in item_ids.iter().zip(found) {
            let entry = match item {
                None => Err(PublicError::ItemNotFound(*id)),
                Some(item) => {
                    if self.visibility.is_public(store, &item).await? {
                        Ok(item)
                    } else {
                        Err(PublicError::ItemNotPublic(*id))
                    }
                }
            };
            entries.push(entry);
        }
        Ok(entries)
    }

    /// GetManyItemMemberships: the merged memberships of each requested public item.
    pub async fn get_many_item_memberships(
        &self,
        item_ids: &[Uuid],
    ) -> PublicResult<Vec<BatchEntry<Vec<ItemMembership>>>> {
        let mut task = TaskRun::new("get-many-item-memberships");
        task.start();
        let mut store = task.opened(self.repo.snapshot().await)?;
        let result = self.read_many_memberships(store.as_mut(), item_ids).await;
        task.finish(store, result).await
    }

    async fn read_many_memberships(
        &self,
        store: &mut dyn ItemStore,
        item_ids: &[Uuid],
    ) -> PublicResult<Vec<BatchEntry<Vec<ItemMembership>>>> {
        let mut entries = Vec::with_capacity(item_ids.len());
        for item in self.read_many(store, item_ids).await? {
            let entry = match item {
                Ok(item) => {
                    let mut merged = merge_memberships(store, std::slice::from_ref(&item)).await?;
                    Ok(merged
                        .pop()
                        .map(|decorated| decorated.item_memberships)
                        .unwrap_or_default())
                }
                Err(e) => Err(e),
            };
            entries.push(entry.into());
        }
        Ok(entries)
    }

    /// GetMember: the public projection of one member.
    pub async fn get_member(&self, member_id: Uuid) -> PublicResult<Member> {
        let mut task = TaskRun::new("get-member");
        task.start();
        let mut store = task.opened(self.repo.snapshot().await)?;
        let result = store
            .get_member(member_id)
            .await
            .and_then(|member| member.ok_or(PublicError::MemberNotFound(member_id)));
        task.finish(store, result).await
    }

    /// GetMembers: at most `MAX_TARGETS` members, one entry per requested id.
    pub async fn get_members(&self, member_ids: &[Uuid]) -> PublicResult<Vec<BatchEntry<Member>>> {
        let mut task = TaskRun::new("get-members");
        task.start();
        if member_ids.len() > MAX_TARGETS {
            return task.complete(Err(PublicError::TooManyTargets(member_ids.len())));
        }
        let mut store = task.opened(self.repo.snapshot().await)?;
        let result = read_members(store.as_mut(), member_ids).await;
        task.finish(store, result).await
    }

    /// CopyGate: copies a public item for `actor`, in one read-write transaction.
    pub async fn copy(
        &self,
        item_id: Uuid,
        actor: Uuid,
        parent_id: Option<Uuid>,
        should_copy_tags: bool,
    ) -> PublicResult<Item> {
        let mut task = TaskRun::new("copy");
        task.start();
        let mut store = task.opened(self.repo.transaction().await)?;
        let result = self
            .relay_copy(store.as_mut(), item_id, actor, parent_id, should_copy_tags)
            .await;
        task.finish(store, result).await
    }

    async fn relay_copy(
        &self,
        store: &mut dyn ItemStore,
        item_id: Uuid,
        actor: Uuid,
        parent_id: Option<Uuid>,
        should_copy_tags: bool,
    ) -> PublicResult<Item> {
        let source = get_public_item(store, &self.visibility, item_id).await?;
        copy_item(store, &source, actor, parent_id, should_copy_tags).await
    }

    /// EditGate for items: nothing is edited through the public surface.
    pub fn reject_item_edit(&self, item_id: Option<Uuid>) -> PublicError {
        PublicError::CannotEditPublicItem(item_id)
    }

    /// EditGate for members.
    pub fn reject_member_edit(&self, member_id: Option<Uuid>) -> PublicError {
        PublicError::CannotEditPublicMember(member_id)
    }
}

async fn read_members(
    store: &mut dyn ItemStore,
    member_ids: &[Uuid],
) -> PublicResult<Vec<BatchEntry<Member>>> {
    let mut entries = Vec::with_capacity(member_ids.len());
    for id in member_ids {
        let entry = store
            .get_member(*id)
            .await?
            .ok_or(PublicError::MemberNotFound(*id));
        entries.push(entry.into());
    }
    Ok(entries)
}
