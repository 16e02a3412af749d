use crate::error::PublicResult;
use crate::models::Item;
use crate::path::id_from_path;
use crate::repository::ItemStore;
use crate::tags::TagIndex;
use uuid::Uuid;

/// Visibility
///
/// Decides whether anonymous callers may see an item. Holds the two distinguished tag ids,
/// which are passed in at construction from the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visibility {
    pub public_tag_id: Uuid,
    pub published_tag_id: Uuid,
}

impl Visibility {
    pub fn new(public_tag_id: Uuid, published_tag_id: Uuid) -> Self {
        Self {
            public_tag_id,
            published_tag_id,
        }
    }

    /// The public tag is bound on the item or one of its ancestors.
    pub async fn is_public(&self, store: &mut dyn ItemStore, item: &Item) -> PublicResult<bool> {
        TagIndex::new(store).has_tag(item, self.public_tag_id).await
    }

    /// The published tag is bound on the item or one of its ancestors.
    pub async fn is_published(&self, store: &mut dyn ItemStore, item: &Item) -> PublicResult<bool> {
        TagIndex::new(store).has_tag(item, self.published_tag_id).await
    }

    /// resolve_public_item_ids
    ///
    /// Ids of the tagged items carrying the public tag and, when given, `extra_tag` as well.
    /// The order follows the tag index and is only stable within one call. Paths whose last
    /// segment is not an id are skipped.
    pub async fn resolve_public_item_ids(
        &self,
        store: &mut dyn ItemStore,
        extra_tag: Option<Uuid>,
    ) -> PublicResult<Vec<Uuid>> {
        let mut tag_ids = vec![self.public_tag_id];
        tag_ids.extend(extra_tag);

        let paths = TagIndex::new(store).paths_with_all_tags(&tag_ids).await?;

        let mut ids: Vec<Uuid> = Vec::with_capacity(paths.len());
        for id in paths.iter().filter_map(id_from_path) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        tracing::debug!(
            extra_tag = ?extra_tag,
            count = ids.len(),
            "resolved public item ids"
        );
        Ok(ids)
    }
}
