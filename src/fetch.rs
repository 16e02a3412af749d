//! Item fetch and children ordering behind the visibility gate.

use crate::error::{PublicError, PublicResult};
use crate::models::Item;
use crate::repository::ItemStore;
use crate::visibility::Visibility;
use std::collections::HashMap;
use uuid::Uuid;

/// get_public_item
///
/// Fetches an item and checks that it is public. Missing items fail with `ItemNotFound`,
/// hidden ones with `ItemNotPublic`; the item is returned unchanged otherwise.
pub async fn get_public_item(
    store: &mut dyn ItemStore,
    visibility: &Visibility,
    item_id: Uuid,
) -> PublicResult<Item> {
    let item = store
        .get_item(item_id)
        .await?
        .ok_or(PublicError::ItemNotFound(item_id))?;

    if !visibility.is_public(store, &item).await? {
        return Err(PublicError::ItemNotPublic(item_id));
    }
    Ok(item)
}

/// get_public_children
///
/// Direct children of a public item. The parent goes through `get_public_item` first, so a
/// hidden folder never leaks its content. With `ordered`, children follow the parent's
/// `extra.folder.childrenOrder`.
pub async fn get_public_children(
    store: &mut dyn ItemStore,
    visibility: &Visibility,
    item_id: Uuid,
    ordered: bool,
) -> PublicResult<Vec<Item>> {
    let parent = get_public_item(store, visibility, item_id).await?;
    let mut children = store.get_children(&parent).await?;

    if ordered {
        if let Some(order) = parent.children_order().filter(|order| !order.is_empty()) {
            sort_children(&mut children, &order);
        }
    }
    Ok(children)
}

/// sort_children
///
/// Sorts by the position of each child's id in `order`. Ids missing from `order` take
/// position -1, so unlisted children come first; the sort is stable, so they keep the
/// storage order among themselves.
pub fn sort_children(children: &mut [Item], order: &[Uuid]) {
    let position = |id: &Uuid| -> i64 {
        order
            .iter()
            .position(|ordered| ordered == id)
            .map_or(-1, |index| index as i64)
    };
    children.sort_by_key(|child| position(&child.id));
}

/// get_items_by_ids
///
/// Batch fetch in one query, answered in the order of `ids`; `None` marks an id with no
/// item (e.g. deleted since it was indexed).
pub async fn get_items_by_ids(
    store: &mut dyn ItemStore,
    ids: &[Uuid],
) -> PublicResult<Vec<Option<Item>>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let found: HashMap<Uuid, Item> = store
        .get_items(ids)
        .await?
        .into_iter()
        .map(|item| (item.id, item))
        .collect();

    Ok(ids.iter().map(|id| found.get(id).cloned()).collect())
}
