use crate::error::PublicResult;
use crate::models::{Item, ItemWithMemberships};
use crate::repository::ItemStore;

/// merge_memberships
///
/// Decorates each item with `inherited ++ subtree` memberships: first the grants on its
/// strict ancestors, then the grants on the item itself and its descendants. Grants are
/// not deduplicated by member; a member with an inherited and a direct grant appears twice.
/// The input items are left untouched and the output keeps their order.
pub async fn merge_memberships(
    store: &mut dyn ItemStore,
    items: &[Item],
) -> PublicResult<Vec<ItemWithMemberships>> {
    let mut merged = Vec::with_capacity(items.len());
    for item in items {
        let mut item_memberships = store.inherited_memberships(item).await?;
        item_memberships.extend(store.subtree_memberships(item).await?);
        merged.push(ItemWithMemberships {
            item: item.clone(),
            item_memberships,
        });
    }
    Ok(merged)
}
