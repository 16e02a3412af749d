//! Copy relay: re-creates a public subtree for the calling member.

use crate::error::{PublicError, PublicResult};
use crate::models::{Item, ItemMembership, PermissionLevel, TagBinding};
use crate::path::ItemPath;
use crate::repository::ItemStore;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// CopyPlan
///
/// Rows to insert for one copy, shallowest items first so parents exist before children.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyPlan {
    pub items: Vec<Item>,
    pub memberships: Vec<ItemMembership>,
    pub tags: Vec<TagBinding>,
}

impl CopyPlan {
    /// The copy of the source item.
    pub fn root(&self) -> Option<&Item> {
        self.items.first()
    }
}

/// plan_copy
///
/// Maps every item of `subtree` (source first, shallowest first) to a fresh id under
/// `destination`, or to a new root when `destination` is `None`. The actor becomes the
/// creator of every copy and, for a new root, its admin. Folder children orders are
/// rewritten to the new ids. Tag bindings are carried over only with `copy_tags`.
pub fn plan_copy(
    subtree: &[Item],
    bindings: &[TagBinding],
    destination: Option<&ItemPath>,
    actor: Uuid,
    copy_tags: bool,
    now: DateTime<Utc>,
) -> CopyPlan {
    let new_ids: HashMap<Uuid, Uuid> = subtree.iter().map(|item| (item.id, Uuid::new_v4())).collect();
    let mut new_paths: HashMap<&ItemPath, ItemPath> = HashMap::with_capacity(subtree.len());
    let mut items = Vec::with_capacity(subtree.len());

    for (index, item) in subtree.iter().enumerate() {
        let new_id = new_ids[&item.id];
        let new_parent = if index == 0 {
            destination.cloned()
        } else {
            match item.path.parent().and_then(|parent| new_paths.get(&parent).cloned()) {
                Some(parent) => Some(parent),
                // not attached to the copied tree
                None => continue,
            }
        };
        let path = match new_parent {
            Some(parent) => parent.child(new_id),
            None => ItemPath::from_id(new_id),
        };
        new_paths.insert(&item.path, path.clone());
        items.push(Item {
            id: new_id,
            path,
            extra: remap_children_order(&item.extra, &new_ids),
            creator: actor,
            created_at: now,
            updated_at: now,
            ..item.clone()
        });
    }

    let mut memberships = Vec::new();
    if let (None, Some(root)) = (destination, items.first()) {
        memberships.push(ItemMembership {
            id: Uuid::new_v4(),
            member_id: actor,
            item_path: root.path.clone(),
            permission: PermissionLevel::Admin,
            creator: actor,
            created_at: now,
            updated_at: now,
        });
    }

    let tags = if copy_tags {
        bindings
            .iter()
            .filter_map(|binding| {
                new_paths.get(&binding.item_path).map(|path| TagBinding {
                    tag_id: binding.tag_id,
                    item_path: path.clone(),
                })
            })
            .collect()
    } else {
        Vec::new()
    };

    CopyPlan {
        items,
        memberships,
        tags,
    }
}

fn remap_children_order(extra: &serde_json::Value, new_ids: &HashMap<Uuid, Uuid>) -> serde_json::Value {
    let mut extra = extra.clone();
    let order = extra
        .get_mut("folder")
        .and_then(|folder| folder.get_mut("childrenOrder"))
        .and_then(|order| order.as_array_mut());
    if let Some(order) = order {
        for entry in order.iter_mut() {
            let mapped = entry
                .as_str()
                .and_then(|id| Uuid::parse_str(id).ok())
                .and_then(|id| new_ids.get(&id));
            if let Some(new_id) = mapped {
                *entry = serde_json::Value::String(new_id.to_string());
            }
        }
    }
    extra
}

/// can_write
///
/// True iff `actor` holds `write` or `admin` on the item at `path` through any of
/// `memberships` (grants on the item or an ancestor).
pub fn can_write(memberships: &[ItemMembership], actor: Uuid, path: &ItemPath) -> bool {
    memberships.iter().any(|membership| {
        membership.member_id == actor
            && membership.permission >= PermissionLevel::Write
            && membership.item_path.is_ancestor_of(path)
    })
}

/// copy_item
///
/// Copies the already-gated `source` for `actor`, into `parent_id` when given. The
/// destination must exist and be writable by the actor. Runs inside the caller's
/// transaction and returns the copy of `source`.
pub async fn copy_item(
    store: &mut dyn ItemStore,
    source: &Item,
    actor: Uuid,
    parent_id: Option<Uuid>,
    copy_tags: bool,
) -> PublicResult<Item> {
    let destination = match parent_id {
        Some(parent_id) => {
            let parent = store
                .get_item(parent_id)
                .await?
                .ok_or(PublicError::ItemNotFound(parent_id))?;
            let mut grants = store.inherited_memberships(&parent).await?;
            grants.extend(
                store
                    .subtree_memberships(&parent)
                    .await?
                    .into_iter()
                    .filter(|membership| membership.item_path == parent.path),
            );
            if !can_write(&grants, actor, &parent.path) {
                return Err(PublicError::MemberCannotWriteItem(parent_id));
            }
            Some(parent.path)
        }
        None => None,
    };

    let subtree = store.get_subtree(source).await?;
    let bindings = if copy_tags {
        store.tag_bindings_in(&source.path).await?
    } else {
        Vec::new()
    };

    let plan = plan_copy(&subtree, &bindings, destination.as_ref(), actor, copy_tags, Utc::now());
    let root = plan
        .root()
        .cloned()
        .ok_or(PublicError::ItemNotFound(source.id))?;

    for item in &plan.items {
        store.insert_item(item).await?;
    }
    for membership in &plan.memberships {
        store.insert_membership(membership).await?;
    }
    for binding in &plan.tags {
        store.insert_tag_binding(binding, actor).await?;
    }
    tracing::info!(
        source = %source.id,
        copy = %root.id,
        items = plan.items.len(),
        tags = plan.tags.len(),
        "copied public item"
    );
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, parent: Option<&Item>) -> Item {
        let id = Uuid::new_v4();
        let path = match parent {
            Some(parent) => parent.path.child(id),
            None => ItemPath::from_id(id),
        };
        Item {
            id,
            name: name.to_string(),
            description: None,
            item_type: "folder".to_string(),
            path,
            extra: serde_json::json!({}),
            creator: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn copy_to_root_rebuilds_paths_and_grants_admin() {
        let actor = Uuid::new_v4();
        let root = item("root", None);
        let child = item("child", Some(&root));
        let grandchild = item("grandchild", Some(&child));

        let plan = plan_copy(
            &[root.clone(), child.clone(), grandchild.clone()],
            &[],
            None,
            actor,
            false,
            Utc::now(),
        );

        assert_eq!(plan.items.len(), 3);
        let (new_root, new_child, new_grandchild) = (&plan.items[0], &plan.items[1], &plan.items[2]);
        assert_ne!(new_root.id, root.id);
        assert_eq!(new_root.path, ItemPath::from_id(new_root.id));
        assert_eq!(new_child.path, new_root.path.child(new_child.id));
        assert_eq!(new_grandchild.path, new_child.path.child(new_grandchild.id));
        assert_eq!(new_grandchild.name, "grandchild");
        assert!(plan.items.iter().all(|copy| copy.creator == actor));

        assert_eq!(plan.memberships.len(), 1);
        assert_eq!(plan.memberships[0].permission, PermissionLevel::Admin);
        assert_eq!(plan.memberships[0].item_path, new_root.path);
        assert!(plan.tags.is_empty());
    }

    #[test]
    fn copy_under_parent_adds_no_membership() {
        let destination = item("destination", None);
        let source = item("source", None);

        let plan = plan_copy(&[source], &[], Some(&destination.path), Uuid::new_v4(), false, Utc::now());

        assert!(destination.path.is_strict_ancestor_of(&plan.items[0].path));
        assert!(plan.memberships.is_empty());
    }

    #[test]
    fn tags_follow_their_items_when_requested() {
        let tag = Uuid::new_v4();
        let root = item("root", None);
        let child = item("child", Some(&root));
        let bindings = vec![TagBinding {
            tag_id: tag,
            item_path: child.path.clone(),
        }];

        let plan = plan_copy(&[root, child], &bindings, None, Uuid::new_v4(), true, Utc::now());

        assert_eq!(plan.tags.len(), 1);
        assert_eq!(plan.tags[0].item_path, plan.items[1].path);
    }

    #[test]
    fn children_order_points_to_copies() {
        let mut root = item("root", None);
        let child = item("child", Some(&root));
        root.extra = serde_json::json!({ "folder": { "childrenOrder": [child.id.to_string()] } });

        let plan = plan_copy(&[root, child], &[], None, Uuid::new_v4(), false, Utc::now());

        assert_eq!(plan.items[0].children_order(), Some(vec![plan.items[1].id]));
    }

    #[test]
    fn write_requires_write_or_admin_on_ancestor() {
        let actor = Uuid::new_v4();
        let parent = item("parent", None);
        let grant = |permission| ItemMembership {
            id: Uuid::new_v4(),
            member_id: actor,
            item_path: parent.path.clone(),
            permission,
            creator: actor,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let nested = parent.path.child(Uuid::new_v4());

        assert!(can_write(&[grant(PermissionLevel::Write)], actor, &nested));
        assert!(can_write(&[grant(PermissionLevel::Admin)], actor, &parent.path));
        assert!(!can_write(&[grant(PermissionLevel::Read)], actor, &nested));
        assert!(!can_write(&[grant(PermissionLevel::Admin)], Uuid::new_v4(), &nested));
    }
}
