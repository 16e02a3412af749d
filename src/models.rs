use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{ErrorBody, PublicError};
use crate::path::ItemPath;

// --- Host Records (read from the host's tables) ---

/// Item
///
/// A node of the host's item tree (`item` table). `path` encodes the chain of ancestors.
/// `extra` is type-specific and opaque to this service, except for the folder children
/// order read by the ordered children listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    // `type` is reserved in Rust.
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub item_type: String,
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub path: ItemPath,
    #[ts(type = "Record<string, unknown>")]
    #[schema(value_type = Object)]
    pub extra: serde_json::Value,
    pub creator: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Explicit children order stored by folders under `extra.folder.childrenOrder`.
    /// Entries that are not UUIDs are ignored.
    pub fn children_order(&self) -> Option<Vec<Uuid>> {
        let order = self.extra.get("folder")?.get("childrenOrder")?.as_array()?;
        Some(
            order
                .iter()
                .filter_map(|value| value.as_str())
                .filter_map(|value| Uuid::parse_str(value).ok())
                .collect(),
        )
    }
}

/// PermissionLevel
///
/// Permission granted by a membership, ordered from weakest to strongest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS, ToSchema,
    sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "permissions_enum", rename_all = "lowercase")]
#[ts(export)]
pub enum PermissionLevel {
    Read,
    Write,
    Admin,
}

/// ItemMembership
///
/// A permission grant of a member on the item at `item_path` (`item_membership` table).
/// The grant also applies to every descendant of that item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ItemMembership {
    pub id: Uuid,
    pub member_id: Uuid,
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub item_path: ItemPath,
    pub permission: PermissionLevel,
    pub creator: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// TagBinding
///
/// Declares that tag `tag_id` applies to the item at `item_path` and to all of its
/// descendants (`item_tag` table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TagBinding {
    pub tag_id: Uuid,
    pub item_path: ItemPath,
}

/// Member
///
/// Public projection of a member: no credentials, no settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Member {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

// --- Output Schemas ---

/// ItemWithMemberships
///
/// An item decorated with the memberships inherited from its ancestors followed by the
/// memberships of its subtree. Serialized flat: the item fields plus `itemMemberships`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ItemWithMemberships {
    #[serde(flatten)]
    pub item: Item,
    pub item_memberships: Vec<ItemMembership>,
}

/// PublicItem
///
/// Response body of the item reads that may or may not merge memberships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(untagged)]
#[ts(export)]
pub enum PublicItem {
    WithMemberships(ItemWithMemberships),
    Plain(Item),
}

impl PublicItem {
    pub fn item(&self) -> &Item {
        match self {
            PublicItem::WithMemberships(decorated) => &decorated.item,
            PublicItem::Plain(item) => item,
        }
    }
}

/// BatchEntry
///
/// One element of a batch response. Each requested id is answered independently: either
/// the value or the error body for that id, at the same position as the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(untagged)]
#[ts(export)]
pub enum BatchEntry<T> {
    Found(T),
    Failed(ErrorBody),
}

impl<T> From<Result<T, PublicError>> for BatchEntry<T> {
    fn from(result: Result<T, PublicError>) -> Self {
        match result {
            Ok(value) => BatchEntry::Found(value),
            Err(e) => BatchEntry::Failed(e.body()),
        }
    }
}

// --- Request Payloads (Input Schemas) ---

/// ItemReadQuery
///
/// Query of `GET /items/{id}` and `GET /items/published`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct ItemReadQuery {
    /// Attach inherited and subtree memberships to each item.
    pub with_memberships: Option<bool>,
}

/// ChildrenQuery
///
/// Query of `GET /items/{id}/children`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ChildrenQuery {
    /// Sort children by the parent's `extra.folder.childrenOrder`.
    pub ordered: Option<bool>,
}

/// TagQuery
///
/// Query of `GET /items?tagId=...`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct TagQuery {
    /// Tag every returned item must carry in addition to the public tag.
    pub tag_id: Uuid,
    pub with_memberships: Option<bool>,
}

/// IdsQuery
///
/// Repeated `id` query parameter (`?id=..&id=..`).
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IdsQuery {
    #[serde(default)]
    pub id: Vec<Uuid>,
}

/// ItemIdsQuery
///
/// Repeated `itemId` query parameter (`?itemId=..&itemId=..`).
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct ItemIdsQuery {
    #[serde(default)]
    pub item_id: Vec<Uuid>,
}

/// CopyItemRequest
///
/// Body of `POST /items/{id}/copy`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CopyItemRequest {
    /// Destination folder; the copy becomes a root item when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    /// Copy the tag bindings of the subtree as well. Defaults to false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub should_copy_tags: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_with_extra(extra: serde_json::Value) -> Item {
        let id = Uuid::new_v4();
        Item {
            id,
            name: "folder".to_string(),
            description: None,
            item_type: "folder".to_string(),
            path: ItemPath::from_id(id),
            extra,
            creator: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn children_order_is_read_from_folder_extra() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let item = item_with_extra(serde_json::json!({
            "folder": { "childrenOrder": [second.to_string(), "garbage", first.to_string()] }
        }));

        assert_eq!(item.children_order(), Some(vec![second, first]));
    }

    #[test]
    fn children_order_absent_without_folder_extra() {
        assert_eq!(item_with_extra(serde_json::json!({})).children_order(), None);
        assert_eq!(
            item_with_extra(serde_json::json!({ "folder": {} })).children_order(),
            None
        );
    }

    #[test]
    fn item_with_memberships_serializes_flat() {
        let decorated = ItemWithMemberships {
            item: item_with_extra(serde_json::json!({})),
            item_memberships: vec![],
        };
        let json = serde_json::to_value(&decorated).unwrap();

        assert_eq!(json["type"], "folder");
        assert!(json["itemMemberships"].as_array().unwrap().is_empty());
        assert!(json.get("item").is_none());
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn batch_entry_carries_error_body() {
        let id = Uuid::new_v4();
        let entry: BatchEntry<Item> = Err(PublicError::ItemNotPublic(id)).into();
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["code"], "GPIERR002");
        assert_eq!(json["statusCode"], 403);
    }
}
