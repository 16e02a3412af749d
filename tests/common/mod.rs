//! Shared fixtures: a small item tree in the in-memory repository.
#![allow(dead_code)]

use chrono::Utc;
use graasp_public::{
    AppConfig, AppState, MemoryData, MemoryRepository, RepositoryState,
    models::{Item, ItemMembership, Member, PermissionLevel, TagBinding},
    path::ItemPath,
};
use std::sync::Arc;
use uuid::Uuid;

pub fn config() -> AppConfig {
    AppConfig::default()
}

pub fn public_tag() -> Uuid {
    config().public_tag_id
}

pub fn published_tag() -> Uuid {
    config().published_tag_id
}

pub fn item(name: &str, parent: Option<&Item>) -> Item {
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

pub fn with_children_order(mut folder: Item, order: &[Uuid]) -> Item {
    let order: Vec<String> = order.iter().map(Uuid::to_string).collect();
    folder.extra = serde_json::json!({ "folder": { "childrenOrder": order } });
    folder
}

pub fn tag(tag_id: Uuid, item: &Item) -> TagBinding {
    TagBinding {
        tag_id,
        item_path: item.path.clone(),
    }
}

pub fn member(name: &str) -> Member {
    Member {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: format!("{name}@graasp.org"),
    }
}

pub fn membership(member: &Member, item: &Item, permission: PermissionLevel) -> ItemMembership {
    ItemMembership {
        id: Uuid::new_v4(),
        member_id: member.id,
        item_path: item.path.clone(),
        permission,
        creator: member.id,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// A public folder with two children, a hidden root and two members.
pub struct Fixture {
    pub public_root: Item,
    pub child_1: Item,
    pub child_2: Item,
    pub hidden: Item,
    pub owner: Member,
    pub visitor: Member,
}

impl Fixture {
    pub fn new() -> Self {
        let public_root = item("public root", None);
        let child_1 = item("child 1", Some(&public_root));
        let child_2 = item("child 2", Some(&public_root));
        let public_root = with_children_order(public_root, &[child_2.id, child_1.id]);
        Self {
            public_root,
            child_1,
            child_2,
            hidden: item("hidden", None),
            owner: member("owner"),
            visitor: member("visitor"),
        }
    }

    pub fn data(&self) -> MemoryData {
        MemoryData {
            items: vec![
                self.public_root.clone(),
                self.child_1.clone(),
                self.child_2.clone(),
                self.hidden.clone(),
            ],
            tags: vec![tag(public_tag(), &self.public_root)],
            memberships: vec![
                membership(&self.owner, &self.public_root, PermissionLevel::Admin),
                membership(&self.owner, &self.hidden, PermissionLevel::Admin),
            ],
            members: vec![self.owner.clone(), self.visitor.clone()],
        }
    }
}

pub fn state(repo: &MemoryRepository) -> AppState {
    let repo = Arc::new(repo.clone()) as RepositoryState;
    AppState::new(repo, config())
}
