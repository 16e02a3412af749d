use crate::error::PublicResult;
use crate::models::{Item, ItemMembership, Member, TagBinding};
use crate::path::ItemPath;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use uuid::Uuid;

/// Repository Trait
///
/// Entry point to the host's storage. Every public operation opens one `ItemStore`
/// (a snapshot of the host's tables) and performs all of its sub-queries through it, so
/// the public status of an item and its content are always read from the same data version.
///
/// **Send + Sync + async_trait** are required to make the trait object (`Arc<dyn Repository>`)
/// safely shareable and usable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Opens a read-only snapshot.
    async fn snapshot(&self) -> PublicResult<Box<dyn ItemStore>>;
    /// Opens a read-write transaction with the same isolation as `snapshot`.
    async fn transaction(&self) -> PublicResult<Box<dyn ItemStore>>;
}

/// ItemStore Trait
///
/// The storage contract consumed by the public surface: item, tag, membership and member
/// reads, plus the few inserts needed to relay a copy. Implementations must answer every
/// call from the same snapshot. Dropping a store without `commit` discards its writes.
#[async_trait]
pub trait ItemStore: Send {
    // --- Items ---
    async fn get_item(&mut self, id: Uuid) -> PublicResult<Option<Item>>;
    /// Items among `ids` that exist, in no particular order.
    async fn get_items(&mut self, ids: &[Uuid]) -> PublicResult<Vec<Item>>;
    /// Direct children, oldest first.
    async fn get_children(&mut self, parent: &Item) -> PublicResult<Vec<Item>>;
    /// The item and all of its descendants, shallowest first.
    async fn get_subtree(&mut self, root: &Item) -> PublicResult<Vec<Item>>;

    // --- Tags ---
    /// True iff every tag of `tag_ids` is bound at `path` or one of its ancestors.
    /// `tag_ids` is deduplicated by the caller and never empty.
    async fn has_tags(&mut self, path: &ItemPath, tag_ids: &[Uuid]) -> PublicResult<bool>;
    /// Binding paths of any of `tag_ids` that carry all of them (bound there or on an
    /// ancestor), ordered by path.
    async fn item_paths_with_tags(&mut self, tag_ids: &[Uuid]) -> PublicResult<Vec<ItemPath>>;
    /// Bindings whose path lies in the subtree of `root`.
    async fn tag_bindings_in(&mut self, root: &ItemPath) -> PublicResult<Vec<TagBinding>>;

    // --- Memberships & Members ---
    /// Memberships on strict ancestors of the item.
    async fn inherited_memberships(&mut self, item: &Item) -> PublicResult<Vec<ItemMembership>>;
    /// Memberships on the item itself or any descendant.
    async fn subtree_memberships(&mut self, item: &Item) -> PublicResult<Vec<ItemMembership>>;
    async fn get_member(&mut self, id: Uuid) -> PublicResult<Option<Member>>;

    // --- Copy relay ---
    async fn insert_item(&mut self, item: &Item) -> PublicResult<()>;
    async fn insert_membership(&mut self, membership: &ItemMembership) -> PublicResult<()>;
    async fn insert_tag_binding(&mut self, binding: &TagBinding, creator: Uuid) -> PublicResult<()>;

    async fn commit(self: Box<Self>) -> PublicResult<()>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the host's PostgreSQL
/// database (`item`, `item_tag`, `item_membership` and `member` tables, `ltree` paths).
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self, mode: &str) -> PublicResult<Box<dyn ItemStore>> {
        let mut tx = self.pool.begin().await?;
        // Must be the first statement of the transaction.
        sqlx::query(&format!(
            "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, {mode}"
        ))
        .execute(&mut *tx)
        .await?;
        Ok(Box::new(PostgresStore { tx }))
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn snapshot(&self) -> PublicResult<Box<dyn ItemStore>> {
        self.begin("READ ONLY").await
    }

    async fn transaction(&self) -> PublicResult<Box<dyn ItemStore>> {
        self.begin("READ WRITE").await
    }
}

// Column lists shared by every read; `ltree` and enum columns are cast for decoding.
const ITEM_COLUMNS: &str = r#"id, name, description, type, path::text AS path, extra, creator, created_at, updated_at"#;
const MEMBERSHIP_COLUMNS: &str = r#"id, member_id, item_path::text AS item_path, permission, creator, created_at, updated_at"#;

/// PostgresStore
///
/// One `REPEATABLE READ` transaction. The prefix predicate of materialized paths is pushed
/// down to `ltree`: `a @> b` holds iff `a` is an ancestor of `b` or equal to it.
pub struct PostgresStore {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ItemStore for PostgresStore {
    async fn get_item(&mut self, id: Uuid) -> PublicResult<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(&format!(
            "SELECT {ITEM_COLUMNS} FROM item WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(item)
    }

    async fn get_items(&mut self, ids: &[Uuid]) -> PublicResult<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(&format!(
            "SELECT {ITEM_COLUMNS} FROM item WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(items)
    }

    async fn get_children(&mut self, parent: &Item) -> PublicResult<Vec<Item>> {
        let children = sqlx::query_as::<_, Item>(&format!(
            r#"
            SELECT {ITEM_COLUMNS} FROM item
            WHERE path <@ $1::ltree AND nlevel(path) = nlevel($1::ltree) + 1
            ORDER BY created_at ASC
            "#
        ))
        .bind(parent.path.as_str())
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(children)
    }

    async fn get_subtree(&mut self, root: &Item) -> PublicResult<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(&format!(
            r#"
            SELECT {ITEM_COLUMNS} FROM item
            WHERE path <@ $1::ltree
            ORDER BY nlevel(path) ASC, created_at ASC
            "#
        ))
        .bind(root.path.as_str())
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(items)
    }

    async fn has_tags(&mut self, path: &ItemPath, tag_ids: &[Uuid]) -> PublicResult<bool> {
        let matched: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(DISTINCT tag_id) FROM item_tag
            WHERE tag_id = ANY($1) AND item_path @> $2::ltree
            "#,
        )
        .bind(tag_ids)
        .bind(path.as_str())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(matched == tag_ids.len() as i64)
    }

    /// Count-based aggregate: group candidate binding paths, count the distinct requested
    /// tags covering each one, keep the groups that reach the size of the set.
    async fn item_paths_with_tags(&mut self, tag_ids: &[Uuid]) -> PublicResult<Vec<ItemPath>> {
        let paths = sqlx::query_scalar::<_, ItemPath>(
            r#"
            SELECT candidate.item_path::text
            FROM (SELECT DISTINCT item_path FROM item_tag WHERE tag_id = ANY($1)) AS candidate
            JOIN item_tag AS covering
                ON covering.tag_id = ANY($1) AND covering.item_path @> candidate.item_path
            GROUP BY candidate.item_path
            HAVING COUNT(DISTINCT covering.tag_id) = $2
            ORDER BY candidate.item_path::text
            "#,
        )
        .bind(tag_ids)
        .bind(tag_ids.len() as i64)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(paths)
    }

    async fn tag_bindings_in(&mut self, root: &ItemPath) -> PublicResult<Vec<TagBinding>> {
        let bindings = sqlx::query_as::<_, TagBinding>(
            r#"
            SELECT tag_id, item_path::text AS item_path FROM item_tag
            WHERE item_path <@ $1::ltree
            ORDER BY nlevel(item_path) ASC
            "#,
        )
        .bind(root.as_str())
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(bindings)
    }

    async fn inherited_memberships(&mut self, item: &Item) -> PublicResult<Vec<ItemMembership>> {
        let memberships = sqlx::query_as::<_, ItemMembership>(&format!(
            r#"
            SELECT {MEMBERSHIP_COLUMNS} FROM item_membership
            WHERE item_path @> $1::ltree AND item_path != $1::ltree
            ORDER BY nlevel(item_path) ASC, created_at ASC
            "#
        ))
        .bind(item.path.as_str())
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(memberships)
    }

    async fn subtree_memberships(&mut self, item: &Item) -> PublicResult<Vec<ItemMembership>> {
        let memberships = sqlx::query_as::<_, ItemMembership>(&format!(
            r#"
            SELECT {MEMBERSHIP_COLUMNS} FROM item_membership
            WHERE item_path <@ $1::ltree
            ORDER BY nlevel(item_path) ASC, created_at ASC
            "#
        ))
        .bind(item.path.as_str())
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(memberships)
    }

    async fn get_member(&mut self, id: Uuid) -> PublicResult<Option<Member>> {
        let member = sqlx::query_as::<_, Member>("SELECT id, name, email FROM member WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(member)
    }

    async fn insert_item(&mut self, item: &Item) -> PublicResult<()> {
        sqlx::query(
            r#"
            INSERT INTO item (id, name, description, type, path, extra, creator, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5::ltree, $6, $7, $8, $9)
            "#,
        )
        .bind(item.id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(&item.item_type)
        .bind(item.path.as_str())
        .bind(&item.extra)
        .bind(item.creator)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_membership(&mut self, membership: &ItemMembership) -> PublicResult<()> {
        sqlx::query(
            r#"
            INSERT INTO item_membership (id, member_id, item_path, permission, creator, created_at, updated_at)
            VALUES ($1, $2, $3::ltree, $4, $5, $6, $7)
            "#,
        )
        .bind(membership.id)
        .bind(membership.member_id)
        .bind(membership.item_path.as_str())
        .bind(membership.permission)
        .bind(membership.creator)
        .bind(membership.created_at)
        .bind(membership.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_tag_binding(&mut self, binding: &TagBinding, creator: Uuid) -> PublicResult<()> {
        sqlx::query(
            r#"
            INSERT INTO item_tag (tag_id, item_path, creator)
            VALUES ($1, $2::ltree, $3)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(binding.tag_id)
        .bind(binding.item_path.as_str())
        .bind(creator)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> PublicResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
