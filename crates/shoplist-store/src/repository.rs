//! SQLite implementation of IListStore
//!
//! This module provides the concrete SQLite-based implementation of the
//! list store port defined in shoplist-core. It handles domain type
//! serialization/deserialization and SQL query construction.
//!
//! ## Type Mapping
//!
//! | Domain Type       | SQL Type | Strategy                                   |
//! |-------------------|----------|--------------------------------------------|
//! | ListId, ItemId    | TEXT     | UUID string via `.to_string()` / `FromStr` |
//! | UserId            | INTEGER  | `.value()` / `UserId::new()`               |
//! | Email             | TEXT     | lowercase string / `Email::new()`          |
//! | DateTime<Utc>     | TEXT     | RFC 3339 via `to_rfc3339()`                |
//! | SyncState         | INTEGER  | `code()` / `apply_state_code()`            |
//! | ShareAccess       | TEXT     | wire string (`owner`, `rw`, `r`)           |
//! | ListType          | TEXT     | `shopping_list` / `wish_list`              |
//! | meta              | TEXT     | serde_json                                 |

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use shoplist_core::domain::{
    Email, ItemId, ListId, ListType, Share, ShareAccess, Shoppinglist, ShoppinglistItem,
    SyncState, UserId,
};
use shoplist_core::ports::{IListStore, TickFilter};

use crate::StoreError;

/// Storage code of tombstoned rows
const DELETED: i64 = SyncState::Deleted.code();

/// SQLite-based implementation of the list store port
///
/// Cloning is cheap; clones share the same connection pool.
#[derive(Clone)]
pub struct SqliteListStore {
    pool: SqlitePool,
}

impl SqliteListStore {
    /// Creates a new store with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn attach_shares(
        &self,
        mut list: Shoppinglist,
        user: UserId,
        include_deleted: bool,
    ) -> anyhow::Result<Shoppinglist> {
        let shares = self.get_shares(list.id(), user, include_deleted).await?;
        list.set_shares(shares);
        Ok(list)
    }
}

// ============================================================================
// Conversion helpers
// ============================================================================

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            StoreError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

fn parse_field<T>(value: &str, field: &str) -> Result<T, StoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| {
        StoreError::SerializationError(format!("Failed to parse {} '{}': {}", field, value, e))
    })
}

fn parse_optional<T>(value: Option<String>, field: &str) -> Result<Option<T>, StoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(ref v) if !v.is_empty() => parse_field(v, field).map(Some),
        _ => Ok(None),
    }
}

fn parse_meta(s: &str) -> Result<serde_json::Value, StoreError> {
    serde_json::from_str(s)
        .map_err(|e| StoreError::SerializationError(format!("Failed to parse meta: {}", e)))
}

fn serialize_meta(meta: &serde_json::Value) -> anyhow::Result<String> {
    serde_json::to_string(meta).map_err(|e| anyhow::anyhow!("Failed to serialize meta: {}", e))
}

// ============================================================================
// Row mapping functions
// ============================================================================

fn list_from_row(row: &SqliteRow) -> Result<Shoppinglist, StoreError> {
    let id: ListId = parse_field(&row.get::<String, _>("id"), "list id")?;
    let name: String = row.get("name");
    let modified = parse_datetime(&row.get::<String, _>("modified"))?;
    let previous_id: Option<ListId> = parse_optional(row.get("previous_id"), "previous_id")?;
    let list_type: ListType = parse_field(&row.get::<String, _>("list_type"), "list_type")?;
    let meta = parse_meta(&row.get::<String, _>("meta"))?;
    let code: i64 = row.get("state");

    let mut list = Shoppinglist::from_parts(id, name, modified)
        .with_previous_id(previous_id)
        .with_list_type(list_type)
        .with_meta(meta);
    if !list.apply_state_code(code) {
        tracing::warn!(list = %id, code, "Ignoring invalid sync state code");
    }
    Ok(list)
}

fn item_from_row(row: &SqliteRow) -> Result<ShoppinglistItem, StoreError> {
    let id: ItemId = parse_field(&row.get::<String, _>("id"), "item id")?;
    let list_id: ListId = parse_field(&row.get::<String, _>("list_id"), "list id")?;
    let description: String = row.get("description");
    let count: i64 = row.get("count");
    let tick: i64 = row.get("tick");
    let offer_id: Option<String> = row.get("offer_id");
    let creator: Option<String> = row.get("creator");
    let modified = parse_datetime(&row.get::<String, _>("modified"))?;
    let previous_id: Option<ItemId> = parse_optional(row.get("previous_id"), "previous_id")?;
    let meta = parse_meta(&row.get::<String, _>("meta"))?;
    let code: i64 = row.get("state");

    let count = u32::try_from(count)
        .map_err(|_| StoreError::SerializationError(format!("Invalid item count {}", count)))?;

    let mut item = ShoppinglistItem::with_id(id, list_id, description)
        .with_count(count)
        .with_tick(tick != 0)
        .with_offer_id(offer_id)
        .with_creator(creator)
        .with_modified(modified)
        .with_previous_id(previous_id)
        .with_meta(meta);
    if !item.apply_state_code(code) {
        tracing::warn!(item = %id, code, "Ignoring invalid sync state code");
    }
    Ok(item)
}

fn share_from_row(row: &SqliteRow) -> Result<Share, StoreError> {
    let list_id: ListId = parse_field(&row.get::<String, _>("list_id"), "list id")?;
    let email: Email = parse_field(&row.get::<String, _>("email"), "email")?;
    let name: Option<String> = row.get("name");
    let access: ShareAccess = parse_field(&row.get::<String, _>("access"), "access")?;
    let accepted: i64 = row.get("accepted");
    let accept_url: Option<String> = row.get("accept_url");
    let code: i64 = row.get("state");

    let mut share = Share::new(email, access, list_id).with_accepted(accepted != 0);
    if let Some(name) = name {
        share = share.with_name(name);
    }
    if let Some(url) = accept_url {
        share = share.with_accept_url(url);
    }
    if !share.apply_state_code(code) {
        tracing::warn!(list = %list_id, code, "Ignoring invalid share sync state code");
    }
    Ok(share)
}

// ============================================================================
// IListStore implementation
// ============================================================================

const UPSERT_ITEM_SQL: &str = "INSERT OR REPLACE INTO items \
     (id, user_id, list_id, description, count, tick, offer_id, creator, modified, \
      previous_id, meta, state) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

const UPSERT_SHARE_SQL: &str = "INSERT OR REPLACE INTO shares \
     (list_id, user_id, email, name, access, accepted, accept_url, state) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?)";

#[async_trait::async_trait]
impl IListStore for SqliteListStore {
    // --- List operations ---

    async fn upsert_list(&self, list: &Shoppinglist, user: UserId) -> anyhow::Result<()> {
        let meta = serialize_meta(list.meta())?;

        sqlx::query(
            "INSERT OR REPLACE INTO shoppinglists \
             (id, user_id, name, modified, previous_id, list_type, meta, state) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(list.id().to_string())
        .bind(user.value())
        .bind(list.name())
        .bind(list.modified().to_rfc3339())
        .bind(list.previous_id().map(|id| id.to_string()))
        .bind(list.list_type().as_str())
        .bind(meta)
        .bind(list.state().code())
        .execute(&self.pool)
        .await?;

        tracing::debug!(list = %list.id(), user = %user, state = %list.state(), "Upserted list");
        Ok(())
    }

    async fn get_list(&self, id: ListId, user: UserId) -> anyhow::Result<Option<Shoppinglist>> {
        let row = sqlx::query("SELECT * FROM shoppinglists WHERE id = ? AND user_id = ?")
            .bind(id.to_string())
            .bind(user.value())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => {
                let list = list_from_row(&r)?;
                Ok(Some(self.attach_shares(list, user, false).await?))
            }
            None => Ok(None),
        }
    }

    async fn get_lists(
        &self,
        user: UserId,
        include_deleted: bool,
    ) -> anyhow::Result<Vec<Shoppinglist>> {
        let rows = if include_deleted {
            sqlx::query("SELECT * FROM shoppinglists WHERE user_id = ? ORDER BY modified, id")
                .bind(user.value())
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query(
                "SELECT * FROM shoppinglists WHERE user_id = ? AND state != ? \
                 ORDER BY modified, id",
            )
            .bind(user.value())
            .bind(DELETED)
            .fetch_all(&self.pool)
            .await?
        };

        let mut lists = Vec::with_capacity(rows.len());
        for row in &rows {
            let list = list_from_row(row)?;
            lists.push(self.attach_shares(list, user, include_deleted).await?);
        }
        Ok(lists)
    }

    async fn get_list_by_previous(
        &self,
        previous: Option<ListId>,
        user: UserId,
    ) -> anyhow::Result<Option<Shoppinglist>> {
        let row = sqlx::query(
            "SELECT * FROM shoppinglists \
             WHERE user_id = ? AND previous_id IS ? AND state != ? \
             LIMIT 1",
        )
        .bind(user.value())
        .bind(previous.map(|id| id.to_string()))
        .bind(DELETED)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => {
                let list = list_from_row(&r)?;
                Ok(Some(self.attach_shares(list, user, false).await?))
            }
            None => Ok(None),
        }
    }

    async fn delete_list(&self, id: ListId, user: UserId) -> anyhow::Result<u64> {
        let id = id.to_string();
        let mut tx = self.pool.begin().await?;

        let items = sqlx::query("DELETE FROM items WHERE list_id = ? AND user_id = ?")
            .bind(&id)
            .bind(user.value())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let shares = sqlx::query("DELETE FROM shares WHERE list_id = ? AND user_id = ?")
            .bind(&id)
            .bind(user.value())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let lists = sqlx::query("DELETE FROM shoppinglists WHERE id = ? AND user_id = ?")
            .bind(&id)
            .bind(user.value())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        tracing::debug!(list = %id, items, shares, "Deleted list");
        Ok(lists + items + shares)
    }

    // --- Item operations ---

    async fn upsert_item(&self, item: &ShoppinglistItem, user: UserId) -> anyhow::Result<()> {
        let meta = serialize_meta(item.meta())?;

        sqlx::query(UPSERT_ITEM_SQL)
            .bind(item.id().to_string())
            .bind(user.value())
            .bind(item.list_id().to_string())
            .bind(item.description())
            .bind(i64::from(item.count()))
            .bind(i64::from(item.tick()))
            .bind(item.offer_id())
            .bind(item.creator())
            .bind(item.modified().to_rfc3339())
            .bind(item.previous_id().map(|id| id.to_string()))
            .bind(meta)
            .bind(item.state().code())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn upsert_items(
        &self,
        items: &[ShoppinglistItem],
        user: UserId,
    ) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for item in items {
            let meta = serialize_meta(item.meta())?;
            written += sqlx::query(UPSERT_ITEM_SQL)
                .bind(item.id().to_string())
                .bind(user.value())
                .bind(item.list_id().to_string())
                .bind(item.description())
                .bind(i64::from(item.count()))
                .bind(i64::from(item.tick()))
                .bind(item.offer_id())
                .bind(item.creator())
                .bind(item.modified().to_rfc3339())
                .bind(item.previous_id().map(|id| id.to_string()))
                .bind(meta)
                .bind(item.state().code())
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        tx.commit().await?;
        tracing::debug!(count = items.len(), user = %user, "Upserted items");
        Ok(written)
    }

    async fn get_item(&self, id: ItemId, user: UserId) -> anyhow::Result<Option<ShoppinglistItem>> {
        let row = sqlx::query("SELECT * FROM items WHERE id = ? AND user_id = ?")
            .bind(id.to_string())
            .bind(user.value())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => Ok(Some(item_from_row(&r)?)),
            None => Ok(None),
        }
    }

    async fn get_items(
        &self,
        list_id: ListId,
        user: UserId,
        include_deleted: bool,
    ) -> anyhow::Result<Vec<ShoppinglistItem>> {
        let rows = if include_deleted {
            sqlx::query(
                "SELECT * FROM items WHERE list_id = ? AND user_id = ? ORDER BY modified, id",
            )
            .bind(list_id.to_string())
            .bind(user.value())
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(
                "SELECT * FROM items WHERE list_id = ? AND user_id = ? AND state != ? \
                 ORDER BY modified, id",
            )
            .bind(list_id.to_string())
            .bind(user.value())
            .bind(DELETED)
            .fetch_all(&self.pool)
            .await?
        };

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            items.push(item_from_row(row)?);
        }
        Ok(items)
    }

    async fn get_item_by_previous(
        &self,
        list_id: ListId,
        previous: Option<ItemId>,
        user: UserId,
    ) -> anyhow::Result<Option<ShoppinglistItem>> {
        let row = sqlx::query(
            "SELECT * FROM items \
             WHERE list_id = ? AND user_id = ? AND previous_id IS ? AND state != ? \
             LIMIT 1",
        )
        .bind(list_id.to_string())
        .bind(user.value())
        .bind(previous.map(|id| id.to_string()))
        .bind(DELETED)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(item_from_row(&r)?)),
            None => Ok(None),
        }
    }

    async fn delete_item(&self, id: ItemId, user: UserId) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM items WHERE id = ? AND user_id = ?")
            .bind(id.to_string())
            .bind(user.value())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_items(
        &self,
        list_id: ListId,
        filter: TickFilter,
        user: UserId,
    ) -> anyhow::Result<u64> {
        let query = match filter {
            TickFilter::All => {
                sqlx::query("DELETE FROM items WHERE list_id = ? AND user_id = ?")
                    .bind(list_id.to_string())
                    .bind(user.value())
            }
            TickFilter::Ticked | TickFilter::Unticked => sqlx::query(
                "DELETE FROM items WHERE list_id = ? AND user_id = ? AND tick = ?",
            )
            .bind(list_id.to_string())
            .bind(user.value())
            .bind(i64::from(filter == TickFilter::Ticked)),
        };

        let removed = query.execute(&self.pool).await?.rows_affected();
        tracing::debug!(list = %list_id, %filter, removed, "Deleted items");
        Ok(removed)
    }

    // --- Share operations ---

    async fn get_shares(
        &self,
        list_id: ListId,
        user: UserId,
        include_deleted: bool,
    ) -> anyhow::Result<Vec<Share>> {
        let rows = if include_deleted {
            sqlx::query("SELECT * FROM shares WHERE list_id = ? AND user_id = ? ORDER BY email")
                .bind(list_id.to_string())
                .bind(user.value())
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query(
                "SELECT * FROM shares WHERE list_id = ? AND user_id = ? AND state != ? \
                 ORDER BY email",
            )
            .bind(list_id.to_string())
            .bind(user.value())
            .bind(DELETED)
            .fetch_all(&self.pool)
            .await?
        };

        let mut shares = Vec::with_capacity(rows.len());
        for row in &rows {
            shares.push(share_from_row(row)?);
        }
        Ok(shares)
    }

    async fn upsert_share(&self, share: &Share, user: UserId) -> anyhow::Result<()> {
        sqlx::query(UPSERT_SHARE_SQL)
            .bind(share.list_id().to_string())
            .bind(user.value())
            .bind(share.email().as_str())
            .bind(share.name())
            .bind(share.access().as_str())
            .bind(i64::from(share.accepted()))
            .bind(share.accept_url())
            .bind(share.state().code())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_share(
        &self,
        list_id: ListId,
        email: &Email,
        user: UserId,
    ) -> anyhow::Result<u64> {
        let result =
            sqlx::query("DELETE FROM shares WHERE list_id = ? AND email = ? AND user_id = ?")
                .bind(list_id.to_string())
                .bind(email.as_str())
                .bind(user.value())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn delete_shares(&self, list_id: ListId, user: UserId) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM shares WHERE list_id = ? AND user_id = ?")
            .bind(list_id.to_string())
            .bind(user.value())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn replace_shares(
        &self,
        list_id: ListId,
        shares: &[Share],
        user: UserId,
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM shares WHERE list_id = ? AND user_id = ?")
            .bind(list_id.to_string())
            .bind(user.value())
            .execute(&mut *tx)
            .await?;

        for share in shares {
            sqlx::query(UPSERT_SHARE_SQL)
                .bind(list_id.to_string())
                .bind(user.value())
                .bind(share.email().as_str())
                .bind(share.name())
                .bind(share.access().as_str())
                .bind(i64::from(share.accepted()))
                .bind(share.accept_url())
                .bind(share.state().code())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        tracing::debug!(list = %list_id, count = shares.len(), "Replaced shares");
        Ok(())
    }

    // --- Housekeeping ---

    async fn clear(&self) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut removed = 0;
        for table in ["items", "shares", "shoppinglists"] {
            removed += sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        tracing::info!(removed, "Cleared local store");
        Ok(removed)
    }

    async fn clear_user(&self, user: UserId) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut removed = 0;
        for table in ["items", "shares", "shoppinglists"] {
            removed += sqlx::query(&format!("DELETE FROM {table} WHERE user_id = ?"))
                .bind(user.value())
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        tracing::info!(user = %user, removed, "Cleared local store for user");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime_rfc3339() {
        let dt = parse_datetime("2013-03-03T13:37:00+00:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2013-03-03T13:37:00+00:00");
    }

    #[test]
    fn test_parse_datetime_invalid() {
        assert!(matches!(
            parse_datetime("yesterday"),
            Err(StoreError::SerializationError(_))
        ));
    }

    #[test]
    fn test_parse_optional_empty_is_none() {
        let parsed: Option<ListId> = parse_optional(Some(String::new()), "previous_id").unwrap();
        assert!(parsed.is_none());
        let parsed: Option<ListId> = parse_optional(None, "previous_id").unwrap();
        assert!(parsed.is_none());
        let bad: Result<Option<ListId>, _> = parse_optional(Some("x".into()), "previous_id");
        assert!(bad.is_err());
    }
}
