//! Integration tests for SqliteListStore
//!
//! These tests verify the IListStore methods using an in-memory
//! SQLite database. Each test function creates a fresh database to
//! ensure test isolation.

use chrono::{Duration, SubsecRound, Utc};

use shoplist_core::domain::{
    Email, ItemId, ListId, Share, ShareAccess, Shoppinglist, ShoppinglistItem, SyncState, UserId,
};
use shoplist_core::ports::{IListStore, TickFilter};
use shoplist_store::{DatabasePool, SqliteListStore};

// ============================================================================
// Test helpers
// ============================================================================

const USER: UserId = UserId::new(1);
const OTHER_USER: UserId = UserId::new(2);

async fn setup() -> SqliteListStore {
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    SqliteListStore::new(pool.pool().clone())
}

fn email(s: &str) -> Email {
    Email::new(s).unwrap()
}

fn test_list(name: &str) -> Shoppinglist {
    Shoppinglist::new(name, email("alice@example.com"))
}

/// Persist a list together with its shares
async fn save_list(store: &SqliteListStore, list: &Shoppinglist, user: UserId) {
    store.upsert_list(list, user).await.unwrap();
    let shares: Vec<Share> = list.shares().values().cloned().collect();
    store.replace_shares(list.id(), &shares, user).await.unwrap();
}

// ============================================================================
// List tests
// ============================================================================

#[tokio::test]
async fn test_upsert_and_get_list() {
    let store = setup().await;
    let list = test_list("Groceries").with_meta(serde_json::json!({"color": "green"}));
    save_list(&store, &list, USER).await;

    let loaded = store.get_list(list.id(), USER).await.unwrap().unwrap();
    assert_eq!(loaded.name(), "Groceries");
    assert_eq!(loaded.modified(), list.modified());
    assert_eq!(loaded.state(), SyncState::ToSync);
    assert_eq!(loaded.meta()["color"], "green");
    assert_eq!(loaded.shares().len(), 1);
    assert_eq!(
        loaded.owner().unwrap().email().as_str(),
        "alice@example.com"
    );
}

#[tokio::test]
async fn test_upsert_is_idempotent() {
    let store = setup().await;
    let mut list = test_list("Groceries");
    save_list(&store, &list, USER).await;

    list.set_name("Weekend");
    list.set_state(SyncState::Synced);
    store.upsert_list(&list, USER).await.unwrap();
    store.upsert_list(&list, USER).await.unwrap();

    let lists = store.get_lists(USER, true).await.unwrap();
    assert_eq!(lists.len(), 1);
    assert_eq!(lists[0].name(), "Weekend");
    assert_eq!(lists[0].state(), SyncState::Synced);
}

#[tokio::test]
async fn test_rows_are_scoped_by_user() {
    let store = setup().await;
    let list = test_list("Groceries");
    save_list(&store, &list, USER).await;

    assert!(store.get_list(list.id(), OTHER_USER).await.unwrap().is_none());
    assert!(store.get_lists(OTHER_USER, true).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_get_lists_excludes_tombstones() {
    let store = setup().await;
    let live = test_list("Live");
    let dead = test_list("Dead").with_state(SyncState::Deleted);
    save_list(&store, &live, USER).await;
    save_list(&store, &dead, USER).await;

    let visible = store.get_lists(USER, false).await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id(), live.id());

    let all = store.get_lists(USER, true).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn test_invalid_state_code_keeps_default() {
    let pool = DatabasePool::in_memory().await.unwrap();
    let store = SqliteListStore::new(pool.pool().clone());
    let list = test_list("Groceries").with_state(SyncState::Synced);
    save_list(&store, &list, USER).await;

    sqlx::query("UPDATE shoppinglists SET state = 3")
        .execute(pool.pool())
        .await
        .unwrap();

    let loaded = store.get_list(list.id(), USER).await.unwrap().unwrap();
    assert_eq!(loaded.state(), SyncState::ToSync);
}

#[tokio::test]
async fn test_list_predecessor_chain() {
    let store = setup().await;
    let first = test_list("First");
    let second = test_list("Second").with_previous_id(Some(first.id()));
    save_list(&store, &second, USER).await;
    save_list(&store, &first, USER).await;

    let head = store.get_list_by_previous(None, USER).await.unwrap().unwrap();
    assert_eq!(head.id(), first.id());
    let next = store
        .get_list_by_previous(Some(first.id()), USER)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(next.id(), second.id());
    assert!(store
        .get_list_by_previous(Some(second.id()), USER)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_delete_list_cascades() {
    let store = setup().await;
    let list = test_list("Groceries");
    save_list(&store, &list, USER).await;
    store
        .upsert_item(&ShoppinglistItem::new(list.id(), "Milk"), USER)
        .await
        .unwrap();

    let removed = store.delete_list(list.id(), USER).await.unwrap();
    assert_eq!(removed, 3);
    assert!(store.get_list(list.id(), USER).await.unwrap().is_none());
    assert!(store.get_items(list.id(), USER, true).await.unwrap().is_empty());
    assert!(store.get_shares(list.id(), USER, true).await.unwrap().is_empty());
}

// ============================================================================
// Item tests
// ============================================================================

#[tokio::test]
async fn test_upsert_and_get_item() {
    let store = setup().await;
    let list_id = ListId::new();
    let modified = Utc::now().trunc_subsecs(0) - Duration::hours(2);
    let item = ShoppinglistItem::new(list_id, "Milk")
        .with_count(3)
        .with_tick(true)
        .with_offer_id(Some("offer-1".into()))
        .with_creator(Some("alice@example.com".into()))
        .with_modified(modified)
        .with_state(SyncState::Synced);
    store.upsert_item(&item, USER).await.unwrap();

    let loaded = store.get_item(item.id(), USER).await.unwrap().unwrap();
    assert_eq!(loaded, item);
    assert_eq!(loaded.modified(), modified);
    assert_eq!(loaded.state(), SyncState::Synced);
    assert!(store.get_item(ItemId::new(), USER).await.unwrap().is_none());
}

#[tokio::test]
async fn test_upsert_items_in_batch() {
    let store = setup().await;
    let list_id = ListId::new();
    let items: Vec<_> = ["Milk", "Eggs", "Bread"]
        .into_iter()
        .map(|d| ShoppinglistItem::new(list_id, d))
        .collect();

    let written = store.upsert_items(&items, USER).await.unwrap();
    assert_eq!(written, 3);
    assert_eq!(store.get_items(list_id, USER, false).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_get_items_excludes_tombstones() {
    let store = setup().await;
    let list_id = ListId::new();
    let live = ShoppinglistItem::new(list_id, "Milk");
    let dead = ShoppinglistItem::new(list_id, "Eggs").with_state(SyncState::Deleted);
    store.upsert_items(&[live.clone(), dead], USER).await.unwrap();

    let items = store.get_items(list_id, USER, false).await.unwrap();
    assert_eq!(items, vec![live]);
    assert_eq!(store.get_items(list_id, USER, true).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_item_predecessor_chain() {
    let store = setup().await;
    let list_id = ListId::new();
    let a = ShoppinglistItem::new(list_id, "A");
    let b = ShoppinglistItem::new(list_id, "B").with_previous_id(Some(a.id()));
    let c = ShoppinglistItem::new(list_id, "C").with_previous_id(Some(b.id()));
    store.upsert_items(&[c.clone(), a.clone(), b.clone()], USER).await.unwrap();

    let mut order = Vec::new();
    let mut previous = None;
    while let Some(item) = store
        .get_item_by_previous(list_id, previous, USER)
        .await
        .unwrap()
    {
        order.push(item.description().to_string());
        previous = Some(item.id());
    }
    assert_eq!(order, vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_delete_items_by_tick_filter() {
    let store = setup().await;
    let list_id = ListId::new();
    let ticked = ShoppinglistItem::new(list_id, "Milk").with_tick(true);
    let unticked = ShoppinglistItem::new(list_id, "Eggs");
    let other_list = ShoppinglistItem::new(ListId::new(), "Bread").with_tick(true);
    store
        .upsert_items(&[ticked.clone(), unticked.clone(), other_list.clone()], USER)
        .await
        .unwrap();

    let removed = store
        .delete_items(list_id, TickFilter::Ticked, USER)
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(
        store.get_items(list_id, USER, true).await.unwrap(),
        vec![unticked]
    );

    let removed = store
        .delete_items(list_id, TickFilter::All, USER)
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert!(store.get_item(other_list.id(), USER).await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete_unticked_only() {
    let store = setup().await;
    let list_id = ListId::new();
    let ticked = ShoppinglistItem::new(list_id, "Milk").with_tick(true);
    let unticked = ShoppinglistItem::new(list_id, "Eggs");
    store
        .upsert_items(&[ticked.clone(), unticked], USER)
        .await
        .unwrap();

    store
        .delete_items(list_id, TickFilter::Unticked, USER)
        .await
        .unwrap();
    assert_eq!(
        store.get_items(list_id, USER, true).await.unwrap(),
        vec![ticked]
    );
}

// ============================================================================
// Share tests
// ============================================================================

#[tokio::test]
async fn test_replace_shares() {
    let store = setup().await;
    let list_id = ListId::new();
    let a = Share::new(email("a@example.com"), ShareAccess::ReadOnly, list_id);
    let b = Share::new(email("b@example.com"), ShareAccess::Owner, list_id);
    let c = Share::new(email("c@example.com"), ShareAccess::ReadWrite, list_id);

    store.replace_shares(list_id, &[a, b.clone()], USER).await.unwrap();
    store
        .replace_shares(list_id, &[b.clone(), c.clone()], USER)
        .await
        .unwrap();

    let shares = store.get_shares(list_id, USER, true).await.unwrap();
    assert_eq!(shares, vec![b, c]);
}

#[tokio::test]
async fn test_share_fields_roundtrip() {
    let store = setup().await;
    let list_id = ListId::new();
    let share = Share::new(email("bob@example.com"), ShareAccess::ReadWrite, list_id)
        .with_name("Bob")
        .with_accepted(true)
        .with_accept_url("https://example.com/accept")
        .with_state(SyncState::Synced);
    store.upsert_share(&share, USER).await.unwrap();

    let shares = store.get_shares(list_id, USER, false).await.unwrap();
    assert_eq!(shares, vec![share]);
}

#[tokio::test]
async fn test_delete_share_and_tombstones() {
    let store = setup().await;
    let list_id = ListId::new();
    let keep = Share::new(email("a@example.com"), ShareAccess::Owner, list_id);
    let gone = Share::new(email("b@example.com"), ShareAccess::ReadOnly, list_id)
        .with_state(SyncState::Deleted);
    store.upsert_share(&keep, USER).await.unwrap();
    store.upsert_share(&gone, USER).await.unwrap();

    assert_eq!(store.get_shares(list_id, USER, false).await.unwrap().len(), 1);
    assert_eq!(store.get_shares(list_id, USER, true).await.unwrap().len(), 2);

    let removed = store
        .delete_share(list_id, gone.email(), USER)
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(store.delete_shares(list_id, USER).await.unwrap(), 1);
}

#[tokio::test]
async fn test_share_tombstones_follow_list_lookup_flag() {
    let store = setup().await;
    let mut list = test_list("Shared");
    list.put_share(
        Share::new(email("bob@example.com"), ShareAccess::ReadWrite, list.id())
            .with_state(SyncState::Deleted),
    );
    save_list(&store, &list, USER).await;

    let live = store.get_lists(USER, false).await.unwrap();
    assert!(live[0].share(&email("bob@example.com")).is_none());
    let fetched = store.get_list(list.id(), USER).await.unwrap().unwrap();
    assert!(fetched.share(&email("bob@example.com")).is_none());

    let all = store.get_lists(USER, true).await.unwrap();
    let bob = all[0].share(&email("bob@example.com")).unwrap();
    assert_eq!(bob.state(), SyncState::Deleted);
    assert_eq!(all[0].shares().len(), 2);
}

// ============================================================================
// Housekeeping tests
// ============================================================================

#[tokio::test]
async fn test_clear_user_leaves_other_users() {
    let store = setup().await;
    let mine = test_list("Mine");
    let theirs = test_list("Theirs");
    save_list(&store, &mine, USER).await;
    save_list(&store, &theirs, OTHER_USER).await;

    let removed = store.clear_user(USER).await.unwrap();
    assert_eq!(removed, 2);
    assert!(store.get_lists(USER, true).await.unwrap().is_empty());
    assert_eq!(store.get_lists(OTHER_USER, true).await.unwrap().len(), 1);

    store.clear().await.unwrap();
    assert!(store.get_lists(OTHER_USER, true).await.unwrap().is_empty());
}
