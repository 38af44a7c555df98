//! Behavioural tests for the cart services over an in-memory cache.
//!
//! The in-memory cache stands in for Redis: one shared state behind a lock,
//! header entries and item hashes keyed by shopper, and a pipeline that
//! applies staged writes as a unit. A submit-failure switch lets the suite
//! show that a failed compound commit leaves neither header nor items
//! behind.

mod support;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use shopfront_backend::domain::ports::{
    CachePipeline, CachePipelineError, CacheWrite, CartHeaderStore, CartHeaderStoreError,
    CartItemStore, CartItemStoreError, DistributedLock, DistributedLockError, FixtureUserDirectory,
    LockToken,
};
use shopfront_backend::domain::{
    CartFacade, CartHeader, CartHeaderService, CartItem, CartItemService, CartTtl, ProductId,
    UserId,
};

#[derive(Default)]
struct CacheState {
    headers: HashMap<Uuid, CartHeader>,
    items: HashMap<Uuid, HashMap<Uuid, CartItem>>,
}

/// In-memory stand-in for the Redis cart cache. Implements both stores and
/// the pipeline over one shared state, like the single backend they share
/// in production.
#[derive(Default)]
struct InMemoryCartCache {
    state: Mutex<CacheState>,
    fail_next_commit: AtomicBool,
}

impl InMemoryCartCache {
    fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    fn header_count(&self) -> usize {
        self.state.lock().expect("cache poisoned").headers.len()
    }

    fn item_count(&self, user_id: &UserId) -> usize {
        self.state
            .lock()
            .expect("cache poisoned")
            .items
            .get(user_id.as_uuid())
            .map_or(0, HashMap::len)
    }
}

#[async_trait]
impl CartHeaderStore for InMemoryCartCache {
    async fn put(
        &self,
        header: &CartHeader,
        _ttl: Option<CartTtl>,
    ) -> Result<(), CartHeaderStoreError> {
        let mut state = self.state.lock().expect("cache poisoned");
        state
            .headers
            .insert(*header.user_id().as_uuid(), header.clone());
        Ok(())
    }

    async fn find(&self, user_id: &UserId) -> Result<Option<CartHeader>, CartHeaderStoreError> {
        let state = self.state.lock().expect("cache poisoned");
        Ok(state.headers.get(user_id.as_uuid()).cloned())
    }

    async fn delete(&self, user_id: &UserId) -> Result<bool, CartHeaderStoreError> {
        let mut state = self.state.lock().expect("cache poisoned");
        Ok(state.headers.remove(user_id.as_uuid()).is_some())
    }

    async fn exists(&self, user_id: &UserId) -> Result<bool, CartHeaderStoreError> {
        let state = self.state.lock().expect("cache poisoned");
        Ok(state.headers.contains_key(user_id.as_uuid()))
    }
}

#[async_trait]
impl CartItemStore for InMemoryCartCache {
    async fn put(&self, user_id: &UserId, item: &CartItem) -> Result<(), CartItemStoreError> {
        let mut state = self.state.lock().expect("cache poisoned");
        state
            .items
            .entry(*user_id.as_uuid())
            .or_default()
            .insert(*item.product_id().as_uuid(), item.clone());
        Ok(())
    }

    async fn find(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<Option<CartItem>, CartItemStoreError> {
        let state = self.state.lock().expect("cache poisoned");
        Ok(state
            .items
            .get(user_id.as_uuid())
            .and_then(|lines| lines.get(product_id.as_uuid()))
            .cloned())
    }

    async fn all(&self, user_id: &UserId) -> Result<Vec<CartItem>, CartItemStoreError> {
        let state = self.state.lock().expect("cache poisoned");
        Ok(state
            .items
            .get(user_id.as_uuid())
            .map(|lines| lines.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn remove(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<bool, CartItemStoreError> {
        let mut state = self.state.lock().expect("cache poisoned");
        let Some(lines) = state.items.get_mut(user_id.as_uuid()) else {
            return Ok(false);
        };
        let removed = lines.remove(product_id.as_uuid()).is_some();
        // An emptied hash disappears, like a Redis hash whose last field
        // was deleted.
        if lines.is_empty() {
            state.items.remove(user_id.as_uuid());
        }
        Ok(removed)
    }

    async fn delete_all(&self, user_id: &UserId) -> Result<bool, CartItemStoreError> {
        let mut state = self.state.lock().expect("cache poisoned");
        Ok(state.items.remove(user_id.as_uuid()).is_some())
    }
}

#[async_trait]
impl CachePipeline for InMemoryCartCache {
    async fn apply(&self, writes: &[CacheWrite]) -> Result<bool, CachePipelineError> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(CachePipelineError::submit("simulated pipeline outage"));
        }
        let mut state = self.state.lock().expect("cache poisoned");
        let mut all_satisfied = true;
        for write in writes {
            let satisfied = match write {
                CacheWrite::PutHeader { header, .. } => {
                    state
                        .headers
                        .insert(*header.user_id().as_uuid(), header.clone());
                    true
                }
                CacheWrite::PutItem { user_id, item } => {
                    state
                        .items
                        .entry(*user_id.as_uuid())
                        .or_default()
                        .insert(*item.product_id().as_uuid(), item.clone());
                    true
                }
                CacheWrite::RemoveItem {
                    user_id,
                    product_id,
                } => state
                    .items
                    .get_mut(user_id.as_uuid())
                    .is_some_and(|lines| lines.remove(product_id.as_uuid()).is_some()),
                CacheWrite::ExpireItems { user_id, .. } => {
                    state.items.contains_key(user_id.as_uuid())
                }
                CacheWrite::DeleteHeader { user_id } => {
                    state.headers.remove(user_id.as_uuid()).is_some()
                }
                CacheWrite::DeleteAllItems { user_id } => {
                    // An emptied cart legitimately has no items entry.
                    state.items.remove(user_id.as_uuid());
                    true
                }
            };
            all_satisfied &= satisfied;
        }
        Ok(all_satisfied)
    }
}

/// In-memory stand-in for the Redis lock: first writer claims the key, and
/// only the claiming token can give it back.
#[derive(Default)]
struct InMemoryLock {
    held: Mutex<HashMap<String, Uuid>>,
}

#[async_trait]
impl DistributedLock for InMemoryLock {
    async fn acquire(
        &self,
        key: &str,
        token: &LockToken,
        _ttl: Duration,
    ) -> Result<bool, DistributedLockError> {
        let mut held = self.held.lock().expect("lock poisoned");
        if held.contains_key(key) {
            return Ok(false);
        }
        held.insert(key.to_owned(), *token.as_uuid());
        Ok(true)
    }

    async fn release(&self, key: &str, token: &LockToken) -> Result<bool, DistributedLockError> {
        let mut held = self.held.lock().expect("lock poisoned");
        if held.get(key) == Some(token.as_uuid()) {
            held.remove(key);
            return Ok(true);
        }
        Ok(false)
    }
}

struct Harness {
    cache: Arc<InMemoryCartCache>,
    items: CartItemService<InMemoryCartCache, InMemoryCartCache, InMemoryCartCache, FixtureUserDirectory>,
    headers: CartHeaderService<InMemoryCartCache, FixtureUserDirectory>,
    facade: CartFacade<InMemoryCartCache, InMemoryCartCache, InMemoryCartCache>,
}

fn harness() -> Harness {
    support::init_tracing();
    let cache = Arc::new(InMemoryCartCache::default());
    let users = Arc::new(FixtureUserDirectory);
    Harness {
        items: CartItemService::new(
            Arc::clone(&cache),
            Arc::clone(&cache),
            Arc::clone(&cache),
            Arc::clone(&users),
        ),
        headers: CartHeaderService::new(Arc::clone(&cache), users),
        facade: CartFacade::new(Arc::clone(&cache), Arc::clone(&cache), Arc::clone(&cache)),
        cache,
    }
}

fn line(quantity: u32) -> CartItem {
    CartItem::new(ProductId::random(), quantity, Decimal::new(1999, 2), "widget")
        .expect("valid item")
}

#[tokio::test]
async fn first_add_creates_header_and_item_together() {
    let h = harness();
    let user_id = UserId::random();
    let item = line(2);
    let product_id = *item.product_id();

    assert!(h.items.add_item(item, user_id).await);

    let cart = h.facade.cart(&user_id).await.expect("cart present");
    assert!(cart.header().is_active());
    assert_eq!(cart.items().len(), 1);
    assert_eq!(cart.items()[0].product_id(), &product_id);
    assert_eq!(cart.items()[0].quantity(), 2);
}

#[tokio::test]
async fn failed_compound_commit_leaves_no_partial_cart() {
    let h = harness();
    let user_id = UserId::random();
    h.cache.fail_next_commit();

    assert!(!h.items.add_item(line(1), user_id).await);

    assert_eq!(h.cache.header_count(), 0, "no header without its item");
    assert_eq!(h.cache.item_count(&user_id), 0, "no item without its header");
    assert!(h.facade.cart(&user_id).await.is_none());
}

#[tokio::test]
async fn cart_lifecycle_from_first_add_to_delete() {
    let h = harness();
    let user_id = UserId::random();
    let item = line(2);
    let product_id = *item.product_id();

    // First add creates header and item in one unit.
    assert!(h.items.add_item(item, user_id).await);
    assert!(h.headers.exists_for_user(&user_id).await);

    // Increase takes the line to three.
    assert!(h.items.increase_item(&product_id, &user_id).await);
    let items = h.items.items(&user_id).await.expect("items readable");
    assert_eq!(items[0].quantity(), 3);

    // Three decreases empty the line out entirely; the header survives.
    for _ in 0..3 {
        assert!(h.items.decrease_item(&product_id, &user_id).await);
    }
    let items = h.items.items(&user_id).await.expect("items readable");
    assert!(items.is_empty(), "decremented-to-zero line must be gone");
    assert!(h.headers.exists_for_user(&user_id).await);

    // Deleting the cart drops the header too.
    assert!(h.facade.delete_cart(&user_id).await);
    assert!(!h.headers.exists_for_user(&user_id).await);
    assert!(h.facade.cart(&user_id).await.is_none());
}

#[tokio::test]
async fn decrease_at_quantity_one_removes_the_line() {
    let h = harness();
    let user_id = UserId::random();
    let item = line(1);
    let product_id = *item.product_id();

    assert!(h.items.add_item(item, user_id).await);
    assert!(h.items.decrease_item(&product_id, &user_id).await);

    let items = h.items.items(&user_id).await.expect("items readable");
    assert!(
        items.iter().all(|line| line.product_id() != &product_id),
        "line must be absent, not stored at quantity zero"
    );
}

#[tokio::test]
async fn second_add_is_a_direct_write_that_replaces_the_line() {
    let h = harness();
    let user_id = UserId::random();
    let first = line(2);
    let product_id = *first.product_id();

    assert!(h.items.add_item(first, user_id).await);
    let replacement = CartItem::new(product_id, 5, Decimal::new(1799, 2), "widget, discounted")
        .expect("valid item");
    assert!(h.items.add_item(replacement.clone(), user_id).await);

    let items = h.items.items(&user_id).await.expect("items readable");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0], replacement);
}

#[tokio::test]
async fn update_item_count_zero_removes_and_negative_is_refused() {
    let h = harness();
    let user_id = UserId::random();
    let item = line(4);
    let product_id = *item.product_id();
    assert!(h.items.add_item(item, user_id).await);

    assert!(!h.items.update_item_count(&product_id, &user_id, -2).await);
    assert_eq!(h.cache.item_count(&user_id), 1, "negative count changed nothing");

    assert!(h.items.update_item_count(&product_id, &user_id, 0).await);
    assert_eq!(h.cache.item_count(&user_id), 0);
}

#[tokio::test]
async fn header_service_round_trips_coupon_updates() {
    let h = harness();
    let user_id = UserId::random();
    let day = Duration::from_secs(24 * 60 * 60);

    assert!(h.headers.create_header(user_id, day).await);
    let mut header = h.headers.header(&user_id).await.expect("header present");
    header.apply_coupon("SAVE10", Decimal::new(1000, 2));
    assert!(h.headers.update_header(&header).await);

    let reread = h.headers.header(&user_id).await.expect("header present");
    assert_eq!(reread.coupon_code(), Some("SAVE10"));
    assert_eq!(reread.discount(), Decimal::new(1000, 2));
}

#[tokio::test]
async fn delete_cart_of_absent_shopper_reports_false() {
    let h = harness();
    assert!(!h.facade.delete_cart(&UserId::random()).await);
}

#[tokio::test]
async fn locked_first_add_creates_the_cart_and_releases_the_lock() {
    let h = harness();
    let lock = Arc::new(InMemoryLock::default());
    let service = CartItemService::new(
        Arc::clone(&h.cache),
        Arc::clone(&h.cache),
        Arc::clone(&h.cache),
        Arc::new(FixtureUserDirectory),
    )
    .with_creation_lock(Arc::clone(&lock) as Arc<dyn DistributedLock>);
    let user_id = UserId::random();

    assert!(service.add_item(line(2), user_id).await);
    assert!(h.facade.cart(&user_id).await.is_some());
    assert!(
        lock.held.lock().expect("lock poisoned").is_empty(),
        "the creation lock must be given back after the add"
    );
}

#[tokio::test]
async fn concurrent_first_adds_leave_one_consistent_cart() {
    let h = harness();
    let user_id = UserId::random();
    let first = line(1);
    let second = line(3);

    let (a, b) = tokio::join!(
        h.items.add_item(first, user_id),
        h.items.add_item(second, user_id),
    );
    assert!(a && b, "both adds report success in the accepted race");

    // Last write wins: whatever the interleaving, header and items agree.
    let cart = h.facade.cart(&user_id).await.expect("cart present");
    assert!(h.cache.header_count() == 1);
    assert!(!cart.is_empty());
}
