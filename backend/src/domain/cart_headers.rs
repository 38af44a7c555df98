//! Cart header operations over the cache.
//!
//! Every public operation recovers adapter failures into `false`/`None`
//! (with a log line) rather than propagating them: the subsystem's callers
//! branch on results, they do not catch errors.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::domain::cart::{CartHeader, CartTtl};
use crate::domain::ports::{CartHeaderStore, UserDirectory};
use crate::domain::user::UserId;

/// Service owning the per-shopper cart header entry.
#[derive(Clone)]
pub struct CartHeaderService<H, U> {
    headers: Arc<H>,
    users: Arc<U>,
}

impl<H, U> CartHeaderService<H, U> {
    /// Create the service over its header store and user directory.
    pub fn new(headers: Arc<H>, users: Arc<U>) -> Self {
        Self { headers, users }
    }
}

impl<H, U> CartHeaderService<H, U>
where
    H: CartHeaderStore,
    U: UserDirectory,
{
    /// Create a fresh header for the shopper with zeroed totals.
    ///
    /// Rejects lifetimes outside the inclusive 24–48 hour window and
    /// shoppers the user directory does not know.
    pub async fn create_header(&self, user_id: UserId, ttl: Duration) -> bool {
        let ttl = match CartTtl::new(ttl) {
            Ok(ttl) => ttl,
            Err(err) => {
                warn!(%user_id, error = %err, "rejected cart header lifetime");
                return false;
            }
        };
        if !self.known_user(&user_id).await {
            return false;
        }

        let header = CartHeader::new(user_id, ttl);
        match self.headers.put(&header, Some(ttl)).await {
            Ok(()) => true,
            Err(err) => {
                warn!(%user_id, error = %err, "cart header create failed");
                false
            }
        }
    }

    /// Read the shopper's header, if one exists.
    pub async fn header(&self, user_id: &UserId) -> Option<CartHeader> {
        match self.headers.find(user_id).await {
            Ok(header) => header,
            Err(err) => {
                warn!(%user_id, error = %err, "cart header read failed");
                None
            }
        }
    }

    /// Replace the header's mutable fields (totals, discount, coupon,
    /// active flag). The entry's remaining lifetime is preserved.
    pub async fn update_header(&self, header: &CartHeader) -> bool {
        match self.headers.put(header, None).await {
            Ok(()) => true,
            Err(err) => {
                warn!(user_id = %header.user_id(), error = %err, "cart header update failed");
                false
            }
        }
    }

    /// Remove the shopper's header entry.
    ///
    /// Only meant as part of a coordinated header-plus-items delete; on its
    /// own it leaves orphaned items behind. [`crate::domain::CartFacade`]
    /// does the coordinated version.
    pub async fn delete_header(&self, user_id: &UserId) -> bool {
        match self.headers.delete(user_id).await {
            Ok(removed) => removed,
            Err(err) => {
                warn!(%user_id, error = %err, "cart header delete failed");
                false
            }
        }
    }

    /// Whether the shopper currently has a cart header.
    pub async fn exists_for_user(&self, user_id: &UserId) -> bool {
        match self.headers.exists(user_id).await {
            Ok(exists) => exists,
            Err(err) => {
                warn!(%user_id, error = %err, "cart header existence probe failed");
                false
            }
        }
    }

    async fn known_user(&self, user_id: &UserId) -> bool {
        match self.users.user_exists(user_id).await {
            Ok(exists) => exists,
            Err(err) => {
                warn!(%user_id, error = %err, "user lookup failed, failing closed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{
        CartHeaderStoreError, MockCartHeaderStore, MockUserDirectory, UserDirectoryError,
    };

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn service(
        headers: MockCartHeaderStore,
        users: MockUserDirectory,
    ) -> CartHeaderService<MockCartHeaderStore, MockUserDirectory> {
        CartHeaderService::new(Arc::new(headers), Arc::new(users))
    }

    #[tokio::test]
    async fn create_header_writes_fresh_header_with_ttl() {
        let user_id = UserId::random();
        let mut users = MockUserDirectory::new();
        users
            .expect_user_exists()
            .times(1)
            .return_once(|_| Ok(true));
        let mut headers = MockCartHeaderStore::new();
        headers
            .expect_put()
            .withf(move |header, ttl| {
                *header.user_id() == user_id
                    && header.is_active()
                    && header.coupon_code().is_none()
                    && *ttl == Some(CartTtl::default_ttl())
            })
            .times(1)
            .return_once(|_, _| Ok(()));

        assert!(service(headers, users).create_header(user_id, DAY).await);
    }

    #[tokio::test]
    async fn create_header_rejects_out_of_window_ttl() {
        let mut users = MockUserDirectory::new();
        users.expect_user_exists().times(0);
        let mut headers = MockCartHeaderStore::new();
        headers.expect_put().times(0);

        let created = service(headers, users)
            .create_header(UserId::random(), Duration::from_secs(60))
            .await;
        assert!(!created);
    }

    #[tokio::test]
    async fn create_header_fails_closed_for_unknown_user() {
        let mut users = MockUserDirectory::new();
        users
            .expect_user_exists()
            .times(1)
            .return_once(|_| Ok(false));
        let mut headers = MockCartHeaderStore::new();
        headers.expect_put().times(0);

        let created = service(headers, users)
            .create_header(UserId::random(), DAY)
            .await;
        assert!(!created);
    }

    #[tokio::test]
    async fn create_header_fails_closed_when_directory_errors() {
        let mut users = MockUserDirectory::new();
        users
            .expect_user_exists()
            .times(1)
            .return_once(|_| Err(UserDirectoryError::lookup("socket closed")));
        let mut headers = MockCartHeaderStore::new();
        headers.expect_put().times(0);

        let created = service(headers, users)
            .create_header(UserId::random(), DAY)
            .await;
        assert!(!created);
    }

    #[tokio::test]
    async fn header_recovers_store_error_into_none() {
        let mut headers = MockCartHeaderStore::new();
        headers
            .expect_find()
            .times(1)
            .return_once(|_| Err(CartHeaderStoreError::backend("connection reset")));

        let found = service(headers, MockUserDirectory::new())
            .header(&UserId::random())
            .await;
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn update_header_preserves_remaining_lifetime() {
        let header = CartHeader::new(UserId::random(), CartTtl::default_ttl());
        let expected = header.clone();
        let mut headers = MockCartHeaderStore::new();
        headers
            .expect_put()
            .withf(move |stored, ttl| *stored == expected && ttl.is_none())
            .times(1)
            .return_once(|_, _| Ok(()));

        assert!(
            service(headers, MockUserDirectory::new())
                .update_header(&header)
                .await
        );
    }

    #[tokio::test]
    async fn exists_for_user_recovers_store_error_into_false() {
        let mut headers = MockCartHeaderStore::new();
        headers
            .expect_exists()
            .times(1)
            .return_once(|_| Err(CartHeaderStoreError::backend("timeout")));

        let exists = service(headers, MockUserDirectory::new())
            .exists_for_user(&UserId::random())
            .await;
        assert!(!exists);
    }

    #[tokio::test]
    async fn delete_header_reports_whether_an_entry_was_removed() {
        let mut headers = MockCartHeaderStore::new();
        headers.expect_delete().times(1).return_once(|_| Ok(false));

        let removed = service(headers, MockUserDirectory::new())
            .delete_header(&UserId::random())
            .await;
        assert!(!removed);
    }
}
