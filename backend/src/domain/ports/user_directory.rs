//! Port onto the external user service.
//!
//! The cart subsystem never owns user records; it only asks whether a
//! shopper exists before accepting cart mutations, and fails closed when
//! the answer is no or unavailable.

use async_trait::async_trait;

use crate::domain::user::UserId;

use super::define_port_error;

define_port_error! {
    /// Errors raised by user directory adapters.
    pub enum UserDirectoryError {
        /// The directory could not be reached or answered malformed.
        Lookup => "user directory lookup failed: {message}",
    }
}

/// Existence lookup against the platform's user service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Whether the shopper is a known user.
    async fn user_exists(&self, user_id: &UserId) -> Result<bool, UserDirectoryError>;
}

/// Fixture directory for tests and wiring that does not exercise user
/// lookups: every shopper exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureUserDirectory;

#[async_trait]
impl UserDirectory for FixtureUserDirectory {
    async fn user_exists(&self, _user_id: &UserId) -> Result<bool, UserDirectoryError> {
        Ok(true)
    }
}
