//! Configurable key scheme for the cart cache.

use thiserror::Error;

use crate::domain::user::UserId;

/// Key prefixes used to partition cart entries in the shared cache.
///
/// The cache holds two entries per shopper: `"{header_prefix}:{user_id}"`
/// for the header and `"{items_prefix}:{user_id}"` for the line-item
/// collection. Prefixes are configuration, not hard-coded constants, so
/// deployments sharing one cache can namespace themselves apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartKeySpace {
    header_prefix: String,
    items_prefix: String,
}

impl CartKeySpace {
    /// Validate and build a key space from the two configured prefixes.
    pub fn new(
        header_prefix: impl Into<String>,
        items_prefix: impl Into<String>,
    ) -> Result<Self, CartKeySpaceError> {
        let header_prefix = validated(header_prefix.into())?;
        let items_prefix = validated(items_prefix.into())?;
        if header_prefix == items_prefix {
            return Err(CartKeySpaceError::Colliding { prefix: header_prefix });
        }
        Ok(Self {
            header_prefix,
            items_prefix,
        })
    }

    /// Cache key of the shopper's header entry.
    #[must_use]
    pub fn header_key(&self, user_id: &UserId) -> String {
        format!("{}:{}", self.header_prefix, user_id)
    }

    /// Cache key of the shopper's line-item collection.
    #[must_use]
    pub fn items_key(&self, user_id: &UserId) -> String {
        format!("{}:{}", self.items_prefix, user_id)
    }
}

impl Default for CartKeySpace {
    fn default() -> Self {
        Self {
            header_prefix: "cart:header".to_owned(),
            items_prefix: "cart:items".to_owned(),
        }
    }
}

fn validated(prefix: String) -> Result<String, CartKeySpaceError> {
    if prefix.is_empty() {
        return Err(CartKeySpaceError::Empty);
    }
    if prefix.chars().any(char::is_whitespace) {
        return Err(CartKeySpaceError::ContainsWhitespace { prefix });
    }
    Ok(prefix)
}

/// Validation errors raised when constructing a [`CartKeySpace`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartKeySpaceError {
    /// A prefix is empty.
    #[error("cart cache key prefix must not be empty")]
    Empty,
    /// A prefix contains whitespace, which the key scheme forbids.
    #[error("cart cache key prefix {prefix:?} must not contain whitespace")]
    ContainsWhitespace {
        /// The offending prefix.
        prefix: String,
    },
    /// Header and items prefixes are identical, so the entries would collide.
    #[error("cart cache key prefixes must differ, both are {prefix:?}")]
    Colliding {
        /// The shared prefix.
        prefix: String,
    },
}
