//! Domain models for storefront.

pub mod session;

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pg_closets_core::{Money, ProductId, UserId};

pub use session::{CurrentUser, keys as session_keys};

/// Who a server-side cart belongs to.
///
/// Signed-in users keep one cart across devices; anonymous visitors get a
/// cart keyed by a random token stored in their session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum CartOwner {
    User(UserId),
    Guest(Uuid),
}

impl CartOwner {
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(*id),
            Self::Guest(_) => None,
        }
    }

    #[must_use]
    pub const fn session_token(&self) -> Option<Uuid> {
        match self {
            Self::User(_) => None,
            Self::Guest(token) => Some(*token),
        }
    }
}

impl fmt::Display for CartOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Guest(token) => write!(f, "guest:{token}"),
        }
    }
}

/// A catalog entry as the cart sees it: current price and stock on hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: u32,
}
