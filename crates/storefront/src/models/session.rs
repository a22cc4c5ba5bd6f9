//! Session-related types.
//!
//! Types stored in the session for cart ownership.

use serde::{Deserialize, Serialize};

use pg_closets_core::UserId;

/// Session-stored user identity.
///
/// Written by the account service at sign-in; the cart API only reads it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the anonymous cart token of a guest visitor.
    pub const CART_TOKEN: &str = "cart_token";
}
