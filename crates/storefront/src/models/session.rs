//! Session-related types.
//!
//! Types stored in the session for authentication state and per-visitor
//! storage.

use serde::{Deserialize, Serialize};

use lupul_core::checkout::AuthState;
use lupul_core::{Email, UserId};

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    /// Identity provider user id.
    pub id: UserId,
    /// Account email address.
    pub email: Email,
    /// Display name from the identity provider, if set.
    pub display_name: Option<String>,
}

impl CurrentUser {
    /// Checkout view of this user.
    #[must_use]
    pub fn auth_state(&self) -> AuthState {
        AuthState::Authenticated {
            email: self.email.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the visitor id that scopes volatile storage.
    pub const VISITOR_ID: &str = "visitor_id";

    /// Key for the visitor's durable storage entries.
    pub const LOCAL_STORAGE: &str = "local_storage";

    /// Key set once an anonymous visitor opts into guest checkout.
    pub const GUEST_CHECKOUT: &str = "guest_checkout";
}
