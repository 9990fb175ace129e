//! Per-visitor key/value storage.
//!
//! A visitor's state lives in three scopes, each addressed through the same
//! [`KeyValueStore`] trait:
//!
//! - **local** - durable storage that survives restarts (cart, pending orders)
//! - **session** - volatile storage that may disappear at any time
//! - **cookies** - values that travel with the browser across redirects
//!
//! The service loads a [`ClientStorage`] snapshot at the start of a request,
//! runs the domain logic against it, and writes back only the keys that
//! changed ([`MemoryStore::take_changes`]).

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Well-known storage keys.
pub mod keys {
    use crate::OrderNumber;

    /// Local: JSON array of cart line items.
    pub const CART: &str = "cart";

    /// Local: JSON map of order number to order, written at checkout.
    pub const PENDING_ORDERS: &str = "pendingOrders";

    /// Local: single pending order in the format used before `pendingOrders`.
    pub const PENDING_ORDER: &str = "pendingOrder";

    /// Local: summary of the most recently placed order.
    pub const LAST_ORDER_DETAILS: &str = "lastOrderDetails";

    /// Session: backup of the order being paid for.
    pub const CURRENT_ORDER_BACKUP: &str = "currentOrderBackup";

    /// Prefix of the per-order recovery cookie.
    pub const RECOVERY_COOKIE_PREFIX: &str = "orderRecovery_";

    /// Name of the recovery cookie for one order.
    #[must_use]
    pub fn recovery_cookie(order_number: &OrderNumber) -> String {
        format!("{RECOVERY_COOKIE_PREFIX}{order_number}")
    }
}

/// String key/value storage.
pub trait KeyValueStore {
    /// Read a value.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value, replacing any previous one.
    fn set(&mut self, key: &str, value: String);

    /// Delete a value, returning what was stored.
    fn remove(&mut self, key: &str) -> Option<String>;

    /// Read and deserialize a JSON value.
    ///
    /// Returns `Ok(None)` if the key is absent.
    ///
    /// # Errors
    ///
    /// Returns the deserialization error if the stored value is not valid JSON
    /// for `T`.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, serde_json::Error>
    where
        Self: Sized,
    {
        self.get(key)
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
    }

    /// Serialize and write a JSON value.
    ///
    /// # Errors
    ///
    /// Returns the serialization error if `value` cannot be represented as JSON.
    fn set_json<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), serde_json::Error>
    where
        Self: Sized,
    {
        let raw = serde_json::to_string(value)?;
        self.set(key, raw);
        Ok(())
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &mut T {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: String) {
        (**self).set(key, value);
    }

    fn remove(&mut self, key: &str) -> Option<String> {
        (**self).remove(key)
    }
}

/// In-memory store that remembers which keys changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    changes: BTreeMap<String, Option<String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with entries. Loading is not a change.
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            changes: BTreeMap::new(),
        }
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterate over the current entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether anything was written or removed since the last
    /// [`take_changes`](Self::take_changes).
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Drain the pending changes. `None` marks a removal.
    pub fn take_changes(&mut self) -> BTreeMap<String, Option<String>> {
        std::mem::take(&mut self.changes)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.changes.insert(key.to_owned(), Some(value.clone()));
        self.entries.insert(key.to_owned(), value);
    }

    fn remove(&mut self, key: &str) -> Option<String> {
        let previous = self.entries.remove(key);
        if previous.is_some() {
            self.changes.insert(key.to_owned(), None);
        }
        previous
    }
}

/// All storage scopes of one visitor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientStorage {
    /// Volatile, per-visit storage.
    pub session: MemoryStore,
    /// Durable storage.
    pub local: MemoryStore,
    /// Cookies sent with the request.
    pub cookies: MemoryStore,
}

impl ClientStorage {
    /// Create empty storage for a first-time visitor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
