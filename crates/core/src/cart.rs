//! Shopping cart with derived totals.
//!
//! [`Cart`] holds the line items and recomputes its [`CartTotals`] after every
//! mutation. [`CartStore`] wraps a cart together with the durable storage it
//! was loaded from and writes the item list back after every change.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ProductId;
use crate::storage::{KeyValueStore, keys};

/// Errors raised while persisting the cart.
#[derive(Debug, Error)]
pub enum CartError {
    /// The item list could not be serialized.
    #[error("failed to serialize cart: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One line of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Product id; identifies the line.
    pub id: ProductId,
    /// Product name at the time it was added.
    pub name: String,
    /// Unit price. `None` when the product page did not know it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    /// Image URL for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Number of units, at least 1.
    pub quantity: u32,
}

impl CartItem {
    /// Price times quantity, treating an unknown price as zero.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price.unwrap_or_default() * Decimal::from(self.quantity)
    }
}

/// Flat-fee shipping, waived from a subtotal threshold upwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingPolicy {
    /// Fee charged below the threshold.
    pub flat_fee: Decimal,
    /// Subtotal at or above which shipping is free.
    pub free_threshold: Decimal,
}

impl ShippingPolicy {
    /// Shipping cost for a subtotal. An unknown subtotal pays the flat fee.
    #[must_use]
    pub fn cost_for(&self, subtotal: Option<Decimal>) -> Decimal {
        match subtotal {
            Some(total) if total >= self.free_threshold => Decimal::ZERO,
            _ => self.flat_fee,
        }
    }
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            flat_fee: Decimal::new(15, 0),
            free_threshold: Decimal::new(200, 0),
        }
    }
}

/// Values derived from the cart's items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    /// Sum of all quantities.
    pub total_items: u32,
    /// Sum of line totals; `None` iff the cart is empty.
    pub total: Option<Decimal>,
    /// Shipping for `total`.
    pub shipping_cost: Decimal,
    /// `total + shipping_cost`; `None` iff `total` is.
    pub final_total: Option<Decimal>,
}

impl CartTotals {
    /// Compute totals for a list of items.
    #[must_use]
    pub fn compute(items: &[CartItem], policy: &ShippingPolicy) -> Self {
        let total_items = items
            .iter()
            .fold(0u32, |acc, item| acc.saturating_add(item.quantity));
        let total = if items.is_empty() {
            None
        } else {
            Some(items.iter().map(CartItem::line_total).sum())
        };
        let shipping_cost = policy.cost_for(total);

        Self {
            total_items,
            total,
            shipping_cost,
            final_total: total.map(|t| t + shipping_cost),
        }
    }
}

/// The visitor's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    items: Vec<CartItem>,
    #[serde(flatten)]
    totals: CartTotals,
    #[serde(skip)]
    policy: ShippingPolicy,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub fn new(policy: ShippingPolicy) -> Self {
        Self::from_items(Vec::new(), policy)
    }

    /// Create a cart from existing items.
    #[must_use]
    pub fn from_items(items: Vec<CartItem>, policy: ShippingPolicy) -> Self {
        let totals = CartTotals::compute(&items, &policy);
        Self {
            items,
            totals,
            policy,
        }
    }

    /// Line items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Derived totals.
    #[must_use]
    pub const fn totals(&self) -> &CartTotals {
        &self.totals
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add an item, merging into an existing line with the same id.
    ///
    /// A quantity of zero counts as one.
    pub fn add_item(&mut self, mut item: CartItem) {
        item.quantity = item.quantity.max(1);
        match self.items.iter_mut().find(|line| line.id == item.id) {
            Some(line) => line.quantity = line.quantity.saturating_add(item.quantity),
            None => self.items.push(item),
        }
        self.recompute();
    }

    /// Remove the line with `id`. Absent ids are ignored.
    pub fn remove_item(&mut self, id: &ProductId) {
        self.items.retain(|line| &line.id != id);
        self.recompute();
    }

    /// Set the quantity of a line, clamped to at least 1.
    ///
    /// Returns `false` if no line has `id`.
    pub fn update_quantity(&mut self, id: &ProductId, quantity: u32) -> bool {
        let Some(line) = self.items.iter_mut().find(|line| &line.id == id) else {
            return false;
        };
        line.quantity = quantity.max(1);
        self.recompute();
        true
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.items.clear();
        self.recompute();
    }

    fn recompute(&mut self) {
        self.totals = CartTotals::compute(&self.items, &self.policy);
    }
}

/// A cart bound to the storage it persists into.
#[derive(Debug)]
pub struct CartStore<S> {
    cart: Cart,
    storage: S,
}

impl<S: KeyValueStore> CartStore<S> {
    /// Rehydrate the cart from `storage`.
    ///
    /// Unreadable cart data is logged and replaced by an empty cart.
    pub fn open(storage: S, policy: ShippingPolicy) -> Self {
        let items = match storage.get_json::<Vec<CartItem>>(keys::CART) {
            Ok(Some(items)) => items,
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable cart data");
                Vec::new()
            }
        };

        Self {
            cart: Cart::from_items(items, policy),
            storage,
        }
    }

    /// The current cart.
    #[must_use]
    pub const fn cart(&self) -> &Cart {
        &self.cart
    }

    /// Add an item and persist.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Serialize` if the cart cannot be written.
    pub fn add_item(&mut self, item: CartItem) -> Result<(), CartError> {
        self.cart.add_item(item);
        self.persist()
    }

    /// Remove a line and persist.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Serialize` if the cart cannot be written.
    pub fn remove_item(&mut self, id: &ProductId) -> Result<(), CartError> {
        self.cart.remove_item(id);
        self.persist()
    }

    /// Update a line's quantity and persist. Returns `false` for unknown ids.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Serialize` if the cart cannot be written.
    pub fn update_quantity(&mut self, id: &ProductId, quantity: u32) -> Result<bool, CartError> {
        let found = self.cart.update_quantity(id, quantity);
        if found {
            self.persist()?;
        }
        Ok(found)
    }

    /// Empty the cart and persist.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Serialize` if the cart cannot be written.
    pub fn clear(&mut self) -> Result<(), CartError> {
        self.cart.clear();
        self.persist()
    }

    /// Release the cart and its storage.
    pub fn into_parts(self) -> (Cart, S) {
        (self.cart, self.storage)
    }

    fn persist(&mut self) -> Result<(), CartError> {
        self.storage.set_json(keys::CART, &self.cart.items)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn item(id: &str, price: Option<i64>, quantity: u32) -> CartItem {
        CartItem {
            id: ProductId::new(id),
            name: format!("Produs {id}"),
            price: price.map(|p| Decimal::new(p, 0)),
            image: None,
            quantity,
        }
    }

    fn cart_with(items: Vec<CartItem>) -> Cart {
        let mut cart = Cart::new(ShippingPolicy::default());
        for i in items {
            cart.add_item(i);
        }
        cart
    }

    #[test]
    fn test_empty_cart_has_no_total() {
        let cart = Cart::new(ShippingPolicy::default());
        let totals = cart.totals();
        assert_eq!(totals.total_items, 0);
        assert_eq!(totals.total, None);
        assert_eq!(totals.final_total, None);
        assert_eq!(totals.shipping_cost, Decimal::new(15, 0));
    }

    #[test]
    fn test_scenario_below_free_shipping() {
        let cart = cart_with(vec![item("a", Some(10), 2), item("b", Some(5), 1)]);
        let totals = cart.totals();
        assert_eq!(totals.total_items, 3);
        assert_eq!(totals.total, Some(Decimal::new(25, 0)));
        assert_eq!(totals.shipping_cost, Decimal::new(15, 0));
        assert_eq!(totals.final_total, Some(Decimal::new(40, 0)));
    }

    #[test]
    fn test_scenario_at_free_shipping_threshold() {
        let cart = cart_with(vec![item("a", Some(95), 2), item("b", Some(10), 1)]);
        let totals = cart.totals();
        assert_eq!(totals.total, Some(Decimal::new(200, 0)));
        assert_eq!(totals.shipping_cost, Decimal::ZERO);
        assert_eq!(totals.final_total, Some(Decimal::new(200, 0)));
    }

    #[test]
    fn test_shipping_just_below_threshold() {
        let policy = ShippingPolicy::default();
        assert_eq!(
            policy.cost_for(Some(Decimal::new(19_999, 2))),
            Decimal::new(15, 0)
        );
        assert_eq!(policy.cost_for(Some(Decimal::new(250, 0))), Decimal::ZERO);
    }

    #[test]
    fn test_add_existing_id_merges_quantity() {
        let mut cart = cart_with(vec![item("a", Some(10), 2)]);
        cart.add_item(item("a", Some(10), 3));
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 5);
        assert_eq!(cart.totals().total_items, 5);
    }

    #[test]
    fn test_add_zero_quantity_counts_as_one() {
        let cart = cart_with(vec![item("a", Some(10), 0)]);
        assert_eq!(cart.items()[0].quantity, 1);
    }

    #[test]
    fn test_missing_price_counts_as_zero() {
        let cart = cart_with(vec![item("a", None, 4), item("b", Some(7), 1)]);
        assert_eq!(cart.totals().total, Some(Decimal::new(7, 0)));
        assert_eq!(cart.totals().total_items, 5);
    }

    #[test]
    fn test_update_quantity_clamps_to_one() {
        let mut cart = cart_with(vec![item("a", Some(10), 3)]);
        assert!(cart.update_quantity(&ProductId::new("a"), 0));
        assert_eq!(cart.items()[0].quantity, 1);
        assert_eq!(cart.totals().total, Some(Decimal::new(10, 0)));
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let mut cart = cart_with(vec![item("a", Some(10), 3)]);
        assert!(!cart.update_quantity(&ProductId::new("zzz"), 9));
        assert_eq!(cart.totals().total_items, 3);
    }

    #[test]
    fn test_remove_absent_id_is_noop() {
        let mut cart = cart_with(vec![item("a", Some(10), 1)]);
        cart.remove_item(&ProductId::new("b"));
        assert_eq!(cart.items().len(), 1);
        cart.remove_item(&ProductId::new("a"));
        assert!(cart.is_empty());
        assert_eq!(cart.totals().total, None);
    }

    #[test]
    fn test_total_items_tracks_mixed_operations() {
        let mut cart = Cart::new(ShippingPolicy::default());
        let ops: Vec<Box<dyn Fn(&mut Cart)>> = vec![
            Box::new(|c| c.add_item(item("a", Some(3), 2))),
            Box::new(|c| c.add_item(item("b", Some(4), 5))),
            Box::new(|c| {
                c.update_quantity(&ProductId::new("b"), 2);
            }),
            Box::new(|c| c.add_item(item("a", Some(3), 1))),
            Box::new(|c| c.add_item(item("c", None, 7))),
            Box::new(|c| c.remove_item(&ProductId::new("a"))),
        ];

        for op in ops {
            op(&mut cart);
            let expected: u32 = cart.items().iter().map(|i| i.quantity).sum();
            assert_eq!(cart.totals().total_items, expected);
        }
    }

    #[test]
    fn test_store_persists_every_change_and_reloads() {
        let mut storage = MemoryStore::new();
        {
            let mut store = CartStore::open(&mut storage, ShippingPolicy::default());
            store.add_item(item("a", Some(10), 2)).unwrap();
            store.add_item(item("b", Some(5), 1)).unwrap();
            store.update_quantity(&ProductId::new("b"), 4).unwrap();
        }

        let reloaded = CartStore::open(&mut storage, ShippingPolicy::default());
        let items = reloaded.cart().items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id.as_str(), "a");
        assert_eq!(items[1].quantity, 4);
        assert_eq!(reloaded.cart().totals().total, Some(Decimal::new(40, 0)));
    }

    #[test]
    fn test_store_clear_persists_empty_list() {
        let mut storage = MemoryStore::new();
        let mut store = CartStore::open(&mut storage, ShippingPolicy::default());
        store.add_item(item("a", Some(10), 2)).unwrap();
        store.clear().unwrap();
        drop(store);

        assert_eq!(storage.get(keys::CART).as_deref(), Some("[]"));
    }

    #[test]
    fn test_store_recovers_from_corrupt_data() {
        let storage = MemoryStore::from_entries([(keys::CART, "{definitely not a cart")]);
        let store = CartStore::open(storage, ShippingPolicy::default());
        assert!(store.cart().is_empty());
    }

    #[test]
    fn test_serialized_cart_exposes_totals() {
        let cart = cart_with(vec![item("a", Some(10), 2)]);
        let json = serde_json::to_value(&cart).unwrap();
        assert_eq!(json["totalItems"], 2);
        assert!(json["items"].is_array());
        assert!(json.get("policy").is_none());
    }
}
