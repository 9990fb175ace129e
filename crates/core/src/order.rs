//! Orders and their provenance.
//!
//! An [`Order`] is the snapshot of a checkout: customer contact details, the
//! lines that were in the cart and the amount due. The same shape is written
//! to every backup layer, stored as the authoritative record, and returned by
//! the remote recovery endpoint, so deserialization is lenient: missing
//! contact fields become [`PLACEHOLDER`].
//!
//! A [`RecoveredOrder`] is an order plus where it was found and whether its
//! contact data was typed in by the customer.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::CartItem;
use crate::checkout::CheckoutSubmission;
use crate::{Email, OrderNumber, PaymentMethod, ProductId};

/// Stand-in for a contact field that is not known.
pub const PLACEHOLDER: &str = "N/A";

/// Stand-in for the customer name when no order data could be found.
pub const MISSING_DATA: &str = "Date lipsă";

fn placeholder() -> String {
    PLACEHOLDER.to_owned()
}

/// One ordered product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// Product id.
    pub id: ProductId,
    /// Product name.
    pub name: String,
    /// Unit price (unknown prices are recorded as zero).
    #[serde(default)]
    pub price: Decimal,
    /// Units ordered.
    pub quantity: u32,
}

impl OrderItem {
    /// Price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

impl From<&CartItem> for OrderItem {
    fn from(item: &CartItem) -> Self {
        Self {
            id: item.id.clone(),
            name: item.name.clone(),
            price: item.price.unwrap_or_default(),
            quantity: item.quantity,
        }
    }
}

/// A customer order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Public order identifier. Older backups call it `orderId`.
    #[serde(alias = "orderId")]
    pub order_number: OrderNumber,
    /// Full name.
    #[serde(default = "placeholder")]
    pub customer_name: String,
    /// Contact email, or [`PLACEHOLDER`].
    #[serde(default = "placeholder")]
    pub customer_email: String,
    /// Contact phone.
    #[serde(default = "placeholder")]
    pub customer_phone: String,
    /// Street address.
    #[serde(default = "placeholder")]
    pub customer_address: String,
    /// City.
    #[serde(default = "placeholder")]
    pub customer_city: String,
    /// County (județ).
    #[serde(default = "placeholder")]
    pub customer_county: String,
    /// Postal code, if given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    /// Free-form delivery notes, if given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Amount due including shipping.
    #[serde(default)]
    pub total_amount: Decimal,
    /// Shipping part of `total_amount`.
    #[serde(default)]
    pub shipping_cost: Decimal,
    /// Ordered lines.
    #[serde(default)]
    pub items: Vec<OrderItem>,
    /// Payment method chosen at checkout.
    #[serde(default)]
    pub payment_method: PaymentMethod,
    /// When the order was placed; `None` when unknown.
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

impl Order {
    /// Build the order for a validated checkout.
    #[must_use]
    pub fn from_submission(
        order_number: OrderNumber,
        submission: &CheckoutSubmission,
        placed_at: DateTime<Utc>,
    ) -> Self {
        let form = &submission.form;
        Self {
            order_number,
            customer_name: form.name.clone(),
            customer_email: form.email.as_str().to_owned(),
            customer_phone: form.phone.clone(),
            customer_address: form.address.clone(),
            customer_city: form.city.clone(),
            customer_county: form.county.clone(),
            postal_code: form.postal_code.clone(),
            notes: form.notes.clone(),
            total_amount: submission.totals.final_total.unwrap_or_default(),
            shipping_cost: submission.totals.shipping_cost,
            items: submission.items.clone(),
            payment_method: form.payment_method,
            date: Some(placed_at),
        }
    }

    /// Minimal order used when nothing could be recovered.
    #[must_use]
    pub fn placeholder(order_number: OrderNumber) -> Self {
        Self {
            order_number,
            customer_name: MISSING_DATA.to_owned(),
            customer_email: placeholder(),
            customer_phone: placeholder(),
            customer_address: placeholder(),
            customer_city: placeholder(),
            customer_county: placeholder(),
            postal_code: None,
            notes: None,
            total_amount: Decimal::ZERO,
            shipping_cost: Decimal::ZERO,
            items: Vec::new(),
            payment_method: PaymentMethod::Unknown,
            date: None,
        }
    }

    /// Copy with the customer's contact details replaced by [`PLACEHOLDER`].
    ///
    /// Lines, totals and payment method are kept.
    #[must_use]
    pub fn without_contact(&self) -> Self {
        Self {
            customer_name: placeholder(),
            customer_email: placeholder(),
            customer_phone: placeholder(),
            customer_address: placeholder(),
            customer_city: placeholder(),
            customer_county: placeholder(),
            postal_code: None,
            notes: None,
            ..self.clone()
        }
    }

    /// The contact email, if it is a real address.
    #[must_use]
    pub fn contact_email(&self) -> Option<Email> {
        if self.customer_email == PLACEHOLDER {
            return None;
        }
        Email::parse(&self.customer_email).ok()
    }

    /// Sum of ordered quantities.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |acc, item| acc.saturating_add(item.quantity))
    }

    /// Short summary kept as the visitor's last order.
    #[must_use]
    pub fn summary(&self) -> OrderSummary {
        OrderSummary {
            order_number: self.order_number.clone(),
            total_amount: self.total_amount,
            item_count: self.item_count(),
            payment_method: self.payment_method,
            date: self.date,
        }
    }
}

/// Compact view of an order (`lastOrderDetails`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    /// Order number.
    pub order_number: OrderNumber,
    /// Amount due including shipping.
    pub total_amount: Decimal,
    /// Number of units.
    pub item_count: u32,
    /// Payment method.
    pub payment_method: PaymentMethod,
    /// Placement time.
    pub date: Option<DateTime<Utc>>,
}

/// Where a recovered order came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataSource {
    /// Volatile `currentOrderBackup`.
    SessionBackup,
    /// `orderRecovery_<id>` cookie.
    CookieBackup,
    /// Durable `pendingOrders` map.
    PendingOrders,
    /// Durable `pendingOrder` slot.
    LegacyPendingOrder,
    /// Authoritative database record.
    OrderRecord,
    /// Remote recovery endpoint.
    ApiRecovery,
    /// Nothing found; placeholder data.
    Fallback,
}

impl DataSource {
    /// Kebab-case name, as serialized.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SessionBackup => "session-backup",
            Self::CookieBackup => "cookie-backup",
            Self::PendingOrders => "pending-orders",
            Self::LegacyPendingOrder => "legacy-pending-order",
            Self::OrderRecord => "order-record",
            Self::ApiRecovery => "api-recovery",
            Self::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An order together with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveredOrder {
    /// The order data.
    #[serde(flatten)]
    pub order: Order,
    /// `true` when the contact data was entered by the customer.
    pub is_real_user_data: bool,
    /// Where the data was found.
    pub data_source: DataSource,
}

impl RecoveredOrder {
    /// Customer-entered data from a trusted layer.
    #[must_use]
    pub const fn real(order: Order, data_source: DataSource) -> Self {
        Self {
            order,
            is_real_user_data: true,
            data_source,
        }
    }

    /// Data from the remote recovery endpoint, which may be synthesized.
    #[must_use]
    pub const fn from_api(order: Order) -> Self {
        Self {
            order,
            is_real_user_data: false,
            data_source: DataSource::ApiRecovery,
        }
    }

    /// Placeholder order for an id nobody knows about.
    #[must_use]
    pub fn fallback(order_number: OrderNumber) -> Self {
        Self {
            order: Order::placeholder(order_number),
            is_real_user_data: false,
            data_source: DataSource::Fallback,
        }
    }

    /// What the visitor who asked for the order may see.
    ///
    /// The order record is looked up by order number alone, so its contact
    /// details are masked. Data found in the visitor's own storage is
    /// returned as is.
    #[must_use]
    pub fn for_visitor(&self) -> Self {
        match self.data_source {
            DataSource::OrderRecord => Self {
                order: self.order.without_contact(),
                is_real_user_data: false,
                data_source: self.data_source,
            },
            _ => self.clone(),
        }
    }

    /// The customer's email, when the data is real and the address usable.
    #[must_use]
    pub fn customer_recipient(&self) -> Option<Email> {
        if self.is_real_user_data {
            self.order.contact_email()
        } else {
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_order(number: &str) -> Order {
        Order {
            order_number: OrderNumber::new(number),
            customer_name: "Ana Popescu".to_owned(),
            customer_email: "ana@site.ro".to_owned(),
            customer_phone: "0722000000".to_owned(),
            customer_address: "Str. Lupului 1".to_owned(),
            customer_city: "Cluj-Napoca".to_owned(),
            customer_county: "Cluj".to_owned(),
            postal_code: None,
            notes: None,
            total_amount: Decimal::new(40, 0),
            shipping_cost: Decimal::new(15, 0),
            items: vec![OrderItem {
                id: ProductId::new("a"),
                name: "Runa".to_owned(),
                price: Decimal::new(10, 0),
                quantity: 2,
            }],
            payment_method: PaymentMethod::Card,
            date: None,
        }
    }

    #[test]
    fn test_lenient_deserialization_fills_placeholders() {
        let order: Order = serde_json::from_str(r#"{"orderId":"LC-1","totalAmount":"12.5"}"#).unwrap();
        assert_eq!(order.order_number.as_str(), "LC-1");
        assert_eq!(order.customer_email, PLACEHOLDER);
        assert_eq!(order.total_amount, Decimal::new(125, 1));
        assert_eq!(order.payment_method, PaymentMethod::Unknown);
        assert!(order.contact_email().is_none());
    }

    #[test]
    fn test_placeholder_order() {
        let order = Order::placeholder(OrderNumber::new("LC-9"));
        assert_eq!(order.customer_name, MISSING_DATA);
        assert_eq!(order.customer_email, "N/A");
        assert!(order.date.is_none());
    }

    #[test]
    fn test_customer_recipient_requires_real_data() {
        let real = RecoveredOrder::real(sample_order("LC-1"), DataSource::SessionBackup);
        assert_eq!(real.customer_recipient().unwrap().as_str(), "ana@site.ro");

        let api = RecoveredOrder::from_api(sample_order("LC-1"));
        assert!(api.customer_recipient().is_none());

        let fallback = RecoveredOrder::fallback(OrderNumber::new("LC-1"));
        assert!(fallback.customer_recipient().is_none());
    }

    #[test]
    fn test_order_record_is_masked_for_visitor() {
        let record = RecoveredOrder::real(sample_order("LC-4"), DataSource::OrderRecord);
        let shown = record.for_visitor();
        assert_eq!(shown.order.customer_name, PLACEHOLDER);
        assert_eq!(shown.order.customer_email, PLACEHOLDER);
        assert_eq!(shown.order.customer_phone, PLACEHOLDER);
        assert_eq!(shown.order.customer_address, PLACEHOLDER);
        assert_eq!(shown.order.items, record.order.items);
        assert_eq!(shown.order.total_amount, record.order.total_amount);
        assert!(!shown.is_real_user_data);
        assert_eq!(shown.data_source, DataSource::OrderRecord);

        let own = RecoveredOrder::real(sample_order("LC-4"), DataSource::CookieBackup);
        assert_eq!(own.for_visitor(), own);
    }

    #[test]
    fn test_recovered_order_serializes_flat() {
        let recovered = RecoveredOrder::from_api(sample_order("LC-2"));
        let json = serde_json::to_value(&recovered).unwrap();
        assert_eq!(json["orderNumber"], "LC-2");
        assert_eq!(json["isRealUserData"], false);
        assert_eq!(json["dataSource"], "api-recovery");
    }

    #[test]
    fn test_summary_counts_units() {
        let summary = sample_order("LC-3").summary();
        assert_eq!(summary.item_count, 2);
        assert_eq!(summary.total_amount, Decimal::new(40, 0));
    }
}
