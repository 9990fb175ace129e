//! Status enums for orders and payments.

use serde::{Deserialize, Serialize};

/// How the customer pays for an order.
///
/// Serialized with the values the checkout form submits. Values this
/// version does not know deserialize to [`PaymentMethod::Unknown`] so old
/// backups stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentMethod {
    /// Online card payment through the external payment provider.
    #[serde(rename = "card")]
    Card,
    /// Cash on delivery.
    #[serde(rename = "ramburs")]
    CashOnDelivery,
    #[default]
    #[serde(other, rename = "unknown")]
    Unknown,
}

impl PaymentMethod {
    /// Wire value of the payment method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::CashOnDelivery => "ramburs",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a stored wire value; unknown values map to `Unknown`.
    #[must_use]
    pub fn from_db(value: &str) -> Self {
        match value {
            "card" => Self::Card,
            "ramburs" => Self::CashOnDelivery,
            _ => Self::Unknown,
        }
    }

    /// Human-readable label used in emails and on the confirmation page.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Card => "Plată cu cardul",
            Self::CashOnDelivery => "Ramburs la livrare",
            Self::Unknown => "Metodă de plată necunoscută",
        }
    }

    /// Whether the customer leaves the site to pay before confirmation.
    #[must_use]
    pub const fn requires_redirect(self) -> bool {
        matches!(self, Self::Card)
    }
}

/// Lifecycle of the authoritative order record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created, waiting for the payment provider to redirect back.
    #[default]
    PendingPayment,
    /// Placed with cash on delivery, or returned from payment.
    Placed,
}

impl OrderStatus {
    /// Value stored in the `orders.status` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::Placed => "placed",
        }
    }

    /// Initial status for a freshly submitted order.
    #[must_use]
    pub const fn initial_for(method: PaymentMethod) -> Self {
        if method.requires_redirect() {
            Self::PendingPayment
        } else {
            Self::Placed
        }
    }
}
