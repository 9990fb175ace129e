//! Domain models owned by the storefront service.
//!
//! Order, cart and event types live in `lupul-core`; these are the records
//! only this service writes.

pub mod analytics;
pub mod registration;
pub mod session;

pub use analytics::{AnalyticsEvent, AnalyticsPayload};
pub use registration::EventRegistration;
pub use session::{CurrentUser, keys as session_keys};
