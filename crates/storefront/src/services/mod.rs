//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Identity provider token verification
//! - `email` - Email delivery (SMTP, recording mailer for tests)
//! - `client_storage` - Server-side home of the visitor's storage layers
//! - `checkout` - Placing orders and choosing the post-checkout redirect
//! - `order_recovery` - Finding an order for the confirmation page
//! - `recovery_api` - Client for the remote order recovery endpoint
//! - `order_notifier` - Once-per-order confirmation emails
//! - `event_signup` - Public event sign-up form

pub mod auth;
pub mod checkout;
pub mod client_storage;
pub mod email;
pub mod event_signup;
pub mod order_notifier;
pub mod order_recovery;
pub mod recovery_api;

pub use auth::{IdentityClient, IdentityError, StaticTokenVerifier, TokenVerifier};
pub use checkout::{CheckoutUrls, PlaceOrderError, PlacedOrder, place_order};
pub use client_storage::{SessionStorageCache, Visitor, session_storage_cache};
pub use email::{EmailError, EmailMessage, Mailer, RecordingMailer, SmtpMailer};
pub use order_notifier::{NotifyOutcome, OrderNotifier};
pub use order_recovery::recover_order;
pub use recovery_api::{OrderLookup, RecoveryApiClient, RecoveryApiError};
