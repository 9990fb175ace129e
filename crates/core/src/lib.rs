//! Lupul și Corbul Core - Shared domain library.
//!
//! This crate provides the domain model used by the storefront service and
//! the CLI:
//! - `storefront` - Public HTTP API (cart, checkout, order confirmation, events)
//! - `cli` - Command-line tools for migrations and seeding
//!
//! # Architecture
//!
//! The core crate contains only types, state machines and pure functions - no
//! network, no database access. Per-visitor state is expressed through the
//! [`storage::KeyValueStore`] trait so that the same logic runs against an
//! in-memory snapshot in tests and against session-backed storage in the
//! service.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, emails, money and statuses
//! - [`storage`] - Key/value stores and the well-known storage keys
//! - [`cart`] - Cart store with derived totals and persistence
//! - [`checkout`] - Checkout form controller and validation
//! - [`order`] - Orders and their recovery provenance
//! - [`recovery`] - Priority probe over the visitor's storage layers
//! - [`event`] - Events, special sessions and registration rules

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod event;
pub mod order;
pub mod recovery;
pub mod storage;
pub mod types;
pub mod validation;

pub use types::*;
