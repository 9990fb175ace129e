//! Lupul și Corbul storefront library.
//!
//! Cart, checkout, order confirmation and event registration for the shop,
//! provided as a library so the binary, the CLI and the integration tests
//! share one router.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
