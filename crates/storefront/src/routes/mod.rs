//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                              - Liveness
//! GET    /health/ready                        - Readiness (order store reachable)
//!
//! # Cart
//! GET    /api/cart                            - Cart with totals
//! DELETE /api/cart                            - Empty the cart
//! GET    /api/cart/count                      - Units in cart
//! POST   /api/cart/items                      - Add item
//! PATCH  /api/cart/items/{id}                 - Change quantity
//! DELETE /api/cart/items/{id}                 - Remove item
//!
//! # Checkout
//! GET    /api/checkout                        - Phase and prefilled form
//! POST   /api/checkout                        - Submit and place the order
//! POST   /api/checkout/guest                  - Continue without an account
//!
//! # Orders
//! GET    /order-confirmation?orderId=         - Confirmation page
//! GET    /api/orders/last                     - Last order summary
//! GET    /api/orders/{id}/confirmation        - Confirmation as JSON
//!
//! # Events
//! GET    /api/events                          - Event list
//! GET    /api/events/{id}                     - Event detail
//! POST   /api/events/{id}/registration        - Register (requires auth)
//! DELETE /api/events/{id}/registration        - Unregister (requires auth)
//! GET    /api/special-sessions                - Special session list
//! POST   /api/special-sessions/{id}/enrollments - Enroll (requires auth)
//! POST   /api/event-registrations             - Public sign-up form
//!
//! # Analytics
//! POST   /api/analytics                       - Record an event
//!
//! # Auth
//! GET    /auth/session                        - Current user
//! POST   /auth/session                        - Sign in with an ID token
//! POST   /auth/logout                         - Sign out
//! ```

pub mod analytics;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod events;
pub mod health;
pub mod orders;

use axum::{
    Router, middleware,
    routing::{get, patch, post},
};
use tower_http::trace::TraceLayer;
use tower_sessions::{SessionManagerLayer, SessionStore};

use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/count", get(cart::count))
        .route("/items", post(cart::add))
        .route("/items/{id}", patch(cart::update).delete(cart::remove))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show).post(checkout::submit))
        .route("/guest", post(checkout::continue_as_guest))
}

/// Create the event routes router.
pub fn event_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(events::list))
        .route("/{id}", get(events::show))
        .route(
            "/{id}/registration",
            post(events::register).delete(events::unregister),
        )
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/session", get(auth::current).post(auth::sign_in))
        .route("/logout", post(auth::sign_out))
}

/// Create the JSON API router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .route("/orders/last", get(orders::last))
        .route("/orders/{id}/confirmation", get(orders::confirmation_json))
        .nest("/events", event_routes())
        .route("/special-sessions", get(events::list_special_sessions))
        .route("/special-sessions/{id}/enrollments", post(events::enroll))
        .route("/event-registrations", post(events::signup))
        .route("/analytics", post(analytics::record))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/order-confirmation", get(orders::confirmation_page))
        .nest("/api", api_routes())
        .nest("/auth", auth_routes())
}

/// The complete application with its session layer.
///
/// Sentry layers are added by the binary on top of this.
pub fn app<S>(state: AppState, sessions: SessionManagerLayer<S>) -> Router
where
    S: SessionStore + Clone,
{
    routes()
        .layer(sessions)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
