//! Integration tests for the Lupul și Corbul storefront.
//!
//! # Running Tests
//!
//! ```bash
//! # In-process tests (memory stores, recording mailer)
//! cargo test -p lupul-integration-tests
//!
//! # Tests against a running server
//! STOREFRONT_BASE_URL=http://localhost:3000 cargo test -p lupul-integration-tests -- --ignored
//! ```
//!
//! # Test Harness
//!
//! [`TestApp`] builds the full router over in-memory stores, a
//! [`RecordingMailer`] and a static token verifier. Each [`TestClient`] keeps
//! its own cookie jar, so one client is one browser.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;
use tower_sessions::MemoryStore;
use tower_sessions::cookie::Cookie;
use url::Url;

use lupul_core::cart::ShippingPolicy;
use lupul_core::{Email, UserId};
use lupul_storefront::config::{EmailConfig, IdentityConfig, StorefrontConfig};
use lupul_storefront::db::Stores;
use lupul_storefront::middleware::session_layer;
use lupul_storefront::models::CurrentUser;
use lupul_storefront::routes;
use lupul_storefront::services::{RecordingMailer, RecoveryApiClient, StaticTokenVerifier};
use lupul_storefront::state::AppState;

/// Address that receives admin notices in tests.
pub const ADMIN_EMAIL: &str = "admin@lupulsicorbul.test";

/// Base URL the test app believes it is served from.
pub const BASE_URL: &str = "http://shop.test";

/// Configuration with placeholder credentials.
///
/// # Panics
///
/// Panics if a built-in constant fails to parse.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://localhost/lupul_test"),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        base_url: Url::parse(BASE_URL).unwrap(),
        admin_email: Email::parse(ADMIN_EMAIL).unwrap(),
        email: EmailConfig {
            smtp_host: "localhost".to_string(),
            smtp_port: 2525,
            smtp_username: "test".to_string(),
            smtp_password: SecretString::from("unused"),
            from_address: "Lupul și Corbul <comenzi@lupulsicorbul.test>".to_string(),
        },
        identity: IdentityConfig {
            api_key: SecretString::from("unused"),
            api_url: "http://127.0.0.1:9".to_string(),
        },
        shipping: ShippingPolicy::default(),
        guest_checkout: true,
        order_recovery_url: None,
        payment_redirect_url: None,
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// A signed-in test user and the token that signs them in.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn test_user(id: &str) -> (String, CurrentUser) {
    let user = CurrentUser {
        id: UserId::new(id),
        email: Email::parse(&format!("{id}@example.ro")).unwrap(),
        display_name: Some(format!("Utilizator {id}")),
    };
    (format!("token-{id}"), user)
}

/// Options for building a [`TestApp`].
#[derive(Debug, Clone)]
pub struct TestAppOptions {
    pub guest_checkout: bool,
    pub order_recovery_url: Option<Url>,
    pub payment_redirect_url: Option<Url>,
    /// User ids that can sign in with `token-<id>`.
    pub users: Vec<&'static str>,
}

impl Default for TestAppOptions {
    fn default() -> Self {
        Self {
            guest_checkout: true,
            order_recovery_url: None,
            payment_redirect_url: None,
            users: vec!["ana", "bogdan"],
        }
    }
}

/// The storefront router over in-memory dependencies.
pub struct TestApp {
    router: Router,
    pub stores: Stores,
    pub mailer: Arc<RecordingMailer>,
}

impl TestApp {
    /// App with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(TestAppOptions::default())
    }

    /// App with the given options.
    ///
    /// # Panics
    ///
    /// Panics if the recovery client cannot be built.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn with_options(options: TestAppOptions) -> Self {
        let mut config = test_config();
        config.guest_checkout = options.guest_checkout;
        config.order_recovery_url = options.order_recovery_url;
        config.payment_redirect_url = options.payment_redirect_url;

        let verifier = options
            .users
            .iter()
            .fold(StaticTokenVerifier::default(), |verifier, id| {
                let (token, user) = test_user(id);
                verifier.with_token(token, user)
            });

        let stores = Stores::memory();
        let mailer = Arc::new(RecordingMailer::default());
        let lookup = RecoveryApiClient::new(config.order_recovery_url.as_ref()).unwrap();
        let state = AppState::new(
            config,
            stores.clone(),
            mailer.clone(),
            Arc::new(verifier),
            Arc::new(lookup),
        );
        let router = routes::app(state, session_layer(MemoryStore::default(), false));

        Self {
            router,
            stores,
            mailer,
        }
    }

    /// A fresh browser.
    #[must_use]
    pub fn client(&self) -> TestClient {
        TestClient {
            router: self.router.clone(),
            cookies: Mutex::new(BTreeMap::new()),
        }
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// A browser talking to a [`TestApp`], with its own cookies.
pub struct TestClient {
    router: Router,
    cookies: Mutex<BTreeMap<String, String>>,
}

/// A buffered response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    /// Body as JSON.
    ///
    /// # Panics
    ///
    /// Panics if the body is not JSON.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    /// Body as text.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Values of all `Set-Cookie` headers.
    #[must_use]
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_owned)
            .collect()
    }
}

impl TestClient {
    /// Send a request and keep the cookies it sets.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the body cannot be read.
    #[allow(clippy::unwrap_used)]
    pub async fn request(&self, method: Method, path: &str, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        let cookie = self.cookie_header();
        if !cookie.is_empty() {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();

        let response = TestResponse {
            status,
            headers,
            body,
        };
        self.store_cookies(&response);
        response
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> TestResponse {
        self.request(Method::PATCH, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request(Method::DELETE, path, None).await
    }

    /// Sign in as one of the app's users.
    pub async fn sign_in(&self, user_id: &str) -> TestResponse {
        let (token, _) = test_user(user_id);
        self.post("/auth/session", serde_json::json!({ "idToken": token }))
            .await
    }

    /// Current value of a cookie.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies
            .lock()
            .ok()
            .and_then(|jar| jar.get(name).cloned())
    }

    /// Put a cookie in the jar, as if another page had set it.
    pub fn set_cookie(&self, name: &str, value: &str) {
        if let Ok(mut jar) = self.cookies.lock() {
            jar.insert(name.to_owned(), value.to_owned());
        }
    }

    /// Drop every cookie except the session, as if they expired.
    pub fn drop_cookies_except_session(&self) {
        if let Ok(mut jar) = self.cookies.lock() {
            jar.retain(|name, _| name == lupul_storefront::middleware::SESSION_COOKIE_NAME);
        }
    }

    fn cookie_header(&self) -> String {
        self.cookies
            .lock()
            .map(|jar| {
                jar.iter()
                    .map(|(name, value)| format!("{name}={value}"))
                    .collect::<Vec<_>>()
                    .join("; ")
            })
            .unwrap_or_default()
    }

    fn store_cookies(&self, response: &TestResponse) {
        let Ok(mut jar) = self.cookies.lock() else {
            return;
        };
        for set_cookie in response.set_cookies() {
            let Ok(cookie) = Cookie::parse(set_cookie) else {
                continue;
            };
            let expired = cookie.max_age().is_some_and(|age| age.is_zero());
            if expired || cookie.value().is_empty() {
                jar.remove(cookie.name());
            } else {
                jar.insert(cookie.name().to_owned(), cookie.value().to_owned());
            }
        }
    }
}

/// A checkout form body that passes validation.
#[must_use]
pub fn valid_checkout_form(payment_method: &str) -> Value {
    serde_json::json!({
        "name": "Ioana Popescu",
        "email": "ioana@example.ro",
        "phone": "0722123456",
        "address": "Str. Lupului 7",
        "city": "Cluj-Napoca",
        "county": "Cluj",
        "postalCode": "400001",
        "notes": "",
        "paymentMethod": payment_method,
    })
}
