//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;

use crate::config::StorefrontConfig;
use crate::db::Stores;
use crate::services::client_storage::SESSION_STORAGE_IDLE;
use crate::services::{
    CheckoutUrls, EmailError, IdentityClient, IdentityError, Mailer, OrderLookup, OrderNotifier,
    RecoveryApiClient, RecoveryApiError, SessionStorageCache, SmtpMailer, TokenVerifier,
    session_storage_cache,
};

/// Error wiring up the production services.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("email transport: {0}")]
    Email(#[from] EmailError),
    #[error("identity client: {0}")]
    Identity(#[from] IdentityError),
    #[error("recovery API client: {0}")]
    RecoveryApi(#[from] RecoveryApiError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like stores, outbound clients and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    stores: Stores,
    mailer: Arc<dyn Mailer>,
    identity: Arc<dyn TokenVerifier>,
    order_lookup: Arc<dyn OrderLookup>,
    notifier: OrderNotifier,
    checkout_urls: CheckoutUrls,
    session_storage: SessionStorageCache,
}

impl AppState {
    /// Create a new application state from its parts.
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        stores: Stores,
        mailer: Arc<dyn Mailer>,
        identity: Arc<dyn TokenVerifier>,
        order_lookup: Arc<dyn OrderLookup>,
    ) -> Self {
        let notifier = OrderNotifier::new(
            stores.notifications.clone(),
            mailer.clone(),
            config.admin_email.clone(),
            config.base_url.as_str(),
        );
        let checkout_urls = CheckoutUrls {
            base_url: config.base_url.clone(),
            payment_url: config.payment_redirect_url.clone(),
        };

        Self {
            inner: Arc::new(AppStateInner {
                config,
                stores,
                mailer,
                identity,
                order_lookup,
                notifier,
                checkout_urls,
                session_storage: session_storage_cache(SESSION_STORAGE_IDLE),
            }),
        }
    }

    /// Production state: `PostgreSQL` stores, SMTP, the identity provider and
    /// the recovery endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if an outbound client cannot be configured.
    pub fn connect(config: StorefrontConfig, pool: &PgPool) -> Result<Self, StateError> {
        let mailer = Arc::new(SmtpMailer::new(&config.email)?);
        let identity = Arc::new(IdentityClient::new(&config.identity)?);
        let order_lookup = Arc::new(RecoveryApiClient::new(config.order_recovery_url.as_ref())?);

        Ok(Self::new(
            config,
            Stores::postgres(pool),
            mailer,
            identity,
            order_lookup,
        ))
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get the stores.
    #[must_use]
    pub fn stores(&self) -> &Stores {
        &self.inner.stores
    }

    /// Get the mailer.
    #[must_use]
    pub fn mailer(&self) -> &dyn Mailer {
        self.inner.mailer.as_ref()
    }

    /// Get the identity token verifier.
    #[must_use]
    pub fn identity(&self) -> &dyn TokenVerifier {
        self.inner.identity.as_ref()
    }

    /// Get the remote order lookup.
    #[must_use]
    pub fn order_lookup(&self) -> &dyn OrderLookup {
        self.inner.order_lookup.as_ref()
    }

    /// Get the order confirmation notifier.
    #[must_use]
    pub fn notifier(&self) -> &OrderNotifier {
        &self.inner.notifier
    }

    /// Get the post-checkout URLs.
    #[must_use]
    pub fn checkout_urls(&self) -> &CheckoutUrls {
        &self.inner.checkout_urls
    }

    /// Get the session-scoped visitor storage.
    #[must_use]
    pub fn session_storage(&self) -> &SessionStorageCache {
        &self.inner.session_storage
    }
}
