//! Authentication bridge to the external identity provider.
//!
//! Visitors sign in on the client with the identity provider and hand the
//! resulting ID token to `POST /auth/session`. The token is verified with the
//! provider's `accounts:lookup` REST endpoint; the account it resolves to
//! becomes the session's [`CurrentUser`](crate::models::CurrentUser).

mod error;

pub use error::IdentityError;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;

use lupul_core::{Email, UserId};

use crate::config::IdentityConfig;
use crate::models::CurrentUser;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolves an ID token to the account it belongs to.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verify `id_token`.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError` if the token is rejected or the provider
    /// cannot be reached.
    async fn verify(&self, id_token: &str) -> Result<CurrentUser, IdentityError>;
}

/// REST client for the identity provider.
#[derive(Clone)]
pub struct IdentityClient {
    client: reqwest::Client,
    lookup_url: String,
    api_key: secrecy::SecretString,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    #[serde(default)]
    disabled: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl IdentityClient {
    /// Create a new identity client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            lookup_url: format!("{}/accounts:lookup", config.api_url),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl TokenVerifier for IdentityClient {
    async fn verify(&self, id_token: &str) -> Result<CurrentUser, IdentityError> {
        let response = self
            .client
            .post(&self.lookup_url)
            .query(&[("key", self.api_key.expose_secret())])
            .json(&serde_json::json!({ "idToken": id_token }))
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = serde_json::from_str::<ErrorResponse>(&body).map_or_else(
                |_| IdentityError::Provider(format!("HTTP {}", status.as_u16())),
                |e| IdentityError::from_code(&e.error.message),
            );
            tracing::warn!(status = status.as_u16(), error = %error, "Identity lookup rejected");
            return Err(error);
        }

        let lookup: LookupResponse = response.json().await?;
        let user = lookup
            .users
            .into_iter()
            .next()
            .ok_or(IdentityError::UserNotFound)?;
        if user.disabled {
            return Err(IdentityError::UserDisabled);
        }

        let email = Email::parse(user.email.as_deref().unwrap_or_default())?;
        Ok(CurrentUser {
            id: UserId::new(user.local_id),
            email,
            display_name: user.display_name.filter(|n| !n.trim().is_empty()),
        })
    }
}

/// Verifier with a fixed token table, for tests and local runs.
#[derive(Debug, Default, Clone)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, CurrentUser>,
}

impl StaticTokenVerifier {
    /// Accept `token` as `user`.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, user: CurrentUser) -> Self {
        self.tokens.insert(token.into(), user);
        self
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, id_token: &str) -> Result<CurrentUser, IdentityError> {
        self.tokens
            .get(id_token)
            .cloned()
            .ok_or(IdentityError::InvalidToken)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_response_parsing() {
        let json = r#"{"kind":"identitytoolkit#GetAccountInfoResponse","users":[{"localId":"uid-1","email":"ana@site.ro","displayName":"Ana","emailVerified":true}]}"#;
        let parsed: LookupResponse = serde_json::from_str(json).unwrap();
        let user = parsed.users.first().unwrap();
        assert_eq!(user.local_id, "uid-1");
        assert_eq!(user.display_name.as_deref(), Some("Ana"));
        assert!(!user.disabled);
    }

    #[test]
    fn test_error_response_parsing() {
        let json = r#"{"error":{"code":400,"message":"INVALID_ID_TOKEN","errors":[]}}"#;
        let parsed: ErrorResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(
            IdentityError::from_code(&parsed.error.message),
            IdentityError::InvalidToken
        ));
    }

    #[tokio::test]
    async fn test_static_verifier() {
        let user = CurrentUser {
            id: UserId::new("u1"),
            email: Email::parse("ana@site.ro").unwrap(),
            display_name: None,
        };
        let verifier = StaticTokenVerifier::default().with_token("t1", user.clone());
        assert_eq!(verifier.verify("t1").await.unwrap(), user);
        assert!(matches!(
            verifier.verify("t2").await,
            Err(IdentityError::InvalidToken)
        ));
    }
}
