//! Identity provider error types.

use thiserror::Error;

use lupul_core::EmailError;

/// Errors from verifying a visitor's identity token.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Token is malformed, expired or revoked.
    #[error("invalid or expired token")]
    InvalidToken,

    /// The account no longer exists.
    #[error("user not found")]
    UserNotFound,

    /// The account was disabled by an administrator.
    #[error("user disabled")]
    UserDisabled,

    /// Wrong password (reported by the provider on sign-in flows).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Email address rejected by the provider.
    #[error("invalid email")]
    InvalidEmail,

    /// The provider is throttling this client.
    #[error("too many requests")]
    TooManyRequests,

    /// Account has no usable email address.
    #[error("account email unusable: {0}")]
    AccountEmail(#[from] EmailError),

    /// Provider error code this service does not know.
    #[error("identity provider error: {0}")]
    Provider(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl IdentityError {
    /// Map a provider error code (`error.message` in the response body).
    ///
    /// Codes may carry a suffix after `" : "`, which is ignored.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        let code = code.split(" : ").next().unwrap_or(code).trim();
        match code {
            "INVALID_ID_TOKEN" | "TOKEN_EXPIRED" | "CREDENTIAL_TOO_OLD_LOGIN_AGAIN"
            | "MISSING_ID_TOKEN" => Self::InvalidToken,
            "USER_NOT_FOUND" | "EMAIL_NOT_FOUND" => Self::UserNotFound,
            "USER_DISABLED" => Self::UserDisabled,
            "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => Self::InvalidCredentials,
            "INVALID_EMAIL" => Self::InvalidEmail,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => Self::TooManyRequests,
            other => Self::Provider(other.to_string()),
        }
    }

    /// Message shown to the visitor.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidToken => "Sesiunea a expirat. Te rugăm să te autentifici din nou.",
            Self::UserNotFound => "Nu există niciun cont asociat acestei adrese de email.",
            Self::UserDisabled => "Acest cont a fost dezactivat.",
            Self::InvalidCredentials => "Parola introdusă este incorectă.",
            Self::InvalidEmail | Self::AccountEmail(_) => "Adresa de email nu este validă.",
            Self::TooManyRequests => {
                "Prea multe încercări. Te rugăm să încerci din nou mai târziu."
            }
            Self::Provider(_) | Self::Http(_) => {
                "A apărut o eroare la autentificare. Te rugăm să încerci din nou."
            }
        }
    }
}
