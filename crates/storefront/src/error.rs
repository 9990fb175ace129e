//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Responses are JSON: `{"error": "..."}`, plus `"fields"` with one message
//! per field for validation failures.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use lupul_core::cart::CartError;
use lupul_core::checkout::CheckoutError;
use lupul_core::event::RegistrationError;
use lupul_core::validation::FieldErrors;

use crate::db::{RegisterError, RepositoryError};
use crate::services::{IdentityError, PlaceOrderError};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Registration or enrollment rejected, or its store failed.
    #[error("Registration error: {0}")]
    Registration(#[from] RegisterError),

    /// Checkout rejected or the order could not be placed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] PlaceOrderError),

    /// Identity token rejected or the provider failed.
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Submitted fields failed validation.
    #[error("Validation error: {0}")]
    Validation(FieldErrors),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Cart could not be persisted.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CheckoutError> for AppError {
    fn from(error: CheckoutError) -> Self {
        Self::Checkout(PlaceOrderError::Checkout(error))
    }
}

impl From<RegistrationError> for AppError {
    fn from(error: RegistrationError) -> Self {
        Self::Registration(RegisterError::Rejected(error))
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a FieldErrors>,
}

const INTERNAL_MESSAGE: &str = "A apărut o eroare internă. Te rugăm să încerci din nou.";

fn repository_status(error: &RepositoryError) -> StatusCode {
    match error {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn registration_message(error: &RegistrationError) -> &'static str {
    match error {
        RegistrationError::CapacityExceeded { .. } => {
            "Ne pare rău, evenimentul a atins numărul maxim de participanți."
        }
        RegistrationError::SessionFull { .. } => "Ne pare rău, sesiunea este completă.",
        RegistrationError::AlreadyEnrolled => "Ești deja înscris la această sesiune.",
        RegistrationError::NotFound(_) => "Evenimentul nu a fost găsit.",
    }
}

fn checkout_message(error: &CheckoutError) -> &'static str {
    match error {
        CheckoutError::LoginRequired => {
            "Autentifică-te sau continuă ca vizitator pentru a finaliza comanda."
        }
        CheckoutError::Invalid(_) => "Te rugăm să corectezi câmpurile marcate.",
        CheckoutError::EmptyCart => "Coșul de cumpărături este gol.",
        CheckoutError::WrongPhase(_) => "Comanda este deja în curs de procesare.",
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(e) => repository_status(e),
            Self::Registration(RegisterError::Rejected(e)) => match e {
                RegistrationError::NotFound(_) => StatusCode::NOT_FOUND,
                RegistrationError::CapacityExceeded { .. }
                | RegistrationError::SessionFull { .. }
                | RegistrationError::AlreadyEnrolled => StatusCode::CONFLICT,
            },
            Self::Registration(RegisterError::Repository(e)) => repository_status(e),
            Self::Checkout(PlaceOrderError::Checkout(e)) => match e {
                CheckoutError::LoginRequired => StatusCode::UNAUTHORIZED,
                CheckoutError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
                CheckoutError::EmptyCart => StatusCode::BAD_REQUEST,
                CheckoutError::WrongPhase(_) => StatusCode::CONFLICT,
            },
            Self::Checkout(
                PlaceOrderError::Repository(_)
                | PlaceOrderError::Backup(_)
                | PlaceOrderError::Cart(_),
            )
            | Self::Session(_)
            | Self::Cart(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Identity(e) => match e {
                IdentityError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
                IdentityError::Provider(_) | IdentityError::Http(_) => StatusCode::BAD_GATEWAY,
                IdentityError::InvalidToken
                | IdentityError::UserNotFound
                | IdentityError::UserDisabled
                | IdentityError::InvalidCredentials
                | IdentityError::InvalidEmail
                | IdentityError::AccountEmail(_) => StatusCode::UNAUTHORIZED,
            },
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to show to the visitor.
    fn public_message(&self) -> String {
        match self {
            Self::Registration(RegisterError::Rejected(e)) => registration_message(e).to_string(),
            Self::Checkout(PlaceOrderError::Checkout(e)) => checkout_message(e).to_string(),
            Self::Identity(e) => e.user_message().to_string(),
            Self::Validation(_) => "Te rugăm să corectezi câmpurile marcate.".to_string(),
            Self::Database(RepositoryError::NotFound) => "Nu a fost găsit.".to_string(),
            Self::NotFound(what) => format!("Nu a fost găsit: {what}"),
            Self::Unauthorized(msg) | Self::BadRequest(msg) => msg.clone(),
            _ => INTERNAL_MESSAGE.to_string(),
        }
    }

    fn fields(&self) -> Option<&FieldErrors> {
        match self {
            Self::Validation(fields)
            | Self::Checkout(PlaceOrderError::Checkout(CheckoutError::Invalid(fields))) => {
                Some(fields)
            }
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        // Don't expose internal error details to clients
        let body = ErrorBody {
            error: self.public_message(),
            fields: self.fields(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Order placed", Some(&[("order_number", "LC-20260314-K7MQ2X")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("event cerc".to_string());
        assert_eq!(err.to_string(), "Not found: event cerc");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(RegistrationError::CapacityExceeded { capacity: 1 }.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(CheckoutError::LoginRequired.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(CheckoutError::EmptyCart.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Identity(IdentityError::TooManyRequests)),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::Conflict("x".to_string()))),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_backup_failure_surfaces_through_checkout() {
        let json = serde_json::from_str::<u32>("x").unwrap_err();
        let backup = lupul_core::recovery::RecoveryError::Json(json);
        let error = AppError::from(PlaceOrderError::Backup(backup));
        assert!(matches!(error, AppError::Checkout(PlaceOrderError::Backup(_))));
        assert_eq!(get_status(error), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = AppError::Internal("connection string leaked".to_string());
        assert_eq!(err.public_message(), INTERNAL_MESSAGE);
    }

    #[test]
    fn test_validation_exposes_fields() {
        let mut fields = FieldErrors::new();
        fields.insert("email", "Adresa de email nu este validă");
        let err: AppError = CheckoutError::Invalid(fields).into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.fields().unwrap().contains("email"));
    }
}
