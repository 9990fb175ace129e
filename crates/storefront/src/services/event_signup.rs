//! Public event sign-up form.
//!
//! A submission is stored first; the participant's confirmation and the
//! admin notification follow. Email failures are logged and never undo the
//! registration.

use askama::Template;

use lupul_core::Email;
use lupul_core::event::EventSignup;

use super::email::{EmailError, EmailMessage, Mailer};
use crate::db::{EventRegistrationStore, RepositoryError};
use crate::models::EventRegistration;

#[derive(Template)]
#[template(path = "email/event_signup.html")]
struct SignupConfirmationHtml<'a> {
    signup: &'a EventSignup,
}

#[derive(Template)]
#[template(path = "email/event_signup.txt")]
struct SignupConfirmationText<'a> {
    signup: &'a EventSignup,
}

#[derive(Template)]
#[template(path = "email/event_signup_admin.html")]
struct SignupNoticeHtml<'a> {
    signup: &'a EventSignup,
}

#[derive(Template)]
#[template(path = "email/event_signup_admin.txt")]
struct SignupNoticeText<'a> {
    signup: &'a EventSignup,
}

fn confirmation_email(signup: &EventSignup) -> Result<EmailMessage, EmailError> {
    Ok(EmailMessage {
        to: signup.email.clone(),
        subject: format!("Înscriere confirmată: {}", signup.event_title),
        text_body: SignupConfirmationText { signup }.render()?,
        html_body: SignupConfirmationHtml { signup }.render()?,
    })
}

fn admin_notice(signup: &EventSignup, admin: &Email) -> Result<EmailMessage, EmailError> {
    Ok(EmailMessage {
        to: admin.clone(),
        subject: format!("Înscriere nouă la {}: {}", signup.event_title, signup.name),
        text_body: SignupNoticeText { signup }.render()?,
        html_body: SignupNoticeHtml { signup }.render()?,
    })
}

async fn deliver(mailer: &dyn Mailer, message: Result<EmailMessage, EmailError>, kind: &str) {
    let result = match message {
        Ok(message) => mailer.send(&message).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        tracing::error!(error = %e, kind, "Failed to send event sign-up email");
    }
}

/// Store a sign-up and send both emails.
///
/// # Errors
///
/// Returns `RepositoryError` if the sign-up cannot be stored.
#[tracing::instrument(skip_all, fields(event_id = %signup.event_id))]
pub async fn submit_signup(
    signup: EventSignup,
    store: &dyn EventRegistrationStore,
    mailer: &dyn Mailer,
    admin: &Email,
) -> Result<EventRegistration, RepositoryError> {
    let registration = EventRegistration::new(signup);
    store.insert(&registration).await?;
    tracing::info!(registration_id = %registration.id, "Event sign-up stored");

    let signup = &registration.signup;
    deliver(mailer, confirmation_email(signup), "participant").await;
    deliver(mailer, admin_notice(signup, admin), "admin").await;

    Ok(registration)
}
