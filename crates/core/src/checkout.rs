//! Checkout form controller.
//!
//! ```text
//! Anonymous, guest not allowed ──► Blocked ──(continue as guest)──┐
//! Anonymous, guest allowed ──────► GuestFormOpen ◄────────────────┘
//!                                       │ edit
//! Authenticated ─────────────────► FormFilled ──submit──► Submitting ──► Succeeded
//!                                       ▲                     │
//!                                       └──── edit ◄──── Failed ◄┘
//! ```
//!
//! All fields are validated together on submit. Editing a field clears that
//! field's error only; nothing is re-validated until the next submit.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cart::{Cart, CartTotals};
use crate::order::OrderItem;
use crate::validation::FieldErrors;
use crate::{Email, PaymentMethod};

/// Who is checking out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// Not logged in.
    Anonymous,
    /// Logged in through the identity provider.
    Authenticated {
        /// Account email, used to prefill the form.
        email: Email,
        /// Account display name, used to prefill the form.
        display_name: Option<String>,
    },
}

/// Where the checkout currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutPhase {
    /// Anonymous visitor who must log in or opt into guest checkout.
    Blocked,
    /// Guest form shown, nothing entered yet.
    GuestFormOpen,
    /// Form has data and can be submitted.
    FormFilled,
    /// Order submission in flight.
    Submitting,
    /// Order placed.
    Succeeded,
    /// Submission failed; the form can be edited and resubmitted.
    Failed,
}

/// A form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Email,
    Phone,
    Address,
    City,
    County,
    PostalCode,
    Notes,
}

impl Field {
    /// Name used in submitted forms and error maps.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Address => "address",
            Self::City => "city",
            Self::County => "county",
            Self::PostalCode => "postalCode",
            Self::Notes => "notes",
        }
    }
}

/// Field name of the payment method selector.
pub const PAYMENT_METHOD_FIELD: &str = "paymentMethod";

/// Raw checkout form as submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckoutForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub county: String,
    pub postal_code: String,
    pub notes: String,
    pub payment_method: Option<PaymentMethod>,
}

impl CheckoutForm {
    fn field_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Name => &mut self.name,
            Field::Email => &mut self.email,
            Field::Phone => &mut self.phone,
            Field::Address => &mut self.address,
            Field::City => &mut self.city,
            Field::County => &mut self.county,
            Field::PostalCode => &mut self.postal_code,
            Field::Notes => &mut self.notes,
        }
    }

    /// Validate every field at once.
    ///
    /// # Errors
    ///
    /// Returns one message per invalid field.
    pub fn validate(&self) -> Result<ValidatedForm, FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require("name", &self.name, "Numele complet este obligatoriu");
        errors.require("phone", &self.phone, "Numărul de telefon este obligatoriu");
        errors.require("address", &self.address, "Adresa este obligatorie");
        errors.require("city", &self.city, "Orașul este obligatoriu");
        errors.require("county", &self.county, "Județul este obligatoriu");

        let email = if self.email.trim().is_empty() {
            errors.insert("email", "Adresa de email este obligatorie");
            None
        } else if let Ok(email) = Email::parse(&self.email) {
            Some(email)
        } else {
            errors.insert("email", "Adresa de email nu este validă");
            None
        };

        let payment_method = match self.payment_method {
            Some(method @ (PaymentMethod::Card | PaymentMethod::CashOnDelivery)) => Some(method),
            _ => {
                errors.insert(PAYMENT_METHOD_FIELD, "Selectați metoda de plată");
                None
            }
        };

        match (email, payment_method) {
            (Some(email), Some(payment_method)) if errors.is_empty() => Ok(ValidatedForm {
                name: self.name.trim().to_owned(),
                email,
                phone: self.phone.trim().to_owned(),
                address: self.address.trim().to_owned(),
                city: self.city.trim().to_owned(),
                county: self.county.trim().to_owned(),
                postal_code: non_blank(&self.postal_code),
                notes: non_blank(&self.notes),
                payment_method,
            }),
            _ => Err(errors),
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// A form that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedForm {
    pub name: String,
    pub email: Email,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub county: String,
    pub postal_code: Option<String>,
    pub notes: Option<String>,
    pub payment_method: PaymentMethod,
}

/// Everything needed to create the order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSubmission {
    /// Validated customer data.
    pub form: ValidatedForm,
    /// Cart lines at submission time.
    pub items: Vec<OrderItem>,
    /// Cart totals at submission time.
    pub totals: CartTotals,
}

/// Checkout failures.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Anonymous visitor without guest checkout.
    #[error("login or guest checkout required")]
    LoginRequired,

    /// One or more fields failed validation.
    #[error("{0}")]
    Invalid(FieldErrors),

    /// Nothing to order.
    #[error("cart is empty")]
    EmptyCart,

    /// The controller cannot take this action in its current phase.
    #[error("checkout cannot do that while {0:?}")]
    WrongPhase(CheckoutPhase),
}

/// Checkout state for one visitor.
#[derive(Debug, Clone)]
pub struct CheckoutController {
    phase: CheckoutPhase,
    form: CheckoutForm,
    errors: FieldErrors,
}

impl CheckoutController {
    /// Start a checkout. Authenticated visitors get their account data
    /// prefilled.
    #[must_use]
    pub fn new(auth: &AuthState, guest_allowed: bool) -> Self {
        let (phase, form) = match auth {
            AuthState::Authenticated {
                email,
                display_name,
            } => (
                CheckoutPhase::FormFilled,
                CheckoutForm {
                    name: display_name.clone().unwrap_or_default(),
                    email: email.as_str().to_owned(),
                    ..CheckoutForm::default()
                },
            ),
            AuthState::Anonymous if guest_allowed => {
                (CheckoutPhase::GuestFormOpen, CheckoutForm::default())
            }
            AuthState::Anonymous => (CheckoutPhase::Blocked, CheckoutForm::default()),
        };

        Self {
            phase,
            form,
            errors: FieldErrors::new(),
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> CheckoutPhase {
        self.phase
    }

    /// Current form contents.
    #[must_use]
    pub const fn form(&self) -> &CheckoutForm {
        &self.form
    }

    /// Errors from the last submit, minus fields edited since.
    #[must_use]
    pub const fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    /// Opt an anonymous visitor into guest checkout.
    pub fn continue_as_guest(&mut self) {
        if self.phase == CheckoutPhase::Blocked {
            self.phase = CheckoutPhase::GuestFormOpen;
        }
    }

    /// Change one field and clear its error.
    ///
    /// # Errors
    ///
    /// Returns `LoginRequired` while blocked and `WrongPhase` while
    /// submitting or after success.
    pub fn edit(&mut self, field: Field, value: impl Into<String>) -> Result<(), CheckoutError> {
        self.ensure_editable()?;
        *self.form.field_mut(field) = value.into();
        self.errors.clear(field.as_str());
        self.phase = CheckoutPhase::FormFilled;
        Ok(())
    }

    /// Choose the payment method and clear its error.
    ///
    /// # Errors
    ///
    /// Same as [`edit`](Self::edit).
    pub fn select_payment_method(&mut self, method: PaymentMethod) -> Result<(), CheckoutError> {
        self.ensure_editable()?;
        self.form.payment_method = Some(method);
        self.errors.clear(PAYMENT_METHOD_FIELD);
        self.phase = CheckoutPhase::FormFilled;
        Ok(())
    }

    /// Apply a whole submitted form field by field.
    ///
    /// # Errors
    ///
    /// Same as [`edit`](Self::edit).
    pub fn fill(&mut self, form: CheckoutForm) -> Result<(), CheckoutError> {
        let CheckoutForm {
            name,
            email,
            phone,
            address,
            city,
            county,
            postal_code,
            notes,
            payment_method,
        } = form;

        self.edit(Field::Name, name)?;
        self.edit(Field::Email, email)?;
        self.edit(Field::Phone, phone)?;
        self.edit(Field::Address, address)?;
        self.edit(Field::City, city)?;
        self.edit(Field::County, county)?;
        self.edit(Field::PostalCode, postal_code)?;
        self.edit(Field::Notes, notes)?;
        if let Some(method) = payment_method {
            self.select_payment_method(method)?;
        }
        Ok(())
    }

    /// Validate everything and move to `Submitting`.
    ///
    /// # Errors
    ///
    /// - `LoginRequired` while blocked
    /// - `WrongPhase` while already submitting or after success
    /// - `Invalid` with every failing field (also kept in [`errors`](Self::errors))
    /// - `EmptyCart` if there is nothing to order
    pub fn submit(&mut self, cart: &Cart) -> Result<CheckoutSubmission, CheckoutError> {
        self.ensure_editable()?;

        let form = match self.form.validate() {
            Ok(form) => form,
            Err(errors) => {
                self.errors = errors.clone();
                return Err(CheckoutError::Invalid(errors));
            }
        };
        self.errors = FieldErrors::new();

        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        self.phase = CheckoutPhase::Submitting;
        Ok(CheckoutSubmission {
            form,
            items: cart.items().iter().map(OrderItem::from).collect(),
            totals: *cart.totals(),
        })
    }

    /// Record the outcome of the order submission.
    pub fn complete(&mut self, succeeded: bool) {
        if self.phase == CheckoutPhase::Submitting {
            self.phase = if succeeded {
                CheckoutPhase::Succeeded
            } else {
                CheckoutPhase::Failed
            };
        }
    }

    fn ensure_editable(&self) -> Result<(), CheckoutError> {
        match self.phase {
            CheckoutPhase::Blocked => Err(CheckoutError::LoginRequired),
            CheckoutPhase::Submitting | CheckoutPhase::Succeeded => {
                Err(CheckoutError::WrongPhase(self.phase))
            }
            CheckoutPhase::GuestFormOpen | CheckoutPhase::FormFilled | CheckoutPhase::Failed => {
                Ok(())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::ProductId;
    use crate::cart::{CartItem, ShippingPolicy};

    fn filled_form() -> CheckoutForm {
        CheckoutForm {
            name: "Ana Popescu".to_owned(),
            email: "ana@site.ro".to_owned(),
            phone: "0722000000".to_owned(),
            address: "Str. Lupului 1".to_owned(),
            city: "Cluj-Napoca".to_owned(),
            county: "Cluj".to_owned(),
            postal_code: String::new(),
            notes: "  ".to_owned(),
            payment_method: Some(PaymentMethod::CashOnDelivery),
        }
    }

    fn cart() -> Cart {
        let mut cart = Cart::new(ShippingPolicy::default());
        cart.add_item(CartItem {
            id: ProductId::new("a"),
            name: "Runa".to_owned(),
            price: Some(Decimal::new(10, 0)),
            image: None,
            quantity: 2,
        });
        cart
    }

    #[test]
    fn test_anonymous_without_guest_is_blocked() {
        let mut controller = CheckoutController::new(&AuthState::Anonymous, false);
        assert_eq!(controller.phase(), CheckoutPhase::Blocked);
        assert!(matches!(
            controller.edit(Field::Name, "Ana"),
            Err(CheckoutError::LoginRequired)
        ));
        assert!(matches!(
            controller.submit(&cart()),
            Err(CheckoutError::LoginRequired)
        ));
    }

    #[test]
    fn test_guest_flow_reaches_form_filled() {
        let mut controller = CheckoutController::new(&AuthState::Anonymous, false);
        controller.continue_as_guest();
        assert_eq!(controller.phase(), CheckoutPhase::GuestFormOpen);
        controller.edit(Field::Name, "Ana").unwrap();
        assert_eq!(controller.phase(), CheckoutPhase::FormFilled);
    }

    #[test]
    fn test_authenticated_prefills_account_data() {
        let auth = AuthState::Authenticated {
            email: Email::parse("ana@site.ro").unwrap(),
            display_name: Some("Ana Popescu".to_owned()),
        };
        let controller = CheckoutController::new(&auth, false);
        assert_eq!(controller.phase(), CheckoutPhase::FormFilled);
        assert_eq!(controller.form().email, "ana@site.ro");
        assert_eq!(controller.form().name, "Ana Popescu");
    }

    #[test]
    fn test_submit_reports_every_invalid_field() {
        let mut controller = CheckoutController::new(&AuthState::Anonymous, true);
        let err = controller.submit(&cart()).unwrap_err();
        let CheckoutError::Invalid(errors) = err else {
            panic!("expected validation errors");
        };
        for field in ["name", "email", "phone", "address", "city", "county", "paymentMethod"] {
            assert!(errors.contains(field), "missing error for {field}");
        }
        assert!(!errors.contains("postalCode"));
        assert_eq!(controller.errors().len(), 7);
    }

    #[test]
    fn test_invalid_email_message() {
        let mut form = filled_form();
        form.email = "ana@localhost".to_owned();
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("email"), Some("Adresa de email nu este validă"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_edit_clears_only_that_field() {
        let mut controller = CheckoutController::new(&AuthState::Anonymous, true);
        let _ = controller.submit(&cart());
        controller.edit(Field::Email, "not an email").unwrap();

        assert!(!controller.errors().contains("email"));
        assert!(controller.errors().contains("name"));
        assert!(controller.errors().contains("phone"));
    }

    #[test]
    fn test_successful_submission() {
        let mut controller = CheckoutController::new(&AuthState::Anonymous, true);
        controller.fill(filled_form()).unwrap();
        let submission = controller.submit(&cart()).unwrap();

        assert_eq!(controller.phase(), CheckoutPhase::Submitting);
        assert_eq!(submission.items.len(), 1);
        assert_eq!(submission.totals.final_total, Some(Decimal::new(35, 0)));
        assert_eq!(submission.form.notes, None);
        assert_eq!(submission.form.payment_method, PaymentMethod::CashOnDelivery);

        assert!(matches!(
            controller.submit(&cart()),
            Err(CheckoutError::WrongPhase(CheckoutPhase::Submitting))
        ));

        controller.complete(true);
        assert_eq!(controller.phase(), CheckoutPhase::Succeeded);
    }

    #[test]
    fn test_failed_submission_can_be_retried() {
        let mut controller = CheckoutController::new(&AuthState::Anonymous, true);
        controller.fill(filled_form()).unwrap();
        controller.submit(&cart()).unwrap();
        controller.complete(false);
        assert_eq!(controller.phase(), CheckoutPhase::Failed);

        assert!(controller.submit(&cart()).is_ok());
    }

    #[test]
    fn test_empty_cart_is_rejected() {
        let mut controller = CheckoutController::new(&AuthState::Anonymous, true);
        controller.fill(filled_form()).unwrap();
        let empty = Cart::new(ShippingPolicy::default());
        assert!(matches!(
            controller.submit(&empty),
            Err(CheckoutError::EmptyCart)
        ));
        assert_eq!(controller.phase(), CheckoutPhase::FormFilled);
    }

    #[test]
    fn test_unknown_payment_method_is_invalid() {
        let mut form = filled_form();
        form.payment_method = Some(PaymentMethod::Unknown);
        let errors = form.validate().unwrap_err();
        assert!(errors.contains(PAYMENT_METHOD_FIELD));
    }
}
