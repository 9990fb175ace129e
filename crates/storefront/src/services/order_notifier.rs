//! Order confirmation emails.
//!
//! Sent from the confirmation page, at most once per order number. Orders
//! with customer-entered data and a usable address go to the customer;
//! anything else goes to the admin address, flagged as incomplete, so the
//! shop can follow up by hand.

use std::sync::Arc;

use askama::Template;

use lupul_core::order::{Order, RecoveredOrder};
use lupul_core::{Email, Price};

use super::email::{EmailError, EmailMessage, Mailer};
use crate::db::NotificationLedger;

/// Subject prefix of admin notices for orders without usable customer data.
pub const INCOMPLETE_DATA_MARKER: &str = "[ATENȚIE: date incomplete]";

/// One order line as shown in emails.
struct EmailLine {
    name: String,
    quantity: u32,
    line_total: String,
}

/// Order fields shared by both email variants.
struct OrderView {
    order_number: String,
    customer_name: String,
    customer_email: String,
    customer_phone: String,
    address: String,
    payment_method: &'static str,
    lines: Vec<EmailLine>,
    shipping: String,
    total: String,
    notes: Option<String>,
}

impl OrderView {
    fn new(order: &Order) -> Self {
        let mut address = format!(
            "{}, {}, {}",
            order.customer_address, order.customer_city, order.customer_county
        );
        if let Some(code) = &order.postal_code {
            address.push_str(", ");
            address.push_str(code);
        }

        Self {
            order_number: order.order_number.to_string(),
            customer_name: order.customer_name.clone(),
            customer_email: order.customer_email.clone(),
            customer_phone: order.customer_phone.clone(),
            address,
            payment_method: order.payment_method.label(),
            lines: order
                .items
                .iter()
                .map(|item| EmailLine {
                    name: item.name.clone(),
                    quantity: item.quantity,
                    line_total: Price::ron(item.line_total()).display(),
                })
                .collect(),
            shipping: Price::ron(order.shipping_cost).display(),
            total: Price::ron(order.total_amount).display(),
            notes: order.notes.clone(),
        }
    }
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    order: &'a OrderView,
    confirmation_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    order: &'a OrderView,
    confirmation_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_admin_notice.html")]
struct AdminNoticeHtml<'a> {
    order: &'a OrderView,
    data_source: &'a str,
    is_real_user_data: bool,
}

#[derive(Template)]
#[template(path = "email/order_admin_notice.txt")]
struct AdminNoticeText<'a> {
    order: &'a OrderView,
    data_source: &'a str,
    is_real_user_data: bool,
}

/// What happened to the confirmation email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Sent to `recipient`; `to_admin` when the customer could not be mailed.
    Sent { recipient: Email, to_admin: bool },
    /// Already sent on an earlier visit.
    AlreadySent,
    /// The ledger could not be read; nothing was sent.
    Skipped,
    /// Sending failed; the claim was released for a later retry.
    Failed,
}

/// Sends confirmation emails guarded by the notification ledger.
#[derive(Clone)]
pub struct OrderNotifier {
    ledger: Arc<dyn NotificationLedger>,
    mailer: Arc<dyn Mailer>,
    admin: Email,
    base_url: String,
}

impl OrderNotifier {
    /// Create a notifier.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn NotificationLedger>,
        mailer: Arc<dyn Mailer>,
        admin: Email,
        base_url: &str,
    ) -> Self {
        Self {
            ledger,
            mailer,
            admin,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    /// Send the confirmation for `recovered` unless it was already sent.
    ///
    /// Never fails: the outcome is logged and returned.
    #[tracing::instrument(skip(self, recovered), fields(order_number = %recovered.order.order_number))]
    pub async fn notify(&self, recovered: &RecoveredOrder) -> NotifyOutcome {
        let order_number = &recovered.order.order_number;
        let (message, to_admin) = match self.compose(recovered) {
            Ok(composed) => composed,
            Err(e) => {
                tracing::error!(error = %e, "Failed to render order email");
                return NotifyOutcome::Failed;
            }
        };

        match self
            .ledger
            .claim(order_number, message.to.as_str())
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("Order email already sent");
                return NotifyOutcome::AlreadySent;
            }
            Err(e) => {
                tracing::error!(error = %e, "Notification ledger unavailable, not sending");
                return NotifyOutcome::Skipped;
            }
        }

        match self.mailer.send(&message).await {
            Ok(()) => {
                tracing::info!(
                    recipient = %message.to,
                    to_admin,
                    data_source = %recovered.data_source,
                    "Order email sent"
                );
                NotifyOutcome::Sent {
                    recipient: message.to,
                    to_admin,
                }
            }
            Err(e) => {
                tracing::error!(error = %e, recipient = %message.to, "Failed to send order email");
                if let Err(e) = self.ledger.release(order_number).await {
                    tracing::error!(error = %e, "Failed to release notification claim");
                }
                NotifyOutcome::Failed
            }
        }
    }

    fn compose(&self, recovered: &RecoveredOrder) -> Result<(EmailMessage, bool), EmailError> {
        let view = OrderView::new(&recovered.order);

        if let Some(customer) = recovered.customer_recipient() {
            let confirmation_url = format!(
                "{}/order-confirmation?orderId={}",
                self.base_url,
                urlencoding::encode(&view.order_number)
            );
            let html = OrderConfirmationHtml {
                order: &view,
                confirmation_url: &confirmation_url,
            }
            .render()?;
            let text = OrderConfirmationText {
                order: &view,
                confirmation_url: &confirmation_url,
            }
            .render()?;

            let message = EmailMessage {
                to: customer,
                subject: format!("Confirmare comandă #{} - Lupul și Corbul", view.order_number),
                text_body: text,
                html_body: html,
            };
            return Ok((message, false));
        }

        let data_source = recovered.data_source.as_str();
        let html = AdminNoticeHtml {
            order: &view,
            data_source,
            is_real_user_data: recovered.is_real_user_data,
        }
        .render()?;
        let text = AdminNoticeText {
            order: &view,
            data_source,
            is_real_user_data: recovered.is_real_user_data,
        }
        .render()?;

        let message = EmailMessage {
            to: self.admin.clone(),
            subject: format!("{INCOMPLETE_DATA_MARKER} Comandă #{}", view.order_number),
            text_body: text,
            html_body: html,
        };
        Ok((message, true))
    }
}
