use crate::alert::AlertContext;
use crate::error::EmailError;
use crate::executor::ExecutedAction;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// SMTP notification sender for `send_mail` actions.
///
/// Construction fails when SMTP is not configured; the caller treats that
/// as "email disabled", not as a processing error.
pub struct EmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl EmailService {
    /// Build from `SMTP_HOST`, `SMTP_PORT`, `SMTP_USER`, `SMTP_PASSWORD`,
    /// `SMTP_USE_TLS` and `SMTP_FROM_EMAIL`.
    pub fn from_env() -> Result<Self, EmailError> {
        let host = non_empty_env("SMTP_HOST")
            .ok_or_else(|| EmailError::Config("SMTP_HOST is required for email delivery".into()))?;

        let use_tls = std::env::var("SMTP_USE_TLS")
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(true);

        let port = non_empty_env("SMTP_PORT")
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(if use_tls { 587 } else { 25 });

        let user = non_empty_env("SMTP_USER");
        let password = non_empty_env("SMTP_PASSWORD");

        let from = non_empty_env("SMTP_FROM_EMAIL")
            .or_else(|| user.clone())
            .ok_or_else(|| {
                EmailError::Config("SMTP_FROM_EMAIL is required for email delivery".into())
            })?;

        let mut builder = if use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&host)?.port(port)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&host).port(port)
        };

        if let (Some(user), Some(password)) = (user, password) {
            builder = builder.credentials(Credentials::new(user, password));
        }

        log::info!("Email service initialized: {host}:{port} (TLS: {use_tls})");
        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    /// Send the budget alert summary to every recipient.
    pub async fn send_budget_alert(
        &self,
        to_emails: &[String],
        ctx: &AlertContext,
        organization_id: &str,
        custom_message: Option<&str>,
        actions_taken: &[ExecutedAction],
    ) -> Result<(), EmailError> {
        let (subject, body) = render_budget_alert(ctx, organization_id, custom_message, actions_taken);

        for recipient in to_emails {
            let message = Message::builder()
                .from(self.from.parse()?)
                .to(recipient.parse()?)
                .subject(subject.clone())
                .header(ContentType::TEXT_PLAIN)
                .body(body.clone())?;

            self.transport.send(message).await?;
            log::debug!("Sent budget alert email to {recipient}");
        }

        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Render the subject and plain-text body for the budget alert summary.
pub fn render_budget_alert(
    ctx: &AlertContext,
    organization_id: &str,
    custom_message: Option<&str>,
    actions_taken: &[ExecutedAction],
) -> (String, String) {
    let subject = format!(
        "Budget alert: {:.1}% of budget reached for billing account {}",
        ctx.threshold_percent, ctx.billing_account_id,
    );

    let mut body = format!(
        "Billing account: {}\nBudget: {}\nCost: {:.2}\nBudget amount: {:.2}\nThreshold: {:.1}%\nOrganization: {}\n",
        ctx.billing_account_id,
        ctx.budget_id,
        ctx.cost_amount,
        ctx.budget_amount,
        ctx.threshold_percent,
        organization_id,
    );

    if let Some(message) = custom_message {
        body.push('\n');
        body.push_str(message);
        body.push('\n');
    }

    if actions_taken.is_empty() {
        body.push_str("\nNo policy actions were executed for this alert.\n");
    } else {
        body.push_str("\nActions taken:\n");
        for action in actions_taken {
            body.push_str(&format!(
                "  - {} on {} {}: {}\n",
                action.action_type, action.resource_type, action.resource_id, action.details,
            ));
        }
    }

    (subject, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::ResourceType;

    fn context() -> AlertContext {
        AlertContext {
            cost_amount: 920.0,
            budget_amount: 1000.0,
            threshold_percent: 92.0,
            billing_account_id: "012345-6789AB-CDEF01".to_string(),
            budget_id: "budget-1".to_string(),
        }
    }

    #[test]
    fn render_includes_budget_figures_and_actions() {
        let actions = vec![ExecutedAction {
            action_type: "restrict_services".to_string(),
            resource_id: "proj-1".to_string(),
            resource_type: ResourceType::Project,
            details: "Restricted services: compute.googleapis.com".to_string(),
        }];

        let (subject, body) = render_budget_alert(&context(), "123456", Some("Spend frozen."), &actions);

        assert!(subject.contains("92.0%"));
        assert!(subject.contains("012345-6789AB-CDEF01"));
        assert!(body.contains("Cost: 920.00"));
        assert!(body.contains("Organization: 123456"));
        assert!(body.contains("Spend frozen."));
        assert!(body.contains("restrict_services on project proj-1"));
    }

    #[test]
    fn render_notes_when_nothing_was_executed() {
        let (_, body) = render_budget_alert(&context(), "123456", None, &[]);
        assert!(body.contains("No policy actions were executed"));
    }
}
