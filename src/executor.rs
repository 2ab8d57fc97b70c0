use crate::alert::AlertContext;
use crate::discovery::ProjectDiscovery;
use crate::email::EmailService;
use crate::events::{ActionEvent, EventPublisher};
use crate::policy::{PolicyClient, RESTRICT_SERVICE_USAGE};
use crate::rules::{ActionKind, ActionSpec};
use crate::target::{resolve_targets, ResolvedTarget, ResourceType};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;

/// Record of one attempted action against one resource, kept for the
/// email summary and the final report.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutedAction {
    pub action_type: String,
    pub resource_id: String,
    pub resource_type: ResourceType,
    pub details: String,
}

#[derive(Debug, Default)]
pub struct ExecutionReport {
    pub executed: Vec<ExecutedAction>,
    pub failures: usize,
}

/// Execution layer: walks the action list the engine produced, resolves
/// targets per action, and drives the external collaborators. All fault
/// tolerance for side-effecting work lives here; one failing target or
/// action never aborts its siblings.
pub struct Executor {
    organization_id: String,
    policy: Box<dyn PolicyClient>,
    discovery: Box<dyn ProjectDiscovery>,
    events: EventPublisher,
    email: Option<EmailService>,
}

impl Executor {
    pub fn new(
        organization_id: String,
        policy: Box<dyn PolicyClient>,
        discovery: Box<dyn ProjectDiscovery>,
        events: EventPublisher,
        email: Option<EmailService>,
    ) -> Self {
        Self {
            organization_id,
            policy,
            discovery,
            events,
            email,
        }
    }

    pub async fn execute(&self, actions: &[ActionSpec], ctx: &AlertContext) -> ExecutionReport {
        let mut report = ExecutionReport::default();
        log::info!("Executing {} actions", actions.len());

        for action in actions {
            if let ActionKind::SendMail {
                to_emails,
                template,
                custom_message,
            } = &action.kind
            {
                self.send_mail(
                    to_emails,
                    template,
                    custom_message.as_deref(),
                    ctx,
                    &mut report,
                )
                .await;
                continue;
            }

            let targets =
                resolve_targets(action, Some(&self.organization_id), self.discovery.as_ref()).await;

            if targets.is_empty() {
                log::warn!(
                    "Action {} has no resolved targets - skipping",
                    action.type_name()
                );
                continue;
            }

            for target in &targets {
                self.apply(action, target, &mut report).await;
            }
        }

        log::info!("Budget response processing completed");
        report
    }

    async fn apply(&self, action: &ActionSpec, target: &ResolvedTarget, report: &mut ExecutionReport) {
        match &action.kind {
            ActionKind::RestrictServices { services } => {
                let result = self.policy.apply_service_restriction(target, services).await;
                let error = match &result {
                    Ok(()) => {
                        log::info!(
                            "Applied service restriction to {} {}: deny {:?}",
                            target.resource_type,
                            target.resource_id,
                            services,
                        );
                        None
                    }
                    Err(e) => {
                        log::error!(
                            "Failed to apply service restriction to {} {}: {e}",
                            target.resource_type,
                            target.resource_id,
                        );
                        report.failures += 1;
                        Some(e.to_string())
                    }
                };

                self.publish_event(
                    "restrict_services",
                    target,
                    result.is_ok(),
                    json!({
                        "constraint": RESTRICT_SERVICE_USAGE,
                        "action": "deny",
                        "services": services,
                        "error": error,
                    }),
                )
                .await;

                report.executed.push(ExecutedAction {
                    action_type: "restrict_services".to_string(),
                    resource_id: target.resource_id.clone(),
                    resource_type: target.resource_type,
                    details: format!("Restricted services: {}", services.join(", ")),
                });
            }

            ActionKind::ApplyConstraint {
                constraint,
                enforce,
                values,
            } => {
                let result = self
                    .policy
                    .apply_custom_constraint(target, constraint, *enforce, values.as_deref())
                    .await;
                let error = match &result {
                    Ok(()) => {
                        log::info!(
                            "Applied constraint {constraint} to {} {}: enforce={enforce}, values={values:?}",
                            target.resource_type,
                            target.resource_id,
                        );
                        None
                    }
                    Err(e) => {
                        log::error!(
                            "Failed to apply constraint {constraint} to {} {}: {e}",
                            target.resource_type,
                            target.resource_id,
                        );
                        report.failures += 1;
                        Some(e.to_string())
                    }
                };

                self.publish_event(
                    "apply_constraint",
                    target,
                    result.is_ok(),
                    json!({
                        "constraint": constraint,
                        "enforce": enforce,
                        "values": values,
                        "error": error,
                    }),
                )
                .await;

                report.executed.push(ExecutedAction {
                    action_type: "apply_constraint".to_string(),
                    resource_id: target.resource_id.clone(),
                    resource_type: target.resource_type,
                    details: format!("Applied constraint: {constraint}"),
                });
            }

            ActionKind::LogOnly { message } => {
                let message = message.as_deref().unwrap_or("Budget threshold exceeded");
                log::warn!(
                    "Log-only action for {} {}: {message}",
                    target.resource_type,
                    target.resource_id,
                );
                report.executed.push(ExecutedAction {
                    action_type: "log_only".to_string(),
                    resource_id: target.resource_id.clone(),
                    resource_type: target.resource_type,
                    details: message.to_string(),
                });
            }

            // Handled before target resolution.
            ActionKind::SendMail { .. } => {}
        }
    }

    async fn send_mail(
        &self,
        to_emails: &[String],
        template: &str,
        custom_message: Option<&str>,
        ctx: &AlertContext,
        report: &mut ExecutionReport,
    ) {
        if to_emails.is_empty() {
            log::warn!("send_mail action missing to_emails - skipping");
            return;
        }

        let mut success = false;
        let mut error: Option<String> = None;

        match &self.email {
            None => {
                error = Some("SMTP not configured - email delivery unavailable".to_string());
                log::warn!("{}", error.as_deref().unwrap_or_default());
            }
            Some(_) if template != "budget_alert" => {
                error = Some(format!("Unknown email template: {template}"));
                log::error!("{}", error.as_deref().unwrap_or_default());
            }
            Some(service) => {
                let result = service
                    .send_budget_alert(
                        to_emails,
                        ctx,
                        &self.organization_id,
                        custom_message,
                        &report.executed,
                    )
                    .await;
                match result {
                    Ok(()) => {
                        success = true;
                        log::info!(
                            "Email sent successfully using template '{template}' to {}",
                            to_emails.join(", ")
                        );
                    }
                    Err(e) => {
                        error = Some(e.to_string());
                        log::error!("Failed to send email: {e}");
                        report.failures += 1;
                    }
                }
            }
        }

        self.events
            .publish(&ActionEvent {
                timestamp: Utc::now(),
                action_type: "send_email".to_string(),
                resource_id: "email".to_string(),
                resource_type: "notification".to_string(),
                success,
                organization_id: self.organization_id.clone(),
                details: json!({
                    "template": template,
                    "recipients": to_emails,
                    "error": error,
                }),
            })
            .await;
    }

    async fn publish_event(
        &self,
        action_type: &str,
        target: &ResolvedTarget,
        success: bool,
        details: serde_json::Value,
    ) {
        self.events
            .publish(&ActionEvent {
                timestamp: Utc::now(),
                action_type: action_type.to_string(),
                resource_id: target.resource_id.clone(),
                resource_type: target.resource_type.to_string(),
                success,
                organization_id: self.organization_id.clone(),
                details,
            })
            .await;
    }
}
