use crate::error::EnvelopeError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Pub/Sub push envelope as delivered by a budget alert subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertEnvelope {
    pub message: EnvelopeMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvelopeMessage {
    /// Base64-encoded JSON body of the budget alert.
    pub data: String,
    #[serde(default)]
    pub attributes: MessageAttributes,
}

/// Attributes attached to the Pub/Sub message by the billing service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageAttributes {
    pub billing_account_id: Option<String>,
    pub budget_id: Option<String>,
}

/// Budget alert message body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetAlert {
    #[serde(default)]
    pub cost_amount: f64,
    #[serde(default)]
    pub budget_amount: f64,
    #[serde(default)]
    pub budget_display_name: String,
}

/// Normalized view of one alert event. Built once per event, then read-only.
#[derive(Debug, Clone, Serialize)]
pub struct AlertContext {
    pub cost_amount: f64,
    pub budget_amount: f64,
    /// Cost as a percentage of budget, rounded to one decimal place.
    /// Zero when the budget amount is not positive.
    pub threshold_percent: f64,
    pub billing_account_id: String,
    pub budget_id: String,
}

impl AlertContext {
    pub fn new(alert: &BudgetAlert, attributes: &MessageAttributes) -> Self {
        let threshold_percent = if alert.budget_amount > 0.0 {
            (alert.cost_amount / alert.budget_amount * 100.0 * 10.0).round() / 10.0
        } else {
            0.0
        };

        Self {
            cost_amount: alert.cost_amount,
            budget_amount: alert.budget_amount,
            threshold_percent,
            billing_account_id: attributes
                .billing_account_id
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            budget_id: attributes
                .budget_id
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

/// Decode a Pub/Sub push envelope into the alert body and its attributes.
pub fn decode_envelope(raw: &str) -> Result<(BudgetAlert, MessageAttributes), EnvelopeError> {
    let envelope: AlertEnvelope =
        serde_json::from_str(raw).map_err(EnvelopeError::InvalidEnvelope)?;
    let bytes = BASE64.decode(envelope.message.data.trim())?;
    let alert: BudgetAlert = serde_json::from_slice(&bytes).map_err(EnvelopeError::InvalidBody)?;
    Ok((alert, envelope.message.attributes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attributes(billing: &str, budget: &str) -> MessageAttributes {
        MessageAttributes {
            billing_account_id: Some(billing.to_string()),
            budget_id: Some(budget.to_string()),
        }
    }

    #[test]
    fn threshold_percent_rounds_to_one_decimal() {
        let alert = BudgetAlert {
            cost_amount: 795.0,
            budget_amount: 1000.0,
            budget_display_name: String::new(),
        };
        let ctx = AlertContext::new(&alert, &attributes("a", "b"));
        assert_eq!(ctx.threshold_percent, 79.5);

        let alert = BudgetAlert {
            cost_amount: 1.0,
            budget_amount: 3.0,
            budget_display_name: String::new(),
        };
        let ctx = AlertContext::new(&alert, &attributes("a", "b"));
        assert_eq!(ctx.threshold_percent, 33.3);
    }

    #[test]
    fn threshold_percent_is_zero_for_non_positive_budget() {
        for budget_amount in [0.0, -50.0] {
            let alert = BudgetAlert {
                cost_amount: 100.0,
                budget_amount,
                budget_display_name: String::new(),
            };
            let ctx = AlertContext::new(&alert, &MessageAttributes::default());
            assert_eq!(ctx.threshold_percent, 0.0);
        }
    }

    #[test]
    fn missing_attributes_default_to_unknown() {
        let ctx = AlertContext::new(&BudgetAlert::default(), &MessageAttributes::default());
        assert_eq!(ctx.billing_account_id, "unknown");
        assert_eq!(ctx.budget_id, "unknown");
    }

    #[test]
    fn decode_envelope_extracts_body_and_attributes() {
        let body = r#"{"costAmount": 920.0, "budgetAmount": 1000.0, "budgetDisplayName": "Team Budget"}"#;
        let envelope = serde_json::json!({
            "message": {
                "data": BASE64.encode(body),
                "attributes": {
                    "billingAccountId": "012345-6789AB-CDEF01",
                    "budgetId": "budget-1"
                }
            }
        });

        let (alert, attrs) = decode_envelope(&envelope.to_string()).unwrap();
        assert_eq!(alert.cost_amount, 920.0);
        assert_eq!(alert.budget_display_name, "Team Budget");
        assert_eq!(attrs.billing_account_id.as_deref(), Some("012345-6789AB-CDEF01"));
        assert_eq!(attrs.budget_id.as_deref(), Some("budget-1"));
    }

    #[test]
    fn decode_envelope_rejects_bad_base64() {
        let raw = r#"{"message": {"data": "not base64!!"}}"#;
        assert!(matches!(
            decode_envelope(raw),
            Err(EnvelopeError::Base64(_))
        ));
    }
}
