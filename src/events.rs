use crate::error::PublishError;
use crate::gcp;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

/// Record of one executed (or attempted) action, published for downstream
/// consumers.
#[derive(Debug, Clone, Serialize)]
pub struct ActionEvent {
    pub timestamp: DateTime<Utc>,
    pub action_type: String,
    pub resource_id: String,
    /// `project`, `folder`, `organization`, or `notification` for emails.
    pub resource_type: String,
    pub success: bool,
    pub organization_id: String,
    pub details: serde_json::Value,
}

/// Publishes action events to a Pub/Sub topic. A publish failure is logged
/// and swallowed: event publishing must never fail the main flow.
pub struct EventPublisher {
    topic: Option<String>,
    dry_run: bool,
    http: reqwest::Client,
}

impl EventPublisher {
    pub fn new(topic: Option<String>, dry_run: bool, http: reqwest::Client) -> Self {
        if topic.is_none() {
            log::info!("Event publishing disabled (no topic configured)");
        }
        Self {
            topic,
            dry_run,
            http,
        }
    }

    pub fn disabled() -> Self {
        Self {
            topic: None,
            dry_run: false,
            http: reqwest::Client::new(),
        }
    }

    pub async fn publish(&self, event: &ActionEvent) {
        let Some(topic) = &self.topic else {
            return;
        };

        if self.dry_run {
            log::info!(
                "DRY-RUN: Would publish {} event for {}/{} to {topic}",
                event.action_type,
                event.resource_type,
                event.resource_id,
            );
            return;
        }

        match self.try_publish(topic, event).await {
            Ok(()) => log::info!(
                "Published action event to {topic}: {} on {}/{}",
                event.action_type,
                event.resource_type,
                event.resource_id,
            ),
            Err(e) => log::error!("Failed to publish action event: {e}"),
        }
    }

    async fn try_publish(&self, topic: &str, event: &ActionEvent) -> Result<(), PublishError> {
        let token = gcp::fetch_access_token(&self.http).await?;
        let data = BASE64.encode(serde_json::to_vec(event)?);
        let url = format!("https://pubsub.googleapis.com/v1/{topic}:publish");

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&json!({ "messages": [{ "data": data }] }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Status {
                code: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_event_serializes_expected_shape() {
        let event = ActionEvent {
            timestamp: Utc::now(),
            action_type: "restrict_services".to_string(),
            resource_id: "proj-1".to_string(),
            resource_type: "project".to_string(),
            success: true,
            organization_id: "123456".to_string(),
            details: json!({ "services": ["compute.googleapis.com"] }),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["action_type"], "restrict_services");
        assert_eq!(value["resource_id"], "proj-1");
        assert_eq!(value["success"], true);
        assert_eq!(value["details"]["services"][0], "compute.googleapis.com");
        assert!(value["timestamp"].is_string());
    }
}
