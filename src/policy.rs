use crate::error::PolicyError;
use crate::gcp;
use crate::target::ResolvedTarget;
use async_trait::async_trait;
use serde_json::json;

/// Constraint used for service restriction policies.
pub const RESTRICT_SERVICE_USAGE: &str = "gcp.restrictServiceUsage";

/// Org-policy mutation boundary. Implementations apply the decision the
/// engine already made; no decision logic lives here.
#[async_trait]
pub trait PolicyClient: Send + Sync {
    /// Deny the listed services on the target via `gcp.restrictServiceUsage`.
    async fn apply_service_restriction(
        &self,
        target: &ResolvedTarget,
        services: &[String],
    ) -> Result<(), PolicyError>;

    /// Apply a named constraint: boolean enforcement, or denied values for
    /// list constraints.
    async fn apply_custom_constraint(
        &self,
        target: &ResolvedTarget,
        constraint: &str,
        enforce: bool,
        values: Option<&[String]>,
    ) -> Result<(), PolicyError>;
}

const ORG_POLICY_API: &str = "https://orgpolicy.googleapis.com/v2";

pub struct GcpOrgPolicyClient {
    http: reqwest::Client,
}

impl GcpOrgPolicyClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Create-or-update: try to fetch the policy, update when it exists,
    /// create under the parent on 404.
    async fn upsert_policy(
        &self,
        parent: &str,
        constraint: &str,
        spec: serde_json::Value,
    ) -> Result<(), PolicyError> {
        let token = gcp::fetch_access_token(&self.http).await?;
        let name = format!("{parent}/policies/{constraint}");
        let policy = json!({ "name": name, "spec": spec });
        let policy_url = format!("{ORG_POLICY_API}/{name}");

        let response = self
            .http
            .get(&policy_url)
            .bearer_auth(&token)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            let create_url = format!("{ORG_POLICY_API}/{parent}/policies");
            let response = self
                .http
                .post(&create_url)
                .bearer_auth(&token)
                .json(&policy)
                .send()
                .await?;
            check_status(response).await?;
            log::debug!("Created new policy: {name}");
        } else {
            check_status(response).await?;
            let response = self
                .http
                .patch(&policy_url)
                .bearer_auth(&token)
                .json(&policy)
                .send()
                .await?;
            check_status(response).await?;
            log::debug!("Updated existing policy: {name}");
        }

        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, PolicyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PolicyError::Status {
        code: status.as_u16(),
        body,
    })
}

#[async_trait]
impl PolicyClient for GcpOrgPolicyClient {
    async fn apply_service_restriction(
        &self,
        target: &ResolvedTarget,
        services: &[String],
    ) -> Result<(), PolicyError> {
        let parent = target.resource_type.resource_name(&target.resource_id);
        let spec = json!({
            "rules": [{ "values": { "deniedValues": services } }],
            "inheritFromParent": true,
        });
        self.upsert_policy(&parent, RESTRICT_SERVICE_USAGE, spec)
            .await
    }

    async fn apply_custom_constraint(
        &self,
        target: &ResolvedTarget,
        constraint: &str,
        enforce: bool,
        values: Option<&[String]>,
    ) -> Result<(), PolicyError> {
        let parent = target.resource_type.resource_name(&target.resource_id);
        let spec = match values {
            // List constraint: deny the given values
            Some(values) if !values.is_empty() => json!({
                "rules": [{ "values": { "deniedValues": values } }],
            }),
            // Boolean constraint
            _ => json!({
                "rules": [{ "enforce": enforce }],
            }),
        };
        self.upsert_policy(&parent, constraint, spec).await
    }
}

/// Logs every mutation instead of performing it.
pub struct DryRunPolicyClient;

#[async_trait]
impl PolicyClient for DryRunPolicyClient {
    async fn apply_service_restriction(
        &self,
        target: &ResolvedTarget,
        services: &[String],
    ) -> Result<(), PolicyError> {
        log::info!(
            "DRY-RUN: Would apply service restriction to {} {}: deny {:?} (constraint: {RESTRICT_SERVICE_USAGE})",
            target.resource_type,
            target.resource_id,
            services,
        );
        Ok(())
    }

    async fn apply_custom_constraint(
        &self,
        target: &ResolvedTarget,
        constraint: &str,
        enforce: bool,
        values: Option<&[String]>,
    ) -> Result<(), PolicyError> {
        log::info!(
            "DRY-RUN: Would apply constraint {constraint} to {} {}: enforce={enforce}, values={values:?}",
            target.resource_type,
            target.resource_id,
        );
        Ok(())
    }
}
