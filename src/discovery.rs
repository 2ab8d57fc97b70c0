use crate::error::DiscoveryError;
use crate::gcp;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

/// A project candidate returned by the search backend. Carries the full
/// label map so the caller can re-validate the label predicate locally.
#[derive(Debug, Clone)]
pub struct DiscoveredProject {
    pub project_id: String,
    pub display_name: String,
    pub labels: BTreeMap<String, String>,
}

/// Label-based project discovery boundary.
///
/// Implementations must scope the search to active resources and, when an
/// organization id is supplied, to that organization. They MAY return a
/// superset of the requested predicate (the backing query language treats
/// multiple label conditions as OR); the caller performs the exact
/// intersection.
#[async_trait]
pub trait ProjectDiscovery: Send + Sync {
    async fn find_projects_by_labels(
        &self,
        labels: &BTreeMap<String, String>,
        organization_id: Option<&str>,
    ) -> Result<Vec<DiscoveredProject>, DiscoveryError>;
}

/// Build the search query: `state:ACTIVE`, optional organization parent,
/// then one `labels.key:value` term per requested label. The backend ORs
/// the label terms together.
pub fn build_search_query(
    labels: &BTreeMap<String, String>,
    organization_id: Option<&str>,
) -> String {
    let mut parts = vec!["state:ACTIVE".to_string()];
    if let Some(org) = organization_id {
        parts.push(format!("parent:organizations/{org}"));
    }
    for (key, value) in labels {
        parts.push(format!("labels.{key}:{value}"));
    }
    parts.join(" ")
}

const SEARCH_URL: &str = "https://cloudresourcemanager.googleapis.com/v3/projects:search";

/// Discovery client against the Cloud Resource Manager search API.
pub struct GcpProjectDiscovery {
    http: reqwest::Client,
}

impl GcpProjectDiscovery {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    projects: Vec<ApiProject>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiProject {
    #[serde(default)]
    project_id: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

#[async_trait]
impl ProjectDiscovery for GcpProjectDiscovery {
    async fn find_projects_by_labels(
        &self,
        labels: &BTreeMap<String, String>,
        organization_id: Option<&str>,
    ) -> Result<Vec<DiscoveredProject>, DiscoveryError> {
        let token = gcp::fetch_access_token(&self.http).await?;
        let query = build_search_query(labels, organization_id);
        log::info!("Searching projects with query: {query}");

        let mut candidates = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(SEARCH_URL)
                .bearer_auth(&token)
                .query(&[("query", query.as_str())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(DiscoveryError::Status {
                    code: status.as_u16(),
                    body,
                });
            }

            let page: SearchResponse = response.json().await?;
            for project in page.projects {
                let display_name = if project.display_name.is_empty() {
                    project.project_id.clone()
                } else {
                    project.display_name
                };
                candidates.push(DiscoveredProject {
                    project_id: project.project_id,
                    display_name,
                    labels: project.labels,
                });
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        log::debug!("Search returned {} candidate projects", candidates.len());
        Ok(candidates)
    }
}

/// In-memory discovery over a fixed project list. Replays the backend's OR
/// semantics: a project matching any one requested label is returned.
/// Used by tests and available for local experiments.
pub struct StaticDiscovery {
    projects: Vec<DiscoveredProject>,
}

impl StaticDiscovery {
    pub fn new(projects: Vec<DiscoveredProject>) -> Self {
        Self { projects }
    }
}

#[async_trait]
impl ProjectDiscovery for StaticDiscovery {
    async fn find_projects_by_labels(
        &self,
        labels: &BTreeMap<String, String>,
        _organization_id: Option<&str>,
    ) -> Result<Vec<DiscoveredProject>, DiscoveryError> {
        Ok(self
            .projects
            .iter()
            .filter(|p| {
                labels
                    .iter()
                    .any(|(k, v)| p.labels.get(k).is_some_and(|c| c == v))
            })
            .cloned()
            .collect())
    }
}

/// Dry-run discovery: fabricates one mock project per requested label pair,
/// each carrying the full requested label map.
pub struct DryRunDiscovery;

#[async_trait]
impl ProjectDiscovery for DryRunDiscovery {
    async fn find_projects_by_labels(
        &self,
        labels: &BTreeMap<String, String>,
        organization_id: Option<&str>,
    ) -> Result<Vec<DiscoveredProject>, DiscoveryError> {
        log::info!(
            "DRY-RUN: Would search for projects with labels {labels:?} in organization {organization_id:?}"
        );
        Ok(labels
            .iter()
            .map(|(key, value)| DiscoveredProject {
                project_id: format!("mock-project-{key}-{value}"),
                display_name: format!("Mock Project {key} {value}"),
                labels: labels.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn query_includes_state_org_and_labels() {
        let query = build_search_query(
            &labels(&[("env", "prod"), ("team", "backend")]),
            Some("123456789"),
        );
        assert_eq!(
            query,
            "state:ACTIVE parent:organizations/123456789 labels.env:prod labels.team:backend"
        );
    }

    #[test]
    fn query_without_org_scope() {
        let query = build_search_query(&labels(&[("env", "prod")]), None);
        assert_eq!(query, "state:ACTIVE labels.env:prod");
    }

    #[tokio::test]
    async fn static_discovery_uses_or_semantics() {
        let discovery = StaticDiscovery::new(vec![
            DiscoveredProject {
                project_id: "only-env".to_string(),
                display_name: "Only Env".to_string(),
                labels: labels(&[("env", "prod")]),
            },
            DiscoveredProject {
                project_id: "unrelated".to_string(),
                display_name: "Unrelated".to_string(),
                labels: labels(&[("env", "dev")]),
            },
        ]);

        let found = discovery
            .find_projects_by_labels(&labels(&[("env", "prod"), ("team", "backend")]), None)
            .await
            .unwrap();

        // The partial match comes back; the caller must filter it out.
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].project_id, "only-env");
    }
}
