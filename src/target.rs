use crate::discovery::ProjectDiscovery;
use crate::rules::ActionSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Project,
    Folder,
    Organization,
}

impl ResourceType {
    /// Resource name used by the org policy API, e.g. `projects/{id}`.
    pub fn resource_name(&self, resource_id: &str) -> String {
        match self {
            ResourceType::Project => format!("projects/{resource_id}"),
            ResourceType::Folder => format!("folders/{resource_id}"),
            ResourceType::Organization => format!("organizations/{resource_id}"),
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceType::Project => write!(f, "project"),
            ResourceType::Folder => write!(f, "folder"),
            ResourceType::Organization => write!(f, "organization"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedTarget {
    pub resource_id: String,
    pub resource_type: ResourceType,
    /// Only populated for label-discovered projects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl ResolvedTarget {
    fn explicit(resource_id: &str, resource_type: ResourceType) -> Self {
        Self {
            resource_id: resource_id.to_string(),
            resource_type,
            display_name: None,
        }
    }
}

/// Resolve an action's targeting specification into concrete resources.
///
/// All four targeting methods contribute independently; their results are
/// concatenated in a fixed order (projects, folders, organization,
/// label-discovered projects) and never deduplicated. Explicit ids pass
/// through without existence checks.
///
/// The label path issues one combined discovery query and then applies the
/// exact intersection locally: the backend ORs multiple label conditions,
/// while rule semantics require every requested key/value pair to match.
/// A discovery failure yields no label targets for this action only and is
/// logged; explicit targets and sibling actions are unaffected.
pub async fn resolve_targets(
    action: &ActionSpec,
    organization_id: Option<&str>,
    discovery: &dyn ProjectDiscovery,
) -> Vec<ResolvedTarget> {
    let mut targets = Vec::new();

    for project_id in &action.target_projects {
        targets.push(ResolvedTarget::explicit(project_id, ResourceType::Project));
    }

    for folder_id in &action.target_folders {
        targets.push(ResolvedTarget::explicit(folder_id, ResourceType::Folder));
    }

    if let Some(org_id) = &action.target_organization {
        targets.push(ResolvedTarget::explicit(org_id, ResourceType::Organization));
    }

    if !action.target_labels.is_empty() {
        match discovery
            .find_projects_by_labels(&action.target_labels, organization_id)
            .await
        {
            Ok(candidates) => {
                for candidate in candidates {
                    if labels_satisfy(&candidate.labels, &action.target_labels) {
                        targets.push(ResolvedTarget {
                            resource_id: candidate.project_id,
                            resource_type: ResourceType::Project,
                            display_name: Some(candidate.display_name),
                        });
                    } else {
                        log::debug!(
                            "Skipping project {}: labels {:?} don't match all filters {:?}",
                            candidate.project_id,
                            candidate.labels,
                            action.target_labels,
                        );
                    }
                }
            }
            Err(e) => {
                log::error!(
                    "Label discovery failed for action {}: {e}",
                    action.type_name()
                );
            }
        }
    }

    targets
}

/// Exact intersection check: every requested key must be present with a
/// string-equal value.
pub fn labels_satisfy(
    candidate: &BTreeMap<String, String>,
    requested: &BTreeMap<String, String>,
) -> bool {
    requested
        .iter()
        .all(|(key, value)| candidate.get(key).is_some_and(|c| c == value))
}
