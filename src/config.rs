use crate::error::ConfigError;
use crate::rules::RuleFile;
use std::path::Path;

/// Runtime settings sourced from the environment.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub organization_id: Option<String>,
    pub event_topic: Option<String>,
    pub dry_run: bool,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            organization_id: non_empty_env("ORGANIZATION_ID"),
            event_topic: non_empty_env("ACTION_EVENT_TOPIC"),
            dry_run: std::env::var("DRY_RUN")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Load the rule set for the responder path.
///
/// Precedence: inline `RULES_CONFIG` content first, then the file at
/// `RULES_CONFIG_PATH` (default `rules.yaml`). Errors degrade to an empty
/// rule set with a logged error; a bad config must never abort alert
/// processing.
pub fn load_rules_config() -> RuleFile {
    if let Some(raw) = non_empty_env("RULES_CONFIG") {
        match parse_rules(&raw) {
            Ok(rules) => {
                log::info!("Loaded {} rules from RULES_CONFIG", rules.rules.len());
                return rules;
            }
            Err(e) => {
                log::error!("Failed to parse RULES_CONFIG, falling back to file: {e}");
            }
        }
    }

    let path = non_empty_env("RULES_CONFIG_PATH").unwrap_or_else(|| "rules.yaml".to_string());
    load_rules_file(Path::new(&path))
}

/// Lenient file load: a missing or invalid file yields an empty rule set.
pub fn load_rules_file(path: &Path) -> RuleFile {
    match read_rules_file(path) {
        Ok(rules) => {
            log::info!("Loaded {} rules from {}", rules.rules.len(), path.display());
            rules
        }
        Err(e) => {
            log::error!("Failed to load rules from {}: {e}", path.display());
            RuleFile::default()
        }
    }
}

/// Strict file load, used by `check` where a bad config must be reported.
pub fn read_rules_file(path: &Path) -> Result<RuleFile, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
        path: path.display().to_string(),
        source,
    })?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => Ok(serde_yml::from_str(&raw)?),
        _ => Ok(serde_json::from_str(&raw)?),
    }
}

/// Parse inline rule content: JSON first, then YAML.
pub fn parse_rules(raw: &str) -> Result<RuleFile, ConfigError> {
    match serde_json::from_str(raw) {
        Ok(rules) => Ok(rules),
        Err(json_err) => {
            log::debug!("RULES_CONFIG is not JSON ({json_err}), trying YAML");
            Ok(serde_yml::from_str(raw)?)
        }
    }
}
