use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleFile {
    #[serde(default)]
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Used for logging only; uniqueness is not enforced.
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub conditions: Conditions,
    #[serde(default)]
    pub actions: Vec<ActionSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_percent: Option<ThresholdSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_account_filter: Option<IdentityFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_id_filter: Option<IdentityFilter>,
}

/// A single threshold condition or an ordered list of them.
/// A list is a conjunction, used to express inclusive ranges
/// like `[{operator: min, value: 80}, {operator: max, value: 89.99}]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThresholdSpec {
    One(ThresholdCondition),
    Many(Vec<ThresholdCondition>),
}

impl ThresholdSpec {
    pub fn conditions(&self) -> &[ThresholdCondition] {
        match self {
            ThresholdSpec::One(cond) => std::slice::from_ref(cond),
            ThresholdSpec::Many(conds) => conds,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdCondition {
    #[serde(default)]
    pub operator: CompareOp,
    #[serde(default = "default_threshold_value")]
    pub value: f64,
}

// Missing fields fall back to ">= 100" to stay compatible with
// existing rule files.
fn default_threshold_value() -> f64 {
    100.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[default]
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    /// Inclusive lower bound, same as `>=`.
    #[serde(rename = "min")]
    Min,
    /// Inclusive upper bound, same as `<=`.
    #[serde(rename = "max")]
    Max,
}

impl CompareOp {
    pub fn holds(self, percent: f64, value: f64) -> bool {
        match self {
            CompareOp::Ge | CompareOp::Min => percent >= value,
            CompareOp::Gt => percent > value,
            CompareOp::Eq => percent == value,
            CompareOp::Lt => percent < value,
            CompareOp::Le | CompareOp::Max => percent <= value,
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CompareOp::Ge => ">=",
            CompareOp::Gt => ">",
            CompareOp::Eq => "==",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Min => "min",
            CompareOp::Max => "max",
        };
        write!(f, "{s}")
    }
}

/// Filter on a billing account or budget identifier: an exact string,
/// a membership list, or a `*`-wildcard pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdentityFilter {
    AnyOf(Vec<String>),
    Pattern { pattern: String },
    Exact(String),
}

impl IdentityFilter {
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            IdentityFilter::Exact(expected) => candidate == expected,
            IdentityFilter::AnyOf(allowed) => allowed.iter().any(|s| s == candidate),
            IdentityFilter::Pattern { pattern } => wildcard_match(pattern, candidate),
        }
    }
}

/// Full-string wildcard match where `*` is the only wildcard; every other
/// character is literal.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let mut regex = String::with_capacity(pattern.len() + 4);
    regex.push('^');
    for (i, literal) in pattern.split('*').enumerate() {
        if i > 0 {
            regex.push_str(".*");
        }
        regex.push_str(&regex::escape(literal));
    }
    regex.push('$');

    match Regex::new(&regex) {
        Ok(re) => re.is_match(text),
        Err(_) => false,
    }
}

/// One action contributed by a rule: the typed action payload plus its
/// targeting specification. The four targeting methods are not mutually
/// exclusive; each contributes targets independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSpec {
    #[serde(flatten)]
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_projects: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_folders: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_organization: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub target_labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    RestrictServices {
        #[serde(default)]
        services: Vec<String>,
    },
    ApplyConstraint {
        constraint: String,
        #[serde(default = "default_true")]
        enforce: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        values: Option<Vec<String>>,
    },
    LogOnly {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    SendMail {
        #[serde(default)]
        to_emails: Vec<String>,
        #[serde(default = "default_template")]
        template: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        custom_message: Option<String>,
    },
}

fn default_true() -> bool {
    true
}

fn default_template() -> String {
    "budget_alert".to_string()
}

impl ActionSpec {
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            ActionKind::RestrictServices { .. } => "restrict_services",
            ActionKind::ApplyConstraint { .. } => "apply_constraint",
            ActionKind::LogOnly { .. } => "log_only",
            ActionKind::SendMail { .. } => "send_mail",
        }
    }

    /// Notification actions do not apply to a resource and need no targets.
    pub fn is_targeting_exempt(&self) -> bool {
        matches!(self.kind, ActionKind::SendMail { .. })
    }

    pub fn has_targets(&self) -> bool {
        !self.target_projects.is_empty()
            || !self.target_folders.is_empty()
            || self.target_organization.is_some()
            || !self.target_labels.is_empty()
    }
}
