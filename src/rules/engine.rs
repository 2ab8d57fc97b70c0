use super::schema::{ActionSpec, Rule, RuleFile};
use crate::alert::{AlertContext, BudgetAlert, MessageAttributes};

/// Evaluates budget alerts against the configured rule set.
///
/// The engine is a stateless pure transform: it holds the read-only rule
/// set and nothing else, so it is safe to call concurrently for
/// independent alert events.
pub struct RuleEngine {
    rules: Vec<Rule>,
}

impl RuleEngine {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn from_config(config: RuleFile) -> Self {
        Self::new(config.rules)
    }

    /// Evaluate an alert and return the actions of every matching rule,
    /// concatenated in rule-declaration order. Actions contributed by
    /// multiple rules are not deduplicated.
    pub fn evaluate(&self, alert: &BudgetAlert, attributes: &MessageAttributes) -> Vec<ActionSpec> {
        let ctx = AlertContext::new(alert, attributes);
        self.evaluate_context(&ctx)
    }

    pub fn evaluate_context(&self, ctx: &AlertContext) -> Vec<ActionSpec> {
        log::info!(
            "Evaluating rules for billing account {}, budget {}: cost={}, budget={}, threshold={:.1}%",
            ctx.billing_account_id,
            ctx.budget_id,
            ctx.cost_amount,
            ctx.budget_amount,
            ctx.threshold_percent,
        );

        let mut actions = Vec::new();
        for rule in &self.rules {
            if rule_matches(rule, ctx) {
                log::info!("Rule matched: {}", rule.name);
                actions.extend(extract_actions(rule).into_iter().cloned());
            }
        }
        actions
    }
}

/// Check a rule's conditions against the alert context. All present
/// checks must pass; an absent check always passes.
pub fn rule_matches(rule: &Rule, ctx: &AlertContext) -> bool {
    if let Some(spec) = &rule.conditions.threshold_percent {
        for cond in spec.conditions() {
            if !cond.operator.holds(ctx.threshold_percent, cond.value) {
                return false;
            }
        }
    }

    if let Some(filter) = &rule.conditions.billing_account_filter {
        if !filter.matches(&ctx.billing_account_id) {
            return false;
        }
    }

    if let Some(filter) = &rule.conditions.budget_id_filter {
        if !filter.matches(&ctx.budget_id) {
            return false;
        }
    }

    true
}

/// Return a matched rule's actions in declared order, dropping any
/// resource-targeted action that declares no targeting method.
pub fn extract_actions(rule: &Rule) -> Vec<&ActionSpec> {
    let mut actions = Vec::with_capacity(rule.actions.len());

    for action in &rule.actions {
        if !action.is_targeting_exempt() && !action.has_targets() {
            log::warn!(
                "Action {} in rule {} missing targeting specification \
                 (target_projects, target_folders, target_organization, or target_labels) - skipping",
                action.type_name(),
                rule.name,
            );
            continue;
        }
        actions.push(action);
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::schema::{
        ActionKind, CompareOp, Conditions, IdentityFilter, ThresholdCondition, ThresholdSpec,
    };

    fn context(percent: f64) -> AlertContext {
        AlertContext {
            cost_amount: percent * 10.0,
            budget_amount: 1000.0,
            threshold_percent: percent,
            billing_account_id: "012345-6789AB-CDEF01".to_string(),
            budget_id: "budget-1".to_string(),
        }
    }

    fn threshold(operator: CompareOp, value: f64) -> Option<ThresholdSpec> {
        Some(ThresholdSpec::One(ThresholdCondition { operator, value }))
    }

    fn range(lo: f64, hi: f64) -> Option<ThresholdSpec> {
        Some(ThresholdSpec::Many(vec![
            ThresholdCondition {
                operator: CompareOp::Min,
                value: lo,
            },
            ThresholdCondition {
                operator: CompareOp::Max,
                value: hi,
            },
        ]))
    }

    fn log_action(project: &str) -> ActionSpec {
        ActionSpec {
            kind: ActionKind::LogOnly { message: None },
            target_projects: vec![project.to_string()],
            target_folders: vec![],
            target_organization: None,
            target_labels: Default::default(),
        }
    }

    fn rule(name: &str, conditions: Conditions, actions: Vec<ActionSpec>) -> Rule {
        Rule {
            name: name.to_string(),
            description: String::new(),
            conditions,
            actions,
        }
    }

    #[test]
    fn ge_operator_boundary() {
        let r = rule(
            "r",
            Conditions {
                threshold_percent: threshold(CompareOp::Ge, 100.0),
                ..Default::default()
            },
            vec![],
        );
        assert!(rule_matches(&r, &context(100.0)));
        assert!(!rule_matches(&r, &context(99.9)));
    }

    #[test]
    fn min_and_max_are_inclusive() {
        let min_rule = rule(
            "min",
            Conditions {
                threshold_percent: threshold(CompareOp::Min, 80.0),
                ..Default::default()
            },
            vec![],
        );
        assert!(rule_matches(&min_rule, &context(80.0)));
        assert!(rule_matches(&min_rule, &context(85.0)));
        assert!(!rule_matches(&min_rule, &context(79.5)));

        let max_rule = rule(
            "max",
            Conditions {
                threshold_percent: threshold(CompareOp::Max, 90.0),
                ..Default::default()
            },
            vec![],
        );
        assert!(rule_matches(&max_rule, &context(90.0)));
        assert!(rule_matches(&max_rule, &context(85.0)));
        assert!(!rule_matches(&max_rule, &context(95.0)));
    }

    #[test]
    fn range_conditions_are_a_conjunction() {
        let r = rule(
            "range",
            Conditions {
                threshold_percent: range(80.0, 89.99),
                ..Default::default()
            },
            vec![],
        );
        assert!(rule_matches(&r, &context(82.0)));
        assert!(rule_matches(&r, &context(89.9)));
        assert!(!rule_matches(&r, &context(79.0)));
        assert!(!rule_matches(&r, &context(100.0)));
    }

    #[test]
    fn missing_threshold_always_passes() {
        let r = rule(
            "filters-only",
            Conditions {
                billing_account_filter: Some(IdentityFilter::Exact(
                    "012345-6789AB-CDEF01".to_string(),
                )),
                ..Default::default()
            },
            vec![],
        );
        assert!(rule_matches(&r, &context(0.0)));
    }

    #[test]
    fn billing_account_pattern_filter() {
        let mut ctx = context(100.0);
        ctx.billing_account_id = "dev-test-123".to_string();

        let r = rule(
            "pattern",
            Conditions {
                billing_account_filter: Some(IdentityFilter::Pattern {
                    pattern: "dev-*".to_string(),
                }),
                ..Default::default()
            },
            vec![],
        );
        assert!(rule_matches(&r, &ctx));

        ctx.billing_account_id = "prod-test".to_string();
        assert!(!rule_matches(&r, &ctx));
    }

    #[test]
    fn budget_id_list_filter() {
        let r = rule(
            "list",
            Conditions {
                budget_id_filter: Some(IdentityFilter::AnyOf(vec![
                    "budget-1".to_string(),
                    "budget-2".to_string(),
                ])),
                ..Default::default()
            },
            vec![],
        );
        let mut ctx = context(100.0);
        assert!(rule_matches(&r, &ctx));
        ctx.budget_id = "budget-3".to_string();
        assert!(!rule_matches(&r, &ctx));
    }

    #[test]
    fn extract_drops_untargeted_resource_actions() {
        let untargeted = ActionSpec {
            kind: ActionKind::RestrictServices { services: vec![] },
            target_projects: vec![],
            target_folders: vec![],
            target_organization: None,
            target_labels: Default::default(),
        };
        let mail = ActionSpec {
            kind: ActionKind::SendMail {
                to_emails: vec!["ops@example.com".to_string()],
                template: "budget_alert".to_string(),
                custom_message: None,
            },
            target_projects: vec![],
            target_folders: vec![],
            target_organization: None,
            target_labels: Default::default(),
        };
        let targeted = log_action("proj-1");

        let r = rule("mixed", Conditions::default(), vec![untargeted, mail, targeted]);
        let extracted = extract_actions(&r);
        assert_eq!(extracted.len(), 2);
        assert_eq!(extracted[0].type_name(), "send_mail");
        assert_eq!(extracted[1].type_name(), "log_only");
    }

    #[test]
    fn no_cross_rule_dedup() {
        let restrict = ActionSpec {
            kind: ActionKind::RestrictServices {
                services: vec!["compute.googleapis.com".to_string()],
            },
            target_projects: vec!["shared-project".to_string()],
            target_folders: vec![],
            target_organization: None,
            target_labels: Default::default(),
        };
        let conditions = Conditions {
            threshold_percent: threshold(CompareOp::Ge, 90.0),
            ..Default::default()
        };
        let engine = RuleEngine::new(vec![
            rule("first", conditions.clone(), vec![restrict.clone()]),
            rule("second", conditions, vec![restrict]),
        ]);

        let actions = engine.evaluate_context(&context(95.0));
        assert_eq!(actions.len(), 2);
        assert!(actions
            .iter()
            .all(|a| a.type_name() == "restrict_services"
                && a.target_projects == vec!["shared-project"]));
    }

    #[test]
    fn evaluate_builds_context_from_alert() {
        let engine = RuleEngine::new(vec![rule(
            "overrun",
            Conditions {
                threshold_percent: threshold(CompareOp::Ge, 100.0),
                billing_account_filter: Some(IdentityFilter::Exact("acct-1".to_string())),
                ..Default::default()
            },
            vec![log_action("proj-1")],
        )]);

        let alert = BudgetAlert {
            cost_amount: 1000.0,
            budget_amount: 1000.0,
            budget_display_name: "Team Budget".to_string(),
        };
        let attributes = MessageAttributes {
            billing_account_id: Some("acct-1".to_string()),
            budget_id: None,
        };

        let actions = engine.evaluate(&alert, &attributes);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].target_projects, vec!["proj-1"]);

        // Missing billing attribute defaults to "unknown" and fails the filter.
        let actions = engine.evaluate(&alert, &MessageAttributes::default());
        assert!(actions.is_empty());
    }

    #[test]
    fn evaluate_preserves_rule_order() {
        let conditions = Conditions {
            threshold_percent: threshold(CompareOp::Ge, 50.0),
            ..Default::default()
        };
        let engine = RuleEngine::new(vec![
            rule("a", conditions.clone(), vec![log_action("proj-a")]),
            rule("b", conditions, vec![log_action("proj-b")]),
        ]);

        let actions = engine.evaluate_context(&context(60.0));
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].target_projects, vec!["proj-a"]);
        assert_eq!(actions[1].target_projects, vec!["proj-b"]);
    }
}
