mod alert;
mod cli;
mod config;
mod discovery;
mod email;
mod error;
mod events;
mod executor;
mod gcp;
mod policy;
mod rules;
mod target;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::io::Read;
use std::path::Path;

use alert::AlertContext;
use cli::{CheckArgs, Cli, Commands, EvaluateArgs, RespondArgs};
use discovery::{DryRunDiscovery, GcpProjectDiscovery};
use email::EmailService;
use events::EventPublisher;
use executor::Executor;
use policy::{DryRunPolicyClient, GcpOrgPolicyClient};
use rules::RuleEngine;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Respond(args) => {
            args.validate()?;
            run_respond(args).await
        }
        Commands::Evaluate(args) => {
            args.validate()?;
            run_evaluate(args).await
        }
        Commands::Check(args) => {
            args.validate()?;
            run_check(args)
        }
    }
}

async fn run_respond(args: RespondArgs) -> Result<()> {
    let settings = config::Settings::from_env();
    let dry_run = args.dry_run || settings.dry_run;
    let organization_id = args
        .organization
        .or(settings.organization_id)
        .context("organization id is required (--organization or ORGANIZATION_ID)")?;

    let engine = match &args.rules {
        Some(path) => RuleEngine::from_config(config::load_rules_file(path)),
        None => RuleEngine::from_config(config::load_rules_config()),
    };

    let raw = read_event(args.event.as_deref())?;
    let (budget_alert, attributes) = alert::decode_envelope(&raw)?;
    let ctx = AlertContext::new(&budget_alert, &attributes);

    log::info!(
        "Processing alert: {:.1}% of budget for billing account {}",
        ctx.threshold_percent,
        ctx.billing_account_id,
    );

    let actions = engine.evaluate_context(&ctx);
    if actions.is_empty() {
        log::info!("No rules matched, nothing to execute");
        println!("{}", "No matching rules for this alert".yellow());
        return Ok(());
    }

    let http = gcp::http_client();
    let executor = if dry_run {
        log::info!("Dry-run mode: no mutations will be performed");
        Executor::new(
            organization_id.clone(),
            Box::new(DryRunPolicyClient),
            Box::new(DryRunDiscovery),
            EventPublisher::new(settings.event_topic, true, http),
            None,
        )
    } else {
        let email = match EmailService::from_env() {
            Ok(service) => Some(service),
            Err(e) => {
                log::info!("Email delivery disabled: {e}");
                None
            }
        };
        Executor::new(
            organization_id.clone(),
            Box::new(GcpOrgPolicyClient::new(http.clone())),
            Box::new(GcpProjectDiscovery::new(http.clone())),
            EventPublisher::new(settings.event_topic, false, http),
            email,
        )
    };

    let report = executor.execute(&actions, &ctx).await;

    let summary = format!(
        "Executed {} actions for organization {} ({} failed)",
        report.executed.len(),
        organization_id,
        report.failures,
    );
    if report.failures == 0 {
        println!("{}", summary.green());
    } else {
        println!("{}", summary.red());
    }
    Ok(())
}

async fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    let settings = config::Settings::from_env();
    let engine = match &args.rules {
        Some(path) => RuleEngine::from_config(config::load_rules_file(path)),
        None => RuleEngine::from_config(config::load_rules_config()),
    };

    let raw = read_event(args.event.as_deref())?;
    let (budget_alert, attributes) = alert::decode_envelope(&raw)?;
    let ctx = AlertContext::new(&budget_alert, &attributes);
    let actions = engine.evaluate_context(&ctx);

    // Targets are resolved through the dry-run discovery so evaluation
    // never touches a backend; label targets come back as mock projects.
    let discovery = DryRunDiscovery;
    let mut evaluated = Vec::with_capacity(actions.len());
    for action in &actions {
        let targets = if action.is_targeting_exempt() {
            Vec::new()
        } else {
            target::resolve_targets(action, settings.organization_id.as_deref(), &discovery).await
        };
        evaluated.push(serde_json::json!({
            "action": action,
            "targets": targets,
        }));
    }

    let output = serde_json::json!({
        "context": ctx,
        "actions": evaluated,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_check(args: CheckArgs) -> Result<()> {
    let rules = config::read_rules_file(&args.rules)
        .with_context(|| format!("invalid rules file: {}", args.rules.display()))?;

    for rule in &rules.rules {
        let actions: Vec<&str> = rule.actions.iter().map(|a| a.type_name()).collect();
        println!("{} {} [{}]", "rule".cyan(), rule.name, actions.join(", "));
    }
    println!(
        "{}",
        format!("OK: {} rules loaded", rules.rules.len()).green()
    );
    Ok(())
}

/// Read the alert envelope from a file, or stdin when no file is given.
fn read_event(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read event file: {}", path.display())),
        None => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("failed to read event from stdin")?;
            Ok(raw)
        }
    }
}
