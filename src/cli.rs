use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "costwarden")]
#[command(
    about = "Budget alert responder: matches cost alerts against rules and applies policy actions"
)]
#[command(version = "0.1.0")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process a budget alert envelope and execute the matched actions
    Respond(RespondArgs),

    /// Evaluate an alert against the rules and print the actions without executing
    Evaluate(EvaluateArgs),

    /// Validate a rules file and summarize its rules
    Check(CheckArgs),
}

#[derive(Parser, Debug)]
pub struct RespondArgs {
    /// Alert envelope JSON file (default: stdin)
    #[arg(long, value_name = "FILE")]
    pub event: Option<PathBuf>,

    /// Rules file (default: RULES_CONFIG / RULES_CONFIG_PATH)
    #[arg(long, value_name = "FILE")]
    pub rules: Option<PathBuf>,

    /// Log intended mutations instead of performing them
    #[arg(long)]
    pub dry_run: bool,

    /// Organization id for policy parents and label discovery
    #[arg(long, value_name = "ID")]
    pub organization: Option<String>,
}

#[derive(Parser, Debug)]
pub struct EvaluateArgs {
    /// Alert envelope JSON file (default: stdin)
    #[arg(long, value_name = "FILE")]
    pub event: Option<PathBuf>,

    /// Rules file (default: RULES_CONFIG / RULES_CONFIG_PATH)
    #[arg(long, value_name = "FILE")]
    pub rules: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Rules file to validate
    #[arg(required = true)]
    pub rules: PathBuf,
}

impl RespondArgs {
    pub fn validate(&self) -> anyhow::Result<()> {
        validate_input_files(self.event.as_deref(), self.rules.as_deref())
    }
}

impl EvaluateArgs {
    pub fn validate(&self) -> anyhow::Result<()> {
        validate_input_files(self.event.as_deref(), self.rules.as_deref())
    }
}

impl CheckArgs {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.rules.exists() {
            anyhow::bail!("Rules file does not exist: {}", self.rules.display());
        }
        Ok(())
    }
}

fn validate_input_files(
    event: Option<&std::path::Path>,
    rules: Option<&std::path::Path>,
) -> anyhow::Result<()> {
    if let Some(event) = event {
        if !event.exists() {
            anyhow::bail!("Event file does not exist: {}", event.display());
        }
    }
    if let Some(rules) = rules {
        if !rules.exists() {
            anyhow::bail!("Rules file does not exist: {}", rules.display());
        }
    }
    Ok(())
}
