//! muxguard - keeps test runs away from production multiplexer sessions.
//!
//! The binary inspects the tmux sessions visible from this host, classifies
//! them, and checks that the isolation settings in the environment
//! (`MUXGUARD_TEST_MODE`, `MUXGUARD_TEST_SOCKET`, `MUXGUARD_SESSION_PREFIX`)
//! are safe to run under.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser as ClapParser, Subcommand};
use muxguard::{
    config::GuardConfig,
    detector::ConflictDetector,
    directory::SessionDirectory,
    error::GuardError,
    isolation::IsolationValidator,
    tmux::{TmuxClient, TmuxFactory},
};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(ClapParser, Debug)]
#[command(name = "muxguard", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// tmux socket to inspect (defaults to the default tmux server)
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    /// TOML file with naming-convention overrides
    #[arg(long, global = true, env = "MUXGUARD_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the environment class of each session name
    Classify {
        /// Session names to classify
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// List sessions with their environment class
    Sessions {
        /// Only list sessions starting with this prefix
        #[arg(long, default_value = "")]
        prefix: String,
    },

    /// Check that the current environment is safe for its mode
    Validate {
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Serialize)]
struct CheckResult {
    check: &'static str,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

impl CheckResult {
    fn from_result(check: &'static str, result: Result<Vec<String>, GuardError>) -> Self {
        match result {
            Ok(warnings) => Self {
                check,
                ok: true,
                code: None,
                message: None,
                warnings,
            },
            Err(e) => Self {
                check,
                ok: false,
                code: Some(e.code()),
                message: Some(e.to_string()),
                warnings: Vec::new(),
            },
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let guard_config = match &cli.config {
        Some(path) => GuardConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => GuardConfig::default(),
    };
    let naming = guard_config.naming;

    let directory: Arc<dyn SessionDirectory> = Arc::new(match &cli.socket {
        Some(socket) => TmuxClient::with_socket(socket),
        None => TmuxClient::new(),
    });

    match cli.command {
        Commands::Classify { names } => {
            for name in names {
                println!("{}\t{}", naming.classify(&name), name);
            }
            Ok(())
        }
        Commands::Sessions { prefix } => {
            let mut sessions = directory
                .list_sessions(&prefix)
                .context("listing sessions")?;
            sessions.sort();
            for name in sessions {
                println!("{}\t{}", naming.classify(&name), name);
            }
            Ok(())
        }
        Commands::Validate { json } => {
            let detector =
                ConflictDetector::new(Arc::clone(&directory)).with_naming(naming.clone());
            let validator = IsolationValidator::new(directory, Arc::new(TmuxFactory::new()))
                .with_naming(naming);

            let results = vec![
                CheckResult::from_result(
                    "environment_consistency",
                    detector
                        .validate_environment_consistency()
                        .map(|report| report.warnings),
                ),
                CheckResult::from_result(
                    "isolation",
                    validator.validate_isolation().map(|()| Vec::new()),
                ),
                CheckResult::from_result(
                    "no_production_access",
                    validator.validate_no_production_access().map(|()| Vec::new()),
                ),
            ];

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                for result in &results {
                    let status = if result.ok { "ok" } else { "FAIL" };
                    println!("{:<24} {}", result.check, status);
                    if let Some(message) = &result.message {
                        println!("  {message}");
                    }
                    for warning in &result.warnings {
                        println!("  warning: {warning}");
                    }
                }
            }

            if results.iter().any(|r| !r.ok) {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

/// Tracing goes to stderr so stdout stays machine-readable.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "muxguard=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
