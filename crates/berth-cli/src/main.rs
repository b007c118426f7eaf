//! Berth - phase-gated deployment CLI
//!
//! The `berth` command validates the environment, then brings up the
//! embedded phase table in order, blocking each phase on the readiness
//! of its services.
//!
//! ## Selectors
//!
//! - `phase1` / `phase2` / `phase3`: deploy one phase
//! - `all`: deploy every phase in registry order (default)
//! - `validate`: run environment validation alone

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tokio::sync::watch;
use tracing::{warn, Level};

use berth_core::{
    DockerCompose, EnvTag, Orchestrator, OrchestratorConfig, PhaseRegistry, PhaseSelector,
    RunOptions,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SelectorArg {
    Phase1,
    Phase2,
    Phase3,
    All,
    Validate,
}

impl From<SelectorArg> for PhaseSelector {
    fn from(arg: SelectorArg) -> Self {
        match arg {
            SelectorArg::Phase1 => PhaseSelector::Phase1,
            SelectorArg::Phase2 => PhaseSelector::Phase2,
            SelectorArg::Phase3 => PhaseSelector::Phase3,
            SelectorArg::All => PhaseSelector::All,
            SelectorArg::Validate => PhaseSelector::Validate,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EnvArg {
    Development,
    Staging,
    Production,
}

impl From<EnvArg> for EnvTag {
    fn from(arg: EnvArg) -> Self {
        match arg {
            EnvArg::Development => EnvTag::Development,
            EnvArg::Staging => EnvTag::Staging,
            EnvArg::Production => EnvTag::Production,
        }
    }
}

#[derive(Parser)]
#[command(name = "berth")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Phase-gated deployment orchestrator", long_about = None)]
struct Cli {
    /// Phases to deploy, or validate-only
    #[arg(value_enum, default_value_t = SelectorArg::All)]
    selector: SelectorArg,

    /// Target environment (labels and thresholds only)
    #[arg(long, value_enum, default_value_t = EnvArg::Development)]
    env: EnvArg,

    /// Invoke the secret generator before validation
    #[arg(long)]
    generate_secrets: bool,

    /// Skip environment validation
    #[arg(long)]
    skip_validation: bool,

    /// Proceed past failed validation or failed phases
    #[arg(long)]
    continue_on_failure: bool,

    /// Log the plan without touching the container runtime
    #[arg(long)]
    dry_run: bool,

    /// Skip the artifact build step
    #[arg(long)]
    skip_build: bool,

    /// Compose manifest path (overrides BERTH_COMPOSE_FILE)
    #[arg(long)]
    compose_file: Option<PathBuf>,

    /// Write the run summary as JSON to this path
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    berth_core::init_tracing(cli.json, level);

    let mut config = OrchestratorConfig::from_env(cli.env.into());
    if let Some(file) = cli.compose_file {
        config.compose_file = file;
    }
    if let Some(path) = cli.summary {
        config.summary_path = Some(path);
    }

    let compose = DockerCompose::new(config.compose_file.clone(), config.project.clone());
    let registry = PhaseRegistry::builtin();
    let options = RunOptions {
        selector: cli.selector.into(),
        generate_secrets: cli.generate_secrets,
        skip_validation: cli.skip_validation,
        continue_on_failure: cli.continue_on_failure,
        dry_run: cli.dry_run,
        skip_build: cli.skip_build,
    };

    // Ctrl-C aborts in-flight health polling instead of waiting out
    // per-service timeouts.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; aborting run");
            let _ = cancel_tx.send(true);
        }
    });

    let summary = Orchestrator::new(config)
        .run(&compose, &registry, &options, cancel_rx)
        .await?;

    print!("{}", summary.render_text());
    std::process::exit(summary.exit_code);
}
