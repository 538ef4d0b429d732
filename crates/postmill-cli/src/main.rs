//! Postmill - multi-persona post review pipeline CLI
//!
//! ## Commands
//!
//! - `run`: score, revise and (if needed) regenerate a batch of drafts
//! - `config`: print the effective pipeline configuration

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use postmill_core::{
    init_tracing, Batch, BatchCoordinator, CostLedger, CostTotals, LogFormat, PipelineConfig,
    PostLifecycleController, ValidatorPool,
};
use postmill_personas::{default_panel, DraftPool, RuleReviser, TemplateSynthesizer};
use serde::Serialize;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "postmill")]
#[command(author = "Postmill Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Multi-persona post review pipeline", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a batch over drafts loaded from a JSON file
    Run {
        /// Draft file: a JSON array of drafts, or {"drafts": [...]}
        #[arg(short, long)]
        drafts: PathBuf,

        /// Pipeline config file (TOML)
        #[arg(short, long, env = "POSTMILL_CONFIG")]
        config: Option<PathBuf>,

        #[command(flatten)]
        overrides: ConfigOverrides,

        /// Keep running batches until one meets the target approval rate
        #[arg(long)]
        until_target: bool,

        /// Print the run as JSON on stdout instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config {
        /// Pipeline config file (TOML)
        #[arg(short, long, env = "POSTMILL_CONFIG")]
        config: Option<PathBuf>,

        #[command(flatten)]
        overrides: ConfigOverrides,
    },
}

/// Per-key overrides layered over the config file.
#[derive(Args, Debug, Default, Clone)]
struct ConfigOverrides {
    /// Drafts requested per batch
    #[arg(long, env = "POSTMILL_POSTS_PER_BATCH")]
    posts_per_batch: Option<usize>,

    /// Revision budget per post
    #[arg(long, env = "POSTMILL_MAX_REVISIONS")]
    max_revisions: Option<u32>,

    /// Approval rate below which a batch regenerates (0.0-1.0)
    #[arg(long, env = "POSTMILL_TARGET_APPROVAL_RATE")]
    target_approval_rate: Option<f64>,

    /// Approving validators needed for a post to pass
    #[arg(long, env = "POSTMILL_MIN_APPROVALS")]
    min_approvals: Option<usize>,

    /// Batches to try with --until-target
    #[arg(long, env = "POSTMILL_MAX_ATTEMPTS")]
    max_attempts: Option<u32>,
}

impl ConfigOverrides {
    fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(v) = self.posts_per_batch {
            config.posts_per_batch = v;
        }
        if let Some(v) = self.max_revisions {
            config.max_revisions = v;
        }
        if let Some(v) = self.target_approval_rate {
            config.target_approval_rate = v;
        }
        if let Some(v) = self.min_approvals {
            config.min_approvals_required = v;
        }
        if let Some(v) = self.max_attempts {
            config.max_total_attempts = v;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    init_tracing(format, level);

    match cli.command {
        Commands::Run {
            drafts,
            config,
            overrides,
            until_target,
            json,
        } => cmd_run(&drafts, config.as_deref(), &overrides, until_target, json).await,
        Commands::Config { config, overrides } => cmd_config(config.as_deref(), &overrides),
    }
}

/// File (or defaults) with overrides applied, validated against the
/// built-in validator panel.
fn effective_config(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<PipelineConfig> {
    let base = match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    let config = overrides.apply(base);
    config
        .validate(default_panel().len())
        .context("Invalid pipeline configuration")?;
    Ok(config)
}

#[derive(Serialize)]
struct RunOutput<'a> {
    version: &'static str,
    target_met: bool,
    cost: CostTotals,
    batches: &'a [Batch],
}

/// Run one batch, or batches until the target is met
async fn cmd_run(
    drafts: &Path,
    config_path: Option<&Path>,
    overrides: &ConfigOverrides,
    until_target: bool,
    json: bool,
) -> Result<()> {
    let config = effective_config(config_path, overrides)?;
    let pool = DraftPool::load(drafts)?;
    info!(drafts = pool.len(), path = %drafts.display(), "draft pool loaded");

    let panel = ValidatorPool::new(default_panel());
    let validator_count = panel.len();
    let controller = PostLifecycleController::new(
        panel,
        Arc::new(TemplateSynthesizer::new()),
        Arc::new(RuleReviser::new()),
        config.min_approvals_required,
    );
    let target = config.target_approval_rate;
    let ledger = Arc::new(CostLedger::new());
    let mut coordinator = BatchCoordinator::new(config, Arc::new(pool), controller)?
        .with_sink(Arc::clone(&ledger) as Arc<dyn postmill_core::BatchSink>);

    let outcome = if until_target {
        coordinator
            .run_until_target()
            .await
            .map(|report| (report.batches, report.target_met))
    } else {
        coordinator.run_batch().await.map(|batch| {
            let met = batch.metrics().approval_rate >= target;
            (vec![batch], met)
        })
    };

    let (batches, target_met) = match outcome {
        Ok(done) => done,
        Err(e) => {
            if let Some(batch) = e.batch() {
                eprint!("{}", render_batch(batch, validator_count));
            }
            return Err(e).context("Batch run failed");
        }
    };

    if json {
        let output = RunOutput {
            version: postmill_core::VERSION,
            target_met,
            cost: ledger.snapshot(),
            batches: &batches,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for batch in &batches {
        print!("{}", render_batch(batch, validator_count));
        println!();
    }
    println!(
        "Target {:.0}% {}",
        target * 100.0,
        if target_met { "met" } else { "not met" }
    );
    Ok(())
}

/// Print the effective configuration
fn cmd_config(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<()> {
    let config = effective_config(path, overrides)?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

/// Per-post table plus a metrics footer.
fn render_batch(batch: &Batch, validator_count: usize) -> String {
    let mut out = String::new();
    let regenerated = if batch.regenerated() { " (regenerated)" } else { "" };
    let _ = writeln!(out, "Batch {} {}{}", batch.id(), batch.status(), regenerated);
    if let Some(error) = batch.error() {
        let _ = writeln!(out, "Error: {error}");
    }
    let _ = writeln!(
        out,
        "{:>4}  {:<16} {:>9} {:>9} {:>6}  audience",
        "#", "status", "revisions", "approvals", "avg"
    );
    for post in batch.posts() {
        let _ = writeln!(
            out,
            "{:>4}  {:<16} {:>9} {:>9} {:>6.2}  {}",
            post.post_number(),
            post.status().to_string(),
            post.revision_count(),
            format!("{}/{}", post.approval_count(), validator_count),
            post.average_score(),
            post.target_audience()
        );
    }

    let m = batch.metrics();
    let _ = writeln!(
        out,
        "Approved {}/{} ({:.1}%), rejected {}, revised {} ({:.1}% recovered)",
        m.approved_posts,
        m.total_posts,
        m.approval_rate * 100.0,
        m.rejected_posts,
        m.revised_posts,
        m.revision_success_rate * 100.0
    );
    let _ = writeln!(
        out,
        "Avg approved score {:.2}, avg time {:.0}ms, tokens {}, cost ${:.4}",
        m.average_approved_score, m.average_processing_time_ms, m.total_tokens, m.total_cost_usd
    );
    out
}
