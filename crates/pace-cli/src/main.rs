mod live;
mod replay;
mod trace;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use pace_core::CoreConfig;

use crate::trace::SynthParams;

#[derive(Parser)]
#[command(name = "pace", about = "Frame pacing scheduler: trace replay and live ticker")]
struct Cli {
    /// TOML configuration file (defaults apply to missing keys)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a trace of frame durations through the scheduler
    Replay {
        /// Trace file: one ms value per line, or a JSON array
        trace: PathBuf,

        /// Print the full report and alert log as JSON
        #[arg(long)]
        json: bool,

        /// Background tasks to queue before the first frame
        #[arg(long, default_value_t = 0)]
        tasks: usize,
    },

    /// Write a synthetic trace to stdout
    Synth {
        #[arg(long, default_value_t = 600)]
        frames: usize,

        /// Mean frame time in ms
        #[arg(long, default_value_t = 16.0)]
        mean: f64,

        /// Uniform jitter around the mean, in ms
        #[arg(long, default_value_t = 1.0)]
        jitter: f64,

        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Make every Nth frame a spike (0 = never)
        #[arg(long, default_value_t = 0)]
        spike_every: usize,

        /// Spike frame time in ms
        #[arg(long, default_value_t = 40.0)]
        spike_ms: f64,
    },

    /// Run frames in real time on the monotonic clock
    Live {
        #[arg(long, default_value_t = 5.0)]
        seconds: f64,

        /// Simulated CPU work per frame in ms
        #[arg(long, default_value_t = 8.0)]
        load_ms: f64,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<CoreConfig> {
    let Some(path) = path else {
        return Ok(CoreConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    CoreConfig::from_toml_str(&text).with_context(|| format!("invalid config {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Replay { trace, json, tasks } => cmd_replay(&cli, trace, *json, *tasks),
        Commands::Synth {
            frames,
            mean,
            jitter,
            seed,
            spike_every,
            spike_ms,
        } => cmd_synth(&SynthParams {
            frames: *frames,
            mean: *mean,
            jitter: *jitter,
            seed: *seed,
            spike_every: *spike_every,
            spike_ms: *spike_ms,
        }),
        Commands::Live { seconds, load_ms } => cmd_live(&cli, *seconds, *load_ms).await,
        Commands::Config => cmd_config(&cli),
    }
}

fn cmd_replay(cli: &Cli, path: &Path, json: bool, tasks: usize) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let frames = trace::parse_trace(&text)
        .with_context(|| format!("failed to parse trace {}", path.display()))?;
    tracing::debug!(frames = frames.len(), "trace loaded");

    let outcome = replay::replay(config, &frames, tasks)?;

    if json {
        let doc = serde_json::json!({
            "report": outcome.report,
            "alerts": outcome.alerts,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&doc).context("failed to serialize report")?
        );
        return Ok(());
    }

    for alert in &outcome.alerts {
        println!("{:>10.2}ms  {}", alert.timestamp, alert.kind());
    }
    if !outcome.alerts.is_empty() {
        println!();
    }
    print!("{}", outcome.report.summary());
    Ok(())
}

fn cmd_synth(params: &SynthParams) -> Result<()> {
    if !params.mean.is_finite() || params.mean <= 0.0 {
        bail!("--mean must be positive, got {}", params.mean);
    }
    let frames = trace::synthesize(params);
    let header = format!(
        "synth frames={} mean={} jitter={} seed={} spike_every={} spike_ms={}",
        params.frames, params.mean, params.jitter, params.seed, params.spike_every, params.spike_ms
    );
    print!("{}", trace::render_text(&frames, &header));
    Ok(())
}

async fn cmd_live(cli: &Cli, seconds: f64, load_ms: f64) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let report = live::run_live(config, seconds, load_ms).await?;
    print!("{}", report.summary());
    Ok(())
}

fn cmd_config(cli: &Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let text = config
        .to_toml_string()
        .context("failed to serialize config")?;
    print!("{text}");
    Ok(())
}
