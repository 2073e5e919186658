use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use foraging_core::config::{GoalConfig, GoalVariant, SimConfig};
use foraging_core::policy::{HeuristicInput, HeuristicPolicy, IdlePolicy, Policy, RandomPolicy};
use foraging_core::rng::derive_stream;
use foraging_core::world::{run_batch, ForagingArena, GoalArena};
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;

/// Stream index reserved for policy randomness, away from per-arena streams.
const POLICY_STREAM: usize = 1;

#[derive(Parser)]
#[command(name = "foraging")]
#[command(about = "Headless hummingbird foraging and move-to-goal arenas")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyKind {
    Random,
    Idle,
    /// Fly (or walk) straight ahead.
    Heuristic,
}

#[derive(Clone, Copy, ValueEnum)]
enum VariantArg {
    Open,
    Maze,
    RotatingMaze,
}

impl From<VariantArg> for GoalVariant {
    fn from(v: VariantArg) -> Self {
        match v {
            VariantArg::Open => GoalVariant::Open,
            VariantArg::Maze => GoalVariant::Maze,
            VariantArg::RotatingMaze => GoalVariant::RotatingMaze,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a foraging arena from a config file
    Run {
        /// Path to config file (JSON); defaults are used when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output directory for results (optional)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Number of fixed steps to run
        #[arg(long, default_value_t = 10000)]
        steps: usize,

        /// Record metrics every N steps
        #[arg(long, default_value_t = 100)]
        sample_every: usize,

        #[arg(long, value_enum, default_value_t = PolicyKind::Random)]
        policy: PolicyKind,
    },
    /// Run a move-to-goal arena
    Goal {
        #[arg(long, value_enum, default_value_t = VariantArg::Open)]
        variant: VariantArg,

        #[arg(long, default_value_t = 10000)]
        steps: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(long, value_enum, default_value_t = PolicyKind::Random)]
        policy: PolicyKind,

        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run independent foraging arenas in parallel, one per seed
    Batch {
        /// Number of seeds, counting up from the config seed
        #[arg(long, default_value_t = 8)]
        seeds: u64,

        #[arg(long, default_value_t = 5000)]
        steps: usize,

        #[arg(long, default_value_t = 500)]
        sample_every: usize,

        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Dump the default configuration to stdout
    DumpDefaultConfig {
        /// Print the goal arena defaults for this variant instead
        #[arg(long, value_enum)]
        goal: Option<VariantArg>,
    },
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<SimConfig> {
    let Some(path) = path else {
        return Ok(SimConfig::default());
    };
    let file = File::open(path).context("failed to open config file")?;
    let config: SimConfig =
        serde_json::from_reader(BufReader::new(file)).context("failed to parse config")?;
    config.validate().context("config validation error")?;
    info!(?path, "loaded config");
    Ok(config)
}

fn make_policy(kind: PolicyKind, seed: u64) -> Box<dyn Policy> {
    match kind {
        PolicyKind::Random => Box::new(RandomPolicy::new(derive_stream(seed, POLICY_STREAM))),
        PolicyKind::Idle => Box::new(IdlePolicy),
        PolicyKind::Heuristic => Box::new(HeuristicPolicy::new(HeuristicInput {
            forward: 1.0,
            ..HeuristicInput::default()
        })),
    }
}

fn write_summary<T: Serialize>(out: Option<&Path>, summary: &T) -> Result<()> {
    let Some(out_dir) = out else {
        return Ok(());
    };
    std::fs::create_dir_all(out_dir).context("failed to create output directory")?;
    let file =
        File::create(out_dir.join("summary.json")).context("failed to create summary file")?;
    serde_json::to_writer_pretty(file, summary).context("failed to write summary")?;
    println!("Results saved to {:?}", out_dir);
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::DumpDefaultConfig { goal } => {
            let json = match goal {
                Some(variant) => {
                    serde_json::to_string_pretty(&GoalConfig::for_variant(variant.into()))?
                }
                None => serde_json::to_string_pretty(&SimConfig::default())?,
            };
            println!("{json}");
        }
        Commands::Run {
            config,
            out,
            steps,
            sample_every,
            policy,
        } => {
            let sim_config = load_config(config.as_deref())?;
            let seed = sim_config.seed;
            let mut arena =
                ForagingArena::try_new(sim_config).context("failed to initialize arena")?;
            let mut policy = make_policy(policy, seed);

            println!("Simulating for {steps} steps...");
            let summary = arena
                .try_run_experiment(&mut *policy, steps, sample_every)
                .context("invalid run arguments")?;
            println!(
                "Run complete. Episodes: {}, mean nectar per episode: {:.3}, active flowers: {}",
                summary.episodes.len(),
                summary.mean_episode_nectar(),
                summary.final_active_sources
            );
            write_summary(out.as_deref(), &summary)?;
        }
        Commands::Goal {
            variant,
            steps,
            seed,
            policy,
            out,
        } => {
            let config = GoalConfig {
                seed,
                ..GoalConfig::for_variant(variant.into())
            };
            let mut arena = GoalArena::try_new(config).context("invalid goal config")?;
            let mut policy = make_policy(policy, seed);
            let summary = arena
                .try_run_experiment(&mut *policy, steps)
                .context("invalid run arguments")?;
            println!(
                "{:?}: {} wins, {} losses, {} timeouts",
                summary.variant, summary.wins, summary.losses, summary.timeouts
            );
            write_summary(out.as_deref(), &summary)?;
        }
        Commands::Batch {
            seeds,
            steps,
            sample_every,
            config,
            out,
        } => {
            let base = load_config(config.as_deref())?;
            let seed_list: Vec<u64> = (0..seeds).map(|i| base.seed.wrapping_add(i)).collect();
            let summaries = run_batch(&base, &seed_list, steps, sample_every, |seed| {
                RandomPolicy::new(derive_stream(seed, POLICY_STREAM))
            })
            .context("batch run failed")?;
            for summary in &summaries {
                println!(
                    "seed {:>6}: {} episodes, mean nectar {:.3}",
                    summary.seed,
                    summary.episodes.len(),
                    summary.mean_episode_nectar()
                );
            }
            write_summary(out.as_deref(), &summaries)?;
        }
    }
    Ok(())
}
