use super::{validate_experiment, ArenaInitError, ExperimentError, ForagingArena, RunSummary};
use crate::config::SimConfig;
use crate::policy::Policy;
use rayon::prelude::*;
use std::{error::Error, fmt};

#[derive(Debug, Clone, PartialEq)]
pub enum BatchError {
    Experiment(ExperimentError),
    Init { seed: u64, source: ArenaInitError },
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchError::Experiment(e) => write!(f, "{e}"),
            BatchError::Init { seed, source } => write!(f, "seed {seed}: {source}"),
        }
    }
}

impl Error for BatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BatchError::Experiment(e) => Some(e),
            BatchError::Init { source, .. } => Some(source),
        }
    }
}

impl From<ExperimentError> for BatchError {
    fn from(err: ExperimentError) -> Self {
        BatchError::Experiment(err)
    }
}

/// Run one independent arena per seed in parallel. `make_policy` builds the
/// policy for a given seed. Summaries come back in seed order.
pub fn run_batch<P, F>(
    base: &SimConfig,
    seeds: &[u64],
    steps: usize,
    sample_every: usize,
    make_policy: F,
) -> Result<Vec<RunSummary>, BatchError>
where
    P: Policy,
    F: Fn(u64) -> P + Sync,
{
    validate_experiment(steps, sample_every)?;
    seeds
        .par_iter()
        .map(|&seed| {
            let config = SimConfig {
                seed,
                ..base.clone()
            };
            let mut arena = ForagingArena::try_new(config)
                .map_err(|source| BatchError::Init { seed, source })?;
            let mut policy = make_policy(seed);
            Ok(arena.try_run_experiment(&mut policy, steps, sample_every)?)
        })
        .collect()
}
