use foraging_core::config::{GoalConfig, GoalVariant, SimConfig};
use foraging_core::policy::RandomPolicy;
use foraging_core::rng::derive_stream;
use foraging_core::world::{ForagingArena, GoalArena};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

/// PyO3 module exposing foraging-core runs to Python.
#[pyfunction]
fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

fn value_error(e: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// Run a foraging arena under a seeded random policy and return the summary JSON.
#[pyfunction]
#[pyo3(signature = (config_json, steps, sample_every = 100))]
fn run_foraging(config_json: &str, steps: usize, sample_every: usize) -> PyResult<String> {
    let config: SimConfig = serde_json::from_str(config_json).map_err(value_error)?;
    let seed = config.seed;
    let mut arena = ForagingArena::try_new(config).map_err(value_error)?;
    let mut policy = RandomPolicy::new(derive_stream(seed, 1));
    let summary = arena
        .try_run_experiment(&mut policy, steps, sample_every)
        .map_err(value_error)?;
    serde_json::to_string(&summary).map_err(value_error)
}

/// Run a move-to-goal arena ("open", "maze" or "rotating_maze") and return the summary JSON.
#[pyfunction]
#[pyo3(signature = (variant, steps, seed = 42))]
fn run_goal(variant: &str, steps: usize, seed: u64) -> PyResult<String> {
    let variant: GoalVariant =
        serde_json::from_value(serde_json::Value::String(variant.to_owned()))
            .map_err(value_error)?;
    let config = GoalConfig {
        seed,
        ..GoalConfig::for_variant(variant)
    };
    let mut arena = GoalArena::try_new(config).map_err(value_error)?;
    let mut policy = RandomPolicy::new(derive_stream(seed, 1));
    let summary = arena
        .try_run_experiment(&mut policy, steps)
        .map_err(value_error)?;
    serde_json::to_string(&summary).map_err(value_error)
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(version, m)?)?;
    m.add_function(wrap_pyfunction!(run_foraging, m)?)?;
    m.add_function(wrap_pyfunction!(run_goal, m)?)?;
    Ok(())
}
