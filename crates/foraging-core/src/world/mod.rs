pub mod batch;
pub mod goal;
pub mod metrics;
#[cfg(test)]
mod tests;

pub use batch::*;
pub use goal::*;
pub use metrics::*;

use crate::agent::forager::{Action, ForagingAgent, SpawnError, ACTION_WIDTH};
use crate::config::{ConfigError, SimConfig};
use crate::contact::{Contact, ContactPhase, ContactSubject};
use crate::episode::EndReason;
use crate::field::ResourceField;
use crate::policy::Policy;
use crate::rng::create_rng;
use crate::spatial::{ColliderIndex, ColliderSphere};
use glam::Vec3;
use rand_chacha::ChaCha12Rng;
use std::{error::Error, fmt};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum ArenaInitError {
    Config(ConfigError),
    TooManyAgents { max: usize, actual: usize },
    EmptyField,
    Spawn { agent: usize, source: SpawnError },
}

impl fmt::Display for ArenaInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArenaInitError::Config(e) => write!(f, "{}", e),
            ArenaInitError::TooManyAgents { max, actual } => {
                write!(f, "num_agents ({actual}) exceeds supported maximum ({max})")
            }
            ArenaInitError::EmptyField => write!(f, "field layout produced no nectar sources"),
            ArenaInitError::Spawn { agent, source } => {
                write!(f, "agent {agent}: {source}")
            }
        }
    }
}

impl From<ConfigError> for ArenaInitError {
    fn from(err: ConfigError) -> Self {
        ArenaInitError::Config(err)
    }
}

impl Error for ArenaInitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ArenaInitError::Config(e) => Some(e),
            ArenaInitError::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExperimentError {
    InvalidSampleEvery,
    TooManySteps { max: usize, actual: usize },
    TooManySamples { max: usize, actual: usize },
}

impl fmt::Display for ExperimentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExperimentError::InvalidSampleEvery => write!(f, "sample_every must be positive"),
            ExperimentError::TooManySteps { max, actual } => {
                write!(f, "steps ({actual}) exceed supported maximum ({max})")
            }
            ExperimentError::TooManySamples { max, actual } => {
                write!(
                    f,
                    "sample count ({actual}) exceeds supported maximum ({max})"
                )
            }
        }
    }
}

impl Error for ExperimentError {}

pub const MAX_EXPERIMENT_STEPS: usize = 1_000_000;
pub const MAX_EXPERIMENT_SAMPLES: usize = 50_000;

/// Check run arguments and return the number of samples the run will record.
pub(crate) fn validate_experiment(
    steps: usize,
    sample_every: usize,
) -> Result<usize, ExperimentError> {
    if sample_every == 0 {
        return Err(ExperimentError::InvalidSampleEvery);
    }
    if steps > MAX_EXPERIMENT_STEPS {
        return Err(ExperimentError::TooManySteps {
            max: MAX_EXPERIMENT_STEPS,
            actual: steps,
        });
    }
    let estimated_samples = if steps == 0 {
        0
    } else {
        ((steps - 1) / sample_every) + 1
    };
    if estimated_samples > MAX_EXPERIMENT_SAMPLES {
        return Err(ExperimentError::TooManySamples {
            max: MAX_EXPERIMENT_SAMPLES,
            actual: estimated_samples,
        });
    }
    Ok(estimated_samples)
}

/// Bodies of every agent except `skip`, as spawn obstacles.
fn other_bodies(agents: &[ForagingAgent], skip: usize) -> ColliderIndex {
    ColliderIndex::from_spheres(
        agents
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != skip)
            .map(|(_, a)| {
                ColliderSphere::new(a.body.position.to_array(), a.config().body_radius)
            })
            .collect(),
    )
}

/// Fixed-step stand-in for the physics engine: several foraging agents
/// sharing one flower field.
pub struct ForagingArena {
    pub agents: Vec<ForagingAgent>,
    pub(crate) field: ResourceField,
    pub(crate) config: SimConfig,
    pub(crate) rng: ChaCha12Rng,
    pub(crate) step_index: usize,
    pub(crate) touching_boundary: Vec<bool>,
    pub(crate) last_rewards: Vec<f32>,
    pub(crate) feeds_last_step: usize,
    pub(crate) episodes_completed: usize,
    pub(crate) finished: Vec<EpisodeSummary>,
}

impl ForagingArena {
    pub const MAX_AGENTS: usize = 256;

    pub fn new(config: SimConfig) -> Self {
        Self::try_new(config).unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_new(config: SimConfig) -> Result<Self, ArenaInitError> {
        config.validate()?;
        let mut rng = create_rng(config.seed);
        let field = ResourceField::generate(&config.field, &mut rng);
        Self::try_with_field(config, field, rng)
    }

    /// Arena over a prepared field, e.g. a hand-built layout.
    pub fn try_with_field(
        config: SimConfig,
        mut field: ResourceField,
        mut rng: ChaCha12Rng,
    ) -> Result<Self, ArenaInitError> {
        config.validate()?;
        if config.num_agents > Self::MAX_AGENTS {
            return Err(ArenaInitError::TooManyAgents {
                max: Self::MAX_AGENTS,
                actual: config.num_agents,
            });
        }
        if field.is_empty() {
            return Err(ArenaInitError::EmptyField);
        }

        let mut agents: Vec<ForagingAgent> = Vec::with_capacity(config.num_agents);
        for id in 0..config.num_agents {
            let mut agent =
                ForagingAgent::new(id, config.forager.clone(), config.training, config.max_steps);
            // Agents not yet placed are not obstacles.
            let occupants = other_bodies(&agents, usize::MAX);
            agent
                .try_begin_episode(&mut field, &occupants, &mut rng)
                .map_err(|source| ArenaInitError::Spawn { agent: id, source })?;
            agents.push(agent);
        }
        info!(
            agents = agents.len(),
            sources = field.len(),
            training = config.training,
            "foraging arena ready"
        );

        let n = agents.len();
        Ok(Self {
            agents,
            field,
            config,
            rng,
            step_index: 0,
            touching_boundary: vec![false; n],
            last_rewards: vec![0.0; n],
            feeds_last_step: 0,
            episodes_completed: 0,
            finished: Vec::new(),
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn field(&self) -> &ResourceField {
        &self.field
    }

    pub fn field_mut(&mut self) -> &mut ResourceField {
        &mut self.field
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    /// Reward each agent received on the last step.
    pub fn last_rewards(&self) -> &[f32] {
        &self.last_rewards
    }

    pub fn episodes_completed(&self) -> usize {
        self.episodes_completed
    }

    /// Episodes finished since the last call.
    pub fn take_finished_episodes(&mut self) -> Vec<EpisodeSummary> {
        std::mem::take(&mut self.finished)
    }

    /// One fixed step for every agent, in id order.
    pub fn step<P: Policy + ?Sized>(&mut self, policy: &mut P) {
        self.step_index += 1;
        self.feeds_last_step = 0;
        let dt = self.config.dt;

        for i in 0..self.agents.len() {
            let agent = &mut self.agents[i];
            agent.fixed_update(&self.field);
            let observation = agent.collect_observations(&self.field);
            let mut actions: Action = [0.0; ACTION_WIDTH];
            policy.act(&observation, &mut actions);
            agent.on_action_received(&actions, dt);
            agent.body.integrate(dt);

            push_out_of_flowers(agent, &self.field);
            let touching = clamp_to_boundary(agent, &self.field);
            if touching {
                let phase = Contact::phase_for(self.touching_boundary[i]);
                let point = agent.body.position;
                agent.on_contact(
                    &mut self.field,
                    Contact::new(ContactSubject::Boundary, phase, point),
                );
            }
            self.touching_boundary[i] = touching;

            for contact in feeding_contacts(agent, &self.field) {
                if agent.on_contact(&mut self.field, contact) > 0.0 {
                    self.feeds_last_step += 1;
                }
            }

            self.last_rewards[i] = agent.episode_mut().finish_step();
            if agent.episode().is_done() {
                self.restart_episode(i);
            }
        }
    }

    fn restart_episode(&mut self, i: usize) {
        let agent = &self.agents[i];
        let summary = EpisodeSummary {
            agent: i,
            step: self.step_index,
            steps: agent.episode().step_count(),
            cumulative_reward: agent.episode().cumulative_reward(),
            nectar_obtained: agent.nectar_obtained(),
            reason: agent
                .episode()
                .ended()
                .unwrap_or(EndReason::MaxStepReached),
        };
        debug!(
            agent = i,
            reward = summary.cumulative_reward,
            nectar = summary.nectar_obtained,
            "episode finished"
        );
        self.finished.push(summary);
        self.episodes_completed += 1;

        let occupants = other_bodies(&self.agents, i);
        self.agents[i].begin_episode(&mut self.field, &occupants, &mut self.rng);
        self.touching_boundary[i] = false;
    }

    pub fn run_experiment<P: Policy + ?Sized>(
        &mut self,
        policy: &mut P,
        steps: usize,
        sample_every: usize,
    ) -> RunSummary {
        self.try_run_experiment(policy, steps, sample_every)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_run_experiment<P: Policy + ?Sized>(
        &mut self,
        policy: &mut P,
        steps: usize,
        sample_every: usize,
    ) -> Result<RunSummary, ExperimentError> {
        let estimated_samples = validate_experiment(steps, sample_every)?;

        self.finished.clear();
        let mut samples = Vec::with_capacity(estimated_samples);
        for step in 1..=steps {
            self.step(policy);
            if step % sample_every == 0 || step == steps {
                samples.push(self.collect_step_metrics(step));
            }
        }
        Ok(RunSummary {
            schema_version: 1,
            seed: self.config.seed,
            steps,
            sample_every,
            final_active_sources: self.field.active_count(),
            samples,
            episodes: self.take_finished_episodes(),
        })
    }
}

/// Flower bodies are solid: move the agent out and drop its inward velocity.
fn push_out_of_flowers(agent: &mut ForagingAgent, field: &ResourceField) {
    let radius = agent.config().body_radius;
    for source in field.sources().iter().filter(|s| s.body_enabled()) {
        let offset = agent.body.position - source.position();
        let min_distance = radius + source.body_radius();
        let distance = offset.length();
        if distance >= min_distance {
            continue;
        }
        let normal = if distance > 0.0 {
            offset / distance
        } else {
            source.outward()
        };
        agent.body.position = source.position() + normal * min_distance;
        let inward = agent.body.velocity.dot(normal);
        if inward < 0.0 {
            agent.body.velocity -= normal * inward;
        }
    }
}

/// Keep the body inside the field cylinder. Returns whether it touched the wall.
fn clamp_to_boundary(agent: &mut ForagingAgent, field: &ResourceField) -> bool {
    let radius = agent.config().body_radius;
    let center = field.center();
    let body = &mut agent.body;
    let mut touching = false;

    let limit = (field.diameter() / 2.0 - radius).max(0.0);
    let horizontal = Vec3::new(body.position.x - center.x, 0.0, body.position.z - center.z);
    let distance = horizontal.length();
    if distance > limit {
        let normal = horizontal / distance;
        body.position.x = center.x + normal.x * limit;
        body.position.z = center.z + normal.z * limit;
        let outward = body.velocity.dot(normal);
        if outward > 0.0 {
            body.velocity -= normal * outward;
        }
        touching = true;
    }

    let floor = center.y + radius;
    let ceiling = center.y + field.height() - radius;
    if body.position.y < floor {
        body.position.y = floor;
        body.velocity.y = body.velocity.y.max(0.0);
        touching = true;
    } else if body.position.y > ceiling {
        body.position.y = ceiling;
        body.velocity.y = body.velocity.y.min(0.0);
        touching = true;
    }
    touching
}

/// Feeding triggers overlapped by the body sphere or the beak tip.
fn feeding_contacts(agent: &ForagingAgent, field: &ResourceField) -> Vec<Contact> {
    let beak = agent.beak_tip();
    let body = agent.body.position;
    let radius = agent.config().body_radius;
    field
        .sources()
        .iter()
        .filter(|s| s.feeding_enabled())
        .filter(|s| {
            let center = s.feeding_point();
            body.distance(center) < radius + s.feeding_radius()
                || beak.distance(center) < s.feeding_radius()
        })
        // Enter and stay are handled alike.
        .map(|s| Contact::feeding(s.handle(), ContactPhase::Stay, s.closest_feeding_point(beak)))
        .collect()
}
