use super::{ExperimentError, GoalEpisodeSummary, GoalRunSummary, MAX_EXPERIMENT_STEPS};
use crate::agent::goal::{GoalScene, GoalSeekingAgent};
use crate::config::{ConfigError, GoalConfig};
use crate::contact::{Contact, ContactSubject};
use crate::episode::EndReason;
use crate::policy::Policy;
use crate::rng::create_rng;
use glam::Vec2;
use rand_chacha::ChaCha12Rng;
use tracing::{debug, info};

/// Planar arena driving one [`GoalSeekingAgent`]: moves it, resolves walls
/// and the goal trigger, and restarts finished rounds.
pub struct GoalArena {
    pub agent: GoalSeekingAgent,
    pub scene: GoalScene,
    rng: ChaCha12Rng,
    step_index: usize,
    touching_wall: bool,
    touching_boundary: bool,
    touching_goal: bool,
    last_reward: f32,
    finished: Vec<GoalEpisodeSummary>,
}

impl GoalArena {
    pub fn new(config: GoalConfig) -> Self {
        Self::try_new(config).unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_new(config: GoalConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut rng = create_rng(config.seed);
        let mut scene = GoalScene::from_config(&config);
        let mut agent = GoalSeekingAgent::new(config);
        agent.begin_episode(&mut scene, &mut rng);
        info!(variant = ?agent.variant(), walls = scene.obstacles.len(), "goal arena ready");
        Ok(Self {
            agent,
            scene,
            rng,
            step_index: 0,
            touching_wall: false,
            touching_boundary: false,
            touching_goal: false,
            last_reward: 0.0,
            finished: Vec::new(),
        })
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn last_reward(&self) -> f32 {
        self.last_reward
    }

    pub fn take_finished_episodes(&mut self) -> Vec<GoalEpisodeSummary> {
        std::mem::take(&mut self.finished)
    }

    pub fn step<P: Policy + ?Sized>(&mut self, policy: &mut P) {
        self.step_index += 1;
        let cfg = self.agent.config();
        let dt = cfg.dt;
        let radius = cfg.agent_radius;
        let goal_radius = cfg.goal_radius;

        let observation = self.agent.collect_observations(&self.scene);
        let mut actions = vec![0.0f32; self.agent.variant().action_width()];
        policy.act(&observation, &mut actions);
        self.agent.on_action_received(&actions, dt, &self.scene);

        let mut touching_wall = false;
        for obstacle in &self.scene.obstacles {
            if let Some(push) = obstacle.penetration(self.agent.position, radius) {
                self.agent.position += push;
                touching_wall = true;
            }
        }
        let touching_boundary = self.clamp_to_perimeter(radius);
        let touching_goal = self.agent.position.distance(self.scene.goal) < radius + goal_radius;

        if touching_wall {
            let phase = Contact::phase_for(self.touching_wall);
            self.agent.on_contact(ContactSubject::Wall, phase, &self.scene);
        }
        if touching_boundary {
            let phase = Contact::phase_for(self.touching_boundary);
            self.agent.on_contact(ContactSubject::Boundary, phase, &self.scene);
        }
        if touching_goal {
            let phase = Contact::phase_for(self.touching_goal);
            self.agent.on_contact(ContactSubject::Goal, phase, &self.scene);
        }
        self.touching_wall = touching_wall;
        self.touching_boundary = touching_boundary;
        self.touching_goal = touching_goal;

        self.agent.tick(dt, &self.scene);
        self.last_reward = self.agent.episode_mut().finish_step();
        if self.agent.episode().is_done() {
            self.restart_episode();
        }
    }

    /// Keep the agent inside the square arena. Returns whether it touched the edge.
    fn clamp_to_perimeter(&mut self, radius: f32) -> bool {
        let limit = (self.scene.half_size - radius).max(0.0);
        let clamped = self.agent.position.clamp(Vec2::splat(-limit), Vec2::splat(limit));
        let touching = clamped != self.agent.position;
        self.agent.position = clamped;
        touching
    }

    fn restart_episode(&mut self) {
        let episode = self.agent.episode();
        let summary = GoalEpisodeSummary {
            step: self.step_index,
            steps: episode.step_count(),
            cumulative_reward: episode.cumulative_reward(),
            reason: episode.ended().unwrap_or(EndReason::MaxStepReached),
        };
        debug!(reason = ?summary.reason, reward = summary.cumulative_reward, "round finished");
        self.finished.push(summary);
        self.agent.begin_episode(&mut self.scene, &mut self.rng);
        self.touching_wall = false;
        self.touching_boundary = false;
        self.touching_goal = false;
    }

    pub fn run_experiment<P: Policy + ?Sized>(
        &mut self,
        policy: &mut P,
        steps: usize,
    ) -> GoalRunSummary {
        self.try_run_experiment(policy, steps)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_run_experiment<P: Policy + ?Sized>(
        &mut self,
        policy: &mut P,
        steps: usize,
    ) -> Result<GoalRunSummary, ExperimentError> {
        if steps > MAX_EXPERIMENT_STEPS {
            return Err(ExperimentError::TooManySteps {
                max: MAX_EXPERIMENT_STEPS,
                actual: steps,
            });
        }
        self.finished.clear();
        for _ in 0..steps {
            self.step(policy);
        }
        let mut summary = GoalRunSummary {
            schema_version: 1,
            variant: self.agent.variant(),
            seed: self.agent.config().seed,
            steps,
            wins: 0,
            losses: 0,
            timeouts: 0,
            episodes: self.take_finished_episodes(),
        };
        summary.tally();
        Ok(summary)
    }
}
