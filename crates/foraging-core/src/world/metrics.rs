use super::ForagingArena;
use crate::config::GoalVariant;
use crate::episode::EndReason;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StepMetrics {
    pub step: usize,
    pub active_sources: usize,
    pub nectar_remaining: f32,
    /// Nectar drunk by all agents in their current episodes.
    pub nectar_obtained_total: f32,
    pub mean_step_reward: f32,
    pub mean_cumulative_reward: f32,
    pub episodes_completed: usize,
    pub boundary_contacts: usize,
    pub feeds_last_step: usize,
    /// Mean beak-to-target distance over agents that have a target.
    pub mean_target_distance: f32,
    pub agents_without_target: usize,
}

/// One finished foraging episode.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub agent: usize,
    /// Arena step on which the episode ended.
    pub step: usize,
    pub steps: u32,
    pub cumulative_reward: f32,
    pub nectar_obtained: f32,
    pub reason: EndReason,
}

fn default_schema_version() -> u32 {
    1
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub seed: u64,
    pub steps: usize,
    pub sample_every: usize,
    pub final_active_sources: usize,
    pub samples: Vec<StepMetrics>,
    #[serde(default)]
    pub episodes: Vec<EpisodeSummary>,
}

impl RunSummary {
    pub fn mean_episode_nectar(&self) -> f32 {
        if self.episodes.is_empty() {
            return 0.0;
        }
        self.episodes.iter().map(|e| e.nectar_obtained).sum::<f32>() / self.episodes.len() as f32
    }
}

/// One finished move-to-goal round.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GoalEpisodeSummary {
    pub step: usize,
    pub steps: u32,
    pub cumulative_reward: f32,
    pub reason: EndReason,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GoalRunSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub variant: GoalVariant,
    pub seed: u64,
    pub steps: usize,
    pub wins: usize,
    pub losses: usize,
    pub timeouts: usize,
    #[serde(default)]
    pub episodes: Vec<GoalEpisodeSummary>,
}

impl GoalRunSummary {
    pub(crate) fn tally(&mut self) {
        let count =
            |reason: EndReason| self.episodes.iter().filter(|e| e.reason == reason).count();
        self.wins = count(EndReason::Succeeded);
        self.losses = count(EndReason::Failed);
        self.timeouts = count(EndReason::MaxStepReached);
    }
}

impl ForagingArena {
    pub(crate) fn collect_step_metrics(&self, step: usize) -> StepMetrics {
        let n = self.agents.len();
        let denom = n.max(1) as f32;

        let mut step_reward_sum = 0.0f32;
        let mut cumulative_sum = 0.0f32;
        let mut nectar_sum = 0.0f32;
        let mut distance_sum = 0.0f32;
        let mut targeted = 0usize;
        for (agent, &reward) in self.agents.iter().zip(&self.last_rewards) {
            step_reward_sum += reward;
            cumulative_sum += agent.episode().cumulative_reward();
            nectar_sum += agent.nectar_obtained();
            if let Some(idx) = agent.nearest() {
                distance_sum += self
                    .field
                    .source(idx)
                    .feeding_point()
                    .distance(agent.beak_tip());
                targeted += 1;
            }
        }

        StepMetrics {
            step,
            active_sources: self.field.active_count(),
            nectar_remaining: self.field.total_nectar(),
            nectar_obtained_total: nectar_sum,
            mean_step_reward: step_reward_sum / denom,
            mean_cumulative_reward: cumulative_sum / denom,
            episodes_completed: self.episodes_completed,
            boundary_contacts: self.touching_boundary.iter().filter(|&&t| t).count(),
            feeds_last_step: self.feeds_last_step,
            mean_target_distance: if targeted > 0 {
                distance_sum / targeted as f32
            } else {
                0.0
            },
            agents_without_target: n - targeted,
        }
    }
}
