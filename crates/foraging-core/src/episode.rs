use serde::{Deserialize, Serialize};

/// Why an episode stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The agent finished the task (goal reached).
    Succeeded,
    /// The agent failed the task (wall hit, time out).
    Failed,
    /// The step budget ran out.
    MaxStepReached,
}

/// Reward bookkeeping for one agent, mirroring what a trainer consumes:
/// a per-step reward, the episode's cumulative reward, and episode boundaries.
#[derive(Clone, Debug, Default)]
pub struct Episode {
    /// Step budget (0 = unbounded).
    pub max_steps: u32,
    step_count: u32,
    step_reward: f32,
    cumulative_reward: f32,
    completed: u32,
    ended: Option<EndReason>,
}

impl Episode {
    pub fn new(max_steps: u32) -> Self {
        Self {
            max_steps,
            ..Self::default()
        }
    }

    /// Start a fresh episode. Pending step reward is discarded.
    pub fn begin(&mut self) {
        self.step_count = 0;
        self.step_reward = 0.0;
        self.cumulative_reward = 0.0;
        self.ended = None;
    }

    pub fn add_reward(&mut self, reward: f32) {
        self.step_reward += reward;
        self.cumulative_reward += reward;
    }

    /// Replace whatever reward this step has accrued so far.
    pub fn set_reward(&mut self, reward: f32) {
        self.cumulative_reward += reward - self.step_reward;
        self.step_reward = reward;
    }

    pub fn end(&mut self, reason: EndReason) {
        if self.ended.is_none() {
            self.ended = Some(reason);
            self.completed += 1;
        }
    }

    /// Close out a step: counts it against the budget and hands back its reward.
    pub fn finish_step(&mut self) -> f32 {
        self.step_count += 1;
        if self.max_steps > 0 && self.step_count >= self.max_steps {
            self.end(EndReason::MaxStepReached);
        }
        std::mem::take(&mut self.step_reward)
    }

    pub fn step_count(&self) -> u32 {
        self.step_count
    }

    pub fn step_reward(&self) -> f32 {
        self.step_reward
    }

    pub fn cumulative_reward(&self) -> f32 {
        self.cumulative_reward
    }

    pub fn completed(&self) -> u32 {
        self.completed
    }

    pub fn ended(&self) -> Option<EndReason> {
        self.ended
    }

    pub fn is_done(&self) -> bool {
        self.ended.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_reward_replaces_step_contribution() {
        let mut ep = Episode::new(0);
        ep.add_reward(0.5);
        ep.finish_step();
        ep.add_reward(-0.2);
        ep.set_reward(1.0);
        assert_eq!(ep.step_reward(), 1.0);
        assert!((ep.cumulative_reward() - 1.5).abs() < 1e-6);
    }

    #[test]
    fn budget_ends_episode() {
        let mut ep = Episode::new(3);
        ep.finish_step();
        ep.finish_step();
        assert!(!ep.is_done());
        ep.finish_step();
        assert_eq!(ep.ended(), Some(EndReason::MaxStepReached));
        assert_eq!(ep.completed(), 1);
    }

    #[test]
    fn unbounded_budget_never_ends() {
        let mut ep = Episode::new(0);
        for _ in 0..10_000 {
            ep.finish_step();
        }
        assert!(!ep.is_done());
    }

    #[test]
    fn first_end_reason_wins() {
        let mut ep = Episode::new(1);
        ep.end(EndReason::Succeeded);
        ep.finish_step();
        assert_eq!(ep.ended(), Some(EndReason::Succeeded));
        assert_eq!(ep.completed(), 1);
        ep.begin();
        assert!(!ep.is_done());
        assert_eq!(ep.cumulative_reward(), 0.0);
    }
}
