pub mod forager;
pub mod goal;

pub use forager::{ForagingAgent, SpawnError};
pub use goal::{GoalScene, GoalSeekingAgent, Obstacle, RoundOutcome};
