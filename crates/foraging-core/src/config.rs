use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::{error::Error, fmt};

/// Layout of the procedurally generated flower field.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FieldConfig {
    /// World-space center of the field floor.
    pub center: Vec3,
    /// Diameter of the cylindrical field boundary. Also normalizes the distance observation.
    pub diameter: f32,
    /// Ceiling height of the field boundary.
    pub height: f32,
    /// Number of flower plants scattered over the field.
    pub plant_count: usize,
    /// Flowers carried by each plant.
    pub flowers_per_plant: usize,
    /// Minimum distance of a plant from the field center.
    pub plant_min_radius: f32,
    /// Maximum distance of a plant from the field center.
    pub plant_max_radius: f32,
    /// Height of the flower heads above the plant base.
    pub flower_height: f32,
    /// Horizontal spread of flower heads around the plant stem.
    pub flower_spread: f32,
    /// Radius of the solid flower body collider.
    pub body_radius: f32,
    /// Radius of the nectar (feeding) trigger collider.
    pub feeding_radius: f32,
    /// Offset of the feeding point from the flower origin along its outward axis.
    pub feeding_depth: f32,
    /// Max tilt jitter (degrees) applied to plants on the two horizontal axes at reset.
    pub tilt_jitter_degrees: f32,
    /// Max heading jitter (degrees) applied to plants on the vertical axis at reset.
    pub heading_jitter_degrees: f32,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            center: Vec3::ZERO,
            diameter: 20.0,
            height: 5.0,
            plant_count: 6,
            flowers_per_plant: 3,
            plant_min_radius: 1.5,
            plant_max_radius: 7.5,
            flower_height: 1.6,
            flower_spread: 0.25,
            body_radius: 0.06,
            feeding_radius: 0.02,
            feeding_depth: 0.05,
            tilt_jitter_degrees: 5.0,
            heading_jitter_degrees: 180.0,
        }
    }
}

/// Tunables of the hummingbird forager.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ForagerConfig {
    /// Scale applied to the 3-axis movement action before it becomes a force.
    pub move_force: f32,
    /// Degrees per second at a full pitch command.
    pub pitch_speed: f32,
    /// Degrees per second at a full yaw command.
    pub yaw_speed: f32,
    /// Pitch clamp in degrees.
    pub max_pitch_degrees: f32,
    /// Per-second limit on how fast the smoothed pitch/yaw rates may change.
    pub rate_smoothing: f32,
    /// Body mass used when integrating forces.
    pub mass: f32,
    /// Linear drag coefficient.
    pub drag: f32,
    /// Radius of the agent's body sphere.
    pub body_radius: f32,
    /// Beak tip position in the agent's local frame.
    pub beak_tip_offset: Vec3,
    /// A feeding contact only counts within this distance of the beak tip.
    pub beak_tip_radius: f32,
    /// Nectar withdrawn per feeding step.
    pub nectar_per_feed: f32,
    /// Scale of the facing bonus added to the feeding reward.
    pub facing_bonus: f32,
    /// Penalty (positive number, subtracted) for touching the field boundary.
    pub boundary_penalty: f32,
    /// Spawn placement retry budget.
    pub spawn_attempts: usize,
    /// Radius of the sphere probed for overlaps when placing the agent.
    pub spawn_probe_radius: f32,
    /// Standoff range from a flower when spawning in front of it.
    pub spawn_standoff: Vec2,
    /// Height range for free spawns.
    pub spawn_height: Vec2,
    /// Radius range (from the field center) for free spawns.
    pub spawn_radius: Vec2,
    /// Pitch range in degrees for free spawns.
    pub spawn_pitch_degrees: Vec2,
}

impl Default for ForagerConfig {
    fn default() -> Self {
        Self {
            move_force: 2.0,
            pitch_speed: 100.0,
            yaw_speed: 100.0,
            max_pitch_degrees: 80.0,
            rate_smoothing: 2.0,
            mass: 1.0,
            drag: 2.0,
            body_radius: 0.04,
            beak_tip_offset: Vec3::new(0.0, 0.0, 0.08),
            beak_tip_radius: 0.008,
            nectar_per_feed: 0.01,
            facing_bonus: 0.02,
            boundary_penalty: 0.5,
            spawn_attempts: 100,
            spawn_probe_radius: 0.05,
            spawn_standoff: Vec2::new(0.1, 0.2),
            spawn_height: Vec2::new(1.2, 2.5),
            spawn_radius: Vec2::new(2.0, 7.0),
            spawn_pitch_degrees: Vec2::new(-60.0, 60.0),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Deterministic seed for reproducible runs.
    pub seed: u64,
    /// Fixed simulation step in seconds.
    pub dt: f32,
    /// Episodic, reward-driven mode. When false the arena runs one continuous episode.
    pub training: bool,
    /// Agents sharing the field.
    pub num_agents: usize,
    /// Step budget per episode in training mode (0 = unbounded).
    pub max_steps: u32,
    pub field: FieldConfig,
    pub forager: ForagerConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            dt: 0.02,
            training: true,
            num_agents: 1,
            max_steps: 5000,
            field: FieldConfig::default(),
            forager: ForagerConfig::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GoalVariant {
    /// Open floor, relative-position observation, walls end the episode.
    #[default]
    Open,
    /// Maze with sliding walls, direction + distance observation.
    Maze,
    /// Maze with scattered rotating walls and a turning agent.
    RotatingMaze,
}

impl GoalVariant {
    pub fn observation_width(self) -> usize {
        match self {
            GoalVariant::Open => 3,
            GoalVariant::Maze | GoalVariant::RotatingMaze => 4,
        }
    }

    pub fn action_width(self) -> usize {
        match self {
            GoalVariant::Open | GoalVariant::Maze => 2,
            GoalVariant::RotatingMaze => 3,
        }
    }
}

/// Configuration for the planar move-to-goal arenas.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalConfig {
    pub seed: u64,
    pub dt: f32,
    pub variant: GoalVariant,
    /// Step budget per episode (0 = unbounded).
    pub max_steps: u32,
    /// Half extent of the square arena floor.
    pub arena_half_size: f32,
    pub move_speed: f32,
    /// Degrees per second at a full rotate command.
    pub rotate_speed: f32,
    pub agent_radius: f32,
    pub goal_radius: f32,
    /// Terminal reward magnitude.
    pub reward: f32,
    /// Existential cost subtracted every step.
    pub step_penalty: f32,
    /// Scale of the facing shaping reward (rotating maze only).
    pub facing_reward: f32,
    /// Penalty per step spent touching a wall (maze variants).
    pub wall_contact_penalty: f32,
    /// Place agent and goal uniformly in their ranges instead of the fixed start poses.
    pub randomize_positioning: bool,
    pub initial_agent_position: Vec2,
    pub initial_goal_position: Vec2,
    pub agent_range_x: Vec2,
    pub agent_range_z: Vec2,
    pub goal_range_x: Vec2,
    pub goal_range_z: Vec2,
    /// Minimum agent-to-goal distance enforced by the rotating maze.
    pub min_goal_distance: f32,
    /// Inner walls as (center x, center z, half width, half depth).
    pub walls: Vec<[f32; 4]>,
    pub wall_range_x: Vec2,
    pub wall_range_z: Vec2,
    /// Episode time limit in seconds for the open variant (0 = disabled).
    pub countdown_seconds: f32,
}

impl Default for GoalConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            dt: 0.02,
            variant: GoalVariant::Open,
            max_steps: 5000,
            arena_half_size: 10.0,
            move_speed: 1.0,
            rotate_speed: 90.0,
            agent_radius: 0.5,
            goal_radius: 0.5,
            reward: 1.0,
            step_penalty: 0.0002,
            facing_reward: 0.0002,
            wall_contact_penalty: 0.001,
            randomize_positioning: true,
            initial_agent_position: Vec2::new(0.0, -4.0),
            initial_goal_position: Vec2::new(0.0, 4.0),
            agent_range_x: Vec2::new(-8.0, 8.0),
            agent_range_z: Vec2::new(-8.0, -2.0),
            goal_range_x: Vec2::new(-8.0, 8.0),
            goal_range_z: Vec2::new(2.0, 8.0),
            min_goal_distance: 5.0,
            walls: vec![[0.0, 0.0, 3.0, 0.25]],
            wall_range_x: Vec2::new(-5.0, 5.0),
            wall_range_z: Vec2::new(-5.0, 5.0),
            countdown_seconds: 0.0,
        }
    }
}

impl GoalConfig {
    /// Defaults tuned per arena layout.
    pub fn for_variant(variant: GoalVariant) -> Self {
        let base = Self {
            variant,
            ..Self::default()
        };
        match variant {
            GoalVariant::Open => Self {
                walls: Vec::new(),
                countdown_seconds: 30.0,
                ..base
            },
            GoalVariant::Maze => base,
            GoalVariant::RotatingMaze => Self {
                wall_contact_penalty: 0.0005,
                agent_range_z: Vec2::new(-8.0, 8.0),
                goal_range_z: Vec2::new(-8.0, 8.0),
                walls: vec![[0.0, 0.0, 2.0, 0.25], [0.0, 0.0, 2.0, 0.25]],
                ..base
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidDt,
    InvalidFieldDiameter,
    InvalidFieldHeight,
    InvalidPlantRadius,
    InvalidColliderRadius,
    InvalidFieldScale(&'static str),
    NoAgents,
    InvalidForagerScale(&'static str),
    InvalidRange(&'static str),
    NoSpawnAttempts,
    InvalidArenaSize,
    InvalidGoalScale(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidDt => write!(f, "dt must be positive and finite"),
            ConfigError::InvalidFieldDiameter => {
                write!(f, "field.diameter must be positive and finite")
            }
            ConfigError::InvalidFieldHeight => {
                write!(f, "field.height must be positive and finite")
            }
            ConfigError::InvalidPlantRadius => write!(
                f,
                "plant radii must satisfy 0 <= plant_min_radius <= plant_max_radius < diameter / 2"
            ),
            ConfigError::InvalidColliderRadius => {
                write!(f, "collider radii must be positive and finite")
            }
            ConfigError::InvalidFieldScale(name) => {
                write!(f, "field.{name} must be finite and non-negative")
            }
            ConfigError::NoAgents => write!(f, "num_agents must be greater than 0"),
            ConfigError::InvalidForagerScale(name) => {
                write!(f, "forager.{name} must be finite and non-negative")
            }
            ConfigError::InvalidRange(name) => {
                write!(f, "{name} must be a finite range with min <= max")
            }
            ConfigError::NoSpawnAttempts => {
                write!(f, "forager.spawn_attempts must be greater than 0")
            }
            ConfigError::InvalidArenaSize => {
                write!(f, "arena_half_size must be positive and finite")
            }
            ConfigError::InvalidGoalScale(name) => {
                write!(f, "{name} must be finite and non-negative")
            }
        }
    }
}

impl Error for ConfigError {}

fn positive_finite(v: f32) -> bool {
    v.is_finite() && v > 0.0
}

fn non_negative_finite(v: f32) -> bool {
    v.is_finite() && v >= 0.0
}

fn valid_range(r: Vec2) -> bool {
    r.is_finite() && r.x <= r.y
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !positive_finite(self.dt) {
            return Err(ConfigError::InvalidDt);
        }
        if self.num_agents == 0 {
            return Err(ConfigError::NoAgents);
        }
        self.field.validate()?;
        self.forager.validate()
    }
}

impl FieldConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !positive_finite(self.diameter) {
            return Err(ConfigError::InvalidFieldDiameter);
        }
        if !positive_finite(self.height) {
            return Err(ConfigError::InvalidFieldHeight);
        }
        if !non_negative_finite(self.plant_min_radius)
            || !self.plant_max_radius.is_finite()
            || self.plant_min_radius > self.plant_max_radius
            || self.plant_max_radius >= self.diameter / 2.0
        {
            return Err(ConfigError::InvalidPlantRadius);
        }
        if !positive_finite(self.body_radius) || !positive_finite(self.feeding_radius) {
            return Err(ConfigError::InvalidColliderRadius);
        }
        if !self.center.is_finite() {
            return Err(ConfigError::InvalidRange("field.center"));
        }
        let scales = [
            ("flower_spread", self.flower_spread),
            ("tilt_jitter_degrees", self.tilt_jitter_degrees),
            ("heading_jitter_degrees", self.heading_jitter_degrees),
        ];
        if let Some((name, _)) = scales.iter().find(|(_, v)| !non_negative_finite(*v)) {
            return Err(ConfigError::InvalidFieldScale(*name));
        }
        // Offsets along an axis; either sign is fine.
        if !self.flower_height.is_finite() {
            return Err(ConfigError::InvalidRange("field.flower_height"));
        }
        if !self.feeding_depth.is_finite() {
            return Err(ConfigError::InvalidRange("field.feeding_depth"));
        }
        Ok(())
    }
}

impl ForagerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let scales = [
            ("move_force", self.move_force),
            ("pitch_speed", self.pitch_speed),
            ("yaw_speed", self.yaw_speed),
            ("max_pitch_degrees", self.max_pitch_degrees),
            ("rate_smoothing", self.rate_smoothing),
            ("drag", self.drag),
            ("beak_tip_radius", self.beak_tip_radius),
            ("nectar_per_feed", self.nectar_per_feed),
            ("facing_bonus", self.facing_bonus),
            ("boundary_penalty", self.boundary_penalty),
            ("spawn_probe_radius", self.spawn_probe_radius),
        ];
        if let Some((name, _)) = scales.iter().find(|(_, v)| !non_negative_finite(*v)) {
            return Err(ConfigError::InvalidForagerScale(*name));
        }
        if !positive_finite(self.mass) {
            return Err(ConfigError::InvalidForagerScale("mass"));
        }
        if !positive_finite(self.body_radius) {
            return Err(ConfigError::InvalidColliderRadius);
        }
        if self.max_pitch_degrees >= 90.0 {
            return Err(ConfigError::InvalidForagerScale("max_pitch_degrees"));
        }
        if self.spawn_attempts == 0 {
            return Err(ConfigError::NoSpawnAttempts);
        }
        let ranges = [
            ("forager.spawn_standoff", self.spawn_standoff),
            ("forager.spawn_height", self.spawn_height),
            ("forager.spawn_radius", self.spawn_radius),
            ("forager.spawn_pitch_degrees", self.spawn_pitch_degrees),
        ];
        if let Some((name, _)) = ranges.iter().find(|(_, r)| !valid_range(*r)) {
            return Err(ConfigError::InvalidRange(*name));
        }
        if !self.beak_tip_offset.is_finite() {
            return Err(ConfigError::InvalidRange("forager.beak_tip_offset"));
        }
        Ok(())
    }
}

impl GoalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !positive_finite(self.dt) {
            return Err(ConfigError::InvalidDt);
        }
        if !positive_finite(self.arena_half_size) {
            return Err(ConfigError::InvalidArenaSize);
        }
        if !positive_finite(self.agent_radius) || !positive_finite(self.goal_radius) {
            return Err(ConfigError::InvalidColliderRadius);
        }
        let scales = [
            ("move_speed", self.move_speed),
            ("rotate_speed", self.rotate_speed),
            ("reward", self.reward),
            ("step_penalty", self.step_penalty),
            ("facing_reward", self.facing_reward),
            ("wall_contact_penalty", self.wall_contact_penalty),
            ("min_goal_distance", self.min_goal_distance),
            ("countdown_seconds", self.countdown_seconds),
        ];
        if let Some((name, _)) = scales.iter().find(|(_, v)| !non_negative_finite(*v)) {
            return Err(ConfigError::InvalidGoalScale(*name));
        }
        let ranges = [
            ("agent_range_x", self.agent_range_x),
            ("agent_range_z", self.agent_range_z),
            ("goal_range_x", self.goal_range_x),
            ("goal_range_z", self.goal_range_z),
            ("wall_range_x", self.wall_range_x),
            ("wall_range_z", self.wall_range_z),
        ];
        if let Some((name, _)) = ranges.iter().find(|(_, r)| !valid_range(*r)) {
            return Err(ConfigError::InvalidRange(*name));
        }
        if !self.initial_agent_position.is_finite() || !self.initial_goal_position.is_finite() {
            return Err(ConfigError::InvalidRange("initial positions"));
        }
        if self
            .walls
            .iter()
            .any(|w| w.iter().any(|v| !v.is_finite()) || w[2] <= 0.0 || w[3] <= 0.0)
        {
            return Err(ConfigError::InvalidGoalScale("walls"));
        }
        Ok(())
    }
}
