use crate::config::{GoalConfig, GoalVariant};
use crate::contact::{ContactPhase, ContactSubject};
use crate::countdown::Countdown;
use crate::episode::{EndReason, Episode};
use glam::{Vec2, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Goal resampling gives up after this many draws and keeps the last one.
const GOAL_RESAMPLE_LIMIT: usize = 1000;

/// Oriented rectangle on the arena floor (x, z plane).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Obstacle {
    pub center: Vec2,
    pub half_extents: Vec2,
    pub yaw_degrees: f32,
}

impl Obstacle {
    pub fn new(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            center,
            half_extents,
            yaw_degrees: 0.0,
        }
    }

    fn to_local(&self, point: Vec2) -> Vec2 {
        let (s, c) = self.yaw_degrees.to_radians().sin_cos();
        let d = point - self.center;
        // Inverse of a clockwise-from-above yaw in x/z.
        Vec2::new(c * d.x - s * d.y, s * d.x + c * d.y)
    }

    fn to_world_dir(&self, local: Vec2) -> Vec2 {
        let (s, c) = self.yaw_degrees.to_radians().sin_cos();
        Vec2::new(c * local.x + s * local.y, -s * local.x + c * local.y)
    }

    /// Push-out vector for a circle overlapping the rectangle, if any.
    pub fn penetration(&self, point: Vec2, radius: f32) -> Option<Vec2> {
        let local = self.to_local(point);
        let clamped = local.clamp(-self.half_extents, self.half_extents);
        let offset = local - clamped;
        let dist = offset.length();
        if dist >= radius {
            return None;
        }
        let push = if dist > 0.0 {
            offset / dist * (radius - dist)
        } else {
            // Center inside: leave through the nearest face.
            let gap = self.half_extents - local.abs();
            if gap.x < gap.y {
                Vec2::new(local.x.signum() * (gap.x + radius), 0.0)
            } else {
                Vec2::new(0.0, local.y.signum() * (gap.y + radius))
            }
        };
        Some(self.to_world_dir(push))
    }
}

/// Everything in a goal arena that is not the agent.
#[derive(Clone, Debug)]
pub struct GoalScene {
    pub goal: Vec2,
    pub obstacles: Vec<Obstacle>,
    pub half_size: f32,
}

impl GoalScene {
    pub fn from_config(config: &GoalConfig) -> Self {
        Self {
            goal: config.initial_goal_position,
            obstacles: config
                .walls
                .iter()
                .map(|w| Obstacle::new(Vec2::new(w[0], w[1]), Vec2::new(w[2], w[3])))
                .collect(),
            half_size: config.arena_half_size,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundOutcome {
    Won,
    Lost,
}

/// Planar move-to-goal agent. Positions are (x, z) on the arena floor.
#[derive(Clone, Debug)]
pub struct GoalSeekingAgent {
    config: GoalConfig,
    pub position: Vec2,
    /// Heading in degrees, clockwise from +z seen from above.
    pub yaw_degrees: f32,
    episode: Episode,
    countdown: Countdown,
    first_round: bool,
    won_prev_round: bool,
    last_outcome: Option<RoundOutcome>,
}

fn sample_in<R: Rng + ?Sized>(rng: &mut R, x: Vec2, z: Vec2) -> Vec2 {
    Vec2::new(rng.random_range(x.x..=x.y), rng.random_range(z.x..=z.y))
}

impl GoalSeekingAgent {
    pub fn new(config: GoalConfig) -> Self {
        Self {
            position: config.initial_agent_position,
            yaw_degrees: 0.0,
            episode: Episode::new(config.max_steps),
            countdown: Countdown::new(config.countdown_seconds),
            first_round: true,
            won_prev_round: false,
            last_outcome: None,
            config,
        }
    }

    pub fn variant(&self) -> GoalVariant {
        self.config.variant
    }

    pub fn config(&self) -> &GoalConfig {
        &self.config
    }

    pub fn episode(&self) -> &Episode {
        &self.episode
    }

    pub fn episode_mut(&mut self) -> &mut Episode {
        &mut self.episode
    }

    /// Result of the previous round, shown by the arena between rounds.
    pub fn last_outcome(&self) -> Option<RoundOutcome> {
        self.last_outcome
    }

    pub fn forward(&self) -> Vec2 {
        let (s, c) = self.yaw_degrees.to_radians().sin_cos();
        Vec2::new(s, c)
    }

    fn direction_to_goal(&self, scene: &GoalScene) -> Vec2 {
        scene.goal - self.position
    }

    pub fn begin_episode<R: Rng + ?Sized>(&mut self, scene: &mut GoalScene, rng: &mut R) {
        if !self.first_round {
            self.last_outcome = Some(if self.won_prev_round {
                RoundOutcome::Won
            } else {
                RoundOutcome::Lost
            });
        }

        let cfg = &self.config;
        match cfg.variant {
            GoalVariant::Open => {}
            GoalVariant::Maze => {
                for wall in &mut scene.obstacles {
                    wall.center.x = rng.random_range(cfg.wall_range_x.x..=cfg.wall_range_x.y);
                }
            }
            GoalVariant::RotatingMaze => {
                for wall in &mut scene.obstacles {
                    wall.center = sample_in(rng, cfg.wall_range_x, cfg.wall_range_z);
                    wall.yaw_degrees = rng.random_range(0.0f32..360.0);
                }
            }
        }

        if cfg.variant == GoalVariant::RotatingMaze {
            self.position = sample_in(rng, cfg.agent_range_x, cfg.agent_range_z);
            scene.goal = sample_in(rng, cfg.goal_range_x, cfg.goal_range_z);
            let mut draws = 1;
            while self.position.distance(scene.goal) < cfg.min_goal_distance {
                if draws >= GOAL_RESAMPLE_LIMIT {
                    warn!(
                        draws,
                        min_goal_distance = cfg.min_goal_distance,
                        "goal resampling exhausted, keeping last draw"
                    );
                    break;
                }
                scene.goal = sample_in(rng, cfg.goal_range_x, cfg.goal_range_z);
                draws += 1;
            }
            self.yaw_degrees = rng.random_range(0.0f32..360.0);
        } else if cfg.randomize_positioning {
            self.position = sample_in(rng, cfg.agent_range_x, cfg.agent_range_z);
            scene.goal = sample_in(rng, cfg.goal_range_x, cfg.goal_range_z);
            self.yaw_degrees = 0.0;
        } else {
            self.position = cfg.initial_agent_position;
            scene.goal = cfg.initial_goal_position;
            self.yaw_degrees = 0.0;
        }

        self.countdown.reset();
        self.episode.begin();
        self.won_prev_round = false;
        self.first_round = false;
        debug!(variant = ?cfg.variant, goal = ?scene.goal, "goal episode started");
    }

    /// Open: goal offset (3). Maze variants: unit direction (3) plus distance (1).
    pub fn collect_observations(&self, scene: &GoalScene) -> Vec<f32> {
        let dir = self.direction_to_goal(scene);
        let dir3 = Vec3::new(dir.x, 0.0, dir.y);
        match self.config.variant {
            GoalVariant::Open => dir3.to_array().to_vec(),
            GoalVariant::Maze | GoalVariant::RotatingMaze => {
                let mut obs = dir3.normalize_or_zero().to_array().to_vec();
                obs.push(dir3.length());
                obs
            }
        }
    }

    /// Actions: move x, move z, and for the rotating maze a turn command.
    pub fn on_action_received(&mut self, actions: &[f32], dt: f32, scene: &GoalScene) {
        let cfg = &self.config;
        let get = |i: usize| actions.get(i).copied().unwrap_or(0.0);
        let (mut move_x, mut move_z) = (get(0), get(1));

        if cfg.variant == GoalVariant::RotatingMaze {
            move_x = move_x.clamp(-1.0, 1.0);
            move_z = move_z.clamp(-1.0, 1.0);
            let turn = get(2).clamp(-1.0, 1.0);
            self.yaw_degrees = (self.yaw_degrees + cfg.rotate_speed * dt * turn).rem_euclid(360.0);
        }
        self.position += cfg.move_speed * dt * Vec2::new(move_x, move_z);

        self.episode.add_reward(-cfg.step_penalty);

        if cfg.variant == GoalVariant::RotatingMaze {
            let dir = self.direction_to_goal(scene);
            let angle = if dir.length_squared() > 0.0 {
                self.forward().angle_to(dir).abs().to_degrees()
            } else {
                0.0
            };
            let shaping = (angle - 180.0) / (0.0 - 180.0);
            self.episode.add_reward(shaping * cfg.facing_reward);
        }
    }

    pub fn on_contact(&mut self, subject: ContactSubject, phase: ContactPhase, scene: &GoalScene) {
        match (subject, self.config.variant) {
            (ContactSubject::Goal, _) if phase == ContactPhase::Enter => self.win(),
            (ContactSubject::Wall | ContactSubject::Boundary, GoalVariant::Open) => {
                if phase == ContactPhase::Enter {
                    self.lose(scene);
                }
            }
            (ContactSubject::Wall | ContactSubject::Boundary, _) => {
                self.episode.add_reward(-self.config.wall_contact_penalty);
            }
            _ => {}
        }
    }

    /// Advance the episode timer; running out counts as a loss.
    pub fn tick(&mut self, dt: f32, scene: &GoalScene) {
        if self.countdown.tick(dt) && !self.episode.is_done() {
            debug!("countdown expired");
            self.lose(scene);
        }
    }

    pub fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    fn win(&mut self) {
        match self.config.variant {
            GoalVariant::Open => self.episode.set_reward(self.config.reward),
            GoalVariant::Maze | GoalVariant::RotatingMaze => {
                self.episode.add_reward(self.config.reward)
            }
        }
        self.won_prev_round = true;
        self.episode.end(EndReason::Succeeded);
    }

    fn lose(&mut self, scene: &GoalScene) {
        if self.config.variant == GoalVariant::Open {
            let distance = self.position.distance(scene.goal).max(f32::EPSILON);
            self.episode
                .set_reward(-self.config.reward + 1.0 / (distance * distance));
        }
        self.episode.end(EndReason::Failed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::create_rng;

    fn agent(variant: GoalVariant) -> (GoalSeekingAgent, GoalScene) {
        let config = GoalConfig::for_variant(variant);
        let scene = GoalScene::from_config(&config);
        (GoalSeekingAgent::new(config), scene)
    }

    #[test]
    fn step_costs_constant_existential_penalty() {
        let (mut a, scene) = agent(GoalVariant::Maze);
        for actions in [[0.0, 0.0], [1.0, 1.0], [-1.0, 0.3]] {
            a.on_action_received(&actions, 0.02, &scene);
            let r = a.episode_mut().finish_step();
            assert!((r + 0.0002).abs() < 1e-9, "reward {r}");
        }
    }

    #[test]
    fn open_observation_is_relative_goal_offset() {
        let (mut a, scene) = agent(GoalVariant::Open);
        a.position = Vec2::new(1.0, 2.0);
        let obs = a.collect_observations(&scene);
        assert_eq!(obs.len(), 3);
        assert_eq!(obs, vec![-1.0, 0.0, 2.0]);
    }

    #[test]
    fn maze_observation_is_direction_and_distance() {
        let (mut a, scene) = agent(GoalVariant::Maze);
        a.position = Vec2::new(0.0, 1.0);
        let obs = a.collect_observations(&scene);
        assert_eq!(obs.len(), 4);
        assert!((obs[2] - 1.0).abs() < 1e-6);
        assert!((obs[3] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn movement_scales_with_speed_and_dt() {
        let (mut a, scene) = agent(GoalVariant::Maze);
        a.position = Vec2::ZERO;
        a.on_action_received(&[1.0, -0.5], 0.5, &scene);
        assert_eq!(a.position, Vec2::new(0.5, -0.25));
    }

    #[test]
    fn rotating_maze_clamps_and_turns() {
        let (mut a, scene) = agent(GoalVariant::RotatingMaze);
        a.position = Vec2::ZERO;
        a.yaw_degrees = 0.0;
        a.on_action_received(&[5.0, 0.0, 2.0], 1.0, &scene);
        assert_eq!(a.position, Vec2::new(1.0, 0.0));
        assert!((a.yaw_degrees - 90.0).abs() < 1e-4);
    }

    #[test]
    fn facing_goal_earns_full_shaping() {
        let (mut a, mut scene) = agent(GoalVariant::RotatingMaze);
        a.position = Vec2::ZERO;
        a.yaw_degrees = 0.0;
        scene.goal = Vec2::new(0.0, 6.0);
        a.on_action_received(&[0.0, 0.0, 0.0], 0.02, &scene);
        // -0.0002 existential + 0.0002 facing.
        assert!(a.episode().step_reward().abs() < 1e-7);

        a.episode_mut().finish_step();
        scene.goal = Vec2::new(0.0, -6.0);
        a.on_action_received(&[0.0, 0.0, 0.0], 0.02, &scene);
        assert!((a.episode().step_reward() + 0.0002).abs() < 1e-7);
    }

    #[test]
    fn goal_ends_episode_with_reward() {
        let (mut a, scene) = agent(GoalVariant::Maze);
        a.on_action_received(&[0.0, 0.0], 0.02, &scene);
        a.on_contact(ContactSubject::Goal, ContactPhase::Enter, &scene);
        assert_eq!(a.episode().ended(), Some(EndReason::Succeeded));
        assert!((a.episode().step_reward() - 0.9998).abs() < 1e-6);
    }

    #[test]
    fn open_goal_sets_reward() {
        let (mut a, scene) = agent(GoalVariant::Open);
        a.on_action_received(&[0.0, 0.0], 0.02, &scene);
        a.on_contact(ContactSubject::Goal, ContactPhase::Enter, &scene);
        assert_eq!(a.episode().step_reward(), 1.0);
    }

    #[test]
    fn open_wall_loses_with_distance_consolation() {
        let (mut a, scene) = agent(GoalVariant::Open);
        a.position = scene.goal + Vec2::new(2.0, 0.0);
        a.on_contact(ContactSubject::Wall, ContactPhase::Enter, &scene);
        assert_eq!(a.episode().ended(), Some(EndReason::Failed));
        assert!((a.episode().step_reward() - (-1.0 + 0.25)).abs() < 1e-6);
    }

    #[test]
    fn maze_wall_contact_penalizes_without_ending() {
        let (mut a, scene) = agent(GoalVariant::Maze);
        a.on_contact(ContactSubject::Wall, ContactPhase::Enter, &scene);
        a.on_contact(ContactSubject::Wall, ContactPhase::Stay, &scene);
        assert!(!a.episode().is_done());
        assert!((a.episode().step_reward() + 0.002).abs() < 1e-7);
    }

    #[test]
    fn outcome_reported_from_second_round() {
        let (mut a, mut scene) = agent(GoalVariant::Maze);
        let mut rng = create_rng(4);
        a.begin_episode(&mut scene, &mut rng);
        assert_eq!(a.last_outcome(), None);
        a.on_contact(ContactSubject::Goal, ContactPhase::Enter, &scene);
        a.begin_episode(&mut scene, &mut rng);
        assert_eq!(a.last_outcome(), Some(RoundOutcome::Won));
        a.begin_episode(&mut scene, &mut rng);
        assert_eq!(a.last_outcome(), Some(RoundOutcome::Lost));
    }

    #[test]
    fn maze_walls_slide_along_x_only() {
        let (mut a, mut scene) = agent(GoalVariant::Maze);
        let z_before: Vec<f32> = scene.obstacles.iter().map(|o| o.center.y).collect();
        let mut rng = create_rng(12);
        a.begin_episode(&mut scene, &mut rng);
        let cfg = a.config().clone();
        for (wall, z) in scene.obstacles.iter().zip(z_before) {
            assert_eq!(wall.center.y, z);
            assert!(wall.center.x >= cfg.wall_range_x.x && wall.center.x <= cfg.wall_range_x.y);
            assert_eq!(wall.yaw_degrees, 0.0);
        }
    }

    #[test]
    fn rotating_maze_keeps_goal_away() {
        let (mut a, mut scene) = agent(GoalVariant::RotatingMaze);
        let mut rng = create_rng(30);
        for _ in 0..50 {
            a.begin_episode(&mut scene, &mut rng);
            assert!(a.position.distance(scene.goal) >= 5.0);
            assert!((0.0..360.0).contains(&a.yaw_degrees));
        }
    }

    #[test]
    fn unreachable_goal_distance_keeps_last_draw() {
        let config = GoalConfig {
            min_goal_distance: 1000.0,
            ..GoalConfig::for_variant(GoalVariant::RotatingMaze)
        };
        let mut scene = GoalScene::from_config(&config);
        let mut a = GoalSeekingAgent::new(config.clone());
        let mut rng = create_rng(11);

        let mut replay = rng.clone();
        for _ in &scene.obstacles {
            sample_in(&mut replay, config.wall_range_x, config.wall_range_z);
            replay.random_range(0.0f32..360.0);
        }
        let position = sample_in(&mut replay, config.agent_range_x, config.agent_range_z);
        let mut goal = Vec2::ZERO;
        for _ in 0..GOAL_RESAMPLE_LIMIT {
            goal = sample_in(&mut replay, config.goal_range_x, config.goal_range_z);
        }

        a.begin_episode(&mut scene, &mut rng);
        assert_eq!(a.position, position);
        assert_eq!(scene.goal, goal);
        assert!(a.position.distance(scene.goal) < config.min_goal_distance);
        assert!(!a.episode().is_done());
        assert!((0.0..360.0).contains(&a.yaw_degrees));
    }

    #[test]
    fn fixed_positions_when_not_randomized() {
        let config = GoalConfig {
            randomize_positioning: false,
            ..GoalConfig::for_variant(GoalVariant::Open)
        };
        let mut scene = GoalScene::from_config(&config);
        let mut a = GoalSeekingAgent::new(config.clone());
        a.begin_episode(&mut scene, &mut create_rng(0));
        assert_eq!(a.position, config.initial_agent_position);
        assert_eq!(scene.goal, config.initial_goal_position);
    }

    #[test]
    fn countdown_expiry_loses_open_round() {
        let (mut a, mut scene) = agent(GoalVariant::Open);
        a.begin_episode(&mut scene, &mut create_rng(2));
        for _ in 0..1499 {
            a.tick(0.02, &scene);
        }
        assert!(!a.episode().is_done());
        for _ in 0..2 {
            a.tick(0.02, &scene);
        }
        assert_eq!(a.episode().ended(), Some(EndReason::Failed));
    }

    #[test]
    fn obstacle_penetration_respects_rotation() {
        let wall = Obstacle {
            center: Vec2::ZERO,
            half_extents: Vec2::new(2.0, 0.25),
            yaw_degrees: 90.0,
        };
        // Rotated a quarter turn the long side runs along z.
        assert!(wall.penetration(Vec2::new(0.0, 1.5), 0.3).is_some());
        assert!(wall.penetration(Vec2::new(1.5, 0.0), 0.3).is_none());
        let push = wall.penetration(Vec2::new(0.4, 0.0), 0.3).unwrap();
        assert!(push.x > 0.0 && push.y.abs() < 1e-5);
        assert!((push.length() - 0.15).abs() < 1e-5);
    }
}
