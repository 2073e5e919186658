use super::*;
use crate::config::{GoalConfig, GoalVariant};
use crate::field::SceneNode;
use crate::kinematics::euler_degrees;
use crate::policy::{IdlePolicy, RandomPolicy};
use crate::rng::{create_rng, derive_stream};
use glam::Vec3;

/// Always emits the same action buffer.
struct Constant(Vec<f32>);

impl Policy for Constant {
    fn act(&mut self, _observation: &[f32], actions: &mut [f32]) {
        for (a, v) in actions.iter_mut().zip(&self.0) {
            *a = *v;
        }
    }
}

/// Walks straight along the goal direction in the maze observation.
struct Seek;

impl Policy for Seek {
    fn act(&mut self, observation: &[f32], actions: &mut [f32]) {
        actions[0] = observation[0];
        actions[1] = observation[2];
    }
}

fn line_layout() -> SceneNode {
    // Flowers at x = 1, 5, 9 (in that discovery order: 9, 1, 5), opening toward -x.
    SceneNode::group(vec![
        SceneNode::source(Vec3::new(9.0, 2.0, 0.0), -Vec3::X),
        SceneNode::source(Vec3::new(1.0, 2.0, 0.0), -Vec3::X),
        SceneNode::source(Vec3::new(5.0, 2.0, 0.0), -Vec3::X),
    ])
}

fn make_arena(config: SimConfig) -> ForagingArena {
    let field = ResourceField::find_all(&line_layout(), &config.field);
    let rng = create_rng(config.seed);
    ForagingArena::try_with_field(config, field, rng).unwrap()
}

/// Place agent 0 so its beak sits at `beak`, facing +x.
fn place_beak(arena: &mut ForagingArena, beak: Vec3) {
    let agent = &mut arena.agents[0];
    let rotation = euler_degrees(0.0, 90.0, 0.0);
    let offset = rotation * agent.config().beak_tip_offset;
    agent.body.set_pose(beak - offset, rotation);
    agent.body.stop();
    agent.refresh_nearest(&arena.field);
}

#[test]
fn nearest_follows_depletion_along_the_line() {
    let mut arena = make_arena(SimConfig::default());
    place_beak(&mut arena, Vec3::new(0.0, 2.0, 0.0));
    assert_eq!(arena.agents[0].nearest(), Some(1));

    arena.field_mut().source_mut(1).withdraw(1.0);
    arena.step(&mut IdlePolicy);
    assert_eq!(arena.agents[0].nearest(), Some(2));

    arena.field_mut().source_mut(2).withdraw(1.0);
    arena.field_mut().source_mut(0).withdraw(1.0);
    arena.step(&mut IdlePolicy);
    assert_eq!(arena.agents[0].nearest(), None);
    assert!(arena.agents[0]
        .collect_observations(&arena.field)
        .iter()
        .all(|&v| v == 0.0));
}

#[test]
fn hovering_at_a_flower_drinks_and_is_rewarded() {
    let mut arena = make_arena(SimConfig::default());
    let feeding_point = arena.field().source(1).feeding_point();
    place_beak(&mut arena, feeding_point);

    arena.step(&mut IdlePolicy);
    assert_eq!(arena.feeds_last_step, 1);
    assert!((arena.field().source(1).capacity() - 0.99).abs() < 1e-6);
    assert!((arena.last_rewards()[0] - 0.03).abs() < 1e-4);
    assert!((arena.agents[0].nectar_obtained() - 0.01).abs() < 1e-6);
}

#[test]
fn hundred_feeds_empty_a_flower() {
    let mut arena = make_arena(SimConfig::default());
    let feeding_point = arena.field().source(1).feeding_point();
    place_beak(&mut arena, feeding_point);

    for _ in 0..99 {
        arena.step(&mut IdlePolicy);
    }
    assert!(arena.field().source(1).has_nectar());
    arena.step(&mut IdlePolicy);
    let source = arena.field().source(1);
    assert_eq!(source.capacity(), 0.0);
    assert!(!source.feeding_enabled() && !source.body_enabled());
    assert_eq!(arena.field().active_count(), 2);
    assert_eq!(arena.agents[0].nearest(), Some(2));

    // Nothing left to drink here.
    arena.step(&mut IdlePolicy);
    assert_eq!(arena.feeds_last_step, 0);
    assert!((arena.agents[0].nectar_obtained() - 1.0).abs() < 1e-4);
}

#[test]
fn boundary_penalty_once_per_contact() {
    let mut arena = make_arena(SimConfig::default());
    place_beak(&mut arena, Vec3::new(9.95, 3.5, 0.0));
    let mut push_out = Constant(vec![1.0, 0.0, 0.0, 0.0, 0.0]);

    for _ in 0..100 {
        arena.step(&mut push_out);
    }
    assert!(arena.touching_boundary[0]);
    assert!((arena.agents[0].episode().cumulative_reward() + 0.5).abs() < 1e-6);
    let p = arena.agents[0].body.position;
    assert!(Vec3::new(p.x, 0.0, p.z).length() <= 10.0 - 0.04 + 1e-4);
}

#[test]
fn floor_and_ceiling_hold_the_body() {
    let mut arena = make_arena(SimConfig::default());
    place_beak(&mut arena, Vec3::new(-3.0, 4.9, 0.0));
    let mut climb = Constant(vec![0.0, 1.0, 0.0, 0.0, 0.0]);
    for _ in 0..300 {
        arena.step(&mut climb);
    }
    let y = arena.agents[0].body.position.y;
    assert!(y <= 5.0 - 0.04 + 1e-5);
    assert!(arena.touching_boundary[0]);
}

#[test]
fn budget_restarts_episodes() {
    let config = SimConfig {
        max_steps: 10,
        ..SimConfig::default()
    };
    let mut arena = make_arena(config);
    for _ in 0..25 {
        arena.step(&mut IdlePolicy);
    }
    assert_eq!(arena.episodes_completed(), 2);
    let finished = arena.take_finished_episodes();
    assert_eq!(finished.len(), 2);
    assert!(finished
        .iter()
        .all(|e| e.steps == 10 && e.reason == EndReason::MaxStepReached));
    assert_eq!(finished[1].step, 20);
    assert_eq!(arena.agents[0].episode().step_count(), 5);
}

#[test]
fn interactive_mode_never_ends_or_resets() {
    let config = SimConfig {
        training: false,
        max_steps: 10,
        ..SimConfig::default()
    };
    let mut arena = make_arena(config);
    // Interactive spawns sit right at a flower; move clear of all of them.
    place_beak(&mut arena, Vec3::new(-5.0, 2.0, 3.0));
    arena.field_mut().source_mut(0).withdraw(0.5);
    for _ in 0..50 {
        arena.step(&mut IdlePolicy);
    }
    assert_eq!(arena.episodes_completed(), 0);
    assert_eq!(arena.agents[0].episode().step_count(), 50);
    assert!((arena.field().source(0).capacity() - 0.5).abs() < 1e-6);
}

#[test]
fn frozen_agent_stays_put() {
    let config = SimConfig {
        training: false,
        ..SimConfig::default()
    };
    let mut arena = make_arena(config);
    place_beak(&mut arena, Vec3::new(-2.0, 2.0, 3.0));
    arena.agents[0].freeze();
    let before = arena.agents[0].body.clone();
    let mut full_throttle = Constant(vec![1.0, 1.0, 1.0, 1.0, 1.0]);
    for _ in 0..20 {
        arena.step(&mut full_throttle);
    }
    assert_eq!(arena.agents[0].body.position, before.position);
    assert_eq!(arena.agents[0].body.rotation, before.rotation);

    arena.agents[0].unfreeze();
    arena.step(&mut full_throttle);
    assert_ne!(arena.agents[0].body.position, before.position);
}

#[test]
fn agents_share_one_field() {
    let config = SimConfig {
        num_agents: 4,
        ..SimConfig::default()
    };
    let mut arena = ForagingArena::new(config);
    let mut policy = RandomPolicy::new(derive_stream(42, 1));
    for _ in 0..300 {
        arena.step(&mut policy);
    }
    let radius = arena.config().field.diameter / 2.0;
    for agent in &arena.agents {
        let p = agent.body.position;
        assert!(p.is_finite());
        assert!(Vec3::new(p.x, 0.0, p.z).length() <= radius);
        assert!(p.y >= 0.0 && p.y <= arena.config().field.height);
    }
}

#[test]
fn spawned_agents_do_not_overlap() {
    let config = SimConfig {
        num_agents: 8,
        ..SimConfig::default()
    };
    let arena = ForagingArena::new(config);
    let probe = arena.config().forager.spawn_probe_radius;
    for (i, a) in arena.agents.iter().enumerate() {
        for b in &arena.agents[i + 1..] {
            assert!(a.body.position.distance(b.body.position) >= probe);
        }
    }
}

#[test]
fn same_seed_same_run() {
    let run = || {
        let mut arena = ForagingArena::new(SimConfig::default());
        let mut policy = RandomPolicy::new(derive_stream(7, 0));
        serde_json::to_string(&arena.run_experiment(&mut policy, 200, 50)).unwrap()
    };
    assert_eq!(run(), run());
}

#[test]
fn experiment_samples_every_n_and_last() {
    let mut arena = make_arena(SimConfig::default());
    let summary = arena.run_experiment(&mut IdlePolicy, 10, 3);
    let steps: Vec<usize> = summary.samples.iter().map(|s| s.step).collect();
    assert_eq!(steps, vec![3, 6, 9, 10]);
    assert_eq!(summary.schema_version, 1);
    assert_eq!(summary.final_active_sources, 3);
}

#[test]
fn experiment_arguments_are_validated() {
    let mut arena = make_arena(SimConfig::default());
    assert_eq!(
        arena.try_run_experiment(&mut IdlePolicy, 10, 0).unwrap_err(),
        ExperimentError::InvalidSampleEvery
    );
    assert!(matches!(
        arena.try_run_experiment(&mut IdlePolicy, MAX_EXPERIMENT_STEPS + 1, 1),
        Err(ExperimentError::TooManySteps { .. })
    ));
    assert!(matches!(
        arena.try_run_experiment(&mut IdlePolicy, MAX_EXPERIMENT_STEPS, 1),
        Err(ExperimentError::TooManySamples { .. })
    ));
}

#[test]
fn invalid_setups_are_rejected() {
    let no_agents = SimConfig {
        num_agents: 0,
        ..SimConfig::default()
    };
    assert!(matches!(
        ForagingArena::try_new(no_agents),
        Err(ArenaInitError::Config(ConfigError::NoAgents))
    ));

    let crowd = SimConfig {
        num_agents: ForagingArena::MAX_AGENTS + 1,
        ..SimConfig::default()
    };
    assert!(matches!(
        ForagingArena::try_new(crowd),
        Err(ArenaInitError::TooManyAgents { .. })
    ));

    let mut tilted = SimConfig::default();
    tilted.field.tilt_jitter_degrees = -5.0;
    assert!(matches!(
        ForagingArena::try_new(tilted),
        Err(ArenaInitError::Config(ConfigError::InvalidFieldScale(
            "tilt_jitter_degrees"
        )))
    ));

    let config = SimConfig::default();
    let empty = ResourceField::find_all(&SceneNode::group(Vec::new()), &config.field);
    assert!(matches!(
        ForagingArena::try_with_field(config, empty, create_rng(0)),
        Err(ArenaInitError::EmptyField)
    ));
}

#[test]
fn summary_json_has_schema_version() {
    let mut arena = make_arena(SimConfig::default());
    let summary = arena.run_experiment(&mut IdlePolicy, 4, 2);
    let value: serde_json::Value = serde_json::to_value(&summary).unwrap();
    assert_eq!(value["schema_version"], 1);
    assert_eq!(value["samples"].as_array().map(Vec::len), Some(2));

    let legacy = r#"{"seed":1,"steps":0,"sample_every":1,"final_active_sources":0,"samples":[]}"#;
    let parsed: RunSummary = serde_json::from_str(legacy).unwrap();
    assert_eq!(parsed.schema_version, 1);
    assert!(parsed.episodes.is_empty());
}

#[test]
fn batch_runs_each_seed() {
    let base = SimConfig::default();
    let summaries = run_batch(&base, &[3, 1, 2], 20, 10, |_| IdlePolicy).unwrap();
    let seeds: Vec<u64> = summaries.iter().map(|s| s.seed).collect();
    assert_eq!(seeds, vec![3, 1, 2]);
    assert!(summaries.iter().all(|s| s.samples.len() == 2));

    let single = ForagingArena::new(SimConfig { seed: 1, ..base.clone() })
        .run_experiment(&mut IdlePolicy, 20, 10);
    assert_eq!(
        serde_json::to_string(&summaries[1]).unwrap(),
        serde_json::to_string(&single).unwrap()
    );
}

#[test]
fn batch_rejects_bad_arguments_up_front() {
    let err = run_batch(&SimConfig::default(), &[1], 10, 0, |_| IdlePolicy).unwrap_err();
    assert_eq!(
        err,
        BatchError::Experiment(ExperimentError::InvalidSampleEvery)
    );
}

fn goal_config(variant: GoalVariant) -> GoalConfig {
    GoalConfig::for_variant(variant)
}

#[test]
fn seeking_the_goal_wins_in_an_empty_maze() {
    let config = GoalConfig {
        walls: Vec::new(),
        ..goal_config(GoalVariant::Maze)
    };
    let mut arena = GoalArena::new(config);
    let summary = arena.run_experiment(&mut Seek, 3000);
    assert!(summary.wins >= 2);
    assert_eq!(summary.losses, 0);
    assert!(summary
        .episodes
        .iter()
        .all(|e| e.reason == EndReason::Succeeded && e.cumulative_reward > 0.0));
}

#[test]
fn idle_open_round_times_out_as_loss() {
    let mut arena = GoalArena::new(goal_config(GoalVariant::Open));
    let summary = arena.run_experiment(&mut IdlePolicy, 1600);
    assert_eq!(summary.losses, 1);
    assert_eq!(summary.episodes[0].reason, EndReason::Failed);
    assert_eq!(summary.episodes[0].steps, 1500);
    assert_eq!(arena.agent.last_outcome(), Some(crate::agent::goal::RoundOutcome::Lost));
}

#[test]
fn open_perimeter_ends_round() {
    let mut arena = GoalArena::new(goal_config(GoalVariant::Open));
    let summary = arena.run_experiment(&mut Constant(vec![-1.0, 0.0]), 1000);
    assert!(summary.losses >= 1);
    assert!(summary.episodes.iter().all(|e| e.reason == EndReason::Failed));
}

#[test]
fn maze_walls_block_and_penalize() {
    let config = GoalConfig {
        randomize_positioning: false,
        initial_agent_position: glam::Vec2::new(0.0, -4.0),
        initial_goal_position: glam::Vec2::new(0.0, 4.0),
        wall_range_x: glam::Vec2::ZERO,
        ..goal_config(GoalVariant::Maze)
    };
    let mut arena = GoalArena::new(config);
    // Straight up into the wall at z = 0.
    let mut up = Constant(vec![0.0, 1.0]);
    for _ in 0..400 {
        arena.step(&mut up);
    }
    assert!(arena.agent.position.y < 0.0);
    assert!(!arena.agent.episode().is_done());
    assert!(arena.last_reward() < -0.0002 - 0.0005);
}

#[test]
fn rotating_maze_stays_inside_the_arena() {
    let mut arena = GoalArena::new(goal_config(GoalVariant::RotatingMaze));
    let mut policy = RandomPolicy::new(derive_stream(5, 3));
    for _ in 0..2000 {
        arena.step(&mut policy);
        let p = arena.agent.position;
        assert!(p.x.abs() <= 9.5 + 1e-4 && p.y.abs() <= 9.5 + 1e-4);
    }
}
