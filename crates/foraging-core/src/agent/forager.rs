use crate::config::ForagerConfig;
use crate::contact::{Contact, ContactPhase, ContactSubject};
use crate::episode::Episode;
use crate::field::ResourceField;
use crate::kinematics::{
    euler_degrees, look_rotation, move_towards, to_euler_degrees, wrap_degrees, Body,
};
use crate::spatial::{self, ColliderIndex, OverlapProbe};
use glam::{Quat, Vec3};
use rand::Rng;
use std::{error::Error, fmt};
use tracing::{debug, error};

pub const OBSERVATION_WIDTH: usize = 10;
pub const ACTION_WIDTH: usize = 5;

pub type Observation = [f32; OBSERVATION_WIDTH];
pub type Action = [f32; ACTION_WIDTH];

#[derive(Debug, Clone, PartialEq)]
pub enum SpawnError {
    Exhausted { attempts: usize },
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::Exhausted { attempts } => write!(
                f,
                "could not find a collision-free spawn pose in {attempts} attempts"
            ),
        }
    }
}

impl Error for SpawnError {}

/// Hummingbird control loop over a shared [`ResourceField`].
///
/// The agent never owns sources; `nearest` is an index into the field that is
/// recomputed when it turns out to be empty. Another agent can drain it in the
/// meantime, so it may be stale for at most one fixed step.
#[derive(Clone, Debug)]
pub struct ForagingAgent {
    id: usize,
    config: ForagerConfig,
    training: bool,
    pub body: Body,
    nearest: Option<usize>,
    smooth_pitch: f32,
    smooth_yaw: f32,
    frozen: bool,
    nectar_obtained: f32,
    episode: Episode,
}

impl ForagingAgent {
    /// Outside training the episode never runs out of steps.
    pub fn new(id: usize, config: ForagerConfig, training: bool, max_steps: u32) -> Self {
        let body = Body::new(Vec3::ZERO, Quat::IDENTITY, config.mass, config.drag);
        Self {
            id,
            config,
            training,
            body,
            nearest: None,
            smooth_pitch: 0.0,
            smooth_yaw: 0.0,
            frozen: false,
            nectar_obtained: 0.0,
            episode: Episode::new(if training { max_steps } else { 0 }),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn config(&self) -> &ForagerConfig {
        &self.config
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn nearest(&self) -> Option<usize> {
        self.nearest
    }

    pub fn nectar_obtained(&self) -> f32 {
        self.nectar_obtained
    }

    pub fn episode(&self) -> &Episode {
        &self.episode
    }

    pub fn episode_mut(&mut self) -> &mut Episode {
        &mut self.episode
    }

    pub fn beak_tip(&self) -> Vec3 {
        self.body.transform_point(self.config.beak_tip_offset)
    }

    /// Start an episode. `occupants` reports anything besides the field's own
    /// colliders that a spawn must avoid (other agents).
    ///
    /// Panics when no safe spawn pose is found: running on with an overlapping
    /// pose would corrupt the episode.
    pub fn begin_episode<R: Rng + ?Sized>(
        &mut self,
        field: &mut ResourceField,
        occupants: &impl OverlapProbe,
        rng: &mut R,
    ) {
        if let Err(e) = self.try_begin_episode(field, occupants, rng) {
            error!(agent = self.id, "{e}");
            panic!("{e}");
        }
    }

    pub fn try_begin_episode<R: Rng + ?Sized>(
        &mut self,
        field: &mut ResourceField,
        occupants: &impl OverlapProbe,
        rng: &mut R,
    ) -> Result<(), SpawnError> {
        if self.training {
            field.reset_all(rng);
        }
        self.nectar_obtained = 0.0;
        self.smooth_pitch = 0.0;
        self.smooth_yaw = 0.0;
        self.body.stop();
        self.episode.begin();

        let in_front_of_source = if self.training {
            rng.random::<f32>() > 0.5
        } else {
            true
        };
        self.move_to_safe_random_pose(field, occupants, in_front_of_source, rng)?;
        self.refresh_nearest(field);
        debug!(
            agent = self.id,
            in_front_of_source,
            nearest = ?self.nearest,
            "episode started"
        );
        Ok(())
    }

    /// Rejection-sample a pose whose probe sphere touches nothing. The body is
    /// only moved on success.
    pub fn move_to_safe_random_pose<R: Rng + ?Sized>(
        &mut self,
        field: &ResourceField,
        occupants: &impl OverlapProbe,
        in_front_of_source: bool,
        rng: &mut R,
    ) -> Result<(), SpawnError> {
        let colliders = ColliderIndex::from_field(field);
        let in_front_of_source = in_front_of_source && !field.is_empty();
        let probe_radius = self.config.spawn_probe_radius;

        for _ in 0..self.config.spawn_attempts {
            let (position, rotation) = if in_front_of_source {
                self.sample_in_front_of_source(field, rng)
            } else {
                self.sample_free(field, rng)
            };
            if !colliders.is_occupied(position, probe_radius)
                && !occupants.is_occupied(position, probe_radius)
            {
                self.body.set_pose(position, rotation);
                return Ok(());
            }
        }
        Err(SpawnError::Exhausted {
            attempts: self.config.spawn_attempts,
        })
    }

    fn sample_in_front_of_source<R: Rng + ?Sized>(
        &self,
        field: &ResourceField,
        rng: &mut R,
    ) -> (Vec3, Quat) {
        let source = field.source(rng.random_range(0..field.len()));
        let standoff = self.config.spawn_standoff;
        let distance = rng.random_range(standoff.x..=standoff.y);
        let position = source.position() + source.outward() * distance;
        let rotation = look_rotation(source.feeding_point() - position, Vec3::Y);
        (position, rotation)
    }

    fn sample_free<R: Rng + ?Sized>(&self, field: &ResourceField, rng: &mut R) -> (Vec3, Quat) {
        let cfg = &self.config;
        let height = rng.random_range(cfg.spawn_height.x..=cfg.spawn_height.y);
        let radius = rng.random_range(cfg.spawn_radius.x..=cfg.spawn_radius.y);
        let heading = rng.random_range(-180.0f32..=180.0);
        let direction = Quat::from_rotation_y(heading.to_radians()) * Vec3::Z;
        let position = field.center() + Vec3::Y * height + direction * radius;

        let pitch = rng.random_range(cfg.spawn_pitch_degrees.x..=cfg.spawn_pitch_degrees.y);
        let yaw = rng.random_range(-180.0f32..=180.0);
        (position, euler_degrees(pitch, yaw, 0.0))
    }

    /// Ten scalars: rotation (4), unit vector beak -> feeding point (3),
    /// whether the beak is in front of the flower (1), whether the beak points
    /// at the flower (1), distance over field diameter (1). All zero without a target.
    pub fn collect_observations(&self, field: &ResourceField) -> Observation {
        let mut obs = [0.0; OBSERVATION_WIDTH];
        let Some(idx) = self.nearest else {
            return obs;
        };
        let source = field.source(idx);
        let to_source = source.feeding_point() - self.beak_tip();
        let direction = to_source.normalize_or_zero();
        let inward = -source.outward();

        obs[0..4].copy_from_slice(&self.body.rotation.normalize().to_array());
        obs[4..7].copy_from_slice(&direction.to_array());
        obs[7] = direction.dot(inward);
        obs[8] = self.body.forward().normalize().dot(inward);
        obs[9] = to_source.length() / field.diameter();
        obs
    }

    /// Actions: force x, y, z, then pitch and yaw rate commands, each in [-1, 1].
    pub fn on_action_received(&mut self, actions: &Action, dt: f32) {
        if self.frozen {
            return;
        }
        let cfg = &self.config;
        let movement = Vec3::new(actions[0], actions[1], actions[2]);
        self.body.add_force(movement * cfg.move_force);

        let max_rate_change = cfg.rate_smoothing * dt;
        self.smooth_pitch = move_towards(self.smooth_pitch, actions[3], max_rate_change);
        self.smooth_yaw = move_towards(self.smooth_yaw, actions[4], max_rate_change);

        let (pitch, yaw, _) = to_euler_degrees(self.body.rotation);
        let pitch = wrap_degrees(pitch + self.smooth_pitch * dt * cfg.pitch_speed)
            .clamp(-cfg.max_pitch_degrees, cfg.max_pitch_degrees);
        let yaw = yaw + self.smooth_yaw * dt * cfg.yaw_speed;
        self.body.rotation = euler_degrees(pitch, yaw, 0.0);
    }

    /// Handle a contact reported by the engine. Returns the nectar received.
    pub fn on_contact(&mut self, field: &mut ResourceField, contact: Contact) -> f32 {
        match (contact.subject, contact.phase) {
            (ContactSubject::Feeding(handle), _) => {
                let beak = self.beak_tip();
                if beak.distance(contact.point) >= self.config.beak_tip_radius {
                    return 0.0;
                }
                let idx = field.index_of(handle);
                let source = field.source_mut(idx);
                let received = source.withdraw(self.config.nectar_per_feed);
                self.nectar_obtained += received;

                if self.training {
                    let facing = self
                        .body
                        .forward()
                        .normalize()
                        .dot(-source.outward())
                        .clamp(0.0, 1.0);
                    self.episode
                        .add_reward(self.config.nectar_per_feed + self.config.facing_bonus * facing);
                }
                if !source.has_nectar() {
                    debug!(agent = self.id, source = idx, "source depleted");
                    self.refresh_nearest(field);
                }
                received
            }
            (ContactSubject::Boundary, ContactPhase::Enter) => {
                if self.training {
                    self.episode.add_reward(-self.config.boundary_penalty);
                }
                0.0
            }
            _ => 0.0,
        }
    }

    /// Per fixed step: drop a target another agent has emptied.
    pub fn fixed_update(&mut self, field: &ResourceField) {
        if self.nearest.is_some_and(|idx| !field.source(idx).has_nectar()) {
            self.refresh_nearest(field);
        }
    }

    pub fn refresh_nearest(&mut self, field: &ResourceField) {
        self.nearest = spatial::nearest_active(field, self.beak_tip());
    }

    /// Stop moving and acting. Interactive mode only.
    pub fn freeze(&mut self) {
        assert!(!self.training, "freeze/unfreeze not supported in training");
        self.frozen = true;
        self.body.sleep();
    }

    pub fn unfreeze(&mut self) {
        assert!(!self.training, "freeze/unfreeze not supported in training");
        self.frozen = false;
        self.body.wake_up();
    }
}
