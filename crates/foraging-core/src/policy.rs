//! Decision sources: anything that turns an observation into an action buffer.

use glam::{Quat, Vec3};
use rand::Rng;

pub trait Policy {
    /// Fill `actions` (already sized to the agent's action width) from `observation`.
    fn act(&mut self, observation: &[f32], actions: &mut [f32]);
}

impl<P: Policy + ?Sized> Policy for &mut P {
    fn act(&mut self, observation: &[f32], actions: &mut [f32]) {
        (**self).act(observation, actions)
    }
}

impl<P: Policy + ?Sized> Policy for Box<P> {
    fn act(&mut self, observation: &[f32], actions: &mut [f32]) {
        (**self).act(observation, actions)
    }
}

/// Always does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdlePolicy;

impl Policy for IdlePolicy {
    fn act(&mut self, _observation: &[f32], actions: &mut [f32]) {
        actions.fill(0.0);
    }
}

/// Uniform actions in [-1, 1].
#[derive(Clone, Debug)]
pub struct RandomPolicy<R> {
    rng: R,
}

impl<R: Rng> RandomPolicy<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> Policy for RandomPolicy<R> {
    fn act(&mut self, _observation: &[f32], actions: &mut [f32]) {
        for a in actions.iter_mut() {
            *a = self.rng.random_range(-1.0f32..=1.0);
        }
    }
}

/// Held-down control intents, each in [-1, 1] (keys map to -1, 0 or +1).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HeuristicInput {
    /// +1 forward, -1 back.
    pub forward: f32,
    /// +1 right, -1 left.
    pub strafe: f32,
    /// +1 up, -1 down.
    pub lift: f32,
    /// +1 pitch up, -1 pitch down.
    pub pitch: f32,
    /// +1 turn right, -1 turn left.
    pub yaw: f32,
}

impl HeuristicInput {
    /// Five-wide flight action: movement combined in the agent's frame and
    /// normalized, then pitch and yaw.
    pub fn flight_actions(&self, rotation: Quat) -> [f32; 5] {
        let forward = rotation * Vec3::Z * self.forward.signum_or_zero();
        let right = rotation * Vec3::X * self.strafe.signum_or_zero();
        let up = rotation * Vec3::Y * self.lift.signum_or_zero();
        let combined = (forward + right + up).normalize_or_zero();
        [
            combined.x,
            combined.y,
            combined.z,
            self.pitch.signum_or_zero(),
            self.yaw.signum_or_zero(),
        ]
    }

    /// Planar action: horizontal axis, vertical axis, then turn.
    pub fn planar_actions(&self) -> [f32; 3] {
        [
            self.strafe.clamp(-1.0, 1.0),
            self.forward.clamp(-1.0, 1.0),
            self.yaw.clamp(-1.0, 1.0),
        ]
    }
}

trait SignumOrZero {
    fn signum_or_zero(self) -> f32;
}

impl SignumOrZero for f32 {
    fn signum_or_zero(self) -> f32 {
        if self > 0.0 {
            1.0
        } else if self < 0.0 {
            -1.0
        } else {
            0.0
        }
    }
}

/// Replays a fixed [`HeuristicInput`]. Flight agents (five-wide actions) read
/// their rotation back from the first four observation scalars.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeuristicPolicy {
    pub input: HeuristicInput,
}

impl HeuristicPolicy {
    pub fn new(input: HeuristicInput) -> Self {
        Self { input }
    }
}

impl Policy for HeuristicPolicy {
    fn act(&mut self, observation: &[f32], actions: &mut [f32]) {
        if actions.len() == 5 {
            let rotation = match observation {
                [x, y, z, w, ..] if x.abs() + y.abs() + z.abs() + w.abs() > 0.0 => {
                    Quat::from_xyzw(*x, *y, *z, *w).normalize()
                }
                _ => Quat::IDENTITY,
            };
            actions.copy_from_slice(&self.input.flight_actions(rotation));
        } else {
            let planar = self.input.planar_actions();
            for (a, v) in actions.iter_mut().zip(planar) {
                *a = v;
            }
        }
    }
}
