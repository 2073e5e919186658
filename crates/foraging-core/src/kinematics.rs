//! Minimal rigid-body stand-in: the engine primitives the agents drive.
//!
//! Rotations follow the left-handed, Y-up convention the agents were tuned in:
//! forward is +Z, up is +Y, right is +X, and Euler angles compose as yaw
//! (Y) then pitch (X) then roll (Z).

use glam::{EulerRot, Mat3, Quat, Vec3};

/// Rotation from Euler angles in degrees (pitch about X, yaw about Y, roll about Z).
pub fn euler_degrees(pitch: f32, yaw: f32, roll: f32) -> Quat {
    Quat::from_euler(
        EulerRot::YXZ,
        yaw.to_radians(),
        pitch.to_radians(),
        roll.to_radians(),
    )
}

/// Inverse of [`euler_degrees`]: `(pitch, yaw, roll)` in degrees.
pub fn to_euler_degrees(rotation: Quat) -> (f32, f32, f32) {
    let (yaw, pitch, roll) = rotation.to_euler(EulerRot::YXZ);
    (pitch.to_degrees(), yaw.to_degrees(), roll.to_degrees())
}

/// Rotation whose forward axis points along `forward` with up as close to `up` as possible.
/// Degenerate inputs fall back to identity (zero forward) or an arbitrary perpendicular up.
pub fn look_rotation(forward: Vec3, up: Vec3) -> Quat {
    let z = forward.normalize_or_zero();
    if z == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    let mut x = up.cross(z).normalize_or_zero();
    if x == Vec3::ZERO {
        x = z.any_orthonormal_vector();
    }
    let y = z.cross(x);
    Quat::from_mat3(&Mat3::from_cols(x, y, z)).normalize()
}

/// Move `current` toward `target` by at most `max_delta`.
pub fn move_towards(current: f32, target: f32, max_delta: f32) -> f32 {
    if (target - current).abs() <= max_delta {
        target
    } else {
        current + (target - current).signum() * max_delta
    }
}

/// Wrap an angle in degrees into (-180, 180].
pub fn wrap_degrees(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Body {
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    pub mass: f32,
    pub drag: f32,
    pending_force: Vec3,
    sleeping: bool,
}

impl Body {
    pub fn new(position: Vec3, rotation: Quat, mass: f32, drag: f32) -> Self {
        Self {
            position,
            rotation,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            mass,
            drag,
            pending_force: Vec3::ZERO,
            sleeping: false,
        }
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    /// Point given in the body's local frame, in world space.
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.position + self.rotation * local
    }

    pub fn add_force(&mut self, force: Vec3) {
        if !self.sleeping {
            self.pending_force += force;
        }
    }

    pub fn stop(&mut self) {
        self.velocity = Vec3::ZERO;
        self.angular_velocity = Vec3::ZERO;
        self.pending_force = Vec3::ZERO;
    }

    pub fn sleep(&mut self) {
        self.sleeping = true;
        self.stop();
    }

    pub fn wake_up(&mut self) {
        self.sleeping = false;
    }

    pub fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    pub fn set_pose(&mut self, position: Vec3, rotation: Quat) {
        self.position = position;
        self.rotation = rotation;
    }

    /// Advance one fixed step: apply accumulated force, drag, then move.
    pub fn integrate(&mut self, dt: f32) {
        let force = std::mem::take(&mut self.pending_force);
        if self.sleeping {
            return;
        }
        self.velocity += force / self.mass * dt;
        self.velocity *= (1.0 - self.drag * dt).clamp(0.0, 1.0);
        self.position += self.velocity * dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn euler_round_trip_within_pitch_limits() {
        let q = euler_degrees(35.0, -120.0, 0.0);
        let (pitch, yaw, roll) = to_euler_degrees(q);
        assert!((pitch - 35.0).abs() < 1e-3);
        assert!((yaw + 120.0).abs() < 1e-3);
        assert!(roll.abs() < 1e-3);
    }

    #[test]
    fn positive_pitch_points_nose_down() {
        let forward = euler_degrees(30.0, 0.0, 0.0) * Vec3::Z;
        assert!(forward.y < 0.0);
        assert!(forward.z > 0.0);
    }

    #[test]
    fn look_rotation_faces_target() {
        let dir = Vec3::new(1.0, -0.5, 2.0);
        let q = look_rotation(dir, Vec3::Y);
        assert!(approx(q * Vec3::Z, dir.normalize()));
        assert!((q * Vec3::X).y.abs() < 1e-5, "no roll");
    }

    #[test]
    fn look_rotation_straight_up_is_valid() {
        let q = look_rotation(Vec3::Y, Vec3::Y);
        assert!(approx(q * Vec3::Z, Vec3::Y));
        assert!(q.is_normalized());
    }

    #[test]
    fn move_towards_limits_rate() {
        assert_eq!(move_towards(0.0, 1.0, 0.04), 0.04);
        assert_eq!(move_towards(0.0, -1.0, 0.04), -0.04);
        assert_eq!(move_towards(0.98, 1.0, 0.04), 1.0);
    }

    #[test]
    fn wrap_degrees_range() {
        assert_eq!(wrap_degrees(190.0), -170.0);
        assert_eq!(wrap_degrees(180.0), 180.0);
        assert_eq!(wrap_degrees(-180.0), 180.0);
        assert_eq!(wrap_degrees(359.0), -1.0);
        assert_eq!(wrap_degrees(45.0), 45.0);
    }

    #[test]
    fn sleeping_body_ignores_forces() {
        let mut body = Body::new(Vec3::ZERO, Quat::IDENTITY, 1.0, 0.0);
        body.sleep();
        body.add_force(Vec3::X * 10.0);
        body.integrate(0.02);
        assert_eq!(body.position, Vec3::ZERO);
        body.wake_up();
        body.add_force(Vec3::X * 10.0);
        body.integrate(0.02);
        assert!(body.position.x > 0.0);
    }
}
