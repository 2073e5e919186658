use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Identity of a feeding (nectar) collider, as reported by contact events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeedingHandle(pub u32);

/// Residue below this counts as empty, so fixed-size withdrawals drain a
/// source on the expected call despite f32 rounding.
pub const DEPLETION_EPSILON: f32 = 1e-5;

/// Visual indicator state of a source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Appearance {
    #[default]
    Full,
    Empty,
}

/// Local pose of a source relative to its plant (or the field origin when it has none).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SourcePose {
    pub position: Vec3,
    /// Direction the flower opens toward. Agents feed from the opposite side of it.
    pub outward: Vec3,
}

/// A depletable nectar source. Capacity lives in `[0, 1]`, only drops through
/// [`NectarSource::withdraw`] and only rises through [`NectarSource::reset`].
#[derive(Clone, Debug)]
pub struct NectarSource {
    handle: FeedingHandle,
    pub(crate) plant: Option<usize>,
    pub(crate) local: SourcePose,
    position: Vec3,
    outward: Vec3,
    feeding_depth: f32,
    body_radius: f32,
    feeding_radius: f32,
    capacity: f32,
    body_enabled: bool,
    feeding_enabled: bool,
    appearance: Appearance,
}

impl NectarSource {
    pub fn new(
        handle: FeedingHandle,
        local: SourcePose,
        feeding_depth: f32,
        body_radius: f32,
        feeding_radius: f32,
    ) -> Self {
        let outward = local.outward.normalize_or_zero();
        Self {
            handle,
            plant: None,
            local,
            position: local.position,
            outward,
            feeding_depth,
            body_radius,
            feeding_radius,
            capacity: 1.0,
            body_enabled: true,
            feeding_enabled: true,
            appearance: Appearance::Full,
        }
    }

    /// Take up to `amount` nectar. Negative or NaN requests take nothing.
    /// Returns what was actually removed.
    pub fn withdraw(&mut self, amount: f32) -> f32 {
        let amount = if amount.is_nan() { 0.0 } else { amount };
        let taken = amount.clamp(0.0, self.capacity);
        self.capacity -= taken;
        if self.capacity <= DEPLETION_EPSILON {
            self.capacity = 0.0;
            self.body_enabled = false;
            self.feeding_enabled = false;
            self.appearance = Appearance::Empty;
        }
        taken
    }

    pub fn reset(&mut self) {
        self.capacity = 1.0;
        self.body_enabled = true;
        self.feeding_enabled = true;
        self.appearance = Appearance::Full;
    }

    pub fn capacity(&self) -> f32 {
        self.capacity
    }

    pub fn has_nectar(&self) -> bool {
        self.capacity > 0.0
    }

    pub fn handle(&self) -> FeedingHandle {
        self.handle
    }

    pub fn plant(&self) -> Option<usize> {
        self.plant
    }

    /// World-space flower origin.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Unit axis the flower opens toward.
    pub fn outward(&self) -> Vec3 {
        self.outward
    }

    /// Center of the feeding collider.
    pub fn feeding_point(&self) -> Vec3 {
        self.position + self.outward * self.feeding_depth
    }

    pub fn body_radius(&self) -> f32 {
        self.body_radius
    }

    pub fn feeding_radius(&self) -> f32 {
        self.feeding_radius
    }

    pub fn body_enabled(&self) -> bool {
        self.body_enabled
    }

    pub fn feeding_enabled(&self) -> bool {
        self.feeding_enabled
    }

    pub fn appearance(&self) -> Appearance {
        self.appearance
    }

    /// Point of the feeding collider closest to `point` (the point itself when inside).
    pub fn closest_feeding_point(&self, point: Vec3) -> Vec3 {
        let center = self.feeding_point();
        let offset = point - center;
        if offset.length() <= self.feeding_radius {
            point
        } else {
            center + offset.normalize() * self.feeding_radius
        }
    }

    pub(crate) fn set_world_pose(&mut self, position: Vec3, outward: Vec3) {
        self.position = position;
        self.outward = outward.normalize_or_zero();
    }
}
