use crate::config::FieldConfig;
use crate::kinematics::euler_degrees;
use crate::resource::{FeedingHandle, NectarSource, SourcePose};
use glam::{Quat, Vec3};
use rand::Rng;
use std::collections::HashMap;
use std::f32::consts::TAU;

/// Role of a node in a field layout, resolved once when the field is built.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeRole {
    /// Plain container; its children are searched.
    Group,
    /// A plant: gets rotation jitter on reset, and its descendants' poses are
    /// relative to `origin`.
    Plant { origin: Vec3 },
    /// A nectar source. Its subtree is not searched.
    Source(SourcePose),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneNode {
    pub role: NodeRole,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn group(children: Vec<SceneNode>) -> Self {
        Self {
            role: NodeRole::Group,
            children,
        }
    }

    pub fn plant(origin: Vec3, children: Vec<SceneNode>) -> Self {
        Self {
            role: NodeRole::Plant { origin },
            children,
        }
    }

    pub fn source(position: Vec3, outward: Vec3) -> Self {
        Self {
            role: NodeRole::Source(SourcePose { position, outward }),
            children: Vec::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plant {
    pub origin: Vec3,
    pub rotation: Quat,
}

/// All nectar sources of one field, in discovery order, plus the
/// feeding-collider lookup table.
#[derive(Clone, Debug)]
pub struct ResourceField {
    center: Vec3,
    diameter: f32,
    height: f32,
    tilt_jitter: f32,
    heading_jitter: f32,
    plants: Vec<Plant>,
    sources: Vec<NectarSource>,
    handles: HashMap<FeedingHandle, usize>,
}

impl ResourceField {
    /// Walk `root`'s children depth-first (pre-order) and register every source once.
    pub fn find_all(root: &SceneNode, config: &FieldConfig) -> Self {
        let mut field = Self {
            center: config.center,
            diameter: config.diameter,
            height: config.height,
            tilt_jitter: config.tilt_jitter_degrees,
            heading_jitter: config.heading_jitter_degrees,
            plants: Vec::new(),
            sources: Vec::new(),
            handles: HashMap::new(),
        };
        field.visit_children(root, None, config);
        field.refresh_world_poses();
        field
    }

    /// Build a field from a freshly generated layout.
    pub fn generate<R: Rng + ?Sized>(config: &FieldConfig, rng: &mut R) -> Self {
        Self::find_all(&generate_layout(config, rng), config)
    }

    fn visit_children(&mut self, parent: &SceneNode, plant: Option<usize>, config: &FieldConfig) {
        for child in &parent.children {
            match &child.role {
                NodeRole::Plant { origin } => {
                    self.plants.push(Plant {
                        origin: *origin,
                        rotation: Quat::IDENTITY,
                    });
                    let idx = self.plants.len() - 1;
                    self.visit_children(child, Some(idx), config);
                }
                NodeRole::Source(pose) => {
                    let handle = FeedingHandle(self.sources.len() as u32);
                    let mut source = NectarSource::new(
                        handle,
                        *pose,
                        config.feeding_depth,
                        config.body_radius,
                        config.feeding_radius,
                    );
                    source.plant = plant;
                    self.handles.insert(handle, self.sources.len());
                    self.sources.push(source);
                }
                NodeRole::Group => self.visit_children(child, plant, config),
            }
        }
    }

    fn refresh_world_poses(&mut self) {
        let plants = &self.plants;
        for source in &mut self.sources {
            let (position, outward) = match source.plant.map(|p| plants[p]) {
                Some(plant) => (
                    plant.origin + plant.rotation * source.local.position,
                    plant.rotation * source.local.outward,
                ),
                None => (source.local.position, source.local.outward),
            };
            source.set_world_pose(position, outward);
        }
    }

    /// Jitter every plant's rotation (small tilt, free heading) and refill every source.
    pub fn reset_all<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for plant in &mut self.plants {
            let x = rng.random_range(-self.tilt_jitter..=self.tilt_jitter);
            let y = rng.random_range(-self.heading_jitter..=self.heading_jitter);
            let z = rng.random_range(-self.tilt_jitter..=self.tilt_jitter);
            plant.rotation = euler_degrees(x, y, z);
        }
        self.refresh_world_poses();
        for source in &mut self.sources {
            source.reset();
        }
    }

    /// Source owning a feeding collider.
    ///
    /// Panics if `handle` was not registered by this field: handles only come
    /// from this field's own contact reports.
    pub fn lookup(&self, handle: FeedingHandle) -> &NectarSource {
        &self.sources[self.index_of(handle)]
    }

    pub fn lookup_mut(&mut self, handle: FeedingHandle) -> &mut NectarSource {
        let idx = self.index_of(handle);
        &mut self.sources[idx]
    }

    /// Index of the source owning `handle`. Panics on unregistered handles.
    pub fn index_of(&self, handle: FeedingHandle) -> usize {
        match self.handles.get(&handle) {
            Some(&idx) => idx,
            None => {
                tracing::error!(?handle, "lookup of unregistered feeding handle");
                panic!("feeding handle {handle:?} is not registered in this field");
            }
        }
    }

    pub fn try_index_of(&self, handle: FeedingHandle) -> Option<usize> {
        self.handles.get(&handle).copied()
    }

    pub fn sources(&self) -> &[NectarSource] {
        &self.sources
    }

    pub fn source(&self, idx: usize) -> &NectarSource {
        &self.sources[idx]
    }

    pub fn source_mut(&mut self, idx: usize) -> &mut NectarSource {
        &mut self.sources[idx]
    }

    pub fn plants(&self) -> &[Plant] {
        &self.plants
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn diameter(&self) -> f32 {
        self.diameter
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn active_count(&self) -> usize {
        self.sources.iter().filter(|s| s.has_nectar()).count()
    }

    pub fn total_nectar(&self) -> f32 {
        self.sources.iter().map(|s| s.capacity()).sum()
    }
}

/// Scatter plants over a ring around the field center, each carrying a small
/// cluster of sideways-facing flowers.
pub fn generate_layout<R: Rng + ?Sized>(config: &FieldConfig, rng: &mut R) -> SceneNode {
    let plants = (0..config.plant_count)
        .map(|_| {
            let angle = rng.random::<f32>() * TAU;
            let radius = rng.random_range(config.plant_min_radius..=config.plant_max_radius);
            let origin = config.center + Vec3::new(angle.cos(), 0.0, angle.sin()) * radius;
            let flowers = (0..config.flowers_per_plant)
                .map(|i| {
                    let a = (i as f32 / config.flowers_per_plant as f32) * TAU
                        + rng.random_range(-0.3f32..=0.3);
                    let dir = Vec3::new(a.cos(), 0.0, a.sin());
                    let height = config.flower_height + rng.random_range(-0.2f32..=0.2);
                    SceneNode::source(
                        dir * config.flower_spread + Vec3::Y * height,
                        (dir + Vec3::Y * 0.3).normalize(),
                    )
                })
                .collect();
            // Flowers hang off a stem group, like the imported plant meshes.
            SceneNode::plant(origin, vec![SceneNode::group(flowers)])
        })
        .collect();
    SceneNode::group(plants)
}
