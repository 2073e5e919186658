use crate::field::ResourceField;
use glam::Vec3;
use rstar::primitives::GeomWithData;
use rstar::RTree;

/// Origin of an active source, tagged with its index in the field.
pub type SourceLocation = GeomWithData<[f32; 3], usize>;

/// Collider sphere center tagged with its radius.
pub type ColliderSphere = GeomWithData<[f32; 3], f32>;

/// Build an R*-tree over the sources that still hold nectar (bulk_load, O(n log n)).
pub fn build_active_index(field: &ResourceField) -> RTree<SourceLocation> {
    let locations = field
        .sources()
        .iter()
        .enumerate()
        .filter(|(_, s)| s.has_nectar())
        .map(|(idx, s)| SourceLocation::new(s.position().to_array(), idx))
        .collect();
    RTree::bulk_load(locations)
}

/// Index of the source with nectar closest to `point`, or `None` when all are empty.
pub fn nearest_active(field: &ResourceField, point: Vec3) -> Option<usize> {
    build_active_index(field)
        .nearest_neighbor(&point.to_array())
        .map(|loc| loc.data)
}

/// Answers whether a probe sphere would overlap anything solid.
pub trait OverlapProbe {
    fn is_occupied(&self, center: Vec3, radius: f32) -> bool;
}

/// Static snapshot of enabled colliders for spawn placement.
pub struct ColliderIndex {
    tree: RTree<ColliderSphere>,
    max_radius: f32,
}

impl ColliderIndex {
    /// Every enabled flower body and feeding collider in `field`.
    pub fn from_field(field: &ResourceField) -> Self {
        let mut spheres = Vec::with_capacity(field.len() * 2);
        for source in field.sources() {
            if source.body_enabled() {
                spheres.push(ColliderSphere::new(
                    source.position().to_array(),
                    source.body_radius(),
                ));
            }
            if source.feeding_enabled() {
                spheres.push(ColliderSphere::new(
                    source.feeding_point().to_array(),
                    source.feeding_radius(),
                ));
            }
        }
        Self::from_spheres(spheres)
    }

    pub fn from_spheres(spheres: Vec<ColliderSphere>) -> Self {
        let max_radius = spheres.iter().map(|s| s.data).fold(0.0f32, f32::max);
        Self {
            tree: RTree::bulk_load(spheres),
            max_radius,
        }
    }

    /// Add extra spheres, e.g. other agents' bodies.
    pub fn with_spheres(self, extra: impl IntoIterator<Item = (Vec3, f32)>) -> Self {
        let mut spheres: Vec<ColliderSphere> = self.tree.iter().cloned().collect();
        spheres.extend(extra.into_iter().map(|(c, r)| ColliderSphere::new(c.to_array(), r)));
        Self::from_spheres(spheres)
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

impl OverlapProbe for ColliderIndex {
    fn is_occupied(&self, center: Vec3, radius: f32) -> bool {
        let reach = radius + self.max_radius;
        self.tree
            .locate_within_distance(center.to_array(), reach * reach)
            .any(|sphere| {
                let c = Vec3::from_array(*sphere.geom());
                c.distance(center) < radius + sphere.data
            })
    }
}
