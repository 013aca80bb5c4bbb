use cgmath::{Point3, Transform as _, Vector3};

use crate::data_structures::scene_graph::{SceneNode, walk_from_root};

/// Axis aligned bounding box in world space.
///
/// A freshly created volume is empty (`min > max`) until the first point is
/// added.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingVolume {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl BoundingVolume {
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    pub fn new(point1: Point3<f32>, point2: Point3<f32>) -> Self {
        let mut volume = Self::empty();
        volume.extend(point1);
        volume.extend(point2);
        volume
    }

    /// World space bounds of every vertex below `node`, nested transforms
    /// included.
    pub fn of_node(node: &dyn SceneNode) -> Self {
        let mut volume = Self::empty();
        walk_from_root(node, &mut |n, world| {
            let Some(model) = n.model() else {
                return;
            };
            for mesh in &model.meshes {
                for vertex in &mesh.vertices {
                    volume.extend(world.transform_point(vertex.position.into()));
                }
            }
        });
        volume
    }

    /// Grows the volume to contain `point`. Non-finite points are ignored.
    pub fn extend(&mut self, point: Point3<f32>) {
        if !(point.x.is_finite() && point.y.is_finite() && point.z.is_finite()) {
            return;
        }
        self.min = Point3::new(self.min.x.min(point.x), self.min.y.min(point.y), self.min.z.min(point.z));
        self.max = Point3::new(self.max.x.max(point.x), self.max.y.max(point.y), self.max.z.max(point.z));
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Halves before adding so far apart corners cannot overflow.
    pub fn center(&self) -> Point3<f32> {
        Point3::new(
            self.min.x * 0.5 + self.max.x * 0.5,
            self.min.y * 0.5 + self.max.y * 0.5,
            self.min.z * 0.5 + self.max.z * 0.5,
        )
    }

    /// Extent along each axis.
    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    pub fn max_dimension(&self) -> f32 {
        let size = self.size();
        size.x.max(size.y).max(size.z)
    }

    pub fn contains_point(&self, point: Point3<f32>) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }
}

impl Default for BoundingVolume {
    fn default() -> Self {
        Self::empty()
    }
}
