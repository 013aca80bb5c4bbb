//! Camera framing for freshly loaded models.
//!
//! The camera is placed on the +Z axis of the model's bounding box center,
//! far enough away for the largest extent of the box to fit into view.

use cgmath::{Point3, Vector3};

use crate::data_structures::{bounds::BoundingVolume, scene_graph::SceneNode};

/// Camera distance in multiples of the largest bounding box extent.
pub const FRAMING_FACTOR: f32 = 2.5;

/// Extent assumed for empty, single point or otherwise degenerate geometry.
pub const MIN_FRAMING_EXTENT: f32 = 1.0;

/// Where the camera sits and what it looks at.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPose {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
}

impl CameraPose {
    pub fn distance(&self) -> f32 {
        cgmath::MetricSpace::distance(self.position, self.target)
    }

    /// Right-handed view matrix with +Y up.
    pub fn view_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::look_at_rh(self.position, self.target, Vector3::unit_y())
    }
}

/// Frames the whole hierarchy below `node`. Pure, `node` is only read.
pub fn frame(node: &dyn SceneNode) -> CameraPose {
    frame_volume(&BoundingVolume::of_node(node))
}

/// Frames a precomputed bounding volume.
pub fn frame_volume(volume: &BoundingVolume) -> CameraPose {
    let origin = Point3::new(0.0, 0.0, 0.0);
    let center = if volume.is_empty() { origin } else { volume.center() };
    let distance = volume.max_dimension() * FRAMING_FACTOR;
    let distance = if distance.is_finite() && distance > 0.0 {
        distance
    } else {
        MIN_FRAMING_EXTENT * FRAMING_FACTOR
    };

    let position = center + Vector3::new(0.0, 0.0, distance);
    if is_finite(center) && is_finite(position) {
        CameraPose { position, target: center }
    } else {
        CameraPose {
            position: origin + Vector3::new(0.0, 0.0, distance),
            target: origin,
        }
    }
}

fn is_finite(p: Point3<f32>) -> bool {
    p.x.is_finite() && p.y.is_finite() && p.z.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{SquareMatrix, Transform as _};

    #[test]
    fn unit_cube_is_framed_from_two_and_a_half_units() {
        let volume = BoundingVolume::new(Point3::new(-0.5, -0.5, -0.5), Point3::new(0.5, 0.5, 0.5));
        let pose = frame_volume(&volume);
        assert_eq!(pose.target, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(pose.position, Point3::new(0.0, 0.0, 2.5));
        assert_eq!(pose.distance(), 2.5);
    }

    #[test]
    fn camera_sits_outside_of_offset_volumes() {
        let volume = BoundingVolume::new(Point3::new(100.0, 20.0, -40.0), Point3::new(140.0, 22.0, -39.0));
        let pose = frame_volume(&volume);
        assert_eq!(pose.target, volume.center());
        assert!(pose.position.z > volume.max.z);
        assert!(!volume.contains_point(pose.position));
        assert_eq!(pose.position.z - pose.target.z, 40.0 * FRAMING_FACTOR);
    }

    #[test]
    fn degenerate_volumes_get_a_finite_distance() {
        let point = BoundingVolume::new(Point3::new(3.0, 3.0, 3.0), Point3::new(3.0, 3.0, 3.0));
        for volume in [point, BoundingVolume::empty()] {
            let pose = frame_volume(&volume);
            assert!(pose.position.x.is_finite() && pose.position.y.is_finite() && pose.position.z.is_finite());
            assert_eq!(pose.distance(), MIN_FRAMING_EXTENT * FRAMING_FACTOR);
        }
        assert_eq!(frame_volume(&BoundingVolume::empty()).target, Point3::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn far_apart_corners_still_give_a_finite_pose() {
        let volume = BoundingVolume::new(Point3::new(-3e38, 0.0, 0.0), Point3::new(3e38, 1.0, 0.0));
        let pose = frame_volume(&volume);
        for p in [pose.position, pose.target] {
            assert!(p.x.is_finite() && p.y.is_finite() && p.z.is_finite(), "{pose:?}");
        }
        assert_eq!(pose.target, Point3::new(0.0, 0.5, 0.0));
        assert!(pose.distance() > 0.0);

        // the eye would land past f32::MAX
        let volume = BoundingVolume::new(Point3::new(3e38, 3e38, 3e38), Point3::new(3.4e38, 3.4e38, 3.4e38));
        let pose = frame_volume(&volume);
        assert!(is_finite(pose.position) && is_finite(pose.target), "{pose:?}");
    }

    #[test]
    fn view_matrix_maps_target_onto_the_view_axis() {
        let pose = CameraPose {
            position: Point3::new(1.0, 2.0, 7.0),
            target: Point3::new(1.0, 2.0, 2.0),
        };
        let view = pose.view_matrix();
        assert!(view.invert().is_some());
        let in_view = view.transform_point(pose.target);
        assert!(in_view.x.abs() < 1e-5 && in_view.y.abs() < 1e-5);
        assert!((in_view.z + 5.0).abs() < 1e-5);
    }
}
