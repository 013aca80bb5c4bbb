use cgmath::{InnerSpace, Vector3};

use crate::data_structures::model::ModelVertex;

/// Below this squared length a normal or tangent is considered missing.
const DEGENERATE_EPSILON: f32 = 1e-12;

/// Unit normal of the triangle `a, b, c` (counter clockwise winding), or zero
/// for degenerate triangles.
pub fn face_normal(a: Vector3<f32>, b: Vector3<f32>, c: Vector3<f32>) -> Vector3<f32> {
    let n = (b - a).cross(c - a);
    if n.magnitude2() <= DEGENERATE_EPSILON {
        Vector3::new(0.0, 0.0, 0.0)
    } else {
        n.normalize()
    }
}

fn triangle(c: &[u32], len: usize) -> Option<[usize; 3]> {
    let idx = [c[0] as usize, c[1] as usize, c[2] as usize];
    idx.iter().all(|&i| i < len).then_some(idx)
}

/// Smooth vertex normals for meshes that come without any.
///
/// Face normals are accumulated area weighted, so large faces dominate.
pub fn compute_vertex_normals(vertices: &mut [ModelVertex], indices: &[u32]) {
    let mut sums = vec![Vector3::new(0.0f32, 0.0, 0.0); vertices.len()];
    for c in indices.chunks_exact(3) {
        let Some([i0, i1, i2]) = triangle(c, vertices.len()) else {
            continue;
        };
        let p0: Vector3<f32> = vertices[i0].position.into();
        let p1: Vector3<f32> = vertices[i1].position.into();
        let p2: Vector3<f32> = vertices[i2].position.into();
        // Unnormalized cross product: its length is twice the triangle area.
        let n = (p1 - p0).cross(p2 - p0);
        sums[i0] += n;
        sums[i1] += n;
        sums[i2] += n;
    }
    for (vertex, sum) in vertices.iter_mut().zip(sums) {
        vertex.normal = if sum.magnitude2() > DEGENERATE_EPSILON {
            sum.normalize().into()
        } else {
            [0.0, 0.0, 1.0]
        };
    }
}

/**
 * Obj and STL files don't come with tangents and bitangents (and glTF files
 * only sometimes) so they have to be calculated for normal maps to work
 * correctly.
 *
 * Triangles whose UVs span no area contribute nothing. Vertices that end up
 * without a usable tangent get an arbitrary one perpendicular to their normal.
 */
pub fn compute_tangents(vertices: &mut [ModelVertex], indices: &[u32]) {
    let mut triangles_included = vec![0u32; vertices.len()];

    // Calculate tangents and bitangets. We're going to use the triangles, so
    // we need to loop through the indices in chunks of 3
    for c in indices.chunks_exact(3) {
        let Some([i0, i1, i2]) = triangle(c, vertices.len()) else {
            continue;
        };
        let v0 = vertices[i0];
        let v1 = vertices[i1];
        let v2 = vertices[i2];

        let pos0: Vector3<_> = v0.position.into();
        let pos1: Vector3<_> = v1.position.into();
        let pos2: Vector3<_> = v2.position.into();

        let uv0: cgmath::Vector2<_> = v0.tex_coords.into();
        let uv1: cgmath::Vector2<_> = v1.tex_coords.into();
        let uv2: cgmath::Vector2<_> = v2.tex_coords.into();

        // Calculate the edges of the triangle
        let delta_pos1 = pos1 - pos0;
        let delta_pos2 = pos2 - pos0;

        // This will give us a direction to calculate the tangent and bitangent
        let delta_uv1 = uv1 - uv0;
        let delta_uv2 = uv2 - uv0;

        // Solving the following system of equations will give us the tangent
        // and bitangent.
        //     delta_pos1 = delta_uv1.x * T + delta_u.y * B
        //     delta_pos2 = delta_uv2.x * T + delta_uv2.y * B
        let det = delta_uv1.x * delta_uv2.y - delta_uv1.y * delta_uv2.x;
        if det.abs() <= f32::EPSILON {
            continue;
        }
        let r = 1.0 / det;
        let tangent = (delta_pos1 * delta_uv2.y - delta_pos2 * delta_uv1.y) * r;
        // We flip the bitangent to enable right-handed normal maps with a top-left
        // texture origin
        let bitangent = (delta_pos2 * delta_uv1.x - delta_pos1 * delta_uv2.x) * -r;

        // We'll use the same tangent/bitangent for each vertex in the triangle
        for i in [i0, i1, i2] {
            vertices[i].tangent = (tangent + Vector3::from(vertices[i].tangent)).into();
            vertices[i].bitangent = (bitangent + Vector3::from(vertices[i].bitangent)).into();
            // Used to average the tangents/bitangents
            triangles_included[i] += 1;
        }
    }

    // Average the tangents/bitangents
    for (v, n) in vertices.iter_mut().zip(triangles_included) {
        if n > 0 {
            let denom = 1.0 / n as f32;
            v.tangent = (Vector3::from(v.tangent) * denom).into();
            v.bitangent = (Vector3::from(v.bitangent) * denom).into();
        }
        let tangent = Vector3::from(v.tangent);
        if n == 0 || tangent.magnitude2() <= DEGENERATE_EPSILON || !tangent.x.is_finite() {
            let (tangent, bitangent) = orthonormal_basis(v.normal.into());
            v.tangent = tangent.into();
            v.bitangent = bitangent.into();
        }
    }
}

/// Any tangent/bitangent pair that is perpendicular to `normal`.
fn orthonormal_basis(normal: Vector3<f32>) -> (Vector3<f32>, Vector3<f32>) {
    let normal = if normal.magnitude2() > DEGENERATE_EPSILON {
        normal.normalize()
    } else {
        Vector3::unit_z()
    };
    let helper = if normal.x.abs() < 0.9 {
        Vector3::unit_x()
    } else {
        Vector3::unit_y()
    };
    let tangent = helper.cross(normal).normalize();
    let bitangent = normal.cross(tangent);
    (tangent, bitangent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(position: [f32; 3], tex_coords: [f32; 2]) -> ModelVertex {
        ModelVertex {
            position,
            tex_coords,
            ..Default::default()
        }
    }

    fn all_finite(v: [f32; 3]) -> bool {
        v.iter().all(|c| c.is_finite())
    }

    #[test]
    fn face_normal_follows_right_hand_rule() {
        let n = face_normal(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        );
        assert_eq!(n, Vector3::new(0.0, 0.0, 1.0));
        let zero = Vector3::new(0.0, 0.0, 0.0);
        assert_eq!(face_normal(zero, zero, zero), zero);
    }

    #[test]
    fn vertex_normals_of_a_flat_quad() {
        let mut vertices = vec![
            vertex([0.0, 0.0, 0.0], [0.0, 0.0]),
            vertex([1.0, 0.0, 0.0], [1.0, 0.0]),
            vertex([1.0, 1.0, 0.0], [1.0, 1.0]),
            vertex([0.0, 1.0, 0.0], [0.0, 1.0]),
        ];
        compute_vertex_normals(&mut vertices, &[0, 1, 2, 0, 2, 3]);
        assert!(vertices.iter().all(|v| v.normal == [0.0, 0.0, 1.0]));
    }

    #[test]
    fn tangents_follow_the_u_direction() {
        let mut vertices = vec![
            vertex([0.0, 0.0, 0.0], [0.0, 0.0]),
            vertex([1.0, 0.0, 0.0], [1.0, 0.0]),
            vertex([0.0, 1.0, 0.0], [0.0, 1.0]),
        ];
        compute_vertex_normals(&mut vertices, &[0, 1, 2]);
        compute_tangents(&mut vertices, &[0, 1, 2]);
        for v in &vertices {
            assert!((v.tangent[0] - 1.0).abs() < 1e-6);
            assert!(v.tangent[1].abs() < 1e-6 && v.tangent[2].abs() < 1e-6);
        }
    }

    #[test]
    fn missing_uvs_still_yield_a_usable_basis() {
        let mut vertices = vec![
            vertex([0.0, 0.0, 0.0], [0.0, 0.0]),
            vertex([1.0, 0.0, 0.0], [0.0, 0.0]),
            vertex([0.0, 1.0, 0.0], [0.0, 0.0]),
        ];
        compute_vertex_normals(&mut vertices, &[0, 1, 2]);
        compute_tangents(&mut vertices, &[0, 1, 2, 0, 1, 7]);
        for v in &vertices {
            assert!(all_finite(v.tangent) && all_finite(v.bitangent));
            let t = Vector3::from(v.tangent);
            assert!((t.magnitude() - 1.0).abs() < 1e-5);
            assert!(t.dot(Vector3::from(v.normal)).abs() < 1e-5);
        }
    }
}
