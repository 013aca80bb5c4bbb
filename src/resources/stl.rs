//! STL decoding (binary and ASCII).
//!
//! STL only stores triangles with facet normals, so every decoded model is a
//! single mesh with the fallback material.

use anyhow::{Context, Result, bail, ensure};
use cgmath::{InnerSpace, Vector3};

use crate::{
    config::LoaderConfig,
    data_structures::{
        model::{Material, Mesh, Model, ModelVertex},
        scene_graph::{ModelNode, SceneNode},
    },
    resources::{ResourceLocator, load_binary, mesh},
};

const HEADER_LEN: usize = 80;
/// Header plus the little endian triangle count.
const PREAMBLE_LEN: usize = HEADER_LEN + 4;
/// Normal, three vertices and the attribute byte count.
const FACET_LEN: usize = 50;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Facet {
    normal: [f32; 3],
    vertices: [[f32; 3]; 3],
}

pub async fn load_model_stl(
    locator: &ResourceLocator,
    config: &LoaderConfig,
) -> Result<Box<dyn SceneNode>> {
    let data = load_binary(locator.as_str(), config).await?;
    let name = locator.file_stem();
    let mesh = parse_stl(&data, &name)?;
    log::info!("STL {} holds {} triangles", locator, mesh.triangle_count());

    let model = Model {
        meshes: vec![mesh],
        materials: vec![Material::fallback()],
    };
    Ok(Box::new(ModelNode::from_model(&name, model)))
}

/// Decodes an STL payload into a single mesh using material slot 0.
pub fn parse_stl(data: &[u8], name: &str) -> Result<Mesh> {
    let facets = if is_binary_stl(data) {
        parse_binary_stl(data)?
    } else if starts_with_solid(data) {
        parse_ascii_stl(data).context("failed to parse ASCII STL")?
    } else {
        parse_binary_stl(data)?
    };
    Ok(facets_to_mesh(name, &facets))
}

/// A binary STL is recognised by its size matching the declared triangle
/// count exactly, which is more reliable than the `solid` keyword: many
/// exporters write `solid` into binary headers too.
fn is_binary_stl(data: &[u8]) -> bool {
    match binary_len(data) {
        Some(expected) => expected == data.len(),
        None => false,
    }
}

fn binary_len(data: &[u8]) -> Option<usize> {
    let count = data.get(HEADER_LEN..PREAMBLE_LEN)?;
    let count = u32::from_le_bytes([count[0], count[1], count[2], count[3]]) as usize;
    count.checked_mul(FACET_LEN)?.checked_add(PREAMBLE_LEN)
}

fn starts_with_solid(data: &[u8]) -> bool {
    let first = data.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(data.len());
    data[first..].starts_with(b"solid")
}

fn read_vec3(bytes: &[u8]) -> [f32; 3] {
    let f = |i: usize| f32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
    [f(0), f(4), f(8)]
}

fn parse_binary_stl(data: &[u8]) -> Result<Vec<Facet>> {
    ensure!(
        data.len() >= PREAMBLE_LEN,
        "binary STL too short: {} bytes, at least {} expected",
        data.len(),
        PREAMBLE_LEN
    );
    let Some(expected) = binary_len(data) else {
        bail!("binary STL declares an impossible triangle count");
    };
    let count = (expected - PREAMBLE_LEN) / FACET_LEN;
    ensure!(
        data.len() >= expected,
        "binary STL truncated: {} triangles need {} bytes, got {}",
        count,
        expected,
        data.len()
    );

    Ok(data[PREAMBLE_LEN..expected]
        .chunks_exact(FACET_LEN)
        .map(|record| Facet {
            normal: read_vec3(&record[0..12]),
            vertices: [
                read_vec3(&record[12..24]),
                read_vec3(&record[24..36]),
                read_vec3(&record[36..48]),
            ],
        })
        .collect())
}

fn parse_floats(parts: &[&str], line_no: usize) -> Result<[f32; 3]> {
    ensure!(parts.len() >= 3, "line {line_no}: expected three coordinates");
    let mut out = [0.0; 3];
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = part
            .parse()
            .with_context(|| format!("line {line_no}: invalid number `{part}`"))?;
    }
    Ok(out)
}

fn parse_ascii_stl(data: &[u8]) -> Result<Vec<Facet>> {
    let text = std::str::from_utf8(data).context("ASCII STL is not valid UTF-8")?;
    let mut facets = Vec::new();
    let mut normal = [0.0; 3];
    let mut vertices: Vec<[f32; 3]> = Vec::with_capacity(3);

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            ["facet", "normal", rest @ ..] => {
                normal = parse_floats(rest, line_no)?;
                vertices.clear();
            }
            ["vertex", rest @ ..] => {
                ensure!(vertices.len() < 3, "line {line_no}: facet has more than three vertices");
                vertices.push(parse_floats(rest, line_no)?);
            }
            ["endfacet", ..] => {
                ensure!(
                    vertices.len() == 3,
                    "line {line_no}: facet has {} vertices instead of three",
                    vertices.len()
                );
                facets.push(Facet {
                    normal,
                    vertices: [vertices[0], vertices[1], vertices[2]],
                });
                vertices.clear();
            }
            _ => {}
        }
    }
    ensure!(vertices.is_empty(), "unterminated facet at end of file");

    Ok(facets)
}

fn facets_to_mesh(name: &str, facets: &[Facet]) -> Mesh {
    let mut vertices = Vec::with_capacity(facets.len() * 3);
    for facet in facets {
        let [a, b, c] = facet.vertices.map(Vector3::from);
        let stored = Vector3::from(facet.normal);
        let normal = if stored.magnitude2() > 1e-12 && stored.x.is_finite() && stored.y.is_finite() && stored.z.is_finite() {
            stored.normalize()
        } else {
            mesh::face_normal(a, b, c)
        };
        for position in facet.vertices {
            vertices.push(ModelVertex {
                position,
                normal: normal.into(),
                ..Default::default()
            });
        }
    }
    let indices: Vec<u32> = (0..vertices.len() as u32).collect();
    mesh::compute_tangents(&mut vertices, &indices);

    Mesh {
        name: name.to_string(),
        vertices,
        indices,
        material: 0,
    }
}
