//! Model files written into a scratch directory per test.

use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use base64::{Engine, engine::general_purpose::STANDARD};
use flow_viewer::LoaderConfig;

pub type Triangle = [[f32; 3]; 3];

static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

/// Scratch directory that is removed again when dropped.
pub struct AssetDir {
    path: PathBuf,
}

impl AssetDir {
    pub fn new(test: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "flow-viewer-{}-{}-{}",
            test,
            std::process::id(),
            NEXT_DIR.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&path).expect("failed to create asset dir");
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let file = self.path.join(name);
        std::fs::write(&file, contents).expect("failed to write fixture");
        file
    }

    /// Loader configuration resolving relative locators inside this dir.
    pub fn config(&self) -> LoaderConfig {
        LoaderConfig::new().with_asset_root(&self.path)
    }
}

impl Drop for AssetDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

/// Twelve triangles spanning `-0.5..=0.5` on every axis.
pub fn unit_cube() -> Vec<Triangle> {
    let h = 0.5;
    let quads = [
        [[-h, -h, h], [h, -h, h], [h, h, h], [-h, h, h]],
        [[h, -h, -h], [-h, -h, -h], [-h, h, -h], [h, h, -h]],
        [[h, -h, h], [h, -h, -h], [h, h, -h], [h, h, h]],
        [[-h, -h, -h], [-h, -h, h], [-h, h, h], [-h, h, -h]],
        [[-h, h, h], [h, h, h], [h, h, -h], [-h, h, -h]],
        [[-h, -h, -h], [h, -h, -h], [h, -h, h], [-h, -h, h]],
    ];
    quads
        .iter()
        .flat_map(|q| [[q[0], q[1], q[2]], [q[0], q[2], q[3]]])
        .collect()
}

/// Binary STL with zeroed facet normals and a header that starts with
/// `solid`, like many exporters write it.
pub fn binary_stl(triangles: &[Triangle]) -> Vec<u8> {
    let mut out = vec![0u8; 80];
    out[..18].copy_from_slice(b"solid binary cube ");
    out.extend_from_slice(&(triangles.len() as u32).to_le_bytes());
    for triangle in triangles {
        out.extend_from_slice(&[0u8; 12]);
        for vertex in triangle {
            for c in vertex {
                out.extend_from_slice(&c.to_le_bytes());
            }
        }
        out.extend_from_slice(&[0u8; 2]);
    }
    out
}

pub fn ascii_stl(name: &str, triangles: &[Triangle]) -> String {
    let mut out = format!("solid {name}\n");
    for [a, b, c] in triangles {
        out.push_str("  facet normal 0 0 0\n    outer loop\n");
        for v in [a, b, c] {
            out.push_str(&format!("      vertex {} {} {}\n", v[0], v[1], v[2]));
        }
        out.push_str("    endloop\n  endfacet\n");
    }
    out.push_str(&format!("endsolid {name}\n"));
    out
}

/// A unit quad in the XY plane, optionally with a material library.
pub fn obj_quad(mtllib: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(mtllib) = mtllib {
        out.push_str(&format!("mtllib {mtllib}\n"));
    }
    out.push_str(
        "o quad\n\
         v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
         vt 0 0\nvt 1 0\nvt 1 1\nvt 0 1\n\
         usemtl red\n\
         f 1/1 2/2 3/3 4/4\n",
    );
    out
}

pub fn red_mtl() -> &'static str {
    "newmtl red\nKd 1.0 0.0 0.0\nd 1.0\n"
}

/// One triangle, `(0,0,0) (1,0,0) (0,1,0)`, as raw little endian floats.
pub fn triangle_bin() -> Vec<u8> {
    [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]
        .iter()
        .flat_map(|f| f.to_le_bytes())
        .collect()
}

pub fn data_uri(bytes: &[u8]) -> String {
    format!("data:application/octet-stream;base64,{}", STANDARD.encode(bytes))
}

/// A parent node translated by `(10,0,0)` and scaled by 2, holding a child
/// translated by `(1,0,0)` that carries the triangle of [`triangle_bin`].
///
/// World space bounds are `(12,0,0)..(14,2,0)`. `buffer_uri` of `None`
/// references the GLB binary chunk.
pub fn nested_gltf(buffer_uri: Option<&str>) -> String {
    let uri = buffer_uri.map_or(String::new(), |uri| format!(r#", "uri": "{uri}""#));
    format!(
        r#"{{
            "asset": {{ "version": "2.0" }},
            "scene": 0,
            "scenes": [{{ "nodes": [0] }}],
            "nodes": [
                {{ "name": "parent", "translation": [10, 0, 0], "scale": [2, 2, 2], "children": [1] }},
                {{ "name": "child", "translation": [1, 0, 0], "mesh": 0 }}
            ],
            "meshes": [{{ "name": "triangle", "primitives": [{{ "attributes": {{ "POSITION": 0 }} }}] }}],
            "buffers": [{{ "byteLength": 36{uri} }}],
            "bufferViews": [{{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }}],
            "accessors": [{{
                "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                "min": [0, 0, 0], "max": [1, 1, 0]
            }}]
        }}"#
    )
}

/// Packs a JSON document and a binary chunk into a GLB container.
pub fn glb(json: &str, bin: &[u8]) -> Vec<u8> {
    let mut json = json.as_bytes().to_vec();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let mut bin = bin.to_vec();
    while bin.len() % 4 != 0 {
        bin.push(0);
    }
    let total = 12 + 8 + json.len() + 8 + bin.len();

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(&0x4E4F_534Au32.to_le_bytes());
    out.extend_from_slice(&json);
    out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    out.extend_from_slice(&0x004E_4942u32.to_le_bytes());
    out.extend_from_slice(&bin);
    out
}
