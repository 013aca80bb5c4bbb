//! CPU-side meshes and materials produced by the decoders.
//!
//! Vertex data is kept in the exact layout a renderer uploads, so handing a
//! mesh over is a `bytemuck` cast rather than a conversion.

use std::sync::Arc;

use crate::data_structures::texture::Texture;

/// Interleaved vertex layout shared by every decoder.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
}

/// Indexed triangle list with a material slot into [`Model::materials`].
#[derive(Clone, Debug)]
pub struct Mesh {
    pub name: String,
    pub vertices: Vec<ModelVertex>,
    /// Triangle list, three indices per face.
    pub indices: Vec<u32>,
    pub material: usize,
}

impl Mesh {
    pub fn num_elements(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.len() < 3
    }
}

/// Metallic-roughness surface description.
///
/// Textures are reference counted so several nodes can share one decoded
/// image without copying pixels.
#[derive(Clone, Debug)]
pub struct Material {
    pub name: String,
    /// Linear RGBA multiplier for the base colour texture.
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    pub emissive: [f32; 3],
    pub double_sided: bool,
    pub diffuse_texture: Option<Arc<Texture>>,
    pub normal_texture: Arc<Texture>,
}

impl Material {
    /// Light gray, `#cccccc` converted to linear.
    pub const FALLBACK_BASE_COLOR: [f32; 4] = [0.604, 0.604, 0.604, 1.0];
    pub const FALLBACK_METALLIC: f32 = 0.3;
    pub const FALLBACK_ROUGHNESS: f32 = 0.7;

    pub fn new(name: &str, base_color: [f32; 4], metallic: f32, roughness: f32) -> Self {
        Self {
            name: name.to_string(),
            base_color,
            metallic,
            roughness,
            emissive: [0.0; 3],
            double_sided: false,
            diffuse_texture: None,
            normal_texture: Arc::new(Texture::create_default_normal_map(1, 1)),
        }
    }

    /// The surface used for anything that arrives without material data.
    ///
    /// Non-metallic leaning and moderately rough so untextured geometry is
    /// never rendered black.
    pub fn fallback() -> Self {
        Self::new(
            "fallback",
            Self::FALLBACK_BASE_COLOR,
            Self::FALLBACK_METALLIC,
            Self::FALLBACK_ROUGHNESS,
        )
    }

    pub fn with_diffuse_texture(mut self, texture: Option<Arc<Texture>>) -> Self {
        self.diffuse_texture = texture;
        self
    }

    pub fn with_normal_texture(mut self, texture: Option<Arc<Texture>>) -> Self {
        if let Some(texture) = texture {
            self.normal_texture = texture;
        }
        self
    }
}

/// Geometry plus the materials its meshes refer to.
#[derive(Clone, Debug, Default)]
pub struct Model {
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
}

impl Model {
    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(Mesh::triangle_count).sum()
    }

    pub fn material_for(&self, mesh: &Mesh) -> Option<&Material> {
        self.materials.get(mesh.material)
    }
}
