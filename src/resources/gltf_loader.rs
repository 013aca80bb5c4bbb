//! glTF 2.0 decoding, both the JSON (`.gltf`) and the binary (`.glb`)
//! container.
//!
//! The node hierarchy of the default scene is kept as is: every glTF node
//! becomes a [`SceneNode`] with the node's decomposed transform, nodes with a
//! mesh become [`ModelNode`]s.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use anyhow::{Context, Result, bail, ensure};
use futures::future::{join_all, try_join_all};

use crate::{
    config::LoaderConfig,
    data_structures::{
        model::{Material, Mesh, Model, ModelVertex},
        scene_graph::{ContainerNode, ModelNode, SceneNode},
        texture::Texture,
        transform::Transform,
    },
    resources::{ResourceLocator, load_binary, mesh},
};

/// Node hierarchies deeper than this are rejected instead of recursing.
const MAX_NODE_DEPTH: usize = 256;

pub async fn load_model_gltf(
    locator: &ResourceLocator,
    config: &LoaderConfig,
) -> Result<Box<dyn SceneNode>> {
    let data = load_binary(locator.as_str(), config).await?;
    parse_gltf(&data, locator, config).await
}

/// Decodes an in-memory glTF or GLB payload. Sub-resources are resolved
/// relative to `locator`.
pub async fn parse_gltf(
    data: &[u8],
    locator: &ResourceLocator,
    config: &LoaderConfig,
) -> Result<Box<dyn SceneNode>> {
    let gltf = gltf::Gltf::from_slice(data).context("invalid glTF document")?;

    let buffers = load_buffers(&gltf, locator, config).await?;
    validate_layout(&gltf)?;
    let images = if config.load_textures {
        load_images(&gltf, &buffers, locator, config).await
    } else {
        vec![None; gltf.images().count()]
    };
    let materials: Vec<Material> = gltf
        .materials()
        .map(|material| to_material(&material, &images))
        .collect();

    let Some(scene) = gltf.default_scene().or_else(|| gltf.scenes().next()) else {
        bail!("glTF document contains no scene");
    };
    let mut root = ContainerNode::new(scene.name().unwrap_or(&locator.file_stem()));
    for node in scene.nodes() {
        root.add_child(to_scene_node(&node, &buffers, &materials, 0)?);
    }
    log::info!(
        "glTF {} holds {} buffers, {} materials and {} root nodes",
        locator,
        buffers.len(),
        materials.len(),
        root.children.len()
    );

    Ok(Box::new(root))
}

async fn load_buffers(
    gltf: &gltf::Gltf,
    locator: &ResourceLocator,
    config: &LoaderConfig,
) -> Result<Vec<Vec<u8>>> {
    try_join_all(gltf.buffers().map(|buffer| async move {
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => gltf
                .blob
                .clone()
                .context("GLB binary chunk is missing")?,
            gltf::buffer::Source::Uri(uri) => {
                let uri = locator
                    .join(uri)
                    .with_context(|| format!("failed to load buffer {}", buffer.index()))?;
                load_binary(uri.as_str(), config)
                    .await
                    .with_context(|| format!("failed to load buffer {}", buffer.index()))?
            }
        };
        ensure!(
            data.len() >= buffer.length(),
            "buffer {} holds {} bytes but declares {}",
            buffer.index(),
            data.len(),
            buffer.length()
        );
        Ok::<_, anyhow::Error>(data)
    }))
    .await
}

/// Rejects buffer views and accessors that reach past the data they slice.
fn validate_layout(gltf: &gltf::Gltf) -> Result<()> {
    for view in gltf.views() {
        let end = view.offset().checked_add(view.length());
        ensure!(
            end.is_some_and(|end| end <= view.buffer().length()),
            "buffer view {} ({} bytes at offset {}) exceeds buffer {} of {} bytes",
            view.index(),
            view.length(),
            view.offset(),
            view.buffer().index(),
            view.buffer().length()
        );
    }
    for accessor in gltf.accessors() {
        let Some(view) = accessor.view() else {
            continue;
        };
        if accessor.count() == 0 {
            continue;
        }
        let stride = view.stride().unwrap_or(accessor.size());
        let end = (accessor.count() - 1)
            .checked_mul(stride)
            .and_then(|n| n.checked_add(accessor.offset()))
            .and_then(|n| n.checked_add(accessor.size()));
        ensure!(
            end.is_some_and(|end| end <= view.length()),
            "accessor {} ({} elements) exceeds buffer view {} of {} bytes",
            accessor.index(),
            accessor.count(),
            view.index(),
            view.length()
        );
    }
    Ok(())
}

/// Decodes every image of the document. Images that fail to load are logged
/// and left out, the materials using them render without that texture.
async fn load_images(
    gltf: &gltf::Gltf,
    buffers: &[Vec<u8>],
    locator: &ResourceLocator,
    config: &LoaderConfig,
) -> Vec<Option<Arc<Texture>>> {
    let normal_maps: HashSet<usize> = gltf
        .materials()
        .filter_map(|m| m.normal_texture())
        .map(|n| n.texture().source().index())
        .collect();

    join_all(gltf.images().map(|image| {
        let is_normal_map = normal_maps.contains(&image.index());
        async move {
            let label = image
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{}#image{}", locator.file_stem(), image.index()));
            let texture = match image.source() {
                gltf::image::Source::View { view, mime_type } => {
                    image_view_bytes(&view, buffers).and_then(|bytes| {
                        Texture::from_bytes(bytes, &label, Some(mime_type), is_normal_map)
                    })
                }
                gltf::image::Source::Uri { uri, mime_type } => {
                    match locator.join(uri) {
                        Ok(uri) => match load_binary(uri.as_str(), config).await {
                            Ok(bytes) => {
                                let hint = mime_type.or_else(|| uri.as_str().rsplit_once('.').map(|(_, ext)| ext));
                                Texture::from_bytes(&bytes, &label, hint, is_normal_map)
                            }
                            Err(err) => Err(err),
                        },
                        Err(err) => Err(err),
                    }
                }
            };
            match texture {
                Ok(texture) => Some(Arc::new(texture)),
                Err(err) => {
                    log::warn!("Image {label} could not be loaded and is skipped: {err:#}");
                    None
                }
            }
        }
    }))
    .await
}

fn image_view_bytes<'b>(view: &gltf::buffer::View, buffers: &'b [Vec<u8>]) -> Result<&'b [u8]> {
    let buffer = buffers
        .get(view.buffer().index())
        .context("image references a missing buffer")?;
    let end = view
        .offset()
        .checked_add(view.length())
        .context("image buffer view exceeds its buffer")?;
    buffer
        .get(view.offset()..end)
        .context("image buffer view exceeds its buffer")
}

fn to_material(material: &gltf::Material, images: &[Option<Arc<Texture>>]) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let image_of = |texture: gltf::Texture| images.get(texture.source().index()).cloned().flatten();
    let name = material
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("material{}", material.index().unwrap_or_default()));

    let mut result = Material::new(
        &name,
        pbr.base_color_factor(),
        pbr.metallic_factor(),
        pbr.roughness_factor(),
    )
    .with_diffuse_texture(pbr.base_color_texture().and_then(|info| image_of(info.texture())))
    .with_normal_texture(material.normal_texture().and_then(|n| image_of(n.texture())));
    result.emissive = material.emissive_factor();
    result.double_sided = material.double_sided();
    result
}

fn to_scene_node(
    node: &gltf::Node,
    buffers: &[Vec<u8>],
    materials: &[Material],
    depth: usize,
) -> Result<Box<dyn SceneNode>> {
    ensure!(
        depth < MAX_NODE_DEPTH,
        "node hierarchy is deeper than {MAX_NODE_DEPTH} levels"
    );
    let name = node
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node{}", node.index()));

    let model = node
        .mesh()
        .map(|mesh| to_model(&mesh, buffers, materials))
        .transpose()?
        .filter(|model| !model.meshes.is_empty());
    let mut scene_node: Box<dyn SceneNode> = match model {
        Some(model) => Box::new(ModelNode::from_model(&name, model)),
        None => Box::new(ContainerNode::new(&name)),
    };

    let (translation, rotation, scale) = node.transform().decomposed();
    scene_node.set_local_transform(Transform::from_trs(translation, rotation, scale));
    for child in node.children() {
        scene_node.add_child(to_scene_node(&child, buffers, materials, depth + 1)?);
    }

    Ok(scene_node)
}

/// Converts all primitives of `mesh`. The model only carries the materials
/// its primitives use, primitives without one share the fallback material.
fn to_model(mesh: &gltf::Mesh, buffers: &[Vec<u8>], materials: &[Material]) -> Result<Model> {
    let mut model = Model::default();
    let mut slots: HashMap<Option<usize>, usize> = HashMap::new();

    for primitive in mesh.primitives() {
        let material_index = primitive.material().index();
        let material = match slots.get(&material_index) {
            Some(&slot) => slot,
            None => {
                let material = material_index
                    .and_then(|i| materials.get(i).cloned())
                    .unwrap_or_else(Material::fallback);
                model.materials.push(material);
                slots.insert(material_index, model.materials.len() - 1);
                model.materials.len() - 1
            }
        };
        if let Some(mesh) = to_mesh(mesh, &primitive, buffers, material)? {
            model.meshes.push(mesh);
        }
    }

    Ok(model)
}

fn to_mesh(
    mesh: &gltf::Mesh,
    primitive: &gltf::Primitive,
    buffers: &[Vec<u8>],
    material: usize,
) -> Result<Option<Mesh>> {
    let name = format!(
        "{}#{}",
        mesh.name().unwrap_or("mesh"),
        primitive.index()
    );
    let mode = primitive.mode();
    if !matches!(
        mode,
        gltf::mesh::Mode::Triangles | gltf::mesh::Mode::TriangleStrip | gltf::mesh::Mode::TriangleFan
    ) {
        log::warn!("Primitive {name} uses {mode:?} and is skipped, only triangles are supported");
        return Ok(None);
    }

    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

    let Some(accessor) = primitive.get(&gltf::mesh::Semantic::Positions) else {
        log::warn!("Primitive {name} has no positions and is skipped");
        return Ok(None);
    };
    let Some(positions) = reader.read_positions() else {
        bail!(
            "primitive {name} has unreadable positions (accessor {})",
            accessor.index()
        );
    };
    let mut vertices: Vec<ModelVertex> = positions
        .map(|position| ModelVertex {
            position,
            ..Default::default()
        })
        .collect();
    ensure!(
        vertices.len() == accessor.count(),
        "primitive {name} yields {} of {} positions (accessor {})",
        vertices.len(),
        accessor.count(),
        accessor.index()
    );

    let has_normals = match reader.read_normals() {
        Some(normals) => {
            for (vertex, normal) in vertices.iter_mut().zip(normals) {
                vertex.normal = normal;
            }
            true
        }
        None => false,
    };
    if let Some(tex_coords) = reader.read_tex_coords(0).map(|v| v.into_f32()) {
        for (vertex, tex_coord) in vertices.iter_mut().zip(tex_coords) {
            vertex.tex_coords = tex_coord;
        }
    }

    let raw_indices = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..vertices.len() as u32).collect(),
    };
    let indices = triangulate(mode, raw_indices);
    if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
        bail!(
            "primitive {name} references vertex {bad} but only has {}",
            vertices.len()
        );
    }

    if !has_normals {
        mesh::compute_vertex_normals(&mut vertices, &indices);
    }
    match reader.read_tangents() {
        Some(tangents) => {
            for (vertex, tangent) in vertices.iter_mut().zip(tangents) {
                // GLTF represents tangents as vec4 where the 4th elem can be used to calculate the bitangent
                let tangent: cgmath::Vector4<f32> = tangent.into();
                let normal: cgmath::Vector3<f32> = vertex.normal.into();
                vertex.tangent = tangent.truncate().into();
                vertex.bitangent = (normal.cross(tangent.truncate()) * tangent.w).into();
            }
        }
        None => mesh::compute_tangents(&mut vertices, &indices),
    }

    Ok(Some(Mesh {
        name,
        vertices,
        indices,
        material,
    }))
}

/// Turns strip and fan index sequences into a plain triangle list.
fn triangulate(mode: gltf::mesh::Mode, indices: Vec<u32>) -> Vec<u32> {
    match mode {
        gltf::mesh::Mode::TriangleStrip => (0..indices.len().saturating_sub(2))
            .flat_map(|i| {
                // Every second triangle is flipped to keep the winding.
                if i % 2 == 0 {
                    [indices[i], indices[i + 1], indices[i + 2]]
                } else {
                    [indices[i + 1], indices[i], indices[i + 2]]
                }
            })
            .collect(),
        gltf::mesh::Mode::TriangleFan => (1..indices.len().saturating_sub(1))
            .flat_map(|i| [indices[0], indices[i], indices[i + 1]])
            .collect(),
        _ => {
            let mut indices = indices;
            indices.truncate(indices.len() - indices.len() % 3);
            indices
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine, engine::general_purpose::STANDARD};
    use gltf::mesh::Mode;

    fn triangle_buffer() -> String {
        let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let bytes: Vec<u8> = positions.iter().flat_map(|f| f.to_le_bytes()).collect();
        format!("data:application/octet-stream;base64,{}", STANDARD.encode(bytes))
    }

    fn document(primitive_extra: &str, materials: &str) -> String {
        format!(
            r#"{{
                "asset": {{ "version": "2.0" }},
                "scene": 0,
                "scenes": [{{ "nodes": [0] }}],
                "nodes": [{{ "name": "tri", "mesh": 0, "translation": [0, 0, -3] }}],
                "meshes": [{{ "primitives": [{{ "attributes": {{ "POSITION": 0 }}{primitive_extra} }}] }}],
                {materials}
                "buffers": [{{ "byteLength": 36, "uri": "{}" }}],
                "bufferViews": [{{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }}],
                "accessors": [{{
                    "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                    "min": [0, 0, 0], "max": [1, 1, 0]
                }}]
            }}"#,
            triangle_buffer()
        )
    }

    #[test]
    fn strips_and_fans_become_lists() {
        assert_eq!(triangulate(Mode::TriangleStrip, vec![0, 1, 2, 3]), vec![0, 1, 2, 2, 1, 3]);
        assert_eq!(triangulate(Mode::TriangleFan, vec![0, 1, 2, 3]), vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(triangulate(Mode::Triangles, vec![0, 1, 2, 3]), vec![0, 1, 2]);
        assert!(triangulate(Mode::TriangleStrip, vec![0, 1]).is_empty());
    }

    #[tokio::test]
    async fn unindexed_primitive_without_material_uses_the_fallback() {
        let json = document("", "");
        let root = parse_gltf(json.as_bytes(), &"scene.gltf".into(), &LoaderConfig::new())
            .await
            .unwrap();
        let node = &root.get_children()[0];
        assert_eq!(node.name(), "tri");
        assert_eq!(node.get_local_transform().position, cgmath::Vector3::new(0.0, 0.0, -3.0));

        let model = node.model().unwrap();
        assert_eq!(model.meshes[0].indices, vec![0, 1, 2]);
        assert_eq!(model.materials.len(), 1);
        assert_eq!(model.materials[0].base_color, Material::FALLBACK_BASE_COLOR);
        // normals were computed from the winding
        assert_eq!(model.meshes[0].vertices[0].normal, [0.0, 0.0, 1.0]);
    }

    #[tokio::test]
    async fn material_factors_are_carried_over() {
        let materials = r#""materials": [{
            "name": "red",
            "doubleSided": true,
            "emissiveFactor": [0.5, 0, 0],
            "pbrMetallicRoughness": { "baseColorFactor": [1, 0, 0, 1], "metallicFactor": 0.1, "roughnessFactor": 0.9 }
        }],"#;
        let json = document(r#", "material": 0"#, materials);
        let root = parse_gltf(json.as_bytes(), &"scene.gltf".into(), &LoaderConfig::new())
            .await
            .unwrap();
        let model = root.get_children()[0].model().unwrap();
        let material = model.material_for(&model.meshes[0]).unwrap();
        assert_eq!(material.name, "red");
        assert_eq!(material.base_color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(material.metallic, 0.1);
        assert_eq!(material.roughness, 0.9);
        assert_eq!(material.emissive, [0.5, 0.0, 0.0]);
        assert!(material.double_sided);
    }

    #[tokio::test]
    async fn line_primitives_are_skipped() {
        let json = document(r#", "mode": 1"#, "");
        let root = parse_gltf(json.as_bytes(), &"scene.gltf".into(), &LoaderConfig::new())
            .await
            .unwrap();
        let node = &root.get_children()[0];
        assert!(node.model().is_none());
    }

    #[tokio::test]
    async fn views_past_their_buffer_are_decode_errors() {
        let shifted = document("", "").replace(
            r#""byteOffset": 0, "byteLength": 36"#,
            r#""byteOffset": 64, "byteLength": 36"#,
        );
        let oversized = document("", "").replace(r#""byteLength": 36 }]"#, r#""byteLength": 1000 }]"#);
        for json in [shifted, oversized] {
            let err = parse_gltf(json.as_bytes(), &"scene.gltf".into(), &LoaderConfig::new())
                .await
                .unwrap_err();
            assert!(format!("{err:#}").contains("exceeds buffer 0"), "{err:#}");
        }
    }

    #[tokio::test]
    async fn accessors_past_their_view_are_decode_errors() {
        let json = document("", "").replace(r#""count": 3"#, r#""count": 100"#);
        let err = parse_gltf(json.as_bytes(), &"scene.gltf".into(), &LoaderConfig::new())
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("accessor 0"), "{err:#}");
    }

    #[tokio::test]
    async fn relative_buffers_of_dropped_files_are_decode_errors() {
        let json = document("", "").replace(&triangle_buffer(), "scene.bin");
        let err = parse_gltf(json.as_bytes(), &"blob:http://localhost/1".into(), &LoaderConfig::new())
            .await
            .unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("failed to load buffer 0"), "{message}");
        assert!(
            message.contains("relative resource `scene.bin` cannot be resolved against an opaque locator"),
            "{message}"
        );
    }

    #[tokio::test]
    async fn garbage_is_rejected() {
        let err = parse_gltf(b"{ not json", &"scene.gltf".into(), &LoaderConfig::new())
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("invalid glTF document"));
    }
}
