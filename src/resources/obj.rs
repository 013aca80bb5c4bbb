use std::{
    io::{BufReader, Cursor},
    sync::Arc,
};

use anyhow::Context;

use crate::{
    config::LoaderConfig,
    data_structures::{
        model::{Material, Mesh, Model, ModelVertex},
        scene_graph::{ModelNode, SceneNode},
        texture::Texture,
    },
    resources::{ResourceLocator, load_binary, load_texture_or_warn, mesh},
};

/// Loads a Wavefront OBJ together with the MTL libraries it references.
///
/// All groups end up as meshes of a single [`ModelNode`]. Missing or broken
/// material libraries are not fatal, the affected meshes use
/// [`Material::fallback`] instead.
pub async fn load_model_obj(
    locator: &ResourceLocator,
    config: &LoaderConfig,
) -> anyhow::Result<Box<dyn SceneNode>> {
    let (materials, models) = load_materials(locator, config).await?;
    let meshes = load_meshes(&models, materials.len());

    let mut model = Model { meshes, materials };
    let fallback = model.materials.len();
    if model.meshes.iter().any(|m| m.material == fallback) {
        model.materials.push(Material::fallback());
    }
    log::info!(
        "OBJ {} holds {} meshes with {} triangles",
        locator,
        model.meshes.len(),
        model.triangle_count()
    );

    Ok(Box::new(ModelNode::from_model(&locator.file_stem(), model)))
}

async fn load_materials(
    locator: &ResourceLocator,
    config: &LoaderConfig,
) -> anyhow::Result<(Vec<Material>, Vec<tobj::Model>)> {
    let obj_data = load_binary(locator.as_str(), config).await?;
    let mut obj_reader = BufReader::new(Cursor::new(obj_data));

    let (models, obj_materials) = tobj::load_obj_buf_async(
        &mut obj_reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |p: String| {
            let mtl = locator.join(&p);
            async move {
                let mtl = match mtl {
                    Ok(mtl) => mtl,
                    Err(err) => {
                        log::warn!("Material library {p} is unavailable: {err:#}");
                        return Err(tobj::LoadError::OpenFileFailed);
                    }
                };
                match load_binary(mtl.as_str(), config).await {
                    Ok(mat_data) => tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(mat_data))),
                    Err(err) => {
                        log::warn!("Material library {mtl} is unavailable: {err:#}");
                        Err(tobj::LoadError::OpenFileFailed)
                    }
                }
            }
        },
    )
    .await
    .with_context(|| format!("invalid OBJ data in {locator}"))?;

    let obj_materials = match obj_materials {
        Ok(materials) => materials,
        Err(err) => {
            log::warn!("Materials of {locator} could not be read, using the fallback material: {err}");
            Vec::new()
        }
    };

    let mut materials = Vec::with_capacity(obj_materials.len());
    for m in obj_materials {
        materials.push(to_material(&m, locator, config).await);
    }
    Ok((materials, models))
}

async fn to_material(m: &tobj::Material, obj: &ResourceLocator, config: &LoaderConfig) -> Material {
    let diffuse = m.diffuse.unwrap_or([
        Material::FALLBACK_BASE_COLOR[0],
        Material::FALLBACK_BASE_COLOR[1],
        Material::FALLBACK_BASE_COLOR[2],
    ]);
    let alpha = m.dissolve.unwrap_or(1.0).clamp(0.0, 1.0);
    let material = Material::new(
        &m.name,
        [diffuse[0], diffuse[1], diffuse[2], alpha],
        Material::FALLBACK_METALLIC,
        Material::FALLBACK_ROUGHNESS,
    );
    if !config.load_textures {
        return material;
    }

    // We rather use a default normal map when none is passed instead of changing the pipeline
    let diffuse_texture = match &m.diffuse_texture {
        Some(path) => load_texture_at(obj, path, false, config).await,
        None => None,
    };
    let normal_texture = match &m.normal_texture {
        Some(path) => load_texture_at(obj, path, true, config).await,
        None => None,
    };
    material
        .with_diffuse_texture(diffuse_texture)
        .with_normal_texture(normal_texture)
}

async fn load_texture_at(
    obj: &ResourceLocator,
    path: &str,
    is_normal_map: bool,
    config: &LoaderConfig,
) -> Option<Arc<Texture>> {
    match obj.join(path) {
        Ok(texture) => load_texture_or_warn(&texture, is_normal_map, None, config).await,
        Err(err) => {
            log::warn!("Texture {path} is skipped: {err:#}");
            None
        }
    }
}

/// Converts tobj meshes, pointing meshes without a valid material at slot
/// `material_count`, where the fallback material goes.
fn load_meshes(models: &[tobj::Model], material_count: usize) -> Vec<Mesh> {
    models
        .iter()
        .filter_map(|m| {
            let vertex_count = m.mesh.positions.len() / 3;
            let mut vertices = (0..vertex_count)
                .map(|i| ModelVertex {
                    position: [
                        m.mesh.positions[i * 3],
                        m.mesh.positions[i * 3 + 1],
                        m.mesh.positions[i * 3 + 2],
                    ],
                    tex_coords: [
                        m.mesh.texcoords.get(i * 2).map_or(0.0, |f| *f),
                        1.0 - m.mesh.texcoords.get(i * 2 + 1).map_or(0.0, |f| *f),
                    ],
                    normal: [
                        m.mesh.normals.get(i * 3).map_or(0.0, |f| *f),
                        m.mesh.normals.get(i * 3 + 1).map_or(0.0, |f| *f),
                        m.mesh.normals.get(i * 3 + 2).map_or(0.0, |f| *f),
                    ],
                    // We'll calculate these later
                    tangent: [0.0; 3],
                    bitangent: [0.0; 3],
                })
                .collect::<Vec<_>>();

            let mut indices = m.mesh.indices.clone();
            indices.truncate(indices.len() - indices.len() % 3);
            if indices.iter().any(|&i| i as usize >= vertex_count) {
                log::warn!("Mesh {} references vertices that do not exist and is skipped", m.name);
                return None;
            }
            if indices.is_empty() {
                log::debug!("Mesh {} has no faces and is skipped", m.name);
                return None;
            }

            if m.mesh.normals.len() < vertex_count * 3 {
                mesh::compute_vertex_normals(&mut vertices, &indices);
            }
            mesh::compute_tangents(&mut vertices, &indices);

            let material = m
                .mesh
                .material_id
                .filter(|&id| id < material_count)
                .unwrap_or(material_count);

            Some(Mesh {
                name: m.name.clone(),
                vertices,
                indices,
                material,
            })
        })
        .collect()
}
