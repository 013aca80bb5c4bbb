//! Byte sources and decoder dispatch.
//!
//! A [`ResourceLocator`] names where the bytes of an asset live. This module
//! fetches those bytes (file system or HTTP natively, `fetch` on the web,
//! inline `data:` URIs everywhere), resolves sub-resources relative to their
//! parent asset and hands everything to the format specific decoders.

use std::{fmt::Display, sync::Arc};

use anyhow::{Context, bail};
use base64::{Engine, engine::general_purpose::STANDARD};
use instant::Instant;

use crate::{
    config::LoaderConfig,
    data_structures::{scene_graph::SceneNode, texture::Texture},
    error::DecodeError,
    format::FormatTag,
};

pub mod gltf_loader;
pub mod mesh;
pub mod obj;
pub mod stl;

/// Opaque reference to the bytes of an asset.
///
/// Only ever used to fetch data and to resolve sibling resources. Its text is
/// never inspected to guess a file format.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourceLocator(String);

impl ResourceLocator {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Session scoped references (`blob:` object URLs) that must be revoked
    /// once the model they point at is released.
    pub fn is_ephemeral(&self) -> bool {
        self.0.starts_with("blob:")
    }

    /// Resolves `uri` relative to the directory of this locator.
    pub fn join(&self, uri: &str) -> anyhow::Result<ResourceLocator> {
        resolve_relative(&self.0, uri).map(ResourceLocator)
    }

    /// Last path segment without its extension, used to name decoded nodes.
    pub fn file_stem(&self) -> String {
        let segment = self
            .0
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default();
        let stem = segment.rsplit_once('.').map_or(segment, |(stem, _)| stem);
        if stem.is_empty() {
            "model".to_string()
        } else {
            stem.to_string()
        }
    }
}

impl Display for ResourceLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceLocator {
    fn from(locator: &str) -> Self {
        Self::new(locator)
    }
}

impl From<String> for ResourceLocator {
    fn from(locator: String) -> Self {
        Self::new(locator)
    }
}

/// Decodes the asset behind `locator` as `format` and normalizes it into a
/// scene graph.
///
/// Every failure, from an unreachable locator to a malformed payload, comes
/// back as a [`DecodeError`] carrying the underlying message.
pub async fn decode(
    locator: &ResourceLocator,
    format: FormatTag,
    config: &LoaderConfig,
) -> Result<Box<dyn SceneNode>, DecodeError> {
    let start = Instant::now();
    let node = match format {
        FormatTag::Stl => stl::load_model_stl(locator, config).await,
        FormatTag::Obj => obj::load_model_obj(locator, config).await,
        FormatTag::Gltf | FormatTag::Glb => gltf_loader::load_model_gltf(locator, config).await,
    }
    .map_err(|err| DecodeError::new(format, err))?;
    log::debug!("decoded {} as {} in {:?}", locator, format, start.elapsed());
    Ok(node)
}

/// Resolves `uri` against the directory part of `base`.
///
/// Absolute URIs (anything with a scheme) and rooted paths are returned
/// unchanged. `data:` and `blob:` bases have no directory, so relative URIs
/// against them are an error.
pub fn resolve_relative(base: &str, uri: &str) -> anyhow::Result<String> {
    if has_scheme(uri) || uri.starts_with('/') || uri.starts_with('\\') {
        return Ok(uri.to_string());
    }
    if base.starts_with("data:") || base.starts_with("blob:") {
        bail!("relative resource `{uri}` cannot be resolved against an opaque locator");
    }
    Ok(match base.rfind(['/', '\\']) {
        Some(idx) => format!("{}{}", &base[..=idx], uri),
        None => uri.to_string(),
    })
}

fn has_scheme(uri: &str) -> bool {
    let Some((scheme, _)) = uri.split_once(':') else {
        return false;
    };
    // Single letters are Windows drive prefixes, not schemes.
    scheme.len() > 1
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn decode_data_uri(payload: &str) -> anyhow::Result<Vec<u8>> {
    let Some((meta, data)) = payload.split_once(',') else {
        bail!("malformed data URI: missing `,` separator");
    };
    if !meta.ends_with(";base64") {
        bail!("only base64 encoded data URIs are supported");
    }
    STANDARD
        .decode(data.trim())
        .context("malformed base64 payload in data URI")
}

#[cfg(target_arch = "wasm32")]
fn format_url(locator: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().context("no browser window available")?;
    let href = window
        .location()
        .href()
        .map_err(|err| anyhow::anyhow!("cannot read page location: {err:?}"))?;
    let base = reqwest::Url::parse(&href)?;
    base.join(locator)
        .with_context(|| format!("invalid locator {locator}"))
}

#[cfg(not(target_arch = "wasm32"))]
fn local_path(locator: &str, config: &LoaderConfig) -> std::path::PathBuf {
    let path = std::path::PathBuf::from(locator.strip_prefix("file://").unwrap_or(locator));
    if path.is_absolute() {
        path
    } else {
        config.asset_root.join(path)
    }
}

async fn fetch(url: reqwest::Url) -> anyhow::Result<Vec<u8>> {
    let response = reqwest::get(url.clone())
        .await
        .with_context(|| format!("failed to fetch {url}"))?
        .error_for_status()
        .with_context(|| format!("failed to fetch {url}"))?;
    let bytes = response
        .bytes()
        .await
        .with_context(|| format!("failed to read response body of {url}"))?;
    Ok(bytes.to_vec())
}

/// Reads all bytes behind `locator`.
#[cfg_attr(target_arch = "wasm32", allow(unused_variables))]
pub async fn load_binary(locator: &str, config: &LoaderConfig) -> anyhow::Result<Vec<u8>> {
    if let Some(payload) = locator.strip_prefix("data:") {
        return decode_data_uri(payload);
    }
    #[cfg(target_arch = "wasm32")]
    let data = fetch(format_url(locator)?).await?;
    #[cfg(not(target_arch = "wasm32"))]
    let data = if locator.starts_with("http://") || locator.starts_with("https://") {
        let url = reqwest::Url::parse(locator).with_context(|| format!("invalid URL {locator}"))?;
        fetch(url).await?
    } else {
        let path = local_path(locator, config);
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?
    };

    Ok(data)
}

/// Fetches and decodes an image. The extension of `locator` is used as a
/// format hint when `mime_type` is unknown.
pub async fn load_texture(
    locator: &ResourceLocator,
    is_normal_map: bool,
    mime_type: Option<&str>,
    config: &LoaderConfig,
) -> anyhow::Result<Arc<Texture>> {
    let data = load_binary(locator.as_str(), config).await?;
    let hint = mime_type.or_else(|| locator.as_str().rsplit_once('.').map(|(_, ext)| ext));
    let texture = Texture::from_bytes(&data, &locator.file_stem(), hint, is_normal_map)?;
    Ok(Arc::new(texture))
}

/// Like [`load_texture`], but a broken texture only costs the texture.
pub async fn load_texture_or_warn(
    locator: &ResourceLocator,
    is_normal_map: bool,
    mime_type: Option<&str>,
    config: &LoaderConfig,
) -> Option<Arc<Texture>> {
    match load_texture(locator, is_normal_map, mime_type, config).await {
        Ok(texture) => Some(texture),
        Err(err) => {
            log::warn!("Texture {locator} could not be loaded and is skipped: {err:#}");
            None
        }
    }
}

/// Releases the byte source behind `locator` once nothing refers to it.
///
/// Object URLs created by the browser for dropped files are revoked, all
/// other locators are left alone. Returns whether anything was revoked.
pub fn revoke_locator(locator: &ResourceLocator) -> bool {
    if !locator.is_ephemeral() {
        return false;
    }
    #[cfg(target_arch = "wasm32")]
    if let Err(err) = web_sys::Url::revoke_object_url(locator.as_str()) {
        log::warn!("Could not revoke {locator}: {err:?}");
        return false;
    }
    log::debug!("revoked {locator}");
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_siblings_of_paths_and_urls() {
        assert_eq!(resolve_relative("models/scene.gltf", "scene.bin").unwrap(), "models/scene.bin");
        assert_eq!(
            resolve_relative("https://cdn.example/a/b/duck.gltf", "tex/duck.png").unwrap(),
            "https://cdn.example/a/b/tex/duck.png"
        );
        assert_eq!(resolve_relative("C:\\assets\\duck.obj", "duck.mtl").unwrap(), "C:\\assets\\duck.mtl");
        assert_eq!(resolve_relative("duck.obj", "duck.mtl").unwrap(), "duck.mtl");
    }

    #[test]
    fn absolute_uris_are_kept() {
        assert_eq!(
            resolve_relative("models/scene.gltf", "data:application/octet-stream;base64,AAAA").unwrap(),
            "data:application/octet-stream;base64,AAAA"
        );
        assert_eq!(resolve_relative("models/scene.gltf", "/abs/scene.bin").unwrap(), "/abs/scene.bin");
        assert_eq!(
            resolve_relative("blob:http://localhost/1234", "https://cdn.example/scene.bin").unwrap(),
            "https://cdn.example/scene.bin"
        );
    }

    #[test]
    fn relative_uris_against_opaque_locators_fail() {
        for base in ["blob:http://localhost/1234", "data:model/gltf+json;base64,e30="] {
            let err = ResourceLocator::from(base).join("scene.bin").unwrap_err();
            assert_eq!(
                err.to_string(),
                "relative resource `scene.bin` cannot be resolved against an opaque locator"
            );
        }
    }

    #[test]
    fn data_uris_decode_base64_only() {
        assert_eq!(decode_data_uri("application/octet-stream;base64,AQID").unwrap(), vec![1, 2, 3]);
        assert!(decode_data_uri("text/plain,hello").is_err());
        assert!(decode_data_uri("no separator").is_err());
        assert!(decode_data_uri(";base64,***").is_err());
    }

    #[test]
    fn locator_stems_and_ephemerality() {
        assert_eq!(ResourceLocator::from("assets/cube.stl").file_stem(), "cube");
        assert_eq!(ResourceLocator::from("blob:http://localhost/1234").file_stem(), "1234");
        assert_eq!(ResourceLocator::from("dir/").file_stem(), "model");
        assert!(ResourceLocator::from("blob:http://localhost/1234").is_ephemeral());
        assert!(!ResourceLocator::from("cube.stl").is_ephemeral());
        assert!(revoke_locator(&ResourceLocator::from("blob:http://localhost/1234")));
        assert!(!revoke_locator(&ResourceLocator::from("cube.stl")));
    }

    #[tokio::test]
    async fn missing_files_report_the_path() {
        let config = LoaderConfig::new().with_asset_root(std::env::temp_dir());
        let err = load_binary("definitely-missing-7f3a.stl", &config)
            .await
            .unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("failed to read"));
        assert!(message.contains("definitely-missing-7f3a.stl"));
    }

    #[tokio::test]
    async fn data_uris_need_no_io() {
        let data = load_binary("data:;base64,AQID", &LoaderConfig::new()).await.unwrap();
        assert_eq!(data, vec![1, 2, 3]);
    }
}
