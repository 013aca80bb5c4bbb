//! Decoded texture images.
//!
//! Textures referenced by materials are decoded to tightly packed RGBA8 on
//! the CPU. Uploading them is up to the renderer, which also decides on the
//! colour space via [`Texture::is_normal_map`].

use anyhow::*;
use image::{GenericImageView, ImageFormat, load_from_memory_with_format};

/// A decoded RGBA8 image plus the bits the renderer needs to upload it.
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub label: String,
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA8 pixels, `width * height * 4` bytes.
    pub rgba: Vec<u8>,
    /// Normal maps are sampled as linear data, colour maps as sRGB.
    pub is_normal_map: bool,
}

impl Texture {
    /// Create a default normal map (neutral blue, representing no deformation).
    ///
    /// Materials without a normal texture get one of these so the renderer
    /// can keep a single pipeline layout.
    pub fn create_default_normal_map(width: u32, height: u32) -> Texture {
        let width = width.max(1);
        let height = height.max(1);
        // The blue/purple-ish colour that represents the default for normal maps
        let rgba: Vec<u8> = [127, 127, 255, 255]
            .iter()
            .cycle()
            .take(width as usize * height as usize * 4)
            .copied()
            .collect();

        Texture {
            label: "default normal map".to_string(),
            width,
            height,
            rgba,
            is_normal_map: true,
        }
    }

    /// Decode a texture from raw image file contents.
    ///
    /// # Arguments
    ///
    /// * `bytes` are the raw image file data (PNG, JPEG, etc.)
    /// * `label` names the texture in logs and for the renderer
    /// * `format` is an optional hint, either a file extension (`"png"`) or a
    ///   mime type (`"image/png"`). Unknown hints fall back to sniffing.
    /// * `is_normal_map` marks the data as linear instead of sRGB
    pub fn from_bytes(
        bytes: &[u8],
        label: &str,
        format: Option<&str>,
        is_normal_map: bool,
    ) -> Result<Self> {
        let img = match format.and_then(image_format_from_hint) {
            None => image::load_from_memory(bytes),
            Some(fmt) => load_from_memory_with_format(bytes, fmt),
        }
        .with_context(|| format!("failed to decode texture {label}"))?;
        Ok(Self::from_image(&img, label, is_normal_map))
    }

    pub fn from_image(img: &image::DynamicImage, label: &str, is_normal_map: bool) -> Self {
        let (width, height) = img.dimensions();
        Self {
            label: label.to_string(),
            width,
            height,
            rgba: img.to_rgba8().into_raw(),
            is_normal_map,
        }
    }
}

fn image_format_from_hint(hint: &str) -> Option<ImageFormat> {
    if hint.contains('/') {
        ImageFormat::from_mime_type(hint)
    } else {
        ImageFormat::from_extension(hint)
    }
}
