//! Error types surfaced by the load session.

use thiserror::Error;

use crate::format::{FormatTag, supported_suffixes_display};

/// A decoder rejected the payload or the locator could not be read.
///
/// `detail` keeps the complete message chain of the underlying failure so the
/// user sees what the parser or the byte source actually reported.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("failed to decode {format} model: {detail}")]
pub struct DecodeError {
    pub format: FormatTag,
    pub detail: String,
}

impl DecodeError {
    pub fn new(format: FormatTag, err: anyhow::Error) -> Self {
        Self {
            format,
            detail: format!("{err:#}"),
        }
    }
}

/// Reasons a load session ends up `Failed`.
///
/// Every message ends with the list of supported suffixes so the user knows
/// what to pick instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("unsupported file format for `{hint}` (supported formats: {})", supported_suffixes_display())]
    UnsupportedFormat { hint: String },

    #[error("{} (supported formats: {})", .0, supported_suffixes_display())]
    Decode(#[from] DecodeError),

    #[error("{format} model contains no renderable geometry (supported formats: {})", supported_suffixes_display())]
    EmptyGeometry { format: FormatTag },
}

/// Errors raised while building presentation preferences.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PreferenceError {
    #[error("unknown environment preset `{0}`")]
    UnknownPreset(String),

    #[error("light intensity {0} is outside of 0.0..=2.0")]
    IntensityOutOfRange(f32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_keeps_context_chain() {
        let err = anyhow::anyhow!("No such file or directory").context("failed to read scene.bin");
        let decode = DecodeError::new(FormatTag::Gltf, err);
        assert_eq!(decode.detail, "failed to read scene.bin: No such file or directory");
        assert!(decode.to_string().starts_with("failed to decode GLTF model"));
    }

    #[test]
    fn load_errors_list_supported_formats() {
        let unsupported = LoadError::UnsupportedFormat {
            hint: "notes.txt".into(),
        };
        let empty = LoadError::EmptyGeometry {
            format: FormatTag::Obj,
        };
        let decode = LoadError::from(DecodeError::new(
            FormatTag::Stl,
            anyhow::anyhow!("binary STL truncated"),
        ));
        assert!(decode.to_string().starts_with("failed to decode STL model: binary STL truncated"));
        for err in [unsupported, empty, decode] {
            assert!(err.to_string().ends_with("(supported formats: .gltf, .glb, .obj, .stl)"));
        }
    }
}
