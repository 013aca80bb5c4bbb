//! Format classification for incoming asset names.
//!
//! Classification only ever looks at the textual suffix of a name. The bytes
//! behind a locator are never sniffed, and a name without a recognised suffix
//! is never mapped onto a default format.

use std::fmt::Display;

/// Suffixes accepted by the viewer, in the order they are presented to users.
pub const SUPPORTED_SUFFIXES: [&str; 4] = [".gltf", ".glb", ".obj", ".stl"];

/// The closed set of formats the decoders understand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FormatTag {
    Gltf,
    Glb,
    Obj,
    Stl,
}

impl FormatTag {
    pub const ALL: [FormatTag; 4] = [
        FormatTag::Gltf,
        FormatTag::Glb,
        FormatTag::Obj,
        FormatTag::Stl,
    ];

    /// Lowercase extension without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            FormatTag::Gltf => "gltf",
            FormatTag::Glb => "glb",
            FormatTag::Obj => "obj",
            FormatTag::Stl => "stl",
        }
    }

    /// STL carries geometry only, so its meshes always get the fallback material.
    pub fn has_materials(&self) -> bool {
        !matches!(self, FormatTag::Stl)
    }

    fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.extension() == ext)
    }
}

impl Display for FormatTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FormatTag::Gltf => "GLTF",
            FormatTag::Glb => "GLB",
            FormatTag::Obj => "OBJ",
            FormatTag::Stl => "STL",
        })
    }
}

/// Maps a file name (or any name carrying a suffix) to a [`FormatTag`].
///
/// The substring after the last `.` is lowercased and matched against the
/// supported extensions. Names without a dot, with a trailing dot or with any
/// other suffix yield `None`.
pub fn classify(name: &str) -> Option<FormatTag> {
    let (_, ext) = name.rsplit_once('.')?;
    FormatTag::from_extension(&ext.to_ascii_lowercase())
}

/// `.gltf, .glb, .obj, .stl`, ready to be appended to a user-facing message.
pub fn supported_suffixes_display() -> String {
    SUPPORTED_SUFFIXES.join(", ")
}
