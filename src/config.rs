use std::path::{Path, PathBuf};

/// Settings shared by every decode started from a session.
///
/// Relative locators are resolved against `asset_root` natively. On the web
/// they are resolved against the page location instead and `asset_root` is
/// ignored.
#[derive(Clone, Debug)]
pub struct LoaderConfig {
    pub asset_root: PathBuf,
    /// When disabled, image payloads referenced by materials are not fetched
    /// or decoded. Headless tooling only needs geometry.
    pub load_textures: bool,
}

impl LoaderConfig {
    pub fn new() -> Self {
        Self {
            asset_root: PathBuf::from("./assets"),
            load_textures: true,
        }
    }

    pub fn with_asset_root(mut self, root: impl AsRef<Path>) -> Self {
        self.asset_root = root.as_ref().to_path_buf();
        self
    }

    pub fn with_textures(mut self, load_textures: bool) -> Self {
        self.load_textures = load_textures;
        self
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self::new()
    }
}
