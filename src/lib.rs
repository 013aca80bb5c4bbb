//! flow-viewer
//!
//! Model ingestion and camera framing for a cross-platform 3D asset viewer.
//! A user picked file (glTF, GLB, OBJ or STL) is classified by its filename,
//! decoded into a renderer agnostic scene graph and framed by a camera pose,
//! ready to be handed to whatever renders it. Runs natively and on WASM.
//!
//! High-level modules
//! - `format`: classifies filename hints into supported formats
//! - `resources`: byte sources and the per-format decoders
//! - `data_structures`: scene graph, meshes, materials, textures and bounds
//! - `camera`: frames a decoded scene with a camera pose
//! - `session`: the load lifecycle (`Empty → Loading → Ready | Failed`)
//! - `preferences`: environment and lighting settings consumed by renderers
//! - `config`: loader settings
//! - `error`: errors surfaced to the user
//!

pub mod camera;
pub mod config;
pub mod data_structures;
pub mod error;
pub mod format;
pub mod preferences;
pub mod resources;
pub mod session;

// Re-exports commonly used types for convenience in downstream code.
pub use camera::{CameraPose, frame};
pub use config::LoaderConfig;
pub use data_structures::scene_graph::SceneNode;
pub use error::{DecodeError, LoadError, PreferenceError};
pub use format::{FormatTag, classify};
pub use preferences::{EnvironmentPreset, ScenePreferences};
pub use resources::{ResourceLocator, decode};
pub use session::{LoadSession, SessionState, SessionStatus, spawn_load};

/// Routes the `log` macros to stderr natively (filtered by `RUST_LOG`) and to
/// the browser console on the web. Calling it more than once is harmless.
#[cfg_attr(target_arch = "wasm32", wasm_bindgen::prelude::wasm_bindgen)]
pub fn init_logger() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            log::warn!("Could not initialize logger: {}", e);
        }
    }
}
