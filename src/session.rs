//! Lifecycle of one loaded model: `Empty → Loading → Ready | Failed`.
//!
//! Loading is split in three steps so the session is never borrowed across
//! an await point:
//!
//! 1. [`LoadSession::select_file`] classifies the filename hint, moves the
//!    session to `Loading` and hands out a [`PendingLoad`].
//! 2. [`PendingLoad::run`] decodes and frames the model without touching the
//!    session.
//! 3. [`LoadSession::complete`] applies the [`LoadCompletion`], unless a newer
//!    selection or a reset made it stale.
//!
//! [`LoadSession::load`] runs all three in a row, [`spawn_load`] schedules
//! them on the host's single threaded executor.

use std::{cell::RefCell, fmt::Debug, rc::Rc, sync::Arc};

use crate::{
    camera::{self, CameraPose},
    config::LoaderConfig,
    data_structures::scene_graph::{SceneNode, triangle_count},
    error::LoadError,
    format::{FormatTag, classify},
    preferences::ScenePreferences,
    resources::{self, ResourceLocator, revoke_locator},
};

#[derive(Debug)]
pub enum SessionState {
    Empty,
    Loading {
        hint: String,
        locator: ResourceLocator,
    },
    Ready {
        hint: String,
        locator: ResourceLocator,
        node: Box<dyn SceneNode>,
        pose: CameraPose,
    },
    Failed {
        hint: String,
        error: LoadError,
    },
}

/// Coarse state for UI chrome: nothing, a spinner, the model or a banner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Loading,
    Ready,
    Failed,
}

/// A decode that was started by [`LoadSession::select_file`].
///
/// Owns everything it needs, so it can be awaited while the session keeps
/// serving render passes.
#[derive(Debug)]
pub struct PendingLoad {
    generation: u64,
    locator: ResourceLocator,
    format: FormatTag,
    config: Arc<LoaderConfig>,
}

impl PendingLoad {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn format(&self) -> FormatTag {
        self.format
    }

    pub fn locator(&self) -> &ResourceLocator {
        &self.locator
    }

    /// Decodes the asset, rejects empty geometry and frames the result.
    pub async fn run(self) -> LoadCompletion {
        let result = match resources::decode(&self.locator, self.format, &self.config).await {
            Ok(node) if triangle_count(node.as_ref()) == 0 => Err(LoadError::EmptyGeometry {
                format: self.format,
            }),
            Ok(node) => {
                let pose = camera::frame(node.as_ref());
                Ok((node, pose))
            }
            Err(err) => Err(err.into()),
        };

        LoadCompletion {
            generation: self.generation,
            locator: self.locator,
            result,
        }
    }
}

/// Outcome of a [`PendingLoad`], tagged with the generation it belongs to.
#[derive(Debug)]
pub struct LoadCompletion {
    generation: u64,
    locator: ResourceLocator,
    result: Result<(Box<dyn SceneNode>, CameraPose), LoadError>,
}

impl LoadCompletion {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct LoadSession {
    state: SessionState,
    generation: u64,
    config: Arc<LoaderConfig>,
    preferences: ScenePreferences,
}

impl LoadSession {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            state: SessionState::Empty,
            generation: 0,
            config: Arc::new(config),
            preferences: ScenePreferences::default(),
        }
    }

    /// Starts loading `locator`, superseding whatever the session held.
    ///
    /// The format comes from `hint`, the user visible filename, because
    /// locators such as object URLs carry no suffix. Returns `None` when the
    /// hint is not a supported format; the session is `Failed` then and no
    /// decoder runs.
    pub fn select_file(&mut self, hint: &str, locator: impl Into<ResourceLocator>) -> Option<PendingLoad> {
        let locator = locator.into();
        self.release();
        self.generation = self.generation.wrapping_add(1);

        let Some(format) = classify(hint) else {
            let error = LoadError::UnsupportedFormat {
                hint: hint.to_string(),
            };
            log::error!("{error}");
            revoke_locator(&locator);
            self.state = SessionState::Failed {
                hint: hint.to_string(),
                error,
            };
            return None;
        };

        log::info!("Loading {hint} as {format} from {locator}");
        self.state = SessionState::Loading {
            hint: hint.to_string(),
            locator: locator.clone(),
        };
        Some(PendingLoad {
            generation: self.generation,
            locator,
            format,
            config: Arc::clone(&self.config),
        })
    }

    /// Applies a finished load. Returns `false` and drops the result when it
    /// belongs to a superseded selection or the session was reset meanwhile.
    pub fn complete(&mut self, completion: LoadCompletion) -> bool {
        let hint = match &self.state {
            SessionState::Loading { hint, .. } if completion.generation == self.generation => hint.clone(),
            _ => {
                log::warn!(
                    "Discarding stale load of {} (generation {}, current {})",
                    completion.locator,
                    completion.generation,
                    self.generation
                );
                if !self.holds(&completion.locator) {
                    revoke_locator(&completion.locator);
                }
                return false;
            }
        };

        self.state = match completion.result {
            Ok((node, pose)) => {
                log::info!(
                    "{hint} is ready, camera at {:?} looking at {:?}",
                    pose.position,
                    pose.target
                );
                SessionState::Ready {
                    hint,
                    locator: completion.locator,
                    node,
                    pose,
                }
            }
            Err(error) => {
                log::error!("Loading {hint} failed: {error}");
                revoke_locator(&completion.locator);
                SessionState::Failed { hint, error }
            }
        };
        true
    }

    /// Selects, decodes and completes in one go.
    pub async fn load(&mut self, hint: &str, locator: impl Into<ResourceLocator>) -> &SessionState {
        if let Some(pending) = self.select_file(hint, locator) {
            let completion = pending.run().await;
            self.complete(completion);
        }
        &self.state
    }

    /// Drops the current model, if any, and returns to `Empty`. Pending
    /// loads become stale.
    pub fn reset(&mut self) {
        if matches!(self.state, SessionState::Empty) {
            return;
        }
        self.release();
        self.generation = self.generation.wrapping_add(1);
        log::info!("Session reset");
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn status(&self) -> SessionStatus {
        match self.state {
            SessionState::Empty => SessionStatus::Idle,
            SessionState::Loading { .. } => SessionStatus::Loading,
            SessionState::Ready { .. } => SessionStatus::Ready,
            SessionState::Failed { .. } => SessionStatus::Failed,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status() == SessionStatus::Loading
    }

    /// The model and its camera pose, borrowed for one render pass.
    pub fn scene(&self) -> Option<(&dyn SceneNode, &CameraPose)> {
        match &self.state {
            SessionState::Ready { node, pose, .. } => Some((node.as_ref(), pose)),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&LoadError> {
        match &self.state {
            SessionState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Human readable reason of the last failure.
    pub fn failure_message(&self) -> Option<String> {
        self.failure().map(ToString::to_string)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn preferences(&self) -> &ScenePreferences {
        &self.preferences
    }

    pub fn preferences_mut(&mut self) -> &mut ScenePreferences {
        &mut self.preferences
    }

    fn holds(&self, locator: &ResourceLocator) -> bool {
        match &self.state {
            SessionState::Loading { locator: held, .. } | SessionState::Ready { locator: held, .. } => {
                held == locator
            }
            _ => false,
        }
    }

    /// Drops the held model and revokes the locator backing it. A locator
    /// that is still being loaded is revoked once its stale result arrives.
    fn release(&mut self) {
        if let SessionState::Ready { locator, .. } = std::mem::replace(&mut self.state, SessionState::Empty) {
            revoke_locator(&locator);
        }
    }
}

impl Default for LoadSession {
    fn default() -> Self {
        Self::new(LoaderConfig::default())
    }
}

impl Debug for LoadSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadSession")
            .field("status", &self.status())
            .field("generation", &self.generation)
            .field("preferences", &self.preferences)
            .finish()
    }
}

impl Drop for LoadSession {
    fn drop(&mut self) {
        self.release();
    }
}

/// Starts loading on the host's single threaded executor and applies the
/// result to `session` once the decode resolves.
///
/// Natively this must be called from within a `tokio::task::LocalSet`.
pub fn spawn_load(session: &Rc<RefCell<LoadSession>>, hint: &str, locator: impl Into<ResourceLocator>) {
    let Some(pending) = session.borrow_mut().select_file(hint, locator) else {
        return;
    };
    let session = Rc::clone(session);
    let task = async move {
        let completion = pending.run().await;
        session.borrow_mut().complete(completion);
    };

    #[cfg(target_arch = "wasm32")]
    {
        wasm_bindgen_futures::spawn_local(task);
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        tokio::task::spawn_local(task);
    }
}
