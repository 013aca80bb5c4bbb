//! Viewer data structures: scene graphs, models, textures and bounds.
//!
//! This module contains the core data types every decoder produces:
//!
//! - `scene_graph` enables hierarchical scene organization
//! - `model` contains mesh and material definitions for 3D models
//! - `texture` contains decoded RGBA textures
//! - `transform` holds per-node translation, rotation and scale
//! - `bounds` computes world space bounding volumes of a hierarchy

pub mod bounds;
pub mod model;
pub mod scene_graph;
pub mod texture;
pub mod transform;
