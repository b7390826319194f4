//! Cube scene for monocube.
//!
//! This crate provides:
//! - The hard-coded colored cube geometry
//! - A fixed perspective camera
//! - [`CubeRenderer`], the production frame backend

pub mod camera;
pub mod cube;
pub mod renderer;

pub use camera::{Camera, SceneUniforms};
pub use cube::{Vertex, CUBE_VERTICES};
pub use renderer::{CubeRenderer, CLEAR_COLOR};
