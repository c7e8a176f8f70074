//! `aero-gles` implements a subset of OpenGL ES 2.0 on top of an object-based GPU API.
//!
//! GL is a global state machine; the target API wants explicit state objects, pipelines and
//! vertex streams. This crate bridges the two:
//! - [`GlContext`] mirrors GL's implicit state and translates it lazily into native objects.
//! - [`backend::GpuBackend`] is the target seam, with a `wgpu` implementation and a recording
//!   implementation for tests.
//! - Vertex data of every draw is repacked into a fixed interleaved layout and streamed through a
//!   ring buffer (see [`staging::StagingRing`]).
//!
//! Shader compilation is out of scope: hosts hand the context precompiled target bytecode.

mod config;
mod context;
mod error;
mod id_pool;
mod registry;
mod resources;

pub mod backend;
pub mod gl;
pub mod pixel;
pub mod staging;
pub mod state;
pub mod uniforms;
pub mod vertex;

pub use config::ContextConfig;
pub use context::{GlContext, Indices, VertexPointer, MAX_TEXTURE_UNITS};
pub use error::GlesError;
pub use id_pool::IdPool;
pub use registry::Registry;
pub use resources::{MAX_FRAMEBUFFER_COLOR_SLOTS, MAX_VERTEX_ATTRIBS};
