//! Vertex stream layout and repacking.

mod layout;
mod repack;

pub use layout::{InputElement, InterleavedLayout, Semantic, VertexFormat};
pub use repack::{
    emitted_vertex_count, plan_chunks, AttribStream, ComponentType, IndexSource, RepackOutcome,
    Repacker,
};
