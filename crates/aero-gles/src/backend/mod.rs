//! Target API abstraction.
//!
//! [`GpuBackend`] is the device + immediate-context pair the state translation engine drives:
//! object creation/destruction on one side, "set state, then draw" on the other. Two
//! implementations ship with the crate:
//!
//! - [`RecordingBackend`]: deterministic in-memory target that records every call. Used by the
//!   test-suite to observe exactly which native operations a GL call sequence produces.
//! - [`WgpuBackend`]: renders through `wgpu`, baking the fixed-function state objects into cached
//!   render pipelines.

mod soft;
mod wgpu_backend;

use std::ops::Range;

use bitflags::bitflags;
use thiserror::Error;

use crate::state::{
    BlendDesc, DepthStencilDesc, PrimitiveTopology, RasterizerDesc, SamplerDesc, ScissorRect,
    Viewport,
};
use crate::vertex::InputElement;

pub use soft::{Call, DrawRecord, RecordingBackend};
pub use wgpu_backend::{WgpuBackend, WgpuBackendConfig};

macro_rules! native_ids {
    ($($(#[$meta:meta])* $name:ident;)*) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub u32);
        )*
    };
}

native_ids! {
    TextureId;
    /// Shader-resource, render-target or depth-stencil view of a texture.
    ViewId;
    SamplerId;
    BufferId;
    ShaderId;
    InputLayoutId;
    BlendStateId;
    DepthStencilStateId;
    RasterizerStateId;
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("wgpu adapter not found")]
    AdapterNotFound,
    #[error("request_device failed: {0}")]
    RequestDevice(String),
    #[error("unknown {kind} {id}")]
    UnknownObject { kind: &'static str, id: u32 },
    #[error("out of memory creating {0}")]
    OutOfMemory(&'static str),
    #[error("invalid shader bytecode: {0}")]
    InvalidBytecode(String),
    #[error("buffer write out of bounds (buffer size {buffer_size}, write end {write_end})")]
    BufferWriteOutOfBounds { buffer_size: usize, write_end: usize },
    #[error("buffer {0} was not created with CPU access")]
    NotMappable(u32),
    #[error("texture format {0:?} cannot be used for this view")]
    IncompatibleView(TextureFormat),
    #[error("texture data for {width}x{height} expects {expected} bytes but got {actual}")]
    TextureDataSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("draw called without {0}")]
    MissingBinding(&'static str),
    #[error("wgpu validation error: {0}")]
    Validation(String),
    #[error("map_async failed: {0}")]
    MapAsync(String),
    #[error("map_async callback dropped")]
    MapAsyncDropped,
}

impl BackendError {
    pub(crate) fn unknown(kind: &'static str, id: u32) -> Self {
        Self::UnknownObject { kind, id }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Depth24PlusStencil8,
}

impl TextureFormat {
    pub fn bytes_per_texel(self) -> usize {
        4
    }

    pub fn is_depth(self) -> bool {
        matches!(self, Self::Depth24PlusStencil8)
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const SAMPLED = 1 << 0;
        const RENDER_TARGET = 1 << 1;
        const DEPTH_STENCIL = 1 << 2;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const UNIFORM = 1 << 2;
        /// CPU-writable through `map_buffer`.
        const DYNAMIC = 1 << 3;
        /// CPU readable and writable; never bound to the pipeline.
        const STAGING = 1 << 4;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferDesc {
    pub size: usize,
    pub usage: BufferUsage,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MapMode {
    /// Previous contents may be discarded; in-flight draws keep their data.
    WriteDiscard,
    /// Caller promises not to touch ranges used by in-flight draws.
    WriteNoOverwrite,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViewKind {
    ShaderResource,
    RenderTarget,
    DepthStencil,
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        const DEPTH = 1 << 0;
        const STENCIL = 1 << 1;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureBinding {
    pub view: ViewId,
    pub sampler: SamplerId,
}

/// Device + immediate-context operations used by [`crate::GlContext`].
///
/// Creation calls are fallible (out of memory, bad bytecode); the context treats any error as
/// fatal for the GL call in progress. `destroy_*` calls on unknown ids are ignored.
pub trait GpuBackend {
    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        data: Option<&[u8]>,
    ) -> Result<TextureId, BackendError>;
    fn destroy_texture(&mut self, id: TextureId);
    fn create_view(&mut self, texture: TextureId, kind: ViewKind) -> Result<ViewId, BackendError>;
    fn destroy_view(&mut self, id: ViewId);
    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerId, BackendError>;
    fn destroy_sampler(&mut self, id: SamplerId);

    fn create_buffer(
        &mut self,
        desc: &BufferDesc,
        data: Option<&[u8]>,
    ) -> Result<BufferId, BackendError>;
    fn destroy_buffer(&mut self, id: BufferId);
    fn write_buffer(&mut self, id: BufferId, offset: usize, data: &[u8])
        -> Result<(), BackendError>;
    /// CPU view of a `STAGING` buffer.
    fn buffer_contents(&self, id: BufferId) -> Result<&[u8], BackendError>;
    /// Map a `DYNAMIC` buffer for writing. The whole buffer is returned; the caller reports the
    /// range it actually wrote through `unmap_buffer`.
    fn map_buffer(&mut self, id: BufferId, mode: MapMode) -> Result<&mut [u8], BackendError>;
    fn unmap_buffer(&mut self, id: BufferId, written: Range<usize>);

    fn create_shader(
        &mut self,
        stage: ShaderStage,
        bytecode: &[u8],
    ) -> Result<ShaderId, BackendError>;
    fn destroy_shader(&mut self, id: ShaderId);
    fn create_input_layout(
        &mut self,
        elements: &[InputElement],
        stride: u32,
        vertex_bytecode: &[u8],
    ) -> Result<InputLayoutId, BackendError>;
    fn destroy_input_layout(&mut self, id: InputLayoutId);

    fn create_blend_state(&mut self, desc: &BlendDesc) -> Result<BlendStateId, BackendError>;
    fn destroy_blend_state(&mut self, id: BlendStateId);
    fn create_depth_stencil_state(
        &mut self,
        desc: &DepthStencilDesc,
    ) -> Result<DepthStencilStateId, BackendError>;
    fn destroy_depth_stencil_state(&mut self, id: DepthStencilStateId);
    fn create_rasterizer_state(
        &mut self,
        desc: &RasterizerDesc,
    ) -> Result<RasterizerStateId, BackendError>;
    fn destroy_rasterizer_state(&mut self, id: RasterizerStateId);

    fn set_render_targets(&mut self, colors: &[ViewId], depth_stencil: Option<ViewId>);
    fn set_viewport(&mut self, viewport: Viewport);
    fn set_scissor_rect(&mut self, rect: ScissorRect);
    fn set_primitive_topology(&mut self, topology: PrimitiveTopology);
    fn set_input_layout(&mut self, layout: InputLayoutId);
    fn set_vertex_buffer(&mut self, buffer: BufferId, stride: u32, offset: usize);
    fn set_shaders(&mut self, vertex: ShaderId, fragment: ShaderId);
    fn set_constant_buffer(&mut self, buffer: Option<BufferId>);
    fn set_blend_state(&mut self, state: BlendStateId, sample_mask: u32);
    fn set_depth_stencil_state(&mut self, state: DepthStencilStateId, stencil_ref: u32);
    fn set_rasterizer_state(&mut self, state: RasterizerStateId);
    fn set_texture(&mut self, slot: u32, binding: Option<TextureBinding>);

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<(), BackendError>;
    fn clear_render_target(&mut self, view: ViewId, color: [f32; 4]) -> Result<(), BackendError>;
    fn clear_depth_stencil(
        &mut self,
        view: ViewId,
        flags: ClearFlags,
        depth: f32,
        stencil: u8,
    ) -> Result<(), BackendError>;

    /// Submit recorded work without waiting for it.
    fn flush(&mut self) -> Result<(), BackendError>;
    /// Submit recorded work and block until the device has finished it.
    fn finish(&mut self) -> Result<(), BackendError>;
}
