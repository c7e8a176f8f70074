//! The state translation engine.
//!
//! [`GlContext`] keeps GL's implicit global state (bindings, capabilities, the current program)
//! and turns it into explicit target objects lazily: state objects are rebuilt on the first
//! draw after they change, render targets are rebound on the first draw/clear after a
//! framebuffer switch, and vertex data is repacked into the staging ring per draw.
//!
//! The GL call surface is split by area across the submodules; every method is named after its
//! GL entry point in snake case without the `gl` prefix.

mod buffers;
mod draw;
mod framebuffers;
mod query;
mod shaders;
mod state;
mod textures;
mod uniforms;

use tracing::debug;

use crate::backend::{
    BlendStateId, DepthStencilStateId, GpuBackend, RasterizerStateId, ViewId,
};
use crate::config::ContextConfig;
use crate::error::GlesError;
use crate::gl::*;
use crate::id_pool::IdPool;
use crate::registry::Registry;
use crate::resources::{
    AttachmentKind, BufferInfo, FramebufferInfo, RenderbufferInfo, ShaderInfo, ShaderProgram,
    TextureInfo,
};
use crate::staging::StagingRing;
use crate::state::{BlendDesc, Cached, CullMode, DepthStencilDesc, RasterizerDesc};

pub use draw::Indices;
pub use shaders::VertexPointer;

/// Texture units addressable through `active_texture`.
pub const MAX_TEXTURE_UNITS: usize = 32;

/// What the backend currently has bound as render targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BoundTarget {
    None,
    Default,
    Framebuffer(GLuint),
}

/// Host-supplied back buffer used for framebuffer `0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct DefaultTargets {
    color: ViewId,
    depth: Option<ViewId>,
}

pub struct GlContext<B: GpuBackend> {
    backend: B,
    config: ContextConfig,

    texture_ids: IdPool,
    buffer_ids: IdPool,
    framebuffer_ids: IdPool,
    renderbuffer_ids: IdPool,
    shader_ids: IdPool,
    program_ids: IdPool,

    textures: Registry<TextureInfo>,
    buffers: Registry<BufferInfo>,
    framebuffers: Registry<FramebufferInfo>,
    renderbuffers: Registry<RenderbufferInfo>,
    shaders: Registry<ShaderInfo>,
    programs: Registry<ShaderProgram>,

    staging: StagingRing,
    /// Repacked vertices of the draw in flight, reused across draws.
    scratch: Vec<u8>,

    active_unit: usize,
    texture_units: [GLuint; MAX_TEXTURE_UNITS],
    /// Last texture passed to `bind_texture`; the target of `tex_image_2d`.
    current_texture: GLuint,
    array_buffer: GLuint,
    element_array_buffer: GLuint,
    framebuffer: GLuint,
    renderbuffer: GLuint,
    current_program: GLuint,

    default_targets: Option<DefaultTargets>,
    default_targets_changed: bool,
    bound_target: BoundTarget,
    color_targets: Vec<ViewId>,
    depth_target: Option<ViewId>,

    blend: Cached<BlendDesc, BlendStateId>,
    depth_stencil: Cached<DepthStencilDesc, DepthStencilStateId>,
    rasterizer: Cached<RasterizerDesc, RasterizerStateId>,
    stencil_ref: u32,
    sample_mask: u32,
    cull_enabled: bool,
    cull_face_mode: CullMode,
    texture_2d_enabled: bool,

    viewport: [GLint; 4],
    scissor_box: [GLint; 4],
    clear_color: [GLfloat; 4],
    clear_depth: GLfloat,
    clear_stencil: GLint,
    unpack_alignment: GLint,
    pack_alignment: GLint,
}

impl<B: GpuBackend> GlContext<B> {
    pub fn new(mut backend: B, config: ContextConfig) -> Result<Self, GlesError> {
        let staging = StagingRing::new(&mut backend, config.staging_capacity)?;
        debug!(
            staging_capacity = config.staging_capacity,
            max_texture_size = config.max_texture_size,
            "created GL ES context"
        );
        Ok(Self {
            backend,
            config,
            texture_ids: IdPool::new(),
            buffer_ids: IdPool::new(),
            framebuffer_ids: IdPool::new(),
            renderbuffer_ids: IdPool::new(),
            shader_ids: IdPool::new(),
            program_ids: IdPool::new(),
            textures: Registry::new(),
            buffers: Registry::new(),
            framebuffers: Registry::new(),
            renderbuffers: Registry::new(),
            shaders: Registry::new(),
            programs: Registry::new(),
            staging,
            scratch: Vec::new(),
            active_unit: 0,
            texture_units: [0; MAX_TEXTURE_UNITS],
            current_texture: 0,
            array_buffer: 0,
            element_array_buffer: 0,
            framebuffer: 0,
            renderbuffer: 0,
            current_program: 0,
            default_targets: None,
            default_targets_changed: false,
            bound_target: BoundTarget::None,
            color_targets: Vec::new(),
            depth_target: None,
            blend: Cached::default(),
            depth_stencil: Cached::default(),
            rasterizer: Cached::default(),
            stencil_ref: 1,
            sample_mask: u32::MAX,
            cull_enabled: false,
            cull_face_mode: CullMode::Back,
            texture_2d_enabled: true,
            viewport: [0; 4],
            scissor_box: [0; 4],
            clear_color: [0.0; 4],
            clear_depth: 1.0,
            clear_stencil: 0,
            unpack_alignment: 4,
            pack_alignment: 4,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn staging(&self) -> &StagingRing {
        &self.staging
    }

    /// Release every native object owned by the context and hand the backend back.
    pub fn into_backend(mut self) -> B {
        self.release_all();
        let Self { backend, .. } = self;
        backend
    }

    fn release_all(&mut self) {
        let backend = &mut self.backend;
        for (_, texture) in self.textures.iter_mut() {
            texture.release(backend);
        }
        for (_, buffer) in self.buffers.iter_mut() {
            buffer.release(backend);
        }
        for (_, renderbuffer) in self.renderbuffers.iter_mut() {
            renderbuffer.release(backend);
        }
        for (_, program) in self.programs.iter_mut() {
            program.release_native(backend);
        }
        for blend in self.blend.take_all() {
            backend.destroy_blend_state(blend);
        }
        for depth_stencil in self.depth_stencil.take_all() {
            backend.destroy_depth_stencil_state(depth_stencil);
        }
        for rasterizer in self.rasterizer.take_all() {
            backend.destroy_rasterizer_state(rasterizer);
        }
        backend.destroy_buffer(self.staging.buffer());
    }

    /// Drop the bound render targets if the current framebuffer uses `handle`, so the next
    /// resolve picks up its new storage (or notices it is gone).
    fn forget_attachment(&mut self, kind: AttachmentKind, handle: GLuint) {
        if let BoundTarget::Framebuffer(fb) = self.bound_target {
            let uses = self
                .framebuffers
                .get(fb)
                .is_some_and(|info| info.references(kind, handle));
            if uses {
                self.bound_target = BoundTarget::None;
            }
        }
    }
}
