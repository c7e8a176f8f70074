//! GL object descriptors stored in the per-kind registries.
//!
//! Each descriptor is the single owner of the native objects created for it. `release` hands
//! them back to the backend; it is called exactly once, when the GL object is deleted or the
//! context is dropped.

use std::sync::Arc;

use crate::backend::{
    BufferId, GpuBackend, InputLayoutId, SamplerId, ShaderId, ShaderStage, TextureFormat,
    TextureId, ViewId,
};
use crate::gl::*;
use crate::state::{Cached, SamplerDesc};
use crate::uniforms::UniformTable;
use crate::vertex::{ComponentType, InterleavedLayout, Semantic};

/// Attribute slots per program; one per supported semantic.
pub const MAX_VERTEX_ATTRIBS: usize = 3;
/// `GL_COLOR_ATTACHMENT0..15`.
pub const MAX_FRAMEBUFFER_COLOR_SLOTS: usize = 16;

#[derive(Debug, Default)]
pub struct TextureInfo {
    /// Absent until the first `tex_image_2d`.
    pub texture: Option<TextureId>,
    pub width: u32,
    pub height: u32,
    pub format: Option<TextureFormat>,
    pub sampler: Cached<SamplerDesc, SamplerId>,
    pub shader_view: Option<ViewId>,
    /// Created the first time the texture is bound as a colour attachment.
    pub render_target_view: Option<ViewId>,
    /// Created the first time the texture is bound as a depth attachment.
    pub depth_stencil_view: Option<ViewId>,
    /// Target recorded by `generate_mipmap`; no mip chain is built.
    pub mipmap_target: Option<GLenum>,
}

impl TextureInfo {
    /// Release the storage and its views, keeping the sampler.
    pub(crate) fn release_storage<B: GpuBackend + ?Sized>(&mut self, backend: &mut B) {
        for view in [
            self.shader_view.take(),
            self.render_target_view.take(),
            self.depth_stencil_view.take(),
        ]
        .into_iter()
        .flatten()
        {
            backend.destroy_view(view);
        }
        if let Some(texture) = self.texture.take() {
            backend.destroy_texture(texture);
        }
    }

    pub(crate) fn release<B: GpuBackend + ?Sized>(&mut self, backend: &mut B) {
        self.release_storage(backend);
        for sampler in self.sampler.take_all() {
            backend.destroy_sampler(sampler);
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BufferKind {
    #[default]
    Vertex,
    Index,
}

#[derive(Debug, Default)]
pub struct BufferInfo {
    pub kind: BufferKind,
    /// `GL_STATIC_DRAW` and friends; recorded only.
    pub usage: GLenum,
    /// CPU-visible storage sized by the last `buffer_data`.
    pub buffer: Option<BufferId>,
    pub size: usize,
}

impl BufferInfo {
    pub(crate) fn release<B: GpuBackend + ?Sized>(&mut self, backend: &mut B) {
        if let Some(buffer) = self.buffer.take() {
            backend.destroy_buffer(buffer);
        }
        self.size = 0;
    }
}

/// Depth-stencil renderbuffer; colour renderbuffers are not supported.
#[derive(Debug, Default)]
pub struct RenderbufferInfo {
    pub width: u32,
    pub height: u32,
    pub texture: Option<TextureId>,
    pub view: Option<ViewId>,
}

impl RenderbufferInfo {
    pub(crate) fn release<B: GpuBackend + ?Sized>(&mut self, backend: &mut B) {
        if let Some(view) = self.view.take() {
            backend.destroy_view(view);
        }
        if let Some(texture) = self.texture.take() {
            backend.destroy_texture(texture);
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachmentKind {
    Texture,
    Renderbuffer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub handle: GLuint,
}

#[derive(Debug, Default)]
pub struct FramebufferInfo {
    pub colors: [Option<Attachment>; MAX_FRAMEBUFFER_COLOR_SLOTS],
    pub depth: Option<Attachment>,
    pub stencil: Option<Attachment>,
    /// Set by attach calls; cleared once the attachments are bound.
    pub dirty: bool,
}

impl FramebufferInfo {
    pub fn references(&self, kind: AttachmentKind, handle: GLuint) -> bool {
        self.colors
            .iter()
            .chain([&self.depth, &self.stencil])
            .flatten()
            .any(|a| a.kind == kind && a.handle == handle)
    }
}

#[derive(Debug)]
pub struct ShaderInfo {
    pub stage: ShaderStage,
    pub source: Option<String>,
    /// Target bytecode injected by `build_native_shader`.
    pub bytecode: Option<Arc<[u8]>>,
}

impl ShaderInfo {
    pub fn new(stage: ShaderStage) -> Self {
        Self {
            stage,
            source: None,
            bytecode: None,
        }
    }
}

/// Where an attribute array lives.
#[derive(Clone, Debug, Default)]
pub enum AttribPointer {
    #[default]
    Unset,
    /// Offset into the buffer that was bound to `GL_ARRAY_BUFFER` at pointer time.
    Buffer { buffer: GLuint, offset: usize },
    /// Client memory, copied at pointer time.
    Client(Arc<[u8]>),
}

#[derive(Clone, Debug)]
pub struct VertexAttrib {
    pub semantic: Option<Semantic>,
    pub size: usize,
    pub ty: ComponentType,
    pub normalized: bool,
    pub stride: usize,
    pub pointer: AttribPointer,
    pub enabled: bool,
}

impl Default for VertexAttrib {
    fn default() -> Self {
        Self {
            semantic: None,
            size: 4,
            ty: ComponentType::Float,
            normalized: false,
            stride: 0,
            pointer: AttribPointer::Unset,
            enabled: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct ShaderProgram {
    pub vertex_shader: GLuint,
    pub fragment_shader: GLuint,
    pub attribs: [VertexAttrib; MAX_VERTEX_ATTRIBS],
    pub uniforms: UniformTable,
    pub linked: bool,
    /// Native shaders, built at link time.
    pub native_shaders: Option<(ShaderId, ShaderId)>,
    /// Vertex bytecode the input layout is validated against.
    pub vertex_bytecode: Option<Arc<[u8]>>,
    pub input_layout: Cached<InterleavedLayout, InputLayoutId>,
    /// Constant buffer and its size in bytes.
    pub constant_buffer: Option<(BufferId, usize)>,
}

impl ShaderProgram {
    pub fn layout_slots(&self) -> InterleavedLayout {
        InterleavedLayout::from_slots(self.attribs.iter().map(|a| a.semantic))
    }

    pub fn attached_shaders(&self) -> usize {
        usize::from(self.vertex_shader != 0) + usize::from(self.fragment_shader != 0)
    }

    pub(crate) fn release_native<B: GpuBackend + ?Sized>(&mut self, backend: &mut B) {
        if let Some((vs, fs)) = self.native_shaders.take() {
            backend.destroy_shader(vs);
            backend.destroy_shader(fs);
        }
        for layout in self.input_layout.take_all() {
            backend.destroy_input_layout(layout);
        }
        if let Some((buffer, _)) = self.constant_buffer.take() {
            backend.destroy_buffer(buffer);
        }
        self.linked = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framebuffer_reference_lookup() {
        let mut fb = FramebufferInfo::default();
        fb.colors[2] = Some(Attachment {
            kind: AttachmentKind::Texture,
            handle: 7,
        });
        fb.stencil = Some(Attachment {
            kind: AttachmentKind::Renderbuffer,
            handle: 3,
        });
        assert!(fb.references(AttachmentKind::Texture, 7));
        assert!(fb.references(AttachmentKind::Renderbuffer, 3));
        assert!(!fb.references(AttachmentKind::Renderbuffer, 7));
    }

    #[test]
    fn layout_follows_bound_semantics() {
        let mut program = ShaderProgram::default();
        program.attribs[0].semantic = Some(Semantic::Position);
        program.attribs[1].semantic = Some(Semantic::TexCoord);
        assert_eq!(program.layout_slots().stride(), 20);
        assert_eq!(program.attached_shaders(), 0);
    }
}
