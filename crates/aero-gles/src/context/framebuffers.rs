use tracing::{debug, trace};

use crate::backend::{GpuBackend, TextureDesc, TextureFormat, TextureUsage, ViewId, ViewKind};
use crate::error::GlesError;
use crate::gl::*;
use crate::resources::{Attachment, AttachmentKind};

use super::{BoundTarget, DefaultTargets, GlContext};

/// Framebuffer slot named by a `GL_*_ATTACHMENT` enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Color(usize),
    Depth,
    Stencil,
}

fn attachment_slot(attachment: GLenum) -> Option<Slot> {
    match attachment {
        GL_COLOR_ATTACHMENT0..=GL_COLOR_ATTACHMENT15 => {
            Some(Slot::Color((attachment - GL_COLOR_ATTACHMENT0) as usize))
        }
        GL_DEPTH_ATTACHMENT => Some(Slot::Depth),
        GL_STENCIL_ATTACHMENT => Some(Slot::Stencil),
        _ => None,
    }
}

impl<B: GpuBackend> GlContext<B> {
    pub fn gen_framebuffers(&mut self, n: GLsizei) -> Vec<GLuint> {
        let handles = self.framebuffer_ids.generate(n.max(0) as usize);
        for &handle in &handles {
            self.framebuffers.create(handle);
        }
        handles
    }

    pub fn delete_framebuffers(&mut self, framebuffers: &[GLuint]) {
        for &handle in framebuffers {
            if self.framebuffers.remove(handle).is_none() {
                trace!(handle, "delete of unknown framebuffer");
                continue;
            }
            self.framebuffer_ids.release(handle);
            if self.framebuffer == handle {
                self.framebuffer = 0;
            }
            if self.bound_target == BoundTarget::Framebuffer(handle) {
                self.bound_target = BoundTarget::None;
            }
        }
    }

    pub fn bind_framebuffer(&mut self, target: GLenum, framebuffer: GLuint) {
        if target != GL_FRAMEBUFFER {
            debug!(target, "bind_framebuffer: unsupported target");
            return;
        }
        if framebuffer != 0 && !self.framebuffers.contains(framebuffer) {
            trace!(framebuffer, "bind_framebuffer: unknown framebuffer");
        }
        // Resolution is deferred to the next draw, clear, viewport or scissor call.
        self.framebuffer = framebuffer;
    }

    fn attach(&mut self, attachment: GLenum, value: Option<Attachment>) {
        let Some(slot) = attachment_slot(attachment) else {
            debug!(attachment, "unsupported framebuffer attachment point");
            return;
        };
        let Some(fb) = self.framebuffers.get_mut(self.framebuffer) else {
            debug!("framebuffer attach with framebuffer 0 bound");
            return;
        };
        let target = match slot {
            Slot::Color(index) => &mut fb.colors[index],
            Slot::Depth => &mut fb.depth,
            Slot::Stencil => &mut fb.stencil,
        };
        *target = value;
        fb.dirty = true;
    }

    pub fn framebuffer_texture_2d(
        &mut self,
        _target: GLenum,
        attachment: GLenum,
        textarget: GLenum,
        texture: GLuint,
        level: GLint,
    ) {
        if textarget != GL_TEXTURE_2D || level != 0 {
            debug!(textarget, level, "framebuffer_texture_2d: unsupported image");
            return;
        }
        let value = match texture {
            0 => None,
            handle if self.textures.contains(handle) => Some(Attachment {
                kind: AttachmentKind::Texture,
                handle,
            }),
            handle => {
                trace!(handle, "framebuffer_texture_2d: unknown texture");
                return;
            }
        };
        self.attach(attachment, value);
    }

    pub fn framebuffer_renderbuffer(
        &mut self,
        _target: GLenum,
        attachment: GLenum,
        renderbuffer_target: GLenum,
        renderbuffer: GLuint,
    ) {
        if renderbuffer_target != GL_RENDERBUFFER {
            debug!(renderbuffer_target, "framebuffer_renderbuffer: unsupported target");
            return;
        }
        let value = match renderbuffer {
            0 => None,
            handle if self.renderbuffers.contains(handle) => Some(Attachment {
                kind: AttachmentKind::Renderbuffer,
                handle,
            }),
            handle => {
                trace!(handle, "framebuffer_renderbuffer: unknown renderbuffer");
                return;
            }
        };
        self.attach(attachment, value);
    }

    /// Complete when colour attachment 0 is set; the default framebuffer is always complete.
    pub fn check_framebuffer_status(&self, _target: GLenum) -> GLenum {
        if self.framebuffer == 0 {
            return GL_FRAMEBUFFER_COMPLETE;
        }
        match self.framebuffers.get(self.framebuffer) {
            Some(fb) if fb.colors[0].is_some() => GL_FRAMEBUFFER_COMPLETE,
            _ => GL_FRAMEBUFFER_UNDEFINED_OES,
        }
    }

    pub fn gen_renderbuffers(&mut self, n: GLsizei) -> Vec<GLuint> {
        let handles = self.renderbuffer_ids.generate(n.max(0) as usize);
        for &handle in &handles {
            self.renderbuffers.create(handle);
        }
        handles
    }

    pub fn delete_renderbuffers(&mut self, renderbuffers: &[GLuint]) {
        for &handle in renderbuffers {
            let Some(mut info) = self.renderbuffers.remove(handle) else {
                trace!(handle, "delete of unknown renderbuffer");
                continue;
            };
            self.forget_attachment(AttachmentKind::Renderbuffer, handle);
            info.release(&mut self.backend);
            self.renderbuffer_ids.release(handle);
            if self.renderbuffer == handle {
                self.renderbuffer = 0;
            }
        }
    }

    pub fn bind_renderbuffer(&mut self, target: GLenum, renderbuffer: GLuint) {
        if target != GL_RENDERBUFFER {
            debug!(target, "bind_renderbuffer: unsupported target");
            return;
        }
        if renderbuffer != 0 && !self.renderbuffers.contains(renderbuffer) {
            trace!(renderbuffer, "bind_renderbuffer: unknown renderbuffer");
        }
        self.renderbuffer = renderbuffer;
    }

    /// Allocate depth-stencil storage for the bound renderbuffer. Every internal format maps to
    /// D24S8.
    pub fn renderbuffer_storage(
        &mut self,
        target: GLenum,
        internal_format: GLenum,
        width: GLsizei,
        height: GLsizei,
    ) -> Result<(), GlesError> {
        if target != GL_RENDERBUFFER {
            debug!(target, "renderbuffer_storage: unsupported target");
            return Ok(());
        }
        let max = self.config.max_texture_size as GLsizei;
        if width <= 0 || height <= 0 || width > max || height > max {
            debug!(width, height, "renderbuffer_storage: unsupported size");
            return Ok(());
        }
        if matches!(internal_format, GL_RGBA4 | GL_RGB5_A1 | GL_RGB565) {
            debug!(internal_format, "colour renderbuffers are stored as depth-stencil");
        }

        let handle = self.renderbuffer;
        self.forget_attachment(AttachmentKind::Renderbuffer, handle);
        let Some(info) = self.renderbuffers.get_mut(handle) else {
            debug!("renderbuffer_storage: no renderbuffer bound");
            return Ok(());
        };
        info.release(&mut self.backend);

        let texture = self.backend.create_texture(
            &TextureDesc {
                width: width as u32,
                height: height as u32,
                format: TextureFormat::Depth24PlusStencil8,
                usage: TextureUsage::DEPTH_STENCIL,
            },
            None,
        )?;
        info.texture = Some(texture);
        info.width = width as u32;
        info.height = height as u32;
        info.view = Some(self.backend.create_view(texture, ViewKind::DepthStencil)?);
        Ok(())
    }

    /// Install the host's back buffer as framebuffer `0`. Called at startup and on resize.
    pub fn set_default_framebuffer(&mut self, color: ViewId, depth: Option<ViewId>) {
        let targets = DefaultTargets { color, depth };
        if self.default_targets != Some(targets) {
            self.default_targets = Some(targets);
            self.default_targets_changed = true;
        }
    }

    /// Pixel read-back is not supported; `pixels` is left untouched.
    #[allow(clippy::too_many_arguments)]
    pub fn read_pixels(
        &mut self,
        x: GLint,
        y: GLint,
        width: GLsizei,
        height: GLsizei,
        _format: GLenum,
        _ty: GLenum,
        _pixels: &mut [u8],
    ) {
        debug!(x, y, width, height, "read_pixels is not supported");
    }

    /// Bind the current framebuffer's attachments if they changed since the last call.
    ///
    /// Returns `false` when the framebuffer is incomplete; callers then skip their work.
    pub(super) fn resolve_render_target(&mut self) -> Result<bool, GlesError> {
        if self.framebuffer == 0 {
            let Some(targets) = self.default_targets else {
                return Ok(false);
            };
            if self.bound_target != BoundTarget::Default || self.default_targets_changed {
                self.backend.set_render_targets(&[targets.color], targets.depth);
                self.bound_target = BoundTarget::Default;
                self.default_targets_changed = false;
                self.color_targets = vec![targets.color];
                self.depth_target = targets.depth;
            }
            return Ok(true);
        }

        let handle = self.framebuffer;
        let Some(fb) = self.framebuffers.get(handle) else {
            return Ok(false);
        };
        let dirty = fb.dirty;
        let max_colors = self.config.max_color_attachments.min(fb.colors.len());
        let colors: Vec<Attachment> = fb.colors[..max_colors].iter().map_while(|a| *a).collect();
        let depth = fb.depth.or(fb.stencil);

        let mut created = false;
        let mut color_views = Vec::with_capacity(colors.len());
        for attachment in colors {
            match self.color_view(attachment, &mut created)? {
                Some(view) => color_views.push(view),
                None => {
                    trace!(handle, ?attachment, "framebuffer has a dangling colour attachment");
                    return Ok(false);
                }
            }
        }
        if color_views.is_empty() {
            trace!(handle, "framebuffer has no colour attachment");
            return Ok(false);
        }
        let depth_view = match depth {
            Some(attachment) => match self.depth_view(attachment, &mut created)? {
                Some(view) => Some(view),
                None => {
                    trace!(handle, ?attachment, "framebuffer has a dangling depth attachment");
                    return Ok(false);
                }
            },
            None => None,
        };

        if self.bound_target != BoundTarget::Framebuffer(handle) || dirty || created {
            self.backend.set_render_targets(&color_views, depth_view);
            self.bound_target = BoundTarget::Framebuffer(handle);
            self.color_targets = color_views;
            self.depth_target = depth_view;
            if let Some(fb) = self.framebuffers.get_mut(handle) {
                fb.dirty = false;
            }
        }
        Ok(true)
    }

    fn color_view(
        &mut self,
        attachment: Attachment,
        created: &mut bool,
    ) -> Result<Option<ViewId>, GlesError> {
        if attachment.kind != AttachmentKind::Texture {
            return Ok(None);
        }
        let Some(info) = self.textures.get_mut(attachment.handle) else {
            return Ok(None);
        };
        if let Some(view) = info.render_target_view {
            return Ok(Some(view));
        }
        let Some(texture) = info.texture.filter(|_| info.format == Some(TextureFormat::Rgba8Unorm))
        else {
            return Ok(None);
        };
        let view = self.backend.create_view(texture, ViewKind::RenderTarget)?;
        info.render_target_view = Some(view);
        *created = true;
        Ok(Some(view))
    }

    fn depth_view(
        &mut self,
        attachment: Attachment,
        created: &mut bool,
    ) -> Result<Option<ViewId>, GlesError> {
        match attachment.kind {
            AttachmentKind::Renderbuffer => Ok(self
                .renderbuffers
                .get(attachment.handle)
                .and_then(|rb| rb.view)),
            AttachmentKind::Texture => {
                let Some(info) = self.textures.get_mut(attachment.handle) else {
                    return Ok(None);
                };
                if let Some(view) = info.depth_stencil_view {
                    return Ok(Some(view));
                }
                let Some(texture) = info
                    .texture
                    .filter(|_| info.format == Some(TextureFormat::Depth24PlusStencil8))
                else {
                    return Ok(None);
                };
                let view = self.backend.create_view(texture, ViewKind::DepthStencil)?;
                info.depth_stencil_view = Some(view);
                *created = true;
                Ok(Some(view))
            }
        }
    }
}
