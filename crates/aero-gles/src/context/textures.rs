use tracing::{debug, trace};

use crate::backend::{GpuBackend, TextureDesc, TextureFormat, TextureUsage, ViewKind};
use crate::error::GlesError;
use crate::gl::*;
use crate::pixel::convert_to_rgba8;
use crate::resources::AttachmentKind;
use crate::state::translate::{gl_mag_filter, gl_min_filter, gl_wrap_mode};

use super::GlContext;

impl<B: GpuBackend> GlContext<B> {
    pub fn gen_textures(&mut self, n: GLsizei) -> Vec<GLuint> {
        let handles = self.texture_ids.generate(n.max(0) as usize);
        for &handle in &handles {
            self.textures.create(handle);
        }
        handles
    }

    pub fn delete_textures(&mut self, textures: &[GLuint]) {
        for &handle in textures {
            let Some(mut info) = self.textures.remove(handle) else {
                trace!(handle, "delete of unknown texture");
                continue;
            };
            self.forget_attachment(AttachmentKind::Texture, handle);
            info.release(&mut self.backend);
            self.texture_ids.release(handle);

            if self.current_texture == handle {
                self.current_texture = 0;
            }
            for unit in self.texture_units.iter_mut().filter(|unit| **unit == handle) {
                *unit = 0;
            }
        }
    }

    pub fn active_texture(&mut self, texture: GLenum) {
        if !(GL_TEXTURE0..=GL_TEXTURE31).contains(&texture) {
            debug!(texture, "active_texture: unit out of range");
            return;
        }
        self.active_unit = (texture - GL_TEXTURE0) as usize;
    }

    pub fn bind_texture(&mut self, target: GLenum, texture: GLuint) {
        if target != GL_TEXTURE_2D {
            debug!(target, "bind_texture: unsupported target");
            return;
        }
        if texture != 0 && !self.textures.contains(texture) {
            trace!(texture, "bind_texture: unknown texture");
        }
        self.current_texture = texture;
        self.texture_units[self.active_unit] = texture;
    }

    /// Upload level 0 of the current texture, replacing its storage.
    ///
    /// `GL_DEPTH_COMPONENT` / `GL_DEPTH_STENCIL_OES` allocate a depth-stencil texture usable as
    /// a framebuffer depth attachment; their pixel data is ignored.
    #[allow(clippy::too_many_arguments)]
    pub fn tex_image_2d(
        &mut self,
        target: GLenum,
        level: GLint,
        _internal_format: GLint,
        width: GLsizei,
        height: GLsizei,
        _border: GLint,
        format: GLenum,
        ty: GLenum,
        pixels: Option<&[u8]>,
    ) -> Result<(), GlesError> {
        if target != GL_TEXTURE_2D {
            debug!(target, "tex_image_2d: unsupported target");
            return Ok(());
        }
        if level != 0 {
            debug!(level, "tex_image_2d: mip levels are not stored");
            return Ok(());
        }
        let handle = self.current_texture;
        if !self.textures.contains(handle) {
            trace!(handle, "tex_image_2d: no texture bound");
            return Ok(());
        }
        let max = self.config.max_texture_size as GLsizei;
        if width <= 0 || height <= 0 || width > max || height > max {
            debug!(width, height, max, "tex_image_2d: unsupported size");
            return Ok(());
        }
        let (width, height) = (width as u32, height as u32);

        let depth = matches!(format, GL_DEPTH_COMPONENT | GL_DEPTH_STENCIL_OES);
        let converted = match (depth, pixels) {
            (false, Some(src)) => match convert_to_rgba8(format, ty, width, height, src) {
                Ok(data) => Some(data),
                Err(err) => {
                    debug!(%err, "tex_image_2d: ignoring upload");
                    return Ok(());
                }
            },
            _ => None,
        };
        let (texture_format, usage) = if depth {
            (TextureFormat::Depth24PlusStencil8, TextureUsage::DEPTH_STENCIL)
        } else {
            (
                TextureFormat::Rgba8Unorm,
                TextureUsage::SAMPLED | TextureUsage::RENDER_TARGET,
            )
        };

        self.forget_attachment(AttachmentKind::Texture, handle);
        let Some(info) = self.textures.get_mut(handle) else {
            return Ok(());
        };
        info.release_storage(&mut self.backend);

        let texture = self.backend.create_texture(
            &TextureDesc {
                width,
                height,
                format: texture_format,
                usage,
            },
            converted.as_deref(),
        )?;
        info.texture = Some(texture);
        info.width = width;
        info.height = height;
        info.format = Some(texture_format);
        if !depth {
            info.shader_view = Some(self.backend.create_view(texture, ViewKind::ShaderResource)?);
        }
        if self.config.validation {
            debug!(handle, width, height, ?texture_format, "texture storage created");
        }
        Ok(())
    }

    /// Update the sampler of the texture bound to the active unit.
    pub fn tex_parameteri(&mut self, target: GLenum, pname: GLenum, param: GLint) {
        if target != GL_TEXTURE_2D {
            debug!(target, "tex_parameteri: unsupported target");
            return;
        }
        let handle = self.texture_units[self.active_unit];
        let Some(info) = self.textures.get_mut(handle) else {
            trace!(handle, "tex_parameteri: no texture bound");
            return;
        };
        let value = param as GLenum;
        let applied = match pname {
            GL_TEXTURE_MIN_FILTER => gl_min_filter(value).map(|filter| {
                info.sampler.update(|desc| {
                    desc.min_filter = filter.min;
                    if let Some(mip) = filter.mip {
                        desc.mip_filter = mip;
                    }
                });
            }),
            GL_TEXTURE_MAG_FILTER => gl_mag_filter(value).map(|filter| {
                info.sampler.update(|desc| desc.mag_filter = filter);
            }),
            GL_TEXTURE_WRAP_S => gl_wrap_mode(value).map(|mode| {
                info.sampler.update(|desc| desc.address_u = mode);
            }),
            GL_TEXTURE_WRAP_T => gl_wrap_mode(value).map(|mode| {
                info.sampler.update(|desc| desc.address_v = mode);
            }),
            GL_TEXTURE_WRAP_R_OES => gl_wrap_mode(value).map(|mode| {
                info.sampler.update(|desc| desc.address_w = mode);
            }),
            _ => None,
        };
        if applied.is_none() {
            debug!(pname, param, "tex_parameteri: unsupported parameter");
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn compressed_tex_image_2d(
        &mut self,
        _target: GLenum,
        _level: GLint,
        internal_format: GLenum,
        width: GLsizei,
        height: GLsizei,
        _border: GLint,
        _data: &[u8],
    ) {
        debug!(internal_format, width, height, "compressed textures are not supported");
    }

    pub fn generate_mipmap(&mut self, target: GLenum) {
        if let Some(info) = self.textures.get_mut(self.current_texture) {
            info.mipmap_target = Some(target);
        }
    }

    pub fn pixel_storei(&mut self, pname: GLenum, param: GLint) {
        match pname {
            GL_UNPACK_ALIGNMENT => self.unpack_alignment = param,
            GL_PACK_ALIGNMENT => self.pack_alignment = param,
            _ => debug!(pname, param, "pixel_storei: unsupported parameter"),
        }
    }
}
