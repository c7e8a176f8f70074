use tracing::debug;

use crate::backend::GpuBackend;
use crate::gl::*;
use crate::resources::MAX_VERTEX_ATTRIBS;

use super::{GlContext, MAX_TEXTURE_UNITS};

const VENDOR: &str = "aero";
const RENDERER: &str = "aero-gles (wgpu)";
const VERSION: &str = "OpenGL ES 2.0 aero-gles";
const SHADING_LANGUAGE_VERSION: &str = "OpenGL ES GLSL ES 1.00";
const EXTENSIONS: &str = "GL_OES_depth24 GL_OES_packed_depth_stencil GL_OES_rgb8_rgba8 \
                          GL_EXT_blend_minmax GL_OES_texture_npot";

fn write_values<T: Copy>(out: &mut [T], values: &[T]) {
    for (dst, src) in out.iter_mut().zip(values) {
        *dst = *src;
    }
}

impl<B: GpuBackend> GlContext<B> {
    /// Errors are never recorded.
    pub fn get_error(&self) -> GLenum {
        GL_NO_ERROR
    }

    /// Write the value(s) of `pname` into `params`; unsupported names leave it untouched.
    pub fn get_integerv(&self, pname: GLenum, params: &mut [GLint]) {
        let value = match pname {
            GL_MAX_TEXTURE_SIZE => self.config.max_texture_size as GLint,
            GL_FRAMEBUFFER_BINDING => self.framebuffer as GLint,
            GL_RENDERBUFFER_BINDING => self.renderbuffer as GLint,
            GL_ARRAY_BUFFER_BINDING => self.array_buffer as GLint,
            GL_ELEMENT_ARRAY_BUFFER_BINDING => self.element_array_buffer as GLint,
            GL_TEXTURE_BINDING_2D => self.texture_units[self.active_unit] as GLint,
            GL_ACTIVE_TEXTURE => (GL_TEXTURE0 as usize + self.active_unit) as GLint,
            GL_CURRENT_PROGRAM => self.current_program as GLint,
            GL_MAX_TEXTURE_IMAGE_UNITS => MAX_TEXTURE_UNITS as GLint,
            GL_MAX_VERTEX_ATTRIBS => MAX_VERTEX_ATTRIBS as GLint,
            GL_LINE_WIDTH => 1,
            GL_STENCIL_BITS => 8,
            GL_UNPACK_ALIGNMENT => self.unpack_alignment,
            GL_PACK_ALIGNMENT => self.pack_alignment,
            GL_VIEWPORT => return write_values(params, &self.viewport),
            GL_SCISSOR_BOX => return write_values(params, &self.scissor_box),
            _ => {
                debug!(pname, "get_integerv: unsupported parameter");
                return;
            }
        };
        write_values(params, &[value]);
    }

    pub fn get_floatv(&self, pname: GLenum, params: &mut [GLfloat]) {
        match pname {
            GL_COLOR_CLEAR_VALUE => write_values(params, &self.clear_color),
            GL_DEPTH_CLEAR_VALUE => write_values(params, &[self.clear_depth]),
            GL_STENCIL_CLEAR_VALUE => write_values(params, &[self.clear_stencil as GLfloat]),
            GL_ALPHA_TEST_REF => write_values(params, &[0.0]),
            _ => debug!(pname, "get_floatv: unsupported parameter"),
        }
    }

    pub fn get_booleanv(&self, pname: GLenum, params: &mut [GLboolean]) {
        let value = match pname {
            GL_DEPTH_WRITEMASK => self.depth_stencil.desc().depth_write,
            GL_BLEND => self.blend.desc().enable,
            GL_DEPTH_TEST => self.depth_stencil.desc().depth_enable,
            _ => {
                debug!(pname, "get_booleanv: unsupported parameter");
                return;
            }
        };
        write_values(params, &[if value { GL_TRUE } else { GL_FALSE }]);
    }

    pub fn get_string(&self, name: GLenum) -> Option<&'static str> {
        match name {
            GL_VENDOR => Some(VENDOR),
            GL_RENDERER => Some(RENDERER),
            GL_VERSION => Some(VERSION),
            GL_SHADING_LANGUAGE_VERSION => Some(SHADING_LANGUAGE_VERSION),
            GL_EXTENSIONS => Some(EXTENSIONS),
            _ => {
                debug!(name, "get_string: unsupported name");
                None
            }
        }
    }
}
