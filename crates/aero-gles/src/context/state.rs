use tracing::{debug, trace};

use crate::backend::{ClearFlags, GpuBackend};
use crate::error::GlesError;
use crate::gl::*;
use crate::state::translate::{
    gl_blend_equation, gl_blend_factor, gl_compare_func, gl_cull_face, gl_stencil_op,
};
use crate::state::{ColorWriteMask, CullMode, ScissorRect, Viewport};

use super::GlContext;

impl<B: GpuBackend> GlContext<B> {
    pub fn enable(&mut self, cap: GLenum) {
        self.set_capability(cap, true);
    }

    pub fn disable(&mut self, cap: GLenum) {
        self.set_capability(cap, false);
    }

    fn set_capability(&mut self, cap: GLenum, on: bool) {
        match cap {
            GL_BLEND => {
                self.blend.update(|d| d.enable = on);
            }
            GL_DEPTH_TEST => {
                self.depth_stencil.update(|d| d.depth_enable = on);
            }
            GL_STENCIL_TEST => {
                self.depth_stencil.update(|d| d.stencil_enable = on);
            }
            GL_SCISSOR_TEST => {
                self.rasterizer.update(|d| d.scissor_enable = on);
            }
            GL_CULL_FACE => {
                self.cull_enabled = on;
                let cull = if on { self.cull_face_mode } else { CullMode::None };
                self.rasterizer.update(|d| d.cull = cull);
            }
            GL_TEXTURE_2D => self.texture_2d_enabled = on,
            _ => debug!(cap, on, "unsupported capability"),
        }
    }

    pub fn is_enabled(&self, cap: GLenum) -> GLboolean {
        let on = match cap {
            GL_BLEND => self.blend.desc().enable,
            GL_DEPTH_TEST => self.depth_stencil.desc().depth_enable,
            GL_STENCIL_TEST => self.depth_stencil.desc().stencil_enable,
            GL_SCISSOR_TEST => self.rasterizer.desc().scissor_enable,
            GL_CULL_FACE => self.cull_enabled,
            GL_TEXTURE_2D => self.texture_2d_enabled,
            _ => false,
        };
        if on {
            GL_TRUE
        } else {
            GL_FALSE
        }
    }

    /// Colour factors only; the alpha factors keep their values.
    pub fn blend_func(&mut self, sfactor: GLenum, dfactor: GLenum) {
        let (Some(src), Some(dst)) = (gl_blend_factor(sfactor), gl_blend_factor(dfactor)) else {
            debug!(sfactor, dfactor, "blend_func: unsupported factor");
            return;
        };
        self.blend.update(|d| {
            d.src = src;
            d.dst = dst;
        });
    }

    pub fn blend_func_separate(
        &mut self,
        src_rgb: GLenum,
        dst_rgb: GLenum,
        src_alpha: GLenum,
        dst_alpha: GLenum,
    ) {
        let factors = [src_rgb, dst_rgb, src_alpha, dst_alpha].map(gl_blend_factor);
        let [Some(src), Some(dst), Some(src_a), Some(dst_a)] = factors else {
            debug!(src_rgb, dst_rgb, src_alpha, dst_alpha, "blend_func_separate: unsupported factor");
            return;
        };
        self.blend.update(|d| {
            d.src = src;
            d.dst = dst;
            d.src_alpha = src_a;
            d.dst_alpha = dst_a;
        });
    }

    pub fn blend_equation(&mut self, mode: GLenum) {
        self.blend_equation_separate(mode, mode);
    }

    pub fn blend_equation_separate(&mut self, mode_rgb: GLenum, mode_alpha: GLenum) {
        let (Some(op), Some(op_alpha)) = (gl_blend_equation(mode_rgb), gl_blend_equation(mode_alpha))
        else {
            debug!(mode_rgb, mode_alpha, "blend_equation: unsupported equation");
            return;
        };
        self.blend.update(|d| {
            d.op = op;
            d.op_alpha = op_alpha;
        });
    }

    pub fn color_mask(&mut self, red: GLboolean, green: GLboolean, blue: GLboolean, alpha: GLboolean) {
        let mask = ColorWriteMask::from_rgba(
            red != GL_FALSE,
            green != GL_FALSE,
            blue != GL_FALSE,
            alpha != GL_FALSE,
        );
        self.blend.update(|d| d.write_mask = mask);
    }

    pub fn depth_func(&mut self, func: GLenum) {
        match gl_compare_func(func) {
            Some(func) => {
                self.depth_stencil.update(|d| d.depth_func = func);
            }
            None => debug!(func, "depth_func: unsupported function"),
        }
    }

    pub fn depth_mask(&mut self, flag: GLboolean) {
        self.depth_stencil.update(|d| d.depth_write = flag != GL_FALSE);
    }

    /// Sets the function of both faces and the reference value. `mask` becomes both the read
    /// and the write mask.
    pub fn stencil_func(&mut self, func: GLenum, reference: GLint, mask: GLuint) {
        let Some(func) = gl_compare_func(func) else {
            debug!(func, "stencil_func: unsupported function");
            return;
        };
        self.stencil_ref = reference.clamp(0, 0xff) as u32;
        self.depth_stencil.update(|d| {
            d.front.func = func;
            d.back.func = func;
            d.stencil_read_mask = mask as u8;
            d.stencil_write_mask = mask as u8;
        });
    }

    /// `mask` becomes both the read and the write mask.
    pub fn stencil_mask(&mut self, mask: GLuint) {
        self.depth_stencil.update(|d| {
            d.stencil_read_mask = mask as u8;
            d.stencil_write_mask = mask as u8;
        });
    }

    pub fn stencil_op(&mut self, fail: GLenum, zfail: GLenum, zpass: GLenum) {
        let [Some(fail), Some(depth_fail), Some(pass)] = [fail, zfail, zpass].map(gl_stencil_op)
        else {
            debug!(fail, zfail, zpass, "stencil_op: unsupported operation");
            return;
        };
        self.depth_stencil.update(|d| {
            for face in [&mut d.front, &mut d.back] {
                face.fail = fail;
                face.depth_fail = depth_fail;
                face.pass = pass;
            }
        });
    }

    pub fn cull_face(&mut self, mode: GLenum) {
        let Some(cull) = gl_cull_face(mode) else {
            debug!(mode, "cull_face: unsupported mode");
            return;
        };
        self.cull_face_mode = cull;
        if self.cull_enabled {
            self.rasterizer.update(|d| d.cull = cull);
        }
    }

    pub fn front_face(&mut self, mode: GLenum) {
        let ccw = match mode {
            GL_CCW => true,
            GL_CW => false,
            _ => {
                debug!(mode, "front_face: unsupported mode");
                return;
            }
        };
        self.rasterizer.update(|d| d.front_ccw = ccw);
    }

    pub fn scissor(&mut self, x: GLint, y: GLint, width: GLsizei, height: GLsizei) -> Result<(), GlesError> {
        self.scissor_box = [x, y, width, height];
        if !self.resolve_render_target()? {
            return Ok(());
        }
        self.backend.set_scissor_rect(ScissorRect {
            left: x,
            top: y,
            right: x.saturating_add(width),
            bottom: y.saturating_add(height),
        });
        Ok(())
    }

    pub fn viewport(&mut self, x: GLint, y: GLint, width: GLsizei, height: GLsizei) -> Result<(), GlesError> {
        self.viewport = [x, y, width, height];
        if !self.resolve_render_target()? {
            return Ok(());
        }
        self.backend.set_viewport(Viewport {
            x: x as f32,
            y: y as f32,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        });
        Ok(())
    }

    pub fn clear_color(&mut self, red: GLclampf, green: GLclampf, blue: GLclampf, alpha: GLclampf) {
        self.clear_color = [red, green, blue, alpha];
    }

    pub fn clear_depthf(&mut self, depth: GLclampf) {
        self.clear_depth = depth.clamp(0.0, 1.0);
    }

    pub fn clear_stencil(&mut self, s: GLint) {
        self.clear_stencil = s;
    }

    /// Clear the bound targets. No-op when the framebuffer is incomplete.
    pub fn clear(&mut self, mask: GLbitfield) -> Result<(), GlesError> {
        if !self.resolve_render_target()? {
            trace!(mask, "clear skipped: incomplete framebuffer");
            return Ok(());
        }
        if mask & GL_COLOR_BUFFER_BIT != 0 {
            for &view in &self.color_targets {
                self.backend.clear_render_target(view, self.clear_color)?;
            }
        }
        let mut flags = ClearFlags::empty();
        flags.set(ClearFlags::DEPTH, mask & GL_DEPTH_BUFFER_BIT != 0);
        flags.set(ClearFlags::STENCIL, mask & GL_STENCIL_BUFFER_BIT != 0);
        if let (false, Some(view)) = (flags.is_empty(), self.depth_target) {
            self.backend.clear_depth_stencil(
                view,
                flags,
                self.clear_depth,
                self.clear_stencil as u8,
            )?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), GlesError> {
        self.backend.flush()?;
        Ok(())
    }

    pub fn finish(&mut self) -> Result<(), GlesError> {
        self.backend.finish()?;
        Ok(())
    }
}
