use tracing::trace;

use crate::backend::GpuBackend;
use crate::gl::*;
use crate::uniforms::{transpose_mat4, UniformValue};

use super::GlContext;

/// First `count * width` elements of `values`, or `None` when `count` is not positive.
fn elements<T: Copy>(values: &[T], count: GLsizei, width: usize) -> Option<&[T]> {
    let count = usize::try_from(count).ok().filter(|&c| c > 0)?;
    let len = count.saturating_mul(width).min(values.len() / width * width);
    (len > 0).then(|| &values[..len])
}

fn float_vector(values: &[f32], count: GLsizei, width: usize) -> Option<UniformValue> {
    let values = elements(values, count, width)?;
    Some(match (values.len() == width, width) {
        (true, 2) => UniformValue::Vec2([values[0], values[1]]),
        (true, 3) => UniformValue::Vec3([values[0], values[1], values[2]]),
        (true, 4) => UniformValue::Vec4([values[0], values[1], values[2], values[3]]),
        _ => UniformValue::FloatArray(values.to_vec()),
    })
}

impl<B: GpuBackend> GlContext<B> {
    /// Host-assigned location for a uniform of `program`.
    pub fn register_uniform_location(&mut self, program: GLuint, name: &str, location: GLint) {
        match self.programs.get_mut(program) {
            Some(info) => info.uniforms.register(location, name),
            None => trace!(program, "register_uniform_location: unknown program"),
        }
    }

    /// Like [`GlContext::register_uniform_location`], for a sampler uniform.
    pub fn register_uniform_sampler_location(
        &mut self,
        program: GLuint,
        name: &str,
        location: GLint,
    ) {
        match self.programs.get_mut(program) {
            Some(info) => info.uniforms.register_sampler(location, name),
            None => trace!(program, "register_uniform_sampler_location: unknown program"),
        }
    }

    pub fn get_uniform_location(&self, program: GLuint, name: &str) -> GLint {
        self.programs
            .get(program)
            .map_or(-1, |info| info.uniforms.location(name))
    }

    fn set_uniform(&mut self, location: GLint, value: UniformValue) {
        let Some(slot) = self
            .programs
            .get_mut(self.current_program)
            .and_then(|info| info.uniforms.get_mut(location))
        else {
            trace!(location, "uniform write to unknown location");
            return;
        };
        slot.value = match (slot.value.is_sampler(), value) {
            // Samplers only take a texture unit.
            (true, UniformValue::Int(unit)) => UniformValue::Sampler(unit),
            (true, _) => {
                trace!(location, "non-integer write to a sampler uniform");
                return;
            }
            (false, value) => value,
        };
    }

    pub fn uniform1f(&mut self, location: GLint, x: GLfloat) {
        self.set_uniform(location, UniformValue::Float(x));
    }

    pub fn uniform1i(&mut self, location: GLint, x: GLint) {
        self.set_uniform(location, UniformValue::Int(x));
    }

    pub fn uniform2f(&mut self, location: GLint, x: GLfloat, y: GLfloat) {
        self.set_uniform(location, UniformValue::Vec2([x, y]));
    }

    pub fn uniform2i(&mut self, location: GLint, x: GLint, y: GLint) {
        self.set_uniform(location, UniformValue::IntArray(vec![x, y]));
    }

    pub fn uniform2fv(&mut self, location: GLint, count: GLsizei, value: &[GLfloat]) {
        if let Some(value) = float_vector(value, count, 2) {
            self.set_uniform(location, value);
        }
    }

    pub fn uniform2iv(&mut self, location: GLint, count: GLsizei, value: &[GLint]) {
        if let Some(value) = elements(value, count, 2) {
            self.set_uniform(location, UniformValue::IntArray(value.to_vec()));
        }
    }

    pub fn uniform3f(&mut self, location: GLint, x: GLfloat, y: GLfloat, z: GLfloat) {
        self.set_uniform(location, UniformValue::Vec3([x, y, z]));
    }

    pub fn uniform3i(&mut self, location: GLint, x: GLint, y: GLint, z: GLint) {
        self.set_uniform(location, UniformValue::IntArray(vec![x, y, z]));
    }

    pub fn uniform3fv(&mut self, location: GLint, count: GLsizei, value: &[GLfloat]) {
        if let Some(value) = float_vector(value, count, 3) {
            self.set_uniform(location, value);
        }
    }

    pub fn uniform3iv(&mut self, location: GLint, count: GLsizei, value: &[GLint]) {
        if let Some(value) = elements(value, count, 3) {
            self.set_uniform(location, UniformValue::IntArray(value.to_vec()));
        }
    }

    pub fn uniform4f(&mut self, location: GLint, x: GLfloat, y: GLfloat, z: GLfloat, w: GLfloat) {
        self.set_uniform(location, UniformValue::Vec4([x, y, z, w]));
    }

    pub fn uniform4i(&mut self, location: GLint, x: GLint, y: GLint, z: GLint, w: GLint) {
        self.set_uniform(location, UniformValue::IntArray(vec![x, y, z, w]));
    }

    pub fn uniform4fv(&mut self, location: GLint, count: GLsizei, value: &[GLfloat]) {
        if let Some(value) = float_vector(value, count, 4) {
            self.set_uniform(location, value);
        }
    }

    pub fn uniform4iv(&mut self, location: GLint, count: GLsizei, value: &[GLint]) {
        if let Some(value) = elements(value, count, 4) {
            self.set_uniform(location, UniformValue::IntArray(value.to_vec()));
        }
    }

    /// `transpose` is honoured even though GL ES 2.0 requires `GL_FALSE`.
    pub fn uniform_matrix4fv(
        &mut self,
        location: GLint,
        count: GLsizei,
        transpose: GLboolean,
        value: &[GLfloat],
    ) {
        let Some(values) = elements(value, count, 16) else {
            return;
        };
        let mut matrices: Vec<[f32; 16]> = values
            .chunks_exact(16)
            .filter_map(|m| <[f32; 16]>::try_from(m).ok())
            .collect();
        if transpose != GL_FALSE {
            for m in &mut matrices {
                *m = transpose_mat4(m);
            }
        }
        let value = match matrices.as_slice() {
            [single] => UniformValue::Matrix4(*single),
            _ => UniformValue::Matrix4Array(matrices),
        };
        self.set_uniform(location, value);
    }
}
