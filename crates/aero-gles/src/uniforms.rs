//! Program uniform storage and constant-buffer packing.
//!
//! Uniform locations are assigned by the host (`register_uniform_location`), not discovered by
//! reflection. The constant buffer is the concatenation of every uniform's payload in ascending
//! location order, with no per-field padding, rounded up to 16 bytes. Sampler uniforms carry a
//! texture unit and contribute no bytes.

use std::collections::BTreeMap;

use hashbrown::HashMap;

use crate::gl::GLint;

/// Constant buffers are sized in 16-byte registers.
pub const CONSTANT_REGISTER_SIZE: usize = 16;

#[derive(Clone, Debug, Default, PartialEq)]
pub enum UniformValue {
    /// Registered but never written.
    #[default]
    Unset,
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    FloatArray(Vec<f32>),
    IntArray(Vec<i32>),
    Matrix4([f32; 16]),
    Matrix4Array(Vec<[f32; 16]>),
    /// Texture unit read by a sampler.
    Sampler(i32),
}

impl UniformValue {
    pub fn byte_len(&self) -> usize {
        match self {
            UniformValue::Unset | UniformValue::Sampler(_) => 0,
            UniformValue::Int(_) | UniformValue::Float(_) => 4,
            UniformValue::Vec2(_) => 8,
            UniformValue::Vec3(_) => 12,
            UniformValue::Vec4(_) => 16,
            UniformValue::FloatArray(v) => v.len() * 4,
            UniformValue::IntArray(v) => v.len() * 4,
            UniformValue::Matrix4(_) => 64,
            UniformValue::Matrix4Array(v) => v.len() * 64,
        }
    }

    pub fn is_sampler(&self) -> bool {
        matches!(self, UniformValue::Sampler(_))
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            UniformValue::Unset | UniformValue::Sampler(_) => {}
            UniformValue::Int(v) => out.extend_from_slice(&v.to_le_bytes()),
            UniformValue::Float(v) => out.extend_from_slice(&v.to_le_bytes()),
            UniformValue::Vec2(v) => out.extend_from_slice(bytemuck::cast_slice(v)),
            UniformValue::Vec3(v) => out.extend_from_slice(bytemuck::cast_slice(v)),
            UniformValue::Vec4(v) => out.extend_from_slice(bytemuck::cast_slice(v)),
            UniformValue::FloatArray(v) => out.extend_from_slice(bytemuck::cast_slice(v)),
            UniformValue::IntArray(v) => out.extend_from_slice(bytemuck::cast_slice(v)),
            UniformValue::Matrix4(m) => out.extend_from_slice(bytemuck::cast_slice(m)),
            UniformValue::Matrix4Array(v) => {
                for m in v {
                    out.extend_from_slice(bytemuck::cast_slice(m));
                }
            }
        }
    }
}

/// Pack uniform values into a constant buffer image.
///
/// Returns an empty buffer when no value contributes bytes.
pub fn pack_uniforms<'a>(values: impl IntoIterator<Item = &'a UniformValue>) -> Vec<u8> {
    let mut out = Vec::new();
    for value in values {
        value.write_to(&mut out);
    }
    let padded = out.len().div_ceil(CONSTANT_REGISTER_SIZE) * CONSTANT_REGISTER_SIZE;
    out.resize(padded, 0);
    out
}

/// Transpose a 4x4 matrix.
pub fn transpose_mat4(m: &[f32; 16]) -> [f32; 16] {
    let mut out = [0.0; 16];
    for row in 0..4 {
        for col in 0..4 {
            out[col * 4 + row] = m[row * 4 + col];
        }
    }
    out
}

#[derive(Clone, Debug, PartialEq)]
pub struct UniformSlot {
    pub name: String,
    pub value: UniformValue,
}

/// Per-program uniform table keyed by location, iterated in ascending location order.
#[derive(Clone, Debug, Default)]
pub struct UniformTable {
    by_name: HashMap<String, GLint>,
    slots: BTreeMap<GLint, UniformSlot>,
}

impl UniformTable {
    pub fn register(&mut self, location: GLint, name: &str) {
        self.insert(location, name, UniformValue::Unset);
    }

    pub fn register_sampler(&mut self, location: GLint, name: &str) {
        self.insert(location, name, UniformValue::Sampler(0));
    }

    fn insert(&mut self, location: GLint, name: &str, value: UniformValue) {
        if let Some(previous) = self.by_name.insert(name.to_owned(), location) {
            if previous != location {
                self.slots.remove(&previous);
            }
        }
        let replaced = self.slots.insert(
            location,
            UniformSlot {
                name: name.to_owned(),
                value,
            },
        );
        if let Some(replaced) = replaced {
            if replaced.name != name {
                self.by_name.remove(&replaced.name);
            }
        }
    }

    /// GL returns `-1` for names that are not registered.
    pub fn location(&self, name: &str) -> GLint {
        self.by_name.get(name).copied().unwrap_or(-1)
    }

    pub fn get(&self, location: GLint) -> Option<&UniformSlot> {
        self.slots.get(&location)
    }

    pub fn get_mut(&mut self, location: GLint) -> Option<&mut UniformSlot> {
        self.slots.get_mut(&location)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slots in ascending location order.
    pub fn iter(&self) -> impl Iterator<Item = (GLint, &UniformSlot)> {
        self.slots.iter().map(|(loc, slot)| (*loc, slot))
    }

    /// Texture units referenced by sampler uniforms, in ascending location order.
    pub fn sampler_units(&self) -> impl Iterator<Item = i32> + '_ {
        self.slots.values().filter_map(|slot| match slot.value {
            UniformValue::Sampler(unit) => Some(unit),
            _ => None,
        })
    }

    pub fn pack(&self) -> Vec<u8> {
        pack_uniforms(self.slots.values().map(|slot| &slot.value))
    }
}
