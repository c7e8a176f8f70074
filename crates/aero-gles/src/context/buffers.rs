use tracing::{debug, trace};

use crate::backend::{BufferDesc, BufferUsage, GpuBackend};
use crate::error::GlesError;
use crate::gl::*;
use crate::resources::BufferKind;

use super::GlContext;

fn buffer_kind(target: GLenum) -> Option<BufferKind> {
    match target {
        GL_ARRAY_BUFFER => Some(BufferKind::Vertex),
        GL_ELEMENT_ARRAY_BUFFER => Some(BufferKind::Index),
        _ => None,
    }
}

impl<B: GpuBackend> GlContext<B> {
    pub fn gen_buffers(&mut self, n: GLsizei) -> Vec<GLuint> {
        let handles = self.buffer_ids.generate(n.max(0) as usize);
        for &handle in &handles {
            self.buffers.create(handle);
        }
        handles
    }

    pub fn delete_buffers(&mut self, buffers: &[GLuint]) {
        for &handle in buffers {
            let Some(mut info) = self.buffers.remove(handle) else {
                trace!(handle, "delete of unknown buffer");
                continue;
            };
            info.release(&mut self.backend);
            self.buffer_ids.release(handle);
            if self.array_buffer == handle {
                self.array_buffer = 0;
            }
            if self.element_array_buffer == handle {
                self.element_array_buffer = 0;
            }
        }
    }

    pub fn bind_buffer(&mut self, target: GLenum, buffer: GLuint) {
        if buffer != 0 && !self.buffers.contains(buffer) {
            trace!(buffer, "bind_buffer: unknown buffer");
        }
        match buffer_kind(target) {
            Some(BufferKind::Vertex) => self.array_buffer = buffer,
            Some(BufferKind::Index) => self.element_array_buffer = buffer,
            None => debug!(target, "bind_buffer: unsupported target"),
        }
    }

    fn bound_buffer(&self, target: GLenum) -> Option<GLuint> {
        match buffer_kind(target)? {
            BufferKind::Vertex => Some(self.array_buffer),
            BufferKind::Index => Some(self.element_array_buffer),
        }
        .filter(|&handle| handle != 0)
    }

    /// Recreate the storage of the buffer bound to `target`.
    ///
    /// `data` shorter than `size` leaves the tail zeroed; longer data is truncated.
    pub fn buffer_data(
        &mut self,
        target: GLenum,
        size: GLsizeiptr,
        data: Option<&[u8]>,
        usage: GLenum,
    ) -> Result<(), GlesError> {
        let Some(handle) = self.bound_buffer(target) else {
            debug!(target, "buffer_data: no buffer bound");
            return Ok(());
        };
        let Some(kind) = buffer_kind(target) else {
            return Ok(());
        };
        let Some(info) = self.buffers.get_mut(handle) else {
            return Ok(());
        };
        info.release(&mut self.backend);
        info.kind = kind;
        info.usage = usage;
        if size <= 0 {
            return Ok(());
        }

        let size = size as usize;
        let initial = data.map(|data| {
            let mut bytes = data[..data.len().min(size)].to_vec();
            bytes.resize(size, 0);
            bytes
        });
        let buffer = self.backend.create_buffer(
            &BufferDesc {
                size,
                usage: BufferUsage::STAGING,
            },
            initial.as_deref(),
        )?;
        info.buffer = Some(buffer);
        info.size = size;
        trace!(handle, size, ?kind, "buffer storage created");
        Ok(())
    }

    pub fn buffer_sub_data(
        &mut self,
        target: GLenum,
        offset: GLintptr,
        data: &[u8],
    ) -> Result<(), GlesError> {
        let Some(info) = self.bound_buffer(target).and_then(|h| self.buffers.get(h)) else {
            debug!(target, "buffer_sub_data: no buffer bound");
            return Ok(());
        };
        let Some(buffer) = info.buffer else {
            debug!(target, "buffer_sub_data: buffer has no storage");
            return Ok(());
        };
        let in_bounds = usize::try_from(offset)
            .ok()
            .and_then(|offset| offset.checked_add(data.len()))
            .is_some_and(|end| end <= info.size);
        if !in_bounds {
            debug!(offset, len = data.len(), size = info.size, "buffer_sub_data: out of range");
            return Ok(());
        }
        self.backend.write_buffer(buffer, offset as usize, data)?;
        Ok(())
    }
}
