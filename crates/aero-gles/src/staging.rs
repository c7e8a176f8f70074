//! Dynamic vertex ring shared by every draw of a context.
//!
//! Writes are appended at a cursor using no-overwrite maps so in-flight draws keep reading their
//! vertices. When a write does not fit in the remaining space the ring restarts at offset 0 with a
//! discard map and the backend hands out fresh storage.

use std::fmt;
use std::ops::Range;

use tracing::trace;

use crate::backend::{BackendError, BufferDesc, BufferId, BufferUsage, GpuBackend, MapMode};

/// Default ring size (3 MiB).
pub const DEFAULT_STAGING_CAPACITY: usize = 3 * 1024 * 1024;

pub struct StagingRing {
    buffer: BufferId,
    capacity: usize,
    cursor: usize,
    last_offset: usize,
    first_map: bool,
    pending: Option<Range<usize>>,
}

impl fmt::Debug for StagingRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagingRing")
            .field("buffer", &self.buffer)
            .field("capacity", &self.capacity)
            .field("cursor", &self.cursor)
            .field("last_offset", &self.last_offset)
            .finish_non_exhaustive()
    }
}

impl StagingRing {
    pub fn new<B: GpuBackend + ?Sized>(
        backend: &mut B,
        capacity: usize,
    ) -> Result<Self, BackendError> {
        let buffer = backend.create_buffer(
            &BufferDesc {
                size: capacity,
                usage: BufferUsage::VERTEX | BufferUsage::DYNAMIC,
            },
            None,
        )?;
        Ok(Self {
            buffer,
            capacity,
            cursor: 0,
            last_offset: 0,
            first_map: true,
            pending: None,
        })
    }

    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Next free byte.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Start of the most recent write; the draw that consumes it binds the ring here.
    pub fn last_offset(&self) -> usize {
        self.last_offset
    }

    /// Map `size` bytes for writing. Must be followed by [`StagingRing::unmap`].
    pub fn map<'a, B: GpuBackend + ?Sized>(
        &mut self,
        backend: &'a mut B,
        size: usize,
    ) -> Result<&'a mut [u8], BackendError> {
        if size > self.capacity {
            return Err(BackendError::BufferWriteOutOfBounds {
                buffer_size: self.capacity,
                write_end: size,
            });
        }

        let (offset, mode) = if self.first_map || self.cursor + size > self.capacity {
            (0, MapMode::WriteDiscard)
        } else {
            (self.cursor, MapMode::WriteNoOverwrite)
        };
        trace!(offset, size, ?mode, "staging map");

        let mapped = backend.map_buffer(self.buffer, mode)?;
        let range = offset..offset + size;
        let len = mapped.len();
        let slice = mapped
            .get_mut(range.clone())
            .ok_or(BackendError::BufferWriteOutOfBounds {
                buffer_size: len,
                write_end: range.end,
            })?;

        self.first_map = false;
        self.last_offset = offset;
        self.pending = Some(range);
        Ok(slice)
    }

    /// Finish the write started by the last `map` and advance the cursor past it.
    pub fn unmap<B: GpuBackend + ?Sized>(&mut self, backend: &mut B) {
        let Some(range) = self.pending.take() else {
            return;
        };
        self.cursor = range.end;
        backend.unmap_buffer(self.buffer, range);
    }

    pub fn destroy<B: GpuBackend + ?Sized>(self, backend: &mut B) {
        backend.destroy_buffer(self.buffer);
    }
}
