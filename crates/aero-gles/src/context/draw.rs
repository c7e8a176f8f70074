use std::ops::Range;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::backend::{
    BackendError, BufferDesc, BufferId, BufferUsage, GpuBackend, InputLayoutId, MapMode,
    TextureBinding,
};
use crate::error::GlesError;
use crate::gl::*;
use crate::resources::AttribPointer;
use crate::state::{translate_primitive_mode, PrimitiveMode};
use crate::vertex::{
    emitted_vertex_count, plan_chunks, AttribStream, ComponentType, IndexSource,
    InterleavedLayout, Repacker, Semantic,
};

use super::GlContext;

/// The `indices` argument of `draw_elements`.
#[derive(Clone, Copy, Debug)]
pub enum Indices<'a> {
    /// Byte offset into the buffer bound to `GL_ELEMENT_ARRAY_BUFFER`.
    Offset(usize),
    /// Client memory holding little-endian 16-bit indices.
    Client(&'a [u8]),
}

/// Index source of a draw before buffer contents are resolved.
#[derive(Clone, Copy, Debug)]
enum IndexSpec<'a> {
    Sequential(usize),
    Client(&'a [u8]),
    Buffer(BufferId, usize),
}

#[derive(Clone, Debug)]
enum StreamData {
    Client(Arc<[u8]>),
    Buffer(BufferId, usize),
}

#[derive(Clone, Debug)]
struct StreamSpec {
    semantic: Semantic,
    data: StreamData,
    size: usize,
    ty: ComponentType,
    normalized: bool,
    stride: usize,
}

/// Contents of `buffer` from `offset` on; empty when unreadable.
fn buffer_tail<B: GpuBackend>(backend: &B, buffer: BufferId, offset: usize) -> &[u8] {
    backend
        .buffer_contents(buffer)
        .ok()
        .and_then(|data| data.get(offset..))
        .unwrap_or_default()
}

impl<B: GpuBackend> GlContext<B> {
    pub fn draw_arrays(
        &mut self,
        mode: GLenum,
        first: GLint,
        count: GLsizei,
    ) -> Result<(), GlesError> {
        let (Ok(first), Ok(count)) = (usize::try_from(first), usize::try_from(count)) else {
            debug!(first, count, "draw_arrays: negative range");
            return Ok(());
        };
        self.draw(mode, count, IndexSpec::Sequential(first))
    }

    /// Indexed draw; only `GL_UNSIGNED_SHORT` indices are supported.
    pub fn draw_elements(
        &mut self,
        mode: GLenum,
        count: GLsizei,
        ty: GLenum,
        indices: Indices<'_>,
    ) -> Result<(), GlesError> {
        if ty != GL_UNSIGNED_SHORT {
            debug!(ty, "draw_elements: unsupported index type");
            return Ok(());
        }
        let Ok(count) = usize::try_from(count) else {
            debug!(count, "draw_elements: negative count");
            return Ok(());
        };
        let spec = match indices {
            Indices::Client(bytes) => IndexSpec::Client(bytes),
            Indices::Offset(offset) => {
                let buffer = self
                    .buffers
                    .get(self.element_array_buffer)
                    .and_then(|info| info.buffer);
                match buffer {
                    Some(buffer) => IndexSpec::Buffer(buffer, offset),
                    None => {
                        debug!("draw_elements: offset without a bound index buffer");
                        return Ok(());
                    }
                }
            }
        };
        self.draw(mode, count, spec)
    }

    fn draw(
        &mut self,
        mode: GLenum,
        count: usize,
        indices: IndexSpec<'_>,
    ) -> Result<(), GlesError> {
        let program = self.current_program;
        if count == 0 || program == 0 {
            return Ok(());
        }
        let Some(mode) = PrimitiveMode::from_gl(mode) else {
            debug!(mode, "unsupported primitive mode");
            return Ok(());
        };
        let Some((vs, fs)) = self
            .programs
            .get(program)
            .filter(|info| info.linked)
            .and_then(|info| info.native_shaders)
        else {
            debug!(program, "draw with an unlinked program");
            return Ok(());
        };
        if !self.resolve_render_target()? {
            trace!("draw skipped: incomplete framebuffer");
            return Ok(());
        }
        let Some(input_layout) = self.ensure_input_layout(program)? else {
            debug!(program, "draw without vertex attributes");
            return Ok(());
        };
        let Some(layout) = self
            .programs
            .get(program)
            .map(|info| info.input_layout.desc().clone())
        else {
            return Ok(());
        };

        let stride = layout.stride() as usize;
        let max_vertices = self.staging.capacity() / stride;
        if max_vertices == 0 {
            return Err(GlesError::StagingTooSmall {
                capacity: self.staging.capacity(),
                stride,
            });
        }
        let chunks = plan_chunks(mode, emitted_vertex_count(mode, count), max_vertices);
        if chunks.is_empty() {
            trace!(?mode, count, "draw has no complete primitive");
            return Ok(());
        }

        self.upload_constants(program)?;
        self.bind_state_objects()?;
        self.backend.set_shaders(vs, fs);
        self.backend.set_input_layout(input_layout);
        self.backend
            .set_primitive_topology(translate_primitive_mode(mode).topology);
        let bound_slots = self.bind_sampler_textures(program)?;

        let packed = self.repack_chunks(program, mode, count, &layout, indices, &chunks);
        let result = self.upload_and_draw(&packed, stride);
        for slot in 0..bound_slots {
            self.backend.set_texture(slot, None);
        }
        result
    }

    /// Build the current program's input layout if it is missing or stale.
    ///
    /// `None` when the program is unlinked or declares no attributes.
    pub(super) fn ensure_input_layout(
        &mut self,
        program: GLuint,
    ) -> Result<Option<InputLayoutId>, GlesError> {
        let Some(info) = self.programs.get_mut(program) else {
            return Ok(None);
        };
        if !info.linked || info.input_layout.desc().is_empty() {
            return Ok(None);
        }
        let Some(bytecode) = info.vertex_bytecode.clone() else {
            return Ok(None);
        };
        let backend = &mut self.backend;
        let id = info.input_layout.ensure_built(|layout, stale| {
            if let Some(stale) = stale {
                backend.destroy_input_layout(stale);
            }
            backend.create_input_layout(layout.elements(), layout.stride(), &bytecode)
        })?;
        Ok(Some(id))
    }

    /// Rebuild invalidated state objects and bind all three.
    fn bind_state_objects(&mut self) -> Result<(), GlesError> {
        let backend = &mut self.backend;
        let blend = self.blend.ensure_built(|desc, stale| {
            if let Some(stale) = stale {
                backend.destroy_blend_state(stale);
            }
            backend.create_blend_state(desc)
        })?;
        let depth_stencil = self.depth_stencil.ensure_built(|desc, stale| {
            if let Some(stale) = stale {
                backend.destroy_depth_stencil_state(stale);
            }
            backend.create_depth_stencil_state(desc)
        })?;
        let rasterizer = self.rasterizer.ensure_built(|desc, stale| {
            if let Some(stale) = stale {
                backend.destroy_rasterizer_state(stale);
            }
            backend.create_rasterizer_state(desc)
        })?;
        backend.set_blend_state(blend, self.sample_mask);
        backend.set_depth_stencil_state(depth_stencil, self.stencil_ref);
        backend.set_rasterizer_state(rasterizer);
        Ok(())
    }

    /// Pack the program's uniforms into its constant buffer, resizing it when the packed size
    /// changed, and bind it.
    fn upload_constants(&mut self, program: GLuint) -> Result<(), GlesError> {
        let Some(info) = self.programs.get_mut(program) else {
            return Ok(());
        };
        let packed = info.uniforms.pack();
        if packed.is_empty() {
            self.backend.set_constant_buffer(None);
            return Ok(());
        }

        let buffer = match info.constant_buffer {
            Some((buffer, size)) if size == packed.len() => buffer,
            stale => {
                if let Some((old, _)) = stale {
                    self.backend.destroy_buffer(old);
                }
                info.constant_buffer = None;
                let buffer = self.backend.create_buffer(
                    &BufferDesc {
                        size: packed.len(),
                        usage: BufferUsage::UNIFORM | BufferUsage::DYNAMIC,
                    },
                    None,
                )?;
                info.constant_buffer = Some((buffer, packed.len()));
                buffer
            }
        };

        let mapped = self.backend.map_buffer(buffer, MapMode::WriteDiscard)?;
        let mapped_len = mapped.len();
        mapped
            .get_mut(..packed.len())
            .ok_or(BackendError::BufferWriteOutOfBounds {
                buffer_size: mapped_len,
                write_end: packed.len(),
            })?
            .copy_from_slice(&packed);
        self.backend.unmap_buffer(buffer, 0..packed.len());
        self.backend.set_constant_buffer(Some(buffer));
        Ok(())
    }

    /// Bind the textures read by the program's sampler uniforms to consecutive slots, in
    /// ascending uniform location order. Units without a registered texture are skipped without
    /// consuming a slot; a registered texture without storage consumes its slot but leaves it
    /// unbound. Returns the number of slots consumed.
    fn bind_sampler_textures(&mut self, program: GLuint) -> Result<u32, GlesError> {
        let units: Vec<i32> = self
            .programs
            .get(program)
            .map(|info| info.uniforms.sampler_units().collect())
            .unwrap_or_default();

        let mut slot = 0;
        for unit in units {
            let handle = usize::try_from(unit)
                .ok()
                .and_then(|unit| self.texture_units.get(unit))
                .copied()
                .unwrap_or(0);
            let Some(info) = self.textures.get_mut(handle) else {
                trace!(unit, "sampler unit has no texture");
                continue;
            };
            let Some(view) = info.shader_view else {
                trace!(unit, handle, slot, "sampler texture has no storage; slot left unbound");
                slot += 1;
                continue;
            };
            let backend = &mut self.backend;
            let sampler = info.sampler.ensure_built(|desc, stale| {
                if let Some(stale) = stale {
                    backend.destroy_sampler(stale);
                }
                backend.create_sampler(desc)
            })?;
            self.backend
                .set_texture(slot, Some(TextureBinding { view, sampler }));
            slot += 1;
        }
        Ok(slot)
    }

    fn stream_specs(&self, program: GLuint) -> Vec<StreamSpec> {
        let Some(info) = self.programs.get(program) else {
            return Vec::new();
        };
        info.attribs
            .iter()
            .filter(|attrib| attrib.enabled)
            .filter_map(|attrib| {
                let semantic = attrib.semantic?;
                let data = match &attrib.pointer {
                    AttribPointer::Unset => return None,
                    AttribPointer::Client(bytes) => StreamData::Client(Arc::clone(bytes)),
                    AttribPointer::Buffer { buffer, offset } => {
                        let Some(native) = self.buffers.get(*buffer).and_then(|b| b.buffer) else {
                            trace!(buffer, "attribute buffer has no storage");
                            return None;
                        };
                        StreamData::Buffer(native, *offset)
                    }
                };
                Some(StreamSpec {
                    semantic,
                    data,
                    size: attrib.size,
                    ty: attrib.ty,
                    normalized: attrib.normalized,
                    stride: attrib.stride,
                })
            })
            .collect()
    }

    /// Repack every chunk into the scratch buffer. Returns the byte range of each chunk that
    /// should be drawn; a failed fetch truncates only the chunk it happens in.
    fn repack_chunks(
        &mut self,
        program: GLuint,
        mode: PrimitiveMode,
        count: usize,
        layout: &InterleavedLayout,
        indices: IndexSpec<'_>,
        chunks: &[Range<usize>],
    ) -> Vec<Range<usize>> {
        let specs = self.stream_specs(program);
        let backend = &self.backend;

        let streams: Vec<AttribStream<'_>> = specs
            .iter()
            .map(|spec| AttribStream {
                semantic: spec.semantic,
                data: match &spec.data {
                    StreamData::Client(bytes) => &bytes[..],
                    StreamData::Buffer(buffer, offset) => buffer_tail(backend, *buffer, *offset),
                },
                size: spec.size,
                ty: spec.ty,
                normalized: spec.normalized,
                stride: spec.stride,
            })
            .collect();
        let index_source = match indices {
            IndexSpec::Sequential(first) => IndexSource::Sequential { first },
            IndexSpec::Client(bytes) => IndexSource::U16(bytes),
            IndexSpec::Buffer(buffer, offset) => {
                IndexSource::U16(buffer_tail(backend, buffer, offset))
            }
        };
        let repacker = Repacker {
            mode,
            count,
            indices: index_source,
            layout,
            streams: &streams,
        };

        let stride = layout.stride() as usize;
        let scratch = &mut self.scratch;
        scratch.clear();
        let mut packed = Vec::with_capacity(chunks.len());
        for range in chunks {
            let start = scratch.len();
            scratch.resize(start + range.len() * stride, 0);
            let outcome = repacker.repack(range.clone(), &mut scratch[start..]);
            let drawn = outcome.draw_count();
            scratch.truncate(start + drawn * stride);
            if drawn > 0 {
                packed.push(start..start + drawn * stride);
            }
            if let Some(failed_at) = outcome.failed_at {
                debug!(?mode, count, failed_at, drawn, "partial sub-draw: vertex fetch failed");
            }
        }
        packed
    }

    fn upload_and_draw(&mut self, packed: &[Range<usize>], stride: usize) -> Result<(), GlesError> {
        for range in packed {
            let bytes = &self.scratch[range.clone()];
            self.staging
                .map(&mut self.backend, bytes.len())?
                .copy_from_slice(bytes);
            self.staging.unmap(&mut self.backend);
            self.backend.set_vertex_buffer(
                self.staging.buffer(),
                stride as u32,
                self.staging.last_offset(),
            );
            self.backend.draw((range.len() / stride) as u32, 0)?;
        }
        Ok(())
    }
}
