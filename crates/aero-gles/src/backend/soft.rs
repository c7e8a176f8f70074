//! Deterministic in-memory backend.
//!
//! Objects live in hash maps keyed by a single monotonically increasing id. Every trait call is
//! appended to a log, and every draw snapshots the vertex bytes and pipeline state it would have
//! consumed, so tests can assert on exactly what a GL call sequence produced.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use hashbrown::HashMap;

use crate::state::{
    BlendDesc, DepthStencilDesc, PrimitiveTopology, RasterizerDesc, SamplerDesc, ScissorRect,
    Viewport,
};
use crate::vertex::InputElement;

use super::{
    BackendError, BlendStateId, BufferDesc, BufferId, BufferUsage, ClearFlags,
    DepthStencilStateId, GpuBackend, InputLayoutId, MapMode, RasterizerStateId, SamplerId,
    ShaderId, ShaderStage, TextureBinding, TextureDesc, TextureId, ViewId, ViewKind,
};

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    CreateTexture { id: TextureId, desc: TextureDesc },
    DestroyTexture(TextureId),
    CreateView { id: ViewId, texture: TextureId, kind: ViewKind },
    DestroyView(ViewId),
    CreateSampler { id: SamplerId, desc: SamplerDesc },
    DestroySampler(SamplerId),
    CreateBuffer { id: BufferId, desc: BufferDesc },
    DestroyBuffer(BufferId),
    WriteBuffer { id: BufferId, offset: usize, len: usize },
    MapBuffer { id: BufferId, mode: MapMode },
    UnmapBuffer { id: BufferId, written: Range<usize> },
    CreateShader { id: ShaderId, stage: ShaderStage },
    DestroyShader(ShaderId),
    CreateInputLayout { id: InputLayoutId, elements: Vec<InputElement>, stride: u32 },
    DestroyInputLayout(InputLayoutId),
    CreateBlendState { id: BlendStateId, desc: BlendDesc },
    DestroyBlendState(BlendStateId),
    CreateDepthStencilState { id: DepthStencilStateId, desc: DepthStencilDesc },
    DestroyDepthStencilState(DepthStencilStateId),
    CreateRasterizerState { id: RasterizerStateId, desc: RasterizerDesc },
    DestroyRasterizerState(RasterizerStateId),
    SetRenderTargets { colors: Vec<ViewId>, depth_stencil: Option<ViewId> },
    SetViewport(Viewport),
    SetScissorRect(ScissorRect),
    SetPrimitiveTopology(PrimitiveTopology),
    SetInputLayout(InputLayoutId),
    SetVertexBuffer { buffer: BufferId, stride: u32, offset: usize },
    SetShaders { vertex: ShaderId, fragment: ShaderId },
    SetConstantBuffer(Option<BufferId>),
    SetBlendState { state: BlendStateId, sample_mask: u32 },
    SetDepthStencilState { state: DepthStencilStateId, stencil_ref: u32 },
    SetRasterizerState(RasterizerStateId),
    SetTexture { slot: u32, binding: Option<TextureBinding> },
    Draw { vertex_count: u32, first_vertex: u32 },
    ClearRenderTarget { view: ViewId, color: [f32; 4] },
    ClearDepthStencil { view: ViewId, flags: ClearFlags, depth: f32, stencil: u8 },
    Flush,
    Finish,
}

impl Call {
    /// Whether the call creates a native object.
    pub fn is_creation(&self) -> bool {
        matches!(
            self,
            Call::CreateTexture { .. }
                | Call::CreateView { .. }
                | Call::CreateSampler { .. }
                | Call::CreateBuffer { .. }
                | Call::CreateShader { .. }
                | Call::CreateInputLayout { .. }
                | Call::CreateBlendState { .. }
                | Call::CreateDepthStencilState { .. }
                | Call::CreateRasterizerState { .. }
        )
    }
}

/// Snapshot of one draw.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawRecord {
    pub topology: Option<PrimitiveTopology>,
    pub vertex_count: u32,
    pub first_vertex: u32,
    pub stride: u32,
    /// Byte offset the vertex buffer was bound at.
    pub offset: usize,
    /// The `vertex_count * stride` bytes the draw reads.
    pub vertices: Vec<u8>,
    pub render_targets: Vec<ViewId>,
    pub depth_stencil: Option<ViewId>,
    pub textures: Vec<(u32, TextureBinding)>,
    /// Constant buffer contents at draw time; empty when none is bound.
    pub constants: Vec<u8>,
    pub blend: Option<BlendDesc>,
    pub depth_stencil_state: Option<DepthStencilDesc>,
    pub rasterizer: Option<RasterizerDesc>,
    pub stencil_ref: u32,
    pub sample_mask: u32,
}

impl DrawRecord {
    /// Vertex bytes reinterpreted as floats.
    pub fn vertex_floats(&self) -> Vec<f32> {
        bytemuck::pod_collect_to_vec(&self.vertices)
    }
}

struct SoftTexture {
    desc: TextureDesc,
    data: Vec<u8>,
}

struct SoftBuffer {
    desc: BufferDesc,
    data: Vec<u8>,
}

#[derive(Default)]
struct Bindings {
    render_targets: Vec<ViewId>,
    depth_stencil: Option<ViewId>,
    topology: Option<PrimitiveTopology>,
    input_layout: Option<InputLayoutId>,
    vertex_buffer: Option<(BufferId, u32, usize)>,
    shaders: Option<(ShaderId, ShaderId)>,
    constant_buffer: Option<BufferId>,
    blend: Option<(BlendStateId, u32)>,
    depth_stencil_state: Option<(DepthStencilStateId, u32)>,
    rasterizer: Option<RasterizerStateId>,
    textures: BTreeMap<u32, TextureBinding>,
}

#[derive(Default)]
pub struct RecordingBackend {
    next_id: u32,
    fail_next_creation: bool,

    textures: HashMap<u32, SoftTexture>,
    views: HashMap<u32, (TextureId, ViewKind)>,
    samplers: HashMap<u32, SamplerDesc>,
    buffers: HashMap<u32, SoftBuffer>,
    shaders: HashMap<u32, ShaderStage>,
    input_layouts: HashMap<u32, (Vec<InputElement>, u32)>,
    blend_states: HashMap<u32, BlendDesc>,
    depth_stencil_states: HashMap<u32, DepthStencilDesc>,
    rasterizer_states: HashMap<u32, RasterizerDesc>,

    bindings: Bindings,
    calls: Vec<Call>,
    draws: Vec<DrawRecord>,
}

impl fmt::Debug for RecordingBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingBackend")
            .field("live_objects", &self.live_objects())
            .field("calls", &self.calls.len())
            .field("draws", &self.draws.len())
            .finish_non_exhaustive()
    }
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }

    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn take_draws(&mut self) -> Vec<DrawRecord> {
        std::mem::take(&mut self.draws)
    }

    /// Number of native objects currently alive, of every kind.
    pub fn live_objects(&self) -> usize {
        self.textures.len()
            + self.views.len()
            + self.samplers.len()
            + self.buffers.len()
            + self.shaders.len()
            + self.input_layouts.len()
            + self.blend_states.len()
            + self.depth_stencil_states.len()
            + self.rasterizer_states.len()
    }

    pub fn texture_desc(&self, id: TextureId) -> Option<&TextureDesc> {
        self.textures.get(&id.0).map(|t| &t.desc)
    }

    pub fn texture_data(&self, id: TextureId) -> Option<&[u8]> {
        self.textures.get(&id.0).map(|t| t.data.as_slice())
    }

    /// Texture a view was created from.
    pub fn view_texture(&self, id: ViewId) -> Option<TextureId> {
        self.views.get(&id.0).map(|(texture, _)| *texture)
    }

    pub fn buffer_data(&self, id: BufferId) -> Option<&[u8]> {
        self.buffers.get(&id.0).map(|b| b.data.as_slice())
    }

    pub fn sampler_desc(&self, id: SamplerId) -> Option<&SamplerDesc> {
        self.samplers.get(&id.0)
    }

    /// Make the next `create_*` call fail with [`BackendError::OutOfMemory`].
    pub fn fail_next_creation(&mut self) {
        self.fail_next_creation = true;
    }

    fn alloc(&mut self, kind: &'static str) -> Result<u32, BackendError> {
        if std::mem::take(&mut self.fail_next_creation) {
            return Err(BackendError::OutOfMemory(kind));
        }
        self.next_id += 1;
        Ok(self.next_id)
    }

    fn snapshot_draw(&self, vertex_count: u32, first_vertex: u32) -> Result<DrawRecord, BackendError> {
        let b = &self.bindings;
        if b.shaders.is_none() {
            return Err(BackendError::MissingBinding("shaders"));
        }
        if b.input_layout.is_none() {
            return Err(BackendError::MissingBinding("input layout"));
        }
        let (buffer, stride, offset) = b
            .vertex_buffer
            .ok_or(BackendError::MissingBinding("vertex buffer"))?;
        let data = &self
            .buffers
            .get(&buffer.0)
            .ok_or_else(|| BackendError::unknown("buffer", buffer.0))?
            .data;
        let start = offset + first_vertex as usize * stride as usize;
        let end = start + vertex_count as usize * stride as usize;
        let vertices = data
            .get(start..end)
            .ok_or(BackendError::BufferWriteOutOfBounds {
                buffer_size: data.len(),
                write_end: end,
            })?
            .to_vec();

        let constants = b
            .constant_buffer
            .and_then(|id| self.buffers.get(&id.0))
            .map(|buf| buf.data.clone())
            .unwrap_or_default();

        Ok(DrawRecord {
            topology: b.topology,
            vertex_count,
            first_vertex,
            stride,
            offset,
            vertices,
            render_targets: b.render_targets.clone(),
            depth_stencil: b.depth_stencil,
            textures: b.textures.iter().map(|(slot, t)| (*slot, *t)).collect(),
            constants,
            blend: b
                .blend
                .and_then(|(id, _)| self.blend_states.get(&id.0).copied()),
            depth_stencil_state: b
                .depth_stencil_state
                .and_then(|(id, _)| self.depth_stencil_states.get(&id.0).copied()),
            rasterizer: b
                .rasterizer
                .and_then(|id| self.rasterizer_states.get(&id.0).copied()),
            stencil_ref: b.depth_stencil_state.map_or(0, |(_, r)| r),
            sample_mask: b.blend.map_or(u32::MAX, |(_, m)| m),
        })
    }

    fn view(&self, id: ViewId, expected: ViewKind) -> Result<TextureId, BackendError> {
        match self.views.get(&id.0) {
            Some((texture, kind)) if *kind == expected => Ok(*texture),
            _ => Err(BackendError::unknown("view", id.0)),
        }
    }
}

impl GpuBackend for RecordingBackend {
    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        data: Option<&[u8]>,
    ) -> Result<TextureId, BackendError> {
        let expected = desc.width as usize * desc.height as usize * desc.format.bytes_per_texel();
        let contents = match data {
            Some(data) if data.len() != expected => {
                return Err(BackendError::TextureDataSize {
                    width: desc.width,
                    height: desc.height,
                    expected,
                    actual: data.len(),
                })
            }
            Some(data) => data.to_vec(),
            None => vec![0; expected],
        };
        let id = TextureId(self.alloc("texture")?);
        self.textures.insert(
            id.0,
            SoftTexture {
                desc: *desc,
                data: contents,
            },
        );
        self.calls.push(Call::CreateTexture { id, desc: *desc });
        Ok(id)
    }

    fn destroy_texture(&mut self, id: TextureId) {
        if self.textures.remove(&id.0).is_some() {
            self.calls.push(Call::DestroyTexture(id));
        }
    }

    fn create_view(&mut self, texture: TextureId, kind: ViewKind) -> Result<ViewId, BackendError> {
        let format = self
            .textures
            .get(&texture.0)
            .ok_or_else(|| BackendError::unknown("texture", texture.0))?
            .desc
            .format;
        let compatible = match kind {
            ViewKind::ShaderResource => true,
            ViewKind::RenderTarget => !format.is_depth(),
            ViewKind::DepthStencil => format.is_depth(),
        };
        if !compatible {
            return Err(BackendError::IncompatibleView(format));
        }
        let id = ViewId(self.alloc("view")?);
        self.views.insert(id.0, (texture, kind));
        self.calls.push(Call::CreateView { id, texture, kind });
        Ok(id)
    }

    fn destroy_view(&mut self, id: ViewId) {
        if self.views.remove(&id.0).is_some() {
            self.calls.push(Call::DestroyView(id));
        }
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerId, BackendError> {
        let id = SamplerId(self.alloc("sampler")?);
        self.samplers.insert(id.0, *desc);
        self.calls.push(Call::CreateSampler { id, desc: *desc });
        Ok(id)
    }

    fn destroy_sampler(&mut self, id: SamplerId) {
        if self.samplers.remove(&id.0).is_some() {
            self.calls.push(Call::DestroySampler(id));
        }
    }

    fn create_buffer(
        &mut self,
        desc: &BufferDesc,
        data: Option<&[u8]>,
    ) -> Result<BufferId, BackendError> {
        let mut contents = vec![0; desc.size];
        if let Some(data) = data {
            let dst = contents
                .get_mut(..data.len())
                .ok_or(BackendError::BufferWriteOutOfBounds {
                    buffer_size: desc.size,
                    write_end: data.len(),
                })?;
            dst.copy_from_slice(data);
        }
        let id = BufferId(self.alloc("buffer")?);
        self.buffers.insert(
            id.0,
            SoftBuffer {
                desc: *desc,
                data: contents,
            },
        );
        self.calls.push(Call::CreateBuffer { id, desc: *desc });
        Ok(id)
    }

    fn destroy_buffer(&mut self, id: BufferId) {
        if self.buffers.remove(&id.0).is_some() {
            self.calls.push(Call::DestroyBuffer(id));
        }
    }

    fn write_buffer(
        &mut self,
        id: BufferId,
        offset: usize,
        data: &[u8],
    ) -> Result<(), BackendError> {
        let buffer = self
            .buffers
            .get_mut(&id.0)
            .ok_or_else(|| BackendError::unknown("buffer", id.0))?;
        let buffer_size = buffer.data.len();
        let write_end = offset.saturating_add(data.len());
        let dst = buffer
            .data
            .get_mut(offset..write_end)
            .ok_or(BackendError::BufferWriteOutOfBounds {
                buffer_size,
                write_end,
            })?;
        dst.copy_from_slice(data);
        self.calls.push(Call::WriteBuffer {
            id,
            offset,
            len: data.len(),
        });
        Ok(())
    }

    fn buffer_contents(&self, id: BufferId) -> Result<&[u8], BackendError> {
        let buffer = self
            .buffers
            .get(&id.0)
            .ok_or_else(|| BackendError::unknown("buffer", id.0))?;
        if !buffer.desc.usage.contains(BufferUsage::STAGING) {
            return Err(BackendError::NotMappable(id.0));
        }
        Ok(&buffer.data)
    }

    fn map_buffer(&mut self, id: BufferId, mode: MapMode) -> Result<&mut [u8], BackendError> {
        let buffer = self
            .buffers
            .get_mut(&id.0)
            .ok_or_else(|| BackendError::unknown("buffer", id.0))?;
        if !buffer
            .desc
            .usage
            .intersects(BufferUsage::DYNAMIC | BufferUsage::STAGING)
        {
            return Err(BackendError::NotMappable(id.0));
        }
        self.calls.push(Call::MapBuffer { id, mode });
        // A discard map hands out "fresh" storage; keeping the old bytes makes stale reads
        // observable in tests.
        Ok(&mut buffer.data)
    }

    fn unmap_buffer(&mut self, id: BufferId, written: Range<usize>) {
        self.calls.push(Call::UnmapBuffer { id, written });
    }

    fn create_shader(
        &mut self,
        stage: ShaderStage,
        bytecode: &[u8],
    ) -> Result<ShaderId, BackendError> {
        if bytecode.is_empty() {
            return Err(BackendError::InvalidBytecode("empty bytecode".into()));
        }
        let id = ShaderId(self.alloc("shader")?);
        self.shaders.insert(id.0, stage);
        self.calls.push(Call::CreateShader { id, stage });
        Ok(id)
    }

    fn destroy_shader(&mut self, id: ShaderId) {
        if self.shaders.remove(&id.0).is_some() {
            self.calls.push(Call::DestroyShader(id));
        }
    }

    fn create_input_layout(
        &mut self,
        elements: &[InputElement],
        stride: u32,
        vertex_bytecode: &[u8],
    ) -> Result<InputLayoutId, BackendError> {
        if vertex_bytecode.is_empty() {
            return Err(BackendError::InvalidBytecode(
                "input layout without vertex shader bytecode".into(),
            ));
        }
        let id = InputLayoutId(self.alloc("input layout")?);
        self.input_layouts.insert(id.0, (elements.to_vec(), stride));
        self.calls.push(Call::CreateInputLayout {
            id,
            elements: elements.to_vec(),
            stride,
        });
        Ok(id)
    }

    fn destroy_input_layout(&mut self, id: InputLayoutId) {
        if self.input_layouts.remove(&id.0).is_some() {
            self.calls.push(Call::DestroyInputLayout(id));
        }
    }

    fn create_blend_state(&mut self, desc: &BlendDesc) -> Result<BlendStateId, BackendError> {
        let id = BlendStateId(self.alloc("blend state")?);
        self.blend_states.insert(id.0, *desc);
        self.calls.push(Call::CreateBlendState { id, desc: *desc });
        Ok(id)
    }

    fn destroy_blend_state(&mut self, id: BlendStateId) {
        if self.blend_states.remove(&id.0).is_some() {
            self.calls.push(Call::DestroyBlendState(id));
        }
    }

    fn create_depth_stencil_state(
        &mut self,
        desc: &DepthStencilDesc,
    ) -> Result<DepthStencilStateId, BackendError> {
        let id = DepthStencilStateId(self.alloc("depth-stencil state")?);
        self.depth_stencil_states.insert(id.0, *desc);
        self.calls
            .push(Call::CreateDepthStencilState { id, desc: *desc });
        Ok(id)
    }

    fn destroy_depth_stencil_state(&mut self, id: DepthStencilStateId) {
        if self.depth_stencil_states.remove(&id.0).is_some() {
            self.calls.push(Call::DestroyDepthStencilState(id));
        }
    }

    fn create_rasterizer_state(
        &mut self,
        desc: &RasterizerDesc,
    ) -> Result<RasterizerStateId, BackendError> {
        let id = RasterizerStateId(self.alloc("rasterizer state")?);
        self.rasterizer_states.insert(id.0, *desc);
        self.calls.push(Call::CreateRasterizerState { id, desc: *desc });
        Ok(id)
    }

    fn destroy_rasterizer_state(&mut self, id: RasterizerStateId) {
        if self.rasterizer_states.remove(&id.0).is_some() {
            self.calls.push(Call::DestroyRasterizerState(id));
        }
    }

    fn set_render_targets(&mut self, colors: &[ViewId], depth_stencil: Option<ViewId>) {
        self.bindings.render_targets = colors.to_vec();
        self.bindings.depth_stencil = depth_stencil;
        self.calls.push(Call::SetRenderTargets {
            colors: colors.to_vec(),
            depth_stencil,
        });
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.calls.push(Call::SetViewport(viewport));
    }

    fn set_scissor_rect(&mut self, rect: ScissorRect) {
        self.calls.push(Call::SetScissorRect(rect));
    }

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) {
        self.bindings.topology = Some(topology);
        self.calls.push(Call::SetPrimitiveTopology(topology));
    }

    fn set_input_layout(&mut self, layout: InputLayoutId) {
        self.bindings.input_layout = Some(layout);
        self.calls.push(Call::SetInputLayout(layout));
    }

    fn set_vertex_buffer(&mut self, buffer: BufferId, stride: u32, offset: usize) {
        self.bindings.vertex_buffer = Some((buffer, stride, offset));
        self.calls.push(Call::SetVertexBuffer {
            buffer,
            stride,
            offset,
        });
    }

    fn set_shaders(&mut self, vertex: ShaderId, fragment: ShaderId) {
        self.bindings.shaders = Some((vertex, fragment));
        self.calls.push(Call::SetShaders { vertex, fragment });
    }

    fn set_constant_buffer(&mut self, buffer: Option<BufferId>) {
        self.bindings.constant_buffer = buffer;
        self.calls.push(Call::SetConstantBuffer(buffer));
    }

    fn set_blend_state(&mut self, state: BlendStateId, sample_mask: u32) {
        self.bindings.blend = Some((state, sample_mask));
        self.calls.push(Call::SetBlendState { state, sample_mask });
    }

    fn set_depth_stencil_state(&mut self, state: DepthStencilStateId, stencil_ref: u32) {
        self.bindings.depth_stencil_state = Some((state, stencil_ref));
        self.calls
            .push(Call::SetDepthStencilState { state, stencil_ref });
    }

    fn set_rasterizer_state(&mut self, state: RasterizerStateId) {
        self.bindings.rasterizer = Some(state);
        self.calls.push(Call::SetRasterizerState(state));
    }

    fn set_texture(&mut self, slot: u32, binding: Option<TextureBinding>) {
        match binding {
            Some(binding) => {
                self.bindings.textures.insert(slot, binding);
            }
            None => {
                self.bindings.textures.remove(&slot);
            }
        }
        self.calls.push(Call::SetTexture { slot, binding });
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<(), BackendError> {
        let record = self.snapshot_draw(vertex_count, first_vertex)?;
        self.draws.push(record);
        self.calls.push(Call::Draw {
            vertex_count,
            first_vertex,
        });
        Ok(())
    }

    fn clear_render_target(&mut self, view: ViewId, color: [f32; 4]) -> Result<(), BackendError> {
        let texture = self.view(view, ViewKind::RenderTarget)?;
        if let Some(texture) = self.textures.get_mut(&texture.0) {
            let texel = color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
            for chunk in texture.data.chunks_exact_mut(4) {
                chunk.copy_from_slice(&texel);
            }
        }
        self.calls.push(Call::ClearRenderTarget { view, color });
        Ok(())
    }

    fn clear_depth_stencil(
        &mut self,
        view: ViewId,
        flags: ClearFlags,
        depth: f32,
        stencil: u8,
    ) -> Result<(), BackendError> {
        self.view(view, ViewKind::DepthStencil)?;
        self.calls.push(Call::ClearDepthStencil {
            view,
            flags,
            depth,
            stencil,
        });
        Ok(())
    }

    fn flush(&mut self) -> Result<(), BackendError> {
        self.calls.push(Call::Flush);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), BackendError> {
        self.calls.push(Call::Finish);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TextureFormat;

    #[test]
    fn render_target_views_require_colour_textures() {
        let mut backend = RecordingBackend::new();
        let depth = backend
            .create_texture(
                &TextureDesc {
                    width: 4,
                    height: 4,
                    format: TextureFormat::Depth24PlusStencil8,
                    usage: crate::backend::TextureUsage::DEPTH_STENCIL,
                },
                None,
            )
            .unwrap();
        assert!(matches!(
            backend.create_view(depth, ViewKind::RenderTarget),
            Err(BackendError::IncompatibleView(TextureFormat::Depth24PlusStencil8))
        ));
        assert!(backend.create_view(depth, ViewKind::DepthStencil).is_ok());
    }

    #[test]
    fn injected_failures_affect_one_creation() {
        let mut backend = RecordingBackend::new();
        backend.fail_next_creation();
        assert!(matches!(
            backend.create_sampler(&SamplerDesc::default()),
            Err(BackendError::OutOfMemory("sampler"))
        ));
        assert!(backend.create_sampler(&SamplerDesc::default()).is_ok());
        assert_eq!(backend.live_objects(), 1);
    }

    #[test]
    fn draws_without_a_pipeline_are_rejected() {
        let mut backend = RecordingBackend::new();
        assert!(matches!(
            backend.draw(3, 0),
            Err(BackendError::MissingBinding("shaders"))
        ));
        assert!(backend.draws().is_empty());
    }

    #[test]
    fn writes_past_the_end_fail() {
        let mut backend = RecordingBackend::new();
        let buffer = backend
            .create_buffer(
                &BufferDesc {
                    size: 8,
                    usage: BufferUsage::STAGING,
                },
                None,
            )
            .unwrap();
        assert!(backend.write_buffer(buffer, 4, &[1, 2, 3, 4]).is_ok());
        assert!(matches!(
            backend.write_buffer(buffer, 6, &[1, 2, 3]),
            Err(BackendError::BufferWriteOutOfBounds {
                buffer_size: 8,
                write_end: 9
            })
        ));
        assert_eq!(backend.buffer_data(buffer).unwrap(), &[0, 0, 0, 0, 1, 2, 3, 4]);
    }
}
