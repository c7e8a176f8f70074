//! `wgpu` implementation of [`GpuBackend`].
//!
//! `wgpu` has no standalone blend/depth-stencil/rasterizer objects; those are plain descriptors
//! here and are baked, together with the shaders, input layout and target formats, into render
//! pipelines cached in an LRU keyed by all of them.
//!
//! Shader bytecode is either SPIR-V (entry point `main`) or WGSL text (entry points `vs_main` /
//! `fs_main`). Bind group 0 binding 0 is the program's uniform buffer; bind group 1 holds
//! `MAX_TEXTURE_SLOTS` sampler/texture pairs at bindings `2 * slot` and `2 * slot + 1`.
//!
//! Commands are recorded into one encoder which is submitted before any queue upload, so
//! uploads never overtake draws recorded earlier.

use std::num::NonZeroUsize;
use std::ops::Range;
use std::sync::{Arc, Mutex};

use futures_intrusive::channel::shared::oneshot_channel;
use hashbrown::HashMap;
use lru::LruCache;
use tracing::{debug, error, trace};
use xxhash_rust::xxh3::xxh3_64;

use crate::state::{
    AddressMode, BlendDesc, BlendFactor, BlendOp, CompareFunc, CullMode, DepthStencilDesc,
    FilterMode, PrimitiveTopology, RasterizerDesc, SamplerDesc, ScissorRect, StencilOp,
    Viewport,
};
use crate::vertex::InputElement;

use super::{
    BackendError, BlendStateId, BufferDesc, BufferId, BufferUsage, ClearFlags,
    DepthStencilStateId, GpuBackend, InputLayoutId, MapMode, RasterizerStateId, SamplerId,
    ShaderId, ShaderStage, TextureBinding, TextureDesc, TextureFormat, TextureId, TextureUsage,
    ViewId, ViewKind,
};

/// Texture/sampler pairs available to fragment shaders.
pub const MAX_TEXTURE_SLOTS: usize = 8;

const PIPELINE_CACHE_CAPACITY: usize = 256;
const SPIRV_MAGIC: u32 = 0x0723_0203;

#[derive(Debug, Clone, Copy, Default)]
pub struct WgpuBackendConfig {
    /// Wrap object creation in validation error scopes (see
    /// [`WgpuBackend::begin_validation_scope`]).
    pub validation: bool,
}

struct StoredTexture {
    texture: wgpu::Texture,
    desc: TextureDesc,
}

struct StoredView {
    view: wgpu::TextureView,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
}

struct StoredBuffer {
    /// `None` for CPU-only staging buffers.
    gpu: Option<wgpu::Buffer>,
    shadow: Vec<u8>,
    uniform_bind_group: Option<Arc<wgpu::BindGroup>>,
}

struct StoredShader {
    module: Arc<wgpu::ShaderModule>,
    entry_point: &'static str,
}

struct StoredInputLayout {
    attributes: Vec<wgpu::VertexAttribute>,
    stride: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct PipelineKey {
    vertex: ShaderId,
    fragment: ShaderId,
    layout: InputLayoutId,
    topology: PrimitiveTopology,
    blend: BlendDesc,
    rasterizer: RasterizerDesc,
    depth_stencil: Option<(DepthStencilDesc, wgpu::TextureFormat)>,
    color_formats: Vec<wgpu::TextureFormat>,
    sample_mask: u32,
}

#[derive(Default)]
struct Bindings {
    render_targets: Vec<ViewId>,
    depth_stencil: Option<ViewId>,
    viewport: Option<Viewport>,
    scissor: Option<ScissorRect>,
    topology: Option<PrimitiveTopology>,
    input_layout: Option<InputLayoutId>,
    vertex_buffer: Option<(BufferId, usize)>,
    shaders: Option<(ShaderId, ShaderId)>,
    constant_buffer: Option<BufferId>,
    blend: Option<(BlendStateId, u32)>,
    depth_stencil_state: Option<(DepthStencilStateId, u32)>,
    rasterizer: Option<RasterizerStateId>,
    textures: [Option<TextureBinding>; MAX_TEXTURE_SLOTS],
}

pub struct WgpuBackend {
    config: WgpuBackendConfig,
    device: wgpu::Device,
    queue: wgpu::Queue,
    device_error: Arc<Mutex<Option<String>>>,
    next_id: u32,

    textures: HashMap<u32, StoredTexture>,
    views: HashMap<u32, StoredView>,
    samplers: HashMap<u32, wgpu::Sampler>,
    buffers: HashMap<u32, StoredBuffer>,
    shaders: HashMap<u32, StoredShader>,
    shader_modules: HashMap<u64, Arc<wgpu::ShaderModule>>,
    input_layouts: HashMap<u32, StoredInputLayout>,
    blend_states: HashMap<u32, BlendDesc>,
    depth_stencil_states: HashMap<u32, DepthStencilDesc>,
    rasterizer_states: HashMap<u32, RasterizerDesc>,

    pipelines: LruCache<PipelineKey, Arc<wgpu::RenderPipeline>>,
    pipeline_layout: wgpu::PipelineLayout,
    constants_bind_group_layout: wgpu::BindGroupLayout,
    default_constants_bind_group: Arc<wgpu::BindGroup>,
    texture_bind_group_layout: wgpu::BindGroupLayout,
    texture_bind_group: Option<Arc<wgpu::BindGroup>>,
    default_texture_view: wgpu::TextureView,
    default_sampler: wgpu::Sampler,

    bindings: Bindings,
    encoder: Option<wgpu::CommandEncoder>,
}

impl WgpuBackend {
    /// Create a headless backend on the best available adapter.
    pub async fn new(config: WgpuBackendConfig) -> Result<Self, BackendError> {
        // Prefer GL on Linux CI to avoid crashes in some Vulkan software adapters.
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: if cfg!(target_os = "linux") {
                wgpu::Backends::GL
            } else {
                wgpu::Backends::PRIMARY
            },
            ..Default::default()
        });
        let adapter = match instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
        {
            Some(adapter) => adapter,
            None => instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: true,
                })
                .await
                .ok_or(BackendError::AdapterNotFound)?,
        };

        let wanted = wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER
            | wgpu::Features::DEPTH_CLIP_CONTROL;
        let required_features = adapter.features() & wanted;
        debug!(?required_features, backend = ?adapter.get_info().backend, "aero-gles wgpu adapter");

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("aero-gles-device"),
                    required_features,
                    required_limits: wgpu::Limits::downlevel_defaults(),
                },
                None,
            )
            .await
            .map_err(|e| BackendError::RequestDevice(e.to_string()))?;

        Ok(Self::from_device(config, device, queue))
    }

    /// Wrap an existing device, e.g. one shared with a presentation surface.
    pub fn from_device(config: WgpuBackendConfig, device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let device_error = Arc::new(Mutex::new(None));
        {
            let device_error = Arc::clone(&device_error);
            device.on_uncaptured_error(Box::new(move |err| {
                error!(%err, "wgpu device error");
                if let Ok(mut slot) = device_error.lock() {
                    slot.get_or_insert_with(|| err.to_string());
                }
            }));
        }

        let constants_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("aero-gles-constants-bgl"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let mut texture_entries = Vec::with_capacity(MAX_TEXTURE_SLOTS * 2);
        for slot in 0..MAX_TEXTURE_SLOTS {
            texture_entries.push(wgpu::BindGroupLayoutEntry {
                binding: (slot * 2) as u32,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
            texture_entries.push(wgpu::BindGroupLayoutEntry {
                binding: (slot * 2 + 1) as u32,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            });
        }
        let texture_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("aero-gles-textures-bgl"),
                entries: &texture_entries,
            });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("aero-gles-pipeline-layout"),
            bind_group_layouts: &[&constants_bind_group_layout, &texture_bind_group_layout],
            push_constant_ranges: &[],
        });

        let default_constants = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("aero-gles-default-constants"),
            size: 16,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let default_constants_bind_group =
            Arc::new(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("aero-gles-default-constants-bg"),
                layout: &constants_bind_group_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: default_constants.as_entire_binding(),
                }],
            }));

        let default_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("aero-gles-default-texture"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &default_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &[0u8, 0, 0, 0],
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        let default_texture_view =
            default_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let default_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("aero-gles-default-sampler"),
            ..Default::default()
        });

        Self {
            config,
            device,
            queue,
            device_error,
            next_id: 0,
            textures: HashMap::new(),
            views: HashMap::new(),
            samplers: HashMap::new(),
            buffers: HashMap::new(),
            shaders: HashMap::new(),
            shader_modules: HashMap::new(),
            input_layouts: HashMap::new(),
            blend_states: HashMap::new(),
            depth_stencil_states: HashMap::new(),
            rasterizer_states: HashMap::new(),
            pipelines: LruCache::new(
                NonZeroUsize::new(PIPELINE_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            ),
            pipeline_layout,
            constants_bind_group_layout,
            default_constants_bind_group,
            texture_bind_group_layout,
            texture_bind_group: None,
            default_texture_view,
            default_sampler,
            bindings: Bindings::default(),
            encoder: None,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn begin_validation_scope(&self) {
        if !self.config.validation {
            return;
        }
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
    }

    pub async fn end_validation_scope(&self) -> Option<String> {
        if !self.config.validation {
            return None;
        }
        self.device.pop_error_scope().await.map(|e| e.to_string())
    }

    /// Register a view created outside the backend (typically a surface texture) so it can be
    /// used as the default framebuffer.
    pub fn import_view(
        &mut self,
        view: wgpu::TextureView,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> ViewId {
        let id = ViewId(self.alloc_id());
        self.views.insert(
            id.0,
            StoredView {
                view,
                format,
                width,
                height,
            },
        );
        id
    }

    /// Submit pending work and wait for the queue to drain.
    pub async fn wait_idle(&mut self) {
        self.submit();
        wait_for_queue(&self.device, &self.queue).await;
    }

    /// Read back an RGBA8 texture, rows top-down.
    pub async fn read_texture_rgba8(&mut self, id: TextureId) -> Result<Vec<u8>, BackendError> {
        self.submit();
        let stored = self
            .textures
            .get(&id.0)
            .ok_or_else(|| BackendError::unknown("texture", id.0))?;
        if stored.desc.format != TextureFormat::Rgba8Unorm {
            return Err(BackendError::IncompatibleView(stored.desc.format));
        }

        let width = stored.desc.width;
        let height = stored.desc.height;
        let unpadded_bytes_per_row = width * 4;
        let padded_bytes_per_row =
            align_to(unpadded_bytes_per_row, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);

        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("aero-gles-texture-readback"),
            size: padded_bytes_per_row as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("aero-gles-texture-readback-encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &stored.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &readback,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit([encoder.finish()]);

        let slice = readback.slice(..);
        let (sender, receiver) = oneshot_channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result.map_err(|e| e.to_string()));
        });

        #[cfg(not(target_arch = "wasm32"))]
        self.device.poll(wgpu::Maintain::Wait);

        #[cfg(target_arch = "wasm32")]
        self.device.poll(wgpu::Maintain::Poll);

        receiver
            .receive()
            .await
            .ok_or(BackendError::MapAsyncDropped)?
            .map_err(BackendError::MapAsync)?;

        let data = slice.get_mapped_range();
        let mut pixels = vec![0u8; (unpadded_bytes_per_row * height) as usize];
        for y in 0..height as usize {
            let src = y * padded_bytes_per_row as usize;
            let dst = y * unpadded_bytes_per_row as usize;
            pixels[dst..dst + unpadded_bytes_per_row as usize]
                .copy_from_slice(&data[src..src + unpadded_bytes_per_row as usize]);
        }
        drop(data);
        readback.unmap();
        Ok(pixels)
    }

    fn alloc_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn take_device_error(&self) -> Result<(), BackendError> {
        let pending = self.device_error.lock().ok().and_then(|mut slot| slot.take());
        match pending {
            Some(message) => Err(BackendError::Validation(message)),
            None => Ok(()),
        }
    }

    fn ensure_encoder(&mut self) -> &mut wgpu::CommandEncoder {
        self.encoder.get_or_insert_with(|| {
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("aero-gles-encoder"),
                })
        })
    }

    fn submit(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit([encoder.finish()]);
        }
    }

    /// Upload `range` of a buffer's shadow copy, widened to copy alignment.
    fn upload_shadow(&mut self, id: BufferId, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        // Queue writes run before the next submit; flush recorded draws first.
        self.submit();
        let Some(buffer) = self.buffers.get(&id.0) else {
            return;
        };
        let Some(gpu) = &buffer.gpu else {
            return;
        };
        let align = wgpu::COPY_BUFFER_ALIGNMENT as usize;
        let start = range.start / align * align;
        let end = range.end.div_ceil(align).saturating_mul(align).min(buffer.shadow.len());
        if start < end {
            self.queue
                .write_buffer(gpu, start as u64, &buffer.shadow[start..end]);
        }
    }

    fn map_address_mode(&self, mode: AddressMode) -> wgpu::AddressMode {
        match mode {
            AddressMode::Clamp => wgpu::AddressMode::ClampToEdge,
            AddressMode::Wrap => wgpu::AddressMode::Repeat,
            AddressMode::Mirror => wgpu::AddressMode::MirrorRepeat,
            AddressMode::Border => {
                if self
                    .device
                    .features()
                    .contains(wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER)
                {
                    wgpu::AddressMode::ClampToBorder
                } else {
                    wgpu::AddressMode::ClampToEdge
                }
            }
        }
    }

    fn ensure_texture_bind_group(&mut self) -> Arc<wgpu::BindGroup> {
        if let Some(group) = &self.texture_bind_group {
            return Arc::clone(group);
        }

        let mut entries = Vec::with_capacity(MAX_TEXTURE_SLOTS * 2);
        for (slot, binding) in self.bindings.textures.iter().copied().enumerate() {
            let sampler = binding
                .and_then(|b| self.samplers.get(&b.sampler.0))
                .unwrap_or(&self.default_sampler);
            let view = binding
                .and_then(|b| self.views.get(&b.view.0))
                .map(|v| &v.view)
                .unwrap_or(&self.default_texture_view);
            entries.push(wgpu::BindGroupEntry {
                binding: (slot * 2) as u32,
                resource: wgpu::BindingResource::Sampler(sampler),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: (slot * 2 + 1) as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }

        let group = Arc::new(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("aero-gles-textures-bg"),
            layout: &self.texture_bind_group_layout,
            entries: &entries,
        }));
        self.texture_bind_group = Some(Arc::clone(&group));
        group
    }

    fn constants_bind_group(&mut self) -> Result<Arc<wgpu::BindGroup>, BackendError> {
        let Some(id) = self.bindings.constant_buffer else {
            return Ok(Arc::clone(&self.default_constants_bind_group));
        };
        let buffer = self
            .buffers
            .get_mut(&id.0)
            .ok_or_else(|| BackendError::unknown("buffer", id.0))?;
        if let Some(group) = &buffer.uniform_bind_group {
            return Ok(Arc::clone(group));
        }
        let gpu = buffer
            .gpu
            .as_ref()
            .ok_or(BackendError::MissingBinding("uniform buffer storage"))?;
        let group = Arc::new(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("aero-gles-constants-bg"),
            layout: &self.constants_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: gpu.as_entire_binding(),
            }],
        }));
        buffer.uniform_bind_group = Some(Arc::clone(&group));
        Ok(group)
    }

    fn view_info(&self, id: ViewId) -> Result<&StoredView, BackendError> {
        self.views
            .get(&id.0)
            .ok_or_else(|| BackendError::unknown("view", id.0))
    }

    /// Size of the bound attachments; the first colour target wins.
    fn target_size(&self) -> Result<(u32, u32), BackendError> {
        let first = self
            .bindings
            .render_targets
            .first()
            .copied()
            .or(self.bindings.depth_stencil)
            .ok_or(BackendError::MissingBinding("render target"))?;
        let view = self.view_info(first)?;
        Ok((view.width, view.height))
    }

    fn pipeline(&mut self, key: PipelineKey) -> Result<Arc<wgpu::RenderPipeline>, BackendError> {
        if let Some(pipeline) = self.pipelines.get(&key).cloned() {
            return Ok(pipeline);
        }
        trace!(?key, "creating render pipeline");
        let pipeline = Arc::new(self.create_render_pipeline(&key)?);
        self.pipelines.put(key, Arc::clone(&pipeline));
        Ok(pipeline)
    }

    fn create_render_pipeline(&self, key: &PipelineKey) -> Result<wgpu::RenderPipeline, BackendError> {
        let vs = self
            .shaders
            .get(&key.vertex.0)
            .ok_or_else(|| BackendError::unknown("shader", key.vertex.0))?;
        let fs = self
            .shaders
            .get(&key.fragment.0)
            .ok_or_else(|| BackendError::unknown("shader", key.fragment.0))?;
        let layout = self
            .input_layouts
            .get(&key.layout.0)
            .ok_or_else(|| BackendError::unknown("input layout", key.layout.0))?;

        let vertex_buffers = [wgpu::VertexBufferLayout {
            array_stride: layout.stride as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &layout.attributes,
        }];
        let blend = map_blend(&key.blend);
        let targets: Vec<Option<wgpu::ColorTargetState>> = key
            .color_formats
            .iter()
            .map(|format| {
                Some(wgpu::ColorTargetState {
                    format: *format,
                    blend,
                    write_mask: wgpu::ColorWrites::from_bits_truncate(
                        key.blend.write_mask.bits() as u32,
                    ),
                })
            })
            .collect();

        let unclipped_depth = !key.rasterizer.depth_clip
            && self
                .device
                .features()
                .contains(wgpu::Features::DEPTH_CLIP_CONTROL);

        Ok(self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("aero-gles-pipeline"),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &vs.module,
                    entry_point: vs.entry_point,
                    buffers: &vertex_buffers,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &fs.module,
                    entry_point: fs.entry_point,
                    targets: &targets,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: map_topology(key.topology),
                    strip_index_format: None,
                    front_face: if key.rasterizer.front_ccw {
                        wgpu::FrontFace::Ccw
                    } else {
                        wgpu::FrontFace::Cw
                    },
                    cull_mode: match key.rasterizer.cull {
                        CullMode::None => None,
                        CullMode::Front => Some(wgpu::Face::Front),
                        CullMode::Back => Some(wgpu::Face::Back),
                    },
                    unclipped_depth,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    conservative: false,
                },
                depth_stencil: key
                    .depth_stencil
                    .map(|(desc, format)| map_depth_stencil(&desc, format)),
                multisample: wgpu::MultisampleState {
                    count: 1,
                    mask: key.sample_mask as u64,
                    alpha_to_coverage_enabled: false,
                },
                multiview: None,
            }))
    }
}

impl GpuBackend for WgpuBackend {
    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        data: Option<&[u8]>,
    ) -> Result<TextureId, BackendError> {
        let size = wgpu::Extent3d {
            width: desc.width.max(1),
            height: desc.height.max(1),
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("aero-gles-texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: map_texture_format(desc.format),
            usage: map_texture_usage(desc.usage),
            view_formats: &[],
        });

        if let Some(data) = data {
            if desc.format.is_depth() {
                return Err(BackendError::IncompatibleView(desc.format));
            }
            let expected = desc.width as usize * desc.height as usize * 4;
            if data.len() != expected {
                return Err(BackendError::TextureDataSize {
                    width: desc.width,
                    height: desc.height,
                    expected,
                    actual: data.len(),
                });
            }
            if expected > 0 {
                self.submit();
                self.queue.write_texture(
                    wgpu::ImageCopyTexture {
                        texture: &texture,
                        mip_level: 0,
                        origin: wgpu::Origin3d::ZERO,
                        aspect: wgpu::TextureAspect::All,
                    },
                    data,
                    wgpu::ImageDataLayout {
                        offset: 0,
                        bytes_per_row: Some(desc.width * 4),
                        rows_per_image: Some(desc.height),
                    },
                    size,
                );
            }
        }

        let id = TextureId(self.alloc_id());
        self.textures
            .insert(id.0, StoredTexture { texture, desc: *desc });
        Ok(id)
    }

    fn destroy_texture(&mut self, id: TextureId) {
        if let Some(stored) = self.textures.remove(&id.0) {
            stored.texture.destroy();
        }
    }

    fn create_view(&mut self, texture: TextureId, kind: ViewKind) -> Result<ViewId, BackendError> {
        let stored = self
            .textures
            .get(&texture.0)
            .ok_or_else(|| BackendError::unknown("texture", texture.0))?;
        let format = stored.desc.format;
        let compatible = match kind {
            ViewKind::ShaderResource => !format.is_depth(),
            ViewKind::RenderTarget => !format.is_depth(),
            ViewKind::DepthStencil => format.is_depth(),
        };
        if !compatible {
            return Err(BackendError::IncompatibleView(format));
        }
        let view = StoredView {
            view: stored
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default()),
            format: map_texture_format(format),
            width: stored.desc.width,
            height: stored.desc.height,
        };
        let id = ViewId(self.alloc_id());
        self.views.insert(id.0, view);
        Ok(id)
    }

    fn destroy_view(&mut self, id: ViewId) {
        if self.views.remove(&id.0).is_some() {
            self.texture_bind_group = None;
        }
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerId, BackendError> {
        let address_mode_u = self.map_address_mode(desc.address_u);
        let address_mode_v = self.map_address_mode(desc.address_v);
        let address_mode_w = self.map_address_mode(desc.address_w);
        let uses_border = [address_mode_u, address_mode_v, address_mode_w]
            .contains(&wgpu::AddressMode::ClampToBorder);
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("aero-gles-sampler"),
            address_mode_u,
            address_mode_v,
            address_mode_w,
            mag_filter: map_filter(desc.mag_filter),
            min_filter: map_filter(desc.min_filter),
            mipmap_filter: map_filter(desc.mip_filter),
            lod_max_clamp: desc.max_lod.min(32.0),
            border_color: uses_border.then_some(wgpu::SamplerBorderColor::TransparentBlack),
            ..Default::default()
        });
        let id = SamplerId(self.alloc_id());
        self.samplers.insert(id.0, sampler);
        Ok(id)
    }

    fn destroy_sampler(&mut self, id: SamplerId) {
        if self.samplers.remove(&id.0).is_some() {
            self.texture_bind_group = None;
        }
    }

    fn create_buffer(
        &mut self,
        desc: &BufferDesc,
        data: Option<&[u8]>,
    ) -> Result<BufferId, BackendError> {
        let align = wgpu::COPY_BUFFER_ALIGNMENT as usize;
        let padded = desc.size.div_ceil(align).max(1) * align;
        let mut shadow = vec![0u8; padded];
        if let Some(data) = data {
            shadow
                .get_mut(..data.len())
                .ok_or(BackendError::BufferWriteOutOfBounds {
                    buffer_size: desc.size,
                    write_end: data.len(),
                })?
                .copy_from_slice(data);
        }

        let usage = map_buffer_usage(desc.usage);
        let gpu = (!usage.is_empty()).then(|| {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("aero-gles-buffer"),
                size: padded as u64,
                usage: usage | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });

        let id = BufferId(self.alloc_id());
        self.buffers.insert(
            id.0,
            StoredBuffer {
                gpu,
                shadow,
                uniform_bind_group: None,
            },
        );
        if let Some(data) = data {
            self.upload_shadow(id, 0..data.len());
        }
        Ok(id)
    }

    fn destroy_buffer(&mut self, id: BufferId) {
        if let Some(stored) = self.buffers.remove(&id.0) {
            if let Some(gpu) = stored.gpu {
                gpu.destroy();
            }
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
        let buffer_size = buffer.shadow.len();
        let write_end = offset.saturating_add(data.len());
        buffer
            .shadow
            .get_mut(offset..write_end)
            .ok_or(BackendError::BufferWriteOutOfBounds {
                buffer_size,
                write_end,
            })?
            .copy_from_slice(data);
        self.upload_shadow(id, offset..write_end);
        Ok(())
    }

    fn buffer_contents(&self, id: BufferId) -> Result<&[u8], BackendError> {
        self.buffers
            .get(&id.0)
            .map(|b| b.shadow.as_slice())
            .ok_or_else(|| BackendError::unknown("buffer", id.0))
    }

    fn map_buffer(&mut self, id: BufferId, mode: MapMode) -> Result<&mut [u8], BackendError> {
        trace!(buffer = id.0, ?mode, "map");
        self.buffers
            .get_mut(&id.0)
            .map(|b| b.shadow.as_mut_slice())
            .ok_or_else(|| BackendError::unknown("buffer", id.0))
    }

    fn unmap_buffer(&mut self, id: BufferId, written: Range<usize>) {
        self.upload_shadow(id, written);
    }

    fn create_shader(
        &mut self,
        stage: ShaderStage,
        bytecode: &[u8],
    ) -> Result<ShaderId, BackendError> {
        let is_spirv = bytecode.len() >= 4
            && bytecode.len() % 4 == 0
            && u32::from_le_bytes([bytecode[0], bytecode[1], bytecode[2], bytecode[3]])
                == SPIRV_MAGIC;
        let entry_point = match (is_spirv, stage) {
            (true, _) => "main",
            (false, ShaderStage::Vertex) => "vs_main",
            (false, ShaderStage::Fragment) => "fs_main",
        };

        let hash = xxh3_64(bytecode);
        let module = match self.shader_modules.get(&hash) {
            Some(module) => Arc::clone(module),
            None => {
                let source = if is_spirv {
                    wgpu::util::make_spirv(bytecode)
                } else {
                    let text = std::str::from_utf8(bytecode)
                        .map_err(|e| BackendError::InvalidBytecode(e.to_string()))?;
                    if text.trim().is_empty() {
                        return Err(BackendError::InvalidBytecode("empty shader".into()));
                    }
                    wgpu::ShaderSource::Wgsl(text.into())
                };
                let module = Arc::new(self.device.create_shader_module(
                    wgpu::ShaderModuleDescriptor {
                        label: Some("aero-gles-shader"),
                        source,
                    },
                ));
                self.take_device_error()?;
                self.shader_modules.insert(hash, Arc::clone(&module));
                module
            }
        };

        let id = ShaderId(self.alloc_id());
        self.shaders.insert(
            id.0,
            StoredShader {
                module,
                entry_point,
            },
        );
        Ok(id)
    }

    fn destroy_shader(&mut self, id: ShaderId) {
        self.shaders.remove(&id.0);
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
        let attributes = elements
            .iter()
            .map(|e| wgpu::VertexAttribute {
                format: e.format.to_wgpu(),
                offset: e.offset as u64,
                shader_location: e.location,
            })
            .collect();
        let id = InputLayoutId(self.alloc_id());
        self.input_layouts
            .insert(id.0, StoredInputLayout { attributes, stride });
        Ok(id)
    }

    fn destroy_input_layout(&mut self, id: InputLayoutId) {
        self.input_layouts.remove(&id.0);
    }

    fn create_blend_state(&mut self, desc: &BlendDesc) -> Result<BlendStateId, BackendError> {
        let id = BlendStateId(self.alloc_id());
        self.blend_states.insert(id.0, *desc);
        Ok(id)
    }

    fn destroy_blend_state(&mut self, id: BlendStateId) {
        self.blend_states.remove(&id.0);
    }

    fn create_depth_stencil_state(
        &mut self,
        desc: &DepthStencilDesc,
    ) -> Result<DepthStencilStateId, BackendError> {
        let id = DepthStencilStateId(self.alloc_id());
        self.depth_stencil_states.insert(id.0, *desc);
        Ok(id)
    }

    fn destroy_depth_stencil_state(&mut self, id: DepthStencilStateId) {
        self.depth_stencil_states.remove(&id.0);
    }

    fn create_rasterizer_state(
        &mut self,
        desc: &RasterizerDesc,
    ) -> Result<RasterizerStateId, BackendError> {
        let id = RasterizerStateId(self.alloc_id());
        self.rasterizer_states.insert(id.0, *desc);
        Ok(id)
    }

    fn destroy_rasterizer_state(&mut self, id: RasterizerStateId) {
        self.rasterizer_states.remove(&id.0);
    }

    fn set_render_targets(&mut self, colors: &[ViewId], depth_stencil: Option<ViewId>) {
        self.bindings.render_targets = colors.to_vec();
        self.bindings.depth_stencil = depth_stencil;
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.bindings.viewport = Some(viewport);
    }

    fn set_scissor_rect(&mut self, rect: ScissorRect) {
        self.bindings.scissor = Some(rect);
    }

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) {
        self.bindings.topology = Some(topology);
    }

    fn set_input_layout(&mut self, layout: InputLayoutId) {
        self.bindings.input_layout = Some(layout);
    }

    fn set_vertex_buffer(&mut self, buffer: BufferId, _stride: u32, offset: usize) {
        // The stride is baked into the input layout.
        self.bindings.vertex_buffer = Some((buffer, offset));
    }

    fn set_shaders(&mut self, vertex: ShaderId, fragment: ShaderId) {
        self.bindings.shaders = Some((vertex, fragment));
    }

    fn set_constant_buffer(&mut self, buffer: Option<BufferId>) {
        self.bindings.constant_buffer = buffer;
    }

    fn set_blend_state(&mut self, state: BlendStateId, sample_mask: u32) {
        self.bindings.blend = Some((state, sample_mask));
    }

    fn set_depth_stencil_state(&mut self, state: DepthStencilStateId, stencil_ref: u32) {
        self.bindings.depth_stencil_state = Some((state, stencil_ref));
    }

    fn set_rasterizer_state(&mut self, state: RasterizerStateId) {
        self.bindings.rasterizer = Some(state);
    }

    fn set_texture(&mut self, slot: u32, binding: Option<TextureBinding>) {
        let Some(entry) = self.bindings.textures.get_mut(slot as usize) else {
            debug!(slot, "texture slot out of range");
            return;
        };
        if *entry != binding {
            *entry = binding;
            self.texture_bind_group = None;
        }
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<(), BackendError> {
        if vertex_count == 0 {
            return Ok(());
        }
        let (vertex, fragment) = self
            .bindings
            .shaders
            .ok_or(BackendError::MissingBinding("shaders"))?;
        let layout = self
            .bindings
            .input_layout
            .ok_or(BackendError::MissingBinding("input layout"))?;
        let (vertex_buffer, vertex_offset) = self
            .bindings
            .vertex_buffer
            .ok_or(BackendError::MissingBinding("vertex buffer"))?;
        let (target_width, target_height) = self.target_size()?;

        let blend = self
            .bindings
            .blend
            .and_then(|(id, _)| self.blend_states.get(&id.0).copied())
            .unwrap_or_default();
        let sample_mask = self.bindings.blend.map_or(u32::MAX, |(_, mask)| mask);
        let rasterizer = self
            .bindings
            .rasterizer
            .and_then(|id| self.rasterizer_states.get(&id.0).copied())
            .unwrap_or_default();
        let depth_stencil_desc = self
            .bindings
            .depth_stencil_state
            .and_then(|(id, _)| self.depth_stencil_states.get(&id.0).copied())
            .unwrap_or_default();
        let stencil_ref = self
            .bindings
            .depth_stencil_state
            .map_or(0, |(_, reference)| reference);

        let color_formats = self
            .bindings
            .render_targets
            .iter()
            .map(|id| self.view_info(*id).map(|v| v.format))
            .collect::<Result<Vec<_>, _>>()?;
        let depth_format = self
            .bindings
            .depth_stencil
            .map(|id| self.view_info(id).map(|v| v.format))
            .transpose()?;

        let key = PipelineKey {
            vertex,
            fragment,
            layout,
            topology: self
                .bindings
                .topology
                .unwrap_or(PrimitiveTopology::TriangleList),
            blend,
            rasterizer,
            depth_stencil: depth_format.map(|format| (depth_stencil_desc, format)),
            color_formats,
            sample_mask,
        };
        let pipeline = self.pipeline(key)?;
        let constants = self.constants_bind_group()?;
        let textures = self.ensure_texture_bind_group();

        let viewport = clamp_viewport(
            self.bindings.viewport.unwrap_or(Viewport {
                x: 0.0,
                y: 0.0,
                width: target_width as f32,
                height: target_height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            }),
            target_width,
            target_height,
        );
        let scissor = if rasterizer.scissor_enable {
            self.bindings
                .scissor
                .and_then(|rect| clamp_scissor(rect, target_width, target_height))
        } else {
            Some((0, 0, target_width, target_height))
        };
        let Some((sx, sy, sw, sh)) = scissor else {
            // Empty scissor; nothing can be drawn.
            return Ok(());
        };

        self.ensure_encoder();
        let Self {
            encoder,
            views,
            buffers,
            bindings,
            ..
        } = self;
        let Some(encoder) = encoder.as_mut() else {
            return Ok(());
        };

        let color_attachments = bindings
            .render_targets
            .iter()
            .filter_map(|id| views.get(&id.0))
            .map(|v| {
                Some(wgpu::RenderPassColorAttachment {
                    view: &v.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .collect::<Vec<_>>();
        let depth_stencil_attachment = bindings
            .depth_stencil
            .and_then(|id| views.get(&id.0))
            .map(|v| wgpu::RenderPassDepthStencilAttachment {
                view: &v.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
            });
        let vertex_buffer = buffers
            .get(&vertex_buffer.0)
            .and_then(|b| b.gpu.as_ref())
            .ok_or_else(|| BackendError::unknown("buffer", vertex_buffer.0))?;

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("aero-gles-draw"),
                color_attachments: &color_attachments,
                depth_stencil_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &constants, &[]);
            pass.set_bind_group(1, &textures, &[]);
            pass.set_stencil_reference(stencil_ref);
            pass.set_viewport(
                viewport.x,
                viewport.y,
                viewport.width,
                viewport.height,
                viewport.min_depth,
                viewport.max_depth,
            );
            pass.set_scissor_rect(sx, sy, sw, sh);
            pass.set_vertex_buffer(0, vertex_buffer.slice(vertex_offset as u64..));
            pass.draw(first_vertex..first_vertex + vertex_count, 0..1);
        }
        self.take_device_error()
    }

    fn clear_render_target(&mut self, view: ViewId, color: [f32; 4]) -> Result<(), BackendError> {
        self.ensure_encoder();
        let Self { encoder, views, .. } = self;
        let target = views
            .get(&view.0)
            .ok_or_else(|| BackendError::unknown("view", view.0))?;
        if let Some(encoder) = encoder.as_mut() {
            let [r, g, b, a] = color.map(f64::from);
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("aero-gles-clear-color"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        Ok(())
    }

    fn clear_depth_stencil(
        &mut self,
        view: ViewId,
        flags: ClearFlags,
        depth: f32,
        stencil: u8,
    ) -> Result<(), BackendError> {
        self.ensure_encoder();
        let Self { encoder, views, .. } = self;
        let target = views
            .get(&view.0)
            .ok_or_else(|| BackendError::unknown("view", view.0))?;
        if let Some(encoder) = encoder.as_mut() {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("aero-gles-clear-depth-stencil"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &target.view,
                    depth_ops: Some(wgpu::Operations {
                        load: if flags.contains(ClearFlags::DEPTH) {
                            wgpu::LoadOp::Clear(depth)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: if flags.contains(ClearFlags::STENCIL) {
                            wgpu::LoadOp::Clear(stencil as u32)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), BackendError> {
        self.submit();
        self.take_device_error()
    }

    fn finish(&mut self) -> Result<(), BackendError> {
        self.submit();
        #[cfg(not(target_arch = "wasm32"))]
        self.device.poll(wgpu::Maintain::Wait);
        self.take_device_error()
    }
}

fn map_texture_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Depth24PlusStencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
    }
}

fn map_texture_usage(usage: TextureUsage) -> wgpu::TextureUsages {
    let mut out = wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::COPY_SRC;
    if usage.contains(TextureUsage::SAMPLED) {
        out |= wgpu::TextureUsages::TEXTURE_BINDING;
    }
    if usage.intersects(TextureUsage::RENDER_TARGET | TextureUsage::DEPTH_STENCIL) {
        out |= wgpu::TextureUsages::RENDER_ATTACHMENT;
    }
    out
}

fn map_buffer_usage(usage: BufferUsage) -> wgpu::BufferUsages {
    let mut out = wgpu::BufferUsages::empty();
    if usage.contains(BufferUsage::VERTEX) {
        out |= wgpu::BufferUsages::VERTEX;
    }
    if usage.contains(BufferUsage::INDEX) {
        out |= wgpu::BufferUsages::INDEX;
    }
    if usage.contains(BufferUsage::UNIFORM) {
        out |= wgpu::BufferUsages::UNIFORM;
    }
    out
}

fn map_filter(mode: FilterMode) -> wgpu::FilterMode {
    match mode {
        FilterMode::Point => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

fn map_topology(topology: PrimitiveTopology) -> wgpu::PrimitiveTopology {
    match topology {
        PrimitiveTopology::PointList => wgpu::PrimitiveTopology::PointList,
        PrimitiveTopology::LineList => wgpu::PrimitiveTopology::LineList,
        PrimitiveTopology::LineStrip => wgpu::PrimitiveTopology::LineStrip,
        PrimitiveTopology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        PrimitiveTopology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
    }
}

fn map_compare(func: CompareFunc) -> wgpu::CompareFunction {
    match func {
        CompareFunc::Never => wgpu::CompareFunction::Never,
        CompareFunc::Less => wgpu::CompareFunction::Less,
        CompareFunc::Equal => wgpu::CompareFunction::Equal,
        CompareFunc::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareFunc::Greater => wgpu::CompareFunction::Greater,
        CompareFunc::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareFunc::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        CompareFunc::Always => wgpu::CompareFunction::Always,
    }
}

fn map_stencil_op(op: StencilOp) -> wgpu::StencilOperation {
    match op {
        StencilOp::Keep => wgpu::StencilOperation::Keep,
        StencilOp::Zero => wgpu::StencilOperation::Zero,
        StencilOp::Replace => wgpu::StencilOperation::Replace,
        StencilOp::IncrSat => wgpu::StencilOperation::IncrementClamp,
        StencilOp::DecrSat => wgpu::StencilOperation::DecrementClamp,
        StencilOp::Invert => wgpu::StencilOperation::Invert,
        StencilOp::Incr => wgpu::StencilOperation::IncrementWrap,
        StencilOp::Decr => wgpu::StencilOperation::DecrementWrap,
    }
}

fn map_blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColor => wgpu::BlendFactor::Src,
        BlendFactor::InvSrcColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::InvSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DestAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::InvDestAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
        BlendFactor::DestColor => wgpu::BlendFactor::Dst,
        BlendFactor::InvDestColor => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::SrcAlphaSat => wgpu::BlendFactor::SrcAlphaSaturated,
        BlendFactor::BlendFactor => wgpu::BlendFactor::Constant,
        BlendFactor::InvBlendFactor => wgpu::BlendFactor::OneMinusConstant,
    }
}

fn map_blend_component(src: BlendFactor, dst: BlendFactor, op: BlendOp) -> wgpu::BlendComponent {
    let operation = match op {
        BlendOp::Add => wgpu::BlendOperation::Add,
        BlendOp::Subtract => wgpu::BlendOperation::Subtract,
        BlendOp::RevSubtract => wgpu::BlendOperation::ReverseSubtract,
        BlendOp::Min => wgpu::BlendOperation::Min,
        BlendOp::Max => wgpu::BlendOperation::Max,
    };
    // wgpu requires both factors to be One for min/max.
    let (src_factor, dst_factor) = match op {
        BlendOp::Min | BlendOp::Max => (wgpu::BlendFactor::One, wgpu::BlendFactor::One),
        _ => (map_blend_factor(src), map_blend_factor(dst)),
    };
    wgpu::BlendComponent {
        src_factor,
        dst_factor,
        operation,
    }
}

fn map_blend(desc: &BlendDesc) -> Option<wgpu::BlendState> {
    desc.enable.then(|| wgpu::BlendState {
        color: map_blend_component(desc.src, desc.dst, desc.op),
        alpha: map_blend_component(desc.src_alpha, desc.dst_alpha, desc.op_alpha),
    })
}

fn map_depth_stencil(desc: &DepthStencilDesc, format: wgpu::TextureFormat) -> wgpu::DepthStencilState {
    let face = |f: &crate::state::StencilFaceDesc| wgpu::StencilFaceState {
        compare: map_compare(f.func),
        fail_op: map_stencil_op(f.fail),
        depth_fail_op: map_stencil_op(f.depth_fail),
        pass_op: map_stencil_op(f.pass),
    };
    let stencil = if desc.stencil_enable {
        wgpu::StencilState {
            front: face(&desc.front),
            back: face(&desc.back),
            read_mask: desc.stencil_read_mask as u32,
            write_mask: desc.stencil_write_mask as u32,
        }
    } else {
        wgpu::StencilState::default()
    };
    wgpu::DepthStencilState {
        format,
        depth_write_enabled: desc.depth_enable && desc.depth_write,
        depth_compare: if desc.depth_enable {
            map_compare(desc.depth_func)
        } else {
            wgpu::CompareFunction::Always
        },
        stencil,
        bias: wgpu::DepthBiasState::default(),
    }
}

fn clamp_viewport(mut viewport: Viewport, target_width: u32, target_height: u32) -> Viewport {
    let tw = target_width as f32;
    let th = target_height as f32;
    let full = |min_depth, max_depth| Viewport {
        x: 0.0,
        y: 0.0,
        width: tw,
        height: th,
        min_depth,
        max_depth,
    };

    viewport.min_depth = viewport.min_depth.clamp(0.0, 1.0);
    viewport.max_depth = viewport.max_depth.clamp(viewport.min_depth, 1.0);
    if viewport.width <= 0.0 || viewport.height <= 0.0 || tw == 0.0 || th == 0.0 {
        return full(viewport.min_depth, viewport.max_depth);
    }

    viewport.x = viewport.x.clamp(0.0, tw);
    viewport.y = viewport.y.clamp(0.0, th);
    viewport.width = viewport.width.clamp(0.0, tw - viewport.x);
    viewport.height = viewport.height.clamp(0.0, th - viewport.y);
    if viewport.width <= 0.0 || viewport.height <= 0.0 {
        full(viewport.min_depth, viewport.max_depth)
    } else {
        viewport
    }
}

/// Clamp to the target; `None` when nothing remains.
fn clamp_scissor(
    rect: ScissorRect,
    target_width: u32,
    target_height: u32,
) -> Option<(u32, u32, u32, u32)> {
    let left = rect.left.max(0) as u32;
    let top = rect.top.max(0) as u32;
    let right = (rect.right.max(0) as u32).min(target_width);
    let bottom = (rect.bottom.max(0) as u32).min(target_height);
    if left >= right || top >= bottom {
        return None;
    }
    Some((left, top, right - left, bottom - top))
}

fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}

async fn wait_for_queue(device: &wgpu::Device, queue: &wgpu::Queue) {
    let (sender, receiver) = oneshot_channel();
    queue.on_submitted_work_done(move || {
        let _ = sender.send(());
    });
    // Callbacks only fire while the device is polled.
    #[cfg(not(target_arch = "wasm32"))]
    device.poll(wgpu::Maintain::Wait);

    #[cfg(target_arch = "wasm32")]
    device.poll(wgpu::Maintain::Poll);
    let _ = receiver.receive().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scissor_is_clamped_to_the_target() {
        let rect = ScissorRect {
            left: -4,
            top: 2,
            right: 100,
            bottom: 10,
        };
        assert_eq!(clamp_scissor(rect, 64, 64), Some((0, 2, 64, 8)));
        let outside = ScissorRect {
            left: 70,
            top: 0,
            right: 80,
            bottom: 10,
        };
        assert_eq!(clamp_scissor(outside, 64, 64), None);
    }

    #[test]
    fn degenerate_viewports_cover_the_target() {
        let vp = clamp_viewport(
            Viewport {
                width: 0.0,
                ..Default::default()
            },
            32,
            16,
        );
        assert_eq!((vp.width, vp.height), (32.0, 16.0));
    }

    #[test]
    fn min_max_blending_forces_unit_factors() {
        let component = map_blend_component(BlendFactor::SrcAlpha, BlendFactor::Zero, BlendOp::Max);
        assert_eq!(component.src_factor, wgpu::BlendFactor::One);
        assert_eq!(component.dst_factor, wgpu::BlendFactor::One);
    }

    #[test]
    fn disabled_depth_test_still_writes_nothing() {
        let desc = DepthStencilDesc::default();
        let state = map_depth_stencil(&desc, wgpu::TextureFormat::Depth24PlusStencil8);
        assert!(!state.depth_write_enabled);
        assert_eq!(state.depth_compare, wgpu::CompareFunction::Always);
    }
}
