//! Repacking of GL attribute arrays into one interleaved vertex stream.
//!
//! A GL draw is described as `count` logical vertices, each fetched from up to three attribute
//! arrays (client memory or a bound buffer) with their own type, size and stride. The target
//! instead wants one interleaved buffer with a fixed layout. Topologies the target lacks are
//! emulated while copying: fans become lists and loops get a closing vertex.
//!
//! Draws that do not fit in the staging ring are split into chunks along primitive boundaries
//! (see [`plan_chunks`]); every chunk is repacked and drawn separately.

use std::ops::Range;

use crate::gl::*;
use crate::state::topology::{triangle_fan_list_len, PrimitiveMode};

use super::layout::{InterleavedLayout, Semantic};

/// Component encodings accepted by `vertex_attrib_pointer`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    Fixed,
    Float,
}

impl ComponentType {
    pub fn from_gl(ty: GLenum) -> Option<Self> {
        Some(match ty {
            GL_BYTE => Self::Byte,
            GL_UNSIGNED_BYTE => Self::UnsignedByte,
            GL_SHORT => Self::Short,
            GL_UNSIGNED_SHORT => Self::UnsignedShort,
            GL_FIXED => Self::Fixed,
            GL_FLOAT => Self::Float,
            _ => return None,
        })
    }

    pub fn size(self) -> usize {
        match self {
            Self::Byte | Self::UnsignedByte => 1,
            Self::Short | Self::UnsignedShort => 2,
            Self::Fixed | Self::Float => 4,
        }
    }

    /// Decode one component. `bytes` is exactly `self.size()` long.
    fn read(self, bytes: &[u8], normalized: bool) -> f32 {
        match self {
            Self::Float => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            Self::Fixed => {
                i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32 / 65536.0
            }
            Self::Byte => {
                let v = bytes[0] as i8 as f32;
                if normalized {
                    (v / 127.0).max(-1.0)
                } else {
                    v
                }
            }
            Self::UnsignedByte => {
                let v = bytes[0] as f32;
                if normalized {
                    v / 255.0
                } else {
                    v
                }
            }
            Self::Short => {
                let v = i16::from_le_bytes([bytes[0], bytes[1]]) as f32;
                if normalized {
                    (v / 32767.0).max(-1.0)
                } else {
                    v
                }
            }
            Self::UnsignedShort => {
                let v = u16::from_le_bytes([bytes[0], bytes[1]]) as f32;
                if normalized {
                    v / 65535.0
                } else {
                    v
                }
            }
        }
    }
}

/// One attribute array, resolved to the bytes its pointer designates.
#[derive(Clone, Copy, Debug)]
pub struct AttribStream<'a> {
    pub semantic: Semantic,
    /// Bytes starting at the attribute's first element.
    pub data: &'a [u8],
    /// Components per vertex (1..=4).
    pub size: usize,
    pub ty: ComponentType,
    pub normalized: bool,
    /// Byte advance per vertex; `0` means tightly packed.
    pub stride: usize,
}

impl AttribStream<'_> {
    fn element_size(&self) -> usize {
        self.size * self.ty.size()
    }

    fn effective_stride(&self) -> usize {
        if self.stride == 0 {
            self.element_size()
        } else {
            self.stride
        }
    }

    /// Colours stored as unsigned bytes are always normalized.
    fn normalizes(&self) -> bool {
        self.normalized || (self.semantic == Semantic::Color && self.ty == ComponentType::UnsignedByte)
    }

    /// Decode vertex `index` into `out`, zero-padding missing components.
    ///
    /// Returns `false` if the vertex lies outside `data`.
    fn fetch(&self, index: usize, out: &mut [f32; 4]) -> bool {
        *out = [0.0; 4];
        let Some(start) = index.checked_mul(self.effective_stride()) else {
            return false;
        };
        let Some(bytes) = start
            .checked_add(self.element_size())
            .and_then(|end| self.data.get(start..end))
        else {
            return false;
        };
        let normalized = self.normalizes();
        for (slot, component) in out
            .iter_mut()
            .zip(bytes.chunks_exact(self.ty.size()))
            .take(self.semantic.components())
        {
            *slot = self.ty.read(component, normalized);
        }
        true
    }
}

/// Where logical vertex positions are fetched from.
#[derive(Clone, Copy, Debug)]
pub enum IndexSource<'a> {
    /// `draw_arrays`: logical vertex `i` is source vertex `first + i`.
    Sequential { first: usize },
    /// `draw_elements`: little-endian 16-bit indices.
    U16(&'a [u8]),
}

impl IndexSource<'_> {
    /// Source vertex for logical position `pos`. `None` for negative or missing indices.
    fn resolve(&self, pos: usize) -> Option<usize> {
        match *self {
            IndexSource::Sequential { first } => first.checked_add(pos),
            IndexSource::U16(bytes) => {
                let raw = bytes.get(pos * 2..pos * 2 + 2)?;
                let index = i16::from_le_bytes([raw[0], raw[1]]);
                usize::try_from(index).ok()
            }
        }
    }
}

/// Number of vertices the target draws for a GL draw of `count` logical vertices.
pub fn emitted_vertex_count(mode: PrimitiveMode, count: usize) -> usize {
    match mode {
        PrimitiveMode::TriangleFan => triangle_fan_list_len(count),
        PrimitiveMode::LineLoop if count > 0 => count + 1,
        _ => count,
    }
}

/// Map an emitted vertex position back to the logical draw position it copies.
fn logical_position(mode: PrimitiveMode, count: usize, emitted: usize) -> usize {
    match mode {
        PrimitiveMode::TriangleFan => {
            // Triangle t is (0, t+1, t+2).
            let (tri, corner) = (emitted / 3, emitted % 3);
            if corner == 0 {
                0
            } else {
                tri + corner
            }
        }
        PrimitiveMode::LineLoop if emitted == count => 0,
        _ => emitted,
    }
}

/// Split `total` emitted vertices into chunks of at most `max_vertices`.
///
/// List topologies are cut on primitive boundaries. Strips repeat the vertices shared with
/// the previous chunk (one for lines, two for triangles) and triangle strips advance by an even
/// count so winding is preserved. Returns no chunks when `max_vertices` cannot hold one
/// primitive.
pub fn plan_chunks(mode: PrimitiveMode, total: usize, max_vertices: usize) -> Vec<Range<usize>> {
    if total == 0 {
        return Vec::new();
    }
    if total <= max_vertices {
        return vec![0..total];
    }

    let (len, overlap) = match mode {
        PrimitiveMode::Points => (max_vertices, 0),
        PrimitiveMode::Lines => (max_vertices / 2 * 2, 0),
        PrimitiveMode::Triangles | PrimitiveMode::TriangleFan => (max_vertices / 3 * 3, 0),
        PrimitiveMode::LineStrip | PrimitiveMode::LineLoop => (max_vertices, 1),
        PrimitiveMode::TriangleStrip => (max_vertices / 2 * 2, 2),
    };
    let min_len = match mode {
        PrimitiveMode::Points => 1,
        PrimitiveMode::Lines | PrimitiveMode::LineStrip | PrimitiveMode::LineLoop => 2,
        _ => 3,
    };
    if len < min_len || len <= overlap {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + len).min(total);
        chunks.push(start..end);
        if end == total {
            break;
        }
        start = end - overlap;
    }
    chunks
}

/// Result of repacking one chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RepackOutcome {
    /// Vertices copied into the destination.
    pub written: usize,
    /// Chunk-relative position of the first vertex that could not be fetched.
    pub failed_at: Option<usize>,
}

impl RepackOutcome {
    /// Vertices to draw: everything on success, `failed_at - 1` after a failed fetch.
    pub fn draw_count(&self) -> usize {
        match self.failed_at {
            Some(fail) => fail.saturating_sub(1),
            None => self.written,
        }
    }
}

/// Inputs shared by every chunk of one draw.
#[derive(Clone, Copy, Debug)]
pub struct Repacker<'a> {
    pub mode: PrimitiveMode,
    /// Logical vertex count of the GL draw.
    pub count: usize,
    pub indices: IndexSource<'a>,
    pub layout: &'a InterleavedLayout,
    pub streams: &'a [AttribStream<'a>],
}

impl Repacker<'_> {
    pub fn emitted_vertex_count(&self) -> usize {
        emitted_vertex_count(self.mode, self.count)
    }

    /// Repack the emitted vertices in `range` into `dst`, which must hold
    /// `range.len() * stride` bytes.
    ///
    /// Copying stops at the first vertex whose index is negative or whose attribute data is out
    /// of range.
    pub fn repack(&self, range: Range<usize>, dst: &mut [u8]) -> RepackOutcome {
        let stride = self.layout.stride() as usize;
        let targets: Vec<(usize, &AttribStream<'_>)> = self
            .streams
            .iter()
            .filter_map(|stream| {
                self.layout
                    .element(stream.semantic)
                    .map(|e| (e.offset as usize, stream))
            })
            .collect();

        let len = range.len();
        let mut components = [0.0f32; 4];
        for (i, emitted) in range.enumerate() {
            let logical = logical_position(self.mode, self.count, emitted);
            let Some(source) = self.indices.resolve(logical) else {
                return RepackOutcome {
                    written: i,
                    failed_at: Some(i),
                };
            };
            let Some(vertex) = dst.get_mut(i * stride..(i + 1) * stride) else {
                return RepackOutcome {
                    written: i,
                    failed_at: Some(i),
                };
            };
            vertex.fill(0);
            for (offset, stream) in &targets {
                if !stream.fetch(source, &mut components) {
                    return RepackOutcome {
                        written: i,
                        failed_at: Some(i),
                    };
                }
                if stream.semantic == Semantic::TexCoord {
                    components[1] = 1.0 - components[1];
                }
                let n = stream.semantic.components();
                let bytes: &[u8] = bytemuck::cast_slice(&components[..n]);
                vertex[*offset..*offset + bytes.len()].copy_from_slice(bytes);
            }
        }
        RepackOutcome {
            written: len,
            failed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn f32_bytes(values: &[f32]) -> Vec<u8> {
        bytemuck::cast_slice(values).to_vec()
    }

    fn floats(bytes: &[u8]) -> Vec<f32> {
        bytemuck::pod_collect_to_vec(bytes)
    }

    fn position_stream(data: &[u8], size: usize) -> AttribStream<'_> {
        AttribStream {
            semantic: Semantic::Position,
            data,
            size,
            ty: ComponentType::Float,
            normalized: false,
            stride: 0,
        }
    }

    fn position_layout() -> InterleavedLayout {
        InterleavedLayout::from_slots([Some(Semantic::Position)])
    }

    #[test]
    fn fan_of_five_becomes_three_triangles() {
        // Vertex i has x = i.
        let data = f32_bytes(&[0., 0., 1., 0., 2., 0., 3., 0., 4., 0.]);
        let layout = position_layout();
        let streams = [position_stream(&data, 2)];
        let repacker = Repacker {
            mode: PrimitiveMode::TriangleFan,
            count: 5,
            indices: IndexSource::Sequential { first: 0 },
            layout: &layout,
            streams: &streams,
        };
        assert_eq!(repacker.emitted_vertex_count(), 9);

        let mut dst = vec![0u8; 9 * 12];
        let outcome = repacker.repack(0..9, &mut dst);
        assert_eq!(outcome.draw_count(), 9);
        let xs: Vec<f32> = floats(&dst).chunks(3).map(|v| v[0]).collect();
        assert_eq!(xs, vec![0., 1., 2., 0., 2., 3., 0., 3., 4.]);
    }

    #[test]
    fn positions_are_zero_padded_and_honour_stride() {
        // Interleaved source: x, y, junk.
        let data = f32_bytes(&[1., 2., 99., 3., 4., 99.]);
        let layout = position_layout();
        let mut stream = position_stream(&data, 2);
        stream.stride = 12;
        let streams = [stream];
        let repacker = Repacker {
            mode: PrimitiveMode::Points,
            count: 2,
            indices: IndexSource::Sequential { first: 0 },
            layout: &layout,
            streams: &streams,
        };
        let mut dst = vec![0xffu8; 24];
        repacker.repack(0..2, &mut dst);
        assert_eq!(floats(&dst), vec![1., 2., 0., 3., 4., 0.]);
    }

    #[test]
    fn packed_byte_colours_unpack_in_rgba_order() {
        let packed: u32 = 0x80402010; // AABBGGRR
        let data = packed.to_le_bytes();
        let layout = InterleavedLayout::from_slots([Some(Semantic::Color)]);
        let streams = [AttribStream {
            semantic: Semantic::Color,
            data: &data,
            size: 4,
            ty: ComponentType::UnsignedByte,
            normalized: false,
            stride: 0,
        }];
        let repacker = Repacker {
            mode: PrimitiveMode::Points,
            count: 1,
            indices: IndexSource::Sequential { first: 0 },
            layout: &layout,
            streams: &streams,
        };
        let mut dst = vec![0u8; 16];
        repacker.repack(0..1, &mut dst);
        assert_eq!(
            floats(&dst),
            vec![
                0x10 as f32 / 255.0,
                0x20 as f32 / 255.0,
                0x40 as f32 / 255.0,
                0x80 as f32 / 255.0
            ]
        );
    }

    #[test]
    fn texcoords_flip_v() {
        let data = f32_bytes(&[0.25, 0.75]);
        let layout = InterleavedLayout::from_slots([Some(Semantic::TexCoord)]);
        let streams = [AttribStream {
            semantic: Semantic::TexCoord,
            data: &data,
            size: 2,
            ty: ComponentType::Float,
            normalized: false,
            stride: 0,
        }];
        let repacker = Repacker {
            mode: PrimitiveMode::Points,
            count: 1,
            indices: IndexSource::Sequential { first: 0 },
            layout: &layout,
            streams: &streams,
        };
        let mut dst = vec![0u8; 8];
        repacker.repack(0..1, &mut dst);
        assert_eq!(floats(&dst), vec![0.25, 0.25]);
    }

    #[test]
    fn negative_index_truncates_the_draw() {
        let data = f32_bytes(&[0.; 3 * 4]);
        let indices: Vec<u8> = [0i16, 1, 2, -1, 3, 0]
            .iter()
            .flat_map(|i| i.to_le_bytes())
            .collect();
        let layout = position_layout();
        let streams = [position_stream(&data, 3)];
        let repacker = Repacker {
            mode: PrimitiveMode::Triangles,
            count: 6,
            indices: IndexSource::U16(&indices),
            layout: &layout,
            streams: &streams,
        };
        let mut dst = vec![0u8; 6 * 12];
        let outcome = repacker.repack(0..6, &mut dst);
        assert_eq!(outcome.failed_at, Some(3));
        assert_eq!(outcome.draw_count(), 2);
    }

    #[test]
    fn out_of_range_source_vertices_truncate_too() {
        let data = f32_bytes(&[0.; 3 * 2]);
        let layout = position_layout();
        let streams = [position_stream(&data, 3)];
        let repacker = Repacker {
            mode: PrimitiveMode::Triangles,
            count: 3,
            indices: IndexSource::Sequential { first: 0 },
            layout: &layout,
            streams: &streams,
        };
        let mut dst = vec![0u8; 3 * 12];
        assert_eq!(repacker.repack(0..3, &mut dst).failed_at, Some(2));
    }

    #[test]
    fn line_loop_closes_on_vertex_zero() {
        let data = f32_bytes(&[5., 0., 6., 0., 7., 0.]);
        let layout = position_layout();
        let streams = [position_stream(&data, 2)];
        let repacker = Repacker {
            mode: PrimitiveMode::LineLoop,
            count: 3,
            indices: IndexSource::Sequential { first: 0 },
            layout: &layout,
            streams: &streams,
        };
        assert_eq!(repacker.emitted_vertex_count(), 4);
        let mut dst = vec![0u8; 4 * 12];
        repacker.repack(0..4, &mut dst);
        let xs: Vec<f32> = floats(&dst).chunks(3).map(|v| v[0]).collect();
        assert_eq!(xs, vec![5., 6., 7., 5.]);
    }

    #[test]
    fn first_offsets_sequential_draws() {
        let data = f32_bytes(&[0., 0., 1., 0., 2., 0., 3., 0.]);
        let layout = position_layout();
        let streams = [position_stream(&data, 2)];
        let repacker = Repacker {
            mode: PrimitiveMode::Lines,
            count: 2,
            indices: IndexSource::Sequential { first: 2 },
            layout: &layout,
            streams: &streams,
        };
        let mut dst = vec![0u8; 2 * 12];
        repacker.repack(0..2, &mut dst);
        let xs: Vec<f32> = floats(&dst).chunks(3).map(|v| v[0]).collect();
        assert_eq!(xs, vec![2., 3.]);
    }

    #[test]
    fn chunks_respect_primitive_boundaries() {
        assert_eq!(plan_chunks(PrimitiveMode::Triangles, 9, 100), vec![0..9]);
        assert_eq!(
            plan_chunks(PrimitiveMode::Triangles, 10 * 3, 7),
            vec![0..6, 6..12, 12..18, 18..24, 24..30]
        );
        assert_eq!(
            plan_chunks(PrimitiveMode::LineStrip, 10, 4),
            vec![0..4, 3..7, 6..10]
        );
        assert_eq!(
            plan_chunks(PrimitiveMode::TriangleStrip, 10, 5),
            vec![0..4, 2..6, 4..8, 6..10]
        );
        assert!(plan_chunks(PrimitiveMode::Triangles, 9, 2).is_empty());
        assert!(plan_chunks(PrimitiveMode::Triangles, 0, 2).is_empty());
    }
}
