use std::fmt;

use crate::gl::*;

use super::desc::PrimitiveTopology;

/// GL ES primitive modes accepted by the draw entry points.
///
/// A "semantic" enum rather than the raw GL constants so the repacker does not depend on
/// enumerant values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveMode {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl PrimitiveMode {
    pub fn from_gl(mode: GLenum) -> Option<Self> {
        Some(match mode {
            GL_POINTS => Self::Points,
            GL_LINES => Self::Lines,
            GL_LINE_LOOP => Self::LineLoop,
            GL_LINE_STRIP => Self::LineStrip,
            GL_TRIANGLES => Self::Triangles,
            GL_TRIANGLE_STRIP => Self::TriangleStrip,
            GL_TRIANGLE_FAN => Self::TriangleFan,
            _ => return None,
        })
    }
}

impl fmt::Display for PrimitiveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PrimitiveMode::Points => "points",
            PrimitiveMode::Lines => "lines",
            PrimitiveMode::LineLoop => "line_loop",
            PrimitiveMode::LineStrip => "line_strip",
            PrimitiveMode::Triangles => "triangles",
            PrimitiveMode::TriangleStrip => "triangle_strip",
            PrimitiveMode::TriangleFan => "triangle_fan",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrimitiveTopologyTranslation {
    pub topology: PrimitiveTopology,
    /// The target has no fan topology; the repacker expands fans into lists.
    pub needs_triangle_fan_emulation: bool,
    /// The target has no loop topology; the repacker appends a closing vertex.
    pub needs_line_loop_emulation: bool,
}

pub fn translate_primitive_mode(mode: PrimitiveMode) -> PrimitiveTopologyTranslation {
    let (topology, fan, line_loop) = match mode {
        PrimitiveMode::Points => (PrimitiveTopology::PointList, false, false),
        PrimitiveMode::Lines => (PrimitiveTopology::LineList, false, false),
        PrimitiveMode::LineLoop => (PrimitiveTopology::LineStrip, false, true),
        PrimitiveMode::LineStrip => (PrimitiveTopology::LineStrip, false, false),
        PrimitiveMode::Triangles => (PrimitiveTopology::TriangleList, false, false),
        PrimitiveMode::TriangleStrip => (PrimitiveTopology::TriangleStrip, false, false),
        PrimitiveMode::TriangleFan => (PrimitiveTopology::TriangleList, true, false),
    };
    PrimitiveTopologyTranslation {
        topology,
        needs_triangle_fan_emulation: fan,
        needs_line_loop_emulation: line_loop,
    }
}

/// Expand a triangle fan into a triangle list: triangle(i) = (0, i, i+1).
pub fn expand_triangle_fan_u16(indices: &[u16]) -> Vec<u16> {
    if indices.len() < 3 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity((indices.len() - 2) * 3);
    for i in 1..(indices.len() - 1) {
        out.push(indices[0]);
        out.push(indices[i]);
        out.push(indices[i + 1]);
    }
    out
}

/// Number of list vertices produced by expanding a fan of `count` vertices.
pub fn triangle_fan_list_len(count: usize) -> usize {
    if count < 3 {
        0
    } else {
        (count - 3 + 1) * 3
    }
}
