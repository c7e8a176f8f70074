//! GL enumerant → target descriptor translation.
//!
//! Every function returns `None` for values outside the supported subset; callers keep their
//! previous state in that case, which matches how GL treats an `INVALID_ENUM` call.

use crate::gl::*;

use super::desc::{AddressMode, BlendFactor, BlendOp, CompareFunc, CullMode, FilterMode, StencilOp};

pub fn gl_blend_factor(value: GLenum) -> Option<BlendFactor> {
    Some(match value {
        GL_ZERO => BlendFactor::Zero,
        GL_ONE => BlendFactor::One,
        GL_SRC_COLOR => BlendFactor::SrcColor,
        GL_ONE_MINUS_SRC_COLOR => BlendFactor::InvSrcColor,
        GL_DST_COLOR => BlendFactor::DestColor,
        GL_ONE_MINUS_DST_COLOR => BlendFactor::InvDestColor,
        GL_SRC_ALPHA => BlendFactor::SrcAlpha,
        GL_ONE_MINUS_SRC_ALPHA => BlendFactor::InvSrcAlpha,
        GL_DST_ALPHA => BlendFactor::DestAlpha,
        GL_ONE_MINUS_DST_ALPHA => BlendFactor::InvDestAlpha,
        GL_SRC_ALPHA_SATURATE => BlendFactor::SrcAlphaSat,
        GL_CONSTANT_COLOR => BlendFactor::BlendFactor,
        GL_ONE_MINUS_CONSTANT_COLOR => BlendFactor::InvBlendFactor,
        _ => return None,
    })
}

pub fn gl_blend_equation(value: GLenum) -> Option<BlendOp> {
    Some(match value {
        GL_FUNC_ADD => BlendOp::Add,
        GL_FUNC_SUBTRACT => BlendOp::Subtract,
        GL_FUNC_REVERSE_SUBTRACT => BlendOp::RevSubtract,
        GL_MIN_EXT => BlendOp::Min,
        GL_MAX_EXT => BlendOp::Max,
        _ => return None,
    })
}

pub fn gl_compare_func(value: GLenum) -> Option<CompareFunc> {
    Some(match value {
        GL_NEVER => CompareFunc::Never,
        GL_LESS => CompareFunc::Less,
        GL_EQUAL => CompareFunc::Equal,
        GL_LEQUAL => CompareFunc::LessEqual,
        GL_GREATER => CompareFunc::Greater,
        GL_NOTEQUAL => CompareFunc::NotEqual,
        GL_GEQUAL => CompareFunc::GreaterEqual,
        GL_ALWAYS => CompareFunc::Always,
        _ => return None,
    })
}

pub fn gl_stencil_op(value: GLenum) -> Option<StencilOp> {
    Some(match value {
        GL_KEEP => StencilOp::Keep,
        GL_ZERO => StencilOp::Zero,
        GL_REPLACE => StencilOp::Replace,
        GL_INCR => StencilOp::IncrSat,
        GL_DECR => StencilOp::DecrSat,
        GL_INVERT => StencilOp::Invert,
        GL_INCR_WRAP => StencilOp::Incr,
        GL_DECR_WRAP => StencilOp::Decr,
        _ => return None,
    })
}

pub fn gl_cull_face(value: GLenum) -> Option<CullMode> {
    Some(match value {
        GL_FRONT => CullMode::Front,
        GL_BACK => CullMode::Back,
        // The target cannot cull both faces at once.
        GL_FRONT_AND_BACK => CullMode::Back,
        _ => return None,
    })
}

/// Filter triple `(min, mag, mip)` produced by a `GL_TEXTURE_MIN_FILTER` value.
///
/// Only the components a GL filter actually determines are returned; the caller keeps the rest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterTranslation {
    pub min: FilterMode,
    pub mip: Option<FilterMode>,
}

pub fn gl_min_filter(value: GLenum) -> Option<FilterTranslation> {
    use FilterMode::{Linear, Point};
    let (min, mip) = match value {
        GL_NEAREST => (Point, None),
        GL_LINEAR => (Linear, None),
        GL_NEAREST_MIPMAP_NEAREST => (Point, Some(Point)),
        GL_LINEAR_MIPMAP_NEAREST => (Linear, Some(Point)),
        GL_NEAREST_MIPMAP_LINEAR => (Point, Some(Linear)),
        GL_LINEAR_MIPMAP_LINEAR => (Linear, Some(Linear)),
        _ => return None,
    };
    Some(FilterTranslation { min, mip })
}

pub fn gl_mag_filter(value: GLenum) -> Option<FilterMode> {
    Some(match value {
        GL_NEAREST => FilterMode::Point,
        GL_LINEAR => FilterMode::Linear,
        _ => return None,
    })
}

pub fn gl_wrap_mode(value: GLenum) -> Option<AddressMode> {
    Some(match value {
        GL_CLAMP_TO_EDGE | GL_CLAMP => AddressMode::Clamp,
        GL_CLAMP_TO_BORDER => AddressMode::Border,
        GL_REPEAT => AddressMode::Wrap,
        GL_MIRRORED_REPEAT => AddressMode::Mirror,
        _ => return None,
    })
}
