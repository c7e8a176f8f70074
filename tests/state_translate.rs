use pretty_assertions::assert_eq;

use aero_gles::backend::{Call, RecordingBackend};
use aero_gles::gl::*;
use aero_gles::state::translate::{
    gl_blend_equation, gl_blend_factor, gl_compare_func, gl_cull_face, gl_mag_filter,
    gl_min_filter, gl_stencil_op, gl_wrap_mode, FilterTranslation,
};
use aero_gles::state::{
    translate_primitive_mode, AddressMode, BlendFactor, BlendOp, ColorWriteMask, CompareFunc,
    CullMode, FilterMode, PrimitiveMode, PrimitiveTopology, StencilOp,
};
use aero_gles::{ContextConfig, GlContext};

#[test]
fn compare_func_maps_correctly() {
    assert_eq!(gl_compare_func(GL_LEQUAL), Some(CompareFunc::LessEqual));
    assert_eq!(gl_compare_func(GL_NOTEQUAL), Some(CompareFunc::NotEqual));
    assert_eq!(gl_compare_func(GL_ALWAYS), Some(CompareFunc::Always));
    assert_eq!(gl_compare_func(GL_BLEND), None);
}

#[test]
fn stencil_op_maps_correctly() {
    // GL's INCR/DECR saturate; the _WRAP variants wrap.
    assert_eq!(gl_stencil_op(GL_INCR), Some(StencilOp::IncrSat));
    assert_eq!(gl_stencil_op(GL_DECR_WRAP), Some(StencilOp::Decr));
    assert_eq!(gl_stencil_op(GL_INVERT), Some(StencilOp::Invert));
}

#[test]
fn blend_factor_maps_correctly() {
    assert_eq!(gl_blend_factor(GL_SRC_ALPHA), Some(BlendFactor::SrcAlpha));
    assert_eq!(gl_blend_factor(GL_ONE_MINUS_DST_COLOR), Some(BlendFactor::InvDestColor));
    assert_eq!(gl_blend_factor(GL_CONSTANT_COLOR), Some(BlendFactor::BlendFactor));
    assert_eq!(gl_blend_factor(0x1234), None);
}

#[test]
fn blend_equation_includes_min_max() {
    assert_eq!(gl_blend_equation(GL_FUNC_REVERSE_SUBTRACT), Some(BlendOp::RevSubtract));
    assert_eq!(gl_blend_equation(GL_MIN_EXT), Some(BlendOp::Min));
    assert_eq!(gl_blend_equation(GL_MAX_EXT), Some(BlendOp::Max));
}

#[test]
fn front_and_back_culling_degrades_to_back() {
    assert_eq!(gl_cull_face(GL_FRONT), Some(CullMode::Front));
    assert_eq!(gl_cull_face(GL_FRONT_AND_BACK), Some(CullMode::Back));
}

#[test]
fn filters_and_wrap_modes_map_correctly() {
    assert_eq!(
        gl_min_filter(GL_LINEAR_MIPMAP_NEAREST),
        Some(FilterTranslation {
            min: FilterMode::Linear,
            mip: Some(FilterMode::Point),
        })
    );
    assert_eq!(
        gl_min_filter(GL_NEAREST),
        Some(FilterTranslation {
            min: FilterMode::Point,
            mip: None,
        })
    );
    assert_eq!(gl_mag_filter(GL_LINEAR), Some(FilterMode::Linear));
    assert_eq!(gl_wrap_mode(GL_REPEAT), Some(AddressMode::Wrap));
    assert_eq!(gl_wrap_mode(GL_MIRRORED_REPEAT), Some(AddressMode::Mirror));
    assert_eq!(gl_wrap_mode(GL_CLAMP_TO_EDGE), Some(AddressMode::Clamp));
}

#[test]
fn emulated_primitive_modes_are_flagged() {
    let fan = translate_primitive_mode(PrimitiveMode::TriangleFan);
    assert_eq!(fan.topology, PrimitiveTopology::TriangleList);
    assert!(fan.needs_triangle_fan_emulation);

    let line_loop = translate_primitive_mode(PrimitiveMode::LineLoop);
    assert_eq!(line_loop.topology, PrimitiveTopology::LineStrip);
    assert!(line_loop.needs_line_loop_emulation);

    assert_eq!(PrimitiveMode::from_gl(GL_TRIANGLE_STRIP), Some(PrimitiveMode::TriangleStrip));
    assert_eq!(PrimitiveMode::from_gl(0x7), None);
}

#[test]
fn color_write_mask_from_booleans() {
    let mask = ColorWriteMask::from_rgba(true, false, true, false);
    assert!(mask.contains(ColorWriteMask::RED | ColorWriteMask::BLUE));
    assert!(!mask.intersects(ColorWriteMask::GREEN | ColorWriteMask::ALPHA));
}

fn context() -> GlContext<RecordingBackend> {
    GlContext::new(RecordingBackend::new(), ContextConfig::default()).unwrap()
}

#[test]
fn blend_func_leaves_alpha_factors_alone() {
    let mut gl = context();
    gl.blend_func_separate(GL_ONE, GL_ZERO, GL_DST_ALPHA, GL_ONE_MINUS_DST_ALPHA);
    gl.blend_func(GL_SRC_ALPHA, GL_ONE_MINUS_SRC_ALPHA);
    gl.enable(GL_BLEND);

    let mut enabled = [GL_FALSE];
    gl.get_booleanv(GL_BLEND, &mut enabled);
    assert_eq!(enabled, [GL_TRUE]);
    assert_eq!(gl.is_enabled(GL_BLEND), GL_TRUE);
    assert_eq!(gl.is_enabled(GL_DEPTH_TEST), GL_FALSE);
}

#[test]
fn unsupported_enums_keep_previous_state() {
    let mut gl = context();
    gl.depth_func(GL_GREATER);
    gl.depth_func(0xdead);
    gl.cull_face(0xbeef);
    gl.enable(0xcafe);
    assert_eq!(gl.is_enabled(0xcafe), GL_FALSE);
    // Only the staging ring was ever created.
    assert_eq!(gl.backend().calls().len(), 1);
}

#[test]
fn viewport_and_scissor_are_queryable() {
    let mut gl = context();
    gl.viewport(1, 2, 300, 200).unwrap();
    gl.scissor(4, 5, 6, 7).unwrap();

    let mut viewport = [0; 4];
    gl.get_integerv(GL_VIEWPORT, &mut viewport);
    assert_eq!(viewport, [1, 2, 300, 200]);
    let mut scissor = [0; 4];
    gl.get_integerv(GL_SCISSOR_BOX, &mut scissor);
    assert_eq!(scissor, [4, 5, 6, 7]);

    // Without a default framebuffer nothing reaches the backend.
    assert!(!gl
        .backend()
        .calls()
        .iter()
        .any(|call| matches!(call, Call::SetViewport(_) | Call::SetScissorRect(_))));
}

#[test]
fn clear_values_are_queryable() {
    let mut gl = context();
    gl.clear_color(0.25, 0.5, 0.75, 1.0);
    gl.clear_depthf(2.0);
    gl.clear_stencil(3);

    let mut color = [0.0; 4];
    gl.get_floatv(GL_COLOR_CLEAR_VALUE, &mut color);
    assert_eq!(color, [0.25, 0.5, 0.75, 1.0]);
    let mut depth = [0.0];
    gl.get_floatv(GL_DEPTH_CLEAR_VALUE, &mut depth);
    assert_eq!(depth, [1.0]);
    let mut stencil = [0.0];
    gl.get_floatv(GL_STENCIL_CLEAR_VALUE, &mut stencil);
    assert_eq!(stencil, [3.0]);
    assert_eq!(gl.get_error(), GL_NO_ERROR);
}
