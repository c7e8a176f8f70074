use pretty_assertions::assert_eq;

use aero_gles::backend::{
    Call, ClearFlags, GpuBackend, RecordingBackend, TextureDesc, TextureFormat, TextureUsage,
    ViewId, ViewKind,
};
use aero_gles::gl::*;
use aero_gles::state::{ScissorRect, Viewport};
use aero_gles::{ContextConfig, GlContext};

fn host_target(backend: &mut RecordingBackend) -> ViewId {
    let texture = backend
        .create_texture(
            &TextureDesc {
                width: 32,
                height: 32,
                format: TextureFormat::Rgba8Unorm,
                usage: TextureUsage::RENDER_TARGET,
            },
            None,
        )
        .unwrap();
    backend.create_view(texture, ViewKind::RenderTarget).unwrap()
}

fn context() -> (GlContext<RecordingBackend>, ViewId) {
    let mut backend = RecordingBackend::new();
    let view = host_target(&mut backend);
    let mut gl = GlContext::new(backend, ContextConfig::default()).unwrap();
    gl.set_default_framebuffer(view, None);
    gl.backend_mut().take_calls();
    (gl, view)
}

fn color_texture(gl: &mut GlContext<RecordingBackend>) -> GLuint {
    let texture = gl.gen_textures(1)[0];
    gl.bind_texture(GL_TEXTURE_2D, texture);
    gl.tex_image_2d(GL_TEXTURE_2D, 0, GL_RGBA as GLint, 16, 16, 0, GL_RGBA, GL_UNSIGNED_BYTE, None)
        .unwrap();
    texture
}

fn render_target_binds(gl: &GlContext<RecordingBackend>) -> Vec<(Vec<ViewId>, Option<ViewId>)> {
    gl.backend()
        .calls()
        .iter()
        .filter_map(|call| match call {
            Call::SetRenderTargets {
                colors,
                depth_stencil,
            } => Some((colors.clone(), *depth_stencil)),
            _ => None,
        })
        .collect()
}

#[test]
fn default_framebuffer_is_always_complete() {
    let (gl, _) = context();
    assert_eq!(gl.check_framebuffer_status(GL_FRAMEBUFFER), GL_FRAMEBUFFER_COMPLETE);
}

#[test]
fn framebuffer_without_colour_is_undefined() {
    let (mut gl, _) = context();
    let fb = gl.gen_framebuffers(1)[0];
    gl.bind_framebuffer(GL_FRAMEBUFFER, fb);
    assert_eq!(gl.check_framebuffer_status(GL_FRAMEBUFFER), GL_FRAMEBUFFER_UNDEFINED_OES);

    let texture = color_texture(&mut gl);
    gl.framebuffer_texture_2d(GL_FRAMEBUFFER, GL_COLOR_ATTACHMENT0, GL_TEXTURE_2D, texture, 0);
    assert_eq!(gl.check_framebuffer_status(GL_FRAMEBUFFER), GL_FRAMEBUFFER_COMPLETE);

    let mut binding = [0];
    gl.get_integerv(GL_FRAMEBUFFER_BINDING, &mut binding);
    assert_eq!(binding, [fb as GLint]);
}

#[test]
fn clear_hits_every_colour_target_and_the_depth_buffer() {
    let (mut gl, _) = context();
    let fb = gl.gen_framebuffers(1)[0];
    gl.bind_framebuffer(GL_FRAMEBUFFER, fb);
    let first = color_texture(&mut gl);
    let second = color_texture(&mut gl);
    gl.framebuffer_texture_2d(GL_FRAMEBUFFER, GL_COLOR_ATTACHMENT0, GL_TEXTURE_2D, first, 0);
    gl.framebuffer_texture_2d(GL_FRAMEBUFFER, GL_COLOR_ATTACHMENT0 + 1, GL_TEXTURE_2D, second, 0);

    let rb = gl.gen_renderbuffers(1)[0];
    gl.bind_renderbuffer(GL_RENDERBUFFER, rb);
    gl.renderbuffer_storage(GL_RENDERBUFFER, GL_DEPTH24_STENCIL8_OES, 16, 16)
        .unwrap();
    gl.framebuffer_renderbuffer(GL_FRAMEBUFFER, GL_DEPTH_ATTACHMENT, GL_RENDERBUFFER, rb);
    gl.backend_mut().take_calls();

    gl.clear_color(0.0, 0.5, 1.0, 1.0);
    gl.clear_depthf(0.25);
    gl.clear_stencil(7);
    gl.clear(GL_COLOR_BUFFER_BIT | GL_DEPTH_BUFFER_BIT | GL_STENCIL_BUFFER_BIT)
        .unwrap();

    let binds = render_target_binds(&gl);
    assert_eq!(binds.len(), 1);
    let (colors, depth) = binds[0].clone();
    assert_eq!(colors.len(), 2);
    let depth = depth.unwrap();

    let clears: Vec<&Call> = gl
        .backend()
        .calls()
        .iter()
        .filter(|call| matches!(call, Call::ClearRenderTarget { .. } | Call::ClearDepthStencil { .. }))
        .collect();
    assert_eq!(
        clears,
        vec![
            &Call::ClearRenderTarget {
                view: colors[0],
                color: [0.0, 0.5, 1.0, 1.0],
            },
            &Call::ClearRenderTarget {
                view: colors[1],
                color: [0.0, 0.5, 1.0, 1.0],
            },
            &Call::ClearDepthStencil {
                view: depth,
                flags: ClearFlags::DEPTH | ClearFlags::STENCIL,
                depth: 0.25,
                stencil: 7,
            },
        ]
    );
}

#[test]
fn colour_attachments_stop_at_the_first_gap() {
    let (mut gl, _) = context();
    let fb = gl.gen_framebuffers(1)[0];
    gl.bind_framebuffer(GL_FRAMEBUFFER, fb);
    let first = color_texture(&mut gl);
    let third = color_texture(&mut gl);
    gl.framebuffer_texture_2d(GL_FRAMEBUFFER, GL_COLOR_ATTACHMENT0, GL_TEXTURE_2D, first, 0);
    gl.framebuffer_texture_2d(GL_FRAMEBUFFER, GL_COLOR_ATTACHMENT0 + 2, GL_TEXTURE_2D, third, 0);

    gl.clear(GL_COLOR_BUFFER_BIT).unwrap();

    let binds = render_target_binds(&gl);
    assert_eq!(binds[0].0.len(), 1);
}

#[test]
fn render_targets_are_rebound_only_on_change() {
    let (mut gl, host) = context();

    gl.clear(GL_COLOR_BUFFER_BIT).unwrap();
    gl.clear(GL_COLOR_BUFFER_BIT).unwrap();
    assert_eq!(render_target_binds(&gl), vec![(vec![host], None)]);

    let fb = gl.gen_framebuffers(1)[0];
    gl.bind_framebuffer(GL_FRAMEBUFFER, fb);
    let texture = color_texture(&mut gl);
    gl.framebuffer_texture_2d(GL_FRAMEBUFFER, GL_COLOR_ATTACHMENT0, GL_TEXTURE_2D, texture, 0);
    gl.clear(GL_COLOR_BUFFER_BIT).unwrap();
    gl.clear(GL_COLOR_BUFFER_BIT).unwrap();
    assert_eq!(render_target_binds(&gl).len(), 2);

    gl.bind_framebuffer(GL_FRAMEBUFFER, 0);
    gl.clear(GL_COLOR_BUFFER_BIT).unwrap();
    let binds = render_target_binds(&gl);
    assert_eq!(binds.len(), 3);
    assert_eq!(binds[2], (vec![host], None));
}

#[test]
fn resizing_the_default_framebuffer_rebinds() {
    let (mut gl, host) = context();
    gl.clear(GL_COLOR_BUFFER_BIT).unwrap();

    let resized = host_target(gl.backend_mut());
    gl.set_default_framebuffer(resized, None);
    gl.clear(GL_COLOR_BUFFER_BIT).unwrap();

    let binds = render_target_binds(&gl);
    assert_eq!(binds, vec![(vec![host], None), (vec![resized], None)]);
}

#[test]
fn incomplete_framebuffer_skips_clears() {
    let (mut gl, _) = context();
    let fb = gl.gen_framebuffers(1)[0];
    gl.bind_framebuffer(GL_FRAMEBUFFER, fb);

    gl.clear(GL_COLOR_BUFFER_BIT).unwrap();
    gl.viewport(0, 0, 8, 8).unwrap();

    assert!(gl.backend().calls().is_empty());
}

#[test]
fn deleting_an_attached_texture_makes_the_framebuffer_incomplete() {
    let (mut gl, _) = context();
    let fb = gl.gen_framebuffers(1)[0];
    gl.bind_framebuffer(GL_FRAMEBUFFER, fb);
    let texture = color_texture(&mut gl);
    gl.framebuffer_texture_2d(GL_FRAMEBUFFER, GL_COLOR_ATTACHMENT0, GL_TEXTURE_2D, texture, 0);
    gl.clear(GL_COLOR_BUFFER_BIT).unwrap();

    gl.delete_textures(&[texture]);
    gl.backend_mut().take_calls();
    gl.clear(GL_COLOR_BUFFER_BIT).unwrap();

    assert!(gl.backend().calls().is_empty());
}

#[test]
fn depth_texture_attachment_gets_a_depth_view() {
    let (mut gl, _) = context();
    let fb = gl.gen_framebuffers(1)[0];
    gl.bind_framebuffer(GL_FRAMEBUFFER, fb);
    let color = color_texture(&mut gl);
    let depth = gl.gen_textures(1)[0];
    gl.bind_texture(GL_TEXTURE_2D, depth);
    gl.tex_image_2d(GL_TEXTURE_2D, 0, GL_DEPTH_COMPONENT as GLint, 16, 16, 0, GL_DEPTH_COMPONENT, GL_UNSIGNED_INT, None)
        .unwrap();
    gl.framebuffer_texture_2d(GL_FRAMEBUFFER, GL_COLOR_ATTACHMENT0, GL_TEXTURE_2D, color, 0);
    gl.framebuffer_texture_2d(GL_FRAMEBUFFER, GL_DEPTH_ATTACHMENT, GL_TEXTURE_2D, depth, 0);
    gl.backend_mut().take_calls();

    gl.clear(GL_DEPTH_BUFFER_BIT).unwrap();

    let calls = gl.backend().calls();
    assert!(calls
        .iter()
        .any(|call| matches!(call, Call::CreateView { kind: ViewKind::DepthStencil, .. })));
    assert!(calls
        .iter()
        .any(|call| matches!(call, Call::ClearDepthStencil { flags: ClearFlags::DEPTH, .. })));
    assert!(!calls
        .iter()
        .any(|call| matches!(call, Call::ClearRenderTarget { .. })));
}

#[test]
fn viewport_and_scissor_forward_to_the_backend() {
    let (mut gl, _) = context();
    gl.viewport(0, 0, 32, 16).unwrap();
    gl.scissor(2, 4, 8, 8).unwrap();

    let calls = gl.backend().calls();
    assert!(calls.contains(&Call::SetViewport(Viewport {
        x: 0.0,
        y: 0.0,
        width: 32.0,
        height: 16.0,
        min_depth: 0.0,
        max_depth: 1.0,
    })));
    assert!(calls.contains(&Call::SetScissorRect(ScissorRect {
        left: 2,
        top: 4,
        right: 10,
        bottom: 12,
    })));
}

#[test]
fn read_pixels_leaves_the_buffer_untouched() {
    let (mut gl, _) = context();
    let mut pixels = [0xaa; 16];
    gl.read_pixels(0, 0, 2, 2, GL_RGBA, GL_UNSIGNED_BYTE, &mut pixels);
    assert_eq!(pixels, [0xaa; 16]);
}

#[test]
fn binding_an_unknown_framebuffer_replaces_the_binding() {
    let (mut gl, _) = context();
    let fb = gl.gen_framebuffers(1)[0];
    gl.bind_framebuffer(GL_FRAMEBUFFER, fb);
    let texture = color_texture(&mut gl);
    gl.framebuffer_texture_2d(GL_FRAMEBUFFER, GL_COLOR_ATTACHMENT0, GL_TEXTURE_2D, texture, 0);
    assert_eq!(gl.check_framebuffer_status(GL_FRAMEBUFFER), GL_FRAMEBUFFER_COMPLETE);

    gl.bind_framebuffer(GL_FRAMEBUFFER, 999);
    gl.backend_mut().take_calls();

    let mut binding = [0];
    gl.get_integerv(GL_FRAMEBUFFER_BINDING, &mut binding);
    assert_eq!(binding, [999]);
    assert_eq!(gl.check_framebuffer_status(GL_FRAMEBUFFER), GL_FRAMEBUFFER_UNDEFINED_OES);

    gl.clear(GL_COLOR_BUFFER_BIT).unwrap();
    assert!(gl.backend().calls().is_empty());
}

#[test]
fn binding_an_unknown_renderbuffer_replaces_the_binding() {
    let (mut gl, _) = context();
    let rb = gl.gen_renderbuffers(1)[0];
    gl.bind_renderbuffer(GL_RENDERBUFFER, rb);
    gl.bind_renderbuffer(GL_RENDERBUFFER, 999);
    gl.backend_mut().take_calls();

    gl.renderbuffer_storage(GL_RENDERBUFFER, GL_DEPTH24_STENCIL8_OES, 16, 16)
        .unwrap();

    let mut binding = [0];
    gl.get_integerv(GL_RENDERBUFFER_BINDING, &mut binding);
    assert_eq!(binding, [999]);
    assert!(!gl
        .backend()
        .calls()
        .iter()
        .any(|call| matches!(call, Call::CreateTexture { .. })));
}
