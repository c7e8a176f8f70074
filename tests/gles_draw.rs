use pretty_assertions::assert_eq;

use aero_gles::backend::{
    Call, GpuBackend, MapMode, RecordingBackend, TextureDesc, TextureFormat,
    TextureUsage, ViewId, ViewKind,
};
use aero_gles::gl::*;
use aero_gles::state::PrimitiveTopology;
use aero_gles::{ContextConfig, GlContext, GlesError, Indices, VertexPointer};

const POSITION_STRIDE: usize = 12;

fn context(staging_capacity: usize) -> (GlContext<RecordingBackend>, ViewId) {
    let mut backend = RecordingBackend::new();
    let texture = backend
        .create_texture(
            &TextureDesc {
                width: 64,
                height: 64,
                format: TextureFormat::Rgba8Unorm,
                usage: TextureUsage::RENDER_TARGET,
            },
            None,
        )
        .unwrap();
    let view = backend.create_view(texture, ViewKind::RenderTarget).unwrap();
    let config = ContextConfig {
        staging_capacity,
        ..ContextConfig::default()
    };
    let mut gl = GlContext::new(backend, config).unwrap();
    gl.set_default_framebuffer(view, None);
    (gl, view)
}

/// Link and use a program whose slots are bound to `semantics` in order.
fn use_program(gl: &mut GlContext<RecordingBackend>, semantics: &[&str]) -> GLuint {
    let vs = gl.create_shader(GL_VERTEX_SHADER);
    gl.build_native_shader(vs, b"vertex bytecode");
    let fs = gl.create_shader(GL_FRAGMENT_SHADER);
    gl.build_native_shader(fs, b"fragment bytecode");

    let program = gl.create_program();
    gl.attach_shader(program, vs);
    gl.attach_shader(program, fs);
    for (slot, name) in semantics.iter().enumerate() {
        gl.bind_attrib_location(program, slot as GLuint, name);
    }
    gl.link_program(program).unwrap();
    gl.use_program(program);
    program
}

fn client_positions(gl: &mut GlContext<RecordingBackend>, positions: &[[f32; 2]]) {
    gl.vertex_attrib_pointer(
        0,
        2,
        GL_FLOAT,
        GL_FALSE,
        0,
        VertexPointer::Client(bytemuck::cast_slice(positions)),
    );
    gl.enable_vertex_attrib_array(0);
}

fn ring_maps(gl: &GlContext<RecordingBackend>) -> Vec<MapMode> {
    let ring = gl.staging().buffer();
    gl.backend()
        .calls()
        .iter()
        .filter_map(|call| match call {
            Call::MapBuffer { id, mode } if *id == ring => Some(*mode),
            _ => None,
        })
        .collect()
}

fn xyz(points: &[[f32; 2]], order: &[usize]) -> Vec<f32> {
    order
        .iter()
        .flat_map(|&i| [points[i][0], points[i][1], 0.0])
        .collect()
}

#[test]
fn triangle_fan_expands_to_a_triangle_list() {
    let (mut gl, view) = context(1024);
    use_program(&mut gl, &["a_position"]);
    let fan: [[f32; 2]; 5] = [[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
    client_positions(&mut gl, &fan);

    gl.draw_arrays(GL_TRIANGLE_FAN, 0, 5).unwrap();

    let draws = gl.backend_mut().take_draws();
    assert_eq!(draws.len(), 1);
    let draw = &draws[0];
    assert_eq!(draw.topology, Some(PrimitiveTopology::TriangleList));
    assert_eq!(draw.vertex_count, 9);
    assert_eq!(draw.stride, POSITION_STRIDE as u32);
    assert_eq!(draw.render_targets, vec![view]);
    assert_eq!(draw.vertex_floats(), xyz(&fan, &[0, 1, 2, 0, 2, 3, 0, 3, 4]));
}

#[test]
fn draw_arrays_honours_first() {
    let (mut gl, _) = context(1024);
    use_program(&mut gl, &["a_position"]);
    let points: [[f32; 2]; 4] = [[9.0, 9.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]];
    client_positions(&mut gl, &points);

    gl.draw_arrays(GL_TRIANGLES, 1, 3).unwrap();

    let draws = gl.backend().draws();
    assert_eq!(draws[0].vertex_floats(), xyz(&points, &[1, 2, 3]));
}

#[test]
fn line_loop_closes_back_to_the_first_vertex() {
    let (mut gl, _) = context(1024);
    use_program(&mut gl, &["a_position"]);
    let points: [[f32; 2]; 3] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]];
    client_positions(&mut gl, &points);

    gl.draw_arrays(GL_LINE_LOOP, 0, 3).unwrap();

    let draw = &gl.backend().draws()[0];
    assert_eq!(draw.topology, Some(PrimitiveTopology::LineStrip));
    assert_eq!(draw.vertex_floats(), xyz(&points, &[0, 1, 2, 0]));
}

#[test]
fn zero_count_draw_issues_no_native_calls() {
    let (mut gl, _) = context(1024);
    use_program(&mut gl, &["a_position"]);
    client_positions(&mut gl, &[[0.0, 0.0]; 3]);
    gl.backend_mut().take_calls();

    gl.draw_arrays(GL_TRIANGLES, 0, 0).unwrap();
    gl.draw_elements(GL_TRIANGLES, 0, GL_UNSIGNED_SHORT, Indices::Client(&[]))
        .unwrap();

    assert!(gl.backend().calls().is_empty());
    assert_eq!(gl.staging().cursor(), 0);
}

#[test]
fn draw_without_program_is_ignored() {
    let (mut gl, _) = context(1024);
    gl.backend_mut().take_calls();

    gl.draw_arrays(GL_TRIANGLES, 0, 3).unwrap();

    assert!(gl.backend().calls().is_empty());
}

#[test]
fn negative_index_truncates_the_draw() {
    let (mut gl, _) = context(1024);
    use_program(&mut gl, &["a_position"]);
    let points: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
    client_positions(&mut gl, &points);

    let indices: [i16; 6] = [0, 1, 2, -1, 2, 3];
    gl.draw_elements(
        GL_TRIANGLES,
        6,
        GL_UNSIGNED_SHORT,
        Indices::Client(bytemuck::cast_slice(&indices)),
    )
    .unwrap();

    let draws = gl.backend().draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].vertex_count, 2);
    assert_eq!(draws[0].vertex_floats(), xyz(&points, &[0, 1]));
}

#[test]
fn indices_can_come_from_the_element_buffer() {
    let (mut gl, _) = context(1024);
    use_program(&mut gl, &["a_position"]);
    let points: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];

    let buffers = gl.gen_buffers(2);
    gl.bind_buffer(GL_ARRAY_BUFFER, buffers[0]);
    let vertex_bytes: &[u8] = bytemuck::cast_slice(&points);
    gl.buffer_data(GL_ARRAY_BUFFER, vertex_bytes.len() as GLsizeiptr, Some(vertex_bytes), GL_STATIC_DRAW)
        .unwrap();
    gl.vertex_attrib_pointer(0, 2, GL_FLOAT, GL_FALSE, 8, VertexPointer::Offset(0));
    gl.enable_vertex_attrib_array(0);

    // Two leading padding indices exercise the byte offset.
    let indices: [u16; 8] = [7, 7, 3, 2, 1, 1, 2, 0];
    let index_bytes: &[u8] = bytemuck::cast_slice(&indices);
    gl.bind_buffer(GL_ELEMENT_ARRAY_BUFFER, buffers[1]);
    gl.buffer_data(GL_ELEMENT_ARRAY_BUFFER, index_bytes.len() as GLsizeiptr, Some(index_bytes), GL_STATIC_DRAW)
        .unwrap();

    gl.draw_elements(GL_TRIANGLES, 6, GL_UNSIGNED_SHORT, Indices::Offset(4))
        .unwrap();

    let draw = &gl.backend().draws()[0];
    assert_eq!(draw.vertex_count, 6);
    assert_eq!(draw.vertex_floats(), xyz(&points, &[3, 2, 1, 1, 2, 0]));
}

#[test]
fn unsigned_byte_colours_unpack_in_channel_order() {
    let (mut gl, _) = context(1024);
    use_program(&mut gl, &["a_position", "a_color"]);
    client_positions(&mut gl, &[[0.0, 0.0]; 3]);

    let packed: [u32; 3] = [0x8040_2010; 3];
    gl.vertex_attrib_pointer(
        1,
        4,
        GL_UNSIGNED_BYTE,
        GL_FALSE,
        0,
        VertexPointer::Client(bytemuck::cast_slice(&packed)),
    );
    gl.enable_vertex_attrib_array(1);

    gl.draw_arrays(GL_TRIANGLES, 0, 3).unwrap();

    let draw = &gl.backend().draws()[0];
    assert_eq!(draw.stride, 28);
    let floats = draw.vertex_floats();
    let expected = [0x10 as f32 / 255.0, 0x20 as f32 / 255.0, 0x40 as f32 / 255.0, 0x80 as f32 / 255.0];
    for vertex in floats.chunks_exact(7) {
        assert_eq!(&vertex[3..], &expected);
    }
}

#[test]
fn ring_wraps_with_a_discard_map() {
    // Room for eight position-only vertices.
    let (mut gl, _) = context(8 * POSITION_STRIDE);
    use_program(&mut gl, &["a_position"]);
    let first: [[f32; 2]; 3] = [[1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
    let second: [[f32; 2]; 3] = [[4.0, 4.0], [5.0, 5.0], [6.0, 6.0]];

    client_positions(&mut gl, &first);
    gl.draw_arrays(GL_TRIANGLES, 0, 3).unwrap();
    client_positions(&mut gl, &second);
    gl.draw_arrays(GL_TRIANGLES, 0, 3).unwrap();

    let ring = gl.staging().buffer();
    let first_bytes = gl.backend().draws()[0].vertices.clone();
    assert_eq!(
        &gl.backend().buffer_data(ring).unwrap()[..3 * POSITION_STRIDE],
        first_bytes.as_slice()
    );

    let big = [[7.0f32, 7.0]; 6];
    client_positions(&mut gl, &big);
    gl.draw_arrays(GL_TRIANGLES, 0, 6).unwrap();

    assert_eq!(
        ring_maps(&gl),
        vec![MapMode::WriteDiscard, MapMode::WriteNoOverwrite, MapMode::WriteDiscard]
    );
    let offsets: Vec<usize> = gl.backend().draws().iter().map(|d| d.offset).collect();
    assert_eq!(offsets, vec![0, 3 * POSITION_STRIDE, 0]);
    assert_eq!(gl.staging().cursor(), 6 * POSITION_STRIDE);
}

#[test]
fn oversized_draws_are_split_on_primitive_boundaries() {
    // Four vertices fit; triangle lists are cut into chunks of three.
    let (mut gl, _) = context(4 * POSITION_STRIDE);
    use_program(&mut gl, &["a_position"]);
    let points: Vec<[f32; 2]> = (0..9).map(|i| [i as f32, 0.0]).collect();
    client_positions(&mut gl, &points);

    gl.draw_arrays(GL_TRIANGLES, 0, 9).unwrap();

    let draws = gl.backend().draws();
    assert_eq!(draws.iter().map(|d| d.vertex_count).collect::<Vec<_>>(), vec![3, 3, 3]);
    let floats: Vec<f32> = draws.iter().flat_map(|d| d.vertex_floats()).collect();
    assert_eq!(floats, xyz(&points, &[0, 1, 2, 3, 4, 5, 6, 7, 8]));
}

#[test]
fn negative_index_truncates_only_its_sub_draw() {
    // Three vertices fit, so the six indices are drawn as two sub-draws.
    let (mut gl, _) = context(3 * POSITION_STRIDE);
    use_program(&mut gl, &["a_position"]);
    let points: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
    client_positions(&mut gl, &points);

    let indices: [i16; 6] = [0, 1, -1, 1, 2, 3];
    gl.draw_elements(
        GL_TRIANGLES,
        6,
        GL_UNSIGNED_SHORT,
        Indices::Client(bytemuck::cast_slice(&indices)),
    )
    .unwrap();

    let draws = gl.backend().draws();
    assert_eq!(draws.iter().map(|d| d.vertex_count).collect::<Vec<_>>(), vec![1, 3]);
    assert_eq!(draws[0].vertex_floats(), xyz(&points, &[0]));
    assert_eq!(draws[1].vertex_floats(), xyz(&points, &[1, 2, 3]));
}

#[test]
fn chunked_fan_repeats_the_pivot_in_every_chunk() {
    // One triangle per chunk.
    let (mut gl, _) = context(3 * POSITION_STRIDE);
    use_program(&mut gl, &["a_position"]);
    let fan: Vec<[f32; 2]> = (0..7).map(|i| [i as f32, 1.0]).collect();
    client_positions(&mut gl, &fan);

    gl.draw_arrays(GL_TRIANGLE_FAN, 0, 7).unwrap();

    let draws = gl.backend().draws();
    assert_eq!(draws.len(), 5);
    for (i, draw) in draws.iter().enumerate() {
        assert_eq!(draw.topology, Some(PrimitiveTopology::TriangleList));
        assert_eq!(draw.vertex_floats(), xyz(&fan, &[0, i + 1, i + 2]));
    }
}

#[test]
fn chunked_line_loop_closes_only_in_the_last_chunk() {
    let (mut gl, _) = context(3 * POSITION_STRIDE);
    use_program(&mut gl, &["a_position"]);
    let points: Vec<[f32; 2]> = (0..5).map(|i| [i as f32, 2.0]).collect();
    client_positions(&mut gl, &points);

    gl.draw_arrays(GL_LINE_LOOP, 0, 5).unwrap();

    let draws = gl.backend().draws();
    assert!(draws
        .iter()
        .all(|d| d.topology == Some(PrimitiveTopology::LineStrip)));
    let chunks: Vec<Vec<f32>> = draws.iter().map(|d| d.vertex_floats()).collect();
    // Strips share one vertex with the previous chunk.
    assert_eq!(
        chunks,
        vec![
            xyz(&points, &[0, 1, 2]),
            xyz(&points, &[2, 3, 4]),
            xyz(&points, &[4, 0]),
        ]
    );
}

#[test]
fn staging_smaller_than_a_vertex_is_an_error() {
    let (mut gl, _) = context(8);
    use_program(&mut gl, &["a_position"]);
    client_positions(&mut gl, &[[0.0, 0.0]; 3]);

    let err = gl.draw_arrays(GL_TRIANGLES, 0, 3).unwrap_err();
    assert!(matches!(err, GlesError::StagingTooSmall { capacity: 8, stride: 12 }));
}

#[test]
fn uniforms_are_packed_into_the_constant_buffer() {
    let (mut gl, _) = context(1024);
    let program = use_program(&mut gl, &["a_position"]);
    client_positions(&mut gl, &[[0.0, 0.0]; 3]);
    gl.register_uniform_location(program, "u_tint", 0);
    gl.register_uniform_location(program, "u_scale", 1);
    gl.uniform4f(0, 1.0, 0.5, 0.25, 1.0);
    gl.uniform1f(1, 2.0);

    gl.draw_arrays(GL_TRIANGLES, 0, 3).unwrap();

    let draw = &gl.backend().draws()[0];
    let constants: Vec<f32> = bytemuck::pod_collect_to_vec(&draw.constants);
    // Padded to a whole 16-byte register.
    assert_eq!(constants, vec![1.0, 0.5, 0.25, 1.0, 2.0, 0.0, 0.0, 0.0]);
}

#[test]
fn sampler_uniforms_bind_textures_in_location_order() {
    let (mut gl, _) = context(1024);
    let program = use_program(&mut gl, &["a_position"]);
    client_positions(&mut gl, &[[0.0, 0.0]; 3]);

    let textures = gl.gen_textures(3);
    for (unit, &texture) in textures[..2].iter().enumerate() {
        gl.active_texture(GL_TEXTURE0 + unit as GLenum);
        gl.bind_texture(GL_TEXTURE_2D, texture);
        gl.tex_image_2d(GL_TEXTURE_2D, 0, GL_RGBA as GLint, 1, 1, 0, GL_RGBA, GL_UNSIGNED_BYTE, Some(&[0, 0, 0, 255]))
            .unwrap();
    }
    // Unit 2 holds a texture without storage; unit 7 holds nothing.
    gl.active_texture(GL_TEXTURE0 + 2);
    gl.bind_texture(GL_TEXTURE_2D, textures[2]);

    gl.register_uniform_sampler_location(program, "u_second", 5);
    gl.register_uniform_sampler_location(program, "u_empty", 3);
    gl.register_uniform_sampler_location(program, "u_unbound", 4);
    gl.register_uniform_sampler_location(program, "u_first", 2);
    gl.uniform1i(2, 1);
    gl.uniform1i(3, 2);
    gl.uniform1i(4, 7);
    gl.uniform1i(5, 0);

    gl.draw_arrays(GL_TRIANGLES, 0, 3).unwrap();

    let backend = gl.backend();
    let shader_views: Vec<ViewId> = backend
        .calls()
        .iter()
        .filter_map(|call| match call {
            Call::CreateView { id, kind: ViewKind::ShaderResource, .. } => Some(*id),
            _ => None,
        })
        .collect();
    let draw = &backend.draws()[0];
    let bound: Vec<(u32, ViewId)> = draw
        .textures
        .iter()
        .map(|(slot, binding)| (*slot, binding.view))
        .collect();
    // `u_first` (location 2) reads unit 1. `u_empty` (location 3) names a texture without
    // storage and keeps slot 1 empty. `u_unbound` (location 4) names no texture and takes no
    // slot. `u_second` (location 5) reads unit 0.
    assert_eq!(bound, vec![(0, shader_views[1]), (2, shader_views[0])]);

    // Every consumed slot is released after the draw.
    let unbinds = backend
        .calls()
        .iter()
        .filter(|call| matches!(call, Call::SetTexture { binding: None, .. }))
        .count();
    assert_eq!(unbinds, 3);
}

#[test]
fn state_objects_are_rebuilt_only_after_a_change() {
    let (mut gl, _) = context(1024);
    use_program(&mut gl, &["a_position"]);
    client_positions(&mut gl, &[[0.0, 0.0]; 3]);

    gl.draw_arrays(GL_TRIANGLES, 0, 3).unwrap();
    gl.backend_mut().take_calls();
    gl.draw_arrays(GL_TRIANGLES, 0, 3).unwrap();
    assert!(!gl.backend().calls().iter().any(Call::is_creation));

    gl.enable(GL_BLEND);
    gl.backend_mut().take_calls();
    gl.draw_arrays(GL_TRIANGLES, 0, 3).unwrap();
    let calls = gl.backend().calls();
    assert!(calls.iter().any(|c| matches!(c, Call::DestroyBlendState(_))));
    assert!(calls.iter().any(|c| matches!(c, Call::CreateBlendState { desc, .. } if desc.enable)));
    assert_eq!(calls.iter().filter(|c| c.is_creation()).count(), 1);
}

#[test]
fn stencil_func_reaches_the_draw() {
    let (mut gl, _) = context(1024);
    use_program(&mut gl, &["a_position"]);
    client_positions(&mut gl, &[[0.0, 0.0]; 3]);
    gl.enable(GL_STENCIL_TEST);
    gl.stencil_func(GL_EQUAL, 300, 0x0f);

    gl.draw_arrays(GL_TRIANGLES, 0, 3).unwrap();

    let draw = &gl.backend().draws()[0];
    assert_eq!(draw.stencil_ref, 255);
    let ds = draw.depth_stencil_state.unwrap();
    assert!(ds.stencil_enable);
    assert_eq!(ds.stencil_read_mask, 0x0f);
    assert_eq!(ds.stencil_write_mask, 0x0f);
}

#[test]
fn backend_failure_aborts_the_draw() {
    let (mut gl, _) = context(1024);
    use_program(&mut gl, &["a_position"]);
    client_positions(&mut gl, &[[0.0, 0.0]; 3]);
    gl.backend_mut().fail_next_creation();

    assert!(gl.draw_arrays(GL_TRIANGLES, 0, 3).is_err());
    assert!(gl.backend().draws().is_empty());

    // The failed object is rebuilt on the next draw.
    gl.draw_arrays(GL_TRIANGLES, 0, 3).unwrap();
    assert_eq!(gl.backend().draws().len(), 1);
}

#[test]
fn into_backend_releases_everything() {
    let (mut gl, view) = context(1024);
    use_program(&mut gl, &["a_position"]);
    client_positions(&mut gl, &[[0.0, 0.0]; 3]);
    gl.draw_arrays(GL_TRIANGLES, 0, 3).unwrap();

    let backend = gl.into_backend();
    // Only the host's default target (texture + view) survives.
    assert_eq!(backend.live_objects(), 2);
    assert!(backend.view_texture(view).is_some());
}
