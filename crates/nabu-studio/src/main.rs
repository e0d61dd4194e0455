//! Headless replay of the "red box" frame.
//!
//! Runs the engine on its own render thread against the in-memory backend and
//! reports what reached the backend.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};

use nabu_engine::backend::{AttribType, HeadlessBackend};
use nabu_engine::context::BLEND_MODE_DISABLE;
use nabu_engine::geometry::{
    IndexBufferHandle, IndexData, VertexArrayHandle, VertexAttributeDesc, VertexBufferHandle,
};
use nabu_engine::logging::{init_logging, LoggingConfig};
use nabu_engine::shader::{GlslCompiler, ProgramHandle, UniformRef};
use nabu_engine::texture::TextureHandle;
use nabu_engine::{frame, EngineInit, RenderContext};

const VERTEX_SHADER: &str = include_str!("../shaders/box.vert");
const FRAGMENT_SHADER: &str = include_str!("../shaders/box.frag");

const UNIFORMS: [&str; 7] = [
    "viewProjection",
    "world",
    "vEyePosition",
    "vDiffuseColor",
    "vEmissiveColor",
    "vDiffuseInfos",
    "diffuseSampler",
];

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct Position {
    xyz: [f32; 3],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct TexCoord {
    uv: [f32; 2],
}

/// Everything the first frame creates and the second frame tears down.
struct Scene {
    texture: TextureHandle,
    index_buffer: IndexBufferHandle,
    positions: VertexBufferHandle,
    tex_coords: VertexBufferHandle,
    vertex_array: VertexArrayHandle,
    program: ProgramHandle,
    uniforms: Vec<Option<UniformRef>>,
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let texture_png = red_texture_png().context("failed to encode the box texture")?;

    let (scheduler, render_thread) = frame::spawn_render_thread(|| {
        RenderContext::new(
            HeadlessBackend::new(),
            Box::new(GlslCompiler::new()),
            EngineInit::default(),
        )
    })
    .context("failed to start the render thread")?;

    let scene: Arc<Mutex<Option<Scene>>> = Arc::new(Mutex::new(None));

    let slot = Arc::clone(&scene);
    scheduler
        .request_frame(move |ctx, time| {
            log::info!(
                "frame {} ({:.1} ms): building the box",
                time.frame_index,
                time.timestamp_ms
            );
            match build_scene(ctx, &texture_png) {
                Ok(built) => {
                    draw_scene(ctx, &built);
                    if let Ok(mut slot) = slot.lock() {
                        *slot = Some(built);
                    }
                }
                Err(err) => log::error!("building the box failed: {err:#}"),
            }
        })
        .context("failed to schedule the first frame")?;

    let slot = Arc::clone(&scene);
    scheduler
        .request_frame(move |ctx, time| {
            let built = slot.lock().ok().and_then(|mut slot| slot.take());
            let Some(built) = built else {
                log::warn!("frame {}: no scene to draw", time.frame_index);
                return;
            };
            draw_scene(ctx, &built);
            release_scene(ctx, built);
        })
        .context("failed to schedule the second frame")?;

    drop(scheduler);
    let ctx = render_thread
        .join()
        .map_err(|_| anyhow::anyhow!("render thread panicked"))?;

    report(&ctx);
    anyhow::ensure!(
        ctx.backend().submitted_draws() == 2,
        "expected two submitted draws, got {}",
        ctx.backend().submitted_draws()
    );
    Ok(())
}

fn red_texture_png() -> Result<Vec<u8>> {
    let img = ImageBuffer::from_fn(16, 16, |x, y| {
        let shade = if (x / 4 + y / 4) % 2 == 0 { 255 } else { 200 };
        Rgba([shade, 0, 0, 255])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img).write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

fn build_scene(ctx: &mut RenderContext<HeadlessBackend>, texture_png: &[u8]) -> Result<Scene> {
    let texture = ctx.create_texture();
    ctx.load_texture(texture, texture_png, true)
        .context("failed to load the box texture")?;
    log::info!(
        "texture {}x{}",
        ctx.texture_width(texture),
        ctx.texture_height(texture)
    );

    let (positions, tex_coords, indices) = box_geometry();
    let index_buffer = ctx.create_index_buffer(&IndexData::U16(indices));

    let program = ctx
        .create_program(VERTEX_SHADER, FRAGMENT_SHADER)
        .context("failed to build the box program")?;
    let uniforms = ctx.get_uniforms(program, &UNIFORMS);
    let attributes = ctx.get_attributes(program, &["position", "uv", "normal"]);
    log::info!("attribute locations {attributes:?}");

    ctx.set_program(program);
    ctx.clear([0.2, 0.2, 0.3, 1.0], true, true, false);
    log::info!("render target {}x{}", ctx.render_width(), ctx.render_height());
    ctx.set_state(true, 0.0, false);
    ctx.set_blend_mode(BLEND_MODE_DISABLE)?;

    let vertex_array = ctx.create_vertex_array();
    ctx.record_index_buffer(vertex_array, index_buffer);
    let positions = ctx.create_vertex_buffer(
        bytemuck::cast_slice(&positions),
        size_of::<Position>() as u16,
        &[VertexAttributeDesc {
            location: 0,
            count: 3,
            kind: AttribType::Float,
            normalized: false,
            offset: 0,
        }],
    )?;
    let tex_coords = ctx.create_vertex_buffer(
        bytemuck::cast_slice(&tex_coords),
        size_of::<TexCoord>() as u16,
        &[VertexAttributeDesc {
            location: 10,
            count: 2,
            kind: AttribType::Float,
            normalized: false,
            offset: 0,
        }],
    )?;
    ctx.record_vertex_buffer(vertex_array, positions);
    ctx.record_vertex_buffer(vertex_array, tex_coords);

    Ok(Scene {
        texture,
        index_buffer,
        positions,
        tex_coords,
        vertex_array,
        program,
        uniforms,
    })
}

fn draw_scene(ctx: &mut RenderContext<HeadlessBackend>, scene: &Scene) {
    ctx.set_program(scene.program);
    ctx.bind_vertex_array(scene.vertex_array);

    let identity: [f32; 16] = core::array::from_fn(|i| if i % 5 == 0 { 1.0 } else { 0.0 });
    let mut view_projection = identity;
    view_projection[14] = -5.0;

    // indices follow UNIFORMS
    let uniform = |i: usize| scene.uniforms[i];
    if let Some(u) = uniform(0) {
        ctx.set_matrix(u, &view_projection);
    }
    if let Some(u) = uniform(1) {
        ctx.set_matrix(u, &identity);
    }
    if let Some(u) = uniform(2) {
        ctx.set_float4(u, 0.0, 0.0, -5.0, 1.0);
    }
    if let Some(u) = uniform(3) {
        ctx.set_float4(u, 1.0, 0.0, 0.0, 1.0);
    }
    if let Some(u) = uniform(4) {
        ctx.set_float3(u, 0.0, 0.0, 0.0);
    }
    if let Some(u) = uniform(5) {
        ctx.set_float4(u, 0.0, 1.0, 0.0, 0.0);
    }

    ctx.set_texture_wrap_mode(scene.texture, 1, 1, 1);
    ctx.set_texture_anisotropic_level(scene.texture, 4);
    if let Some(u) = uniform(6) {
        ctx.set_texture(u, scene.texture);
    }

    ctx.draw_indexed(0, 0, 36);
}

fn release_scene(ctx: &mut RenderContext<HeadlessBackend>, scene: Scene) {
    ctx.delete_vertex_array(scene.vertex_array);
    ctx.delete_vertex_buffer(scene.positions);
    ctx.delete_vertex_buffer(scene.tex_coords);
    ctx.delete_index_buffer(scene.index_buffer);
    ctx.delete_texture(scene.texture);
    ctx.delete_program(scene.program);
}

/// Unit cube with per-face texture coordinates.
fn box_geometry() -> (Vec<Position>, Vec<TexCoord>, Vec<u16>) {
    // (normal axis, sign) per face
    const FACES: [(usize, f32); 6] = [
        (0, 1.0),
        (0, -1.0),
        (1, 1.0),
        (1, -1.0),
        (2, 1.0),
        (2, -1.0),
    ];
    const CORNERS: [[f32; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];

    let mut positions = Vec::with_capacity(24);
    let mut tex_coords = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (axis, sign) in FACES {
        let base = positions.len() as u16;
        let (u_axis, v_axis) = ((axis + 1) % 3, (axis + 2) % 3);
        for [u, v] in CORNERS {
            let mut xyz = [0.0; 3];
            xyz[axis] = sign * 0.5;
            xyz[u_axis] = u * 0.5;
            xyz[v_axis] = v * 0.5;
            positions.push(Position { xyz });
            tex_coords.push(TexCoord {
                uv: [(u + 1.0) * 0.5, (v + 1.0) * 0.5],
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    (positions, tex_coords, indices)
}

fn report(ctx: &RenderContext<HeadlessBackend>) {
    let backend = ctx.backend();
    for (i, draw) in backend.presented_draws().iter().enumerate() {
        log::info!(
            "draw {i}: frame {}, view {}, state {:#018x}, {} stream(s), {} texture(s), \
             {} uniform(s)",
            draw.frame,
            draw.view,
            draw.state,
            draw.vertex_buffers.len(),
            draw.textures.len(),
            draw.uniforms.len()
        );
    }
    log::info!(
        "{} frame(s) presented with {} draw(s), {} backend object(s) still alive",
        backend.frame_count(),
        backend.submitted_draws(),
        backend.live_objects()
    );
}
