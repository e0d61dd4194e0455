use nabu_engine::backend::HeadlessBackend;
use nabu_engine::shader::{GlslCompiler, Stage, UniformKind};
use nabu_engine::{EngineError, EngineInit, RenderContext};

fn context() -> RenderContext<HeadlessBackend> {
    RenderContext::new(
        HeadlessBackend::new(),
        Box::new(GlslCompiler::new()),
        EngineInit::default(),
    )
}

const VERTEX: &str = r#"
#version 450

layout(std140, set = 0, binding = 0) uniform Transform {
    mat4 worldViewProj;
};

layout(location = 0) in vec3 position;
layout(location = 10) in vec2 uv;
layout(location = 0) out vec2 vUV;

void main() {
    vUV = uv;
    gl_Position = worldViewProj * vec4(position, 1.0);
}
"#;

const FRAGMENT: &str = r#"
#version 450

layout(set = 1, binding = 0) uniform texture2D diffuseTexture;
layout(set = 2, binding = 0) uniform sampler diffuseTex;

layout(location = 0) in vec2 vUV;
layout(location = 0) out vec4 fragColor;

void main() {
    fragColor = texture(sampler2D(diffuseTexture, diffuseTex), vUV);
}
"#;

fn with_block(members: &str, body: &str) -> String {
    format!(
        "#version 450
         layout(std140, set = 0, binding = 0) uniform Globals {{ {members} }};
         layout(location = 0) out vec4 color;
         void main() {{ {body} }}"
    )
}

#[test]
fn lookup_returns_typed_descriptors_and_none_for_unknown() {
    let mut ctx = context();
    let program = ctx.create_program(VERTEX, FRAGMENT).unwrap();

    let refs = ctx.get_uniforms(program, &["worldViewProj", "diffuseTex", "missing"]);
    assert_eq!(refs.len(), 3);

    let wvp = ctx.uniform_descriptor(refs[0].expect("worldViewProj is declared"));
    assert_eq!(wvp.stage, Stage::Vertex);
    assert_eq!(wvp.kind, UniformKind::Matrix4);
    assert_eq!(wvp.register_count, 4);

    let diffuse = ctx.uniform_descriptor(refs[1].expect("diffuseTex is declared"));
    assert_eq!(diffuse.stage, Stage::Fragment);
    assert_eq!(diffuse.kind, UniformKind::Sampler);

    assert!(refs[2].is_none());
    assert_eq!(ctx.get_attributes(program, &["position", "uv", "normal"]), vec![0, 10, -1]);
}

#[test]
fn name_in_both_stages_resolves_to_vertex() {
    let mut ctx = context();
    let vs = "#version 450
        layout(std140, set = 0, binding = 0) uniform Scene { vec4 vEyePosition; mat4 world; };
        void main() { gl_Position = world * vEyePosition; }";
    let fs = with_block(
        "vec4 vEyePosition; vec4 vDiffuseColor;",
        "color = vEyePosition * vDiffuseColor;",
    );
    let program = ctx.create_program(vs, &fs).unwrap();

    for _ in 0..3 {
        let uniform = ctx.get_uniforms(program, &["vEyePosition"])[0].unwrap();
        assert_eq!(uniform.stage, Stage::Vertex);
        assert_eq!(ctx.uniform_descriptor(uniform).stage, Stage::Vertex);
    }
}

#[test]
fn unsupported_shapes_fail_before_backend_objects_exist() {
    let fragment = with_block("vec4 tint;", "color = tint;");
    let cases = [
        "mat3 normalMatrix;",
        "mat4 bones[4];",
        "int lightCount;",
        "ivec2 tile;",
        "mat2x4 skew;",
    ];

    for member in cases {
        let vertex = format!(
            "#version 450
             layout(std140, set = 0, binding = 0) uniform Globals {{ {member} }};
             void main() {{ gl_Position = vec4(0.0); }}"
        );
        let mut ctx = context();
        let err = ctx.create_program(&vertex, &fragment).unwrap_err();
        assert!(
            matches!(err, EngineError::UnsupportedUniform { .. }),
            "{member}: {err}"
        );
        assert_eq!(ctx.backend().live_objects(), 0, "{member}");
        assert_eq!(ctx.backend().live_uniforms(), 0, "{member}");
    }
}

#[test]
fn compile_errors_abort_program_creation() {
    let broken_vertex = "#version 450
        layout(std140, set = 0, binding = 0) uniform Transform { mat4 world; };
        void main() { gl_Position = world * ; undefined_fn(); }";
    let broken_fragment = "#version 450
        layout(location = 0) out vec4 color;
        void main() { this is not glsl at all }";

    let cases = [
        (broken_vertex, FRAGMENT, "vertex shader"),
        (VERTEX, broken_fragment, "fragment shader"),
    ];
    for (vertex, fragment, stage) in cases {
        let mut ctx = context();
        match ctx.create_program(vertex, fragment) {
            Err(EngineError::Compile(msg)) => assert!(msg.starts_with(stage), "{msg}"),
            other => panic!("expected a compile error, got {other:?}"),
        }
        assert_eq!(ctx.backend().live_objects(), 0);
        assert_eq!(ctx.backend().live_uniforms(), 0);
    }
}

#[test]
fn matrix_offset_and_sampler_slot_are_cached() {
    let mut ctx = context();
    let program = ctx.create_program(VERTEX, FRAGMENT).unwrap();
    let refs = ctx.get_uniforms(program, &["worldViewProj", "diffuseTex"]);

    let wvp = ctx.uniform_descriptor(refs[0].unwrap());
    assert_eq!((wvp.offset, wvp.register_count), (0, 4));
    let diffuse = ctx.uniform_descriptor(refs[1].unwrap());
    assert_eq!(diffuse.slot, Some(0));
}
