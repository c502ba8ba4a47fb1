use std::{env, fs, path::PathBuf};

fn main() {
    let out = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Matches lumen_render::Vertex (stride 32):
    //   - location 0: R32G32B32_SFLOAT  (pos)
    //   - location 1: R32G32B32_UINT    (normal, tangent, bitangent; 10-10-10-2 snorm each)
    //   - location 2: R32G32_SFLOAT     (uv)
    let vs_src = r#"
#version 450
layout(location = 0) in vec3 inPos;
layout(location = 1) in uvec3 inBasis;
layout(location = 2) in vec2 inUv;

layout(set = 0, binding = 0) uniform Draw { mat4 mvp; } u;

layout(location = 0) out vec3 vNormal;
layout(location = 1) out vec2 vUv;

// r<<22 | g<<12 | b<<2 | a, each component two's complement
vec3 unpackSnorm3(uint p) {
    ivec3 v = ivec3(int(p) >> 22, int(p << 10) >> 22, int(p << 20) >> 22);
    return clamp(vec3(v) / 511.0, -1.0, 1.0);
}

void main() {
    vNormal = unpackSnorm3(inBasis.x);
    vUv = inUv;
    gl_Position = u.mvp * vec4(inPos, 1.0);
}
"#;

    let fs_src = r#"
#version 450
layout(location = 0) in vec3 vNormal;
layout(location = 1) in vec2 vUv;

layout(set = 1, binding = 1) uniform sampler2D baseColor;

layout(location = 0) out vec4 outColor;

void main() {
    float len = length(vNormal);
    float shade = len > 0.0 ? 0.65 + 0.35 * abs(vNormal.z / len) : 1.0;
    outColor = vec4(texture(baseColor, vUv).rgb * shade, 1.0);
}
"#;

    let comp = shaderc::Compiler::new().unwrap();
    let mut opts = shaderc::CompileOptions::new().unwrap();

    // Instance targets 1.1 (negative viewport height)
    opts.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_1 as u32,
    );
    opts.set_optimization_level(shaderc::OptimizationLevel::Performance);

    let vs_spv = comp
        .compile_into_spirv(
            vs_src,
            shaderc::ShaderKind::Vertex,
            "simple.vert",
            "main",
            Some(&opts),
        )
        .unwrap();

    let fs_spv = comp
        .compile_into_spirv(
            fs_src,
            shaderc::ShaderKind::Fragment,
            "simple.frag",
            "main",
            Some(&opts),
        )
        .unwrap();

    fs::write(out.join("simple.vert.spv"), vs_spv.as_binary_u8()).unwrap();
    fs::write(out.join("simple.frag.spv"), fs_spv.as_binary_u8()).unwrap();

    println!("cargo:rerun-if-changed=build.rs");
}
