const SHADERS: &[&str] = &["simple.vert", "simple.frag"];

fn main() {
    for name in SHADERS {
        println!("cargo:rerun-if-changed=shaders/{name}");
    }
    println!("cargo:rerun-if-changed=build.rs");

    #[cfg(feature = "builtin-shaders")]
    compile_all();
}

#[cfg(feature = "builtin-shaders")]
fn compile_all() {
    use std::{env, fs, path::PathBuf};

    let out = PathBuf::from(env::var("OUT_DIR").unwrap());
    let src_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap()).join("shaders");

    let comp = shaderc::Compiler::new().unwrap();
    let mut opts = shaderc::CompileOptions::new().unwrap();
    opts.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_0 as u32,
    );
    opts.set_optimization_level(shaderc::OptimizationLevel::Performance);

    for name in SHADERS {
        let src = fs::read_to_string(src_dir.join(name)).unwrap();
        let kind = if name.ends_with(".vert") {
            shaderc::ShaderKind::Vertex
        } else {
            shaderc::ShaderKind::Fragment
        };
        let spv = comp
            .compile_into_spirv(&src, kind, name, "main", Some(&opts))
            .unwrap();
        fs::write(out.join(format!("{name}.spv")), spv.as_binary_u8()).unwrap();
    }
}
