//! Build script for proto compilation.
//!
//! The plugin protocol types are generated into `OUT_DIR` on every build and
//! pulled in by `src/generated.rs`. A vendored `protoc` is used unless the
//! `PROTOC` environment variable already points at one.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var_os("PROTOC").is_none() {
        let protoc = protoc_bin_vendored::protoc_bin_path()?;
        std::env::set_var("PROTOC", protoc);
    }

    tonic_prost_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/provider.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/provider.proto");

    Ok(())
}
