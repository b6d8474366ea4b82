use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let proto_dir = PathBuf::from("proto");

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=proto/");

    tonic_build::configure()
        .build_server(true)
        .build_client(false)
        .compile_protos(&[proto_dir.join("warden/gate/v1/gate.proto")], &[&proto_dir])?;

    Ok(())
}
