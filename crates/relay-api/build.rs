#[cfg(feature = "grpc")]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/relay.proto");
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/relay.proto"], &["proto"])?;
    Ok(())
}

#[cfg(not(feature = "grpc"))]
fn main() {}
