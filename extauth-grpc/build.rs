use std::io::Result;

fn main() -> Result<()> {
    tonic_build::configure().compile_protos(&["proto/external_auth.proto"], &["proto/"])?;
    println!("cargo:rerun-if-changed=proto/external_auth.proto");
    Ok(())
}
