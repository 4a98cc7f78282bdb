fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "grpc")]
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/trivia/v1/trivia.proto"], &["proto/"])?;
    Ok(())
}
