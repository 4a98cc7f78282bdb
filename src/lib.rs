pub mod engine;
pub mod game;
#[cfg(feature = "grpc")]
pub mod server;
