//! Error types for beacon-cast

use thiserror::Error;

use crate::dispatch::DispatchError;

/// Result type alias for beacon-cast operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in beacon-cast
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Chat channel error (Web API call, event stream)
    #[error("channel error: {0}")]
    Channel(String),

    /// Authentication rejected by the chat platform
    #[error("auth error: {0}")]
    Auth(String),

    /// Device discovery error
    #[error("discovery error: {0}")]
    Discovery(String),

    /// Device protocol error
    #[error("device error: {0}")]
    Device(String),

    /// One or more devices failed to speak
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// `WebSocket` error
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TLS handshake or setup error
    #[error("tls error: {0}")]
    Tls(#[from] tokio_native_tls::native_tls::Error),

    /// Protobuf decoding error
    #[error("protobuf error: {0}")]
    Protobuf(#[from] prost::DecodeError),
}
