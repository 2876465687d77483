use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlastError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Generator error: {0}")]
    Generator(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Protobuf encode error: {0}")]
    Encode(#[from] prost::EncodeError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("GRPC error: {0}")]
    Grpc(#[from] tonic::Status),

    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("Invalid endpoint URI: {0}")]
    Endpoint(String),

    #[error("Invalid header: {0}")]
    Header(String),

    #[error("Async task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type alias for otelblast operations
pub type Result<T> = std::result::Result<T, BlastError>;

impl BlastError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new template error
    pub fn template<S: Into<String>>(msg: S) -> Self {
        Self::Template(msg.into())
    }

    /// Creates a new generator error
    pub fn generator<S: Into<String>>(msg: S) -> Self {
        Self::Generator(msg.into())
    }

    /// Creates a new export error
    pub fn export<S: Into<String>>(msg: S) -> Self {
        Self::Export(msg.into())
    }

    /// Returns true if this error stems from cooperative shutdown rather
    /// than a real failure. Cancellation never fails the worker pool.
    pub fn is_cancellation(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Grpc(status) => status.code() == tonic::Code::Cancelled,
            _ => false,
        }
    }

    /// Returns the error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Template(_) | Self::Decode(_) | Self::Encode(_) => "template",
            Self::Generator(_) => "generator",
            Self::Export(_) | Self::Grpc(_) => "export",
            Self::Cancelled => "cancelled",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Transport(_) | Self::Endpoint(_) | Self::Header(_) => "transport",
            Self::Join(_) => "async",
        }
    }
}
