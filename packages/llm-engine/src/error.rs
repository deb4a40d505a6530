/// Error types for the inference engine boundary
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine not loaded - call load() first")]
    NotLoaded,

    #[error("Model loading failed: {0}")]
    LoadFailed(String),

    #[error("Model not available on the inference server: {0}")]
    ModelNotFound(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Inference server returned {status}: {body}")]
    ServerStatus { status: u16, body: String },

    #[error("Malformed stream payload: {0}")]
    Protocol(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    pub fn load_failed(msg: impl Into<String>) -> Self {
        Self::LoadFailed(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
