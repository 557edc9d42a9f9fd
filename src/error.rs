use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GncError{
    #[error("failed to read config {path}: {source}")]
    ConfigIo{
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    ConfigParse{
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A reset or goal needed a pose estimate and none was available yet
    #[error("pose estimate not ready")]
    EstimateNotReady,

    #[error("allocation matrix has no pseudo-inverse: {0}")]
    Allocation(&'static str),

    #[error("serial link error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("serial I/O failed: {0}")]
    SerialIo(#[from] std::io::Error),

    #[error("payload of {0} bytes does not fit in one frame")]
    FrameTooLarge(usize),

    #[error("{0} channel closed")]
    ChannelClosed(&'static str),
}

pub type Result<T> = std::result::Result<T, GncError>;
