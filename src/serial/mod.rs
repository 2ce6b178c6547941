pub mod connection;
pub mod reader;

pub use connection::ConnectionManager;
pub use reader::ReaderHandle;

use serde::{Deserialize, Serialize};

/// Connection lifecycle of the serial session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    #[error("Port unavailable: {0}")]
    PortUnavailable(String),

    #[error("Permission denied opening {0}")]
    PermissionDenied(String),

    #[error("Port already open")]
    AlreadyOpen,

    #[error("Not connected")]
    Disconnected,

    #[error("Write timed out")]
    WriteTimeout,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialport error: {0}")]
    SerialportError(#[from] serialport::Error),
}

pub type Result<T> = std::result::Result<T, SerialError>;
