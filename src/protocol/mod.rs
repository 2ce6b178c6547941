pub mod command;
pub mod processor;

pub use command::Command;
pub use processor::{clean, classify, ClassifiedMessage};

use serde::{Deserialize, Serialize};

/// Semantic category of a response line. The same rule table that extracts
/// mirror updates picks the category, which in turn picks the display
/// prefix of the forwarded log entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MessageKind {
    Confirmation,
    StatusToggle,
    Error,
    Progress,
    Status,
    Safety,
    Detail,
    Plain,
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Not connected")]
    NotConnected,

    #[error("{command}: value {value} out of range [{min}, {max}]")]
    OutOfRange {
        command: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Serial error: {0}")]
    Serial(#[from] crate::serial::SerialError),
}

pub type Result<T> = std::result::Result<T, CommandError>;
