pub mod orchestrator;
pub mod tool;

pub use orchestrator::{spawn_flash, FlashInputs, FlashJob};
pub use tool::FlashTool;

use serde::{Deserialize, Serialize};

/// Flash job lifecycle. `Failed` is terminal and carries the reason
/// verbatim; a new attempt restarts from `Idle`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum FlashState {
    Idle,
    ValidatingInputs,
    Disconnecting,
    Flashing,
    AwaitingDeviceReset,
    Complete,
    Failed(String),
}

impl std::fmt::Display for FlashState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlashState::Idle => write!(f, "idle"),
            FlashState::ValidatingInputs => write!(f, "validating inputs"),
            FlashState::Disconnecting => write!(f, "disconnecting"),
            FlashState::Flashing => write!(f, "flashing"),
            FlashState::AwaitingDeviceReset => write!(f, "awaiting device reset"),
            FlashState::Complete => write!(f, "complete"),
            FlashState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FlashError {
    #[error("Firmware file not found: {0}")]
    InvalidFirmware(std::path::PathBuf),

    #[error("No flashing tool found; install esptool or ESP-IDF")]
    NoFlashTool,

    #[error("No serial port selected")]
    NoPort,

    #[error("Failed to launch flashing tool: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Flashing failed with exit code {0}")]
    ExitCode(i32),
}

pub type Result<T> = std::result::Result<T, FlashError>;
