//! Protocol and session core for configuring ESP32-based hand controllers
//! over a line-oriented USB serial protocol, flashing their firmware via an
//! external tool and checking a release registry for updates. Presentation
//! is left to the embedding application, which consumes [`SessionEvent`]s
//! or implements [`SurfaceSink`].

pub mod config;
pub mod events;
pub mod flash;
pub mod protocol;
pub mod serial;
pub mod session;
pub mod update;

pub use config::{ConfigMirror, DeviceConfig, SpeedUnit};
pub use events::{SessionEvent, SurfaceSink};
pub use flash::{FlashInputs, FlashState, FlashTool};
pub use protocol::{Command, MessageKind};
pub use serial::ConnectionState;
pub use session::DeviceSession;
pub use update::UpdateChecker;
