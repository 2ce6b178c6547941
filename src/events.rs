use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::DeviceConfig;
use crate::flash::FlashState;
use crate::serial::ConnectionState;

/// Events the core emits toward whatever owns the interactive surface.
/// Delivery order is guaranteed (one unbounded channel), timing is not.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum SessionEvent {
    Log(String),
    ConfigChanged(DeviceConfig),
    ConnectionChanged(ConnectionState),
    Flash(FlashState),
}

/// Capability interface implemented by the presentation layer. The core
/// never depends on a concrete UI toolkit.
pub trait SurfaceSink: Send + Sync {
    fn on_log_message(&self, text: &str);
    fn on_config_changed(&self, config: &DeviceConfig);
}

/// Bridge the event channel onto a [`SurfaceSink`]. Events that have no
/// sink counterpart (connection and flash transitions) are rendered as log
/// lines so nothing is silently dropped.
pub fn spawn_sink_forwarder(
    mut events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    sink: Arc<dyn SurfaceSink>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match event {
                SessionEvent::Log(text) => sink.on_log_message(&text),
                SessionEvent::ConfigChanged(config) => sink.on_config_changed(&config),
                SessionEvent::ConnectionChanged(state) => {
                    sink.on_log_message(&format!("Connection state: {:?}", state));
                }
                SessionEvent::Flash(state) => {
                    sink.on_log_message(&format!("Flash state: {}", state));
                }
            }
        }
    })
}
