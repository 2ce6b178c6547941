use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::time::{timeout, Duration};

use crate::config::ConfigMirror;
use crate::events::SessionEvent;
use crate::protocol::processor::spawn_processor;
use crate::protocol::{Command, CommandError};
use crate::serial::reader::spawn_reader;
use crate::serial::{ConnectionManager, ConnectionState, ReaderHandle};

const TASK_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

struct SessionTasks {
    reader: ReaderHandle,
    processor: tokio::task::JoinHandle<()>,
}

/// One device session: exclusive owner of the transport, the reader and
/// processor tasks, and the configuration mirror. Cheap to share via
/// `Arc`; all methods take `&self`.
pub struct DeviceSession {
    connection: Arc<Mutex<ConnectionManager>>,
    mirror: ConfigMirror,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    tasks: Mutex<Option<SessionTasks>>,
}

impl DeviceSession {
    /// Create a session and the event stream its owner consumes. The
    /// mirror outlives reconnects; last-known values stay visible while
    /// the link is down.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let session = Arc::new(Self {
            connection: Arc::new(Mutex::new(ConnectionManager::new())),
            mirror: ConfigMirror::new(),
            events_tx,
            tasks: Mutex::new(None),
        });
        (session, events_rx)
    }

    /// Open the port and start the reader/processor pipeline.
    pub async fn connect(&self, port: &str) -> crate::serial::Result<()> {
        let _ = self
            .events_tx
            .send(SessionEvent::ConnectionChanged(ConnectionState::Connecting));

        {
            let mut conn = self.connection.lock().await;
            if let Err(e) = conn.connect(port) {
                // AlreadyOpen leaves the existing link up; report whatever
                // state the manager is actually in.
                let _ = self
                    .events_tx
                    .send(SessionEvent::ConnectionChanged(conn.state()));
                return Err(e);
            }
        }

        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let reader = spawn_reader(self.connection.clone(), line_tx, self.events_tx.clone());
        let processor = spawn_processor(line_rx, self.mirror.clone(), self.events_tx.clone());
        *self.tasks.lock().await = Some(SessionTasks { reader, processor });

        let _ = self
            .events_tx
            .send(SessionEvent::ConnectionChanged(ConnectionState::Connected));
        let _ = self
            .events_tx
            .send(SessionEvent::Log(format!("Connected to hand controller on {}", port)));
        Ok(())
    }

    /// Stop the pipeline and close the port. Idempotent; the reader is
    /// gone within one poll interval and no lines are delivered after
    /// this returns.
    pub async fn disconnect(&self) {
        let tasks = self.tasks.lock().await.take();
        let had_tasks = tasks.is_some();
        if let Some(tasks) = tasks {
            tasks.reader.shutdown().await;
            // Reader drop closed the line queue; the processor drains and exits.
            let _ = timeout(TASK_SHUTDOWN_GRACE, tasks.processor).await;
        }

        let was_connected = {
            let mut conn = self.connection.lock().await;
            let was_connected = conn.is_connected();
            conn.disconnect();
            was_connected
        };

        if was_connected || had_tasks {
            let _ = self.events_tx.send(SessionEvent::ConnectionChanged(
                ConnectionState::Disconnected,
            ));
            let _ = self
                .events_tx
                .send(SessionEvent::Log("Disconnected from hand controller".to_string()));
        }
    }

    /// Validate and transmit one command. The sent line is echoed to the
    /// log sink; confirmation only ever arrives as a later response line.
    pub async fn send_command(&self, command: Command) -> crate::protocol::Result<()> {
        command.validate()?;
        let encoded = command.encode();

        {
            let mut conn = self.connection.lock().await;
            if !conn.is_connected() {
                return Err(CommandError::NotConnected);
            }
            conn.send_line(&encoded)?;
        }

        let _ = self
            .events_tx
            .send(SessionEvent::Log(format!("  Sent: {}", encoded)));
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_connected()
    }

    pub async fn state(&self) -> ConnectionState {
        self.connection.lock().await.state()
    }

    pub async fn port_name(&self) -> Option<String> {
        self.connection
            .lock()
            .await
            .port_name()
            .map(|name| name.to_string())
    }

    pub fn mirror(&self) -> &ConfigMirror {
        &self.mirror
    }

    pub(crate) fn events(&self) -> mpsc::UnboundedSender<SessionEvent> {
        self.events_tx.clone()
    }
}
