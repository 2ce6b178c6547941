use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, timeout};

use crate::events::SessionEvent;
use crate::serial::{ConnectionManager, ConnectionState, SerialError};

/// Poll cadence of the background reader. Disconnect is guaranteed to take
/// effect within one interval.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

const READ_CHUNK: usize = 512;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Handle to the background reader task.
pub struct ReaderHandle {
    stop_tx: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl ReaderHandle {
    /// Signal the reader to stop and wait for it to wind down.
    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(()).await;
        let _ = timeout(SHUTDOWN_GRACE, self.task).await;
    }
}

/// Spawn the reader loop. Complete lines are trimmed, decoded lossily and
/// forwarded in arrival order over `line_tx`; the unbounded queue keeps
/// processing jitter from ever throttling the I/O cadence.
pub fn spawn_reader(
    connection: Arc<Mutex<ConnectionManager>>,
    line_tx: mpsc::UnboundedSender<String>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
) -> ReaderHandle {
    let (stop_tx, stop_rx) = mpsc::channel(1);

    let task = tokio::spawn(async move {
        read_loop(connection, line_tx, events_tx, stop_rx).await;
    });

    ReaderHandle { stop_tx, task }
}

async fn read_loop(
    connection: Arc<Mutex<ConnectionManager>>,
    line_tx: mpsc::UnboundedSender<String>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    mut stop_rx: mpsc::Receiver<()>,
) {
    let mut partial = String::new();

    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                log::debug!("Reader received stop signal");
                break;
            }
            _ = sleep(POLL_INTERVAL) => {
                let mut buf = [0u8; READ_CHUNK];
                let read = {
                    let mut guard = connection.lock().await;
                    guard.read_available(&mut buf)
                };

                match read {
                    Ok(0) => {}
                    Ok(n) => {
                        // Lossy decode: a garbled boot banner must never kill the loop.
                        partial.push_str(&String::from_utf8_lossy(&buf[..n]));
                        drain_lines(&mut partial, &line_tx);
                    }
                    Err(SerialError::Disconnected) => {
                        // Explicit disconnect won the race; nothing to report.
                        break;
                    }
                    Err(e) => {
                        log::warn!("Serial read error, closing session: {}", e);
                        {
                            let mut guard = connection.lock().await;
                            guard.disconnect();
                        }
                        let _ = events_tx.send(SessionEvent::ConnectionChanged(
                            ConnectionState::Disconnected,
                        ));
                        break;
                    }
                }
            }
        }
    }
}

fn drain_lines(partial: &mut String, line_tx: &mpsc::UnboundedSender<String>) {
    while let Some(pos) = partial.find(['\n', '\r']) {
        let line = partial[..pos].trim().to_string();

        let mut advance = pos + 1;
        while advance < partial.len()
            && matches!(partial.as_bytes()[advance], b'\n' | b'\r')
        {
            advance += 1;
        }
        partial.drain(..advance);

        if !line.is_empty() {
            // Receiver dropped means the session is tearing down; keep
            // draining so the buffer stays consistent.
            let _ = line_tx.send(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_splits_on_mixed_terminators() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut partial = String::from("first\r\nsecond\nthird");
        drain_lines(&mut partial, &tx);

        assert_eq!(rx.try_recv().unwrap(), "first");
        assert_eq!(rx.try_recv().unwrap(), "second");
        assert!(rx.try_recv().is_err());
        assert_eq!(partial, "third");
    }

    #[test]
    fn drain_skips_blank_lines() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut partial = String::from("\n\n  \nok\n");
        drain_lines(&mut partial, &tx);

        assert_eq!(rx.try_recv().unwrap(), "ok");
        assert!(rx.try_recv().is_err());
    }
}
