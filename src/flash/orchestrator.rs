use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::sleep;

use super::tool::{flash_args, FlashTool, APP_FLASH_OFFSET};
use super::{FlashError, FlashState};
use crate::events::SessionEvent;
use crate::session::DeviceSession;

/// Serial handles are not released synchronously by the OS; give the port
/// time to settle after closing the session.
const PORT_SETTLE_DELAY: Duration = Duration::from_secs(2);
/// Informational countdown while the freshly flashed device reboots.
const RESET_COUNTDOWN_SECS: u32 = 5;

/// What a flash attempt needs up front. `tool` may be pre-resolved; when
/// `None` the orchestrator runs the discovery chain itself.
#[derive(Debug, Clone)]
pub struct FlashInputs {
    pub port: String,
    pub firmware_path: PathBuf,
    pub tool: Option<FlashTool>,
}

/// A validated flash job as it moves through the state machine.
#[derive(Debug)]
pub struct FlashJob {
    pub port: String,
    pub firmware_path: PathBuf,
    pub tool: FlashTool,
    pub state: FlashState,
}

/// Run a flash job on its own task so streamed tool output never blocks
/// the interactive surface. The returned handle resolves to the terminal
/// state; progress arrives through the session event channel.
pub fn spawn_flash(
    session: Arc<DeviceSession>,
    inputs: FlashInputs,
) -> tokio::task::JoinHandle<FlashState> {
    tokio::spawn(async move { run_flash(session, inputs).await })
}

pub async fn run_flash(session: Arc<DeviceSession>, inputs: FlashInputs) -> FlashState {
    let events = session.events();

    let job = match validate(&events, inputs).await {
        Ok(job) => job,
        Err(e) => return fail(&events, e.to_string()),
    };

    emit_state(&events, FlashState::Disconnecting);
    if session.is_connected().await {
        emit_log(&events, "[INFO] Disconnecting from serial port for flashing...");
        session.disconnect().await;
        sleep(PORT_SETTLE_DELAY).await;
    }

    emit_state(&events, FlashState::Flashing);
    let status = match run_tool(&events, &job).await {
        Ok(status) => status,
        Err(e) => return fail(&events, e.to_string()),
    };

    if !status.success() {
        let code = status.code().unwrap_or(-1);
        return fail(&events, FlashError::ExitCode(code).to_string());
    }

    emit_log(&events, "[SUCCESS] Firmware flashed successfully!");
    emit_log(&events, "[INFO] Device is resetting...");
    emit_state(&events, FlashState::AwaitingDeviceReset);
    for remaining in (1..=RESET_COUNTDOWN_SECS).rev() {
        emit_log(
            &events,
            &format!("[INFO] Waiting for device reset... {} seconds", remaining),
        );
        sleep(Duration::from_secs(1)).await;
    }
    emit_log(&events, "[INFO] Ready to reconnect");

    emit_state(&events, FlashState::Complete);
    FlashState::Complete
}

async fn validate(
    events: &mpsc::UnboundedSender<SessionEvent>,
    inputs: FlashInputs,
) -> super::Result<FlashJob> {
    emit_state(events, FlashState::ValidatingInputs);

    if inputs.port.is_empty() {
        return Err(FlashError::NoPort);
    }
    if !inputs.firmware_path.is_file() {
        return Err(FlashError::InvalidFirmware(inputs.firmware_path));
    }

    let tool = match inputs.tool {
        Some(tool) => tool,
        None => FlashTool::resolve().await.ok_or(FlashError::NoFlashTool)?,
    };

    emit_log(events, "[INFO] Starting firmware flash...");
    emit_log(events, &format!("[INFO] Port: {}", inputs.port));
    emit_log(
        events,
        &format!(
            "[INFO] Firmware: {}",
            inputs
                .firmware_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| inputs.firmware_path.display().to_string())
        ),
    );
    emit_log(events, &format!("[INFO] Flash tool: {}", tool.describe()));

    Ok(FlashJob {
        port: inputs.port,
        firmware_path: inputs.firmware_path,
        tool,
        state: FlashState::ValidatingInputs,
    })
}

/// Spawn the external tool and stream its merged output line-by-line to
/// the log sink as it arrives.
async fn run_tool(
    events: &mpsc::UnboundedSender<SessionEvent>,
    job: &FlashJob,
) -> super::Result<std::process::ExitStatus> {
    let invocation = job.tool.invocation()?;
    let mut args = invocation.leading_args.clone();
    args.extend(flash_args(&job.port, &job.firmware_path));

    emit_log(
        events,
        &format!("[INFO] Flash offset: {} (64KB)", APP_FLASH_OFFSET),
    );
    emit_log(
        events,
        &format!(
            "[INFO] Running: {} {}",
            invocation.program.display(),
            args.join(" ")
        ),
    );

    let mut cmd = Command::new(&invocation.program);
    cmd.args(&args).stdout(Stdio::piped()).stderr(Stdio::piped());
    for (key, value) in &invocation.env {
        cmd.env(key, value);
    }

    let mut child = cmd.spawn()?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let events_stdout = events.clone();
    let stdout_task = tokio::spawn(async move {
        if let Some(stdout) = stdout {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                emit_log(&events_stdout, &format!("[FLASH] {}", line.trim_end()));
            }
        }
    });

    let events_stderr = events.clone();
    let stderr_task = tokio::spawn(async move {
        if let Some(stderr) = stderr {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                emit_log(&events_stderr, &format!("[FLASH] {}", line.trim_end()));
            }
        }
    });

    let status = child.wait().await?;

    // Drain remaining output before reporting the exit status.
    let _ = tokio::try_join!(stdout_task, stderr_task);

    Ok(status)
}

fn fail(events: &mpsc::UnboundedSender<SessionEvent>, reason: String) -> FlashState {
    log::error!("Flash job failed: {}", reason);
    emit_log(events, &format!("[ERROR] {}", reason));
    let state = FlashState::Failed(reason);
    emit_state(events, state.clone());
    state
}

fn emit_state(events: &mpsc::UnboundedSender<SessionEvent>, state: FlashState) {
    let _ = events.send(SessionEvent::Flash(state));
}

fn emit_log(events: &mpsc::UnboundedSender<SessionEvent>, text: &str) {
    let _ = events.send(SessionEvent::Log(text.to_string()));
}
