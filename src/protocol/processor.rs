use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::mpsc;

use crate::config::{ConfigMirror, ConfigUpdate, SpeedUnit};
use crate::events::SessionEvent;
use crate::protocol::command::COMMAND_NAMES;
use crate::protocol::MessageKind;

/// ANSI escape sequences emitted by the device's boot console.
static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").unwrap());

/// Internal firmware traces that duplicate the user-facing response lines.
const LOG_DENYLIST: &[&str] = &[
    "I (",
    "USB_SERIAL: Processing command:",
    "USB_SERIAL: Parsed command type:",
    "USB_SERIAL: Motor pulley teeth set to:",
    "USB_SERIAL: Wheel pulley teeth set to:",
    "USB_SERIAL: Wheel diameter set to:",
    "USB_SERIAL: Motor poles set to:",
    "USB_SERIAL: Throttle inversion:",
    "USB_SERIAL: Level assistant:",
    "USB_SERIAL: Odometer reset",
    "USB_SERIAL: Configuration:",
    "USB_SERIAL: Available commands:",
    "USB_SERIAL: Unknown command:",
];

const PROMPT_MARKER: &str = ">";

/// A response line tagged with its semantic category, the formatted log
/// entry derived from it, and the mirror updates it carries.
#[derive(Debug, Clone)]
pub struct ClassifiedMessage {
    pub kind: MessageKind,
    pub text: String,
    pub updates: Vec<ConfigUpdate>,
}

/// Mirror fields addressable through the response alias table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigKey {
    ThrottleInverted,
    LevelAssistant,
    SpeedUnit,
    MotorPulleyTeeth,
    WheelPulleyTeeth,
    WheelDiameterMm,
    MotorPoles,
    BleConnected,
    FirmwareVersion,
    PidKp,
    PidKi,
    PidKd,
    PidOutputMax,
}

/// Case-insensitive alias table covering every key spelling the two
/// firmware response dialects use, in configuration dumps and in the PID
/// parameter block alike.
const CONFIG_KEY_ALIASES: &[(&str, ConfigKey)] = &[
    ("firmware version", ConfigKey::FirmwareVersion),
    ("throttle inverted", ConfigKey::ThrottleInverted),
    ("throttle inversion", ConfigKey::ThrottleInverted),
    ("level assistant", ConfigKey::LevelAssistant),
    ("speed unit", ConfigKey::SpeedUnit),
    ("motor pulley teeth", ConfigKey::MotorPulleyTeeth),
    ("motor pulley", ConfigKey::MotorPulleyTeeth),
    ("wheel pulley teeth", ConfigKey::WheelPulleyTeeth),
    ("wheel pulley", ConfigKey::WheelPulleyTeeth),
    ("wheel diameter", ConfigKey::WheelDiameterMm),
    ("wheel diameter (mm)", ConfigKey::WheelDiameterMm),
    ("motor poles", ConfigKey::MotorPoles),
    ("ble connected", ConfigKey::BleConnected),
    ("kp (proportional)", ConfigKey::PidKp),
    ("ki (integral)", ConfigKey::PidKi),
    ("kd (derivative)", ConfigKey::PidKd),
    ("output max", ConfigKey::PidOutputMax),
    ("pid kp", ConfigKey::PidKp),
    ("pid ki", ConfigKey::PidKi),
    ("pid kd", ConfigKey::PidKd),
    ("pid output max", ConfigKey::PidOutputMax),
];

/// Strip ANSI sequences, drop internal log traces and prompt markers.
/// Returns `None` when nothing user-relevant remains. Idempotent.
pub fn clean(line: &str) -> Option<String> {
    let stripped = ANSI_ESCAPE.replace_all(line, "");
    let trimmed = stripped.trim();

    if trimmed.is_empty() || trimmed == PROMPT_MARKER {
        return None;
    }
    if LOG_DENYLIST.iter().any(|pattern| trimmed.contains(pattern)) {
        return None;
    }

    Some(trimmed.to_string())
}

/// Evaluate the ordered, non-exclusive rule set against one cleaned line.
/// The same table yields both the mirror updates and the display category;
/// a malformed payload simply contributes no update.
pub fn classify(cleaned: &str) -> ClassifiedMessage {
    let kind = select_kind(cleaned);
    ClassifiedMessage {
        kind,
        text: format_message(kind, cleaned),
        updates: extract_updates(cleaned),
    }
}

fn select_kind(line: &str) -> MessageKind {
    if line.contains(" set to:") {
        MessageKind::Confirmation
    } else if line.contains("Throttle inversion:") || line.contains("Level assistant:") {
        MessageKind::StatusToggle
    } else if line.contains("Odometer reset") {
        MessageKind::Confirmation
    } else if line.contains("Unknown command:") {
        MessageKind::Error
    } else if is_help_command_line(line) {
        MessageKind::Detail
    } else if line.contains("Calibration progress:") {
        MessageKind::Progress
    } else if line.contains("Calibration complete!") {
        MessageKind::Confirmation
    } else if line.contains("Calibration failed") {
        MessageKind::Error
    } else if line.contains("Raw range:") || line.contains("Calibrated range:") {
        MessageKind::Detail
    } else if line.contains("Calibration Status:") {
        MessageKind::Status
    } else if line.contains("Current ADC Reading:") || line.contains("Current Mapped Value:") {
        MessageKind::Detail
    } else if line.contains("Throttle signals were set to neutral during calibration") {
        MessageKind::Safety
    } else if line.contains("Calibrated Min Value:")
        || line.contains("Calibrated Max Value:")
        || line.contains("Calibrated Range:")
    {
        MessageKind::Detail
    } else {
        MessageKind::Plain
    }
}

fn format_message(kind: MessageKind, line: &str) -> String {
    match kind {
        MessageKind::Confirmation => format!("[OK] {}", line),
        MessageKind::StatusToggle => {
            let label = line.split(':').next().unwrap_or(line);
            let state = if line.contains("ENABLED") { "enabled" } else { "disabled" };
            format!("[OK] {}: {}", label, state)
        }
        MessageKind::Error => format!("[ERROR] {}", line),
        MessageKind::Progress => format!("[PROGRESS] {}", line),
        MessageKind::Status => format!("[STATUS] {}", line),
        MessageKind::Safety => format!("[SAFETY] {}", line),
        MessageKind::Detail => format!("  {}", line),
        MessageKind::Plain => line.to_string(),
    }
}

fn extract_updates(line: &str) -> Vec<ConfigUpdate> {
    let mut updates = Vec::new();

    if let Some(update) = parse_toggle(line) {
        updates.push(update);
    } else if let Some(update) = parse_set_confirmation(line) {
        updates.push(update);
    } else if let Some(update) = parse_key_value(line) {
        updates.push(update);
    }

    updates
}

/// `"<Label>: ENABLED|DISABLED"` status toggles.
fn parse_toggle(line: &str) -> Option<ConfigUpdate> {
    let (label, state) = line.split_once(':')?;
    let enabled = match state.trim() {
        "ENABLED" => true,
        "DISABLED" => false,
        _ => return None,
    };

    match lookup_key(label)? {
        ConfigKey::ThrottleInverted => Some(ConfigUpdate::ThrottleInverted(enabled)),
        ConfigKey::LevelAssistant => Some(ConfigUpdate::LevelAssistant(enabled)),
        _ => None,
    }
}

/// `"<Param> set to: <value>"` confirmations. A malformed value leaves the
/// mirror untouched; the line still logs as a confirmation.
fn parse_set_confirmation(line: &str) -> Option<ConfigUpdate> {
    let idx = line.find(" set to:")?;
    let param = &line[..idx];
    let value = line[idx + " set to:".len()..].trim();

    coerce(lookup_key(param)?, value)
}

/// Free-form `key: value` lines; configuration dumps and the PID
/// parameter block share this path.
fn parse_key_value(line: &str) -> Option<ConfigUpdate> {
    let (key, value) = line.split_once(':')?;
    coerce(lookup_key(key)?, value.trim())
}

fn lookup_key(raw: &str) -> Option<ConfigKey> {
    let key = raw.trim().to_ascii_lowercase();
    CONFIG_KEY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, field)| *field)
}

fn coerce(key: ConfigKey, value: &str) -> Option<ConfigUpdate> {
    match key {
        ConfigKey::ThrottleInverted => Some(ConfigUpdate::ThrottleInverted(parse_enabled(value))),
        ConfigKey::LevelAssistant => Some(ConfigUpdate::LevelAssistant(parse_enabled(value))),
        ConfigKey::SpeedUnit => {
            let mph = value.contains("mi/h") || value.eq_ignore_ascii_case("true");
            Some(ConfigUpdate::SpeedUnit(if mph { SpeedUnit::Mph } else { SpeedUnit::Kmh }))
        }
        ConfigKey::MotorPulleyTeeth => parse_number(value).map(ConfigUpdate::MotorPulleyTeeth),
        ConfigKey::WheelPulleyTeeth => parse_number(value).map(ConfigUpdate::WheelPulleyTeeth),
        ConfigKey::WheelDiameterMm => parse_number(value).map(ConfigUpdate::WheelDiameterMm),
        ConfigKey::MotorPoles => parse_number(value).map(ConfigUpdate::MotorPoles),
        ConfigKey::BleConnected => Some(ConfigUpdate::BleConnected(parse_connected(value))),
        ConfigKey::FirmwareVersion => {
            if value.is_empty() {
                None
            } else {
                Some(ConfigUpdate::FirmwareVersion(value.to_string()))
            }
        }
        ConfigKey::PidKp => parse_number(value).map(ConfigUpdate::PidKp),
        ConfigKey::PidKi => parse_number(value).map(ConfigUpdate::PidKi),
        ConfigKey::PidKd => parse_number(value).map(ConfigUpdate::PidKd),
        ConfigKey::PidOutputMax => parse_number(value).map(ConfigUpdate::PidOutputMax),
    }
}

fn parse_enabled(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "yes" | "enabled" | "true")
}

fn parse_connected(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "yes" | "connected" | "true")
}

/// Numeric parse with the unit suffix (`mm`) stripped, as in
/// `"Wheel diameter set to: 110mm"` or `"Wheel Diameter: 115 mm"`.
fn parse_number<T: std::str::FromStr>(value: &str) -> Option<T> {
    let token = value.split_whitespace().next()?;
    let token = token.strip_suffix("mm").unwrap_or(token);
    token.parse().ok()
}

fn is_help_command_line(line: &str) -> bool {
    line.split_whitespace()
        .next()
        .map(|first| COMMAND_NAMES.contains(&first))
        .unwrap_or(false)
}

/// Consume raw lines in arrival order, keep the mirror in sync and forward
/// the formatted entries to the session's log sink.
pub fn spawn_processor(
    mut line_rx: mpsc::UnboundedReceiver<String>,
    mirror: ConfigMirror,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(line) = line_rx.recv().await {
            if let Some(cleaned) = clean(&line) {
                let ClassifiedMessage { text, updates, .. } = classify(&cleaned);

                let mut changed = false;
                for update in updates {
                    changed |= mirror.apply(update);
                }

                let _ = events_tx.send(SessionEvent::Log(text));
                if changed {
                    let _ = events_tx.send(SessionEvent::ConfigChanged(mirror.snapshot()));
                }
            }
        }
        log::debug!("Response processor stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_strips_ansi_and_is_idempotent() {
        let raw = "\x1b[0;32mThrottle inversion: ENABLED\x1b[0m";
        let once = clean(raw).unwrap();
        assert_eq!(once, "Throttle inversion: ENABLED");
        assert_eq!(clean(&once).unwrap(), once);
    }

    #[test]
    fn clean_drops_denylisted_and_prompt_lines() {
        assert!(clean("I (1234) main: boot").is_none());
        assert!(clean("USB_SERIAL: Processing command: get_config").is_none());
        assert!(clean(">").is_none());
        assert!(clean("   ").is_none());
    }

    #[test]
    fn pid_confirmation_updates_mirror_field() {
        let msg = classify("PID Kp set to: 1.25");
        assert_eq!(msg.kind, MessageKind::Confirmation);
        assert_eq!(msg.text, "[OK] PID Kp set to: 1.25");
        assert_eq!(msg.updates, vec![ConfigUpdate::PidKp(1.25)]);
    }

    #[test]
    fn wheel_diameter_suffix_is_stripped() {
        let msg = classify("Wheel diameter set to: 110mm");
        assert_eq!(msg.updates, vec![ConfigUpdate::WheelDiameterMm(110)]);
    }

    #[test]
    fn malformed_set_payload_is_ignored_silently() {
        let msg = classify("Motor poles set to: banana");
        assert_eq!(msg.kind, MessageKind::Confirmation);
        assert!(msg.updates.is_empty());
    }

    #[test]
    fn toggle_lines_update_and_reformat() {
        let msg = classify("Level assistant: DISABLED");
        assert_eq!(msg.kind, MessageKind::StatusToggle);
        assert_eq!(msg.text, "[OK] Level assistant: disabled");
        assert_eq!(msg.updates, vec![ConfigUpdate::LevelAssistant(false)]);
    }

    #[test]
    fn dump_lines_go_through_alias_table() {
        assert_eq!(
            classify("Wheel Diameter: 115 mm").updates,
            vec![ConfigUpdate::WheelDiameterMm(115)]
        );
        assert_eq!(
            classify("Throttle Inverted: Yes").updates,
            vec![ConfigUpdate::ThrottleInverted(true)]
        );
        assert_eq!(
            classify("BLE Connected: connected").updates,
            vec![ConfigUpdate::BleConnected(true)]
        );
        assert_eq!(
            classify("Kp (Proportional): 0.80").updates,
            vec![ConfigUpdate::PidKp(0.8)]
        );
    }

    #[test]
    fn speed_unit_line_parses_but_stays_plain() {
        let msg = classify("Speed Unit: mi/h");
        assert_eq!(msg.kind, MessageKind::Plain);
        assert_eq!(msg.updates, vec![ConfigUpdate::SpeedUnit(SpeedUnit::Mph)]);
    }

    #[test]
    fn unknown_command_is_an_error() {
        let msg = classify("Unknown command: fly");
        assert_eq!(msg.kind, MessageKind::Error);
        assert_eq!(msg.text, "[ERROR] Unknown command: fly");
    }

    #[test]
    fn calibration_lines_pick_their_categories() {
        assert_eq!(classify("Calibration progress: 50%").kind, MessageKind::Progress);
        assert_eq!(classify("Calibration Status: CALIBRATED").kind, MessageKind::Status);
        assert_eq!(classify("Calibration complete!").kind, MessageKind::Confirmation);
        assert_eq!(classify("Calibration failed - range too small").kind, MessageKind::Error);
        assert_eq!(classify("Raw range: 142 - 3788").kind, MessageKind::Detail);
        assert_eq!(
            classify("Throttle signals were set to neutral during calibration").kind,
            MessageKind::Safety
        );
    }

    #[test]
    fn unmatched_lines_pass_through_as_plain() {
        let msg = classify("hello there");
        assert_eq!(msg.kind, MessageKind::Plain);
        assert_eq!(msg.text, "hello there");
        assert!(msg.updates.is_empty());
    }
}
