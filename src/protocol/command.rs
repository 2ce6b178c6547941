use super::CommandError;

/// Full outbound command vocabulary understood by the firmware console.
/// `is_help_command_line` in the processor reuses this table to recognize
/// the device's help listing.
pub const COMMAND_NAMES: &[&str] = &[
    "invert_throttle",
    "level_assistant",
    "toggle_speed_unit",
    "reset_odometer",
    "set_motor_pulley",
    "set_wheel_pulley",
    "set_wheel_size",
    "set_motor_poles",
    "set_pid_kp",
    "set_pid_ki",
    "set_pid_kd",
    "set_pid_output_max",
    "get_config",
    "get_pid_params",
    "get_firmware_version",
    "calibrate_throttle",
    "get_calibration",
    "help",
];

/// A validated outbound command. Numeric setters are range-checked here,
/// mirroring (not replacing) the device-side validation; there is no
/// correlation ID, so effects are only observed through later response
/// lines.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    InvertThrottle,
    LevelAssistant,
    ToggleSpeedUnit,
    ResetOdometer,
    SetMotorPulley(u8),
    SetWheelPulley(u8),
    SetWheelSize(u8),
    SetMotorPoles(u8),
    SetPidKp(f32),
    SetPidKi(f32),
    SetPidKd(f32),
    SetPidOutputMax(f32),
    GetConfig,
    GetPidParams,
    GetFirmwareVersion,
    CalibrateThrottle,
    GetCalibration,
    Help,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::InvertThrottle => "invert_throttle",
            Command::LevelAssistant => "level_assistant",
            Command::ToggleSpeedUnit => "toggle_speed_unit",
            Command::ResetOdometer => "reset_odometer",
            Command::SetMotorPulley(_) => "set_motor_pulley",
            Command::SetWheelPulley(_) => "set_wheel_pulley",
            Command::SetWheelSize(_) => "set_wheel_size",
            Command::SetMotorPoles(_) => "set_motor_poles",
            Command::SetPidKp(_) => "set_pid_kp",
            Command::SetPidKi(_) => "set_pid_ki",
            Command::SetPidKd(_) => "set_pid_kd",
            Command::SetPidOutputMax(_) => "set_pid_output_max",
            Command::GetConfig => "get_config",
            Command::GetPidParams => "get_pid_params",
            Command::GetFirmwareVersion => "get_firmware_version",
            Command::CalibrateThrottle => "calibrate_throttle",
            Command::GetCalibration => "get_calibration",
            Command::Help => "help",
        }
    }

    /// Client-side range check, performed before any transmission side
    /// effect.
    pub fn validate(&self) -> Result<(), CommandError> {
        match *self {
            Command::SetMotorPulley(v)
            | Command::SetWheelPulley(v)
            | Command::SetWheelSize(v)
            | Command::SetMotorPoles(v) => check_range(self.name(), f64::from(v), 1.0, 255.0),
            Command::SetPidKp(v) => check_range(self.name(), f64::from(v), 0.0, 10.0),
            Command::SetPidKi(v) => check_range(self.name(), f64::from(v), 0.0, 2.0),
            Command::SetPidKd(v) => check_range(self.name(), f64::from(v), 0.0, 1.0),
            Command::SetPidOutputMax(v) => check_range(self.name(), f64::from(v), 10.0, 100.0),
            _ => Ok(()),
        }
    }

    /// Render the wire line (without the newline terminator).
    pub fn encode(&self) -> String {
        match self {
            Command::SetMotorPulley(v)
            | Command::SetWheelPulley(v)
            | Command::SetWheelSize(v)
            | Command::SetMotorPoles(v) => format!("{} {}", self.name(), v),
            Command::SetPidKp(v)
            | Command::SetPidKi(v)
            | Command::SetPidKd(v)
            | Command::SetPidOutputMax(v) => format!("{} {}", self.name(), v),
            _ => self.name().to_string(),
        }
    }
}

fn check_range(
    command: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), CommandError> {
    if value < min || value > max {
        Err(CommandError::OutOfRange { command, value, min, max })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_encode_with_argument() {
        assert_eq!(Command::SetMotorPulley(15).encode(), "set_motor_pulley 15");
        assert_eq!(Command::SetPidKp(0.8).encode(), "set_pid_kp 0.8");
        assert_eq!(Command::GetConfig.encode(), "get_config");
    }

    #[test]
    fn pid_ranges_are_enforced() {
        assert!(Command::SetPidKp(10.0).validate().is_ok());
        assert!(Command::SetPidKp(10.1).validate().is_err());
        assert!(Command::SetPidKi(-0.1).validate().is_err());
        assert!(Command::SetPidOutputMax(9.9).validate().is_err());
        assert!(Command::SetPidOutputMax(10.0).validate().is_ok());
    }

    #[test]
    fn integer_setters_reject_zero() {
        assert!(Command::SetWheelSize(0).validate().is_err());
        assert!(Command::SetWheelSize(1).validate().is_ok());
        assert!(Command::SetWheelSize(255).validate().is_ok());
    }
}
