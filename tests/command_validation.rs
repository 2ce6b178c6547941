use handlink::protocol::CommandError;
use handlink::{Command, DeviceSession};

#[test]
fn boundary_values_pass_one_past_fails() {
    // Exact min/max and one unit beyond each, per setter family.
    assert!(Command::SetMotorPulley(1).validate().is_ok());
    assert!(Command::SetMotorPulley(255).validate().is_ok());
    assert!(Command::SetMotorPulley(0).validate().is_err());

    assert!(Command::SetPidKp(0.0).validate().is_ok());
    assert!(Command::SetPidKp(10.0).validate().is_ok());
    assert!(Command::SetPidKp(-0.01).validate().is_err());
    assert!(Command::SetPidKp(10.01).validate().is_err());

    assert!(Command::SetPidKi(0.0).validate().is_ok());
    assert!(Command::SetPidKi(2.0).validate().is_ok());
    assert!(Command::SetPidKi(2.01).validate().is_err());

    assert!(Command::SetPidKd(1.0).validate().is_ok());
    assert!(Command::SetPidKd(1.01).validate().is_err());

    assert!(Command::SetPidOutputMax(10.0).validate().is_ok());
    assert!(Command::SetPidOutputMax(100.0).validate().is_ok());
    assert!(Command::SetPidOutputMax(9.99).validate().is_err());
    assert!(Command::SetPidOutputMax(100.01).validate().is_err());
}

#[tokio::test]
async fn out_of_range_never_reaches_the_wire() {
    let (session, _events) = DeviceSession::new();

    // Validation fires before any connection or transmission attempt.
    let err = session.send_command(Command::SetPidKp(11.0)).await.unwrap_err();
    assert!(matches!(err, CommandError::OutOfRange { .. }));
}

#[tokio::test]
async fn sending_while_disconnected_fails() {
    let (session, _events) = DeviceSession::new();

    let err = session.send_command(Command::GetConfig).await.unwrap_err();
    assert!(matches!(err, CommandError::NotConnected));
}

#[test]
fn encoded_setters_match_the_wire_vocabulary() {
    assert_eq!(Command::InvertThrottle.encode(), "invert_throttle");
    assert_eq!(Command::ToggleSpeedUnit.encode(), "toggle_speed_unit");
    assert_eq!(Command::SetWheelPulley(33).encode(), "set_wheel_pulley 33");
    assert_eq!(Command::SetWheelSize(115).encode(), "set_wheel_size 115");
    assert_eq!(Command::SetPidOutputMax(48.0).encode(), "set_pid_output_max 48");
    assert_eq!(Command::GetFirmwareVersion.encode(), "get_firmware_version");
    assert_eq!(Command::CalibrateThrottle.encode(), "calibrate_throttle");
}
