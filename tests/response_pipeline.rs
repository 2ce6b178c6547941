use handlink::protocol::processor::{clean, classify, spawn_processor};
use handlink::{MessageKind, SessionEvent};

use handlink::config::ConfigMirror;
use tokio::sync::mpsc;

#[test]
fn clean_is_idempotent_over_ansi_noise() {
    let samples = [
        "\x1b[0;32mI (1234) BLE: ready\x1b[0m",
        "\x1b[31mPID Kp set to: 1.25\x1b[0m",
        "plain line",
        ">",
    ];

    for sample in samples {
        let once = clean(sample);
        let twice = once.as_deref().and_then(clean);
        assert_eq!(once, twice, "clean(clean(x)) != clean(x) for {:?}", sample);
    }
}

#[test]
fn confirmation_lines_format_with_ok_prefix() {
    let msg = classify("PID Kp set to: 1.25");
    assert_eq!(msg.kind, MessageKind::Confirmation);
    assert_eq!(msg.text, "[OK] PID Kp set to: 1.25");
}

#[tokio::test]
async fn processor_updates_mirror_and_preserves_order() {
    let mirror = ConfigMirror::new();
    let (line_tx, line_rx) = mpsc::unbounded_channel();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();

    let task = spawn_processor(line_rx, mirror.clone(), events_tx);

    line_tx.send("PID Kp set to: 1.25".to_string()).unwrap();
    line_tx.send("Wheel diameter set to: 110mm".to_string()).unwrap();
    line_tx.send("Throttle inversion: ENABLED".to_string()).unwrap();
    drop(line_tx);
    task.await.unwrap();

    let config = mirror.snapshot();
    assert_eq!(config.pid_kp, 1.25);
    assert_eq!(config.wheel_diameter_mm, 110);
    assert!(config.throttle_inverted);

    // Log entries come out in arrival order, each followed by the mirror
    // snapshot it produced.
    let mut logs = Vec::new();
    while let Ok(event) = events_rx.try_recv() {
        if let SessionEvent::Log(text) = event {
            logs.push(text);
        }
    }
    assert_eq!(
        logs,
        vec![
            "[OK] PID Kp set to: 1.25",
            "[OK] Wheel diameter set to: 110mm",
            "[OK] Throttle inversion: enabled",
        ]
    );
}

#[tokio::test]
async fn processor_drops_denylisted_lines() {
    let mirror = ConfigMirror::new();
    let (line_tx, line_rx) = mpsc::unbounded_channel();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();

    let task = spawn_processor(line_rx, mirror.clone(), events_tx);

    line_tx.send("I (5120) MAIN: loop tick".to_string()).unwrap();
    line_tx.send("USB_SERIAL: Processing command: get_config".to_string()).unwrap();
    line_tx.send(">".to_string()).unwrap();
    drop(line_tx);
    task.await.unwrap();

    assert!(events_rx.try_recv().is_err(), "denylisted lines must not reach the sink");
}

#[tokio::test]
async fn config_dump_replays_into_mirror() {
    let mirror = ConfigMirror::new();
    let (line_tx, line_rx) = mpsc::unbounded_channel();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();

    let task = spawn_processor(line_rx, mirror.clone(), events_tx);

    for line in [
        "Current Configuration",
        "Firmware Version: 1.4.2",
        "Throttle Inverted: Yes",
        "Level Assistant: No",
        "Speed Unit: mi/h",
        "Motor Pulley Teeth: 16",
        "Wheel Pulley Teeth: 36",
        "Wheel Diameter: 110 mm",
        "Motor Poles: 14",
        "BLE Connected: Yes",
    ] {
        line_tx.send(line.to_string()).unwrap();
    }
    drop(line_tx);
    task.await.unwrap();

    let config = mirror.snapshot();
    assert_eq!(config.firmware_version, "1.4.2");
    assert!(config.throttle_inverted);
    assert!(!config.level_assistant_enabled);
    assert_eq!(config.speed_unit, handlink::SpeedUnit::Mph);
    assert_eq!(config.motor_pulley_teeth, 16);
    assert_eq!(config.wheel_pulley_teeth, 36);
    assert_eq!(config.wheel_diameter_mm, 110);
    assert_eq!(config.motor_poles, 14);
    assert!(config.ble_connected);

    // Every mirror change produced a ConfigChanged snapshot; lines whose
    // values matched the defaults (level assistant, motor poles) did not.
    let snapshots = {
        let mut count = 0;
        while let Ok(event) = events_rx.try_recv() {
            if matches!(event, SessionEvent::ConfigChanged(_)) {
                count += 1;
            }
        }
        count
    };
    assert_eq!(snapshots, 7);
}

#[tokio::test]
async fn pid_parameter_block_updates_all_gains() {
    let mirror = ConfigMirror::new();
    let (line_tx, line_rx) = mpsc::unbounded_channel();
    let (events_tx, _events_rx) = mpsc::unbounded_channel();

    let task = spawn_processor(line_rx, mirror.clone(), events_tx);

    for line in [
        "=== Level Assistant PID Parameters ===",
        "Kp (Proportional): 1.20",
        "Ki (Integral): 0.60",
        "Kd (Derivative): 0.10",
        "Output Max: 52.0",
    ] {
        line_tx.send(line.to_string()).unwrap();
    }
    drop(line_tx);
    task.await.unwrap();

    let config = mirror.snapshot();
    assert_eq!(config.pid_kp, 1.2);
    assert_eq!(config.pid_ki, 0.6);
    assert_eq!(config.pid_kd, 0.1);
    assert_eq!(config.pid_output_max, 52.0);
}

#[tokio::test]
async fn malformed_payload_keeps_last_known_value() {
    let mirror = ConfigMirror::new();
    let (line_tx, line_rx) = mpsc::unbounded_channel();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();

    let task = spawn_processor(line_rx, mirror.clone(), events_tx);

    line_tx.send("Motor poles set to: 20".to_string()).unwrap();
    line_tx.send("Motor poles set to: garbage".to_string()).unwrap();
    drop(line_tx);
    task.await.unwrap();

    assert_eq!(mirror.snapshot().motor_poles, 20);

    // The malformed confirmation still reaches the sink.
    let mut logs = Vec::new();
    while let Ok(event) = events_rx.try_recv() {
        if let SessionEvent::Log(text) = event {
            logs.push(text);
        }
    }
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[1], "[OK] Motor poles set to: garbage");
}
