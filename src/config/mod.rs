use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

/// Speed display unit reported by the device.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SpeedUnit {
    #[serde(rename = "km/h")]
    Kmh,
    #[serde(rename = "mi/h")]
    Mph,
}

/// Client-side cached device configuration. Values may be stale until a
/// confirming response line arrives; `firmware_version` stays `"Unknown"`
/// until the device reports one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    pub throttle_inverted: bool,
    pub level_assistant_enabled: bool,
    pub speed_unit: SpeedUnit,
    pub motor_pulley_teeth: u8,
    pub wheel_pulley_teeth: u8,
    pub wheel_diameter_mm: u8,
    pub motor_poles: u8,
    pub ble_connected: bool,
    pub firmware_version: String,
    pub pid_kp: f32,
    pub pid_ki: f32,
    pub pid_kd: f32,
    pub pid_output_max: f32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        // Factory defaults of the shipped hand controller firmware.
        Self {
            throttle_inverted: false,
            level_assistant_enabled: false,
            speed_unit: SpeedUnit::Kmh,
            motor_pulley_teeth: 15,
            wheel_pulley_teeth: 33,
            wheel_diameter_mm: 115,
            motor_poles: 14,
            ble_connected: false,
            firmware_version: "Unknown".to_string(),
            pid_kp: 0.8,
            pid_ki: 0.5,
            pid_kd: 0.05,
            pid_output_max: 48.0,
        }
    }
}

/// One mirror field change extracted from a classified response line.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigUpdate {
    ThrottleInverted(bool),
    LevelAssistant(bool),
    SpeedUnit(SpeedUnit),
    MotorPulleyTeeth(u8),
    WheelPulleyTeeth(u8),
    WheelDiameterMm(u8),
    MotorPoles(u8),
    BleConnected(bool),
    FirmwareVersion(String),
    PidKp(f32),
    PidKi(f32),
    PidKd(f32),
    PidOutputMax(f32),
}

/// Shared configuration mirror. Single writer (the response processor),
/// many readers; whole-struct snapshots prevent torn multi-field reads.
/// The mirror deliberately survives reconnects so the last known device
/// state stays visible while the link is down.
#[derive(Clone)]
pub struct ConfigMirror {
    inner: Arc<RwLock<DeviceConfig>>,
}

impl ConfigMirror {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(DeviceConfig::default())),
        }
    }

    pub fn snapshot(&self) -> DeviceConfig {
        self.inner.read().unwrap().clone()
    }

    pub fn firmware_version(&self) -> String {
        self.inner.read().unwrap().firmware_version.clone()
    }

    /// Apply one field update; returns whether the stored value changed.
    pub fn apply(&self, update: ConfigUpdate) -> bool {
        let mut config = self.inner.write().unwrap();
        match update {
            ConfigUpdate::ThrottleInverted(v) => set(&mut config.throttle_inverted, v),
            ConfigUpdate::LevelAssistant(v) => set(&mut config.level_assistant_enabled, v),
            ConfigUpdate::SpeedUnit(v) => set(&mut config.speed_unit, v),
            ConfigUpdate::MotorPulleyTeeth(v) => set(&mut config.motor_pulley_teeth, v),
            ConfigUpdate::WheelPulleyTeeth(v) => set(&mut config.wheel_pulley_teeth, v),
            ConfigUpdate::WheelDiameterMm(v) => set(&mut config.wheel_diameter_mm, v),
            ConfigUpdate::MotorPoles(v) => set(&mut config.motor_poles, v),
            ConfigUpdate::BleConnected(v) => set(&mut config.ble_connected, v),
            ConfigUpdate::FirmwareVersion(v) => set(&mut config.firmware_version, v),
            ConfigUpdate::PidKp(v) => set(&mut config.pid_kp, v),
            ConfigUpdate::PidKi(v) => set(&mut config.pid_ki, v),
            ConfigUpdate::PidKd(v) => set(&mut config.pid_kd, v),
            ConfigUpdate::PidOutputMax(v) => set(&mut config.pid_output_max, v),
        }
    }
}

fn set<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot != value {
        *slot = value;
        true
    } else {
        false
    }
}

impl Default for ConfigMirror {
    fn default() -> Self {
        Self::new()
    }
}
