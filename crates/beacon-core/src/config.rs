use serde::{Deserialize, Serialize};

use crate::device::Axis;

/// Default advertised name when none is configured at build time.
pub const DEFAULT_DEVICE_NAME: &str = "Motion Beacon";

/// Accelerometer output data rate used when nothing else is configured.
pub const DEFAULT_OUTPUT_DATA_RATE_HZ: u16 = 50;

/// Runtime configuration for the peripheral.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
#[serde(bound(deserialize = "'de: 'a"))]
pub struct Config<'a> {
    pub device: DeviceConfig<'a>,
    pub motion: MotionConfig,
}

impl Default for Config<'_> {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            motion: MotionConfig::default(),
        }
    }
}

/// Identity strings exposed over the air.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct DeviceConfig<'a> {
    /// Complete local name in the scan response
    pub name: &'a str,
    /// Device information service: model number
    pub model: &'a str,
    /// Device information service: manufacturer name
    pub manufacturer: &'a str,
    /// Heart rate service body sensor location (0x01 = chest)
    pub body_sensor_location: u8,
}

impl Default for DeviceConfig<'_> {
    fn default() -> Self {
        Self {
            name: DEFAULT_DEVICE_NAME,
            model: "esp32s3",
            manufacturer: "Manufacturer",
            body_sensor_location: 0x01,
        }
    }
}

/// Motion detection and advertising window policy.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct MotionConfig {
    /// Accelerometer output data rate in Hz
    pub output_data_rate_hz: u16,
    /// Seconds the device stays connectable after motion
    pub advertising_window_secs: u8,
    /// Margin added to the baseline reading to form the slope threshold
    pub threshold_margin_percent: u8,
    /// Axis aligned with gravity in the mounting orientation
    pub gravity_axis: Axis,
}

impl MotionConfig {
    /// Whether a history of `capacity` samples covers exactly one second at
    /// the configured data rate.
    pub const fn history_holds_one_second(&self, capacity: usize) -> bool {
        self.output_data_rate_hz as usize == capacity
    }

    /// Time between two samples at the configured data rate.
    pub const fn sample_period_ms(&self) -> u32 {
        if self.output_data_rate_hz == 0 {
            return 1000;
        }
        1000 / self.output_data_rate_hz as u32
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            output_data_rate_hz: DEFAULT_OUTPUT_DATA_RATE_HZ,
            advertising_window_secs: 3,
            threshold_margin_percent: 10,
            gravity_axis: Axis::Z,
        }
    }
}
