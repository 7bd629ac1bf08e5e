//! Accelerometer interface consumed by the motion controller
//!
//! The driver is treated as an opaque device: fetch a sample, read the
//! acceleration channel, set an attribute, arm or disarm a trigger. Trigger
//! interrupts are not delivered through callbacks; the platform pushes a
//! [`TriggerEvent`] onto [`crate::trigger::TRIGGER_CHANNEL`] instead.

use serde::{Deserialize, Serialize};

use crate::error::DeviceError;
use crate::fixed_point::SensorValue;

/// Driver attributes the controller writes on the acceleration channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    /// Output data rate in Hz
    SamplingFrequency,
    /// Acceleration delta that fires the motion trigger (m/s²)
    SlopeThreshold,
    /// Number of samples past threshold before the motion trigger fires
    SlopeDuration,
}

/// The two trigger sources. At most one is armed at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// A new sample is available
    DataReady,
    /// Acceleration moved past the configured slope threshold
    MotionDelta,
}

/// Axis of the accelerometer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }
}

/// Trait for the accelerometer driver.
///
/// Mirrors the sensor-channel model of the driver: `fetch_sample` latches a
/// reading inside the device and `read_acceleration` returns the latched
/// values.
pub trait MotionDevice {
    /// Latch a new reading.
    fn fetch_sample(&mut self) -> impl Future<Output = Result<(), DeviceError>>;

    /// X, Y and Z acceleration of the last latched reading.
    fn read_acceleration(&mut self) -> [SensorValue; 3];

    /// Write a driver attribute on the acceleration channel.
    fn set_attribute(
        &mut self,
        attribute: Attribute,
        value: SensorValue,
    ) -> impl Future<Output = Result<(), DeviceError>>;

    /// Enable interrupts for `trigger`.
    fn arm_trigger(&mut self, trigger: TriggerKind)
    -> impl Future<Output = Result<(), DeviceError>>;

    /// Disable interrupts for `trigger`.
    fn disarm_trigger(
        &mut self,
        trigger: TriggerKind,
    ) -> impl Future<Output = Result<(), DeviceError>>;
}
