//! Error types for the motion controller and its collaborators
//!
//! None of these are fatal. Callers log them with their numeric code and move
//! on to the next step.

use thiserror_no_std::Error;

use crate::device::{Attribute, TriggerKind};

/// Failure reported by the accelerometer driver.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// The fetch completed but the sensor had no new data; the previous
    /// reading is still readable.
    #[error("no new data")]
    NoNewData,
    /// Bus or driver failure with its error code.
    #[error("I/O error {0}")]
    Io(i32),
}

impl DeviceError {
    /// Numeric cause, errno style.
    pub const fn code(&self) -> i32 {
        match self {
            // EBADMSG
            Self::NoNewData => -74,
            Self::Io(code) => *code,
        }
    }
}

/// Failure reported by the wireless stack.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("radio error {code}")]
pub struct RadioError {
    pub code: i32,
}

impl RadioError {
    pub const fn new(code: i32) -> Self {
        Self { code }
    }
}

/// Failure to push a notification to a connected peer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("notify error {code}")]
pub struct NotifyError {
    pub code: i32,
}

impl NotifyError {
    pub const fn new(code: i32) -> Self {
        Self { code }
    }
}

/// Everything that can go wrong while driving the motion state machine.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionError {
    #[error("accelerometer not available")]
    DeviceUnavailable,
    #[error("setting {attribute:?} failed (err {code})")]
    AttributeSetFailed { attribute: Attribute, code: i32 },
    #[error("arming {trigger:?} trigger failed (err {code})")]
    TriggerArmFailed { trigger: TriggerKind, code: i32 },
    #[error("disarming {trigger:?} trigger failed (err {code})")]
    TriggerDisarmFailed { trigger: TriggerKind, code: i32 },
    #[error("sample fetch failed (err {code})")]
    FetchFailed { code: i32 },
    #[error("advertising failed to start (err {code})")]
    AdvertisingStartFailed { code: i32 },
    #[error("advertising failed to stop (err {code})")]
    AdvertisingStopFailed { code: i32 },
    #[error("calibration failed: {0}")]
    CalibrationFailed(CalibrationError),
    #[error("notification failed (err {code})")]
    NotifyFailed { code: i32 },
}

/// The step of calibration that failed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("setting {attribute:?} failed (err {code})")]
    AttributeSetFailed { attribute: Attribute, code: i32 },
    #[error("arming motion trigger failed (err {code})")]
    TriggerArmFailed { code: i32 },
}

impl From<CalibrationError> for MotionError {
    fn from(value: CalibrationError) -> Self {
        Self::CalibrationFailed(value)
    }
}
