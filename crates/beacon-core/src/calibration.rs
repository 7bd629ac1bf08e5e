//! Motion threshold calibration
//!
//! The slope threshold is not a fixed constant: every time the device goes
//! back to watching for motion, one baseline reading is taken and the
//! gravity-aligned axis plus a margin becomes the new threshold. The trigger
//! duration is forced to its minimum so the first sample past the threshold
//! fires.

use embedded_hal_async::delay::DelayNs;
use log::{error, info, warn};

use crate::config::MotionConfig;
use crate::device::{Attribute, Axis, MotionDevice, TriggerKind};
use crate::error::CalibrationError;
use crate::fixed_point::SensorValue;
use crate::history::Sample;
use crate::time::Clock;

/// Shortest slope duration the driver accepts: fire on the first sample.
pub const MIN_SLOPE_DURATION: SensorValue = SensorValue::from_int(1);

/// Motion trigger configuration derived from one baseline reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdSetting {
    pub slope_threshold: SensorValue,
    pub slope_duration: SensorValue,
}

impl ThresholdSetting {
    /// Threshold for `baseline`: `axis` plus `margin_percent`, minimum duration.
    pub fn from_baseline(baseline: &[SensorValue; 3], axis: Axis, margin_percent: u8) -> Self {
        Self {
            slope_threshold: baseline[axis.index()].with_margin_percent(margin_percent),
            slope_duration: MIN_SLOPE_DURATION,
        }
    }
}

/// Result of one calibration run.
///
/// Calibration never aborts halfway: the threshold is always computed and
/// every device step is attempted. `error` holds the first step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationReport {
    pub baseline: Sample,
    pub setting: ThresholdSetting,
    /// Fetch attempts needed before a reading came back
    pub attempts: u32,
    pub error: Option<CalibrationError>,
}

/// Derives and applies the motion threshold.
#[derive(Debug, Clone, Copy)]
pub struct Calibrator {
    axis: Axis,
    margin_percent: u8,
    sample_period_ms: u32,
    output_data_rate_hz: u16,
}

impl Calibrator {
    pub const fn new(config: &MotionConfig) -> Self {
        Self {
            axis: config.gravity_axis,
            margin_percent: config.threshold_margin_percent,
            sample_period_ms: config.sample_period_ms(),
            output_data_rate_hz: config.output_data_rate_hz,
        }
    }

    /// Take a baseline reading, program the threshold and arm the motion
    /// trigger.
    ///
    /// Fetching retries every sample period until the device answers. There
    /// is no upper bound: a sensor that never responds stalls here.
    pub async fn calibrate<D, C, T>(
        &self,
        device: &mut D,
        clock: &C,
        delay: &mut T,
    ) -> CalibrationReport
    where
        D: MotionDevice,
        C: Clock,
        T: DelayNs,
    {
        let attempts = self.wait_for_sample(device, delay).await;

        let baseline = Sample::new(clock.now_ticks(), device.read_acceleration());
        info!("Baseline {} ({} attempts)", baseline, attempts);

        let setting =
            ThresholdSetting::from_baseline(&baseline.axes, self.axis, self.margin_percent);
        info!(
            "Motion threshold {} m/s^2, duration {}",
            setting.slope_threshold, setting.slope_duration
        );

        let mut first_error = None;
        let mut record = |e: CalibrationError| {
            error!("Calibration step failed: {}", e);
            if first_error.is_none() {
                first_error = Some(e);
            }
        };

        for (attribute, value) in [
            (Attribute::SlopeThreshold, setting.slope_threshold),
            (Attribute::SlopeDuration, setting.slope_duration),
        ] {
            if let Err(e) = device.set_attribute(attribute, value).await {
                record(CalibrationError::AttributeSetFailed {
                    attribute,
                    code: e.code(),
                });
            }
        }

        if let Err(e) = device.arm_trigger(TriggerKind::MotionDelta).await {
            record(CalibrationError::TriggerArmFailed { code: e.code() });
        }

        CalibrationReport {
            baseline,
            setting,
            attempts,
            error: first_error,
        }
    }

    /// Fetch until the device returns a reading. Returns the attempt count.
    async fn wait_for_sample<D, T>(&self, device: &mut D, delay: &mut T) -> u32
    where
        D: MotionDevice,
        T: DelayNs,
    {
        let warn_every = u32::from(self.output_data_rate_hz.max(1));
        let mut attempts = 0u32;

        loop {
            attempts = attempts.wrapping_add(1);
            let result = device.fetch_sample().await;
            delay.delay_ms(self.sample_period_ms).await;

            match result {
                Ok(()) => return attempts,
                Err(e) => {
                    if attempts % warn_every == 0 {
                        warn!(
                            "Still waiting for a baseline sample after {} attempts (last err {})",
                            attempts,
                            e.code()
                        );
                    }
                }
            }
        }
    }
}
