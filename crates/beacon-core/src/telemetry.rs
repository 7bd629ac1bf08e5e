//! Periodic telemetry: heart rate and battery level
//!
//! Both values are simulated. They advance once per notification and are
//! pushed to whatever peer is subscribed through a [`NotifySink`]. A failed
//! push is logged and the value still advances, so the cadence never stalls.

use log::{debug, warn};

use crate::config::DeviceConfig;
use crate::error::{MotionError, NotifyError};

/// Heart rate the simulation starts from and wraps back to.
pub const HEART_RATE_MIN_BPM: u8 = 90;
/// Heart rate at which the simulation wraps.
pub const HEART_RATE_MAX_BPM: u8 = 160;

/// Measurement flags: sensor contact feature supported and contact detected.
pub const HRM_FLAGS_SENSOR_CONTACT: u8 = 0x06;

/// Full battery, where the simulation starts and wraps back to.
pub const BATTERY_FULL_PERCENT: u8 = 100;

/// Delivery of one characteristic value to subscribed peers.
pub trait NotifySink {
    fn notify(&mut self, payload: &[u8]) -> impl Future<Output = Result<(), NotifyError>>;
}

/// Something the tick coordinator fires once per tick.
pub trait Notifier {
    fn notify(&mut self) -> impl Future<Output = ()>;
}

/// Simulated heart rate service.
pub struct HeartRateService<S> {
    sink: S,
    bpm: u8,
}

impl<S: NotifySink> HeartRateService<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            bpm: HEART_RATE_MIN_BPM,
        }
    }

    /// Advance the simulated rate and return the measurement payload.
    pub fn next_measurement(&mut self) -> [u8; 2] {
        self.bpm += 1;
        if self.bpm >= HEART_RATE_MAX_BPM {
            self.bpm = HEART_RATE_MIN_BPM;
        }
        [HRM_FLAGS_SENSOR_CONTACT, self.bpm]
    }

    pub fn bpm(&self) -> u8 {
        self.bpm
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<S: NotifySink> Notifier for HeartRateService<S> {
    async fn notify(&mut self) {
        let measurement = self.next_measurement();
        debug!("Heart rate {} bpm", measurement[1]);
        if let Err(e) = self.sink.notify(&measurement).await {
            warn!("{}", MotionError::NotifyFailed { code: e.code });
        }
    }
}

/// Simulated battery service.
pub struct BatteryService<S> {
    sink: S,
    level: u8,
}

impl<S: NotifySink> BatteryService<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            level: BATTERY_FULL_PERCENT,
        }
    }

    /// Drain the simulated battery by one percent and return the new level.
    pub fn next_level(&mut self) -> u8 {
        self.level = self.level.saturating_sub(1);
        if self.level == 0 {
            self.level = BATTERY_FULL_PERCENT;
        }
        self.level
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<S: NotifySink> Notifier for BatteryService<S> {
    async fn notify(&mut self) {
        let level = self.next_level();
        debug!("Battery level {}%", level);
        if let Err(e) = self.sink.notify(&[level]).await {
            warn!("{}", MotionError::NotifyFailed { code: e.code });
        }
    }
}

/// Static device information, set once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInformation<'a> {
    pub model: &'a str,
    pub manufacturer: &'a str,
}

impl<'a> DeviceInformation<'a> {
    pub fn new(config: &DeviceConfig<'a>) -> Self {
        Self {
            model: config.model,
            manufacturer: config.manufacturer,
        }
    }
}
