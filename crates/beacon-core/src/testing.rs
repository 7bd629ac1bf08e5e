//! Recording fakes for the device, radio, clock, delay and notify sink.

use alloc::vec::Vec;
use core::cell::Cell;

use embedded_hal_async::delay::DelayNs;

use crate::advertising::{Advertiser, AdvertisingPayload};
use crate::device::{Attribute, MotionDevice, TriggerKind};
use crate::error::{DeviceError, NotifyError, RadioError};
use crate::fixed_point::SensorValue;
use crate::telemetry::{NotifySink, Notifier};
use crate::time::Clock;

/// Accelerometer that returns a fixed reading and records every call.
#[derive(Debug, Default)]
pub struct FakeDevice {
    pub reading: [SensorValue; 3],
    pub attributes: Vec<(Attribute, SensorValue)>,
    pub armed: Option<TriggerKind>,
    pub arm_log: Vec<TriggerKind>,
    pub disarmed: Vec<TriggerKind>,
    pub fetch_calls: usize,
    pub attribute_error: Option<DeviceError>,
    pub trigger_error: Option<DeviceError>,
    failing_fetches: usize,
    fetch_error: Option<DeviceError>,
}

impl FakeDevice {
    pub fn with_reading(reading: [SensorValue; 3]) -> Self {
        Self {
            reading,
            ..Self::default()
        }
    }

    /// Make the next `count` fetches fail with `error`.
    pub fn fail_fetches(&mut self, count: usize, error: DeviceError) {
        self.failing_fetches = count;
        self.fetch_error = Some(error);
    }

    pub fn arm_calls_for(&self, trigger: TriggerKind) -> usize {
        self.arm_log.iter().filter(|&&t| t == trigger).count()
    }
}

impl MotionDevice for FakeDevice {
    async fn fetch_sample(&mut self) -> Result<(), DeviceError> {
        self.fetch_calls += 1;
        if self.failing_fetches > 0 {
            self.failing_fetches -= 1;
            if let Some(e) = self.fetch_error {
                return Err(e);
            }
        }
        Ok(())
    }

    fn read_acceleration(&mut self) -> [SensorValue; 3] {
        self.reading
    }

    async fn set_attribute(
        &mut self,
        attribute: Attribute,
        value: SensorValue,
    ) -> Result<(), DeviceError> {
        self.attributes.push((attribute, value));
        match self.attribute_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn arm_trigger(&mut self, trigger: TriggerKind) -> Result<(), DeviceError> {
        self.arm_log.push(trigger);
        if let Some(e) = self.trigger_error {
            return Err(e);
        }
        self.armed = Some(trigger);
        Ok(())
    }

    async fn disarm_trigger(&mut self, trigger: TriggerKind) -> Result<(), DeviceError> {
        self.disarmed.push(trigger);
        if let Some(e) = self.trigger_error {
            return Err(e);
        }
        if self.armed == Some(trigger) {
            self.armed = None;
        }
        Ok(())
    }
}

/// Advertiser that counts start and stop requests.
#[derive(Debug, Default)]
pub struct FakeRadio {
    pub starts: usize,
    pub stops: usize,
    pub advertising: bool,
    pub start_error: Option<RadioError>,
    pub stop_error: Option<RadioError>,
}

impl Advertiser for FakeRadio {
    async fn start_advertising(&mut self, _payload: &AdvertisingPayload) -> Result<(), RadioError> {
        self.starts += 1;
        match self.start_error {
            Some(e) => Err(e),
            None => {
                self.advertising = true;
                Ok(())
            }
        }
    }

    async fn stop_advertising(&mut self) -> Result<(), RadioError> {
        self.stops += 1;
        match self.stop_error {
            Some(e) => Err(e),
            None => {
                self.advertising = false;
                Ok(())
            }
        }
    }
}

/// Clock that advances by one tick on every read.
#[derive(Debug)]
pub struct FakeClock {
    next: Cell<u32>,
}

impl FakeClock {
    pub fn new(start: u32) -> Self {
        Self {
            next: Cell::new(start),
        }
    }
}

impl Clock for FakeClock {
    fn now_ticks(&self) -> u32 {
        let now = self.next.get();
        self.next.set(now.wrapping_add(1));
        now
    }
}

/// Delay that returns immediately and sums the requested time.
#[derive(Debug, Default)]
pub struct RecordingDelay {
    total_ns: u64,
}

impl RecordingDelay {
    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl DelayNs for RecordingDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}

/// Sink that keeps every payload it was asked to send.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub sent: Vec<Vec<u8>>,
    pub error: Option<NotifyError>,
}

impl NotifySink for RecordingSink {
    async fn notify(&mut self, payload: &[u8]) -> Result<(), NotifyError> {
        self.sent.push(payload.to_vec());
        match self.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Notifier that only counts invocations.
#[derive(Debug, Default)]
pub struct CountingNotifier {
    pub calls: usize,
}

impl Notifier for CountingNotifier {
    async fn notify(&mut self) {
        self.calls += 1;
    }
}
