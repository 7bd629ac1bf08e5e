//! Simulated accelerometer
//!
//! A device lying flat with gravity on Z that gets picked up and shaken at a
//! fixed interval. The generator produces one reading per sample period and
//! fires whichever trigger the controller has armed, the same way the real
//! part pulses its interrupt line.

use core::cell::RefCell;
use core::f64::consts::TAU;

use beacon_core::device::{Attribute, MotionDevice, TriggerKind};
use beacon_core::error::DeviceError;
use beacon_core::fixed_point::SensorValue;
use beacon_core::time::{Clock, EmbassyClock};
use beacon_core::trigger::{ARMED_TRIGGER, TriggerSender, raise_armed};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{Duration, Instant, Timer};
use log::debug;

/// Standard gravity in m/s².
const GRAVITY: f64 = 9.80665;

/// Time between two shakes.
const SHAKE_INTERVAL: Duration = Duration::from_secs(12);
/// How long each shake lasts.
const SHAKE_LENGTH: Duration = Duration::from_millis(400);
/// Shake frequency in Hz.
const SHAKE_HZ: f64 = 6.0;

/// State shared between the generator and the driver side.
pub struct SimWorld {
    reading: [SensorValue; 3],
    fresh: bool,
    output_data_rate_hz: u16,
    threshold: Option<SensorValue>,
}

pub type SharedWorld = Mutex<CriticalSectionRawMutex, RefCell<SimWorld>>;

pub static WORLD: SharedWorld = Mutex::new(RefCell::new(SimWorld {
    reading: [SensorValue::ZERO; 3],
    fresh: false,
    output_data_rate_hz: 0,
    threshold: None,
}));

fn to_sensor_value(value: f64) -> SensorValue {
    SensorValue::from_micros((value * 1_000_000.0).round() as i64)
}

/// Acceleration at `secs` since the simulation started.
fn acceleration_at(secs: f64) -> [f64; 3] {
    let cycle = secs % SHAKE_INTERVAL.as_secs() as f64;
    let shake_start = (SHAKE_INTERVAL - SHAKE_LENGTH).as_millis() as f64 / 1000.0;
    let shaking = cycle >= shake_start;

    // Resting wobble stays far below the calibrated margin
    let wobble = 0.02 * (secs * 3.1).sin();

    if shaking {
        let phase = TAU * SHAKE_HZ * secs;
        [
            2.5 * phase.sin(),
            1.2 * phase.cos(),
            GRAVITY + 4.0 * phase.sin() + wobble,
        ]
    } else {
        [0.01 * (secs * 1.7).cos(), wobble, GRAVITY + wobble]
    }
}

/// Produce readings forever and pulse the armed trigger.
pub async fn run_generator(world: &SharedWorld, sender: TriggerSender<'_>) -> ! {
    let start = Instant::now();
    let clock = EmbassyClock;

    loop {
        let rate = world.lock(|w| w.borrow().output_data_rate_hz).max(1);
        Timer::after(Duration::from_hz(u64::from(rate))).await;

        let secs = start.elapsed().as_micros() as f64 / 1_000_000.0;
        let reading = acceleration_at(secs).map(to_sensor_value);

        let threshold = world.lock(|w| {
            let mut w = w.borrow_mut();
            w.reading = reading;
            w.fresh = true;
            w.threshold
        });

        let fire = match ARMED_TRIGGER.get() {
            Some(TriggerKind::DataReady) => true,
            Some(TriggerKind::MotionDelta) => threshold.is_some_and(|t| {
                reading
                    .iter()
                    .any(|a| a.as_micros().abs() > t.as_micros().abs())
            }),
            None => false,
        };

        if fire {
            raise_armed(&sender, &ARMED_TRIGGER, clock.now_ticks());
        }
    }
}

/// Driver side of the simulated part.
pub struct SimAccelerometer<'a> {
    world: &'a SharedWorld,
    latched: [SensorValue; 3],
}

impl<'a> SimAccelerometer<'a> {
    pub fn new(world: &'a SharedWorld) -> Self {
        Self {
            world,
            latched: [SensorValue::ZERO; 3],
        }
    }
}

impl MotionDevice for SimAccelerometer<'_> {
    async fn fetch_sample(&mut self) -> Result<(), DeviceError> {
        let (reading, fresh) = self.world.lock(|w| {
            let mut w = w.borrow_mut();
            let fresh = w.fresh;
            w.fresh = false;
            (w.reading, fresh)
        });

        self.latched = reading;
        if fresh {
            Ok(())
        } else {
            Err(DeviceError::NoNewData)
        }
    }

    fn read_acceleration(&mut self) -> [SensorValue; 3] {
        self.latched
    }

    async fn set_attribute(
        &mut self,
        attribute: Attribute,
        value: SensorValue,
    ) -> Result<(), DeviceError> {
        debug!("sim accel: {:?} = {}", attribute, value);
        self.world.lock(|w| {
            let mut w = w.borrow_mut();
            match attribute {
                Attribute::SamplingFrequency => {
                    w.output_data_rate_hz =
                        u16::try_from(value.integer).map_err(|_| DeviceError::Io(-22))?;
                }
                Attribute::SlopeThreshold => w.threshold = Some(value),
                Attribute::SlopeDuration => {}
            }
            Ok(())
        })
    }

    async fn arm_trigger(&mut self, trigger: TriggerKind) -> Result<(), DeviceError> {
        ARMED_TRIGGER.set(Some(trigger));
        Ok(())
    }

    async fn disarm_trigger(&mut self, trigger: TriggerKind) -> Result<(), DeviceError> {
        if ARMED_TRIGGER.get() == Some(trigger) {
            ARMED_TRIGGER.set(None);
        }
        Ok(())
    }
}
