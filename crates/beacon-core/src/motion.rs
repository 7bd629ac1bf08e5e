//! Motion-gated advertising state machine
//!
//! The controller has two modes:
//!
//! - **Watching**: low power. The motion-delta trigger is armed with a
//!   threshold calibrated from a baseline reading, advertising is off.
//! - **Active**: motion was seen. The data-ready trigger streams samples into
//!   history, the device advertises, and a countdown runs.
//!
//! ```text
//!             motion-delta
//!   Watching ─────────────▶ Active ──┐ data-ready: append sample
//!      ▲                      │  ◀───┘
//!      └──────────────────────┘
//!          countdown hits 0 (tick)
//! ```
//!
//! Device and radio failures are logged and the transition carries on as if
//! the call had succeeded. There is no rollback.

use embedded_hal_async::delay::DelayNs;
use log::{debug, error, info, warn};

use crate::advertising::{Advertiser, AdvertisingPayload};
use crate::calibration::{CalibrationReport, Calibrator, ThresholdSetting};
use crate::config::MotionConfig;
use crate::device::{Attribute, MotionDevice, TriggerKind};
use crate::error::{DeviceError, MotionError};
use crate::fixed_point::SensorValue;
use crate::history::{Sample, SampleHistory};
use crate::time::Clock;
use crate::trigger::TriggerEvent;

/// Operating mode of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionState {
    /// Motion trigger armed, not advertising
    Watching,
    /// Data-ready trigger armed, advertising, countdown running
    Active,
}

/// Seconds left in the current advertising window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdvertisingCountdown {
    remaining: u8,
}

/// Outcome of advancing the countdown by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Countdown {
    /// Not counting
    Idle,
    /// Still counting, with the seconds left
    Running(u8),
    /// Reached zero on this tick
    Expired,
}

impl AdvertisingCountdown {
    pub const fn new() -> Self {
        Self { remaining: 0 }
    }

    /// Start counting down from `secs`.
    pub fn arm(&mut self, secs: u8) {
        self.remaining = secs;
    }

    /// Advance by one second.
    pub fn tick(&mut self) -> Countdown {
        match self.remaining {
            0 => Countdown::Idle,
            1 => {
                self.remaining = 0;
                Countdown::Expired
            }
            n => {
                self.remaining = n - 1;
                Countdown::Running(self.remaining)
            }
        }
    }

    pub const fn remaining(&self) -> u8 {
        self.remaining
    }
}

/// Drives the accelerometer and the advertiser between the two modes.
///
/// Owns the sample history and the countdown. All methods are called from the
/// single control loop, so no field needs a lock.
pub struct MotionController<D, A, C, T, const N: usize> {
    device: D,
    advertiser: A,
    clock: C,
    delay: T,
    calibrator: Calibrator,
    payload: AdvertisingPayload,
    output_data_rate_hz: u16,
    advertising_window_secs: u8,
    state: MotionState,
    countdown: AdvertisingCountdown,
    history: SampleHistory<N>,
    threshold: Option<ThresholdSetting>,
}

impl<D, A, C, T, const N: usize> MotionController<D, A, C, T, N>
where
    D: MotionDevice,
    A: Advertiser,
    C: Clock,
    T: DelayNs,
{
    pub fn new(
        device: D,
        advertiser: A,
        clock: C,
        delay: T,
        config: &MotionConfig,
        payload: AdvertisingPayload,
    ) -> Self {
        if !config.history_holds_one_second(N) {
            warn!(
                "History holds {} samples but the output data rate is {} Hz",
                N, config.output_data_rate_hz
            );
        }

        Self {
            device,
            advertiser,
            clock,
            delay,
            calibrator: Calibrator::new(config),
            payload,
            output_data_rate_hz: config.output_data_rate_hz,
            // A zero window would never expire
            advertising_window_secs: config.advertising_window_secs.max(1),
            state: MotionState::Watching,
            countdown: AdvertisingCountdown::new(),
            history: SampleHistory::new(),
            threshold: None,
        }
    }

    /// Configure the sensor and enter Watching with a fresh threshold.
    pub async fn start(&mut self) -> CalibrationReport {
        info!("Starting motion watch at {} Hz", self.output_data_rate_hz);
        self.set_sampling_frequency().await;
        self.state = MotionState::Watching;
        self.recalibrate().await
    }

    /// React to a trigger delivered by the device.
    pub async fn handle_trigger(&mut self, event: TriggerEvent) {
        match (self.state, event.kind) {
            (MotionState::Watching, TriggerKind::MotionDelta) => {
                self.enter_active(event.ticks).await
            }
            (MotionState::Active, TriggerKind::DataReady) => self.record_sample(event.ticks).await,
            (state, kind) => {
                // Fired just before its trigger was disarmed
                debug!("Late {:?} trigger while {:?}, keeping sample", kind, state);
                self.record_sample(event.ticks).await;
            }
        }
    }

    /// Advance the advertising countdown by one second.
    ///
    /// When the window closes, the history is dumped to the log and the
    /// controller goes back to Watching. Returns `true` on that tick.
    pub async fn tick(&mut self) -> bool {
        if self.state != MotionState::Active {
            return false;
        }

        match self.countdown.tick() {
            Countdown::Expired => {
                self.dump_history();
                self.enter_watching().await;
                true
            }
            Countdown::Running(left) => {
                debug!("Advertising window: {}s left", left);
                false
            }
            Countdown::Idle => false,
        }
    }

    /// Watching → Active.
    async fn enter_active(&mut self, ticks: u32) {
        info!("--ANY MOTION--");

        if let Err(e) = self.device.disarm_trigger(TriggerKind::MotionDelta).await {
            log_error(MotionError::TriggerDisarmFailed {
                trigger: TriggerKind::MotionDelta,
                code: e.code(),
            });
        }

        self.record_sample(ticks).await;

        match self.advertiser.start_advertising(&self.payload).await {
            Ok(()) => info!("Advertising successfully STARTED"),
            Err(e) => log_error(MotionError::AdvertisingStartFailed { code: e.code }),
        }

        self.countdown.arm(self.advertising_window_secs);
        self.state = MotionState::Active;

        self.set_sampling_frequency().await;
        if let Err(e) = self.device.arm_trigger(TriggerKind::DataReady).await {
            log_error(MotionError::TriggerArmFailed {
                trigger: TriggerKind::DataReady,
                code: e.code(),
            });
        }
    }

    /// Active → Watching.
    async fn enter_watching(&mut self) {
        if let Err(e) = self.device.disarm_trigger(TriggerKind::DataReady).await {
            log_error(MotionError::TriggerDisarmFailed {
                trigger: TriggerKind::DataReady,
                code: e.code(),
            });
        }

        match self.advertiser.stop_advertising().await {
            Ok(()) => info!("Advertising successfully STOPPED"),
            Err(e) => log_error(MotionError::AdvertisingStopFailed { code: e.code }),
        }

        self.state = MotionState::Watching;
        self.recalibrate().await;
    }

    async fn recalibrate(&mut self) -> CalibrationReport {
        let report = self
            .calibrator
            .calibrate(&mut self.device, &self.clock, &mut self.delay)
            .await;

        if let Some(e) = report.error {
            log_error(e.into());
        }
        self.threshold = Some(report.setting);

        report
    }

    /// Fetch one reading and append it to history, stamped with the time the
    /// interrupt was observed.
    ///
    /// "No new data" still leaves the previous reading latched, so it is
    /// stored. Any other failure skips the sample.
    async fn record_sample(&mut self, timestamp: u32) {
        match self.device.fetch_sample().await {
            Ok(()) | Err(DeviceError::NoNewData) => {
                let axes = self.device.read_acceleration();
                self.history.append(Sample::new(timestamp, axes));
            }
            Err(e) => log_error(MotionError::FetchFailed { code: e.code() }),
        }
    }

    async fn set_sampling_frequency(&mut self) {
        let rate = SensorValue::from_int(i32::from(self.output_data_rate_hz));
        if let Err(e) = self
            .device
            .set_attribute(Attribute::SamplingFrequency, rate)
            .await
        {
            log_error(MotionError::AttributeSetFailed {
                attribute: Attribute::SamplingFrequency,
                code: e.code(),
            });
        }
    }

    fn dump_history(&self) {
        info!("History dump ({} samples):", self.history.len());
        for sample in self.history.snapshot() {
            info!("{}", sample);
        }
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    pub fn countdown(&self) -> u8 {
        self.countdown.remaining()
    }

    pub fn history(&self) -> &SampleHistory<N> {
        &self.history
    }

    /// Threshold currently programmed into the device.
    pub fn threshold(&self) -> Option<ThresholdSetting> {
        self.threshold
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn advertiser(&self) -> &A {
        &self.advertiser
    }

    #[cfg(test)]
    pub(crate) fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    #[cfg(test)]
    pub(crate) fn advertiser_mut(&mut self) -> &mut A {
        &mut self.advertiser
    }
}

fn log_error(e: MotionError) {
    error!("{}", e);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HISTORY_CAPACITY;
    use crate::testing::{FakeClock, FakeDevice, FakeRadio, RecordingDelay};
    use embassy_futures::block_on;

    type Controller = MotionController<FakeDevice, FakeRadio, FakeClock, RecordingDelay, HISTORY_CAPACITY>;

    fn controller() -> Controller {
        let device = FakeDevice::with_reading([
            SensorValue::ZERO,
            SensorValue::ZERO,
            SensorValue::new(9, 800_000),
        ]);
        MotionController::new(
            device,
            FakeRadio::default(),
            FakeClock::new(1000),
            RecordingDelay::default(),
            &MotionConfig::default(),
            AdvertisingPayload::new("test"),
        )
    }

    fn motion() -> TriggerEvent {
        TriggerEvent::new(TriggerKind::MotionDelta, 0)
    }

    fn data_ready() -> TriggerEvent {
        TriggerEvent::new(TriggerKind::DataReady, 0)
    }

    #[test]
    fn start_enters_watching_with_threshold() {
        let mut c = controller();
        let report = block_on(c.start());

        assert_eq!(c.state(), MotionState::Watching);
        assert_eq!(c.device().armed, Some(TriggerKind::MotionDelta));
        assert_eq!(c.threshold(), Some(report.setting));
        assert_eq!(
            report.setting.slope_threshold,
            SensorValue::new(10, 780_000)
        );
        assert_eq!(
            c.device().attributes[0],
            (Attribute::SamplingFrequency, SensorValue::from_int(50))
        );
    }

    #[test]
    fn motion_opens_advertising_window() {
        let mut c = controller();
        block_on(c.start());

        block_on(c.handle_trigger(motion()));

        assert_eq!(c.state(), MotionState::Active);
        assert_eq!(c.countdown(), 3);
        assert_eq!(c.device().armed, Some(TriggerKind::DataReady));
        assert_eq!(c.device().disarmed, [TriggerKind::MotionDelta]);
        assert_eq!(c.advertiser().starts, 1);
        assert_eq!(c.advertiser().stops, 0);
        assert_eq!(c.history().len(), 1);
    }

    #[test]
    fn data_ready_appends_while_active() {
        let mut c = controller();
        block_on(c.start());
        block_on(c.handle_trigger(motion()));

        for _ in 0..10 {
            block_on(c.handle_trigger(data_ready()));
        }

        assert_eq!(c.history().len(), 11);
        assert_eq!(c.state(), MotionState::Active);
        assert_eq!(c.advertiser().starts, 1);
    }

    #[test]
    fn window_closes_after_countdown() {
        let mut c = controller();
        block_on(c.start());
        block_on(c.handle_trigger(motion()));
        let fetches_before = c.device().fetch_calls;

        assert!(!block_on(c.tick()));
        assert!(!block_on(c.tick()));
        assert_eq!(c.countdown(), 1);
        assert_eq!(c.state(), MotionState::Active);

        assert!(block_on(c.tick()));

        assert_eq!(c.countdown(), 0);
        assert_eq!(c.state(), MotionState::Watching);
        assert_eq!(c.advertiser().stops, 1);
        assert_eq!(c.device().armed, Some(TriggerKind::MotionDelta));
        assert_eq!(
            c.device().disarmed,
            [TriggerKind::MotionDelta, TriggerKind::DataReady]
        );
        // Recalibration fetched a new baseline
        assert_eq!(c.device().fetch_calls, fetches_before + 1);
        assert_eq!(c.device().arm_calls_for(TriggerKind::MotionDelta), 2);
    }

    #[test]
    fn tick_while_watching_does_nothing() {
        let mut c = controller();
        block_on(c.start());

        assert!(!block_on(c.tick()));
        assert_eq!(c.state(), MotionState::Watching);
        assert_eq!(c.advertiser().stops, 0);
    }

    #[test]
    fn recalibration_uses_new_baseline() {
        let mut c = controller();
        block_on(c.start());
        block_on(c.handle_trigger(motion()));

        c.device_mut().reading = [SensorValue::ZERO, SensorValue::ZERO, SensorValue::new(0, 950_000)];
        for _ in 0..3 {
            block_on(c.tick());
        }

        assert_eq!(
            c.threshold().map(|t| t.slope_threshold),
            Some(SensorValue::new(1, 45_000))
        );
    }

    #[test]
    fn device_failures_do_not_block_transition() {
        let mut c = controller();
        block_on(c.start());
        {
            let device = c.device_mut();
            device.trigger_error = Some(DeviceError::Io(-5));
            device.fail_fetches(1, DeviceError::Io(-5));
        }
        c.advertiser_mut().start_error = Some(crate::error::RadioError::new(-12));

        block_on(c.handle_trigger(motion()));

        assert_eq!(c.state(), MotionState::Active);
        assert_eq!(c.countdown(), 3);
        assert_eq!(c.advertiser().starts, 1);
        // The failed fetch is skipped, not stored
        assert_eq!(c.history().len(), 0);
    }

    #[test]
    fn no_new_data_keeps_stale_sample() {
        let mut c = controller();
        block_on(c.start());
        c.device_mut().fail_fetches(1, DeviceError::NoNewData);

        block_on(c.handle_trigger(motion()));

        assert_eq!(c.history().len(), 1);
        assert_eq!(
            c.history().latest().map(|s| s.axes[2]),
            Some(SensorValue::new(9, 800_000))
        );
    }

    #[test]
    fn late_triggers_are_stale_writes() {
        let mut c = controller();
        block_on(c.start());

        // Data-ready left over from a previous window
        block_on(c.handle_trigger(data_ready()));
        assert_eq!(c.state(), MotionState::Watching);
        assert_eq!(c.history().len(), 1);

        block_on(c.handle_trigger(motion()));
        // Motion-delta that raced the disarm
        block_on(c.handle_trigger(motion()));

        assert_eq!(c.state(), MotionState::Active);
        assert_eq!(c.advertiser().starts, 1);
        assert_eq!(c.history().len(), 3);
    }

    #[test]
    fn samples_are_stamped_with_interrupt_time() {
        let mut c = controller();
        block_on(c.start());

        // Queued behind a stall, dispatched well after they fired
        block_on(c.handle_trigger(TriggerEvent::new(TriggerKind::MotionDelta, 40)));
        block_on(c.handle_trigger(TriggerEvent::new(TriggerKind::DataReady, 60)));
        block_on(c.handle_trigger(TriggerEvent::new(TriggerKind::DataReady, 80)));

        let stamps: alloc::vec::Vec<u32> = c.history().snapshot().map(|s| s.timestamp).collect();
        assert_eq!(stamps, [40, 60, 80]);
    }

    #[test]
    fn zero_window_still_closes_on_next_tick() {
        let config = MotionConfig {
            advertising_window_secs: 0,
            ..MotionConfig::default()
        };
        let mut c: Controller = MotionController::new(
            FakeDevice::with_reading([SensorValue::ZERO, SensorValue::ZERO, SensorValue::from_int(9)]),
            FakeRadio::default(),
            FakeClock::new(0),
            RecordingDelay::default(),
            &config,
            AdvertisingPayload::new("test"),
        );
        block_on(c.start());
        block_on(c.handle_trigger(motion()));
        assert_eq!(c.countdown(), 1);

        assert!(block_on(c.tick()));
        assert_eq!(c.state(), MotionState::Watching);
        assert_eq!(c.advertiser().stops, 1);
    }

    #[test]
    fn countdown_tick_sequence() {
        let mut countdown = AdvertisingCountdown::new();
        assert_eq!(countdown.tick(), Countdown::Idle);

        countdown.arm(2);
        assert_eq!(countdown.tick(), Countdown::Running(1));
        assert_eq!(countdown.tick(), Countdown::Expired);
        assert_eq!(countdown.tick(), Countdown::Idle);
    }
}
