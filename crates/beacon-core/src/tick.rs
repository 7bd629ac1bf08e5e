//! The one-second control loop
//!
//! Every tick ages the advertising countdown and fires both telemetry
//! notifiers. Between ticks the loop drains the trigger queue into the motion
//! controller. This is the only task that touches controller state.
//!
//! Ticks that fall due while the loop is blocked (a recalibration, a slow
//! notify) are dropped rather than replayed, so telemetry never bursts.

use embassy_futures::select::{Either, select};
use embassy_time::{Duration, Instant, Timer};
use embedded_hal_async::delay::DelayNs;
use log::{debug, info};

use crate::advertising::Advertiser;
use crate::device::MotionDevice;
use crate::motion::MotionController;
use crate::telemetry::Notifier;
use crate::time::Clock;
use crate::trigger::{TriggerEvent, TriggerReceiver};

/// Tick period of the control loop.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// What the loop needs from the motion controller.
pub trait MotionControl {
    /// Advance the countdown. Returns `true` if the window closed.
    fn tick(&mut self) -> impl Future<Output = bool>;

    fn handle_trigger(&mut self, event: TriggerEvent) -> impl Future<Output = ()>;
}

impl<D, A, C, T, const N: usize> MotionControl for MotionController<D, A, C, T, N>
where
    D: MotionDevice,
    A: Advertiser,
    C: Clock,
    T: DelayNs,
{
    async fn tick(&mut self) -> bool {
        MotionController::tick(self).await
    }

    async fn handle_trigger(&mut self, event: TriggerEvent) {
        MotionController::handle_trigger(self, event).await
    }
}

/// Runs the periodic work and dispatches trigger events.
///
/// `motion` is `None` when no accelerometer was found at boot; the loop then
/// only emits telemetry.
pub struct TickCoordinator<M, V, P> {
    motion: Option<M>,
    vital_sign: V,
    power_level: P,
    ticks: u32,
}

impl<M, V, P> TickCoordinator<M, V, P>
where
    M: MotionControl,
    V: Notifier,
    P: Notifier,
{
    pub fn new(motion: Option<M>, vital_sign: V, power_level: P) -> Self {
        Self {
            motion,
            vital_sign,
            power_level,
            ticks: 0,
        }
    }

    /// One pass of periodic work.
    pub async fn tick(&mut self) {
        if let Some(motion) = self.motion.as_mut() {
            if motion.tick().await {
                info!("Advertising window closed, watching for motion");
            }
        }

        info!("--- {}) ---", self.ticks);
        self.ticks = self.ticks.wrapping_add(1);

        self.vital_sign.notify().await;
        self.power_level.notify().await;
    }

    /// Hand a trigger to the motion controller.
    pub async fn dispatch(&mut self, event: TriggerEvent) {
        match self.motion.as_mut() {
            Some(motion) => motion.handle_trigger(event).await,
            None => debug!("No motion controller, ignoring {:?}", event.kind),
        }
    }

    /// Run forever: tick every second, dispatch triggers in between.
    pub async fn run(&mut self, triggers: TriggerReceiver<'_>) -> ! {
        let mut deadline = Instant::now() + TICK_PERIOD;

        loop {
            match select(Timer::at(deadline), triggers.receive()).await {
                Either::First(()) => {
                    self.tick().await;
                    deadline = next_deadline(deadline, Instant::now());
                }
                Either::Second(event) => self.dispatch(event).await,
            }
        }
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn motion(&self) -> Option<&M> {
        self.motion.as_ref()
    }

    pub fn vital_sign(&self) -> &V {
        &self.vital_sign
    }

    pub fn power_level(&self) -> &P {
        &self.power_level
    }
}

/// First deadline after `now` on the tick grid through `last`.
fn next_deadline(last: Instant, now: Instant) -> Instant {
    let mut next = last + TICK_PERIOD;
    if next <= now {
        let missed = (now - next).as_ticks() / TICK_PERIOD.as_ticks() + 1;
        debug!("Control loop stalled, skipping {} tick(s)", missed);
        next += TICK_PERIOD * missed as u32;
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advertising::AdvertisingPayload;
    use crate::config::MotionConfig;
    use crate::device::TriggerKind;
    use crate::fixed_point::SensorValue;
    use crate::history::HISTORY_CAPACITY;
    use crate::motion::MotionState;
    use crate::testing::{CountingNotifier, FakeClock, FakeDevice, FakeRadio, RecordingDelay};
    use crate::trigger::TriggerChannel;
    use alloc::vec::Vec;
    use embassy_futures::block_on;

    type Controller =
        MotionController<FakeDevice, FakeRadio, FakeClock, RecordingDelay, HISTORY_CAPACITY>;
    type Coordinator = TickCoordinator<Controller, CountingNotifier, CountingNotifier>;

    fn coordinator() -> Coordinator {
        let mut controller = MotionController::new(
            FakeDevice::with_reading([SensorValue::ZERO, SensorValue::ZERO, SensorValue::from_int(9)]),
            FakeRadio::default(),
            FakeClock::new(0),
            RecordingDelay::default(),
            &MotionConfig::default(),
            AdvertisingPayload::new("test"),
        );
        block_on(controller.start());

        TickCoordinator::new(
            Some(controller),
            CountingNotifier::default(),
            CountingNotifier::default(),
        )
    }

    fn state(c: &Coordinator) -> Option<MotionState> {
        c.motion().map(|m| m.state())
    }

    #[test]
    fn telemetry_fires_once_per_tick_in_any_state() {
        let mut c = coordinator();

        block_on(c.tick());
        assert_eq!(state(&c), Some(MotionState::Watching));
        assert_eq!(c.vital_sign().calls, 1);
        assert_eq!(c.power_level().calls, 1);

        block_on(c.dispatch(TriggerEvent::new(TriggerKind::MotionDelta, 0)));
        assert_eq!(state(&c), Some(MotionState::Active));
        // Triggers never fire telemetry
        assert_eq!(c.vital_sign().calls, 1);

        for _ in 0..5 {
            block_on(c.tick());
        }

        assert_eq!(c.vital_sign().calls, 6);
        assert_eq!(c.power_level().calls, 6);
        assert_eq!(c.ticks(), 6);
    }

    #[test]
    fn countdown_expiry_reverts_through_tick() {
        let mut c = coordinator();
        block_on(c.dispatch(TriggerEvent::new(TriggerKind::MotionDelta, 0)));

        for _ in 0..3 {
            block_on(c.tick());
        }

        let motion = c.motion().expect("controller present");
        assert_eq!(motion.state(), MotionState::Watching);
        assert_eq!(motion.countdown(), 0);
        assert_eq!(motion.advertiser().stops, 1);
    }

    #[test]
    fn telemetry_only_without_accelerometer() {
        let mut c: Coordinator = TickCoordinator::new(
            None,
            CountingNotifier::default(),
            CountingNotifier::default(),
        );

        block_on(c.dispatch(TriggerEvent::new(TriggerKind::MotionDelta, 0)));
        block_on(c.tick());
        block_on(c.tick());

        assert!(c.motion().is_none());
        assert_eq!(c.vital_sign().calls, 2);
        assert_eq!(c.power_level().calls, 2);
    }

    /// Motion controller whose trigger handling blocks like a recalibration.
    struct StallingMotion {
        stall: Duration,
    }

    impl MotionControl for StallingMotion {
        async fn tick(&mut self) -> bool {
            false
        }

        async fn handle_trigger(&mut self, _event: TriggerEvent) {
            Timer::after(self.stall).await;
        }
    }

    /// Notifier that records when it fired.
    struct TimedNotifier {
        start: Instant,
        fired: Vec<Duration>,
    }

    impl Notifier for TimedNotifier {
        async fn notify(&mut self) {
            self.fired.push(self.start.elapsed());
        }
    }

    #[test]
    fn missed_ticks_are_not_replayed() {
        let start = Instant::now();
        let mut c = TickCoordinator::new(
            Some(StallingMotion {
                stall: Duration::from_millis(2500),
            }),
            TimedNotifier {
                start,
                fired: Vec::new(),
            },
            CountingNotifier::default(),
        );

        let channel = TriggerChannel::new();
        channel
            .try_send(TriggerEvent::new(TriggerKind::DataReady, 0))
            .expect("queue has room");

        let _ = block_on(select(
            c.run(channel.receiver()),
            Timer::after(Duration::from_millis(3300)),
        ));

        // One late tick when the stall ends, then back on the 1 s grid
        let fired = &c.vital_sign().fired;
        assert_eq!(fired.len(), 2, "fired at {:?}", fired);
        assert!(fired[1] - fired[0] >= Duration::from_millis(400));
        assert_eq!(c.power_level().calls, 2);
    }

    #[test]
    fn next_deadline_skips_missed_ticks() {
        let last = Instant::from_secs(1);

        assert_eq!(next_deadline(last, Instant::from_millis(1200)), Instant::from_secs(2));
        assert_eq!(next_deadline(last, Instant::from_millis(3500)), Instant::from_secs(4));
        assert_eq!(next_deadline(last, Instant::from_secs(2)), Instant::from_secs(3));
    }
}
