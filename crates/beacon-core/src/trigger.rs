//! Trigger events delivered from interrupt context to the control loop

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};

use crate::device::TriggerKind;

/// Queue depth for trigger events.
/// Data-ready fires every 20 ms at 50 Hz; 8 covers a full recalibration stall
/// of the consumer without dropping the transition-causing motion event.
pub const TRIGGER_CHANNEL_CAPACITY: usize = 8;

/// A trigger fired on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerEvent {
    pub kind: TriggerKind,
    /// Monotonic tick counter when the interrupt was observed
    pub ticks: u32,
}

impl TriggerEvent {
    pub const fn new(kind: TriggerKind, ticks: u32) -> Self {
        Self { kind, ticks }
    }
}

pub type TriggerChannel = Channel<CriticalSectionRawMutex, TriggerEvent, TRIGGER_CHANNEL_CAPACITY>;
pub type TriggerSender<'a> =
    Sender<'a, CriticalSectionRawMutex, TriggerEvent, TRIGGER_CHANNEL_CAPACITY>;
pub type TriggerReceiver<'a> =
    Receiver<'a, CriticalSectionRawMutex, TriggerEvent, TRIGGER_CHANNEL_CAPACITY>;

/// Global trigger queue
///
/// Interrupt-side tasks publish into it, the tick coordinator is the only
/// consumer.
pub static TRIGGER_CHANNEL: TriggerChannel = Channel::new();

/// Publish a trigger without blocking the interrupt side.
///
/// Returns `false` when the queue is full and the event was dropped.
pub fn raise(sender: &TriggerSender<'_>, event: TriggerEvent) -> bool {
    match sender.try_send(event) {
        Ok(()) => true,
        Err(_) => {
            log::warn!("Trigger queue full, dropping {:?}", event.kind);
            false
        }
    }
}

/// The trigger kind the device currently routes to its interrupt line.
///
/// Written by the driver when it arms or disarms, read by the interrupt side
/// to label the edge it saw.
pub struct ArmedTrigger {
    kind: Mutex<CriticalSectionRawMutex, Cell<Option<TriggerKind>>>,
}

impl ArmedTrigger {
    pub const fn new() -> Self {
        Self {
            kind: Mutex::new(Cell::new(None)),
        }
    }

    pub fn set(&self, kind: Option<TriggerKind>) {
        self.kind.lock(|k| k.set(kind));
    }

    pub fn get(&self) -> Option<TriggerKind> {
        self.kind.lock(|k| k.get())
    }
}

impl Default for ArmedTrigger {
    fn default() -> Self {
        Self::new()
    }
}

/// What the single interrupt line is currently wired to.
pub static ARMED_TRIGGER: ArmedTrigger = ArmedTrigger::new();

/// Interrupt edge seen: publish it as whichever trigger is armed.
///
/// Edges with nothing armed are spurious and ignored.
pub fn raise_armed(sender: &TriggerSender<'_>, armed: &ArmedTrigger, ticks: u32) -> bool {
    match armed.get() {
        Some(kind) => raise(sender, TriggerEvent::new(kind, ticks)),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_are_labelled_with_armed_trigger() {
        let channel = TriggerChannel::new();
        let sender = channel.sender();
        let armed = ArmedTrigger::new();

        assert!(!raise_armed(&sender, &armed, 1));

        armed.set(Some(TriggerKind::MotionDelta));
        assert!(raise_armed(&sender, &armed, 2));

        let event = channel.receiver().try_receive().ok();
        assert_eq!(event, Some(TriggerEvent::new(TriggerKind::MotionDelta, 2)));
    }

    #[test]
    fn raise_drops_when_full() {
        let channel = TriggerChannel::new();
        let sender = channel.sender();

        for n in 0..TRIGGER_CHANNEL_CAPACITY as u32 {
            assert!(raise(&sender, TriggerEvent::new(TriggerKind::DataReady, n)));
        }
        assert!(!raise(
            &sender,
            TriggerEvent::new(TriggerKind::MotionDelta, 99)
        ));

        let receiver = channel.receiver();
        assert_eq!(receiver.try_receive().ok().map(|e| e.ticks), Some(0));
    }
}
