//! Connection bookkeeping for the single peer this peripheral accepts.

use core::fmt::Debug;

use log::{info, warn};

/// HCI status for a successful operation.
pub const HCI_SUCCESS: u8 = 0x00;

/// Holds the reference to the current connection, if any.
///
/// A new connection overwrites the previous reference; a disconnect clears it
/// regardless of which handle it names. Independent of the motion controller.
#[derive(Debug)]
pub struct ConnectionTracker<H> {
    current: Option<H>,
}

impl<H> Default for ConnectionTracker<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> ConnectionTracker<H> {
    pub const fn new() -> Self {
        Self { current: None }
    }
}

impl<H: Debug> ConnectionTracker<H> {
    /// A connection attempt finished with `status`.
    pub fn connected(&mut self, handle: H, status: u8) {
        if status != HCI_SUCCESS {
            warn!("Connection failed (err {})", status);
            return;
        }

        info!("Connected {:?}", handle);
        if let Some(previous) = self.current.replace(handle) {
            warn!("Dropping reference to previous connection {:?}", previous);
        }
    }

    /// The link went down with `reason`.
    pub fn disconnected(&mut self, handle: &H, reason: impl Debug) {
        info!("Disconnected {:?} (reason {:?})", handle, reason);
        self.current = None;
    }

    /// The peer cancelled pairing. Informational only.
    pub fn auth_cancelled(&self, peer: impl Debug) {
        info!("Pairing cancelled: {:?}", peer);
    }

    pub fn current(&self) -> Option<&H> {
        self.current.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.current.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_connect_overwrites_first() {
        let mut tracker = ConnectionTracker::new();
        tracker.connected(1u16, HCI_SUCCESS);
        tracker.connected(2u16, HCI_SUCCESS);

        assert_eq!(tracker.current(), Some(&2));
    }

    #[test]
    fn disconnect_clears_and_repeats_are_noops() {
        let mut tracker = ConnectionTracker::new();
        tracker.connected(1u16, HCI_SUCCESS);
        tracker.connected(2u16, HCI_SUCCESS);

        tracker.disconnected(&2, 0x13);
        assert!(!tracker.is_connected());

        tracker.disconnected(&1, 0x13);
        assert!(tracker.current().is_none());
    }

    #[test]
    fn failed_connect_keeps_state() {
        let mut tracker = ConnectionTracker::new();
        tracker.connected(1u16, HCI_SUCCESS);
        tracker.connected(2u16, 0x3e);

        assert_eq!(tracker.current(), Some(&1));
    }

    #[test]
    fn auth_cancel_changes_nothing() {
        let mut tracker = ConnectionTracker::new();
        tracker.connected(7u16, HCI_SUCCESS);
        tracker.auth_cancelled("AA:BB:CC:DD:EE:FF (random)");

        assert_eq!(tracker.current(), Some(&7));
    }
}
