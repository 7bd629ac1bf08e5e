//! Simulated radio, a central that connects while advertising, and GATT sinks
//! that log notifications.

use core::sync::atomic::{AtomicBool, Ordering};

use beacon_core::advertising::{Advertiser, AdvertisingPayload};
use beacon_core::connection::{ConnectionTracker, HCI_SUCCESS};
use beacon_core::error::{NotifyError, RadioError};
use beacon_core::telemetry::NotifySink;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};
use log::{debug, info};

/// HCI status a central reports when it gives up on a connection attempt.
const STATUS_CONN_FAILED_TO_ESTABLISH: u8 = 0x3e;
/// Remote user terminated connection.
const REASON_REMOTE_USER_TERMINATED: u8 = 0x13;

/// How long the central takes to find us after advertising starts.
const DISCOVERY_DELAY: Duration = Duration::from_millis(800);
/// How long the central stays connected.
const CONNECTION_LENGTH: Duration = Duration::from_secs(2);

static ADVERTISING: AtomicBool = AtomicBool::new(false);
static CONNECTED: AtomicBool = AtomicBool::new(false);
static ADVERTISING_STARTED: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Advertiser that prints the PDUs it would put on air.
#[derive(Debug, Default)]
pub struct SimRadio;

impl Advertiser for SimRadio {
    async fn start_advertising(&mut self, payload: &AdvertisingPayload) -> Result<(), RadioError> {
        info!("radio: ADV_IND {:02x?}", payload.advertising_data().as_slice());
        info!("radio: SCAN_RSP {:02x?}", payload.scan_response().as_slice());

        ADVERTISING.store(true, Ordering::Relaxed);
        ADVERTISING_STARTED.signal(());
        Ok(())
    }

    async fn stop_advertising(&mut self) -> Result<(), RadioError> {
        ADVERTISING.store(false, Ordering::Relaxed);
        Ok(())
    }
}

/// A central that connects every time we become discoverable.
///
/// Every third attempt fails to establish and every fourth connection cancels
/// pairing, so all tracker paths show up in the log.
pub async fn run_central() -> ! {
    let mut tracker = ConnectionTracker::<u16>::new();
    let mut attempts: u16 = 0;

    loop {
        ADVERTISING_STARTED.wait().await;
        Timer::after(DISCOVERY_DELAY).await;

        if !ADVERTISING.load(Ordering::Relaxed) {
            debug!("central: advertising ended before discovery");
            continue;
        }

        attempts = attempts.wrapping_add(1);
        let handle = attempts;

        if attempts % 3 == 0 {
            tracker.connected(handle, STATUS_CONN_FAILED_TO_ESTABLISH);
            continue;
        }

        // A connectable advertiser stops once a central connects
        ADVERTISING.store(false, Ordering::Relaxed);
        tracker.connected(handle, HCI_SUCCESS);
        CONNECTED.store(true, Ordering::Relaxed);

        if attempts % 4 == 0 {
            tracker.auth_cancelled("C0:FF:EE:00:00:01 (random)");
        }

        Timer::after(CONNECTION_LENGTH).await;

        CONNECTED.store(false, Ordering::Relaxed);
        tracker.disconnected(&handle, REASON_REMOTE_USER_TERMINATED);
    }
}

/// Notification sink for one characteristic.
pub struct LogSink {
    characteristic: &'static str,
}

impl LogSink {
    pub const fn new(characteristic: &'static str) -> Self {
        Self { characteristic }
    }
}

impl NotifySink for LogSink {
    async fn notify(&mut self, payload: &[u8]) -> Result<(), NotifyError> {
        if CONNECTED.load(Ordering::Relaxed) {
            info!("gatt: notify {} {:02x?}", self.characteristic, payload);
        } else {
            debug!("gatt: {} {:02x?}, no subscriber", self.characteristic, payload);
        }
        Ok(())
    }
}
