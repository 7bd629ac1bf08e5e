//! BLE peripheral on the ESP32-S3 radio
//!
//! The GATT server exposes heart rate, battery and device information. The
//! control loop never touches the host stack directly: advertising is
//! requested through [`ADVERTISING_COMMAND`] and notifications travel through
//! [`NOTIFICATIONS`], both consumed here.

use core::sync::atomic::{AtomicBool, Ordering};

use beacon_core::advertising::{Advertiser, AdvertisingPayload};
use beacon_core::config::Config;
use beacon_core::connection::{ConnectionTracker, HCI_SUCCESS};
use beacon_core::error::{NotifyError, RadioError};
use beacon_core::telemetry::{BATTERY_FULL_PERCENT, DeviceInformation, NotifySink};
use embassy_futures::join::join;
use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use log::{debug, error, info, warn};
use trouble_host::prelude::*;

/// Max number of connections
const CONNECTIONS_MAX: usize = 1;

/// Max number of L2CAP channels (signalling + ATT).
const L2CAP_CHANNELS_MAX: usize = 2;

const NOTIFICATION_QUEUE_LEN: usize = 4;

// errno values reported through NotifyError
const ENOMEM: i32 = -12;
const EINVAL: i32 = -22;

type Pool = DefaultPacketPool;

#[gatt_server]
pub struct Server {
    heart_rate: HeartRateService,
    battery: BatteryService,
    device_info: DeviceInfoService,
}

#[gatt_service(uuid = service::HEART_RATE)]
pub struct HeartRateService {
    #[characteristic(uuid = characteristic::HEART_RATE_MEASUREMENT, notify)]
    measurement: [u8; 2],
    #[characteristic(uuid = characteristic::BODY_SENSOR_LOCATION, read)]
    body_sensor_location: u8,
}

#[gatt_service(uuid = service::BATTERY)]
pub struct BatteryService {
    #[characteristic(uuid = characteristic::BATTERY_LEVEL, read, notify, value = BATTERY_FULL_PERCENT)]
    level: u8,
}

#[gatt_service(uuid = service::DEVICE_INFORMATION)]
pub struct DeviceInfoService {
    #[characteristic(uuid = characteristic::MANUFACTURER_NAME_STRING, read)]
    manufacturer: &'static str,
    #[characteristic(uuid = characteristic::MODEL_NUMBER_STRING, read)]
    model: &'static str,
}

/// Request from the control loop to the BLE task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertisingCommand {
    Start,
    Stop,
}

/// One characteristic value to push to the connected peer.
#[derive(Debug, Clone, Copy)]
pub enum Notification {
    HeartRate([u8; 2]),
    Battery(u8),
}

/// Latest advertising request. A newer one replaces an unhandled older one.
pub static ADVERTISING_COMMAND: Signal<CriticalSectionRawMutex, AdvertisingCommand> =
    Signal::new();

pub static NOTIFICATIONS: Channel<CriticalSectionRawMutex, Notification, NOTIFICATION_QUEUE_LEN> =
    Channel::new();

static CONNECTED: AtomicBool = AtomicBool::new(false);

/// [`Advertiser`] handed to the motion controller.
///
/// Requests are queued for the BLE task, so they always succeed here; stack
/// failures are logged where they happen.
#[derive(Debug, Default)]
pub struct BleAdvertiser;

impl Advertiser for BleAdvertiser {
    async fn start_advertising(&mut self, _payload: &AdvertisingPayload) -> Result<(), RadioError> {
        ADVERTISING_COMMAND.signal(AdvertisingCommand::Start);
        Ok(())
    }

    async fn stop_advertising(&mut self) -> Result<(), RadioError> {
        ADVERTISING_COMMAND.signal(AdvertisingCommand::Stop);
        Ok(())
    }
}

/// Which characteristic a [`GattSink`] feeds.
#[derive(Debug, Clone, Copy)]
enum Characteristic {
    HeartRate,
    Battery,
}

/// [`NotifySink`] that forwards values to the BLE task.
#[derive(Debug)]
pub struct GattSink {
    characteristic: Characteristic,
}

impl GattSink {
    pub const fn heart_rate() -> Self {
        Self {
            characteristic: Characteristic::HeartRate,
        }
    }

    pub const fn battery() -> Self {
        Self {
            characteristic: Characteristic::Battery,
        }
    }
}

impl NotifySink for GattSink {
    async fn notify(&mut self, payload: &[u8]) -> Result<(), NotifyError> {
        if !CONNECTED.load(Ordering::Relaxed) {
            return Ok(());
        }

        let notification = match self.characteristic {
            Characteristic::HeartRate => Notification::HeartRate(
                payload
                    .try_into()
                    .map_err(|_| NotifyError::new(EINVAL))?,
            ),
            Characteristic::Battery => {
                Notification::Battery(*payload.first().ok_or(NotifyError::new(EINVAL))?)
            }
        };

        NOTIFICATIONS
            .try_send(notification)
            .map_err(|_| NotifyError::new(ENOMEM))
    }
}

/// Run the BLE stack.
pub async fn run<C>(controller: C, address: Address, config: &Config<'static>)
where
    C: Controller,
{
    let mut resources: HostResources<Pool, CONNECTIONS_MAX, L2CAP_CHANNELS_MAX> =
        HostResources::new();
    let stack = trouble_host::new(controller, &mut resources).set_random_address(address);

    let Host {
        mut peripheral,
        runner,
        ..
    } = stack.build();

    let server = match Server::new_with_config(GapConfig::Peripheral(PeripheralConfig {
        name: config.device.name,
        appearance: &appearance::heart_rate_sensor::GENERIC_HEART_RATE_SENSOR,
    })) {
        Ok(server) => server,
        Err(e) => {
            error!("GATT server setup failed: {:?}", e);
            return;
        }
    };

    let info = DeviceInformation::new(&config.device);
    for result in [
        server.set(&server.device_info.manufacturer, &info.manufacturer),
        server.set(&server.device_info.model, &info.model),
    ] {
        if let Err(e) = result {
            warn!("Device information not set: {:?}", e);
        }
    }
    if let Err(e) = server.set(
        &server.heart_rate.body_sensor_location,
        &config.device.body_sensor_location,
    ) {
        warn!("Body sensor location not set: {:?}", e);
    }

    let payload = AdvertisingPayload::new(config.device.name);
    let adv_data = payload.advertising_data();
    let scan_data = payload.scan_response();

    join(
        runner_task(runner),
        advertising_task(&mut peripheral, &server, &adv_data, &scan_data),
    )
    .await;
}

async fn runner_task<C: Controller, P: PacketPool>(mut runner: Runner<'_, C, P>) {
    loop {
        if let Err(e) = runner.run().await {
            error!("BLE runner error: {:?}", e);
        }
    }
}

/// Advertise while the control loop asks for it, serve one connection at a
/// time.
async fn advertising_task<'values, C: Controller>(
    peripheral: &mut Peripheral<'values, C, Pool>,
    server: &Server<'values>,
    adv_data: &[u8],
    scan_data: &[u8],
) {
    let mut tracker = ConnectionTracker::new();
    let mut wanted = false;

    loop {
        if !wanted {
            wanted = ADVERTISING_COMMAND.wait().await == AdvertisingCommand::Start;
            continue;
        }

        match select(
            advertise(peripheral, server, adv_data, scan_data),
            ADVERTISING_COMMAND.wait(),
        )
        .await
        {
            Either::First(Ok(conn)) => {
                // Connectable advertising ends with the connection
                wanted = false;
                tracker.connected(conn.raw().handle(), HCI_SUCCESS);
                serve(server, &conn, &mut tracker).await;
            }
            Either::First(Err(e)) => {
                warn!("Advertising failed: {:?}", e);
                wanted = false;
            }
            Either::Second(command) => {
                debug!("Advertising command {:?}", command);
                wanted = command == AdvertisingCommand::Start;
            }
        }
    }
}

async fn advertise<'values, 'server, C: Controller>(
    peripheral: &mut Peripheral<'values, C, Pool>,
    server: &'server Server<'values>,
    adv_data: &[u8],
    scan_data: &[u8],
) -> Result<GattConnection<'values, 'server, Pool>, BleHostError<C::Error>> {
    let advertiser = peripheral
        .advertise(
            &Default::default(),
            Advertisement::ConnectableScannableUndirected {
                adv_data,
                scan_data,
            },
        )
        .await?;
    info!("Advertising, waiting for a central");

    let conn = advertiser.accept().await?.with_attribute_server(server)?;
    Ok(conn)
}

/// Handle GATT traffic and queued notifications until the link drops.
async fn serve(
    server: &Server<'_>,
    conn: &GattConnection<'_, '_, Pool>,
    tracker: &mut ConnectionTracker<ConnHandle>,
) {
    let handle = conn.raw().handle();
    CONNECTED.store(true, Ordering::Relaxed);

    loop {
        match select(conn.next(), NOTIFICATIONS.receive()).await {
            Either::First(GattConnectionEvent::Disconnected { reason }) => {
                tracker.disconnected(&handle, reason);
                break;
            }
            Either::First(GattConnectionEvent::PairingFailed(err)) => {
                tracker.auth_cancelled(err);
            }
            Either::First(GattConnectionEvent::Gatt { event }) => match event.accept() {
                Ok(reply) => reply.send().await,
                Err(e) => warn!("GATT reply failed: {:?}", e),
            },
            Either::First(_) => {}
            Either::Second(notification) => {
                let result = match notification {
                    Notification::HeartRate(measurement) => {
                        server.heart_rate.measurement.notify(conn, &measurement).await
                    }
                    Notification::Battery(level) => server.battery.level.notify(conn, &level).await,
                };
                if let Err(e) = result {
                    warn!("Notify failed: {:?}", e);
                }
            }
        }
    }

    CONNECTED.store(false, Ordering::Relaxed);
}
