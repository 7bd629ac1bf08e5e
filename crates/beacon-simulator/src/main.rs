//! Desktop simulator for the beacon-rs motion-gated BLE peripheral.
//!
//! Runs the beacon-core control loop on the host against a simulated
//! accelerometer that gets shaken every few seconds, a radio that prints its
//! advertising PDUs, and a central that connects while the device is
//! discoverable. Everything is reported through the log.
//!
//! # Environment
//!
//! | Variable             | Effect                                   |
//! |----------------------|------------------------------------------|
//! | `RUST_LOG`           | Log filter, `info` by default            |
//! | `BEACON_NAME`        | Advertised device name                   |
//! | `BEACON_NO_ACCEL`    | Start without an accelerometer           |

mod accelerometer;
mod radio;

use beacon_core::advertising::AdvertisingPayload;
use beacon_core::config::{Config, DEFAULT_DEVICE_NAME};
use beacon_core::history::HISTORY_CAPACITY;
use beacon_core::motion::MotionController;
use beacon_core::telemetry::{BatteryService, DeviceInformation, HeartRateService};
use beacon_core::tick::TickCoordinator;
use beacon_core::time::EmbassyClock;
use beacon_core::trigger::TRIGGER_CHANNEL;
use embassy_executor::Spawner;
use embassy_futures::join::join3;
use embassy_time::Delay;
use log::{info, warn};

use accelerometer::{SimAccelerometer, WORLD};
use radio::{LogSink, SimRadio};

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let name = std::env::var("BEACON_NAME").ok();
    let mut config = Config::default();
    config.device.name = name.as_deref().unwrap_or(DEFAULT_DEVICE_NAME);

    info!("Starting beacon-rs simulator as \"{}\"", config.device.name);

    let info = DeviceInformation::new(&config.device);
    info!(
        "Device information: model {}, manufacturer {}",
        info.model, info.manufacturer
    );

    let heart_rate = HeartRateService::new(LogSink::new("heart rate measurement"));
    let battery = BatteryService::new(LogSink::new("battery level"));

    let control = async {
        // Calibration needs the generator running, so this starts inside the join
        let motion = if std::env::var_os("BEACON_NO_ACCEL").is_some() {
            warn!("No accelerometer, running telemetry only");
            None
        } else {
            let mut controller: MotionController<_, _, _, _, HISTORY_CAPACITY> =
                MotionController::new(
                    SimAccelerometer::new(&WORLD),
                    SimRadio,
                    EmbassyClock,
                    Delay,
                    &config.motion,
                    AdvertisingPayload::new(config.device.name),
                );
            let report = controller.start().await;
            info!(
                "Watching for motion above {} m/s^2",
                report.setting.slope_threshold
            );
            Some(controller)
        };

        let mut coordinator = TickCoordinator::new(motion, heart_rate, battery);
        coordinator.run(TRIGGER_CHANNEL.receiver()).await
    };

    join3(
        accelerometer::run_generator(&WORLD, TRIGGER_CHANNEL.sender()),
        radio::run_central(),
        control,
    )
    .await;
}
