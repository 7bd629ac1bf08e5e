#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use beacon_core::advertising::AdvertisingPayload;
use beacon_core::config::{Config, DeviceConfig};
use beacon_core::error::MotionError;
use beacon_core::history::HISTORY_CAPACITY;
use beacon_core::motion::MotionController;
use beacon_core::sensors::lis2dh::{I2C_ADDR, Lis2dh};
use beacon_core::telemetry::{BatteryService, HeartRateService};
use beacon_core::tick::TickCoordinator;
use beacon_core::time::EmbassyClock;
use beacon_core::trigger::{ARMED_TRIGGER, TRIGGER_CHANNEL};
use beacon_firmware::ble::{self, BleAdvertiser, GattSink};
use beacon_firmware::hardware;
use bt_hci::controller::ExternalController;
use embassy_executor::Spawner;
use embassy_futures::join::join3;
use embassy_time::Delay;
use esp_hal::clock::CpuClock;
use esp_hal::timer::timg::TimerGroup;
use esp_radio::ble::controller::BleConnector;
use log::{error, info};
use trouble_host::Address;

/// Advertised name, baked in by the build script.
const DEVICE_NAME: &str = env!("BEACON_NAME");

/// Static random address of this peripheral.
const BLE_ADDRESS: [u8; 6] = [0xff, 0x8f, 0x1a, 0x05, 0xe4, 0xff];

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(_spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    let esp_config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(esp_config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");

    let config = Config {
        device: DeviceConfig {
            name: DEVICE_NAME,
            ..DeviceConfig::default()
        },
        ..Config::default()
    };

    // Accelerometer
    let i2c = hardware::create_i2c_bus(peripherals.I2C0, peripherals.GPIO12, peripherals.GPIO11)
        .expect("Failed to configure I2C bus");
    let int1 = hardware::interrupt_pin(peripherals.GPIO10);

    let mut accelerometer = Lis2dh::new(i2c, I2C_ADDR, &ARMED_TRIGGER);
    let accelerometer = match accelerometer.init().await {
        Ok(()) => Some(accelerometer),
        Err(e) => {
            error!("{} ({})", MotionError::DeviceUnavailable, e);
            None
        }
    };

    // Radio
    let radio = esp_radio::init().expect("Failed to initialize BLE controller");
    let connector = BleConnector::new(&radio, peripherals.BT, Default::default())
        .expect("Failed to initialize BLE connector");
    let controller: ExternalController<_, 20> = ExternalController::new(connector);

    info!("Radio initialized!");

    let heart_rate = HeartRateService::new(GattSink::heart_rate());
    let battery = BatteryService::new(GattSink::battery());

    let control = async {
        let mut motion = accelerometer.map(|device| {
            MotionController::<_, _, _, _, HISTORY_CAPACITY>::new(
                device,
                BleAdvertiser,
                EmbassyClock,
                Delay,
                &config.motion,
                AdvertisingPayload::new(config.device.name),
            )
        });

        if let Some(controller) = motion.as_mut() {
            let report = controller.start().await;
            info!(
                "Watching for motion above {} m/s^2",
                report.setting.slope_threshold
            );
        }

        TickCoordinator::new(motion, heart_rate, battery)
            .run(TRIGGER_CHANNEL.receiver())
            .await
    };

    let (_, _, never) = join3(
        ble::run(controller, Address::random(BLE_ADDRESS), &config),
        hardware::watch_interrupt(int1, TRIGGER_CHANNEL.sender()),
        control,
    )
    .await;
    never
}
