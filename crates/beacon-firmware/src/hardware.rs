//! Hardware setup for the accelerometer and its interrupt line

use beacon_core::time::{Clock, EmbassyClock};
use beacon_core::trigger::{ARMED_TRIGGER, TriggerSender, raise_armed};
use esp_hal::gpio::{Input, InputConfig, Pull};
use esp_hal::i2c::master::{Config as I2cConfig, ConfigError, I2c};
use esp_hal::time::Rate;
use log::debug;

/// Create the I²C bus the accelerometer sits on.
pub fn create_i2c_bus(
    i2c0: esp_hal::peripherals::I2C0<'static>,
    sda: esp_hal::peripherals::GPIO12<'static>,
    scl: esp_hal::peripherals::GPIO11<'static>,
) -> Result<I2c<'static, esp_hal::Async>, ConfigError> {
    Ok(
        I2c::new(i2c0, I2cConfig::default().with_frequency(Rate::from_khz(400)))?
            .with_sda(sda)
            .with_scl(scl)
            .into_async(),
    )
}

/// INT1 of the accelerometer. Active high.
pub fn interrupt_pin(pin: esp_hal::peripherals::GPIO10<'static>) -> Input<'static> {
    Input::new(pin, InputConfig::default().with_pull(Pull::Down))
}

/// Turn INT1 edges into trigger events.
///
/// The pin does not say which trigger fired; the driver records what it armed
/// in [`ARMED_TRIGGER`] and the edge is labelled with that.
pub async fn watch_interrupt(mut int1: Input<'static>, sender: TriggerSender<'_>) -> ! {
    let clock = EmbassyClock;

    loop {
        int1.wait_for_rising_edge().await;
        if !raise_armed(&sender, &ARMED_TRIGGER, clock.now_ticks()) {
            debug!("INT1 edge with nothing armed");
        }
    }
}
