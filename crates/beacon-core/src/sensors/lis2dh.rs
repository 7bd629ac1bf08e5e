//! LIS2DH12 tri-axis accelerometer over async I²C
//!
//! Runs the part in high-resolution mode at ±2 g. Both triggers are routed to
//! INT1: data-ready through `I1_ZYXDA`, motion through interrupt generator 1
//! in OR mode on the high events of all three axes. The threshold is absolute,
//! so a resting device with gravity on one axis stays below a threshold
//! calibrated from that axis plus a margin.

use embedded_hal_async::i2c::I2c;
use log::{debug, error, info};

use crate::device::{Attribute, MotionDevice, TriggerKind};
use crate::error::DeviceError;
use crate::fixed_point::SensorValue;
use crate::trigger::ArmedTrigger;

/// I²C address with SA0 pulled high.
pub const I2C_ADDR: u8 = 0x19;

/// Expected WHO_AM_I value.
pub const CHIP_ID: u8 = 0x33;

// Registers
pub const REG_WHO_AM_I: u8 = 0x0F;
pub const REG_CTRL1: u8 = 0x20;
pub const REG_CTRL3: u8 = 0x22;
pub const REG_CTRL4: u8 = 0x23;
pub const REG_STATUS: u8 = 0x27;
pub const REG_OUT_X_L: u8 = 0x28;
pub const REG_INT1_CFG: u8 = 0x30;
pub const REG_INT1_SRC: u8 = 0x31;
pub const REG_INT1_THS: u8 = 0x32;
pub const REG_INT1_DURATION: u8 = 0x33;

/// Register address flag for multi-byte auto-increment.
const AUTO_INCREMENT: u8 = 0x80;

const CTRL1_XYZ_EN: u8 = 0x07;
const CTRL3_I1_IA1: u8 = 0x40;
const CTRL3_I1_ZYXDA: u8 = 0x10;
const CTRL4_BDU: u8 = 0x80;
const CTRL4_HR: u8 = 0x08;
const STATUS_ZYXDA: u8 = 0x08;
/// OR combination of X, Y and Z high events.
const INT1_CFG_XYZ_HIGH: u8 = 0x2A;

/// Threshold register resolution at ±2 g, in mg.
const THS_MG_PER_LSB: i64 = 16;
/// Largest value of the 7-bit threshold and duration registers.
const REG_7BIT_MAX: i64 = 0x7F;

/// Standard gravity in µm/s² per g.
const MICRO_MS2_PER_G: i64 = 9_806_650;

// errno values reported through DeviceError::Io
const EIO: i32 = -5;
const ENODEV: i32 = -19;
const EINVAL: i32 = -22;

/// Output data rate field of CTRL_REG1 for a rate in Hz.
fn odr_bits(hz: i32) -> Option<u8> {
    let bits = match hz {
        0 => 0x0,
        1 => 0x1,
        10 => 0x2,
        25 => 0x3,
        50 => 0x4,
        100 => 0x5,
        200 => 0x6,
        400 => 0x7,
        _ => return None,
    };
    Some(bits << 4)
}

/// Convert a left-justified 12-bit sample (1 mg/digit) to m/s².
fn raw_to_ms2(raw: i16) -> SensorValue {
    let mg = i64::from(raw >> 4);
    SensorValue::from_micros(mg * MICRO_MS2_PER_G / 1000)
}

/// Convert a threshold in m/s² to INT1_THS counts.
///
/// The interrupt generator compares magnitudes, so the sign of a baseline
/// taken with the axis pointing down is dropped.
fn threshold_counts(value: SensorValue) -> u8 {
    let mg = value.as_micros().abs() * 1000 / MICRO_MS2_PER_G;
    (mg / THS_MG_PER_LSB).clamp(0, REG_7BIT_MAX) as u8
}

pub struct Lis2dh<'a, I> {
    i2c: I,
    address: u8,
    armed: &'a ArmedTrigger,
    latched: [i16; 3],
}

impl<'a, I: I2c> Lis2dh<'a, I> {
    pub fn new(i2c: I, address: u8, armed: &'a ArmedTrigger) -> Self {
        Self {
            i2c,
            address,
            armed,
            latched: [0; 3],
        }
    }

    /// Check the chip ID and put the part in high-resolution ±2 g mode with
    /// all axes enabled. Output stays powered down until a sampling frequency
    /// is set.
    pub async fn init(&mut self) -> Result<(), DeviceError> {
        let id = self.read_register(REG_WHO_AM_I).await?;
        if id != CHIP_ID {
            error!("LIS2DH: unexpected chip id 0x{:02x}", id);
            return Err(DeviceError::Io(ENODEV));
        }

        self.write_register(REG_CTRL1, CTRL1_XYZ_EN).await?;
        self.write_register(REG_CTRL3, 0).await?;
        self.write_register(REG_CTRL4, CTRL4_BDU | CTRL4_HR).await?;
        self.write_register(REG_INT1_CFG, 0).await?;
        self.armed.set(None);

        info!("LIS2DH ready at 0x{:02x}", self.address);
        Ok(())
    }

    async fn read_register(&mut self, reg: u8) -> Result<u8, DeviceError> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[reg], &mut buf)
            .await
            .map_err(|e| {
                debug!("LIS2DH: read 0x{:02x} failed: {:?}", reg, e);
                DeviceError::Io(EIO)
            })?;
        Ok(buf[0])
    }

    async fn write_register(&mut self, reg: u8, value: u8) -> Result<(), DeviceError> {
        self.i2c
            .write(self.address, &[reg, value])
            .await
            .map_err(|e| {
                debug!("LIS2DH: write 0x{:02x} failed: {:?}", reg, e);
                DeviceError::Io(EIO)
            })
    }

    async fn update_register(&mut self, reg: u8, mask: u8, value: u8) -> Result<(), DeviceError> {
        let current = self.read_register(reg).await?;
        self.write_register(reg, (current & !mask) | (value & mask)).await
    }

    async fn route_motion(&mut self) -> Result<(), DeviceError> {
        // Clear any event left from a previous window
        self.read_register(REG_INT1_SRC).await?;
        self.write_register(REG_INT1_CFG, INT1_CFG_XYZ_HIGH).await?;
        self.write_register(REG_CTRL3, CTRL3_I1_IA1).await
    }
}

impl<I: I2c> MotionDevice for Lis2dh<'_, I> {
    async fn fetch_sample(&mut self) -> Result<(), DeviceError> {
        let status = self.read_register(REG_STATUS).await?;

        let mut buf = [0u8; 6];
        self.i2c
            .write_read(self.address, &[REG_OUT_X_L | AUTO_INCREMENT], &mut buf)
            .await
            .map_err(|e| {
                debug!("LIS2DH: output read failed: {:?}", e);
                DeviceError::Io(EIO)
            })?;

        for (axis, bytes) in buf.chunks_exact(2).enumerate() {
            self.latched[axis] = i16::from_le_bytes([bytes[0], bytes[1]]);
        }

        if status & STATUS_ZYXDA == 0 {
            return Err(DeviceError::NoNewData);
        }
        Ok(())
    }

    fn read_acceleration(&mut self) -> [SensorValue; 3] {
        self.latched.map(raw_to_ms2)
    }

    async fn set_attribute(
        &mut self,
        attribute: Attribute,
        value: SensorValue,
    ) -> Result<(), DeviceError> {
        match attribute {
            Attribute::SamplingFrequency => {
                let bits = odr_bits(value.integer).ok_or(DeviceError::Io(EINVAL))?;
                self.update_register(REG_CTRL1, 0xF0, bits).await
            }
            Attribute::SlopeThreshold => {
                self.write_register(REG_INT1_THS, threshold_counts(value))
                    .await
            }
            Attribute::SlopeDuration => {
                let samples = i64::from(value.integer).clamp(0, REG_7BIT_MAX) as u8;
                self.write_register(REG_INT1_DURATION, samples).await
            }
        }
    }

    async fn arm_trigger(&mut self, trigger: TriggerKind) -> Result<(), DeviceError> {
        // INT1 can rise on the CTRL3 write itself when a sample is already
        // pending, and that edge must be labelled
        self.armed.set(Some(trigger));

        let routed = match trigger {
            TriggerKind::DataReady => self.write_register(REG_CTRL3, CTRL3_I1_ZYXDA).await,
            TriggerKind::MotionDelta => self.route_motion().await,
        };
        if routed.is_err() {
            self.armed.set(None);
        }
        routed
    }

    async fn disarm_trigger(&mut self, trigger: TriggerKind) -> Result<(), DeviceError> {
        if self.armed.get() == Some(trigger) {
            self.armed.set(None);
        }

        match trigger {
            TriggerKind::DataReady => self.update_register(REG_CTRL3, CTRL3_I1_ZYXDA, 0).await,
            TriggerKind::MotionDelta => {
                self.update_register(REG_CTRL3, CTRL3_I1_IA1, 0).await?;
                self.write_register(REG_INT1_CFG, 0).await
            }
        }
    }
}
