//! Fixed-point sensor values
//!
//! Accelerometer readings and driver attributes are exchanged as a pair of
//! integers: a whole part and a fractional part scaled to one million. Both
//! parts carry the sign of the value, so `-1.5` is stored as `(-1, -500000)`.
//! No floating point is used anywhere on this path.

use core::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Scale of the fractional part (10⁶ = one unit).
pub const MICRO_PER_UNIT: i32 = 1_000_000;

/// A value split into an integer part and a fractional part scaled to 10⁶.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SensorValue {
    /// Whole units
    pub integer: i32,
    /// Fractional part in millionths of a unit
    pub micro: i32,
}

impl SensorValue {
    pub const ZERO: Self = Self::new(0, 0);

    pub const fn new(integer: i32, micro: i32) -> Self {
        Self { integer, micro }
    }

    /// Whole value without a fractional part.
    pub const fn from_int(integer: i32) -> Self {
        Self::new(integer, 0)
    }

    /// Value from a total count of millionths.
    pub fn from_micros(total: i64) -> Self {
        let unit = i64::from(MICRO_PER_UNIT);
        Self::carry(total / unit, total % unit)
    }

    /// Total count of millionths.
    pub const fn as_micros(&self) -> i64 {
        self.integer as i64 * MICRO_PER_UNIT as i64 + self.micro as i64
    }

    /// Value scaled up by `percent`, i.e. `self × (1 + percent/100)`.
    ///
    /// The margin is added to the fractional part, including the share that
    /// comes from the integer part, and the result is then carried back into
    /// range. With `percent = 10` a baseline of `0.950000` becomes `1.045000`.
    pub fn with_margin_percent(self, percent: u8) -> Self {
        let percent = i64::from(percent);
        let integer = i64::from(self.integer);
        let micro = i64::from(self.micro);

        let micro = micro + micro * percent / 100 + integer * i64::from(MICRO_PER_UNIT) * percent / 100;

        Self::carry(integer, micro)
    }

    /// Move whole units out of the fractional part until it lies in
    /// `(-1_000_000, 1_000_000)`.
    fn carry(mut integer: i64, mut micro: i64) -> Self {
        let unit = i64::from(MICRO_PER_UNIT);

        while micro >= unit {
            integer += 1;
            micro -= unit;
        }
        while micro <= -unit {
            integer -= 1;
            micro += unit;
        }

        Self {
            integer: integer.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32,
            micro: micro as i32,
        }
    }
}

impl Display for SensorValue {
    /// Formats as `{integer:2}.{micro:06}`, keeping the sign on the integer part.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.integer == 0 && self.micro < 0 {
            write!(f, "-0.{:06}", self.micro.unsigned_abs())
        } else {
            write!(f, "{:2}.{:06}", self.integer, self.micro.unsigned_abs())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn margin_without_carry() {
        let value = SensorValue::new(0, 500_000);
        assert_eq!(value.with_margin_percent(10), SensorValue::new(0, 550_000));
    }

    #[test]
    fn margin_carries_fraction_into_integer() {
        let value = SensorValue::new(0, 950_000);
        assert_eq!(value.with_margin_percent(10), SensorValue::new(1, 45_000));
    }

    #[test]
    fn margin_on_standard_gravity() {
        // 9.8 m/s² → 10.78 m/s²
        let value = SensorValue::new(9, 800_000);
        assert_eq!(value.with_margin_percent(10), SensorValue::new(10, 780_000));
    }

    #[test]
    fn margin_on_large_integer_part_carries_repeatedly() {
        // 19.5 × 1.1 = 21.45
        let value = SensorValue::new(19, 500_000);
        assert_eq!(value.with_margin_percent(10), SensorValue::new(21, 450_000));
    }

    #[test]
    fn margin_on_negative_value() {
        // -9.8 × 1.1 = -10.78
        let value = SensorValue::new(-9, -800_000);
        assert_eq!(value.with_margin_percent(10), SensorValue::new(-10, -780_000));
    }

    #[test]
    fn zero_margin_is_identity() {
        let value = SensorValue::new(3, 141_592);
        assert_eq!(value.with_margin_percent(0), value);
    }

    #[test]
    fn micros_split_keeps_sign_on_both_parts() {
        assert_eq!(SensorValue::from_micros(9_806_650), SensorValue::new(9, 806_650));
        assert_eq!(SensorValue::from_micros(-1_500_000), SensorValue::new(-1, -500_000));
        assert_eq!(SensorValue::new(-10, -780_000).as_micros(), -10_780_000);
    }

    #[test]
    fn display_pads_fraction() {
        assert_eq!(format!("{}", SensorValue::new(9, 81)), " 9.000081");
        assert_eq!(format!("{}", SensorValue::new(-1, -500_000)), "-1.500000");
        assert_eq!(format!("{}", SensorValue::new(0, -250_000)), "-0.250000");
    }
}
