//! Timestamped accelerometer samples and the bounded history they live in.

use core::fmt::{self, Display};

use crate::config::DEFAULT_OUTPUT_DATA_RATE_HZ;
use crate::fixed_point::SensorValue;

/// Number of samples kept in history: one second of data at the default
/// output data rate.
///
/// A controller built with a different `output_data_rate_hz` keeps this many
/// samples regardless and warns at construction.
pub const HISTORY_CAPACITY: usize = DEFAULT_OUTPUT_DATA_RATE_HZ as usize;

/// One tri-axis reading.
///
/// Written into history as a single value; a slot never mixes the timestamp of
/// one reading with the axes of another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sample {
    /// Monotonic tick counter at the time of the reading (wraps)
    pub timestamp: u32,
    /// X, Y and Z acceleration in m/s²
    pub axes: [SensorValue; 3],
}

impl Sample {
    pub const fn new(timestamp: u32, axes: [SensorValue; 3]) -> Self {
        Self { timestamp, axes }
    }
}

impl Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [x, y, z] = self.axes;
        write!(
            f,
            "{:10}: x.x={} y.y={} z.z={} m/s^2",
            self.timestamp, x, y, z
        )
    }
}

/// Fixed-capacity ring of the most recent samples.
///
/// The cursor always points to the slot the next `append` overwrites. Storage
/// is allocated once and never grows.
#[derive(Debug, Clone)]
pub struct SampleHistory<const N: usize> {
    slots: [Sample; N],
    cursor: usize,
    len: usize,
}

impl<const N: usize> Default for SampleHistory<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> SampleHistory<N> {
    pub const fn new() -> Self {
        Self {
            slots: [Sample::new(0, [SensorValue::ZERO; 3]); N],
            cursor: 0,
            len: 0,
        }
    }

    /// Store a sample, overwriting the oldest one once the ring is full.
    pub fn append(&mut self, sample: Sample) {
        if N == 0 {
            return;
        }

        self.slots[self.cursor] = sample;
        self.cursor = (self.cursor + 1) % N;
        if self.len < N {
            self.len += 1;
        }
    }

    /// The stored samples, oldest first.
    ///
    /// Yields at most `N` samples; fewer until the ring has filled once.
    pub fn snapshot(&self) -> impl Iterator<Item = &Sample> + '_ {
        let (older, newer) = if self.len < N {
            (&self.slots[..0], &self.slots[..self.len])
        } else {
            (&self.slots[self.cursor..], &self.slots[..self.cursor])
        };

        older.iter().chain(newer.iter())
    }

    /// Most recently appended sample.
    pub fn latest(&self) -> Option<&Sample> {
        if self.len == 0 {
            return None;
        }
        let index = (self.cursor + N - 1) % N;
        Some(&self.slots[index])
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}
