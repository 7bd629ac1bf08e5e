//! Monotonic tick source used to stamp samples.

/// Source of the 32-bit cycle counter stored in each sample.
pub trait Clock {
    /// Current tick count. Wraps silently.
    fn now_ticks(&self) -> u32;
}

/// Clock backed by the embassy time driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    fn now_ticks(&self) -> u32 {
        embassy_time::Instant::now().as_ticks() as u32
    }
}
