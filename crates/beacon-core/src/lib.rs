//! Hardware-independent core library for the motion beacon
//!
//! This crate contains all platform-agnostic logic of a BLE peripheral that
//! only advertises after it has been moved: threshold calibration, the
//! watching/active state machine, the sample history ring, advertising
//! payloads, simulated telemetry and the one-second control loop.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (ESP32-S3) and desktop hosts (for the simulator and tests).

#![no_std]

extern crate alloc;

pub mod advertising;
pub mod calibration;
pub mod config;
pub mod connection;
pub mod device;
pub mod error;
pub mod fixed_point;
pub mod history;
pub mod motion;
pub mod sensors;
pub mod telemetry;
pub mod tick;
pub mod time;
pub mod trigger;

#[cfg(test)]
mod testing;
