//! ESP32-S3 firmware-specific modules for beacon-rs
//!
//! This crate contains hardware-specific code that cannot compile on desktop
//! targets: the BLE host stack on the ESP32-S3 radio, I²C bus setup for the
//! accelerometer and the interrupt pin that feeds the trigger queue.

#![no_std]

extern crate alloc;

pub mod ble;
pub mod hardware;
