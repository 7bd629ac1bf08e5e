//! Concrete accelerometer drivers implementing [`crate::device::MotionDevice`].

pub mod lis2dh;

pub use lis2dh::Lis2dh;
