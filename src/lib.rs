//! Firmware core for an air-quality shield carrying an optical particle
//! counter (OPC) and a metal-oxide (MOX) gas sensor.
//!
//! Raw readings are decimated per sensor by a [`sampler::Sampler`], smoothed
//! per logical channel by two cascaded [`averager::Averager`]s and served to a
//! host over an addressed ASCII serial bus ([`bus`]). Everything outside
//! `tasks` and the `esp32c6` parts of [`led`] is portable and runs in host
//! tests.
#![cfg_attr(not(test), no_std)]

pub mod averager;
pub mod bus;
pub mod channel;
pub mod clock;
pub mod config;
pub mod drivers;
pub mod error;
pub mod hal;
pub mod led;
pub mod orchestrator;
pub mod postscaler;
pub mod sampler;
pub mod storage;

#[cfg(feature = "esp32c6")]
pub mod tasks;

pub use bus::{SensorBus, SensorControl};
pub use channel::LogicalChannel;
pub use clock::SystemClock;
pub use config::Config;
pub use orchestrator::{SensorArray, Shield};
pub use sampler::Sampler;
pub use storage::{MemoryStorage, Storage};
