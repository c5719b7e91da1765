//! Physical sensor drivers.
//!
//! Both sensors follow the same ask/get contract: `ask_*` starts a
//! transaction and returns immediately, `get_*` hands back the result of the
//! latest ask exactly once, or `None` while it is still pending or was
//! rejected. A rejected or missing result is "no sample this cycle", never a
//! fault.

pub mod opcn2;
pub mod sgp41;

use core::fmt::Debug;

use crate::channel::OPC_BINS;
use crate::error::DriverError;

pub use opcn2::OpcN2;
pub use sgp41::Sgp41;

/// One decoded particle counter reading.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Histogram {
    pub bins: [u16; OPC_BINS],
    /// Sample flow, ml/s.
    pub flow_rate: f32,
    /// Degrees Celsius.
    pub temperature: f32,
    /// Seconds covered by this histogram.
    pub sampling_period: f32,
    pub pm1: f32,
    pub pm2_5: f32,
    pub pm10: f32,
}

impl Histogram {
    /// Air drawn through the sensor during the period, ml.
    pub fn volume(&self) -> f32 {
        self.flow_rate * self.sampling_period
    }

    /// Particles per ml for one bin.
    pub fn density(&self, bin: usize) -> f32 {
        f32::from(self.bins[bin]) / self.volume()
    }
}

/// Optical particle counter.
pub trait ParticleCounter {
    type Error: Debug;

    /// No transaction in flight.
    fn ready(&self, now: u32) -> bool;

    fn init(&mut self, now: u32) -> Result<(), DriverError<Self::Error>>;

    /// Switch fan and laser together. Restarts the grace period.
    fn set_fan_laser(&mut self, on: bool, now: u32) -> Result<(), DriverError<Self::Error>>;

    fn ask_histogram(&mut self, now: u32) -> Result<(), DriverError<Self::Error>>;

    fn get_histogram(&mut self, now: u32) -> Option<Histogram>;
}

/// Metal-oxide gas sensor.
pub trait GasSensor {
    type Error: Debug;

    fn ready(&self, now: u32) -> bool;

    fn init(&mut self, now: u32) -> Result<(), DriverError<Self::Error>>;

    fn ask_raw(&mut self, now: u32) -> Result<(), DriverError<Self::Error>>;

    fn get_raw(&mut self, now: u32) -> Option<u16>;
}
