//! Alphasense OPC-N2 optical particle counter over SPI.
//!
//! The histogram read is split in two so the main loop never waits: the
//! command byte goes out on ask, the 62 payload bytes are clocked in on the
//! first get at least [`COMMAND_SETTLE_MS`] later.

use embedded_hal::spi::SpiDevice;
use log::{debug, warn};

use super::{Histogram, ParticleCounter};
use crate::channel::OPC_BINS;
use crate::clock::elapsed;
use crate::error::DriverError;

pub const CMD_FAN_LASER: u8 = 0x03;
pub const FAN_LASER_ON: u8 = 0x00;
pub const FAN_LASER_OFF: u8 = 0x01;
pub const CMD_READ_HISTOGRAM: u8 = 0x30;

/// Gap the OPC needs between a command byte and its data.
pub const COMMAND_SETTLE_MS: u32 = 10;

pub const HISTOGRAM_LEN: usize = 62;

const FLOW_RATE_AT: usize = 36;
const TEMPERATURE_AT: usize = 40;
const SAMPLING_PERIOD_AT: usize = 44;
const CHECKSUM_AT: usize = 48;
const PM1_AT: usize = 50;
const PM2_5_AT: usize = 54;
const PM10_AT: usize = 58;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    Idle,
    HistogramRequested { since: u32 },
}

pub struct OpcN2<SPI> {
    spi: SPI,
    state: State,
    grace_reads: u8,
    grace_remaining: u8,
}

impl<SPI: SpiDevice> OpcN2<SPI> {
    pub fn new(spi: SPI, grace_reads: u8) -> Self {
        Self {
            spi,
            state: State::Idle,
            grace_reads,
            grace_remaining: grace_reads,
        }
    }

    pub fn release(self) -> SPI {
        self.spi
    }

    fn read_payload(&mut self) -> Result<[u8; HISTOGRAM_LEN], DriverError<SPI::Error>> {
        let mut raw = [CMD_READ_HISTOGRAM; HISTOGRAM_LEN];
        self.spi.transfer_in_place(&mut raw).map_err(DriverError::Bus)?;
        Ok(raw)
    }
}

fn u16_at(raw: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([raw[at], raw[at + 1]])
}

fn f32_at(raw: &[u8], at: usize) -> f32 {
    f32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]])
}

/// Decode and validate a raw histogram payload.
pub fn decode_histogram<E>(raw: &[u8; HISTOGRAM_LEN]) -> Result<Histogram, DriverError<E>> {
    let mut bins = [0u16; OPC_BINS];
    for (i, bin) in bins.iter_mut().enumerate() {
        *bin = u16_at(raw, 2 * i);
    }

    let checksum = bins.iter().fold(0u16, |acc, b| acc.wrapping_add(*b));
    if checksum != u16_at(raw, CHECKSUM_AT) {
        return Err(DriverError::Checksum);
    }

    let flow_rate = f32_at(raw, FLOW_RATE_AT);
    let sampling_period = f32_at(raw, SAMPLING_PERIOD_AT);
    // NaN fails these comparisons as well
    if !(flow_rate > 0.0) || !(sampling_period > 0.0) {
        return Err(DriverError::Implausible);
    }

    // Tenths of a degree, two's complement.
    let temperature_word = i32::from_le_bytes([
        raw[TEMPERATURE_AT],
        raw[TEMPERATURE_AT + 1],
        raw[TEMPERATURE_AT + 2],
        raw[TEMPERATURE_AT + 3],
    ]);

    Ok(Histogram {
        bins,
        flow_rate,
        temperature: temperature_word as f32 / 10.0,
        sampling_period,
        pm1: f32_at(raw, PM1_AT),
        pm2_5: f32_at(raw, PM2_5_AT),
        pm10: f32_at(raw, PM10_AT),
    })
}

impl<SPI: SpiDevice> ParticleCounter for OpcN2<SPI> {
    type Error = SPI::Error;

    fn ready(&self, _now: u32) -> bool {
        self.state == State::Idle
    }

    fn init(&mut self, _now: u32) -> Result<(), DriverError<Self::Error>> {
        self.state = State::Idle;
        self.grace_remaining = self.grace_reads;
        debug!("opc: init");
        Ok(())
    }

    fn set_fan_laser(&mut self, on: bool, now: u32) -> Result<(), DriverError<Self::Error>> {
        if !self.ready(now) {
            return Err(DriverError::Busy);
        }
        let arg = if on { FAN_LASER_ON } else { FAN_LASER_OFF };
        self.spi
            .write(&[CMD_FAN_LASER, arg])
            .map_err(DriverError::Bus)?;
        self.grace_remaining = self.grace_reads;
        debug!("opc: fan/laser {}", if on { "on" } else { "off" });
        Ok(())
    }

    fn ask_histogram(&mut self, now: u32) -> Result<(), DriverError<Self::Error>> {
        if !self.ready(now) {
            return Err(DriverError::Busy);
        }
        self.spi
            .write(&[CMD_READ_HISTOGRAM])
            .map_err(DriverError::Bus)?;
        self.state = State::HistogramRequested { since: now };
        Ok(())
    }

    fn get_histogram(&mut self, now: u32) -> Option<Histogram> {
        let State::HistogramRequested { since } = self.state else {
            return None;
        };
        if !elapsed(now, since, COMMAND_SETTLE_MS) {
            return None;
        }
        self.state = State::Idle;

        let raw = match self.read_payload() {
            Ok(raw) => raw,
            Err(err) => {
                warn!("opc: histogram read failed: {}", err);
                return None;
            }
        };

        if self.grace_remaining > 0 {
            self.grace_remaining -= 1;
            debug!("opc: histogram dropped, {} grace read(s) left", self.grace_remaining);
            return None;
        }

        match decode_histogram::<SPI::Error>(&raw) {
            Ok(histogram) => Some(histogram),
            Err(err) => {
                warn!("opc: histogram rejected: {}", err);
                None
            }
        }
    }
}
