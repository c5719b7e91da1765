//! Sensirion SGP41 metal-oxide gas sensor over I²C.
//!
//! Only the raw VOC signal is used; it is the MOX channel's proxy value.

use embedded_hal::i2c::I2c;
use log::{debug, warn};

use super::GasSensor;
use crate::clock::elapsed;
use crate::error::DriverError;

pub const SGP41_ADDR: u8 = 0x59;

// SGP41 Commands
pub const CMD_EXECUTE_CONDITIONING: [u8; 2] = [0x26, 0x12];
pub const CMD_MEASURE_RAW_SIGNALS: [u8; 2] = [0x26, 0x19];

/// Conversion time before the result can be read.
pub const MEASURE_WINDOW_MS: u32 = 50;

// CRC calculation for SGP41
pub fn calculate_crc(data: &[u8]) -> u8 {
    let mut crc: u8 = 0xFF;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            if crc & 0x80 != 0 {
                crc = (crc << 1) ^ 0x31;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

// Compensation words for the measure/conditioning commands
pub fn prepare_temp_hum_params(temp_celsius: f32, humidity_percent: f32) -> [u8; 6] {
    let humidity_ticks = ((humidity_percent / 100.0) * 65535.0) as u16;
    let temp_ticks = (((temp_celsius + 45.0) / 175.0) * 65535.0) as u16;
    let [h_msb, h_lsb] = humidity_ticks.to_be_bytes();
    let [t_msb, t_lsb] = temp_ticks.to_be_bytes();

    [
        h_msb,
        h_lsb,
        calculate_crc(&[h_msb, h_lsb]),
        t_msb,
        t_lsb,
        calculate_crc(&[t_msb, t_lsb]),
    ]
}

/// 25 °C / 50 %RH, used when no humidity sensor is fitted.
fn command_with_default_compensation(command: [u8; 2]) -> [u8; 8] {
    let mut cmd = [0u8; 8];
    cmd[0..2].copy_from_slice(&command);
    cmd[2..8].copy_from_slice(&prepare_temp_hum_params(25.0, 50.0));
    cmd
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    Idle,
    Conditioning { since: u32 },
    Measuring { since: u32 },
}

pub struct Sgp41<I2C> {
    i2c: I2C,
    state: State,
}

impl<I2C: I2c> Sgp41<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self { i2c, state: State::Idle }
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    fn read_word(&mut self, buf: &mut [u8]) -> Result<u16, DriverError<I2C::Error>> {
        self.i2c.read(SGP41_ADDR, buf).map_err(DriverError::Bus)?;
        if calculate_crc(&buf[0..2]) != buf[2] {
            return Err(DriverError::Checksum);
        }
        Ok(u16::from_be_bytes([buf[0], buf[1]]))
    }
}

impl<I2C: I2c> GasSensor for Sgp41<I2C> {
    type Error = I2C::Error;

    fn ready(&self, now: u32) -> bool {
        match self.state {
            State::Idle => true,
            State::Conditioning { since } | State::Measuring { since } => {
                elapsed(now, since, MEASURE_WINDOW_MS)
            }
        }
    }

    fn init(&mut self, now: u32) -> Result<(), DriverError<Self::Error>> {
        let cmd = command_with_default_compensation(CMD_EXECUTE_CONDITIONING);
        self.i2c.write(SGP41_ADDR, &cmd).map_err(DriverError::Bus)?;
        self.state = State::Conditioning { since: now };
        debug!("sgp41: conditioning started");
        Ok(())
    }

    /// Supersedes any unread result once its window has passed.
    fn ask_raw(&mut self, now: u32) -> Result<(), DriverError<Self::Error>> {
        if !self.ready(now) {
            return Err(DriverError::Busy);
        }
        let cmd = command_with_default_compensation(CMD_MEASURE_RAW_SIGNALS);
        self.i2c.write(SGP41_ADDR, &cmd).map_err(DriverError::Bus)?;
        self.state = State::Measuring { since: now };
        Ok(())
    }

    fn get_raw(&mut self, now: u32) -> Option<u16> {
        let State::Measuring { since } = self.state else {
            return None;
        };
        if !elapsed(now, since, MEASURE_WINDOW_MS) {
            return None;
        }
        self.state = State::Idle;

        // VOC word + CRC, NOx word + CRC
        let mut buf = [0u8; 6];
        match self.read_word(&mut buf) {
            Ok(voc_raw) => Some(voc_raw),
            Err(err) => {
                warn!("sgp41: measurement dropped: {}", err);
                None
            }
        }
    }
}
