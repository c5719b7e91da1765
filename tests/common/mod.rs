//! Fake hardware for the host integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::convert::Infallible;

use opc_mox_shield::drivers::{GasSensor, Histogram, ParticleCounter};
use opc_mox_shield::error::DriverError;
use opc_mox_shield::led::NoIndicator;
use opc_mox_shield::storage::LAYOUT_SIZE;
use opc_mox_shield::{Config, MemoryStorage, Sampler, SensorArray, SensorBus, Shield};

pub const BOARD_ID: u8 = 0x2A;

#[derive(Default)]
pub struct FakeOpc {
    pub fan_laser: bool,
    pending: bool,
}

impl ParticleCounter for FakeOpc {
    type Error = Infallible;

    fn ready(&self, _now: u32) -> bool {
        !self.pending
    }

    fn init(&mut self, _now: u32) -> Result<(), DriverError<Infallible>> {
        Ok(())
    }

    fn set_fan_laser(&mut self, on: bool, _now: u32) -> Result<(), DriverError<Infallible>> {
        self.fan_laser = on;
        Ok(())
    }

    fn ask_histogram(&mut self, _now: u32) -> Result<(), DriverError<Infallible>> {
        self.pending = true;
        Ok(())
    }

    fn get_histogram(&mut self, _now: u32) -> Option<Histogram> {
        let mut bins = [0u16; 16];
        bins[1] = 12;
        std::mem::replace(&mut self.pending, false).then_some(Histogram {
            bins,
            flow_rate: 3.0,
            temperature: 21.5,
            sampling_period: 1.0,
            pm1: 0.5,
            pm2_5: 1.5,
            pm10: 4.0,
        })
    }
}

#[derive(Default)]
pub struct FakeMox {
    pending: bool,
}

impl GasSensor for FakeMox {
    type Error = Infallible;

    fn ready(&self, _now: u32) -> bool {
        !self.pending
    }

    fn init(&mut self, _now: u32) -> Result<(), DriverError<Infallible>> {
        Ok(())
    }

    fn ask_raw(&mut self, _now: u32) -> Result<(), DriverError<Infallible>> {
        self.pending = true;
        Ok(())
    }

    fn get_raw(&mut self, _now: u32) -> Option<u16> {
        std::mem::replace(&mut self.pending, false).then_some(30_000)
    }
}

#[derive(Default)]
pub struct PowerSwitch {
    pub on: bool,
}

impl embedded_hal::digital::ErrorType for PowerSwitch {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for PowerSwitch {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.on = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.on = true;
        Ok(())
    }
}

/// Serial port backed by two byte queues.
#[derive(Default)]
pub struct FakePort {
    pub rx: VecDeque<u8>,
    pub tx: Vec<u8>,
}

impl embedded_io::ErrorType for FakePort {
    type Error = Infallible;
}

impl embedded_io::Read for FakePort {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Infallible> {
        let n = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl embedded_io::ReadReady for FakePort {
    fn read_ready(&mut self) -> Result<bool, Infallible> {
        Ok(!self.rx.is_empty())
    }
}

impl embedded_io::Write for FakePort {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Infallible> {
        self.tx.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

pub type Array<'s> =
    SensorArray<'s, FakeOpc, FakeMox, PowerSwitch, NoIndicator, MemoryStorage<LAYOUT_SIZE>>;

pub fn config() -> Config {
    Config::new()
        .with_startup_settle_ms(100)
        .with_step_settle_ms(20)
}

pub fn array<'s>(opc_sampler: &'s Sampler, mox_sampler: &'s Sampler) -> Array<'s> {
    let shield = Shield {
        opc: FakeOpc::default(),
        mox: FakeMox::default(),
        power: PowerSwitch::default(),
        indicator: NoIndicator,
    };
    SensorArray::new(config(), shield, MemoryStorage::new(), opc_sampler, mox_sampler)
}

pub fn bus() -> SensorBus<NoIndicator> {
    SensorBus::new(&config(), BOARD_ID, NoIndicator)
}

/// Send `frame` and return everything the board wrote back.
pub fn exchange(
    bus: &mut SensorBus<NoIndicator>,
    port: &mut FakePort,
    array: &mut Array<'_>,
    frame: &[u8],
    now: u32,
) -> String {
    port.rx.extend(frame.iter().copied());
    bus.service(port, now, array).unwrap();
    String::from_utf8(std::mem::take(&mut port.tx)).unwrap()
}
