//! Persistent preset storage.
//!
//! Byte layout:
//!
//! ```text
//! 0x00 + sensor   prescaler, tenths of a second (0xFF = default)
//! 0x10 + channel  inner averager depth
//! 0x30 + channel  outer averager depth
//! ```

use crate::channel::{LogicalChannel, PhysicalSensor, CHANNEL_COUNT};

pub const PRESCALER_BASE: u16 = 0x00;
pub const INNER_DEPTH_BASE: u16 = 0x10;
pub const OUTER_DEPTH_BASE: u16 = 0x30;

/// Value of a byte that was never written.
pub const ERASED: u8 = 0xFF;

/// Bytes the preset layout needs.
pub const LAYOUT_SIZE: usize = OUTER_DEPTH_BASE as usize + CHANNEL_COUNT;

/// Byte-addressed non-volatile memory. Writes complete before returning.
pub trait Storage {
    fn read_byte(&mut self, address: u16) -> u8;
    fn write_byte(&mut self, address: u16, value: u8);
}

impl<T: Storage + ?Sized> Storage for &mut T {
    fn read_byte(&mut self, address: u16) -> u8 {
        (**self).read_byte(address)
    }

    fn write_byte(&mut self, address: u16, value: u8) {
        (**self).write_byte(address, value)
    }
}

/// RAM-backed storage, initially erased.
#[derive(Clone, Debug)]
pub struct MemoryStorage<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> MemoryStorage<N> {
    pub const fn new() -> Self {
        Self { bytes: [ERASED; N] }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl<const N: usize> Default for MemoryStorage<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Storage for MemoryStorage<N> {
    fn read_byte(&mut self, address: u16) -> u8 {
        self.bytes.get(usize::from(address)).copied().unwrap_or(ERASED)
    }

    fn write_byte(&mut self, address: u16, value: u8) {
        if let Some(slot) = self.bytes.get_mut(usize::from(address)) {
            *slot = value;
        }
    }
}

/// One channel's stored configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Preset {
    /// `None` when the byte is erased.
    pub prescaler: Option<u8>,
    pub inner_depth: u8,
    pub outer_depth: u8,
}

fn prescaler_address(sensor: PhysicalSensor) -> u16 {
    PRESCALER_BASE + sensor.index() as u16
}

pub fn load_preset<S: Storage>(storage: &mut S, channel: LogicalChannel) -> Preset {
    let prescaler = match storage.read_byte(prescaler_address(channel.sensor())) {
        ERASED => None,
        value => Some(value),
    };
    let depth = |value: u8| if value == ERASED { 0 } else { value };
    Preset {
        prescaler,
        inner_depth: depth(storage.read_byte(INNER_DEPTH_BASE + u16::from(channel.index()))),
        outer_depth: depth(storage.read_byte(OUTER_DEPTH_BASE + u16::from(channel.index()))),
    }
}

pub fn save_preset<S: Storage>(storage: &mut S, channel: LogicalChannel, preset: &Preset) {
    storage.write_byte(
        prescaler_address(channel.sensor()),
        preset.prescaler.unwrap_or(ERASED),
    );
    storage.write_byte(INNER_DEPTH_BASE + u16::from(channel.index()), preset.inner_depth);
    storage.write_byte(OUTER_DEPTH_BASE + u16::from(channel.index()), preset.outer_depth);
}
