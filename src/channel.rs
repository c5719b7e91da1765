//! Logical measurement channels and their physical sensors.

use crate::error::ChannelError;

/// Histogram bins reported by the particle counter.
pub const OPC_BINS: usize = 16;

/// First channel served by the MOX sensor; everything below is OPC-derived.
pub const MOX_FIRST_CHANNEL: u8 = 21;

/// Total number of logical channels.
pub const CHANNEL_COUNT: usize = 22;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PhysicalSensor {
    Opc,
    Mox,
}

impl PhysicalSensor {
    pub const COUNT: usize = 2;

    pub const fn index(self) -> usize {
        match self {
            Self::Opc => 0,
            Self::Mox => 1,
        }
    }
}

/// What a logical channel carries.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Quantity {
    /// Particle density of one histogram bin, counts per ml.
    Bin(u8),
    Pm1,
    Pm2_5,
    Pm10,
    /// Degrees Celsius; may be negative.
    Temperature,
    /// Sampled air volume, ml. Summed, not averaged.
    Volume,
    /// Raw MOX signal ticks.
    MoxRaw,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LogicalChannel(u8);

impl LogicalChannel {
    pub const PM1: Self = Self(16);
    pub const PM2_5: Self = Self(17);
    pub const PM10: Self = Self(18);
    pub const TEMPERATURE: Self = Self(19);
    pub const VOLUME: Self = Self(20);
    pub const MOX: Self = Self(MOX_FIRST_CHANNEL);

    pub fn new(index: u8) -> Result<Self, ChannelError> {
        if usize::from(index) < CHANNEL_COUNT {
            Ok(Self(index))
        } else {
            Err(ChannelError::OutOfRange(index))
        }
    }

    pub const fn bin(bin: u8) -> Self {
        Self(bin)
    }

    pub const fn index(self) -> u8 {
        self.0
    }

    pub const fn slot(self) -> usize {
        self.0 as usize
    }

    pub const fn sensor(self) -> PhysicalSensor {
        if self.0 < MOX_FIRST_CHANNEL {
            PhysicalSensor::Opc
        } else {
            PhysicalSensor::Mox
        }
    }

    pub const fn quantity(self) -> Quantity {
        match self.0 {
            0..=15 => Quantity::Bin(self.0),
            16 => Quantity::Pm1,
            17 => Quantity::Pm2_5,
            18 => Quantity::Pm10,
            19 => Quantity::Temperature,
            20 => Quantity::Volume,
            _ => Quantity::MoxRaw,
        }
    }

    /// Name reported by the `I` command.
    pub const fn name(self) -> &'static str {
        const BIN_NAMES: [&str; OPC_BINS] = [
            "OPC_BIN00", "OPC_BIN01", "OPC_BIN02", "OPC_BIN03", "OPC_BIN04", "OPC_BIN05",
            "OPC_BIN06", "OPC_BIN07", "OPC_BIN08", "OPC_BIN09", "OPC_BIN10", "OPC_BIN11",
            "OPC_BIN12", "OPC_BIN13", "OPC_BIN14", "OPC_BIN15",
        ];
        match self.quantity() {
            Quantity::Bin(bin) => BIN_NAMES[bin as usize],
            Quantity::Pm1 => "OPC_PM1",
            Quantity::Pm2_5 => "OPC_PM2_5",
            Quantity::Pm10 => "OPC_PM10",
            Quantity::Temperature => "OPC_TEMP",
            Quantity::Volume => "OPC_VOLUME",
            Quantity::MoxRaw => "MOX_RAW",
        }
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (0..CHANNEL_COUNT as u8).map(Self)
    }
}
