//! Error types for the shield core.
//!
//! Everything here is `Copy` and allocation free; the firmware logs an error
//! and carries on, nothing unwinds.

use core::fmt;

/// Averager reconfiguration failure.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AveragerError {
    /// Requested depth does not fit the backing buffer.
    DepthOutOfRange {
        /// The depth that was asked for
        requested: usize,
        /// Buffer capacity; valid depths are `0..capacity`
        capacity: usize,
    },
}

impl fmt::Display for AveragerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DepthOutOfRange { requested, capacity } => {
                write!(f, "depth {} out of range (capacity {})", requested, capacity)
            }
        }
    }
}

/// Errors reported by the sensor array accessors.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelError {
    /// Logical channel index beyond the channel table.
    OutOfRange(u8),
    /// The averager rejected the resolved depth.
    Averager(AveragerError),
}

impl From<AveragerError> for ChannelError {
    fn from(err: AveragerError) -> Self {
        Self::Averager(err)
    }
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange(index) => write!(f, "channel {} out of range", index),
            Self::Averager(err) => write!(f, "averager: {}", err),
        }
    }
}

/// Dispatch failures. Each one is answered with a single `*` reply.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// Empty payload.
    Empty,
    /// No command with this id.
    UnknownCommand(u8),
    /// Payload shorter than the command's parameter list.
    MissingParameters {
        /// Command id
        id: u8,
        /// Parameters the command needs
        required: usize,
    },
    /// A parameter was not a pair of hex digits.
    MalformedHex,
    /// Reply does not fit the frame buffer.
    ReplyOverflow,
    /// The handler rejected the request.
    Channel(ChannelError),
}

impl From<ChannelError> for CommandError {
    fn from(err: ChannelError) -> Self {
        Self::Channel(err)
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("empty payload"),
            Self::UnknownCommand(id) => write!(f, "unknown command 0x{:02X}", id),
            Self::MissingParameters { id, required } => {
                write!(f, "command '{}' needs {} parameter(s)", *id as char, required)
            }
            Self::MalformedHex => f.write_str("malformed hex parameter"),
            Self::ReplyOverflow => f.write_str("reply overflows frame buffer"),
            Self::Channel(err) => write!(f, "{}", err),
        }
    }
}

/// Sensor driver failures. The orchestrator treats all of them as "no sample
/// this cycle".
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverError<E> {
    /// Underlying SPI/I2C transfer failed.
    Bus(E),
    /// A transaction is already in flight.
    Busy,
    /// Checksum or CRC mismatch.
    Checksum,
    /// Flow rate or sampling period not positive.
    Implausible,
}

impl<E: fmt::Debug> fmt::Display for DriverError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(err) => write!(f, "bus error: {:?}", err),
            Self::Busy => f.write_str("transaction in flight"),
            Self::Checksum => f.write_str("checksum mismatch"),
            Self::Implausible => f.write_str("implausible reading"),
        }
    }
}
