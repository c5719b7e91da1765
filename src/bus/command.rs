//! Command layer of the sensor bus.
//!
//! A payload is a one-character command id followed by its parameters, each
//! parameter one byte as two hex digits. Replies echo the id and encode all
//! values as big-endian hex; a float goes out as its IEEE-754 bit pattern.
//! Any failure is answered with a lone `*`.

use heapless::Vec;
use log::{debug, warn};

use super::hex;
use super::link::REPLY_CAPACITY;
use crate::channel::LogicalChannel;
use crate::drivers::{GasSensor, ParticleCounter};
use crate::error::{ChannelError, CommandError};
use crate::led::Indicator;
use crate::orchestrator::SensorArray;
use crate::postscaler::Postscaler;
use crate::storage::Storage;

pub const ERROR_REPLY: u8 = b'*';

pub type Reply = Vec<u8, REPLY_CAPACITY>;

/// What the command handlers need from the sensor array.
pub trait SensorControl {
    fn enable_sampling(&mut self, enable: bool, now: u32);
    fn is_sampling(&self) -> bool;
    fn prescaler(&self, channel: LogicalChannel) -> u8;
    fn set_prescaler(&mut self, channel: LogicalChannel, tenths: u8) -> u8;
    fn postscaler(&self, channel: LogicalChannel) -> u8;
    fn set_postscaler(&mut self, channel: LogicalChannel, requested: u8) -> Result<Postscaler, ChannelError>;
    fn last_sample(&self, channel: LogicalChannel) -> (f32, u32);
    fn load_preset(&mut self, channel: LogicalChannel);
    fn save_preset(&mut self, channel: LogicalChannel);
}

impl<OPC, MOX, PWR, IND, ST> SensorControl for SensorArray<'_, OPC, MOX, PWR, IND, ST>
where
    OPC: ParticleCounter,
    MOX: GasSensor,
    PWR: embedded_hal::digital::OutputPin,
    IND: Indicator,
    ST: Storage,
{
    fn enable_sampling(&mut self, enable: bool, now: u32) {
        SensorArray::enable_sampling(self, enable, now)
    }

    fn is_sampling(&self) -> bool {
        SensorArray::is_sampling(self)
    }

    fn prescaler(&self, channel: LogicalChannel) -> u8 {
        SensorArray::prescaler(self, channel)
    }

    fn set_prescaler(&mut self, channel: LogicalChannel, tenths: u8) -> u8 {
        SensorArray::set_prescaler(self, channel, tenths)
    }

    fn postscaler(&self, channel: LogicalChannel) -> u8 {
        SensorArray::postscaler(self, channel)
    }

    fn set_postscaler(&mut self, channel: LogicalChannel, requested: u8) -> Result<Postscaler, ChannelError> {
        SensorArray::set_postscaler(self, channel, requested)
    }

    fn last_sample(&self, channel: LogicalChannel) -> (f32, u32) {
        SensorArray::last_sample(self, channel)
    }

    fn load_preset(&mut self, channel: LogicalChannel) {
        SensorArray::load_preset(self, channel)
    }

    fn save_preset(&mut self, channel: LogicalChannel) {
        SensorArray::save_preset(self, channel)
    }
}

/// Parsed view of a payload whose length has been checked.
pub struct Request<'a> {
    pub id: u8,
    payload: &'a [u8],
    pub now: u32,
}

impl Request<'_> {
    /// Parameter `index`, counting from zero.
    pub fn param(&self, index: usize) -> Result<u8, CommandError> {
        let at = 1 + 2 * index;
        match self.payload.get(at..at + 2) {
            Some(&[hi, lo]) => hex::decode_byte(hi, lo).ok_or(CommandError::MalformedHex),
            _ => Err(CommandError::MissingParameters { id: self.id, required: index + 1 }),
        }
    }

    pub fn channel(&self, index: usize) -> Result<LogicalChannel, CommandError> {
        Ok(LogicalChannel::new(self.param(index)?)?)
    }
}

/// Hex-encoding reply builder.
pub struct ReplyWriter {
    buf: Reply,
}

impl ReplyWriter {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn raw(&mut self, byte: u8) -> Result<(), CommandError> {
        self.buf.push(byte).map_err(|_| CommandError::ReplyOverflow)
    }

    pub fn bytes(&mut self, bytes: &[u8]) -> Result<(), CommandError> {
        for &b in bytes {
            self.buf
                .extend_from_slice(&hex::encode_byte(b))
                .map_err(|()| CommandError::ReplyOverflow)?;
        }
        Ok(())
    }

    pub fn u8(&mut self, value: u8) -> Result<(), CommandError> {
        self.bytes(&[value])
    }

    pub fn u16(&mut self, value: u16) -> Result<(), CommandError> {
        self.bytes(&value.to_be_bytes())
    }

    pub fn u32(&mut self, value: u32) -> Result<(), CommandError> {
        self.bytes(&value.to_be_bytes())
    }

    pub fn f32(&mut self, value: f32) -> Result<(), CommandError> {
        self.u32(value.to_bits())
    }

    /// Echoed id followed by the channel, the head of most replies.
    fn head(&mut self, req: &Request<'_>, channel: LogicalChannel) -> Result<(), CommandError> {
        self.raw(req.id)?;
        self.u8(channel.index())
    }
}

type Handler = fn(&mut dyn SensorControl, &Request<'_>, &mut ReplyWriter) -> Result<(), CommandError>;

pub struct Command {
    pub id: u8,
    pub params: usize,
    pub handler: Handler,
}

pub static COMMANDS: [Command; 12] = [
    Command { id: b'E', params: 0, handler: echo },
    Command { id: b'I', params: 1, handler: sensor_name },
    Command { id: b'S', params: 0, handler: start_sampling },
    Command { id: b'X', params: 0, handler: stop_sampling },
    Command { id: b'P', params: 2, handler: set_prescaler },
    Command { id: b'Q', params: 1, handler: get_prescaler },
    Command { id: b'O', params: 2, handler: set_postscaler },
    Command { id: b'N', params: 1, handler: get_postscaler },
    Command { id: b'G', params: 1, handler: last_sample_u16 },
    Command { id: b'Y', params: 1, handler: last_sample_f32 },
    Command { id: b'L', params: 1, handler: load_preset },
    Command { id: b'W', params: 1, handler: save_preset },
];

fn echo(_: &mut dyn SensorControl, req: &Request<'_>, out: &mut ReplyWriter) -> Result<(), CommandError> {
    out.raw(req.id)
}

fn sensor_name(_: &mut dyn SensorControl, req: &Request<'_>, out: &mut ReplyWriter) -> Result<(), CommandError> {
    let channel = req.channel(0)?;
    out.head(req, channel)?;
    out.bytes(channel.name().as_bytes())?;
    out.u8(0)
}

fn start_sampling(ctl: &mut dyn SensorControl, req: &Request<'_>, out: &mut ReplyWriter) -> Result<(), CommandError> {
    ctl.enable_sampling(true, req.now);
    out.raw(req.id)
}

fn stop_sampling(ctl: &mut dyn SensorControl, req: &Request<'_>, out: &mut ReplyWriter) -> Result<(), CommandError> {
    ctl.enable_sampling(false, req.now);
    out.raw(req.id)
}

fn set_prescaler(ctl: &mut dyn SensorControl, req: &Request<'_>, out: &mut ReplyWriter) -> Result<(), CommandError> {
    let channel = req.channel(0)?;
    ctl.set_prescaler(channel, req.param(1)?);
    out.head(req, channel)
}

fn get_prescaler(ctl: &mut dyn SensorControl, req: &Request<'_>, out: &mut ReplyWriter) -> Result<(), CommandError> {
    let channel = req.channel(0)?;
    out.head(req, channel)?;
    out.u8(ctl.prescaler(channel))
}

fn set_postscaler(ctl: &mut dyn SensorControl, req: &Request<'_>, out: &mut ReplyWriter) -> Result<(), CommandError> {
    let channel = req.channel(0)?;
    ctl.set_postscaler(channel, req.param(1)?)?;
    out.head(req, channel)
}

fn get_postscaler(ctl: &mut dyn SensorControl, req: &Request<'_>, out: &mut ReplyWriter) -> Result<(), CommandError> {
    let channel = req.channel(0)?;
    out.head(req, channel)?;
    out.u8(ctl.postscaler(channel))
}

fn last_sample_u16(ctl: &mut dyn SensorControl, req: &Request<'_>, out: &mut ReplyWriter) -> Result<(), CommandError> {
    let channel = req.channel(0)?;
    let (value, timestamp) = ctl.last_sample(channel);
    out.head(req, channel)?;
    // low 16 bits of the integer part; negative temperatures read as 0
    out.u16(value as u32 as u16)?;
    out.u32(timestamp)
}

fn last_sample_f32(ctl: &mut dyn SensorControl, req: &Request<'_>, out: &mut ReplyWriter) -> Result<(), CommandError> {
    let channel = req.channel(0)?;
    let (value, timestamp) = ctl.last_sample(channel);
    out.head(req, channel)?;
    out.f32(value)?;
    out.u32(timestamp)
}

fn load_preset(ctl: &mut dyn SensorControl, req: &Request<'_>, out: &mut ReplyWriter) -> Result<(), CommandError> {
    let channel = req.channel(0)?;
    ctl.load_preset(channel);
    out.head(req, channel)
}

fn save_preset(ctl: &mut dyn SensorControl, req: &Request<'_>, out: &mut ReplyWriter) -> Result<(), CommandError> {
    let channel = req.channel(0)?;
    ctl.save_preset(channel);
    out.head(req, channel)
}

/// Look up and run the command in `payload`.
pub fn execute(payload: &[u8], now: u32, ctl: &mut dyn SensorControl) -> Result<Reply, CommandError> {
    let &id = payload.first().ok_or(CommandError::Empty)?;
    let command = COMMANDS
        .iter()
        .find(|c| c.id == id)
        .ok_or(CommandError::UnknownCommand(id))?;
    if payload.len() < 1 + 2 * command.params {
        return Err(CommandError::MissingParameters { id, required: command.params });
    }

    let request = Request { id, payload, now };
    let mut out = ReplyWriter::new();
    (command.handler)(ctl, &request, &mut out)?;
    Ok(out.buf)
}

/// Like [`execute`], but failures become the `*` reply.
pub fn dispatch<C: SensorControl>(payload: &[u8], now: u32, ctl: &mut C) -> Reply {
    match execute(payload, now, ctl) {
        Ok(reply) => {
            debug!("command ok, {} byte reply", reply.len());
            reply
        }
        Err(err) => {
            warn!("command failed: {}", err);
            let mut reply = Reply::new();
            // capacity is never zero
            let _ = reply.push(ERROR_REPLY);
            reply
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records calls instead of driving hardware.
    #[derive(Default)]
    struct Recorder {
        sampling: Option<bool>,
        prescaler: u8,
        postscaler: u8,
        sample: (f32, u32),
        saved: Option<u8>,
        loaded: Option<u8>,
    }

    impl SensorControl for Recorder {
        fn enable_sampling(&mut self, enable: bool, _now: u32) {
            self.sampling = Some(enable);
        }
        fn is_sampling(&self) -> bool {
            self.sampling == Some(true)
        }
        fn prescaler(&self, _: LogicalChannel) -> u8 {
            self.prescaler
        }
        fn set_prescaler(&mut self, _: LogicalChannel, tenths: u8) -> u8 {
            self.prescaler = tenths;
            tenths
        }
        fn postscaler(&self, _: LogicalChannel) -> u8 {
            self.postscaler
        }
        fn set_postscaler(&mut self, _: LogicalChannel, requested: u8) -> Result<Postscaler, ChannelError> {
            let resolved = crate::postscaler::resolve(requested);
            self.postscaler = resolved.factor;
            Ok(resolved)
        }
        fn last_sample(&self, _: LogicalChannel) -> (f32, u32) {
            self.sample
        }
        fn load_preset(&mut self, channel: LogicalChannel) {
            self.loaded = Some(channel.index());
        }
        fn save_preset(&mut self, channel: LogicalChannel) {
            self.saved = Some(channel.index());
        }
    }

    fn run(payload: &[u8], ctl: &mut Recorder) -> Reply {
        dispatch(payload, 0, ctl)
    }

    #[test]
    fn echo_replies_with_id() {
        assert_eq!(&run(b"E", &mut Recorder::default())[..], b"E");
    }

    #[test]
    fn unknown_and_short_payloads_fail_once() {
        let mut ctl = Recorder::default();
        assert_eq!(&run(b"Z", &mut ctl)[..], b"*");
        assert_eq!(&run(b"", &mut ctl)[..], b"*");
        assert_eq!(&run(b"P05", &mut ctl)[..], b"*");
        assert_eq!(&run(b"P0", &mut ctl)[..], b"*");
        assert_eq!(ctl.prescaler, 0);
    }

    #[test]
    fn malformed_hex_and_bad_channel_fail() {
        let mut ctl = Recorder::default();
        assert_eq!(&run(b"QZZ", &mut ctl)[..], b"*");
        assert_eq!(&run(b"Q16", &mut ctl)[..], b"*");
        assert_eq!(
            execute(b"Q16", 0, &mut ctl).unwrap_err(),
            CommandError::Channel(ChannelError::OutOfRange(0x16))
        );
    }

    #[test]
    fn name_is_nul_terminated_hex() {
        let reply = run(b"I15", &mut Recorder::default());
        // "MOX_RAW\0"
        assert_eq!(&reply[..], b"I154D4F585F52415700");
    }

    #[test]
    fn prescaler_set_and_get() {
        let mut ctl = Recorder::default();
        assert_eq!(&run(b"P140A", &mut ctl)[..], b"P14");
        assert_eq!(ctl.prescaler, 10);
        assert_eq!(&run(b"Q14", &mut ctl)[..], b"Q140A");
    }

    #[test]
    fn postscaler_reply_reuses_parsed_channel() {
        let mut ctl = Recorder::default();
        assert_eq!(&run(b"O0346", &mut ctl)[..], b"O03");
        assert_eq!(&run(b"N03", &mut ctl)[..], b"N033C");
    }

    #[test]
    fn samples_are_big_endian() {
        let mut ctl = Recorder { sample: (513.75, 0x0102_0304), ..Recorder::default() };
        assert_eq!(&run(b"G00", &mut ctl)[..], b"G00020101020304");
        assert_eq!(&run(b"Y00", &mut ctl)[..], b"Y004400700001020304");
    }

    #[test]
    fn short_sample_is_truncated_to_16_bits() {
        let mut ctl = Recorder { sample: (70_000.0, 1), ..Recorder::default() };
        assert_eq!(&run(b"G15", &mut ctl)[..], b"G15117000000001");
        ctl.sample = (-3.5, 1);
        assert_eq!(&run(b"G13", &mut ctl)[..], b"G13000000000001");
    }

    #[test]
    fn sampling_and_presets() {
        let mut ctl = Recorder::default();
        assert_eq!(&run(b"S", &mut ctl)[..], b"S");
        assert_eq!(ctl.sampling, Some(true));
        assert_eq!(&run(b"X", &mut ctl)[..], b"X");
        assert_eq!(ctl.sampling, Some(false));
        assert_eq!(&run(b"W02", &mut ctl)[..], b"W02");
        assert_eq!(ctl.saved, Some(2));
        assert_eq!(&run(b"L02", &mut ctl)[..], b"L02");
        assert_eq!(ctl.loaded, Some(2));
    }
}
