//! Frame layer of the sensor bus.
//!
//! ```text
//! host  -> board   [ <version> <id hi> <id lo> payload ]
//! board -> host    ( <version> <id hi> <id lo> payload )
//! ```
//!
//! The receiver is a byte-at-a-time state machine. A header byte restarts
//! it from any state, and a frame that is not finished within the frame
//! timeout is dropped. Framing errors are never answered.

use heapless::Vec;
use log::debug;

use super::hex;
use crate::clock::elapsed;
use crate::config::Config;
use crate::led::Indicator;

pub const HOST_HEADER: u8 = b'[';
pub const HOST_TRAILER: u8 = b']';
pub const BOARD_HEADER: u8 = b'(';
pub const BOARD_TRAILER: u8 = b')';

/// Largest payload the receiver accepts.
pub const FRAME_CAPACITY: usize = 32;
/// Largest reply payload.
pub const REPLY_CAPACITY: usize = 48;
/// Header, version, two id digits, trailer.
const FRAMING_OVERHEAD: usize = 5;

pub type Payload = Vec<u8, FRAME_CAPACITY>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxState {
    Searching,
    HeaderFound,
    VersionFound,
    AddressMsbFound { msb: u8 },
    Receiving,
}

/// Debug flash on rx/tx, switched off for good after the idle timeout
/// until [`Link::enable_debug_indicator`] is called again.
struct DebugFlash<IND> {
    led: IND,
    enabled: bool,
    armed_at: u32,
    lit_at: Option<u32>,
}

pub struct Link<IND> {
    board_id: u8,
    version: u8,
    frame_timeout_ms: u32,
    flash_ms: u32,
    idle_timeout_ms: u32,
    state: RxState,
    frame_start: u32,
    rx: Payload,
    tx: Vec<u8, { REPLY_CAPACITY + FRAMING_OVERHEAD }>,
    tx_pending: bool,
    debug: DebugFlash<IND>,
}

impl<IND: Indicator> Link<IND> {
    pub fn new(config: &Config, board_id: u8, led: IND) -> Self {
        Self {
            board_id,
            version: config.protocol_version,
            frame_timeout_ms: config.frame_timeout_ms,
            flash_ms: config.debug_flash_ms,
            idle_timeout_ms: config.debug_idle_timeout_ms,
            state: RxState::Searching,
            frame_start: 0,
            rx: Vec::new(),
            tx: Vec::new(),
            tx_pending: false,
            debug: DebugFlash {
                led,
                enabled: true,
                armed_at: 0,
                lit_at: None,
            },
        }
    }

    pub fn board_id(&self) -> u8 {
        self.board_id
    }

    pub fn state(&self) -> RxState {
        self.state
    }

    /// No frame is being received.
    pub fn is_idle(&self) -> bool {
        self.state == RxState::Searching
    }

    fn abort(&mut self, reason: &str) {
        debug!("link: frame dropped ({})", reason);
        self.state = RxState::Searching;
        self.rx.clear();
    }

    /// Drop a frame that has been open for too long.
    pub fn check_timeout(&mut self, now: u32) {
        if self.state != RxState::Searching && elapsed(now, self.frame_start, self.frame_timeout_ms) {
            self.abort("timeout");
        }
    }

    /// Feed one received byte. Returns the payload once a complete frame
    /// addressed to this board has arrived.
    pub fn receive(&mut self, byte: u8, now: u32) -> Option<Payload> {
        self.check_timeout(now);

        if byte == HOST_HEADER {
            if self.state != RxState::Searching {
                debug!("link: header inside frame, restarting");
            }
            self.state = RxState::HeaderFound;
            self.frame_start = now;
            self.rx.clear();
            return None;
        }

        match self.state {
            RxState::Searching => {}
            RxState::HeaderFound => {
                if byte == self.version {
                    self.state = RxState::VersionFound;
                } else {
                    self.abort("version");
                }
            }
            RxState::VersionFound => match hex::nibble(byte) {
                Some(msb) => self.state = RxState::AddressMsbFound { msb },
                None => self.abort("address"),
            },
            RxState::AddressMsbFound { msb } => match hex::nibble(byte) {
                Some(lsb) if (msb << 4 | lsb) == self.board_id => self.state = RxState::Receiving,
                Some(_) => self.abort("not addressed"),
                None => self.abort("address"),
            },
            RxState::Receiving => {
                if byte == HOST_TRAILER {
                    self.state = RxState::Searching;
                    self.flash(now);
                    return Some(core::mem::take(&mut self.rx));
                }
                if self.rx.push(byte).is_err() {
                    self.abort("overflow");
                }
            }
        }
        None
    }

    /// Wrap `payload` in a board frame and hold it until the receiver is
    /// idle. Returns `false` if it does not fit.
    pub fn queue_reply(&mut self, payload: &[u8]) -> bool {
        self.tx.clear();
        let [id_hi, id_lo] = hex::encode_byte(self.board_id);
        let fits = self
            .tx
            .extend_from_slice(&[BOARD_HEADER, self.version, id_hi, id_lo])
            .and_then(|()| self.tx.extend_from_slice(payload))
            .and_then(|()| self.tx.push(BOARD_TRAILER).map_err(|_| ()))
            .is_ok();
        if !fits {
            debug!("link: reply of {} bytes does not fit", payload.len());
            self.tx.clear();
        }
        self.tx_pending = fits;
        fits
    }

    pub fn has_pending_reply(&self) -> bool {
        self.tx_pending
    }

    /// The queued frame, once the receiver is idle. Each frame is handed out
    /// once.
    pub fn poll_transmit(&mut self, now: u32) -> Option<&[u8]> {
        if !self.tx_pending || !self.is_idle() {
            return None;
        }
        self.tx_pending = false;
        self.flash(now);
        Some(&self.tx)
    }

    /// Switch the debug flash back on and restart its idle timeout.
    pub fn enable_debug_indicator(&mut self, now: u32) {
        self.debug.enabled = true;
        self.debug.armed_at = now;
    }

    pub fn debug_indicator_enabled(&self) -> bool {
        self.debug.enabled
    }

    fn flash(&mut self, now: u32) {
        if self.debug.enabled {
            self.debug.led.set(true);
            self.debug.lit_at = Some(now);
        }
    }

    /// Expire the flash and the idle timeout.
    pub fn service_indicator(&mut self, now: u32) {
        if let Some(lit_at) = self.debug.lit_at {
            if elapsed(now, lit_at, self.flash_ms) {
                self.debug.led.set(false);
                self.debug.lit_at = None;
            }
        }
        if self.debug.enabled && elapsed(now, self.debug.armed_at, self.idle_timeout_ms) {
            debug!("link: debug indicator idle, disabled");
            self.debug.enabled = false;
            self.debug.lit_at = None;
            self.debug.led.set(false);
        }
    }

    pub fn indicator(&self) -> &IND {
        &self.debug.led
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::led::NoIndicator;

    fn link(id: u8) -> Link<NoIndicator> {
        Link::new(&Config::new(), id, NoIndicator)
    }

    fn feed(link: &mut Link<NoIndicator>, bytes: &[u8], now: u32) -> Option<Payload> {
        let mut out = None;
        for b in bytes {
            if let Some(p) = link.receive(*b, now) {
                out = Some(p);
            }
        }
        out
    }

    #[test]
    fn accepts_addressed_frame() {
        let mut l = link(0x2A);
        let payload = feed(&mut l, b"[02AQ05]", 0).unwrap();
        assert_eq!(&payload[..], b"Q05");
        assert!(l.is_idle());
    }

    #[test]
    fn ignores_other_boards() {
        let mut l = link(0x2A);
        assert!(feed(&mut l, b"[02BXYZ]", 0).is_none());
        assert_eq!(l.state(), RxState::Searching);
        assert_eq!(&feed(&mut l, b"[02aE]", 0).unwrap()[..], b"E");
    }

    #[test]
    fn wrong_version_aborts() {
        let mut l = link(0x01);
        assert!(feed(&mut l, b"[101E]", 0).is_none());
    }

    #[test]
    fn header_restarts_frame() {
        let mut l = link(0x01);
        let payload = feed(&mut l, b"[01GAR[001E]", 0).unwrap();
        assert_eq!(&payload[..], b"E");
    }

    #[test]
    fn stale_frame_times_out() {
        let mut l = link(0x01);
        assert!(feed(&mut l, b"[001E", 0).is_none());
        assert_eq!(l.state(), RxState::Receiving);
        assert!(l.receive(HOST_TRAILER, 150).is_none());
        assert!(l.is_idle());

        l.receive(HOST_HEADER, 200);
        l.check_timeout(400);
        assert!(l.is_idle());
    }

    #[test]
    fn overflow_aborts() {
        let mut l = link(0x01);
        let mut frame = Vec::<u8, 64>::new();
        frame.extend_from_slice(b"[001").unwrap();
        frame.extend_from_slice(&[b'A'; FRAME_CAPACITY + 1]).unwrap();
        frame.push(HOST_TRAILER).unwrap();
        assert!(feed(&mut l, &frame, 0).is_none());
        assert!(l.is_idle());
    }

    #[test]
    fn reply_waits_for_idle_receiver() {
        let mut l = link(0x0C);
        assert!(l.queue_reply(b"E"));
        l.receive(HOST_HEADER, 0);
        assert!(l.poll_transmit(0).is_none());
        l.check_timeout(500);
        assert_eq!(l.poll_transmit(500), Some(&b"(00CE)"[..]));
        assert!(l.poll_transmit(500).is_none());
    }

    /// Remembers the lamp state and counts switch-ons.
    #[derive(Default)]
    struct Lamp {
        on: bool,
        flashes: usize,
    }

    impl Indicator for Lamp {
        fn set(&mut self, on: bool) {
            if on && !self.on {
                self.flashes += 1;
            }
            self.on = on;
        }
    }

    fn lamp_link(config: Config) -> Link<Lamp> {
        Link::new(&config, 0x01, Lamp::default())
    }

    fn feed_lamp(link: &mut Link<Lamp>, bytes: &[u8], now: u32) -> Option<Payload> {
        bytes.iter().fold(None, |out, &b| link.receive(b, now).or(out))
    }

    #[test]
    fn frame_receipt_flashes_until_flash_time() {
        let mut l = lamp_link(Config::new());
        assert!(feed_lamp(&mut l, b"[001E]", 100).is_some());
        assert!(l.indicator().on);

        l.service_indicator(149);
        assert!(l.indicator().on);
        l.service_indicator(150);
        assert!(!l.indicator().on);
        assert_eq!(l.indicator().flashes, 1);
    }

    #[test]
    fn transmission_flashes() {
        let mut l = lamp_link(Config::new());
        assert!(l.queue_reply(b"E"));
        assert!(!l.indicator().on);
        assert!(l.poll_transmit(10).is_some());
        assert!(l.indicator().on);
        l.service_indicator(60);
        assert!(!l.indicator().on);
    }

    #[test]
    fn idle_timeout_disables_flash_until_rearmed() {
        let mut l = lamp_link(Config::new().with_debug_idle_timeout_ms(1_000));
        l.service_indicator(999);
        assert!(l.debug_indicator_enabled());
        l.service_indicator(1_000);
        assert!(!l.debug_indicator_enabled());

        assert!(feed_lamp(&mut l, b"[001E]", 1_100).is_some());
        assert!(!l.indicator().on);
        assert_eq!(l.indicator().flashes, 0);

        l.enable_debug_indicator(1_200);
        assert!(feed_lamp(&mut l, b"[001E]", 1_200).is_some());
        assert!(l.indicator().on);
        assert_eq!(l.indicator().flashes, 1);
    }

    #[test]
    fn idle_timeout_clears_a_lit_flash() {
        let mut l = lamp_link(Config::new().with_debug_flash_ms(500).with_debug_idle_timeout_ms(1_000));
        feed_lamp(&mut l, b"[001E]", 900);
        assert!(l.indicator().on);
        l.service_indicator(1_000);
        assert!(!l.indicator().on);
        assert!(!l.debug_indicator_enabled());
    }

    #[test]
    fn oversized_reply_is_refused() {
        let mut l = link(0x0C);
        assert!(!l.queue_reply(&[b'0'; REPLY_CAPACITY + 1]));
        assert!(!l.has_pending_reply());
    }
}
