//! Serial sensor bus: framing, command dispatch and the byte pump.

pub mod command;
pub mod hex;
pub mod link;

use embedded_io::{Read, ReadReady, Write};
use log::debug;

use crate::config::Config;
use crate::led::Indicator;

pub use command::{dispatch, SensorControl, ERROR_REPLY};
pub use link::{Link, RxState};

/// Bytes pulled from the port per read.
const RX_CHUNK: usize = 16;

/// Link layer plus command dispatch for one board.
pub struct SensorBus<IND> {
    link: Link<IND>,
    was_sampling: bool,
}

impl<IND: Indicator> SensorBus<IND> {
    pub fn new(config: &Config, board_id: u8, debug_led: IND) -> Self {
        Self {
            link: Link::new(config, board_id, debug_led),
            was_sampling: false,
        }
    }

    pub fn link(&self) -> &Link<IND> {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut Link<IND> {
        &mut self.link
    }

    /// Feed one byte. Returns `true` if it completed a frame and a reply
    /// was queued.
    pub fn handle_byte<C: SensorControl>(&mut self, byte: u8, now: u32, ctl: &mut C) -> bool {
        match self.link.receive(byte, now) {
            Some(payload) => {
                let reply = dispatch(&payload, now, ctl);
                self.link.queue_reply(&reply)
            }
            None => false,
        }
    }

    /// Re-arm the debug flash when a sampling session begins.
    fn follow_sampling<C: SensorControl>(&mut self, now: u32, ctl: &C) {
        let sampling = ctl.is_sampling();
        if sampling && !self.was_sampling {
            if !self.link.debug_indicator_enabled() {
                debug!("bus: sampling started, debug indicator re-armed");
            }
            self.link.enable_debug_indicator(now);
        }
        self.was_sampling = sampling;
    }

    /// One scheduler pass: drain whatever `port` has buffered, answer
    /// complete frames and expire the debug flash. Never blocks on input.
    pub fn service<P, C>(&mut self, port: &mut P, now: u32, ctl: &mut C) -> Result<(), P::Error>
    where
        P: Read + ReadReady + Write,
        C: SensorControl,
    {
        self.link.check_timeout(now);

        let mut buf = [0u8; RX_CHUNK];
        while port.read_ready()? {
            let n = port.read(&mut buf)?;
            if n == 0 {
                break;
            }
            for &byte in &buf[..n] {
                self.handle_byte(byte, now, ctl);
                if let Some(frame) = self.link.poll_transmit(now) {
                    port.write_all(frame)?;
                }
            }
        }
        if let Some(frame) = self.link.poll_transmit(now) {
            port.write_all(frame)?;
        }
        port.flush()?;

        self.follow_sampling(now, ctl);
        self.link.service_indicator(now);
        Ok(())
    }
}
