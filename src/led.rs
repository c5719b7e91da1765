//! Status indication.
//!
//! The core only needs an on/off [`Indicator`]. On the board both
//! indicators (sample toggle, bus debug flash) share one WS2812 pixel and
//! talk to it through the LED task.

/// Something that can be switched on and off.
pub trait Indicator {
    fn set(&mut self, on: bool);
}

impl<T: Indicator + ?Sized> Indicator for &mut T {
    fn set(&mut self, on: bool) {
        (**self).set(on)
    }
}

/// Indicator for builds without a status LED.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoIndicator;

impl Indicator for NoIndicator {
    fn set(&mut self, _on: bool) {}
}

#[cfg(feature = "esp32c6")]
pub use board::{Led, LedCommand, LedIndicator, LED_QUEUE_DEPTH};

#[cfg(feature = "esp32c6")]
mod board {
    use defmt::debug;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use embassy_sync::channel::Sender;
    use esp_hal::gpio::OutputPin;
    use esp_hal::rmt::{TxChannel, TxChannelCreator};
    use esp_hal_smartled::{smart_led_buffer, SmartLedsAdapter};
    use smart_leds::{SmartLedsWrite, RGB8};

    use super::Indicator;

    pub const LED_QUEUE_DEPTH: usize = 4;

    /// WS2812 status pixel.
    pub struct Led<TX>
    where
        TX: TxChannel,
    {
        ws2812: SmartLedsAdapter<TX, 25>,
    }

    impl<TX> Led<TX>
    where
        TX: TxChannel,
    {
        pub fn new_ws2812<C, O>(channel: C, pin: O) -> Self
        where
            C: TxChannelCreator<'static, TX>,
            O: OutputPin + 'static,
        {
            Self {
                ws2812: SmartLedsAdapter::new(channel, pin, smart_led_buffer!(1)),
            }
        }

        pub fn set_color_rgb(&mut self, r: u8, g: u8, b: u8) {
            if self.ws2812.write([RGB8::new(r, g, b)].iter().cloned()).is_err() {
                debug!("WS2812 write failed");
            }
        }
    }

    // Messages for the LED task
    #[derive(Copy, Clone, defmt::Format)]
    pub enum LedCommand {
        Solid(u8, u8, u8),
        Off,
    }

    /// Sends a fixed colour to the LED task when switched on.
    pub struct LedIndicator {
        sender: Sender<'static, NoopRawMutex, LedCommand, LED_QUEUE_DEPTH>,
        color: (u8, u8, u8),
    }

    impl LedIndicator {
        pub fn new(
            sender: Sender<'static, NoopRawMutex, LedCommand, LED_QUEUE_DEPTH>,
            color: (u8, u8, u8),
        ) -> Self {
            Self { sender, color }
        }
    }

    impl Indicator for LedIndicator {
        fn set(&mut self, on: bool) {
            let (r, g, b) = self.color;
            let command = if on { LedCommand::Solid(r, g, b) } else { LedCommand::Off };
            // a full queue only drops a blink
            let _ = self.sender.try_send(command);
        }
    }
}
