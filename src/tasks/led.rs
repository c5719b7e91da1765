use defmt::trace;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Receiver;
use embassy_sync::mutex::Mutex;
use esp_hal::rmt::Channel as RmtChannel;
use esp_hal::Blocking;

use crate::led::{Led, LedCommand, LED_QUEUE_DEPTH};

#[embassy_executor::task]
pub async fn led_task(
    led_receiver: Receiver<'static, NoopRawMutex, LedCommand, LED_QUEUE_DEPTH>,
    led: &'static Mutex<NoopRawMutex, Led<RmtChannel<Blocking, 0>>>,
) {
    loop {
        // Wait for a command from the channel
        let command = led_receiver.receive().await;
        trace!("LED {}", command);
        match command {
            LedCommand::Solid(r, g, b) => led.lock().await.set_color_rgb(r, g, b),
            LedCommand::Off => led.lock().await.set_color_rgb(0, 0, 0),
        }
    }
}
