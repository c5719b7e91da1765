use defmt::info;
use embassy_time::{Duration, Ticker};

use crate::clock::SystemClock;
use crate::sampler::Sampler;

/// Base tick: advances the clock and clocks both samplers.
#[embassy_executor::task]
pub async fn tick_task(
    clock: &'static SystemClock,
    samplers: [&'static Sampler; 2],
    period_ms: u32,
) {
    info!("tick every {} ms", period_ms);
    let mut ticker = Ticker::every(Duration::from_millis(u64::from(period_ms)));
    loop {
        ticker.next().await;
        let now = clock.advance(period_ms);
        for sampler in samplers {
            sampler.tick(now);
        }
    }
}
