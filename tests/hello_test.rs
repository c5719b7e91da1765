//! On-target smoke tests, run with `cargo test --features esp32c6`.

#![no_std]
#![no_main]

#[cfg(test)]
#[embedded_test::tests(executor = esp_hal_embassy::Executor::new())]
mod tests {
    use defmt::assert_eq;
    use embassy_time::{Duration, Timer};
    use esp_hal as _;
    use opc_mox_shield::{Sampler, SystemClock};

    #[init]
    fn init() {
        let peripherals = esp_hal::init(esp_hal::Config::default());

        let timer0 = esp_hal::timer::systimer::SystemTimer::new(peripherals.SYSTIMER);
        esp_hal_embassy::init(timer0.alarm0);

        rtt_target::rtt_init_defmt!();
    }

    #[test]
    async fn sampler_runs_under_critical_section() {
        static CLOCK: SystemClock = SystemClock::new();
        static SAMPLER: Sampler = Sampler::new();

        SAMPLER.set_prescaler(1);
        let mut pulses = 0;
        for _ in 0..30 {
            Timer::after(Duration::from_millis(1)).await;
            if SAMPLER.tick(CLOCK.advance(10)) {
                pulses += 1;
            }
        }
        assert_eq!(pulses, 3);
        assert_eq!(CLOCK.now(), 300);
        assert_eq!(SAMPLER.take(), (true, 300));
    }
}
