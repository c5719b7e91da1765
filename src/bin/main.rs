#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]

use defmt::{error, info, warn};
use embassy_executor::Spawner;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, Timer};
use embedded_hal_bus::spi::ExclusiveDevice;
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::rmt::{Channel as RmtChannel, Rmt};
use esp_hal::spi::master::{Config as SpiConfig, Spi};
use esp_hal::spi::Mode;
use esp_hal::time::Rate;
use esp_hal::timer::systimer::SystemTimer;
use esp_hal::uart::{Config as UartConfig, Uart};
use esp_hal::Blocking;
use panic_rtt_target as _;
use rtt_target::rtt_init;
use static_cell::StaticCell;

use opc_mox_shield::drivers::{OpcN2, Sgp41};
use opc_mox_shield::hal::board_id;
use opc_mox_shield::led::{Led, LedCommand, LedIndicator, LED_QUEUE_DEPTH};
use opc_mox_shield::storage::LAYOUT_SIZE;
use opc_mox_shield::tasks::{led_task, tick_task};
use opc_mox_shield::{Config, MemoryStorage, Sampler, SensorArray, SensorBus, Shield, SystemClock};

// ── state shared with the tick task ──────────────────────────────────────────
static CLOCK: SystemClock = SystemClock::new();
static OPC_SAMPLER: Sampler = Sampler::new();
static MOX_SAMPLER: Sampler = Sampler::new();

static LED_CHANNEL: StaticCell<Channel<NoopRawMutex, LedCommand, LED_QUEUE_DEPTH>> = StaticCell::new();
static LED_CELL: StaticCell<Mutex<NoopRawMutex, Led<RmtChannel<Blocking, 0>>>> = StaticCell::new();

const SAMPLE_COLOR: (u8, u8, u8) = (0, 24, 0);
const DEBUG_COLOR: (u8, u8, u8) = (0, 0, 24);
const BUS_BAUD: u32 = 9600;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    // defmt on channel 0, the core's `log` output on channel 1
    let channels = rtt_init! {
        up: {
            0: { size: 1024, name: "defmt" }
            1: { size: 1024, name: "Terminal" }
        }
    };
    rtt_target::set_defmt_channel(channels.up.0);
    rtt_target::set_print_channel(channels.up.1);
    rtt_target::init_logger_with_level(log::LevelFilter::Info);

    let hal_config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(hal_config);

    let timer0 = SystemTimer::new(peripherals.SYSTIMER);
    esp_hal_embassy::init(timer0.alarm0);
    info!("Embassy initialized!");

    let config = Config::new();

    // ── board address ────────────────────────────────────────────────────────
    let pull_up = InputConfig::default().with_pull(Pull::Up);
    let mut address_pins = [
        Input::new(peripherals.GPIO18, pull_up),
        Input::new(peripherals.GPIO19, pull_up),
        Input::new(peripherals.GPIO20, pull_up),
        Input::new(peripherals.GPIO21, pull_up),
    ];
    let id = match board_id(&mut address_pins) {
        Ok(id) => id,
        Err(never) => match never {},
    };
    info!("Board id {=u8:#x}", id);
    let debug_button = Input::new(peripherals.GPIO9, pull_up);

    // ── status LED ───────────────────────────────────────────────────────────
    let Ok(rmt) = Rmt::new(peripherals.RMT, Rate::from_mhz(80)) else {
        error!("RMT initialization failed");
        loop {
            Timer::after(Duration::from_millis(1000)).await;
        }
    };
    let led = LED_CELL.init(Mutex::new(Led::new_ws2812(rmt.channel0, peripherals.GPIO8)));
    let led_channel: &'static Channel<NoopRawMutex, LedCommand, LED_QUEUE_DEPTH> = LED_CHANNEL.init(Channel::new());

    // ── MOX sensor: SGP41 on GPIO4 (SDA) and GPIO5 (SCL) ─────────────────────
    let i2c_config = I2cConfig::default().with_frequency(Rate::from_khz(400));
    let i2c = match I2c::new(peripherals.I2C0, i2c_config) {
        Ok(i2c) => i2c.with_sda(peripherals.GPIO4).with_scl(peripherals.GPIO5),
        Err(_) => {
            error!("I2C initialization failed");
            loop {
                Timer::after(Duration::from_millis(1000)).await;
            }
        }
    };

    // ── OPC: SPI mode 1, chip select on GPIO1 ────────────────────────────────
    let spi_config = SpiConfig::default()
        .with_frequency(Rate::from_khz(500))
        .with_mode(Mode::_1);
    let spi = match Spi::new(peripherals.SPI2, spi_config) {
        Ok(spi) => spi
            .with_sck(peripherals.GPIO6)
            .with_mosi(peripherals.GPIO7)
            .with_miso(peripherals.GPIO2),
        Err(_) => {
            error!("SPI initialization failed");
            loop {
                Timer::after(Duration::from_millis(1000)).await;
            }
        }
    };
    let cs = Output::new(peripherals.GPIO1, Level::High, OutputConfig::default());
    let opc_spi = match ExclusiveDevice::new(spi, cs, Delay::new()) {
        Ok(dev) => dev,
        Err(never) => match never {},
    };

    // sensor supply rail, off until sampling starts
    let power = Output::new(peripherals.GPIO3, Level::Low, OutputConfig::default());

    // ── host bus on UART1 ────────────────────────────────────────────────────
    let mut port = match Uart::new(peripherals.UART1, UartConfig::default().with_baudrate(BUS_BAUD)) {
        Ok(uart) => uart.with_rx(peripherals.GPIO23).with_tx(peripherals.GPIO22),
        Err(_) => {
            error!("UART initialization failed");
            loop {
                Timer::after(Duration::from_millis(1000)).await;
            }
        }
    };

    // no EEPROM on this board; presets live until reset
    let storage = MemoryStorage::<LAYOUT_SIZE>::new();
    let shield = Shield {
        opc: OpcN2::new(opc_spi, config.opc_grace_reads),
        mox: Sgp41::new(i2c),
        power,
        indicator: LedIndicator::new(led_channel.sender(), SAMPLE_COLOR),
    };
    let mut array = SensorArray::new(config, shield, storage, &OPC_SAMPLER, &MOX_SAMPLER);
    let mut bus = SensorBus::new(&config, id, LedIndicator::new(led_channel.sender(), DEBUG_COLOR));

    if spawner.spawn(led_task(led_channel.receiver(), led)).is_err() {
        error!("Failed to spawn LED task");
    }
    if spawner
        .spawn(tick_task(&CLOCK, [&OPC_SAMPLER, &MOX_SAMPLER], config.tick_period_ms))
        .is_err()
    {
        error!("Failed to spawn tick task");
    }

    info!("Scheduler running");
    loop {
        let now = CLOCK.now();
        if debug_button.is_low() {
            bus.link_mut().enable_debug_indicator(now);
        }
        array.task(now);
        if bus.service(&mut port, now, &mut array).is_err() {
            warn!("Serial bus error");
        }
        Timer::after(Duration::from_millis(1)).await;
    }
}
