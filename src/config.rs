//! Firmware timing and protocol configuration.
//!
//! All durations are milliseconds of the [`SystemClock`](crate::clock::SystemClock).

/// Runtime configuration shared by the orchestrator and the sensor bus.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Period of the tick source driving the samplers.
    pub tick_period_ms: u32,
    /// Time the shield needs after power-on before the sensors answer.
    pub startup_settle_ms: u32,
    /// Pause between the other power sequencing steps.
    pub step_settle_ms: u32,
    /// A frame not completed within this time after its header is dropped.
    pub frame_timeout_ms: u32,
    /// On-time of the debug indicator pulse on rx/tx.
    pub debug_flash_ms: u32,
    /// Debug pulsing switches itself off after this much time.
    pub debug_idle_timeout_ms: u32,
    /// Protocol version character following the frame header.
    pub protocol_version: u8,
    /// Histogram reads dropped after any fan/laser change.
    pub opc_grace_reads: u8,
    /// Prescaler used when the stored byte is erased, in tenths of a second.
    pub default_prescaler: u8,
    /// Smallest prescaler accepted for the MOX sensor, in tenths of a second.
    pub mox_min_prescaler: u8,
}

impl Config {
    pub const fn new() -> Self {
        Self {
            tick_period_ms: 10,
            startup_settle_ms: 5_000,
            step_settle_ms: 500,
            frame_timeout_ms: 100,
            debug_flash_ms: 50,
            debug_idle_timeout_ms: 600_000,
            protocol_version: b'0',
            opc_grace_reads: 2,
            default_prescaler: 10,
            mox_min_prescaler: 10,
        }
    }

    pub const fn with_tick_period_ms(mut self, ms: u32) -> Self {
        self.tick_period_ms = ms;
        self
    }

    pub const fn with_startup_settle_ms(mut self, ms: u32) -> Self {
        self.startup_settle_ms = ms;
        self
    }

    pub const fn with_step_settle_ms(mut self, ms: u32) -> Self {
        self.step_settle_ms = ms;
        self
    }

    pub const fn with_frame_timeout_ms(mut self, ms: u32) -> Self {
        self.frame_timeout_ms = ms;
        self
    }

    pub const fn with_debug_flash_ms(mut self, ms: u32) -> Self {
        self.debug_flash_ms = ms;
        self
    }

    pub const fn with_debug_idle_timeout_ms(mut self, ms: u32) -> Self {
        self.debug_idle_timeout_ms = ms;
        self
    }

    pub const fn with_protocol_version(mut self, version: u8) -> Self {
        self.protocol_version = version;
        self
    }

    pub const fn with_opc_grace_reads(mut self, reads: u8) -> Self {
        self.opc_grace_reads = reads;
        self
    }

    pub const fn with_mox_min_prescaler(mut self, tenths: u8) -> Self {
        self.mox_min_prescaler = tenths;
        self
    }

    pub const fn with_default_prescaler(mut self, tenths: u8) -> Self {
        self.default_prescaler = tenths;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
