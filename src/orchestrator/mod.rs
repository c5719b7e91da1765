//! Sensor array orchestration.
//!
//! [`SensorArray`] owns both physical sensors, the shield's power rail and
//! one inner/outer averager pair per logical channel. [`SensorArray::task`]
//! is called once per main loop pass: it advances the active power recipe
//! and, while sampling is enabled, drains the sampler pulses and feeds new
//! readings through the averagers.
//!
//! All OPC-derived channels share one histogram, so they always carry the
//! same (inner, outer) depths. Setting or loading the postscaler of any of
//! them applies it to all; [`SensorArray::correct_postscalers`] repairs any
//! divergence at start-up and whenever sampling is enabled.

pub mod recipe;

use embedded_hal::digital::OutputPin;
use log::{debug, info, warn};

use crate::averager::Averager;
use crate::channel::{LogicalChannel, PhysicalSensor, Quantity, CHANNEL_COUNT, MOX_FIRST_CHANNEL, OPC_BINS};
use crate::clock::elapsed;
use crate::config::Config;
use crate::drivers::{GasSensor, Histogram, ParticleCounter};
use crate::error::{AveragerError, ChannelError, DriverError};
use crate::led::Indicator;
use crate::postscaler::{self, Postscaler, INNER_CAPACITY, OUTER_CAPACITY};
use crate::sampler::Sampler;
use crate::storage::{self, Preset, Storage, ERASED};

/// Largest prescaler that survives a preset round trip.
pub const MAX_PRESCALER: u8 = ERASED - 1;

pub use recipe::{Progress, Recipe, Step};

/// Hardware the orchestrator drives.
pub struct Shield<OPC, MOX, PWR, IND> {
    pub opc: OPC,
    pub mox: MOX,
    /// Sensor supply rail, active high.
    pub power: PWR,
    /// Toggled on every new outer-stage output.
    pub indicator: IND,
}

/// Inner (fast) and outer (slow) averager of one logical channel.
#[derive(Clone, Debug, Default)]
struct Pipeline {
    inner: Averager<INNER_CAPACITY>,
    outer: Averager<OUTER_CAPACITY>,
}

impl Pipeline {
    fn set_depths(&mut self, inner: u8, outer: u8) -> Result<(), AveragerError> {
        if usize::from(outer) >= OUTER_CAPACITY {
            return Err(AveragerError::DepthOutOfRange {
                requested: usize::from(outer),
                capacity: OUTER_CAPACITY,
            });
        }
        self.inner.set_depth(usize::from(inner))?;
        self.outer.set_depth(usize::from(outer))
    }

    fn depths(&self) -> (u8, u8) {
        // both depths are below the u8-sized capacities
        (self.inner.depth() as u8, self.outer.depth() as u8)
    }

    fn reset(&mut self) {
        self.inner.reset();
        self.outer.reset();
    }

    /// Returns `true` when the outer stage latched a new output.
    fn feed(&mut self, value: f32, timestamp: u32, summed: bool) -> bool {
        if !self.inner.collect_sample(value, timestamp) {
            return false;
        }
        let staged = if summed {
            self.inner.last_cumulated_value()
        } else {
            self.inner.last_averaged_value()
        };
        self.outer.collect_sample(staged, self.inner.last_timestamp())
    }

    fn sample(&self, summed: bool) -> (f32, u32) {
        let value = if summed {
            self.outer.last_cumulated_value()
        } else {
            self.outer.last_averaged_value()
        };
        (value, self.outer.last_timestamp())
    }
}

pub struct SensorArray<'s, OPC, MOX, PWR, IND, ST> {
    config: Config,
    shield: Shield<OPC, MOX, PWR, IND>,
    storage: ST,
    opc_sampler: &'s Sampler,
    mox_sampler: &'s Sampler,
    pipelines: [Pipeline; CHANNEL_COUNT],
    recipe: Recipe,
    step: usize,
    step_entered: u32,
    sampling_enabled: bool,
    sampling_start: u32,
    indicator_on: bool,
}

impl<'s, OPC, MOX, PWR, IND, ST> SensorArray<'s, OPC, MOX, PWR, IND, ST>
where
    OPC: ParticleCounter,
    MOX: GasSensor,
    PWR: OutputPin,
    IND: Indicator,
    ST: Storage,
{
    /// Build the array and restore every channel from `storage`.
    pub fn new(
        config: Config,
        shield: Shield<OPC, MOX, PWR, IND>,
        storage: ST,
        opc_sampler: &'s Sampler,
        mox_sampler: &'s Sampler,
    ) -> Self {
        let mut array = Self {
            config,
            shield,
            storage,
            opc_sampler,
            mox_sampler,
            pipelines: core::array::from_fn(|_| Pipeline::default()),
            recipe: Recipe::Idle,
            step: 0,
            step_entered: 0,
            sampling_enabled: false,
            sampling_start: 0,
            indicator_on: false,
        };

        for channel in LogicalChannel::all() {
            let preset = storage::load_preset(&mut array.storage, channel);
            array.apply_preset(channel, preset, false);
        }
        array.correct_postscalers();
        array.shield.indicator.set(false);
        array
    }

    /// One main loop pass. Returns `true` if a sensor delivered a reading.
    pub fn task(&mut self, now: u32) -> bool {
        self.step_recipe(now);
        if !self.sampling_enabled {
            return false;
        }

        let opc_sampler = self.opc_sampler;
        let opc = opc_sampler.task(&mut |go: bool, ts: u32| -> bool { self.service_opc(go, ts, now) });
        let mox_sampler = self.mox_sampler;
        let mox = mox_sampler.task(&mut |go: bool, ts: u32| -> bool { self.service_mox(go, ts, now) });
        opc || mox
    }

    /// Start or stop sampling through the power recipes.
    pub fn enable_sampling(&mut self, enable: bool, now: u32) {
        if !enable {
            self.start_recipe(Recipe::StopSampling, now);
            return;
        }
        if self.sampling_enabled {
            debug!("sampling already enabled");
            return;
        }
        self.correct_postscalers();
        for pipeline in self.pipelines.iter_mut() {
            pipeline.reset();
        }
        self.start_recipe(Recipe::StartSampling, now);
    }

    pub fn is_sampling(&self) -> bool {
        self.sampling_enabled
    }

    pub fn recipe(&self) -> Recipe {
        self.recipe
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn sampling_start(&self) -> u32 {
        self.sampling_start
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shield(&self) -> &Shield<OPC, MOX, PWR, IND> {
        &self.shield
    }

    pub fn shield_mut(&mut self) -> &mut Shield<OPC, MOX, PWR, IND> {
        &mut self.shield
    }

    pub fn storage(&self) -> &ST {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut ST {
        &mut self.storage
    }

    fn sampler(&self, sensor: PhysicalSensor) -> &'s Sampler {
        match sensor {
            PhysicalSensor::Opc => self.opc_sampler,
            PhysicalSensor::Mox => self.mox_sampler,
        }
    }

    /// Sampling period of the channel's sensor, tenths of a second.
    pub fn prescaler(&self, channel: LogicalChannel) -> u8 {
        self.sampler(channel.sensor()).prescaler()
    }

    /// Returns the prescaler actually applied; the MOX sensor is raised to
    /// its minimum and every sensor is capped below the erased storage byte.
    pub fn set_prescaler(&mut self, channel: LogicalChannel, tenths: u8) -> u8 {
        let sensor = channel.sensor();
        let tenths = if tenths > MAX_PRESCALER {
            debug!("prescaler {} capped to {}", tenths, MAX_PRESCALER);
            MAX_PRESCALER
        } else {
            tenths
        };
        let tenths = if sensor == PhysicalSensor::Mox && tenths < self.config.mox_min_prescaler {
            debug!("mox prescaler {} raised to {}", tenths, self.config.mox_min_prescaler);
            self.config.mox_min_prescaler
        } else {
            tenths
        };
        self.sampler(sensor).set_prescaler(tenths);
        tenths
    }

    /// Total decimation of the channel, depth 0 counting as 1.
    pub fn postscaler(&self, channel: LogicalChannel) -> u8 {
        let (inner, outer) = self.pipelines[channel.slot()].depths();
        u8::try_from(postscaler::factor_of(inner, outer)).unwrap_or(u8::MAX)
    }

    pub fn set_postscaler(
        &mut self,
        channel: LogicalChannel,
        requested: u8,
    ) -> Result<Postscaler, ChannelError> {
        let resolved = postscaler::resolve(requested);
        self.apply_depths(channel, resolved.inner, resolved.outer)?;
        debug!(
            "channel {} postscaler {} -> {} ({}x{})",
            channel.index(),
            requested,
            resolved.factor,
            resolved.inner,
            resolved.outer
        );
        Ok(resolved)
    }

    /// Latest outer-stage output and its timestamp relative to the start of
    /// sampling. Only temperature may be negative.
    pub fn last_sample(&self, channel: LogicalChannel) -> (f32, u32) {
        let quantity = channel.quantity();
        let (value, timestamp) = self.pipelines[channel.slot()].sample(quantity == Quantity::Volume);
        let value = if quantity != Quantity::Temperature && value < 0.0 {
            0.0
        } else {
            value
        };
        (value, timestamp)
    }

    pub fn save_preset(&mut self, channel: LogicalChannel) {
        let (inner_depth, outer_depth) = self.pipelines[channel.slot()].depths();
        let preset = Preset {
            prescaler: Some(self.prescaler(channel)),
            inner_depth,
            outer_depth,
        };
        storage::save_preset(&mut self.storage, channel, &preset);
        info!("channel {} preset saved", channel.index());
    }

    pub fn load_preset(&mut self, channel: LogicalChannel) {
        let preset = storage::load_preset(&mut self.storage, channel);
        self.apply_preset(channel, preset, true);
        info!("channel {} preset loaded", channel.index());
    }

    /// Force every OPC-derived channel onto the most common (inner, outer)
    /// pair. Returns the number of channels changed.
    pub fn correct_postscalers(&mut self) -> usize {
        let opc = &self.pipelines[..usize::from(MOX_FIRST_CHANNEL)];
        let mut majority = opc[0].depths();
        let mut majority_count = 0;
        for candidate in opc.iter().map(Pipeline::depths) {
            let count = opc.iter().filter(|p| p.depths() == candidate).count();
            if count > majority_count {
                majority = candidate;
                majority_count = count;
            }
        }

        let mut corrected = 0;
        for (slot, pipeline) in self.pipelines[..usize::from(MOX_FIRST_CHANNEL)]
            .iter_mut()
            .enumerate()
        {
            if pipeline.depths() == majority {
                continue;
            }
            warn!(
                "channel {} depths {:?} diverge, forced to {:?}",
                slot,
                pipeline.depths(),
                majority
            );
            // majority depths come from an existing pipeline, so they fit
            let _ = pipeline.set_depths(majority.0, majority.1);
            corrected += 1;
        }
        corrected
    }

    fn apply_depths(&mut self, channel: LogicalChannel, inner: u8, outer: u8) -> Result<(), ChannelError> {
        match channel.sensor() {
            PhysicalSensor::Opc => {
                for pipeline in self.pipelines[..usize::from(MOX_FIRST_CHANNEL)].iter_mut() {
                    pipeline.set_depths(inner, outer)?;
                }
            }
            PhysicalSensor::Mox => self.pipelines[channel.slot()].set_depths(inner, outer)?,
        }
        Ok(())
    }

    fn apply_preset(&mut self, channel: LogicalChannel, preset: Preset, propagate: bool) {
        let tenths = preset.prescaler.unwrap_or(self.config.default_prescaler);
        self.set_prescaler(channel, tenths);

        let (inner, outer) = (preset.inner_depth, preset.outer_depth);
        let result = if propagate {
            self.apply_depths(channel, inner, outer)
        } else {
            self.pipelines[channel.slot()]
                .set_depths(inner, outer)
                .map_err(ChannelError::from)
        };
        if let Err(err) = result {
            warn!("channel {} stored depths rejected ({}), using pass-through", channel.index(), err);
            let _ = if propagate {
                self.apply_depths(channel, 0, 0)
            } else {
                self.pipelines[channel.slot()].set_depths(0, 0).map_err(ChannelError::from)
            };
        }
    }

    fn start_recipe(&mut self, recipe: Recipe, now: u32) {
        info!("recipe {} started", recipe.name());
        self.recipe = recipe;
        self.step = 0;
        self.step_entered = now;
    }

    fn step_recipe(&mut self, now: u32) {
        let steps = self.recipe.steps();
        let Some(&step) = steps.get(self.step) else {
            self.recipe = Recipe::Idle;
            self.step = 0;
            return;
        };

        if self.run_step(step, now) == Progress::Pending {
            return;
        }
        debug!("recipe {} step {} ({:?}) done", self.recipe.name(), self.step, step);
        self.step += 1;
        self.step_entered = now;
        if self.step >= steps.len() {
            info!("recipe {} complete", self.recipe.name());
            self.recipe = Recipe::Idle;
            self.step = 0;
        }
    }

    fn run_step(&mut self, step: Step, now: u32) -> Progress {
        match step {
            Step::PowerOn => {
                if self.shield.power.set_high().is_err() {
                    warn!("power rail did not switch on");
                }
                Progress::Done
            }
            Step::WaitStartup => self.wait(now, self.config.startup_settle_ms),
            Step::WaitSettle => self.wait(now, self.config.step_settle_ms),
            Step::InitDrivers => {
                let opc = self.shield.opc.init(now);
                let mox = self.shield.mox.init(now);
                match (opc, mox) {
                    (Err(DriverError::Busy), _) | (_, Err(DriverError::Busy)) => Progress::Pending,
                    (opc, mox) => {
                        if let Err(err) = opc {
                            warn!("opc init failed: {}", err);
                        }
                        if let Err(err) = mox {
                            warn!("mox init failed: {}", err);
                        }
                        Progress::Done
                    }
                }
            }
            Step::FanLaserOn => self.switch_fan_laser(true, now),
            Step::FanLaserOff => {
                // finish a histogram read left over from sampling
                let _ = self.shield.opc.get_histogram(now);
                self.switch_fan_laser(false, now)
            }
            Step::BeginSampling => {
                // pulses raised while powered down predate the session
                self.opc_sampler.poll();
                self.mox_sampler.poll();
                self.sampling_enabled = true;
                self.sampling_start = now;
                info!("sampling enabled at {} ms", now);
                Progress::Done
            }
            Step::EndSampling => {
                self.sampling_enabled = false;
                self.indicator_on = false;
                self.shield.indicator.set(false);
                info!("sampling disabled");
                Progress::Done
            }
            Step::PowerOff => {
                if self.shield.power.set_low().is_err() {
                    warn!("power rail did not switch off");
                }
                Progress::Done
            }
        }
    }

    fn wait(&self, now: u32, settle_ms: u32) -> Progress {
        if elapsed(now, self.step_entered, settle_ms) {
            Progress::Done
        } else {
            Progress::Pending
        }
    }

    fn switch_fan_laser(&mut self, on: bool, now: u32) -> Progress {
        match self.shield.opc.set_fan_laser(on, now) {
            Ok(()) => Progress::Done,
            Err(DriverError::Busy) => Progress::Pending,
            Err(err) => {
                warn!("opc fan/laser switch failed: {}", err);
                Progress::Done
            }
        }
    }

    fn service_opc(&mut self, go: bool, timestamp: u32, now: u32) -> bool {
        if go {
            if self.shield.opc.ready(now) {
                if let Err(err) = self.shield.opc.ask_histogram(now) {
                    warn!("opc ask failed: {}", err);
                }
            } else {
                debug!("opc busy, period skipped");
            }
        }

        let Some(histogram) = self.shield.opc.get_histogram(now) else {
            return false;
        };
        let relative = timestamp.wrapping_sub(self.sampling_start);
        if self.feed_histogram(&histogram, relative) {
            self.toggle_indicator();
        }
        true
    }

    fn service_mox(&mut self, go: bool, timestamp: u32, now: u32) -> bool {
        if go {
            if self.shield.mox.ready(now) {
                if let Err(err) = self.shield.mox.ask_raw(now) {
                    warn!("mox ask failed: {}", err);
                }
            } else {
                debug!("mox busy, period skipped");
            }
        }

        let Some(raw) = self.shield.mox.get_raw(now) else {
            return false;
        };
        let relative = timestamp.wrapping_sub(self.sampling_start);
        if self.feed(LogicalChannel::MOX, f32::from(raw), relative) {
            self.toggle_indicator();
        }
        true
    }

    fn feed_histogram(&mut self, histogram: &Histogram, timestamp: u32) -> bool {
        let mut produced = false;
        for bin in 0..OPC_BINS {
            produced |= self.feed(LogicalChannel::bin(bin as u8), histogram.density(bin), timestamp);
        }
        produced |= self.feed(LogicalChannel::PM1, histogram.pm1, timestamp);
        produced |= self.feed(LogicalChannel::PM2_5, histogram.pm2_5, timestamp);
        produced |= self.feed(LogicalChannel::PM10, histogram.pm10, timestamp);
        produced |= self.feed(LogicalChannel::TEMPERATURE, histogram.temperature, timestamp);
        produced |= self.feed(LogicalChannel::VOLUME, histogram.volume(), timestamp);
        produced
    }

    fn feed(&mut self, channel: LogicalChannel, value: f32, timestamp: u32) -> bool {
        let summed = channel.quantity() == Quantity::Volume;
        self.pipelines[channel.slot()].feed(value, timestamp, summed)
    }

    fn toggle_indicator(&mut self) {
        self.indicator_on = !self.indicator_on;
        self.shield.indicator.set(self.indicator_on);
    }
}
