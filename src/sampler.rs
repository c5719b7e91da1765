//! Periodic sample scheduling.
//!
//! [`Sampler::tick`] runs in the tick context and raises a "go" pulse every
//! `prescaler` ticks. [`Sampler::task`] runs in the main loop, consumes the
//! pulse inside a critical section and hands it to a [`SampleHandler`].
//! Everything the two contexts share lives behind one
//! `critical_section::Mutex`, so a sampler can sit in a `static`.

use core::cell::RefCell;

use critical_section::Mutex;

/// Consumer of sampler pulses.
///
/// Called on every main loop pass, with `go == false` when no new period
/// started. Implementations use those calls to collect data requested on an
/// earlier pulse.
pub trait SampleHandler {
    /// `timestamp` is the clock value latched at the last pulse.
    fn on_sample(&mut self, go: bool, timestamp: u32) -> bool;
}

impl<F> SampleHandler for F
where
    F: FnMut(bool, u32) -> bool,
{
    fn on_sample(&mut self, go: bool, timestamp: u32) -> bool {
        self(go, timestamp)
    }
}

struct TickState {
    /// Ticks per period; 0 disables the sampler.
    prescaler: u16,
    counter: u16,
    go: bool,
    running_timestamp: u32,
    latched_timestamp: u32,
}

pub struct Sampler {
    state: Mutex<RefCell<TickState>>,
}

impl Sampler {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(TickState {
                prescaler: 0,
                counter: 0,
                go: false,
                running_timestamp: 0,
                latched_timestamp: 0,
            })),
        }
    }

    /// Advance by one tick. Returns `true` when a new period starts.
    pub fn tick(&self, now: u32) -> bool {
        critical_section::with(|cs| {
            let mut s = self.state.borrow_ref_mut(cs);
            if s.prescaler == 0 {
                return false;
            }
            if s.counter >= s.prescaler - 1 {
                s.counter = 0;
                s.running_timestamp = now;
                s.go = true;
                true
            } else {
                s.counter += 1;
                false
            }
        })
    }

    /// Read and clear the go pulse. Returns the pulse and the latched
    /// timestamp.
    pub fn take(&self) -> (bool, u32) {
        critical_section::with(|cs| {
            let mut s = self.state.borrow_ref_mut(cs);
            let go = core::mem::replace(&mut s.go, false);
            if go {
                s.latched_timestamp = s.running_timestamp;
            }
            (go, s.latched_timestamp)
        })
    }

    /// Consume the pulse and run `handler` with it; the handler decides the
    /// return value.
    pub fn task<H: SampleHandler + ?Sized>(&self, handler: &mut H) -> bool {
        let (go, timestamp) = self.take();
        handler.on_sample(go, timestamp)
    }

    /// Consume the pulse without a handler. Returns whether one was pending.
    pub fn poll(&self) -> bool {
        self.take().0
    }

    /// Set the period in tenths of a second. Restarts the tick counter.
    pub fn set_prescaler(&self, tenths: u8) {
        critical_section::with(|cs| {
            let mut s = self.state.borrow_ref_mut(cs);
            s.prescaler = u16::from(tenths) * 10;
            s.counter = 0;
        });
    }

    /// Period in tenths of a second.
    pub fn prescaler(&self) -> u8 {
        critical_section::with(|cs| {
            let ticks = self.state.borrow_ref(cs).prescaler / 10;
            ticks as u8
        })
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}
