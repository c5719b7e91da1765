//! Power sequencing recipes.
//!
//! A recipe is a fixed list of [`Step`]s. The orchestrator runs the current
//! step once per main loop pass until it reports [`Progress::Done`], then
//! moves to the next one; after the last step it falls back to
//! [`Recipe::Idle`].

/// Longest recipe.
pub const MAX_STEPS: usize = 7;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Progress {
    Pending,
    Done,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    PowerOn,
    WaitStartup,
    InitDrivers,
    WaitSettle,
    FanLaserOn,
    BeginSampling,
    EndSampling,
    FanLaserOff,
    PowerOff,
}

const START_SAMPLING: [Step; 7] = [
    Step::PowerOn,
    Step::WaitStartup,
    Step::InitDrivers,
    Step::WaitSettle,
    Step::FanLaserOn,
    Step::WaitSettle,
    Step::BeginSampling,
];

const STOP_SAMPLING: [Step; 5] = [
    Step::EndSampling,
    Step::WaitSettle,
    Step::FanLaserOff,
    Step::WaitSettle,
    Step::PowerOff,
];

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Recipe {
    #[default]
    Idle,
    StartSampling,
    StopSampling,
}

impl Recipe {
    pub fn steps(self) -> &'static [Step] {
        match self {
            Self::Idle => &[],
            Self::StartSampling => &START_SAMPLING,
            Self::StopSampling => &STOP_SAMPLING,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::StartSampling => "start-sampling",
            Self::StopSampling => "stop-sampling",
        }
    }
}
