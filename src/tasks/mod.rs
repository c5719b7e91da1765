pub mod led;
pub mod tick;

pub use led::led_task;
pub use tick::tick_task;
