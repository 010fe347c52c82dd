// Library surface for headless/integration tests and reuse.
// The timer and statistics core (solve, stats, timer) does no I/O;
// the remaining modules are the terminal host around it.
pub mod app_dirs;
pub mod config;
pub mod format;
pub mod history;
pub mod runtime;
pub mod session;
pub mod solve;
pub mod stats;
pub mod timer;
pub mod transfer;
pub mod util;

pub use solve::{EffectiveTime, Penalty, Solve};
pub use stats::{best_average, calculate_averages, compute_trimmed_average, Average, Averages};
pub use timer::{TimerEvent, TimerListener, TimerSettings, TimerSettingsUpdate, TimerState, TimerStateMachine};
