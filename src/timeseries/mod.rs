pub mod driver;
pub mod export;
pub mod fault;
pub mod sim_time;
pub mod state;

pub use driver::{NoMonitor, StepMonitor, run, run_with_monitor};
pub use fault::{FaultSchedule, FaultTarget, LoadVariation, QssConfig};
pub use sim_time::{DeltaTime, Time, TimeAxis};
pub use state::{StepSnapshot, TimeSeriesResult};
