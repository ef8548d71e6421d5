pub mod basic;
pub mod error;
pub mod io;
pub mod post_processing;
pub mod studies;
pub mod testcases;
pub mod timeseries;
pub mod prelude {
    pub use crate::basic::{NewtonRaphson, PowerFlow, PowerFlowConfig, PowerFlowResult};
    pub use crate::error::{ConfigError, IoError, PowerFlowError};
    pub use crate::io::pandapower::{self, Network, load_case};
    pub use crate::post_processing::{PostProcessing, SteadyStateSummary, TransientSummary};
    pub use crate::studies::{dispatch_study, load_scaling_study};
    pub use crate::testcases::ieee9;
    pub use crate::timeseries::{
        FaultSchedule, FaultTarget, LoadVariation, QssConfig, TimeSeriesResult, run,
        run_with_monitor,
    };
}
