pub(crate) mod dsbus_dv;
pub mod newtonpf;
pub mod powerflow;
pub mod solver;
pub mod system;

pub use newtonpf::{ProgressMonitor, newton_pf};
pub use powerflow::*;
