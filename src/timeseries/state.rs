use serde::{Deserialize, Serialize};

use super::fault::FaultSchedule;
use crate::basic::PowerFlowResult;

/// The quantities recorded at one time step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepSnapshot {
    /// Per bus.
    pub vm_pu: Vec<f64>,
    /// Per bus.
    pub va_degree: Vec<f64>,
    /// Per generator.
    pub gen_p_mw: Vec<f64>,
    /// Per line.
    pub line_loading_percent: Vec<f64>,
}

impl StepSnapshot {
    /// All-zero snapshot with the given table sizes.
    pub fn zeros(n_bus: usize, n_gen: usize, n_line: usize) -> Self {
        Self {
            vm_pu: vec![0.0; n_bus],
            va_degree: vec![0.0; n_bus],
            gen_p_mw: vec![0.0; n_gen],
            line_loading_percent: vec![0.0; n_line],
        }
    }
}

impl From<&PowerFlowResult> for StepSnapshot {
    fn from(res: &PowerFlowResult) -> Self {
        Self {
            vm_pu: res.bus.iter().map(|b| b.vm_pu).collect(),
            va_degree: res.bus.iter().map(|b| b.va_degree).collect(),
            gen_p_mw: res.r#gen.iter().map(|g| g.p_mw).collect(),
            line_loading_percent: res.line.iter().map(|l| l.loading_percent).collect(),
        }
    }
}

/// Per-step record of a quasi-steady-state run, in time order.
///
/// All per-step vectors have the same length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesResult {
    /// Seconds.
    pub time: Vec<f64>,
    pub snapshots: Vec<StepSnapshot>,
    pub converged: Vec<bool>,
    pub fault_active: Vec<bool>,
    /// Newton-Raphson iterations of each step, 0 when the step failed.
    pub iterations: Vec<usize>,
    pub fault: Option<FaultSchedule>,
    /// Position of the faulted load in the load table.
    pub fault_load: usize,
    /// Set when a monitor stopped the run early.
    pub cancelled: bool,
}

impl TimeSeriesResult {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            time: Vec::with_capacity(n),
            snapshots: Vec::with_capacity(n),
            converged: Vec::with_capacity(n),
            fault_active: Vec::with_capacity(n),
            iterations: Vec::with_capacity(n),
            ..Default::default()
        }
    }

    pub(crate) fn push(
        &mut self,
        t: f64,
        snapshot: StepSnapshot,
        converged: bool,
        fault_active: bool,
        iterations: usize,
    ) {
        self.time.push(t);
        self.snapshots.push(snapshot);
        self.converged.push(converged);
        self.fault_active.push(fault_active);
        self.iterations.push(iterations);
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn non_converged_count(&self) -> usize {
        self.converged.iter().filter(|c| !**c).count()
    }

    /// Values of one bus voltage magnitude over time.
    pub fn vm_series(&self, bus: usize) -> Vec<f64> {
        self.snapshots.iter().map(|s| s.vm_pu[bus]).collect()
    }

    /// Values of one line loading over time.
    pub fn loading_series(&self, line: usize) -> Vec<f64> {
        self.snapshots
            .iter()
            .map(|s| s.line_loading_percent[line])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::{BusResult, GenResult, LineResult};

    #[test]
    fn test_snapshot_from_result() {
        let res = PowerFlowResult {
            bus: vec![
                BusResult {
                    vm_pu: 1.0,
                    va_degree: 0.0,
                    ..Default::default()
                },
                BusResult {
                    vm_pu: 0.98,
                    va_degree: -3.0,
                    ..Default::default()
                },
            ],
            r#gen: vec![GenResult {
                p_mw: 50.0,
                ..Default::default()
            }],
            line: vec![LineResult {
                loading_percent: 42.0,
                ..Default::default()
            }],
            ..Default::default()
        };
        let s = StepSnapshot::from(&res);
        assert_eq!(s.vm_pu, vec![1.0, 0.98]);
        assert_eq!(s.va_degree, vec![0.0, -3.0]);
        assert_eq!(s.gen_p_mw, vec![50.0]);
        assert_eq!(s.line_loading_percent, vec![42.0]);
    }

    #[test]
    fn test_push_keeps_columns_aligned() {
        let mut r = TimeSeriesResult::with_capacity(2);
        r.push(0.0, StepSnapshot::zeros(1, 0, 0), true, false, 3);
        r.push(0.1, StepSnapshot::zeros(1, 0, 0), false, true, 0);
        assert_eq!(r.len(), 2);
        assert_eq!(r.non_converged_count(), 1);
        assert_eq!(r.vm_series(0), vec![0.0, 0.0]);
    }
}
