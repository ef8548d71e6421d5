//! Result tables and run summaries.

use std::fmt;

use serde::{Deserialize, Serialize};
use tabled::{Table, settings::Style};

mod res_display;
use res_display::*;

use crate::basic::PowerFlowResult;
use crate::io::pandapower::Network;
use crate::timeseries::TimeSeriesResult;

/// Voltage band used by the limit check (p.u.).
pub const VOLTAGE_BAND: (f64, f64) = (0.95, 1.05);

/// Renders the result tables of a solved network.
pub trait PostProcessing {
    fn res_bus_table(&self, net: &Network) -> String;
    fn res_gen_table(&self, net: &Network) -> String;
    fn res_ext_grid_table(&self, net: &Network) -> String;
    fn res_line_table(&self, net: &Network) -> String;
    fn res_trafo_table(&self, net: &Network) -> String;
    fn res_load_table(&self, net: &Network) -> String;

    /// Prints every table with a heading.
    fn print_results(&self, net: &Network) {
        println!("\n*** Bus Voltage Results ***\n{}", self.res_bus_table(net));
        println!("\n*** Generator Results ***\n{}", self.res_gen_table(net));
        println!("\n*** External Grid Results ***\n{}", self.res_ext_grid_table(net));
        println!("\n*** Line Loading Results ***\n{}", self.res_line_table(net));
        println!("\n*** Transformer Loading Results ***\n{}", self.res_trafo_table(net));
        println!("\n*** Load Results ***\n{}", self.res_load_table(net));
    }
}

fn markdown<T: tabled::Tabled>(rows: impl IntoIterator<Item = T>) -> String {
    Table::new(rows).with(Style::markdown()).to_string()
}

impl PostProcessing for PowerFlowResult {
    fn res_bus_table(&self, net: &Network) -> String {
        markdown(net.bus.iter().zip(&self.bus).map(|(b, r)| BusResTable {
            bus: b.index,
            vm_pu: FloatWrapper::new(r.vm_pu, 5),
            va_degree: FloatWrapper::new(r.va_degree, 5),
            p_mw: FloatWrapper::new(r.p_mw, 5),
            q_mvar: FloatWrapper::new(r.q_mvar, 5),
        }))
    }

    fn res_gen_table(&self, net: &Network) -> String {
        markdown(
            net.r#gen
                .iter()
                .zip(&self.r#gen)
                .enumerate()
                .map(|(i, (g, r))| GenResTable {
                    index: i,
                    bus: g.bus,
                    p_mw: FloatWrapper::new(r.p_mw, 3),
                    q_mvar: FloatWrapper::new(r.q_mvar, 3),
                    vm_pu: FloatWrapper::new(r.vm_pu, 5),
                }),
        )
    }

    fn res_ext_grid_table(&self, net: &Network) -> String {
        markdown(
            net.ext_grid
                .iter()
                .zip(&self.ext_grid)
                .enumerate()
                .map(|(i, (e, r))| ExtGridResTable {
                    ext_grid: i,
                    bus: e.bus,
                    p_mw: FloatWrapper::new(r.p_mw, 3),
                    q_mvar: FloatWrapper::new(r.q_mvar, 3),
                }),
        )
    }

    fn res_line_table(&self, net: &Network) -> String {
        markdown(net.line.iter().zip(&self.line).map(|(l, r)| LineResTable {
            from: l.from_bus,
            to: l.to_bus,
            p_from_mw: FloatWrapper::new(r.p_from_mw, 3),
            q_from_mvar: FloatWrapper::new(r.q_from_mvar, 3),
            p_to_mw: FloatWrapper::new(r.p_to_mw, 3),
            q_to_mvar: FloatWrapper::new(r.q_to_mvar, 3),
            pl_mw: FloatWrapper::new(r.pl_mw, 4),
            i_ka: FloatWrapper::new(r.i_ka, 4),
            loading_percent: FloatWrapper::new(r.loading_percent, 2),
        }))
    }

    fn res_trafo_table(&self, net: &Network) -> String {
        markdown(net.trafo.iter().zip(&self.trafo).map(|(t, r)| TrafoResTable {
            hv: t.hv_bus,
            lv: t.lv_bus,
            p_hv_mw: FloatWrapper::new(r.p_hv_mw, 3),
            q_hv_mvar: FloatWrapper::new(r.q_hv_mvar, 3),
            p_lv_mw: FloatWrapper::new(r.p_lv_mw, 3),
            q_lv_mvar: FloatWrapper::new(r.q_lv_mvar, 3),
            pl_mw: FloatWrapper::new(r.pl_mw, 4),
            loading_percent: FloatWrapper::new(r.loading_percent, 2),
        }))
    }

    fn res_load_table(&self, net: &Network) -> String {
        markdown(
            net.load
                .iter()
                .zip(&self.load)
                .enumerate()
                .map(|(i, (l, r))| LoadResTable {
                    load: i,
                    bus: l.bus,
                    p_mw: FloatWrapper::new(r.p_mw, 3),
                    q_mvar: FloatWrapper::new(r.q_mvar, 3),
                }),
        )
    }
}

/// Index and value of the smallest / largest finite entry.
fn extrema(values: impl Iterator<Item = f64>) -> Option<((usize, f64), (usize, f64))> {
    values
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .fold(None, |acc, (i, v)| match acc {
            None => Some(((i, v), (i, v))),
            Some((lo, hi)) => Some((
                if v < lo.1 { (i, v) } else { lo },
                if v > hi.1 { (i, v) } else { hi },
            )),
        })
}

/// Key figures of one steady-state solution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SteadyStateSummary {
    /// `(bus index, vm_pu)`
    pub min_vm: (i64, f64),
    pub max_vm: (i64, f64),
    pub avg_vm: f64,
    pub within_voltage_band: bool,
    pub total_gen_mw: f64,
    pub total_gen_mvar: f64,
    pub total_load_mw: f64,
    pub total_load_mvar: f64,
    pub line_losses_mw: f64,
    pub trafo_losses_mw: f64,
    pub loss_percent: f64,
    /// `|generation - load - losses|`
    pub balance_error_mw: f64,
    /// `(line index, loading)`
    pub max_line_loading: Option<(usize, f64)>,
    pub overloaded_lines: usize,
}

impl SteadyStateSummary {
    pub fn new(net: &Network, res: &PowerFlowResult) -> Self {
        let vm = || res.bus.iter().map(|b| b.vm_pu);
        let ((lo_i, lo), (hi_i, hi)) = extrema(vm()).unwrap_or(((0, f64::NAN), (0, f64::NAN)));
        let live: Vec<f64> = vm().filter(|v| v.is_finite()).collect();
        let avg_vm = live.iter().sum::<f64>() / live.len() as f64;
        let bus_id = |i: usize| net.bus.get(i).map_or(i as i64, |b| b.index);

        let total_gen_mw = res.total_generation_mw();
        let total_gen_mvar = res.r#gen.iter().map(|g| g.q_mvar).sum::<f64>()
            + res.ext_grid.iter().map(|e| e.q_mvar).sum::<f64>();
        let total_load_mw = res.total_load_mw();
        let line_losses_mw = res.line.iter().map(|l| l.pl_mw).sum();
        let trafo_losses_mw = res.trafo.iter().map(|t| t.pl_mw).sum();
        let losses = res.total_losses_mw();

        let max_line_loading = extrema(res.line.iter().map(|l| l.loading_percent)).map(|(_, hi)| hi);
        Self {
            min_vm: (bus_id(lo_i), lo),
            max_vm: (bus_id(hi_i), hi),
            avg_vm,
            within_voltage_band: lo >= VOLTAGE_BAND.0 && hi <= VOLTAGE_BAND.1,
            total_gen_mw,
            total_gen_mvar,
            total_load_mw,
            total_load_mvar: res.load.iter().map(|l| l.q_mvar).sum(),
            line_losses_mw,
            trafo_losses_mw,
            loss_percent: if total_gen_mw != 0.0 {
                losses / total_gen_mw * 100.0
            } else {
                0.0
            },
            balance_error_mw: (total_gen_mw - total_load_mw - losses).abs(),
            max_line_loading,
            overloaded_lines: res
                .line
                .iter()
                .filter(|l| l.loading_percent > 100.0)
                .count(),
        }
    }
}

impl fmt::Display for SteadyStateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Bus Voltage Statistics:")?;
        writeln!(f, "  Minimum: {:.4} pu (Bus {})", self.min_vm.1, self.min_vm.0)?;
        writeln!(f, "  Maximum: {:.4} pu (Bus {})", self.max_vm.1, self.max_vm.0)?;
        writeln!(f, "  Average: {:.4} pu", self.avg_vm)?;
        let status = if self.within_voltage_band {
            "all within limits"
        } else {
            "outside limits"
        };
        writeln!(
            f,
            "  Status: {status} ({}-{} pu)",
            VOLTAGE_BAND.0, VOLTAGE_BAND.1
        )?;
        writeln!(f, "Power Balance:")?;
        writeln!(
            f,
            "  Total Generation: {:.2} MW, {:.2} MVAr",
            self.total_gen_mw, self.total_gen_mvar
        )?;
        writeln!(
            f,
            "  Total Load: {:.2} MW, {:.2} MVAr",
            self.total_load_mw, self.total_load_mvar
        )?;
        writeln!(f, "  Line Losses: {:.4} MW", self.line_losses_mw)?;
        writeln!(f, "  Transformer Losses: {:.4} MW", self.trafo_losses_mw)?;
        writeln!(f, "  Loss Percentage: {:.2}%", self.loss_percent)?;
        writeln!(f, "  Balance Error: {:.6} MW", self.balance_error_mw)?;
        writeln!(f, "Line Loading:")?;
        if let Some((line, loading)) = self.max_line_loading {
            writeln!(f, "  Maximum Loading: {loading:.2}% (Line {line})")?;
        }
        write!(f, "  Overloaded Lines: {}", self.overloaded_lines)
    }
}

/// Key figures of a quasi-steady-state run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransientSummary {
    pub steps: usize,
    /// `(onset, end)` in seconds.
    pub fault_window: Option<(f64, f64)>,
    pub fault_load: usize,
    pub fault_steps: usize,
    pub non_converged: usize,
    pub cancelled: bool,
    /// Per bus `(min, max)` voltage magnitude over converged steps.
    pub bus_vm_range: Vec<(f64, f64)>,
    /// Per line peak loading over converged steps.
    pub line_peak_loading: Vec<f64>,
}

impl TransientSummary {
    pub fn new(res: &TimeSeriesResult) -> Self {
        let converged: Vec<_> = res
            .snapshots
            .iter()
            .zip(&res.converged)
            .filter_map(|(s, c)| c.then_some(s))
            .collect();
        let n_bus = res.snapshots.first().map_or(0, |s| s.vm_pu.len());
        let n_line = res
            .snapshots
            .first()
            .map_or(0, |s| s.line_loading_percent.len());

        let bus_vm_range = (0..n_bus)
            .map(|b| {
                extrema(converged.iter().map(|s| s.vm_pu[b]))
                    .map_or((f64::NAN, f64::NAN), |(lo, hi)| (lo.1, hi.1))
            })
            .collect();
        let line_peak_loading = (0..n_line)
            .map(|l| {
                extrema(converged.iter().map(|s| s.line_loading_percent[l]))
                    .map_or(f64::NAN, |(_, hi)| hi.1)
            })
            .collect();

        Self {
            steps: res.len(),
            fault_window: res.fault.map(|f| (f.onset, f.end())),
            fault_load: res.fault_load,
            fault_steps: res.fault_active.iter().filter(|a| **a).count(),
            non_converged: res.non_converged_count(),
            cancelled: res.cancelled,
            bus_vm_range,
            line_peak_loading,
        }
    }

    /// Per-element extrema as a markdown table.
    pub fn range_table(&self) -> String {
        let buses = self
            .bus_vm_range
            .iter()
            .enumerate()
            .map(|(b, (lo, hi))| RangeTable {
                element: format!("vm_pu bus {b}"),
                min: FloatWrapper::new(*lo, 4),
                max: FloatWrapper::new(*hi, 4),
            });
        let lines = self
            .line_peak_loading
            .iter()
            .enumerate()
            .map(|(l, hi)| RangeTable {
                element: format!("loading_percent line {l}"),
                min: FloatWrapper::new(f64::NAN, 2),
                max: FloatWrapper::new(*hi, 2),
            });
        markdown(buses.chain(lines))
    }
}

impl fmt::Display for TransientSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Time steps: {}", self.steps)?;
        if let Some((onset, end)) = self.fault_window {
            writeln!(
                f,
                "Fault on load {} from {onset} s to {end} s ({} steps)",
                self.fault_load, self.fault_steps
            )?;
        }
        writeln!(f, "Non-converged steps: {}", self.non_converged)?;
        if self.cancelled {
            writeln!(f, "Run was cancelled")?;
        }
        write!(f, "{}", self.range_table())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::{NewtonRaphson, PowerFlow};
    use crate::testcases::ieee9;
    use crate::timeseries::StepSnapshot;

    #[test]
    fn test_steady_state_summary() {
        let net = ieee9();
        let res = NewtonRaphson::default().solve(&net).unwrap();
        let s = SteadyStateSummary::new(&net, &res);
        assert_eq!(s.max_vm.0, 0);
        assert!((s.max_vm.1 - 1.04).abs() < 1e-9);
        assert!(s.min_vm.1 < 1.0);
        assert!(s.avg_vm > s.min_vm.1 && s.avg_vm < s.max_vm.1);
        assert!(s.balance_error_mw < 1e-6);
        assert!((s.total_load_mw - 315.0).abs() < 1e-9);
        assert!(s.loss_percent > 0.0 && s.loss_percent < 5.0);
        assert_eq!(s.overloaded_lines, 0);
        assert!(s.trafo_losses_mw.abs() < 1e-9);
        let text = s.to_string();
        assert!(text.contains("Balance Error"));
    }

    #[test]
    fn test_tables_render() {
        let net = ieee9();
        let res = NewtonRaphson::default().solve(&net).unwrap();
        let table = res.res_bus_table(&net);
        assert_eq!(table.lines().count(), 2 + 9);
        assert!(table.contains("vm_pu"));
        assert!(res.res_gen_table(&net).contains("| gen"));
        assert_eq!(res.res_line_table(&net).lines().count(), 2 + 6);
    }

    #[test]
    fn test_transient_summary() {
        let mut r = TimeSeriesResult::default();
        let snap = |v: f64, l: f64| StepSnapshot {
            vm_pu: vec![1.0, v],
            va_degree: vec![0.0, 0.0],
            gen_p_mw: vec![],
            line_loading_percent: vec![l],
        };
        r.push(0.0, snap(0.99, 10.0), true, false, 2);
        r.push(0.1, snap(0.90, 30.0), true, true, 3);
        r.push(0.2, snap(0.10, 99.0), false, false, 0);
        let s = TransientSummary::new(&r);
        assert_eq!(s.steps, 3);
        assert_eq!(s.non_converged, 1);
        assert_eq!(s.fault_steps, 1);
        assert_eq!(s.bus_vm_range[1], (0.90, 0.99));
        assert_eq!(s.line_peak_loading, vec![30.0]);
        assert!(s.to_string().contains("Non-converged steps: 1"));
    }

    #[test]
    fn test_extrema_skips_nan() {
        let e = extrema([f64::NAN, 2.0, 1.0, 3.0].into_iter()).unwrap();
        assert_eq!(e, ((2, 1.0), (3, 3.0)));
        assert!(extrema(std::iter::empty()).is_none());
    }
}
