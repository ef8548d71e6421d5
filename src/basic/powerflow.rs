//! The power-flow contract used by the time-series driver and the studies,
//! and its Newton-Raphson implementation.

use log::{debug, trace};
use nalgebra::DVector;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use super::newtonpf::{ProgressMonitor, newton_pf};
use super::solver::{DefaultSolver, Solve};
use super::system::{BranchTerminals, PFNetwork, RunPF};
use crate::error::PfResult;
use crate::io::pandapower::Network;

/// Anything that can solve a network's power flow.
///
/// Implementations read the network and hand back an immutable result value;
/// a failed solve is reported as an error, never as a half-filled result.
pub trait PowerFlow {
    fn solve(&mut self, net: &Network) -> PfResult<PowerFlowResult>;
}

/// Newton-Raphson options (pandapower defaults when unset).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerFlowConfig {
    /// Maximum number of iterations, default 10.
    pub max_it: Option<usize>,
    /// Convergence tolerance on the infinity norm of the mismatch (p.u.), default 1e-8.
    pub tol: Option<f64>,
    /// Start from the previous converged voltage instead of a flat start.
    pub warm_start: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BusResult {
    pub vm_pu: f64,
    pub va_degree: f64,
    /// Net consumption at the bus (load positive).
    pub p_mw: f64,
    pub q_mvar: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenResult {
    pub p_mw: f64,
    pub q_mvar: f64,
    pub va_degree: f64,
    pub vm_pu: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtGridResult {
    pub p_mw: f64,
    pub q_mvar: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadResult {
    pub p_mw: f64,
    pub q_mvar: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LineResult {
    pub p_from_mw: f64,
    pub q_from_mvar: f64,
    pub p_to_mw: f64,
    pub q_to_mvar: f64,
    pub pl_mw: f64,
    pub ql_mvar: f64,
    pub i_from_ka: f64,
    pub i_to_ka: f64,
    pub i_ka: f64,
    pub vm_from_pu: f64,
    pub va_from_degree: f64,
    pub vm_to_pu: f64,
    pub va_to_degree: f64,
    pub loading_percent: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafoResult {
    pub p_hv_mw: f64,
    pub q_hv_mvar: f64,
    pub p_lv_mw: f64,
    pub q_lv_mvar: f64,
    pub pl_mw: f64,
    pub ql_mvar: f64,
    pub i_hv_ka: f64,
    pub i_lv_ka: f64,
    pub vm_hv_pu: f64,
    pub vm_lv_pu: f64,
    pub loading_percent: f64,
}

/// Result tables of one converged power flow, indexed like the element tables
/// of the network that was solved.
///
/// Out-of-service buses report `NaN` voltages; out-of-service branches,
/// generators and loads report zeros.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerFlowResult {
    pub bus: Vec<BusResult>,
    pub r#gen: Vec<GenResult>,
    pub ext_grid: Vec<ExtGridResult>,
    pub line: Vec<LineResult>,
    pub trafo: Vec<TrafoResult>,
    pub load: Vec<LoadResult>,
    pub iterations: usize,
}

impl PowerFlowResult {
    /// Total generation of gens and ext grids (MW).
    pub fn total_generation_mw(&self) -> f64 {
        self.r#gen.iter().map(|g| g.p_mw).sum::<f64>()
            + self.ext_grid.iter().map(|e| e.p_mw).sum::<f64>()
    }

    /// Total load consumption (MW).
    pub fn total_load_mw(&self) -> f64 {
        self.load.iter().map(|l| l.p_mw).sum()
    }

    /// Active losses of lines and transformers (MW).
    pub fn total_losses_mw(&self) -> f64 {
        self.line.iter().map(|l| l.pl_mw).sum::<f64>()
            + self.trafo.iter().map(|t| t.pl_mw).sum::<f64>()
    }
}

/// Power-flow solver based on Newton-Raphson and sparse LU.
pub struct NewtonRaphson<S: Solve = DefaultSolver> {
    pub config: PowerFlowConfig,
    solver: S,
    monitor: Option<Box<dyn ProgressMonitor>>,
    last_v: Option<DVector<Complex64>>,
}

impl Default for NewtonRaphson {
    fn default() -> Self {
        Self::new(PowerFlowConfig::default())
    }
}

impl NewtonRaphson {
    pub fn new(config: PowerFlowConfig) -> Self {
        Self::with_solver(config, DefaultSolver::default())
    }
}

impl<S: Solve> NewtonRaphson<S> {
    pub fn with_solver(config: PowerFlowConfig, solver: S) -> Self {
        Self {
            config,
            solver,
            monitor: None,
            last_v: None,
        }
    }

    /// Replaces the default debug logging of the iteration mismatch.
    pub fn with_monitor(mut self, monitor: impl ProgressMonitor + 'static) -> Self {
        self.monitor = Some(Box::new(monitor));
        self
    }

    /// Forgets the voltage used for warm starts.
    pub fn clear_state(&mut self) {
        self.last_v = None;
    }
}

impl<S: Solve> PowerFlow for NewtonRaphson<S> {
    fn solve(&mut self, net: &Network) -> PfResult<PowerFlowResult> {
        let pf = PFNetwork::try_from(net)?;
        let warm = self.last_v.as_ref().filter(|_| self.config.warm_start);
        let prep = pf.prepare_matrices(warm);
        trace!("Ybus = {:?}", prep.Ybus);

        let mut log_monitor = |i: usize, mis: f64| debug!("NR iteration {i}: |F| = {mis:e}");
        let monitor: &mut dyn ProgressMonitor = match self.monitor.as_mut() {
            Some(m) => m.as_mut(),
            None => &mut log_monitor,
        };
        let (v, iterations) = newton_pf(
            &prep.Ybus,
            &prep.Sbus,
            &prep.v_init,
            prep.ordering.npv,
            prep.ordering.npq,
            self.config.tol,
            self.config.max_it,
            &mut self.solver,
            monitor,
        )?;
        let v = prep.ordering.restore(&v);
        let result = extract_results(net, &pf, &v, iterations);
        self.last_v = Some(v);
        Ok(result)
    }
}

/// Complex power (MVA) flowing into an element at one of its terminals.
fn terminal_power(pf: &PFNetwork, br: &BranchTerminals, node: usize, v: &[Complex64]) -> Complex64 {
    let i: Complex64 = pf.y_br[br.branches.clone()]
        .iter()
        .map(|b| b.current_from(node, v, pf.s_base))
        .sum();
    v[node] * i.conj() * pf.s_base
}

fn current_ka(s: Complex64, vm: f64, vn_kv: f64) -> f64 {
    if vm == 0.0 {
        return 0.0;
    }
    s.norm() / (3f64.sqrt() * vm * vn_kv)
}

/// Builds the pandapower style result tables from a solved voltage vector.
fn extract_results(
    net: &Network,
    pf: &PFNetwork,
    v: &DVector<Complex64>,
    iterations: usize,
) -> PowerFlowResult {
    let v = v.as_slice();
    let ybus = pf.create_y_bus();
    let yv = &ybus * &DVector::from_column_slice(v);
    // injections in MVA, generation positive
    let s_inj: Vec<Complex64> = v
        .iter()
        .zip(yv.iter())
        .map(|(v, i)| v * i.conj() * pf.s_base)
        .collect();

    let bus = net
        .bus
        .iter()
        .map(|b| match pf.position(b.index) {
            Some(p) => BusResult {
                vm_pu: v[p].norm(),
                va_degree: v[p].arg().to_degrees(),
                p_mw: -s_inj[p].re,
                q_mvar: -s_inj[p].im,
            },
            None => BusResult {
                vm_pu: f64::NAN,
                va_degree: f64::NAN,
                p_mw: 0.0,
                q_mvar: 0.0,
            },
        })
        .collect();

    let load = net
        .load
        .iter()
        .map(|l| match (l.in_service, pf.position(l.bus)) {
            (true, Some(_)) => LoadResult {
                p_mw: l.p_mw * l.scaling,
                q_mvar: l.q_mvar * l.scaling,
            },
            _ => LoadResult::default(),
        })
        .collect();

    // what the slack and the generators must supply at each bus
    let mut residual = s_inj.clone();
    for pq in &pf.pq_loads {
        residual[pq.bus] += pq.s;
    }
    let n = pf.buses.len();
    let mut ext_count = vec![0usize; n];
    pf.ext.iter().for_each(|e| ext_count[e.bus] += 1);
    let mut gen_count = vec![0usize; n];
    let gen_bus: Vec<Option<usize>> = net
        .r#gen
        .iter()
        .map(|g| g.in_service.then(|| pf.position(g.bus)).flatten())
        .collect();
    gen_bus.iter().flatten().for_each(|&b| gen_count[b] += 1);

    let r#gen = net
        .r#gen
        .iter()
        .zip(&gen_bus)
        .map(|(g, bus)| match bus {
            Some(b) => {
                let p = g.p_mw * g.scaling;
                // reactive power is shared by the gens of a bus unless a slack sits there
                let q = if ext_count[*b] == 0 {
                    residual[*b].im / gen_count[*b] as f64
                } else {
                    0.0
                };
                GenResult {
                    p_mw: p,
                    q_mvar: q,
                    va_degree: v[*b].arg().to_degrees(),
                    vm_pu: v[*b].norm(),
                }
            }
            None => GenResult::default(),
        })
        .collect();

    let mut ext_share = residual;
    for (g, bus) in net.r#gen.iter().zip(&gen_bus) {
        if let Some(b) = bus {
            ext_share[*b] -= Complex64::new(g.p_mw * g.scaling, 0.0);
        }
    }
    let ext_grid = net
        .ext_grid
        .iter()
        .map(|e| match (e.in_service, pf.position(e.bus)) {
            (true, Some(b)) => {
                let s = ext_share[b] / ext_count[b] as f64;
                ExtGridResult {
                    p_mw: s.re,
                    q_mvar: s.im,
                }
            }
            _ => ExtGridResult::default(),
        })
        .collect();

    let mut line = vec![LineResult::default(); net.line.len()];
    for br in &pf.lines {
        let rec = &net.line[br.element];
        let s_f = terminal_power(pf, br, br.from, v);
        let s_t = terminal_power(pf, br, br.to, v);
        let (vm_f, vm_t) = (v[br.from].norm(), v[br.to].norm());
        let i_f = current_ka(s_f, vm_f, pf.buses[br.from].vn_kv);
        let i_t = current_ka(s_t, vm_t, pf.buses[br.to].vn_kv);
        let i_max = rec.max_i_ka * rec.df * rec.parallel as f64;
        line[br.element] = LineResult {
            p_from_mw: s_f.re,
            q_from_mvar: s_f.im,
            p_to_mw: s_t.re,
            q_to_mvar: s_t.im,
            pl_mw: s_f.re + s_t.re,
            ql_mvar: s_f.im + s_t.im,
            i_from_ka: i_f,
            i_to_ka: i_t,
            i_ka: i_f.max(i_t),
            vm_from_pu: vm_f,
            va_from_degree: v[br.from].arg().to_degrees(),
            vm_to_pu: vm_t,
            va_to_degree: v[br.to].arg().to_degrees(),
            loading_percent: if i_max > 0.0 {
                i_f.max(i_t) / i_max * 100.0
            } else {
                0.0
            },
        };
    }

    let mut trafo = vec![TrafoResult::default(); net.trafo.len()];
    for br in &pf.trafos {
        let rec = &net.trafo[br.element];
        let s_hv = terminal_power(pf, br, br.from, v);
        let s_lv = terminal_power(pf, br, br.to, v);
        let (vm_hv, vm_lv) = (v[br.from].norm(), v[br.to].norm());
        let rating = rec.sn_mva * rec.df * rec.parallel as f64;
        let loading = if vm_hv > 0.0 && vm_lv > 0.0 {
            (s_hv.norm() / vm_hv).max(s_lv.norm() / vm_lv) / rating * 100.0
        } else {
            0.0
        };
        trafo[br.element] = TrafoResult {
            p_hv_mw: s_hv.re,
            q_hv_mvar: s_hv.im,
            p_lv_mw: s_lv.re,
            q_lv_mvar: s_lv.im,
            pl_mw: s_hv.re + s_lv.re,
            ql_mvar: s_hv.im + s_lv.im,
            i_hv_ka: current_ka(s_hv, vm_hv, pf.buses[br.from].vn_kv),
            i_lv_ka: current_ka(s_lv, vm_lv, pf.buses[br.to].vn_kv),
            vm_hv_pu: vm_hv,
            vm_lv_pu: vm_lv,
            loading_percent: loading,
        };
    }

    PowerFlowResult {
        bus,
        r#gen,
        ext_grid,
        line,
        trafo,
        load,
        iterations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PowerFlowError;
    use crate::testcases::{ieee9, isolated_bus};
    use approx::assert_relative_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_ieee9_results() {
        let net = ieee9();
        let res = NewtonRaphson::default().solve(&net).unwrap();
        assert_eq!(res.bus.len(), 9);
        assert_eq!(res.line.len(), 6);
        assert_relative_eq!(res.bus[0].vm_pu, 1.04, epsilon = 1e-9);
        assert_relative_eq!(res.bus[0].va_degree, 0.0, epsilon = 1e-9);
        assert_relative_eq!(res.r#gen[0].vm_pu, 1.025, epsilon = 1e-9);
        assert_relative_eq!(res.r#gen[0].p_mw, 163.0);
        // generation covers load plus losses
        let balance = res.total_generation_mw() - res.total_load_mw() - res.total_losses_mw();
        assert!(balance.abs() < 1e-6, "balance error {balance}");
        // slack picks up the remainder of 315 MW load
        assert!(res.ext_grid[0].p_mw > 67.0 && res.ext_grid[0].p_mw < 75.0);
        for l in &res.line {
            assert!(l.pl_mw >= 0.0);
            assert!(l.loading_percent > 0.0);
        }
    }

    #[test]
    fn test_line_loading_definition() {
        let res = NewtonRaphson::default().solve(&ieee9()).unwrap();
        let l = &res.line[0];
        // max_i_ka is 10 kA for every 9-bus line
        assert_relative_eq!(l.loading_percent, l.i_ka / 10.0 * 100.0, epsilon = 1e-12);
        let expected = (l.p_from_mw.powi(2) + l.q_from_mvar.powi(2)).sqrt()
            / (3f64.sqrt() * l.vm_from_pu * 230.0);
        assert_relative_eq!(l.i_from_ka, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_no_slack() {
        let err = NewtonRaphson::default().solve(&isolated_bus()).unwrap_err();
        assert_eq!(err, PowerFlowError::NoSlack);
    }

    #[test]
    fn test_out_of_service_line_reports_zero() {
        let mut net = ieee9();
        net.line[5].in_service = false;
        let res = NewtonRaphson::default().solve(&net).unwrap();
        assert_eq!(res.line[5], LineResult::default());
    }

    #[test]
    fn test_warm_start_saves_iterations() {
        let net = ieee9();
        let mut nr = NewtonRaphson::new(PowerFlowConfig {
            warm_start: true,
            ..Default::default()
        });
        let cold = nr.solve(&net).unwrap();
        let warm = nr.solve(&net).unwrap();
        assert!(warm.iterations < cold.iterations);
        nr.clear_state();
        assert_eq!(nr.solve(&net).unwrap().iterations, cold.iterations);
    }

    #[test]
    fn test_custom_monitor() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let mut nr = NewtonRaphson::default()
            .with_monitor(move |i: usize, m: f64| sink.borrow_mut().push((i, m)));
        let res = nr.solve(&ieee9()).unwrap();
        assert_eq!(seen.borrow().len(), res.iterations + 1);
    }

    #[test]
    fn test_config_from_json() {
        let cfg: PowerFlowConfig = serde_json::from_str(r#"{"max_it": 20}"#).unwrap();
        assert_eq!(cfg.max_it, Some(20));
        assert_eq!(cfg.tol, None);
        assert!(!cfg.warm_start);
    }
}
