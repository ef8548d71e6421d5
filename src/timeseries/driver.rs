//! The quasi-steady-state driver.
//!
//! Each step sets the fault load (and, optionally, every load through the
//! variation profile), solves the power flow and records a snapshot. A step
//! whose solve fails repeats the last converged snapshot and is flagged.

use std::ops::ControlFlow;

use log::{debug, info, warn};

use super::fault::QssConfig;
use super::sim_time::Time;
use super::state::{StepSnapshot, TimeSeriesResult};
use crate::basic::PowerFlow;
use crate::error::ConfigError;
use crate::io::pandapower::Network;

/// Observes the run after every recorded step and may stop it.
pub trait StepMonitor {
    fn on_step(&mut self, step: usize, total: usize, t: Time, converged: bool) -> ControlFlow<()>;
}

impl<F> StepMonitor for F
where
    F: FnMut(usize, usize, Time, bool) -> ControlFlow<()>,
{
    fn on_step(&mut self, step: usize, total: usize, t: Time, converged: bool) -> ControlFlow<()> {
        self(step, total, t, converged)
    }
}

/// A monitor that never interrupts.
pub struct NoMonitor;

impl StepMonitor for NoMonitor {
    fn on_step(&mut self, _: usize, _: usize, _: Time, _: bool) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

/// Puts the original load set points back when dropped.
struct LoadRestore<'a> {
    net: &'a mut Network,
    original: Vec<f64>,
}

impl<'a> LoadRestore<'a> {
    fn new(net: &'a mut Network) -> Self {
        let original = net.load.iter().map(|l| l.p_mw).collect();
        Self { net, original }
    }
}

impl Drop for LoadRestore<'_> {
    fn drop(&mut self) {
        for (load, p) in self.net.load.iter_mut().zip(&self.original) {
            load.p_mw = *p;
        }
    }
}

/// Runs the quasi-steady-state simulation to completion.
pub fn run<P: PowerFlow + ?Sized>(
    network: &mut Network,
    config: &QssConfig,
    solver: &mut P,
) -> Result<TimeSeriesResult, ConfigError> {
    run_with_monitor(network, config, solver, &mut NoMonitor)
}

/// Runs the simulation, reporting every step to `monitor`.
///
/// The configuration is validated before the network is touched. Loads are
/// restored to their original `p_mw` when the run ends, whether it completed
/// or was stopped by the monitor.
pub fn run_with_monitor<P, M>(
    network: &mut Network,
    config: &QssConfig,
    solver: &mut P,
    monitor: &mut M,
) -> Result<TimeSeriesResult, ConfigError>
where
    P: PowerFlow + ?Sized,
    M: StepMonitor + ?Sized,
{
    let (axis, fault_load) = config.validate(network)?;
    let fault = config.fault;
    let (n_bus, n_gen, n_line) = (network.bus.len(), network.r#gen.len(), network.line.len());
    info!(
        "quasi-steady-state run: {} steps of {} s, load {} x{} from {} s to {} s",
        axis.len,
        axis.dt,
        fault_load,
        fault.multiplier,
        fault.onset,
        fault.end()
    );

    let mut result = TimeSeriesResult::with_capacity(axis.len);
    result.fault = Some(fault);
    result.fault_load = fault_load;

    let guard = LoadRestore::new(network);
    let mut last: Option<StepSnapshot> = None;

    for (i, t) in axis.iter() {
        let active = fault.is_active(t, axis.dt);
        let scale = config.load_variation.map_or(1.0, |v| v.factor(t));
        if config.load_variation.is_some() {
            for (load, p0) in guard.net.load.iter_mut().zip(&guard.original) {
                if load.in_service {
                    load.p_mw = p0 * scale;
                }
            }
        }
        let fault_factor = if active { fault.multiplier } else { 1.0 };
        guard.net.load[fault_load].p_mw = guard.original[fault_load] * scale * fault_factor;

        let (snapshot, converged, iterations) = match solver.solve(&*guard.net) {
            Ok(res) => {
                let snap = StepSnapshot::from(&res);
                last = Some(snap.clone());
                (snap, true, res.iterations)
            }
            Err(e) => {
                warn!("power flow did not converge at t={:.2}s: {e}", t.0);
                let snap = last
                    .clone()
                    .unwrap_or_else(|| StepSnapshot::zeros(n_bus, n_gen, n_line));
                (snap, false, 0)
            }
        };
        debug!("t={:.3}s fault={active} converged={converged} iterations={iterations}", t.0);
        result.push(t.0, snapshot, converged, active, iterations);

        if monitor.on_step(i, axis.len, t, converged).is_break() {
            result.cancelled = true;
            info!("run cancelled after {} of {} steps", i + 1, axis.len);
            break;
        }
    }
    drop(guard);

    info!(
        "run finished: {} steps, {} did not converge",
        result.len(),
        result.non_converged_count()
    );
    Ok(result)
}
