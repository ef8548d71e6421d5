//! Parameter sweeps over a network: load scaling and generator dispatch.
//!
//! Both studies mutate the network while they run and put the original set
//! points back before returning.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::basic::{ExtGridResult, GenResult, PowerFlow};
use crate::error::PfResult;
use crate::io::pandapower::Network;

/// Outcome of one load level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadLevelResult {
    pub level: f64,
    pub total_load_mw: f64,
    pub converged: bool,
    /// `NaN` when the level did not converge.
    pub min_vm_pu: f64,
    pub max_vm_pu: f64,
    pub losses_mw: f64,
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub set_points: Vec<f64>,
    pub r#gen: Vec<GenResult>,
    pub ext_grid: Vec<ExtGridResult>,
    pub losses_mw: f64,
}

/// Restores the `p_mw` column of loads or gens on drop.
struct Restore<'a> {
    net: &'a mut Network,
    load_p: Vec<f64>,
    gen_p: Vec<f64>,
}

impl<'a> Restore<'a> {
    fn new(net: &'a mut Network) -> Self {
        let load_p = net.load.iter().map(|l| l.p_mw).collect();
        let gen_p = net.r#gen.iter().map(|g| g.p_mw).collect();
        Self { net, load_p, gen_p }
    }
}

impl Drop for Restore<'_> {
    fn drop(&mut self) {
        for (l, p) in self.net.load.iter_mut().zip(&self.load_p) {
            l.p_mw = *p;
        }
        for (g, p) in self.net.r#gen.iter_mut().zip(&self.gen_p) {
            g.p_mw = *p;
        }
    }
}

/// Solves the network with every load scaled to `level` times its base value.
///
/// A level that fails to converge is reported with `converged = false` rather
/// than aborting the sweep.
pub fn load_scaling_study<P: PowerFlow + ?Sized>(
    network: &mut Network,
    levels: &[f64],
    solver: &mut P,
) -> Vec<LoadLevelResult> {
    let guard = Restore::new(network);
    let base_total: f64 = guard
        .net
        .load
        .iter()
        .filter(|l| l.in_service)
        .map(|l| l.p_mw)
        .sum();

    let mut out = Vec::with_capacity(levels.len());
    for &level in levels {
        for (l, p0) in guard.net.load.iter_mut().zip(&guard.load_p) {
            l.p_mw = p0 * level;
        }
        let total_load_mw = base_total * level;
        let row = match solver.solve(&*guard.net) {
            Ok(res) => {
                let (lo, hi) = res
                    .bus
                    .iter()
                    .map(|b| b.vm_pu)
                    .filter(|v| v.is_finite())
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                        (lo.min(v), hi.max(v))
                    });
                LoadLevelResult {
                    level,
                    total_load_mw,
                    converged: true,
                    min_vm_pu: lo,
                    max_vm_pu: hi,
                    losses_mw: res.total_losses_mw(),
                }
            }
            Err(e) => {
                warn!("load level {level} did not converge: {e}");
                LoadLevelResult {
                    level,
                    total_load_mw,
                    converged: false,
                    min_vm_pu: f64::NAN,
                    max_vm_pu: f64::NAN,
                    losses_mw: f64::NAN,
                }
            }
        };
        info!(
            "load level {level:.2}: {total_load_mw:.1} MW, converged={}",
            row.converged
        );
        out.push(row);
    }
    out
}

/// Solves the network once per set of generator `p_mw` set points.
///
/// Each entry of `set_points` holds one value per generator, in table order;
/// missing trailing values keep the generator's original set point. The first
/// failing dispatch aborts the study.
pub fn dispatch_study<P: PowerFlow + ?Sized>(
    network: &mut Network,
    set_points: &[Vec<f64>],
    solver: &mut P,
) -> PfResult<Vec<DispatchResult>> {
    let guard = Restore::new(network);
    let mut out = Vec::with_capacity(set_points.len());
    for points in set_points {
        for (i, g) in guard.net.r#gen.iter_mut().enumerate() {
            g.p_mw = points.get(i).copied().unwrap_or(guard.gen_p[i]);
        }
        let res = solver.solve(&*guard.net)?;
        info!(
            "dispatch {points:?}: slack {:.2} MW, losses {:.3} MW",
            res.ext_grid.iter().map(|e| e.p_mw).sum::<f64>(),
            res.total_losses_mw()
        );
        out.push(DispatchResult {
            set_points: points.clone(),
            losses_mw: res.total_losses_mw(),
            r#gen: res.r#gen,
            ext_grid: res.ext_grid,
        });
    }
    Ok(out)
}
