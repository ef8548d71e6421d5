use super::{dsbus_dv::dSbus_dV, solver::Solve};
use crate::error::PowerFlowError;

use nalgebra::*;
use nalgebra_sparse::*;
use num_complex::Complex64;

/// Receives the mismatch norm after every Newton-Raphson iteration.
pub trait ProgressMonitor {
    fn on_iteration(&mut self, iteration: usize, mismatch: f64);
}

impl<F: FnMut(usize, f64)> ProgressMonitor for F {
    fn on_iteration(&mut self, iteration: usize, mismatch: f64) {
        self(iteration, mismatch)
    }
}

/// Solves the polar power-mismatch equations with Newton-Raphson.
///
/// Buses must be ordered PV first, then PQ, then slack buses. Returns the
/// converged voltage and the number of iterations taken.
#[allow(non_snake_case)]
#[allow(clippy::too_many_arguments)]
pub fn newton_pf<Solver: Solve, M: ProgressMonitor + ?Sized>(
    Ybus: &CscMatrix<Complex64>,
    Sbus: &DVector<Complex64>,
    v_init: &DVector<Complex64>,
    npv: usize,
    npq: usize,
    tolerance: Option<f64>,
    max_iter: Option<usize>,
    solver: &mut Solver,
    monitor: &mut M,
) -> Result<(DVector<Complex64>, usize), PowerFlowError> {
    let max_iter = max_iter.unwrap_or(10);
    let tol = tolerance.unwrap_or(1e-8);
    solver.reset();

    let mut v = v_init.clone();
    let mut v_norm = v.map(|e| e / e.norm());
    let mut v_m = v.map(|e| e.norm());
    let mut v_a = v.map(|e| e.arg());

    let n_bus = npq + npv;
    let num_state = npv + 2 * npq;

    let mut mis = v.component_mul(&(Ybus * &v).conjugate()) - Sbus;
    let mut F = DVector::zeros(num_state);
    assemble_f(&mut F, n_bus, &mis, num_state, npv);

    let mut norm = F.amax();
    monitor.on_iteration(0, norm);
    if !norm.is_finite() {
        return Err(PowerFlowError::Diverged);
    }
    if norm < tol {
        return Ok((v, 0));
    }

    for iterations in 1..=max_iter {
        let (dS_dVm, dS_dVa) = dSbus_dV(Ybus, &v, &v_norm);
        let jacobian = build_jacobian(&dS_dVm, &dS_dVa, npv, npq);

        let n = jacobian.nrows();
        let (mut Ap, mut Ai, mut Ax) = jacobian.disassemble();
        solver
            .solve(&mut Ap, &mut Ai, &mut Ax, F.as_mut_slice(), n)
            .map_err(|_| PowerFlowError::SingularJacobian)?;

        let dx = &F;
        update_v(&mut v_a, dx, n_bus, &mut v_m, npv, num_state);
        v_norm = v_a.map(|va| Complex64::from_polar(1.0, va));
        v.zip_zip_apply(&v_norm, &v_m, |a, e, vm| *a = e * vm);

        mis = v.component_mul(&(Ybus * &v).conjugate()) - Sbus;
        assemble_f(&mut F, n_bus, &mis, num_state, npv);

        norm = F.amax();
        monitor.on_iteration(iterations, norm);
        if !norm.is_finite() {
            return Err(PowerFlowError::Diverged);
        }
        if norm < tol {
            return Ok((v, iterations));
        }
    }
    Err(PowerFlowError::NotConverged {
        iterations: max_iter,
        mismatch: norm,
    })
}

/// `F = [Re(mis[pv, pq]); Im(mis[pq])]`
#[inline(always)]
fn assemble_f(
    f: &mut DVector<f64>,
    n_bus: usize,
    mis: &DVector<Complex64>,
    num_state: usize,
    npv: usize,
) {
    f.rows_range_mut(0..n_bus)
        .zip_apply(&mis.rows_range(0..n_bus), |a, b| *a = b.re);
    f.rows_range_mut(n_bus..num_state)
        .zip_apply(&mis.rows_range(npv..n_bus), |a, b| *a = b.im);
}

#[inline(always)]
fn update_v(
    v_a: &mut DVector<f64>,
    dx: &DVector<f64>,
    n_bus: usize,
    v_m: &mut DVector<f64>,
    npv: usize,
    num_state: usize,
) {
    v_a.rows_range_mut(0..n_bus)
        .zip_apply(&dx.rows_range(0..n_bus), |a, b| *a -= b);
    v_m.rows_range_mut(npv..n_bus)
        .zip_apply(&dx.rows_range(n_bus..num_state), |a, b| *a -= b);
}

/// Assembles
/// ```text
/// J = | Re dS/dVa[pvpq, pvpq]  Re dS/dVm[pvpq, pq] |
///     | Im dS/dVa[pq, pvpq]    Im dS/dVm[pq, pq]   |
/// ```
/// from the nonzeros of the two derivative matrices.
#[inline(always)]
fn build_jacobian(
    ds_dvm: &CscMatrix<Complex64>,
    ds_dva: &CscMatrix<Complex64>,
    npv: usize,
    npq: usize,
) -> CscMatrix<f64> {
    let n_bus = npv + npq;
    let dim = npv + 2 * npq;
    let mut j = CooMatrix::new(dim, dim);
    for (i, k, s) in ds_dva.triplet_iter() {
        if i >= n_bus || k >= n_bus {
            continue;
        }
        j.push(i, k, s.re);
        if i >= npv {
            j.push(n_bus + i - npv, k, s.im);
        }
    }
    for (i, k, s) in ds_dvm.triplet_iter() {
        if i >= n_bus || k < npv || k >= n_bus {
            continue;
        }
        j.push(i, n_bus + k - npv, s.re);
        if i >= npv {
            j.push(n_bus + i - npv, n_bus + k - npv, s.im);
        }
    }
    CscMatrix::from(&j)
}
