use nalgebra::*;
use nalgebra_sparse::{CooMatrix, CscMatrix};
use num_complex::Complex64;

/// Computes the Jacobian matrices of power injections with respect to voltage magnitudes and angles.
///
/// Given the admittance matrix `Ybus`, the complex voltage vector `v`, and the
/// normalized complex voltage vector `Vnorm`:
///
/// * `dS_dVm = diag(V) * conj(Ybus * diag(Vnorm)) + conj(diag(Ibus)) * diag(Vnorm)`
/// * `dS_dVa = j * diag(V) * conj(diag(Ibus) - Ybus * diag(V))`
///
/// Both are assembled entry by entry from the nonzeros of `Ybus`; the
/// diagonal terms are summed into the existing pattern.
///
/// # Notes
///
/// * This method is from MatPower:
///   R. D. Zimmerman, "AC Power Flows, Generalized OPF Costs and
///   their Derivatives using Complex Matrix Notation", MATPOWER
///   Technical Note 2, February 2010.
#[allow(non_snake_case)]
pub fn dSbus_dV(
    Ybus: &CscMatrix<Complex64>,
    v: &DVector<Complex64>,
    Vnorm: &DVector<Complex64>,
) -> (CscMatrix<Complex64>, CscMatrix<Complex64>) {
    let n = v.len();
    let ibus = Ybus * v;
    let mut dS_dVm = CooMatrix::new(n, n);
    let mut dS_dVa = CooMatrix::new(n, n);
    for (i, k, y) in Ybus.triplet_iter() {
        dS_dVm.push(i, k, v[i] * (y * Vnorm[k]).conj());
        dS_dVa.push(i, k, -Complex64::i() * v[i] * (y * v[k]).conj());
    }
    for i in 0..n {
        dS_dVm.push(i, i, ibus[i].conj() * Vnorm[i]);
        dS_dVa.push(i, i, Complex64::i() * v[i] * ibus[i].conj());
    }
    (CscMatrix::from(&dS_dVm), CscMatrix::from(&dS_dVa))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Finite difference check of both derivatives on a 2-bus system.
    #[test]
    #[allow(non_snake_case)]
    fn test_against_finite_differences() {
        let y = Complex64::new(1.0, -10.0);
        let sh = Complex64::new(0.0, 0.2);
        let mut coo = CooMatrix::new(2, 2);
        coo.push(0, 0, y + sh);
        coo.push(0, 1, -y);
        coo.push(1, 0, -y);
        coo.push(1, 1, y);
        let ybus = CscMatrix::from(&coo);
        let (vm, va) = ([1.02, 0.97], [0.0, -0.1]);
        let volt = |vm: [f64; 2], va: [f64; 2]| {
            DVector::from_fn(2, |i, _| Complex64::from_polar(vm[i], va[i]))
        };
        let sbus = |v: &DVector<Complex64>| v.component_mul(&(&ybus * v).conjugate());

        let v = volt(vm, va);
        let vnorm = v.map(|x| x / x.norm());
        let (dS_dVm, dS_dVa) = dSbus_dV(&ybus, &v, &vnorm);
        let (dvm, dva) = (DMatrix::from(&dS_dVm), DMatrix::from(&dS_dVa));

        let h = 1e-7;
        for k in 0..2 {
            let mut vm2 = vm;
            vm2[k] += h;
            let fd = (sbus(&volt(vm2, va)) - sbus(&v)) / Complex64::new(h, 0.0);
            let mut va2 = va;
            va2[k] += h;
            let fa = (sbus(&volt(vm, va2)) - sbus(&v)) / Complex64::new(h, 0.0);
            for i in 0..2 {
                assert!((fd[i] - dvm[(i, k)]).norm() < 1e-5);
                assert!((fa[i] - dva[(i, k)]).norm() < 1e-5);
            }
        }
    }
}
