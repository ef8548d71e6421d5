use rsparse::{
    data::{self, Numeric, Symb},
    lsolve, lu, sqr, usolve,
};

use super::Solve;

/// Sparse LU solver backed by `rsparse`.
///
/// The symbolic analysis is cached between calls until [`Solve::reset`].
#[derive(Default)]
pub struct RSparseSolver {
    x: Vec<f64>,
    symbolic: Option<Symb>,
}

#[allow(non_snake_case)]
impl Solve for RSparseSolver {
    fn solve(
        &mut self,
        Ap: &mut [usize],
        Ai: &mut [usize],
        Ax: &mut [f64],
        b: &mut [f64],
        n: usize,
    ) -> Result<(), &'static str> {
        if Ap.len() != n + 1 || b.len() != n {
            return Err("dimension mismatch");
        }
        if n == 0 {
            return Ok(());
        }
        let p: Vec<isize> = Ap.iter().map(|&v| v as isize).collect();
        let a = data::Sprs {
            m: n,
            n,
            i: Ai.to_vec(),
            p,
            x: Ax.to_vec(),
            nzmax: Ax.len(),
        };
        if self.x.len() != n {
            self.symbolic = None;
        }
        let s = self.symbolic.get_or_insert_with(|| sqr(&a, 1, false));
        self.x.resize(n, 0.0);
        let x = &mut self.x;
        let num = lu(&a, s, 1e-6).map_err(|_| "LU factorization failed")?; // numeric LU factorization
        ipvec(&num.pinv, b, &mut x[..]); // x = P*b
        lsolve(&num.l, x); // x = L\x
        usolve(&num.u, x); // x = U\x
        ipvec(&s.q, x, &mut b[..]); // b = Q*x

        if b.iter().any(|v| !v.is_finite()) {
            return Err("singular matrix");
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.symbolic = None;
    }
}

fn ipvec_identity<T: Numeric<T>>(b: &[T], x: &mut [T]) {
    x.copy_from_slice(b);
}

fn ipvec_perm<T: Numeric<T>>(p: &[isize], b: &[T], x: &mut [T]) {
    for k in 0..b.len() {
        x[p[k] as usize] = b[k];
    }
}

fn ipvec<T: Numeric<T>>(p: &Option<Vec<isize>>, b: &[T], x: &mut [T]) {
    match p {
        Some(pvec) => ipvec_perm(pvec, b, x),
        None => ipvec_identity(b, x),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_small_system() {
        // [[4, 1], [2, 3]] x = [1, 2], stored column-wise
        let mut ap = vec![0, 2, 4];
        let mut ai = vec![0, 1, 0, 1];
        let mut ax = vec![4.0, 2.0, 1.0, 3.0];
        let mut b = vec![1.0, 2.0];
        let mut solver = RSparseSolver::default();
        solver.solve(&mut ap, &mut ai, &mut ax, &mut b, 2).unwrap();
        assert!((b[0] - 0.1).abs() < 1e-12);
        assert!((b[1] - 0.6).abs() < 1e-12);

        // symbolic analysis is reused for a new right-hand side
        let mut b = vec![4.0, 2.0];
        solver.solve(&mut ap, &mut ai, &mut ax, &mut b, 2).unwrap();
        assert!((b[0] - 1.0).abs() < 1e-12);
        assert!(b[1].abs() < 1e-12);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut solver = RSparseSolver::default();
        let res = solver.solve(&mut [0, 1], &mut [0], &mut [1.0], &mut [1.0, 2.0], 1);
        assert!(res.is_err());
    }
}
