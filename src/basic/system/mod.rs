mod admittance;
pub use admittance::*;

use std::collections::HashMap;
use std::ops::Range;

use crate::io::pandapower::Bus;
use nalgebra::*;
use nalgebra_sparse::*;
use num_complex::Complex64;
use num_traits::One;

/// Represents a node with specified power and bus information in a power system.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PQNode {
    /// The complex power consumed at the node (MVA).
    pub s: Complex<f64>,
    /// Position of the bus in [`PFNetwork::buses`].
    pub bus: usize,
}

/// Represents a node with specified active power, voltage, and bus information in a power system.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PVNode {
    /// The active power injected at the node (MW).
    pub p: f64,
    /// The voltage magnitude at the node.
    pub v: f64,
    /// Position of the bus in [`PFNetwork::buses`].
    pub bus: usize,
}

/// Represents an external grid node with voltage, phase, and bus information.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtGridNode {
    /// The voltage magnitude at the external grid node.
    pub v: f64,
    /// The phase angle at the external grid node (radians).
    pub phase: f64,
    /// Position of the bus in [`PFNetwork::buses`].
    pub bus: usize,
}

impl Default for ExtGridNode {
    /// Creates a default external grid node with voltage set to 1.0 and other properties set to default.
    fn default() -> Self {
        Self {
            v: 1.0,
            phase: Default::default(),
            bus: Default::default(),
        }
    }
}

/// Links a two-terminal network element to the admittance branches it expands into.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchTerminals {
    /// Position of the element in its pandapower table.
    pub element: usize,
    /// Bus position of the from (hv) terminal.
    pub from: usize,
    /// Bus position of the to (lv) terminal.
    pub to: usize,
    /// Slice of [`PFNetwork::y_br`] owned by the element.
    pub branches: Range<usize>,
}

/// The per-unit view of a network that the Newton-Raphson solver works on.
///
/// Only in-service elements are present. Every bus reference is a position
/// into `buses`.
#[derive(Debug, Clone, Default)]
pub struct PFNetwork {
    /// The base power of the network.
    pub s_base: f64,
    /// The in-service buses of the network.
    pub buses: Vec<Bus>,
    /// The list of PQ nodes in the network.
    pub pq_loads: Vec<PQNode>,
    /// The list of PV nodes in the network.
    pub pv_nodes: Vec<PVNode>,
    /// The external grid nodes (slack buses) in the network.
    pub ext: Vec<ExtGridNode>,
    /// The list of branches with admittance and port information in the network.
    pub y_br: Vec<AdmittanceBranch>,
    /// Line elements and their admittance branches.
    pub lines: Vec<BranchTerminals>,
    /// Transformer elements and their admittance branches.
    pub trafos: Vec<BranchTerminals>,
    /// Maps a pandapower bus index to its position in `buses`.
    pub bus_lookup: HashMap<i64, usize>,
}

/// Solver ordering of the buses: PV buses first, then PQ, then the slack buses.
#[derive(Debug, Clone, PartialEq)]
pub struct BusOrdering {
    /// `order[k]` is the bus position placed at solver row `k`.
    pub order: Vec<usize>,
    /// `position[bus]` is the solver row of a bus position.
    pub position: Vec<usize>,
    pub npv: usize,
    pub npq: usize,
}

impl BusOrdering {
    /// Number of slack buses.
    pub fn n_ext(&self) -> usize {
        self.order.len() - self.npv - self.npq
    }

    /// Reorders a bus vector into solver order.
    pub fn permute<T: Scalar>(&self, x: &DVector<T>) -> DVector<T> {
        DVector::from_fn(self.order.len(), |k, _| x[self.order[k]].clone())
    }

    /// Restores a solver-ordered vector to bus order.
    pub fn restore<T: Scalar>(&self, x: &DVector<T>) -> DVector<T> {
        DVector::from_fn(self.order.len(), |b, _| x[self.position[b]].clone())
    }
}

/// Creates the incidence matrix of the power flow network.
///
/// Rows follow `position`, so the matrix is already in solver order.
fn create_incidence_mat(
    nodes: usize,
    y_br: &[AdmittanceBranch],
    position: &[usize],
) -> CooMatrix<Complex<f64>> {
    let mut incidence_matrix = CooMatrix::new(nodes, y_br.len());
    for (idx, i) in y_br.iter().enumerate() {
        if let Some(from) = i.port.from_node() {
            incidence_matrix.push(position[from], idx, Complex::one());
        }
        if let Some(to) = i.port.to_node() {
            incidence_matrix.push(position[to], idx, -Complex::one());
        }
    }
    incidence_matrix
}

/// Creates the nodal admittance matrix `Ybus = A * diag(y) * A^T` in per unit.
fn create_ybus(
    s_base: f64,
    incidence_matrix: &CooMatrix<Complex<f64>>,
    admits: &[AdmittanceBranch],
) -> CsrMatrix<Complex<f64>> {
    let mut diag_admit = CsrMatrix::identity(admits.len());
    diag_admit
        .values_mut()
        .iter_mut()
        .zip(admits)
        .for_each(|(x, br)| *x = br.y_pu(s_base));

    let incidence_matrix = CsrMatrix::from(incidence_matrix);
    &incidence_matrix * &(&diag_admit * &incidence_matrix.transpose())
}

/// Matrices handed to the Newton-Raphson iteration, all in solver order.
#[allow(non_snake_case)]
#[derive(Debug, Clone)]
pub struct PreparedSystem {
    pub ordering: BusOrdering,
    pub Ybus: CscMatrix<Complex64>,
    pub Sbus: DVector<Complex64>,
    pub v_init: DVector<Complex64>,
}

/// A trait for building the power flow equations of a network.
pub trait RunPF {
    /// Creates the nodal admittance matrix (Ybus) in bus order.
    fn create_y_bus(&self) -> CsrMatrix<Complex64>;

    /// Creates the nodal power injection vector (Sbus) in bus order.
    fn create_s_bus(&self) -> DVector<Complex64>;

    /// Creates the flat-start voltage vector with generator and slack set points.
    fn create_v_init(&self) -> DVector<Complex64>;

    /// Creates the PV / PQ / slack ordering used by the solver.
    fn bus_ordering(&self) -> BusOrdering;
}

impl RunPF for PFNetwork {
    fn create_y_bus(&self) -> CsrMatrix<Complex64> {
        let nodes = self.buses.len();
        let identity: Vec<_> = (0..nodes).collect();
        let incidence_matrix = create_incidence_mat(nodes, &self.y_br, &identity);
        create_ybus(self.s_base, &incidence_matrix, &self.y_br)
    }

    fn create_s_bus(&self) -> DVector<Complex64> {
        let nodes = self.buses.len();
        let mut sbus = DVector::zeros(nodes);
        for i in &self.pq_loads {
            sbus[i.bus] -= i.s;
        }
        for i in &self.pv_nodes {
            sbus[i.bus] += i.p;
        }

        let divider = 1.0 / self.s_base;
        sbus.apply(|x| (*x) *= divider);

        sbus
    }

    fn create_v_init(&self) -> DVector<Complex64> {
        let nodes = self.buses.len();
        let mut vbus = DVector::from_element(nodes, Complex64::one());
        for i in &self.pv_nodes {
            vbus[i.bus] = Complex64::new(i.v, 0.0);
        }
        for e in &self.ext {
            vbus[e.bus] = Complex64::from_polar(e.v, e.phase);
        }
        vbus
    }

    fn bus_ordering(&self) -> BusOrdering {
        let nodes = self.buses.len();
        let mut is_ext = vec![false; nodes];
        self.ext.iter().for_each(|e| is_ext[e.bus] = true);
        let mut is_pv = vec![false; nodes];
        self.pv_nodes
            .iter()
            .filter(|x| !is_ext[x.bus])
            .for_each(|x| is_pv[x.bus] = true);

        let pv: Vec<_> = (0..nodes).filter(|&b| is_pv[b]).collect();
        let pq: Vec<_> = (0..nodes).filter(|&b| !is_pv[b] && !is_ext[b]).collect();
        let ext: Vec<_> = (0..nodes).filter(|&b| is_ext[b]).collect();
        let (npv, npq) = (pv.len(), pq.len());

        let order: Vec<_> = pv.into_iter().chain(pq).chain(ext).collect();
        let mut position = vec![0; nodes];
        for (k, &b) in order.iter().enumerate() {
            position[b] = k;
        }
        BusOrdering {
            order,
            position,
            npv,
            npq,
        }
    }
}

impl PFNetwork {
    /// Position of a pandapower bus index, if the bus is in service.
    pub fn position(&self, bus: i64) -> Option<usize> {
        self.bus_lookup.get(&bus).copied()
    }

    /// Prepares solver-ordered matrices.
    ///
    /// `warm` replaces the flat start when its length matches the bus count;
    /// generator and slack set points are re-imposed on it.
    #[allow(non_snake_case)]
    pub fn prepare_matrices(&self, warm: Option<&DVector<Complex64>>) -> PreparedSystem {
        let ordering = self.bus_ordering();
        let nodes = self.buses.len();
        let incidence_matrix = create_incidence_mat(nodes, &self.y_br, &ordering.position);
        let Ybus = CscMatrix::from(&create_ybus(self.s_base, &incidence_matrix, &self.y_br));

        let v_init = match warm {
            Some(w) if w.len() == nodes => {
                let mut v = w.clone();
                for i in &self.pv_nodes {
                    v[i.bus] = Complex64::from_polar(i.v, v[i.bus].arg());
                }
                for e in &self.ext {
                    v[e.bus] = Complex64::from_polar(e.v, e.phase);
                }
                v
            }
            _ => self.create_v_init(),
        };
        let Sbus = ordering.permute(&self.create_s_bus());
        let v_init = ordering.permute(&v_init);
        PreparedSystem {
            ordering,
            Ybus,
            Sbus,
            v_init,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testcases::ieee9;
    use approx::assert_relative_eq;

    fn pf_ieee9() -> PFNetwork {
        PFNetwork::try_from(&ieee9()).unwrap()
    }

    #[test]
    fn test_ybus_symmetric() {
        let pf = pf_ieee9();
        let ybus = pf.create_y_bus();
        let dense = DMatrix::from(&ybus);
        assert_eq!(dense.nrows(), 9);
        for i in 0..9 {
            for k in 0..9 {
                assert_relative_eq!(dense[(i, k)].re, dense[(k, i)].re, epsilon = 1e-9);
                assert_relative_eq!(dense[(i, k)].im, dense[(k, i)].im, epsilon = 1e-9);
            }
        }
        let nan = ybus.values().iter().any(|b| b.is_nan());
        assert!(!nan, "invalid parameters {:?}", ybus.values());
    }

    #[test]
    fn test_ybus_values() {
        let pf = pf_ieee9();
        let dense = DMatrix::from(&pf.create_y_bus());
        // generator step-up transformer between positions 0 and 3: x = 0.0576 pu
        assert_relative_eq!(dense[(0, 0)].im, -1.0 / 0.0576, epsilon = 1e-6);
        assert_relative_eq!(dense[(0, 3)].im, 1.0 / 0.0576, epsilon = 1e-6);
        // rows of a network without shunts sum to zero
        for i in 0..9 {
            let s: Complex64 = dense.row(i).iter().sum();
            assert!(s.norm() < 1e-9);
        }
    }

    #[test]
    fn test_node_reordering() {
        let pf = pf_ieee9();
        let ord = pf.bus_ordering();
        assert_eq!(ord.npv, 2);
        assert_eq!(ord.npq, 6);
        assert_eq!(ord.n_ext(), 1);
        assert_eq!(ord.order[..2], [1, 2]);
        assert_eq!(*ord.order.last().unwrap(), 0);
        let x = DVector::from_fn(9, |i, _| i as f64);
        assert_eq!(ord.restore(&ord.permute(&x)), x);
    }

    #[test]
    fn test_s_bus_and_v_init() {
        let pf = pf_ieee9();
        let s = pf.create_s_bus();
        assert_relative_eq!(s[1].re, 1.63, epsilon = 1e-12);
        assert_relative_eq!(s[4].re, -1.25, epsilon = 1e-12);
        assert_relative_eq!(s[4].im, -0.5, epsilon = 1e-12);
        let v = pf.create_v_init();
        assert_relative_eq!(v[0].re, 1.04);
        assert_relative_eq!(v[2].re, 1.025);
        assert_relative_eq!(v[5].re, 1.0);
    }
}
