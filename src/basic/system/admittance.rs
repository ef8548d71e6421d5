use nalgebra::Complex;
use num_complex::Complex64;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

/// Represents the ground node in the network.
pub const GND: i32 = -1;

/// Represents an admittance value in siemens.
///
/// `Admittance` is a wrapper around a complex number representing the admittance value.
#[derive(Clone, Copy, Default, PartialEq, Debug, Serialize, Deserialize)]
pub struct Admittance(pub Complex<f64>);

/// Represents a port with two terminals.
///
/// Terminals are bus positions of the solver model; `GND` marks the reference.
#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Port2(pub nalgebra::Vector2<i32>);

impl Port2 {
    pub fn new(from: usize, to: usize) -> Self {
        Port2(nalgebra::vector![from as i32, to as i32])
    }

    pub fn to_ground(node: usize) -> Self {
        Port2(nalgebra::vector![node as i32, GND])
    }

    #[inline]
    pub fn from_node(&self) -> Option<usize> {
        (self.0[0] >= 0).then(|| self.0[0] as usize)
    }

    #[inline]
    pub fn to_node(&self) -> Option<usize> {
        (self.0[1] >= 0).then(|| self.0[1] as usize)
    }
}

/// Represents a branch with admittance and port information.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdmittanceBranch {
    /// The admittance value of the branch.
    pub y: Admittance,
    /// The port information of the branch.
    pub port: Port2,
    /// base voltage for per-unit values
    pub v_base: f64,
}

impl AdmittanceBranch {
    /// Admittance on the system base `s_base` (MVA).
    #[inline]
    pub fn y_pu(&self, s_base: f64) -> Complex64 {
        self.y.0 * (self.v_base * self.v_base / s_base)
    }

    /// Per-unit current leaving `node` through this branch.
    ///
    /// Returns zero when the branch does not touch `node`.
    pub fn current_from(&self, node: usize, v: &[Complex64], s_base: f64) -> Complex64 {
        let y = self.y_pu(s_base);
        let (a, b) = (self.port.from_node(), self.port.to_node());
        let at = |p: Option<usize>| p.map_or(Complex64::zero(), |p| v[p]);
        if a == Some(node) {
            y * (v[node] - at(b))
        } else if b == Some(node) {
            y * (v[node] - at(a))
        } else {
            Complex64::zero()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_unit_conversion() {
        let br = AdmittanceBranch {
            y: Admittance(Complex64::new(0.0, -0.01)),
            port: Port2::new(0, 1),
            v_base: 100.0,
        };
        let y = br.y_pu(100.0);
        assert!((y.im + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_terminal_current() {
        let series = AdmittanceBranch {
            y: Admittance(Complex64::new(1.0, 0.0)),
            port: Port2::new(0, 1),
            v_base: 1.0,
        };
        let shunt = AdmittanceBranch {
            y: Admittance(Complex64::new(0.0, 2.0)),
            port: Port2::to_ground(1),
            v_base: 1.0,
        };
        let v = [Complex64::new(1.0, 0.0), Complex64::new(0.5, 0.0)];
        assert_eq!(series.current_from(0, &v, 1.0), Complex64::new(0.5, 0.0));
        assert_eq!(series.current_from(1, &v, 1.0), Complex64::new(-0.5, 0.0));
        assert_eq!(shunt.current_from(1, &v, 1.0), Complex64::new(0.0, 1.0));
        assert_eq!(shunt.current_from(0, &v, 1.0), Complex64::zero());
    }
}
