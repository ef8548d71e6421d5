use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;

use crate::basic::system::*;
use crate::error::PowerFlowError;
use crate::io::pandapower::*;
use nalgebra::Complex;

/// Resolves pandapower bus indices to positions of in-service buses.
struct BusMap<'a> {
    lookup: HashMap<i64, usize>,
    active: Vec<&'a Bus>,
    known: HashSet<i64>,
}

impl<'a> BusMap<'a> {
    fn new(buses: &'a [Bus]) -> Self {
        let known = buses.iter().map(|b| b.index).collect();
        let active: Vec<_> = buses.iter().filter(|b| b.in_service).collect();
        let lookup = active
            .iter()
            .enumerate()
            .map(|(pos, b)| (b.index, pos))
            .collect();
        Self {
            lookup,
            active,
            known,
        }
    }

    /// `Ok(None)` when the bus exists but is out of service.
    fn get(&self, element: &'static str, bus: i64) -> Result<Option<usize>, PowerFlowError> {
        match self.lookup.get(&bus) {
            Some(p) => Ok(Some(*p)),
            None if self.known.contains(&bus) => Ok(None),
            None => Err(PowerFlowError::BusOutOfRange { element, bus }),
        }
    }

    fn vn_kv(&self, pos: usize) -> f64 {
        self.active[pos].vn_kv
    }
}

/// Converts a line to its equivalent admittance branches.
fn line_to_admit(
    wbase: f64,
    v_base: f64,
    from: usize,
    to: usize,
    line: &Line,
) -> Result<Vec<AdmittanceBranch>, PowerFlowError> {
    let parallel = line.parallel as f64;
    if line.parallel < 1 || line.length_km <= 0.0 {
        return Err(PowerFlowError::InvalidElement {
            element: "line",
            what: "length and parallel count must be positive",
        });
    }
    let rl = line.r_ohm_per_km * line.length_km / parallel;
    let xl = line.x_ohm_per_km * line.length_km / parallel;
    if rl == 0.0 && xl == 0.0 {
        return Err(PowerFlowError::InvalidElement {
            element: "line",
            what: "zero series impedance",
        });
    }

    let mut out = vec![AdmittanceBranch {
        y: Admittance(1.0 / Complex { re: rl, im: xl }),
        port: Port2::new(from, to),
        v_base,
    }];

    let b = wbase * 1e-9 * line.c_nf_per_km * line.length_km * parallel;
    let g = line.g_us_per_km * line.length_km * 1e-6 * parallel;
    if g != 0.0 || b != 0.0 {
        let a = Admittance(0.5 * Complex { re: g, im: b });
        for node in [from, to] {
            out.push(AdmittanceBranch {
                y: a,
                port: Port2::to_ground(node),
                v_base,
            });
        }
    }
    Ok(out)
}

/// Converts a transformer to its equivalent admittance branches.
///
/// The ratio includes the off-nominal part caused by rated voltages that
/// differ from the bus voltages, plus the hv-side tap changer position.
fn trafo_to_admit(
    item: &Transformer,
    hv: usize,
    lv: usize,
    vn_hv_bus: f64,
    vn_lv_bus: f64,
) -> Result<Vec<AdmittanceBranch>, PowerFlowError> {
    if item.sn_mva <= 0.0 || item.vk_percent <= 0.0 || item.parallel < 1 {
        return Err(PowerFlowError::InvalidElement {
            element: "trafo",
            what: "sn_mva, vk_percent and parallel must be positive",
        });
    }
    let v_base = vn_lv_bus;
    let vkr = item.vkr_percent * 0.01;
    let vk = item.vk_percent * 0.01;
    let parallel = item.parallel as f64;

    let mut tap_m = (item.vn_hv_kv / vn_hv_bus) / (item.vn_lv_kv / vn_lv_bus);
    let tap_steps = item.tap_pos.unwrap_or(0.0) - item.tap_neutral.unwrap_or(0.0);
    let tap_step = 0.01 * item.tap_step_percent.unwrap_or(0.0) * tap_steps;
    match item.tap_side.as_deref() {
        Some("lv") => tap_m /= 1.0 + tap_step,
        _ => tap_m *= 1.0 + tap_step,
    }

    // impedances referred to the lv bus voltage
    let zbase = item.vn_lv_kv * item.vn_lv_kv / item.sn_mva;
    let z = zbase * vk;
    let re = zbase * vkr;
    let im = (z.powi(2) - re.powi(2)).max(0.0).sqrt();
    let y = parallel / Complex { re, im };

    let mut v = vec![
        AdmittanceBranch {
            y: Admittance(y / tap_m),
            port: Port2::new(hv, lv),
            v_base,
        },
        AdmittanceBranch {
            y: Admittance((1.0 - tap_m) * y / tap_m.powi(2)),
            port: Port2::to_ground(hv),
            v_base,
        },
        AdmittanceBranch {
            y: Admittance((1.0 - 1.0 / tap_m) * y),
            port: Port2::to_ground(lv),
            v_base,
        },
    ];

    if item.i0_percent > 0.0 || item.pfe_kw > 0.0 {
        let g = item.pfe_kw * 1e-3 / item.sn_mva;
        let ym = (item.i0_percent * 0.01).max(g);
        let b = (ym.powi(2) - g.powi(2)).sqrt();
        let c = parallel * Complex::new(g, -b) / zbase;
        v.push(AdmittanceBranch {
            y: Admittance(c / tap_m.powi(2)),
            port: Port2::to_ground(hv),
            v_base,
        });
    }
    Ok(v)
}

/// Converts a shunt to its equivalent admittance.
///
/// pandapower quotes the shunt consumption at its rated voltage.
fn shunt_to_admit(item: &Shunt, node: usize, vn_bus: f64) -> AdmittanceBranch {
    let s = Complex::new(item.p_mw, -item.q_mvar) * item.step as f64;
    let y = s / (item.vn_kv * item.vn_kv);
    AdmittanceBranch {
        y: Admittance(y),
        port: Port2::to_ground(node),
        v_base: vn_bus,
    }
}

impl TryFrom<&Network> for PFNetwork {
    type Error = PowerFlowError;

    fn try_from(value: &Network) -> Result<Self, Self::Error> {
        if value.bus.iter().all(|b| !b.in_service) {
            return Err(PowerFlowError::EmptyNetwork);
        }
        let map = BusMap::new(&value.bus);
        let s_base = value.sn_mva;
        let wbase = value.f_hz * 2.0 * PI;

        let mut ext = Vec::new();
        for e in value.ext_grid.iter().filter(|e| e.in_service) {
            if let Some(bus) = map.get("ext_grid", e.bus)? {
                ext.push(ExtGridNode {
                    v: e.vm_pu,
                    phase: e.va_degree.to_radians(),
                    bus,
                });
            }
        }
        if ext.is_empty() {
            return Err(PowerFlowError::NoSlack);
        }

        let mut y_br = Vec::new();
        let mut lines = Vec::new();
        for (element, line) in value.line.iter().enumerate() {
            if !line.in_service {
                continue;
            }
            let (Some(from), Some(to)) = (
                map.get("line", line.from_bus)?,
                map.get("line", line.to_bus)?,
            ) else {
                continue;
            };
            let start = y_br.len();
            y_br.extend(line_to_admit(wbase, map.vn_kv(from), from, to, line)?);
            lines.push(BranchTerminals {
                element,
                from,
                to,
                branches: start..y_br.len(),
            });
        }

        let mut trafos = Vec::new();
        for (element, trafo) in value.trafo.iter().enumerate() {
            if !trafo.in_service {
                continue;
            }
            let (Some(hv), Some(lv)) = (
                map.get("trafo", trafo.hv_bus)?,
                map.get("trafo", trafo.lv_bus)?,
            ) else {
                continue;
            };
            let start = y_br.len();
            y_br.extend(trafo_to_admit(
                trafo,
                hv,
                lv,
                map.vn_kv(hv),
                map.vn_kv(lv),
            )?);
            trafos.push(BranchTerminals {
                element,
                from: hv,
                to: lv,
                branches: start..y_br.len(),
            });
        }

        for shunt in value.shunt.iter().filter(|s| s.in_service) {
            if let Some(node) = map.get("shunt", shunt.bus)? {
                y_br.push(shunt_to_admit(shunt, node, map.vn_kv(node)));
            }
        }

        let mut pq_loads = Vec::new();
        for load in value.load.iter().filter(|l| l.in_service) {
            if let Some(bus) = map.get("load", load.bus)? {
                let s = Complex::new(load.p_mw, load.q_mvar) * load.scaling;
                pq_loads.push(PQNode { s, bus });
            }
        }
        for sgen in value.sgen.iter().filter(|s| s.in_service) {
            if let Some(bus) = map.get("sgen", sgen.bus)? {
                let s = -Complex::new(sgen.p_mw, sgen.q_mvar) * sgen.scaling;
                pq_loads.push(PQNode { s, bus });
            }
        }

        let mut pv_nodes = Vec::new();
        for g in value.r#gen.iter().filter(|g| g.in_service) {
            if let Some(bus) = map.get("gen", g.bus)? {
                pv_nodes.push(PVNode {
                    p: g.p_mw * g.scaling,
                    v: g.vm_pu,
                    bus,
                });
            }
        }

        Ok(Self {
            s_base,
            buses: map.active.iter().map(|b| (*b).clone()).collect(),
            pq_loads,
            pv_nodes,
            ext,
            y_br,
            lines,
            trafos,
            bus_lookup: map.lookup,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testcases::{ieee9, isolated_bus};
    use approx::assert_relative_eq;

    #[test]
    fn test_ieee9_conversion() {
        let pf = PFNetwork::try_from(&ieee9()).unwrap();
        assert_eq!(pf.buses.len(), 9);
        assert_eq!(pf.lines.len(), 6);
        assert_eq!(pf.trafos.len(), 3);
        assert_eq!(pf.pq_loads.len(), 3);
        assert_eq!(pf.pv_nodes.len(), 2);
        assert_eq!(pf.ext.len(), 1);
        assert_relative_eq!(pf.ext[0].v, 1.04);
        // lines without capacitance expand into a single series branch
        assert!(pf.lines.iter().all(|l| l.branches.len() == 1));
    }

    #[test]
    fn test_missing_slack() {
        assert_eq!(
            PFNetwork::try_from(&isolated_bus()).unwrap_err(),
            PowerFlowError::NoSlack
        );
    }

    #[test]
    fn test_unknown_bus() {
        let mut net = ieee9();
        net.load[0].bus = 42;
        assert_eq!(
            PFNetwork::try_from(&net).unwrap_err(),
            PowerFlowError::BusOutOfRange {
                element: "load",
                bus: 42
            }
        );
    }

    #[test]
    fn test_out_of_service_elements_are_skipped() {
        let mut net = ieee9();
        net.load[1].in_service = false;
        net.line[0].in_service = false;
        let pf = PFNetwork::try_from(&net).unwrap();
        assert_eq!(pf.pq_loads.len(), 2);
        assert_eq!(pf.lines.len(), 5);
        assert_eq!(pf.lines[0].element, 1);
    }

    #[test]
    fn test_parallel_lines_halve_impedance() {
        let line = Line {
            r_ohm_per_km: 1.0,
            x_ohm_per_km: 1.0,
            length_km: 2.0,
            parallel: 2,
            ..Default::default()
        };
        let br = line_to_admit(2.0 * PI * 50.0, 10.0, 0, 1, &line).unwrap();
        assert_eq!(br.len(), 1);
        let z = 1.0 / br[0].y.0;
        assert_relative_eq!(z.re, 1.0);
        assert_relative_eq!(z.im, 1.0);
    }

    #[test]
    fn test_shunt_consumes_positive_q() {
        let shunt = Shunt {
            bus: 0,
            q_mvar: 10.0,
            p_mw: 0.0,
            vn_kv: 20.0,
            step: 1,
            max_step: 1,
            in_service: true,
            name: None,
        };
        let br = shunt_to_admit(&shunt, 0, 20.0);
        // S = |V|^2 conj(y) at 1 pu
        let s = br.y_pu(100.0).conj() * 100.0;
        assert_relative_eq!(s.im, 10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_tap_changer_ratio() {
        let mut trafo = ieee9().trafo[0].clone();
        trafo.tap_pos = Some(2.0);
        trafo.tap_neutral = Some(0.0);
        trafo.tap_step_percent = Some(2.5);
        let br = trafo_to_admit(&trafo, 1, 0, 230.0, 16.5).unwrap();
        let y: Complex<f64> = 1.0 / Complex::new(0.0, 16.5 * 16.5 / 100.0 * 0.0576);
        assert_relative_eq!(br[0].y.0.im, (y / 1.05).im, epsilon = 1e-9);
    }
}
