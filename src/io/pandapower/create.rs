//! Element constructors in the manner of `pandapower.create_*`.
//!
//! Each function appends one record and returns its index in the table.

use super::file_io::*;

/// Creates an empty network with the given frequency and base power.
pub fn create_empty_network(name: &str, f_hz: f64, sn_mva: f64) -> Network {
    Network {
        name: Some(name.to_string()),
        f_hz,
        sn_mva,
        ..Default::default()
    }
}

pub fn create_bus(net: &mut Network, vn_kv: f64, name: &str) -> i64 {
    let index = net.bus.iter().map(|b| b.index + 1).max().unwrap_or(0);
    net.bus.push(Bus {
        index,
        vn_kv,
        name: Some(name.to_string()),
        ..Default::default()
    });
    index
}

pub fn create_ext_grid(net: &mut Network, bus: i64, vm_pu: f64, va_degree: f64) -> usize {
    net.ext_grid.push(ExtGrid {
        bus,
        vm_pu,
        va_degree,
        ..Default::default()
    });
    net.ext_grid.len() - 1
}

/// Creates a voltage controlled generator; `limits` is `(min_p_mw, max_p_mw)`.
pub fn create_gen(
    net: &mut Network,
    bus: i64,
    p_mw: f64,
    vm_pu: f64,
    limits: Option<(f64, f64)>,
) -> usize {
    net.r#gen.push(Gen {
        bus,
        p_mw,
        vm_pu,
        min_p_mw: limits.map(|l| l.0),
        max_p_mw: limits.map(|l| l.1),
        ..Default::default()
    });
    net.r#gen.len() - 1
}

pub fn create_load(net: &mut Network, bus: i64, p_mw: f64, q_mvar: f64) -> usize {
    net.load.push(Load {
        bus,
        p_mw,
        q_mvar,
        ..Default::default()
    });
    net.load.len() - 1
}

#[allow(clippy::too_many_arguments)]
pub fn create_line_from_parameters(
    net: &mut Network,
    from_bus: i64,
    to_bus: i64,
    length_km: f64,
    r_ohm_per_km: f64,
    x_ohm_per_km: f64,
    c_nf_per_km: f64,
    max_i_ka: f64,
) -> usize {
    net.line.push(Line {
        from_bus,
        to_bus,
        length_km,
        r_ohm_per_km,
        x_ohm_per_km,
        c_nf_per_km,
        max_i_ka,
        ..Default::default()
    });
    net.line.len() - 1
}

/// Rated data of a two-winding transformer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrafoParameters {
    pub sn_mva: f64,
    pub vn_hv_kv: f64,
    pub vn_lv_kv: f64,
    pub vkr_percent: f64,
    pub vk_percent: f64,
    pub pfe_kw: f64,
    pub i0_percent: f64,
}

pub fn create_transformer_from_parameters(
    net: &mut Network,
    hv_bus: i64,
    lv_bus: i64,
    params: TrafoParameters,
) -> usize {
    net.trafo.push(Transformer {
        hv_bus,
        lv_bus,
        sn_mva: params.sn_mva,
        vn_hv_kv: params.vn_hv_kv,
        vn_lv_kv: params.vn_lv_kv,
        vkr_percent: params.vkr_percent,
        vk_percent: params.vk_percent,
        pfe_kw: params.pfe_kw,
        i0_percent: params.i0_percent,
        ..Default::default()
    });
    net.trafo.len() - 1
}

pub fn create_shunt(net: &mut Network, bus: i64, q_mvar: f64, p_mw: f64, vn_kv: f64) -> usize {
    net.shunt.push(Shunt {
        bus,
        q_mvar,
        p_mw,
        vn_kv,
        step: 1,
        max_step: 1,
        in_service: true,
        name: None,
    });
    net.shunt.len() - 1
}

pub fn create_sgen(net: &mut Network, bus: i64, p_mw: f64, q_mvar: f64) -> usize {
    net.sgen.push(SGen {
        name: None,
        bus,
        p_mw,
        q_mvar,
        sn_mva: None,
        scaling: 1.0,
        in_service: true,
        type_: None,
        current_source: false,
        controllable: None,
    });
    net.sgen.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_elements() {
        let mut net = create_empty_network("t", 50.0, 10.0);
        let b0 = create_bus(&mut net, 20.0, "a");
        let b1 = create_bus(&mut net, 20.0, "b");
        assert_eq!((b0, b1), (0, 1));
        create_ext_grid(&mut net, b0, 1.0, 0.0);
        let l = create_load(&mut net, b1, 1.0, 0.2);
        let ln = create_line_from_parameters(&mut net, b0, b1, 2.0, 0.1, 0.3, 10.0, 0.4);
        assert_eq!((l, ln), (0, 0));
        assert!(net.load[0].in_service);
        assert_eq!(net.load[0].scaling, 1.0);
        assert_eq!(net.line[0].parallel, 1);
        assert_eq!(net.line[0].df, 1.0);
        assert_eq!(net.f_hz, 50.0);
    }
}
