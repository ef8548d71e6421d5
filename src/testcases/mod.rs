//! Built-in cases.

use crate::io::pandapower::*;

/// The WSCC / IEEE 9-bus system on a 100 MVA, 60 Hz base.
///
/// Buses 0..2 are the generator terminals, bus 0 carries the slack. Loads sit
/// on buses 4 (125 MW), 5 (90 MW) and 7 (100 MW), in that order.
pub fn ieee9() -> Network {
    let mut net = create_empty_network("IEEE 9 Bus System", 60.0, 100.0);

    let b1 = create_bus(&mut net, 16.5, "Bus 1 - Gen 1");
    let b2 = create_bus(&mut net, 18.0, "Bus 2 - Gen 2");
    let b3 = create_bus(&mut net, 13.8, "Bus 3 - Gen 3");
    let b4 = create_bus(&mut net, 230.0, "Bus 4");
    let b5 = create_bus(&mut net, 230.0, "Bus 5");
    let b6 = create_bus(&mut net, 230.0, "Bus 6");
    let b7 = create_bus(&mut net, 230.0, "Bus 7");
    let b8 = create_bus(&mut net, 230.0, "Bus 8");
    let b9 = create_bus(&mut net, 230.0, "Bus 9");

    create_ext_grid(&mut net, b1, 1.04, 0.0);
    create_gen(&mut net, b2, 163.0, 1.025, Some((10.0, 200.0)));
    create_gen(&mut net, b3, 85.0, 1.025, Some((10.0, 150.0)));

    let step_up = |vn_lv_kv, vk_percent| TrafoParameters {
        sn_mva: 100.0,
        vn_hv_kv: 230.0,
        vn_lv_kv,
        vkr_percent: 0.0,
        vk_percent,
        pfe_kw: 0.0,
        i0_percent: 0.0,
    };
    create_transformer_from_parameters(&mut net, b4, b1, step_up(16.5, 5.76));
    create_transformer_from_parameters(&mut net, b7, b2, step_up(18.0, 6.25));
    create_transformer_from_parameters(&mut net, b9, b3, step_up(13.8, 5.86));

    for (from, to, r, x) in [
        (b4, b5, 1.0, 17.0),
        (b4, b6, 1.7, 20.0),
        (b5, b7, 3.2, 16.1),
        (b6, b9, 3.9, 17.0),
        (b7, b8, 0.85, 7.2),
        (b8, b9, 1.19, 10.08),
    ] {
        create_line_from_parameters(&mut net, from, to, 1.0, r, x, 0.0, 10.0);
    }

    create_load(&mut net, b5, 125.0, 50.0);
    create_load(&mut net, b6, 90.0, 30.0);
    create_load(&mut net, b8, 100.0, 35.0);
    net
}

/// A single bus carrying a 10 MW load with no source and no slack.
///
/// Its power flow can never be solved.
pub fn isolated_bus() -> Network {
    let mut net = create_empty_network("isolated bus", 60.0, 100.0);
    let b = create_bus(&mut net, 20.0, "Bus 0");
    create_load(&mut net, b, 10.0, 0.0);
    net
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ieee9_tables() {
        let net = ieee9();
        assert_eq!(net.bus.len(), 9);
        assert_eq!(net.r#gen.len(), 2);
        assert_eq!(net.trafo.len(), 3);
        assert_eq!(net.line.len(), 6);
        assert_eq!(net.load.len(), 3);
        assert_eq!(net.load[0].bus, 4);
        assert_eq!(net.load[0].p_mw, 125.0);
        let total: f64 = net.load.iter().map(|l| l.p_mw).sum();
        assert_eq!(total, 315.0);
    }

    #[test]
    fn test_ieee9_roundtrips_through_json() {
        let net = ieee9();
        let s = serde_json::to_string(&net).unwrap();
        let back: Network = serde_json::from_str(&s).unwrap();
        assert_eq!(back, net);
    }
}
