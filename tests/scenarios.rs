use approx::assert_abs_diff_eq;
use gridstep::error::PfResult;
use gridstep::prelude::*;
use gridstep::testcases::isolated_bus;
use gridstep::timeseries::StepSnapshot;

/// Newton-Raphson that also keeps the solved `p_mw` of one load per step.
struct Recording {
    inner: NewtonRaphson,
    load: usize,
    solved_p: Vec<f64>,
}

impl Recording {
    fn new(load: usize) -> Self {
        Self {
            inner: NewtonRaphson::default(),
            load,
            solved_p: vec![],
        }
    }
}

impl PowerFlow for Recording {
    fn solve(&mut self, net: &Network) -> PfResult<PowerFlowResult> {
        let res = self.inner.solve(net)?;
        self.solved_p.push(res.load[self.load].p_mw);
        Ok(res)
    }
}

#[test]
fn reference_run_has_1001_steps() {
    let mut net = ieee9();
    let config = QssConfig::reference(FaultTarget::Bus(4));
    let res = run(&mut net, &config, &mut NewtonRaphson::default()).unwrap();
    assert_eq!(res.len(), 1001);
    assert_eq!(res.snapshots.len(), 1001);
    assert_abs_diff_eq!(res.time[1000], 10.0, epsilon = 1e-9);
    assert_eq!(res.non_converged_count(), 0);
}

#[test]
fn fault_window_covers_steps_100_to_109() {
    let mut net = ieee9();
    let config = QssConfig::reference(FaultTarget::Load(0));
    let res = run(&mut net, &config, &mut NewtonRaphson::default()).unwrap();
    let active: Vec<usize> = res
        .fault_active
        .iter()
        .enumerate()
        .filter_map(|(i, a)| a.then_some(i))
        .collect();
    assert_eq!(active, (100..110).collect::<Vec<_>>());
}

#[test]
fn tripled_load_is_solved_at_375_mw() {
    let mut net = ieee9();
    let config = QssConfig::reference(FaultTarget::Load(0));
    let mut pf = Recording::new(0);
    let res = run(&mut net, &config, &mut pf).unwrap();
    assert_eq!(pf.solved_p.len(), 1001);
    for (i, p) in pf.solved_p.iter().enumerate() {
        let expected = if res.fault_active[i] { 375.0 } else { 125.0 };
        assert_abs_diff_eq!(*p, expected, epsilon = 1e-9);
    }
    assert_eq!(net.load[0].p_mw, 125.0);

    // the heavier load drags its own bus down
    let vm = res.vm_series(4);
    assert!(vm[105] < vm[50] - 0.01);
    assert_abs_diff_eq!(vm[50], vm[500], epsilon = 1e-9);

    // line 0 (bus 3 to bus 4) feeds the faulted load and carries more of it
    let loading = res.loading_series(0);
    assert_eq!(loading.len(), 1001);
    assert!(loading[105] > loading[50]);
    assert_abs_diff_eq!(loading[50], loading[500], epsilon = 1e-9);
}

#[test]
fn isolated_bus_never_converges() {
    let mut net = isolated_bus();
    let config = QssConfig {
        duration: 1.0,
        time_step: 0.1,
        fault: FaultSchedule {
            target: FaultTarget::Load(0),
            onset: 0.2,
            duration: 0.3,
            multiplier: 2.0,
        },
        load_variation: None,
    };
    let res = run(&mut net, &config, &mut NewtonRaphson::default()).unwrap();
    assert_eq!(res.len(), 11);
    assert!(res.converged.iter().all(|c| !c));
    assert!(res.snapshots.iter().all(|s| *s == StepSnapshot::zeros(1, 0, 0)));
    assert!(res.iterations.iter().all(|i| *i == 0));
    assert_eq!(net.load[0].p_mw, 10.0);
}

#[test]
fn steady_state_balances() {
    let net = ieee9();
    let res = NewtonRaphson::default().solve(&net).unwrap();
    assert_abs_diff_eq!(res.bus[0].vm_pu, 1.04, epsilon = 1e-9);
    assert_abs_diff_eq!(res.bus[1].vm_pu, 1.025, epsilon = 1e-9);
    assert_abs_diff_eq!(res.bus[2].vm_pu, 1.025, epsilon = 1e-9);
    assert_abs_diff_eq!(
        res.total_generation_mw(),
        res.total_load_mw() + res.total_losses_mw(),
        epsilon = 1e-6
    );
    let summary = SteadyStateSummary::new(&net, &res);
    assert!(summary.within_voltage_band);
    assert_eq!(summary.overloaded_lines, 0);
}
