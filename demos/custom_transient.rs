use std::time::Instant;

use gridstep::prelude::*;

fn main() {
    env_logger::init();
    let mut net = ieee9();
    let mut pf = NewtonRaphson::default();

    // 8 s at 20 ms, 150 ms fault on the load at bus 5 starting at 2 s
    let config = QssConfig {
        duration: 8.0,
        time_step: 0.02,
        fault: FaultSchedule {
            target: FaultTarget::Bus(5),
            onset: 2.0,
            duration: 0.15,
            multiplier: 3.0,
        },
        load_variation: None,
    };

    let start = Instant::now();
    let res = run(&mut net, &config, &mut pf).unwrap();
    println!("Simulated {} time steps in {:?}", res.len(), start.elapsed());
    println!("{}", TransientSummary::new(&res));

    let vm = res.vm_series(4);
    let dip = vm.iter().cloned().fold(f64::INFINITY, f64::min);
    println!("Lowest voltage at bus 4: {dip:.4} pu");
}
