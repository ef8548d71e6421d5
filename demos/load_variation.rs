use gridstep::prelude::*;

fn main() {
    env_logger::init();
    let mut net = ieee9();
    let mut pf = NewtonRaphson::default();
    let levels = [0.8, 0.9, 1.0, 1.1, 1.2, 1.3];

    let rows = load_scaling_study(&mut net, &levels, &mut pf);
    println!("{:<12} {:<18} {}", "Load Level", "Min Voltage (pu)", "Max Voltage (pu)");
    for r in &rows {
        println!(
            "{:>6.0}%      {:>8.4}           {:>8.4}",
            r.level * 100.0,
            r.min_vm_pu,
            r.max_vm_pu
        );
    }

    // the same network with a slow 5 % swing on every load
    let mut config = QssConfig::reference(FaultTarget::Bus(4));
    config.load_variation = Some(LoadVariation {
        amplitude: 0.05,
        frequency_hz: 0.2,
    });
    let res = run(&mut net, &config, &mut pf).unwrap();
    println!("\n{}", TransientSummary::new(&res));
}
