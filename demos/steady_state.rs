use gridstep::prelude::*;

fn main() {
    env_logger::init();
    let net = ieee9();
    let mut pf = NewtonRaphson::default();
    let res = pf.solve(&net).unwrap();

    println!("Power flow converged in {} iterations", res.iterations);
    res.print_results(&net);

    let summary = SteadyStateSummary::new(&net, &res);
    println!("\n{summary}");
}
