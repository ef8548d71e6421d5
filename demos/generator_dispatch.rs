use gridstep::prelude::*;

fn main() {
    env_logger::init();
    let mut net = ieee9();
    let mut pf = NewtonRaphson::default();

    let rows = dispatch_study(&mut net, &[vec![163.0, 85.0], vec![180.0, 70.0]], &mut pf).unwrap();
    for row in &rows {
        println!("\nDispatch {:?}", row.set_points);
        for (i, g) in row.r#gen.iter().enumerate() {
            println!("Generator {}: {:.2} MW, {:.2} MVAr", i + 2, g.p_mw, g.q_mvar);
        }
        let slack = &row.ext_grid[0];
        println!("Slack Bus Power: {:.2} MW, {:.2} MVAr", slack.p_mw, slack.q_mvar);
        println!("Losses: {:.3} MW", row.losses_mw);
    }
}
