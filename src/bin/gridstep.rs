use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use gridstep::prelude::*;
use gridstep::timeseries::export::{save_csv, save_json};
use std::path::PathBuf;

/// Quasi-steady-state fault studies on pandapower networks.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// pandapower JSON file, folder of CSV tables or zip of CSV tables.
    /// The built-in IEEE 9-bus case is used when omitted.
    #[arg(long, global = true)]
    case: Option<PathBuf>,

    /// Termination tolerance on per unit P & Q mismatch.
    #[arg(long, global = true)]
    tol: Option<f64>,

    /// Maximum number of Newton-Raphson iterations.
    #[arg(long, global = true)]
    max_it: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Single power flow with result tables
    Steady,

    /// Time-stepped run with a load fault
    Transient(TransientArgs),

    /// Power flow at several load levels
    LoadStudy(LoadStudyArgs),
}

#[derive(Args)]
struct TransientArgs {
    /// JSON run configuration; overrides the flags below.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 10.0)]
    duration: f64,

    #[arg(long, default_value_t = 0.01)]
    time_step: f64,

    /// Bus whose first load is faulted [default: 4].
    #[arg(long, conflicts_with = "fault_load")]
    fault_bus: Option<i64>,

    /// Position of the faulted load in the load table.
    #[arg(long)]
    fault_load: Option<usize>,

    #[arg(long, default_value_t = 1.0)]
    fault_onset: f64,

    #[arg(long, default_value_t = 0.1)]
    fault_duration: f64,

    #[arg(long, default_value_t = 3.0)]
    multiplier: f64,

    /// Relative amplitude of the sinusoidal load variation.
    #[arg(long, requires = "variation_hz")]
    variation_amplitude: Option<f64>,

    #[arg(long)]
    variation_hz: Option<f64>,

    /// Start each step from the previous solution.
    #[arg(long, default_value_t = false)]
    warm_start: bool,

    /// Write the time series as CSV.
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Write the time series as JSON.
    #[arg(long)]
    json: Option<PathBuf>,
}

#[derive(Args)]
struct LoadStudyArgs {
    #[arg(long, value_delimiter = ',', default_values_t = [0.8, 1.0, 1.2, 1.5])]
    levels: Vec<f64>,
}

fn main() {
    env_logger::Builder::from_default_env()
        .format_level(false)
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    match execute(&cli) {
        Ok(_) => {
            std::process::exit(0);
        }
        Err(err) => {
            eprintln!("error: {:#}", err);
            std::process::exit(2);
        }
    }
}

fn execute(cli: &Cli) -> Result<()> {
    let mut net = match &cli.case {
        Some(path) => {
            load_case(path).with_context(|| format!("loading case {}", path.display()))?
        }
        None => ieee9(),
    };
    let config = PowerFlowConfig {
        max_it: cli.max_it,
        tol: cli.tol,
        warm_start: matches!(&cli.command, Commands::Transient(a) if a.warm_start),
    };
    let mut pf = NewtonRaphson::new(config);

    match &cli.command {
        Commands::Steady => {
            let res = pf.solve(&net)?;
            println!("Power flow converged in {} iterations", res.iterations);
            res.print_results(&net);
            println!("\n{}", SteadyStateSummary::new(&net, &res));
        }
        Commands::Transient(args) => {
            let qss = transient_config(args)?;
            let res = run(&mut net, &qss, &mut pf)?;
            println!("{}", TransientSummary::new(&res));
            if let Some(path) = &args.csv {
                save_csv(&res, path)?;
            }
            if let Some(path) = &args.json {
                save_json(&res, path)?;
            }
            if !res.is_empty() && res.non_converged_count() == res.len() {
                bail!("no time step converged");
            }
        }
        Commands::LoadStudy(args) => {
            let rows = load_scaling_study(&mut net, &args.levels, &mut pf);
            println!("| level | load_mw | converged | min_vm_pu | max_vm_pu | losses_mw |");
            println!("|-------|---------|-----------|-----------|-----------|-----------|");
            for r in rows {
                println!(
                    "| {:.2} | {:.1} | {} | {:.4} | {:.4} | {:.3} |",
                    r.level, r.total_load_mw, r.converged, r.min_vm_pu, r.max_vm_pu, r.losses_mw
                );
            }
        }
    }
    Ok(())
}

fn transient_config(args: &TransientArgs) -> Result<QssConfig> {
    if let Some(path) = &args.config {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        return Ok(serde_json::from_str(&text)?);
    }
    let target = match (args.fault_bus, args.fault_load) {
        (Some(bus), _) => FaultTarget::Bus(bus),
        (None, Some(load)) => FaultTarget::Load(load),
        (None, None) => FaultTarget::Bus(4),
    };
    let load_variation = match (args.variation_amplitude, args.variation_hz) {
        (Some(amplitude), Some(frequency_hz)) => Some(LoadVariation {
            amplitude,
            frequency_hz,
        }),
        _ => None,
    };
    Ok(QssConfig {
        duration: args.duration,
        time_step: args.time_step,
        fault: FaultSchedule {
            target,
            onset: args.fault_onset,
            duration: args.fault_duration,
            multiplier: args.multiplier,
        },
        load_variation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transient_args(argv: &[&str]) -> TransientArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Commands::Transient(args) => args,
            _ => panic!("not a transient command"),
        }
    }

    #[test]
    fn test_default_fault_target_is_bus_4() {
        let qss = transient_config(&transient_args(&["gridstep", "transient"])).unwrap();
        assert_eq!(qss.fault.target, FaultTarget::Bus(4));
        assert_eq!(qss, QssConfig::reference(FaultTarget::Bus(4)));
    }

    #[test]
    fn test_fault_flags() {
        let args = transient_args(&["gridstep", "transient", "--fault-load", "2", "--multiplier", "2"]);
        let qss = transient_config(&args).unwrap();
        assert_eq!(qss.fault.target, FaultTarget::Load(2));
        assert_eq!(qss.fault.multiplier, 2.0);
        assert!(Cli::try_parse_from(["gridstep", "transient", "--fault-bus", "4", "--fault-load", "0"]).is_err());
    }
}
