use anyhow::{anyhow, Result};
use clap::{arg, ArgMatches, Command};
use oversketch_runtime::{
    run_scenario, Fault, FaultPlan, LocalExecutor, Scenario, ScenarioOutcome, Selector,
};
use oversketch_structs::{config::OverSketchConfig, core::Phase};
use oversketch_utils::{jsonify, load_json, u8s_from_str};
use std::{fs, path::PathBuf, time::Duration};
use tracing::info;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

fn scenario_args(cmd: Command) -> Command {
    cmd.arg(
        arg!([CONFIG] "OverSketch config json string or path to json file")
            .value_parser(clap::value_parser!(String)),
    )
    .arg(
        arg!(--m [M] "Rows of A")
            .default_value("2000")
            .value_parser(clap::value_parser!(usize)),
    )
    .arg(
        arg!(--n [N] "Columns of A and rows of B")
            .default_value("10000")
            .value_parser(clap::value_parser!(usize)),
    )
    .arg(
        arg!(--l [L] "Columns of B")
            .default_value("3000")
            .value_parser(clap::value_parser!(usize)),
    )
    .arg(
        arg!(--"block-size" [BLOCK_SIZE] "Row shard size of A and column shard size of B")
            .default_value("1000")
            .value_parser(clap::value_parser!(usize)),
    )
    .arg(
        arg!(--threshold [THRESHOLD] "Fraction of tasks to wait for in sketching and computing")
            .value_parser(clap::value_parser!(f64)),
    )
    .arg(
        arg!(--seed [SEED] "A string used in sketch seed generation")
            .value_parser(clap::value_parser!(String)),
    )
    .arg(
        arg!(--"data-seed" [DATA_SEED] "A string used to generate B")
            .default_value(oversketch_runtime::scenario::DEFAULT_DATA_SEED)
            .value_parser(clap::value_parser!(String)),
    )
    .arg(
        arg!(--"straggle-every" [N] "Every N-th task of the faulty phases misbehaves")
            .value_parser(clap::value_parser!(usize))
            .conflicts_with("straggle-rate"),
    )
    .arg(
        arg!(--"straggle-rate" [RATE] "Each task of the faulty phases misbehaves with this probability")
            .value_parser(clap::value_parser!(f64)),
    )
    .arg(
        arg!(--fault [FAULT] "How a selected task misbehaves")
            .default_value("hang")
            .value_parser(["hang", "delay", "fail"]),
    )
    .arg(
        arg!(--"delay-ms" [DELAY_MS] "Delay applied by the 'delay' fault")
            .default_value("1000")
            .value_parser(clap::value_parser!(u64)),
    )
    .arg(
        arg!(--"fault-phases" [PHASES] "Comma separated phases that faults apply to")
            .default_value("sketching,computing")
            .value_parser(clap::value_parser!(String)),
    )
}

fn cli() -> Command {
    Command::new("oversketch")
        .about("Straggler-tolerant sketched matrix multiplication")
        .arg_required_else_help(true)
        .subcommand(
            scenario_args(Command::new("run").about("Approximates A x B and reports the error"))
                .arg(
                    arg!(--"sketch-dim" [D] "Sketch dimension (default 4 x block size)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--output [OUTPUT_FILE] "If set, the run report will be saved to this file path (json)")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            scenario_args(
                Command::new("sweep").about("Runs once per sketch dimension, doubling each time"),
            )
            .arg(
                arg!(--"min-sketch-dim" [D] "First sketch dimension (default block size)")
                    .value_parser(clap::value_parser!(usize)),
            )
            .arg(
                arg!(--"max-sketch-dim" [D] "Last sketch dimension (default 8 x block size)")
                    .value_parser(clap::value_parser!(usize)),
            ),
        )
}

#[tokio::main]
async fn main() {
    if let Err(e) = init_logging() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    let matches = cli().get_matches();

    if let Err(e) = match matches.subcommand() {
        Some(("run", sub_m)) => run(sub_m).await,
        Some(("sweep", sub_m)) => sweep(sub_m).await,
        _ => Err(anyhow!("Invalid subcommand")),
    } {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

async fn run(sub_m: &ArgMatches) -> Result<()> {
    let scenario = load_scenario(sub_m)?;
    let mut config = load_config(sub_m, scenario.block_size * 4)?;
    if let Some(d) = sub_m.get_one::<usize>("sketch-dim") {
        config.sketch_dim = *d;
    }
    let executor = load_executor(sub_m)?;

    let outcome = run_scenario(&executor, &scenario, &config).await?;
    print_outcome(&outcome);
    if executor.faulted() > 0 {
        info!(
            "{} of {} submitted tasks were faulty",
            executor.faulted(),
            executor.submitted()
        );
    }

    if let Some(path) = sub_m.get_one::<PathBuf>("output") {
        let output = serde_json::json!({
            "config": config,
            "report": outcome.report,
            "relative_error": outcome.relative_error,
            "elapsed_ms": outcome.elapsed_ms,
        });
        fs::write(path, jsonify(&output))?;
        info!("wrote run report to {}", path.display());
    }
    Ok(())
}

async fn sweep(sub_m: &ArgMatches) -> Result<()> {
    let scenario = load_scenario(sub_m)?;
    let bs = scenario.block_size;
    let min_d = sub_m.get_one::<usize>("min-sketch-dim").copied().unwrap_or(bs);
    let max_d = sub_m
        .get_one::<usize>("max-sketch-dim")
        .copied()
        .unwrap_or(bs * 8);
    if min_d == 0 || min_d > max_d {
        return Err(anyhow!(
            "Invalid sketch dimension range {}..={}",
            min_d,
            max_d
        ));
    }
    let base = load_config(sub_m, min_d)?;

    let mut d = min_d;
    while d <= max_d {
        let mut config = base.clone();
        config.sketch_dim = d;
        let executor = load_executor(sub_m)?;
        let outcome = run_scenario(&executor, &scenario, &config).await?;
        println!(
            "d = {:>6}: error {:.2}% ({}ms)",
            d,
            outcome.relative_error * 100.0,
            outcome.elapsed_ms
        );
        d *= 2;
    }
    Ok(())
}

fn print_outcome(outcome: &ScenarioOutcome) {
    for phase in outcome.report.phases.iter() {
        println!(
            "{}: {} tasks, {} required, {} succeeded, {} failed, {} abandoned, {}ms",
            phase.phase,
            phase.num_tasks,
            phase.required,
            phase.succeeded,
            phase.failed,
            phase.abandoned,
            phase.elapsed_ms
        );
    }
    println!(
        "Frobenius norm error in OverSketched product: {:.2}%",
        outcome.relative_error * 100.0
    );
}

fn load_scenario(sub_m: &ArgMatches) -> Result<Scenario> {
    let get = |id: &str| {
        sub_m
            .get_one::<usize>(id)
            .copied()
            .ok_or_else(|| anyhow!("Missing argument '{}'", id))
    };
    let mut scenario = Scenario::new(get("m")?, get("n")?, get("l")?, get("block-size")?);
    if let Some(data_seed) = sub_m.get_one::<String>("data-seed") {
        scenario = scenario.with_data_seed(data_seed.clone());
    }
    Ok(scenario)
}

fn load_config(sub_m: &ArgMatches, default_sketch_dim: usize) -> Result<OverSketchConfig> {
    let mut config = match sub_m.get_one::<String>("CONFIG") {
        Some(input) => load_json::<OverSketchConfig>(input)?,
        None => OverSketchConfig::new(default_sketch_dim),
    };
    if let Some(threshold) = sub_m.get_one::<f64>("threshold") {
        config.threshold = *threshold;
    }
    if let Some(seed) = sub_m.get_one::<String>("seed") {
        config.seed = Some(seed.clone());
    }
    Ok(config)
}

fn load_executor(sub_m: &ArgMatches) -> Result<LocalExecutor> {
    let selector = match (
        sub_m.get_one::<usize>("straggle-every"),
        sub_m.get_one::<f64>("straggle-rate"),
    ) {
        (Some(n), _) => Selector::EveryNth(*n),
        (None, Some(rate)) => {
            if !(0.0..=1.0).contains(rate) {
                return Err(anyhow!("straggle-rate must be in [0, 1], got {}", rate));
            }
            let seed = sub_m
                .get_one::<String>("seed")
                .map(|s| u8s_from_str(s))
                .unwrap_or_else(rand::random);
            Selector::Random { rate: *rate, seed }
        }
        (None, None) => return Ok(LocalExecutor::new()),
    };
    let fault = match sub_m.get_one::<String>("fault").map(|s| s.as_str()) {
        Some("delay") => {
            let delay_ms = sub_m.get_one::<u64>("delay-ms").copied().unwrap_or(1000);
            Fault::Delay(Duration::from_millis(delay_ms))
        }
        Some("fail") => Fault::Fail,
        _ => Fault::Hang,
    };
    let phases = sub_m
        .get_one::<String>("fault-phases")
        .map(|s| parse_phases(s))
        .transpose()?
        .unwrap_or_default();
    Ok(LocalExecutor::with_faults(FaultPlan::new(
        selector, fault, phases,
    )))
}

fn parse_phases(input: &str) -> Result<Vec<Phase>> {
    input
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| match s {
            "sketching" => Ok(Phase::Sketching),
            "computing" => Ok(Phase::Computing),
            "reducing" => Ok(Phase::Reducing),
            other => Err(anyhow!("Unknown phase '{}'", other)),
        })
        .collect()
}
