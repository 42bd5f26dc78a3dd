// src/main.rs
//
// Benchmark CLI entrypoint.
//
// Resolves a suite alias against the built-in battery (or a YAML battery
// given with --suites-file), then runs the cruise policy through every
// task in every resolved suite inside the built-in simulated world.
// Results land under <model_dir>/benchmark/<model_stem>/<suite>_seed<seed>/.
// Re-invoking with --resume keeps previously recorded episodes.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use drivebench::agent::{AgentConfig, CruiseAgent};
use drivebench::episode::PassThrough;
use drivebench::recorder::TickRecorder;
use drivebench::runner::{BenchmarkRunner, RunConfig};
use drivebench::sim::SimWorld;
use drivebench::suites::{RegistryFile, SuiteRegistry};

#[derive(Debug, Parser)]
#[command(
    name = "drivebench",
    about = "Episodic driving-policy benchmark harness",
    version
)]
struct Args {
    /// Suite alias to run; resolves to one or more suites.
    #[arg(long, default_value = "town2")]
    suite: String,

    /// Model checkpoint the policy is evaluated as. Output paths derive
    /// from it; an optional config.json next to it tunes the agent.
    #[arg(long, default_value = "runs/sim-policy.bin")]
    model_path: PathBuf,

    /// Maximum tasks to run per suite.
    #[arg(long, default_value_t = 3)]
    max_count: usize,

    /// Seed for deterministic environment replay.
    #[arg(long, default_value_t = 2019)]
    seed: u64,

    /// Preload an existing summary table and append to it.
    #[arg(long)]
    resume: bool,

    /// Write a JSONL control trace per episode under videos/.
    #[arg(long)]
    record: bool,

    /// Load suites and aliases from a YAML battery instead of the
    /// built-in one.
    #[arg(long)]
    suites_file: Option<PathBuf>,

    /// List registered suites and aliases, then exit.
    #[arg(long)]
    list_suites: bool,

    /// Verbosity: -v, -vv
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn load_registry(args: &Args) -> Result<SuiteRegistry, String> {
    match &args.suites_file {
        Some(path) => RegistryFile::from_yaml_file(path)
            .and_then(RegistryFile::into_registry)
            .map_err(|e| e.to_string()),
        None => Ok(SuiteRegistry::standard()),
    }
}

fn print_registry(registry: &SuiteRegistry) {
    println!("Suites:");
    for suite in registry.suites() {
        println!(
            "  {:<20} {} {}  weathers={:?}  vehicles={} pedestrians={}",
            suite.name,
            suite.kind,
            suite.town,
            suite.weathers,
            suite.n_vehicles,
            suite.n_pedestrians
        );
    }
    println!("Aliases:");
    for (alias, suites) in registry.aliases() {
        println!("  {:<20} -> {}", alias, suites.join(", "));
    }
}

fn run(args: Args) -> i32 {
    let registry = match load_registry(&args) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Failed to load suite battery: {}", e);
            return 1;
        }
    };

    if args.list_suites {
        print_registry(&registry);
        return 0;
    }

    let agent_config = match AgentConfig::for_model(&args.model_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load agent config: {}", e);
            return 1;
        }
    };

    println!(
        "drivebench | suite={} model={} seed={} max_count={} resume={} record={}",
        args.suite,
        args.model_path.display(),
        args.seed,
        args.max_count,
        args.resume,
        args.record
    );
    if args.verbose > 0 {
        match registry.resolve(&args.suite) {
            Ok(names) => {
                for name in names {
                    if let Some(suite) = registry.get(name) {
                        println!("           | {} poses={}", suite.name, suite.poses_file);
                    }
                }
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
        if args.verbose > 1 {
            println!("           | agent target_speed={}", agent_config.target_speed);
        }
    }

    let mut recorder = if args.record {
        TickRecorder::jsonl()
    } else {
        TickRecorder::off()
    };

    let config = RunConfig {
        suite: args.suite,
        model_path: args.model_path,
        max_count: args.max_count,
        seed: args.seed,
        resume: args.resume,
        quiet: false,
    };
    let runner = BenchmarkRunner::new(&registry, config);

    let result = runner.run(
        |suite| Ok(SimWorld::from_suite(suite)),
        |_suite| Ok(CruiseAgent::new(agent_config.clone())),
        &mut recorder,
        &mut PassThrough,
    );

    match result {
        Ok(report) => {
            println!(
                "done | {}/{} episodes succeeded across {} suite(s)",
                report.successes, report.episodes, report.suites
            );
            0
        }
        Err(e) => {
            eprintln!("Benchmark failed: {}", e);
            1
        }
    }
}

fn main() {
    let args = Args::parse();
    std::process::exit(run(args));
}
