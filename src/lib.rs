//! Drivebench core library.
//!
//! An episodic evaluation harness: it drives a pretrained driving policy
//! through a fixed battery of navigation tasks in a simulated world,
//! records per-tick diagnostics and per-episode outcomes, and persists
//! results after every episode so an interrupted benchmark can be resumed.
//!
//! # Architecture
//!
//! - **Suites** (`suites`): declarative catalog of named task batteries.
//!   Each suite binds one town and one protocol kind to a pose file,
//!   weather list, and spawn densities; aliases group suites under short
//!   names. Batteries can also be loaded from YAML.
//!
//! - **Tasks** (`task`): bounded, ordered task sequences drawn lazily from
//!   an environment's catalog, firing the per-task recording side effect
//!   just before each yield.
//!
//! - **Episodes** (`episode`): the step-synchronization state machine.
//!   Every tick splits into a produce phase that surfaces the agent's
//!   proposed control and an apply phase that commits the reviewed
//!   control, so a supervisor can inspect or override each action before
//!   the simulation sees it.
//!
//! - **Results** (`results`): one summary table per (model, suite, seed)
//!   run plus one diagnostics table per episode, both rewritten whole and
//!   synchronously after every episode. The summary file is the resume
//!   point after a crash.
//!
//! The `runner` module ties these together; `sim` provides a
//! deterministic built-in world and a scripted test world behind the
//! `Environment` trait; `agent` provides the policy trait and a simple
//! cruise policy. The binary (`src/main.rs`) is a thin CLI around these
//! components.

pub mod agent;
pub mod env;
pub mod episode;
pub mod recorder;
pub mod results;
pub mod runner;
pub mod sim;
pub mod suites;
pub mod task;
pub mod types;
pub mod weather;

// --- Re-exports for ergonomic external use ---------------------------------

pub use agent::{Agent, AgentConfig, AgentError, CruiseAgent};
pub use env::{Diagnostic, DiagnosticRecord, EnvError, Environment};
pub use episode::{
    ControlSupervisor, EpisodeDriver, EpisodeError, EpisodeOutcome, EpisodeState, PassThrough,
    StepOutcome, SummaryRecord,
};
pub use recorder::{NoopRecorder, ProbeRecorder, Recorder, TickRecorder};
pub use results::{BenchmarkPaths, ResultAggregator, ResultsError, RunInfo};
pub use runner::{BenchmarkRunner, RunConfig, RunError, RunReport};
pub use sim::{ScriptedWorld, SimWorld, SimWorldConfig, TaskScript};
pub use suites::{
    RegistryFile, SuiteConfig, SuiteError, SuiteKind, SuiteParams, SuiteRegistry, Town,
    BENCHMARK_VERSION,
};
pub use task::{Task, TaskIterator};
pub use types::{EpisodeCounters, Frame, Observations, VehicleControl};
pub use weather::WeatherPreset;

// --- Library surface smoke tests --------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// One full episode through the public surface only.
    #[test]
    fn episode_runs_end_to_end_via_reexports() {
        let config = SimWorldConfig {
            route_length: 10.0,
            max_ticks: 2_000,
            n_vehicles: 0,
            ..SimWorldConfig::default()
        };
        let mut env = SimWorld::new(config);
        let mut agent = CruiseAgent::new(AgentConfig::default());
        let mut recorder = NoopRecorder;
        let task = Task {
            weather: 1,
            start: 36,
            target: 40,
            run_name: "w01_p036_040".to_string(),
        };

        let mut driver = EpisodeDriver::new(&mut env, &mut agent, &mut recorder, task, 2019);
        driver.run(&mut PassThrough).expect("episode completes");
        assert_eq!(driver.state(), EpisodeState::Succeeded);

        let outcome = driver.into_outcome().expect("terminal outcome");
        assert!(outcome.success);
        assert_eq!(outcome.diagnostics.len() as u64, outcome.summary.ticks);
    }

    /// The shipped battery is internally consistent: every alias resolves,
    /// every weather id has a preset, every pose file sits under its
    /// benchmark family.
    #[test]
    fn standard_battery_is_well_formed() {
        let registry = SuiteRegistry::standard();
        for alias in ["town1", "town2"] {
            for name in registry.resolve(alias).expect("alias resolves") {
                assert!(registry.get(name).is_some());
            }
        }
        for suite in registry.suites() {
            assert!(!suite.weathers.is_empty());
            for &id in &suite.weathers {
                assert!(WeatherPreset::from_id(id).is_some(), "weather id {}", id);
            }
            assert!(suite
                .poses_file
                .starts_with(suite.kind.benchmark()));
            assert!(suite.poses_file.contains(BENCHMARK_VERSION));
        }
    }
}
