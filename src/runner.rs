// src/runner.rs
//
// Run orchestration: resolve the requested alias, then for each suite
// build an environment, iterate its task catalog, drive every episode to
// a terminal state, and persist the outcome before moving on. Any episode
// or persistence failure aborts the whole run; completed rows stay on
// disk and the run can be resumed.

use std::path::PathBuf;

use crate::agent::{Agent, AgentError};
use crate::env::{EnvError, Environment};
use crate::episode::{ControlSupervisor, EpisodeDriver, EpisodeError};
use crate::recorder::Recorder;
use crate::results::{BenchmarkPaths, ResultAggregator, ResultsError, RunInfo};
use crate::suites::{SuiteConfig, SuiteError, SuiteRegistry};
use crate::task::TaskIterator;

/// Settings for one benchmark invocation.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Alias naming the suites to run.
    pub suite: String,
    /// Model checkpoint; output paths derive from it.
    pub model_path: PathBuf,
    /// Upper bound on tasks per suite.
    pub max_count: usize,
    pub seed: u64,
    /// Preload an existing summary table instead of starting fresh.
    pub resume: bool,
    /// Suppress per-episode console output.
    pub quiet: bool,
}

/// Tallies for the episodes completed by this invocation. Resumed rows
/// from previous runs are not counted here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub suites: usize,
    pub episodes: usize,
    pub successes: usize,
}

/// Errors that end a benchmark run.
#[derive(Debug)]
pub enum RunError {
    Suite(SuiteError),
    Env(EnvError),
    Agent(AgentError),
    Episode(EpisodeError),
    Results(ResultsError),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Suite(e) => write!(f, "suite error: {}", e),
            RunError::Env(e) => write!(f, "environment error: {}", e),
            RunError::Agent(e) => write!(f, "agent error: {}", e),
            RunError::Episode(e) => write!(f, "episode error: {}", e),
            RunError::Results(e) => write!(f, "results error: {}", e),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Suite(e) => Some(e),
            RunError::Env(e) => Some(e),
            RunError::Agent(e) => Some(e),
            RunError::Episode(e) => Some(e),
            RunError::Results(e) => Some(e),
        }
    }
}

impl From<SuiteError> for RunError {
    fn from(e: SuiteError) -> Self {
        RunError::Suite(e)
    }
}

impl From<EnvError> for RunError {
    fn from(e: EnvError) -> Self {
        RunError::Env(e)
    }
}

impl From<AgentError> for RunError {
    fn from(e: AgentError) -> Self {
        RunError::Agent(e)
    }
}

impl From<EpisodeError> for RunError {
    fn from(e: EpisodeError) -> Self {
        RunError::Episode(e)
    }
}

impl From<ResultsError> for RunError {
    fn from(e: ResultsError) -> Self {
        RunError::Results(e)
    }
}

/// Drives a full benchmark invocation over a suite registry.
///
/// The runner owns nothing long-lived itself: environments come from a
/// per-suite factory, agents from a per-episode factory, and the recorder
/// and supervisor are borrowed for the duration of the run.
pub struct BenchmarkRunner<'r> {
    registry: &'r SuiteRegistry,
    config: RunConfig,
}

impl<'r> BenchmarkRunner<'r> {
    pub fn new(registry: &'r SuiteRegistry, config: RunConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run every suite behind the configured alias.
    ///
    /// `make_env` is called once per suite, `make_agent` once per episode.
    /// The first failing episode aborts the run with its error; everything
    /// recorded up to that point stays on disk.
    pub fn run<E, A, R, S, FE, FA>(
        &self,
        mut make_env: FE,
        mut make_agent: FA,
        recorder: &mut R,
        supervisor: &mut S,
    ) -> Result<RunReport, RunError>
    where
        E: Environment,
        A: Agent,
        R: Recorder,
        S: ControlSupervisor,
        FE: FnMut(&SuiteConfig) -> Result<E, EnvError>,
        FA: FnMut(&SuiteConfig) -> Result<A, AgentError>,
    {
        let suite_names: Vec<String> = self.registry.resolve(&self.config.suite)?.to_vec();
        let mut report = RunReport::default();

        for suite_name in &suite_names {
            let suite = self
                .registry
                .get(suite_name)
                .ok_or_else(|| SuiteError::UnknownSuite {
                    alias: self.config.suite.clone(),
                    suite: suite_name.clone(),
                })?;
            self.run_suite(suite, &mut make_env, &mut make_agent, recorder, supervisor, &mut report)?;
            report.suites += 1;
        }
        Ok(report)
    }

    fn run_suite<E, A, R, S, FE, FA>(
        &self,
        suite: &SuiteConfig,
        make_env: &mut FE,
        make_agent: &mut FA,
        recorder: &mut R,
        supervisor: &mut S,
        report: &mut RunReport,
    ) -> Result<(), RunError>
    where
        E: Environment,
        A: Agent,
        R: Recorder,
        S: ControlSupervisor,
        FE: FnMut(&SuiteConfig) -> Result<E, EnvError>,
        FA: FnMut(&SuiteConfig) -> Result<A, AgentError>,
    {
        let paths = BenchmarkPaths::derive(&self.config.model_path, &suite.name, self.config.seed);
        let mut aggregator = ResultAggregator::open(paths.clone(), self.config.resume)?;

        RunInfo {
            model: self.config.model_path.display().to_string(),
            suite: suite.name.clone(),
            benchmark: suite.kind.benchmark().to_string(),
            poses_file: suite.poses_file.clone(),
            seed: self.config.seed,
            started_at: chrono::Utc::now().to_rfc3339(),
            resumed: self.config.resume,
            prior_rows: aggregator.resumed_rows(),
        }
        .write(&paths.run_info_file)?;

        if !self.config.quiet {
            println!(
                "=== {} | {} {} | seed {} ===",
                suite.name, suite.kind, suite.town, self.config.seed
            );
            if aggregator.resumed_rows() > 0 {
                println!("    resuming with {} recorded episodes", aggregator.resumed_rows());
            }
        }

        recorder.begin_suite(&paths.videos_dir);
        let mut env = make_env(suite)?;
        let mut tasks = TaskIterator::new(env.all_tasks(), self.config.max_count);
        let mut suite_successes = 0usize;
        let mut suite_episodes = 0usize;

        while let Some(task) = tasks.next_task(recorder) {
            let mut agent = make_agent(suite)?;
            let mut driver = EpisodeDriver::new(
                &mut env,
                &mut agent,
                recorder,
                task,
                self.config.seed,
            );
            driver.run(supervisor)?;
            let outcome = driver.into_outcome()?;
            aggregator.record(outcome.summary, &outcome.diagnostics, &outcome.task.run_name)?;

            suite_episodes += 1;
            report.episodes += 1;
            if outcome.success {
                suite_successes += 1;
                report.successes += 1;
            }
            if !self.config.quiet {
                let glyph = if outcome.success { "✓" } else { "✗" };
                println!(
                    "  {} {} ({} ticks)",
                    glyph, outcome.task.run_name, outcome.summary.ticks
                );
            }
        }

        if !self.config.quiet {
            println!(
                "    {}/{} succeeded, {} rows in {}",
                suite_successes,
                suite_episodes,
                aggregator.len(),
                paths.summary_file.display()
            );
        }
        Ok(())
    }
}
