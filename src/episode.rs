// src/episode.rs
//
// The step-synchronization state machine that runs one task to a terminal
// state. Each simulation tick is split into two phases with an explicit
// handoff in between: `step_produce` advances the world and surfaces the
// agent's proposed control, the caller reviews it, and `step_apply` commits
// the reviewed control. The driver never applies a control that has not
// passed through both phases.

use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::env::{DiagnosticRecord, EnvError, Environment};
use crate::recorder::Recorder;
use crate::task::Task;
use crate::types::{EpisodeCounters, Observations, VehicleControl};
use crate::weather::WeatherPreset;

/// Lifecycle of one episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeState {
    /// Constructed, environment not yet initialized for this task.
    AwaitingReset,
    /// Ticking. `step_produce` / `step_apply` alternate in this state.
    Running,
    /// Terminal: the environment reported success.
    Succeeded,
    /// Terminal: the environment reported failure, or the episode aborted.
    Failed,
}

impl EpisodeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EpisodeState::AwaitingReset => "awaiting_reset",
            EpisodeState::Running => "running",
            EpisodeState::Succeeded => "succeeded",
            EpisodeState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EpisodeState::Succeeded | EpisodeState::Failed)
    }
}

impl std::fmt::Display for EpisodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which half of the tick handoff is due next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickPhase {
    Produce,
    Apply,
}

/// Result of `step_apply`: either the episode keeps ticking or it just
/// reached a terminal state and a summary row is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Running,
    Finished,
}

/// One row of the persisted summary table, built only when an episode
/// reaches a terminal state. Field order is the column order on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub weather: u32,
    pub start: u32,
    pub target: u32,
    pub success: bool,
    #[serde(rename = "t")]
    pub ticks: u64,
    pub total_lights_ran: u32,
    pub total_lights: u32,
    pub collided: bool,
}

impl SummaryRecord {
    pub fn from_episode(task: &Task, success: bool, counters: &EpisodeCounters) -> Self {
        Self {
            weather: task.weather,
            start: task.start,
            target: task.target,
            success,
            ticks: counters.ticks,
            total_lights_ran: counters.total_lights_ran,
            total_lights: counters.total_lights,
            collided: counters.collided,
        }
    }
}

/// Everything one completed episode hands to the aggregator.
#[derive(Debug, Clone)]
pub struct EpisodeOutcome {
    pub task: Task,
    pub success: bool,
    pub summary: SummaryRecord,
    pub diagnostics: Vec<DiagnosticRecord>,
}

/// Errors that abort an episode. None of these leave a summary row.
#[derive(Debug, Clone)]
pub enum EpisodeError {
    /// Environment initialization failed. Fatal for the run.
    Init { run_name: String, source: EnvError },
    /// The environment could not advance a tick. Fatal for the run.
    LostSync { run_name: String, tick: u64 },
    /// The task carries a weather id outside the preset table.
    UnknownWeather { run_name: String, weather: u32 },
    /// A driver method was called out of order.
    Protocol {
        operation: &'static str,
        state: String,
    },
}

impl std::fmt::Display for EpisodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EpisodeError::Init { run_name, source } => {
                write!(f, "episode {}: environment init failed: {}", run_name, source)
            }
            EpisodeError::LostSync { run_name, tick } => {
                write!(
                    f,
                    "episode {}: environment lost sync at tick {}",
                    run_name, tick
                )
            }
            EpisodeError::UnknownWeather { run_name, weather } => {
                write!(f, "episode {}: unknown weather id {}", run_name, weather)
            }
            EpisodeError::Protocol { operation, state } => {
                write!(f, "{} called in state {}", operation, state)
            }
        }
    }
}

impl std::error::Error for EpisodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EpisodeError::Init { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Reviews each proposed control before it is committed to the
/// environment. The driver calls this between the two phases of every
/// tick.
pub trait ControlSupervisor {
    fn review(&mut self, proposed: VehicleControl) -> VehicleControl;
}

/// Supervisor that commits every proposal unchanged.
pub struct PassThrough;

impl ControlSupervisor for PassThrough {
    fn review(&mut self, proposed: VehicleControl) -> VehicleControl {
        proposed
    }
}

/// Drives one task from reset to a terminal state.
///
/// The driver borrows its collaborators; the surrounding orchestration
/// owns environment, agent, and recorder and decides their lifetimes.
///
/// Protocol per tick while `Running`:
/// 1. `step_produce` advances the environment one tick, fetches
///    observations, asks the agent for a control, and returns that
///    proposal without applying it.
/// 2. The caller reviews the proposal (and may replace it).
/// 3. `step_apply` commits the reviewed control, offers the full
///    diagnostic to the recorder, strips the frame, appends the record
///    to the episode log, and evaluates the terminal predicates.
///
/// `run` wires the loop up against a [`ControlSupervisor`] for callers
/// that do not need to interleave their own work between phases.
pub struct EpisodeDriver<'a, E, A, R> {
    env: &'a mut E,
    agent: &'a mut A,
    recorder: &'a mut R,
    task: Task,
    seed: u64,
    state: EpisodeState,
    phase: TickPhase,
    pending: Option<Observations>,
    diagnostics: Vec<DiagnosticRecord>,
    summary: Option<SummaryRecord>,
}

impl<'a, E, A, R> EpisodeDriver<'a, E, A, R>
where
    E: Environment,
    A: Agent,
    R: Recorder,
{
    pub fn new(env: &'a mut E, agent: &'a mut A, recorder: &'a mut R, task: Task, seed: u64) -> Self {
        Self {
            env,
            agent,
            recorder,
            task,
            seed,
            state: EpisodeState::AwaitingReset,
            phase: TickPhase::Produce,
            pending: None,
            diagnostics: Vec::new(),
            summary: None,
        }
    }

    pub fn state(&self) -> EpisodeState {
        self.state
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Seed and initialize the environment for this task.
    ///
    /// Valid only once, from `AwaitingReset`. An init failure is fatal:
    /// the driver moves to `Failed` and the error propagates.
    pub fn reset(&mut self) -> Result<(), EpisodeError> {
        if self.state != EpisodeState::AwaitingReset {
            return Err(self.protocol_error("reset"));
        }
        let weather = match WeatherPreset::from_id(self.task.weather) {
            Some(w) => w,
            None => {
                self.state = EpisodeState::Failed;
                return Err(EpisodeError::UnknownWeather {
                    run_name: self.task.run_name.clone(),
                    weather: self.task.weather,
                });
            }
        };
        self.env.set_seed(self.seed);
        if let Err(source) = self.env.init(self.task.start, self.task.target, weather) {
            self.state = EpisodeState::Failed;
            return Err(EpisodeError::Init {
                run_name: self.task.run_name.clone(),
                source,
            });
        }
        self.state = EpisodeState::Running;
        self.phase = TickPhase::Produce;
        Ok(())
    }

    /// First phase of a tick: advance the environment, observe, and
    /// surface the agent's proposed control without applying it.
    ///
    /// A tick failure aborts the episode with no summary row.
    pub fn step_produce(&mut self) -> Result<VehicleControl, EpisodeError> {
        if self.state != EpisodeState::Running || self.phase != TickPhase::Produce {
            return Err(self.protocol_error("step_produce"));
        }
        if !self.env.tick() {
            self.state = EpisodeState::Failed;
            return Err(EpisodeError::LostSync {
                run_name: self.task.run_name.clone(),
                tick: self.env.counters().ticks,
            });
        }
        let observations = self.env.observations();
        let proposed = self.agent.run_step(&observations);
        self.pending = Some(observations);
        self.phase = TickPhase::Apply;
        Ok(proposed)
    }

    /// Second phase of a tick: commit the reviewed control, record the
    /// diagnostic, and evaluate the terminal predicates.
    pub fn step_apply(&mut self, control: VehicleControl) -> Result<StepOutcome, EpisodeError> {
        if self.state != EpisodeState::Running || self.phase != TickPhase::Apply {
            return Err(self.protocol_error("step_apply"));
        }
        let observations = match self.pending.take() {
            Some(o) => o,
            None => return Err(self.protocol_error("step_apply")),
        };
        let diagnostic = self.env.apply_control(&control);
        self.recorder
            .record_tick(&observations, &control, &diagnostic, &self.agent.debug_info());
        // Frames belong to the recorder; the result log keeps only the
        // tabular record.
        self.diagnostics.push(diagnostic.record);
        self.phase = TickPhase::Produce;

        let failed = self.env.is_failure();
        let succeeded = self.env.is_success();
        if failed || succeeded {
            let success = succeeded && !failed;
            self.summary = Some(SummaryRecord::from_episode(
                &self.task,
                success,
                &self.env.counters(),
            ));
            self.state = if success {
                EpisodeState::Succeeded
            } else {
                EpisodeState::Failed
            };
            return Ok(StepOutcome::Finished);
        }
        Ok(StepOutcome::Running)
    }

    /// Run the episode to completion under a supervisor, resetting first
    /// if needed.
    pub fn run<S: ControlSupervisor>(&mut self, supervisor: &mut S) -> Result<(), EpisodeError> {
        if self.state == EpisodeState::AwaitingReset {
            self.reset()?;
        }
        loop {
            let proposed = self.step_produce()?;
            let control = supervisor.review(proposed);
            if self.step_apply(control)? == StepOutcome::Finished {
                return Ok(());
            }
        }
    }

    /// Consume the driver after a terminal step and hand out the episode's
    /// results. Errors if the episode never produced a summary.
    pub fn into_outcome(self) -> Result<EpisodeOutcome, EpisodeError> {
        let state = self.state;
        match self.summary {
            Some(summary) if state.is_terminal() => Ok(EpisodeOutcome {
                task: self.task,
                success: state == EpisodeState::Succeeded,
                summary,
                diagnostics: self.diagnostics,
            }),
            _ => Err(EpisodeError::Protocol {
                operation: "into_outcome",
                state: state.to_string(),
            }),
        }
    }

    fn protocol_error(&self, operation: &'static str) -> EpisodeError {
        let state = match (self.state, self.phase) {
            (EpisodeState::Running, TickPhase::Produce) => "running/produce".to_string(),
            (EpisodeState::Running, TickPhase::Apply) => "running/apply".to_string(),
            (state, _) => state.to_string(),
        };
        EpisodeError::Protocol { operation, state }
    }
}
