// src/env.rs
//
// The environment boundary. The harness never owns a simulator; it drives
// anything implementing `Environment` through the tick protocol and reads
// diagnostics back. `sim.rs` provides the in-crate implementations.

use serde::{Deserialize, Serialize};

use crate::task::Task;
use crate::types::{EpisodeCounters, Frame, Observations, VehicleControl};
use crate::weather::WeatherPreset;

/// Error reported by an environment, currently only from `init`.
#[derive(Debug, Clone)]
pub struct EnvError {
    pub message: String,
}

impl EnvError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for EnvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for EnvError {}

/// Tabular per-tick measurements retained in the episode's diagnostic log.
///
/// One row per tick; columns must stay integer/float/bool so the csv
/// round-trip stays stable. Raw imagery never lands here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    pub tick: u64,
    pub speed: f64,
    pub distance_to_goal: f64,
    pub collided: bool,
    pub total_lights: u32,
    pub total_lights_ran: u32,
}

/// What `apply_control` hands back: the tabular record plus, when the
/// environment renders, the frame for that tick.
///
/// The driver offers the frame to the recorder and then drops it; only
/// `record` survives into the diagnostic log.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub record: DiagnosticRecord,
    pub frame: Option<Frame>,
}

/// The simulation side of the step protocol.
///
/// Call order per episode: `set_seed`, `init`, then repeated
/// `tick`/`observations`/`apply_control` rounds until `is_success` or
/// `is_failure` holds. `tick` returning false means the simulation lost
/// synchronization; the driver treats that as fatal.
pub trait Environment {
    /// Set the random state used for the next `init`.
    fn set_seed(&mut self, seed: u64);

    /// Place the ego vehicle on a route from `start` to `target` under the
    /// given weather. Errors here abort the run.
    fn init(&mut self, start: u32, target: u32, weather: WeatherPreset) -> Result<(), EnvError>;

    /// Advance the world by one tick. Returns false when the simulation
    /// can no longer advance.
    fn tick(&mut self) -> bool;

    /// Current observation bundle for the agent.
    fn observations(&mut self) -> Observations;

    /// Commit a control to the world and report this tick's measurements.
    fn apply_control(&mut self, control: &VehicleControl) -> Diagnostic;

    /// Terminal predicate: the route was completed.
    fn is_success(&self) -> bool;

    /// Terminal predicate: the episode failed (timeout, or collision when
    /// the suite fails on collision).
    fn is_failure(&self) -> bool;

    /// Episode counters for summary building.
    fn counters(&self) -> EpisodeCounters;

    /// The native task catalog for the active suite, in enumeration order.
    fn all_tasks(&self) -> Vec<Task>;
}
