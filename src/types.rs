// src/types.rs
//
// Shared value types exchanged across the harness boundary: vehicle
// controls, observation bundles, rendered frames, and the per-episode
// counters the environment exposes for summary building.

use serde::{Deserialize, Serialize};

/// A vehicle control command as proposed by the agent and applied to the
/// environment after supervisor review.
///
/// Values are clamped to the actuator ranges on construction helpers; the
/// driver applies whatever it is handed, so supervisors that synthesise
/// controls should go through [`VehicleControl::clamp`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleControl {
    /// Steering angle in [-1, 1].
    pub steer: f64,
    /// Throttle in [0, 1].
    pub throttle: f64,
    /// Brake in [0, 1].
    pub brake: f64,
}

impl VehicleControl {
    /// A control that does nothing: no steering, no throttle, no brake.
    pub fn coast() -> Self {
        Self {
            steer: 0.0,
            throttle: 0.0,
            brake: 0.0,
        }
    }

    /// Clamp all channels to their actuator ranges.
    pub fn clamp(self) -> Self {
        Self {
            steer: self.steer.clamp(-1.0, 1.0),
            throttle: self.throttle.clamp(0.0, 1.0),
            brake: self.brake.clamp(0.0, 1.0),
        }
    }
}

impl Default for VehicleControl {
    fn default() -> Self {
        Self::coast()
    }
}

/// Observation bundle handed from the environment to the agent each tick.
///
/// The driver treats this as opaque: it is fetched in the produce phase,
/// forwarded to the agent, and offered to the recorder in the apply phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observations {
    /// Tick index at which the bundle was captured.
    pub tick: u64,
    /// Current speed in m/s.
    pub speed: f64,
    /// Remaining distance to the target pose, in metres.
    pub distance_to_goal: f64,
    /// Heading error towards the route, in radians.
    pub heading_error: f64,
}

/// Raw rendered frame payload.
///
/// Frames ride along on [`crate::env::Diagnostic`] for one tick only. The
/// recorder may consume them; the result log never retains them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(pub Vec<u8>);

impl Frame {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Counters the environment accumulates over one episode, snapshotted by
/// the driver when building a summary row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeCounters {
    /// Ticks elapsed since `init`.
    pub ticks: u64,
    /// Whether a collision has occurred this episode.
    pub collided: bool,
    /// Traffic lights encountered.
    pub total_lights: u32,
    /// Traffic lights run.
    pub total_lights_ran: u32,
}
