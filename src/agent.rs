// src/agent.rs
//
// Driving policies. The harness only needs `run_step`: given the latest
// observation bundle, produce a control proposal. Agents are constructed
// per episode so no state leaks between tasks.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::types::{Observations, VehicleControl};

/// A driving policy under evaluation.
pub trait Agent {
    /// Produce a control proposal for the current tick.
    fn run_step(&mut self, observations: &Observations) -> VehicleControl;

    /// Structured debug payload for the recorder. Whatever the agent wants
    /// to expose about its last decision.
    fn debug_info(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

fn default_target_speed() -> f64 {
    6.0
}

fn default_steer_gain() -> f64 {
    0.8
}

/// Agent tuning loaded from the `config.json` stored next to a model
/// checkpoint. Model- and agent-specific knobs the harness does not
/// interpret are carried in `model_args` and `agent_args` untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AgentConfig {
    /// Cruise speed the policy holds, in m/s.
    #[serde(default = "default_target_speed")]
    pub target_speed: f64,
    /// Proportional gain on heading error.
    #[serde(default = "default_steer_gain")]
    pub steer_gain: f64,
    /// Opaque model arguments, passed through to the policy.
    #[serde(default)]
    pub model_args: serde_json::Map<String, serde_json::Value>,
    /// Opaque agent arguments, passed through to the policy.
    #[serde(default)]
    pub agent_args: serde_json::Map<String, serde_json::Value>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            target_speed: default_target_speed(),
            steer_gain: default_steer_gain(),
            model_args: serde_json::Map::new(),
            agent_args: serde_json::Map::new(),
        }
    }
}

impl AgentConfig {
    /// Load a config from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, AgentError> {
        let contents = fs::read_to_string(path).map_err(|e| AgentError::IoError {
            path: path.display().to_string(),
            source: e.to_string(),
        })?;
        Self::from_json_str(&contents)
    }

    /// Parse a config from a JSON string.
    pub fn from_json_str(contents: &str) -> Result<Self, AgentError> {
        let config: Self = serde_json::from_str(contents).map_err(|e| AgentError::ParseError {
            source: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config for a model checkpoint: `config.json` in the
    /// checkpoint's directory if present, defaults otherwise. A present
    /// but malformed file is an error.
    pub fn for_model(model_path: &Path) -> Result<Self, AgentError> {
        let config_path = match model_path.parent() {
            Some(dir) => dir.join("config.json"),
            None => return Ok(Self::default()),
        };
        if !config_path.exists() {
            return Ok(Self::default());
        }
        Self::from_json_file(&config_path)
    }

    pub fn validate(&self) -> Result<(), AgentError> {
        if !(self.target_speed > 0.0) {
            return Err(AgentError::InvalidConfig {
                message: format!("target_speed must be positive, got {}", self.target_speed),
            });
        }
        if self.steer_gain < 0.0 {
            return Err(AgentError::InvalidConfig {
                message: format!("steer_gain must be non-negative, got {}", self.steer_gain),
            });
        }
        Ok(())
    }
}

/// Errors from loading agent configuration.
#[derive(Debug, Clone)]
pub enum AgentError {
    IoError { path: String, source: String },
    ParseError { source: String },
    InvalidConfig { message: String },
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentError::IoError { path, source } => {
                write!(f, "failed to read agent config {}: {}", path, source)
            }
            AgentError::ParseError { source } => {
                write!(f, "failed to parse agent config: {}", source)
            }
            AgentError::InvalidConfig { message } => {
                write!(f, "invalid agent config: {}", message)
            }
        }
    }
}

impl std::error::Error for AgentError {}

/// Proportional cruise policy: hold a target speed, steer against the
/// heading error, brake when closing on the goal.
#[derive(Debug, Clone)]
pub struct CruiseAgent {
    config: AgentConfig,
    last_speed_error: f64,
    last_control: VehicleControl,
}

impl CruiseAgent {
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config,
            last_speed_error: 0.0,
            last_control: VehicleControl::coast(),
        }
    }
}

impl Agent for CruiseAgent {
    fn run_step(&mut self, observations: &Observations) -> VehicleControl {
        let speed_error = self.config.target_speed - observations.speed;
        let throttle = (speed_error * 0.25).clamp(0.0, 0.75);
        // Brake on approach only while still above creep speed, so the
        // vehicle rolls across the goal instead of stopping short of it.
        let brake = if speed_error < -1.0 {
            0.3
        } else if observations.distance_to_goal < 2.0 && observations.speed > 1.0 {
            1.0
        } else {
            0.0
        };
        let steer = (-observations.heading_error * self.config.steer_gain).clamp(-1.0, 1.0);
        let control = VehicleControl {
            steer,
            throttle,
            brake,
        }
        .clamp();
        self.last_speed_error = speed_error;
        self.last_control = control;
        control
    }

    fn debug_info(&self) -> serde_json::Value {
        json!({
            "agent": "cruise",
            "target_speed": self.config.target_speed,
            "speed_error": self.last_speed_error,
            "steer": self.last_control.steer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(speed: f64, distance: f64, heading: f64) -> Observations {
        Observations {
            tick: 0,
            speed,
            distance_to_goal: distance,
            heading_error: heading,
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = AgentConfig::default();
        assert!(config.target_speed > 0.0);
        assert!(config.model_args.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_json_str() {
        let config = AgentConfig::from_json_str(
            r#"{"target_speed": 9.5, "model_args": {"backbone": "resnet34"}, "agent_args": {"horizon": 10}}"#,
        )
        .expect("valid config");
        assert_eq!(config.target_speed, 9.5);
        assert_eq!(config.steer_gain, default_steer_gain());
        assert_eq!(
            config.model_args.get("backbone").and_then(|v| v.as_str()),
            Some("resnet34")
        );
        assert_eq!(
            config.agent_args.get("horizon").and_then(|v| v.as_u64()),
            Some(10)
        );
    }

    #[test]
    fn test_config_rejects_bad_target_speed() {
        let err = AgentConfig::from_json_str(r#"{"target_speed": 0.0}"#);
        assert!(matches!(err, Err(AgentError::InvalidConfig { .. })));
    }

    #[test]
    fn test_for_model_without_config_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let model = dir.path().join("policy.bin");
        let config = AgentConfig::for_model(&model).expect("defaults");
        assert_eq!(config.target_speed, default_target_speed());
    }

    #[test]
    fn test_for_model_reads_sibling_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("config.json"), r#"{"target_speed": 3.0}"#)
            .expect("write config");
        let model = dir.path().join("policy.bin");
        let config = AgentConfig::for_model(&model).expect("config read");
        assert_eq!(config.target_speed, 3.0);
    }

    #[test]
    fn test_for_model_rejects_malformed_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("config.json"), "{not json").expect("write config");
        let model = dir.path().join("policy.bin");
        assert!(matches!(
            AgentConfig::for_model(&model),
            Err(AgentError::ParseError { .. })
        ));
    }

    #[test]
    fn test_cruise_accelerates_below_target() {
        let mut agent = CruiseAgent::new(AgentConfig::default());
        let control = agent.run_step(&obs(0.0, 100.0, 0.0));
        assert!(control.throttle > 0.0);
        assert_eq!(control.brake, 0.0);
        assert_eq!(control.steer, 0.0);
    }

    #[test]
    fn test_cruise_brakes_when_over_target() {
        let mut agent = CruiseAgent::new(AgentConfig::default());
        let control = agent.run_step(&obs(20.0, 100.0, 0.0));
        assert_eq!(control.throttle, 0.0);
        assert!(control.brake > 0.0);
    }

    #[test]
    fn test_cruise_steers_against_heading_error() {
        let mut agent = CruiseAgent::new(AgentConfig::default());
        let control = agent.run_step(&obs(5.0, 100.0, 0.5));
        assert!(control.steer < 0.0);
    }

    #[test]
    fn test_cruise_brakes_on_approach_but_keeps_creeping() {
        let mut agent = CruiseAgent::new(AgentConfig::default());
        let fast = agent.run_step(&obs(5.0, 1.5, 0.0));
        assert_eq!(fast.brake, 1.0);
        // Below creep speed the brake releases so the goal is still reached.
        let slow = agent.run_step(&obs(0.5, 1.5, 0.0));
        assert_eq!(slow.brake, 0.0);
        assert!(slow.throttle > 0.0);
    }

    #[test]
    fn test_debug_info_reflects_last_step() {
        let mut agent = CruiseAgent::new(AgentConfig::default());
        agent.run_step(&obs(2.0, 100.0, 0.0));
        let debug = agent.debug_info();
        assert_eq!(debug["agent"], "cruise");
        assert!(debug["speed_error"].as_f64().unwrap() > 0.0);
    }
}
