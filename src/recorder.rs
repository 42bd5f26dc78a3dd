// src/recorder.rs
//
// Recording side channel for episodes: per-task setup plus per-tick frames
// and control traces. Recording is observability, not part of the result
// log, so the file-backed recorder never propagates I/O errors into the
// episode loop. On the first failure it disables itself for the rest of
// the process.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::json;

use crate::env::Diagnostic;
use crate::types::{Observations, VehicleControl};

/// Sink for episode recordings.
///
/// `begin_episode` is the per-task side effect fired by the task iterator;
/// `record_tick` is offered everything the apply phase saw, including the
/// rendered frame before it is stripped from the diagnostic.
pub trait Recorder {
    /// Point the recorder at a suite's videos directory.
    fn begin_suite(&mut self, _videos_dir: &Path) {}

    /// Initialize recording for one upcoming episode.
    fn begin_episode(&mut self, _run_name: &str) {}

    /// Record one completed tick.
    fn record_tick(
        &mut self,
        _observations: &Observations,
        _control: &VehicleControl,
        _diagnostic: &Diagnostic,
        _debug: &serde_json::Value,
    ) {
    }
}

/// Recorder that discards everything.
pub struct NoopRecorder;

impl Recorder for NoopRecorder {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecorderMode {
    Off,
    Jsonl,
}

/// File-backed recorder writing one JSONL trace per episode under the
/// suite's videos directory.
///
/// In `off` mode all methods are no-ops. Write errors disable the
/// recorder silently; they never fail the run.
pub struct TickRecorder {
    mode: RecorderMode,
    videos_dir: Option<PathBuf>,
    writer: Option<BufWriter<File>>,
}

impl TickRecorder {
    /// A disabled recorder.
    pub fn off() -> Self {
        Self {
            mode: RecorderMode::Off,
            videos_dir: None,
            writer: None,
        }
    }

    /// A recorder that writes JSONL traces once a suite directory is set.
    pub fn jsonl() -> Self {
        Self {
            mode: RecorderMode::Jsonl,
            videos_dir: None,
            writer: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.mode == RecorderMode::Jsonl
    }

    fn disable(&mut self) {
        self.mode = RecorderMode::Off;
        self.writer = None;
    }

    fn finish_episode(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            let _ = writer.flush();
        }
        self.writer = None;
    }
}

impl Recorder for TickRecorder {
    fn begin_suite(&mut self, videos_dir: &Path) {
        if self.mode != RecorderMode::Jsonl {
            return;
        }
        self.finish_episode();
        if fs::create_dir_all(videos_dir).is_err() {
            self.disable();
            return;
        }
        self.videos_dir = Some(videos_dir.to_path_buf());
    }

    fn begin_episode(&mut self, run_name: &str) {
        if self.mode != RecorderMode::Jsonl {
            return;
        }
        self.finish_episode();
        let dir = match &self.videos_dir {
            Some(d) => d.clone(),
            None => {
                self.disable();
                return;
            }
        };
        match File::create(dir.join(format!("{}.jsonl", run_name))) {
            Ok(file) => self.writer = Some(BufWriter::new(file)),
            Err(_) => self.disable(),
        }
    }

    fn record_tick(
        &mut self,
        observations: &Observations,
        control: &VehicleControl,
        diagnostic: &Diagnostic,
        debug: &serde_json::Value,
    ) {
        if self.mode != RecorderMode::Jsonl {
            return;
        }
        let writer = match self.writer.as_mut() {
            Some(w) => w,
            None => return,
        };
        let line = json!({
            "tick": diagnostic.record.tick,
            "speed": observations.speed,
            "distance_to_goal": observations.distance_to_goal,
            "steer": control.steer,
            "throttle": control.throttle,
            "brake": control.brake,
            "frame_bytes": diagnostic.frame.as_ref().map(|f| f.len()).unwrap_or(0),
            "debug": debug,
        });
        if writeln!(writer, "{}", line).is_err() {
            self.disable();
        }
    }
}

impl Drop for TickRecorder {
    fn drop(&mut self) {
        self.finish_episode();
    }
}

/// Test recorder that counts side effects and remembers what it saw.
#[derive(Debug, Default)]
pub struct ProbeRecorder {
    pub suites_started: usize,
    pub episodes_started: usize,
    pub run_names: Vec<String>,
    pub ticks_recorded: usize,
    pub frames_seen: usize,
}

impl Recorder for ProbeRecorder {
    fn begin_suite(&mut self, _videos_dir: &Path) {
        self.suites_started += 1;
    }

    fn begin_episode(&mut self, run_name: &str) {
        self.episodes_started += 1;
        self.run_names.push(run_name.to_string());
    }

    fn record_tick(
        &mut self,
        _observations: &Observations,
        _control: &VehicleControl,
        diagnostic: &Diagnostic,
        _debug: &serde_json::Value,
    ) {
        self.ticks_recorded += 1;
        if diagnostic.frame.is_some() {
            self.frames_seen += 1;
        }
    }
}
