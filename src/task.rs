// src/task.rs
//
// Bounded task sequence for one suite run. Tasks come from the
// environment's native catalog; the iterator truncates to the caller's
// episode cap and fires the recorder's per-episode setup just before
// handing a task out, so recording is never initialized for tasks that
// will not run.

use serde::{Deserialize, Serialize};

use crate::recorder::Recorder;

/// One concrete navigation task: a weather preset id, a start/target pose
/// pair, and the run identifier its diagnostics are filed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub weather: u32,
    pub start: u32,
    pub target: u32,
    pub run_name: String,
}

/// Single-pass iteration over at most `max_count` catalog tasks.
///
/// Not a `std::iter::Iterator`: the recorder is borrowed only for the
/// duration of each `next_task` call so the caller can keep using it
/// between tasks.
pub struct TaskIterator {
    catalog: std::vec::IntoIter<Task>,
    remaining: usize,
    planned: usize,
    yielded: usize,
}

impl TaskIterator {
    pub fn new(catalog: Vec<Task>, max_count: usize) -> Self {
        let planned = catalog.len().min(max_count);
        Self {
            catalog: catalog.into_iter(),
            remaining: max_count,
            planned,
            yielded: 0,
        }
    }

    /// Number of tasks this iterator will yield in total.
    pub fn planned(&self) -> usize {
        self.planned
    }

    /// Number of tasks yielded so far.
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    /// Yield the next task, initializing recording for it first.
    pub fn next_task<R: Recorder>(&mut self, recorder: &mut R) -> Option<Task> {
        if self.remaining == 0 {
            return None;
        }
        let task = self.catalog.next()?;
        self.remaining -= 1;
        self.yielded += 1;
        recorder.begin_episode(&task.run_name);
        Some(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::ProbeRecorder;

    fn catalog(n: usize) -> Vec<Task> {
        (0..n)
            .map(|i| Task {
                weather: 1,
                start: i as u32,
                target: (i + 7) as u32,
                run_name: format!("w01_p{:03}_{:03}", i, i + 7),
            })
            .collect()
    }

    #[test]
    fn test_truncates_to_max_count() {
        let mut probe = ProbeRecorder::default();
        let mut tasks = TaskIterator::new(catalog(10), 3);
        let mut seen = Vec::new();
        while let Some(task) = tasks.next_task(&mut probe) {
            seen.push(task.start);
        }
        assert_eq!(seen, [0, 1, 2]);
        assert_eq!(tasks.yielded(), 3);
    }

    #[test]
    fn test_side_effect_never_fires_beyond_max_count() {
        let mut probe = ProbeRecorder::default();
        let mut tasks = TaskIterator::new(catalog(10), 2);
        while tasks.next_task(&mut probe).is_some() {}
        // Exhausted: further calls stay silent.
        assert!(tasks.next_task(&mut probe).is_none());
        assert_eq!(probe.episodes_started, 2);
        assert_eq!(
            probe.run_names,
            ["w01_p000_007", "w01_p001_008"]
        );
    }

    #[test]
    fn test_short_catalog_ends_early() {
        let mut probe = ProbeRecorder::default();
        let mut tasks = TaskIterator::new(catalog(2), 5);
        assert_eq!(tasks.planned(), 2);
        let mut count = 0;
        while tasks.next_task(&mut probe).is_some() {
            count += 1;
        }
        assert_eq!(count, 2);
        assert_eq!(probe.episodes_started, 2);
    }

    #[test]
    fn test_preserves_catalog_order() {
        let mut probe = ProbeRecorder::default();
        let mut tasks = TaskIterator::new(catalog(4), 4);
        let starts: Vec<u32> = std::iter::from_fn(|| tasks.next_task(&mut probe))
            .map(|t| t.start)
            .collect();
        assert_eq!(starts, [0, 1, 2, 3]);
    }
}
