// src/results.rs
//
// Result persistence. One summary table per (model, suite, seed) run plus
// one diagnostics table per episode, both rewritten whole and synchronously
// after every completed episode. The summary file is the single source of
// truth for resumption; diagnostics are write-only logs.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::env::DiagnosticRecord;
use crate::episode::SummaryRecord;

/// Output locations for one benchmark run, derived from the model path,
/// the suite name, and the seed:
///
/// ```text
/// <model_dir>/benchmark/<model_stem>/<suite>_seed<seed>/
///     summary.csv
///     run_info.json
///     diagnostics/<run_name>.csv
///     videos/<run_name>.jsonl
/// ```
#[derive(Debug, Clone)]
pub struct BenchmarkPaths {
    pub run_dir: PathBuf,
    pub summary_file: PathBuf,
    pub run_info_file: PathBuf,
    pub diagnostics_dir: PathBuf,
    pub videos_dir: PathBuf,
}

impl BenchmarkPaths {
    pub fn derive(model_path: &Path, suite_name: &str, seed: u64) -> Self {
        let model_dir = match model_path.parent() {
            Some(dir) if dir != Path::new("") => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let model_stem = model_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());
        let run_dir = model_dir
            .join("benchmark")
            .join(model_stem)
            .join(format!("{}_seed{}", suite_name, seed));
        Self {
            summary_file: run_dir.join("summary.csv"),
            run_info_file: run_dir.join("run_info.json"),
            diagnostics_dir: run_dir.join("diagnostics"),
            videos_dir: run_dir.join("videos"),
            run_dir,
        }
    }

    pub fn diagnostics_file(&self, run_name: &str) -> PathBuf {
        self.diagnostics_dir.join(format!("{}.csv", run_name))
    }

    pub fn ensure_dirs(&self) -> Result<(), ResultsError> {
        for dir in [&self.run_dir, &self.diagnostics_dir, &self.videos_dir] {
            fs::create_dir_all(dir).map_err(|e| ResultsError::IoError {
                path: dir.display().to_string(),
                source: e.to_string(),
            })?;
        }
        Ok(())
    }
}

/// Static facts about a run, written once at start next to the summary.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RunInfo {
    pub model: String,
    pub suite: String,
    pub benchmark: String,
    pub poses_file: String,
    pub seed: u64,
    pub started_at: String,
    pub resumed: bool,
    pub prior_rows: usize,
}

impl RunInfo {
    pub fn write(&self, path: &Path) -> Result<(), ResultsError> {
        let file = File::create(path).map_err(|e| ResultsError::IoError {
            path: path.display().to_string(),
            source: e.to_string(),
        })?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self).map_err(|e| ResultsError::SerializeError {
            source: e.to_string(),
        })
    }
}

/// Accumulates summary rows and persists them after every episode.
///
/// `record` appends one row and immediately rewrites the entire summary
/// table, then writes the episode's diagnostics log whole. Both writes
/// finish before `record` returns, so a run killed between episodes keeps
/// every completed episode on disk. Persistence errors propagate; they are
/// never swallowed.
pub struct ResultAggregator {
    paths: BenchmarkPaths,
    rows: Vec<SummaryRecord>,
    resumed_rows: usize,
}

impl ResultAggregator {
    /// Open the aggregator for a run. With `resume` set and an existing
    /// summary file, the table starts from the persisted rows; otherwise
    /// it starts empty and the first `record` overwrites whatever was
    /// there.
    pub fn open(paths: BenchmarkPaths, resume: bool) -> Result<Self, ResultsError> {
        paths.ensure_dirs()?;
        let rows = if resume && paths.summary_file.exists() {
            read_summary(&paths.summary_file)?
        } else {
            Vec::new()
        };
        let resumed_rows = rows.len();
        Ok(Self {
            paths,
            rows,
            resumed_rows,
        })
    }

    pub fn paths(&self) -> &BenchmarkPaths {
        &self.paths
    }

    /// Rows currently in the table, resumed ones first.
    pub fn rows(&self) -> &[SummaryRecord] {
        &self.rows
    }

    /// How many rows were preloaded from a previous run.
    pub fn resumed_rows(&self) -> usize {
        self.resumed_rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn successes(&self) -> usize {
        self.rows.iter().filter(|r| r.success).count()
    }

    /// Append one episode and synchronously persist both tables.
    pub fn record(
        &mut self,
        summary: SummaryRecord,
        diagnostics: &[DiagnosticRecord],
        run_name: &str,
    ) -> Result<(), ResultsError> {
        self.rows.push(summary);
        write_table(&self.paths.summary_file, &self.rows)?;
        write_table(&self.paths.diagnostics_file(run_name), diagnostics)?;
        Ok(())
    }
}

fn read_summary(path: &Path) -> Result<Vec<SummaryRecord>, ResultsError> {
    let file = File::open(path).map_err(|e| ResultsError::IoError {
        path: path.display().to_string(),
        source: e.to_string(),
    })?;
    let mut reader = csv::Reader::from_reader(file);
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: SummaryRecord = record.map_err(|e| ResultsError::CsvError {
            path: path.display().to_string(),
            source: e.to_string(),
        })?;
        rows.push(row);
    }
    Ok(rows)
}

fn write_table<T: serde::Serialize>(path: &Path, rows: &[T]) -> Result<(), ResultsError> {
    let file = File::create(path).map_err(|e| ResultsError::IoError {
        path: path.display().to_string(),
        source: e.to_string(),
    })?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    for row in rows {
        writer.serialize(row).map_err(|e| ResultsError::CsvError {
            path: path.display().to_string(),
            source: e.to_string(),
        })?;
    }
    writer.flush().map_err(|e| ResultsError::IoError {
        path: path.display().to_string(),
        source: e.to_string(),
    })?;
    Ok(())
}

/// Errors from result persistence. All fatal: persistence is the
/// crash-safety mechanism, so failures must surface, not be retried.
#[derive(Debug, Clone)]
pub enum ResultsError {
    IoError { path: String, source: String },
    CsvError { path: String, source: String },
    SerializeError { source: String },
}

impl std::fmt::Display for ResultsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultsError::IoError { path, source } => {
                write!(f, "Failed to access '{}': {}", path, source)
            }
            ResultsError::CsvError { path, source } => {
                write!(f, "Failed to encode table '{}': {}", path, source)
            }
            ResultsError::SerializeError { source } => {
                write!(f, "Failed to serialize run info: {}", source)
            }
        }
    }
}

impl std::error::Error for ResultsError {}
