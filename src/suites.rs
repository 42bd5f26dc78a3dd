// src/suites.rs
//
// Suite registry: the declarative catalog of benchmark batteries.
//
// A suite binds one town and one protocol kind to a pose file, a weather
// list, and spawn densities. Structured descriptors are the source of
// truth; deriving town/kind from the suite name is kept only as a
// convenience adapter for the classic names (FullTown02-v1 and friends).
// Aliases group suites under a short name and are validated eagerly.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Pose-file layout version shared by all batteries.
pub const BENCHMARK_VERSION: &str = "096";

/// Weather sets used by the standard batteries, by preset id.
pub const WEATHER_1: &[u32] = &[1, 3, 6, 8];
pub const WEATHER_2: &[u32] = &[4, 14];
pub const WEATHER_3: &[u32] = &[10, 14];
pub const WEATHER_4: &[u32] = &[1, 8, 14];

/// The closed set of towns a suite can run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Town {
    Town01,
    Town02,
}

impl Town {
    pub fn as_str(&self) -> &'static str {
        match self {
            Town::Town01 => "Town01",
            Town::Town02 => "Town02",
        }
    }

    /// Derive the town from a classic suite name by substring match.
    pub fn from_suite_name(name: &str) -> Option<Self> {
        if name.contains("Town01") {
            Some(Town::Town01)
        } else if name.contains("Town02") {
            Some(Town::Town02)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Town {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of evaluation protocol kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuiteKind {
    Turn,
    Straight,
    Full,
    NoCrash,
}

impl SuiteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuiteKind::Turn => "turn",
            SuiteKind::Straight => "straight",
            SuiteKind::Full => "full",
            SuiteKind::NoCrash => "nocrash",
        }
    }

    /// Benchmark family the kind's pose files belong to.
    pub fn benchmark(&self) -> &'static str {
        match self {
            SuiteKind::NoCrash => "carla100",
            _ => "corl2017",
        }
    }

    /// Derive the kind from a classic suite name by substring match,
    /// checked in the order turn, straight, full, nocrash.
    pub fn from_suite_name(name: &str) -> Option<Self> {
        if name.contains("Turn") {
            Some(SuiteKind::Turn)
        } else if name.contains("Straight") {
            Some(SuiteKind::Straight)
        } else if name.contains("Full") {
            Some(SuiteKind::Full)
        } else if name.contains("NoCrash") {
            Some(SuiteKind::NoCrash)
        } else {
            None
        }
    }
}

impl std::fmt::Display for SuiteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied suite parameters: spawn densities and the weather list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteParams {
    #[serde(default)]
    pub n_vehicles: u32,
    #[serde(default)]
    pub n_pedestrians: u32,
    #[serde(default)]
    pub weathers: Vec<u32>,
}

/// A fully resolved suite registration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuiteConfig {
    pub name: String,
    pub town: Town,
    pub kind: SuiteKind,
    /// `<benchmark>/<version>/<kind>_<town>.txt`, derived at registration.
    pub poses_file: String,
    /// True iff the kind is nocrash.
    pub fail_on_collision: bool,
    pub n_vehicles: u32,
    pub n_pedestrians: u32,
    pub weathers: Vec<u32>,
}

impl SuiteConfig {
    fn build(name: &str, town: Town, kind: SuiteKind, params: SuiteParams) -> Self {
        let poses_file = format!(
            "{}/{}/{}_{}.txt",
            kind.benchmark(),
            BENCHMARK_VERSION,
            kind.as_str(),
            town.as_str()
        );
        Self {
            name: name.to_string(),
            town,
            kind,
            poses_file,
            fail_on_collision: kind == SuiteKind::NoCrash,
            n_vehicles: params.n_vehicles,
            n_pedestrians: params.n_pedestrians,
            weathers: params.weathers,
        }
    }
}

/// Registry of suites and aliases.
///
/// Suites are keyed by exact name; aliases are keyed case-insensitively.
/// `resolve` only ever resolves aliases; a suite name is not implicitly
/// its own alias.
#[derive(Debug, Clone, Default)]
pub struct SuiteRegistry {
    suites: BTreeMap<String, SuiteConfig>,
    aliases: BTreeMap<String, Vec<String>>,
}

impl SuiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The battery the binary ships with: the Full suites for both towns
    /// under the two standard weather sets, grouped per town.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        let full = |weathers: &[u32]| SuiteParams {
            n_vehicles: 20,
            n_pedestrians: 20,
            weathers: weathers.to_vec(),
        };
        // The classic names parse cleanly, so registration cannot fail here.
        let _ = registry.add("FullTown01-v1", full(WEATHER_1));
        let _ = registry.add("FullTown01-v2", full(WEATHER_2));
        let _ = registry.add("FullTown02-v1", full(WEATHER_1));
        let _ = registry.add("FullTown02-v2", full(WEATHER_2));
        let _ = registry.add_alias("town1", &["FullTown01-v1", "FullTown01-v2"]);
        let _ = registry.add_alias("town2", &["FullTown02-v1", "FullTown02-v2"]);
        registry
    }

    /// Register a suite under a classic name, deriving town and kind from
    /// the name. Derivation errors fire before the duplicate check.
    pub fn add(&mut self, name: &str, params: SuiteParams) -> Result<(), SuiteError> {
        let town = Town::from_suite_name(name).ok_or_else(|| SuiteError::UnknownTown {
            name: name.to_string(),
        })?;
        let kind = SuiteKind::from_suite_name(name).ok_or_else(|| SuiteError::UnknownKind {
            name: name.to_string(),
        })?;
        self.add_descriptor(town, kind, name, params)
    }

    /// Register a suite from explicit town/kind tags. This is the
    /// structured path; `add` is an adapter over it.
    pub fn add_descriptor(
        &mut self,
        town: Town,
        kind: SuiteKind,
        name: &str,
        params: SuiteParams,
    ) -> Result<(), SuiteError> {
        if self.suites.contains_key(name) {
            return Err(SuiteError::DuplicateSuite {
                name: name.to_string(),
            });
        }
        self.suites
            .insert(name.to_string(), SuiteConfig::build(name, town, kind, params));
        Ok(())
    }

    /// Register an alias for an ordered list of already-registered suites.
    pub fn add_alias(&mut self, alias: &str, suite_names: &[&str]) -> Result<(), SuiteError> {
        if suite_names.is_empty() {
            return Err(SuiteError::EmptyAlias {
                alias: alias.to_string(),
            });
        }
        for suite in suite_names {
            if !self.suites.contains_key(*suite) {
                return Err(SuiteError::UnknownSuite {
                    alias: alias.to_string(),
                    suite: suite.to_string(),
                });
            }
        }
        self.aliases.insert(
            alias.to_lowercase(),
            suite_names.iter().map(|s| s.to_string()).collect(),
        );
        Ok(())
    }

    /// Resolve an alias (case-insensitively) to its suite names, in the
    /// order they were registered. Suite names themselves do not resolve.
    pub fn resolve(&self, name: &str) -> Result<&[String], SuiteError> {
        self.aliases
            .get(&name.to_lowercase())
            .map(|v| v.as_slice())
            .ok_or_else(|| SuiteError::UnknownAlias {
                name: name.to_string(),
            })
    }

    /// Look up a suite by exact name.
    pub fn get(&self, name: &str) -> Option<&SuiteConfig> {
        self.suites.get(name)
    }

    /// Registered suites in name order.
    pub fn suites(&self) -> impl Iterator<Item = &SuiteConfig> {
        self.suites.values()
    }

    /// Registered aliases in name order.
    pub fn aliases(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.aliases.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.suites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }
}

/// A suite battery loaded from YAML: classic-named suites plus aliases.
///
/// ```yaml
/// suites:
///   - name: FullTown02-v1
///     n_vehicles: 20
///     n_pedestrians: 20
///     weathers: [1, 3, 6, 8]
/// aliases:
///   town2: [FullTown02-v1]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryFile {
    pub suites: Vec<SuiteEntry>,
    #[serde(default)]
    pub aliases: BTreeMap<String, Vec<String>>,
}

/// One suite row in a [`RegistryFile`].
#[derive(Debug, Clone, Deserialize)]
pub struct SuiteEntry {
    pub name: String,
    #[serde(flatten)]
    pub params: SuiteParams,
}

impl RegistryFile {
    /// Load a battery from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, SuiteError> {
        let contents = fs::read_to_string(path.as_ref()).map_err(|e| SuiteError::IoError {
            path: path.as_ref().display().to_string(),
            source: e.to_string(),
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Parse a battery from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, SuiteError> {
        serde_yaml::from_str(yaml).map_err(|e| SuiteError::ParseError {
            source: e.to_string(),
        })
    }

    /// Build a registry, validating every suite name and alias.
    pub fn into_registry(self) -> Result<SuiteRegistry, SuiteError> {
        let mut registry = SuiteRegistry::new();
        for entry in self.suites {
            registry.add(&entry.name, entry.params)?;
        }
        for (alias, suites) in &self.aliases {
            let refs: Vec<&str> = suites.iter().map(|s| s.as_str()).collect();
            registry.add_alias(alias, &refs)?;
        }
        Ok(registry)
    }
}

/// Errors from suite registration, alias resolution, and battery loading.
#[derive(Debug, Clone)]
pub enum SuiteError {
    DuplicateSuite { name: String },
    UnknownTown { name: String },
    UnknownKind { name: String },
    UnknownAlias { name: String },
    UnknownSuite { alias: String, suite: String },
    EmptyAlias { alias: String },
    IoError { path: String, source: String },
    ParseError { source: String },
}

impl std::fmt::Display for SuiteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuiteError::DuplicateSuite { name } => {
                write!(f, "suite '{}' is already registered", name)
            }
            SuiteError::UnknownTown { name } => {
                write!(f, "no town specified in suite name '{}'", name)
            }
            SuiteError::UnknownKind { name } => {
                write!(f, "no suite kind specified in suite name '{}'", name)
            }
            SuiteError::UnknownAlias { name } => {
                write!(f, "unknown suite alias '{}'", name)
            }
            SuiteError::UnknownSuite { alias, suite } => {
                write!(f, "alias '{}' references unregistered suite '{}'", alias, suite)
            }
            SuiteError::EmptyAlias { alias } => {
                write!(f, "alias '{}' must list at least one suite", alias)
            }
            SuiteError::IoError { path, source } => {
                write!(f, "Failed to read suite file '{}': {}", path, source)
            }
            SuiteError::ParseError { source } => {
                write!(f, "Failed to parse suite file YAML: {}", source)
            }
        }
    }
}

impl std::error::Error for SuiteError {}
