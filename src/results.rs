use std::{
  collections::BTreeMap,
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::{Context, Result};
use serde::Serialize;

/// A runtime with its executable located.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RuntimeInfo {
  pub name: String,
  pub bin: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
  /// Absolute path of the executable, or `bin` verbatim when it could not be
  /// found on `PATH`.
  pub resolved: PathBuf,
}

/// A suite entry with its overrides applied, ready to run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpretedSuite {
  pub name: String,
  pub entry: String,
  pub resolved: PathBuf,
  pub runtimes: Vec<String>,
  pub args: Vec<String>,
  pub env: BTreeMap<String, String>,
  /// Whether the host environment is inherited underneath `env`.
  pub sys_env: bool,
}

/// The outcome of running one suite under one runtime.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleBenchmarkResults {
  pub runtime: RuntimeInfo,
  pub suite: InterpretedSuite,
  pub total_ms: u64,
  /// The harness report, kept as-is.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub bench: Option<serde_json::Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl SingleBenchmarkResults {
  pub fn success(runtime: &RuntimeInfo, suite: &InterpretedSuite, total: Duration, bench: serde_json::Value) -> Self {
    Self {
      runtime: runtime.clone(),
      suite: suite.clone(),
      total_ms: millis(total),
      bench: Some(bench),
      error: None,
    }
  }

  pub fn failure(runtime: &RuntimeInfo, suite: &InterpretedSuite, total: Duration, error: impl Into<String>) -> Self {
    Self {
      runtime: runtime.clone(),
      suite: suite.clone(),
      total_ms: millis(total),
      bench: None,
      error: Some(error.into()),
    }
  }
}

fn millis(duration: Duration) -> u64 {
  u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// All results of a run, in suite-then-runtime order.
#[derive(Clone, Debug, Default, Serialize)]
pub struct MergedBenchmarkResults {
  pub all: Vec<SingleBenchmarkResults>,
}

impl MergedBenchmarkResults {
  pub fn merge(results: Vec<SingleBenchmarkResults>) -> Self {
    Self { all: results }
  }

  /// Writes the results as pretty-printed JSON.
  pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(self).context("serialize results")?;

    std::fs::write(path, json).with_context(|| format!("write {path:?}"))
  }
}
