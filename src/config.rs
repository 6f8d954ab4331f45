//! Suite file loading.
//!
//! A suite file lists the runtimes to benchmark and the suites to run
//! against them. JSON and YAML are supported, selected by file extension.

use std::{
  collections::BTreeMap,
  path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Top-level contents of a suite file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeBenchmarkConfig {
  #[serde(default)]
  pub runtimes: Vec<RuntimeDescriptor>,
  #[serde(default)]
  pub suites: Vec<SuiteSpec>,
}

/// A runtime, given either by name or as a full [`RuntimeConfig`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuntimeDescriptor {
  Name(String),
  Config(RuntimeConfig),
}

impl RuntimeDescriptor {
  pub fn name(&self) -> &str {
    match self {
      Self::Name(name) => name,
      Self::Config(config) => &config.name,
    }
  }

  /// The binary override, if any.
  pub fn bin(&self) -> Option<&str> {
    match self {
      Self::Name(_) => None,
      Self::Config(config) => config.bin.as_deref(),
    }
  }

  pub fn version(&self) -> Option<&str> {
    match self {
      Self::Name(_) => None,
      Self::Config(config) => config.version.as_deref(),
    }
  }
}

impl From<&str> for RuntimeDescriptor {
  fn from(name: &str) -> Self {
    Self::Name(name.to_string())
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
  pub name: String,
  /// Binary to invoke instead of `name`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub bin: Option<String>,
  /// Expected version. Informational only.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
}

/// Per-suite overrides.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SuiteClass {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub runtimes: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub args: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub env: Option<BTreeMap<String, String>>,
}

/// One element of a raw suite entry: `[entry]` or `[entry, overrides]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SuitePart {
  Entry(String),
  Class(SuiteClass),
}

/// A raw suite entry as written in the suite file. Its arity is checked when
/// the suite is planned, not when it is parsed.
pub type SuiteSpec = Vec<SuitePart>;

/// Parses suite file contents into a [`RuntimeBenchmarkConfig`].
pub trait ConfigLoader {
  fn parse(&self, content: &str) -> Result<RuntimeBenchmarkConfig>;
}

pub struct JsonLoader;

impl ConfigLoader for JsonLoader {
  fn parse(&self, content: &str) -> Result<RuntimeBenchmarkConfig> {
    serde_json::from_str(content).context("parse JSON suite")
  }
}

pub struct YamlLoader;

impl ConfigLoader for YamlLoader {
  fn parse(&self, content: &str) -> Result<RuntimeBenchmarkConfig> {
    serde_yaml::from_str(content).context("parse YAML suite")
  }
}

/// Picks a loader for `path` by its extension.
pub fn loader_for(path: &Path) -> Result<Box<dyn ConfigLoader>> {
  match path.extension().and_then(|ext| ext.to_str()) {
    Some("json") => Ok(Box::new(JsonLoader)),
    Some("yaml" | "yml") => Ok(Box::new(YamlLoader)),
    _ => anyhow::bail!("unsupported suite format: {path:?} (expected .json, .yaml or .yml)"),
  }
}

/// Reads the suite file at `file`, resolved against the working directory.
pub fn load_suite<P: AsRef<Path>>(file: P) -> Result<RuntimeBenchmarkConfig> {
  let path: PathBuf = std::env::current_dir().context("current dir")?.join(file);
  let loader = loader_for(&path)?;

  debug!("reading suite from {path:?}");
  let content = std::fs::read_to_string(&path).with_context(|| format!("read {path:?}"))?;

  loader.parse(&content).with_context(|| format!("load {path:?}"))
}
