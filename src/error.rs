use thiserror::Error;

/// Problems with a suite file that abort the run before any benchmark is
/// spawned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
  #[error("No runtimes configured for benchmark suite")]
  NoRuntimes,

  #[error("No suites configured for benchmark suite")]
  NoSuites,

  #[error("Invalid suite configuration: expected 1 or 2 elements, got {0}")]
  InvalidSuiteArity(usize),

  #[error("Invalid suite configuration at suite #{0}: expected [entry] or [entry, options]")]
  InvalidSuiteEntry(usize),

  #[error("Runtime '{0}' not found in configuration")]
  UnknownRuntime(String),
}
