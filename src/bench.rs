use std::{
  collections::HashMap,
  path::{Component, Path, PathBuf},
};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::{
  config::{RuntimeBenchmarkConfig, SuiteClass, SuitePart, SuiteSpec},
  error::ConfigError,
  resolve::{Lookup, PathLookup, Resolver},
  results::{InterpretedSuite, MergedBenchmarkResults, RuntimeInfo},
  run::Execute,
};

/// Inflates a suite entry relative to `cwd`.
pub fn inflate(cwd: &Path, entry: &str, overrides: &SuiteClass) -> InterpretedSuite {
  let resolved = normalize(&cwd.join(entry));
  let name = resolved
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_default();

  InterpretedSuite {
    name,
    entry: entry.to_string(),
    resolved,
    runtimes: overrides.runtimes.clone().unwrap_or_default(),
    args: overrides.args.clone().unwrap_or_default(),
    env: overrides.env.clone().unwrap_or_default(),
    // TODO: expose host environment inheritance as a suite option.
    sys_env: true,
  }
}

/// Lexically removes `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
  let mut normalized = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        normalized.pop();
      }
      other => normalized.push(other),
    }
  }

  normalized
}

/// Splits a raw suite entry into its entry path and overrides.
fn parse_suite(index: usize, spec: &SuiteSpec) -> Result<(&str, SuiteClass), ConfigError> {
  match spec.as_slice() {
    [SuitePart::Entry(entry)] => Ok((entry.as_str(), SuiteClass::default())),
    [SuitePart::Entry(entry), SuitePart::Class(class)] => Ok((entry.as_str(), class.clone())),
    [_] | [_, _] => Err(ConfigError::InvalidSuiteEntry(index)),
    other => Err(ConfigError::InvalidSuiteArity(other.len())),
  }
}

/// A suite with the runtimes it runs under.
#[derive(Debug)]
pub struct PlannedSuite {
  pub suite: InterpretedSuite,
  pub targets: Vec<RuntimeInfo>,
}

/// Runs every configured suite under its runtimes, serially.
pub struct Bench<E, L = PathLookup> {
  resolver: Resolver<L>,
  executor: E,
  cwd: PathBuf,
}

impl<E: Execute> Bench<E> {
  pub fn new(executor: E) -> Result<Self> {
    let cwd = std::env::current_dir().context("current dir")?;

    Ok(Self::with_resolver(executor, Resolver::new(), cwd))
  }
}

impl<E: Execute, L: Lookup> Bench<E, L> {
  pub fn with_resolver(executor: E, resolver: Resolver<L>, cwd: PathBuf) -> Self {
    Self { resolver, executor, cwd }
  }

  /// Resolves runtimes and inflates every suite. Any configuration error is
  /// raised here, before a single benchmark runs.
  pub fn plan(&mut self, config: &RuntimeBenchmarkConfig) -> Result<Vec<PlannedSuite>, ConfigError> {
    if config.runtimes.is_empty() {
      return Err(ConfigError::NoRuntimes);
    }
    if config.suites.is_empty() {
      return Err(ConfigError::NoSuites);
    }

    let mut runtimes = HashMap::new();
    for runtime in &config.runtimes {
      let info = self.resolver.resolve(runtime);
      runtimes.insert(info.name.clone(), info);
    }
    debug!("resolved {} runtimes", runtimes.len());

    let all_names: Vec<String> = config.runtimes.iter().map(|r| r.name().to_string()).collect();

    config
      .suites
      .iter()
      .enumerate()
      .map(|(index, spec)| -> Result<PlannedSuite, ConfigError> {
        let (entry, overrides) = parse_suite(index, spec)?;
        let suite = inflate(&self.cwd, entry, &overrides);

        let names = if suite.runtimes.is_empty() { &all_names } else { &suite.runtimes };
        let targets = names
          .iter()
          .map(|name| {
            runtimes
              .get(name)
              .cloned()
              .ok_or_else(|| ConfigError::UnknownRuntime(name.clone()))
          })
          .collect::<Result<_, _>>()?;

        Ok(PlannedSuite { suite, targets })
      })
      .collect()
  }

  /// Runs the whole configuration and merges the results in suite-then-runtime
  /// order.
  pub fn execute(&mut self, config: &RuntimeBenchmarkConfig) -> Result<MergedBenchmarkResults> {
    let plan = self.plan(config)?;

    let mut results = Vec::new();
    for PlannedSuite { suite, targets } in &plan {
      info!("benchmarking {:?}", suite.name);
      for runtime in targets {
        let result = self
          .executor
          .execute(runtime, suite)
          .with_context(|| format!("run {} on {}", suite.name, runtime.name))?;

        results.push(result);
      }
    }

    Ok(MergedBenchmarkResults::merge(results))
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, collections::BTreeMap, time::Duration};

  use super::*;
  use crate::{
    config::{ConfigLoader, JsonLoader},
    results::SingleBenchmarkResults,
  };

  #[derive(Default)]
  struct RecordingExecutor {
    runs: Vec<(String, String)>,
  }

  impl Execute for RecordingExecutor {
    fn execute(&mut self, runtime: &RuntimeInfo, suite: &InterpretedSuite) -> Result<SingleBenchmarkResults> {
      self.runs.push((suite.name.clone(), runtime.name.clone()));

      if runtime.resolved.is_absolute() {
        Ok(SingleBenchmarkResults::success(
          runtime,
          suite,
          Duration::from_millis(1),
          serde_json::json!({"benchmarks": []}),
        ))
      } else {
        Ok(SingleBenchmarkResults::failure(runtime, suite, Duration::ZERO, "Failed to spawn benchmark"))
      }
    }
  }

  #[derive(Default)]
  struct CountingLookup {
    calls: RefCell<Vec<String>>,
  }

  impl Lookup for CountingLookup {
    fn lookup(&self, bin: &str) -> Option<PathBuf> {
      self.calls.borrow_mut().push(bin.to_string());
      (bin != "missing").then(|| PathBuf::from("/usr/bin").join(bin))
    }
  }

  fn config(json: &str) -> RuntimeBenchmarkConfig {
    JsonLoader.parse(json).unwrap()
  }

  fn bench<'a>(
    executor: &'a mut RecordingExecutor,
    lookup: &'a CountingLookup,
  ) -> Bench<&'a mut RecordingExecutor, &'a CountingLookup> {
    Bench::with_resolver(executor, Resolver::with_lookup(lookup), PathBuf::from("/work"))
  }

  fn config_error(err: anyhow::Error) -> ConfigError {
    err.downcast::<ConfigError>().unwrap()
  }

  #[test]
  fn smoke_suite_runs_once() {
    let mut executor = RecordingExecutor::default();
    let lookup = CountingLookup::default();

    let results = bench(&mut executor, &lookup)
      .execute(&config(r#"{"runtimes": ["node"], "suites": [["tests/smoke/json.mjs"]]}"#))
      .unwrap();

    assert_eq!(results.all.len(), 1);
    let result = &results.all[0];
    assert_eq!(result.runtime.name, "node");
    assert_eq!(result.suite.name, "json.mjs");
    assert_eq!(result.suite.resolved, PathBuf::from("/work/tests/smoke/json.mjs"));
    assert!(result.bench.is_some());
    assert!(result.error.is_none());
  }

  #[test]
  fn empty_runtimes_spawn_nothing() {
    let mut executor = RecordingExecutor::default();
    let lookup = CountingLookup::default();

    let err = bench(&mut executor, &lookup)
      .execute(&config(r#"{"runtimes": [], "suites": [["a.mjs"]]}"#))
      .unwrap_err();

    assert_eq!(config_error(err), ConfigError::NoRuntimes);
    assert!(executor.runs.is_empty());
    assert!(lookup.calls.borrow().is_empty());
  }

  #[test]
  fn empty_suites_spawn_nothing() {
    let mut executor = RecordingExecutor::default();
    let lookup = CountingLookup::default();

    let err = bench(&mut executor, &lookup)
      .execute(&config(r#"{"runtimes": ["node"]}"#))
      .unwrap_err();

    assert_eq!(config_error(err), ConfigError::NoSuites);
    assert!(executor.runs.is_empty());
  }

  #[test]
  fn bad_arity_spawns_nothing() {
    for (suites, len) in [(r#"[["a.mjs"], []]"#, 0), (r#"[["a.mjs"], ["b.mjs", {}, "c.mjs"]]"#, 3)] {
      let mut executor = RecordingExecutor::default();
      let lookup = CountingLookup::default();

      let err = bench(&mut executor, &lookup)
        .execute(&config(&format!(r#"{{"runtimes": ["node"], "suites": {suites}}}"#)))
        .unwrap_err();

      assert_eq!(config_error(err), ConfigError::InvalidSuiteArity(len));
      assert!(executor.runs.is_empty());
    }
  }

  #[test]
  fn misplaced_parts_are_rejected() {
    let mut executor = RecordingExecutor::default();
    let lookup = CountingLookup::default();

    let err = bench(&mut executor, &lookup)
      .execute(&config(r#"{"runtimes": ["node"], "suites": [["a.mjs"], [{}, "b.mjs"]]}"#))
      .unwrap_err();

    assert_eq!(config_error(err), ConfigError::InvalidSuiteEntry(1));
    assert!(executor.runs.is_empty());
  }

  #[test]
  fn unknown_target_spawns_nothing() {
    let mut executor = RecordingExecutor::default();
    let lookup = CountingLookup::default();

    let err = bench(&mut executor, &lookup)
      .execute(&config(
        r#"{"runtimes": ["node"], "suites": [["a.mjs"], ["b.mjs", {"runtimes": ["bun"]}]]}"#,
      ))
      .unwrap_err();

    assert_eq!(config_error(err), ConfigError::UnknownRuntime("bun".into()));
    assert!(executor.runs.is_empty());
  }

  #[test]
  fn runs_suites_then_runtimes_in_order() {
    let mut executor = RecordingExecutor::default();
    let lookup = CountingLookup::default();

    let results = bench(&mut executor, &lookup)
      .execute(&config(
        r#"{
          "runtimes": ["node", "deno", "bun"],
          "suites": [
            ["json.mjs"],
            ["fs.mjs", {"runtimes": ["bun", "node"]}],
            ["empty.mjs", {"runtimes": []}]
          ]
        }"#,
      ))
      .unwrap();

    let expected = [
      ("json.mjs", "node"),
      ("json.mjs", "deno"),
      ("json.mjs", "bun"),
      ("fs.mjs", "bun"),
      ("fs.mjs", "node"),
      ("empty.mjs", "node"),
      ("empty.mjs", "deno"),
      ("empty.mjs", "bun"),
    ];
    let order: Vec<_> = results
      .all
      .iter()
      .map(|r| (r.suite.name.as_str(), r.runtime.name.as_str()))
      .collect();
    assert_eq!(order, expected);
    assert_eq!(executor.runs.len(), expected.len());
  }

  #[test]
  fn each_runtime_is_looked_up_once() {
    let mut executor = RecordingExecutor::default();
    let lookup = CountingLookup::default();
    let mut bench = bench(&mut executor, &lookup);
    let config = config(r#"{"runtimes": ["node", "deno", "node"], "suites": [["a.mjs"], ["b.mjs"]]}"#);

    bench.execute(&config).unwrap();
    bench.execute(&config).unwrap();

    assert_eq!(*lookup.calls.borrow(), vec!["node".to_string(), "deno".to_string()]);
  }

  #[test]
  fn unresolved_runtime_does_not_stop_the_run() {
    let mut executor = RecordingExecutor::default();
    let lookup = CountingLookup::default();

    let results = bench(&mut executor, &lookup)
      .execute(&config(r#"{"runtimes": ["missing", "node"], "suites": [["a.mjs"], ["b.mjs"]]}"#))
      .unwrap();

    assert_eq!(results.all.len(), 4);
    assert!(results.all[0].error.is_some());
    assert!(results.all[1].bench.is_some());
    assert!(results.all[2].error.is_some());
  }

  #[test]
  fn plan_resolves_overrides() {
    let mut executor = RecordingExecutor::default();
    let lookup = CountingLookup::default();

    let plan = bench(&mut executor, &lookup)
      .plan(&config(
        r#"{"runtimes": ["node", "deno"], "suites": [["a.mjs", {"runtimes": ["deno"], "args": ["-x"], "env": {"K": "v"}}]]}"#,
      ))
      .unwrap();

    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].suite.args, vec!["-x"]);
    assert_eq!(plan[0].suite.env, BTreeMap::from([("K".to_string(), "v".to_string())]));
    let targets: Vec<_> = plan[0].targets.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(targets, ["deno"]);
  }

  #[test]
  fn inflates_relative_to_cwd() {
    let suite = inflate(Path::new("/work"), "./bench/../tests/smoke/fs.mjs", &SuiteClass::default());

    assert_eq!(suite.name, "fs.mjs");
    assert_eq!(suite.entry, "./bench/../tests/smoke/fs.mjs");
    assert_eq!(suite.resolved, PathBuf::from("/work/tests/smoke/fs.mjs"));
    assert!(suite.runtimes.is_empty());
    assert!(suite.args.is_empty());
    assert!(suite.env.is_empty());
    assert!(suite.sys_env);
  }

  #[test]
  fn inflates_absolute_entries_as_is() {
    let suite = inflate(Path::new("/work"), "/srv/bench/json.mjs", &SuiteClass::default());

    assert_eq!(suite.resolved, PathBuf::from("/srv/bench/json.mjs"));
  }

  #[test]
  fn inflation_is_idempotent() {
    let overrides = SuiteClass {
      runtimes: Some(vec!["node".into()]),
      args: Some(vec!["--expose-gc".into()]),
      env: Some(BTreeMap::from([("A".to_string(), "1".to_string())])),
    };

    let first = inflate(Path::new("/work"), "json.mjs", &overrides);
    let second = inflate(Path::new("/work"), "json.mjs", &overrides);

    assert_eq!(first, second);
    assert_eq!(first.runtimes, vec!["node"]);
  }
}
