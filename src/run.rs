use std::{
  io::{self, Read},
  process::{Command, ExitStatus, Stdio},
  thread,
  time::{Duration, Instant},
};

use anyhow::{anyhow, Context, Result};
use tracing::{debug, error, info, warn};

use crate::{
  ext::{ChildExt, CommandExt, ExitStatusExt},
  results::{InterpretedSuite, RuntimeInfo, SingleBenchmarkResults},
  script::{Materializer, Profiles},
};

const NO_OUTPUT: &str = "No benchmark output received";

/// Runs one suite under one runtime.
///
/// Benchmark failures are reported in the returned results; an `Err` means
/// the run could not be carried out or its output broke the harness's
/// contract.
pub trait Execute {
  fn execute(&mut self, runtime: &RuntimeInfo, suite: &InterpretedSuite) -> Result<SingleBenchmarkResults>;
}

impl<E: Execute + ?Sized> Execute for &mut E {
  fn execute(&mut self, runtime: &RuntimeInfo, suite: &InterpretedSuite) -> Result<SingleBenchmarkResults> {
    (**self).execute(runtime, suite)
  }
}

/// How the child finished.
enum Exit {
  Status(ExitStatus),
  SpawnFailed(io::Error),
  TimedOut(Duration),
}

/// Runs materialized scripts as child processes, one at a time.
pub struct Executor {
  materializer: Materializer,
  profiles: Profiles,
  timeout: Option<Duration>,
}

impl Executor {
  pub fn new(materializer: Materializer) -> Self {
    Self {
      materializer,
      profiles: Profiles::default(),
      timeout: None,
    }
  }

  #[cfg(test)]
  pub fn with_profiles(mut self, profiles: Profiles) -> Self {
    self.profiles = profiles;
    self
  }

  /// Kills benchmarks that run longer than `timeout`. Without one, a hung
  /// benchmark blocks forever.
  pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }
}

impl Execute for Executor {
  fn execute(&mut self, runtime: &RuntimeInfo, suite: &InterpretedSuite) -> Result<SingleBenchmarkResults> {
    let profile = self.profiles.get(&runtime.name);
    let script = self
      .materializer
      .materialize(&suite.resolved, profile)
      .with_context(|| format!("materialize {:?} for {}", suite.name, runtime.name))?;

    debug!("materialized {:?} into {:?}", suite.name, script.dir);

    let mut args = script.prefix_args;
    args.push(script.path.to_string_lossy().into_owned());
    args.extend(suite.args.iter().cloned());

    info!("{} {}", runtime.name, args.join(" "));

    let mut command = Command::new(&runtime.resolved);
    command
      .args(&args)
      .suite_env(suite.sys_env, &suite.env)
      .own_process_group()
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped());

    let start = Instant::now();
    let (exit, stdout, stderr) = run_child(&mut command, profile.captures_stdout, self.timeout)?;
    let total = start.elapsed();

    let output = if stderr.is_empty() { stdout } else { stderr };

    let failure = match exit {
      Exit::SpawnFailed(e) => Some(format!("Failed to spawn benchmark: {e}")),
      Exit::TimedOut(timeout) => Some(format!("Benchmark timed out after {}ms", timeout.as_millis())),
      Exit::Status(status) => status.failure(),
    };

    if let Some(failure) = failure {
      warn!("{} on {}: {failure}", suite.name, runtime.name);
      if !output.is_empty() {
        warn!("{output}");
      }
      return Ok(SingleBenchmarkResults::failure(runtime, suite, total, failure));
    }

    if output.is_empty() {
      warn!("{} on {}: {NO_OUTPUT}", suite.name, runtime.name);
      return Ok(SingleBenchmarkResults::failure(runtime, suite, total, NO_OUTPUT));
    }

    match serde_json::from_str(&output) {
      Ok(bench) => Ok(SingleBenchmarkResults::success(runtime, suite, total, bench)),
      Err(e) => {
        error!("failed to parse benchmark JSON:\n{output}");
        Err(anyhow!(e).context(format!("parse benchmark output of {} on {}", suite.name, runtime.name)))
      }
    }
  }
}

/// Spawns `command` and collects stderr, plus stdout when `capture_stdout`
/// is set. Uncaptured stdout is forwarded to our own stdout as it arrives.
fn run_child(command: &mut Command, capture_stdout: bool, timeout: Option<Duration>) -> Result<(Exit, String, String)> {
  let mut child = match command.spawn() {
    Ok(child) => child,
    Err(e) => return Ok((Exit::SpawnFailed(e), String::new(), String::new())),
  };

  let mut stdout = child.stdout.take().context("stdout")?;
  let mut stderr = child.stderr.take().context("stderr")?;

  thread::scope(|scope| -> Result<(Exit, String, String)> {
    let stdout_reader = scope.spawn(move || -> io::Result<String> {
      if capture_stdout {
        read_lossy(&mut stdout)
      } else {
        io::copy(&mut stdout, &mut io::stdout())?;
        Ok(String::new())
      }
    });
    let stderr_reader = scope.spawn(move || read_lossy(&mut stderr));

    let exit = match child.wait_for(timeout)? {
      Some(status) => Exit::Status(status),
      None => Exit::TimedOut(timeout.unwrap_or_default()),
    };

    let stdout = stdout_reader
      .join()
      .map_err(|_| anyhow!("stdout reader panicked"))?
      .context("read stdout")?;
    let stderr = stderr_reader
      .join()
      .map_err(|_| anyhow!("stderr reader panicked"))?
      .context("read stderr")?;

    Ok((exit, stdout, stderr))
  })
}

fn read_lossy<R: Read>(reader: &mut R) -> io::Result<String> {
  let mut buf = Vec::new();
  reader.read_to_end(&mut buf)?;

  Ok(String::from_utf8_lossy(&buf).into_owned())
}
