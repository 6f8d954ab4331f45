use std::{
  collections::BTreeMap,
  process::{Child, Command, ExitStatus},
  time::Duration,
};

use anyhow::{Context, Result};
use wait_timeout::ChildExt as WaitExt;

#[extend::ext]
pub impl ExitStatus {
  /// Describes a failed benchmark exit, or `None` if it exited cleanly.
  fn failure(&self) -> Option<String> {
    if self.success() {
      return None;
    }

    Some(match self.code() {
      Some(code) => format!("Benchmark failed with exit code {code}"),
      None => format!("Benchmark terminated by signal ({self})"),
    })
  }
}

#[extend::ext]
pub impl Child {
  /// Waits for exit. With a timeout, the child and its process group are
  /// killed and reaped once it elapses and `Ok(None)` is returned.
  fn wait_for(&mut self, timeout: Option<Duration>) -> Result<Option<ExitStatus>> {
    let Some(timeout) = timeout else {
      return self.wait().context("wait").map(Some);
    };

    if let Some(status) = self.wait_timeout(timeout).context("wait")? {
      return Ok(Some(status));
    }

    self.kill_group().context("kill after timeout")?;
    self.wait().context("reap")?;

    Ok(None)
  }

  /// Kills the process group the child leads, or just the child when it
  /// does not lead one.
  fn kill_group(&mut self) -> Result<()> {
    #[cfg(unix)]
    {
      use nix::{
        sys::signal::{killpg, Signal},
        unistd::Pid,
      };

      if killpg(Pid::from_raw(self.id() as i32), Signal::SIGKILL).is_ok() {
        return Ok(());
      }
    }

    self.kill().context("kill")
  }
}

#[extend::ext]
pub impl Command {
  /// Sets the child environment: the host's when `inherit` is set, with `env`
  /// layered on top.
  fn suite_env(&mut self, inherit: bool, env: &BTreeMap<String, String>) -> &mut Command {
    if !inherit {
      self.env_clear();
    }

    self.envs(env)
  }

  /// Starts the child as the leader of a new process group, so that anything
  /// it spawns can be killed along with it.
  fn own_process_group(&mut self) -> &mut Command {
    #[cfg(unix)]
    std::os::unix::process::CommandExt::process_group(self, 0);

    self
  }
}
