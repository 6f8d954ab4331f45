use std::fmt::Write;

use anyhow::Result;

use crate::results::{MergedBenchmarkResults, SingleBenchmarkResults};

const COLUMN_WIDTH: usize = 14;
const COLUMN_PADDING: &str = "  ";

fn format_row<'a, I: IntoIterator<Item = &'a str>>(columns: I) -> String {
  columns
    .into_iter()
    .map(|col| format!("{col:<COLUMN_WIDTH$}"))
    .collect::<Vec<_>>()
    .join(COLUMN_PADDING)
}

fn format_header() -> String {
  let header = format_row(["suite", "runtime", "result", "total"]);

  format!("{header}\n{}", "=".repeat(header.len()))
}

fn outcome(result: &SingleBenchmarkResults) -> &str {
  match (&result.bench, &result.error) {
    (_, Some(error)) => error.as_str(),
    (Some(_), None) => "ok",
    (None, None) => "unknown",
  }
}

/// Formats one line per run, in run order.
pub fn format(results: &MergedBenchmarkResults) -> Result<String> {
  let mut table = String::new();

  writeln!(table, "{}", format_header())?;

  for result in &results.all {
    let total = format!("{}ms", result.total_ms);
    let row = format_row([
      result.suite.name.as_str(),
      result.runtime.name.as_str(),
      outcome(result),
      total.as_str(),
    ]);

    writeln!(table, "{}", row.trim_end())?;
  }

  Ok(table)
}
