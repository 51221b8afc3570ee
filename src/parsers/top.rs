//! Parser for `top -b -n 1 -p <pid>` output.
//!
//! The %CPU column is located by header name so column drift between top
//! versions does not silently shift which number we read. Locales that
//! print a comma decimal separator are tolerated.

use super::{ParseError, ParseResult};

pub fn recognizes(raw: &str) -> bool {
    raw.lines()
        .any(|line| line.contains("%CPU") && line.contains("PID"))
}

/// CPU usage percentage of `pid`, or a failure if the process row or the
/// %CPU column is absent.
pub fn parse(raw: &str, pid: u32) -> ParseResult<f64> {
    let mut lines = raw.lines();

    let header = lines
        .by_ref()
        .find(|line| line.contains("%CPU") && line.contains("PID"))
        .ok_or_else(|| ParseError::UnexpectedFormat("no process table header in top output".into()))?;

    let headers: Vec<&str> = header.split_whitespace().collect();
    let pid_col = headers
        .iter()
        .position(|h| *h == "PID")
        .ok_or_else(|| ParseError::MissingField("PID".into()))?;
    let cpu_col = headers
        .iter()
        .position(|h| *h == "%CPU")
        .ok_or_else(|| ParseError::MissingField("%CPU".into()))?;

    let pid_text = pid.to_string();
    let row: Vec<&str> = lines
        .map(|line| line.split_whitespace().collect::<Vec<_>>())
        .find(|fields| fields.get(pid_col) == Some(&pid_text.as_str()))
        .ok_or_else(|| {
            ParseError::UnexpectedFormat(format!("no row for pid {pid} in top output"))
        })?;

    let cell = row
        .get(cpu_col)
        .ok_or_else(|| ParseError::MissingField("%CPU".into()))?;

    cell.replace(',', ".")
        .parse()
        .map_err(|_| ParseError::UnexpectedFormat(format!("non-numeric %CPU cell: {cell:?}")))
}
