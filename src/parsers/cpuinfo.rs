//! Parser for `/proc/cpuinfo`.
//!
//! Only the first processor block matters for the baseline snapshot; the
//! remaining per-core blocks repeat the same descriptor.

use super::{ParseError, ParseResult};

pub fn recognizes(raw: &str) -> bool {
    raw.lines()
        .find(|line| !line.trim().is_empty())
        .is_some_and(|line| line.contains(':'))
}

/// Key/value pairs of the first blank-line-separated block, in file order.
pub fn parse(raw: &str) -> ParseResult<Vec<(String, String)>> {
    let first_block = raw
        .trim_start()
        .split("\n\n")
        .find(|block| !block.trim().is_empty())
        .ok_or_else(|| ParseError::UnexpectedFormat("empty cpuinfo output".into()))?;

    let pairs: Vec<(String, String)> = first_block
        .lines()
        .filter_map(|line| {
            line.split_once(':')
                .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        })
        .collect();

    if pairs.is_empty() {
        return Err(ParseError::UnexpectedFormat(
            "no 'key: value' lines in first cpuinfo block".into(),
        ));
    }

    Ok(pairs)
}
