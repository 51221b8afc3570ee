//! Parser for `SHOW STATUS LIKE 'Qcache%'` output.
//!
//! Only the hit and insert counters matter; their ratio is the cache
//! health signal the daily summary reports on.

use super::{ParseError, ParseResult};

pub fn recognizes(raw: &str) -> bool {
    raw.lines()
        .any(|line| line.trim_start().starts_with("Qcache"))
}

/// Extract `(Qcache_hits, Qcache_inserts)` from the tab-separated status
/// rows. Either counter missing is a failure, never a zero.
pub fn parse(raw: &str) -> ParseResult<(u64, u64)> {
    let mut hits = None;
    let mut inserts = None;

    for line in raw.lines() {
        let Some((name, value)) = line.split_once('\t') else {
            continue;
        };
        match name.trim() {
            "Qcache_hits" => hits = parse_counter(value)?,
            "Qcache_inserts" => inserts = parse_counter(value)?,
            _ => {}
        }
    }

    match (hits, inserts) {
        (Some(hits), Some(inserts)) => Ok((hits, inserts)),
        (None, _) => Err(ParseError::MissingField("Qcache_hits".into())),
        (_, None) => Err(ParseError::MissingField("Qcache_inserts".into())),
    }
}

fn parse_counter(value: &str) -> ParseResult<Option<u64>> {
    let value = value.trim();
    value
        .parse()
        .map(Some)
        .map_err(|_| ParseError::UnexpectedFormat(format!("non-numeric counter: {value:?}")))
}
