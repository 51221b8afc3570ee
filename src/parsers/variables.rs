//! Parser for tab-separated `SHOW GLOBAL VARIABLES` output.

use super::{ParseError, ParseResult};

pub fn recognizes(raw: &str) -> bool {
    raw.lines().any(|line| line.contains('\t'))
}

/// Name/value pairs in server order, header row skipped.
pub fn parse(raw: &str) -> ParseResult<Vec<(String, String)>> {
    let pairs: Vec<(String, String)> = raw
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .filter(|(name, _)| !name.eq_ignore_ascii_case("Variable_name"))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect();

    if pairs.is_empty() {
        return Err(ParseError::UnexpectedFormat(
            "no tab-separated variable rows".into(),
        ));
    }

    Ok(pairs)
}
