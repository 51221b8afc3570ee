//! Parser for `free -m` style memory summaries.
//!
//! An absent `Mem:` line or malformed numerics must surface as a failure so
//! the caller treats the tick as "no sample", never as 0% usage.

use super::{ParseError, ParseResult};

/// Does the text contain a `Mem:` total line?
pub fn recognizes(raw: &str) -> bool {
    raw.lines().any(|line| line.trim_start().starts_with("Mem:"))
}

/// Extract used/total*100, rounded to two decimals.
pub fn parse(raw: &str) -> ParseResult<f64> {
    let mem_line = raw
        .lines()
        .map(str::trim_start)
        .find(|line| line.starts_with("Mem:"))
        .ok_or_else(|| ParseError::UnexpectedFormat("no 'Mem:' line in memory summary".into()))?;

    let mut fields = mem_line.split_whitespace().skip(1);
    let total: u64 = parse_field(fields.next(), "total")?;
    let used: u64 = parse_field(fields.next(), "used")?;

    if total == 0 {
        return Err(ParseError::UnexpectedFormat(
            "total memory reported as zero".into(),
        ));
    }

    let percent = used as f64 / total as f64 * 100.0;
    Ok((percent * 100.0).round() / 100.0)
}

fn parse_field(field: Option<&str>, name: &str) -> ParseResult<u64> {
    let field = field.ok_or_else(|| ParseError::MissingField(name.to_string()))?;
    field
        .parse()
        .map_err(|_| ParseError::UnexpectedFormat(format!("non-numeric {name} field: {field:?}")))
}
