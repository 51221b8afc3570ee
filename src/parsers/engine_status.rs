//! Parser for `SHOW ENGINE INNODB STATUS` output.
//!
//! The same report arrives in two serializations depending on how the
//! client was invoked: a tab-delimited triple whose third field is the
//! narrative body (with literal `\n` escapes), or a vertical `\G` dump
//! introduced by a row of asterisks. Both yield the trimmed narrative.

use super::{ParseError, ParseResult};

/// Vertical `\G` dump: contains a separator row made of asterisks.
pub fn recognizes_vertical(raw: &str) -> bool {
    raw.lines().any(is_asterisk_row)
}

/// Tab-delimited form: some line splits into three fields.
pub fn recognizes_tabular(raw: &str) -> bool {
    raw.lines().any(|line| line.splitn(3, '\t').count() == 3)
}

fn is_asterisk_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= 3 && trimmed.chars().all(|c| c == '*')
}

/// Extract the narrative body from either serialization.
pub fn parse(raw: &str) -> ParseResult<String> {
    if recognizes_vertical(raw) {
        parse_vertical(raw)
    } else {
        parse_tabular(raw)
    }
}

fn parse_vertical(raw: &str) -> ParseResult<String> {
    let mut lines = raw.lines();
    for line in lines.by_ref() {
        if line.trim() == "Status:" {
            let body = lines.collect::<Vec<_>>().join("\n");
            let body = body.trim();
            if body.is_empty() {
                return Err(ParseError::MissingField("Status body".into()));
            }
            return Ok(body.to_string());
        }
    }
    Err(ParseError::MissingField("Status:".into()))
}

fn parse_tabular(raw: &str) -> ParseResult<String> {
    for line in raw.lines() {
        let fields: Vec<&str> = line.splitn(3, '\t').collect();
        if fields.len() != 3 {
            continue;
        }
        // Skip the client's header row.
        if fields[0].eq_ignore_ascii_case("Type") {
            continue;
        }
        let body = fields[2].replace("\\n", "\n");
        let body = body.trim();
        if body.is_empty() {
            return Err(ParseError::MissingField("status field".into()));
        }
        return Ok(body.to_string());
    }
    Err(ParseError::UnexpectedFormat(
        "neither vertical nor tab-delimited engine status".into(),
    ))
}
