//! Parser for the boxed `mysql --table` process list output.
//!
//! Columns are located by header name, not position, so reordered or extra
//! columns do not break extraction. Rows are excluded when the session is
//! idle, carries no query text, or is the channel's own connection. A
//! missing required column fails the whole table; a malformed individual
//! row is skipped so the remaining rows still produce a snapshot.

use chrono::{DateTime, Utc};

use crate::{ParsedQuery, ProcessSnapshot, normalize_info};

use super::{ParseError, ParseResult};

const NULL_MARKER: &str = "NULL";

/// Is this the boxed table format (`+----+` border rows)?
pub fn recognizes(raw: &str) -> bool {
    raw.lines()
        .find(|line| !line.trim().is_empty())
        .is_some_and(|line| line.starts_with('+'))
}

struct Columns {
    id: usize,
    user: usize,
    host: usize,
    db: usize,
    command: usize,
    time: usize,
    state: usize,
    info: usize,
}

impl Columns {
    fn locate(headers: &[&str]) -> ParseResult<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or_else(|| ParseError::MissingField(name.to_string()))
        };
        Ok(Self {
            id: find("ID")?,
            user: find("USER")?,
            host: find("HOST")?,
            db: find("DB")?,
            command: find("COMMAND")?,
            time: find("TIME")?,
            state: find("STATE")?,
            info: find("INFO")?,
        })
    }
}

fn split_row(line: &str) -> Vec<&str> {
    // "| a | b |" -> ["a", "b"]; the outer split produces empty edge cells.
    let cells: Vec<&str> = line.split('|').map(str::trim).collect();
    if cells.len() < 3 {
        return Vec::new();
    }
    cells[1..cells.len() - 1].to_vec()
}

fn optional_cell(cell: &str) -> Option<String> {
    if cell.is_empty() || cell == NULL_MARKER {
        None
    } else {
        Some(cell.to_string())
    }
}

/// Parse a boxed process table into a [`ProcessSnapshot`].
///
/// `own_session_id` additionally excludes the monitoring connection itself
/// when the caller knows its id; the generating query already excludes it
/// server-side, so `None` is the common case.
pub fn parse(
    raw: &str,
    timestamp: DateTime<Utc>,
    own_session_id: Option<u64>,
) -> ParseResult<ProcessSnapshot> {
    let mut data_rows = Vec::new();
    let mut headers = None;

    for line in raw.lines() {
        let line = line.trim_end();
        if !line.starts_with('|') {
            continue;
        }
        if headers.is_none() {
            headers = Some(split_row(line));
        } else {
            data_rows.push(split_row(line));
        }
    }

    let headers = headers
        .ok_or_else(|| ParseError::UnexpectedFormat("no header row in process table".into()))?;
    let columns = Columns::locate(&headers)?;

    let mut queries = Vec::new();
    for row in data_rows {
        // An anomalous row (query text containing a literal separator,
        // garbled numerics) only costs that row, never the snapshot.
        if row.len() != headers.len() {
            continue;
        }

        let command = row[columns.command];
        let info = row[columns.info];
        if command.eq_ignore_ascii_case("sleep") || command.eq_ignore_ascii_case("daemon") {
            continue;
        }
        if info.is_empty() || info == NULL_MARKER {
            continue;
        }

        let Ok(id) = row[columns.id].parse::<u64>() else {
            continue;
        };
        if own_session_id == Some(id) {
            continue;
        }

        let Ok(elapsed_seconds) = row[columns.time].parse::<u64>() else {
            continue;
        };

        queries.push(ParsedQuery {
            id,
            user: row[columns.user].to_string(),
            host: row[columns.host].to_string(),
            db: optional_cell(row[columns.db]),
            command: command.to_string(),
            elapsed_seconds,
            state: optional_cell(row[columns.state]),
            info: normalize_info(info),
        });
    }

    // Stable sort: ties keep original row order.
    queries.sort_by_key(|q| std::cmp::Reverse(q.elapsed_seconds));

    Ok(ProcessSnapshot { timestamp, queries })
}
