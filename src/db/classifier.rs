//! Statement classification by leading keyword.
//!
//! This is advisory text matching, not a parser. Read-only enforcement is
//! done by the database through the read-only transaction the runner opens;
//! classification only decides which entry point a statement belongs to and
//! whether a row cap should be appended.

use crate::error::{DbError, DbResult};
use crate::models::{ExecutionRequest, StatementIntent};

/// Leading keywords accepted by the read entry point.
const READ_PREFIXES: &[&str] = &["SELECT", "SHOW", "DESCRIBE", "EXPLAIN", "WITH"];

/// Leading keywords that get a row cap when no LIMIT is present.
const LIMIT_PREFIXES: &[&str] = &["SELECT", "WITH"];

const READ_ONLY_ENTRY_REJECTION: &str = "Only SELECT, SHOW, DESCRIBE, EXPLAIN queries are allowed. Use the \"execute\" tool for data modification.";

const WRITE_ENTRY_REJECTION: &str = "Use the \"query\" tool for SELECT statements.";

const MULTIPLE_STATEMENTS_REJECTION: &str =
    "Multiple statements are not allowed. Send one statement per call.";

/// Result of classifying a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub intent: StatementIntent,
    /// True for SELECT/WITH statements that carry no LIMIT token.
    pub needs_limit: bool,
}

/// Classify SQL text by its leading keyword.
///
/// # Examples
///
/// ```
/// use mysql_mcp_server::db::classifier::classify;
/// use mysql_mcp_server::models::StatementIntent;
///
/// let c = classify("  select * from users");
/// assert_eq!(c.intent, StatementIntent::Read);
/// assert!(c.needs_limit);
///
/// assert_eq!(classify("DROP TABLE users").intent, StatementIntent::Write);
/// ```
pub fn classify(sql: &str) -> Classification {
    let normalized = sql.trim().to_uppercase();

    let intent = if READ_PREFIXES.iter().any(|p| normalized.starts_with(p)) {
        StatementIntent::Read
    } else {
        StatementIntent::Write
    };

    let needs_limit = intent == StatementIntent::Read
        && LIMIT_PREFIXES.iter().any(|p| normalized.starts_with(p))
        && !contains_keyword(&normalized, "LIMIT");

    Classification {
        intent,
        needs_limit,
    }
}

/// Build the request for the read entry point.
///
/// Rejects anything that is not a read. Unbounded SELECT/WITH statements get
/// `LIMIT <max_rows>` appended to the trimmed text; everything else is sent
/// exactly as given.
pub fn prepare_read(sql: &str, max_rows: u32) -> DbResult<ExecutionRequest> {
    let classification = classify(sql);
    if classification.intent != StatementIntent::Read {
        return Err(DbError::policy(READ_ONLY_ENTRY_REJECTION));
    }
    reject_stacked(sql)?;

    let text = if classification.needs_limit {
        let body = sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace());
        format!("{} LIMIT {}", body, max_rows)
    } else {
        sql.to_string()
    };
    Ok(ExecutionRequest::new(text, StatementIntent::Read))
}

/// Build the request for the write entry point. Reads are rejected.
pub fn prepare_write(sql: &str) -> DbResult<ExecutionRequest> {
    let classification = classify(sql);
    if classification.intent == StatementIntent::Read {
        return Err(DbError::policy(WRITE_ENTRY_REJECTION));
    }
    reject_stacked(sql)?;
    Ok(ExecutionRequest::new(sql, classification.intent))
}

fn reject_stacked(sql: &str) -> DbResult<()> {
    if has_multiple_statements(sql) {
        return Err(DbError::policy(MULTIPLE_STATEMENTS_REJECTION));
    }
    Ok(())
}

/// True when a `;` outside quotes and comments is followed by more SQL.
///
/// A single trailing terminator is fine. The server enforces the same rule
/// on every caller statement; this only produces a clearer error earlier.
pub fn has_multiple_statements(sql: &str) -> bool {
    let bytes = sql.as_bytes();
    let mut i = 0;
    let mut terminated = false;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'\'' | b'"' | b'`' => {
                if terminated {
                    return true;
                }
                i = skip_quoted(bytes, i);
                continue;
            }
            b'#' => {
                i = skip_line(bytes, i);
                continue;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-')
                && bytes.get(i + 2).is_none_or(|c| c.is_ascii_whitespace()) =>
            {
                i = skip_line(bytes, i);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                // `/*! ... */` is executed by MySQL, so it counts as SQL.
                if terminated && bytes.get(i + 2) == Some(&b'!') {
                    return true;
                }
                i = skip_block_comment(bytes, i);
                continue;
            }
            b';' => terminated = true,
            _ if b.is_ascii_whitespace() => {}
            _ if terminated => return true,
            _ => {}
        }
        i += 1;
    }
    false
}

/// Index just past the literal or quoted identifier starting at `start`.
fn skip_quoted(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if quote != b'`' => i += 2,
            c if c == quote => {
                // A doubled quote is an escaped quote.
                if bytes.get(i + 1) == Some(&quote) {
                    i += 2;
                } else {
                    return i + 1;
                }
            }
            _ => i += 1,
        }
    }
    bytes.len()
}

fn skip_line(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |pos| start + pos + 1)
}

fn skip_block_comment(bytes: &[u8], start: usize) -> usize {
    bytes[start + 2..]
        .windows(2)
        .position(|w| w == b"*/")
        .map_or(bytes.len(), |pos| start + 2 + pos + 2)
}

/// Whole-word match of an upper-case keyword in upper-cased text.
fn contains_keyword(haystack: &str, keyword: &str) -> bool {
    let bytes = haystack.as_bytes();
    let is_word = |b: u8| b.is_ascii_alphanumeric() || b == b'_';

    haystack.match_indices(keyword).any(|(start, _)| {
        let end = start + keyword.len();
        let before_ok = start == 0 || !is_word(bytes[start - 1]);
        let after_ok = end >= bytes.len() || !is_word(bytes[end]);
        before_ok && after_ok
    })
}
