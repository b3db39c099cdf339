//! Output formatting utilities for MCP tools.
//!
//! Row sets render as compact JSON by default, or as an ASCII / markdown
//! table on request. Schema listings render one line per column. SQL
//! literal and identifier quoting for generated statements lives here too.

use crate::models::RowSet;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use unicode_width::UnicodeWidthStr;

/// Output format for query results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `{"columns":[...],"rows":[[...]]}` (default)
    #[default]
    Json,
    /// ASCII table format (like MySQL CLI)
    Table,
    /// Markdown table format
    Markdown,
}

/// Text returned for a read that produced no rows.
pub const EMPTY_RESULT: &str = "(empty)";

#[derive(Serialize)]
struct JsonRows<'a> {
    columns: Vec<&'a str>,
    rows: &'a [Vec<JsonValue>],
}

/// Render a row set in the requested format.
pub fn format_rows(rows: &RowSet, format: OutputFormat, execution_time_ms: u64) -> String {
    if rows.is_empty() {
        return EMPTY_RESULT.to_string();
    }
    match format {
        OutputFormat::Json => format_as_json(rows),
        OutputFormat::Table => format_as_table(rows, execution_time_ms),
        OutputFormat::Markdown => format_as_markdown(rows),
    }
}

pub fn format_as_json(rows: &RowSet) -> String {
    let payload = JsonRows {
        columns: rows.column_names(),
        rows: &rows.rows,
    };
    serde_json::to_string(&payload).unwrap_or_else(|_| EMPTY_RESULT.to_string())
}

pub fn format_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn format_as_table(rows: &RowSet, execution_time_ms: u64) -> String {
    let names = rows.column_names();
    let mut widths: Vec<usize> = names.iter().map(|n| n.width()).collect();
    for row in &rows.rows {
        for (width, value) in widths.iter_mut().zip(row) {
            *width = (*width).max(format_value(value).width());
        }
    }

    let separator: String = widths
        .iter()
        .map(|w| format!("+{}", "-".repeat(w + 2)))
        .collect::<String>()
        + "+\n";

    let mut output = separator.clone();
    output.push_str(
        &(names
            .iter()
            .zip(&widths)
            .map(|(name, w)| format!("| {} ", pad(name, *w, false)))
            .collect::<String>()
            + "|\n"),
    );
    output.push_str(&separator);

    for row in &rows.rows {
        let line: String = row
            .iter()
            .zip(&widths)
            .map(|(value, w)| {
                let right = matches!(value, JsonValue::Number(_));
                format!("| {} ", pad(&format_value(value), *w, right))
            })
            .collect::<String>()
            + "|\n";
        output.push_str(&line);
    }
    output.push_str(&separator);

    let count = rows.row_count();
    let row_text = if count == 1 { "row" } else { "rows" };
    output.push_str(&format!(
        "{} {} in set ({:.2} sec)\n",
        count,
        row_text,
        execution_time_ms as f64 / 1000.0
    ));
    output
}

pub fn format_as_markdown(rows: &RowSet) -> String {
    let names = rows.column_names();
    let mut output = names.iter().map(|n| format!("| {} ", n)).collect::<String>() + "|\n";
    output.push_str(&(names.iter().map(|_| "|---").collect::<String>() + "|\n"));

    for row in &rows.rows {
        let line: String = row
            .iter()
            .map(|value| format!("| {} ", format_value(value).replace('|', "\\|")))
            .collect::<String>()
            + "|\n";
        output.push_str(&line);
    }

    output.push_str(&format!("\n*{} rows*", rows.row_count()));
    output
}

/// Pad by display width, so CJK text lines up.
fn pad(text: &str, width: usize, right_align: bool) -> String {
    let fill = " ".repeat(width.saturating_sub(text.width()));
    if right_align {
        format!("{}{}", fill, text)
    } else {
        format!("{}{}", text, fill)
    }
}

// =============================================================================
// Schema Listings
// =============================================================================

/// One row of `SHOW FULL COLUMNS`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub column_type: String,
    pub nullable: bool,
    /// PRI, UNI, MUL or empty
    pub key: String,
    pub default_value: Option<String>,
    pub extra: String,
    pub comment: String,
}

impl ColumnInfo {
    /// Read every row of a `SHOW [FULL] COLUMNS` result.
    pub fn from_show_columns(rows: &RowSet) -> Vec<Self> {
        let text = |row: usize, col: &str| rows.str_value(row, col).unwrap_or_default().to_string();
        (0..rows.row_count())
            .map(|row| Self {
                name: text(row, "Field"),
                column_type: text(row, "Type"),
                nullable: rows.str_value(row, "Null") != Some("NO"),
                key: text(row, "Key"),
                default_value: rows
                    .value(row, "Default")
                    .filter(|v| !v.is_null())
                    .map(format_value),
                extra: text(row, "Extra"),
                comment: text(row, "Comment"),
            })
            .collect()
    }
}

/// `name type[ NOT NULL][ PK| UNIQUE| INDEX][ DEFAULT d][ extra][ -- comment]`
pub fn format_column(col: &ColumnInfo) -> String {
    let mut line = format!("{} {}", col.name, col.column_type);
    if !col.nullable {
        line.push_str(" NOT NULL");
    }
    match col.key.as_str() {
        "PRI" => line.push_str(" PK"),
        "UNI" => line.push_str(" UNIQUE"),
        "MUL" => line.push_str(" INDEX"),
        _ => {}
    }
    if let Some(default) = &col.default_value {
        line.push_str(&format!(" DEFAULT {}", default));
    }
    if !col.extra.is_empty() {
        line.push_str(&format!(" {}", col.extra));
    }
    if !col.comment.is_empty() {
        line.push_str(&format!(" -- {}", col.comment));
    }
    line
}

/// `table:` followed by one formatted line per column.
pub fn format_table_description(table: &str, columns: &[ColumnInfo]) -> String {
    let lines: Vec<String> = columns.iter().map(format_column).collect();
    format!("{}:\n{}", table, lines.join("\n"))
}

// =============================================================================
// SQL Quoting
// =============================================================================

/// Escape text for use inside a single-quoted SQL literal.
pub fn escape_string_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "''")
}

/// Single-quoted SQL string literal.
pub fn quote_string_value(value: &str) -> String {
    format!("'{}'", escape_string_value(value))
}

/// Backtick-quoted identifier with embedded backticks doubled.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// `` `db`.`table` `` or `` `table` ``.
pub fn qualified_table(database: Option<&str>, table: &str) -> String {
    match database {
        Some(db) => format!("{}.{}", quote_identifier(db), quote_identifier(table)),
        None => quote_identifier(table),
    }
}
