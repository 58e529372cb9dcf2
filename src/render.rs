//! Plain-text rendering of blocks and replay results for the terminal.

use std::fmt::Write as _;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::block::{Block, BlockResult};
use crate::replay::{Outcome, RenderedBlock, ReplayReport};
use crate::snapshot::SnapshotDocument;

/// Widest a table cell may render before it is truncated
const MAX_CELL_WIDTH: usize = 48;

/// Render a live block: header line, then its result
pub fn render_block(block: &Block) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "[{}] {} $ {}",
        block.index, block.status, block.command
    );
    if let Some(result) = &block.result {
        render_result(result, &mut out);
    }
    out
}

/// Render a replayed block, annotated with its reconciliation outcome
pub fn render_rendered(item: &RenderedBlock) -> String {
    let mut out = String::new();
    let status = match item.outcome() {
        Some(outcome) => format!("{}/{}", item.status(), outcome),
        None => item.status().to_string(),
    };
    let _ = writeln!(out, "[{}] {} $ {}", item.index(), status, item.command());

    if let Some(result) = item.result() {
        render_result(result, &mut out);
    }
    if item.outcome() == Some(Outcome::Diverged) {
        if let Some(message) = item.reconciliation.as_ref().and_then(|r| r.message.as_ref()) {
            let _ = writeln!(out, "  ~ {}", message);
        }
    }
    if let Some(detail) = &item.detail {
        let _ = writeln!(out, "  > {}", detail);
    }
    out
}

/// Render every block of a replay followed by a one-line summary
pub fn render_report(report: &ReplayReport) -> String {
    let mut out = String::new();
    for item in &report.blocks {
        out.push_str(&render_rendered(item));
    }
    out.push_str(&summary_line(report));
    out.push('\n');
    out
}

pub fn summary_line(report: &ReplayReport) -> String {
    let mut line = format!(
        "Replayed {}/{} blocks ({})",
        report.blocks.len(),
        report.expected,
        report.mode
    );
    if report.mode.is_reexec() {
        let _ = write!(
            line,
            ": {} matched, {} diverged, {} conflict",
            report.count(Outcome::Matched),
            report.count(Outcome::Diverged),
            report.count(Outcome::Conflict)
        );
    }
    if report.cancelled {
        line.push_str(", cancelled");
    }
    line
}

/// Describe a snapshot document without running anything
pub fn render_document(document: &SnapshotDocument) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Snapshot v{} ({}), {} block{}",
        document.version,
        document.mode,
        document.len(),
        if document.len() == 1 { "" } else { "s" }
    );
    for block in &document.blocks {
        let marker = if block.reexecutable { " *" } else { "" };
        let _ = writeln!(
            out,
            "  [{}] {}{} $ {}",
            block.index, block.status, marker, block.command
        );
    }
    out
}

fn render_result(result: &BlockResult, out: &mut String) {
    match result {
        BlockResult::Text { text } => {
            for line in text.trim_end_matches('\n').lines() {
                let _ = writeln!(out, "{}", line);
            }
        }
        BlockResult::Table { columns, rows } => {
            let cells: Vec<&[String]> = rows.iter().map(|r| r.cells.as_slice()).collect();
            render_table(columns, &cells, out);
        }
        BlockResult::Resource {
            kind,
            name,
            namespace,
            revision,
        } => {
            let _ = write!(out, "{}/{}", kind.to_lowercase(), name);
            if let Some(namespace) = namespace {
                let _ = write!(out, " in {}", namespace);
            }
            if let Some(revision) = revision {
                let _ = write!(out, " @{}", revision);
            }
            out.push('\n');
        }
        BlockResult::Failure {
            status_code,
            message,
        } => {
            match status_code {
                Some(code) => {
                    let _ = writeln!(out, "Error {}: {}", code, message);
                }
                None => {
                    let _ = writeln!(out, "Error: {}", message);
                }
            }
        }
    }
}

fn render_table(columns: &[String], rows: &[&[String]], out: &mut String) {
    let mut widths: Vec<usize> = columns
        .iter()
        .map(|c| UnicodeWidthStr::width(c.as_str()).min(MAX_CELL_WIDTH))
        .collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            let width = UnicodeWidthStr::width(cell.as_str()).min(MAX_CELL_WIDTH);
            match widths.get_mut(i) {
                Some(w) => *w = (*w).max(width),
                None => widths.push(width),
            }
        }
    }

    let mut write_row = |cells: &[String]| {
        let mut line = String::new();
        for (i, cell) in cells.iter().enumerate() {
            if i > 0 {
                line.push_str("  ");
            }
            let cell = truncate_to_width(cell, MAX_CELL_WIDTH);
            let pad = widths[i].saturating_sub(UnicodeWidthStr::width(cell.as_str()));
            line.push_str(&cell);
            line.extend(std::iter::repeat(' ').take(pad));
        }
        let _ = writeln!(out, "{}", line.trim_end());
    };

    if !columns.is_empty() {
        write_row(columns);
    }
    for row in rows {
        write_row(*row);
    }
}

/// Truncate a string to fit within a maximum display width, adding "..." if truncated.
fn truncate_to_width(s: &str, max_width: usize) -> String {
    let ellipsis = "...";
    let ellipsis_width = UnicodeWidthStr::width(ellipsis);

    if UnicodeWidthStr::width(s) <= max_width {
        return s.to_string();
    }
    if max_width <= ellipsis_width {
        return s.chars().take(max_width).collect();
    }

    let target_width = max_width - ellipsis_width;
    let mut width = 0;
    let mut result = String::new();
    for c in s.chars() {
        let char_width = UnicodeWidthChar::width(c).unwrap_or(0);
        if width + char_width > target_width {
            break;
        }
        result.push(c);
        width += char_width;
    }
    result.push_str(ellipsis);
    result
}
