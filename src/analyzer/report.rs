// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Per-file run reports and their text/JSON rendering.

use serde_json::json;

use crate::core::error::{Diagnostic, Severity};
use crate::core::eval::EvalResult;

#[derive(Debug, Clone)]
pub struct EvalEntry {
    pub expr: String,
    pub outcome: EvalResult,
}

#[derive(Debug, Clone)]
pub struct BranchEntry {
    pub block: usize,
    pub kind: &'static str,
    pub active: bool,
    pub line: u32,
    pub end_line: u32,
}

#[derive(Debug, Clone)]
pub struct SpanEntry {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub end_line: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct OffsetEntry {
    pub offset: usize,
    pub inactive: bool,
}

#[derive(Debug, Clone)]
pub struct SymbolEntry {
    pub name: String,
    pub kind: &'static str,
    pub line: u32,
    pub value: Option<i64>,
    pub error: Option<String>,
}

/// Everything one run produced for one input. `file` is `None` for the
/// scopeless `-e/--eval` run.
#[derive(Debug, Default)]
pub struct FileReport {
    file: Option<String>,
    diagnostics: Vec<Diagnostic>,
    evals: Vec<EvalEntry>,
    branches: Option<Vec<BranchEntry>>,
    inactive: Option<Vec<SpanEntry>>,
    offset_query: Option<OffsetEntry>,
    symbols: Option<Vec<SymbolEntry>>,
}

impl FileReport {
    pub fn new(file: Option<String>) -> Self {
        Self {
            file,
            ..Self::default()
        }
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn evals(&self) -> &[EvalEntry] {
        &self.evals
    }

    pub fn push_eval(&mut self, entry: EvalEntry) {
        self.evals.push(entry);
    }

    pub fn branches(&self) -> Option<&[BranchEntry]> {
        self.branches.as_deref()
    }

    pub fn set_branches(&mut self, branches: Vec<BranchEntry>) {
        self.branches = Some(branches);
    }

    pub fn inactive(&self) -> Option<&[SpanEntry]> {
        self.inactive.as_deref()
    }

    pub fn set_inactive(&mut self, spans: Vec<SpanEntry>) {
        self.inactive = Some(spans);
    }

    pub fn offset_query(&self) -> Option<OffsetEntry> {
        self.offset_query
    }

    pub fn set_offset_query(&mut self, entry: OffsetEntry) {
        self.offset_query = Some(entry);
    }

    pub fn symbols(&self) -> Option<&[SymbolEntry]> {
        self.symbols.as_deref()
    }

    pub fn set_symbols(&mut self, symbols: Vec<SymbolEntry>) {
        self.symbols = Some(symbols);
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity() == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity() == Severity::Warning)
            .count()
    }

    /// Whether the report carries any analysis output beyond diagnostics.
    pub fn has_output(&self) -> bool {
        !self.evals.is_empty()
            || self.branches.is_some()
            || self.inactive.is_some()
            || self.offset_query.is_some()
            || self.symbols.is_some()
    }
}

fn format_eval_outcome(outcome: &EvalResult) -> String {
    match outcome {
        EvalResult::Value(v) => v.to_string(),
        EvalResult::NotConstant => "<not constant>".to_string(),
        EvalResult::Error(msg) => format!("error: {msg}"),
    }
}

/// Render a report's analysis output for the text format. Diagnostics are
/// not included; they go through the diagnostics sink.
pub fn render_text(report: &FileReport) -> String {
    let mut out = String::new();
    if let Some(file) = report.file() {
        out.push_str(file);
        out.push_str(":\n");
    }
    for entry in report.evals() {
        out.push_str(&format!(
            "eval {} = {}\n",
            entry.expr,
            format_eval_outcome(&entry.outcome)
        ));
    }
    if let Some(branches) = report.branches() {
        for branch in branches {
            out.push_str(&format!(
                "block {} %{} lines {}..{}: {}\n",
                branch.block,
                branch.kind,
                branch.line,
                branch.end_line,
                if branch.active { "active" } else { "inactive" }
            ));
        }
    }
    if let Some(spans) = report.inactive() {
        for span in spans {
            out.push_str(&format!(
                "inactive lines {}..{} (bytes {}..{})\n",
                span.line, span.end_line, span.start, span.end
            ));
        }
    }
    if let Some(entry) = report.offset_query() {
        out.push_str(&format!(
            "offset {}: {}\n",
            entry.offset,
            if entry.inactive { "inactive" } else { "active" }
        ));
    }
    if let Some(symbols) = report.symbols() {
        for symbol in symbols {
            match (&symbol.value, &symbol.error) {
                (Some(value), _) => out.push_str(&format!(
                    "{} ({}) line {} = {}\n",
                    symbol.name, symbol.kind, symbol.line, value
                )),
                (None, Some(error)) => out.push_str(&format!(
                    "{} ({}) line {} = error: {}\n",
                    symbol.name, symbol.kind, symbol.line, error
                )),
                (None, None) => out.push_str(&format!(
                    "{} ({}) line {}\n",
                    symbol.name, symbol.kind, symbol.line
                )),
            }
        }
    }
    out
}

/// Render a report as one JSON object.
pub fn render_json(report: &FileReport) -> serde_json::Value {
    let evals: Vec<serde_json::Value> = report
        .evals()
        .iter()
        .map(|entry| match &entry.outcome {
            EvalResult::Value(v) => json!({
                "expr": entry.expr,
                "status": "value",
                "value": v,
                "message": serde_json::Value::Null,
            }),
            EvalResult::NotConstant => json!({
                "expr": entry.expr,
                "status": "not-constant",
                "value": serde_json::Value::Null,
                "message": serde_json::Value::Null,
            }),
            EvalResult::Error(msg) => json!({
                "expr": entry.expr,
                "status": "error",
                "value": serde_json::Value::Null,
                "message": msg,
            }),
        })
        .collect();

    let branches = report.branches().map(|branches| {
        branches
            .iter()
            .map(|branch| {
                json!({
                    "block": branch.block,
                    "kind": branch.kind,
                    "active": branch.active,
                    "line": branch.line,
                    "end_line": branch.end_line,
                })
            })
            .collect::<Vec<_>>()
    });

    let inactive = report.inactive().map(|spans| {
        spans
            .iter()
            .map(|span| {
                json!({
                    "start": span.start,
                    "end": span.end,
                    "line": span.line,
                    "end_line": span.end_line,
                })
            })
            .collect::<Vec<_>>()
    });

    let symbols = report.symbols().map(|symbols| {
        symbols
            .iter()
            .map(|symbol| {
                json!({
                    "name": symbol.name,
                    "kind": symbol.kind,
                    "line": symbol.line,
                    "value": symbol.value,
                    "error": symbol.error,
                })
            })
            .collect::<Vec<_>>()
    });

    json!({
        "schema": "nasmscope-report-v1",
        "file": report.file(),
        "evals": evals,
        "branches": branches,
        "inactive": inactive,
        "offset_query": report.offset_query().map(|entry| {
            json!({ "offset": entry.offset, "inactive": entry.inactive })
        }),
        "symbols": symbols,
        "errors": report.error_count(),
        "warnings": report.warning_count(),
    })
}

/// Mark the column of interest in a source line for context rendering.
pub fn highlight_line(line: &str, column: Option<usize>, use_color: bool) -> String {
    match column {
        Some(col) if col > 0 => {
            let idx = col - 1;
            if idx >= line.len() {
                if use_color {
                    return format!("{line}\x1b[31m^\x1b[0m");
                }
                return format!("{line}^");
            }
            let (head, tail) = line.split_at(idx);
            let ch = tail.chars().next().unwrap_or(' ');
            let rest = &tail[ch.len_utf8()..];
            if use_color {
                format!("{head}\x1b[31m{ch}\x1b[0m{rest}")
            } else {
                format!("{head}{ch}{rest}")
            }
        }
        _ => line.to_string(),
    }
}
