// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Analyzer run orchestration.
//!
//! Drives one [`FileAnalysis`] per input and fills a [`FileReport`] with
//! the requested mode output. Without a mode flag the run checks every
//! evaluable definition in active code and reports evaluation errors.

use std::fs;
use std::path::Path;

use crate::analyzer::cli::{validate_cli, AnalyzerConfig, Cli};
use crate::analyzer::report::{
    BranchEntry, EvalEntry, FileReport, OffsetEntry, SpanEntry, SymbolEntry,
};
use crate::core::analysis::FileAnalysis;
use crate::core::branches::BranchKind;
use crate::core::error::{Diagnostic, ErrorKind, RunError, Severity, ToolError};
use crate::core::eval::EvalResult;
use crate::core::symbols::{Definition, SymbolKind};

pub fn run_with_cli(cli: &Cli) -> Result<Vec<FileReport>, RunError> {
    let config = validate_cli(cli)?;
    run_with_config(&config)
}

pub fn run_with_config(config: &AnalyzerConfig) -> Result<Vec<FileReport>, RunError> {
    let mut reports = Vec::new();

    if config.input_paths.is_empty() {
        // Scopeless -e run: an empty unit plus the -D store.
        let analysis = FileAnalysis::new("<eval>", "", config.overrides.clone());
        let mut report = FileReport::new(None);
        run_evals(&analysis, config, &mut report);
        reports.push(report);
    } else {
        for (index, path) in config.input_paths.iter().enumerate() {
            let report = run_one(path, config, index == 0, &reports)?;
            reports.push(report);
        }
    }

    if config.warning_policy.treat_warnings_as_errors {
        let mut promoted = Vec::new();
        for report in &reports {
            for diag in report.diagnostics() {
                if diag.severity() == Severity::Warning {
                    let mut diag = diag.clone();
                    diag.severity = Severity::Error;
                    promoted.push(diag);
                }
            }
        }
        if !promoted.is_empty() {
            return Err(RunError::new(
                ToolError::new(
                    ErrorKind::Cli,
                    "Warnings treated as errors (--Werror)",
                    None,
                ),
                promoted,
            ));
        }
    }

    Ok(reports)
}

fn run_one(
    path: &Path,
    config: &AnalyzerConfig,
    first_input: bool,
    prior: &[FileReport],
) -> Result<FileReport, RunError> {
    let name = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|err| {
        let collected = prior
            .iter()
            .flat_map(|report| report.diagnostics().iter().cloned())
            .collect();
        RunError::new(
            ToolError::new(
                ErrorKind::Io,
                "Cannot read input file",
                Some(&format!("{name} ({err})")),
            ),
            collected,
        )
    })?;

    let analysis = FileAnalysis::new(name.clone(), &text, config.overrides.clone());
    let mut report = FileReport::new(Some(name));

    structure_warnings(&analysis, &mut report);

    let structure_mode =
        config.branches || config.inactive || config.query_offset.is_some() || config.symbols;

    if config.branches {
        report.set_branches(collect_branches(&analysis));
    }
    if config.inactive {
        report.set_inactive(collect_inactive(&analysis));
    }
    if let Some(offset) = config.query_offset {
        report.set_offset_query(OffsetEntry {
            offset,
            inactive: analysis.is_position_in_inactive_branch(offset),
        });
    }
    if config.symbols {
        report.set_symbols(collect_symbols(&analysis));
    }
    // -e expressions evaluate in the first input's scope only.
    if first_input && !config.eval_exprs.is_empty() {
        run_evals(&analysis, config, &mut report);
    }

    if !structure_mode && config.eval_exprs.is_empty() {
        check_definitions(&analysis, &mut report);
    }

    Ok(report)
}

fn run_evals(analysis: &FileAnalysis, config: &AnalyzerConfig, report: &mut FileReport) {
    for expr in &config.eval_exprs {
        let outcome = if config.overrides.is_empty() {
            analysis.evaluate_text(expr)
        } else {
            analysis.evaluate_condition(expr)
        };
        report.push_eval(EvalEntry {
            expr: expr.clone(),
            outcome,
        });
    }
}

/// Default check mode: evaluate every EQU/`%define`/`%assign` body outside
/// inactive branches and diagnose evaluation errors.
fn check_definitions(analysis: &FileAnalysis, report: &mut FileReport) {
    for def in analysis.definitions() {
        if !is_evaluable(def.kind) {
            continue;
        }
        let Some(body) = def.body.as_deref() else {
            continue;
        };
        if analysis.is_position_in_inactive_branch(def.span.start) {
            continue;
        }
        if let EvalResult::Error(message) = analysis.evaluate_text(body) {
            report.push_diagnostic(eval_diagnostic(analysis, def, &message));
        }
    }
}

fn is_evaluable(kind: SymbolKind) -> bool {
    matches!(
        kind,
        SymbolKind::Equ | SymbolKind::Define | SymbolKind::Assign
    )
}

fn eval_diagnostic(analysis: &FileAnalysis, def: &Definition, message: &str) -> Diagnostic {
    let source = analysis
        .unit()
        .line_at_offset(def.span.start)
        .map(|line| line.content.clone());
    Diagnostic::new(
        def.line as u32,
        Severity::Error,
        ToolError::new(ErrorKind::Eval, message, None),
    )
    .with_file(Some(analysis.unit().name().to_string()))
    .with_source(source)
}

fn structure_warnings(analysis: &FileAnalysis, report: &mut FileReport) {
    for warning in analysis.block_warnings() {
        let source = analysis
            .unit()
            .lines()
            .iter()
            .find(|line| line.number == warning.line)
            .map(|line| line.content.clone());
        report.push_diagnostic(
            Diagnostic::new(
                warning.line as u32,
                Severity::Warning,
                ToolError::new(ErrorKind::Source, &warning.message, None),
            )
            .with_file(Some(analysis.unit().name().to_string()))
            .with_source(source),
        );
    }
}

fn collect_branches(analysis: &FileAnalysis) -> Vec<BranchEntry> {
    let unit = analysis.unit();
    analysis
        .conditional_branches()
        .iter()
        .map(|branch| BranchEntry {
            block: branch.block_id,
            kind: branch_kind_name(branch.kind),
            active: branch.is_active,
            line: line_number_at(unit, branch.range.start),
            end_line: line_number_at(unit, branch.range.end),
        })
        .collect()
}

fn collect_inactive(analysis: &FileAnalysis) -> Vec<SpanEntry> {
    let unit = analysis.unit();
    analysis
        .conditional_branches()
        .iter()
        .filter(|branch| !branch.is_active)
        .map(|branch| SpanEntry {
            start: branch.range.start,
            end: branch.range.end,
            line: line_number_at(unit, branch.range.start),
            end_line: line_number_at(unit, branch.range.end),
        })
        .collect()
}

fn collect_symbols(analysis: &FileAnalysis) -> Vec<SymbolEntry> {
    analysis
        .definitions()
        .iter()
        .map(|def| {
            let outcome = if is_evaluable(def.kind)
                && !analysis.is_position_in_inactive_branch(def.span.start)
            {
                def.body.as_deref().map(|body| analysis.evaluate_text(body))
            } else {
                None
            };
            let (value, error) = match outcome {
                Some(EvalResult::Value(v)) => (Some(v), None),
                Some(EvalResult::Error(msg)) => (None, Some(msg)),
                _ => (None, None),
            };
            SymbolEntry {
                name: def.name.clone(),
                kind: symbol_kind_name(def.kind),
                line: def.line as u32,
                value,
                error,
            }
        })
        .collect()
}

fn line_number_at(unit: &crate::core::source::SourceUnit, offset: usize) -> u32 {
    unit.line_at_offset(offset)
        .map(|line| line.number as u32)
        .unwrap_or(0)
}

fn branch_kind_name(kind: BranchKind) -> &'static str {
    match kind {
        BranchKind::If => "if",
        BranchKind::Elif => "elif",
        BranchKind::Else => "else",
    }
}

fn symbol_kind_name(kind: SymbolKind) -> &'static str {
    match kind {
        SymbolKind::Equ => "equ",
        SymbolKind::Define => "define",
        SymbolKind::Assign => "assign",
        SymbolKind::Macro => "macro",
        SymbolKind::Label => "label",
        SymbolKind::LocalLabel => "local-label",
        SymbolKind::MacroLocalLabel => "macro-local-label",
        SymbolKind::Extern => "extern",
        SymbolKind::Global => "global",
    }
}
