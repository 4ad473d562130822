// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for nasmscope.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use serde_json::json;

use nasmscope::analyzer::cli::{
    validate_cli, Cli, DiagnosticsSinkConfig, OutputFormat, WarningPolicy,
};
use nasmscope::analyzer::report::{render_json, render_text};
use nasmscope::core::error::{Diagnostic, Severity};

struct DiagnosticsSink {
    writer: Option<Box<dyn Write>>,
    use_color: bool,
    format: OutputFormat,
}

impl DiagnosticsSink {
    fn from_config(
        config: &DiagnosticsSinkConfig,
        use_color: bool,
        format: OutputFormat,
    ) -> io::Result<Self> {
        let writer: Option<Box<dyn Write>> = match config {
            DiagnosticsSinkConfig::Disabled => None,
            DiagnosticsSinkConfig::Stderr => Some(Box::new(io::stderr())),
            DiagnosticsSinkConfig::File { path, append } => {
                let mut opts = OpenOptions::new();
                opts.create(true).write(true);
                if *append {
                    opts.append(true);
                } else {
                    opts.truncate(true);
                }
                Some(Box::new(opts.open(path)?))
            }
        };
        Ok(Self {
            writer,
            use_color,
            format,
        })
    }

    fn emit_line(&mut self, line: &str) {
        if let Some(writer) = &mut self.writer {
            let _ = writeln!(writer, "{line}");
        }
    }

    fn emit_diagnostics(&mut self, diagnostics: &[Diagnostic]) {
        for diag in diagnostics {
            let line = format_diagnostic_line(diag, self.use_color, self.format);
            self.emit_line(&line);
        }
    }
}

fn severity_to_str(severity: Severity) -> &'static str {
    match severity {
        Severity::Warning => "warning",
        Severity::Error => "error",
    }
}

fn format_diagnostic_line(diag: &Diagnostic, use_color: bool, format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        json!({
            "code": diag.code(),
            "severity": severity_to_str(diag.severity()),
            "message": diag.message(),
            "file": diag.file(),
            "line": diag.line(),
            "col_start": diag.column(),
        })
        .to_string()
    } else {
        diag.format_with_context(None, use_color)
    }
}

/// Apply the warning policy and fill in the input path on diagnostics
/// that never learned their file.
fn presentable_diagnostics(
    diagnostics: &[Diagnostic],
    policy: &WarningPolicy,
    fallback_file: Option<&Path>,
) -> Vec<Diagnostic> {
    let fallback = fallback_file.map(|path| path.to_string_lossy().to_string());
    diagnostics
        .iter()
        .filter(|diag| policy.emit_warnings || diag.severity() != Severity::Warning)
        .map(|diag| {
            if diag.file().is_none() {
                diag.clone().with_file(fallback.clone())
            } else {
                diag.clone()
            }
        })
        .collect()
}

fn main() {
    let cli = Cli::parse();
    let cli_config = match validate_cli(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    let use_color = std::env::var("NO_COLOR").is_err();
    let mut sink = match DiagnosticsSink::from_config(
        &cli_config.diagnostics_sink,
        use_color,
        cli_config.output_format,
    ) {
        Ok(sink) => sink,
        Err(err) => {
            eprintln!("Failed to open diagnostics sink: {err}");
            std::process::exit(1);
        }
    };

    let fallback = cli_config.input_paths.first().map(PathBuf::as_path);
    match nasmscope::analyzer::run_with_cli(&cli) {
        Ok(reports) => {
            let had_errors = reports.iter().any(|report| report.error_count() > 0);
            if !cli_config.quiet {
                for report in &reports {
                    match cli_config.output_format {
                        OutputFormat::Json => println!("{}", render_json(report)),
                        OutputFormat::Text => {
                            if report.has_output() {
                                print!("{}", render_text(report));
                            }
                        }
                    }
                    sink.emit_diagnostics(&presentable_diagnostics(
                        report.diagnostics(),
                        &cli_config.warning_policy,
                        fallback,
                    ));
                }
            }
            if had_errors {
                std::process::exit(1);
            }
        }
        Err(err) => {
            sink.emit_diagnostics(&presentable_diagnostics(
                err.diagnostics(),
                &cli_config.warning_policy,
                fallback,
            ));
            if cli_config.output_format != OutputFormat::Json
                && !matches!(cli_config.diagnostics_sink, DiagnosticsSinkConfig::Disabled)
            {
                sink.emit_line(&err.to_string());
            }
            std::process::exit(1);
        }
    }
}
