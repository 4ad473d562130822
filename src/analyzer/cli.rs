// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface parsing and argument validation.

use std::env;
use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use crate::core::error::{ErrorKind, RunError, ToolError};
use crate::core::overrides::MacroOverrides;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const LONG_ABOUT: &str =
    "Constant-expression and conditional-branch inspector for NASM-dialect assembly sources.

The default mode checks every EQU/%define/%assign definition in active code
and reports definitions whose expressions fail to evaluate. Use --branches,
--inactive, --query-offset, or --symbols for structure reports, and
-e/--eval to evaluate expressions directly against a file's scope.";

#[derive(Parser, Debug)]
#[command(
    name = "nasmscope",
    version = VERSION,
    about = "NASM-dialect constant-expression and conditional-branch inspector",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    #[arg(
        long = "format",
        value_enum,
        default_value_t = OutputFormat::Text,
        long_help = "Select global CLI output format. text is default; json enables machine-readable output."
    )]
    pub format: OutputFormat,
    #[arg(
        short = 'q',
        long = "quiet",
        action = ArgAction::SetTrue,
        long_help = "Suppress diagnostic output for successful runs. Errors are still reported unless --no-error is set."
    )]
    pub quiet: bool,
    #[arg(
        short = 'E',
        long = "error",
        value_name = "FILE",
        long_help = "Write diagnostics to FILE instead of stderr."
    )]
    pub error_file: Option<PathBuf>,
    #[arg(
        long = "error-append",
        action = ArgAction::SetTrue,
        requires = "error_file",
        long_help = "Append diagnostics to --error FILE instead of truncating it."
    )]
    pub error_append: bool,
    #[arg(
        long = "no-error",
        action = ArgAction::SetTrue,
        conflicts_with_all = ["error_file", "error_append"],
        long_help = "Disable all diagnostic output routing."
    )]
    pub no_error: bool,
    #[arg(
        short = 'w',
        long = "no-warn",
        action = ArgAction::SetTrue,
        conflicts_with = "warn_error",
        long_help = "Suppress warning diagnostics."
    )]
    pub no_warn: bool,
    #[arg(
        long = "Werror",
        action = ArgAction::SetTrue,
        conflicts_with = "no_warn",
        long_help = "Treat warnings as errors (non-zero exit status)."
    )]
    pub warn_error: bool,
    #[arg(
        short = 'D',
        long = "define",
        value_name = "NAME[=VAL]",
        action = ArgAction::Append,
        long_help = "Predefine a macro (repeatable). NAME alone defines the name without a value; NAME=VAL also supplies the value used when conditions reference it."
    )]
    pub defines: Vec<String>,
    #[arg(
        short = 'e',
        long = "eval",
        value_name = "EXPR",
        action = ArgAction::Append,
        long_help = "Evaluate EXPR (repeatable) in the first input file's scope, or against an empty scope when no input is given. With -D defines, EXPR is evaluated the way branch conditions are."
    )]
    pub eval_exprs: Vec<String>,
    #[arg(
        long = "branches",
        action = ArgAction::SetTrue,
        long_help = "Report every conditional branch with its kind, line range, and activity."
    )]
    pub branches: bool,
    #[arg(
        long = "inactive",
        action = ArgAction::SetTrue,
        long_help = "Report the line ranges covered by inactive conditional branches."
    )]
    pub inactive: bool,
    #[arg(
        long = "query-offset",
        value_name = "N",
        long_help = "Report whether byte offset N of the input lies inside an inactive conditional branch."
    )]
    pub query_offset: Option<usize>,
    #[arg(
        long = "symbols",
        action = ArgAction::SetTrue,
        long_help = "Report every recorded definition with its kind, line, and evaluated value where one exists."
    )]
    pub symbols: bool,
    #[arg(
        short = 'i',
        long = "infile",
        value_name = "FILE",
        action = ArgAction::Append,
        long_help = "Input assembly file (repeatable)."
    )]
    pub infiles: Vec<PathBuf>,
    #[arg(
        value_name = "INPUT",
        action = ArgAction::Append,
        long_help = "Optional migration-friendly positional input. Exactly one positional INPUT is accepted and treated like -i INPUT. Multiple inputs require explicit -i/--infile."
    )]
    pub positional_inputs: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum DiagnosticsSinkConfig {
    Stderr,
    File { path: PathBuf, append: bool },
    Disabled,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WarningPolicy {
    pub emit_warnings: bool,
    pub treat_warnings_as_errors: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn cli_error(message: impl Into<String>) -> RunError {
    RunError::new(
        ToolError::new(ErrorKind::Cli, &message.into(), None),
        Vec::new(),
    )
}

fn parse_env_bool(var_name: &str) -> Result<Option<bool>, RunError> {
    let Some(raw) = env::var_os(var_name) else {
        return Ok(None);
    };
    let value = raw.to_string_lossy().trim().to_ascii_lowercase();
    let parsed = match value.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        "" => None,
        _ => {
            return Err(cli_error(format!(
                "Invalid boolean value for {var_name}: {value}"
            )))
        }
    };
    Ok(parsed)
}

fn parse_env_path(var_name: &str) -> Result<Option<PathBuf>, RunError> {
    let Some(raw) = env::var_os(var_name) else {
        return Ok(None);
    };
    let value = raw.to_string_lossy().trim().to_string();
    if value.is_empty() {
        return Ok(None);
    }
    Ok(Some(PathBuf::from(value)))
}

fn parse_env_csv_list(var_name: &str) -> Result<Vec<String>, RunError> {
    let Some(raw) = env::var_os(var_name) else {
        return Ok(Vec::new());
    };
    let value = raw.to_string_lossy();
    Ok(value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(ToString::to_string)
        .collect())
}

/// Validate CLI arguments and return parsed configuration.
pub fn validate_cli(cli: &Cli) -> Result<AnalyzerConfig, RunError> {
    let env_defines = parse_env_csv_list("NASMSCOPE_DEFINES")?;
    let env_quiet = parse_env_bool("NASMSCOPE_QUIET")?;
    let env_no_warn = parse_env_bool("NASMSCOPE_NO_WARN")?;
    let env_warn_error = parse_env_bool("NASMSCOPE_WERROR")?;
    let env_error_file = parse_env_path("NASMSCOPE_ERROR_FILE")?;
    let env_error_append = parse_env_bool("NASMSCOPE_ERROR_APPEND")?;
    let env_no_error = parse_env_bool("NASMSCOPE_NO_ERROR")?;

    // Environment entries come first so command-line defines of the same
    // name win.
    let mut effective_defines = env_defines;
    effective_defines.extend(cli.defines.clone());

    let effective_quiet = if cli.quiet {
        true
    } else {
        env_quiet.unwrap_or(false)
    };

    let effective_no_warn = if cli.no_warn {
        true
    } else if cli.warn_error {
        false
    } else {
        env_no_warn.unwrap_or(false)
    };

    let effective_warn_error = if cli.warn_error {
        true
    } else if effective_no_warn {
        false
    } else {
        env_warn_error.unwrap_or(false)
    };

    let effective_error_file = if cli.error_file.is_some() {
        cli.error_file.clone()
    } else {
        env_error_file
    };

    let effective_error_append = if cli.error_append {
        true
    } else {
        env_error_append.unwrap_or(false)
    };

    let effective_no_error = if cli.no_error {
        true
    } else if cli.error_file.is_some() {
        false
    } else {
        env_no_error.unwrap_or(false)
    };

    let overrides = MacroOverrides::from_entries(effective_defines.iter().map(String::as_str))
        .map_err(cli_error)?;

    let input_paths = if !cli.infiles.is_empty() {
        if !cli.positional_inputs.is_empty() {
            return Err(cli_error(
                "Do not mix positional input with -i/--infile; use one style",
            ));
        }
        cli.infiles.clone()
    } else if cli.positional_inputs.len() == 1 {
        cli.positional_inputs.clone()
    } else if cli.positional_inputs.len() > 1 {
        return Err(cli_error(
            "Multiple positional inputs are not supported; use repeatable -i/--infile",
        ));
    } else if !cli.eval_exprs.is_empty() {
        Vec::new()
    } else {
        return Err(cli_error(
            "No input files specified. Use -i/--infile or -e/--eval",
        ));
    };

    if input_paths.is_empty()
        && (cli.branches || cli.inactive || cli.symbols || cli.query_offset.is_some())
    {
        return Err(cli_error(
            "--branches/--inactive/--query-offset/--symbols require an input file",
        ));
    }

    Ok(AnalyzerConfig {
        input_paths,
        defines: effective_defines,
        overrides,
        eval_exprs: cli.eval_exprs.clone(),
        branches: cli.branches,
        inactive: cli.inactive,
        query_offset: cli.query_offset,
        symbols: cli.symbols,
        quiet: effective_quiet,
        output_format: cli.format,
        diagnostics_sink: if effective_no_error {
            DiagnosticsSinkConfig::Disabled
        } else if let Some(path) = &effective_error_file {
            DiagnosticsSinkConfig::File {
                path: path.clone(),
                append: effective_error_append,
            }
        } else {
            DiagnosticsSinkConfig::Stderr
        },
        warning_policy: WarningPolicy {
            emit_warnings: !effective_no_warn,
            treat_warnings_as_errors: effective_warn_error,
        },
    })
}

/// Validated CLI configuration.
#[derive(Debug)]
pub struct AnalyzerConfig {
    pub input_paths: Vec<PathBuf>,
    pub defines: Vec<String>,
    pub overrides: MacroOverrides,
    pub eval_exprs: Vec<String>,
    pub branches: bool,
    pub inactive: bool,
    pub query_offset: Option<usize>,
    pub symbols: bool,
    pub quiet: bool,
    pub output_format: OutputFormat,
    pub diagnostics_sink: DiagnosticsSinkConfig,
    pub warning_policy: WarningPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::env;
    use std::ffi::OsString;
    use std::sync::{Mutex, OnceLock};

    fn with_env_vars(vars: &[(&str, Option<&str>)], test: impl FnOnce()) {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        let _guard = ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .expect("lock env mutex");

        struct RestoreEnv(Vec<(String, Option<OsString>)>);
        impl Drop for RestoreEnv {
            fn drop(&mut self) {
                for (key, value) in self.0.drain(..) {
                    // SAFETY: tests serialize env access via ENV_LOCK.
                    unsafe {
                        match value {
                            Some(value) => env::set_var(&key, value),
                            None => env::remove_var(&key),
                        }
                    }
                }
            }
        }

        // Declared after the lock guard so it restores before unlocking.
        let _restore = RestoreEnv(
            vars.iter()
                .map(|(key, _)| (key.to_string(), env::var_os(key)))
                .collect(),
        );
        for (key, value) in vars {
            // SAFETY: tests serialize env access via ENV_LOCK.
            unsafe {
                match value {
                    Some(value) => env::set_var(key, value),
                    None => env::remove_var(key),
                }
            }
        }

        test();
    }

    #[test]
    fn cli_parses_modes_and_inputs() {
        let cli = Cli::parse_from([
            "nasmscope",
            "--format",
            "json",
            "-i",
            "prog.asm",
            "-q",
            "-E",
            "diag.log",
            "--error-append",
            "-D",
            "DEBUG=1",
            "-D",
            "WIDE",
            "-e",
            "1+2",
            "--branches",
            "--inactive",
            "--query-offset",
            "42",
            "--symbols",
        ]);
        assert_eq!(cli.infiles, vec![PathBuf::from("prog.asm")]);
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(cli.quiet);
        assert_eq!(cli.error_file, Some(PathBuf::from("diag.log")));
        assert!(cli.error_append);
        assert_eq!(cli.defines, vec!["DEBUG=1".to_string(), "WIDE".to_string()]);
        assert_eq!(cli.eval_exprs, vec!["1+2".to_string()]);
        assert!(cli.branches);
        assert!(cli.inactive);
        assert_eq!(cli.query_offset, Some(42));
        assert!(cli.symbols);
        assert!(cli.positional_inputs.is_empty());
    }

    #[test]
    fn validate_cli_accepts_single_positional_input() {
        let cli = Cli::parse_from(["nasmscope", "prog.asm"]);
        let config = validate_cli(&cli).expect("validate cli");
        assert_eq!(config.input_paths, vec![PathBuf::from("prog.asm")]);
    }

    #[test]
    fn validate_cli_rejects_multiple_positional_inputs() {
        let cli = Cli::parse_from(["nasmscope", "a.asm", "b.asm"]);
        let err = validate_cli(&cli).expect_err("two positional inputs should fail");
        assert!(err.to_string().contains("Multiple positional inputs"));
    }

    #[test]
    fn validate_cli_rejects_mixed_positional_and_infile() {
        let cli = Cli::parse_from(["nasmscope", "-i", "a.asm", "b.asm"]);
        let err = validate_cli(&cli).expect_err("mixed input styles should fail");
        assert!(err.to_string().contains("Do not mix positional input"));
    }

    #[test]
    fn validate_cli_requires_input_or_eval() {
        let cli = Cli::parse_from(["nasmscope"]);
        let err = validate_cli(&cli).expect_err("no input should fail");
        assert!(err.to_string().contains("No input files specified"));
    }

    #[test]
    fn validate_cli_allows_eval_without_input() {
        let cli = Cli::parse_from(["nasmscope", "-e", "1+2"]);
        let config = validate_cli(&cli).expect("validate cli");
        assert!(config.input_paths.is_empty());
        assert_eq!(config.eval_exprs, vec!["1+2".to_string()]);
    }

    #[test]
    fn validate_cli_rejects_structure_modes_without_input() {
        let cli = Cli::parse_from(["nasmscope", "-e", "1", "--branches"]);
        let err = validate_cli(&cli).expect_err("branches without input should fail");
        assert!(err.to_string().contains("require an input file"));
    }

    #[test]
    fn validate_cli_sets_diagnostics_and_warning_policy() {
        let cli = Cli::parse_from([
            "nasmscope",
            "prog.asm",
            "-E",
            "diag.log",
            "--error-append",
            "--Werror",
        ]);
        let config = validate_cli(&cli).expect("validate cli");
        match config.diagnostics_sink {
            DiagnosticsSinkConfig::File { ref path, append } => {
                assert_eq!(path, &PathBuf::from("diag.log"));
                assert!(append);
            }
            _ => panic!("expected file sink"),
        }
        assert!(config.warning_policy.emit_warnings);
        assert!(config.warning_policy.treat_warnings_as_errors);
    }

    #[test]
    fn validate_cli_no_warn_disables_warnings() {
        let cli = Cli::parse_from(["nasmscope", "prog.asm", "-w"]);
        let config = validate_cli(&cli).expect("validate cli");
        assert!(!config.warning_policy.emit_warnings);
        assert!(!config.warning_policy.treat_warnings_as_errors);
    }

    #[test]
    fn validate_cli_rejects_invalid_define() {
        let cli = Cli::parse_from(["nasmscope", "prog.asm", "-D", "1BAD"]);
        let err = validate_cli(&cli).expect_err("invalid define should fail");
        assert!(err.to_string().contains("Invalid macro definition"));
    }

    #[test]
    fn validate_cli_applies_env_defaults_when_cli_not_set() {
        with_env_vars(
            &[
                ("NASMSCOPE_DEFINES", Some("BUILD=1,MODE=2")),
                ("NASMSCOPE_QUIET", Some("true")),
                ("NASMSCOPE_NO_WARN", Some("1")),
            ],
            || {
                let cli = Cli::parse_from(["nasmscope", "prog.asm"]);
                let config = validate_cli(&cli).expect("validate cli");
                assert_eq!(
                    config.defines,
                    vec!["BUILD=1".to_string(), "MODE=2".to_string()]
                );
                assert_eq!(config.overrides.numeric_value("BUILD"), Some(1));
                assert!(config.quiet);
                assert!(!config.warning_policy.emit_warnings);
            },
        );
    }

    #[test]
    fn validate_cli_cli_values_override_env_values() {
        with_env_vars(
            &[
                ("NASMSCOPE_ERROR_FILE", Some("env.log")),
                ("NASMSCOPE_DEFINES", Some("LEVEL=1")),
            ],
            || {
                let cli = Cli::parse_from([
                    "nasmscope",
                    "prog.asm",
                    "-E",
                    "cli.log",
                    "-D",
                    "LEVEL=2",
                ]);
                let config = validate_cli(&cli).expect("validate cli");
                match config.diagnostics_sink {
                    DiagnosticsSinkConfig::File { ref path, .. } => {
                        assert_eq!(path, &PathBuf::from("cli.log"));
                    }
                    _ => panic!("expected file sink"),
                }
                // Later entries win, so the CLI define shadows the
                // environment one.
                assert_eq!(config.overrides.numeric_value("LEVEL"), Some(2));
            },
        );
    }

    #[test]
    fn validate_cli_rejects_invalid_env_boolean_value() {
        with_env_vars(&[("NASMSCOPE_WERROR", Some("maybe"))], || {
            let cli = Cli::parse_from(["nasmscope", "prog.asm"]);
            let err = validate_cli(&cli).expect_err("invalid env bool should fail");
            assert!(err
                .to_string()
                .contains("Invalid boolean value for NASMSCOPE_WERROR"));
        });
    }

    #[test]
    fn validate_cli_env_no_error_disables_sink() {
        with_env_vars(&[("NASMSCOPE_NO_ERROR", Some("yes"))], || {
            let cli = Cli::parse_from(["nasmscope", "prog.asm"]);
            let config = validate_cli(&cli).expect("validate cli");
            assert!(matches!(
                config.diagnostics_sink,
                DiagnosticsSinkConfig::Disabled
            ));
        });
    }
}
