// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! NASM source analyzer - main entry point.
//!
//! This module ties the evaluation core to the command-line surface:
//! argument validation, per-file analysis runs, and report rendering.

pub mod cli;
mod engine;
pub mod report;

pub use engine::{run_with_cli, run_with_config};
