// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Constant-expression evaluator and conditional-branch resolver for
//! NASM-flavoured assembly sources.
//!
//! The `core` module scans a source unit, collects its definitions and
//! resolves `%if`/`%elif`/`%else` activity without running a full
//! preprocessor; `analyzer` wraps that in the command-line tool.

pub mod analyzer;
pub mod core;
