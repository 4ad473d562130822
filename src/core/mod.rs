// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Evaluation core shared by every analyzer mode.
//!
//! Source scanning, symbol collection, expression parsing and constant
//! evaluation, and conditional-branch resolution live here; the
//! `analyzer` module drives them.

pub mod analysis;
pub mod branches;
pub mod error;
pub mod eval;
pub mod expr;
pub mod macros;
pub mod number;
pub mod overrides;
pub mod source;
pub mod symbols;
pub mod tokenizer;
