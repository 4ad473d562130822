// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Symbol table built from one scan over a source unit.
//!
//! Every definition is recorded in source order with its defining line;
//! nothing is evaluated at scan time. Lookup walks the kinds in a fixed
//! order and leaves activity filtering to the caller, so definitions
//! inside inactive conditional branches stay in the table and are skipped
//! per query.

use crate::core::macros::split_params;
use crate::core::source::{take_leading_ident, LineKind, SourceUnit};
use crate::core::tokenizer::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Equ,
    Define,
    Assign,
    Macro,
    Label,
    LocalLabel,
    MacroLocalLabel,
    Extern,
    Global,
}

/// One definition. `params` is present only for function-like `%define`
/// (empty for a nullary one); `body` is the unevaluated replacement or
/// expression text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub name: String,
    pub kind: SymbolKind,
    pub params: Option<Vec<String>>,
    pub body: Option<String>,
    pub line: usize,
    pub span: Span,
}

impl Definition {
    pub fn new(name: impl Into<String>, kind: SymbolKind) -> Self {
        Self {
            name: name.into(),
            kind,
            params: None,
            body: None,
            line: 0,
            span: Span::default(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_params(mut self, params: Vec<String>) -> Self {
        self.params = Some(params);
        self
    }

    pub fn at(mut self, line: usize, span: Span) -> Self {
        self.line = line;
        self.span = span;
        self
    }
}

/// Lookup order: EQU constants first, then labels, imported names,
/// multi-line macros, single-line macros and assigns (each macro kind
/// with a case-insensitive second pass), exported names last.
const LOOKUP_ORDER: &[(&[SymbolKind], bool)] = &[
    (&[SymbolKind::Equ], false),
    (
        &[
            SymbolKind::Label,
            SymbolKind::LocalLabel,
            SymbolKind::MacroLocalLabel,
        ],
        false,
    ),
    (&[SymbolKind::Extern], false),
    (&[SymbolKind::Macro], true),
    (&[SymbolKind::Define], true),
    (&[SymbolKind::Assign], true),
    (&[SymbolKind::Global], false),
];

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    defs: Vec<Definition>,
}

impl SymbolTable {
    pub fn scan(unit: &SourceUnit) -> Self {
        let mut defs = Vec::new();
        let mut current_global: Option<String> = None;
        let mut in_macro = false;
        for line in unit.lines() {
            match &line.kind {
                LineKind::Equ { name, expr } => {
                    defs.push(
                        Definition::new(name, SymbolKind::Equ)
                            .with_body(expr)
                            .at(line.number, line.span),
                    );
                }
                LineKind::Define { rest, .. } => {
                    if let Some(def) = parse_define(rest) {
                        defs.push(def.at(line.number, line.span));
                    }
                }
                LineKind::Assign { rest, .. } => {
                    if let Some((name, after)) = take_leading_ident(rest) {
                        let mut def = Definition::new(name, SymbolKind::Assign);
                        let body = after.trim();
                        if !body.is_empty() {
                            def = def.with_body(body);
                        }
                        defs.push(def.at(line.number, line.span));
                    }
                }
                LineKind::MacroStart { rest } => {
                    if let Some((name, _)) = take_leading_ident(rest) {
                        defs.push(
                            Definition::new(name, SymbolKind::Macro).at(line.number, line.span),
                        );
                    }
                    in_macro = true;
                }
                LineKind::MacroEnd => in_macro = false,
                LineKind::Extern { names } => {
                    for name in names {
                        defs.push(
                            Definition::new(name, SymbolKind::Extern).at(line.number, line.span),
                        );
                    }
                }
                LineKind::Global { names } => {
                    for name in names {
                        defs.push(
                            Definition::new(name, SymbolKind::Global).at(line.number, line.span),
                        );
                    }
                }
                LineKind::Label { name } => {
                    if let Some(local) = name.strip_prefix("%%") {
                        if in_macro {
                            defs.push(
                                Definition::new(format!("%%{local}"), SymbolKind::MacroLocalLabel)
                                    .at(line.number, line.span),
                            );
                        }
                    } else if name.starts_with('.') {
                        let qualified = match &current_global {
                            Some(owner) => format!("{owner}{name}"),
                            None => name.clone(),
                        };
                        defs.push(
                            Definition::new(qualified, SymbolKind::LocalLabel)
                                .at(line.number, line.span),
                        );
                    } else {
                        current_global = Some(name.clone());
                        defs.push(
                            Definition::new(name, SymbolKind::Label).at(line.number, line.span),
                        );
                    }
                }
                _ => {}
            }
        }
        Self { defs }
    }

    pub fn definitions(&self) -> &[Definition] {
        &self.defs
    }

    /// Kind-ordered lookup. `is_active` filters out definitions the caller
    /// considers dead; the first surviving candidate wins.
    pub fn resolve(
        &self,
        name: &str,
        mut is_active: impl FnMut(&Definition) -> bool,
    ) -> Option<&Definition> {
        for (kinds, ci_fallback) in LOOKUP_ORDER {
            let hit = self
                .defs
                .iter()
                .find(|d| kinds.contains(&d.kind) && d.name == name && is_active(d));
            if let Some(def) = hit {
                return Some(def);
            }
            if *ci_fallback {
                let hit = self.defs.iter().find(|d| {
                    kinds.contains(&d.kind) && d.name.eq_ignore_ascii_case(name) && is_active(d)
                });
                if let Some(def) = hit {
                    return Some(def);
                }
            }
        }
        None
    }

    /// Definedness as `%ifdef` sees it: does any constant, single-line
    /// macro, assign or multi-line macro carry this exact name? Labels and
    /// imported names never count and cannot mask names that do.
    pub fn is_name_defined(
        &self,
        name: &str,
        mut is_active: impl FnMut(&Definition) -> bool,
    ) -> bool {
        self.defs.iter().any(|d| {
            matches!(
                d.kind,
                SymbolKind::Equ | SymbolKind::Define | SymbolKind::Assign | SymbolKind::Macro
            ) && d.name == name
                && is_active(d)
        })
    }

    /// Lookup restricted to function-like single-line macros, exact case
    /// first, then case-insensitive.
    pub fn resolve_define_fn(
        &self,
        name: &str,
        mut is_active: impl FnMut(&Definition) -> bool,
    ) -> Option<&Definition> {
        let callable =
            |d: &&Definition| d.kind == SymbolKind::Define && d.params.is_some();
        let hit = self
            .defs
            .iter()
            .filter(callable)
            .find(|d| d.name == name && is_active(d));
        if hit.is_some() {
            return hit;
        }
        self.defs
            .iter()
            .filter(callable)
            .find(|d| d.name.eq_ignore_ascii_case(name) && is_active(d))
    }
}

/// Parse the tail of a `%define`: `NAME body`, `NAME(a, b) body`. The
/// paren must touch the name; a spaced paren is part of the body.
fn parse_define(rest: &str) -> Option<Definition> {
    let (name, after) = take_leading_ident(rest)?;
    if let Some(tail) = after.strip_prefix('(') {
        if let Some(close) = find_close(tail) {
            let inner = tail[..close].trim();
            let params = if inner.is_empty() {
                Vec::new()
            } else {
                split_params(inner)
            };
            let mut def = Definition::new(name, SymbolKind::Define).with_params(params);
            let body = tail[close + 1..].trim();
            if !body.is_empty() {
                def = def.with_body(body);
            }
            return Some(def);
        }
    }
    let mut def = Definition::new(name, SymbolKind::Define);
    let body = after.trim();
    if !body.is_empty() {
        def = def.with_body(body);
    }
    Some(def)
}

fn find_close(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, b) in text.bytes().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => {
                if depth == 0 {
                    return Some(i);
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    None
}
