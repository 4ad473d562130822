// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Conditional branch state.
//!
//! Walks a source unit's `%if`/`%elif`/`%else`/`%endif` structure and
//! computes which arms are active. Blocks evaluate top to bottom: the
//! first decidably-true branch is active and every later sibling is
//! inactive without evaluating its condition. One undecidable condition
//! makes the whole block emit zero records, earlier siblings included.
//! Conditions always evaluate with the override store supplied, which
//! keeps the inactive-position query from recursing into itself.

use std::sync::{Arc, Mutex};

use crate::core::eval::{evaluate_text, EvalResult, EvalScope, ScopeQuery};
use crate::core::overrides::MacroOverrides;
use crate::core::source::{LineKind, SourceUnit};
use crate::core::tokenizer::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    If,
    Elif,
    Else,
}

/// One recorded arm. `range` spans the arm's body: from the end of the
/// directive line to the start of the next sibling directive or `%endif`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalBranch {
    pub kind: BranchKind,
    pub range: Span,
    pub is_active: bool,
    pub block_id: usize,
}

/// Source-structure finding from the block builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchWarning {
    pub line: usize,
    pub message: String,
}

enum Condition {
    Expr(String),
    Defined { negated: bool, name: String },
    Else,
}

struct RawBranch {
    kind: BranchKind,
    cond: Condition,
    body: Span,
    nested: Vec<RawBlock>,
}

struct RawBlock {
    branches: Vec<RawBranch>,
    open_line: usize,
}

/// Nesting bound for the block builder. Blocks opened past it are
/// swallowed whole (zero records, one warning), which keeps the block
/// tree and the evaluation recursion shallow.
const BLOCK_DEPTH_LIMIT: usize = 64;

/// Compute the branch list and builder warnings for a unit.
pub fn compute_branches(
    unit: &SourceUnit,
    scope: &dyn EvalScope,
    overrides: &MacroOverrides,
) -> (Vec<ConditionalBranch>, Vec<BranchWarning>) {
    let (roots, warnings) = build_blocks(unit);
    let mut out = Vec::new();
    let mut next_id = 0usize;
    for block in &roots {
        eval_block(block, scope, overrides, &mut out, &mut next_id);
    }
    (out, warnings)
}

/// Builder-only pass for source-structure warnings; no conditions are
/// evaluated.
pub fn block_warnings(unit: &SourceUnit) -> Vec<BranchWarning> {
    build_blocks(unit).1
}

fn build_blocks(unit: &SourceUnit) -> (Vec<RawBlock>, Vec<BranchWarning>) {
    let mut roots = Vec::new();
    let mut stack: Vec<RawBlock> = Vec::new();
    let mut warnings = Vec::new();
    // Open blocks past the depth limit, tracked only to pair their %endif.
    let mut overflow = 0usize;
    let text_end = unit.text().len();
    for line in unit.lines() {
        match &line.kind {
            LineKind::If { .. } | LineKind::Ifdef { .. }
                if overflow > 0 || stack.len() >= BLOCK_DEPTH_LIMIT =>
            {
                if overflow == 0 {
                    warnings.push(BranchWarning {
                        line: line.number,
                        message: "Conditional nesting too deep; block ignored".to_string(),
                    });
                }
                overflow += 1;
            }
            LineKind::Elif { .. } | LineKind::Elifdef { .. } | LineKind::Else
                if overflow > 0 => {}
            LineKind::Endif if overflow > 0 => overflow -= 1,
            LineKind::If { condition } => {
                stack.push(RawBlock {
                    branches: vec![RawBranch {
                        kind: BranchKind::If,
                        cond: Condition::Expr(condition.clone()),
                        body: Span::new(line.span.end, text_end),
                        nested: Vec::new(),
                    }],
                    open_line: line.number,
                });
            }
            LineKind::Ifdef { negated, name } => {
                stack.push(RawBlock {
                    branches: vec![RawBranch {
                        kind: BranchKind::If,
                        cond: Condition::Defined {
                            negated: *negated,
                            name: name.clone(),
                        },
                        body: Span::new(line.span.end, text_end),
                        nested: Vec::new(),
                    }],
                    open_line: line.number,
                });
            }
            LineKind::Elif { condition } => add_branch(
                &mut stack,
                BranchKind::Elif,
                Condition::Expr(condition.clone()),
                line.span,
                text_end,
            ),
            LineKind::Elifdef { negated, name } => add_branch(
                &mut stack,
                BranchKind::Elif,
                Condition::Defined {
                    negated: *negated,
                    name: name.clone(),
                },
                line.span,
                text_end,
            ),
            LineKind::Else => {
                add_branch(&mut stack, BranchKind::Else, Condition::Else, line.span, text_end)
            }
            LineKind::Endif => {
                let Some(mut block) = stack.pop() else {
                    // Stray %endif.
                    continue;
                };
                if let Some(last) = block.branches.last_mut() {
                    last.body.end = line.span.start;
                }
                match stack.last_mut() {
                    Some(parent) => {
                        if let Some(owner) = parent.branches.last_mut() {
                            owner.nested.push(block);
                        }
                    }
                    None => roots.push(block),
                }
            }
            _ => {}
        }
    }
    // Whatever is still open never saw its %endif: no records, and the
    // nested blocks it swallowed are suppressed with it.
    warnings.extend(stack.iter().map(|block| BranchWarning {
        line: block.open_line,
        message: "Unterminated conditional block; missing %endif".to_string(),
    }));
    (roots, warnings)
}

fn add_branch(
    stack: &mut Vec<RawBlock>,
    kind: BranchKind,
    cond: Condition,
    directive: Span,
    text_end: usize,
) {
    // Stray sibling directives outside any block are ignored.
    let Some(block) = stack.last_mut() else {
        return;
    };
    if let Some(prev) = block.branches.last_mut() {
        prev.body.end = directive.start;
    }
    block.branches.push(RawBranch {
        kind,
        cond,
        body: Span::new(directive.end, text_end),
        nested: Vec::new(),
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BranchStatus {
    Active,
    Inactive,
    Unknown,
}

fn eval_block(
    block: &RawBlock,
    scope: &dyn EvalScope,
    overrides: &MacroOverrides,
    out: &mut Vec<ConditionalBranch>,
    next_id: &mut usize,
) {
    let block_id = *next_id;
    *next_id += 1;
    let mut temp = Vec::new();
    let mut took_branch = false;
    let mut aborted = false;
    for branch in &block.branches {
        let status = if aborted {
            BranchStatus::Unknown
        } else {
            decide(branch, took_branch, scope, overrides)
        };
        match status {
            BranchStatus::Active => {
                took_branch = true;
                temp.push(ConditionalBranch {
                    kind: branch.kind,
                    range: branch.body,
                    is_active: true,
                    block_id,
                });
            }
            BranchStatus::Inactive => temp.push(ConditionalBranch {
                kind: branch.kind,
                range: branch.body,
                is_active: false,
                block_id,
            }),
            BranchStatus::Unknown => {
                aborted = true;
                temp.clear();
            }
        }
        // Blocks under a decidably-inactive arm are dead; everything
        // else is evaluated independently and keeps its records even if
        // this block aborts.
        if status != BranchStatus::Inactive {
            for nested in &branch.nested {
                eval_block(nested, scope, overrides, out, next_id);
            }
        }
    }
    if !aborted {
        out.append(&mut temp);
    }
}

fn decide(
    branch: &RawBranch,
    took_branch: bool,
    scope: &dyn EvalScope,
    overrides: &MacroOverrides,
) -> BranchStatus {
    match &branch.cond {
        Condition::Else => {
            if took_branch {
                BranchStatus::Inactive
            } else {
                BranchStatus::Active
            }
        }
        Condition::Defined { negated, name } => {
            if took_branch {
                return BranchStatus::Inactive;
            }
            let defined = overrides.contains(name)
                || scope.is_defined(name, ScopeQuery { in_condition: true });
            if defined != *negated {
                BranchStatus::Active
            } else {
                BranchStatus::Inactive
            }
        }
        Condition::Expr(text) => {
            if took_branch {
                return BranchStatus::Inactive;
            }
            match evaluate_text(text, scope, Some(overrides)) {
                EvalResult::Value(v) => {
                    if v != 0 {
                        BranchStatus::Active
                    } else {
                        BranchStatus::Inactive
                    }
                }
                EvalResult::NotConstant | EvalResult::Error(_) => BranchStatus::Unknown,
            }
        }
    }
}

/// Single-slot cache keyed by the unit's revision stamp. Computation
/// happens outside the lock; installs of stale revisions are discarded.
#[derive(Debug, Default)]
pub struct BranchCache {
    slot: Mutex<Option<(u64, Arc<[ConditionalBranch]>)>>,
}

impl BranchCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, revision: u64) -> Option<Arc<[ConditionalBranch]>> {
        let slot = match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match slot.as_ref() {
            Some((rev, list)) if *rev == revision => Some(Arc::clone(list)),
            _ => None,
        }
    }

    pub fn install(&self, revision: u64, list: Arc<[ConditionalBranch]>) {
        let mut slot = match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let fresh = match slot.as_ref() {
            Some((rev, _)) => *rev < revision,
            None => true,
        };
        if fresh {
            *slot = Some((revision, list));
        }
    }
}
