// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Per-file analysis state.
//!
//! [`FileAnalysis`] owns one source unit, its scanned symbol table, the
//! command-line override store and the branch cache, and implements
//! [`EvalScope`] over them. Ordinary lookups filter out definitions that
//! sit inside inactive conditional branches; lookups made while a branch
//! condition is being resolved skip that filter, which is what keeps the
//! two from recursing into each other.

use std::sync::Arc;

use crate::core::branches::{
    block_warnings, compute_branches, BranchCache, BranchWarning, ConditionalBranch,
};
use crate::core::eval::{
    evaluate_constant_expression, evaluate_text, EvalResult, EvalScope, ScopeQuery,
};
use crate::core::expr::ExprNode;
use crate::core::overrides::MacroOverrides;
use crate::core::source::SourceUnit;
use crate::core::symbols::{Definition, SymbolTable};

pub struct FileAnalysis {
    unit: SourceUnit,
    table: SymbolTable,
    overrides: MacroOverrides,
    branch_cache: BranchCache,
}

impl FileAnalysis {
    pub fn new(name: impl Into<String>, text: &str, overrides: MacroOverrides) -> Self {
        let unit = SourceUnit::new(name, text, 0);
        let table = SymbolTable::scan(&unit);
        Self {
            unit,
            table,
            overrides,
            branch_cache: BranchCache::new(),
        }
    }

    pub fn unit(&self) -> &SourceUnit {
        &self.unit
    }

    pub fn overrides(&self) -> &MacroOverrides {
        &self.overrides
    }

    pub fn definitions(&self) -> &[Definition] {
        self.table.definitions()
    }

    /// Replace the text, bump the revision and rescan. The branch cache
    /// keys on the revision, so stale entries fall out on their own.
    pub fn set_text(&mut self, text: &str) {
        let revision = self.unit.revision().wrapping_add(1);
        self.unit = SourceUnit::new(self.unit.name().to_string(), text, revision);
        self.table = SymbolTable::scan(&self.unit);
    }

    /// Evaluate expression text in ordinary mode: definitions inside
    /// inactive branches do not resolve.
    pub fn evaluate_text(&self, text: &str) -> EvalResult {
        evaluate_text(text, self, None)
    }

    pub fn evaluate_expression(&self, node: &ExprNode) -> EvalResult {
        evaluate_constant_expression(node, self, None)
    }

    /// Evaluate expression text the way a branch condition is evaluated:
    /// override values shadow the table and no activity filtering applies.
    pub fn evaluate_condition(&self, text: &str) -> EvalResult {
        evaluate_text(text, self, Some(&self.overrides))
    }

    /// The unit's conditional-branch records, computed on first use per
    /// revision. Computation runs outside the cache lock.
    pub fn conditional_branches(&self) -> Arc<[ConditionalBranch]> {
        let revision = self.unit.revision();
        if let Some(list) = self.branch_cache.get(revision) {
            return list;
        }
        let (list, _) = compute_branches(&self.unit, self, &self.overrides);
        let list: Arc<[ConditionalBranch]> = Arc::from(list.into_boxed_slice());
        self.branch_cache.install(revision, Arc::clone(&list));
        list
    }

    pub fn block_warnings(&self) -> Vec<BranchWarning> {
        block_warnings(&self.unit)
    }

    /// Whether a byte offset sits in the body of a decidably-inactive
    /// branch. Offsets on the directive lines themselves do not count.
    pub fn is_position_in_inactive_branch(&self, offset: usize) -> bool {
        self.conditional_branches()
            .iter()
            .any(|branch| !branch.is_active && branch.range.contains(offset))
    }
}

impl EvalScope for FileAnalysis {
    fn resolve(&self, name: &str, query: ScopeQuery) -> Option<Definition> {
        if query.in_condition {
            self.table.resolve(name, |_| true).cloned()
        } else {
            self.table
                .resolve(name, |def| {
                    !self.is_position_in_inactive_branch(def.span.start)
                })
                .cloned()
        }
    }

    fn resolve_callable(&self, name: &str, query: ScopeQuery) -> Option<Definition> {
        if query.in_condition {
            self.table.resolve_define_fn(name, |_| true).cloned()
        } else {
            self.table
                .resolve_define_fn(name, |def| {
                    !self.is_position_in_inactive_branch(def.span.start)
                })
                .cloned()
        }
    }

    // Definedness bypasses the ordered lookup so a label sharing a macro's
    // name cannot hide it from `%ifdef`.
    fn is_defined(&self, name: &str, query: ScopeQuery) -> bool {
        if query.in_condition {
            self.table.is_name_defined(name, |_| true)
        } else {
            self.table.is_name_defined(name, |def| {
                !self.is_position_in_inactive_branch(def.span.start)
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(src: &str) -> FileAnalysis {
        FileAnalysis::new("t.asm", src, MacroOverrides::new())
    }

    fn analysis_with(src: &str, defines: &[&str]) -> FileAnalysis {
        let overrides = MacroOverrides::from_entries(defines.iter().copied()).unwrap();
        FileAnalysis::new("t.asm", src, overrides)
    }

    #[test]
    fn evaluates_file_constants() {
        let fa = analysis("WIDTH equ 8\nHEIGHT equ WIDTH * 2\n");
        assert_eq!(fa.evaluate_text("HEIGHT + 1"), EvalResult::Value(17));
        assert_eq!(fa.evaluate_text("missing"), EvalResult::NotConstant);
    }

    #[test]
    fn inactive_definitions_do_not_resolve() {
        let src = "\
%ifdef WIDE
COLS equ 132
%else
COLS equ 80
%endif
";
        let fa = analysis(src);
        assert_eq!(fa.evaluate_text("COLS"), EvalResult::Value(80));
        let fa = analysis_with(src, &["WIDE"]);
        assert_eq!(fa.evaluate_text("COLS"), EvalResult::Value(132));
    }

    #[test]
    fn condition_mode_sees_override_values() {
        let fa = analysis_with("", &["LEVEL=3"]);
        assert_eq!(fa.evaluate_condition("LEVEL >= 2"), EvalResult::Value(1));
        // Ordinary mode does not look at overrides.
        assert_eq!(fa.evaluate_text("LEVEL >= 2"), EvalResult::NotConstant);
    }

    #[test]
    fn inactive_position_queries() {
        let src = "\
%ifdef NEVER
dead
%else
alive
%endif
";
        let fa = analysis(src);
        let dead = src.find("dead").unwrap();
        let alive = src.find("alive").unwrap();
        assert!(fa.is_position_in_inactive_branch(dead));
        assert!(!fa.is_position_in_inactive_branch(alive));
        assert!(!fa.is_position_in_inactive_branch(0));
    }

    #[test]
    fn branch_list_is_cached_per_revision() {
        let mut fa = analysis("%if 1\na\n%endif\n");
        let first = fa.conditional_branches();
        let again = fa.conditional_branches();
        assert!(Arc::ptr_eq(&first, &again));

        fa.set_text("%if 0\na\n%endif\n");
        let fresh = fa.conditional_branches();
        assert!(!Arc::ptr_eq(&first, &fresh));
        assert!(!fresh[0].is_active);
    }

    #[test]
    fn set_text_rescans_symbols() {
        let mut fa = analysis("A equ 1\n");
        assert_eq!(fa.evaluate_text("A"), EvalResult::Value(1));
        fa.set_text("A equ 2\n");
        assert_eq!(fa.evaluate_text("A"), EvalResult::Value(2));
        assert_eq!(fa.unit().revision(), 1);
    }

    #[test]
    fn conditions_resolve_names_across_inactive_regions() {
        // DEEP is defined inside a branch whose condition depends on
        // DEEP's own region; the condition query must not filter, or the
        // two computations would chase each other.
        let src = "\
%ifdef FLAG
DEEP equ 1
%endif
%if DEEP
x
%endif
";
        let fa = analysis_with(src, &["FLAG"]);
        let list = fa.conditional_branches();
        assert_eq!(list.len(), 2);
        assert!(list.iter().all(|b| b.is_active));
    }

    #[test]
    fn function_macros_respect_activity() {
        let src = "\
%ifdef FAST
%define SCALE(x) ((x) * 4)
%else
%define SCALE(x) ((x) * 2)
%endif
";
        let fa = analysis(src);
        assert_eq!(fa.evaluate_text("SCALE(10)"), EvalResult::Value(20));
        let fa = analysis_with(src, &["FAST"]);
        assert_eq!(fa.evaluate_text("SCALE(10)"), EvalResult::Value(40));
    }

    #[test]
    fn labels_mask_values_but_not_definedness() {
        let src = "\
%define ready 1
ready:
%ifdef ready
GO equ 5
%endif
";
        let fa = analysis(src);
        // Value lookup reaches the label, which has no compile-time value.
        assert_eq!(fa.evaluate_text("ready"), EvalResult::NotConstant);
        // `%ifdef` still sees the single-line macro behind it.
        assert_eq!(fa.evaluate_text("GO"), EvalResult::Value(5));
    }

    #[test]
    fn unterminated_blocks_surface_as_warnings() {
        let fa = analysis("%if 1\na\n");
        let warnings = fa.block_warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].line, 1);
        assert!(fa.conditional_branches().is_empty());
    }
}
