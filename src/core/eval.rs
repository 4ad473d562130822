// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Constant-expression evaluation.
//!
//! Reduces an `ExprNode` tree to a three-way result: a 64-bit value, "not
//! constant at assembly time", or an error message. Symbol references go
//! through the [`EvalScope`] seam, which also supplies the re-parse hook
//! for macro bodies and expanded macro calls. The evaluation context
//! (cycle guard, condition flag, depth counter) lives in a per-call value,
//! never in global state.

use std::collections::HashSet;

use crate::core::expr::{parse_expression, BinaryOp, ExprNode, UnaryOp};
use crate::core::macros::substitute_params;
use crate::core::number::{parse_number, parse_string_literal};
use crate::core::overrides::MacroOverrides;
use crate::core::symbols::{Definition, SymbolKind};
use crate::core::tokenizer::{TokenKind, Tokenizer};

/// Result of constant evaluation. `NotConstant` is silent; `Error` carries
/// a message that may surface as a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalResult {
    Value(i64),
    NotConstant,
    Error(String),
}

/// Per-lookup context passed to scope queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeQuery {
    /// Set while a conditional-branch condition is being resolved. Scope
    /// implementations must skip inactive-branch filtering when this is
    /// set, or condition evaluation and the inactive query recurse into
    /// each other.
    pub in_condition: bool,
}

/// Symbol resolution and re-parsing as seen by the evaluator.
pub trait EvalScope {
    /// Resolve a name to its definition, or `None` for unknown names.
    fn resolve(&self, name: &str, query: ScopeQuery) -> Option<Definition>;

    /// Resolve a name to a parameterized single-line macro for a
    /// function-style call.
    fn resolve_callable(&self, name: &str, query: ScopeQuery) -> Option<Definition> {
        self.resolve(name, query)
            .filter(|def| def.kind == SymbolKind::Define && def.params.is_some())
    }

    /// Definedness as `%ifdef` sees it. Command-line overrides are the
    /// caller's concern.
    fn is_defined(&self, name: &str, query: ScopeQuery) -> bool {
        matches!(
            self.resolve(name, query),
            Some(def) if matches!(
                def.kind,
                SymbolKind::Equ | SymbolKind::Define | SymbolKind::Assign | SymbolKind::Macro
            )
        )
    }

    /// Re-parse hook for macro bodies and expanded call text.
    fn parse_standalone_expression(&self, text: &str) -> Option<ExprNode> {
        parse_expression(text)
    }
}

/// Closure-backed scope for tests and scopeless evaluation.
pub struct SimpleScope<F>
where
    F: Fn(&str) -> Option<Definition>,
{
    lookup: F,
}

impl<F> SimpleScope<F>
where
    F: Fn(&str) -> Option<Definition>,
{
    pub fn new(lookup: F) -> Self {
        Self { lookup }
    }
}

impl<F> EvalScope for SimpleScope<F>
where
    F: Fn(&str) -> Option<Definition>,
{
    fn resolve(&self, name: &str, _query: ScopeQuery) -> Option<Definition> {
        (self.lookup)(name)
    }
}

/// Recursion bound across symbol chains, macro bodies and re-parsed call
/// expansions. Self-recursive function macros re-enter through fresh parse
/// trees the cycle guard cannot see, so depth is the backstop.
const EVAL_DEPTH_LIMIT: usize = 64;

/// Evaluate parsed expression text against a scope.
///
/// Supplying an override store puts the whole evaluation in condition
/// mode: override values shadow symbol resolution and scope queries carry
/// `in_condition`.
pub fn evaluate_constant_expression(
    node: &ExprNode,
    scope: &dyn EvalScope,
    overrides: Option<&MacroOverrides>,
) -> EvalResult {
    Evaluator::new(scope, overrides).eval_node(node)
}

/// Convenience entry: parse `text` through the scope's re-parse hook and
/// evaluate it. Unparseable text is not constant.
pub fn evaluate_text(
    text: &str,
    scope: &dyn EvalScope,
    overrides: Option<&MacroOverrides>,
) -> EvalResult {
    match scope.parse_standalone_expression(text) {
        Some(node) => evaluate_constant_expression(&node, scope, overrides),
        None => EvalResult::NotConstant,
    }
}

struct Evaluator<'a> {
    scope: &'a dyn EvalScope,
    overrides: Option<&'a MacroOverrides>,
    in_condition: bool,
    visiting: HashSet<String>,
    depth: usize,
}

impl<'a> Evaluator<'a> {
    fn new(scope: &'a dyn EvalScope, overrides: Option<&'a MacroOverrides>) -> Self {
        Self {
            scope,
            overrides,
            in_condition: overrides.is_some(),
            visiting: HashSet::new(),
            depth: 0,
        }
    }

    fn query(&self) -> ScopeQuery {
        ScopeQuery {
            in_condition: self.in_condition,
        }
    }

    fn eval_node(&mut self, node: &ExprNode) -> EvalResult {
        if self.depth >= EVAL_DEPTH_LIMIT {
            return EvalResult::Error("Evaluation failed: expression nesting too deep".to_string());
        }
        self.depth += 1;
        let result = self.eval_node_inner(node);
        self.depth -= 1;
        result
    }

    fn eval_node_inner(&mut self, node: &ExprNode) -> EvalResult {
        match node {
            ExprNode::Number(text) => match parse_number(text) {
                Ok(value) => EvalResult::Value(value),
                Err(message) => EvalResult::Error(message),
            },
            ExprNode::Str(text) => match parse_string_literal(text) {
                Ok(value) => EvalResult::Value(value),
                Err(message) => EvalResult::Error(message),
            },
            ExprNode::Paren(inner) => self.eval_node(inner),
            ExprNode::Opaque => EvalResult::NotConstant,
            ExprNode::Unary { op, operand } => {
                let operand = self.eval_node(operand);
                apply_unary(*op, operand)
            }
            ExprNode::Binary { op, left, right } => {
                // Both sides are always evaluated; with two failures the
                // left error is reported.
                let left = self.eval_node(left);
                let right = self.eval_node(right);
                match (left, right) {
                    (EvalResult::Value(l), EvalResult::Value(r)) => apply_binary(*op, l, r),
                    (EvalResult::Error(message), _) => EvalResult::Error(message),
                    (_, EvalResult::Error(message)) => EvalResult::Error(message),
                    _ => EvalResult::NotConstant,
                }
            }
            ExprNode::Symbol(name) => self.eval_symbol(name),
            ExprNode::Call { name, args } => self.eval_call(name, args),
        }
    }

    fn eval_symbol(&mut self, name: &str) -> EvalResult {
        if let Some(store) = self.overrides {
            if let Some(value) = store.numeric_value(name) {
                return EvalResult::Value(value);
            }
        }
        if self.visiting.contains(name) {
            return EvalResult::Error(format!("Circular reference detected: {name}"));
        }
        let Some(def) = self.scope.resolve(name, self.query()) else {
            return EvalResult::NotConstant;
        };
        self.visiting.insert(name.to_string());
        let result = self.eval_definition(&def);
        self.visiting.remove(name);
        result
    }

    fn eval_definition(&mut self, def: &Definition) -> EvalResult {
        match def.kind {
            SymbolKind::Equ | SymbolKind::Assign => self.eval_body_expression(def),
            SymbolKind::Define => {
                if def.params.is_some() {
                    // A function-like macro referenced without arguments
                    // has no constant value.
                    EvalResult::NotConstant
                } else {
                    self.eval_define_body(def)
                }
            }
            SymbolKind::Macro
            | SymbolKind::Label
            | SymbolKind::LocalLabel
            | SymbolKind::MacroLocalLabel
            | SymbolKind::Extern
            | SymbolKind::Global => EvalResult::NotConstant,
        }
    }

    fn eval_body_expression(&mut self, def: &Definition) -> EvalResult {
        let Some(body) = def.body.as_deref() else {
            return EvalResult::NotConstant;
        };
        match self.scope.parse_standalone_expression(body) {
            Some(node) => self.eval_node(&node),
            None => EvalResult::NotConstant,
        }
    }

    /// `%define` replacement text. Single-token bodies skip the re-parse:
    /// a number parses directly, an identifier resolves as a symbol.
    fn eval_define_body(&mut self, def: &Definition) -> EvalResult {
        let Some(body) = def.body.as_deref().map(str::trim) else {
            return EvalResult::NotConstant;
        };
        if body.is_empty() {
            return EvalResult::NotConstant;
        }
        let tokens = Tokenizer::tokenize(body);
        if tokens.len() == 2 {
            match &tokens[0].kind {
                TokenKind::Number(text) => {
                    return match parse_number(text) {
                        Ok(value) => EvalResult::Value(value),
                        Err(message) => EvalResult::Error(message),
                    };
                }
                TokenKind::Ident(name) => {
                    let name = name.clone();
                    return self.eval_symbol(&name);
                }
                _ => {}
            }
        }
        match self.scope.parse_standalone_expression(body) {
            Some(node) => self.eval_node(&node),
            None => EvalResult::NotConstant,
        }
    }

    fn eval_call(&mut self, name: &str, args: &[String]) -> EvalResult {
        let Some(def) = self.scope.resolve_callable(name, self.query()) else {
            return EvalResult::NotConstant;
        };
        let Some(params) = def.params.as_ref() else {
            return EvalResult::NotConstant;
        };
        if args.len() != params.len() {
            return EvalResult::Error(format!(
                "Macro function {name} expects {} arguments, got {}",
                params.len(),
                args.len()
            ));
        }
        let Some(body) = def.body.as_deref() else {
            return EvalResult::NotConstant;
        };
        let expanded = substitute_params(body.trim(), params, args);
        match self.scope.parse_standalone_expression(&expanded) {
            Some(node) => self.eval_node(&node),
            None => EvalResult::NotConstant,
        }
    }
}

/// Apply a unary operator. Non-value operands pass through unchanged.
pub fn apply_unary(op: UnaryOp, operand: EvalResult) -> EvalResult {
    let EvalResult::Value(v) = operand else {
        return operand;
    };
    match op {
        UnaryOp::Plus => EvalResult::Value(v),
        UnaryOp::Minus => EvalResult::Value(v.wrapping_neg()),
        UnaryOp::BitNot => EvalResult::Value(!v),
        UnaryOp::LogicNot => EvalResult::Value(if v == 0 { 1 } else { 0 }),
        // Segment bases are a link-time property.
        UnaryOp::Seg => EvalResult::NotConstant,
    }
}

/// Apply a binary operator to two values. Arithmetic wraps; division and
/// remainder by zero are reported, `i64::MIN / -1` wraps.
pub fn apply_binary(op: BinaryOp, left: i64, right: i64) -> EvalResult {
    let value = match op {
        BinaryOp::Add => left.wrapping_add(right),
        BinaryOp::Sub => left.wrapping_sub(right),
        BinaryOp::Mul => left.wrapping_mul(right),
        BinaryOp::Div | BinaryOp::SignedDiv => {
            if right == 0 {
                return EvalResult::Error("Division by zero".to_string());
            }
            left.wrapping_div(right)
        }
        BinaryOp::Mod | BinaryOp::SignedMod => {
            if right == 0 {
                return EvalResult::Error("Division by zero".to_string());
            }
            left.wrapping_rem(right)
        }
        BinaryOp::Shl | BinaryOp::ShlWide => left.wrapping_shl(shift_count(right)),
        BinaryOp::Shr | BinaryOp::ShrWide => {
            ((left as u64).wrapping_shr(shift_count(right))) as i64
        }
        BinaryOp::Eq => (left == right) as i64,
        BinaryOp::Ne => (left != right) as i64,
        BinaryOp::Lt => (left < right) as i64,
        BinaryOp::Le => (left <= right) as i64,
        BinaryOp::Gt => (left > right) as i64,
        BinaryOp::Ge => (left >= right) as i64,
        BinaryOp::Spaceship => match left.cmp(&right) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => 1,
        },
        BinaryOp::BitAnd => left & right,
        BinaryOp::BitOr => left | right,
        BinaryOp::BitXor => left ^ right,
        BinaryOp::LogicAnd => (left != 0 && right != 0) as i64,
        BinaryOp::LogicOr => (left != 0 || right != 0) as i64,
        BinaryOp::LogicXor => ((left != 0) != (right != 0)) as i64,
        // Token pasting needs the preprocessor's token stream.
        BinaryOp::Paste => return EvalResult::NotConstant,
    };
    EvalResult::Value(value)
}

/// Shift counts truncate to 32 bits, then the low 6 bits apply.
fn shift_count(count: i64) -> u32 {
    (count as u32) & 0x3f
}
