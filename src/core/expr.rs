// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Expression tree and the structurer that builds it.
//!
//! The tokenizer's flat list is folded into an `ExprNode` tree using the
//! NASM precedence table. Splitting scans precedence groups from lowest to
//! highest and splits at the right-most matching operator, which yields
//! left-associative grouping. A leading unary operator binds the whole
//! remaining list, and is checked before any binary split.

use crate::core::tokenizer::{OpToken, Token, TokenKind, Tokenizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    BitNot,
    LogicNot,
    Seg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    LogicOr,
    LogicXor,
    LogicAnd,
    BitOr,
    BitXor,
    BitAnd,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Spaceship,
    Shl,
    ShlWide,
    Shr,
    ShrWide,
    Add,
    Sub,
    Mul,
    Div,
    SignedDiv,
    Mod,
    SignedMod,
    Paste,
}

/// Immutable expression tree. `Call` arguments keep their raw source text;
/// they are substituted into macro bodies and re-parsed, never evaluated
/// in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprNode {
    Number(String),
    Str(String),
    Symbol(String),
    Unary {
        op: UnaryOp,
        operand: Box<ExprNode>,
    },
    Binary {
        op: BinaryOp,
        left: Box<ExprNode>,
        right: Box<ExprNode>,
    },
    Paren(Box<ExprNode>),
    Call {
        name: String,
        args: Vec<String>,
    },
    /// Token sequence with no constant interpretation (empty operand,
    /// stray operator). Always evaluates to not-constant.
    Opaque,
}

/// Binary precedence groups, lowest first. The structurer splits at the
/// first group that matches anywhere in the list.
const BINARY_GROUPS: &[&[BinaryOp]] = &[
    &[BinaryOp::LogicOr],
    &[BinaryOp::LogicXor],
    &[BinaryOp::LogicAnd],
    &[BinaryOp::BitOr],
    &[BinaryOp::BitXor],
    &[BinaryOp::BitAnd],
    &[
        BinaryOp::Eq,
        BinaryOp::Ne,
        BinaryOp::Lt,
        BinaryOp::Le,
        BinaryOp::Gt,
        BinaryOp::Ge,
        BinaryOp::Spaceship,
    ],
    &[BinaryOp::Shl, BinaryOp::ShlWide, BinaryOp::Shr, BinaryOp::ShrWide],
    &[BinaryOp::Add, BinaryOp::Sub],
    &[
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::SignedDiv,
        BinaryOp::Mod,
        BinaryOp::SignedMod,
    ],
    &[BinaryOp::Paste],
];

/// Recursion bound for the structurer, matching the evaluator's depth
/// limit. Every tree built here stays shallow enough to walk and to drop
/// without exhausting the stack.
const STRUCTURE_DEPTH_LIMIT: usize = 64;

/// Parse standalone expression text. `None` means the text has no
/// expression reading (empty, unbalanced parens, stray comma, paren
/// nesting past the depth limit).
pub fn parse_expression(text: &str) -> Option<ExprNode> {
    let tokens = Tokenizer::tokenize(text);
    let mut pos = 0;
    let items = nest(&tokens, text, &mut pos, false, 0)?;
    if items.is_empty() {
        return None;
    }
    Some(fold(&items, 0))
}

/// One entry of the flat sibling list after paren nesting and call
/// recognition.
enum Item {
    Num(String),
    Str(String),
    Ident(String),
    Op(OpToken),
    Group(Vec<Item>),
    Call { name: String, args: Vec<String> },
}

fn nest(
    tokens: &[Token],
    text: &str,
    pos: &mut usize,
    in_group: bool,
    depth: usize,
) -> Option<Vec<Item>> {
    if depth >= STRUCTURE_DEPTH_LIMIT {
        return None;
    }
    let mut items = Vec::new();
    loop {
        match &tokens[*pos].kind {
            TokenKind::End => {
                return if in_group { None } else { Some(items) };
            }
            TokenKind::RParen => {
                if in_group {
                    *pos += 1;
                    return Some(items);
                }
                return None;
            }
            TokenKind::LParen => {
                *pos += 1;
                items.push(Item::Group(nest(tokens, text, pos, true, depth + 1)?));
            }
            TokenKind::Comma => return None,
            TokenKind::Ident(name) => {
                let next = &tokens[*pos + 1];
                if next.kind == TokenKind::LParen && !next.space_before {
                    let name = name.clone();
                    *pos += 2;
                    items.push(Item::Call {
                        name,
                        args: collect_args(tokens, text, pos)?,
                    });
                } else {
                    items.push(Item::Ident(name.clone()));
                    *pos += 1;
                }
            }
            TokenKind::Number(t) => {
                items.push(Item::Num(t.clone()));
                *pos += 1;
            }
            TokenKind::Str(t) => {
                items.push(Item::Str(t.clone()));
                *pos += 1;
            }
            TokenKind::Op(op) => {
                items.push(Item::Op(*op));
                *pos += 1;
            }
        }
    }
}

/// Collect call arguments as raw text slices, splitting on commas at the
/// call's own nesting level. `pos` starts just past the opening paren and
/// ends just past the matching close.
fn collect_args(tokens: &[Token], text: &str, pos: &mut usize) -> Option<Vec<String>> {
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut seg: Option<(usize, usize)> = None;
    loop {
        let tok = &tokens[*pos];
        match &tok.kind {
            TokenKind::End => return None,
            TokenKind::RParen if depth == 0 => {
                *pos += 1;
                if seg.is_some() || !args.is_empty() {
                    args.push(arg_text(text, seg));
                }
                return Some(args);
            }
            TokenKind::Comma if depth == 0 => {
                args.push(arg_text(text, seg));
                seg = None;
                *pos += 1;
            }
            kind => {
                match kind {
                    TokenKind::LParen => depth += 1,
                    TokenKind::RParen => depth -= 1,
                    _ => {}
                }
                seg = Some(match seg {
                    None => (tok.span.start, tok.span.end),
                    Some((start, _)) => (start, tok.span.end),
                });
                *pos += 1;
            }
        }
    }
}

fn arg_text(text: &str, seg: Option<(usize, usize)>) -> String {
    match seg {
        Some((start, end)) => text[start..end].trim().to_string(),
        None => String::new(),
    }
}

fn fold(items: &[Item], depth: usize) -> ExprNode {
    if depth >= STRUCTURE_DEPTH_LIMIT {
        // Long operator chains split one operand per level; past the
        // bound the remainder has no constant interpretation.
        return ExprNode::Opaque;
    }
    if items.is_empty() {
        return ExprNode::Opaque;
    }
    if items.len() == 1 {
        return fold_single(&items[0], depth);
    }
    if let Some(op) = leading_unary(&items[0]) {
        return ExprNode::Unary {
            op,
            operand: Box::new(fold(&items[1..], depth + 1)),
        };
    }
    for group in BINARY_GROUPS {
        let mut split = None;
        for (index, item) in items.iter().enumerate() {
            if index == 0 {
                continue;
            }
            if let Item::Op(tok) = item {
                if let Some(op) = binary_op(*tok) {
                    if group.contains(&op) {
                        split = Some((index, op));
                    }
                }
            }
        }
        if let Some((index, op)) = split {
            return ExprNode::Binary {
                op,
                left: Box::new(fold(&items[..index], depth + 1)),
                right: Box::new(fold(&items[index + 1..], depth + 1)),
            };
        }
    }
    fold_single(&items[0], depth)
}

fn fold_single(item: &Item, depth: usize) -> ExprNode {
    match item {
        Item::Num(t) => ExprNode::Number(t.clone()),
        Item::Str(t) => ExprNode::Str(t.clone()),
        Item::Ident(n) => ExprNode::Symbol(n.clone()),
        Item::Op(_) => ExprNode::Opaque,
        Item::Group(inner) => ExprNode::Paren(Box::new(fold(inner, depth + 1))),
        Item::Call { name, args } => ExprNode::Call {
            name: name.clone(),
            args: args.clone(),
        },
    }
}

fn leading_unary(item: &Item) -> Option<UnaryOp> {
    match item {
        Item::Op(OpToken::Plus) => Some(UnaryOp::Plus),
        Item::Op(OpToken::Minus) => Some(UnaryOp::Minus),
        Item::Op(OpToken::Tilde) => Some(UnaryOp::BitNot),
        Item::Op(OpToken::Exclaim) => Some(UnaryOp::LogicNot),
        Item::Ident(name) if name.eq_ignore_ascii_case("seg") => Some(UnaryOp::Seg),
        _ => None,
    }
}

fn binary_op(tok: OpToken) -> Option<BinaryOp> {
    match tok {
        OpToken::LogicOr => Some(BinaryOp::LogicOr),
        OpToken::LogicXor => Some(BinaryOp::LogicXor),
        OpToken::LogicAnd => Some(BinaryOp::LogicAnd),
        OpToken::BitOr => Some(BinaryOp::BitOr),
        OpToken::BitXor => Some(BinaryOp::BitXor),
        OpToken::BitAnd => Some(BinaryOp::BitAnd),
        OpToken::EqEq => Some(BinaryOp::Eq),
        OpToken::NotEq | OpToken::NotEqAlt => Some(BinaryOp::Ne),
        OpToken::Lt => Some(BinaryOp::Lt),
        OpToken::Le => Some(BinaryOp::Le),
        OpToken::Gt => Some(BinaryOp::Gt),
        OpToken::Ge => Some(BinaryOp::Ge),
        OpToken::Spaceship => Some(BinaryOp::Spaceship),
        OpToken::Shl => Some(BinaryOp::Shl),
        OpToken::ShlWide => Some(BinaryOp::ShlWide),
        OpToken::Shr => Some(BinaryOp::Shr),
        OpToken::ShrWide => Some(BinaryOp::ShrWide),
        OpToken::Plus => Some(BinaryOp::Add),
        OpToken::Minus => Some(BinaryOp::Sub),
        OpToken::Mul => Some(BinaryOp::Mul),
        OpToken::Div => Some(BinaryOp::Div),
        OpToken::SignedDiv => Some(BinaryOp::SignedDiv),
        OpToken::Mod => Some(BinaryOp::Mod),
        OpToken::SignedMod => Some(BinaryOp::SignedMod),
        OpToken::Paste => Some(BinaryOp::Paste),
        OpToken::Tilde | OpToken::Exclaim => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(t: &str) -> ExprNode {
        ExprNode::Number(t.to_string())
    }

    fn tree_depth(node: &ExprNode) -> usize {
        match node {
            ExprNode::Unary { operand, .. } => 1 + tree_depth(operand),
            ExprNode::Binary { left, right, .. } => 1 + tree_depth(left).max(tree_depth(right)),
            ExprNode::Paren(inner) => 1 + tree_depth(inner),
            _ => 1,
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(
            parse_expression("2 + 3 * 4"),
            Some(ExprNode::Binary {
                op: BinaryOp::Add,
                left: Box::new(num("2")),
                right: Box::new(ExprNode::Binary {
                    op: BinaryOp::Mul,
                    left: Box::new(num("3")),
                    right: Box::new(num("4")),
                }),
            })
        );
    }

    #[test]
    fn parens_override_precedence() {
        assert_eq!(
            parse_expression("(2+3)*4"),
            Some(ExprNode::Binary {
                op: BinaryOp::Mul,
                left: Box::new(ExprNode::Paren(Box::new(ExprNode::Binary {
                    op: BinaryOp::Add,
                    left: Box::new(num("2")),
                    right: Box::new(num("3")),
                }))),
                right: Box::new(num("4")),
            })
        );
    }

    #[test]
    fn addition_binds_tighter_than_shift() {
        assert_eq!(
            parse_expression("1 << 2 + 2"),
            Some(ExprNode::Binary {
                op: BinaryOp::Shl,
                left: Box::new(num("1")),
                right: Box::new(ExprNode::Binary {
                    op: BinaryOp::Add,
                    left: Box::new(num("2")),
                    right: Box::new(num("2")),
                }),
            })
        );
    }

    #[test]
    fn rightmost_split_gives_left_associativity() {
        // 10 - 3 - 2 must read (10 - 3) - 2.
        assert_eq!(
            parse_expression("10 - 3 - 2"),
            Some(ExprNode::Binary {
                op: BinaryOp::Sub,
                left: Box::new(ExprNode::Binary {
                    op: BinaryOp::Sub,
                    left: Box::new(num("10")),
                    right: Box::new(num("3")),
                }),
                right: Box::new(num("2")),
            })
        );
    }

    #[test]
    fn leading_minus_binds_the_rest() {
        assert_eq!(
            parse_expression("-5 + 3"),
            Some(ExprNode::Unary {
                op: UnaryOp::Minus,
                operand: Box::new(ExprNode::Binary {
                    op: BinaryOp::Add,
                    left: Box::new(num("5")),
                    right: Box::new(num("3")),
                }),
            })
        );
    }

    #[test]
    fn seg_is_a_unary_operator() {
        assert_eq!(
            parse_expression("seg start"),
            Some(ExprNode::Unary {
                op: UnaryOp::Seg,
                operand: Box::new(ExprNode::Symbol("start".to_string())),
            })
        );
        assert_eq!(
            parse_expression("seg"),
            Some(ExprNode::Symbol("seg".to_string()))
        );
    }

    #[test]
    fn adjacent_paren_makes_a_call() {
        assert_eq!(
            parse_expression("ADD(10, 20)"),
            Some(ExprNode::Call {
                name: "ADD".to_string(),
                args: vec!["10".to_string(), "20".to_string()],
            })
        );
    }

    #[test]
    fn spaced_paren_is_not_a_call() {
        // Two operand nodes without an operator fall back to the first.
        assert_eq!(
            parse_expression("ADD (10)"),
            Some(ExprNode::Symbol("ADD".to_string()))
        );
    }

    #[test]
    fn call_args_keep_nested_text() {
        assert_eq!(
            parse_expression("NEST(ADD(1, 2), 3 + 4)"),
            Some(ExprNode::Call {
                name: "NEST".to_string(),
                args: vec!["ADD(1, 2)".to_string(), "3 + 4".to_string()],
            })
        );
        assert_eq!(
            parse_expression("FOO()"),
            Some(ExprNode::Call {
                name: "FOO".to_string(),
                args: Vec::new(),
            })
        );
    }

    #[test]
    fn string_literal_is_an_operand() {
        assert_eq!(
            parse_expression("'ab' + 1"),
            Some(ExprNode::Binary {
                op: BinaryOp::Add,
                left: Box::new(ExprNode::Str("'ab'".to_string())),
                right: Box::new(num("1")),
            })
        );
    }

    #[test]
    fn unparseable_text_yields_none() {
        assert_eq!(parse_expression(""), None);
        assert_eq!(parse_expression("   ; comment only"), None);
        assert_eq!(parse_expression("(1 + 2"), None);
        assert_eq!(parse_expression(")"), None);
        assert_eq!(parse_expression("1, 2"), None);
    }

    #[test]
    fn dangling_operand_folds_to_opaque() {
        assert_eq!(
            parse_expression("5 *"),
            Some(ExprNode::Binary {
                op: BinaryOp::Mul,
                left: Box::new(num("5")),
                right: Box::new(ExprNode::Opaque),
            })
        );
    }

    #[test]
    fn paren_nesting_past_the_limit_yields_none() {
        let deep = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        assert_eq!(parse_expression(&deep), None);
        let shallow = format!("{}1{}", "(".repeat(20), ")".repeat(20));
        assert!(parse_expression(&shallow).is_some());
    }

    #[test]
    fn operator_chains_fold_to_a_bounded_tree() {
        let chain = vec!["1"; 10_000].join(" | ");
        let node = parse_expression(&chain).unwrap();
        assert!(tree_depth(&node) <= STRUCTURE_DEPTH_LIMIT + 1);
    }
}
