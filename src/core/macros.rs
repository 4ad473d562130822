// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Single-line macro helpers: parameter-list splitting, name validation
//! and hygienic parameter substitution.

use crate::core::tokenizer::{is_ident_continue, is_ident_start};

/// Substitute formal parameters with argument text in one pass over the
/// body. Replacement happens at identifier-token boundaries only; quoted
/// strings are copied verbatim, and substituted argument text is never
/// re-scanned for other parameter names.
pub fn substitute_params(body: &str, params: &[String], args: &[String]) -> String {
    let bytes = body.as_bytes();
    let mut out = String::with_capacity(body.len());
    let mut i = 0usize;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\'' || b == b'"' {
            let start = i;
            i += 1;
            while i < bytes.len() {
                let c = bytes[i];
                if c == b'\\' && i + 1 < bytes.len() {
                    i += 2;
                    continue;
                }
                i += 1;
                if c == b {
                    break;
                }
            }
            out.push_str(&body[start..i]);
            continue;
        }
        if is_ident_start(b) {
            let start = i;
            i += 1;
            while i < bytes.len() && is_ident_continue(bytes[i]) {
                i += 1;
            }
            let word = &body[start..i];
            match params.iter().position(|p| p == word) {
                Some(k) => out.push_str(args.get(k).map(String::as_str).unwrap_or("")),
                None => out.push_str(word),
            }
            continue;
        }
        // Copy one scalar, multibyte included.
        let start = i;
        i += 1;
        while i < bytes.len() && (bytes[i] & 0xC0) == 0x80 {
            i += 1;
        }
        out.push_str(&body[start..i]);
    }
    out
}

/// Split a comma-separated list, respecting quotes and paren nesting.
/// Parts come back trimmed; the empty input yields one empty part.
pub fn split_params(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars();
    let mut in_single = false;
    let mut in_double = false;
    let mut depth = 0usize;
    while let Some(c) = chars.next() {
        match c {
            '\\' if in_single || in_double => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                continue;
            }
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '(' if !in_single && !in_double => depth += 1,
            ')' if !in_single && !in_double => depth = depth.saturating_sub(1),
            ',' if !in_single && !in_double && depth == 0 => {
                out.push(current.trim().to_string());
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    out.push(current.trim().to_string());
    out
}

/// Command-line macro names and formal parameters: letter or underscore
/// first, alphanumeric or underscore after.
pub fn is_valid_name(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subst(body: &str, pairs: &[(&str, &str)]) -> String {
        let params: Vec<String> = pairs.iter().map(|(p, _)| p.to_string()).collect();
        let args: Vec<String> = pairs.iter().map(|(_, a)| a.to_string()).collect();
        substitute_params(body, &params, &args)
    }

    #[test]
    fn substitutes_whole_tokens_only() {
        assert_eq!(
            subst("((x) + (y))", &[("x", "10"), ("y", "20")]),
            "((10) + (20))"
        );
        assert_eq!(subst("xx + x + axb", &[("x", "5")]), "xx + 5 + axb");
    }

    #[test]
    fn dotted_names_are_single_tokens() {
        assert_eq!(subst("foo.x + x", &[("x", "1")]), "foo.x + 1");
    }

    #[test]
    fn strings_are_never_rewritten() {
        assert_eq!(subst("'x' + x", &[("x", "5")]), "'x' + 5");
        assert_eq!(subst("\"a x b\" + x", &[("x", "2")]), "\"a x b\" + 2");
    }

    #[test]
    fn substitution_is_simultaneous() {
        // Swapping arguments must not cascade through earlier replacements.
        assert_eq!(subst("a + b", &[("a", "b"), ("b", "a")]), "b + a");
        // Argument text containing a parameter name stays as written.
        assert_eq!(subst("x + 1", &[("x", "x*2")]), "x*2 + 1");
    }

    #[test]
    fn splits_on_top_level_commas() {
        assert_eq!(split_params("a, b"), vec!["a", "b"]);
        assert_eq!(split_params("f(1,2), 3"), vec!["f(1,2)", "3"]);
        assert_eq!(split_params("'a,b', c"), vec!["'a,b'", "c"]);
        assert_eq!(split_params(""), vec![""]);
    }

    #[test]
    fn validates_names() {
        assert!(is_valid_name("FOO"));
        assert!(is_valid_name("_x1"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("1x"));
        assert!(!is_valid_name("a-b"));
        assert!(!is_valid_name("a.b"));
    }
}
