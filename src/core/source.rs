// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Source unit scanning.
//!
//! Splits a source text into lines with byte spans, strips comments
//! outside string literals, and classifies preprocessor directives and
//! definition statements. Directive matching is case-insensitive. The
//! revision stamp keys the conditional-branch cache.

use crate::core::tokenizer::{is_ident_continue, is_ident_start, Span};

/// One scanned line. `content` is the comment-stripped text; `span` covers
/// the raw line without its newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineInfo {
    pub number: usize,
    pub span: Span,
    pub content: String,
    pub kind: LineKind,
}

/// Classification of a line's leading statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    If { condition: String },
    Ifdef { negated: bool, name: String },
    Elif { condition: String },
    Elifdef { negated: bool, name: String },
    Else,
    Endif,
    Define { case_insensitive: bool, rest: String },
    Assign { case_insensitive: bool, rest: String },
    MacroStart { rest: String },
    MacroEnd,
    Equ { name: String, expr: String },
    Extern { names: Vec<String> },
    Global { names: Vec<String> },
    Label { name: String },
    Other,
}

#[derive(Debug, Clone)]
pub struct SourceUnit {
    name: String,
    text: String,
    lines: Vec<LineInfo>,
    revision: u64,
}

impl SourceUnit {
    pub fn new(name: impl Into<String>, text: impl Into<String>, revision: u64) -> Self {
        let text = text.into();
        let lines = scan_lines(&text);
        Self {
            name: name.into(),
            text,
            lines,
            revision,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn lines(&self) -> &[LineInfo] {
        &self.lines
    }

    /// The line covering a byte offset, for diagnostics.
    pub fn line_at_offset(&self, offset: usize) -> Option<&LineInfo> {
        self.lines
            .iter()
            .find(|line| offset >= line.span.start && offset <= line.span.end)
    }
}

fn scan_lines(text: &str) -> Vec<LineInfo> {
    let mut lines = Vec::new();
    let mut start = 0usize;
    let mut number = 1usize;
    let bytes = text.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'\n' {
            let mut end = i;
            if end > start && bytes[end - 1] == b'\r' {
                end -= 1;
            }
            lines.push(make_line(number, start, end, &text[start..end]));
            start = i + 1;
            number += 1;
        }
    }
    if start < text.len() {
        lines.push(make_line(number, start, text.len(), &text[start..]));
    }
    lines
}

fn make_line(number: usize, start: usize, end: usize, raw: &str) -> LineInfo {
    let content = strip_comment(raw).to_string();
    let kind = classify(&content);
    LineInfo {
        number,
        span: Span::new(start, end),
        content,
        kind,
    }
}

/// Cut the line at the first `;` outside a string literal.
fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut in_single = false;
    let mut in_double = false;
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if (in_single || in_double) && i + 1 < bytes.len() => {
                i += 2;
                continue;
            }
            b'\'' if !in_double => in_single = !in_single,
            b'"' if !in_single => in_double = !in_double,
            b';' if !in_single && !in_double => return &line[..i],
            _ => {}
        }
        i += 1;
    }
    line
}

fn classify(content: &str) -> LineKind {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return LineKind::Other;
    }
    let at_col0 = !content.starts_with(|c: char| c.is_whitespace());

    if let Some(rest) = trimmed.strip_prefix('%') {
        if let Some(local) = rest.strip_prefix('%') {
            return classify_macro_local(local);
        }
        return classify_directive(rest);
    }

    let first_end = trimmed
        .find(|c: char| c.is_whitespace())
        .unwrap_or(trimmed.len());
    let first = &trimmed[..first_end];
    if first.eq_ignore_ascii_case("extern") {
        return LineKind::Extern {
            names: split_name_list(&trimmed[first_end..]),
        };
    }
    if first.eq_ignore_ascii_case("global") {
        return LineKind::Global {
            names: split_name_list(&trimmed[first_end..]),
        };
    }

    if let Some((name, after)) = take_leading_ident(trimmed) {
        let had_colon = after.starts_with(':');
        let after_colon = after.strip_prefix(':').unwrap_or(after);
        let tail = after_colon.trim_start();
        let word_end = tail
            .find(|c: char| c.is_whitespace())
            .unwrap_or(tail.len());
        if tail[..word_end].eq_ignore_ascii_case("equ") && word_end > 0 {
            return LineKind::Equ {
                name: name.to_string(),
                expr: tail[word_end..].trim().to_string(),
            };
        }
        if had_colon {
            return LineKind::Label {
                name: name.to_string(),
            };
        }
        if at_col0 && after.trim().is_empty() {
            return LineKind::Label {
                name: name.to_string(),
            };
        }
    }
    LineKind::Other
}

fn classify_directive(rest: &str) -> LineKind {
    let word_end = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    let word = rest[..word_end].to_ascii_lowercase();
    let tail = rest[word_end..].trim();
    match word.as_str() {
        "if" => LineKind::If {
            condition: tail.to_string(),
        },
        "ifdef" => LineKind::Ifdef {
            negated: false,
            name: first_word(tail),
        },
        "ifndef" => LineKind::Ifdef {
            negated: true,
            name: first_word(tail),
        },
        "elif" => LineKind::Elif {
            condition: tail.to_string(),
        },
        "elifdef" => LineKind::Elifdef {
            negated: false,
            name: first_word(tail),
        },
        "elifndef" => LineKind::Elifdef {
            negated: true,
            name: first_word(tail),
        },
        "else" => LineKind::Else,
        "endif" => LineKind::Endif,
        "define" => LineKind::Define {
            case_insensitive: false,
            rest: tail.to_string(),
        },
        "idefine" => LineKind::Define {
            case_insensitive: true,
            rest: tail.to_string(),
        },
        "assign" => LineKind::Assign {
            case_insensitive: false,
            rest: tail.to_string(),
        },
        "iassign" => LineKind::Assign {
            case_insensitive: true,
            rest: tail.to_string(),
        },
        "macro" => LineKind::MacroStart {
            rest: tail.to_string(),
        },
        "endmacro" => LineKind::MacroEnd,
        _ => LineKind::Other,
    }
}

/// `%%name` / `%%name:` lines define macro-local labels.
fn classify_macro_local(local: &str) -> LineKind {
    let Some((name, after)) = take_leading_ident(local) else {
        return LineKind::Other;
    };
    let after = after.strip_prefix(':').unwrap_or(after);
    if after.trim().is_empty() || local.contains(':') {
        return LineKind::Label {
            name: format!("%%{name}"),
        };
    }
    LineKind::Other
}

pub(crate) fn take_leading_ident(text: &str) -> Option<(&str, &str)> {
    let bytes = text.as_bytes();
    if bytes.is_empty() || !is_ident_start(bytes[0]) {
        return None;
    }
    let mut end = 1usize;
    while end < bytes.len() && is_ident_continue(bytes[end]) {
        end += 1;
    }
    Some((&text[..end], &text[end..]))
}

fn first_word(text: &str) -> String {
    text.split_whitespace().next().unwrap_or("").to_string()
}

/// Split `extern`/`global` operand lists; `name:type` annotations keep
/// only the name.
fn split_name_list(text: &str) -> Vec<String> {
    text.split(',')
        .filter_map(|part| {
            let part = part.trim();
            let name = part
                .split(|c: char| c == ':' || c.is_whitespace())
                .next()
                .unwrap_or("");
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify_one(line: &str) -> LineKind {
        let unit = SourceUnit::new("t.asm", line, 0);
        unit.lines()
            .first()
            .map(|info| info.kind.clone())
            .unwrap_or_else(|| classify(line))
    }

    #[test]
    fn splits_lines_with_spans() {
        let unit = SourceUnit::new("t.asm", "abc\r\ndef\nxyz", 7);
        let lines = unit.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].span, Span::new(0, 3));
        assert_eq!(lines[1].span, Span::new(5, 8));
        assert_eq!(lines[2].span, Span::new(9, 12));
        assert_eq!(lines[2].number, 3);
        assert_eq!(unit.revision(), 7);
        assert_eq!(unit.line_at_offset(6).map(|l| l.number), Some(2));
    }

    #[test]
    fn strips_comments_outside_strings() {
        assert_eq!(classify_one("mov al, ';' ; load"), LineKind::Other);
        let unit = SourceUnit::new("t.asm", "db 'a;b' ; trailing", 0);
        assert_eq!(unit.lines()[0].content, "db 'a;b' ");
    }

    #[test]
    fn classifies_conditionals() {
        assert_eq!(
            classify_one("%if VALUE > 2"),
            LineKind::If {
                condition: "VALUE > 2".to_string()
            }
        );
        assert_eq!(
            classify_one("%ifdef DEBUG"),
            LineKind::Ifdef {
                negated: false,
                name: "DEBUG".to_string()
            }
        );
        assert_eq!(
            classify_one("  %IFNDEF QUIET"),
            LineKind::Ifdef {
                negated: true,
                name: "QUIET".to_string()
            }
        );
        assert_eq!(
            classify_one("%elif X == 1"),
            LineKind::Elif {
                condition: "X == 1".to_string()
            }
        );
        assert_eq!(
            classify_one("%elifndef X"),
            LineKind::Elifdef {
                negated: true,
                name: "X".to_string()
            }
        );
        assert_eq!(classify_one("%else"), LineKind::Else);
        assert_eq!(classify_one("%EndIf ; done"), LineKind::Endif);
    }

    #[test]
    fn classifies_defines_and_assigns() {
        assert_eq!(
            classify_one("%define WIDTH 640"),
            LineKind::Define {
                case_insensitive: false,
                rest: "WIDTH 640".to_string()
            }
        );
        assert_eq!(
            classify_one("%idefine height 480"),
            LineKind::Define {
                case_insensitive: true,
                rest: "height 480".to_string()
            }
        );
        assert_eq!(
            classify_one("%assign counter counter+1"),
            LineKind::Assign {
                case_insensitive: false,
                rest: "counter counter+1".to_string()
            }
        );
        assert_eq!(
            classify_one("%macro push_all 0"),
            LineKind::MacroStart {
                rest: "push_all 0".to_string()
            }
        );
        assert_eq!(classify_one("%endmacro"), LineKind::MacroEnd);
    }

    #[test]
    fn classifies_equ_lines() {
        assert_eq!(
            classify_one("BUFSZ equ 0x100"),
            LineKind::Equ {
                name: "BUFSZ".to_string(),
                expr: "0x100".to_string()
            }
        );
        assert_eq!(
            classify_one("count: EQU 10 * 4"),
            LineKind::Equ {
                name: "count".to_string(),
                expr: "10 * 4".to_string()
            }
        );
    }

    #[test]
    fn classifies_extern_and_global() {
        assert_eq!(
            classify_one("extern printf, malloc"),
            LineKind::Extern {
                names: vec!["printf".to_string(), "malloc".to_string()]
            }
        );
        assert_eq!(
            classify_one("global main:function, start"),
            LineKind::Global {
                names: vec!["main".to_string(), "start".to_string()]
            }
        );
    }

    #[test]
    fn classifies_labels() {
        assert_eq!(
            classify_one("start:"),
            LineKind::Label {
                name: "start".to_string()
            }
        );
        assert_eq!(
            classify_one("  .loop:"),
            LineKind::Label {
                name: ".loop".to_string()
            }
        );
        assert_eq!(
            classify_one("done"),
            LineKind::Label {
                name: "done".to_string()
            }
        );
        assert_eq!(
            classify_one("loop: jmp loop"),
            LineKind::Label {
                name: "loop".to_string()
            }
        );
        assert_eq!(
            classify_one("  %%skip:"),
            LineKind::Label {
                name: "%%skip".to_string()
            }
        );
        // A bare word with operands is an instruction, not a label.
        assert_eq!(classify_one("mov rax, 1"), LineKind::Other);
        // Indented bare words are instructions too.
        assert_eq!(classify_one("  ret"), LineKind::Other);
    }

    #[test]
    fn unknown_directives_are_other() {
        assert_eq!(classify_one("%include 'io.inc'"), LineKind::Other);
        assert_eq!(classify_one("%rep 4"), LineKind::Other);
        assert_eq!(classify_one("; just a comment"), LineKind::Other);
        assert_eq!(classify_one(""), LineKind::Other);
    }
}
