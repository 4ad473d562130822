// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Tokenizer for NASM-dialect expression text.
//!
//! Produces the flat token stream the expression structurer folds into a
//! tree. Operators are matched longest-first so `<=>`, `<<<` and `>>>` are
//! never split into their shorter forms. A `;` outside a string ends the
//! token stream (comment).

/// Byte range of a token within the tokenized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end
    }
}

/// Operator spellings recognized in expression context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpToken {
    LogicOr,    // ||
    LogicXor,   // ^^
    LogicAnd,   // &&
    BitOr,      // |
    BitXor,     // ^
    BitAnd,     // &
    EqEq,       // ==
    NotEq,      // !=
    NotEqAlt,   // <>
    Lt,         // <
    Le,         // <=
    Gt,         // >
    Ge,         // >=
    Spaceship,  // <=>
    Shl,        // <<
    ShlWide,    // <<<
    Shr,        // >>
    ShrWide,    // >>>
    Plus,       // +
    Minus,      // -
    Mul,        // *
    Div,        // /
    SignedDiv,  // //
    Mod,        // %
    SignedMod,  // %%
    Paste,      // %+
    Tilde,      // ~
    Exclaim,    // !
}

impl OpToken {
    pub fn text(self) -> &'static str {
        match self {
            OpToken::LogicOr => "||",
            OpToken::LogicXor => "^^",
            OpToken::LogicAnd => "&&",
            OpToken::BitOr => "|",
            OpToken::BitXor => "^",
            OpToken::BitAnd => "&",
            OpToken::EqEq => "==",
            OpToken::NotEq => "!=",
            OpToken::NotEqAlt => "<>",
            OpToken::Lt => "<",
            OpToken::Le => "<=",
            OpToken::Gt => ">",
            OpToken::Ge => ">=",
            OpToken::Spaceship => "<=>",
            OpToken::Shl => "<<",
            OpToken::ShlWide => "<<<",
            OpToken::Shr => ">>",
            OpToken::ShrWide => ">>>",
            OpToken::Plus => "+",
            OpToken::Minus => "-",
            OpToken::Mul => "*",
            OpToken::Div => "/",
            OpToken::SignedDiv => "//",
            OpToken::Mod => "%",
            OpToken::SignedMod => "%%",
            OpToken::Paste => "%+",
            OpToken::Tilde => "~",
            OpToken::Exclaim => "!",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Numeric literal text, kept verbatim for the literal parser.
    Number(String),
    /// Quoted string/char literal, kept verbatim including quotes.
    Str(String),
    /// Identifier or keyword (`seg` is classified by the structurer).
    Ident(String),
    Op(OpToken),
    LParen,
    RParen,
    Comma,
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// Whitespace (or start of input) immediately before this token.
    /// Function-style calls require `ident(` with no space between.
    pub space_before: bool,
}

pub struct Tokenizer<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    /// Tokenize the whole input. The final element is always `End`.
    pub fn tokenize(text: &'a str) -> Vec<Token> {
        let mut tok = Tokenizer::new(text);
        let mut out = Vec::new();
        loop {
            let token = tok.next_token();
            let done = token.kind == TokenKind::End;
            out.push(token);
            if done {
                return out;
            }
        }
    }

    pub fn next_token(&mut self) -> Token {
        let mut space_before = self.pos == 0;
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
            space_before = true;
        }
        let start = self.pos;
        if self.pos >= self.bytes.len() || self.bytes[self.pos] == b';' {
            return Token {
                kind: TokenKind::End,
                span: Span::new(start, start),
                space_before,
            };
        }

        let c = self.bytes[self.pos];

        if c == b'\'' || c == b'"' {
            return self.lex_string(start, space_before);
        }
        if c.is_ascii_digit() {
            return self.lex_number(start, space_before);
        }
        if is_ident_start(c) {
            return self.lex_ident(start, space_before);
        }
        // `%%name` is a macro-local label reference, `%name` never occurs in
        // expression position except as an operator spelling.
        if c == b'%' && self.peek(1) == Some(b'%') {
            if let Some(next) = self.peek(2) {
                if is_ident_start(next) {
                    return self.lex_percent_local(start, space_before);
                }
            }
        }
        if c == b'$' {
            return self.lex_dollar(start, space_before);
        }

        match c {
            b'(' => self.single(TokenKind::LParen, start, space_before),
            b')' => self.single(TokenKind::RParen, start, space_before),
            b',' => self.single(TokenKind::Comma, start, space_before),
            _ => self.lex_operator(start, space_before),
        }
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn single(&mut self, kind: TokenKind, start: usize, space_before: bool) -> Token {
        self.pos += 1;
        Token {
            kind,
            span: Span::new(start, self.pos),
            space_before,
        }
    }

    fn lex_string(&mut self, start: usize, space_before: bool) -> Token {
        let quote = self.bytes[self.pos];
        self.pos += 1;
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            if b == b'\\' && self.pos + 1 < self.bytes.len() {
                self.pos += 2;
                continue;
            }
            self.pos += 1;
            if b == quote {
                break;
            }
        }
        Token {
            kind: TokenKind::Str(self.text[start..self.pos].to_string()),
            span: Span::new(start, self.pos),
            space_before,
        }
    }

    fn lex_number(&mut self, start: usize, space_before: bool) -> Token {
        // Digit-led alphanumeric run; the literal parser decides validity.
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        Token {
            kind: TokenKind::Number(self.text[start..self.pos].to_string()),
            span: Span::new(start, self.pos),
            space_before,
        }
    }

    fn lex_ident(&mut self, start: usize, space_before: bool) -> Token {
        while self.pos < self.bytes.len() && is_ident_continue(self.bytes[self.pos]) {
            self.pos += 1;
        }
        Token {
            kind: TokenKind::Ident(self.text[start..self.pos].to_string()),
            span: Span::new(start, self.pos),
            space_before,
        }
    }

    fn lex_percent_local(&mut self, start: usize, space_before: bool) -> Token {
        self.pos += 2;
        while self.pos < self.bytes.len() && is_ident_continue(self.bytes[self.pos]) {
            self.pos += 1;
        }
        Token {
            kind: TokenKind::Ident(self.text[start..self.pos].to_string()),
            span: Span::new(start, self.pos),
            space_before,
        }
    }

    fn lex_dollar(&mut self, start: usize, space_before: bool) -> Token {
        self.pos += 1;
        if self.peek(0) == Some(b'$') {
            self.pos += 1;
        } else {
            while self.pos < self.bytes.len() && is_ident_continue(self.bytes[self.pos]) {
                self.pos += 1;
            }
        }
        Token {
            kind: TokenKind::Ident(self.text[start..self.pos].to_string()),
            span: Span::new(start, self.pos),
            space_before,
        }
    }

    fn lex_operator(&mut self, start: usize, space_before: bool) -> Token {
        let rest = &self.text[self.pos..];
        // Longest spelling first within each leading character.
        const TABLE: &[(&str, OpToken)] = &[
            ("<=>", OpToken::Spaceship),
            ("<<<", OpToken::ShlWide),
            (">>>", OpToken::ShrWide),
            ("<<", OpToken::Shl),
            (">>", OpToken::Shr),
            ("<=", OpToken::Le),
            (">=", OpToken::Ge),
            ("<>", OpToken::NotEqAlt),
            ("==", OpToken::EqEq),
            ("!=", OpToken::NotEq),
            ("&&", OpToken::LogicAnd),
            ("||", OpToken::LogicOr),
            ("^^", OpToken::LogicXor),
            ("//", OpToken::SignedDiv),
            ("%%", OpToken::SignedMod),
            ("%+", OpToken::Paste),
            ("<", OpToken::Lt),
            (">", OpToken::Gt),
            ("&", OpToken::BitAnd),
            ("|", OpToken::BitOr),
            ("^", OpToken::BitXor),
            ("+", OpToken::Plus),
            ("-", OpToken::Minus),
            ("*", OpToken::Mul),
            ("/", OpToken::Div),
            ("%", OpToken::Mod),
            ("~", OpToken::Tilde),
            ("!", OpToken::Exclaim),
        ];
        for (spelling, op) in TABLE {
            if rest.starts_with(spelling) {
                self.pos += spelling.len();
                return Token {
                    kind: TokenKind::Op(*op),
                    span: Span::new(start, self.pos),
                    space_before,
                };
            }
        }
        // Unknown character: consume it whole so tokenization always
        // terminates and `pos` stays on a char boundary; the structurer
        // rejects the stream.
        let width = rest.chars().next().map_or(1, char::len_utf8);
        self.pos += width;
        Token {
            kind: TokenKind::Ident(self.text[start..self.pos].to_string()),
            span: Span::new(start, self.pos),
            space_before,
        }
    }
}

pub(crate) fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'.' || b == b'?' || b == b'@'
}

pub(crate) fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'?' || b == b'@' || b == b'$'
        || b == b'#' || b == b'~'
}
