// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Numeric and string literal parsing.
//!
//! NASM number spellings: `0x`/`0X` hex, `0b`/`0B` binary, `0d`/`0D` decimal,
//! a trailing `d`/`D` for decimal, plain decimal otherwise. Underscores are
//! digit separators and are stripped after the radix prefix is removed.
//! String literals pack their characters little-endian into an i64.

/// Parse a numeric literal. Errors carry the message that ends up in
/// evaluation results, with the original text embedded.
pub fn parse_number(text: &str) -> Result<i64, String> {
    let t = text.trim();
    let (digits, radix) = if let Some(rest) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X"))
    {
        (rest, 16)
    } else if let Some(rest) = t.strip_prefix("0b").or_else(|| t.strip_prefix("0B")) {
        (rest, 2)
    } else if let Some(rest) = t.strip_prefix("0d").or_else(|| t.strip_prefix("0D")) {
        (rest, 10)
    } else if t.len() > 1 && (t.ends_with('d') || t.ends_with('D')) {
        (&t[..t.len() - 1], 10)
    } else {
        (t, 10)
    };
    let clean: String = digits.chars().filter(|c| *c != '_').collect();
    if clean.is_empty() {
        return Err(format!("Invalid number format: {text}"));
    }
    i64::from_str_radix(&clean, radix).map_err(|_| format!("Invalid number format: {text}"))
}

/// Evaluate a quoted string or character literal to its packed value.
///
/// The empty literal is 0. A single character yields its code point. Longer
/// strings pack bytes little-endian, first character in the lowest byte.
/// A literal missing its closing quote (the tokenizer hands those over at
/// end of input) keeps everything after the opening quote as content.
pub fn parse_string_literal(text: &str) -> Result<i64, String> {
    let mut rest = text.chars();
    let quote = match rest.next() {
        Some(c @ ('\'' | '"')) => c,
        _ => return Err("Invalid string literal".to_string()),
    };
    if text.len() < 2 {
        return Err("Invalid string literal".to_string());
    }
    let body = rest.as_str();
    let content = body.strip_suffix(quote).unwrap_or(body);
    let chars = unescape(content);
    match chars.len() {
        0 => Ok(0),
        1 => Ok(chars[0] as i64),
        _ => {
            let mut value = 0i64;
            for c in chars.iter().rev() {
                value = value.wrapping_shl(8) | (*c as i64 & 0xFF);
            }
            Ok(value)
        }
    }
}

/// Resolve backslash escapes. Unknown or malformed escapes keep the
/// backslash as a literal character and continue one position later.
fn unescape(s: &str) -> Vec<char> {
    let src: Vec<char> = s.chars().collect();
    let mut out = Vec::with_capacity(src.len());
    let mut i = 0;
    while i < src.len() {
        let c = src[i];
        if c == '\\' && i + 1 < src.len() {
            match src[i + 1] {
                'n' => {
                    out.push('\n');
                    i += 2;
                }
                'r' => {
                    out.push('\r');
                    i += 2;
                }
                't' => {
                    out.push('\t');
                    i += 2;
                }
                '\\' => {
                    out.push('\\');
                    i += 2;
                }
                '\'' => {
                    out.push('\'');
                    i += 2;
                }
                '"' => {
                    out.push('"');
                    i += 2;
                }
                '0' => {
                    out.push('\0');
                    i += 2;
                }
                'x' => {
                    let hex: String = src.iter().skip(i + 2).take(2).collect();
                    match (hex.len() == 2).then(|| u8::from_str_radix(&hex, 16).ok()).flatten() {
                        Some(byte) => {
                            out.push(char::from(byte));
                            i += 4;
                        }
                        None => {
                            out.push(c);
                            i += 1;
                        }
                    }
                }
                _ => {
                    out.push(c);
                    i += 1;
                }
            }
        } else {
            out.push(c);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn with_grouped_underscores(digits: &str, group: usize) -> String {
        let chars: Vec<char> = digits.chars().collect();
        let mut out = String::new();
        for (i, c) in chars.iter().enumerate() {
            let from_end = chars.len() - i;
            if i > 0 && from_end % group == 0 {
                out.push('_');
            }
            out.push(*c);
        }
        out
    }

    #[test]
    fn parses_plain_decimal() {
        assert_eq!(parse_number("42"), Ok(42));
        assert_eq!(parse_number("0"), Ok(0));
    }

    #[test]
    fn parses_radix_prefixes() {
        assert_eq!(parse_number("0x1F"), Ok(31));
        assert_eq!(parse_number("0XFF"), Ok(255));
        assert_eq!(parse_number("0b1010"), Ok(10));
        assert_eq!(parse_number("0d123"), Ok(123));
    }

    #[test]
    fn parses_decimal_suffix() {
        assert_eq!(parse_number("123d"), Ok(123));
        assert_eq!(parse_number("9D"), Ok(9));
    }

    #[test]
    fn prefix_beats_suffix() {
        // `d` is a hex digit once the 0x prefix is stripped.
        assert_eq!(parse_number("0x2d"), Ok(45));
    }

    #[test]
    fn strips_underscores() {
        assert_eq!(parse_number("1_000_000"), Ok(1_000_000));
        assert_eq!(parse_number("0xDE_AD"), Ok(0xDEAD));
    }

    #[test]
    fn rejects_empty_digits() {
        assert_eq!(
            parse_number("0x"),
            Err("Invalid number format: 0x".to_string())
        );
        assert_eq!(
            parse_number("0b__"),
            Err("Invalid number format: 0b__".to_string())
        );
    }

    #[test]
    fn rejects_bad_digits_and_overflow() {
        assert!(parse_number("12ax").is_err());
        assert!(parse_number("0b102").is_err());
        assert!(parse_number("9223372036854775808").is_err());
        assert_eq!(parse_number("9223372036854775807"), Ok(i64::MAX));
    }

    #[test]
    fn string_literal_packs_little_endian() {
        assert_eq!(parse_string_literal("'A'"), Ok(65));
        assert_eq!(parse_string_literal("'ab'"), Ok(0x6261));
        assert_eq!(parse_string_literal("\"abcd\""), Ok(0x64636261));
        assert_eq!(parse_string_literal("''"), Ok(0));
    }

    #[test]
    fn string_literal_escapes() {
        assert_eq!(parse_string_literal("'\\n'"), Ok(10));
        assert_eq!(parse_string_literal("'\\x41'"), Ok(65));
        assert_eq!(parse_string_literal("'\\0'"), Ok(0));
        // Malformed hex escape keeps the backslash as a character.
        assert_eq!(
            parse_string_literal("'\\xG1'"),
            Ok(0x3147785C)
        );
        // Unknown escape likewise.
        assert_eq!(parse_string_literal("'\\q'"), Ok(0x715C));
    }

    #[test]
    fn too_short_literal_is_an_error() {
        assert_eq!(
            parse_string_literal("'"),
            Err("Invalid string literal".to_string())
        );
        assert_eq!(
            parse_string_literal(""),
            Err("Invalid string literal".to_string())
        );
    }

    #[test]
    fn unterminated_literal_keeps_its_content() {
        // Input ending before the closing quote still packs what is there,
        // including a trailing multibyte character.
        assert_eq!(parse_string_literal("'ab"), Ok(0x6261));
        assert_eq!(parse_string_literal("'\u{e9}"), Ok(0xE9));
        assert_eq!(parse_string_literal("\"ab'"), Ok(0x276261));
    }

    #[test]
    fn rejects_unquoted_text() {
        assert_eq!(
            parse_string_literal("ab"),
            Err("Invalid string literal".to_string())
        );
    }

    proptest! {
        #[test]
        fn hex_round_trip(v in any::<u32>()) {
            let grouped = with_grouped_underscores(&format!("{v:x}"), 4);
            prop_assert_eq!(parse_number(&format!("0x{grouped}")), Ok(v as i64));
        }

        #[test]
        fn binary_round_trip(v in any::<u16>()) {
            let grouped = with_grouped_underscores(&format!("{v:b}"), 8);
            prop_assert_eq!(parse_number(&format!("0b{grouped}")), Ok(v as i64));
        }

        #[test]
        fn decimal_round_trip(v in 1i64..=i64::MAX) {
            // The bare zero spellings collide: `0d` reads as an empty
            // 0d-prefixed literal, not as `0` with a decimal suffix.
            prop_assert_eq!(parse_number(&format!("{v}")), Ok(v));
            prop_assert_eq!(parse_number(&format!("{v}d")), Ok(v));
            prop_assert_eq!(parse_number(&format!("0d{v}")), Ok(v));
        }
    }
}
