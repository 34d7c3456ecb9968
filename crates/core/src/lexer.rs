//! Indentation-sensitive lexer.
//!
//! Block structure in the DSL is expressed by indentation under a `name:` /
//! `name "Label":` header line. The lexer keeps an explicit indent stack and
//! emits synthetic [`Token::Indent`] / [`Token::Dedent`] tokens when a line's
//! leading whitespace grows or shrinks, so the recursive-descent parser
//! consumes block boundaries like any other token. A dedent that lands
//! between stack levels, or indentation mixing tabs with spaces, is an
//! inconsistent-indentation `LexError`.
//!
//! When the text came out of vocabulary expansion, token lines are translated
//! through the expansion [`SourceMap`] so they refer to original source.

use crate::error::Diagnostic;
use crate::source::SourceMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifiers and keywords -- distinguished in the parser
    Word(String),
    /// Quoted string literal (content without quotes, escapes resolved)
    Str(String),
    /// Integer literal
    Int(i64),
    /// Decimal literal -- kept as string to preserve exact representation
    Float(String),
    /// `enum[a, b, c]` lexed as one unit
    EnumList(Vec<String>),
    // Punctuation
    Colon,
    Comma,
    Dot,
    LParen,
    RParen,
    LBracket,
    RBracket,
    // Comparison operators
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    // `->` in transitions, bare `-` in sort keys (descending prefix)
    Arrow,
    Minus,
    // Block structure
    Newline,
    Indent,
    Dedent,
    // End of input
    Eof,
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub line: u32,
    pub column: u32,
}

/// Tokenize `src`. Returns the token stream (always terminated by `Eof`,
/// with all open indents closed) plus any lex diagnostics; lexing continues
/// past bad characters so one stray byte does not hide the rest of the file.
pub fn lex(src: &str, file: &str, map: Option<&SourceMap>) -> (Vec<Spanned>, Vec<Diagnostic>) {
    let mut tokens: Vec<Spanned> = Vec::new();
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let mut indents: Vec<usize> = vec![0];
    let mut last_line: u32 = 1;

    for (idx, raw_line) in src.lines().enumerate() {
        let line = match map {
            Some(m) => m.resolve(idx as u32 + 1),
            None => idx as u32 + 1,
        };

        let trimmed = raw_line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        last_line = line;

        let leading = &raw_line[..raw_line.len() - trimmed.len()];
        // Pure-space and pure-tab indentation are both fine; mixing them on
        // one line makes the depth ambiguous.
        if leading.contains('\t') && leading.contains(' ') {
            diagnostics.push(Diagnostic::lex(
                file,
                line,
                1,
                "inconsistent indentation: tabs mixed with spaces",
            ));
        }
        let width = leading.chars().count();
        let column = width as u32 + 1;

        let current = *indents.last().unwrap_or(&0);
        if width > current {
            indents.push(width);
            tokens.push(Spanned {
                token: Token::Indent,
                line,
                column,
            });
        } else if width < current {
            while indents.len() > 1 && *indents.last().unwrap_or(&0) > width {
                indents.pop();
                tokens.push(Spanned {
                    token: Token::Dedent,
                    line,
                    column,
                });
            }
            if *indents.last().unwrap_or(&0) != width {
                diagnostics.push(Diagnostic::lex(
                    file,
                    line,
                    column,
                    format!(
                        "inconsistent indentation: {} spaces does not match any enclosing block",
                        width
                    ),
                ));
                // Recover by treating the line as belonging to the enclosing level.
            }
        }

        lex_line(trimmed, width, line, file, &mut tokens, &mut diagnostics);
        tokens.push(Spanned {
            token: Token::Newline,
            line,
            column: raw_line.chars().count() as u32 + 1,
        });
    }

    while indents.len() > 1 {
        indents.pop();
        tokens.push(Spanned {
            token: Token::Dedent,
            line: last_line,
            column: 1,
        });
    }
    tokens.push(Spanned {
        token: Token::Eof,
        line: last_line,
        column: 1,
    });

    (tokens, diagnostics)
}

/// Tokenize one line's content (indentation already handled).
/// `offset` is the number of leading whitespace chars stripped before `content`.
fn lex_line(
    content: &str,
    offset: usize,
    line: u32,
    file: &str,
    tokens: &mut Vec<Spanned>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let chars: Vec<char> = content.chars().collect();
    let mut pos = 0usize;

    macro_rules! push {
        ($tok:expr, $col:expr) => {
            tokens.push(Spanned {
                token: $tok,
                line,
                column: ($col + offset) as u32 + 1,
            })
        };
    }

    while pos < chars.len() {
        let c = chars[pos];
        let start = pos;

        if c == '#' {
            break;
        }
        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        // String literal
        if c == '"' {
            pos += 1;
            let mut s = String::new();
            let mut terminated = false;
            while pos < chars.len() {
                let sc = chars[pos];
                if sc == '"' {
                    pos += 1;
                    terminated = true;
                    break;
                }
                if sc == '\\' {
                    pos += 1;
                    match chars.get(pos) {
                        Some('"') => s.push('"'),
                        Some('\\') => s.push('\\'),
                        Some('n') => s.push('\n'),
                        Some('t') => s.push('\t'),
                        Some(other) => {
                            s.push('\\');
                            s.push(*other);
                        }
                        None => break,
                    }
                    pos += 1;
                    continue;
                }
                s.push(sc);
                pos += 1;
            }
            if !terminated {
                diagnostics.push(Diagnostic::lex(
                    file,
                    line,
                    (start + offset) as u32 + 1,
                    "unterminated string literal",
                ));
            }
            push!(Token::Str(s), start);
            continue;
        }

        // Number (optionally negative)
        if c.is_ascii_digit()
            || (c == '-' && pos + 1 < chars.len() && chars[pos + 1].is_ascii_digit())
        {
            if c == '-' {
                pos += 1;
            }
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
            if pos + 1 < chars.len() && chars[pos] == '.' && chars[pos + 1].is_ascii_digit() {
                pos += 1;
                while pos < chars.len() && chars[pos].is_ascii_digit() {
                    pos += 1;
                }
                let s: String = chars[start..pos].iter().collect();
                push!(Token::Float(s), start);
            } else {
                let s: String = chars[start..pos].iter().collect();
                match s.parse::<i64>() {
                    Ok(n) => push!(Token::Int(n), start),
                    Err(_) => diagnostics.push(Diagnostic::lex(
                        file,
                        line,
                        (start + offset) as u32 + 1,
                        format!("invalid integer '{}'", s),
                    )),
                }
            }
            continue;
        }

        // Identifier / keyword / enum list
        if c.is_alphabetic() || c == '_' {
            while pos < chars.len() && (chars[pos].is_alphanumeric() || chars[pos] == '_') {
                pos += 1;
            }
            let word: String = chars[start..pos].iter().collect();
            if word == "enum" && chars.get(pos) == Some(&'[') {
                pos += 1;
                match lex_enum_values(&chars, &mut pos) {
                    Ok(values) => push!(Token::EnumList(values), start),
                    Err(msg) => {
                        diagnostics.push(Diagnostic::lex(
                            file,
                            line,
                            (start + offset) as u32 + 1,
                            msg,
                        ));
                        push!(Token::EnumList(Vec::new()), start);
                    }
                }
            } else {
                push!(Token::Word(word), start);
            }
            continue;
        }

        // Operators and punctuation
        let next = chars.get(pos + 1).copied();
        match c {
            '-' if next == Some('>') => {
                push!(Token::Arrow, start);
                pos += 2;
            }
            '-' => {
                push!(Token::Minus, start);
                pos += 1;
            }
            '!' if next == Some('=') => {
                push!(Token::Neq, start);
                pos += 2;
            }
            '<' if next == Some('=') => {
                push!(Token::Lte, start);
                pos += 2;
            }
            '<' => {
                push!(Token::Lt, start);
                pos += 1;
            }
            '>' if next == Some('=') => {
                push!(Token::Gte, start);
                pos += 2;
            }
            '>' => {
                push!(Token::Gt, start);
                pos += 1;
            }
            '=' if next == Some('=') => {
                push!(Token::Eq, start);
                pos += 2;
            }
            '=' => {
                push!(Token::Eq, start);
                pos += 1;
            }
            ':' => {
                push!(Token::Colon, start);
                pos += 1;
            }
            ',' => {
                push!(Token::Comma, start);
                pos += 1;
            }
            '.' => {
                push!(Token::Dot, start);
                pos += 1;
            }
            '(' => {
                push!(Token::LParen, start);
                pos += 1;
            }
            ')' => {
                push!(Token::RParen, start);
                pos += 1;
            }
            '[' => {
                push!(Token::LBracket, start);
                pos += 1;
            }
            ']' => {
                push!(Token::RBracket, start);
                pos += 1;
            }
            other => {
                diagnostics.push(Diagnostic::lex(
                    file,
                    line,
                    (start + offset) as u32 + 1,
                    format!("unexpected character '{}'", other),
                ));
                pos += 1;
            }
        }
    }
}

/// Lex the values of an `enum[...]` list; `pos` sits just past the `[`.
fn lex_enum_values(chars: &[char], pos: &mut usize) -> Result<Vec<String>, String> {
    let mut values = Vec::new();
    loop {
        while *pos < chars.len() && chars[*pos].is_whitespace() {
            *pos += 1;
        }
        match chars.get(*pos) {
            Some(']') => {
                *pos += 1;
                return Ok(values);
            }
            Some(c) if c.is_alphabetic() || *c == '_' => {
                let start = *pos;
                while *pos < chars.len() && (chars[*pos].is_alphanumeric() || chars[*pos] == '_') {
                    *pos += 1;
                }
                values.push(chars[start..*pos].iter().collect());
                while *pos < chars.len() && chars[*pos].is_whitespace() {
                    *pos += 1;
                }
                match chars.get(*pos) {
                    Some(',') => {
                        *pos += 1;
                    }
                    Some(']') => {}
                    _ => return Err("malformed enum list: expected ',' or ']'".to_owned()),
                }
            }
            _ => return Err("malformed enum list: expected identifier".to_owned()),
        }
    }
}
