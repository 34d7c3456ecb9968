//! Recursive-descent parser: token stream -> per-file AST.
//!
//! One token of lookahead, a dedicated production per top-level construct,
//! and keyword-anchored error recovery: when a production fails, the
//! diagnostic is recorded and the parser skips to the next line whose first
//! token is a top-level keyword at column 1, so one malformed declaration
//! does not suppress the rest of the file.

mod constructs;
mod expressions;
mod surfaces;

use crate::ast::*;
use crate::error::Diagnostic;
use crate::lexer::{Spanned, Token};

const TOP_KEYWORDS: &[&str] = &[
    "module",
    "use",
    "app",
    "archetype",
    "entity",
    "surface",
    "workspace",
    "service",
    "foreign_model",
    "integration",
];

/// Parse one file's token stream. Always returns every declaration that
/// parsed cleanly, alongside the diagnostics for those that did not.
pub fn parse(tokens: &[Spanned], file: &str) -> (Vec<Decl>, Vec<Diagnostic>) {
    let mut parser = Parser::new(tokens, file);
    let mut decls = Vec::new();
    let mut diagnostics = Vec::new();

    loop {
        parser.skip_blank();
        if parser.at_eof() {
            break;
        }
        match parser.parse_top_level() {
            Ok(decl) => decls.push(decl),
            Err(diag) => {
                diagnostics.push(diag);
                parser.resync();
            }
        }
    }

    (decls, diagnostics)
}

pub(crate) struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    file: String,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(tokens: &'a [Spanned], file: &str) -> Self {
        Parser {
            tokens,
            pos: 0,
            file: file.to_owned(),
        }
    }

    pub(crate) fn cur(&self) -> &Spanned {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(crate) fn peek(&self) -> &Token {
        &self.cur().token
    }

    pub(crate) fn cur_line(&self) -> u32 {
        self.cur().line
    }

    pub(crate) fn cur_column(&self) -> u32 {
        self.cur().column
    }

    pub(crate) fn advance(&mut self) -> &Spanned {
        let t = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.peek() == &Token::Eof
    }

    pub(crate) fn prov(&self) -> Provenance {
        Provenance::new(&self.file, self.cur_line(), self.cur_column())
    }

    pub(crate) fn err(&self, msg: impl Into<String>) -> Diagnostic {
        Diagnostic::parse(&self.file, self.cur_line(), self.cur_column(), msg)
    }

    pub(crate) fn is_word(&self, w: &str) -> bool {
        matches!(self.peek(), Token::Word(x) if x == w)
    }

    pub(crate) fn take_word(&mut self) -> Result<String, Diagnostic> {
        if let Token::Word(w) = self.peek().clone() {
            self.advance();
            Ok(w)
        } else {
            Err(self.err(format!("expected identifier, got {:?}", self.peek())))
        }
    }

    pub(crate) fn take_str(&mut self) -> Result<String, Diagnostic> {
        if let Token::Str(s) = self.peek().clone() {
            self.advance();
            Ok(s)
        } else {
            Err(self.err(format!("expected string literal, got {:?}", self.peek())))
        }
    }

    pub(crate) fn take_int(&mut self) -> Result<i64, Diagnostic> {
        if let Token::Int(n) = *self.peek() {
            self.advance();
            Ok(n)
        } else {
            Err(self.err(format!("expected integer, got {:?}", self.peek())))
        }
    }

    pub(crate) fn expect_word(&mut self, expected: &str) -> Result<u32, Diagnostic> {
        let line = self.cur_line();
        if self.is_word(expected) {
            self.advance();
            Ok(line)
        } else {
            Err(self.err(format!("expected '{}', got {:?}", expected, self.peek())))
        }
    }

    pub(crate) fn expect(&mut self, token: Token, what: &str) -> Result<(), Diagnostic> {
        if self.peek() == &token {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!("expected {}, got {:?}", what, self.peek())))
        }
    }

    pub(crate) fn expect_newline(&mut self) -> Result<(), Diagnostic> {
        self.expect(Token::Newline, "end of line")
    }

    /// `: NEWLINE INDENT` after a block header.
    pub(crate) fn expect_block_start(&mut self) -> Result<(), Diagnostic> {
        self.expect(Token::Colon, "':'")?;
        self.expect_newline()?;
        self.expect(Token::Indent, "an indented block")
    }

    pub(crate) fn at_block_end(&self) -> bool {
        matches!(self.peek(), Token::Dedent | Token::Eof)
    }

    pub(crate) fn expect_block_end(&mut self) -> Result<(), Diagnostic> {
        match self.peek() {
            Token::Dedent => {
                self.advance();
                Ok(())
            }
            Token::Eof => Ok(()),
            _ => Err(self.err(format!("expected end of block, got {:?}", self.peek()))),
        }
    }

    /// Skip newlines between declarations or block items.
    pub(crate) fn skip_blank(&mut self) {
        while self.peek() == &Token::Newline {
            self.advance();
        }
    }

    /// Parse a `[a, b, c]` identifier list.
    pub(crate) fn take_ident_list(&mut self) -> Result<Vec<(String, u32)>, Diagnostic> {
        self.expect(Token::LBracket, "'['")?;
        let mut items = Vec::new();
        if self.peek() != &Token::RBracket {
            loop {
                let line = self.cur_line();
                items.push((self.take_word()?, line));
                if self.peek() == &Token::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(Token::RBracket, "']'")?;
        Ok(items)
    }

    /// Sort key: `field` or `-field` (descending).
    pub(crate) fn take_sort_key(&mut self) -> Result<SortKey, Diagnostic> {
        let line = self.cur_line();
        let descending = if self.peek() == &Token::Minus {
            self.advance();
            true
        } else {
            false
        };
        let field = self.take_word()?;
        Ok(SortKey {
            field,
            descending,
            line,
        })
    }

    fn parse_top_level(&mut self) -> Result<Decl, Diagnostic> {
        let prov = self.prov();
        match self.peek().clone() {
            Token::Word(w) => match w.as_str() {
                "module" => {
                    self.advance();
                    let name = self.take_word()?;
                    self.expect_newline()?;
                    Ok(Decl::Module { name, prov })
                }
                "use" => {
                    self.advance();
                    let module = self.take_word()?;
                    self.expect_newline()?;
                    Ok(Decl::Use { module, prov })
                }
                "app" => {
                    self.advance();
                    let name = self.take_word()?;
                    let label = if matches!(self.peek(), Token::Str(_)) {
                        Some(self.take_str()?)
                    } else {
                        None
                    };
                    self.expect_newline()?;
                    Ok(Decl::App { name, label, prov })
                }
                "archetype" => self.parse_archetype(prov),
                "entity" => self.parse_entity(prov),
                "surface" => self.parse_surface(prov),
                "workspace" => self.parse_workspace(prov),
                "service" => self.parse_service(prov),
                "foreign_model" => self.parse_foreign_model(prov),
                "integration" => self.parse_integration(prov),
                other => Err(self.err(format!("unexpected top-level keyword '{}'", other))),
            },
            // Stray structure tokens after recovery are silently consumed by
            // resync(); reaching one here means a file starting mid-block.
            other => Err(self.err(format!("expected a declaration, got {:?}", other))),
        }
    }

    /// Skip to the next top-level keyword at column 1 (or EOF).
    fn resync(&mut self) {
        loop {
            match self.peek() {
                Token::Eof => return,
                Token::Word(w)
                    if self.cur_column() == 1 && TOP_KEYWORDS.contains(&w.as_str()) =>
                {
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }
}
