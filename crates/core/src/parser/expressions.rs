//! Expression grammar shared by invariants, access rules, and filters.
//!
//! ```text
//! expr    := and_expr ( "or" and_expr )*
//! and_expr:= primary ( "and" primary )*
//! primary := "(" expr ")"
//!          | term ( cmp term | "in" "[" literal* "]" | "is" ["not"] "null" )?
//! term    := literal | word [ "(" term,* ")" ]
//! ```
//!
//! `or` binds loosest, `and` tighter, exactly one comparison per primary.
//! Bare identifiers stay unresolved here; the validator decides whether they
//! are fields or builtins.

use super::Parser;
use crate::ast::{CmpOp, Expr, Literal, Term};
use crate::error::Diagnostic;
use crate::lexer::Token;

impl<'a> Parser<'a> {
    pub(crate) fn parse_expr(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_and_expr()?;
        while self.is_word("or") {
            self.advance();
            let right = self.parse_and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_primary()?;
        while self.is_word("and") {
            self.advance();
            let right = self.parse_primary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Expr, Diagnostic> {
        if self.peek() == &Token::LParen {
            self.advance();
            let inner = self.parse_expr()?;
            self.expect(Token::RParen, "')'")?;
            return Ok(inner);
        }

        let line = self.cur_line();
        let term = self.parse_term()?;

        if let Some(op) = self.peek_cmp_op() {
            self.advance();
            let right = self.parse_term()?;
            return Ok(Expr::Compare {
                op,
                left: term,
                right,
                line,
            });
        }

        if self.is_word("in") {
            self.advance();
            self.expect(Token::LBracket, "'['")?;
            let mut values = Vec::new();
            if self.peek() != &Token::RBracket {
                loop {
                    values.push(self.parse_literal()?);
                    if self.peek() == &Token::Comma {
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
            self.expect(Token::RBracket, "']'")?;
            return Ok(Expr::In { term, values, line });
        }

        if self.is_word("is") {
            self.advance();
            let negated = if self.is_word("not") {
                self.advance();
                true
            } else {
                false
            };
            self.expect_word("null")?;
            return Ok(Expr::IsNull {
                term,
                negated,
                line,
            });
        }

        Ok(Expr::Term(term, line))
    }

    fn peek_cmp_op(&self) -> Option<CmpOp> {
        match self.peek() {
            Token::Eq => Some(CmpOp::Eq),
            Token::Neq => Some(CmpOp::Neq),
            Token::Lt => Some(CmpOp::Lt),
            Token::Lte => Some(CmpOp::Lte),
            Token::Gt => Some(CmpOp::Gt),
            Token::Gte => Some(CmpOp::Gte),
            _ => None,
        }
    }

    pub(super) fn parse_term(&mut self) -> Result<Term, Diagnostic> {
        match self.peek().clone() {
            Token::Str(s) => {
                self.advance();
                Ok(Term::Literal(Literal::Str(s)))
            }
            Token::Int(n) => {
                self.advance();
                Ok(Term::Literal(Literal::Int(n)))
            }
            Token::Float(f) => {
                self.advance();
                Ok(Term::Literal(Literal::Float(f)))
            }
            Token::Word(w) => {
                let line = self.cur_line();
                match w.as_str() {
                    "true" => {
                        self.advance();
                        Ok(Term::Literal(Literal::Bool(true)))
                    }
                    "false" => {
                        self.advance();
                        Ok(Term::Literal(Literal::Bool(false)))
                    }
                    "null" => {
                        self.advance();
                        Ok(Term::Literal(Literal::Null))
                    }
                    _ => {
                        self.advance();
                        if self.peek() == &Token::LParen {
                            self.advance();
                            let mut args = Vec::new();
                            if self.peek() != &Token::RParen {
                                loop {
                                    args.push(self.parse_term()?);
                                    if self.peek() == &Token::Comma {
                                        self.advance();
                                    } else {
                                        break;
                                    }
                                }
                            }
                            self.expect(Token::RParen, "')'")?;
                            Ok(Term::Call { func: w, args, line })
                        } else {
                            Ok(Term::Field(w))
                        }
                    }
                }
            }
            other => Err(self.err(format!("expected an expression term, got {:?}", other))),
        }
    }

    /// A literal value, accepting bare identifiers as symbolic constants
    /// (enum members in `in [...]` lists and field defaults).
    pub(super) fn parse_literal(&mut self) -> Result<Literal, Diagnostic> {
        match self.peek().clone() {
            Token::Str(s) => {
                self.advance();
                Ok(Literal::Str(s))
            }
            Token::Int(n) => {
                self.advance();
                Ok(Literal::Int(n))
            }
            Token::Float(f) => {
                self.advance();
                Ok(Literal::Float(f))
            }
            Token::Word(w) => {
                self.advance();
                match w.as_str() {
                    "true" => Ok(Literal::Bool(true)),
                    "false" => Ok(Literal::Bool(false)),
                    "null" => Ok(Literal::Null),
                    _ => Ok(Literal::Str(w)),
                }
            }
            other => Err(self.err(format!("expected a literal, got {:?}", other))),
        }
    }
}
