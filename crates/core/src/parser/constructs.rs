//! Productions for data-model constructs: `archetype`, `entity`, and the
//! field / transition / access / index sub-blocks they contain.

use super::Parser;
use crate::ast::*;
use crate::error::Diagnostic;
use crate::lexer::Token;

impl<'a> Parser<'a> {
    pub(super) fn parse_archetype(&mut self, prov: Provenance) -> Result<Decl, Diagnostic> {
        self.expect_word("archetype")?;
        let name = self.take_word()?;
        self.expect_block_start()?;

        let mut fields = Vec::new();
        loop {
            self.skip_blank();
            if self.at_block_end() {
                break;
            }
            fields.push(self.parse_field()?);
        }
        self.expect_block_end()?;

        Ok(Decl::Archetype(ArchetypeDecl { name, fields, prov }))
    }

    pub(super) fn parse_entity(&mut self, prov: Provenance) -> Result<Decl, Diagnostic> {
        self.expect_word("entity")?;
        let name = self.take_word()?;
        let label = if matches!(self.peek(), Token::Str(_)) {
            Some(self.take_str()?)
        } else {
            None
        };
        self.expect_block_start()?;

        let mut entity = EntityDecl {
            name,
            label,
            fields: Vec::new(),
            archetypes_used: Vec::new(),
            intent: None,
            domain: None,
            patterns: Vec::new(),
            invariants: Vec::new(),
            transitions_on: None,
            transitions: Vec::new(),
            access: AccessRules::default(),
            indices: Vec::new(),
            prov,
        };

        loop {
            self.skip_blank();
            if self.at_block_end() {
                break;
            }
            self.parse_entity_item(&mut entity)?;
        }
        self.expect_block_end()?;

        Ok(Decl::Entity(entity))
    }

    fn parse_entity_item(&mut self, entity: &mut EntityDecl) -> Result<(), Diagnostic> {
        let line = self.cur_line();
        match self.peek().clone() {
            Token::Word(w) => match w.as_str() {
                "uses" => {
                    self.advance();
                    let archetype = self.take_word()?;
                    entity.archetypes_used.push((archetype, line));
                    self.expect_newline()
                }
                "intent" => {
                    self.advance();
                    entity.intent = Some(self.take_str()?);
                    self.expect_newline()
                }
                "domain" => {
                    self.advance();
                    entity.domain = Some(self.take_word()?);
                    self.expect_newline()
                }
                "pattern" => {
                    self.advance();
                    entity.patterns.push(self.take_word()?);
                    self.expect_newline()
                }
                "invariant" => {
                    self.advance();
                    let expr = self.parse_expr()?;
                    entity.invariants.push((expr, line));
                    self.expect_newline()
                }
                "transitions" => self.parse_transitions(entity),
                "access" => self.parse_access(entity),
                "index" => {
                    self.advance();
                    let unique = if self.is_word("unique") {
                        self.advance();
                        true
                    } else {
                        false
                    };
                    let fields = self
                        .take_ident_list()?
                        .into_iter()
                        .map(|(name, _)| name)
                        .collect();
                    entity.indices.push(IndexDecl {
                        fields,
                        unique,
                        line,
                    });
                    self.expect_newline()
                }
                _ => {
                    let field = self.parse_field()?;
                    entity.fields.push(field);
                    Ok(())
                }
            },
            other => Err(self.err(format!(
                "expected a field or entity clause, got {:?}",
                other
            ))),
        }
    }

    /// `transitions:` / `transitions on <field>:` block of
    /// `from -> to [requires <field>]` lines.
    fn parse_transitions(&mut self, entity: &mut EntityDecl) -> Result<(), Diagnostic> {
        self.expect_word("transitions")?;
        if self.is_word("on") {
            self.advance();
            let line = self.cur_line();
            let field = self.take_word()?;
            entity.transitions_on = Some((field, line));
        }
        self.expect_block_start()?;

        loop {
            self.skip_blank();
            if self.at_block_end() {
                break;
            }
            let line = self.cur_line();
            let from = self.take_word()?;
            self.expect(Token::Arrow, "'->'")?;
            let to = self.take_word()?;
            let requires = if self.is_word("requires") {
                self.advance();
                Some(self.take_word()?)
            } else {
                None
            };
            self.expect_newline()?;
            entity.transitions.push(Transition {
                from,
                to,
                requires,
                line,
            });
        }
        self.expect_block_end()
    }

    /// `access:` block with `read: <expr>` / `write: <expr>` lines.
    fn parse_access(&mut self, entity: &mut EntityDecl) -> Result<(), Diagnostic> {
        self.expect_word("access")?;
        self.expect_block_start()?;

        loop {
            self.skip_blank();
            if self.at_block_end() {
                break;
            }
            let line = self.cur_line();
            let which = self.take_word()?;
            self.expect(Token::Colon, "':'")?;
            let expr = self.parse_expr()?;
            self.expect_newline()?;
            match which.as_str() {
                "read" => entity.access.read = Some((expr, line)),
                "write" => entity.access.write = Some((expr, line)),
                other => {
                    return Err(self.err(format!(
                        "access rule must be 'read' or 'write', got '{}'",
                        other
                    )))
                }
            }
        }
        self.expect_block_end()
    }

    /// One field declaration: `name: type [constraints] [default <literal>]`.
    pub(super) fn parse_field(&mut self) -> Result<FieldDecl, Diagnostic> {
        let line = self.cur_line();
        let name = self.take_word()?;
        self.expect(Token::Colon, "':'")?;
        let ty = self.parse_field_type()?;

        let mut constraints = Vec::new();
        let mut default = None;
        loop {
            match self.peek().clone() {
                Token::Word(w) => match w.as_str() {
                    "required" => {
                        self.advance();
                        constraints.push(FieldConstraint::Required);
                    }
                    "unique" => {
                        self.advance();
                        constraints.push(FieldConstraint::Unique);
                    }
                    "pk" => {
                        self.advance();
                        constraints.push(FieldConstraint::Pk);
                    }
                    "default" => {
                        self.advance();
                        default = Some(self.parse_literal()?);
                    }
                    other => {
                        return Err(self.err(format!("unknown field constraint '{}'", other)))
                    }
                },
                Token::Newline => break,
                other => {
                    return Err(self.err(format!(
                        "expected a constraint or end of line, got {:?}",
                        other
                    )))
                }
            }
        }
        self.expect_newline()?;

        Ok(FieldDecl {
            name,
            ty,
            constraints,
            default,
            line,
        })
    }

    pub(super) fn parse_field_type(&mut self) -> Result<FieldType, Diagnostic> {
        if let Token::EnumList(values) = self.peek().clone() {
            self.advance();
            if values.is_empty() {
                return Err(self.err("enum must declare at least one value"));
            }
            return Ok(FieldType::Enum { values });
        }

        let name = self.take_word()?;
        match name.as_str() {
            "uuid" => Ok(FieldType::Uuid),
            "text" => Ok(FieldType::Text),
            "int" => Ok(FieldType::Int),
            "bool" => Ok(FieldType::Bool),
            "date" => Ok(FieldType::Date),
            "datetime" => Ok(FieldType::DateTime),
            "email" => Ok(FieldType::Email),
            "money" => Ok(FieldType::Money),
            "str" => {
                let length = if self.peek() == &Token::LParen {
                    self.advance();
                    let n = self.take_int()?;
                    self.expect(Token::RParen, "')'")?;
                    Some(n as u32)
                } else {
                    None
                };
                Ok(FieldType::Str { length })
            }
            "decimal" => {
                let precision = if self.peek() == &Token::LParen {
                    self.advance();
                    let p = self.take_int()?;
                    self.expect(Token::Comma, "','")?;
                    let s = self.take_int()?;
                    self.expect(Token::RParen, "')'")?;
                    Some((p as u32, s as u32))
                } else {
                    None
                };
                Ok(FieldType::Decimal { precision })
            }
            "ref" => {
                let entity = self.take_word()?;
                Ok(FieldType::Ref { entity })
            }
            other => Err(self.err(format!("unknown field type '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::lexer;
    use crate::parser::parse;

    fn entity(src: &str) -> EntityDecl {
        let (tokens, lex_diags) = lexer::lex(src, "t.spec", None);
        assert!(lex_diags.is_empty());
        let (decls, diags) = parse(&tokens, "t.spec");
        assert!(diags.is_empty(), "diags: {:?}", diags);
        match decls.into_iter().next() {
            Some(Decl::Entity(e)) => e,
            other => panic!("expected entity, got {:?}", other),
        }
    }

    #[test]
    fn field_types_and_constraints() {
        let e = entity(
            "entity Task \"Tasks\":\n  id: uuid pk\n  title: str(200) required\n  estimate: decimal(10, 2)\n  status: enum[open, closed] default open\n  owner: ref User\n",
        );
        assert_eq!(e.label.as_deref(), Some("Tasks"));
        assert_eq!(e.fields.len(), 5);
        assert_eq!(e.fields[0].ty, FieldType::Uuid);
        assert!(e.fields[0].has_constraint(FieldConstraint::Pk));
        assert_eq!(e.fields[1].ty, FieldType::Str { length: Some(200) });
        assert_eq!(
            e.fields[2].ty,
            FieldType::Decimal {
                precision: Some((10, 2))
            }
        );
        assert_eq!(
            e.fields[3].default,
            Some(Literal::Str("open".to_owned()))
        );
        assert_eq!(
            e.fields[4].ty,
            FieldType::Ref {
                entity: "User".to_owned()
            }
        );
    }

    #[test]
    fn transitions_with_guard_and_binding() {
        let e = entity(
            "entity Ticket:\n  status: enum[open, resolved]\n  resolution: text\n  transitions on status:\n    open -> resolved requires resolution\n",
        );
        assert_eq!(e.transitions_on.as_ref().unwrap().0, "status");
        assert_eq!(e.transitions.len(), 1);
        let t = &e.transitions[0];
        assert_eq!((t.from.as_str(), t.to.as_str()), ("open", "resolved"));
        assert_eq!(t.requires.as_deref(), Some("resolution"));
    }

    #[test]
    fn access_invariant_and_index_clauses() {
        let e = entity(
            "entity Doc:\n  owner: ref User\n  size: int\n  invariant size >= 0\n  access:\n    read: current_user = owner\n    write: role(admin)\n  index unique [owner]\n",
        );
        assert_eq!(e.invariants.len(), 1);
        assert!(e.access.read.is_some());
        assert!(e.access.write.is_some());
        assert_eq!(e.indices.len(), 1);
        assert!(e.indices[0].unique);
    }

    #[test]
    fn archetype_and_uses() {
        let src = "archetype timestamped:\n  created_at: datetime required\n  updated_at: datetime\nentity Note:\n  uses timestamped\n  body: text\n";
        let (tokens, _) = lexer::lex(src, "t.spec", None);
        let (decls, diags) = parse(&tokens, "t.spec");
        assert!(diags.is_empty(), "diags: {:?}", diags);
        assert_eq!(decls.len(), 2);
        let Decl::Archetype(a) = &decls[0] else {
            panic!("expected archetype")
        };
        assert_eq!(a.fields.len(), 2);
        let Decl::Entity(e) = &decls[1] else {
            panic!("expected entity")
        };
        assert_eq!(e.archetypes_used[0].0, "timestamped");
    }

    #[test]
    fn unknown_type_is_a_parse_error() {
        let src = "entity T:\n  x: blob\n";
        let (tokens, _) = lexer::lex(src, "t.spec", None);
        let (_, diags) = parse(&tokens, "t.spec");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("unknown field type 'blob'"));
    }
}
