//! Productions for the user-facing constructs: `surface`, `workspace`,
//! `service`, `foreign_model`, `integration`.

use super::Parser;
use crate::ast::*;
use crate::error::Diagnostic;
use crate::lexer::Token;

impl<'a> Parser<'a> {
    pub(super) fn parse_surface(&mut self, prov: Provenance) -> Result<Decl, Diagnostic> {
        self.expect_word("surface")?;
        let name = self.take_word()?;
        let label = if matches!(self.peek(), Token::Str(_)) {
            Some(self.take_str()?)
        } else {
            None
        };
        self.expect_block_start()?;

        let mut mode: Option<SurfaceMode> = None;
        let mut entity: Option<(String, u32)> = None;
        let mut sections = Vec::new();
        let mut ux = None;

        loop {
            self.skip_blank();
            if self.at_block_end() {
                break;
            }
            let line = self.cur_line();
            let keyword = self.take_word()?;
            match keyword.as_str() {
                "mode" => {
                    let word = self.take_word()?;
                    mode = Some(SurfaceMode::from_str(&word).ok_or_else(|| {
                        self.err(format!(
                            "surface mode must be list/view/create/edit, got '{}'",
                            word
                        ))
                    })?);
                    self.expect_newline()?;
                }
                "entity" => {
                    entity = Some((self.take_word()?, line));
                    self.expect_newline()?;
                }
                "section" => {
                    sections.push(self.parse_section(line)?);
                }
                "ux" => {
                    ux = Some(self.parse_ux_block()?);
                }
                other => {
                    return Err(self.err(format!("unknown surface clause '{}'", other)));
                }
            }
        }
        self.expect_block_end()?;

        let mode = mode.ok_or_else(|| {
            Diagnostic::parse(
                &prov.file,
                prov.line,
                prov.column,
                format!("surface '{}' is missing a 'mode' clause", name),
            )
        })?;
        let (entity, entity_line) = entity.ok_or_else(|| {
            Diagnostic::parse(
                &prov.file,
                prov.line,
                prov.column,
                format!("surface '{}' is missing an 'entity' clause", name),
            )
        })?;

        Ok(Decl::Surface(SurfaceDecl {
            name,
            label,
            mode,
            entity,
            entity_line,
            sections,
            ux,
            prov,
        }))
    }

    fn parse_section(&mut self, line: u32) -> Result<Section, Diagnostic> {
        let name = self.take_word()?;
        let label = if matches!(self.peek(), Token::Str(_)) {
            Some(self.take_str()?)
        } else {
            None
        };
        self.expect_block_start()?;

        let mut fields = Vec::new();
        loop {
            self.skip_blank();
            if self.at_block_end() {
                break;
            }
            let field_line = self.cur_line();
            self.expect_word("field")?;
            fields.push((self.take_word()?, field_line));
            self.expect_newline()?;
        }
        self.expect_block_end()?;

        Ok(Section {
            name,
            label,
            fields,
            line,
        })
    }

    fn parse_ux_block(&mut self) -> Result<UxBlock, Diagnostic> {
        self.expect_block_start()?;
        let mut ux = UxBlock::default();

        loop {
            self.skip_blank();
            if self.at_block_end() {
                break;
            }
            let line = self.cur_line();
            let keyword = self.take_word()?;
            match keyword.as_str() {
                "personas" => {
                    ux.personas = self
                        .take_ident_list()?
                        .into_iter()
                        .map(|(name, _)| name)
                        .collect();
                    self.expect_newline()?;
                }
                "attention" => {
                    ux.attention = self.take_ident_list()?;
                    self.expect_newline()?;
                }
                "sort" => {
                    ux.sort = Some(self.take_sort_key()?);
                    self.expect_newline()?;
                }
                "filter" => {
                    let expr = self.parse_expr()?;
                    ux.filter = Some((expr, line));
                    self.expect_newline()?;
                }
                "search" => {
                    ux.search = self.take_ident_list()?;
                    self.expect_newline()?;
                }
                "empty" => {
                    ux.empty = Some(self.take_str()?);
                    self.expect_newline()?;
                }
                other => {
                    return Err(self.err(format!("unknown ux clause '{}'", other)));
                }
            }
        }
        self.expect_block_end()?;
        Ok(ux)
    }

    pub(super) fn parse_workspace(&mut self, prov: Provenance) -> Result<Decl, Diagnostic> {
        self.expect_word("workspace")?;
        let name = self.take_word()?;
        let purpose = if matches!(self.peek(), Token::Str(_)) {
            Some(self.take_str()?)
        } else {
            None
        };
        self.expect_block_start()?;

        let mut stage = None;
        let mut blocks = Vec::new();
        loop {
            self.skip_blank();
            if self.at_block_end() {
                break;
            }
            let line = self.cur_line();
            let keyword = self.take_word()?;
            match keyword.as_str() {
                "stage" => {
                    stage = Some(self.take_word()?);
                    self.expect_newline()?;
                }
                "block" => {
                    blocks.push(self.parse_block(line)?);
                }
                other => {
                    return Err(self.err(format!("unknown workspace clause '{}'", other)));
                }
            }
        }
        self.expect_block_end()?;

        Ok(Decl::Workspace(WorkspaceDecl {
            name,
            purpose,
            stage,
            blocks,
            prov,
        }))
    }

    fn parse_block(&mut self, line: u32) -> Result<BlockDecl, Diagnostic> {
        let name = self.take_word()?;
        self.expect_block_start()?;

        let mut source: Option<(String, u32)> = None;
        let mut block = BlockDecl {
            name,
            source: String::new(),
            source_line: line,
            filter: None,
            sort: None,
            limit: None,
            display: Vec::new(),
            action: None,
            aggregates: Vec::new(),
            group_by: None,
            line,
        };

        loop {
            self.skip_blank();
            if self.at_block_end() {
                break;
            }
            let clause_line = self.cur_line();
            let keyword = self.take_word()?;
            match keyword.as_str() {
                "source" => {
                    source = Some((self.take_word()?, clause_line));
                    self.expect_newline()?;
                }
                "filter" => {
                    let expr = self.parse_expr()?;
                    block.filter = Some((expr, clause_line));
                    self.expect_newline()?;
                }
                "sort" => {
                    block.sort = Some(self.take_sort_key()?);
                    self.expect_newline()?;
                }
                "limit" => {
                    let n = self.take_int()?;
                    if n < 0 {
                        return Err(self.err("limit must be non-negative"));
                    }
                    block.limit = Some(n as u32);
                    self.expect_newline()?;
                }
                "display" => {
                    block.display = self.take_ident_list()?;
                    self.expect_newline()?;
                }
                "action" => {
                    block.action = Some((self.take_word()?, clause_line));
                    self.expect_newline()?;
                }
                "aggregate" => {
                    let func = self.take_word()?;
                    let field = if self.peek() == &Token::LParen {
                        self.advance();
                        let f = self.take_word()?;
                        self.expect(Token::RParen, "')'")?;
                        Some(f)
                    } else {
                        None
                    };
                    block.aggregates.push(Aggregate {
                        func,
                        field,
                        line: clause_line,
                    });
                    self.expect_newline()?;
                }
                "group_by" => {
                    block.group_by = Some((self.take_word()?, clause_line));
                    self.expect_newline()?;
                }
                other => {
                    return Err(self.err(format!("unknown block clause '{}'", other)));
                }
            }
        }
        self.expect_block_end()?;

        let (source, source_line) = source.ok_or_else(|| {
            Diagnostic::parse(
                &self.file,
                block.line,
                1,
                format!("block '{}' is missing a 'source' clause", block.name),
            )
        })?;
        block.source = source;
        block.source_line = source_line;
        Ok(block)
    }

    pub(super) fn parse_service(&mut self, prov: Provenance) -> Result<Decl, Diagnostic> {
        self.expect_word("service")?;
        let name = self.take_word()?;
        self.expect_block_start()?;

        let mut operations = Vec::new();
        loop {
            self.skip_blank();
            if self.at_block_end() {
                break;
            }
            let line = self.cur_line();
            self.expect_word("operation")?;
            let op_name = self.take_word()?;
            self.expect_block_start()?;

            let mut params = Vec::new();
            let mut returns = None;
            loop {
                self.skip_blank();
                if self.at_block_end() {
                    break;
                }
                let keyword = self.take_word()?;
                match keyword.as_str() {
                    "param" => {
                        let param_name = self.take_word()?;
                        self.expect(Token::Colon, "':'")?;
                        let ty = self.parse_field_type()?;
                        params.push((param_name, ty));
                        self.expect_newline()?;
                    }
                    "returns" => {
                        returns = Some(self.parse_field_type()?);
                        self.expect_newline()?;
                    }
                    other => {
                        return Err(
                            self.err(format!("unknown operation clause '{}'", other))
                        );
                    }
                }
            }
            self.expect_block_end()?;
            operations.push(ServiceOp {
                name: op_name,
                params,
                returns,
                line,
            });
        }
        self.expect_block_end()?;

        Ok(Decl::Service(ServiceDecl {
            name,
            operations,
            prov,
        }))
    }

    pub(super) fn parse_foreign_model(&mut self, prov: Provenance) -> Result<Decl, Diagnostic> {
        self.expect_word("foreign_model")?;
        let name = self.take_word()?;
        self.expect_block_start()?;

        let mut system = None;
        let mut fields = Vec::new();
        loop {
            self.skip_blank();
            if self.at_block_end() {
                break;
            }
            if self.is_word("system") {
                self.advance();
                system = Some(self.take_word()?);
                self.expect_newline()?;
            } else {
                fields.push(self.parse_field()?);
            }
        }
        self.expect_block_end()?;

        let system = system.ok_or_else(|| {
            Diagnostic::parse(
                &prov.file,
                prov.line,
                prov.column,
                format!("foreign_model '{}' is missing a 'system' clause", name),
            )
        })?;

        Ok(Decl::ForeignModel(ForeignModelDecl {
            name,
            system,
            fields,
            prov,
        }))
    }

    pub(super) fn parse_integration(&mut self, prov: Provenance) -> Result<Decl, Diagnostic> {
        self.expect_word("integration")?;
        let name = self.take_word()?;
        self.expect_block_start()?;

        let mut service: Option<(String, u32)> = None;
        let mut direction = None;
        let mut trigger = None;
        loop {
            self.skip_blank();
            if self.at_block_end() {
                break;
            }
            let line = self.cur_line();
            let keyword = self.take_word()?;
            match keyword.as_str() {
                "service" => {
                    service = Some((self.take_word()?, line));
                    self.expect_newline()?;
                }
                "direction" => {
                    direction = Some(self.take_word()?);
                    self.expect_newline()?;
                }
                "trigger" => {
                    trigger = Some(self.take_str()?);
                    self.expect_newline()?;
                }
                other => {
                    return Err(self.err(format!("unknown integration clause '{}'", other)));
                }
            }
        }
        self.expect_block_end()?;

        let (service, service_line) = service.ok_or_else(|| {
            Diagnostic::parse(
                &prov.file,
                prov.line,
                prov.column,
                format!("integration '{}' is missing a 'service' clause", name),
            )
        })?;

        Ok(Decl::Integration(IntegrationDecl {
            name,
            service,
            service_line,
            direction,
            trigger,
            prov,
        }))
    }
}
