use crate::error::IrError;
use crate::frontend::scanner::Scanner;
use crate::frontend::token::Token;
use crate::frontend::token::TokenKind;
use crate::ir::unescape;
use crate::ir::Attribute;
use crate::ir::Attributes;
use crate::ir::Block;
use crate::ir::BlockExt;
use crate::ir::BlockName;
use crate::ir::IntegerAttr;
use crate::ir::ModuleOp;
use crate::ir::OpName;
use crate::ir::Operation;
use crate::ir::OperationBuilder;
use crate::ir::Region;
use crate::ir::RegionExt;
use crate::ir::Type;
use crate::ir::Value;
use crate::schema::DialectRegistry;
use crate::shared::weak;
use crate::shared::Shared;
use crate::shared::SharedExt;
use anyhow::Result;
use std::collections::HashMap;

/// Recursive-descent parser for the generic textual format.
///
/// The parser resolves `%name` operand references against the values in
/// scope (an undefined reference is a [IrError::ParseFailure]), defers
/// `^label` successor references until the enclosing region is complete, and
/// rejects operations whose shape violates their registered schema before
/// the graph ever reaches a caller.
pub struct Parser<'a> {
    src: String,
    tokens: Vec<Token>,
    current: usize,
    registry: &'a DialectRegistry,
    /// One value scope per enclosing block, innermost last.
    scopes: Vec<HashMap<String, Shared<Value>>>,
    /// One label table per open region, innermost last.
    block_labels: Vec<HashMap<String, Shared<Block>>>,
    /// Successor references waiting for their region to finish parsing.
    pending_successors: Vec<Vec<(Shared<Operation>, Vec<Token>)>>,
}

impl<'a> Parser<'a> {
    /// Parse a module from its textual form.
    pub fn parse(src: &str, registry: &'a DialectRegistry) -> Result<ModuleOp> {
        let tokens = Scanner::scan(src)?;
        let mut parser = Parser {
            src: src.to_string(),
            tokens,
            current: 0,
            registry,
            scopes: vec![],
            block_labels: vec![],
            pending_successors: vec![],
        };
        let op = parser.parse_op()?;
        parser.expect(TokenKind::Eof)?;
        ModuleOp::from_operation(op)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }
    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }
    fn advance(&mut self) -> Token {
        if self.peek().kind != TokenKind::Eof {
            self.current += 1;
        }
        self.previous().clone()
    }
    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }
    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let token = self.peek().clone();
            let msg = format!(
                "Expected {:?}, but got `{}` of kind {:?}",
                kind, token.lexeme, token.kind
            );
            Err(self.fail(&token, &msg))
        }
    }
    fn fail(&self, token: &Token, msg: &str) -> anyhow::Error {
        let msg = Scanner::error(&self.src, &token.location, msg);
        IrError::ParseFailure(format!("\n\n{msg}\n")).into()
    }

    fn resolve_value(&self, name: &str) -> Option<Shared<Value>> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).cloned())
    }

    fn parse_op(&mut self) -> Result<Shared<Operation>> {
        let mut result_tokens = vec![];
        if self.check(TokenKind::PercentIdentifier) {
            loop {
                result_tokens.push(self.expect(TokenKind::PercentIdentifier)?);
                if self.check(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect(TokenKind::Equal)?;
        }
        let name_token = self.expect(TokenKind::Str)?;
        let name = OpName::new(name_token.lexeme.trim_matches('"'));

        self.expect(TokenKind::LParen)?;
        let mut operands = vec![];
        let mut operand_tokens = vec![];
        while self.check(TokenKind::PercentIdentifier) {
            let token = self.expect(TokenKind::PercentIdentifier)?;
            let value = self
                .resolve_value(&token.lexeme)
                .ok_or_else(|| self.fail(&token, &format!("Undefined value {}", token.lexeme)))?;
            operands.push(value);
            operand_tokens.push(token);
            if self.check(TokenKind::Comma) {
                self.advance();
            }
        }
        self.expect(TokenKind::RParen)?;

        let mut successor_tokens = vec![];
        if self.check(TokenKind::LBracket) {
            self.advance();
            loop {
                successor_tokens.push(self.expect(TokenKind::CaretIdentifier)?);
                if self.check(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect(TokenKind::RBracket)?;
        }

        let mut regions = vec![];
        if self.check(TokenKind::LParen) {
            self.advance();
            loop {
                regions.push(self.parse_region()?);
                if self.check(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
        }

        let mut attributes = Attributes::new();
        if self.check(TokenKind::LBrace) {
            attributes = self.parse_attributes()?;
        }

        self.expect(TokenKind::Colon)?;
        self.expect(TokenKind::LParen)?;
        let mut operand_types = vec![];
        while !self.check(TokenKind::RParen) {
            operand_types.push(self.parse_type()?);
            if self.check(TokenKind::Comma) {
                self.advance();
            }
        }
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Arrow)?;
        let result_types = if self.check(TokenKind::LParen) {
            self.advance();
            let mut types = vec![];
            while !self.check(TokenKind::RParen) {
                types.push(self.parse_type()?);
                if self.check(TokenKind::Comma) {
                    self.advance();
                }
            }
            self.expect(TokenKind::RParen)?;
            types
        } else {
            vec![self.parse_type()?]
        };

        if operand_types.len() != operands.len() {
            let msg = format!(
                "Expected {} operand types, got {}",
                operands.len(),
                operand_types.len()
            );
            return Err(self.fail(&name_token, &msg));
        }
        for ((token, value), declared) in operand_tokens
            .iter()
            .zip(operands.iter())
            .zip(operand_types.iter())
        {
            let actual = value.rd().typ();
            if actual != *declared {
                let msg = format!(
                    "Value {} has type {actual}, but is used as {declared}",
                    token.lexeme
                );
                return Err(self.fail(token, &msg));
            }
        }
        if result_types.len() != result_tokens.len() {
            let msg = format!(
                "Expected {} result types, got {}",
                result_tokens.len(),
                result_types.len()
            );
            return Err(self.fail(&name_token, &msg));
        }

        let mut builder = OperationBuilder::new(name)
            .operands(operands)
            .attributes(attributes)
            .results(result_types);
        for region in regions {
            builder = builder.region(region);
        }
        let op = builder.build();

        if !successor_tokens.is_empty() {
            if self.pending_successors.is_empty() {
                let token = successor_tokens.first().unwrap().clone();
                return Err(self.fail(&token, "Successors are not allowed at the top level"));
            }
            self.pending_successors
                .last_mut()
                .unwrap()
                .push((op.clone(), successor_tokens));
        }

        // Reject shapes the schema forbids before the op is ever visible.
        self.registry.verify_operation(&op.rd())?;

        if !result_tokens.is_empty() {
            if self.scopes.is_empty() {
                let token = result_tokens.first().unwrap().clone();
                return Err(self.fail(&token, "Results are not allowed at the top level"));
            }
            let results = op.rd().results();
            let scope = self.scopes.last_mut().unwrap();
            for (token, value) in result_tokens.iter().zip(results) {
                scope.insert(token.lexeme.clone(), value);
            }
        }
        Ok(op)
    }

    fn parse_region(&mut self) -> Result<Shared<Region>> {
        self.expect(TokenKind::LBrace)?;
        let region = Shared::new(Region::new().into());
        self.block_labels.push(HashMap::new());
        self.pending_successors.push(vec![]);
        while !self.check(TokenKind::RBrace) {
            let block = self.parse_block()?;
            region.push_block(block);
        }
        self.expect(TokenKind::RBrace)?;
        if region.rd().is_empty() {
            // An empty body is still a block.
            region.add_block();
        }
        let labels = self.block_labels.pop().expect("no label table");
        let pending = self.pending_successors.pop().expect("no pending table");
        for (op, tokens) in pending {
            let mut successors = vec![];
            for token in tokens {
                let block = labels.get(&token.lexeme).ok_or_else(|| {
                    self.fail(&token, &format!("Undefined block {}", token.lexeme))
                })?;
                successors.push(weak(block));
            }
            op.wr().set_successors(successors);
        }
        Ok(region)
    }

    fn parse_block(&mut self) -> Result<Shared<Block>> {
        let block: Shared<Block> = Shared::new(Block::default().into());
        self.scopes.push(HashMap::new());
        let result = self.parse_block_inner(&block);
        self.scopes.pop();
        result?;
        Ok(block)
    }

    fn parse_block_inner(&mut self, block: &Shared<Block>) -> Result<()> {
        if self.check(TokenKind::CaretIdentifier) {
            let label = self.expect(TokenKind::CaretIdentifier)?;
            block
                .wr()
                .set_label(BlockName::Name(label.lexeme.clone()));
            let duplicate = self
                .block_labels
                .last()
                .expect("no label table")
                .contains_key(&label.lexeme);
            if duplicate {
                return Err(self.fail(&label, &format!("Duplicate block label {}", label.lexeme)));
            }
            self.block_labels
                .last_mut()
                .expect("no label table")
                .insert(label.lexeme.clone(), block.clone());
            if self.check(TokenKind::LParen) {
                self.advance();
                while self.check(TokenKind::PercentIdentifier) {
                    let name = self.expect(TokenKind::PercentIdentifier)?;
                    self.expect(TokenKind::Colon)?;
                    let typ = self.parse_type()?;
                    let argument = block.add_argument(typ);
                    let scope = self.scopes.last_mut().expect("no scope");
                    scope.insert(name.lexeme.clone(), argument);
                    if self.check(TokenKind::Comma) {
                        self.advance();
                    }
                }
                self.expect(TokenKind::RParen)?;
            }
            self.expect(TokenKind::Colon)?;
        }
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::CaretIdentifier) {
            let op = self.parse_op()?;
            block.push_op(op);
        }
        Ok(())
    }

    fn parse_attributes(&mut self) -> Result<Attributes> {
        self.expect(TokenKind::LBrace)?;
        let mut attributes = Attributes::new();
        while !self.check(TokenKind::RBrace) {
            let key = self.expect(TokenKind::Str)?;
            let key = key.lexeme.trim_matches('"').to_string();
            self.expect(TokenKind::Equal)?;
            let attribute = self.parse_attribute()?;
            attributes.insert(&key, attribute);
            if self.check(TokenKind::Comma) {
                self.advance();
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(attributes)
    }

    fn parse_attribute(&mut self) -> Result<Attribute> {
        if self.check(TokenKind::Integer) || self.check(TokenKind::Minus) {
            let negative = if self.check(TokenKind::Minus) {
                self.advance();
                true
            } else {
                false
            };
            let token = self.expect(TokenKind::Integer)?;
            let value: i64 = token
                .lexeme
                .parse()
                .map_err(|_| self.fail(&token, "Integer value out of range"))?;
            let value = if negative { -value } else { value };
            self.expect(TokenKind::Colon)?;
            let typ = self.parse_type()?;
            return Ok(Attribute::Integer(IntegerAttr::new(value, typ)));
        }
        if self.check(TokenKind::Str) {
            let token = self.advance();
            let text = token.lexeme.trim_matches('"');
            return Ok(Attribute::string(unescape(text)));
        }
        if self.check(TokenKind::LBracket) {
            self.advance();
            let mut items = vec![];
            while !self.check(TokenKind::RBracket) {
                items.push(self.parse_attribute()?);
                if self.check(TokenKind::Comma) {
                    self.advance();
                }
            }
            self.expect(TokenKind::RBracket)?;
            return Ok(Attribute::Array(items));
        }
        if self.check(TokenKind::LBrace) {
            self.advance();
            let mut entries = vec![];
            while !self.check(TokenKind::RBrace) {
                let key = self.expect(TokenKind::Str)?;
                let key = key.lexeme.trim_matches('"').to_string();
                self.expect(TokenKind::Equal)?;
                entries.push((key, self.parse_attribute()?));
                if self.check(TokenKind::Comma) {
                    self.advance();
                }
            }
            self.expect(TokenKind::RBrace)?;
            return Ok(Attribute::Dict(entries));
        }
        if self.check(TokenKind::Hash) {
            self.advance();
            let name = self.expect(TokenKind::BareIdentifier)?;
            let params = self.parse_angle_params()?;
            return Ok(Attribute::Parametrized {
                name: name.lexeme,
                params,
            });
        }
        Ok(Attribute::Typed(self.parse_type()?))
    }

    fn parse_angle_params(&mut self) -> Result<Vec<Attribute>> {
        let mut params = vec![];
        if self.check(TokenKind::Less) {
            self.advance();
            while !self.check(TokenKind::Greater) {
                params.push(self.parse_attribute()?);
                if self.check(TokenKind::Comma) {
                    self.advance();
                }
            }
            self.expect(TokenKind::Greater)?;
        }
        Ok(params)
    }

    fn parse_type(&mut self) -> Result<Type> {
        if self.check(TokenKind::IntType) {
            let token = self.advance();
            let bits = token.lexeme.strip_prefix('i').unwrap();
            let bits: u64 = bits
                .parse()
                .map_err(|_| self.fail(&token, "Integer type width out of range"))?;
            return Ok(Type::Integer(bits));
        }
        if self.check(TokenKind::BareIdentifier) && self.peek().lexeme == "index" {
            self.advance();
            return Ok(Type::Index);
        }
        if self.check(TokenKind::Exclamation) {
            self.advance();
            let name = self.expect(TokenKind::BareIdentifier)?;
            let params = self.parse_angle_params()?;
            return Ok(Type::Parametrized {
                name: name.lexeme,
                params,
            });
        }
        if self.check(TokenKind::LParen) {
            self.advance();
            let mut inputs = vec![];
            while !self.check(TokenKind::RParen) {
                inputs.push(self.parse_type()?);
                if self.check(TokenKind::Comma) {
                    self.advance();
                }
            }
            self.expect(TokenKind::RParen)?;
            self.expect(TokenKind::Arrow)?;
            let results = if self.check(TokenKind::LParen) {
                self.advance();
                let mut results = vec![];
                while !self.check(TokenKind::RParen) {
                    results.push(self.parse_type()?);
                    if self.check(TokenKind::Comma) {
                        self.advance();
                    }
                }
                self.expect(TokenKind::RParen)?;
                results
            } else {
                vec![self.parse_type()?]
            };
            return Ok(Type::Function { inputs, results });
        }
        let token = self.peek().clone();
        Err(self.fail(&token, &format!("Expected a type, got `{}`", token.lexeme)))
    }
}
