//! Recursive-descent parser for Ryx.
//!
//! The parser consumes the token stream and always produces a `Program`
//! node, collecting diagnostics as it goes. On a parse error it enters
//! panic mode: further diagnostics are suppressed until a synchronization
//! point (past the next `;`, or at a token that can start a declaration).
//!
//! Every unbounded loop carries two guards: a hard iteration cap, and a
//! cursor-progress check that forces an advance when an iteration failed
//! to consume anything. Malformed input therefore cannot hang the parser.

use crate::ast::{
    AssignOp, AstNode, BinaryOp, FieldDef, LiteralValue, Location, NodeKind, Param,
    StructLiteralField, UnaryOp,
};
use crate::error::{Diagnostic, ErrorList};
use crate::lexer::{Token, TokenKind, TokenValue};
use crate::types::Type;

const MAX_DECLARATIONS: usize = 50_000;
const MAX_BLOCK_STATEMENTS: usize = 10_000;
const MAX_STRUCT_FIELDS: usize = 1_000;
const MAX_IMPL_FUNCTIONS: usize = 500;
const MAX_CALL_ARGUMENTS: usize = 255;
const MAX_POSTFIX_CHAIN: usize = 100;

/// The outcome of a parse: a tree (possibly with subtrees missing where
/// errors occurred) and the ordered diagnostics.
#[derive(Debug)]
pub struct ParseResult {
    pub program: AstNode,
    pub errors: ErrorList,
}

impl ParseResult {
    pub fn had_error(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Parses a token stream (as produced by [`crate::lexer::scan`]) into a
/// `Program` node.
pub fn parse(tokens: &[Token<'_>], filename: &str) -> ParseResult {
    if tokens.is_empty() {
        return ParseResult {
            program: AstNode::new(NodeKind::Program { items: Vec::new() }, Location::new(1, 1)),
            errors: ErrorList::new(),
        };
    }
    let mut parser = Parser {
        tokens,
        current: 0,
        filename: filename.to_string(),
        panic_mode: false,
        errors: ErrorList::new(),
    };
    let program = parser.parse_program();
    ParseResult {
        program,
        errors: parser.errors,
    }
}

struct Parser<'t, 's> {
    tokens: &'t [Token<'s>],
    current: usize,
    filename: String,
    panic_mode: bool,
    errors: ErrorList,
}

impl<'t, 's> Parser<'t, 's> {
    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn peek(&self) -> Token<'s> {
        self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn previous(&self) -> Token<'s> {
        self.tokens[self.current.saturating_sub(1)]
    }

    fn advance(&mut self) -> Token<'s> {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.peek().kind == kind
    }

    fn match_kind(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            return true;
        }
        false
    }

    fn error_at(&mut self, token: Token<'s>, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.errors.add(Diagnostic::new(
            message,
            self.filename.clone(),
            token.line,
            token.column,
        ));
    }

    fn error_at_current(&mut self, message: &str) {
        self.error_at(self.peek(), message);
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Option<Token<'s>> {
        if self.check(kind) {
            return Some(self.advance());
        }
        self.error_at_current(message);
        None
    }

    /// Discards tokens until a plausible statement boundary: just past a
    /// `;`, or at a token from the declaration-starter set.
    fn synchronize(&mut self) {
        self.panic_mode = false;
        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }
            match self.peek().kind {
                TokenKind::Fn
                | TokenKind::Let
                | TokenKind::If
                | TokenKind::While
                | TokenKind::For
                | TokenKind::Loop
                | TokenKind::Return
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::Struct
                | TokenKind::Impl => return,
                _ => {}
            }
            self.advance();
        }
    }

    fn location(token: Token<'s>) -> Location {
        Location::new(token.line, token.column)
    }

    // ------------------------------------------------------------------
    // Program and declarations
    // ------------------------------------------------------------------

    fn parse_program(&mut self) -> AstNode {
        let mut items = Vec::new();
        let mut iterations = 0usize;
        let mut prev_position = self.current;
        let mut stuck_count = 0u32;

        while !self.is_at_end() {
            iterations += 1;
            if iterations > MAX_DECLARATIONS {
                self.error_at_current("Program too large or parser stuck in infinite loop");
                break;
            }

            if self.current == prev_position {
                stuck_count += 1;
                if stuck_count > 5 {
                    self.error_at_current("Parser stuck at same position - forcing advance");
                    self.advance();
                    if stuck_count > 10 {
                        self.error_at_current("Parser repeatedly stuck - aborting parse");
                        break;
                    }
                }
            } else {
                stuck_count = 0;
            }
            prev_position = self.current;

            if let Some(decl) = self.declaration() {
                items.push(decl);
            }
            if self.panic_mode {
                self.synchronize();
            }
        }

        AstNode::new(NodeKind::Program { items }, Location::new(1, 1))
    }

    fn declaration(&mut self) -> Option<AstNode> {
        if self.match_kind(TokenKind::Include) {
            return self.include_directive();
        }
        if self.match_kind(TokenKind::Extern) {
            return self.extern_declaration();
        }
        if self.match_kind(TokenKind::Fn) {
            return self.function_declaration();
        }
        if self.match_kind(TokenKind::Struct) {
            return self.struct_declaration();
        }
        if self.match_kind(TokenKind::Impl) {
            return self.impl_block();
        }
        if self.match_kind(TokenKind::Let) {
            return self.let_statement();
        }
        self.statement()
    }

    fn include_directive(&mut self) -> Option<AstNode> {
        let include_token = self.previous();
        self.consume(TokenKind::LParen, "Expected '(' after 'include'")?;
        let path_token = self.consume(
            TokenKind::StringLiteral,
            "Expected string literal for include path",
        )?;
        let path = string_contents(path_token.lexeme);
        self.consume(TokenKind::RParen, "Expected ')' after include path")?;
        self.consume(TokenKind::Semicolon, "Expected ';' after include statement")?;
        Some(AstNode::new(
            NodeKind::Include {
                path,
                is_system: true,
            },
            Self::location(include_token),
        ))
    }

    fn extern_declaration(&mut self) -> Option<AstNode> {
        let extern_token = self.previous();

        if self.match_kind(TokenKind::Struct) {
            let name = self.consume(TokenKind::Identifier, "Expected struct name")?;
            self.consume(
                TokenKind::Semicolon,
                "Expected ';' after extern struct declaration",
            )?;
            return Some(AstNode::new(
                NodeKind::Struct {
                    name: name.lexeme.to_string(),
                    fields: Vec::new(),
                    is_extern: true,
                },
                Self::location(extern_token),
            ));
        }

        self.consume(TokenKind::Fn, "Expected 'fn' or 'struct' after 'extern'")?;
        let name = self.consume(TokenKind::Identifier, "Expected function name")?;
        self.consume(TokenKind::LParen, "Expected '(' after function name")?;
        let params = self.parameter_list()?;
        self.consume(TokenKind::RParen, "Expected ')' after parameters")?;

        let return_type = if self.match_kind(TokenKind::Arrow) {
            self.parse_type()?
        } else {
            Type::Void
        };
        self.consume(
            TokenKind::Semicolon,
            "Expected ';' after extern function declaration",
        )?;

        Some(AstNode::new(
            NodeKind::ExternFunction {
                name: name.lexeme.to_string(),
                params,
                return_type,
            },
            Self::location(extern_token),
        ))
    }

    fn function_declaration(&mut self) -> Option<AstNode> {
        let fn_token = self.previous();
        let name = self.consume(TokenKind::Identifier, "Expected function name")?;
        self.consume(TokenKind::LParen, "Expected '(' after function name")?;
        let params = self.parameter_list()?;
        self.consume(TokenKind::RParen, "Expected ')' after parameters")?;

        let return_type = if self.match_kind(TokenKind::Arrow) {
            self.parse_type()?
        } else {
            Type::Void
        };

        self.consume(TokenKind::LBrace, "Expected '{' before function body")?;
        let body = self.block_statement();

        Some(AstNode::new(
            NodeKind::Function {
                name: name.lexeme.to_string(),
                params,
                return_type,
                body: Box::new(body),
            },
            Self::location(fn_token),
        ))
    }

    fn parameter_list(&mut self) -> Option<Vec<Param>> {
        let mut params = Vec::new();
        if self.check(TokenKind::RParen) {
            return Some(params);
        }
        loop {
            if params.len() >= MAX_CALL_ARGUMENTS {
                self.error_at_current("Too many parameters");
                return None;
            }
            let name = self.consume(TokenKind::Identifier, "Expected parameter name")?;
            self.consume(TokenKind::Colon, "Expected ':' after parameter name")?;
            let ty = self.parse_type()?;
            params.push(Param {
                name: name.lexeme.to_string(),
                ty,
            });
            if !self.match_kind(TokenKind::Comma) {
                break;
            }
        }
        Some(params)
    }

    fn struct_declaration(&mut self) -> Option<AstNode> {
        let struct_token = self.previous();
        let name = self.consume(TokenKind::Identifier, "Expected struct name")?;
        self.consume(TokenKind::LBrace, "Expected '{' after struct name")?;

        let mut fields = Vec::new();
        let mut iterations = 0usize;
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            iterations += 1;
            if iterations > MAX_STRUCT_FIELDS {
                self.error_at_current("Too many struct fields or parser stuck in loop");
                break;
            }

            let Some(field_name) = self.consume(TokenKind::Identifier, "Expected field name")
            else {
                break;
            };
            if self
                .consume(TokenKind::Colon, "Expected ':' after field name")
                .is_none()
            {
                break;
            }
            let Some(ty) = self.parse_type() else { break };
            fields.push(FieldDef {
                name: field_name.lexeme.to_string(),
                ty,
            });

            if !self.match_kind(TokenKind::Comma) {
                break;
            }
        }

        self.consume(TokenKind::RBrace, "Expected '}' after struct fields")?;
        Some(AstNode::new(
            NodeKind::Struct {
                name: name.lexeme.to_string(),
                fields,
                is_extern: false,
            },
            Self::location(struct_token),
        ))
    }

    fn impl_block(&mut self) -> Option<AstNode> {
        let impl_token = self.previous();
        let name = self.consume(TokenKind::Identifier, "Expected struct name after 'impl'")?;
        self.consume(TokenKind::LBrace, "Expected '{' after struct name")?;

        let mut functions = Vec::new();
        let mut iterations = 0usize;
        let mut prev_position = usize::MAX;

        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            iterations += 1;
            if iterations > MAX_IMPL_FUNCTIONS {
                self.error_at_current("Too many functions in impl block or parser stuck in loop");
                break;
            }

            if prev_position != usize::MAX && self.current == prev_position {
                self.error_at_current("Parser stuck in impl block parsing");
                self.advance();
                if iterations > 10 {
                    break;
                }
            }
            prev_position = self.current;

            if self.match_kind(TokenKind::Fn) {
                if let Some(function) = self.function_declaration() {
                    functions.push(function);
                }
            } else {
                self.error_at_current("Expected 'fn' in impl block");
                self.synchronize();
            }
        }

        self.consume(TokenKind::RBrace, "Expected '}' after impl block")?;
        Some(AstNode::new(
            NodeKind::Impl {
                struct_name: name.lexeme.to_string(),
                functions,
            },
            Self::location(impl_token),
        ))
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn statement(&mut self) -> Option<AstNode> {
        if self.match_kind(TokenKind::If) {
            return self.if_statement();
        }
        if self.match_kind(TokenKind::While) {
            return self.while_statement();
        }
        if self.match_kind(TokenKind::For) {
            return self.for_statement();
        }
        if self.match_kind(TokenKind::Loop) {
            return self.loop_statement();
        }
        if self.match_kind(TokenKind::Return) {
            return self.return_statement();
        }
        if self.match_kind(TokenKind::Break) {
            return self.break_statement();
        }
        if self.match_kind(TokenKind::Continue) {
            return self.continue_statement();
        }
        if self.match_kind(TokenKind::LBrace) {
            return Some(self.block_statement());
        }
        self.expression_statement()
    }

    /// Parses the inside of a block; the opening `{` is already consumed.
    /// A trailing expression without `;` becomes the block's value.
    fn block_statement(&mut self) -> AstNode {
        let open = self.previous();
        let mut statements = Vec::new();
        let mut final_expr = None;

        let mut iterations = 0usize;
        let mut prev_position = self.current;
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            iterations += 1;
            if iterations > MAX_BLOCK_STATEMENTS {
                self.error_at_current("Block too large or parser stuck in loop");
                break;
            }
            if self.current == prev_position && iterations > 1 {
                self.error_at_current("Parser made no progress inside block - forcing advance");
                self.advance();
            }
            prev_position = self.current;

            if self.check(TokenKind::Let)
                || self.check(TokenKind::Fn)
                || self.check(TokenKind::Struct)
            {
                if let Some(decl) = self.declaration() {
                    statements.push(decl);
                }
            } else if self.check(TokenKind::If)
                || self.check(TokenKind::While)
                || self.check(TokenKind::For)
                || self.check(TokenKind::Loop)
                || self.check(TokenKind::Return)
                || self.check(TokenKind::Break)
                || self.check(TokenKind::Continue)
                || self.check(TokenKind::LBrace)
            {
                if let Some(stmt) = self.statement() {
                    statements.push(stmt);
                }
            } else {
                let expr = self.expression();
                if self.match_kind(TokenKind::Semicolon) {
                    if let Some(expr) = expr {
                        statements.push(expr);
                    }
                } else if self.check(TokenKind::RBrace) {
                    final_expr = expr.map(Box::new);
                    break;
                } else {
                    self.error_at_current("Expected ';' or '}' after expression");
                }
            }

            if self.panic_mode {
                self.synchronize();
            }
        }

        self.consume(TokenKind::RBrace, "Expected '}' after block");
        AstNode::new(
            NodeKind::Block {
                statements,
                final_expr,
            },
            Self::location(open),
        )
    }

    fn if_statement(&mut self) -> Option<AstNode> {
        let if_token = self.previous();
        self.consume(TokenKind::LParen, "Expected '(' after 'if'")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RParen, "Expected ')' after if condition")?;
        self.consume(TokenKind::LBrace, "Expected '{' after if condition")?;
        let then_branch = self.block_statement();

        let else_branch = if self.match_kind(TokenKind::Else) {
            if self.match_kind(TokenKind::If) {
                Some(Box::new(self.if_statement()?))
            } else {
                self.consume(TokenKind::LBrace, "Expected '{' after 'else'")?;
                Some(Box::new(self.block_statement()))
            }
        } else {
            None
        };

        Some(AstNode::new(
            NodeKind::If {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch,
            },
            Self::location(if_token),
        ))
    }

    fn while_statement(&mut self) -> Option<AstNode> {
        let while_token = self.previous();
        self.consume(TokenKind::LParen, "Expected '(' after 'while'")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RParen, "Expected ')' after while condition")?;
        self.consume(TokenKind::LBrace, "Expected '{' after while condition")?;
        let body = self.block_statement();

        Some(AstNode::new(
            NodeKind::While {
                condition: Box::new(condition),
                body: Box::new(body),
            },
            Self::location(while_token),
        ))
    }

    fn for_statement(&mut self) -> Option<AstNode> {
        let for_token = self.previous();
        let iterator = self.consume(TokenKind::Identifier, "Expected iterator name")?;

        // An annotation is accepted but ignored: the iterator is i32.
        if self.match_kind(TokenKind::Colon) {
            self.parse_type()?;
        }

        self.consume(TokenKind::In, "Expected 'in' in for loop")?;
        let start = self.expression()?;
        self.consume(TokenKind::DotDot, "Expected '..' in for range")?;
        let end = self.expression()?;
        self.consume(TokenKind::LBrace, "Expected '{' after for header")?;
        let body = self.block_statement();

        Some(AstNode::new(
            NodeKind::For {
                iterator: iterator.lexeme.to_string(),
                start: Box::new(start),
                end: Box::new(end),
                body: Box::new(body),
            },
            Self::location(for_token),
        ))
    }

    fn loop_statement(&mut self) -> Option<AstNode> {
        let loop_token = self.previous();
        self.consume(TokenKind::LBrace, "Expected '{' after 'loop'")?;
        let body = self.block_statement();
        Some(AstNode::new(
            NodeKind::Loop {
                body: Box::new(body),
            },
            Self::location(loop_token),
        ))
    }

    fn return_statement(&mut self) -> Option<AstNode> {
        let return_token = self.previous();
        let value = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(Box::new(self.expression()?))
        };
        self.consume(TokenKind::Semicolon, "Expected ';' after return value")?;
        Some(AstNode::new(
            NodeKind::Return { value },
            Self::location(return_token),
        ))
    }

    fn break_statement(&mut self) -> Option<AstNode> {
        let break_token = self.previous();
        self.consume(TokenKind::Semicolon, "Expected ';' after 'break'")?;
        Some(AstNode::new(NodeKind::Break, Self::location(break_token)))
    }

    fn continue_statement(&mut self) -> Option<AstNode> {
        let continue_token = self.previous();
        self.consume(TokenKind::Semicolon, "Expected ';' after 'continue'")?;
        Some(AstNode::new(
            NodeKind::Continue,
            Self::location(continue_token),
        ))
    }

    fn let_statement(&mut self) -> Option<AstNode> {
        let let_token = self.previous();
        let mutable = self.match_kind(TokenKind::Mut);
        let name = self.consume(TokenKind::Identifier, "Expected variable name")?;

        let ty = if self.match_kind(TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let value = if self.match_kind(TokenKind::Eq) {
            Some(Box::new(self.expression()?))
        } else {
            None
        };

        self.consume(
            TokenKind::Semicolon,
            "Expected ';' after variable declaration",
        )?;
        Some(AstNode::new(
            NodeKind::Let {
                name: name.lexeme.to_string(),
                ty,
                value,
                mutable,
            },
            Self::location(let_token),
        ))
    }

    fn expression_statement(&mut self) -> Option<AstNode> {
        let expr = self.expression();
        if self.check(TokenKind::Semicolon) {
            self.advance();
        }
        expr
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    fn parse_type(&mut self) -> Option<Type> {
        if self.match_kind(TokenKind::And) {
            let mutable = self.match_kind(TokenKind::Mut);
            let referent = self.parse_type()?;
            return Some(Type::reference(referent, mutable));
        }

        if self.match_kind(TokenKind::Star) {
            let pointee = self.parse_type()?;
            return Some(Type::pointer(pointee));
        }

        if self.match_kind(TokenKind::LBracket) {
            let element = self.parse_type()?;
            self.consume(TokenKind::Semicolon, "Expected ';' in array type")?;
            let size_token = self.consume(TokenKind::IntLiteral, "Expected array size")?;
            self.consume(TokenKind::RBracket, "Expected ']' after array type")?;
            let size = match size_token.value {
                Some(TokenValue::Int(v)) if v >= 0 => v as usize,
                _ => 0,
            };
            return Some(Type::array(element, size));
        }

        if let Some(primitive) = Type::from_token(self.peek().kind) {
            self.advance();
            return Some(primitive);
        }

        if self.match_kind(TokenKind::Identifier) {
            return Some(Type::structure(self.previous().lexeme));
        }

        self.error_at_current("Expected type");
        None
    }

    // ------------------------------------------------------------------
    // Expressions, lowest to highest precedence
    // ------------------------------------------------------------------

    fn expression(&mut self) -> Option<AstNode> {
        self.assignment()
    }

    fn assignment(&mut self) -> Option<AstNode> {
        let expr = self.logical_or()?;

        let op = match self.peek().kind {
            TokenKind::Eq => Some(AssignOp::Assign),
            TokenKind::PlusEq => Some(AssignOp::AddAssign),
            TokenKind::MinusEq => Some(AssignOp::SubAssign),
            TokenKind::StarEq => Some(AssignOp::MulAssign),
            TokenKind::SlashEq => Some(AssignOp::DivAssign),
            _ => None,
        };

        if let Some(op) = op {
            let op_token = self.advance();
            // Right-associative: a = b = c parses as a = (b = c).
            let value = self.assignment()?;
            return Some(AstNode::new(
                NodeKind::Assignment {
                    target: Box::new(expr),
                    op,
                    value: Box::new(value),
                },
                Self::location(op_token),
            ));
        }

        Some(expr)
    }

    fn logical_or(&mut self) -> Option<AstNode> {
        let mut expr = self.logical_and()?;
        while self.match_kind(TokenKind::OrOr) {
            let op_token = self.previous();
            let right = self.logical_and()?;
            expr = binary(expr, BinaryOp::LogicalOr, right, op_token);
        }
        Some(expr)
    }

    fn logical_and(&mut self) -> Option<AstNode> {
        let mut expr = self.bitwise_or()?;
        while self.match_kind(TokenKind::AndAnd) {
            let op_token = self.previous();
            let right = self.bitwise_or()?;
            expr = binary(expr, BinaryOp::LogicalAnd, right, op_token);
        }
        Some(expr)
    }

    fn bitwise_or(&mut self) -> Option<AstNode> {
        let mut expr = self.bitwise_xor()?;
        while self.match_kind(TokenKind::Or) {
            let op_token = self.previous();
            let right = self.bitwise_xor()?;
            expr = binary(expr, BinaryOp::BitOr, right, op_token);
        }
        Some(expr)
    }

    fn bitwise_xor(&mut self) -> Option<AstNode> {
        let mut expr = self.bitwise_and()?;
        while self.match_kind(TokenKind::Xor) {
            let op_token = self.previous();
            let right = self.bitwise_and()?;
            expr = binary(expr, BinaryOp::BitXor, right, op_token);
        }
        Some(expr)
    }

    fn bitwise_and(&mut self) -> Option<AstNode> {
        let mut expr = self.equality()?;
        while self.match_kind(TokenKind::And) {
            let op_token = self.previous();
            let right = self.equality()?;
            expr = binary(expr, BinaryOp::BitAnd, right, op_token);
        }
        Some(expr)
    }

    fn equality(&mut self) -> Option<AstNode> {
        let mut expr = self.comparison()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::NotEq,
                _ => break,
            };
            let op_token = self.advance();
            let right = self.comparison()?;
            expr = binary(expr, op, right, op_token);
        }
        Some(expr)
    }

    fn comparison(&mut self) -> Option<AstNode> {
        let mut expr = self.cast()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::LtEq => BinaryOp::LtEq,
                TokenKind::GtEq => BinaryOp::GtEq,
                _ => break,
            };
            let op_token = self.advance();
            let right = self.cast()?;
            expr = binary(expr, op, right, op_token);
        }
        Some(expr)
    }

    fn cast(&mut self) -> Option<AstNode> {
        let mut expr = self.shift()?;
        while self.match_kind(TokenKind::As) {
            let as_token = self.previous();
            let Some(target_type) = self.parse_type() else {
                self.error_at_current("Expected type after 'as'");
                return Some(expr);
            };
            expr = AstNode::new(
                NodeKind::Cast {
                    expression: Box::new(expr),
                    target_type,
                },
                Self::location(as_token),
            );
        }
        Some(expr)
    }

    fn shift(&mut self) -> Option<AstNode> {
        let mut expr = self.term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Shl => BinaryOp::Shl,
                TokenKind::Shr => BinaryOp::Shr,
                _ => break,
            };
            let op_token = self.advance();
            let right = self.term()?;
            expr = binary(expr, op, right, op_token);
        }
        Some(expr)
    }

    fn term(&mut self) -> Option<AstNode> {
        let mut expr = self.factor()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            let op_token = self.advance();
            let right = self.factor()?;
            expr = binary(expr, op, right, op_token);
        }
        Some(expr)
    }

    fn factor(&mut self) -> Option<AstNode> {
        let mut expr = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => break,
            };
            let op_token = self.advance();
            let right = self.unary()?;
            expr = binary(expr, op, right, op_token);
        }
        Some(expr)
    }

    fn unary(&mut self) -> Option<AstNode> {
        let op = match self.peek().kind {
            TokenKind::Not => Some(UnaryOp::Not),
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Star => Some(UnaryOp::Deref),
            _ => None,
        };
        if let Some(op) = op {
            let op_token = self.advance();
            let operand = self.unary()?;
            return Some(AstNode::new(
                NodeKind::Unary {
                    op,
                    operand: Box::new(operand),
                    is_mut_ref: false,
                },
                Self::location(op_token),
            ));
        }

        if self.match_kind(TokenKind::And) {
            let op_token = self.previous();
            let is_mut_ref = self.match_kind(TokenKind::Mut);
            let operand = self.unary()?;
            return Some(AstNode::new(
                NodeKind::Unary {
                    op: UnaryOp::AddrOf,
                    operand: Box::new(operand),
                    is_mut_ref,
                },
                Self::location(op_token),
            ));
        }

        self.call()
    }

    /// Postfix expressions: calls, indexing, field access, and `::` paths
    /// (which fold into a single mangle-ready identifier).
    fn call(&mut self) -> Option<AstNode> {
        let mut expr = self.primary()?;

        let mut iterations = 0usize;
        loop {
            iterations += 1;
            if iterations > MAX_POSTFIX_CHAIN {
                self.error_at_current("Expression chain too deep (possible infinite loop)");
                break;
            }

            if self.match_kind(TokenKind::LParen) {
                let lparen = self.previous();
                let mut arguments = Vec::new();
                if !self.check(TokenKind::RParen) {
                    loop {
                        if arguments.len() >= MAX_CALL_ARGUMENTS {
                            self.error_at_current("Too many call arguments");
                            break;
                        }
                        arguments.push(self.expression()?);
                        if !self.match_kind(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.consume(TokenKind::RParen, "Expected ')' after arguments")?;
                expr = AstNode::new(
                    NodeKind::Call {
                        callee: Box::new(expr),
                        arguments,
                    },
                    Self::location(lparen),
                );
            } else if self.match_kind(TokenKind::LBracket) {
                let lbracket = self.previous();
                let index = self.expression()?;
                self.consume(TokenKind::RBracket, "Expected ']' after index")?;
                expr = AstNode::new(
                    NodeKind::Index {
                        array: Box::new(expr),
                        index: Box::new(index),
                    },
                    Self::location(lbracket),
                );
            } else if self.match_kind(TokenKind::Dot) {
                let dot = self.previous();
                let field = self.consume(TokenKind::Identifier, "Expected field name after '.'")?;
                expr = AstNode::new(
                    NodeKind::Field {
                        object: Box::new(expr),
                        field_name: field.lexeme.to_string(),
                    },
                    Self::location(dot),
                );
            } else if self.match_kind(TokenKind::ColonColon) {
                let method =
                    self.consume(TokenKind::Identifier, "Expected method name after '::'")?;
                match &expr.kind {
                    NodeKind::Identifier { name } => {
                        expr = AstNode::new(
                            NodeKind::Identifier {
                                name: format!("{name}::{}", method.lexeme),
                            },
                            Self::location(method),
                        );
                    }
                    _ => {
                        self.error_at(method, "Expected identifier before '::'");
                    }
                }
            } else {
                break;
            }
        }

        Some(expr)
    }

    fn primary(&mut self) -> Option<AstNode> {
        if self.peek().kind == TokenKind::Error {
            // The lexeme of an error token is its diagnostic message.
            let message = self.peek().lexeme.to_string();
            self.error_at_current(&message);
            self.advance();
            return None;
        }

        if self.match_kind(TokenKind::True) {
            return Some(AstNode::typed(
                NodeKind::Literal(LiteralValue::Bool(true)),
                Self::location(self.previous()),
                Type::Bool,
            ));
        }
        if self.match_kind(TokenKind::False) {
            return Some(AstNode::typed(
                NodeKind::Literal(LiteralValue::Bool(false)),
                Self::location(self.previous()),
                Type::Bool,
            ));
        }

        if self.match_kind(TokenKind::IntLiteral) {
            let token = self.previous();
            let value = match token.value {
                Some(TokenValue::Int(v)) => v,
                _ => 0,
            };
            // Integer literals default to i32.
            return Some(AstNode::typed(
                NodeKind::Literal(LiteralValue::Int(value)),
                Self::location(token),
                Type::I32,
            ));
        }

        if self.match_kind(TokenKind::FloatLiteral) {
            let token = self.previous();
            let value = match token.value {
                Some(TokenValue::Float(v)) => v,
                _ => 0.0,
            };
            return Some(AstNode::typed(
                NodeKind::Literal(LiteralValue::Float(value)),
                Self::location(token),
                Type::F64,
            ));
        }

        if self.match_kind(TokenKind::StringLiteral) {
            let token = self.previous();
            return Some(AstNode::typed(
                NodeKind::Literal(LiteralValue::Str(string_contents(token.lexeme))),
                Self::location(token),
                Type::Str,
            ));
        }

        if self.match_kind(TokenKind::CharLiteral) {
            let token = self.previous();
            let value = match token.value {
                Some(TokenValue::Char(c)) => c,
                _ => '\0',
            };
            return Some(AstNode::typed(
                NodeKind::Literal(LiteralValue::Char(value)),
                Self::location(token),
                Type::Char,
            ));
        }

        if self.match_kind(TokenKind::Identifier) {
            let name_token = self.previous();
            if self.check(TokenKind::LBrace) {
                if let Some(node) = self.try_struct_literal(name_token) {
                    return Some(node);
                }
            }
            return Some(AstNode::new(
                NodeKind::Identifier {
                    name: name_token.lexeme.to_string(),
                },
                Self::location(name_token),
            ));
        }

        if self.match_kind(TokenKind::LBracket) {
            return self.array_literal();
        }

        if self.match_kind(TokenKind::LParen) {
            let expr = self.expression()?;
            self.consume(TokenKind::RParen, "Expected ')' after expression")?;
            return Some(expr);
        }

        self.error_at_current("Expected expression");
        None
    }

    /// Disambiguates `Name { ... }` between a struct literal and an
    /// identifier followed by a block. Looks one token past the `{`: a `}`
    /// or an identifier followed by `:` means struct literal. The
    /// non-literal path consumes nothing.
    fn try_struct_literal(&mut self, name_token: Token<'s>) -> Option<AstNode> {
        let saved = self.current;
        self.advance(); // {

        let is_struct_literal = if self.check(TokenKind::RBrace) {
            true
        } else if self.check(TokenKind::Identifier) {
            let saved_inner = self.current;
            self.advance();
            let colon = self.check(TokenKind::Colon);
            self.current = saved_inner;
            colon
        } else {
            false
        };

        if !is_struct_literal {
            self.current = saved;
            return None;
        }

        let mut fields = Vec::new();
        let mut iterations = 0usize;
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            iterations += 1;
            if iterations > MAX_STRUCT_FIELDS {
                self.error_at_current("Too many fields in struct literal");
                break;
            }

            let field_name = self.consume(TokenKind::Identifier, "Expected field name")?;
            self.consume(TokenKind::Colon, "Expected ':' after field name")?;
            let value = self.expression()?;
            fields.push(StructLiteralField {
                name: field_name.lexeme.to_string(),
                value,
            });

            if !self.match_kind(TokenKind::Comma) {
                break;
            }
        }

        self.consume(TokenKind::RBrace, "Expected '}' after struct fields")?;
        Some(AstNode::new(
            NodeKind::StructLiteral {
                struct_name: name_token.lexeme.to_string(),
                fields,
            },
            Self::location(name_token),
        ))
    }

    fn array_literal(&mut self) -> Option<AstNode> {
        let lbracket = self.previous();
        let mut elements = Vec::new();
        while !self.check(TokenKind::RBracket) && !self.is_at_end() {
            if elements.len() >= MAX_CALL_ARGUMENTS {
                self.error_at_current("Too many array literal elements");
                break;
            }
            elements.push(self.expression()?);
            if !self.match_kind(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::RBracket, "Expected ']' after array elements")?;
        Some(AstNode::new(
            NodeKind::ArrayLiteral { elements },
            Self::location(lbracket),
        ))
    }
}

fn binary(left: AstNode, op: BinaryOp, right: AstNode, op_token: Token<'_>) -> AstNode {
    AstNode::new(
        NodeKind::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
        Location::new(op_token.line, op_token.column),
    )
}

/// Strips the delimiting quotes from a string literal lexeme, keeping the
/// escape sequences inside raw.
fn string_contents(lexeme: &str) -> String {
    lexeme[1..lexeme.len().saturating_sub(1)].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::scan;

    fn parse_source(source: &str) -> ParseResult {
        let tokens = scan(source);
        parse(&tokens, "test.ryx")
    }

    fn parse_clean(source: &str) -> AstNode {
        let result = parse_source(source);
        assert!(
            !result.had_error(),
            "unexpected errors: {:?}",
            result.errors.iter().collect::<Vec<_>>()
        );
        result.program
    }

    fn single_item(program: &AstNode) -> &AstNode {
        match &program.kind {
            NodeKind::Program { items } => {
                assert_eq!(items.len(), 1, "expected one item");
                &items[0]
            }
            _ => panic!("not a program"),
        }
    }

    #[test]
    fn parses_minimal_function() {
        let program = parse_clean("fn main() -> i32 { return 0; }");
        match &single_item(&program).kind {
            NodeKind::Function {
                name,
                params,
                return_type,
                body,
            } => {
                assert_eq!(name, "main");
                assert!(params.is_empty());
                assert_eq!(*return_type, Type::I32);
                assert!(matches!(body.kind, NodeKind::Block { .. }));
            }
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn omitted_return_type_is_void() {
        let program = parse_clean("fn side_effect() { }");
        match &single_item(&program).kind {
            NodeKind::Function { return_type, .. } => assert_eq!(*return_type, Type::Void),
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let program = parse_clean("fn f() { let x: i32 = 1 + 2 * 3; }");
        let function = single_item(&program);
        let NodeKind::Function { body, .. } = &function.kind else {
            panic!("expected function");
        };
        let NodeKind::Block { statements, .. } = &body.kind else {
            panic!("expected block");
        };
        let NodeKind::Let { value: Some(value), .. } = &statements[0].kind else {
            panic!("expected let with initializer");
        };
        let NodeKind::Binary { op, right, .. } = &value.kind else {
            panic!("expected binary initializer");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(
            matches!(&right.kind, NodeKind::Binary { op: BinaryOp::Mul, .. }),
            "rhs should be the multiplication"
        );
    }

    #[test]
    fn literals_carry_their_default_types() {
        let program = parse_clean("fn f() { 1; 2.5; \"s\"; 'c'; true; }");
        let NodeKind::Function { body, .. } = &single_item(&program).kind else {
            panic!("expected function");
        };
        let NodeKind::Block { statements, .. } = &body.kind else {
            panic!("expected block");
        };
        let types: Vec<_> = statements
            .iter()
            .map(|s| s.resolved_type.clone().expect("literal typed at parse"))
            .collect();
        assert_eq!(
            types,
            vec![Type::I32, Type::F64, Type::Str, Type::Char, Type::Bool]
        );
    }

    #[test]
    fn folds_double_colon_paths_into_identifiers() {
        let program = parse_clean("fn f() { Vec2::new(1, 2); }");
        let NodeKind::Function { body, .. } = &single_item(&program).kind else {
            panic!("expected function");
        };
        let NodeKind::Block { statements, .. } = &body.kind else {
            panic!("expected block");
        };
        let NodeKind::Call { callee, arguments } = &statements[0].kind else {
            panic!("expected call");
        };
        assert!(
            matches!(&callee.kind, NodeKind::Identifier { name } if name == "Vec2::new"),
            "callee should be the folded path"
        );
        assert_eq!(arguments.len(), 2);
    }

    #[test]
    fn distinguishes_struct_literal_from_block() {
        let program = parse_clean("fn f() { let p: P = P { x: 1, y: 2 }; }");
        let NodeKind::Function { body, .. } = &single_item(&program).kind else {
            panic!("expected function");
        };
        let NodeKind::Block { statements, .. } = &body.kind else {
            panic!("expected block");
        };
        let NodeKind::Let { value: Some(value), .. } = &statements[0].kind else {
            panic!("expected let");
        };
        let NodeKind::StructLiteral {
            struct_name,
            fields,
        } = &value.kind
        else {
            panic!("expected struct literal, got {:?}", value.kind);
        };
        assert_eq!(struct_name, "P");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name, "x");
    }

    #[test]
    fn empty_struct_literal_parses() {
        let program = parse_clean("fn f() { let u: Unit = Unit { }; }");
        assert!(format!("{program:?}").contains("StructLiteral"));
    }

    #[test]
    fn identifier_before_plain_block_stays_identifier() {
        // The range end `n` is followed by `{`, but the token after the
        // `{` is a call, not `field:`. The lookahead must back off without
        // consuming, so the `{` still opens the loop body.
        let program = parse_clean("fn f(n: i32) { for i in 0..n { println(i); } }");
        let NodeKind::Function { body, .. } = &single_item(&program).kind else {
            panic!("expected function");
        };
        let NodeKind::Block { statements, .. } = &body.kind else {
            panic!("expected block");
        };
        let NodeKind::For { end, .. } = &statements[0].kind else {
            panic!("expected for loop, got {:?}", statements[0].kind);
        };
        assert!(matches!(&end.kind, NodeKind::Identifier { name } if name == "n"));
    }

    #[test]
    fn parses_struct_and_impl_declarations() {
        let program = parse_clean(
            "struct P { x: i32, y: i32 }\n\
             impl P { fn sum(self: P) -> i32 { return self.x + self.y; } }",
        );
        let NodeKind::Program { items } = &program.kind else {
            panic!("expected program");
        };
        assert!(matches!(
            &items[0].kind,
            NodeKind::Struct { name, fields, is_extern: false } if name == "P" && fields.len() == 2
        ));
        let NodeKind::Impl {
            struct_name,
            functions,
        } = &items[1].kind
        else {
            panic!("expected impl");
        };
        assert_eq!(struct_name, "P");
        assert_eq!(functions.len(), 1);
    }

    #[test]
    fn parses_extern_declarations() {
        let program = parse_clean(
            "extern struct GLFWwindow;\n\
             extern fn glfwInit() -> i32;\n\
             extern fn glfwSwapBuffers(window: *GLFWwindow);",
        );
        let NodeKind::Program { items } = &program.kind else {
            panic!("expected program");
        };
        assert!(matches!(
            &items[0].kind,
            NodeKind::Struct { is_extern: true, .. }
        ));
        assert!(matches!(
            &items[1].kind,
            NodeKind::ExternFunction { return_type, .. } if *return_type == Type::I32
        ));
        let NodeKind::ExternFunction { params, .. } = &items[2].kind else {
            panic!("expected extern fn");
        };
        assert_eq!(params[0].ty, Type::pointer(Type::structure("GLFWwindow")));
    }

    #[test]
    fn parses_include_directive() {
        let program = parse_clean("include(\"GL/glut.h\");");
        assert!(matches!(
            &single_item(&program).kind,
            NodeKind::Include { path, is_system: true } if path == "GL/glut.h"
        ));
    }

    #[test]
    fn parses_compound_type_annotations() {
        let program = parse_clean(
            "fn f(a: &mut i32, b: *u8, c: [f64; 4], d: &P) { }",
        );
        let NodeKind::Function { params, .. } = &single_item(&program).kind else {
            panic!("expected function");
        };
        assert_eq!(params[0].ty, Type::reference(Type::I32, true));
        assert_eq!(params[1].ty, Type::pointer(Type::U8));
        assert_eq!(params[2].ty, Type::array(Type::F64, 4));
        assert_eq!(params[3].ty, Type::reference(Type::structure("P"), false));
    }

    #[test]
    fn parses_for_loop_with_ignored_annotation() {
        let program = parse_clean("fn f() { for i: i32 in 0..10 { } }");
        let NodeKind::Function { body, .. } = &single_item(&program).kind else {
            panic!("expected function");
        };
        let NodeKind::Block { statements, .. } = &body.kind else {
            panic!("expected block");
        };
        assert!(matches!(
            &statements[0].kind,
            NodeKind::For { iterator, .. } if iterator == "i"
        ));
    }

    #[test]
    fn parses_assignment_chain_right_associative() {
        let program = parse_clean("fn f() { a = b = 1; }");
        let NodeKind::Function { body, .. } = &single_item(&program).kind else {
            panic!("expected function");
        };
        let NodeKind::Block { statements, .. } = &body.kind else {
            panic!("expected block");
        };
        let NodeKind::Assignment { value, .. } = &statements[0].kind else {
            panic!("expected assignment");
        };
        assert!(matches!(&value.kind, NodeKind::Assignment { .. }));
    }

    #[test]
    fn parses_compound_assignment_operators() {
        let program = parse_clean("fn f() { a += 1; b -= 2; c *= 3; d /= 4; }");
        let NodeKind::Function { body, .. } = &single_item(&program).kind else {
            panic!("expected function");
        };
        let NodeKind::Block { statements, .. } = &body.kind else {
            panic!("expected block");
        };
        let ops: Vec<_> = statements
            .iter()
            .map(|s| match &s.kind {
                NodeKind::Assignment { op, .. } => *op,
                other => panic!("expected assignment, got {other:?}"),
            })
            .collect();
        assert_eq!(
            ops,
            vec![
                AssignOp::AddAssign,
                AssignOp::SubAssign,
                AssignOp::MulAssign,
                AssignOp::DivAssign,
            ]
        );
    }

    #[test]
    fn requires_parentheses_around_if_condition() {
        let result = parse_source("fn f() { if x { } }");
        assert!(result.had_error());
        assert!(
            result
                .errors
                .iter()
                .any(|d| d.message.contains("Expected '(' after 'if'"))
        );
    }

    #[test]
    fn recovers_and_reports_multiple_errors() {
        let result = parse_source(
            "fn f() { let = 1; let y: i32 = 2; return }\n\
             fn g() { let z: = ; }",
        );
        assert!(result.had_error());
        assert!(result.errors.len() >= 2, "expected several diagnostics");
    }

    #[test]
    fn reports_lexical_error_token_message() {
        let result = parse_source("fn f() { let x: i32 = @; }");
        assert!(
            result
                .errors
                .iter()
                .any(|d| d.message == "Unexpected character")
        );
    }

    #[test]
    fn terminates_on_malformed_input() {
        // None of these parse; all must terminate with diagnostics.
        for source in [
            "fn f( fn g( fn h(",
            "struct S { x: , y: }",
            "impl T { let x; }",
            "{{{{{{",
            "fn f() { (((((( }",
        ] {
            let result = parse_source(source);
            assert!(result.had_error(), "source {source:?} should not parse");
        }
    }

    #[test]
    fn diagnostics_carry_token_positions() {
        let result = parse_source("fn f() {\n    let x i32;\n}");
        let diag = result.errors.iter().next().expect("one diagnostic");
        assert_eq!(diag.file, "test.ryx");
        assert_eq!(diag.line, 2);
        assert!(diag.column > 1);
    }

    #[test]
    fn else_if_chains_nest() {
        let program = parse_clean(
            "fn f(x: i32) { if (x > 0) { } else if (x < 0) { } else { } }",
        );
        let NodeKind::Function { body, .. } = &single_item(&program).kind else {
            panic!("expected function");
        };
        let NodeKind::Block { statements, .. } = &body.kind else {
            panic!("expected block");
        };
        let NodeKind::If { else_branch, .. } = &statements[0].kind else {
            panic!("expected if");
        };
        let nested = else_branch.as_ref().expect("else branch");
        assert!(matches!(&nested.kind, NodeKind::If { .. }));
    }

    #[test]
    fn trailing_expression_becomes_block_value() {
        let program = parse_clean("fn f() -> i32 { let x: i32 = 1; x }");
        let NodeKind::Function { body, .. } = &single_item(&program).kind else {
            panic!("expected function");
        };
        let NodeKind::Block { final_expr, .. } = &body.kind else {
            panic!("expected block");
        };
        assert!(final_expr.is_some());
    }
}
