use crate::language::{
    ast::*,
    errors::SyntaxError,
    token::{Token, TokenKind},
};
use std::rc::Rc;

pub type ParseResult<T> = Result<T, SyntaxError>;

const NOT_PREC: u8 = 3;
const UNARY_PREC: u8 = 11;

/// Parses a whole module. Stops at the first structural error.
pub fn parse(tokens: &[Token]) -> ParseResult<Program> {
    let mut parser = Parser::new(tokens);
    parser.parse_program()
}

/// Parses a single expression that must span the whole token stream
/// (trailing newlines aside).
pub fn parse_expression(tokens: &[Token]) -> ParseResult<Expr> {
    let mut parser = Parser::new(tokens);
    parser.skip_separators();
    let expr = parser.parse_expression()?;
    parser.skip_separators();
    if !parser.check(TokenKind::Eof) {
        return Err(parser.error_here(format!(
            "Unexpected token '{}' after expression",
            parser.peek().text
        )));
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    eof: Token,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        let end = tokens.last().map(|token| token.span.end).unwrap_or(0);
        let line = tokens.last().map(|token| token.line).unwrap_or(1);
        Self {
            tokens,
            pos: 0,
            eof: Token::new(TokenKind::Eof, "", line, end..end),
        }
    }

    fn parse_program(&mut self) -> ParseResult<Program> {
        let mut statements = Vec::new();
        loop {
            self.skip_separators();
            if self.check(TokenKind::Eof) {
                break;
            }
            statements.push(self.parse_statement()?);
        }
        Ok(Program { statements })
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        match self.peek_kind() {
            TokenKind::For => self.parse_for(),
            TokenKind::If => Ok(Statement::If(self.parse_if()?)),
            TokenKind::Do => self.parse_do_while(),
            TokenKind::Sub | TokenKind::Function => self.parse_procedure(),
            TokenKind::Dim => {
                self.advance();
                self.parse_dim()
            }
            TokenKind::Const => {
                self.advance();
                self.parse_const()
            }
            TokenKind::Set => self.parse_set(),
            TokenKind::On => self.parse_on_error(),
            TokenKind::Exit => self.parse_exit(),
            TokenKind::Erase => self.parse_erase(),
            TokenKind::ReDim => self.parse_redim(),
            TokenKind::Option => self.parse_option(),
            TokenKind::Public | TokenKind::Private => self.parse_scoped_declaration(),
            TokenKind::Call => self.parse_call_keyword(),
            TokenKind::Identifier if self.peek_kind_n(1) == TokenKind::Colon => {
                let label = self.advance();
                self.advance();
                Ok(Statement::Label(label.text))
            }
            TokenKind::Identifier => self.parse_assignment_or_call(),
            TokenKind::Unknown => {
                Err(self.error_here(format!("Unknown token '{}'", self.peek().text)))
            }
            _ => Err(self.unexpected("at start of statement")),
        }
    }

    /// Statements up to (not including) one of `terminators` or end of input.
    fn parse_block(&mut self, terminators: &[TokenKind]) -> ParseResult<Vec<Statement>> {
        let mut body = Vec::new();
        loop {
            self.skip_separators();
            let kind = self.peek_kind();
            if kind == TokenKind::Eof || terminators.contains(&kind) {
                break;
            }
            body.push(self.parse_statement()?);
        }
        Ok(body)
    }

    fn parse_for(&mut self) -> ParseResult<Statement> {
        self.advance();
        let variable = self.expect_identifier("Expected loop variable after 'For'")?;
        self.expect(TokenKind::Eq, "Expected '=' after loop variable")?;
        let start = self.parse_expression()?;
        self.expect(TokenKind::To, "Expected 'To' in 'For' statement")?;
        let end = self.parse_expression()?;
        let step = if self.matches(TokenKind::Step) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        let body = self.parse_block(&[TokenKind::Next])?;
        self.expect(TokenKind::Next, "Expected 'Next' to close 'For' loop")?;
        let next_variable = if self.check(TokenKind::Identifier) {
            Some(self.advance().text)
        } else {
            None
        };
        Ok(Statement::For(ForStmt {
            variable,
            start,
            end,
            step,
            body,
            next_variable,
        }))
    }

    /// Parses from an `If` or `ElseIf` keyword. A nested `ElseIf` consumes the
    /// shared `End If`.
    fn parse_if(&mut self) -> ParseResult<IfStmt> {
        self.advance();
        let condition = self.parse_expression()?;
        self.expect(TokenKind::Then, "Expected 'Then' after condition")?;

        if !matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Eof) {
            return self.parse_single_line_if(condition);
        }

        let consequent =
            self.parse_block(&[TokenKind::End, TokenKind::Else, TokenKind::ElseIf])?;
        let alternate = match self.peek_kind() {
            TokenKind::ElseIf => {
                let nested = self.parse_if()?;
                return Ok(IfStmt {
                    condition,
                    consequent,
                    alternate: Some(ElseBranch::ElseIf(Box::new(nested))),
                });
            }
            TokenKind::Else => {
                self.advance();
                Some(ElseBranch::Block(self.parse_block(&[TokenKind::End])?))
            }
            _ => None,
        };
        self.expect_end(TokenKind::If, "If")?;
        Ok(IfStmt {
            condition,
            consequent,
            alternate,
        })
    }

    fn parse_single_line_if(&mut self, condition: Expr) -> ParseResult<IfStmt> {
        let consequent = self.parse_inline_statements()?;
        let alternate = if self.matches(TokenKind::Else) {
            Some(ElseBranch::Block(self.parse_inline_statements()?))
        } else {
            None
        };
        if self.check(TokenKind::End) && self.peek_kind_n(1) == TokenKind::If {
            self.advance();
            self.advance();
        }
        Ok(IfStmt {
            condition,
            consequent,
            alternate,
        })
    }

    fn parse_inline_statements(&mut self) -> ParseResult<Vec<Statement>> {
        let mut statements = Vec::new();
        loop {
            while self.matches(TokenKind::Colon) {}
            match self.peek_kind() {
                TokenKind::Newline | TokenKind::Eof | TokenKind::Else => break,
                TokenKind::End if self.peek_kind_n(1) == TokenKind::If => break,
                _ => statements.push(self.parse_statement()?),
            }
        }
        Ok(statements)
    }

    fn parse_do_while(&mut self) -> ParseResult<Statement> {
        self.advance();
        self.expect(TokenKind::While, "Expected 'While' after 'Do'")?;
        let condition = self.parse_expression()?;
        let body = self.parse_block(&[TokenKind::Loop])?;
        self.expect(TokenKind::Loop, "Expected 'Loop' to close 'Do While'")?;
        Ok(Statement::DoWhile(DoWhileStmt { condition, body }))
    }

    fn parse_procedure(&mut self) -> ParseResult<Statement> {
        let keyword = self.advance();
        let is_function = keyword.kind == TokenKind::Function;
        let kind_name = if is_function { "Function" } else { "Sub" };
        let name = self.expect_identifier(&format!("Expected name after '{}'", kind_name))?;
        let params = if self.matches(TokenKind::LParen) {
            self.parse_params()?
        } else {
            Vec::new()
        };
        if self.matches(TokenKind::As) {
            self.parse_type_name()?;
        }
        let body = self.parse_block(&[TokenKind::End])?;
        self.expect_end(keyword.kind, kind_name)?;
        Ok(Statement::Procedure(Rc::new(ProcedureDecl {
            name,
            is_function,
            params,
            body,
        })))
    }

    fn parse_params(&mut self) -> ParseResult<Vec<Param>> {
        let mut params = Vec::new();
        if self.matches(TokenKind::RParen) {
            return Ok(params);
        }
        loop {
            self.match_word("optional");
            let by_val = if self.matches(TokenKind::ByVal) {
                true
            } else {
                self.matches(TokenKind::ByRef);
                false
            };
            let name = self.expect_identifier("Expected parameter name")?;
            if self.matches(TokenKind::LParen) {
                self.expect(TokenKind::RParen, "Expected ')' after array parameter")?;
            }
            if self.matches(TokenKind::As) {
                self.parse_type_name()?;
            }
            let default = if self.matches(TokenKind::Eq) {
                Some(self.parse_expression()?)
            } else {
                None
            };
            params.push(Param {
                name,
                by_val,
                default,
            });
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "Expected ')' after parameters")?;
        Ok(params)
    }

    fn parse_dim(&mut self) -> ParseResult<Statement> {
        let mut declarators = vec![self.parse_declarator()?];
        while self.matches(TokenKind::Comma) {
            declarators.push(self.parse_declarator()?);
        }
        Ok(Statement::Dim(DimStmt { declarators }))
    }

    fn parse_declarator(&mut self) -> ParseResult<Declarator> {
        let name = self.expect_identifier("Expected variable name")?;
        let bounds = if self.matches(TokenKind::LParen) {
            Some(self.parse_bounds()?)
        } else {
            None
        };
        let mut new_object = None;
        if self.matches(TokenKind::As) {
            if self.matches(TokenKind::New) {
                new_object = Some(self.parse_type_name()?);
            } else {
                self.parse_type_name()?;
            }
        }
        Ok(Declarator {
            name,
            bounds,
            new_object,
        })
    }

    /// Bounds after an opening paren. `lo To hi` keeps only `hi`.
    fn parse_bounds(&mut self) -> ParseResult<Vec<Expr>> {
        let mut bounds = Vec::new();
        if self.matches(TokenKind::RParen) {
            return Ok(bounds);
        }
        loop {
            let mut bound = self.parse_expression()?;
            if self.matches(TokenKind::To) {
                bound = self.parse_expression()?;
            }
            bounds.push(bound);
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "Expected ')' after array bounds")?;
        Ok(bounds)
    }

    fn parse_const(&mut self) -> ParseResult<Statement> {
        let name = self.expect_identifier("Expected constant name after 'Const'")?;
        if self.matches(TokenKind::As) {
            self.parse_type_name()?;
        }
        self.expect(TokenKind::Eq, "Expected '=' after constant name")?;
        let value = self.parse_expression()?;
        Ok(Statement::Const(ConstStmt { name, value }))
    }

    fn parse_set(&mut self) -> ParseResult<Statement> {
        self.advance();
        let target = self.parse_postfix()?;
        self.expect(TokenKind::Eq, "Expected '=' in 'Set' statement")?;
        let value = self.parse_expression()?;
        Ok(Statement::Set(AssignStmt { target, value }))
    }

    fn parse_on_error(&mut self) -> ParseResult<Statement> {
        self.advance();
        self.expect(TokenKind::Error, "Expected 'Error' after 'On'")?;
        if self.matches(TokenKind::GoTo) {
            let label = match self.peek_kind() {
                TokenKind::Identifier | TokenKind::Number => self.advance().text,
                _ => return Err(self.unexpected("after 'On Error GoTo'")),
            };
            return Ok(Statement::OnError(OnErrorStmt::GoTo(label)));
        }
        if self.match_word("resume") {
            self.expect(TokenKind::Next, "Expected 'Next' after 'On Error Resume'")?;
            return Ok(Statement::OnError(OnErrorStmt::ResumeNext));
        }
        Err(self
            .unexpected("after 'On Error'")
            .with_help("Use 'On Error GoTo <label>' or 'On Error Resume Next'"))
    }

    fn parse_exit(&mut self) -> ParseResult<Statement> {
        self.advance();
        let target = match self.peek_kind() {
            TokenKind::For => ExitTarget::For,
            TokenKind::Do => ExitTarget::Do,
            TokenKind::Sub => ExitTarget::Sub,
            TokenKind::Function => ExitTarget::Function,
            _ => {
                return Err(self
                    .unexpected("after 'Exit'")
                    .with_help("Exit takes For, Do, Sub or Function"))
            }
        };
        self.advance();
        Ok(Statement::Exit(target))
    }

    fn parse_erase(&mut self) -> ParseResult<Statement> {
        self.advance();
        let mut names = vec![self.expect_identifier("Expected array name after 'Erase'")?];
        while self.matches(TokenKind::Comma) {
            names.push(self.expect_identifier("Expected array name after ','")?);
        }
        Ok(Statement::Erase(EraseStmt { names }))
    }

    fn parse_redim(&mut self) -> ParseResult<Statement> {
        self.advance();
        let preserve = self.match_word("preserve");
        let name = self.expect_identifier("Expected array name after 'ReDim'")?;
        self.expect(TokenKind::LParen, "Expected '(' after array name")?;
        let bounds = self.parse_bounds()?;
        if self.matches(TokenKind::As) {
            self.parse_type_name()?;
        }
        Ok(Statement::ReDim(ReDimStmt {
            name,
            bounds,
            preserve,
        }))
    }

    fn parse_option(&mut self) -> ParseResult<Statement> {
        self.advance();
        if self.matches(TokenKind::Explicit) {
            return Ok(Statement::Option(OptionSetting::Explicit));
        }
        if self.match_word("base") {
            let token = self.expect(TokenKind::Number, "Expected number after 'Option Base'")?;
            let base = number_literal(&token)? as usize;
            return Ok(Statement::Option(OptionSetting::Base(base)));
        }
        if self.match_word("compare") {
            let mode = self.expect_identifier("Expected mode after 'Option Compare'")?;
            return Ok(Statement::Option(OptionSetting::Compare(mode)));
        }
        Err(self.unexpected("after 'Option'"))
    }

    fn parse_scoped_declaration(&mut self) -> ParseResult<Statement> {
        self.advance();
        match self.peek_kind() {
            TokenKind::Sub | TokenKind::Function => self.parse_procedure(),
            TokenKind::Const => {
                self.advance();
                self.parse_const()
            }
            TokenKind::Dim => {
                self.advance();
                self.parse_dim()
            }
            TokenKind::Identifier => self.parse_dim(),
            _ => Err(self.unexpected("after access modifier")),
        }
    }

    fn parse_call_keyword(&mut self) -> ParseResult<Statement> {
        self.advance();
        let expr = self.parse_postfix()?;
        Ok(Statement::Call(into_call(expr)))
    }

    /// `target = value`, or a call with an optional paren-less argument list.
    fn parse_assignment_or_call(&mut self) -> ParseResult<Statement> {
        let target = self.parse_postfix()?;
        if self.matches(TokenKind::Eq) {
            let value = self.parse_expression()?;
            return Ok(Statement::Assignment(AssignStmt { target, value }));
        }

        // `Foo (x), y`: the parenthesized group is the first argument.
        let (callee, mut args) = match target {
            Expr::Call { callee, args } if args.len() == 1 && self.check(TokenKind::Comma) => {
                (*callee, args)
            }
            other => (other, Vec::new()),
        };
        if !args.is_empty() {
            while self.matches(TokenKind::Comma) {
                args.push(self.parse_expression()?);
            }
        } else if !self.at_call_terminator() {
            loop {
                args.push(self.parse_expression()?);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        if args.is_empty() {
            Ok(Statement::Call(into_call(callee)))
        } else {
            Ok(Statement::Call(Expr::call(callee, args)))
        }
    }

    fn at_call_terminator(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Newline
                | TokenKind::Eof
                | TokenKind::Colon
                | TokenKind::Else
                | TokenKind::ElseIf
                | TokenKind::End
                | TokenKind::Next
                | TokenKind::Loop
        )
    }

    /// Type annotations carry no meaning; the name is returned for `As New`.
    fn parse_type_name(&mut self) -> ParseResult<String> {
        if !self.peek().is_word() {
            return Err(self.unexpected("where a type name was expected"));
        }
        let mut name = self.advance().text;
        while self.check(TokenKind::Dot) && self.peek_at(1).is_word() {
            self.advance();
            name.push('.');
            name.push_str(&self.advance().text);
        }
        if self.check(TokenKind::LParen) && self.peek_kind_n(1) == TokenKind::RParen {
            self.advance();
            self.advance();
        }
        Ok(name)
    }

    fn parse_expression(&mut self) -> ParseResult<Expr> {
        self.parse_binary(1)
    }

    fn parse_binary(&mut self, min_prec: u8) -> ParseResult<Expr> {
        let mut left = self.parse_operand(min_prec)?;

        while let Some((op, prec)) = binary_op(self.peek_kind()) {
            if prec < min_prec {
                break;
            }
            self.advance();
            let right = self.parse_binary(prec + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_operand(&mut self, min_prec: u8) -> ParseResult<Expr> {
        let (op, prec) = match self.peek_kind() {
            TokenKind::Not => (UnaryOp::Not, NOT_PREC),
            TokenKind::Minus => (UnaryOp::Neg, UNARY_PREC),
            TokenKind::Plus => (UnaryOp::Plus, UNARY_PREC),
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_binary(prec.max(min_prec))?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    /// A primary followed by any chain of `.member` and `(args)` suffixes.
    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.matches(TokenKind::Dot) {
                if !self.peek().is_word() {
                    return Err(self.unexpected("after '.'"));
                }
                let property = self.advance().text;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                };
            } else if self.matches(TokenKind::LParen) {
                let args = self.parse_arguments()?;
                expr = Expr::call(expr, args);
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.matches(TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "Expected ')' after arguments")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        match self.peek_kind() {
            TokenKind::Number => {
                let token = self.advance();
                Ok(Expr::Number(number_literal(&token)?))
            }
            TokenKind::String => Ok(Expr::String(self.advance().text)),
            TokenKind::Identifier | TokenKind::Empty => Ok(Expr::Identifier(self.advance().text)),
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen, "Expected ')' after expression")?;
                Ok(expr)
            }
            TokenKind::New => {
                self.advance();
                let type_name = self.parse_type_name()?;
                Ok(Expr::New { type_name })
            }
            TokenKind::Unknown => {
                Err(self.error_here(format!("Unknown token '{}'", self.peek().text)))
            }
            _ => Err(self.unexpected("in expression")),
        }
    }

    fn expect_end(&mut self, kind: TokenKind, name: &str) -> ParseResult<()> {
        let message = format!("Expected 'End {}'", name);
        self.expect(TokenKind::End, &message)?;
        self.expect(kind, &message)?;
        Ok(())
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(format!("{}, found {}", message, describe(self.peek()))))
        }
    }

    fn expect_identifier(&mut self, message: &str) -> ParseResult<String> {
        self.expect(TokenKind::Identifier, message)
            .map(|token| token.text)
    }

    /// Contextual words such as `Preserve` or `Resume` lex as identifiers.
    fn match_word(&mut self, word: &str) -> bool {
        let token = self.peek();
        if token.kind == TokenKind::Identifier && token.text.eq_ignore_ascii_case(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Colon) {
            self.advance();
        }
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> &Token {
        self.tokens.get(self.pos + n).unwrap_or(&self.eof)
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_kind_n(&self, n: usize) -> TokenKind {
        self.peek_at(n).kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn error_here(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.peek())
    }

    fn unexpected(&self, context: &str) -> SyntaxError {
        self.error_here(format!("Unexpected {} {}", describe(self.peek()), context))
    }
}

fn binary_op(kind: TokenKind) -> Option<(BinaryOp, u8)> {
    let info = match kind {
        TokenKind::Or => (BinaryOp::Or, 1),
        TokenKind::And => (BinaryOp::And, 2),
        TokenKind::Eq => (BinaryOp::Eq, 4),
        TokenKind::NotEq => (BinaryOp::NotEq, 4),
        TokenKind::Lt => (BinaryOp::Lt, 5),
        TokenKind::LtEq => (BinaryOp::LtEq, 5),
        TokenKind::Gt => (BinaryOp::Gt, 5),
        TokenKind::GtEq => (BinaryOp::GtEq, 5),
        TokenKind::Ampersand => (BinaryOp::Concat, 6),
        TokenKind::Plus => (BinaryOp::Add, 7),
        TokenKind::Minus => (BinaryOp::Sub, 7),
        TokenKind::Mod => (BinaryOp::Mod, 8),
        TokenKind::Backslash => (BinaryOp::IntDiv, 9),
        TokenKind::Star => (BinaryOp::Mul, 10),
        TokenKind::Slash => (BinaryOp::Div, 10),
        TokenKind::Caret => (BinaryOp::Pow, 12),
        _ => return None,
    };
    Some(info)
}

fn into_call(expr: Expr) -> Expr {
    match expr {
        Expr::Call { .. } => expr,
        other => Expr::call(other, Vec::new()),
    }
}

fn number_literal(token: &Token) -> ParseResult<f64> {
    token
        .text
        .trim_end_matches(['%', '&', '@', '!', '#'])
        .parse::<f64>()
        .map_err(|_| SyntaxError::new(format!("Invalid number '{}'", token.text), token))
}

fn describe(token: &Token) -> String {
    match token.kind {
        TokenKind::Newline | TokenKind::Eof => token.kind.to_string(),
        TokenKind::String => format!("string \"{}\"", token.text),
        _ => format!("'{}'", token.text),
    }
}
