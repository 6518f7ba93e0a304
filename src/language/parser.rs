use crate::language::{
    ast::*,
    errors::{SyntaxError, SyntaxErrors},
    lexer::lex,
    span::Span,
    token::{Token, TokenKind},
};

pub fn parse_program(source: &str) -> Result<Program, SyntaxErrors> {
    let tokens = match lex(source) {
        Ok(tokens) => tokens,
        Err(errors) => {
            let errs = errors
                .into_iter()
                .map(|err| SyntaxError::new(err.message, err.span))
                .collect();
            return Err(SyntaxErrors::new(errs));
        }
    };
    Parser::new(tokens).parse()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<SyntaxError>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    fn parse(mut self) -> Result<Program, SyntaxErrors> {
        let mut body = Vec::new();
        while !self.is_eof() {
            match self.parse_statement() {
                Ok(stmt) => body.push(stmt),
                Err(err) => {
                    self.report(err);
                    self.synchronize();
                }
            }
        }

        if self.errors.is_empty() {
            Ok(Program { body })
        } else {
            Err(SyntaxErrors::new(self.errors))
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_ahead(&self, n: usize) -> &TokenKind {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn span(&self) -> Span {
        self.peek().span
    }

    fn is_eof(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        *self.peek_kind() == kind
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, SyntaxError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(SyntaxError::new(
                format!("expected {what}, found {}", self.peek_kind().describe()),
                self.span(),
            ))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> Result<String, SyntaxError> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(SyntaxError::new(
                format!("expected {what}, found {}", other.describe()),
                self.span(),
            )),
        }
    }

    fn report(&mut self, err: SyntaxError) {
        self.errors.push(err);
    }

    /// Skip forward to a likely statement boundary after an error.
    fn synchronize(&mut self) {
        while !self.is_eof() {
            if self.matches(TokenKind::Semi) {
                return;
            }
            match self.peek_kind() {
                TokenKind::Var
                | TokenKind::Function
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Do
                | TokenKind::For
                | TokenKind::Return
                | TokenKind::Throw
                | TokenKind::Print
                | TokenKind::RBrace => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Semicolons terminate statements but are tolerated as missing before a
    /// closing brace or the end of input.
    fn end_statement(&mut self) {
        self.matches(TokenKind::Semi);
    }

    fn parse_statement(&mut self) -> Result<Stmt, SyntaxError> {
        match self.peek_kind() {
            TokenKind::Semi => {
                self.advance();
                Ok(Stmt::Empty)
            }
            TokenKind::LBrace => self.parse_block(),
            TokenKind::Var => self.parse_var(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Do => self.parse_do_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Return => {
                self.advance();
                let value = if self.check(TokenKind::Semi)
                    || self.check(TokenKind::RBrace)
                    || self.is_eof()
                {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.end_statement();
                Ok(Stmt::Return(value))
            }
            TokenKind::Throw => {
                self.advance();
                let value = self.parse_expression()?;
                self.end_statement();
                Ok(Stmt::Throw(value))
            }
            TokenKind::Print => {
                self.advance();
                let value = self.parse_expression()?;
                self.end_statement();
                Ok(Stmt::Print(value))
            }
            TokenKind::Function => self.parse_function_decl(),
            TokenKind::Break => {
                self.advance();
                let label = self.optional_label();
                self.end_statement();
                Ok(Stmt::Break(label))
            }
            TokenKind::Continue => {
                self.advance();
                let label = self.optional_label();
                self.end_statement();
                Ok(Stmt::Continue(label))
            }
            TokenKind::Switch => self.parse_switch(),
            TokenKind::Try => self.parse_try(),
            TokenKind::With => self.parse_with(),
            TokenKind::Identifier(_) if *self.peek_ahead(1) == TokenKind::Colon => {
                let label = self.expect_identifier("label")?;
                self.advance(); // colon
                let body = self.parse_statement()?;
                Ok(Stmt::Labelled {
                    label,
                    body: Box::new(body),
                })
            }
            _ => {
                let expr = self.parse_expression()?;
                self.end_statement();
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn optional_label(&mut self) -> Option<String> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Some(name)
            }
            _ => None,
        }
    }

    fn parse_block(&mut self) -> Result<Stmt, SyntaxError> {
        Ok(Stmt::Block(self.parse_brace_body()?))
    }

    fn parse_brace_body(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        self.expect(TokenKind::LBrace, "`{`")?;
        let mut body = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_eof() {
            match self.parse_statement() {
                Ok(stmt) => body.push(stmt),
                Err(err) => {
                    self.report(err);
                    self.synchronize();
                }
            }
        }
        self.expect(TokenKind::RBrace, "`}`")?;
        Ok(body)
    }

    fn parse_var(&mut self) -> Result<Stmt, SyntaxError> {
        self.advance(); // var
        let mut decls = Vec::new();
        loop {
            let name = self.expect_identifier("variable name")?;
            let init = if self.matches(TokenKind::Eq) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            decls.push(Stmt::Var { name, init });
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.end_statement();
        if decls.len() > 1 {
            Ok(Stmt::Block(decls))
        } else {
            Ok(decls.pop().unwrap_or(Stmt::Empty))
        }
    }

    fn parse_if(&mut self) -> Result<Stmt, SyntaxError> {
        self.advance(); // if
        self.expect(TokenKind::LParen, "`(`")?;
        let cond = self.parse_expression()?;
        self.expect(TokenKind::RParen, "`)`")?;
        let then = Box::new(self.parse_statement()?);
        let els = if self.matches(TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::If { cond, then, els })
    }

    fn parse_while(&mut self) -> Result<Stmt, SyntaxError> {
        self.advance(); // while
        self.expect(TokenKind::LParen, "`(`")?;
        let cond = self.parse_expression()?;
        self.expect(TokenKind::RParen, "`)`")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::While { cond, body })
    }

    fn parse_do_while(&mut self) -> Result<Stmt, SyntaxError> {
        self.advance(); // do
        let body = Box::new(self.parse_statement()?);
        self.expect(TokenKind::While, "`while`")?;
        self.expect(TokenKind::LParen, "`(`")?;
        let cond = self.parse_expression()?;
        self.expect(TokenKind::RParen, "`)`")?;
        self.end_statement();
        Ok(Stmt::DoWhile { body, cond })
    }

    fn parse_for(&mut self) -> Result<Stmt, SyntaxError> {
        self.advance(); // for
        self.expect(TokenKind::LParen, "`(`")?;

        // for (var x in obj) is recognized so lowering can reject it by name.
        if self.check(TokenKind::Var) && *self.peek_ahead(2) == TokenKind::In {
            self.advance(); // var
            let binding = self.expect_identifier("loop variable")?;
            self.advance(); // in
            let object = self.parse_expression()?;
            self.expect(TokenKind::RParen, "`)`")?;
            let body = Box::new(self.parse_statement()?);
            return Ok(Stmt::ForIn {
                binding,
                object,
                body,
            });
        }

        let init = if self.matches(TokenKind::Semi) {
            None
        } else if self.check(TokenKind::Var) {
            let stmt = self.parse_var()?;
            Some(Box::new(stmt))
        } else {
            let expr = self.parse_expression()?;
            self.end_statement();
            Some(Box::new(Stmt::Expr(expr)))
        };
        let cond = if self.check(TokenKind::Semi) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenKind::Semi, "`;`")?;
        let step = if self.check(TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenKind::RParen, "`)`")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::For {
            init,
            cond,
            step,
            body,
        })
    }

    fn parse_function_decl(&mut self) -> Result<Stmt, SyntaxError> {
        self.advance(); // function
        let name = self.expect_identifier("function name")?;
        let params = self.parse_params()?;
        let body = self.parse_brace_body()?;
        Ok(Stmt::FunctionDecl { name, params, body })
    }

    fn parse_params(&mut self) -> Result<Vec<String>, SyntaxError> {
        self.expect(TokenKind::LParen, "`(`")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                params.push(self.expect_identifier("parameter name")?);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "`)`")?;
        Ok(params)
    }

    fn parse_switch(&mut self) -> Result<Stmt, SyntaxError> {
        self.advance(); // switch
        self.expect(TokenKind::LParen, "`(`")?;
        let discriminant = self.parse_expression()?;
        self.expect(TokenKind::RParen, "`)`")?;
        self.expect(TokenKind::LBrace, "`{`")?;
        let mut cases = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_eof() {
            let test = if self.matches(TokenKind::Case) {
                let expr = self.parse_expression()?;
                Some(expr)
            } else {
                self.expect(TokenKind::Default, "`case` or `default`")?;
                None
            };
            self.expect(TokenKind::Colon, "`:`")?;
            let mut body = Vec::new();
            while !self.check(TokenKind::Case)
                && !self.check(TokenKind::Default)
                && !self.check(TokenKind::RBrace)
                && !self.is_eof()
            {
                body.push(self.parse_statement()?);
            }
            cases.push(SwitchCase { test, body });
        }
        self.expect(TokenKind::RBrace, "`}`")?;
        Ok(Stmt::Switch {
            discriminant,
            cases,
        })
    }

    fn parse_try(&mut self) -> Result<Stmt, SyntaxError> {
        self.advance(); // try
        let block = self.parse_brace_body()?;
        let catch = if self.matches(TokenKind::Catch) {
            self.expect(TokenKind::LParen, "`(`")?;
            let binding = self.expect_identifier("catch binding")?;
            self.expect(TokenKind::RParen, "`)`")?;
            let body = self.parse_brace_body()?;
            Some(CatchClause { binding, body })
        } else {
            None
        };
        let finally = if self.matches(TokenKind::Finally) {
            Some(self.parse_brace_body()?)
        } else {
            None
        };
        if catch.is_none() && finally.is_none() {
            return Err(SyntaxError::new(
                "`try` requires a `catch` or `finally` clause",
                self.span(),
            )
            .with_label("missing handler"));
        }
        Ok(Stmt::Try {
            block,
            catch,
            finally,
        })
    }

    fn parse_with(&mut self) -> Result<Stmt, SyntaxError> {
        self.advance(); // with
        self.expect(TokenKind::LParen, "`(`")?;
        let object = self.parse_expression()?;
        self.expect(TokenKind::RParen, "`)`")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::With { object, body })
    }

    // Expressions, by descending precedence.

    fn parse_expression(&mut self) -> Result<Expr, SyntaxError> {
        let first = self.parse_assignment()?;
        if !self.check(TokenKind::Comma) {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.matches(TokenKind::Comma) {
            exprs.push(self.parse_assignment()?);
        }
        Ok(Expr::Sequence(exprs))
    }

    fn parse_assignment(&mut self) -> Result<Expr, SyntaxError> {
        let target = self.parse_conditional()?;
        let op = match self.peek_kind() {
            TokenKind::Eq => None,
            TokenKind::PlusEq => Some(BinaryOp::Add),
            TokenKind::MinusEq => Some(BinaryOp::Sub),
            TokenKind::StarEq => Some(BinaryOp::Mul),
            TokenKind::SlashEq => Some(BinaryOp::Div),
            TokenKind::PercentEq => Some(BinaryOp::Mod),
            _ => return Ok(target),
        };
        self.advance();
        let value = self.parse_assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn parse_conditional(&mut self) -> Result<Expr, SyntaxError> {
        let cond = self.parse_logical_or()?;
        if !self.matches(TokenKind::Question) {
            return Ok(cond);
        }
        let then = self.parse_assignment()?;
        self.expect(TokenKind::Colon, "`:`")?;
        let els = self.parse_assignment()?;
        Ok(Expr::Conditional {
            cond: Box::new(cond),
            then: Box::new(then),
            els: Box::new(els),
        })
    }

    fn parse_logical_or(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_logical_and()?;
        while self.matches(TokenKind::PipePipe) {
            let rhs = self.parse_logical_and()?;
            lhs = Expr::Logical {
                op: LogicalOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_logical_and(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_bit_or()?;
        while self.matches(TokenKind::AmpersandAmpersand) {
            let rhs = self.parse_bit_or()?;
            lhs = Expr::Logical {
                op: LogicalOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_bit_or(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_bit_xor()?;
        while self.matches(TokenKind::Pipe) {
            let rhs = self.parse_bit_xor()?;
            lhs = binary(BinaryOp::BitOr, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_bit_xor(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_bit_and()?;
        while self.matches(TokenKind::Caret) {
            let rhs = self.parse_bit_and()?;
            lhs = binary(BinaryOp::BitXor, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_bit_and(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_equality()?;
        while self.matches(TokenKind::Ampersand) {
            let rhs = self.parse_equality()?;
            lhs = binary(BinaryOp::BitAnd, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::BangEq => BinaryOp::Ne,
                TokenKind::EqEqEq => BinaryOp::StrictEq,
                TokenKind::BangEqEq => BinaryOp::StrictNe,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_relational()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_relational(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_shift()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::LtEq => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::GtEq => BinaryOp::Ge,
                TokenKind::InstanceOf => BinaryOp::InstanceOf,
                TokenKind::In => BinaryOp::In,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_shift()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_shift(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Shl => BinaryOp::Shl,
                TokenKind::Shr => BinaryOp::Shr,
                TokenKind::Ushr => BinaryOp::Ushr,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        let op = match self.peek_kind() {
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::TypeOf => Some(UnaryOp::TypeOf),
            TokenKind::Void => Some(UnaryOp::Void),
            TokenKind::Delete => Some(UnaryOp::Delete),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Minus => Some(UnaryOp::Minus),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::PlusPlus => {
                self.advance();
                let target = self.parse_unary()?;
                return Ok(Expr::Update {
                    op: UpdateOp::Increment,
                    prefix: true,
                    target: Box::new(target),
                });
            }
            TokenKind::MinusMinus => {
                self.advance();
                let target = self.parse_unary()?;
                return Ok(Expr::Update {
                    op: UpdateOp::Decrement,
                    prefix: true,
                    target: Box::new(target),
                });
            }
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, SyntaxError> {
        let expr = self.parse_call_member()?;
        let op = match self.peek_kind() {
            TokenKind::PlusPlus => UpdateOp::Increment,
            TokenKind::MinusMinus => UpdateOp::Decrement,
            _ => return Ok(expr),
        };
        self.advance();
        Ok(Expr::Update {
            op,
            prefix: false,
            target: Box::new(expr),
        })
    }

    fn parse_call_member(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = if self.matches(TokenKind::New) {
            let callee = self.parse_member_only()?;
            let args = if self.check(TokenKind::LParen) {
                self.parse_args()?
            } else {
                Vec::new()
            };
            Expr::New {
                callee: Box::new(callee),
                args,
            }
        } else {
            self.parse_primary()?
        };
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let field = self.expect_identifier("property name")?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property: MemberKey::Field(field),
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(TokenKind::RBracket, "`]`")?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property: MemberKey::Index(Box::new(index)),
                    };
                }
                TokenKind::LParen => {
                    let args = self.parse_args()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Member chain without call suffixes, for `new` callees.
    fn parse_member_only(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let field = self.expect_identifier("property name")?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property: MemberKey::Field(field),
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(TokenKind::RBracket, "`]`")?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property: MemberKey::Index(Box::new(index)),
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, SyntaxError> {
        self.expect(TokenKind::LParen, "`(`")?;
        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                args.push(self.parse_assignment()?);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "`)`")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        match self.peek_kind().clone() {
            TokenKind::Number { value, radix } => {
                self.advance();
                Ok(Expr::Number { value, radix })
            }
            TokenKind::String(text) => {
                self.advance();
                Ok(Expr::Str(text))
            }
            TokenKind::Regex(text) => {
                self.advance();
                Ok(Expr::Regex(text))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Null)
            }
            TokenKind::This => {
                self.advance();
                Ok(Expr::This)
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(Expr::Ident(name))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen, "`)`")?;
                Ok(expr)
            }
            TokenKind::LBrace => self.parse_object_literal(),
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::Function => {
                self.advance();
                let name = match self.peek_kind().clone() {
                    TokenKind::Identifier(name) => {
                        self.advance();
                        Some(name)
                    }
                    _ => None,
                };
                let params = self.parse_params()?;
                let body = self.parse_brace_body()?;
                Ok(Expr::Function { name, params, body })
            }
            other => Err(SyntaxError::new(
                format!("expected an expression, found {}", other.describe()),
                self.span(),
            )
            .with_label("not an expression")),
        }
    }

    fn parse_object_literal(&mut self) -> Result<Expr, SyntaxError> {
        self.expect(TokenKind::LBrace, "`{`")?;
        let mut entries = Vec::new();
        if !self.check(TokenKind::RBrace) {
            loop {
                let key = match self.peek_kind().clone() {
                    TokenKind::Identifier(name) => {
                        self.advance();
                        name
                    }
                    TokenKind::String(text) => {
                        self.advance();
                        text
                    }
                    other => {
                        return Err(SyntaxError::new(
                            format!("expected a property name, found {}", other.describe()),
                            self.span(),
                        )
                        .with_label("not a property name")
                        .with_help("property names must be identifiers or string literals"));
                    }
                };
                self.expect(TokenKind::Colon, "`:`")?;
                let value = self.parse_assignment()?;
                entries.push((key, value));
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBrace, "`}`")?;
        Ok(Expr::ObjectLiteral(entries))
    }

    fn parse_array_literal(&mut self) -> Result<Expr, SyntaxError> {
        self.expect(TokenKind::LBracket, "`[`")?;
        let mut items = Vec::new();
        if !self.check(TokenKind::RBracket) {
            loop {
                items.push(self.parse_assignment()?);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBracket, "`]`")?;
        Ok(Expr::ArrayLiteral(items))
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}
