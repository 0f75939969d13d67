use monkey_lexer::{Span, Token, TokenKind};
use crate::ast::*;
use crate::error::{ParseError, ParseResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Prec {
    Lowest,
    Equals,      // == !=
    LessGreater, // < >
    Sum,         // + -
    Product,     // * /
    Prefix,      // -x !x
    Call,        // fn(x)
    Index,       // arr[x]
}

fn infix_prec(kind: &TokenKind) -> Prec {
    match kind {
        TokenKind::EqualEqual | TokenKind::BangEqual => Prec::Equals,
        TokenKind::Less | TokenKind::Greater => Prec::LessGreater,
        TokenKind::Plus | TokenKind::Minus => Prec::Sum,
        TokenKind::Star | TokenKind::Slash => Prec::Product,
        TokenKind::LParen => Prec::Call,
        TokenKind::LBracket => Prec::Index,
        _ => Prec::Lowest,
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    pub errors: Vec<ParseError>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0, errors: Vec::new() }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn current_span(&self) -> Span {
        self.peek().span
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn match_tok(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> ParseResult<Token> {
        if self.peek_kind() == kind {
            Ok(self.advance())
        } else if self.peek_kind() == &TokenKind::Eof {
            Err(ParseError::UnexpectedEof { expected: expected.to_string(), span: self.current_span() })
        } else {
            Err(ParseError::UnexpectedToken { expected: expected.to_string(), found: self.peek_kind().clone(), span: self.current_span() })
        }
    }

    fn expect_identifier(&mut self, expected: &str) -> ParseResult<String> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => { self.advance(); Ok(name) }
            TokenKind::Eof => Err(ParseError::UnexpectedEof { expected: expected.to_string(), span: self.current_span() }),
            other => Err(ParseError::UnexpectedToken { expected: expected.to_string(), found: other, span: self.current_span() }),
        }
    }

    /// Consumes an optional trailing `;` after a statement.
    fn skip_semicolon(&mut self) {
        self.match_tok(&TokenKind::Semicolon);
    }

    pub fn parse(&mut self) -> Program {
        let mut stmts = Vec::new();
        while self.peek_kind() != &TokenKind::Eof {
            match self.parse_stmt() {
                Ok(stmt) => stmts.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                }
            }
        }
        Program { stmts }
    }

    /// Error recovery: skip to the next statement boundary.
    fn synchronize(&mut self) {
        loop {
            match self.peek_kind() {
                TokenKind::Eof => return,
                TokenKind::Semicolon => { self.advance(); return; }
                TokenKind::Let | TokenKind::Return | TokenKind::If | TokenKind::While | TokenKind::Fn | TokenKind::Break => return,
                _ => { self.advance(); }
            }
        }
    }

    fn parse_stmt(&mut self) -> ParseResult<Stmt> {
        match self.peek_kind() {
            TokenKind::Let => self.parse_let(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Break => self.parse_break(),
            _ => self.parse_assign_or_expr_stmt(),
        }
    }

    fn parse_let(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        self.advance();
        let name = self.expect_identifier("identifier")?;
        self.expect(&TokenKind::Equal, "'='")?;
        let mut value = self.parse_expr(Prec::Lowest)?;
        // A bare `fn(...) {...}` bound directly by `let` takes the binding's
        // name, so the compiler can register it as the function's own
        // self-reference (see Compiler::compile_function).
        if let ExprKind::Function { name: fn_name @ None, .. } = &mut value.inner {
            *fn_name = Some(name.clone());
        }
        self.skip_semicolon();
        let span = Span::new(start.line, start.column, start.start, self.current_span().start);
        Ok(Stmt::new(StmtKind::Let { name, value }, span))
    }

    fn parse_return(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        self.advance();
        let value = if self.peek_kind() == &TokenKind::Semicolon || self.peek_kind() == &TokenKind::Eof || self.peek_kind() == &TokenKind::RBrace {
            None
        } else {
            Some(self.parse_expr(Prec::Lowest)?)
        };
        self.skip_semicolon();
        let span = Span::new(start.line, start.column, start.start, self.current_span().start);
        Ok(Stmt::new(StmtKind::Return(value), span))
    }

    fn parse_break(&mut self) -> ParseResult<Stmt> {
        let span = self.current_span();
        self.advance();
        self.skip_semicolon();
        Ok(Stmt::new(StmtKind::Break, span))
    }

    /// Distinguishes `ident = expr` (assignment statement) from a plain
    /// expression statement by lookahead on the token after the identifier.
    fn parse_assign_or_expr_stmt(&mut self) -> ParseResult<Stmt> {
        if let TokenKind::Identifier(name) = self.peek_kind().clone() {
            if self.tokens.get(self.pos + 1).map(|t| &t.kind) == Some(&TokenKind::Equal) {
                let start = self.current_span();
                self.advance();
                self.advance();
                let value = self.parse_expr(Prec::Lowest)?;
                self.skip_semicolon();
                let span = Span::new(start.line, start.column, start.start, self.current_span().start);
                return Ok(Stmt::new(StmtKind::Assign { name, value }, span));
            }
        }
        let start = self.current_span();
        let expr = self.parse_expr(Prec::Lowest)?;
        self.skip_semicolon();
        let span = Span::new(start.line, start.column, start.start, self.current_span().start);
        Ok(Stmt::new(StmtKind::Expr(expr), span))
    }

    fn parse_block(&mut self) -> ParseResult<Block> {
        self.expect(&TokenKind::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        while self.peek_kind() != &TokenKind::RBrace && self.peek_kind() != &TokenKind::Eof {
            match self.parse_stmt() {
                Ok(stmt) => stmts.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                }
            }
        }
        self.expect(&TokenKind::RBrace, "'}'")?;
        Ok(stmts)
    }

    fn parse_expr(&mut self, min_prec: Prec) -> ParseResult<Expr> {
        let mut left = self.parse_prefix()?;
        while self.peek_kind() != &TokenKind::Semicolon && min_prec < infix_prec(self.peek_kind()) {
            left = match self.peek_kind() {
                TokenKind::LParen => self.parse_call(left)?,
                TokenKind::LBracket => self.parse_index(left)?,
                _ => self.parse_infix(left)?,
            };
        }
        Ok(left)
    }

    fn parse_prefix(&mut self) -> ParseResult<Expr> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::IntLiteral(n) => { self.advance(); Ok(Expr::new(ExprKind::Integer(n), tok.span)) }
            TokenKind::StringLiteral(s) => { self.advance(); Ok(Expr::new(ExprKind::Str(s), tok.span)) }
            TokenKind::BoolLiteral(b) => { self.advance(); Ok(Expr::new(ExprKind::Boolean(b), tok.span)) }
            TokenKind::Identifier(name) => { self.advance(); Ok(Expr::new(ExprKind::Ident(name), tok.span)) }
            TokenKind::Bang => { self.advance(); let right = self.parse_expr(Prec::Prefix)?; Ok(Expr::new(ExprKind::Prefix { op: PrefixOp::Not, right: Box::new(right) }, tok.span)) }
            TokenKind::Minus => { self.advance(); let right = self.parse_expr(Prec::Prefix)?; Ok(Expr::new(ExprKind::Prefix { op: PrefixOp::Neg, right: Box::new(right) }, tok.span)) }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr(Prec::Lowest)?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            TokenKind::LBracket => self.parse_array(),
            TokenKind::LBrace => self.parse_hash(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Fn => self.parse_function(),
            _ => Err(ParseError::UnexpectedToken { expected: "expression".to_string(), found: tok.kind, span: tok.span }),
        }
    }

    fn parse_infix(&mut self, left: Expr) -> ParseResult<Expr> {
        let tok = self.advance();
        let op = match tok.kind {
            TokenKind::Plus => InfixOp::Add,
            TokenKind::Minus => InfixOp::Sub,
            TokenKind::Star => InfixOp::Mul,
            TokenKind::Slash => InfixOp::Div,
            TokenKind::EqualEqual => InfixOp::Eq,
            TokenKind::BangEqual => InfixOp::NotEq,
            TokenKind::Less => InfixOp::Lt,
            TokenKind::Greater => InfixOp::Gt,
            other => return Err(ParseError::UnexpectedToken { expected: "infix operator".to_string(), found: other, span: tok.span }),
        };
        let prec = infix_prec(&tok.kind);
        let right = self.parse_expr(prec)?;
        let span = Span::new(left.span.line, left.span.column, left.span.start, right.span.end);
        Ok(Expr::new(ExprKind::Infix { op, left: Box::new(left), right: Box::new(right) }, span))
    }

    fn parse_call(&mut self, callee: Expr) -> ParseResult<Expr> {
        let start = callee.span;
        self.advance();
        let mut args = Vec::new();
        if self.peek_kind() != &TokenKind::RParen {
            args.push(self.parse_expr(Prec::Lowest)?);
            while self.match_tok(&TokenKind::Comma) {
                args.push(self.parse_expr(Prec::Lowest)?);
            }
        }
        let end = self.expect(&TokenKind::RParen, "')'")?;
        let span = Span::new(start.line, start.column, start.start, end.span.end);
        Ok(Expr::new(ExprKind::Call { callee: Box::new(callee), args }, span))
    }

    fn parse_index(&mut self, left: Expr) -> ParseResult<Expr> {
        let start = left.span;
        self.advance();
        let index = self.parse_expr(Prec::Lowest)?;
        let end = self.expect(&TokenKind::RBracket, "']'")?;
        let span = Span::new(start.line, start.column, start.start, end.span.end);
        Ok(Expr::new(ExprKind::Index { left: Box::new(left), index: Box::new(index) }, span))
    }

    fn parse_array(&mut self) -> ParseResult<Expr> {
        let start = self.current_span();
        self.advance();
        let mut items = Vec::new();
        if self.peek_kind() != &TokenKind::RBracket {
            items.push(self.parse_expr(Prec::Lowest)?);
            while self.match_tok(&TokenKind::Comma) {
                items.push(self.parse_expr(Prec::Lowest)?);
            }
        }
        let end = self.expect(&TokenKind::RBracket, "']'")?;
        let span = Span::new(start.line, start.column, start.start, end.span.end);
        Ok(Expr::new(ExprKind::Array(items), span))
    }

    fn parse_hash(&mut self) -> ParseResult<Expr> {
        let start = self.current_span();
        self.advance();
        let mut pairs = Vec::new();
        if self.peek_kind() != &TokenKind::RBrace {
            loop {
                let key = self.parse_expr(Prec::Lowest)?;
                self.expect(&TokenKind::Colon, "':'")?;
                let value = self.parse_expr(Prec::Lowest)?;
                pairs.push((key, value));
                if !self.match_tok(&TokenKind::Comma) { break; }
                if self.peek_kind() == &TokenKind::RBrace { break; }
            }
        }
        let end = self.expect(&TokenKind::RBrace, "'}'")?;
        let span = Span::new(start.line, start.column, start.start, end.span.end);
        Ok(Expr::new(ExprKind::Hash(pairs), span))
    }

    fn parse_if(&mut self) -> ParseResult<Expr> {
        let start = self.current_span();
        self.advance();
        self.expect(&TokenKind::LParen, "'('")?;
        let condition = self.parse_expr(Prec::Lowest)?;
        self.expect(&TokenKind::RParen, "')'")?;
        let consequence = self.parse_block()?;
        let alternative = if self.match_tok(&TokenKind::Else) {
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(Expr::new(ExprKind::If { condition: Box::new(condition), consequence, alternative }, start))
    }

    fn parse_while(&mut self) -> ParseResult<Expr> {
        let start = self.current_span();
        self.advance();
        self.expect(&TokenKind::LParen, "'('")?;
        let condition = self.parse_expr(Prec::Lowest)?;
        self.expect(&TokenKind::RParen, "')'")?;
        let body = self.parse_block()?;
        Ok(Expr::new(ExprKind::While { condition: Box::new(condition), body }, start))
    }

    fn parse_function(&mut self) -> ParseResult<Expr> {
        let start = self.current_span();
        self.advance();
        let name = if let TokenKind::Identifier(n) = self.peek_kind().clone() {
            self.advance();
            Some(n)
        } else {
            None
        };
        self.expect(&TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        if self.peek_kind() != &TokenKind::RParen {
            loop {
                params.push(self.expect_identifier("parameter name")?);
                if !self.match_tok(&TokenKind::Comma) { break; }
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;
        let body = self.parse_block()?;
        Ok(Expr::new(ExprKind::Function { name, params, body }, start))
    }
}
