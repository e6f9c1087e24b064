//! Recursive-descent parser for blang
//!
//! Consumes the lexer's token stream and builds the AST. Precedence, from
//! loosest to tightest: assignment, `||`, `&&`, `==`/`!=`, relational,
//! additive, multiplicative, `^` (right associative), unary, postfix.

use crate::ast::{
    BinaryOp, Decl, Expr, ExprKind, Fixity, IncDecOp, Param, Program, Stmt, Type, UnaryOp,
};
use crate::error::CompileError;
use crate::lexer::Token;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    /// Parse a whole program: a list of top-level declarations.
    pub fn parse(&mut self) -> Result<Program, CompileError> {
        let mut decls = Vec::new();
        while !self.is_at_end() {
            decls.push(self.parse_decl()?);
        }
        Ok(Program::new(decls))
    }

    fn parse_decl(&mut self) -> Result<Decl, CompileError> {
        let ty = self.parse_type()?.ok_or_else(|| {
            CompileError::Parse(format!("expected a type, found {}", self.describe_current()))
        })?;
        let name = self.expect_id()?;

        if self.eat(&Token::LParen) {
            let params = self.parse_params()?;
            let fty = Type::Function {
                params,
                ret: Box::new(ty),
            };
            if self.eat(&Token::Semi) {
                return Ok(Decl::new(name, fty, None, None));
            }
            let body = self.parse_block()?;
            return Ok(Decl::new(name, fty, None, Some(body)));
        }

        let value = if self.eat(&Token::Assign) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(&Token::Semi)?;
        Ok(Decl::new(name, ty, value, None))
    }

    /// Consume a type keyword if one is next. `var` is the inference
    /// sentinel and parses as `Type::Unknown`.
    fn parse_type(&mut self) -> Result<Option<Type>, CompileError> {
        let ty = match self.peek() {
            Some(Token::Int) => Type::Int,
            Some(Token::Boolean) => Type::Boolean,
            Some(Token::Char) => Type::Char,
            Some(Token::String) => Type::String,
            Some(Token::Void) => Type::Void,
            Some(Token::Var) => Type::Unknown,
            _ => return Ok(None),
        };
        self.advance();
        Ok(Some(ty))
    }

    fn parse_params(&mut self) -> Result<Vec<Param>, CompileError> {
        let mut params = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(params);
        }
        loop {
            let ty = self.parse_type()?.ok_or_else(|| {
                CompileError::Parse(format!(
                    "expected a parameter type, found {}",
                    self.describe_current()
                ))
            })?;
            let name = self.expect_id()?;
            params.push(Param { name, ty });
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen)?;
        Ok(params)
    }

    fn parse_block(&mut self) -> Result<Stmt, CompileError> {
        self.expect(&Token::LBrace)?;
        let mut stmts = Vec::new();
        while !self.eat(&Token::RBrace) {
            if self.is_at_end() {
                return Err(CompileError::Parse("unexpected end of file in block".to_string()));
            }
            stmts.push(self.parse_stmt()?);
        }
        Ok(Stmt::Block(stmts))
    }

    fn parse_stmt(&mut self) -> Result<Stmt, CompileError> {
        match self.peek() {
            Some(
                Token::Int | Token::Boolean | Token::Char | Token::String | Token::Void
                | Token::Var,
            ) => Ok(Stmt::Decl(Box::new(self.parse_decl()?))),
            Some(Token::If) => {
                self.advance();
                self.expect(&Token::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                let body = Box::new(self.parse_stmt()?);
                let ebody = if self.eat(&Token::Else) {
                    Some(Box::new(self.parse_stmt()?))
                } else {
                    None
                };
                Ok(Stmt::IfElse { cond, body, ebody })
            }
            Some(Token::While) => {
                self.advance();
                self.expect(&Token::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                let body = Box::new(self.parse_stmt()?);
                Ok(Stmt::While { cond, body })
            }
            Some(Token::Return) => {
                self.advance();
                if self.eat(&Token::Semi) {
                    return Ok(Stmt::Return(None));
                }
                let expr = self.parse_expr()?;
                self.expect(&Token::Semi)?;
                Ok(Stmt::Return(Some(expr)))
            }
            Some(Token::LBrace) => self.parse_block(),
            Some(Token::Print) => {
                self.advance();
                if self.eat(&Token::Semi) {
                    return Ok(Stmt::Print(Vec::new()));
                }
                let args = self.parse_expr_list()?;
                self.expect(&Token::Semi)?;
                Ok(Stmt::Print(args))
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect(&Token::Semi)?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn parse_expr_list(&mut self) -> Result<Vec<Expr>, CompileError> {
        let mut exprs = vec![self.parse_expr()?];
        while self.eat(&Token::Comma) {
            exprs.push(self.parse_expr()?);
        }
        Ok(exprs)
    }

    fn parse_expr(&mut self) -> Result<Expr, CompileError> {
        // Assignment targets are plain identifiers, so one token of
        // lookahead past the name decides.
        if let (Some(Token::Id(_)), Some(Token::Assign)) = (self.peek(), self.peek2()) {
            let name = self.expect_id()?;
            self.advance(); // '='
            let value = self.parse_expr()?;
            return Ok(Expr::new(ExprKind::Assign {
                name,
                symbol: None,
                value: Box::new(value),
            }));
        }
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_equality()?;
        while self.eat(&Token::And) {
            let right = self.parse_equality()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::Ne) => BinaryOp::Ne,
                _ => break,
            };
            self.advance();
            let right = self.parse_relational()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Add) => BinaryOp::Add,
                Some(Token::Sub) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_power()?;
        loop {
            let op = match self.peek() {
                Some(Token::Mul) => BinaryOp::Mul,
                Some(Token::Div) => BinaryOp::Div,
                Some(Token::Mod) => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_power()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_power(&mut self) -> Result<Expr, CompileError> {
        let left = self.parse_unary()?;
        if self.eat(&Token::Pow) {
            let right = self.parse_power()?;
            return Ok(binary(BinaryOp::Pow, left, right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        let op = match self.peek() {
            Some(Token::Not) => Some(UnaryOp::Not),
            Some(Token::Add) => Some(UnaryOp::Pos),
            Some(Token::Sub) => Some(UnaryOp::Neg),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::new(ExprKind::Unary {
                op,
                operand: Box::new(operand),
            }));
        }

        let incdec = match self.peek() {
            Some(Token::Incr) => Some(IncDecOp::Incr),
            Some(Token::Decr) => Some(IncDecOp::Decr),
            _ => None,
        };
        if let Some(op) = incdec {
            self.advance();
            let target = self.parse_unary()?;
            if !matches!(target.kind, ExprKind::Name { .. }) {
                return Err(CompileError::Parse(format!(
                    "operand of '{}' must be a variable",
                    op
                )));
            }
            return Ok(Expr::new(ExprKind::IncDec {
                op,
                fixity: Fixity::Pre,
                target: Box::new(target),
            }));
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, CompileError> {
        let expr = self.parse_primary()?;
        let op = match self.peek() {
            Some(Token::Incr) => Some(IncDecOp::Incr),
            Some(Token::Decr) => Some(IncDecOp::Decr),
            _ => None,
        };
        if let Some(op) = op {
            if !matches!(expr.kind, ExprKind::Name { .. }) {
                return Err(CompileError::Parse(format!(
                    "operand of '{}' must be a variable",
                    op
                )));
            }
            self.advance();
            return Ok(Expr::new(ExprKind::IncDec {
                op,
                fixity: Fixity::Post,
                target: Box::new(expr),
            }));
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        match self.advance() {
            Some(Token::IntLiteral(digits)) => {
                let value = digits.parse::<i32>().map_err(|_| {
                    CompileError::Parse(format!("integer literal {} out of range", digits))
                })?;
                Ok(Expr::int(value))
            }
            Some(Token::CharLiteral { spelling, value }) => {
                Ok(Expr::new(ExprKind::Char { spelling, value }))
            }
            Some(Token::StringLiteral(spelling)) => Ok(Expr::new(ExprKind::Str { spelling })),
            Some(Token::True) => Ok(Expr::boolean(true)),
            Some(Token::False) => Ok(Expr::boolean(false)),
            Some(Token::Id(name)) => {
                if self.eat(&Token::LParen) {
                    let args = if self.eat(&Token::RParen) {
                        Vec::new()
                    } else {
                        let args = self.parse_expr_list()?;
                        self.expect(&Token::RParen)?;
                        args
                    };
                    return Ok(Expr::new(ExprKind::Call {
                        name,
                        symbol: None,
                        args,
                    }));
                }
                Ok(Expr::new(ExprKind::Name { name, symbol: None }))
            }
            Some(Token::LParen) => {
                let expr = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Some(token) => Err(CompileError::Parse(format!(
                "unexpected token {:?} in expression",
                token
            ))),
            None => Err(CompileError::Parse(
                "unexpected end of file in expression".to_string(),
            )),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek2(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), CompileError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(CompileError::Parse(format!(
                "expected {:?}, found {}",
                expected,
                self.describe_current()
            )))
        }
    }

    fn expect_id(&mut self) -> Result<String, CompileError> {
        match self.advance() {
            Some(Token::Id(name)) => Ok(name),
            Some(token) => Err(CompileError::Parse(format!(
                "expected an identifier, found {:?}",
                token
            ))),
            None => Err(CompileError::Parse(
                "expected an identifier, found end of file".to_string(),
            )),
        }
    }

    fn describe_current(&self) -> String {
        match self.peek() {
            Some(token) => format!("{:?}", token),
            None => "end of file".to_string(),
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::new(ExprKind::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}
