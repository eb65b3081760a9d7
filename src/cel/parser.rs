//! Parser for converting tokens into an AST
//!
//! Recursive descent with precedence climbing for binary operators. The
//! comprehension macros (`all`, `exists`, `exists_one`, `map`, `filter`) and
//! `has()` are expanded here, as CEL parsers do.

use super::ast::{BinaryOp, Expr, Literal, MacroKind, UnaryOp};
use super::error::CompileError;
use super::lexer::Lexer;
use super::token::{Token, TokenKind};

type ParseResult<T> = Result<T, CompileError>;

/// Maximum nesting of parenthesized or recursive constructs
const MAX_NESTING: usize = 128;

/// Parses an expression string into an AST
pub fn parse(source: &str) -> ParseResult<Expr> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expression()?;
    if !parser.at_end() {
        let token = parser.current();
        return Err(CompileError::syntax(
            format!("unexpected token '{}'", token.kind),
            token.span.start,
        ));
    }
    Ok(expr)
}

/// Parser for converting tokens into an AST
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
}

impl Parser {
    /// Create a new parser from a token list ending in `Eof`
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
            depth: 0,
        }
    }

    fn current(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.position.min(last)]
    }

    fn at_end(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current().kind == kind
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<()> {
        if self.check(&kind) {
            self.advance();
            return Ok(());
        }
        let token = self.current();
        Err(CompileError::syntax(
            format!("expected '{}', found '{}'", kind, token.kind),
            token.span.start,
        ))
    }

    fn enter(&mut self) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(CompileError::syntax(
                "expression nesting too deep",
                self.current().span.start,
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Parse a full expression (conditional is the lowest precedence)
    pub fn parse_expression(&mut self) -> ParseResult<Expr> {
        self.enter()?;
        let result = self.parse_conditional();
        self.leave();
        result
    }

    fn parse_conditional(&mut self) -> ParseResult<Expr> {
        let condition = self.parse_binary_expression(1)?;
        if !self.check(&TokenKind::Question) {
            return Ok(condition);
        }
        let position = self.current().span.start;
        self.advance();
        let then_expr = self.parse_binary_expression(1)?;
        self.expect(TokenKind::Colon)?;
        let else_expr = self.parse_conditional()?;
        Ok(Expr::Conditional {
            condition: Box::new(condition),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
            position,
        })
    }

    /// Parse binary expression with precedence climbing
    fn parse_binary_expression(&mut self, min_precedence: u8) -> ParseResult<Expr> {
        let mut left = self.parse_unary_expression()?;

        while let Some(precedence) = self.current().kind.precedence() {
            if precedence < min_precedence {
                break;
            }
            let token = self.current().clone();
            self.advance();

            let right = self.parse_binary_expression(precedence + 1)?;
            let op = match token.kind {
                TokenKind::Or => BinaryOp::Or,
                TokenKind::And => BinaryOp::And,
                TokenKind::Equal => BinaryOp::Equal,
                TokenKind::NotEqual => BinaryOp::NotEqual,
                TokenKind::Less => BinaryOp::Less,
                TokenKind::LessEqual => BinaryOp::LessEqual,
                TokenKind::Greater => BinaryOp::Greater,
                TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
                TokenKind::In => BinaryOp::In,
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Subtract,
                TokenKind::Star => BinaryOp::Multiply,
                TokenKind::Slash => BinaryOp::Divide,
                TokenKind::Percent => BinaryOp::Modulo,
                other => {
                    return Err(CompileError::syntax(
                        format!("unexpected operator '{}'", other),
                        token.span.start,
                    ));
                }
            };

            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                position: token.span.start,
            };
        }

        Ok(left)
    }

    fn parse_unary_expression(&mut self) -> ParseResult<Expr> {
        let position = self.current().span.start;
        let op = match self.current().kind {
            TokenKind::Not => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Negate,
            _ => return self.parse_postfix_expression(),
        };
        self.advance();
        self.enter()?;
        let operand = self.parse_unary_expression();
        self.leave();
        let operand = operand?;

        // Fold negative numeric literals
        if op == UnaryOp::Negate {
            match operand {
                Expr::Literal(Literal::Int(n)) => return Ok(Expr::Literal(Literal::Int(-n))),
                Expr::Literal(Literal::Double(n)) => {
                    return Ok(Expr::Literal(Literal::Double(-n)));
                }
                _ => {}
            }
        }

        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
            position,
        })
    }

    /// Parse member access, method calls and indexing
    fn parse_postfix_expression(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary_expression()?;

        loop {
            match self.current().kind {
                TokenKind::Dot => {
                    self.advance();
                    let position = self.current().span.start;
                    let TokenKind::Identifier(name) = self.current().kind.clone() else {
                        return Err(CompileError::syntax(
                            format!("expected field name after '.', found '{}'", self.current().kind),
                            position,
                        ));
                    };
                    self.advance();

                    if self.check(&TokenKind::LeftParen) {
                        let args = self.parse_arguments()?;
                        expr = self.member_call(expr, name, args, position)?;
                    } else {
                        expr = Expr::Select {
                            operand: Box::new(expr),
                            field: name,
                            position,
                        };
                    }
                }
                TokenKind::LeftBracket => {
                    let position = self.current().span.start;
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(TokenKind::RightBracket)?;
                    expr = Expr::Index {
                        operand: Box::new(expr),
                        index: Box::new(index),
                        position,
                    };
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    /// Builds a receiver-style call, expanding comprehension macros
    fn member_call(
        &mut self,
        target: Expr,
        function: String,
        mut args: Vec<Expr>,
        position: usize,
    ) -> ParseResult<Expr> {
        let Some(kind) = MacroKind::from_name(&function) else {
            return Ok(Expr::Call {
                target: Some(Box::new(target)),
                function,
                args,
                position,
            });
        };

        let arity_ok = match kind {
            MacroKind::Map => args.len() == 2 || args.len() == 3,
            _ => args.len() == 2,
        };
        if !arity_ok {
            return Err(CompileError::syntax(
                format!("wrong number of arguments to macro '{}'", kind.name()),
                position,
            ));
        }

        let var = match &args[0] {
            Expr::Ident { name, .. } => name.clone(),
            _ => {
                return Err(CompileError::syntax(
                    format!("argument must be a simple name in macro '{}'", kind.name()),
                    position,
                ));
            }
        };

        let (body, filter) = if args.len() == 3 {
            let transform = args.remove(2);
            let predicate = args.remove(1);
            (transform, Some(Box::new(predicate)))
        } else {
            (args.remove(1), None)
        };

        Ok(Expr::Comprehension {
            kind,
            range: Box::new(target),
            var,
            body: Box::new(body),
            filter,
            position,
        })
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Expr>> {
        self.expect(TokenKind::LeftParen)?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance();
            }
        }
        self.expect(TokenKind::RightParen)?;
        Ok(args)
    }

    fn parse_primary_expression(&mut self) -> ParseResult<Expr> {
        let token = self.current().clone();
        let position = token.span.start;

        match token.kind {
            TokenKind::Int(n) => {
                self.advance();
                Ok(Expr::Literal(Literal::Int(n)))
            }
            TokenKind::Uint(n) => {
                self.advance();
                Ok(Expr::Literal(Literal::Uint(n)))
            }
            TokenKind::Double(n) => {
                self.advance();
                Ok(Expr::Literal(Literal::Double(n)))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expr::Literal(Literal::String(s)))
            }
            TokenKind::Bool(b) => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(b)))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Literal(Literal::Null))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if !self.check(&TokenKind::LeftParen) {
                    return Ok(Expr::Ident { name, position });
                }
                let mut args = self.parse_arguments()?;
                if name == "has" {
                    return match (args.len(), args.pop()) {
                        (1, Some(Expr::Select { operand, field, .. })) => Ok(Expr::Has {
                            operand,
                            field,
                            position,
                        }),
                        _ => Err(CompileError::syntax(
                            "invalid argument to has() macro",
                            position,
                        )),
                    };
                }
                Ok(Expr::Call {
                    target: None,
                    function: name,
                    args,
                    position,
                })
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RightParen)?;
                Ok(expr)
            }
            TokenKind::LeftBracket => {
                self.advance();
                let mut elements = Vec::new();
                while !self.check(&TokenKind::RightBracket) {
                    elements.push(self.parse_expression()?);
                    if !self.check(&TokenKind::Comma) {
                        break;
                    }
                    self.advance();
                }
                self.expect(TokenKind::RightBracket)?;
                Ok(Expr::List(elements))
            }
            TokenKind::LeftBrace => {
                self.advance();
                let mut entries = Vec::new();
                while !self.check(&TokenKind::RightBrace) {
                    let key = self.parse_expression()?;
                    self.expect(TokenKind::Colon)?;
                    let value = self.parse_expression()?;
                    entries.push((key, value));
                    if !self.check(&TokenKind::Comma) {
                        break;
                    }
                    self.advance();
                }
                self.expect(TokenKind::RightBrace)?;
                Ok(Expr::Map(entries))
            }
            TokenKind::Eof => Err(CompileError::syntax("unexpected end of input", position)),
            other => Err(CompileError::syntax(
                format!("unexpected token '{}'", other),
                position,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        let expr = parse("1 + 2 * 3 == 7 && true").unwrap();
        let Expr::Binary { op, left, .. } = expr else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::And);
        let Expr::Binary { op, .. } = *left else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Equal);
    }

    #[test]
    fn test_all_macro_expansion() {
        let expr = parse("self.all(x, x.all(x, x != 0))").unwrap();
        let Expr::Comprehension {
            kind, var, body, ..
        } = expr
        else {
            panic!("expected comprehension");
        };
        assert_eq!(kind, MacroKind::All);
        assert_eq!(var, "x");
        assert!(matches!(*body, Expr::Comprehension { .. }));
    }

    #[test]
    fn test_macro_requires_identifier() {
        let err = parse("self.all(1, true)").unwrap_err();
        assert!(err.message.contains("simple name"));
    }

    #[test]
    fn test_has_macro() {
        let expr = parse("has(self.Name)").unwrap();
        assert!(matches!(expr, Expr::Has { ref field, .. } if field == "Name"));
        assert!(parse("has(self)").is_err());
    }

    #[test]
    fn test_namespaced_call_parses_as_member_call() {
        let expr = parse("strings.ToUpper(self)").unwrap();
        let Expr::Call {
            target, function, ..
        } = expr
        else {
            panic!("expected call");
        };
        assert_eq!(function, "ToUpper");
        assert_eq!(target.and_then(|t| t.qualified_name()), Some("strings".into()));
    }

    #[test]
    fn test_incomplete_expression() {
        let err = parse("1 <").unwrap_err();
        assert!(err.message.contains("unexpected end of input"));
    }

    #[test]
    fn test_trailing_tokens() {
        assert!(parse("a b").is_err());
    }

    #[test]
    fn test_conditional_and_literals() {
        let expr = parse("x ? [1, 2] : {'a': -1}").unwrap();
        assert!(matches!(expr, Expr::Conditional { .. }));
    }
}
