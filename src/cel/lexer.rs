//! Lexer for tokenizing expression strings
//!
//! Follows CEL literal syntax: single, double and triple quoted strings,
//! raw strings (`r'...'`), decimal and hex integers, unsigned suffix `u`,
//! and doubles with fraction or exponent.

use super::error::CompileError;
use super::token::{Span, Token, TokenKind};

type LexResult<T> = Result<T, CompileError>;

/// Lexer for tokenizing expression strings
pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer from an input string
    pub fn new(input: &'a str) -> Self {
        Self { input, position: 0 }
    }

    /// Tokenize the entire input string, ending with an `Eof` token
    pub fn tokenize(&mut self) -> LexResult<Vec<Token>> {
        let mut tokens = Vec::with_capacity((self.input.len() / 4).max(8));
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> LexResult<Token> {
        self.skip_whitespace_and_comments();

        let start = self.position;
        let Some(ch) = self.current_char() else {
            return Ok(Token::new(TokenKind::Eof, Span::new(start, start)));
        };

        let kind = match ch {
            '(' => self.single(TokenKind::LeftParen),
            ')' => self.single(TokenKind::RightParen),
            '[' => self.single(TokenKind::LeftBracket),
            ']' => self.single(TokenKind::RightBracket),
            '{' => self.single(TokenKind::LeftBrace),
            '}' => self.single(TokenKind::RightBrace),
            ',' => self.single(TokenKind::Comma),
            ':' => self.single(TokenKind::Colon),
            '?' => self.single(TokenKind::Question),
            '+' => self.single(TokenKind::Plus),
            '-' => self.single(TokenKind::Minus),
            '*' => self.single(TokenKind::Star),
            '/' => self.single(TokenKind::Slash),
            '%' => self.single(TokenKind::Percent),
            '.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.read_number()?,
            '.' => self.single(TokenKind::Dot),
            '=' if self.peek() == Some('=') => self.double(TokenKind::Equal),
            '!' if self.peek() == Some('=') => self.double(TokenKind::NotEqual),
            '!' => self.single(TokenKind::Not),
            '<' if self.peek() == Some('=') => self.double(TokenKind::LessEqual),
            '<' => self.single(TokenKind::Less),
            '>' if self.peek() == Some('=') => self.double(TokenKind::GreaterEqual),
            '>' => self.single(TokenKind::Greater),
            '&' if self.peek() == Some('&') => self.double(TokenKind::And),
            '|' if self.peek() == Some('|') => self.double(TokenKind::Or),
            '"' | '\'' => self.read_string(false)?,
            'r' | 'R' if matches!(self.peek(), Some('"') | Some('\'')) => {
                self.advance();
                self.read_string(true)?
            }
            c if c.is_ascii_digit() => self.read_number()?,
            c if c.is_alphabetic() || c == '_' => self.read_identifier(),
            other => {
                return Err(CompileError::syntax(
                    format!("unexpected character '{}'", other),
                    start,
                ));
            }
        };

        Ok(Token::new(kind, Span::new(start, self.position)))
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    fn double(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        self.advance();
        kind
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn peek(&self) -> Option<char> {
        let current = self.current_char()?;
        self.input[self.position + current.len_utf8()..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.position += ch.len_utf8();
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.position..]
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.current_char().is_some_and(char::is_whitespace) {
                self.advance();
            }
            if self.rest().starts_with("//") {
                while self.current_char().is_some_and(|c| c != '\n') {
                    self.advance();
                }
                continue;
            }
            break;
        }
    }

    fn read_identifier(&mut self) -> TokenKind {
        let start = self.position;
        while self
            .current_char()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.advance();
        }
        match &self.input[start..self.position] {
            "true" => TokenKind::Bool(true),
            "false" => TokenKind::Bool(false),
            "null" => TokenKind::Null,
            "in" => TokenKind::In,
            name => TokenKind::Identifier(name.to_string()),
        }
    }

    fn read_number(&mut self) -> LexResult<TokenKind> {
        let start = self.position;

        // Hexadecimal
        if self.rest().starts_with("0x") || self.rest().starts_with("0X") {
            self.advance();
            self.advance();
            let digits_start = self.position;
            while self.current_char().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.advance();
            }
            let digits = &self.input[digits_start..self.position];
            if matches!(self.current_char(), Some('u') | Some('U')) {
                self.advance();
                return u64::from_str_radix(digits, 16)
                    .map(TokenKind::Uint)
                    .map_err(|_| CompileError::syntax("invalid uint literal", start));
            }
            return i64::from_str_radix(digits, 16)
                .map(TokenKind::Int)
                .map_err(|_| CompileError::syntax("invalid int literal", start));
        }

        let mut is_double = false;
        while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.current_char() == Some('.') && self.peek().is_some_and(|c| c.is_ascii_digit()) {
            is_double = true;
            self.advance();
            while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.current_char(), Some('e') | Some('E')) {
            let checkpoint = self.position;
            self.advance();
            if matches!(self.current_char(), Some('+') | Some('-')) {
                self.advance();
            }
            if self.current_char().is_some_and(|c| c.is_ascii_digit()) {
                is_double = true;
                while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                }
            } else {
                self.position = checkpoint;
            }
        }

        let text = &self.input[start..self.position];
        if is_double {
            return text
                .parse::<f64>()
                .map(TokenKind::Double)
                .map_err(|_| CompileError::syntax("invalid double literal", start));
        }
        if matches!(self.current_char(), Some('u') | Some('U')) {
            self.advance();
            return text
                .parse::<u64>()
                .map(TokenKind::Uint)
                .map_err(|_| CompileError::syntax("invalid uint literal", start));
        }
        text.parse::<i64>()
            .map(TokenKind::Int)
            .map_err(|_| CompileError::syntax("invalid int literal", start))
    }

    fn read_string(&mut self, raw: bool) -> LexResult<TokenKind> {
        let start = self.position;
        let Some(quote) = self.current_char() else {
            return Err(CompileError::syntax("unterminated string literal", start));
        };
        let triple: String = std::iter::repeat_n(quote, 3).collect();
        let delimiter = if self.rest().starts_with(&triple) {
            triple
        } else {
            quote.to_string()
        };
        for _ in 0..delimiter.len() {
            self.advance();
        }

        let mut value = String::new();
        loop {
            if self.rest().starts_with(&delimiter) {
                for _ in 0..delimiter.len() {
                    self.advance();
                }
                return Ok(TokenKind::String(value));
            }
            let Some(ch) = self.current_char() else {
                return Err(CompileError::syntax("unterminated string literal", start));
            };
            if ch == '\n' && delimiter.len() == 1 {
                return Err(CompileError::syntax("unterminated string literal", start));
            }
            self.advance();
            if ch != '\\' || raw {
                value.push(ch);
                continue;
            }
            self.read_escape(&mut value, start)?;
        }
    }

    fn read_escape(&mut self, out: &mut String, start: usize) -> LexResult<()> {
        let Some(escaped) = self.current_char() else {
            return Err(CompileError::syntax("unterminated string literal", start));
        };
        self.advance();
        match escaped {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'v' => out.push('\u{0b}'),
            '0' => out.push('\0'),
            '\\' | '\'' | '"' | '`' | '?' => out.push(escaped),
            'x' | 'u' | 'U' => {
                let len = match escaped {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let end = self.position + len;
                let digits = self
                    .input
                    .get(self.position..end)
                    .ok_or_else(|| CompileError::syntax("truncated escape sequence", start))?;
                let code = u32::from_str_radix(digits, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| CompileError::syntax("invalid escape sequence", start))?;
                out.push(code);
                self.position = end;
            }
            // Regex classes such as \s or \d are kept verbatim
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_operators_and_identifiers() {
        assert_eq!(
            kinds("self.size() >= 3 && !x"),
            vec![
                TokenKind::Identifier("self".into()),
                TokenKind::Dot,
                TokenKind::Identifier("size".into()),
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::GreaterEqual,
                TokenKind::Int(3),
                TokenKind::And,
                TokenKind::Not,
                TokenKind::Identifier("x".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_number_literals() {
        assert_eq!(kinds("0")[0], TokenKind::Int(0));
        assert_eq!(kinds("7u")[0], TokenKind::Uint(7));
        assert_eq!(kinds("0x1F")[0], TokenKind::Int(31));
        assert_eq!(kinds("0.0")[0], TokenKind::Double(0.0));
        assert_eq!(kinds("1e3")[0], TokenKind::Double(1000.0));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(kinds(r#""a\"b""#)[0], TokenKind::String("a\"b".into()));
        assert_eq!(kinds(r"'\\s'")[0], TokenKind::String(r"\s".into()));
        assert_eq!(kinds(r"'\s'")[0], TokenKind::String(r"\s".into()));
        assert_eq!(kinds(r"r'\d+'")[0], TokenKind::String(r"\d+".into()));
        assert_eq!(kinds("'''x'y'''")[0], TokenKind::String("x'y".into()));
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(kinds(r#""""#)[0], TokenKind::String(String::new()));
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("'abc").tokenize().unwrap_err();
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn test_unexpected_character() {
        let err = Lexer::new("a # b").tokenize().unwrap_err();
        assert_eq!(err.position, 2);
    }
}
