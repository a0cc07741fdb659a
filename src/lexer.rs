// ABOUTME: Byte-level lexer for Monad source, with line/column tracking

use crate::error::{CompileError, Diagnostic};
use crate::token::{Pos, Token, TokenKind};

const SYMBOL_EXTRA: &str = "+-*/<>=!?_:";

fn is_symbol_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || SYMBOL_EXTRA.as_bytes().contains(&b)
}

fn is_symbol_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || SYMBOL_EXTRA.as_bytes().contains(&b)
}

/// Walks a byte buffer, classifying the next token on each call to `next`.
///
/// Tracks a 1-based line and column of the current byte so every emitted
/// token can report exactly where it started.
pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src: src.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(b)
    }

    fn here(&self) -> Pos {
        Pos::new(self.line, self.column)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_whitespace() => {
                    self.advance();
                }
                Some(b';') => {
                    while !matches!(self.peek(), None | Some(b'\n')) {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    /// Produces the next token, or an error for an unrecognised byte or an
    /// unterminated string/char literal.
    pub fn next(&mut self) -> Result<Token, CompileError> {
        self.skip_trivia();
        let start = self.here();

        let Some(b) = self.peek() else {
            return Ok(Token::new(TokenKind::Eof, None, start));
        };

        match b {
            b'(' => {
                self.advance();
                Ok(Token::new(TokenKind::OpenParen, None, start))
            }
            b')' => {
                self.advance();
                Ok(Token::new(TokenKind::CloseParen, None, start))
            }
            b'[' => {
                self.advance();
                Ok(Token::new(TokenKind::OpenBracket, None, start))
            }
            b']' => {
                self.advance();
                Ok(Token::new(TokenKind::CloseBracket, None, start))
            }
            b'-' if self.peek_at(1) == Some(b'>') => {
                self.advance();
                self.advance();
                Ok(Token::new(TokenKind::Arrow, None, start))
            }
            b'\'' => self.lex_quote_or_char(start),
            b'"' => self.lex_string(start),
            b'0' if matches!(self.peek_at(1), Some(b'x' | b'X' | b'b' | b'B' | b'o' | b'O')) => {
                Ok(self.lex_prefixed_int(start))
            }
            b'-' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                Ok(self.lex_number(start))
            }
            b if b.is_ascii_digit() => Ok(self.lex_number(start)),
            b if is_symbol_start(b) => Ok(self.lex_symbol(start)),
            other => Err(CompileError::unexpected_byte(Diagnostic::new(
                start,
                None,
                format!("unexpected byte '{}'", other as char),
                None,
            ))),
        }
    }

    /// `'` followed by a 3- or 4-byte char form is a char literal; any other
    /// `'` is a bare quote prefix.
    fn lex_quote_or_char(&mut self, start: Pos) -> Result<Token, CompileError> {
        // Escaped char literal: 'x', '\n', '\t', '\r', '\\', '\'', '\0'
        if self.peek_at(1) == Some(b'\\') && self.peek_at(3) == Some(b'\'') {
            self.advance(); // '
            self.advance(); // backslash
            let escaped = self.advance().ok_or_else(|| {
                CompileError::unterminated_char(Diagnostic::new(
                    start,
                    None,
                    "unterminated character literal".to_string(),
                    None,
                ))
            })?;
            let decoded = decode_escape(escaped).ok_or_else(|| {
                CompileError::unterminated_char(Diagnostic::new(
                    start,
                    None,
                    format!("unknown escape '\\{}'", escaped as char),
                    None,
                ))
            })?;
            self.advance(); // closing '
            return Ok(Token::new(
                TokenKind::Char,
                Some((decoded as char).to_string()),
                start,
            ));
        }

        // Plain char literal: 'x'
        if self.peek_at(2) == Some(b'\'') && !matches!(self.peek_at(1), None | Some(b'\'')) {
            self.advance(); // '
            let lit = self.advance().unwrap();
            self.advance(); // closing '
            return Ok(Token::new(
                TokenKind::Char,
                Some((lit as char).to_string()),
                start,
            ));
        }

        self.advance(); // the bare quote
        Ok(Token::new(TokenKind::QuotePrefix, None, start))
    }

    fn lex_string(&mut self, start: Pos) -> Result<Token, CompileError> {
        self.advance(); // opening quote
        let mut out = String::new();
        loop {
            match self.advance() {
                None => {
                    return Err(CompileError::unterminated_string(Diagnostic::new(
                        start,
                        None,
                        "unterminated string literal".to_string(),
                        None,
                    )))
                }
                Some(b'"') => break,
                Some(b'\\') => match self.advance() {
                    Some(escaped) => match decode_escape(escaped) {
                        Some(c) => out.push(c as char),
                        None => {
                            return Err(CompileError::unterminated_string(Diagnostic::new(
                                start,
                                None,
                                format!("unknown escape '\\{}'", escaped as char),
                                None,
                            )))
                        }
                    },
                    None => {
                        return Err(CompileError::unterminated_string(Diagnostic::new(
                            start,
                            None,
                            "unterminated string literal".to_string(),
                            None,
                        )))
                    }
                },
                Some(b) => out.push(b as char),
            }
        }
        Ok(Token::new(TokenKind::String, Some(out), start))
    }

    fn lex_prefixed_int(&mut self, start: Pos) -> Token {
        let begin = self.pos;
        self.advance(); // '0'
        self.advance(); // base letter
        while self.peek().is_some_and(|b| b.is_ascii_alphanumeric()) {
            self.advance();
        }
        let slice = std::str::from_utf8(&self.src[begin..self.pos]).unwrap();
        Token::new(TokenKind::Number, Some(slice.to_string()), start)
    }

    fn lex_number(&mut self, start: Pos) -> Token {
        let begin = self.pos;
        if self.peek() == Some(b'-') {
            self.advance();
        }
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.advance();
        }
        if self.peek() == Some(b'.') {
            self.advance();
            while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                self.advance();
            }
        }
        let slice = std::str::from_utf8(&self.src[begin..self.pos]).unwrap();
        Token::new(TokenKind::Number, Some(slice.to_string()), start)
    }

    fn lex_symbol(&mut self, start: Pos) -> Token {
        let begin = self.pos;
        self.advance();
        while self.peek().is_some_and(is_symbol_continue) {
            self.advance();
        }
        let slice = std::str::from_utf8(&self.src[begin..self.pos]).unwrap();
        Token::new(TokenKind::Symbol, Some(slice.to_string()), start)
    }
}

fn decode_escape(b: u8) -> Option<u8> {
    match b {
        b'n' => Some(b'\n'),
        b't' => Some(b'\t'),
        b'r' => Some(b'\r'),
        b'\\' => Some(b'\\'),
        b'\'' => Some(b'\''),
        b'"' => Some(b'"'),
        b'0' => Some(0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next().expect("lex error");
            let done = tok.kind == TokenKind::Eof;
            out.push(tok.kind);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn brackets_and_parens() {
        assert_eq!(
            tokens("([])"),
            vec![
                TokenKind::OpenParen,
                TokenKind::OpenBracket,
                TokenKind::CloseBracket,
                TokenKind::CloseParen,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn arrow_is_distinct_from_minus() {
        let mut lexer = Lexer::new("->");
        let tok = lexer.next().unwrap();
        assert_eq!(tok.kind, TokenKind::Arrow);

        let mut lexer = Lexer::new("- x");
        let tok = lexer.next().unwrap();
        assert_eq!(tok.kind, TokenKind::Symbol);
        assert_eq!(tok.text(), "-");
    }

    #[test]
    fn number_lexemes_preserve_base_prefix() {
        for (src, expected) in [("0xFF", "0xFF"), ("0b1010", "0b1010"), ("0o17", "0o17")] {
            let mut lexer = Lexer::new(src);
            let tok = lexer.next().unwrap();
            assert_eq!(tok.kind, TokenKind::Number);
            assert_eq!(tok.text(), expected);
        }
    }

    #[test]
    fn decimal_and_float_numbers() {
        let mut lexer = Lexer::new("-3.5");
        let tok = lexer.next().unwrap();
        assert_eq!(tok.kind, TokenKind::Number);
        assert_eq!(tok.text(), "-3.5");
    }

    #[test]
    fn char_literal_and_escape() {
        let mut lexer = Lexer::new("'a'");
        let tok = lexer.next().unwrap();
        assert_eq!(tok.kind, TokenKind::Char);
        assert_eq!(tok.text(), "a");

        let mut lexer = Lexer::new("'\\n'");
        let tok = lexer.next().unwrap();
        assert_eq!(tok.kind, TokenKind::Char);
        assert_eq!(tok.text(), "\n");
    }

    #[test]
    fn bare_quote_is_prefix() {
        let mut lexer = Lexer::new("'foo");
        let tok = lexer.next().unwrap();
        assert_eq!(tok.kind, TokenKind::QuotePrefix);
    }

    #[test]
    fn string_with_escapes() {
        let mut lexer = Lexer::new(r#""a\nb""#);
        let tok = lexer.next().unwrap();
        assert_eq!(tok.kind, TokenKind::String);
        assert_eq!(tok.text(), "a\nb");
    }

    #[test]
    fn comment_is_skipped() {
        let mut lexer = Lexer::new("; comment\n42");
        let tok = lexer.next().unwrap();
        assert_eq!(tok.kind, TokenKind::Number);
        assert_eq!(tok.text(), "42");
        assert_eq!(tok.pos.line, 2);
    }

    #[test]
    fn line_and_column_tracking() {
        let mut lexer = Lexer::new("(a\n  b)");
        let open = lexer.next().unwrap();
        assert_eq!(open.pos, Pos::new(1, 1));
        let a = lexer.next().unwrap();
        assert_eq!(a.pos, Pos::new(1, 2));
        let b = lexer.next().unwrap();
        assert_eq!(b.pos, Pos::new(2, 3));
    }

    #[test]
    fn unterminated_string_errors() {
        let mut lexer = Lexer::new("\"abc");
        assert!(lexer.next().is_err());
    }

    #[test]
    fn unexpected_byte_errors() {
        let mut lexer = Lexer::new("@");
        assert!(lexer.next().is_err());
    }
}
