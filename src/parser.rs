// ABOUTME: Recursive-descent parser over the lexer's token stream

use crate::ast::{Ast, AstKind, Lambda, ParamSig, Signature, Span};
use crate::error::{CompileError, Diagnostic};
use crate::lexer::Lexer;
use crate::token::{Pos, Token, TokenKind};

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    lookahead: Token,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Result<Self, CompileError> {
        let mut lexer = Lexer::new(source);
        let lookahead = lexer.next()?;
        Ok(Self { lexer, lookahead })
    }

    fn peek(&self) -> &Token {
        &self.lookahead
    }

    fn bump(&mut self) -> Result<Token, CompileError> {
        let next = self.lexer.next()?;
        Ok(std::mem::replace(&mut self.lookahead, next))
    }

    fn expect_close_paren(&mut self, what: &str) -> Result<Token, CompileError> {
        if self.peek().kind == TokenKind::CloseParen {
            self.bump()
        } else {
            Err(CompileError::MissingCloseParen(Diagnostic::new(
                self.peek().pos,
                None,
                format!("expected ')' to close {what}"),
                None,
            )))
        }
    }

    fn expect_close_bracket(&mut self, what: &str) -> Result<Token, CompileError> {
        if self.peek().kind == TokenKind::CloseBracket {
            self.bump()
        } else {
            Err(CompileError::MissingCloseBracket(Diagnostic::new(
                self.peek().pos,
                None,
                format!("expected ']' to close {what}"),
                None,
            )))
        }
    }

    fn expect_open_paren(&mut self, what: &str) -> Result<Token, CompileError> {
        if self.peek().kind == TokenKind::OpenParen {
            self.bump()
        } else {
            Err(CompileError::MalformedSignature(Diagnostic::new(
                self.peek().pos,
                None,
                format!("expected '(' to start {what}"),
                None,
            )))
        }
    }

    fn expect_symbol(&mut self, what: &str) -> Result<Token, CompileError> {
        if self.peek().kind == TokenKind::Symbol {
            self.bump()
        } else {
            Err(CompileError::MalformedSignature(Diagnostic::new(
                self.peek().pos,
                None,
                format!("expected {what}"),
                None,
            )))
        }
    }

    /// A single expression, used interactively line by line.
    pub fn parse_one(&mut self) -> Result<Ast, CompileError> {
        self.parse_expr()
    }

    /// Every top-level expression in a whole file.
    pub fn parse_all(&mut self) -> Result<Vec<Ast>, CompileError> {
        let mut out = Vec::new();
        while self.peek().kind != TokenKind::Eof {
            out.push(self.parse_expr()?);
        }
        Ok(out)
    }

    fn parse_expr(&mut self) -> Result<Ast, CompileError> {
        match self.peek().kind {
            TokenKind::OpenParen => self.parse_paren_list(),
            TokenKind::OpenBracket => self.parse_bracket_list(),
            TokenKind::QuotePrefix => self.parse_quote(),
            TokenKind::Number => self.parse_number(),
            TokenKind::String => self.parse_string(),
            TokenKind::Char => self.parse_char(),
            TokenKind::Symbol => self.parse_symbol(),
            TokenKind::Arrow => self.parse_arrow_symbol(),
            TokenKind::CloseParen | TokenKind::CloseBracket | TokenKind::Eof => {
                Err(CompileError::unexpected_token(Diagnostic::new(
                    self.peek().pos,
                    None,
                    "expected an expression".to_string(),
                    None,
                )))
            }
        }
    }

    fn parse_list_items_into(&mut self, items: &mut Vec<Ast>) -> Result<(), CompileError> {
        loop {
            match self.peek().kind {
                TokenKind::CloseParen => break,
                TokenKind::Eof => {
                    return Err(CompileError::MissingCloseParen(Diagnostic::new(
                        self.peek().pos,
                        None,
                        "expected ')' to close list".to_string(),
                        None,
                    )))
                }
                _ => items.push(self.parse_expr()?),
            }
        }
        Ok(())
    }

    fn parse_paren_list(&mut self) -> Result<Ast, CompileError> {
        let open = self.bump()?;
        let start = open.pos;

        if self.peek().kind == TokenKind::Symbol {
            match self.peek().text() {
                "lambda" => {
                    self.bump()?;
                    return self.parse_lambda_tail(start);
                }
                "define" => {
                    let define_tok = self.bump()?;
                    let define_node =
                        Ast::new(AstKind::Symbol("define".to_string()), Span::point(define_tok.pos));
                    if self.peek().kind == TokenKind::OpenParen {
                        return self.parse_define_short_form(start, define_node);
                    }
                    let mut items = vec![define_node];
                    self.parse_list_items_into(&mut items)?;
                    let close = self.expect_close_paren("list")?;
                    return Ok(Ast::new(AstKind::List(items), Span::new(start, close.pos.column)));
                }
                _ => {}
            }
        }

        let mut items = Vec::new();
        self.parse_list_items_into(&mut items)?;
        let close = self.expect_close_paren("list")?;
        Ok(Ast::new(AstKind::List(items), Span::new(start, close.pos.column)))
    }

    fn parse_bracket_list(&mut self) -> Result<Ast, CompileError> {
        let open = self.bump()?;
        let start = open.pos;
        let mut items = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::CloseBracket => break,
                TokenKind::Eof => {
                    return Err(CompileError::MissingCloseBracket(Diagnostic::new(
                        self.peek().pos,
                        None,
                        "expected ']' to close list".to_string(),
                        None,
                    )))
                }
                _ => items.push(self.parse_expr()?),
            }
        }
        let close = self.bump()?;
        Ok(Ast::new(AstKind::List(items), Span::new(start, close.pos.column)))
    }

    fn parse_quote(&mut self) -> Result<Ast, CompileError> {
        let q = self.bump()?;
        let start = q.pos;
        let expr = self.parse_expr()?;
        let end_column = expr.span.end_column;
        let quote_sym = Ast::new(AstKind::Symbol("quote".to_string()), Span::point(start));
        Ok(Ast::new(AstKind::List(vec![quote_sym, expr]), Span::new(start, end_column)))
    }

    fn parse_number(&mut self) -> Result<Ast, CompileError> {
        let tok = self.bump()?;
        let lexeme = tok.text().to_string();
        let value = parse_number_value(&lexeme).map_err(|message| {
            CompileError::unexpected_token(Diagnostic::new(tok.pos, None, message, None))
        })?;
        let end_column = tok.pos.column + lexeme.len() as u32 - 1;
        Ok(Ast::new(
            AstKind::Number { value, lexeme },
            Span::new(tok.pos, end_column),
        ))
    }

    fn parse_string(&mut self) -> Result<Ast, CompileError> {
        let tok = self.bump()?;
        Ok(Ast::new(AstKind::String(tok.text().to_string()), Span::point(tok.pos)))
    }

    fn parse_char(&mut self) -> Result<Ast, CompileError> {
        let tok = self.bump()?;
        let byte = tok.text().as_bytes().first().copied().unwrap_or(0);
        Ok(Ast::new(AstKind::Char(byte), Span::point(tok.pos)))
    }

    fn parse_symbol(&mut self) -> Result<Ast, CompileError> {
        let tok = self.bump()?;
        let text = tok.text().to_string();
        let end_column = tok.pos.column + text.len() as u32 - 1;
        Ok(Ast::new(AstKind::Symbol(text), Span::new(tok.pos, end_column)))
    }

    fn parse_arrow_symbol(&mut self) -> Result<Ast, CompileError> {
        let tok = self.bump()?;
        Ok(Ast::new(
            AstKind::Symbol("->".to_string()),
            Span::new(tok.pos, tok.pos.column + 1),
        ))
    }

    fn parse_param(&mut self) -> Result<ParamSig, CompileError> {
        let open = self.expect_open_bracket_for_param()?;
        let name_tok = self.expect_symbol("a parameter name")?;
        let mut type_name = None;
        if self.peek().kind == TokenKind::Symbol && self.peek().text() == "::" {
            self.bump()?;
            let ty_tok = self.expect_symbol("a type name")?;
            type_name = Some(ty_tok.text().to_string());
        }
        let close = self.expect_close_bracket("parameter")?;
        Ok(ParamSig {
            name: name_tok.text().to_string(),
            type_name,
            span: Span::new(open.pos, close.pos.column),
        })
    }

    fn expect_open_bracket_for_param(&mut self) -> Result<Token, CompileError> {
        if self.peek().kind == TokenKind::OpenBracket {
            self.bump()
        } else {
            Err(CompileError::MalformedSignature(Diagnostic::new(
                self.peek().pos,
                None,
                "expected '[' to start a parameter".to_string(),
                None,
            )))
        }
    }

    /// Parses params and an optional `-> Return`, consuming the list's own
    /// closing `)`. Shared by `lambda` and short-form `define`, whose
    /// signatures occupy the same position relative to the enclosing paren.
    fn parse_signature_body(&mut self) -> Result<Signature, CompileError> {
        let mut params = Vec::new();
        let mut return_type = None;
        loop {
            match self.peek().kind {
                TokenKind::CloseParen => {
                    self.bump()?;
                    break;
                }
                TokenKind::Arrow => {
                    self.bump()?;
                    let ret_tok = self.expect_symbol("a return type name")?;
                    return_type = Some(ret_tok.text().to_string());
                    self.expect_close_paren("signature")?;
                    break;
                }
                TokenKind::OpenBracket => params.push(self.parse_param()?),
                TokenKind::Eof => {
                    return Err(CompileError::MissingCloseParen(Diagnostic::new(
                        self.peek().pos,
                        None,
                        "expected ')' to close signature".to_string(),
                        None,
                    )))
                }
                _ => {
                    return Err(CompileError::UnknownSignatureToken(Diagnostic::new(
                        self.peek().pos,
                        None,
                        "expected a parameter, '->', or ')'".to_string(),
                        None,
                    )))
                }
            }
        }
        Ok(Signature { params, return_type })
    }

    fn parse_lambda_tail(&mut self, start: Pos) -> Result<Ast, CompileError> {
        self.expect_open_paren("a lambda signature")?;
        let signature = self.parse_signature_body()?;
        let docstring = if self.peek().kind == TokenKind::String {
            Some(self.bump()?.text().to_string())
        } else {
            None
        };
        let body = self.parse_expr()?;
        let close = self.expect_close_paren("lambda")?;
        Ok(Ast::new(
            AstKind::Lambda(Lambda {
                signature,
                docstring,
                body: Box::new(body),
            }),
            Span::new(start, close.pos.column),
        ))
    }

    fn parse_define_short_form(&mut self, start: Pos, define_node: Ast) -> Result<Ast, CompileError> {
        self.expect_open_paren("a function definition")?;
        let name_tok = self.expect_symbol("a function name")?;
        let signature = self.parse_signature_body()?;
        let docstring = if self.peek().kind == TokenKind::String {
            Some(self.bump()?.text().to_string())
        } else {
            None
        };
        let body = self.parse_expr()?;
        let close = self.expect_close_paren("define")?;

        let name_node = Ast::new(
            AstKind::Symbol(name_tok.text().to_string()),
            Span::point(name_tok.pos),
        );
        let lambda_node = Ast::new(
            AstKind::Lambda(Lambda {
                signature,
                docstring,
                body: Box::new(body),
            }),
            Span::new(start, close.pos.column),
        );
        Ok(Ast::new(
            AstKind::List(vec![define_node, name_node, lambda_node]),
            Span::new(start, close.pos.column),
        ))
    }
}

fn parse_number_value(lexeme: &str) -> Result<f64, String> {
    if let Some(rest) = lexeme.strip_prefix("0x").or_else(|| lexeme.strip_prefix("0X")) {
        i64::from_str_radix(rest, 16)
            .map(|v| v as f64)
            .map_err(|e| format!("invalid hex literal: {e}"))
    } else if let Some(rest) = lexeme.strip_prefix("0b").or_else(|| lexeme.strip_prefix("0B")) {
        i64::from_str_radix(rest, 2)
            .map(|v| v as f64)
            .map_err(|e| format!("invalid binary literal: {e}"))
    } else if let Some(rest) = lexeme.strip_prefix("0o").or_else(|| lexeme.strip_prefix("0O")) {
        i64::from_str_radix(rest, 8)
            .map(|v| v as f64)
            .map_err(|e| format!("invalid octal literal: {e}"))
    } else {
        lexeme
            .parse::<f64>()
            .map_err(|e| format!("invalid number literal: {e}"))
    }
}

/// Parses a single expression, used by the interactive evaluator.
pub fn parse_one(source: &str) -> Result<Ast, CompileError> {
    Parser::new(source)?.parse_one()
}

/// Parses every top-level expression in a whole file.
pub fn parse_all(source: &str) -> Result<Vec<Ast>, CompileError> {
    Parser::new(source)?.parse_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_atoms() {
        assert!(matches!(parse_one("42").unwrap().kind, AstKind::Number { .. }));
        assert!(matches!(parse_one("\"hi\"").unwrap().kind, AstKind::String(_)));
        assert!(matches!(parse_one("'a'").unwrap().kind, AstKind::Char(b'a')));
        assert!(matches!(parse_one("foo").unwrap().kind, AstKind::Symbol(_)));
    }

    #[test]
    fn base_prefixed_numbers_parse_to_value() {
        let ast = parse_one("0xFF").unwrap();
        match ast.kind {
            AstKind::Number { value, lexeme } => {
                assert_eq!(value, 255.0);
                assert_eq!(lexeme, "0xFF");
            }
            _ => panic!("expected number"),
        }
    }

    #[test]
    fn plain_list_parses_children() {
        let ast = parse_one("(+ 1 2)").unwrap();
        let items = ast.list().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].symbol(), Some("+"));
    }

    #[test]
    fn quote_rewrites_to_quote_list() {
        let ast = parse_one("'(1 2)").unwrap();
        let items = ast.list().unwrap();
        assert_eq!(items[0].symbol(), Some("quote"));
        assert_eq!(items[1].list().unwrap().len(), 2);
    }

    #[test]
    fn lambda_parses_signature_and_body() {
        let ast = parse_one("(lambda ([x :: Int] [y :: Int] -> Int) \"adds\" (+ x y))").unwrap();
        match ast.kind {
            AstKind::Lambda(lambda) => {
                assert_eq!(lambda.signature.params.len(), 2);
                assert_eq!(lambda.signature.params[0].name, "x");
                assert_eq!(lambda.signature.params[0].type_name.as_deref(), Some("Int"));
                assert_eq!(lambda.signature.return_type.as_deref(), Some("Int"));
                assert_eq!(lambda.docstring.as_deref(), Some("adds"));
            }
            _ => panic!("expected lambda"),
        }
    }

    #[test]
    fn short_form_define_rewrites_to_lambda() {
        let ast = parse_one("(define (add [x :: Int] [y :: Int] -> Int) (+ x y))").unwrap();
        let items = ast.list().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].symbol(), Some("define"));
        assert_eq!(items[1].symbol(), Some("add"));
        assert!(matches!(items[2].kind, AstKind::Lambda(_)));
    }

    #[test]
    fn plain_define_is_unaffected() {
        let ast = parse_one("(define x 5)").unwrap();
        let items = ast.list().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].symbol(), Some("define"));
        assert_eq!(items[1].symbol(), Some("x"));
    }

    #[test]
    fn bracket_list_terminates_on_close_bracket() {
        let ast = parse_one("[x :: Int]").unwrap();
        assert_eq!(ast.list().unwrap().len(), 2);
    }

    #[test]
    fn missing_close_paren_is_an_error() {
        assert!(parse_one("(+ 1 2").is_err());
    }

    #[test]
    fn parse_all_reads_every_top_level_form() {
        let forms = parse_all("(define x 1) (define y 2)").unwrap();
        assert_eq!(forms.len(), 2);
    }

    #[test]
    fn bare_arrow_is_a_symbol_outside_signature() {
        let ast = parse_one("->").unwrap();
        assert_eq!(ast.symbol(), Some("->"));
    }
}
