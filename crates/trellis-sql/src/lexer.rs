//! Streaming SQL lexer.
//!
//! A single forward pass over the input, yielding one token at a time. The
//! final token is always `EOF`, or `ERROR` carrying the failure message; after
//! either, the lexer yields nothing.

use crate::token::{lookup_keyword, operators_starting_with, Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a str,
    /// Byte offset where the current lexeme starts.
    start: usize,
    /// Byte offset of the scan cursor.
    pos: usize,
    done: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            start: 0,
            pos: 0,
            done: false,
        }
    }

    /// Produces the next token, or `None` once EOF or an error has been
    /// emitted.
    pub fn next_token(&mut self) -> Option<Token> {
        if self.done {
            return None;
        }

        loop {
            let Some(c) = self.advance() else {
                self.done = true;
                return Some(self.emit(TokenKind::Eof));
            };

            match c {
                c if c.is_whitespace() => self.ignore(),
                c if is_alpha(c) => return Some(self.lex_word()),
                c if c.is_ascii_digit() => return Some(self.lex_number()),
                '.' => {
                    if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                        return Some(self.lex_float());
                    }
                    return Some(self.emit(TokenKind::Period));
                }
                '\'' => return Some(self.lex_quote()),
                c => {
                    if let Some(entry) = operators_starting_with(c) {
                        return Some(self.lex_operator(entry));
                    }
                    return Some(self.errorf(format!("no known operator starting with: {c}")));
                }
            }
        }
    }

    fn lex_word(&mut self) -> Token {
        while self.peek().is_some_and(is_alphanumeric) {
            self.advance();
        }

        match lookup_keyword(self.current()) {
            Some(keyword) => self.emit(keyword),
            None => self.emit(TokenKind::Ident),
        }
    }

    fn lex_number(&mut self) -> Token {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        if self.peek() == Some('.') {
            self.advance();
            return self.lex_float();
        }

        self.emit(TokenKind::Int)
    }

    /// Consumes the digits after a decimal point already scanned.
    fn lex_float(&mut self) -> Token {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        self.emit(TokenKind::Float)
    }

    fn lex_quote(&mut self) -> Token {
        // The token starts after the opening quote and excludes both quotes.
        self.ignore();
        loop {
            match self.advance() {
                None => {
                    return self.errorf(format!(
                        "unterminated quoted string: {}",
                        self.current()
                    ));
                }
                Some('\'') => {
                    let tok = Token::new(
                        TokenKind::String,
                        &self.input[self.start..self.pos - 1],
                        self.start,
                    );
                    self.ignore();
                    return tok;
                }
                Some(_) => {}
            }
        }
    }

    /// Resolves one- vs two-character operators. When the first character
    /// admits both forms, the next character decides: an alphanumeric or
    /// whitespace character keeps the one-character form.
    fn lex_operator(&mut self, entry: &crate::token::OperatorEntry) -> Token {
        if entry.is_unambiguous() {
            return match entry.single() {
                Some(kind) => self.emit(kind),
                None => self.errorf(format!(
                    "no known operator starting with: {}",
                    self.current()
                )),
            };
        }

        match self.peek() {
            Some(next) if !is_alphanumeric(next) && !next.is_whitespace() => {
                self.advance();
                match entry.with_second(next) {
                    Some(kind) => self.emit(kind),
                    None => self.errorf(format!(
                        "no known operator starting with: {}",
                        self.current()
                    )),
                }
            }
            _ => match entry.single() {
                Some(kind) => self.emit(kind),
                None => self.errorf(format!(
                    "no known operator starting with: {}",
                    self.current()
                )),
            },
        }
    }

    fn current(&self) -> &str {
        &self.input[self.start..self.pos]
    }

    fn emit(&mut self, kind: TokenKind) -> Token {
        let tok = Token::new(kind, self.current(), self.start);
        self.start = self.pos;
        tok
    }

    fn errorf(&mut self, message: String) -> Token {
        self.done = true;
        Token::new(TokenKind::Error, message, self.pos)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn ignore(&mut self) {
        self.start = self.pos;
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.next_token()
    }
}

fn is_alpha(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_alphanumeric(c: char) -> bool {
    is_alpha(c) || c.is_numeric()
}
