//! Peekable token stream over the lexer or a pre-built token list.

use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

/// One-token lookahead over a token source. `next` and `peek` both report
/// whether more tokens follow; the flag is false once the `EOF` token is
/// reached.
pub struct TokenStream<'a> {
    source: Box<dyn Iterator<Item = Token> + 'a>,
    next: Option<Token>,
}

impl<'a> TokenStream<'a> {
    pub fn new(lexer: Lexer<'a>) -> Self {
        Self::from_source(Box::new(lexer))
    }

    pub fn from_tokens(tokens: Vec<Token>) -> TokenStream<'static> {
        TokenStream::from_source(Box::new(tokens.into_iter()))
    }

    fn from_source(mut source: Box<dyn Iterator<Item = Token> + 'a>) -> Self {
        let next = source.next();
        Self { source, next }
    }

    pub fn next(&mut self) -> (Token, bool) {
        let (tok, more) = self.peek();
        if more {
            self.next = self.source.next();
        }
        (tok, more)
    }

    pub fn peek(&self) -> (Token, bool) {
        match &self.next {
            Some(tok) => (tok.clone(), tok.kind != TokenKind::Eof),
            // A pre-built token list ran out without a terminating EOF.
            None => (
                Token::new(
                    TokenKind::Error,
                    "unexpected: reached end of input without encountering EOF token",
                    0,
                ),
                false,
            ),
        }
    }
}
