//! Pratt expression parser with recursive-descent entries for SQL clauses.

use thiserror::Error;

use crate::ast::{SqlExpr, SqlQuery, SqlQueryBuilder};
use crate::stream::TokenStream;
use crate::token::{Token, TokenKind, HIGHEST_PREC, LOWEST_PREC};

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("parse: end of token stream")]
    EndOfTokenStream,

    #[error("parse: unexpected opening paren: {0}")]
    UnexpectedOpenParen(String),

    #[error("parse: unexpected closing paren: {0}")]
    UnexpectedCloseParen(String),

    #[error("parse: unexpected token: {0}")]
    UnexpectedToken(String),

    #[error("parse: expected {expected} token but found {found}")]
    ExpectedToken { expected: &'static str, found: String },

    #[error("parse: invalid expression, unmatched parentheses")]
    UnmatchedParentheses,

    #[error("parse: query cannot have more than one {0}")]
    DuplicateClause(&'static str),

    #[error("parse: expected valid sql relation, found: {0}")]
    ExpectedRelation(String),

    #[error("parse: subquery was not closed")]
    SubqueryNotClosed,

    #[error("parse: invalid integer literal: {0}")]
    InvalidIntLiteral(String),

    #[error("lex: {0}")]
    Lex(String),
}

/// How a query-level parse stopped consuming tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminator {
    EndOfInput,
    /// A closing paren at clause position; left unconsumed for the caller.
    CloseParen,
}

/// Parses a complete query from the stream. A closing paren at clause
/// position is an error here; subqueries use it internally as their
/// end-of-input signal.
pub fn parse_query(tokens: &mut TokenStream) -> Result<SqlQuery, ParseError> {
    let (query, terminator) = parse_query_until(tokens)?;
    match terminator {
        Terminator::EndOfInput => Ok(query),
        Terminator::CloseParen => {
            let (tok, _) = tokens.peek();
            Err(ParseError::UnexpectedCloseParen(tok.to_string()))
        }
    }
}

fn parse_query_until(tokens: &mut TokenStream) -> Result<(SqlQuery, Terminator), ParseError> {
    let mut bldr = SqlQueryBuilder::default();
    let mut parser = ExprParser::new(tokens);

    loop {
        let block = match parser.parse(HIGHEST_PREC) {
            Ok(block) => block,
            Err(ParseError::EndOfTokenStream) => {
                return Ok((bldr.query(), Terminator::EndOfInput))
            }
            Err(ParseError::UnexpectedCloseParen(_)) => {
                return Ok((bldr.query(), Terminator::CloseParen))
            }
            Err(err) => return Err(err),
        };

        match block {
            SqlExpr::Select(exprs) => bldr
                .select(exprs)
                .map_err(|dup| ParseError::DuplicateClause(dup.0))?,
            SqlExpr::From(table) => bldr
                .from(*table)
                .map_err(|dup| ParseError::DuplicateClause(dup.0))?,
            SqlExpr::Where(expr) => bldr
                .filter(*expr)
                .map_err(|dup| ParseError::DuplicateClause(dup.0))?,
            other => return Err(ParseError::ExpectedRelation(other.to_string())),
        }
    }
}

/// Pratt parser over a token stream. Parenthesized groups bind tighter than
/// any outer operator by boosting the effective precedence of every token
/// inside them by `depth * HIGHEST_PREC`.
pub struct ExprParser<'s, 'a> {
    tokens: &'s mut TokenStream<'a>,
    depth: i32,
}

impl<'s, 'a> ExprParser<'s, 'a> {
    pub fn new(tokens: &'s mut TokenStream<'a>) -> Self {
        Self { tokens, depth: 0 }
    }

    pub fn parse(&mut self, precedence: i32) -> Result<SqlExpr, ParseError> {
        self.consume_left_parens()?;

        let mut expr = self.parse_prefix()?;

        self.consume_right_parens()?;

        while precedence < self.next_precedence() {
            expr = self.parse_infix(expr, self.next_precedence())?;
        }
        Ok(expr)
    }

    fn next_precedence(&self) -> i32 {
        let (tok, more) = self.tokens.peek();
        if !more {
            return LOWEST_PREC;
        }
        tok.precedence() + self.depth * HIGHEST_PREC
    }

    fn parse_prefix(&mut self) -> Result<SqlExpr, ParseError> {
        let (tok, more) = self.tokens.next();
        if !more {
            return Err(ParseError::EndOfTokenStream);
        }

        match tok.kind {
            TokenKind::Select => self.parse_select(),
            TokenKind::From => self.parse_from(),
            TokenKind::Where => self.parse_where(),
            TokenKind::Ident => self.parse_identifier(vec![tok.value]),
            TokenKind::Int => tok
                .value
                .parse::<i64>()
                .map(SqlExpr::IntLiteral)
                .map_err(|_| ParseError::InvalidIntLiteral(tok.value)),
            TokenKind::String => Ok(SqlExpr::StringLiteral(tok.value)),
            TokenKind::Error => Err(ParseError::Lex(tok.value)),
            _ => Err(ParseError::UnexpectedToken(tok.to_string())),
        }
    }

    fn parse_infix(&mut self, left: SqlExpr, precedence: i32) -> Result<SqlExpr, ParseError> {
        let (tok, more) = self.tokens.peek();
        if !more {
            return Err(ParseError::EndOfTokenStream);
        }
        if !tok.kind.is_operator() {
            return Err(ParseError::UnexpectedToken(format!(
                "expected operator, found: {tok}"
            )));
        }

        self.tokens.next();
        let right = self.parse(precedence)?;

        Ok(SqlExpr::BinaryExpr {
            left: Box::new(left),
            op: tok.value,
            right: Box::new(right),
        })
    }

    fn consume_left_parens(&mut self) -> Result<(), ParseError> {
        loop {
            let (tok, _) = self.tokens.peek();
            match tok.kind {
                TokenKind::LParen => {
                    self.depth += 1;
                    self.tokens.next();
                }
                TokenKind::RParen => {
                    return Err(ParseError::UnexpectedCloseParen(tok.to_string()))
                }
                _ => return Ok(()),
            }
        }
    }

    fn consume_right_parens(&mut self) -> Result<(), ParseError> {
        while self.depth > 0 {
            let (tok, _) = self.tokens.peek();
            match tok.kind {
                TokenKind::LParen => {
                    return Err(ParseError::UnexpectedOpenParen(tok.to_string()))
                }
                TokenKind::RParen => {
                    self.depth -= 1;
                    self.tokens.next();
                }
                _ => return Ok(()),
            }
        }
        Ok(())
    }

    fn parse_select(&mut self) -> Result<SqlExpr, ParseError> {
        let projection = self.parse_expr_list()?;
        Ok(SqlExpr::Select(projection))
    }

    fn parse_from(&mut self) -> Result<SqlExpr, ParseError> {
        let table = self.parse_table_expr()?;
        Ok(SqlExpr::From(Box::new(table)))
    }

    fn parse_where(&mut self) -> Result<SqlExpr, ParseError> {
        let expr = self.parse_expr()?;
        Ok(SqlExpr::Where(Box::new(expr)))
    }

    fn parse_table_expr(&mut self) -> Result<SqlExpr, ParseError> {
        let (tok, more) = self.tokens.peek();
        if !more {
            return Err(ParseError::EndOfTokenStream);
        }

        match tok.kind {
            TokenKind::Ident => self.parse_identifier(Vec::new()),
            TokenKind::LParen => {
                self.expect_token(TokenKind::LParen)?;

                // The subquery parses until it hits our closing paren.
                let (mut subquery, terminator) = parse_query_until(self.tokens)?;
                if terminator != Terminator::CloseParen {
                    return Err(ParseError::SubqueryNotClosed);
                }

                self.expect_token(TokenKind::RParen)?;
                subquery.alias = self.try_parse_alias()?;

                Ok(SqlExpr::Query(Box::new(subquery)))
            }
            _ => Err(ParseError::UnexpectedToken(tok.to_string())),
        }
    }

    /// Reads `IDENT (PERIOD IDENT)*` continuing any segments already
    /// consumed, then an optional alias.
    fn parse_identifier(&mut self, mut names: Vec<String>) -> Result<SqlExpr, ParseError> {
        let continue_chain = if names.is_empty() {
            true
        } else {
            // Already at the end, or a period delimits the next segment.
            self.expect_token(TokenKind::Period).is_ok()
        };

        if continue_chain {
            loop {
                let tok = self.expect_token(TokenKind::Ident)?;
                names.push(tok.value);

                if self.expect_token(TokenKind::Period).is_err() {
                    break;
                }
            }
        }

        let alias = self.try_parse_alias()?;
        Ok(SqlExpr::Identifier { names, alias })
    }

    fn parse_expr_list(&mut self) -> Result<Vec<SqlExpr>, ParseError> {
        let mut exprs = vec![self.parse_expr()?];

        loop {
            let (tok, more) = self.tokens.peek();
            if !more || tok.kind != TokenKind::Comma {
                break;
            }
            self.tokens.next();

            match self.parse_expr() {
                Ok(expr) => exprs.push(expr),
                Err(ParseError::EndOfTokenStream) => break,
                Err(err) => return Err(err),
            }
        }

        Ok(exprs)
    }

    /// Parses one clause-level expression, requiring balanced parentheses and
    /// picking up a trailing alias.
    fn parse_expr(&mut self) -> Result<SqlExpr, ParseError> {
        let depth_start = self.depth;

        let expr = self.parse(LOWEST_PREC)?;

        if self.depth != depth_start {
            return Err(ParseError::UnmatchedParentheses);
        }

        // Identifiers pick up their alias in parse_identifier.
        if matches!(expr, SqlExpr::Identifier { .. }) {
            return Ok(expr);
        }

        match self.try_parse_alias()? {
            Some(name) => Ok(SqlExpr::Alias {
                name,
                input: Box::new(expr),
            }),
            None => Ok(expr),
        }
    }

    /// `AS ident`, a bare `ident`, or nothing. A consumed `AS` with no
    /// identifier following is a hard error.
    fn try_parse_alias(&mut self) -> Result<Option<String>, ParseError> {
        let had_as = self.expect_token(TokenKind::As).is_ok();
        match self.expect_token(TokenKind::Ident) {
            Ok(tok) => Ok(Some(tok.value)),
            Err(err) if had_as => Err(err),
            Err(_) => Ok(None),
        }
    }

    /// Consumes and returns the next token only when it has the expected
    /// kind.
    fn expect_token(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        let (tok, more) = self.tokens.peek();
        if !more {
            return Err(ParseError::EndOfTokenStream);
        }

        if tok.kind != kind {
            return Err(ParseError::ExpectedToken {
                expected: kind.as_str(),
                found: tok.to_string(),
            });
        }

        self.tokens.next();
        Ok(tok)
    }
}
