//! SQL front end: streaming lexer, peekable token stream, and a Pratt parser
//! producing the SQL AST consumed by the planner.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod stream;
pub mod token;

pub use ast::{SqlExpr, SqlQuery, SqlQueryBuilder};
pub use lexer::Lexer;
pub use parser::{parse_query, ExprParser, ParseError};
pub use stream::TokenStream;
pub use token::{Token, TokenKind, HIGHEST_PREC, LOWEST_PREC};
