//! SQL AST produced by the parser.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A parsed SQL expression or clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlExpr {
    /// A dotted identifier path such as `db.schema.table` or `col`, with an
    /// optional alias.
    Identifier {
        names: Vec<String>,
        alias: Option<String>,
    },
    IntLiteral(i64),
    StringLiteral(String),
    BinaryExpr {
        left: Box<SqlExpr>,
        op: String,
        right: Box<SqlExpr>,
    },
    FunctionCall {
        name: String,
        args: Vec<SqlExpr>,
    },
    /// An explicit alias over an arbitrary expression, e.g. `1 + 2 AS three`.
    Alias {
        name: String,
        input: Box<SqlExpr>,
    },
    /// A complete query used as a table expression.
    Query(Box<SqlQuery>),
    /// The `SELECT` clause: a projection list.
    Select(Vec<SqlExpr>),
    /// The `FROM` clause: a table expression.
    From(Box<SqlExpr>),
    /// The `WHERE` clause: a filter predicate.
    Where(Box<SqlExpr>),
}

impl SqlExpr {
    pub fn identifier(names: Vec<String>) -> Self {
        SqlExpr::Identifier { names, alias: None }
    }
}

impl fmt::Display for SqlExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlExpr::Identifier { names, alias } => {
                write!(f, "{}", names.join("."))?;
                if let Some(alias) = alias {
                    write!(f, " AS {alias}")?;
                }
                Ok(())
            }
            SqlExpr::IntLiteral(value) => write!(f, "{value}"),
            SqlExpr::StringLiteral(value) => write!(f, "'{value}'"),
            SqlExpr::BinaryExpr { left, op, right } => write!(f, "{left} {op} {right}"),
            SqlExpr::FunctionCall { name, args } => {
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{name}({})", args.join(", "))
            }
            SqlExpr::Alias { name, input } => write!(f, "{input} AS {name}"),
            SqlExpr::Query(query) => write!(f, "({query})"),
            SqlExpr::Select(exprs) => {
                let exprs: Vec<String> = exprs.iter().map(|e| e.to_string()).collect();
                write!(f, "SELECT {}", exprs.join(", "))
            }
            SqlExpr::From(table) => write!(f, "FROM {table}"),
            SqlExpr::Where(expr) => write!(f, "WHERE {expr}"),
        }
    }
}

/// A query assembled from at most one of each clause.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SqlQuery {
    pub projection: Option<Vec<SqlExpr>>,
    pub read: Option<SqlExpr>,
    pub filter: Option<SqlExpr>,
    pub alias: Option<String>,
}

impl fmt::Display for SqlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(projection) = &self.projection {
            let exprs: Vec<String> = projection.iter().map(|e| e.to_string()).collect();
            parts.push(format!("SELECT {}", exprs.join(", ")));
        }
        if let Some(read) = &self.read {
            parts.push(format!("FROM {read}"));
        }
        if let Some(filter) = &self.filter {
            parts.push(format!("WHERE {filter}"));
        }
        write!(f, "{}", parts.join(" "))
    }
}

/// Accumulates clauses in source order and rejects duplicates.
#[derive(Debug, Default)]
pub struct SqlQueryBuilder {
    query: SqlQuery,
}

impl SqlQueryBuilder {
    pub fn select(&mut self, exprs: Vec<SqlExpr>) -> Result<(), DuplicateClause> {
        if self.query.projection.is_some() {
            return Err(DuplicateClause("SELECT"));
        }
        self.query.projection = Some(exprs);
        Ok(())
    }

    pub fn from(&mut self, table: SqlExpr) -> Result<(), DuplicateClause> {
        if self.query.read.is_some() {
            return Err(DuplicateClause("FROM"));
        }
        self.query.read = Some(table);
        Ok(())
    }

    pub fn filter(&mut self, expr: SqlExpr) -> Result<(), DuplicateClause> {
        if self.query.filter.is_some() {
            return Err(DuplicateClause("WHERE"));
        }
        self.query.filter = Some(expr);
        Ok(())
    }

    pub fn query(self) -> SqlQuery {
        self.query
    }
}

/// A clause appeared twice in one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateClause(pub &'static str);
