//! Trellis translates SQL query text into typed logical plans that serialize
//! to the Substrait protobuf format, and reconstructs equivalent plans from
//! serialized form.
//!
//! The pipeline: SQL text -> lexer -> token stream -> parser -> SQL AST ->
//! planner -> logical IR, which a bound catalog turns into a Substrait plan.

pub mod df;
pub mod planner;

use thiserror::Error;

use trellis_engine::Plan;
use trellis_sql::{parse_query, Lexer, TokenStream};

pub use planner::{create_logical_expr, create_logical_plan, PlanError};
pub use trellis_engine as engine;
pub use trellis_sql as sql;
pub use trellis_substrait as substrait_ext;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] trellis_sql::ParseError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Engine(#[from] trellis_engine::Error),
}

/// Compiles a SQL string into a logical plan. The plan's named tables are
/// unbound; attach a catalog with [`Plan::set_catalog`] before asking for
/// schemas or serializing.
pub fn parse(sql: &str) -> Result<Plan, Error> {
    let lexer = Lexer::new(sql);
    let mut tokens = TokenStream::new(lexer);

    let ast = parse_query(&mut tokens)?;
    let relation = create_logical_plan(&ast)?;

    Ok(Plan::new(relation))
}

pub mod prelude {
    pub use crate::df::{add, alias, col, col_idx, lit, query_context};
    pub use crate::parse;
    pub use crate::planner::{create_logical_expr, create_logical_plan};
    pub use trellis_engine::{
        format_plan, format_plan_proto, format_plan_text, Catalog, Expr, Plan, Relation, Table,
    };
    pub use trellis_substrait::{Field, Schema, Type};
}
