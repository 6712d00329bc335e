//! Lowers the SQL AST into the logical relation IR.

use thiserror::Error;

use trellis_engine::{Expr, Relation, Table, VirtualTable};
use trellis_sql::{SqlExpr, SqlQuery};
use trellis_substrait::{
    FUNCTIONS_ARITHMETIC_URI, FUNCTIONS_BOOLEAN_URI, FUNCTIONS_COMPARISON_URI,
};

#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("plan: unrecognized SQL expression: {0}")]
    UnrecognizedSqlExpr(String),

    #[error("plan: unimplemented: multi-part column identifier: {0}")]
    MultiPartColumnIdentifier(String),

    #[error("plan: no known function for operator: {0}")]
    UnresolvedOperator(String),
}

/// The extension function implementing each SQL operator.
fn function_for_operator(op: &str) -> Option<(&'static str, &'static str)> {
    match op {
        "+" => Some((FUNCTIONS_ARITHMETIC_URI, "add")),
        "-" => Some((FUNCTIONS_ARITHMETIC_URI, "subtract")),
        "*" => Some((FUNCTIONS_ARITHMETIC_URI, "multiply")),
        "/" => Some((FUNCTIONS_ARITHMETIC_URI, "divide")),
        "%" => Some((FUNCTIONS_ARITHMETIC_URI, "modulus")),
        "=" => Some((FUNCTIONS_COMPARISON_URI, "equal")),
        "!=" => Some((FUNCTIONS_COMPARISON_URI, "not_equal")),
        "<" => Some((FUNCTIONS_COMPARISON_URI, "lt")),
        ">" => Some((FUNCTIONS_COMPARISON_URI, "gt")),
        "<=" => Some((FUNCTIONS_COMPARISON_URI, "lte")),
        ">=" => Some((FUNCTIONS_COMPARISON_URI, "gte")),
        "&&" | "AND" => Some((FUNCTIONS_BOOLEAN_URI, "and")),
        "||" | "OR" => Some((FUNCTIONS_BOOLEAN_URI, "or")),
        _ => None,
    }
}

pub fn create_logical_expr(expr: &SqlExpr) -> Result<Expr, PlanError> {
    match expr {
        SqlExpr::Identifier { names, alias } => {
            if names.len() != 1 {
                return Err(PlanError::MultiPartColumnIdentifier(names.join(".")));
            }

            let column = Expr::column(names[0].clone());
            Ok(match alias {
                Some(alias) => Expr::alias(column, alias.clone()),
                None => column,
            })
        }
        SqlExpr::IntLiteral(value) => Ok(Expr::literal(*value)),
        SqlExpr::StringLiteral(value) => Ok(Expr::literal(value.as_str())),
        SqlExpr::BinaryExpr { left, op, right } => {
            let left = create_logical_expr(left)?;
            let right = create_logical_expr(right)?;

            let (uri, name) = function_for_operator(op)
                .ok_or_else(|| PlanError::UnresolvedOperator(op.clone()))?;

            Ok(Expr::function(uri, name, vec![left, right]))
        }
        SqlExpr::Alias { name, input } => {
            Ok(Expr::alias(create_logical_expr(input)?, name.clone()))
        }
        other => Err(PlanError::UnrecognizedSqlExpr(other.to_string())),
    }
}

pub fn create_logical_plan(query: &SqlQuery) -> Result<Relation, PlanError> {
    let mut plan = match &query.read {
        Some(SqlExpr::Identifier { names, .. }) => {
            Relation::read(Table::named(names.clone()))
        }
        Some(SqlExpr::Query(subquery)) => create_logical_plan(subquery)?,
        Some(other) => return Err(PlanError::UnrecognizedSqlExpr(other.to_string())),
        // SELECT without FROM reads from the empty virtual table.
        None => Relation::read(Table::Virtual(VirtualTable)),
    };

    if let Some(filter) = &query.filter {
        plan = Relation::selection(plan, create_logical_expr(filter)?);
    }

    if let Some(projection) = &query.projection {
        let exprs = projection
            .iter()
            .map(create_logical_expr)
            .collect::<Result<Vec<_>, _>>()?;
        plan = Relation::projection(plan, exprs);
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_engine::Read;
    use trellis_substrait::FUNCTIONS_ARITHMETIC_URI;

    fn ident(name: &str) -> SqlExpr {
        SqlExpr::identifier(vec![name.to_string()])
    }

    #[test]
    fn named_table_read() {
        let query = SqlQuery {
            read: Some(ident("a")),
            ..Default::default()
        };

        let plan = create_logical_plan(&query).unwrap();
        assert_eq!(plan, Relation::read(Table::named(vec!["a".into()])));
    }

    #[test]
    fn select_from_named_table() {
        let query = SqlQuery {
            read: Some(ident("b")),
            projection: Some(vec![ident("a")]),
            ..Default::default()
        };

        let plan = create_logical_plan(&query).unwrap();
        assert_eq!(
            plan,
            Relation::projection(
                Relation::read(Table::named(vec!["b".into()])),
                vec![Expr::column("a")],
            )
        );
    }

    #[test]
    fn select_multiple_add_int_from_named_table() {
        let query = SqlQuery {
            read: Some(ident("c")),
            projection: Some(vec![
                ident("a"),
                SqlExpr::BinaryExpr {
                    left: Box::new(ident("b")),
                    op: "+".into(),
                    right: Box::new(SqlExpr::IntLiteral(1)),
                },
            ]),
            ..Default::default()
        };

        let plan = create_logical_plan(&query).unwrap();
        assert_eq!(
            plan,
            Relation::projection(
                Relation::read(Table::named(vec!["c".into()])),
                vec![
                    Expr::column("a"),
                    Expr::function(
                        FUNCTIONS_ARITHMETIC_URI,
                        "add",
                        vec![Expr::column("b"), Expr::literal(1i64)],
                    ),
                ],
            )
        );
    }

    #[test]
    fn filter_wraps_the_read() {
        let query = SqlQuery {
            read: Some(ident("t")),
            projection: Some(vec![ident("a")]),
            filter: Some(ident("a")),
            ..Default::default()
        };

        let plan = create_logical_plan(&query).unwrap();
        assert_eq!(
            plan,
            Relation::projection(
                Relation::selection(
                    Relation::read(Table::named(vec!["t".into()])),
                    Expr::column("a"),
                ),
                vec![Expr::column("a")],
            )
        );
    }

    #[test]
    fn missing_read_uses_the_virtual_table() {
        let query = SqlQuery {
            projection: Some(vec![SqlExpr::IntLiteral(1)]),
            ..Default::default()
        };

        let plan = create_logical_plan(&query).unwrap();
        let Relation::Projection(projection) = plan else {
            panic!("expected a projection");
        };
        assert!(matches!(
            &*projection.input,
            Relation::Read(Read {
                table: Table::Virtual(_)
            })
        ));
    }

    #[test]
    fn aliases_lower_to_alias_expressions() {
        let expr = create_logical_expr(&SqlExpr::Identifier {
            names: vec!["col1".into()],
            alias: Some("first".into()),
        })
        .unwrap();
        assert_eq!(expr, Expr::alias(Expr::column("col1"), "first"));
    }

    #[test]
    fn multi_part_column_identifier_is_unimplemented() {
        let err = create_logical_expr(&SqlExpr::identifier(vec!["t".into(), "c".into()]))
            .unwrap_err();
        assert_eq!(err, PlanError::MultiPartColumnIdentifier("t.c".into()));
    }

    #[test]
    fn unknown_operator_is_unresolved() {
        let err = create_logical_expr(&SqlExpr::BinaryExpr {
            left: Box::new(SqlExpr::IntLiteral(1)),
            op: "??".into(),
            right: Box::new(SqlExpr::IntLiteral(2)),
        })
        .unwrap_err();
        assert_eq!(err, PlanError::UnresolvedOperator("??".into()));
    }
}
