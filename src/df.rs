//! Data-frame façade over the logical IR, for building plans directly in
//! Rust instead of going through SQL text.

use trellis_engine::{Error, Expr, Relation, ScalarValue, Schema, Table};
use trellis_substrait::FUNCTIONS_ARITHMETIC_URI;

pub fn query_context() -> QueryContext {
    QueryContext
}

pub struct QueryContext;

impl QueryContext {
    pub fn read(&self, table: Table) -> DataFrame {
        DataFrame {
            plan: Relation::read(table),
        }
    }
}

/// A lazily-built logical plan. Each call wraps the current plan in another
/// relation; nothing is resolved until the schema or plan is requested.
#[derive(Debug, Clone)]
pub struct DataFrame {
    plan: Relation,
}

impl DataFrame {
    pub fn select(self, exprs: Vec<Expr>) -> DataFrame {
        DataFrame {
            plan: Relation::projection(self.plan, exprs),
        }
    }

    pub fn filter(self, expr: Expr) -> DataFrame {
        DataFrame {
            plan: Relation::selection(self.plan, expr),
        }
    }

    pub fn schema(&self) -> Result<Schema, Error> {
        self.plan.schema()
    }

    pub fn logical_plan(self) -> Relation {
        self.plan
    }
}

pub fn col(name: impl Into<String>) -> Expr {
    Expr::column(name)
}

pub fn col_idx(index: usize) -> Expr {
    Expr::column_index(index)
}

pub fn lit(value: impl Into<ScalarValue>) -> Expr {
    Expr::literal(value)
}

pub fn add(left: Expr, right: Expr) -> Expr {
    Expr::function(FUNCTIONS_ARITHMETIC_URI, "add", vec![left, right])
}

pub fn alias(expr: Expr, name: impl Into<String>) -> Expr {
    Expr::alias(expr, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use trellis_engine::{AnonymousCatalog, Catalog, NamedTable, Plan};
    use trellis_substrait::{Field, Type};

    #[test]
    fn dataframe_builds_the_same_plan_as_the_constructors() {
        let df_plan = query_context()
            .read(Table::named(vec!["db".into(), "t".into()]))
            .filter(col_idx(1))
            .select(vec![col_idx(1)])
            .logical_plan();

        let expected = Relation::projection(
            Relation::selection(
                Relation::read(Table::named(vec!["db".into(), "t".into()])),
                Expr::column_index(1),
            ),
            vec![Expr::column_index(1)],
        );

        assert_eq!(df_plan, expected);
    }

    #[test]
    fn schema_resolves_once_bound() {
        let catalog: Arc<dyn Catalog> = Arc::new(AnonymousCatalog::new(Schema::new(vec![
            Field::new("a", Type::int64(false)),
            Field::new("b", Type::string(false)),
        ])));

        let table = NamedTable::new(vec!["t".into()], Some(catalog));
        let df = query_context()
            .read(Table::Named(table))
            .select(vec![col("b")]);

        assert_eq!(df.schema().unwrap().names(), vec!["b"]);
    }

    #[test]
    fn arithmetic_over_columns_serializes() {
        let catalog: Arc<dyn Catalog> = Arc::new(AnonymousCatalog::new(Schema::new(vec![
            Field::new("a", Type::int64(false)),
        ])));
        let table = NamedTable::new(vec!["t".into()], Some(catalog));

        let plan = Plan::new(
            query_context()
                .read(Table::Named(table))
                .select(vec![add(col_idx(0), lit(1i64))])
                .logical_plan(),
        );

        let proto_plan = plan.to_proto().unwrap();
        assert_eq!(proto_plan.extensions.len(), 1);
    }
}
