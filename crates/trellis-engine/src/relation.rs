//! Logical relational operators.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use substrait::proto;
use trellis_substrait::{ExtensionRegistry, Field, Schema};

use crate::error::Error;
use crate::expr::Expr;
use crate::table::{Catalog, Table};

/// A logical relational operator. Ownership is tree-shaped: each relation
/// exclusively owns its inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum Relation {
    Read(Read),
    Projection(Projection),
    Selection(Selection),
}

impl Relation {
    pub fn read(table: Table) -> Relation {
        Relation::Read(Read { table })
    }

    pub fn projection(input: Relation, exprs: Vec<Expr>) -> Relation {
        Relation::Projection(Projection {
            input: Box::new(input),
            exprs,
        })
    }

    pub fn selection(input: Relation, expr: Expr) -> Relation {
        Relation::Selection(Selection {
            input: Box::new(input),
            expr,
        })
    }

    pub fn schema(&self) -> Result<Schema, Error> {
        match self {
            Relation::Read(read) => read.table.schema(),
            Relation::Projection(projection) => projection.evaluate_schema(),
            Relation::Selection(selection) => selection.input.schema(),
        }
    }

    pub fn children(&self) -> Vec<&Relation> {
        match self {
            Relation::Read(_) => Vec::new(),
            Relation::Projection(projection) => vec![&projection.input],
            Relation::Selection(selection) => vec![&selection.input],
        }
    }

    /// Attaches the catalog to every named table in the tree.
    pub fn set_catalog(&mut self, catalog: &Arc<dyn Catalog>) {
        match self {
            Relation::Read(read) => {
                if let Table::Named(table) = &mut read.table {
                    table.set_catalog(catalog.clone());
                }
            }
            Relation::Projection(projection) => projection.input.set_catalog(catalog),
            Relation::Selection(selection) => selection.input.set_catalog(catalog),
        }
    }

    pub(crate) fn to_proto(
        &self,
        extensions: &mut ExtensionRegistry,
    ) -> Result<proto::Rel, Error> {
        match self {
            Relation::Read(read) => read.table.to_proto(),
            Relation::Projection(projection) => {
                let expressions = projection
                    .exprs
                    .iter()
                    .map(|expr| expr.to_proto(&projection.input, extensions))
                    .collect::<Result<Vec<_>, _>>()?;

                let input = projection.input.to_proto(extensions)?;

                Ok(proto::Rel {
                    rel_type: Some(proto::rel::RelType::Project(Box::new(
                        proto::ProjectRel {
                            input: Some(Box::new(input)),
                            expressions,
                            ..Default::default()
                        },
                    ))),
                })
            }
            Relation::Selection(selection) => {
                let condition = selection.expr.to_proto(&selection.input, extensions)?;
                let input = selection.input.to_proto(extensions)?;

                Ok(proto::Rel {
                    rel_type: Some(proto::rel::RelType::Filter(Box::new(proto::FilterRel {
                        input: Some(Box::new(input)),
                        condition: Some(Box::new(condition)),
                        ..Default::default()
                    }))),
                })
            }
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Read(read) => match &read.table {
                Table::Named(table) => {
                    write!(f, "Read: table={}", table.identifier().join("."))
                }
                Table::Virtual(_) => write!(f, "Read: virtual"),
            },
            Relation::Projection(projection) => {
                let exprs: Vec<String> =
                    projection.exprs.iter().map(|e| e.to_string()).collect();
                write!(f, "Projection: {}", exprs.join(", "))
            }
            Relation::Selection(selection) => write!(f, "Selection: {}", selection.expr),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Read {
    pub table: Table,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub input: Box<Relation>,
    pub exprs: Vec<Expr>,
}

impl Projection {
    /// Evaluates each expression's output field in order. Duplicate field
    /// names anywhere in the result are an error.
    fn evaluate_schema(&self) -> Result<Schema, Error> {
        let mut fields: Vec<Field> = Vec::with_capacity(self.exprs.len());
        let mut names: HashSet<String> = HashSet::with_capacity(self.exprs.len());

        for expr in &self.exprs {
            let field = expr.field(&self.input)?;
            if !names.insert(field.name.clone()) {
                return Err(Error::DuplicateFieldInProjection(field.name));
            }
            fields.push(field);
        }

        Ok(Schema::new(fields))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub input: Box<Relation>,
    pub expr: Expr,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{AnonymousCatalog, NamedTable};
    use trellis_substrait::Type;

    fn test_schema() -> Schema {
        Schema::new(vec![
            Field::new("col1", Type::boolean(false)),
            Field::new("col2", Type::string(false)),
            Field::new("col3", Type::int64(false)),
        ])
    }

    fn bound_read() -> Relation {
        let table = NamedTable::new(
            vec!["db".into(), "t".into()],
            Some(Arc::new(AnonymousCatalog::new(test_schema()))),
        );
        Relation::read(Table::Named(table))
    }

    #[test]
    fn projection_schema_is_ordered() {
        let plan = Relation::projection(
            bound_read(),
            vec![Expr::column("col3"), Expr::column("col1")],
        );

        let schema = plan.schema().unwrap();
        assert_eq!(schema.names(), vec!["col3", "col1"]);
    }

    #[test]
    fn projection_rejects_duplicate_field_names() {
        let plan = Relation::projection(
            bound_read(),
            vec![Expr::column("col1"), Expr::column("col1")],
        );

        assert!(matches!(
            plan.schema(),
            Err(Error::DuplicateFieldInProjection(name)) if name == "col1"
        ));
    }

    #[test]
    fn aliases_disambiguate_duplicates() {
        let plan = Relation::projection(
            bound_read(),
            vec![
                Expr::column("col1"),
                Expr::alias(Expr::column("col1"), "col1_again"),
            ],
        );

        let schema = plan.schema().unwrap();
        assert_eq!(schema.names(), vec!["col1", "col1_again"]);
    }

    #[test]
    fn selection_preserves_the_input_schema() {
        let plan = Relation::selection(bound_read(), Expr::column("col1"));
        assert_eq!(plan.schema().unwrap(), test_schema());
    }

    #[test]
    fn unbound_read_schema_fails() {
        let plan = Relation::read(Table::named(vec!["db".into(), "t".into()]));
        assert!(matches!(plan.schema(), Err(Error::UnboundTable)));
    }

    #[test]
    fn set_catalog_reaches_nested_reads() {
        let mut plan = Relation::projection(
            Relation::selection(
                Relation::read(Table::named(vec!["db".into(), "t".into()])),
                Expr::column("col1"),
            ),
            vec![Expr::column("col2")],
        );
        assert!(plan.schema().is_err());

        let catalog: Arc<dyn Catalog> = Arc::new(AnonymousCatalog::new(test_schema()));
        plan.set_catalog(&catalog);

        assert_eq!(plan.schema().unwrap().names(), vec!["col2"]);
    }
}
