//! Tables and the catalog capability they resolve against.

use std::fmt;
use std::sync::Arc;

use substrait::proto;
use trellis_substrait::Schema;

use crate::error::Error;
use crate::serialization::schema_to_named_struct;

/// Resolves a dotted table identifier to its schema. The identifier is kept
/// as a segment list; implementations join with "." for diagnostics.
pub trait Catalog: Send + Sync {
    fn schema(&self, identifier: &[String]) -> Result<Schema, Error>;
}

/// The table behind a `Read` relation.
#[derive(Debug, Clone, PartialEq)]
pub enum Table {
    Named(NamedTable),
    Virtual(VirtualTable),
}

impl Table {
    pub fn named(identifier: Vec<String>) -> Table {
        Table::Named(NamedTable::new(identifier, None))
    }

    pub fn schema(&self) -> Result<Schema, Error> {
        match self {
            Table::Named(table) => table.schema(),
            Table::Virtual(table) => table.schema(),
        }
    }

    pub(crate) fn to_proto(&self) -> Result<proto::Rel, Error> {
        match self {
            Table::Named(table) => table.to_proto(),
            Table::Virtual(table) => table.to_proto(),
        }
    }
}

/// A table identified by a dotted path, bound to a catalog after
/// construction. The catalog handle is replaceable and shared read-only.
#[derive(Clone)]
pub struct NamedTable {
    identifier: Vec<String>,
    catalog: Option<Arc<dyn Catalog>>,
}

impl NamedTable {
    pub fn new(identifier: Vec<String>, catalog: Option<Arc<dyn Catalog>>) -> Self {
        Self {
            identifier,
            catalog,
        }
    }

    pub fn identifier(&self) -> &[String] {
        &self.identifier
    }

    pub fn set_catalog(&mut self, catalog: Arc<dyn Catalog>) {
        self.catalog = Some(catalog);
    }

    pub fn schema(&self) -> Result<Schema, Error> {
        let catalog = self.catalog.as_ref().ok_or(Error::UnboundTable)?;
        catalog.schema(&self.identifier)
    }

    fn to_proto(&self) -> Result<proto::Rel, Error> {
        // If the schema cannot be determined the plan still serializes, just
        // without a base schema.
        let base_schema = self.schema().ok().map(|schema| schema_to_named_struct(&schema));

        Ok(proto::Rel {
            rel_type: Some(proto::rel::RelType::Read(Box::new(proto::ReadRel {
                base_schema,
                read_type: Some(proto::read_rel::ReadType::NamedTable(
                    proto::read_rel::NamedTable {
                        names: self.identifier.clone(),
                        ..Default::default()
                    },
                )),
                ..Default::default()
            }))),
        })
    }
}

impl fmt::Debug for NamedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedTable")
            .field("identifier", &self.identifier)
            .field("bound", &self.catalog.is_some())
            .finish()
    }
}

impl PartialEq for NamedTable {
    fn eq(&self, other: &Self) -> bool {
        // The catalog handle is a binding detail, not part of identity.
        self.identifier == other.identifier
    }
}

/// A table with no backing storage. With no rows its schema is empty;
/// in-memory records are out of scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualTable;

impl VirtualTable {
    pub fn schema(&self) -> Result<Schema, Error> {
        Ok(Schema::empty())
    }

    fn to_proto(&self) -> Result<proto::Rel, Error> {
        Ok(proto::Rel {
            rel_type: Some(proto::rel::RelType::Read(Box::new(proto::ReadRel {
                read_type: Some(proto::read_rel::ReadType::VirtualTable(
                    proto::read_rel::VirtualTable::default(),
                )),
                ..Default::default()
            }))),
        })
    }
}

/// Answers every identifier with one fixed schema. Used when rebuilding
/// reads from a plan that carries its own base schema.
#[derive(Debug, Clone)]
pub struct AnonymousCatalog {
    schema: Schema,
}

impl AnonymousCatalog {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }
}

impl Catalog for AnonymousCatalog {
    fn schema(&self, _identifier: &[String]) -> Result<Schema, Error> {
        Ok(self.schema.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_substrait::{Field, Type};

    struct SingleTableCatalog;

    impl Catalog for SingleTableCatalog {
        fn schema(&self, identifier: &[String]) -> Result<Schema, Error> {
            if identifier.join(".") != "db.t" {
                return Err(Error::TableNotFound(identifier.join(".")));
            }
            Ok(Schema::new(vec![Field::new("a", Type::int64(false))]))
        }
    }

    #[test]
    fn unbound_named_table_has_no_schema() {
        let table = NamedTable::new(vec!["db".into(), "t".into()], None);
        assert!(matches!(table.schema(), Err(Error::UnboundTable)));
    }

    #[test]
    fn binding_a_catalog_resolves_the_schema() {
        let mut table = NamedTable::new(vec!["db".into(), "t".into()], None);
        table.set_catalog(Arc::new(SingleTableCatalog));

        let schema = table.schema().unwrap();
        assert_eq!(schema.names(), vec!["a"]);
    }

    #[test]
    fn missing_table_surfaces_catalog_error() {
        let mut table = NamedTable::new(vec!["db".into(), "missing".into()], None);
        table.set_catalog(Arc::new(SingleTableCatalog));
        assert!(matches!(table.schema(), Err(Error::TableNotFound(_))));
    }

    #[test]
    fn virtual_table_schema_is_empty() {
        assert!(VirtualTable.schema().unwrap().is_empty());
    }

    #[test]
    fn unbound_read_still_serializes_without_schema() {
        let table = NamedTable::new(vec!["db".into(), "t".into()], None);
        let rel = table.to_proto().unwrap();

        let Some(proto::rel::RelType::Read(read)) = rel.rel_type else {
            panic!("expected a read relation");
        };
        assert!(read.base_schema.is_none());
        let Some(proto::read_rel::ReadType::NamedTable(named)) = read.read_type else {
            panic!("expected a named table");
        };
        assert_eq!(named.names, vec!["db", "t"]);
    }
}
