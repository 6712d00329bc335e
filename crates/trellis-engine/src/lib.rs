//! Logical relational IR: typed expressions, Read/Projection/Selection
//! relations, catalog-backed tables, and a bidirectional Substrait protobuf
//! codec.

pub mod error;
pub mod expr;
pub mod format;
pub mod plan;
pub mod relation;
pub mod serialization;
pub mod table;

pub use error::Error;
pub use expr::{AliasExpr, Expr, FunctionExpr, Literal, ScalarValue};
pub use format::{format_plan, format_plan_proto, format_plan_text};
pub use plan::Plan;
pub use relation::{Projection, Read, Relation, Selection};
pub use serialization::{expr_from_proto, relation_from_proto};
pub use table::{AnonymousCatalog, Catalog, NamedTable, Table, VirtualTable};

// The type system is defined alongside the other Substrait building blocks;
// re-exported here so IR consumers have a single import surface.
pub use trellis_substrait::{Field, Schema, Type, TypeKind};
