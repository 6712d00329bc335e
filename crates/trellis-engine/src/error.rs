//! Engine error kinds. Errors surface at the component that produced them
//! and bubble to the top-level `Plan` APIs by value.

use thiserror::Error;
use trellis_substrait::{FunctionError, RegistryError};

#[derive(Debug, Error)]
pub enum Error {
    #[error("read: attempted to determine schema of table that has not been bound to a catalog yet")]
    UnboundTable,

    #[error("catalog: table not found: {0}")]
    TableNotFound(String),

    #[error("no column named {0}")]
    ColumnNotFound(String),

    #[error("column index {index} out of range for input with {len} fields")]
    ColumnIndexOutOfRange { index: usize, len: usize },

    #[error("invalid projection: duplicate field name {0}")]
    DuplicateFieldInProjection(String),

    #[error("input schema required to serialize column expression: {0}")]
    SchemaRequired(#[source] Box<Error>),

    #[error("cannot decode read relation without a base schema")]
    MissingBaseSchema,

    #[error("from proto not implemented: {0}")]
    UnsupportedVariant(&'static str),

    #[error("cannot decode scalar function without an output type")]
    MissingOutputType,

    #[error("unrecognized proto type: {0}")]
    UnrecognizedProtoType(String),

    #[error("plan has more than one root relation")]
    MultipleRootRelations,

    #[error("plan has no root relation")]
    NoRootRelation,

    #[error(transparent)]
    Function(#[from] FunctionError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
