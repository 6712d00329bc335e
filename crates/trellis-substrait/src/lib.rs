//! Substrait building blocks: the value type system, the plan extension
//! registry, and the YAML-backed scalar function repository.

pub mod registry;
pub mod repository;
pub mod types;

pub use registry::{
    ExtensionDeclaration, ExtensionKind, ExtensionRegistry, ExtensionUri, RegistryError,
};
pub use repository::{
    default_repository, raw_file_from_github_url, AnonymousRepository, ExtensionRepository,
    FunctionError, FunctionImplementation, FunctionRepository, DEFAULT_EXTENSIONS_DIR,
    FUNCTIONS_ARITHMETIC_URI, FUNCTIONS_BOOLEAN_URI, FUNCTIONS_COMPARISON_URI,
};
pub use types::{Field, Schema, Type, TypeKind};
