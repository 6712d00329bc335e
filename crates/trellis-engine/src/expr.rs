//! Typed logical expressions with lazy schema inference.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use substrait::proto;
use trellis_substrait::{
    default_repository, AnonymousRepository, ExtensionRegistry, Field, FunctionRepository, Type,
};

use crate::error::Error;
use crate::relation::Relation;
use crate::serialization::proto_type_for;

/// A logical expression. Types are not checked at construction; they are
/// inferred on demand against the input relation's schema.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A column resolved by name against the input schema.
    Column(String),
    /// A column resolved by ordinal.
    ColumnIndex(usize),
    Literal(Literal),
    Alias(AliasExpr),
    Function(FunctionExpr),
}

impl Expr {
    pub fn column(name: impl Into<String>) -> Expr {
        Expr::Column(name.into())
    }

    pub fn column_index(index: usize) -> Expr {
        Expr::ColumnIndex(index)
    }

    pub fn literal(value: impl Into<ScalarValue>) -> Expr {
        Expr::Literal(Literal::new(value))
    }

    pub fn alias(child: Expr, alias: impl Into<String>) -> Expr {
        Expr::Alias(AliasExpr {
            child: Box::new(child),
            alias: alias.into(),
        })
    }

    /// A scalar function call resolved against the process-wide default
    /// repository.
    pub fn function(uri: impl Into<String>, name: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::function_with_repository(uri, name, args, default_repository())
    }

    pub fn function_with_repository(
        uri: impl Into<String>,
        name: impl Into<String>,
        args: Vec<Expr>,
        repository: Arc<dyn FunctionRepository>,
    ) -> Expr {
        Expr::Function(FunctionExpr {
            uri: uri.into(),
            name: name.into(),
            args,
            repository,
        })
    }

    /// A function call whose implementation is fixed up front: the signature
    /// and output type are taken as given instead of being resolved from an
    /// extension file. Used when decoding plans.
    pub fn anonymous_function(
        uri: impl Into<String>,
        signature: &str,
        output_type: Type,
        args: Vec<Expr>,
    ) -> Result<Expr, Error> {
        let repository = AnonymousRepository::new(signature, output_type)?;
        let name = repository.function_name().to_string();

        Ok(Expr::Function(FunctionExpr {
            uri: uri.into(),
            name,
            args,
            repository: Arc::new(repository),
        }))
    }

    /// The output field this expression contributes to the schema of a
    /// relation over `input`.
    pub fn field(&self, input: &Relation) -> Result<Field, Error> {
        match self {
            Expr::Column(name) => {
                let schema = input.schema()?;
                schema
                    .field_by_name(name)
                    .cloned()
                    .ok_or_else(|| Error::ColumnNotFound(name.clone()))
            }
            Expr::ColumnIndex(index) => {
                let schema = input.schema()?;
                schema
                    .field(*index)
                    .cloned()
                    .ok_or(Error::ColumnIndexOutOfRange {
                        index: *index,
                        len: schema.len(),
                    })
            }
            Expr::Literal(literal) => Ok(Field::new(literal.name(), literal.data_type())),
            Expr::Alias(alias) => {
                let field = alias.child.field(input)?;
                Ok(Field::new(alias.alias.clone(), field.data_type))
            }
            Expr::Function(function) => function.field(input),
        }
    }

    pub(crate) fn to_proto(
        &self,
        input: &Relation,
        extensions: &mut ExtensionRegistry,
    ) -> Result<proto::Expression, Error> {
        match self {
            Expr::Column(name) => {
                // A named column reference cannot be represented without the
                // underlying schema.
                let schema = input
                    .schema()
                    .map_err(|err| Error::SchemaRequired(Box::new(err)))?;
                let index = schema
                    .fields()
                    .iter()
                    .position(|field| field.name == *name)
                    .ok_or_else(|| Error::ColumnNotFound(name.clone()))?;
                Ok(struct_field_reference(index))
            }
            Expr::ColumnIndex(index) => Ok(struct_field_reference(*index)),
            Expr::Literal(literal) => Ok(proto::Expression {
                rex_type: Some(proto::expression::RexType::Literal(literal.to_proto())),
            }),
            Expr::Alias(alias) => alias.child.to_proto(input, extensions),
            Expr::Function(function) => function.to_proto(input, extensions),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => write!(f, "#{name}"),
            Expr::ColumnIndex(index) => write!(f, "#{index}"),
            Expr::Literal(literal) => write!(f, "{}", literal.name()),
            Expr::Alias(alias) => write!(f, "{} AS {}", alias.child, alias.alias),
            Expr::Function(function) => {
                let args: Vec<String> = function.args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", function.name, args.join(", "))
            }
        }
    }
}

fn struct_field_reference(index: usize) -> proto::Expression {
    proto::Expression {
        rex_type: Some(proto::expression::RexType::Selection(Box::new(
            proto::expression::FieldReference {
                reference_type: Some(
                    proto::expression::field_reference::ReferenceType::DirectReference(
                        proto::expression::ReferenceSegment {
                            reference_type: Some(
                                proto::expression::reference_segment::ReferenceType::StructField(
                                    Box::new(
                                        proto::expression::reference_segment::StructField {
                                            field: index as i32,
                                            child: None,
                                        },
                                    ),
                                ),
                            ),
                        },
                    ),
                ),
                root_type: None,
            },
        ))),
    }
}

/// A literal value; every variant carries a typed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    Boolean(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
}

impl ScalarValue {
    pub fn data_type(&self) -> Type {
        match self {
            ScalarValue::Boolean(_) => Type::boolean(false),
            ScalarValue::Int8(_) => Type::int8(false),
            ScalarValue::Int16(_) => Type::int16(false),
            ScalarValue::Int32(_) => Type::int32(false),
            ScalarValue::Int64(_) => Type::int64(false),
            ScalarValue::Float32(_) => Type::float32(false),
            ScalarValue::Float64(_) => Type::float64(false),
            ScalarValue::String(_) => Type::string(false),
        }
    }

    /// The string form used as the field name of a bare literal.
    pub fn name(&self) -> String {
        match self {
            ScalarValue::Boolean(v) => v.to_string(),
            ScalarValue::Int8(v) => v.to_string(),
            ScalarValue::Int16(v) => v.to_string(),
            ScalarValue::Int32(v) => v.to_string(),
            ScalarValue::Int64(v) => v.to_string(),
            ScalarValue::Float32(v) => v.to_string(),
            ScalarValue::Float64(v) => v.to_string(),
            ScalarValue::String(v) => v.clone(),
        }
    }
}

impl From<bool> for ScalarValue {
    fn from(v: bool) -> Self {
        ScalarValue::Boolean(v)
    }
}

impl From<i8> for ScalarValue {
    fn from(v: i8) -> Self {
        ScalarValue::Int8(v)
    }
}

impl From<i16> for ScalarValue {
    fn from(v: i16) -> Self {
        ScalarValue::Int16(v)
    }
}

impl From<i32> for ScalarValue {
    fn from(v: i32) -> Self {
        ScalarValue::Int32(v)
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        ScalarValue::Int64(v)
    }
}

impl From<f32> for ScalarValue {
    fn from(v: f32) -> Self {
        ScalarValue::Float32(v)
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        ScalarValue::Float64(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        ScalarValue::String(v.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        ScalarValue::String(v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub value: ScalarValue,
}

impl Literal {
    pub fn new(value: impl Into<ScalarValue>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn name(&self) -> String {
        self.value.name()
    }

    pub fn data_type(&self) -> Type {
        self.value.data_type()
    }

    pub(crate) fn to_proto(&self) -> proto::expression::Literal {
        use proto::expression::literal::LiteralType;

        let literal_type = match &self.value {
            ScalarValue::Boolean(v) => LiteralType::Boolean(*v),
            ScalarValue::Int8(v) => LiteralType::I8(i32::from(*v)),
            ScalarValue::Int16(v) => LiteralType::I16(i32::from(*v)),
            ScalarValue::Int32(v) => LiteralType::I32(*v),
            ScalarValue::Int64(v) => LiteralType::I64(*v),
            ScalarValue::Float32(v) => LiteralType::Fp32(*v),
            ScalarValue::Float64(v) => LiteralType::Fp64(*v),
            ScalarValue::String(v) => LiteralType::String(v.clone()),
        };

        proto::expression::Literal {
            nullable: false,
            type_variation_reference: 0,
            literal_type: Some(literal_type),
        }
    }
}

/// Renames the output field of its child.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasExpr {
    pub child: Box<Expr>,
    pub alias: String,
}

/// A scalar function call. The implementation is resolved lazily by the
/// arguments' inferred types against the repository.
#[derive(Clone)]
pub struct FunctionExpr {
    pub uri: String,
    pub name: String,
    pub args: Vec<Expr>,
    repository: Arc<dyn FunctionRepository>,
}

impl FunctionExpr {
    fn argument_types(&self, input: &Relation) -> Result<Vec<Type>, Error> {
        self.args
            .iter()
            .map(|arg| Ok(arg.field(input)?.data_type))
            .collect()
    }

    fn field(&self, input: &Relation) -> Result<Field, Error> {
        let args = self.argument_types(input)?;
        let implementation = self
            .repository
            .get_implementation(&self.uri, &self.name, &args)?;
        let return_type = implementation.return_type(&args)?;

        Ok(Field::new(
            Expr::Function(self.clone()).to_string(),
            return_type,
        ))
    }

    fn to_proto(
        &self,
        input: &Relation,
        extensions: &mut ExtensionRegistry,
    ) -> Result<proto::Expression, Error> {
        let args = self.argument_types(input)?;
        let implementation = self
            .repository
            .get_implementation(&self.uri, &self.name, &args)?;
        let return_type = implementation.return_type(&args)?;
        let output_type = proto_type_for(&return_type);

        let arguments = self
            .args
            .iter()
            .map(|arg| {
                Ok(proto::FunctionArgument {
                    arg_type: Some(proto::function_argument::ArgType::Value(
                        arg.to_proto(input, extensions)?,
                    )),
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let reference = extensions.register_function(&self.uri, &implementation.signature());

        Ok(proto::Expression {
            rex_type: Some(proto::expression::RexType::ScalarFunction(
                proto::expression::ScalarFunction {
                    function_reference: reference,
                    arguments,
                    output_type: Some(output_type),
                    ..Default::default()
                },
            )),
        })
    }
}

impl fmt::Debug for FunctionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionExpr")
            .field("uri", &self.uri)
            .field("name", &self.name)
            .field("args", &self.args)
            .finish()
    }
}

impl PartialEq for FunctionExpr {
    fn eq(&self, other: &Self) -> bool {
        // The repository handle is not part of identity.
        self.uri == other.uri && self.name == other.name && self.args == other.args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{AnonymousCatalog, NamedTable, Table};
    use trellis_substrait::{Schema, FUNCTIONS_ARITHMETIC_URI};

    fn bound_read() -> Relation {
        let schema = Schema::new(vec![
            Field::new("col1", Type::boolean(false)),
            Field::new("col2", Type::string(false)),
            Field::new("col3", Type::int64(false)),
        ]);
        let table = NamedTable::new(
            vec!["db".into(), "t".into()],
            Some(Arc::new(AnonymousCatalog::new(schema))),
        );
        Relation::read(Table::Named(table))
    }

    #[test]
    fn column_resolves_by_name() {
        let input = bound_read();
        let field = Expr::column("col2").field(&input).unwrap();
        assert_eq!(field, Field::new("col2", Type::string(false)));

        assert!(matches!(
            Expr::column("nope").field(&input),
            Err(Error::ColumnNotFound(_))
        ));
    }

    #[test]
    fn column_index_is_bounds_checked() {
        let input = bound_read();
        let field = Expr::column_index(2).field(&input).unwrap();
        assert_eq!(field.name, "col3");

        assert!(matches!(
            Expr::column_index(3).field(&input),
            Err(Error::ColumnIndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn literal_field_is_named_after_its_value() {
        let input = bound_read();
        let field = Expr::literal(42i64).field(&input).unwrap();
        assert_eq!(field, Field::new("42", Type::int64(false)));

        let field = Expr::literal("abc").field(&input).unwrap();
        assert_eq!(field, Field::new("abc", Type::string(false)));
    }

    #[test]
    fn alias_renames_the_child_field() {
        let input = bound_read();
        let expr = Expr::alias(Expr::column("col3"), "total");
        let field = expr.field(&input).unwrap();
        assert_eq!(field, Field::new("total", Type::int64(false)));
    }

    #[test]
    fn function_field_uses_pretty_printed_call_name() {
        let input = bound_read();
        let expr = Expr::function(
            FUNCTIONS_ARITHMETIC_URI,
            "add",
            vec![Expr::column("col3"), Expr::literal(3i64)],
        );

        let field = expr.field(&input).unwrap();
        assert_eq!(field.name, "add(#col3, 3)");
        assert_eq!(field.data_type, Type::int64(false));
    }

    #[test]
    fn function_with_mismatched_arguments_fails() {
        let input = bound_read();
        let expr = Expr::function(
            FUNCTIONS_ARITHMETIC_URI,
            "add",
            vec![Expr::column("col2"), Expr::literal(3i64)],
        );

        assert!(matches!(
            expr.field(&input),
            Err(Error::Function(
                trellis_substrait::FunctionError::NoMatchingImplementation
            ))
        ));
    }

    #[test]
    fn display_forms() {
        assert_eq!(Expr::column("col1").to_string(), "#col1");
        assert_eq!(Expr::column_index(4).to_string(), "#4");
        assert_eq!(Expr::literal(7i64).to_string(), "7");
        assert_eq!(
            Expr::alias(Expr::column("a"), "b").to_string(),
            "#a AS b"
        );
        assert_eq!(
            Expr::function(
                FUNCTIONS_ARITHMETIC_URI,
                "add",
                vec![Expr::column("a"), Expr::literal(1i64)],
            )
            .to_string(),
            "add(#a, 1)"
        );
    }
}
