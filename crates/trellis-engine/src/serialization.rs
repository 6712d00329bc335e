//! Proto decoding and the type/schema wire mappings shared by the encoders.

use std::sync::Arc;

use substrait::proto;
use trellis_substrait::{
    ExtensionRegistry, Field, Schema, Type, TypeKind,
};

use crate::error::Error;
use crate::expr::Expr;
use crate::relation::Relation;
use crate::table::{AnonymousCatalog, NamedTable, Table, VirtualTable};

fn nullability_for(nullable: bool) -> i32 {
    if nullable {
        proto::r#type::Nullability::Nullable as i32
    } else {
        proto::r#type::Nullability::Required as i32
    }
}

/// `NULLABILITY_UNSPECIFIED` is treated as required.
fn is_nullable(nullability: i32) -> bool {
    nullability == proto::r#type::Nullability::Nullable as i32
}

pub(crate) fn proto_type_for(data_type: &Type) -> proto::Type {
    use proto::r#type as ptype;

    let nullability = nullability_for(data_type.nullable());
    let kind = match data_type.kind() {
        TypeKind::Boolean => ptype::Kind::Bool(ptype::Boolean {
            type_variation_reference: 0,
            nullability,
        }),
        TypeKind::Int8 => ptype::Kind::I8(ptype::I8 {
            type_variation_reference: 0,
            nullability,
        }),
        TypeKind::Int16 => ptype::Kind::I16(ptype::I16 {
            type_variation_reference: 0,
            nullability,
        }),
        TypeKind::Int32 => ptype::Kind::I32(ptype::I32 {
            type_variation_reference: 0,
            nullability,
        }),
        TypeKind::Int64 => ptype::Kind::I64(ptype::I64 {
            type_variation_reference: 0,
            nullability,
        }),
        TypeKind::Float32 => ptype::Kind::Fp32(ptype::Fp32 {
            type_variation_reference: 0,
            nullability,
        }),
        TypeKind::Float64 => ptype::Kind::Fp64(ptype::Fp64 {
            type_variation_reference: 0,
            nullability,
        }),
        TypeKind::String => ptype::Kind::String(ptype::String {
            type_variation_reference: 0,
            nullability,
        }),
        TypeKind::Date => ptype::Kind::Date(ptype::Date {
            type_variation_reference: 0,
            nullability,
        }),
        TypeKind::Decimal { precision, scale } => ptype::Kind::Decimal(ptype::Decimal {
            precision: *precision,
            scale: *scale,
            type_variation_reference: 0,
            nullability,
        }),
    };

    proto::Type { kind: Some(kind) }
}

pub(crate) fn type_for_proto(data_type: &proto::Type) -> Result<Type, Error> {
    use proto::r#type::Kind;

    let Some(kind) = &data_type.kind else {
        return Err(Error::UnrecognizedProtoType("type without a kind".to_string()));
    };

    let data_type = match kind {
        Kind::Bool(t) => Type::boolean(is_nullable(t.nullability)),
        Kind::I8(t) => Type::int8(is_nullable(t.nullability)),
        Kind::I16(t) => Type::int16(is_nullable(t.nullability)),
        Kind::I32(t) => Type::int32(is_nullable(t.nullability)),
        Kind::I64(t) => Type::int64(is_nullable(t.nullability)),
        Kind::Fp32(t) => Type::float32(is_nullable(t.nullability)),
        Kind::Fp64(t) => Type::float64(is_nullable(t.nullability)),
        Kind::String(t) => Type::string(is_nullable(t.nullability)),
        Kind::Date(t) => Type::date(is_nullable(t.nullability)),
        Kind::Decimal(t) => Type::decimal(t.precision, t.scale, is_nullable(t.nullability)),
        other => {
            return Err(Error::UnrecognizedProtoType(format!("{other:?}")));
        }
    };

    Ok(data_type)
}

pub(crate) fn schema_to_named_struct(schema: &Schema) -> proto::NamedStruct {
    proto::NamedStruct {
        names: schema.names(),
        r#struct: Some(proto::r#type::Struct {
            types: schema
                .fields()
                .iter()
                .map(|field| proto_type_for(&field.data_type))
                .collect(),
            type_variation_reference: 0,
            nullability: proto::r#type::Nullability::Required as i32,
        }),
    }
}

pub(crate) fn named_struct_to_schema(named_struct: &proto::NamedStruct) -> Result<Schema, Error> {
    let Some(types) = &named_struct.r#struct else {
        return Err(Error::UnrecognizedProtoType(
            "named struct without a struct type".to_string(),
        ));
    };
    if types.types.len() != named_struct.names.len() {
        return Err(Error::UnrecognizedProtoType(
            "named struct with mismatched name and type counts".to_string(),
        ));
    }

    let fields = named_struct
        .names
        .iter()
        .zip(&types.types)
        .map(|(name, data_type)| Ok(Field::new(name.clone(), type_for_proto(data_type)?)))
        .collect::<Result<Vec<_>, Error>>()?;

    Ok(Schema::new(fields))
}

/// Decodes a non-root relation.
pub fn relation_from_proto(
    rel: &proto::Rel,
    extensions: &ExtensionRegistry,
) -> Result<Relation, Error> {
    use proto::rel::RelType;

    match &rel.rel_type {
        Some(RelType::Read(read)) => read_from_proto(read.as_ref()),
        Some(RelType::Project(project)) => project_from_proto(project.as_ref(), extensions),
        Some(RelType::Filter(filter)) => filter_from_proto(filter.as_ref(), extensions),
        Some(RelType::Fetch(_)) => Err(Error::UnsupportedVariant("FetchRel")),
        Some(RelType::Aggregate(_)) => Err(Error::UnsupportedVariant("AggregateRel")),
        Some(RelType::Sort(_)) => Err(Error::UnsupportedVariant("SortRel")),
        Some(RelType::Join(_)) => Err(Error::UnsupportedVariant("JoinRel")),
        Some(RelType::Set(_)) => Err(Error::UnsupportedVariant("SetRel")),
        Some(RelType::Cross(_)) => Err(Error::UnsupportedVariant("CrossRel")),
        Some(other) => Err(Error::UnrecognizedProtoType(format!("{other:?}"))),
        None => Err(Error::UnrecognizedProtoType(
            "relation without a rel type".to_string(),
        )),
    }
}

fn read_from_proto(rel: &proto::ReadRel) -> Result<Relation, Error> {
    use proto::read_rel::ReadType;

    match &rel.read_type {
        Some(ReadType::NamedTable(named_table)) => {
            // The base schema written at serialization time stands in for the
            // original catalog.
            let named_struct = rel.base_schema.as_ref().ok_or(Error::MissingBaseSchema)?;
            let schema = named_struct_to_schema(named_struct)?;

            let table = NamedTable::new(
                named_table.names.clone(),
                Some(Arc::new(AnonymousCatalog::new(schema))),
            );
            Ok(Relation::read(Table::Named(table)))
        }
        Some(ReadType::VirtualTable(virtual_table)) => {
            #[allow(deprecated)]
            let has_rows = !virtual_table.values.is_empty();
            if has_rows {
                return Err(Error::UnsupportedVariant("ReadRel.VirtualTable with rows"));
            }
            Ok(Relation::read(Table::Virtual(VirtualTable)))
        }
        Some(ReadType::LocalFiles(_)) => Err(Error::UnsupportedVariant("ReadRel.LocalFiles")),
        Some(ReadType::ExtensionTable(_)) => {
            Err(Error::UnsupportedVariant("ReadRel.ExtensionTable"))
        }
        Some(ReadType::IcebergTable(_)) => Err(Error::UnsupportedVariant("ReadRel.IcebergTable")),
        None => Err(Error::UnrecognizedProtoType(
            "read relation without a read type".to_string(),
        )),
    }
}

fn project_from_proto(
    rel: &proto::ProjectRel,
    extensions: &ExtensionRegistry,
) -> Result<Relation, Error> {
    let exprs = rel
        .expressions
        .iter()
        .map(|expr| expr_from_proto(expr, extensions))
        .collect::<Result<Vec<_>, _>>()?;

    let input = rel.input.as_deref().ok_or_else(|| {
        Error::UnrecognizedProtoType("project relation without an input".to_string())
    })?;

    Ok(Relation::projection(
        relation_from_proto(input, extensions)?,
        exprs,
    ))
}

fn filter_from_proto(
    rel: &proto::FilterRel,
    extensions: &ExtensionRegistry,
) -> Result<Relation, Error> {
    let condition = rel.condition.as_deref().ok_or_else(|| {
        Error::UnrecognizedProtoType("filter relation without a condition".to_string())
    })?;
    let input = rel.input.as_deref().ok_or_else(|| {
        Error::UnrecognizedProtoType("filter relation without an input".to_string())
    })?;

    Ok(Relation::selection(
        relation_from_proto(input, extensions)?,
        expr_from_proto(condition, extensions)?,
    ))
}

pub fn expr_from_proto(
    expr: &proto::Expression,
    extensions: &ExtensionRegistry,
) -> Result<Expr, Error> {
    use proto::expression::RexType;

    match &expr.rex_type {
        Some(RexType::Literal(literal)) => literal_from_proto(literal),
        Some(RexType::Selection(field_reference)) => {
            field_reference_from_proto(field_reference.as_ref())
        }
        Some(RexType::ScalarFunction(function)) => {
            scalar_function_from_proto(function, extensions)
        }
        Some(RexType::WindowFunction(_)) => {
            Err(Error::UnsupportedVariant("Expression.WindowFunction"))
        }
        Some(RexType::IfThen(_)) => Err(Error::UnsupportedVariant("Expression.IfThen")),
        Some(RexType::SwitchExpression(_)) => {
            Err(Error::UnsupportedVariant("Expression.SwitchExpression"))
        }
        Some(RexType::SingularOrList(_)) => {
            Err(Error::UnsupportedVariant("Expression.SingularOrList"))
        }
        Some(RexType::MultiOrList(_)) => {
            Err(Error::UnsupportedVariant("Expression.MultiOrList"))
        }
        Some(RexType::Cast(_)) => Err(Error::UnsupportedVariant("Expression.Cast")),
        Some(RexType::Subquery(_)) => Err(Error::UnsupportedVariant("Expression.Subquery")),
        Some(RexType::Nested(_)) => Err(Error::UnsupportedVariant("Expression.Nested")),
        Some(RexType::Enum(_)) => Err(Error::UnsupportedVariant("Expression.Enum")),
        Some(other) => Err(Error::UnrecognizedProtoType(format!("{other:?}"))),
        None => Err(Error::UnrecognizedProtoType(
            "expression without a rex type".to_string(),
        )),
    }
}

fn literal_from_proto(literal: &proto::expression::Literal) -> Result<Expr, Error> {
    use proto::expression::literal::LiteralType;

    let Some(literal_type) = &literal.literal_type else {
        return Err(Error::UnrecognizedProtoType(
            "literal without a literal type".to_string(),
        ));
    };

    match literal_type {
        LiteralType::Boolean(v) => Ok(Expr::literal(*v)),
        LiteralType::I8(v) => Ok(Expr::literal(*v as i8)),
        LiteralType::I16(v) => Ok(Expr::literal(*v as i16)),
        LiteralType::I32(v) => Ok(Expr::literal(*v)),
        LiteralType::I64(v) => Ok(Expr::literal(*v)),
        LiteralType::Fp32(v) => Ok(Expr::literal(*v)),
        LiteralType::Fp64(v) => Ok(Expr::literal(*v)),
        LiteralType::String(v) => Ok(Expr::literal(v.as_str())),
        _ => Err(Error::UnsupportedVariant("Expression.Literal kind")),
    }
}

fn field_reference_from_proto(
    field_reference: &proto::expression::FieldReference,
) -> Result<Expr, Error> {
    use proto::expression::field_reference::ReferenceType;

    if field_reference.root_type.is_some() {
        return Err(Error::UnsupportedVariant("FieldReference.RootType"));
    }

    match &field_reference.reference_type {
        Some(ReferenceType::DirectReference(segment)) => reference_segment_from_proto(segment),
        Some(ReferenceType::MaskedReference(_)) => {
            Err(Error::UnsupportedVariant("FieldReference.MaskedReference"))
        }
        None => Err(Error::UnrecognizedProtoType(
            "field reference without a reference type".to_string(),
        )),
    }
}

fn reference_segment_from_proto(
    segment: &proto::expression::ReferenceSegment,
) -> Result<Expr, Error> {
    use proto::expression::reference_segment::ReferenceType;

    match &segment.reference_type {
        Some(ReferenceType::StructField(struct_field)) => {
            if struct_field.child.is_some() {
                // Nested struct references are out of scope.
                return Err(Error::UnsupportedVariant(
                    "ReferenceSegment.StructField.child",
                ));
            }
            Ok(Expr::column_index(struct_field.field as usize))
        }
        Some(ReferenceType::ListElement(_)) => {
            Err(Error::UnsupportedVariant("ReferenceSegment.ListElement"))
        }
        Some(ReferenceType::MapKey(_)) => {
            Err(Error::UnsupportedVariant("ReferenceSegment.MapKey"))
        }
        None => Err(Error::UnrecognizedProtoType(
            "reference segment without a reference type".to_string(),
        )),
    }
}

fn scalar_function_from_proto(
    function: &proto::expression::ScalarFunction,
    extensions: &ExtensionRegistry,
) -> Result<Expr, Error> {
    let (declaration, uri) = extensions.get_by_anchor(function.function_reference)?;

    let output_type = function
        .output_type
        .as_ref()
        .ok_or(Error::MissingOutputType)?;
    let output_type = type_for_proto(output_type)?;

    let args = function
        .arguments
        .iter()
        .map(|argument| match &argument.arg_type {
            Some(proto::function_argument::ArgType::Value(expr)) => {
                expr_from_proto(expr, extensions)
            }
            Some(proto::function_argument::ArgType::Enum(_)) => {
                Err(Error::UnsupportedVariant("FunctionArgument.Enum"))
            }
            Some(proto::function_argument::ArgType::Type(_)) => {
                Err(Error::UnsupportedVariant("FunctionArgument.Type"))
            }
            None => Err(Error::UnrecognizedProtoType(
                "function argument without an arg type".to_string(),
            )),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Expr::anonymous_function(uri, &declaration.name, output_type, args)
}

/// Wraps a decoded root relation in a renaming projection when the proto's
/// root names differ from the relation's own schema. This preserves the
/// original output column names end-to-end.
pub(crate) fn restore_root_names(
    relation: Relation,
    names: &[String],
) -> Result<Relation, Error> {
    if names.is_empty() {
        return Ok(relation);
    }

    let schema = relation.schema()?;
    let matches = schema.len() == names.len()
        && schema
            .fields()
            .iter()
            .zip(names)
            .all(|(field, name)| field.name == *name);
    if matches {
        return Ok(relation);
    }

    let exprs = names
        .iter()
        .enumerate()
        .map(|(i, name)| Expr::alias(Expr::column_index(i), name.clone()))
        .collect();

    Ok(Relation::projection(relation, exprs))
}
