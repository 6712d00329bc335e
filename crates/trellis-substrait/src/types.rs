//! The value type system shared by schemas and function signatures.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The primitive kinds a value can take, without nullability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Date,
    Decimal { precision: i32, scale: i32 },
}

impl TypeKind {
    /// The short name used in compound function signatures such as
    /// `add:i64_i64` and in extension-file type references.
    pub fn signature_name(&self) -> &'static str {
        match self {
            TypeKind::Boolean => "boolean",
            TypeKind::Int8 => "i8",
            TypeKind::Int16 => "i16",
            TypeKind::Int32 => "i32",
            TypeKind::Int64 => "i64",
            TypeKind::Float32 => "fp32",
            TypeKind::Float64 => "fp64",
            TypeKind::String => "string",
            TypeKind::Date => "date",
            TypeKind::Decimal { .. } => "decimal",
        }
    }
}

/// A value type: a primitive kind plus a nullability flag. Equality is
/// structural.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Type {
    kind: TypeKind,
    nullable: bool,
}

impl Type {
    pub fn new(kind: TypeKind, nullable: bool) -> Self {
        Self { kind, nullable }
    }

    pub fn boolean(nullable: bool) -> Self {
        Self::new(TypeKind::Boolean, nullable)
    }

    pub fn int8(nullable: bool) -> Self {
        Self::new(TypeKind::Int8, nullable)
    }

    pub fn int16(nullable: bool) -> Self {
        Self::new(TypeKind::Int16, nullable)
    }

    pub fn int32(nullable: bool) -> Self {
        Self::new(TypeKind::Int32, nullable)
    }

    pub fn int64(nullable: bool) -> Self {
        Self::new(TypeKind::Int64, nullable)
    }

    pub fn float32(nullable: bool) -> Self {
        Self::new(TypeKind::Float32, nullable)
    }

    pub fn float64(nullable: bool) -> Self {
        Self::new(TypeKind::Float64, nullable)
    }

    pub fn string(nullable: bool) -> Self {
        Self::new(TypeKind::String, nullable)
    }

    pub fn date(nullable: bool) -> Self {
        Self::new(TypeKind::Date, nullable)
    }

    pub fn decimal(precision: i32, scale: i32, nullable: bool) -> Self {
        Self::new(TypeKind::Decimal { precision, scale }, nullable)
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    pub fn with_nullability(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn signature_name(&self) -> &'static str {
        self.kind.signature_name()
    }

    /// Parses a type reference as written in extension files: a signature
    /// name, `decimal<P,S>` for decimals, with a trailing `?` marking
    /// nullability.
    pub fn parse(name: &str) -> Option<Type> {
        let trimmed = name.trim();
        let (base, nullable) = match trimmed.strip_suffix('?') {
            Some(base) => (base, true),
            None => (trimmed, false),
        };

        let kind = match base {
            "boolean" => TypeKind::Boolean,
            "i8" => TypeKind::Int8,
            "i16" => TypeKind::Int16,
            "i32" => TypeKind::Int32,
            "i64" => TypeKind::Int64,
            "fp32" => TypeKind::Float32,
            "fp64" => TypeKind::Float64,
            "string" => TypeKind::String,
            "date" => TypeKind::Date,
            _ => {
                let inner = base.strip_prefix("decimal<")?.strip_suffix('>')?;
                let (precision, scale) = inner.split_once(',')?;
                TypeKind::Decimal {
                    precision: precision.trim().parse().ok()?,
                    scale: scale.trim().parse().ok()?,
                }
            }
        };

        Some(Type::new(kind, nullable))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeKind::Decimal { precision, scale } => {
                write!(f, "decimal<{precision},{scale}>")?
            }
            kind => write!(f, "{}", kind.signature_name())?,
        }
        if self.nullable {
            write!(f, "?")?;
        }
        Ok(())
    }
}

/// A named, typed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: Type,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: Type) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.name, self.data_type)
    }
}

/// An ordered sequence of fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{field}")?;
        }
        Ok(())
    }
}
