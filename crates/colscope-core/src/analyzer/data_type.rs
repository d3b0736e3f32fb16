//! Minimal SQL type model.
//!
//! Only the properties the analyzer checks are modelled: comparability and
//! orderability for PARTITION BY / ORDER BY, row shapes for field access and
//! subscripts, and element types for arrays and maps. Anything else maps to
//! [`Type::Unknown`], which satisfies every check.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Type {
    Unknown,
    Boolean,
    Integer,
    Bigint,
    Double,
    Decimal,
    Varchar,
    Date,
    Timestamp,
    Json,
    Array(Box<Type>),
    Map(Box<Type>, Box<Type>),
    Row(Vec<RowField>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RowField {
    pub name: Option<String>,
    pub ty: Type,
}

impl RowField {
    pub fn new(name: Option<String>, ty: Type) -> Self {
        Self { name, ty }
    }
}

impl Type {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    pub fn is_comparable(&self) -> bool {
        match self {
            Self::Json => false,
            Self::Array(element) => element.is_comparable(),
            Self::Map(key, value) => key.is_comparable() && value.is_comparable(),
            Self::Row(fields) => fields.iter().all(|field| field.ty.is_comparable()),
            _ => true,
        }
    }

    pub fn is_orderable(&self) -> bool {
        match self {
            Self::Json | Self::Map(..) => false,
            Self::Array(element) => element.is_orderable(),
            Self::Row(fields) => fields.iter().all(|field| field.ty.is_orderable()),
            _ => true,
        }
    }

    fn numeric_rank(&self) -> Option<u8> {
        match self {
            Self::Integer => Some(0),
            Self::Bigint => Some(1),
            Self::Decimal => Some(2),
            Self::Double => Some(3),
            _ => None,
        }
    }

    /// Result type of a binary arithmetic expression.
    pub fn arithmetic_result(left: &Type, right: &Type) -> Type {
        match (left.numeric_rank(), right.numeric_rank()) {
            (Some(l), Some(r)) => {
                if l >= r {
                    left.clone()
                } else {
                    right.clone()
                }
            }
            _ if left == right => left.clone(),
            _ => Type::Unknown,
        }
    }

    /// Parses a type name as it appears in schema metadata or a CAST.
    ///
    /// Accepts both `array(T)` and `array<T>` spellings, `map(K, V)`,
    /// `row(name T, ...)` and `struct<name: T, ...>`. Unrecognized names give
    /// [`Type::Unknown`].
    pub fn parse(text: &str) -> Type {
        let text = text.trim();
        let lower = text.to_ascii_lowercase();
        let (head, args) = split_type_arguments(&lower);
        match head {
            "array" | "list" => match args.as_deref() {
                Some([element]) => Type::Array(Box::new(Type::parse(element))),
                _ => Type::Array(Box::new(Type::Unknown)),
            },
            "map" => match args.as_deref() {
                Some([key, value]) => {
                    Type::Map(Box::new(Type::parse(key)), Box::new(Type::parse(value)))
                }
                _ => Type::Map(Box::new(Type::Unknown), Box::new(Type::Unknown)),
            },
            "row" | "struct" => Type::Row(
                args.unwrap_or_default()
                    .iter()
                    .map(|field| parse_row_field(field))
                    .collect(),
            ),
            _ if lower.ends_with("[]") => {
                Type::Array(Box::new(Type::parse(&lower[..lower.len() - 2])))
            }
            _ => scalar(head),
        }
    }
}

fn scalar(name: &str) -> Type {
    match name {
        "boolean" | "bool" => Type::Boolean,
        "tinyint" | "smallint" | "int" | "integer" | "int2" | "int4" => Type::Integer,
        "bigint" | "long" | "int8" => Type::Bigint,
        "double" | "double precision" | "float" | "float4" | "float8" | "real" => Type::Double,
        "decimal" | "numeric" | "number" => Type::Decimal,
        "varchar" | "char" | "character" | "character varying" | "string" | "text" => {
            Type::Varchar
        }
        "date" => Type::Date,
        "json" | "jsonb" => Type::Json,
        other if other.starts_with("timestamp") || other == "datetime" => Type::Timestamp,
        _ => Type::Unknown,
    }
}

/// `decimal(10, 2)` -> (`decimal`, [`10`, `2`]); `int` -> (`int`, None).
fn split_type_arguments(text: &str) -> (&str, Option<Vec<String>>) {
    let Some(open) = text.find(['(', '<']) else {
        return (text.trim(), None);
    };
    let close = match text.as_bytes()[open] {
        b'(' => ')',
        _ => '>',
    };
    let Some(end) = text.rfind(close) else {
        return (text.trim(), None);
    };
    if end < open {
        return (text.trim(), None);
    }
    let head = text[..open].trim();
    (head, Some(split_top_level(&text[open + 1..end])))
}

fn split_top_level(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for ch in text.chars() {
        match ch {
            '(' | '<' => {
                depth += 1;
                current.push(ch);
            }
            ')' | '>' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

fn parse_row_field(text: &str) -> RowField {
    let (name, ty) = match text.split_once(':') {
        Some((name, ty)) if !name.contains(['(', '<']) => (name.trim(), ty.trim()),
        _ => match text.split_once(char::is_whitespace) {
            Some((name, ty)) => (name.trim(), ty.trim()),
            None => return RowField::new(None, Type::parse(text)),
        },
    };
    RowField::new(
        Some(name.trim_matches('"').to_string()),
        Type::parse(ty),
    )
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("unknown"),
            Self::Boolean => f.write_str("boolean"),
            Self::Integer => f.write_str("integer"),
            Self::Bigint => f.write_str("bigint"),
            Self::Double => f.write_str("double"),
            Self::Decimal => f.write_str("decimal"),
            Self::Varchar => f.write_str("varchar"),
            Self::Date => f.write_str("date"),
            Self::Timestamp => f.write_str("timestamp"),
            Self::Json => f.write_str("json"),
            Self::Array(element) => write!(f, "array({element})"),
            Self::Map(key, value) => write!(f, "map({key}, {value})"),
            Self::Row(fields) => {
                f.write_str("row(")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match &field.name {
                        Some(name) => write!(f, "{name} {}", field.ty)?,
                        None => write!(f, "{}", field.ty)?,
                    }
                }
                f.write_str(")")
            }
        }
    }
}
