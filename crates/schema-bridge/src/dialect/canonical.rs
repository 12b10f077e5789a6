//! Canonical type system for cross-dialect type mapping.
//!
//! Rather than mapping every dialect pair directly, native types are
//! converted to a canonical intermediate form and back out:
//!
//! ```text
//! source native type -> CanonicalType -> target native type
//! ```
//!
//! Unknown types are never a hard failure: they pass through unchanged
//! carrying a warning, so a schema containing an exotic column still
//! discovers, diffs, and migrates everything else.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::core::value::{SqlNullType, SqlValue};
use crate::error::{BridgeError, Result};

use super::Dialect;

/// Canonical, dialect-neutral column type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonicalType {
    /// Boolean.
    Boolean,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit floating point.
    Float32,
    /// 64-bit floating point.
    Float64,
    /// Exact decimal. `precision == 0` means unconstrained.
    Decimal { precision: u32, scale: u32 },
    /// Fixed-length character string.
    Char(u32),
    /// Variable-length character string. 0 means unlimited.
    Varchar(u32),
    /// Unlimited text.
    Text,
    /// Binary data.
    Blob,
    /// Date only.
    Date,
    /// Time only.
    Time,
    /// Date and time without timezone.
    DateTime,
    /// Date and time with timezone.
    DateTimeTz,
    /// UUID (128-bit identifier).
    Uuid,
    /// JSON document.
    Json,
    /// Unrecognized type, carrying the original type string.
    Unknown(String),
}

impl CanonicalType {
    /// The NULL type hint matching this canonical type.
    pub fn null_hint(&self) -> SqlNullType {
        match self {
            CanonicalType::Boolean => SqlNullType::Bool,
            CanonicalType::Int16 => SqlNullType::I16,
            CanonicalType::Int32 => SqlNullType::I32,
            CanonicalType::Int64 => SqlNullType::I64,
            CanonicalType::Float32 => SqlNullType::F32,
            CanonicalType::Float64 => SqlNullType::F64,
            CanonicalType::Decimal { .. } => SqlNullType::Decimal,
            CanonicalType::Char(_) | CanonicalType::Varchar(_) | CanonicalType::Text => {
                SqlNullType::Text
            }
            CanonicalType::Blob => SqlNullType::Bytes,
            CanonicalType::Date => SqlNullType::Date,
            CanonicalType::Time => SqlNullType::Time,
            CanonicalType::DateTime => SqlNullType::DateTime,
            CanonicalType::DateTimeTz => SqlNullType::DateTimeTz,
            CanonicalType::Uuid => SqlNullType::Uuid,
            CanonicalType::Json => SqlNullType::Json,
            CanonicalType::Unknown(_) => SqlNullType::Text,
        }
    }
}

impl std::fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CanonicalType::Boolean => write!(f, "Boolean"),
            CanonicalType::Int16 => write!(f, "Int16"),
            CanonicalType::Int32 => write!(f, "Int32"),
            CanonicalType::Int64 => write!(f, "Int64"),
            CanonicalType::Float32 => write!(f, "Float32"),
            CanonicalType::Float64 => write!(f, "Float64"),
            CanonicalType::Decimal { precision, scale } => {
                write!(f, "Decimal({},{})", precision, scale)
            }
            CanonicalType::Char(n) => write!(f, "Char({})", n),
            CanonicalType::Varchar(n) => write!(f, "Varchar({})", n),
            CanonicalType::Text => write!(f, "Text"),
            CanonicalType::Blob => write!(f, "Blob"),
            CanonicalType::Date => write!(f, "Date"),
            CanonicalType::Time => write!(f, "Time"),
            CanonicalType::DateTime => write!(f, "DateTime"),
            CanonicalType::DateTimeTz => write!(f, "DateTimeTz"),
            CanonicalType::Uuid => write!(f, "Uuid"),
            CanonicalType::Json => write!(f, "Json"),
            CanonicalType::Unknown(name) => write!(f, "Unknown({})", name),
        }
    }
}

/// Result of converting a native type to canonical form.
#[derive(Debug, Clone)]
pub struct CanonicalTypeInfo {
    /// The canonical type.
    pub canonical_type: CanonicalType,
    /// Whether information was lost in the conversion.
    pub is_lossy: bool,
    /// Warning message for lossy conversions.
    pub warning: Option<String>,
}

impl CanonicalTypeInfo {
    /// A lossless conversion.
    pub fn lossless(canonical_type: CanonicalType) -> Self {
        Self {
            canonical_type,
            is_lossy: false,
            warning: None,
        }
    }

    /// A lossy conversion with a warning.
    pub fn lossy(canonical_type: CanonicalType, warning: impl Into<String>) -> Self {
        Self {
            canonical_type,
            is_lossy: true,
            warning: Some(warning.into()),
        }
    }
}

/// Result of mapping a type into a target dialect.
#[derive(Debug, Clone)]
pub struct TypeMapping {
    /// Target native type string (e.g. "varchar(255)", "INTEGER").
    pub target_type: String,
    /// Whether this mapping loses data or precision.
    pub is_lossy: bool,
    /// Warning message for lossy mappings.
    pub warning: Option<String>,
}

impl TypeMapping {
    /// A lossless mapping.
    pub fn lossless(target_type: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            is_lossy: false,
            warning: None,
        }
    }

    /// A lossy mapping with a warning.
    pub fn lossy(target_type: impl Into<String>, warning: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            is_lossy: true,
            warning: Some(warning.into()),
        }
    }
}

/// Split a declared type like `VARCHAR(70)` or `DECIMAL(10,2)` into its
/// base name and up to two numeric parameters.
pub(crate) fn parse_type_params(raw: &str) -> (String, Option<i64>, Option<i64>) {
    let raw = raw.trim();
    let Some(open) = raw.find('(') else {
        return (raw.to_lowercase(), None, None);
    };
    let base = raw[..open].trim().to_lowercase();
    let inner = raw[open + 1..].trim_end_matches(')');
    let mut parts = inner.split(',').map(|p| p.trim().parse::<i64>().ok());
    let first = parts.next().flatten();
    let second = parts.next().flatten();
    (base, first, second)
}

/// Convert a native type to canonical form.
pub fn to_canonical(
    dialect: Dialect,
    data_type: &str,
    max_length: i32,
    precision: i32,
    scale: i32,
) -> CanonicalTypeInfo {
    let (base, p1, p2) = parse_type_params(data_type);
    // Prefer explicit catalog metadata over parameters embedded in the
    // declared type string.
    let length = if max_length != 0 {
        max_length as i64
    } else {
        p1.unwrap_or(0)
    };
    let prec = if precision != 0 {
        precision as i64
    } else {
        p1.unwrap_or(0)
    };
    let scl = if scale != 0 { scale as i64 } else { p2.unwrap_or(0) };

    match dialect {
        Dialect::Sqlite => sqlite_to_canonical(data_type, &base, length, prec, scl),
        Dialect::Postgres => postgres_to_canonical(data_type, &base, length, prec, scl),
    }
}

fn sqlite_to_canonical(
    original: &str,
    base: &str,
    length: i64,
    prec: i64,
    scale: i64,
) -> CanonicalTypeInfo {
    match base {
        "tinyint" | "smallint" | "int2" => CanonicalTypeInfo::lossless(CanonicalType::Int16),
        "mediumint" | "int4" => CanonicalTypeInfo::lossless(CanonicalType::Int32),
        // SQLite integer storage is always 64-bit.
        "int" | "integer" | "bigint" | "int8" => {
            CanonicalTypeInfo::lossless(CanonicalType::Int64)
        }
        "real" | "double" | "double precision" | "float" => {
            CanonicalTypeInfo::lossless(CanonicalType::Float64)
        }
        "numeric" | "decimal" => CanonicalTypeInfo::lossless(CanonicalType::Decimal {
            precision: prec.max(0) as u32,
            scale: scale.max(0) as u32,
        }),
        "boolean" | "bool" => CanonicalTypeInfo::lossless(CanonicalType::Boolean),
        "char" | "character" | "nchar" => {
            CanonicalTypeInfo::lossless(CanonicalType::Char(length.max(0) as u32))
        }
        "varchar" | "nvarchar" | "varying character" => {
            if length > 0 {
                CanonicalTypeInfo::lossless(CanonicalType::Varchar(length as u32))
            } else {
                CanonicalTypeInfo::lossless(CanonicalType::Text)
            }
        }
        "text" | "clob" | "string" => CanonicalTypeInfo::lossless(CanonicalType::Text),
        "blob" | "binary" | "varbinary" => CanonicalTypeInfo::lossless(CanonicalType::Blob),
        "date" => CanonicalTypeInfo::lossless(CanonicalType::Date),
        "time" => CanonicalTypeInfo::lossless(CanonicalType::Time),
        "datetime" | "timestamp" => CanonicalTypeInfo::lossless(CanonicalType::DateTime),
        "uuid" | "guid" => CanonicalTypeInfo::lossless(CanonicalType::Uuid),
        "json" | "jsonb" => CanonicalTypeInfo::lossless(CanonicalType::Json),
        // A column declared with no type at all has BLOB affinity but
        // usually holds text in practice.
        "" => CanonicalTypeInfo::lossy(
            CanonicalType::Text,
            "column declared without a type; treating as text",
        ),
        _ => CanonicalTypeInfo::lossy(
            CanonicalType::Unknown(original.to_string()),
            format!("unrecognized sqlite type '{}'", original),
        ),
    }
}

fn postgres_to_canonical(
    original: &str,
    base: &str,
    length: i64,
    prec: i64,
    scale: i64,
) -> CanonicalTypeInfo {
    // Arrays are flattened: "_text" is the udt_name form, "text[]" the
    // information_schema form.
    if base.starts_with('_') || base.ends_with("[]") {
        return CanonicalTypeInfo::lossy(
            CanonicalType::Text,
            format!("array type '{}' flattened to text", original),
        );
    }

    match base {
        "bool" | "boolean" => CanonicalTypeInfo::lossless(CanonicalType::Boolean),
        "int2" | "smallint" => CanonicalTypeInfo::lossless(CanonicalType::Int16),
        "int4" | "int" | "integer" | "serial" => {
            CanonicalTypeInfo::lossless(CanonicalType::Int32)
        }
        "int8" | "bigint" | "bigserial" => CanonicalTypeInfo::lossless(CanonicalType::Int64),
        "float4" | "real" => CanonicalTypeInfo::lossless(CanonicalType::Float32),
        "float8" | "double precision" => CanonicalTypeInfo::lossless(CanonicalType::Float64),
        "numeric" | "decimal" => CanonicalTypeInfo::lossless(CanonicalType::Decimal {
            precision: prec.max(0) as u32,
            scale: scale.max(0) as u32,
        }),
        "money" => CanonicalTypeInfo::lossy(
            CanonicalType::Decimal {
                precision: 19,
                scale: 4,
            },
            "money converted to numeric(19,4)",
        ),
        "bpchar" | "char" | "character" => {
            CanonicalTypeInfo::lossless(CanonicalType::Char(length.max(0) as u32))
        }
        "varchar" | "character varying" => {
            if length > 0 {
                CanonicalTypeInfo::lossless(CanonicalType::Varchar(length as u32))
            } else {
                CanonicalTypeInfo::lossless(CanonicalType::Text)
            }
        }
        "text" | "name" | "citext" => CanonicalTypeInfo::lossless(CanonicalType::Text),
        "bytea" => CanonicalTypeInfo::lossless(CanonicalType::Blob),
        "date" => CanonicalTypeInfo::lossless(CanonicalType::Date),
        "time" | "timetz" | "time without time zone" | "time with time zone" => {
            CanonicalTypeInfo::lossless(CanonicalType::Time)
        }
        "timestamp" | "timestamp without time zone" => {
            CanonicalTypeInfo::lossless(CanonicalType::DateTime)
        }
        "timestamptz" | "timestamp with time zone" => {
            CanonicalTypeInfo::lossless(CanonicalType::DateTimeTz)
        }
        "uuid" => CanonicalTypeInfo::lossless(CanonicalType::Uuid),
        "json" => CanonicalTypeInfo::lossless(CanonicalType::Json),
        "jsonb" => CanonicalTypeInfo::lossless(CanonicalType::Json),
        "xml" => CanonicalTypeInfo::lossy(CanonicalType::Text, "xml stored as text"),
        _ => CanonicalTypeInfo::lossy(
            CanonicalType::Unknown(original.to_string()),
            format!("unrecognized postgres type '{}'", original),
        ),
    }
}

/// Convert a canonical type to a native type for the given dialect.
pub fn from_canonical(dialect: Dialect, canonical: &CanonicalType) -> TypeMapping {
    match dialect {
        Dialect::Postgres => postgres_from_canonical(canonical),
        Dialect::Sqlite => sqlite_from_canonical(canonical),
    }
}

fn postgres_from_canonical(canonical: &CanonicalType) -> TypeMapping {
    match canonical {
        CanonicalType::Boolean => TypeMapping::lossless("boolean"),
        CanonicalType::Int16 => TypeMapping::lossless("smallint"),
        CanonicalType::Int32 => TypeMapping::lossless("integer"),
        CanonicalType::Int64 => TypeMapping::lossless("bigint"),
        CanonicalType::Float32 => TypeMapping::lossless("real"),
        CanonicalType::Float64 => TypeMapping::lossless("double precision"),
        CanonicalType::Decimal { precision: 0, .. } => TypeMapping::lossless("numeric"),
        CanonicalType::Decimal { precision, scale } => {
            TypeMapping::lossless(format!("numeric({},{})", precision, scale))
        }
        CanonicalType::Char(0) => TypeMapping::lossless("text"),
        CanonicalType::Char(n) => TypeMapping::lossless(format!("char({})", n)),
        CanonicalType::Varchar(0) => TypeMapping::lossless("text"),
        CanonicalType::Varchar(n) => TypeMapping::lossless(format!("varchar({})", n)),
        CanonicalType::Text => TypeMapping::lossless("text"),
        CanonicalType::Blob => TypeMapping::lossless("bytea"),
        CanonicalType::Date => TypeMapping::lossless("date"),
        CanonicalType::Time => TypeMapping::lossless("time"),
        CanonicalType::DateTime => TypeMapping::lossless("timestamp"),
        CanonicalType::DateTimeTz => TypeMapping::lossless("timestamptz"),
        CanonicalType::Uuid => TypeMapping::lossless("uuid"),
        CanonicalType::Json => TypeMapping::lossless("jsonb"),
        CanonicalType::Unknown(name) => TypeMapping::lossy(
            name.clone(),
            format!("unknown type '{}' passed through unchanged", name),
        ),
    }
}

fn sqlite_from_canonical(canonical: &CanonicalType) -> TypeMapping {
    match canonical {
        CanonicalType::Boolean => TypeMapping::lossless("BOOLEAN"),
        CanonicalType::Int16 | CanonicalType::Int32 | CanonicalType::Int64 => {
            TypeMapping::lossless("INTEGER")
        }
        CanonicalType::Float32 | CanonicalType::Float64 => TypeMapping::lossless("REAL"),
        CanonicalType::Decimal { precision: 0, .. } => TypeMapping::lossless("NUMERIC"),
        CanonicalType::Decimal { precision, scale } => {
            TypeMapping::lossless(format!("DECIMAL({},{})", precision, scale))
        }
        CanonicalType::Char(0) => TypeMapping::lossless("TEXT"),
        CanonicalType::Char(n) => TypeMapping::lossless(format!("CHAR({})", n)),
        CanonicalType::Varchar(0) => TypeMapping::lossless("TEXT"),
        CanonicalType::Varchar(n) => TypeMapping::lossless(format!("VARCHAR({})", n)),
        CanonicalType::Text => TypeMapping::lossless("TEXT"),
        CanonicalType::Blob => TypeMapping::lossless("BLOB"),
        CanonicalType::Date => TypeMapping::lossless("DATE"),
        CanonicalType::Time => TypeMapping::lossless("TIME"),
        CanonicalType::DateTime => TypeMapping::lossless("DATETIME"),
        CanonicalType::DateTimeTz => TypeMapping::lossy(
            "DATETIME",
            "timezone-aware timestamp stored as text; offset preserved in value",
        ),
        CanonicalType::Uuid => TypeMapping::lossy("TEXT", "uuid stored as text"),
        CanonicalType::Json => TypeMapping::lossy("TEXT", "json stored as text"),
        CanonicalType::Unknown(name) => TypeMapping::lossy(
            name.clone(),
            format!("unknown type '{}' passed through unchanged", name),
        ),
    }
}

/// Coerce a value read from one engine into the form a target column of
/// the given canonical type expects.
///
/// This is where the type-system boundary is actually crossed: integer
/// widths are narrowed (checked), text forms of uuids/decimals/
/// timestamps are parsed, and NULLs pick up the hint the target's wire
/// protocol needs.
pub fn coerce_value(column: &str, value: SqlValue, target: &CanonicalType) -> Result<SqlValue> {
    if value.is_null() {
        return Ok(SqlValue::Null(target.null_hint()));
    }

    let fail = |v: &SqlValue| {
        Err(BridgeError::conversion(
            column,
            format!("cannot represent {:?} as {}", v, target),
        ))
    };

    match target {
        CanonicalType::Boolean => match value {
            SqlValue::Bool(_) => Ok(value),
            SqlValue::I16(v) => Ok(SqlValue::Bool(v != 0)),
            SqlValue::I32(v) => Ok(SqlValue::Bool(v != 0)),
            SqlValue::I64(v) => Ok(SqlValue::Bool(v != 0)),
            SqlValue::Text(ref s) => match s.to_lowercase().as_str() {
                "1" | "t" | "true" | "yes" => Ok(SqlValue::Bool(true)),
                "0" | "f" | "false" | "no" => Ok(SqlValue::Bool(false)),
                _ => fail(&value),
            },
            ref v => fail(v),
        },
        CanonicalType::Int16 => coerce_int(column, value, target).map(|v| SqlValue::I16(v as i16)),
        CanonicalType::Int32 => coerce_int(column, value, target).map(|v| SqlValue::I32(v as i32)),
        CanonicalType::Int64 => coerce_int(column, value, target).map(SqlValue::I64),
        CanonicalType::Float32 => match value {
            SqlValue::F32(_) => Ok(value),
            SqlValue::F64(v) => Ok(SqlValue::F32(v as f32)),
            SqlValue::I16(v) => Ok(SqlValue::F32(v as f32)),
            SqlValue::I32(v) => Ok(SqlValue::F32(v as f32)),
            SqlValue::I64(v) => Ok(SqlValue::F32(v as f32)),
            SqlValue::Text(ref s) => s
                .parse::<f32>()
                .map(SqlValue::F32)
                .map_err(|e| BridgeError::conversion(column, e)),
            ref v => fail(v),
        },
        CanonicalType::Float64 => match value {
            SqlValue::F64(_) => Ok(value),
            SqlValue::F32(v) => Ok(SqlValue::F64(v as f64)),
            SqlValue::I16(v) => Ok(SqlValue::F64(v as f64)),
            SqlValue::I32(v) => Ok(SqlValue::F64(v as f64)),
            SqlValue::I64(v) => Ok(SqlValue::F64(v as f64)),
            SqlValue::Text(ref s) => s
                .parse::<f64>()
                .map(SqlValue::F64)
                .map_err(|e| BridgeError::conversion(column, e)),
            ref v => fail(v),
        },
        CanonicalType::Decimal { .. } => match value {
            SqlValue::Decimal(_) => Ok(value),
            SqlValue::I16(v) => Ok(SqlValue::Decimal(Decimal::from(v))),
            SqlValue::I32(v) => Ok(SqlValue::Decimal(Decimal::from(v))),
            SqlValue::I64(v) => Ok(SqlValue::Decimal(Decimal::from(v))),
            SqlValue::F32(v) => Decimal::from_f32_retain(v)
                .map(SqlValue::Decimal)
                .ok_or_else(|| BridgeError::conversion(column, "non-finite float")),
            SqlValue::F64(v) => Decimal::from_f64_retain(v)
                .map(SqlValue::Decimal)
                .ok_or_else(|| BridgeError::conversion(column, "non-finite float")),
            SqlValue::Text(ref s) => s
                .parse::<Decimal>()
                .map(SqlValue::Decimal)
                .map_err(|e| BridgeError::conversion(column, e)),
            ref v => fail(v),
        },
        CanonicalType::Char(_) | CanonicalType::Varchar(_) | CanonicalType::Text => {
            match value.as_text() {
                Some(s) => Ok(SqlValue::Text(s)),
                None => Ok(SqlValue::Null(SqlNullType::Text)),
            }
        }
        CanonicalType::Blob => match value {
            SqlValue::Bytes(_) => Ok(value),
            SqlValue::Text(s) => Ok(SqlValue::Bytes(s.into_bytes())),
            ref v => fail(v),
        },
        CanonicalType::Date => match value {
            SqlValue::Date(_) => Ok(value),
            SqlValue::DateTime(v) => Ok(SqlValue::Date(v.date())),
            SqlValue::Text(ref s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(SqlValue::Date)
                .map_err(|e| BridgeError::conversion(column, e)),
            ref v => fail(v),
        },
        CanonicalType::Time => match value {
            SqlValue::Time(_) => Ok(value),
            SqlValue::Text(ref s) => NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
                .map(SqlValue::Time)
                .map_err(|e| BridgeError::conversion(column, e)),
            ref v => fail(v),
        },
        CanonicalType::DateTime => match value {
            SqlValue::DateTime(_) => Ok(value),
            SqlValue::Date(v) => Ok(SqlValue::DateTime(v.and_hms_opt(0, 0, 0).unwrap_or_default())),
            SqlValue::DateTimeTz(v) => Ok(SqlValue::DateTime(v.naive_utc())),
            SqlValue::Text(ref s) => parse_datetime_text(s)
                .map(SqlValue::DateTime)
                .ok_or_else(|| {
                    BridgeError::conversion(column, format!("unparseable timestamp '{}'", s))
                }),
            ref v => fail(v),
        },
        CanonicalType::DateTimeTz => match value {
            SqlValue::DateTimeTz(_) => Ok(value),
            SqlValue::DateTime(v) => Ok(SqlValue::DateTimeTz(
                Utc.from_utc_datetime(&v).fixed_offset(),
            )),
            SqlValue::Text(ref s) => chrono::DateTime::parse_from_rfc3339(s)
                .map(SqlValue::DateTimeTz)
                .or_else(|_| {
                    parse_datetime_text(s)
                        .map(|dt| SqlValue::DateTimeTz(Utc.from_utc_datetime(&dt).fixed_offset()))
                        .ok_or_else(|| {
                            BridgeError::conversion(
                                column,
                                format!("unparseable timestamp '{}'", s),
                            )
                        })
                }),
            ref v => fail(v),
        },
        CanonicalType::Uuid => match value {
            SqlValue::Uuid(_) => Ok(value),
            SqlValue::Text(ref s) => Uuid::parse_str(s.trim())
                .map(SqlValue::Uuid)
                .map_err(|e| BridgeError::conversion(column, e)),
            ref v => fail(v),
        },
        CanonicalType::Json => match value {
            SqlValue::Json(_) => Ok(value),
            SqlValue::Text(ref s) => Ok(SqlValue::Json(
                serde_json::from_str(s)
                    .unwrap_or_else(|_| serde_json::Value::String(s.clone())),
            )),
            ref v => fail(v),
        },
        CanonicalType::Unknown(_) => Ok(value),
    }
}

fn coerce_int(column: &str, value: SqlValue, target: &CanonicalType) -> Result<i64> {
    let wide = match &value {
        SqlValue::Bool(v) => i64::from(*v),
        SqlValue::I16(v) => i64::from(*v),
        SqlValue::I32(v) => i64::from(*v),
        SqlValue::I64(v) => *v,
        SqlValue::Text(s) => s
            .parse::<i64>()
            .map_err(|e| BridgeError::conversion(column, e))?,
        v => {
            return Err(BridgeError::conversion(
                column,
                format!("cannot represent {:?} as {}", v, target),
            ))
        }
    };

    let (min, max) = match target {
        CanonicalType::Int16 => (i64::from(i16::MIN), i64::from(i16::MAX)),
        CanonicalType::Int32 => (i64::from(i32::MIN), i64::from(i32::MAX)),
        _ => (i64::MIN, i64::MAX),
    };
    if wide < min || wide > max {
        return Err(BridgeError::conversion(
            column,
            format!("{} out of range for {}", wide, target),
        ));
    }
    Ok(wide)
}

fn parse_datetime_text(s: &str) -> Option<NaiveDateTime> {
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    chrono::DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.naive_utc())
}
