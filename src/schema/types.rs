// src/schema/types.rs

use chrono::NaiveDate;
use std::fmt;

use crate::dates::{parse_date, TOKEN_FORMAT};

/// SQL type of a target column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Text,
    Boolean,
    Integer,
    /// `NUMERIC(precision)`
    Numeric(u8),
    Date,
}

impl ColumnKind {
    pub fn sql_type(&self) -> String {
        match self {
            ColumnKind::Text => "VARCHAR".into(),
            ColumnKind::Boolean => "BOOLEAN".into(),
            ColumnKind::Integer => "INTEGER".into(),
            ColumnKind::Numeric(p) => format!("NUMERIC({p})"),
            ColumnKind::Date => "DATE".into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColumnKind::Text => "text",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Integer => "integer",
            ColumnKind::Numeric(_) => "numeric",
            ColumnKind::Date => "date",
        }
    }

    /// Read a raw cell as this kind. `None` is returned on a value that
    /// cannot be read.
    pub fn parse(&self, cell: Option<&str>) -> Option<Value> {
        let Some(raw) = cell else {
            return Some(Value::Null);
        };
        match self {
            ColumnKind::Text => Some(Value::Text(raw.to_string())),
            ColumnKind::Boolean => parse_bool(raw).map(Value::Bool),
            ColumnKind::Integer => parse_int(raw).map(Value::Int),
            ColumnKind::Numeric(_) => {
                let s = raw.trim();
                match s.parse::<f64>() {
                    Ok(f) if f.is_finite() => Some(Value::Numeric(s.to_string())),
                    _ => None,
                }
            }
            ColumnKind::Date => parse_date(raw).ok().map(Value::Date),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" | "1.0" => Some(true),
        "false" | "f" | "no" | "n" | "0" | "0.0" => Some(false),
        _ => None,
    }
}

fn parse_int(raw: &str) -> Option<i64> {
    let s = raw.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(i);
    }
    // integer columns with gaps are often exported as floats ("3.0")
    match s.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Some(f as i64),
        _ => None,
    }
}

/// A cell read as its column's kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Bool(bool),
    Int(i64),
    /// Kept as validated decimal text so no precision is lost.
    Numeric(String),
    Date(NaiveDate),
}

impl Value {
    /// Canonical text form bound as a statement parameter; `None` binds NULL.
    pub fn to_param(&self) -> Option<String> {
        match self {
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Text(s) | Value::Numeric(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Date(d) => write!(f, "{}", d.format(TOKEN_FORMAT)),
        }
    }
}

/// A single target column definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: &str, kind: ColumnKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            nullable: true,
        }
    }

    pub fn required(name: &str, kind: ColumnKind) -> Self {
        Self {
            nullable: false,
            ..Self::new(name, kind)
        }
    }
}
