use crate::error::{DriverError, DriverResult};

/// Represents a SQL value in a driver-agnostic way.
/// Drivers are responsible for converting these to their native types.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Text(String),
    Int32(i32),
    Int64(i64),
    Float(f64),
    Bool(bool),
    Binary(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int32(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int64(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        SqlValue::Binary(value)
    }
}

impl From<&[u8]> for SqlValue {
    fn from(value: &[u8]) -> Self {
        SqlValue::Binary(value.to_vec())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => SqlValue::Null,
        }
    }
}

/// Type tag passed along with a bound value.
/// Mirrors the parameter type enumeration of the underlying driver family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamType {
    #[default]
    Str,
    Int,
    Bool,
    Null,
    Lob,
}

impl ParamType {
    /// Converts `value` to the representation this tag asks for.
    pub fn coerce(self, value: SqlValue) -> DriverResult<SqlValue> {
        match (self, value) {
            (ParamType::Null, _) => Ok(SqlValue::Null),
            (_, SqlValue::Null) => Ok(SqlValue::Null),

            (ParamType::Str, SqlValue::Text(s)) => Ok(SqlValue::Text(s)),
            (ParamType::Str, SqlValue::Int32(i)) => Ok(SqlValue::Text(i.to_string())),
            (ParamType::Str, SqlValue::Int64(i)) => Ok(SqlValue::Text(i.to_string())),
            (ParamType::Str, SqlValue::Float(f)) => Ok(SqlValue::Text(f.to_string())),
            (ParamType::Str, SqlValue::Bool(b)) => Ok(SqlValue::Text(if b { "1" } else { "" }.to_string())),
            (ParamType::Str, SqlValue::Binary(bytes)) => String::from_utf8(bytes)
                .map(SqlValue::Text)
                .map_err(|_| invalid_type("binary value is not valid UTF-8 text")),

            (ParamType::Int, SqlValue::Int32(i)) => Ok(SqlValue::Int64(i64::from(i))),
            (ParamType::Int, SqlValue::Int64(i)) => Ok(SqlValue::Int64(i)),
            (ParamType::Int, SqlValue::Bool(b)) => Ok(SqlValue::Int64(i64::from(b))),
            (ParamType::Int, SqlValue::Float(f)) if f.fract() == 0.0 => {
                // i64::MAX as f64 rounds up to 2^63, which is already out of range
                if f >= i64::MIN as f64 && f < i64::MAX as f64 {
                    Ok(SqlValue::Int64(f as i64))
                } else {
                    Err(DriverError::new(format!("Numeric value out of range: {}", f), 0)
                        .with_sqlstate("22003"))
                }
            }
            (ParamType::Int, SqlValue::Text(s)) => s
                .trim()
                .parse::<i64>()
                .map(SqlValue::Int64)
                .map_err(|_| invalid_type(&format!("'{}' cannot be bound as an integer", s))),
            (ParamType::Int, other) => Err(invalid_type(&format!(
                "{:?} cannot be bound as an integer",
                other
            ))),

            (ParamType::Bool, SqlValue::Bool(b)) => Ok(SqlValue::Bool(b)),
            (ParamType::Bool, SqlValue::Int32(i)) => Ok(SqlValue::Bool(i != 0)),
            (ParamType::Bool, SqlValue::Int64(i)) => Ok(SqlValue::Bool(i != 0)),
            (ParamType::Bool, SqlValue::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "t" | "yes" | "on" => Ok(SqlValue::Bool(true)),
                "" | "0" | "false" | "f" | "no" | "off" => Ok(SqlValue::Bool(false)),
                _ => Err(invalid_type(&format!("'{}' cannot be bound as a boolean", s))),
            },
            (ParamType::Bool, other) => Err(invalid_type(&format!(
                "{:?} cannot be bound as a boolean",
                other
            ))),

            (ParamType::Lob, SqlValue::Binary(bytes)) => Ok(SqlValue::Binary(bytes)),
            (ParamType::Lob, SqlValue::Text(s)) => Ok(SqlValue::Binary(s.into_bytes())),
            (ParamType::Lob, other) => Err(invalid_type(&format!(
                "{:?} cannot be bound as a binary value",
                other
            ))),
        }
    }
}

fn invalid_type(message: &str) -> DriverError {
    DriverError::new(format!("Invalid parameter type: {}", message), 0).with_sqlstate("HY105")
}
