use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::{FromSql, Kind, ToSql, Type};
use tokio_postgres::{Client, NoTls, Row, Statement};

use crate::config::PersistenceConfig;
use crate::error::{DriverError, DriverResult, ErrorInfo, PersistenceError, Result};
use crate::traits::{DatabaseDriver, DriverStatement};
use crate::types::{Param, ParamType, RawQueryResult, SqlValue};

/// PostgreSQL driver implementation using tokio-postgres.
///
/// Statements use `$n` placeholders and are bound by position.
pub struct TokioPostgresDriver {
    client: Arc<Client>,
}

impl TokioPostgresDriver {
    /// Connect to a PostgreSQL database.
    pub async fn connect(config: &PersistenceConfig) -> Result<Self> {
        let mut pg_config: tokio_postgres::Config = config
            .database_url
            .parse()
            .map_err(|e: tokio_postgres::Error| PersistenceError::Config(e.to_string()))?;
        pg_config.connect_timeout(config.connect_timeout);

        let (client, connection) = pg_config
            .connect(NoTls)
            .await
            .map_err(|e| PersistenceError::ConnectionFailed(e.to_string()))?;

        // Spawn the connection handler
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "PostgreSQL connection error");
            }
        });

        Ok(Self {
            client: Arc::new(client),
        })
    }
}

#[async_trait]
impl DatabaseDriver for TokioPostgresDriver {
    async fn prepare(&self, sql: &str) -> DriverResult<Box<dyn DriverStatement>> {
        let statement = self.client.prepare(sql).await.map_err(driver_error)?;
        Ok(Box::new(PostgresStatement {
            client: Arc::clone(&self.client),
            params: vec![None; statement.params().len()],
            statement,
            cursor: None,
            last_error: None,
        }))
    }

    async fn last_insert_id(&self) -> DriverResult<i64> {
        let result = self.client.query_one("SELECT lastval()", &[]).await;
        match result {
            Ok(row) => row.try_get::<_, i64>(0).map_err(driver_error),
            // lastval() is undefined until a sequence is used in this session
            Err(e) if e.code() == Some(&SqlState::OBJECT_NOT_IN_PREREQUISITE_STATE) => Ok(0),
            Err(e) => Err(driver_error(e)),
        }
    }
}

struct PostgresStatement {
    client: Arc<Client>,
    statement: Statement,
    params: Vec<Option<SqlValue>>,
    cursor: Option<Vec<Row>>,
    last_error: Option<DriverError>,
}

impl PostgresStatement {
    fn fail(&mut self, error: DriverError) -> DriverError {
        self.last_error = Some(error.clone());
        error
    }
}

#[async_trait]
impl DriverStatement for PostgresStatement {
    fn bind_value(&mut self, param: &Param, value: SqlValue, param_type: ParamType) -> DriverResult<()> {
        let index = match param {
            Param::Positional(index) if *index >= 1 && *index <= self.params.len() => index - 1,
            _ => {
                return Err(self.fail(invalid_parameter(format!(
                    "parameter {} was not defined",
                    param
                ))))
            }
        };
        let value = param_type.coerce(value).map_err(|err| self.fail(err))?;
        self.params[index] = Some(value);
        self.last_error = None;
        Ok(())
    }

    async fn execute(&mut self) -> DriverResult<bool> {
        self.cursor = None;

        if let Some(missing) = self.params.iter().position(Option::is_none) {
            return Err(self.fail(invalid_parameter(format!(
                "parameter {} was not bound",
                missing + 1
            ))));
        }

        // Convert SqlValue params to tokio-postgres compatible types
        let converted: DriverResult<Vec<Box<dyn ToSql + Sync + Send>>> = self
            .params
            .iter()
            .flatten()
            .zip(self.statement.params())
            .map(|(value, ty)| sql_value_to_tosql(value, ty))
            .collect();
        let converted_params = converted.map_err(|err| self.fail(err))?;

        let param_refs: Vec<&(dyn ToSql + Sync)> = converted_params
            .iter()
            .map(|b| b.as_ref() as &(dyn ToSql + Sync))
            .collect();

        let result = self.client.query(&self.statement, &param_refs).await;
        match result {
            Ok(rows) => {
                self.cursor = Some(rows);
                self.last_error = None;
                Ok(true)
            }
            Err(e) => Err(self.fail(driver_error(e))),
        }
    }

    fn error_info(&self) -> ErrorInfo {
        self.last_error
            .as_ref()
            .map(ErrorInfo::from)
            .unwrap_or_else(ErrorInfo::ok)
    }

    async fn fetch_all(&mut self) -> DriverResult<RawQueryResult> {
        let Some(rows) = self.cursor.take() else {
            return Ok(RawQueryResult::empty());
        };

        let columns: Vec<String> = self
            .statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let values: DriverResult<Vec<Vec<SqlValue>>> = rows
            .iter()
            .map(|row| {
                row.columns()
                    .iter()
                    .enumerate()
                    .map(|(i, col)| row_value(row, i, col.name(), col.type_()))
                    .collect()
            })
            .collect();

        let values = values.map_err(|err| self.fail(err))?;
        Ok(RawQueryResult::new(columns, values))
    }

    async fn close_cursor(&mut self) {
        self.cursor = None;
    }
}

fn driver_error(e: tokio_postgres::Error) -> DriverError {
    let message = e
        .as_db_error()
        .map(|db| db.message().to_string())
        .unwrap_or_else(|| e.to_string());
    let sqlstate = e.code().map(|state| state.code().to_string());
    let code = sqlstate
        .as_deref()
        .and_then(|state| state.parse::<i64>().ok())
        .unwrap_or(0);

    DriverError {
        message,
        code,
        sqlstate,
    }
}

fn invalid_parameter(detail: String) -> DriverError {
    DriverError::new(format!("Invalid parameter number: {}", detail), 0).with_sqlstate("HY093")
}

/// Convert a SqlValue to a boxed ToSql trait object matching the parameter type.
fn sql_value_to_tosql(value: &SqlValue, ty: &Type) -> DriverResult<Box<dyn ToSql + Sync + Send>> {
    let value = value.clone();
    let converted: Box<dyn ToSql + Sync + Send> = match *ty {
        Type::BOOL => match ParamType::Bool.coerce(value)? {
            SqlValue::Bool(b) => Box::new(Some(b)),
            _ => Box::new(None::<bool>),
        },
        Type::INT2 => Box::new(
            int_param(value)?
                .map(i16::try_from)
                .transpose()
                .map_err(|_| out_of_range(ty))?,
        ),
        Type::INT4 => Box::new(
            int_param(value)?
                .map(i32::try_from)
                .transpose()
                .map_err(|_| out_of_range(ty))?,
        ),
        Type::INT8 => Box::new(int_param(value)?),
        Type::FLOAT4 => Box::new(float_param(value)?.map(|f| f as f32)),
        Type::FLOAT8 => Box::new(float_param(value)?),
        Type::BYTEA => match ParamType::Lob.coerce(value)? {
            SqlValue::Binary(bytes) => Box::new(Some(bytes)),
            _ => Box::new(None::<Vec<u8>>),
        },
        _ => match ParamType::Str.coerce(value)? {
            SqlValue::Text(s) => Box::new(Some(s)),
            _ => Box::new(None::<String>),
        },
    };
    Ok(converted)
}

fn int_param(value: SqlValue) -> DriverResult<Option<i64>> {
    match ParamType::Int.coerce(value)? {
        SqlValue::Int64(i) => Ok(Some(i)),
        _ => Ok(None),
    }
}

fn float_param(value: SqlValue) -> DriverResult<Option<f64>> {
    match value {
        SqlValue::Null => Ok(None),
        SqlValue::Float(f) => Ok(Some(f)),
        SqlValue::Int32(i) => Ok(Some(f64::from(i))),
        SqlValue::Int64(i) => Ok(Some(i as f64)),
        SqlValue::Text(s) => s.trim().parse::<f64>().map(Some).map_err(|_| {
            DriverError::new(format!("'{}' cannot be bound as a float", s), 0).with_sqlstate("HY105")
        }),
        other => Err(DriverError::new(format!("{:?} cannot be bound as a float", other), 0)
            .with_sqlstate("HY105")),
    }
}

fn out_of_range(ty: &Type) -> DriverError {
    DriverError::new(format!("Numeric value out of range for {}", ty), 0).with_sqlstate("22003")
}

type DecodeError = Box<dyn Error + Sync + Send>;

/// A column's undecoded binary value; accepts every type.
struct RawColumn<'a>(Option<&'a [u8]>);

impl<'a> FromSql<'a> for RawColumn<'a> {
    fn from_sql(_: &Type, raw: &'a [u8]) -> std::result::Result<Self, DecodeError> {
        Ok(RawColumn(Some(raw)))
    }

    fn from_sql_null(_: &Type) -> std::result::Result<Self, DecodeError> {
        Ok(RawColumn(None))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

/// Decode the value at `index` according to its column type.
fn row_value(row: &Row, index: usize, name: &str, ty: &Type) -> DriverResult<SqlValue> {
    let raw = row.try_get::<_, RawColumn>(index).map_err(driver_error)?;
    decode_named(name, ty, raw.0)
}

fn decode_named(name: &str, ty: &Type, raw: Option<&[u8]>) -> DriverResult<SqlValue> {
    decode_column(ty, raw).map_err(|e| {
        DriverError::new(
            format!("Cannot decode column '{}' of type {}: {}", name, ty, e),
            0,
        )
        .with_sqlstate("22000")
    })
}

/// Numbers keep their numeric variant; dates, times, numerics, uuids and
/// json come back as their text representation.
fn decode_column(ty: &Type, raw: Option<&[u8]>) -> std::result::Result<SqlValue, DecodeError> {
    let value: SqlValue = match *ty {
        Type::BOOL => Option::<bool>::from_sql_nullable(ty, raw)?.into(),
        Type::CHAR => Option::<i8>::from_sql_nullable(ty, raw)?
            .map(i32::from)
            .into(),
        Type::INT2 => Option::<i16>::from_sql_nullable(ty, raw)?
            .map(i32::from)
            .into(),
        Type::INT4 => Option::<i32>::from_sql_nullable(ty, raw)?.into(),
        Type::INT8 => Option::<i64>::from_sql_nullable(ty, raw)?.into(),
        Type::OID => Option::<u32>::from_sql_nullable(ty, raw)?
            .map(i64::from)
            .into(),
        Type::FLOAT4 => Option::<f32>::from_sql_nullable(ty, raw)?
            .map(f64::from)
            .into(),
        Type::FLOAT8 => Option::<f64>::from_sql_nullable(ty, raw)?.into(),
        Type::BYTEA => Option::<Vec<u8>>::from_sql_nullable(ty, raw)?.into(),
        Type::NUMERIC => raw.map(decode_numeric).transpose()?.into(),
        Type::DATE => Option::<chrono::NaiveDate>::from_sql_nullable(ty, raw)?
            .map(|v| v.to_string())
            .into(),
        Type::TIME => Option::<chrono::NaiveTime>::from_sql_nullable(ty, raw)?
            .map(|v| v.to_string())
            .into(),
        Type::TIMESTAMP => Option::<chrono::NaiveDateTime>::from_sql_nullable(ty, raw)?
            .map(|v| v.to_string())
            .into(),
        Type::TIMESTAMPTZ => Option::<chrono::DateTime<chrono::Utc>>::from_sql_nullable(ty, raw)?
            .map(|v| v.to_rfc3339())
            .into(),
        Type::UUID => Option::<uuid::Uuid>::from_sql_nullable(ty, raw)?
            .map(|v| v.to_string())
            .into(),
        Type::JSON | Type::JSONB => Option::<serde_json::Value>::from_sql_nullable(ty, raw)?
            .map(|v| v.to_string())
            .into(),
        _ if <String as FromSql>::accepts(ty) => Option::<String>::from_sql_nullable(ty, raw)?.into(),
        // Enum labels travel as plain text
        _ if matches!(ty.kind(), Kind::Enum(_)) => raw
            .map(std::str::from_utf8)
            .transpose()?
            .map(str::to_string)
            .into(),
        _ => return Err(format!("unsupported column type {}", ty).into()),
    };
    Ok(value)
}

/// Renders the binary NUMERIC format (base-10000 digit groups) as text.
fn decode_numeric(raw: &[u8]) -> std::result::Result<String, DecodeError> {
    let ndigits = usize::from(read_u16(raw, 0)?);
    let weight = i32::from(read_u16(raw, 2)? as i16);
    let sign = read_u16(raw, 4)?;
    let dscale = usize::from(read_u16(raw, 6)?);

    match sign {
        0xC000 => return Ok("NaN".to_string()),
        0xD000 => return Ok("Infinity".to_string()),
        0xF000 => return Ok("-Infinity".to_string()),
        _ => {}
    }

    let digits = (0..ndigits)
        .map(|i| read_u16(raw, 8 + 2 * i))
        .collect::<std::result::Result<Vec<u16>, _>>()?;
    let digit = |group: i32| -> u16 {
        usize::try_from(group)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };

    let mut text = String::new();
    if sign == 0x4000 {
        text.push('-');
    }

    if weight < 0 {
        text.push('0');
    } else {
        text.push_str(&digit(0).to_string());
        for group in 1..=weight {
            text.push_str(&format!("{:04}", digit(group)));
        }
    }

    if dscale > 0 {
        let mut fraction = String::new();
        let mut group = weight + 1;
        while fraction.len() < dscale {
            fraction.push_str(&format!("{:04}", digit(group)));
            group += 1;
        }
        fraction.truncate(dscale);
        text.push('.');
        text.push_str(&fraction);
    }

    Ok(text)
}

fn read_u16(raw: &[u8], offset: usize) -> std::result::Result<u16, DecodeError> {
    raw.get(offset..offset + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| "truncated numeric value".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric(weight: i16, sign: u16, dscale: u16, digits: &[u16]) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&(digits.len() as u16).to_be_bytes());
        raw.extend_from_slice(&weight.to_be_bytes());
        raw.extend_from_slice(&sign.to_be_bytes());
        raw.extend_from_slice(&dscale.to_be_bytes());
        for d in digits {
            raw.extend_from_slice(&d.to_be_bytes());
        }
        raw
    }

    fn debug(value: DriverResult<Box<dyn ToSql + Sync + Send>>) -> String {
        format!("{:?}", value.unwrap())
    }

    #[test]
    fn test_to_sql_follows_parameter_type() {
        assert_eq!(debug(sql_value_to_tosql(&SqlValue::Int64(5), &Type::INT4)), "Some(5)");
        assert_eq!(debug(sql_value_to_tosql(&"7".into(), &Type::INT8)), "Some(7)");
        assert_eq!(debug(sql_value_to_tosql(&SqlValue::Null, &Type::INT4)), "None");
        assert_eq!(debug(sql_value_to_tosql(&"1.5".into(), &Type::FLOAT4)), "Some(1.5)");
        assert_eq!(debug(sql_value_to_tosql(&SqlValue::Int32(1), &Type::BOOL)), "Some(true)");
        assert_eq!(debug(sql_value_to_tosql(&SqlValue::Int32(7), &Type::TEXT)), "Some(\"7\")");
        assert_eq!(debug(sql_value_to_tosql(&"ab".into(), &Type::BYTEA)), "Some([97, 98])");
    }

    #[test]
    fn test_to_sql_rejects_narrowing_overflow() {
        let err = sql_value_to_tosql(&SqlValue::Int64(70_000), &Type::INT2).err().unwrap();
        assert_eq!(err.sqlstate.as_deref(), Some("22003"));
        assert!(err.message.contains("int2"));

        let err = sql_value_to_tosql(&SqlValue::Int64(i64::from(i32::MAX) + 1), &Type::INT4)
            .err()
            .unwrap();
        assert_eq!(err.sqlstate.as_deref(), Some("22003"));
        assert!(sql_value_to_tosql(&SqlValue::Int64(i64::from(i32::MAX)), &Type::INT4).is_ok());
    }

    #[test]
    fn test_int_and_float_params() {
        assert_eq!(int_param(SqlValue::Null).unwrap(), None);
        assert_eq!(int_param(" 12 ".into()).unwrap(), Some(12));
        assert!(int_param("twelve".into()).is_err());

        assert_eq!(float_param(SqlValue::Int32(2)).unwrap(), Some(2.0));
        assert_eq!(float_param("0.25".into()).unwrap(), Some(0.25));
        assert_eq!(float_param(SqlValue::Null).unwrap(), None);
        let err = float_param(SqlValue::Bool(true)).unwrap_err();
        assert_eq!(err.sqlstate.as_deref(), Some("HY105"));
    }

    #[test]
    fn test_decode_scalar_columns() {
        assert_eq!(decode_column(&Type::BOOL, Some(&[1u8][..])).unwrap(), SqlValue::Bool(true));
        assert_eq!(decode_column(&Type::BOOL, None).unwrap(), SqlValue::Null);
        assert_eq!(
            decode_column(&Type::INT2, Some(&(-3i16).to_be_bytes()[..])).unwrap(),
            SqlValue::Int32(-3)
        );
        assert_eq!(
            decode_column(&Type::INT4, Some(&5i32.to_be_bytes()[..])).unwrap(),
            SqlValue::Int32(5)
        );
        assert_eq!(
            decode_column(&Type::OID, Some(&7u32.to_be_bytes()[..])).unwrap(),
            SqlValue::Int64(7)
        );
        assert_eq!(
            decode_column(&Type::FLOAT8, Some(&0.5f64.to_be_bytes()[..])).unwrap(),
            SqlValue::Float(0.5)
        );
        assert_eq!(
            decode_column(&Type::VARCHAR, Some(&b"hi"[..])).unwrap(),
            SqlValue::from("hi")
        );
    }

    #[test]
    fn test_decode_temporal_uuid_and_json_as_text() {
        // Dates count from 2000-01-01
        assert_eq!(
            decode_column(&Type::DATE, Some(&1i32.to_be_bytes()[..])).unwrap(),
            SqlValue::from("2000-01-02")
        );
        assert_eq!(
            decode_column(&Type::TIMESTAMP, Some(&0i64.to_be_bytes()[..])).unwrap(),
            SqlValue::from("2000-01-01 00:00:00")
        );
        assert_eq!(
            decode_column(&Type::TIMESTAMPTZ, Some(&0i64.to_be_bytes()[..])).unwrap(),
            SqlValue::from("2000-01-01T00:00:00+00:00")
        );

        let id = [
            0x67, 0xe5, 0x50, 0x44, 0x10, 0xb1, 0x42, 0x6f, 0x92, 0x47, 0xbb, 0x68, 0x0e, 0x5f,
            0xe0, 0xc8,
        ];
        assert_eq!(
            decode_column(&Type::UUID, Some(&id[..])).unwrap(),
            SqlValue::from("67e55044-10b1-426f-9247-bb680e5fe0c8")
        );

        let mut jsonb = vec![1u8];
        jsonb.extend_from_slice(br#"{"a":1}"#);
        assert_eq!(
            decode_column(&Type::JSONB, Some(jsonb.as_slice())).unwrap(),
            SqlValue::from(r#"{"a":1}"#)
        );
    }

    #[test]
    fn test_decode_numeric() {
        let value = numeric(0, 0x0000, 2, &[123, 4500]);
        assert_eq!(decode_column(&Type::NUMERIC, Some(value.as_slice())).unwrap(), SqlValue::from("123.45"));

        assert_eq!(decode_numeric(&numeric(-1, 0x4000, 3, &[10])).unwrap(), "-0.001");
        assert_eq!(decode_numeric(&numeric(-2, 0x0000, 5, &[1000])).unwrap(), "0.00001");
        assert_eq!(decode_numeric(&numeric(1, 0x0000, 0, &[1])).unwrap(), "10000");
        assert_eq!(decode_numeric(&numeric(0, 0x0000, 0, &[])).unwrap(), "0");
        assert_eq!(decode_numeric(&numeric(0, 0xC000, 0, &[])).unwrap(), "NaN");
        assert!(decode_numeric(&[0, 1]).is_err());
    }

    #[test]
    fn test_decode_enum_label() {
        let mood = Type::new(
            "mood".to_string(),
            90_001,
            Kind::Enum(vec!["sad".to_string(), "happy".to_string()]),
            "public".to_string(),
        );
        assert_eq!(decode_column(&mood, Some(&b"happy"[..])).unwrap(), SqlValue::from("happy"));
    }

    #[test]
    fn test_unsupported_type_names_the_column() {
        let err = decode_named("location", &Type::POINT, Some(&[0u8; 16][..])).unwrap_err();
        assert_eq!(err.sqlstate.as_deref(), Some("22000"));
        assert!(err.message.contains("'location'"));
        assert!(err.message.contains("point"));
    }
}
