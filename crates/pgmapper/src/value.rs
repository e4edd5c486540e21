//! Dynamic values crossing the mapper boundary.
//!
//! Entities are built at runtime, so rows cannot be decoded into Rust structs.
//! Inputs and outputs are [`Record`]s (JSON objects). Two adapters connect them
//! with the driver:
//!
//! - [`JsonParam`] binds a JSON value to a placeholder, converting it to the
//!   parameter type Postgres inferred for that placeholder.
//! - [`DynValue`] decodes any supported column into JSON.
//!
//! Conversions: timestamps are RFC 3339 strings, `uuid` is a string, `json`/
//! `jsonb` is nested JSON, arrays are JSON arrays, `bytea` is an array of
//! bytes, enums and text types are strings. `numeric` goes through
//! `rust_decimal` and is rendered as a string to keep its precision. `real`
//! is decoded through its shortest `f32` form, so `0.1` reads back as `0.1`.

use crate::error::{MapperError, MapperResult};
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};
use std::error::Error;
use std::str::FromStr;
use tokio_postgres::types::{FromSql, IsNull, Json, Kind, ToSql, Type};

type BoxError = Box<dyn Error + Sync + Send>;

/// One row, keyed by column (storage) or field (external) name.
pub type Record = Map<String, Value>;

/// Turn a JSON object into a [`Record`].
pub fn record(value: Value) -> MapperResult<Record> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(MapperError::validation(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// A primary key value that identifies no row: `null` or `""`.
pub(crate) fn is_blank_key(value: &Value) -> bool {
    value.is_null() || value.as_str() == Some("")
}

/// Whether `ty` is stored as UTF-8 text on the wire.
pub(crate) fn is_text_type(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN
    ) || matches!(ty.name(), "citext" | "ltree" | "lquery" | "ltxtquery")
        || matches!(ty.kind(), Kind::Enum(_))
}

/// A JSON value bound as a statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonParam(pub Value);

impl ToSql for JsonParam {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        encode(&self.0, ty, out)
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

fn encode(value: &Value, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if value.is_null() {
        return Ok(IsNull::Yes);
    }

    match ty.kind() {
        Kind::Array(_) => {
            let Value::Array(items) = value else {
                return Err(format!("expected a JSON array for parameter of type {ty}").into());
            };
            let items: Vec<JsonParam> = items.iter().cloned().map(JsonParam).collect();
            return items.to_sql(ty, out);
        }
        Kind::Domain(inner) => return encode(value, inner, out),
        _ => {}
    }

    if is_text_type(ty) {
        out.extend_from_slice(as_text(value).as_bytes());
        return Ok(IsNull::No);
    }

    match *ty {
        Type::BOOL => as_bool(value)?.to_sql(ty, out),
        Type::INT2 => i16::try_from(as_i64(value)?)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(as_i64(value)?)?.to_sql(ty, out),
        Type::INT8 => as_i64(value)?.to_sql(ty, out),
        Type::OID => u32::try_from(as_i64(value)?)?.to_sql(ty, out),
        Type::FLOAT4 => (as_f64(value)? as f32).to_sql(ty, out),
        Type::FLOAT8 => as_f64(value)?.to_sql(ty, out),
        Type::NUMERIC => as_decimal(value)?.to_sql(ty, out),
        Type::UUID => uuid::Uuid::parse_str(&as_text(value))?.to_sql(ty, out),
        Type::TIMESTAMPTZ => parse_timestamptz(&as_text(value))?.to_sql(ty, out),
        Type::TIMESTAMP => parse_timestamp(&as_text(value))?.to_sql(ty, out),
        Type::DATE => NaiveDate::parse_from_str(&as_text(value), "%Y-%m-%d")?.to_sql(ty, out),
        Type::TIME => NaiveTime::parse_from_str(&as_text(value), "%H:%M:%S%.f")?.to_sql(ty, out),
        Type::JSON | Type::JSONB => Json(value).to_sql(ty, out),
        Type::BYTEA => as_bytes(value)?.to_sql(ty, out),
        _ => Err(format!("cannot bind JSON value to parameter of type {ty}").into()),
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_bool(value: &Value) -> Result<bool, BoxError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64() != Some(0.0)),
        Value::String(s) => match s.trim() {
            "true" | "t" | "1" => Ok(true),
            "false" | "f" | "0" => Ok(false),
            other => Err(format!("invalid boolean '{other}'").into()),
        },
        other => Err(format!("cannot convert {other} to boolean").into()),
    }
}

fn as_i64(value: &Value) -> Result<i64, BoxError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| format!("{n} is not an integer").into()),
        Value::String(s) => Ok(s.trim().parse::<i64>()?),
        Value::Bool(b) => Ok(i64::from(*b)),
        other => Err(format!("cannot convert {other} to integer").into()),
    }
}

fn as_f64(value: &Value) -> Result<f64, BoxError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("{n} is not representable as float").into()),
        Value::String(s) => Ok(s.trim().parse::<f64>()?),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        other => Err(format!("cannot convert {other} to float").into()),
    }
}

fn as_decimal(value: &Value) -> Result<Decimal, BoxError> {
    let text = as_text(value);
    let text = text.trim();
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|e| format!("invalid numeric '{text}': {e}").into())
}

fn as_bytes(value: &Value) -> Result<Vec<u8>, BoxError> {
    match value {
        Value::String(s) => Ok(s.as_bytes().to_vec()),
        Value::Array(items) => items
            .iter()
            .map(|v| {
                v.as_u64()
                    .and_then(|b| u8::try_from(b).ok())
                    .ok_or_else(|| BoxError::from(format!("invalid byte {v}")))
            })
            .collect(),
        other => Err(format!("cannot convert {other} to bytea").into()),
    }
}

fn parse_timestamptz(s: &str) -> Result<DateTime<Utc>, BoxError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    Ok(parse_timestamp(s)?.and_utc())
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime, BoxError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .map_err(|e| format!("invalid timestamp '{s}': {e}").into())
}

/// Format a timestamp the way decoded `timestamptz` columns are rendered.
pub(crate) fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

fn float_value(v: f64) -> Value {
    Number::from_f64(v).map_or(Value::Null, Value::Number)
}

/// A column value decoded into JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct DynValue(pub Value);

impl<'a> FromSql<'a> for DynValue {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        match ty.kind() {
            Kind::Array(_) => {
                let items = Vec::<Option<DynValue>>::from_sql(ty, raw)?;
                let items = items
                    .into_iter()
                    .map(|v| v.map_or(Value::Null, |d| d.0))
                    .collect();
                return Ok(DynValue(Value::Array(items)));
            }
            Kind::Domain(inner) => return DynValue::from_sql(inner, raw),
            _ => {}
        }

        if is_text_type(ty) {
            return Ok(DynValue(Value::String(std::str::from_utf8(raw)?.to_string())));
        }

        let value = match *ty {
            Type::BOOL => Value::Bool(bool::from_sql(ty, raw)?),
            Type::INT2 => Value::from(i16::from_sql(ty, raw)?),
            Type::INT4 => Value::from(i32::from_sql(ty, raw)?),
            Type::INT8 => Value::from(i64::from_sql(ty, raw)?),
            Type::OID => Value::from(u32::from_sql(ty, raw)?),
            Type::FLOAT4 => float_value(f32::from_sql(ty, raw)?.to_string().parse()?),
            Type::FLOAT8 => float_value(f64::from_sql(ty, raw)?),
            Type::NUMERIC => Value::String(Decimal::from_sql(ty, raw)?.to_string()),
            Type::UUID => Value::String(uuid::Uuid::from_sql(ty, raw)?.to_string()),
            Type::TIMESTAMPTZ => Value::String(format_timestamp(DateTime::<Utc>::from_sql(ty, raw)?)),
            Type::TIMESTAMP => Value::String(
                NaiveDateTime::from_sql(ty, raw)?
                    .format("%Y-%m-%dT%H:%M:%S%.f")
                    .to_string(),
            ),
            Type::DATE => Value::String(NaiveDate::from_sql(ty, raw)?.to_string()),
            Type::TIME => Value::String(NaiveTime::from_sql(ty, raw)?.to_string()),
            Type::JSON | Type::JSONB => Value::from_sql(ty, raw)?,
            Type::BYTEA => Value::from(<&[u8]>::from_sql(ty, raw)?.to_vec()),
            _ => return Err(format!("unsupported column type {ty}").into()),
        };
        Ok(DynValue(value))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encoded(value: Value, ty: &Type) -> Result<(IsNull, BytesMut), BoxError> {
        let mut out = BytesMut::new();
        let is_null = JsonParam(value).to_sql(ty, &mut out)?;
        Ok((is_null, out))
    }

    #[test]
    fn null_binds_as_sql_null() {
        let (is_null, out) = encoded(Value::Null, &Type::INT4).unwrap();
        assert!(matches!(is_null, IsNull::Yes));
        assert!(out.is_empty());
    }

    #[test]
    fn integer_accepts_numeric_strings() {
        let (_, out) = encoded(json!("42"), &Type::INT8).unwrap();
        assert_eq!(&out[..], &42_i64.to_be_bytes());

        let (_, out) = encoded(json!(7), &Type::INT4).unwrap();
        assert_eq!(&out[..], &7_i32.to_be_bytes());
    }

    #[test]
    fn integer_rejects_garbage_and_overflow() {
        assert!(encoded(json!("abc"), &Type::INT4).is_err());
        assert!(encoded(json!(1.5), &Type::INT4).is_err());
        assert!(encoded(json!(70000), &Type::INT2).is_err());
    }

    #[test]
    fn text_renders_scalars() {
        let (_, out) = encoded(json!("Home"), &Type::VARCHAR).unwrap();
        assert_eq!(&out[..], b"Home");

        let (_, out) = encoded(json!(12), &Type::TEXT).unwrap();
        assert_eq!(&out[..], b"12");
    }

    #[test]
    fn uuid_from_string() {
        let id = "6f9619ff-8b86-d011-b42d-00cf4fc964ff";
        let (_, out) = encoded(json!(id), &Type::UUID).unwrap();
        assert_eq!(&out[..], uuid::Uuid::parse_str(id).unwrap().as_bytes());
        assert!(encoded(json!("not-a-uuid"), &Type::UUID).is_err());
    }

    #[test]
    fn timestamps_parse_rfc3339_and_plain_forms() {
        assert!(encoded(json!("2024-05-01T10:00:00Z"), &Type::TIMESTAMPTZ).is_ok());
        assert!(encoded(json!("2024-05-01T10:00:00.123+02:00"), &Type::TIMESTAMP).is_ok());
        assert!(encoded(json!("2024-05-01 10:00:00"), &Type::TIMESTAMPTZ).is_ok());
        assert!(encoded(json!("yesterday"), &Type::TIMESTAMPTZ).is_err());
    }

    #[test]
    fn bool_from_various_forms() {
        let (_, out) = encoded(json!("t"), &Type::BOOL).unwrap();
        assert_eq!(&out[..], &[1]);
        let (_, out) = encoded(json!(false), &Type::BOOL).unwrap();
        assert_eq!(&out[..], &[0]);
        assert!(encoded(json!("maybe"), &Type::BOOL).is_err());
    }

    #[test]
    fn decodes_scalars_to_json() {
        let raw = 5_i32.to_be_bytes();
        assert_eq!(DynValue::from_sql(&Type::INT4, &raw).unwrap().0, json!(5));

        assert_eq!(
            DynValue::from_sql(&Type::TEXT, b"hello").unwrap().0,
            json!("hello")
        );

        assert_eq!(DynValue::from_sql(&Type::BOOL, &[1]).unwrap().0, json!(true));

        let id = uuid::Uuid::new_v4();
        assert_eq!(
            DynValue::from_sql(&Type::UUID, id.as_bytes()).unwrap().0,
            json!(id.to_string())
        );
    }

    #[test]
    fn numeric_keeps_its_scale() {
        let (_, out) = encoded(json!("12.50"), &Type::NUMERIC).unwrap();
        assert_eq!(
            DynValue::from_sql(&Type::NUMERIC, &out).unwrap().0,
            json!("12.50")
        );

        let (_, out) = encoded(json!(3.25), &Type::NUMERIC).unwrap();
        assert_eq!(
            DynValue::from_sql(&Type::NUMERIC, &out).unwrap().0,
            json!("3.25")
        );

        let (_, out) = encoded(json!("1e-3"), &Type::NUMERIC).unwrap();
        assert_eq!(
            DynValue::from_sql(&Type::NUMERIC, &out).unwrap().0,
            json!("0.001")
        );

        assert!(encoded(json!("twelve"), &Type::NUMERIC).is_err());
    }

    #[test]
    fn real_reads_back_as_written() {
        let raw = 0.1_f32.to_be_bytes();
        assert_eq!(DynValue::from_sql(&Type::FLOAT4, &raw).unwrap().0, json!(0.1));

        let (_, out) = encoded(json!(2.675), &Type::FLOAT4).unwrap();
        assert_eq!(DynValue::from_sql(&Type::FLOAT4, &out).unwrap().0, json!(2.675));
    }

    #[test]
    fn unsupported_column_type_is_an_error() {
        assert!(DynValue::from_sql(&Type::INET, &[2, 32, 0, 4, 127, 0, 0, 1]).is_err());
    }

    #[test]
    fn timestamp_format_is_utc_micros() {
        let dt = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_timestamp(dt), "2024-05-01T10:00:00.000000Z");
    }

    #[test]
    fn record_requires_an_object() {
        let r = record(json!({"a": 1})).unwrap();
        assert_eq!(r["a"], json!(1));
        assert!(record(json!([1])).unwrap_err().is_validation());
    }
}
