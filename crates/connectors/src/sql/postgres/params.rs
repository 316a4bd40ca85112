use crate::sql::error::DbError;
use bytes::BytesMut;
use chrono::NaiveTime;
use model::core::value::Value;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use std::error::Error;
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};

pub struct PgParam(Box<dyn ToSql + Sync + Send>);

/// SQL NULL that binds to a parameter of any type.
#[derive(Debug)]
struct PgNull;

impl ToSql for PgNull {
    fn to_sql(&self, _ty: &Type, _out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        Ok(IsNull::Yes)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

impl PgParam {
    /// Converts a value to the Rust type the prepared statement expects for
    /// this parameter, so integer columns of any width and numeric columns
    /// all accept normalized values.
    pub fn for_type(value: Value, ty: &Type) -> Result<Self, DbError> {
        let mismatch = |value: &Value| {
            DbError::Write(format!("cannot bind {value} to a {} parameter", ty.name()))
        };

        let param = match value {
            Value::Null => PgParam(Box::new(PgNull)),
            Value::Int(v) => match *ty {
                Type::INT2 => PgParam(Box::new(i16::try_from(v).map_err(|_| mismatch(&value))?)),
                Type::INT4 => PgParam(Box::new(i32::try_from(v).map_err(|_| mismatch(&value))?)),
                Type::NUMERIC => PgParam(Box::new(Decimal::from(v))),
                Type::FLOAT4 => PgParam(Box::new(v as f32)),
                Type::FLOAT8 => PgParam(Box::new(v as f64)),
                Type::TEXT | Type::VARCHAR | Type::BPCHAR => PgParam(Box::new(v.to_string())),
                Type::BOOL => PgParam(Box::new(v != 0)),
                _ => PgParam(Box::new(v)),
            },
            Value::Decimal(d) => match *ty {
                Type::INT2 | Type::INT4 | Type::INT8 => {
                    let int = d.round().to_i64().ok_or_else(|| mismatch(&value))?;
                    return PgParam::for_type(Value::Int(int), ty);
                }
                Type::FLOAT4 => PgParam(Box::new(d.to_f32().ok_or_else(|| mismatch(&value))?)),
                Type::FLOAT8 => PgParam(Box::new(d.to_f64().ok_or_else(|| mismatch(&value))?)),
                Type::TEXT | Type::VARCHAR | Type::BPCHAR => PgParam(Box::new(d.to_string())),
                _ => PgParam(Box::new(d)),
            },
            Value::String(s) => match *ty {
                Type::JSON | Type::JSONB => {
                    let json = serde_json::from_str::<serde_json::Value>(&s)
                        .unwrap_or(serde_json::Value::String(s));
                    PgParam(Box::new(json))
                }
                _ => PgParam(Box::new(s)),
            },
            Value::Boolean(b) => PgParam(Box::new(b)),
            Value::Date(d) => match *ty {
                Type::TIMESTAMPTZ => PgParam(Box::new(d.and_time(NaiveTime::MIN).and_utc())),
                Type::TIMESTAMP => PgParam(Box::new(d.and_time(NaiveTime::MIN))),
                Type::TEXT | Type::VARCHAR => PgParam(Box::new(d.to_string())),
                _ => PgParam(Box::new(d)),
            },
            Value::Timestamp(t) => match *ty {
                Type::TIMESTAMP => PgParam(Box::new(t.naive_utc())),
                Type::DATE => PgParam(Box::new(t.date_naive())),
                Type::TEXT | Type::VARCHAR => PgParam(Box::new(t.to_rfc3339())),
                _ => PgParam(Box::new(t)),
            },
        };

        Ok(param)
    }
}

impl AsRef<dyn ToSql + Sync> for PgParam {
    fn as_ref(&self) -> &(dyn ToSql + Sync + 'static) {
        &*self.0
    }
}

pub struct PgParamStore {
    pub params: Vec<PgParam>,
}

impl PgParamStore {
    pub fn for_types(values: Vec<Value>, types: &[Type]) -> Result<Self, DbError> {
        if values.len() != types.len() {
            return Err(DbError::QueryBuildError(format!(
                "statement expects {} parameters, got {}",
                types.len(),
                values.len()
            )));
        }

        let params = values
            .into_iter()
            .zip(types)
            .map(|(value, ty)| PgParam::for_type(value, ty))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { params })
    }

    pub fn as_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params
            .iter()
            .map(|param| param.as_ref())
            .collect::<Vec<_>>()
    }
}
