use crate::sql::error::ConnectorError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use model::{
    core::value::{FieldValue, Value},
    records::row::RowData,
};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use rust_decimal::Decimal;
use tokio_postgres::{Client, Config, NoTls, Row, config::SslMode, types::Type};
use tracing::{error, warn};

pub(crate) async fn connect_client(url: &str) -> Result<Client, ConnectorError> {
    let config = url
        .parse::<Config>()
        .map_err(|e| ConnectorError::InvalidUrl(e.to_string()))?;
    let ssl_mode = config.get_ssl_mode();

    match ssl_mode {
        SslMode::Disable => connect_without_tls(config).await,
        SslMode::Require => connect_with_tls(config).await,
        SslMode::Prefer => match connect_with_tls(config.clone()).await {
            Ok(client) => Ok(client),
            Err(error) => {
                warn!(%error, "Postgres TLS handshake failed, retrying without TLS");
                connect_without_tls(config).await
            }
        },
        _ => connect_with_tls(config).await,
    }
}

async fn connect_with_tls(config: Config) -> Result<Client, ConnectorError> {
    let connector = TlsConnector::builder().build()?;
    let tls = MakeTlsConnector::new(connector);
    let (client, connection) = config.connect(tls).await?;
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            error!(%err, "Postgres connection error");
        }
    });
    Ok(client)
}

async fn connect_without_tls(config: Config) -> Result<Client, ConnectorError> {
    let (client, connection) = config.connect(NoTls).await?;
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            error!(%err, "Postgres connection error");
        }
    });
    Ok(client)
}

/// Decodes a result row by column type. Unsupported types read as text
/// when possible and `Null` otherwise.
pub(crate) fn to_row_data(row: &Row, table: &str) -> RowData {
    let fields = row
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| FieldValue::new(column.name(), cell(row, idx, column.type_())))
        .collect();
    RowData::new(table, fields)
}

fn cell(row: &Row, idx: usize, ty: &Type) -> Value {
    let value = match *ty {
        Type::INT2 => row.try_get::<_, Option<i16>>(idx).map(|v| v.map(|v| Value::Int(v.into()))),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx).map(|v| v.map(|v| Value::Int(v.into()))),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx).map(|v| v.map(Value::Int)),
        Type::NUMERIC => row.try_get::<_, Option<Decimal>>(idx).map(|v| v.map(Value::Decimal)),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)
            .map(|v| v.and_then(Decimal::from_f32_retain).map(Value::Decimal)),
        Type::FLOAT8 => row
            .try_get::<_, Option<f64>>(idx)
            .map(|v| v.and_then(Decimal::from_f64_retain).map(Value::Decimal)),
        Type::BOOL => row.try_get::<_, Option<bool>>(idx).map(|v| v.map(Value::Boolean)),
        Type::DATE => row.try_get::<_, Option<NaiveDate>>(idx).map(|v| v.map(Value::Date)),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)
            .map(|v| v.map(Value::Timestamp)),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)
            .map(|v| v.map(|t| Value::Timestamp(t.and_utc()))),
        _ => row.try_get::<_, Option<String>>(idx).map(|v| v.map(Value::String)),
    };

    match value {
        Ok(v) => v.unwrap_or(Value::Null),
        Err(err) => {
            warn!(column = idx, ty = %ty, %err, "Unreadable column value");
            Value::Null
        }
    }
}
