//! PostgreSQL backend.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgRow, PgTypeInfo};
use sqlx::{PgConnection, Postgres, Row as _, TypeInfo, ValueRef};
use tracing::debug;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::connection::{Capabilities, Connection, ConnectionError, Transaction};
use crate::value::{Row, Value};

type Query<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// Open a connection to `config.url`, e.g. `postgres://user@localhost/app`.
pub async fn connect(config: &DatabaseConfig) -> Result<PgConnection, ConnectionError> {
    debug!(url = %config.url, "Connecting to PostgreSQL");
    let conn = <PgConnection as sqlx::Connection>::connect(&config.url).await?;
    Ok(conn)
}

/// A NULL parameter with no declared type; the server infers it from the
/// statement.
struct UntypedNull;

impl sqlx::Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl sqlx::Encode<'_, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        Ok(IsNull::Yes)
    }
}

fn bind<'q>(sql: &'q str, args: &'q [Value]) -> Query<'q> {
    args.iter().fold(sqlx::query(sql), |query, arg| match arg {
        Value::Null => query.bind(UntypedNull),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::Text(s) => query.bind(s.as_str()),
        Value::Bytes(b) => query.bind(b.as_slice()),
        Value::Timestamp(t) => query.bind(*t),
        Value::Uuid(u) => query.bind(*u),
    })
}

/// Decode a row by the declared type of each column.
///
/// Column types without a [`Value`] counterpart (NUMERIC, JSONB, INTERVAL,
/// arrays, ...) fail with [`sqlx::Error::ColumnDecode`]; cast them in SQL.
fn decode(row: &PgRow) -> Result<Row, sqlx::Error> {
    (0..row.len())
        .map(|i| {
            let raw = row.try_get_raw(i)?;
            if raw.is_null() {
                return Ok(Value::Null);
            }
            let type_name = raw.type_info().name().to_string();
            let value = match type_name.as_str() {
                "BOOL" => Value::Bool(row.try_get(i)?),
                "INT2" => Value::Int(i64::from(row.try_get::<i16, _>(i)?)),
                "INT4" => Value::Int(i64::from(row.try_get::<i32, _>(i)?)),
                "INT8" => Value::Int(row.try_get(i)?),
                "FLOAT4" => Value::Float(f64::from(row.try_get::<f32, _>(i)?)),
                "FLOAT8" => Value::Float(row.try_get(i)?),
                "BYTEA" => Value::Bytes(row.try_get(i)?),
                "UUID" => Value::Uuid(row.try_get::<Uuid, _>(i)?),
                "TIMESTAMPTZ" => Value::Timestamp(row.try_get::<DateTime<Utc>, _>(i)?),
                "TIMESTAMP" => Value::Timestamp(row.try_get::<NaiveDateTime, _>(i)?.and_utc()),
                "DATE" => Value::Timestamp(
                    row.try_get::<NaiveDate, _>(i)?
                        .and_time(NaiveTime::MIN)
                        .and_utc(),
                ),
                "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => Value::Text(row.try_get(i)?),
                other => {
                    return Err(sqlx::Error::ColumnDecode {
                        index: i.to_string(),
                        source: format!("unsupported column type {other}").into(),
                    })
                }
            };
            Ok(value)
        })
        .collect()
}

#[async_trait]
impl Connection for PgConnection {
    /// sqlx caches prepared statements per connection, so statements are
    /// always sent as SQL text.
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            transactions: true,
            prepared_statements: false,
        }
    }

    async fn exec(&mut self, sql: &str, args: &[Value]) -> Result<u64, ConnectionError> {
        let result = bind(sql, args).execute(&mut *self).await?;
        Ok(result.rows_affected())
    }

    async fn query(&mut self, sql: &str, args: &[Value]) -> Result<Vec<Row>, ConnectionError> {
        let rows = bind(sql, args).fetch_all(&mut *self).await?;
        Ok(rows.iter().map(decode).collect::<Result<_, _>>()?)
    }

    async fn query_row(
        &mut self,
        sql: &str,
        args: &[Value],
    ) -> Result<Option<Row>, ConnectionError> {
        let row = bind(sql, args).fetch_optional(&mut *self).await?;
        Ok(row.as_ref().map(decode).transpose()?)
    }

    async fn begin<'a>(&'a mut self) -> Result<Box<dyn Transaction + 'a>, ConnectionError> {
        let tx = <PgConnection as sqlx::Connection>::begin(self).await?;
        Ok(Box::new(tx))
    }
}

#[async_trait]
impl<'c> Connection for sqlx::Transaction<'c, Postgres> {
    async fn exec(&mut self, sql: &str, args: &[Value]) -> Result<u64, ConnectionError> {
        Connection::exec(&mut **self, sql, args).await
    }

    async fn query(&mut self, sql: &str, args: &[Value]) -> Result<Vec<Row>, ConnectionError> {
        Connection::query(&mut **self, sql, args).await
    }

    async fn query_row(
        &mut self,
        sql: &str,
        args: &[Value],
    ) -> Result<Option<Row>, ConnectionError> {
        Connection::query_row(&mut **self, sql, args).await
    }
}

#[async_trait]
impl<'c> Transaction for sqlx::Transaction<'c, Postgres> {
    async fn commit(self: Box<Self>) -> Result<(), ConnectionError> {
        Ok(sqlx::Transaction::commit(*self).await?)
    }

    async fn rollback(self: Box<Self>) -> Result<(), ConnectionError> {
        Ok(sqlx::Transaction::rollback(*self).await?)
    }

    fn as_connection(&mut self) -> &mut dyn Connection {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_is_bound_without_a_type() {
        let info = <UntypedNull as sqlx::Type<Postgres>>::type_info();
        assert_eq!(info.oid(), Some(Oid(0)));
    }
}
