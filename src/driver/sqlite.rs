//! SQLite backend.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row as _, Sqlite, SqliteConnection, TypeInfo, ValueRef};
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::connection::{Capabilities, Connection, ConnectionError, Transaction};
use crate::value::{Row, Value};

type Query<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Open a connection to `config.url`, e.g. `sqlite::memory:` or `sqlite://app.db`.
pub async fn connect(config: &DatabaseConfig) -> Result<SqliteConnection, ConnectionError> {
    debug!(url = %config.url, "Connecting to SQLite");
    let conn = <SqliteConnection as sqlx::Connection>::connect(&config.url).await?;
    Ok(conn)
}

fn bind<'q>(sql: &'q str, args: &'q [Value]) -> Query<'q> {
    args.iter().fold(sqlx::query(sql), |query, arg| match arg {
        Value::Null => query.bind(None::<i64>),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::Text(s) => query.bind(s.as_str()),
        Value::Bytes(b) => query.bind(b.as_slice()),
        Value::Timestamp(t) => query.bind(*t),
        Value::Uuid(u) => query.bind(*u),
    })
}

/// Decode a row by the storage class of each value.
///
/// Timestamps and UUIDs come back as text and blobs; record fields convert
/// them on assignment.
fn decode(row: &SqliteRow) -> Result<Row, sqlx::Error> {
    (0..row.len())
        .map(|i| {
            let raw = row.try_get_raw(i)?;
            if raw.is_null() {
                return Ok(Value::Null);
            }
            let type_name = raw.type_info().name().to_ascii_uppercase();
            let value = if type_name.contains("INT") || type_name == "BOOLEAN" {
                Value::Int(row.try_get_unchecked(i)?)
            } else if type_name == "REAL" || type_name == "FLOAT" || type_name == "NUMERIC" {
                Value::Float(row.try_get_unchecked(i)?)
            } else if type_name == "BLOB" {
                Value::Bytes(row.try_get_unchecked(i)?)
            } else {
                Value::Text(row.try_get_unchecked(i)?)
            };
            Ok(value)
        })
        .collect()
}

#[async_trait]
impl Connection for SqliteConnection {
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
        let tx = <SqliteConnection as sqlx::Connection>::begin(self).await?;
        Ok(Box::new(tx))
    }
}

#[async_trait]
impl<'c> Connection for sqlx::Transaction<'c, Sqlite> {
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
impl<'c> Transaction for sqlx::Transaction<'c, Sqlite> {
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
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    use crate::value::FromValue;

    async fn memory() -> SqliteConnection {
        let mut conn = connect(&DatabaseConfig::default()).await.unwrap();
        conn.exec(
            "CREATE TABLE things (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, score REAL, tag BLOB, seen TEXT)",
            &[],
        )
        .await
        .unwrap();
        conn
    }

    #[tokio::test]
    async fn test_exec_and_query_row() {
        let mut conn = memory().await;
        let id = Uuid::new_v4();
        let seen = Utc::now();
        let affected = conn
            .exec(
                "INSERT INTO things (name, score, tag, seen) VALUES (?, ?, ?, ?)",
                &[
                    Value::Text("widget".into()),
                    Value::Float(1.5),
                    Value::Uuid(id),
                    Value::Timestamp(seen),
                ],
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let row = conn
            .query_row("SELECT id, name, score, tag, seen FROM things", &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row[0], Value::Int(1));
        assert_eq!(row[1], Value::Text("widget".into()));
        assert_eq!(row[2], Value::Float(1.5));
        assert_eq!(Uuid::from_value(row[3].clone()).unwrap(), id);
        assert_eq!(DateTime::<Utc>::from_value(row[4].clone()).unwrap(), seen);
    }

    #[tokio::test]
    async fn test_query_row_none_and_nulls() {
        let mut conn = memory().await;
        let row = conn
            .query_row("SELECT id FROM things WHERE id = ?", &[Value::Int(9)])
            .await
            .unwrap();
        assert!(row.is_none());

        conn.exec("INSERT INTO things (name) VALUES (?)", &[Value::Null])
            .await
            .unwrap();
        let rows = conn.query("SELECT name, tag FROM things", &[]).await.unwrap();
        assert_eq!(rows, vec![vec![Value::Null, Value::Null]]);
    }

    #[tokio::test]
    async fn test_transaction_rollback() {
        let mut conn = memory().await;
        let mut tx = Connection::begin(&mut conn).await.unwrap();
        tx.exec("INSERT INTO things (name) VALUES ('a')", &[])
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        let rows = conn.query("SELECT id FROM things", &[]).await.unwrap();
        assert!(rows.is_empty());
    }
}
