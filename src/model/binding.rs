use tracing::{debug, warn};

use super::Model;
use crate::connection::{Connection, ConnectionError, PreparedStatement};
use crate::error::{Error, Result};
use crate::mapper::{Mapper, Plan};
use crate::record::Record;
use crate::statement::{Expect, Query};
use crate::value::{Row, Value};

/// A query bound to a model, ready to run against records of the model's type.
///
/// Bindings are cheap and built per call; they borrow everything and own no state.
pub struct QueryBinding<'a, M> {
    mapper: &'a M,
    model: &'a Model,
    query: &'a Query,
}

impl<'a, M: Mapper> QueryBinding<'a, M> {
    pub fn new(mapper: &'a M, model: &'a Model, query: &'a Query) -> Self {
        Self {
            mapper,
            model,
            query,
        }
    }

    pub fn query(&self) -> &Query {
        self.query
    }

    /// Run the query for a single record.
    ///
    /// Without scan columns the statement is executed and the affected row count
    /// ignored. With scan columns the returned row is assigned to `value`; no
    /// row is an error unless the query expects one row or none.
    pub async fn query_one<T, C>(&self, conn: &mut C, value: &mut T) -> Result<()>
    where
        T: Record,
        C: Connection + ?Sized,
    {
        let (arguments, scan) = self.plans()?;
        debug!(table = %self.model.table.name, sql = %self.query.sql, "Executing statement");

        let mut target = Target::Direct {
            conn,
            sql: &self.query.sql,
        };
        execute(&mut target, &arguments, &scan, self.query.expect, value).await
    }

    /// Run the query for every record in `values`, all or nothing.
    ///
    /// When the connection supports transactions the batch runs inside one and
    /// commits only if every record succeeds. The statement is prepared once
    /// when supported. The first failure stops the batch, rolls back and is
    /// returned as is.
    pub async fn query_slice<T, C>(&self, conn: &mut C, values: &mut [T]) -> Result<()>
    where
        T: Record,
        C: Connection + ?Sized,
    {
        match values {
            [] => return Ok(()),
            [value] => return self.query_one(conn, value).await,
            _ => {}
        }

        let (arguments, scan) = self.plans()?;
        debug!(
            table = %self.model.table.name,
            sql = %self.query.sql,
            count = values.len(),
            "Executing batch"
        );

        if !conn.capabilities().transactions {
            return self.run_batch(conn, &arguments, &scan, values).await;
        }

        let mut tx = conn.begin().await?;
        match self.run_batch(&mut *tx, &arguments, &scan, values).await {
            Ok(()) => {
                tx.commit().await?;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(
                        table = %self.model.table.name,
                        error = %rollback,
                        cause = %e,
                        "Failed to roll back batch"
                    );
                }
                Err(e)
            }
        }
    }

    /// Resolve argument and scan columns once for the whole call.
    fn plans(&self) -> Result<(Plan, Plan)> {
        let mapping = &self.model.mapping;
        let arguments = self.mapper.prepare(mapping, &self.query.arguments)?;
        let scan = self.mapper.prepare(mapping, &self.query.scan)?;
        Ok((arguments, scan))
    }

    async fn run_batch<T, C>(
        &self,
        conn: &mut C,
        arguments: &Plan,
        scan: &Plan,
        values: &mut [T],
    ) -> Result<()>
    where
        T: Record,
        C: Connection + ?Sized,
    {
        let mut target = if conn.capabilities().prepared_statements {
            Target::Prepared(conn.prepare(&self.query.sql).await?)
        } else {
            Target::Direct {
                conn,
                sql: &self.query.sql,
            }
        };

        let mut result = Ok(());
        for value in values.iter_mut() {
            result = execute(&mut target, arguments, scan, self.query.expect, value).await;
            if result.is_err() {
                break;
            }
        }
        target.close().await;
        result
    }
}

/// Where element executions are sent: the connection with the full SQL, or a
/// prepared statement.
enum Target<'t, C: ?Sized> {
    Direct { conn: &'t mut C, sql: &'t str },
    Prepared(Box<dyn PreparedStatement + 't>),
}

impl<C: Connection + ?Sized> Target<'_, C> {
    async fn exec(&mut self, args: &[Value]) -> std::result::Result<u64, ConnectionError> {
        match self {
            Target::Direct { conn, sql } => conn.exec(sql, args).await,
            Target::Prepared(stmt) => stmt.exec(args).await,
        }
    }

    async fn query_row(&mut self, args: &[Value]) -> std::result::Result<Option<Row>, ConnectionError> {
        match self {
            Target::Direct { conn, sql } => conn.query_row(sql, args).await,
            Target::Prepared(stmt) => stmt.query_row(args).await,
        }
    }

    async fn close(self) {
        if let Target::Prepared(stmt) = self {
            if let Err(e) = stmt.close().await {
                warn!(error = %e, "Failed to close prepared statement");
            }
        }
    }
}

async fn execute<T, C>(
    target: &mut Target<'_, C>,
    arguments: &Plan,
    scan: &Plan,
    expect: Expect,
    value: &mut T,
) -> Result<()>
where
    T: Record,
    C: Connection + ?Sized,
{
    let args = arguments.arguments(value)?;
    if scan.is_empty() {
        target.exec(&args).await?;
        return Ok(());
    }
    match target.query_row(&args).await? {
        Some(row) => Ok(scan.assign(value, row)?),
        None if expect == Expect::RowOrNone => Ok(()),
        None => Err(Error::NoRows { expect }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::mock::{Call, MockConnection, MockError};
    use crate::connection::Capabilities;
    use crate::grammar::{Grammar, Sqlite};
    use crate::mapper::FieldMapper;
    use crate::models::Models;
    use std::sync::Arc;

    #[derive(Debug, Default, Clone)]
    struct Person {
        id: i64,
        name: String,
    }

    crate::record! {
        Person, table = "people", {
            id: "key,auto",
            name: "",
        }
    }

    fn models() -> Models {
        let mut models = Models::new(Arc::new(Sqlite));
        models.register::<Person>().unwrap();
        models
    }

    fn people(n: usize) -> Vec<Person> {
        (0..n)
            .map(|i| Person {
                id: 0,
                name: format!("person {i}"),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_query_one_scans_returned_row() {
        let models = models();
        let model = models.lookup::<Person>().unwrap();
        let query = model.statements().insert.clone().unwrap();
        let mut conn = MockConnection::new();
        conn.push_row(Some(vec![Value::Int(7)])).await;

        let mut person = Person {
            id: 0,
            name: "Ada".into(),
        };
        model
            .bind(&FieldMapper, &query)
            .query_one(&mut conn, &mut person)
            .await
            .unwrap();
        assert_eq!(person.id, 7);
        assert_eq!(
            conn.calls().await,
            vec![Call::QueryRow {
                sql: query.sql.clone(),
                args: vec![Value::Text("Ada".into())]
            }]
        );
    }

    #[tokio::test]
    async fn test_query_one_row_or_none_tolerates_no_rows() {
        let models = models();
        let model = models.lookup::<Person>().unwrap();
        let query = Sqlite
            .update("people", &["name"], &["id"], &["id"])
            .unwrap();
        assert_eq!(query.expect, Expect::RowOrNone);

        let mut conn = MockConnection::new();
        let mut person = Person {
            id: 3,
            name: "Grace".into(),
        };
        model
            .bind(&FieldMapper, &query)
            .query_one(&mut conn, &mut person)
            .await
            .unwrap();
        assert_eq!(person.id, 3);
    }

    #[tokio::test]
    async fn test_unknown_argument_column() {
        let models = models();
        let model = models.lookup::<Person>().unwrap();
        let query = Sqlite.delete("people", &["ssn"]).unwrap();
        let mut conn = MockConnection::new();
        let err = model
            .bind(&FieldMapper, &query)
            .query_one(&mut conn, &mut Person::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Mapper(_)));
        assert!(conn.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_batch_without_capabilities_runs_direct() {
        let models = models();
        let model = models.lookup::<Person>().unwrap();
        let query = Sqlite.update("people", &["name"], &["id"], &[]).unwrap();
        let mut conn = MockConnection::new();
        let mut values = people(3);

        model
            .bind(&FieldMapper, &query)
            .query_slice(&mut conn, &mut values)
            .await
            .unwrap();
        let calls = conn.calls().await;
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|c| matches!(c, Call::Exec { .. })));
    }

    #[tokio::test]
    async fn test_batch_rollback_failure_keeps_original_error() {
        let models = models();
        let model = models.lookup::<Person>().unwrap();
        let query = Sqlite.update("people", &["name"], &["id"], &[]).unwrap();
        let mut conn = MockConnection::with_capabilities(Capabilities::all());
        conn.set_fail_on_execution(1).await;
        conn.set_fail_on_rollback(true).await;

        let err = model
            .bind(&FieldMapper, &query)
            .query_slice(&mut conn, &mut people(2))
            .await
            .unwrap_err();
        match err {
            Error::Connection(ConnectionError::Other(e)) => {
                assert_eq!(e.downcast_ref::<MockError>(), Some(&MockError::Execution(1)));
            }
            other => panic!("unexpected error: {other}"),
        }
        let calls = conn.calls().await;
        assert_eq!(calls.last(), Some(&Call::Rollback));
        assert!(!calls.contains(&Call::Commit));
    }

    #[tokio::test]
    async fn test_batch_commit_failure_is_returned() {
        let models = models();
        let model = models.lookup::<Person>().unwrap();
        let query = Sqlite.update("people", &["name"], &["id"], &[]).unwrap();
        let mut conn = MockConnection::with_capabilities(Capabilities {
            transactions: true,
            prepared_statements: false,
        });
        conn.set_fail_on_commit(true).await;

        let err = model
            .bind(&FieldMapper, &query)
            .query_slice(&mut conn, &mut people(2))
            .await
            .unwrap_err();
        assert!(err.is_connection());
        assert_eq!(err.to_string(), "mock commit failed");
    }

    #[tokio::test]
    async fn test_batch_begin_failure_returns_immediately() {
        let models = models();
        let model = models.lookup::<Person>().unwrap();
        let query = Sqlite.update("people", &["name"], &["id"], &[]).unwrap();
        let mut conn = MockConnection::with_capabilities(Capabilities::all());
        conn.set_fail_on_begin(true).await;

        let err = model
            .bind(&FieldMapper, &query)
            .query_slice(&mut conn, &mut people(2))
            .await
            .unwrap_err();
        assert!(err.is_connection());
        assert_eq!(conn.calls().await, vec![Call::Begin]);
    }
}
