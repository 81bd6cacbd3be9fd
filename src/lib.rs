//! modelsql - models, grammars and batch execution for SQL databases.
//!
//! Record types are registered once with a [`Models`] registry, which
//! classifies their fields into keys, database-generated columns and plain
//! columns and prebuilds INSERT, UPDATE, UPSERT and DELETE statements with a
//! dialect [`Grammar`]. At request time the registry runs those statements
//! against any [`Connection`], batching slices inside a transaction.
//!
//! ```ignore
//! #[derive(Debug, Default)]
//! struct Address {
//!     id: i64,
//!     created: DateTime<Utc>,
//!     street: String,
//! }
//!
//! modelsql::record! {
//!     Address, table = "addresses", {
//!         id: "key,auto",
//!         created: "inserted",
//!         street: "",
//!     }
//! }
//!
//! let mut models = Models::new(Dialect::Sqlite.grammar());
//! models.register::<Address>()?;
//! models.save(&mut conn, &mut address).await?;
//! ```

pub mod config;
pub mod connection;
#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub mod driver;
pub mod error;
pub mod grammar;
pub mod mapper;
pub mod model;
pub mod models;
pub mod record;
pub mod schema;
pub mod statement;
pub mod value;

pub use config::Config;
pub use connection::{
    transact, transact_rollback, Capabilities, Capability, Connection, ConnectionError,
    PreparedStatement, Transaction,
};
pub use error::{Error, Result};
pub use grammar::{Dialect, Generic, Grammar, GrammarError, Postgres, Sqlite};
pub use mapper::{FieldMapper, Mapper, MapperError, Mapping, Plan};
pub use model::{Model, QueryBinding, SaveMode};
pub use models::Models;
pub use record::{Field, Record};
pub use schema::{Column, Index, Table};
pub use statement::{Expect, Query, StatementKind, Statements};
pub use value::{ConversionError, FromValue, Row, ToValue, Value};
