//! sqlx-backed connections.
//!
//! Each backend implements [`Connection`](crate::Connection) for the sqlx
//! connection type and its transactions. Pooled connections work through
//! deref: `models.insert(&mut *pool.acquire().await?, &mut value)`.

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;
