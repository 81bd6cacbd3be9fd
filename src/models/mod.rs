//! Registry of record types and their models.
//!
//! Register record types once at startup, then share the registry by
//! reference. Registration takes `&mut self`; every other operation takes
//! `&self`, so a registry in use is read-only.
//!
//! ```ignore
//! let mut models = Models::new(Dialect::Sqlite.grammar());
//! models.register::<Address>()?;
//!
//! let mut address = Address { street: "1 Main St".into(), ..Default::default() };
//! models.save(&mut conn, &mut address).await?; // INSERT, assigns the generated key
//! address.street = "2 Main St".into();
//! models.save(&mut conn, &mut address).await?; // UPDATE
//! ```

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::Config;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::grammar::{Grammar, GrammarError};
use crate::mapper::{FieldMapper, Mapper};
use crate::model::{Model, SaveMode};
use crate::record::{record_name, Field, Record};
use crate::schema::{Column, Index, Table};
use crate::statement::{Query, StatementKind, Statements};

/// Registered models keyed by record type.
pub struct Models<M: Mapper = FieldMapper> {
    mapper: M,
    grammar: Arc<dyn Grammar>,
    models: HashMap<TypeId, Model>,
}

impl Models<FieldMapper> {
    /// Registry using `grammar` and the default field mapper.
    pub fn new(grammar: Arc<dyn Grammar>) -> Self {
        Self::with_mapper(grammar, FieldMapper)
    }

    /// Registry using the configured dialect.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.grammar.dialect.grammar())
    }
}

impl<M: Mapper> Models<M> {
    pub fn with_mapper(grammar: Arc<dyn Grammar>, mapper: M) -> Self {
        Self {
            mapper,
            grammar,
            models: HashMap::new(),
        }
    }

    pub fn grammar(&self) -> &dyn Grammar {
        self.grammar.as_ref()
    }

    pub fn mapper(&self) -> &M {
        &self.mapper
    }

    /// Register `T` under its declared table name.
    ///
    /// Registering an already registered type does nothing.
    pub fn register<T: Record>(&mut self) -> Result<()> {
        self.register_table::<T>(None)
    }

    /// Register `T` under `table`, overriding any declared table name.
    pub fn register_as<T: Record>(&mut self, table: &str) -> Result<()> {
        self.register_table::<T>(Some(table))
    }

    fn register_table<T: Record>(&mut self, table: Option<&str>) -> Result<()> {
        let id = TypeId::of::<T>();
        if self.models.contains_key(&id) {
            return Ok(());
        }
        let model = self.build::<T>(table)?;
        debug!(
            record = model.record,
            table = %model.table.name,
            save_mode = %model.save_mode,
            "Registered model"
        );
        self.models.insert(id, model);
        Ok(())
    }

    fn build<T: Record>(&self, table: Option<&str>) -> Result<Model> {
        let record = record_name::<T>();
        let name = table
            .or(T::TABLE_NAME)
            .filter(|name| !name.is_empty())
            .ok_or(Error::MissingTableName { record })?;
        let mapping = self.mapper.mapping::<T>();

        let mut columns = Columns::default();
        for mapped in mapping.fields() {
            columns.classify(&mapped.column, &mapped.field);
        }
        let save_mode = SaveMode::classify(columns.keys.len(), columns.auto_keys.len());

        let statements = columns.statements(self.grammar.as_ref(), name, record);
        let table = Table {
            name: name.to_string(),
            primary_key: if columns.primary.is_empty() {
                Index::default()
            } else {
                Index::primary(columns.primary)
            },
            unique: columns.unique,
            columns: columns.plain,
        };

        Ok(Model {
            record,
            table,
            statements,
            save_mode,
            auto_keys: columns.auto_key_fields,
            mapping,
        })
    }

    /// The model registered for `T`.
    pub fn lookup<T: Record>(&self) -> Result<&Model> {
        self.models
            .get(&TypeId::of::<T>())
            .ok_or(Error::NotRegistered {
                record: record_name::<T>(),
            })
    }

    /// Insert `value`, assigning database-generated columns back into it.
    pub async fn insert<T, C>(&self, conn: &mut C, value: &mut T) -> Result<()>
    where
        T: Record,
        C: Connection + ?Sized,
    {
        let (model, query) = self.statement::<T>(StatementKind::Insert)?;
        model.bind(&self.mapper, query).query_one(conn, value).await
    }

    /// Insert every record in `values`, all or nothing.
    pub async fn insert_all<T, C>(&self, conn: &mut C, values: &mut [T]) -> Result<()>
    where
        T: Record,
        C: Connection + ?Sized,
    {
        let (model, query) = self.statement::<T>(StatementKind::Insert)?;
        model.bind(&self.mapper, query).query_slice(conn, values).await
    }

    /// Update `value` by key.
    pub async fn update<T, C>(&self, conn: &mut C, value: &mut T) -> Result<()>
    where
        T: Record,
        C: Connection + ?Sized,
    {
        let (model, query) = self.statement::<T>(StatementKind::Update)?;
        model.bind(&self.mapper, query).query_one(conn, value).await
    }

    pub async fn update_all<T, C>(&self, conn: &mut C, values: &mut [T]) -> Result<()>
    where
        T: Record,
        C: Connection + ?Sized,
    {
        let (model, query) = self.statement::<T>(StatementKind::Update)?;
        model.bind(&self.mapper, query).query_slice(conn, values).await
    }

    /// Insert `value`, or update the existing row with the same keys.
    ///
    /// Only types with caller-supplied keys support upsert; database-generated
    /// keys cannot be known before the insert.
    pub async fn upsert<T, C>(&self, conn: &mut C, value: &mut T) -> Result<()>
    where
        T: Record,
        C: Connection + ?Sized,
    {
        let (model, query) = self.statement::<T>(StatementKind::Upsert)?;
        model.bind(&self.mapper, query).query_one(conn, value).await
    }

    pub async fn upsert_all<T, C>(&self, conn: &mut C, values: &mut [T]) -> Result<()>
    where
        T: Record,
        C: Connection + ?Sized,
    {
        let (model, query) = self.statement::<T>(StatementKind::Upsert)?;
        model.bind(&self.mapper, query).query_slice(conn, values).await
    }

    /// Delete the row matching the keys of `value`.
    pub async fn delete<T, C>(&self, conn: &mut C, value: &mut T) -> Result<()>
    where
        T: Record,
        C: Connection + ?Sized,
    {
        let (model, query) = self.statement::<T>(StatementKind::Delete)?;
        model.bind(&self.mapper, query).query_one(conn, value).await
    }

    pub async fn delete_all<T, C>(&self, conn: &mut C, values: &mut [T]) -> Result<()>
    where
        T: Record,
        C: Connection + ?Sized,
    {
        let (model, query) = self.statement::<T>(StatementKind::Delete)?;
        model.bind(&self.mapper, query).query_slice(conn, values).await
    }

    /// Insert, update or upsert `value` depending on the model's save mode.
    pub async fn save<T, C>(&self, conn: &mut C, value: &mut T) -> Result<()>
    where
        T: Record,
        C: Connection + ?Sized,
    {
        let model = self.lookup::<T>()?;
        match save_kind(model, Some(&*value)) {
            StatementKind::Update => self.update(conn, value).await,
            StatementKind::Upsert => self.upsert(conn, value).await,
            _ => self.insert(conn, value).await,
        }
    }

    /// Save every record in `values`. The operation is chosen from the first
    /// record and applied to all of them.
    pub async fn save_all<T, C>(&self, conn: &mut C, values: &mut [T]) -> Result<()>
    where
        T: Record,
        C: Connection + ?Sized,
    {
        let model = self.lookup::<T>()?;
        if values.is_empty() {
            return Ok(());
        }
        match save_kind(model, values.first()) {
            StatementKind::Update => self.update_all(conn, values).await,
            StatementKind::Upsert => self.upsert_all(conn, values).await,
            _ => self.insert_all(conn, values).await,
        }
    }

    fn statement<T: Record>(&self, kind: StatementKind) -> Result<(&Model, &Query)> {
        let model = self.lookup::<T>()?;
        let query = model.statements.get(kind).ok_or(Error::Unsupported {
            operation: kind.as_str(),
            record: model.record,
        })?;
        Ok((model, query))
    }
}

fn save_kind<T: Record>(model: &Model, value: Option<&T>) -> StatementKind {
    match model.save_mode {
        SaveMode::Insert => StatementKind::Insert,
        SaveMode::Upsert => StatementKind::Upsert,
        SaveMode::InsertOrUpdate => match value {
            Some(value) if model.has_auto_key(value) => StatementKind::Update,
            _ => StatementKind::Insert,
        },
    }
}

/// Columns of a record type sorted by how statements use them.
#[derive(Default)]
struct Columns {
    /// Caller-supplied keys.
    keys: Vec<String>,
    /// Database-generated keys.
    auto_keys: Vec<String>,
    auto_key_fields: Vec<&'static str>,
    auto_insert: Vec<String>,
    auto_update: Vec<String>,
    auto_insert_update: Vec<String>,
    /// Columns the caller supplies on every write.
    names: Vec<String>,
    primary: Vec<Column>,
    plain: Vec<Column>,
    unique: Vec<Index>,
}

impl Columns {
    /// Classify a column by its field tag.
    ///
    /// `key` and `key,auto` mark primary key columns; `inserted` and `updated`
    /// mark columns the database fills in; `unique` adds a single-column unique
    /// index. Everything else is written by the caller.
    fn classify(&mut self, name: &str, field: &Field) {
        let tag = field.tag;
        let column = Column::new(name, field.type_name);
        let flags: Vec<&str> = tag.split(',').map(str::trim).collect();

        if flags.first() == Some(&"key") {
            self.primary.push(column.clone());
            if flags.contains(&"auto") {
                self.auto_keys.push(name.to_string());
                self.auto_key_fields.push(field.name);
            } else {
                self.keys.push(name.to_string());
            }
        } else if tag.contains("inserted") || tag.contains("updated") {
            if tag.contains("inserted") {
                self.auto_insert.push(name.to_string());
            }
            if tag.contains("updated") {
                self.auto_update.push(name.to_string());
            }
            self.auto_insert_update.push(name.to_string());
        } else {
            self.plain.push(column.clone());
            self.names.push(name.to_string());
        }

        if tag.contains("unique") {
            self.unique.push(Index::unique(vec![column]));
        }
    }

    /// Build the four statements. A statement the grammar rejects is left
    /// out and reported as unsupported when used.
    fn statements(&self, grammar: &dyn Grammar, table: &str, record: &'static str) -> Statements {
        let keys = strs(&self.keys);
        let auto_keys = strs(&self.auto_keys);
        let names = strs(&self.names);
        let all_keys: Vec<&str> = auto_keys.iter().chain(keys.iter()).copied().collect();
        let insert_columns: Vec<&str> = keys.iter().chain(names.iter()).copied().collect();
        let insert_auto: Vec<&str> = auto_keys
            .iter()
            .copied()
            .chain(self.auto_insert.iter().map(String::as_str))
            .collect();

        let built = |kind: StatementKind, query: std::result::Result<Query, GrammarError>| match query {
            Ok(query) => Some(query),
            Err(e) => {
                debug!(record, table, statement = %kind, error = %e, "Statement unavailable");
                None
            }
        };

        Statements {
            insert: built(
                StatementKind::Insert,
                grammar.insert(table, &insert_columns, &insert_auto),
            ),
            update: built(
                StatementKind::Update,
                grammar.update(table, &names, &all_keys, &strs(&self.auto_update)),
            ),
            upsert: built(
                StatementKind::Upsert,
                grammar.upsert(table, &names, &keys, &strs(&self.auto_insert_update)),
            ),
            delete: built(StatementKind::Delete, grammar.delete(table, &all_keys)),
        }
    }
}

fn strs(names: &[String]) -> Vec<&str> {
    names.iter().map(String::as_str).collect()
}
