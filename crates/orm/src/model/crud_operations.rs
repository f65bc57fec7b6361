//! CRUD Operations - static entry points available on every entity type

use crate::backends::DatabaseValue;
use crate::collection::Collection;
use crate::database::Database;
use crate::error::{ModelError, ModelResult};
use crate::model::core_trait::Entity;
use crate::model::record::Record;
use crate::query::{Query, QueryBuilder};

/// Static CRUD and query entry points, implemented for every [`Entity`]
#[allow(async_fn_in_trait)]
pub trait CrudOperations: Entity {
    /// A new transient record
    fn make(db: &Database) -> Record<Self> {
        Record::new(db)
    }

    fn query(db: &Database) -> Query<Self> {
        Query::new(db)
    }

    /// Query with named relations eager loaded
    fn with<I, S>(db: &Database, relations: I) -> Query<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Query::new(db).with(relations)
    }

    fn with_trashed(db: &Database) -> Query<Self> {
        Query::new(db).with_trashed()
    }

    fn only_trashed(db: &Database) -> Query<Self> {
        Query::new(db).only_trashed()
    }

    async fn all(db: &Database) -> ModelResult<Collection<Record<Self>>> {
        Query::<Self>::new(db).get().await
    }

    async fn find<K: Into<DatabaseValue>>(db: &Database, id: K) -> ModelResult<Option<Record<Self>>> {
        Query::<Self>::new(db).find(id).await
    }

    async fn find_or_fail<K: Into<DatabaseValue>>(db: &Database, id: K) -> ModelResult<Record<Self>> {
        let id = id.into();
        Self::find(db, id.clone()).await?.ok_or_else(|| {
            ModelError::not_found(db.definition::<Self>().table(), &id)
        })
    }

    async fn find_many<I, K>(db: &Database, ids: I) -> ModelResult<Collection<Record<Self>>>
    where
        I: IntoIterator<Item = K>,
        K: Into<DatabaseValue>,
    {
        let definition = db.definition::<Self>();
        Query::<Self>::new(db)
            .where_in(definition.primary_key_name(), ids)
            .get()
            .await
    }

    /// Fill and save a new record. When a hook or rule stops the save the
    /// unsaved record is returned with `exists() == false`.
    async fn create<I, K, V>(db: &Database, attributes: I) -> ModelResult<Record<Self>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<DatabaseValue>,
    {
        let mut record = Record::<Self>::new(db);
        record.fill(attributes);
        record.save(db).await?;
        Ok(record)
    }

    /// First row matching `attributes`, or an unsaved record filled with
    /// `attributes` and `extra`
    async fn first_or_new(
        db: &Database,
        attributes: &[(&str, DatabaseValue)],
        extra: &[(&str, DatabaseValue)],
    ) -> ModelResult<Record<Self>> {
        if let Some(found) = matching::<Self>(db, attributes).first().await? {
            return Ok(found);
        }
        let mut record = Record::<Self>::new(db);
        record.fill(attributes.iter().cloned());
        record.fill(extra.iter().cloned());
        Ok(record)
    }

    /// Like [`first_or_new`](Self::first_or_new) but saves the new record
    async fn first_or_create(
        db: &Database,
        attributes: &[(&str, DatabaseValue)],
        extra: &[(&str, DatabaseValue)],
    ) -> ModelResult<Record<Self>> {
        let mut record = Self::first_or_new(db, attributes, extra).await?;
        if !record.exists() {
            record.save(db).await?;
        }
        Ok(record)
    }

    /// Update the first row matching `attributes` with `values`, or create it
    async fn update_or_create(
        db: &Database,
        attributes: &[(&str, DatabaseValue)],
        values: &[(&str, DatabaseValue)],
    ) -> ModelResult<Record<Self>> {
        let mut record = Self::first_or_new(db, attributes, &[]).await?;
        record.fill(values.iter().cloned());
        record.save(db).await?;
        Ok(record)
    }

    /// Multi-row INSERT in one statement. Hooks, mutators and casts are
    /// bypassed. Returns the number of rows written.
    async fn insert<R, I, K, V>(db: &Database, rows: R) -> ModelResult<u64>
    where
        R: IntoIterator<Item = I>,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<DatabaseValue>,
    {
        let definition = db.definition::<Self>();
        let mut builder = QueryBuilder::new()
            .with_dialect(db.dialect())
            .insert_into(definition.table());
        let mut count = 0;
        for row in rows {
            builder = builder.values(
                row.into_iter()
                    .map(|(column, value)| (column.as_ref().to_string(), value.into())),
            );
            count += 1;
        }
        if count == 0 {
            return Ok(0);
        }

        let (sql, params) = builder.to_sql_with_params()?;
        Ok(db.statement(&sql, &params).await?.rows_affected)
    }

    /// Hydrate records from a raw SELECT
    async fn find_by_sql(
        db: &Database,
        sql: &str,
        params: &[DatabaseValue],
    ) -> ModelResult<Collection<Record<Self>>> {
        let definition = db.definition::<Self>();
        let rows = db.select(sql, params).await?;
        Ok(rows
            .into_iter()
            .map(|row| Record::from_row(std::sync::Arc::clone(&definition), row))
            .collect())
    }

    /// Load and delete each id through the record lifecycle.
    /// Returns how many deletions went through.
    async fn destroy<I, K>(db: &Database, ids: I) -> ModelResult<u64>
    where
        I: IntoIterator<Item = K>,
        K: Into<DatabaseValue>,
    {
        let records = Self::find_many(db, ids).await?;
        let mut deleted = 0;
        for mut record in records.into_vec() {
            if record.delete(db).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

impl<E: Entity> CrudOperations for E {}

fn matching<E: Entity>(db: &Database, attributes: &[(&str, DatabaseValue)]) -> Query<E> {
    attributes
        .iter()
        .fold(Query::<E>::new(db), |query, (column, value)| {
            query.where_eq(column, value.clone())
        })
}
