//! Query execution: terminal operations on [`Query`]

use std::future::Future;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use super::builder::QueryBuilder;
use super::model_query::{ArrayQuery, Query};
use super::pagination::{page_offset, PageMeta, Paginator};
use crate::backends::{DatabaseValue, Row};
use crate::collection::{Collection, CollectionKey};
use crate::error::{ModelError, OrmResult};
use crate::model::attributes::{cast_value, now_value, storage_form};
use crate::model::{Entity, Record};
use crate::relationships::eager_loading::eager_load;

impl<E: Entity> Query<E> {
    async fn fetch_rows(&self, builder: &QueryBuilder) -> OrmResult<Vec<Row>> {
        let (sql, params) = builder.to_sql_with_params()?;
        self.db.select(&sql, &params).await
    }

    fn hydrate(&self, rows: Vec<Row>) -> Vec<Record<E>> {
        rows.into_iter()
            .map(|row| Record::from_row(Arc::clone(&self.definition), row))
            .collect()
    }

    /// Run the query, hydrate records and eager load requested relations
    pub async fn get(&self) -> OrmResult<Collection<Record<E>>> {
        let rows = self.fetch_rows(&self.builder).await?;
        let mut records = self.hydrate(rows);
        if !self.eager.is_empty() {
            eager_load(&self.db, &self.definition, &mut records, &self.eager).await?;
        }
        Ok(records.into_iter().collect())
    }

    pub async fn first(&self) -> OrmResult<Option<Record<E>>> {
        let found = self.clone().limit(1).get().await?;
        Ok(found.into_vec().into_iter().next())
    }

    pub async fn first_or_fail(&self) -> OrmResult<Record<E>> {
        self.first()
            .await?
            .ok_or_else(|| ModelError::not_found(self.definition.table(), "<first match>"))
    }

    /// Add `primary key = id` and return the first match
    pub async fn find<K: Into<DatabaseValue>>(&self, id: K) -> OrmResult<Option<Record<E>>> {
        let primary_key = self.definition.primary_key_name().to_string();
        self.clone().where_eq(&primary_key, id).first().await
    }

    pub async fn count(&self) -> OrmResult<u64> {
        let base = self.builder.clone().without_ordering();

        let rows = if base.group_by.is_empty() && !base.distinct {
            self.fetch_rows(&base.reselect("COUNT(*) AS aggregate")).await?
        } else {
            let (inner, params) = base.to_sql_with_params()?;
            let sql = format!("SELECT COUNT(*) AS aggregate FROM ({}) AS aggregate_table", inner);
            self.db.select(&sql, &params).await?
        };

        Ok(rows
            .first()
            .and_then(|row| row.get("aggregate"))
            .and_then(DatabaseValue::as_i64)
            .unwrap_or(0)
            .max(0) as u64)
    }

    pub async fn exists(&self) -> OrmResult<bool> {
        let builder = self.builder.clone().without_ordering().reselect("1").limit(1);
        Ok(!self.fetch_rows(&builder).await?.is_empty())
    }

    /// One column of every matching row, cast like the attribute
    pub async fn pluck(&self, column: &str) -> OrmResult<Collection<DatabaseValue>> {
        let rows = self.fetch_rows(&self.builder.clone().reselect(column)).await?;
        let cast = self.definition.cast_for(unqualified(column));

        rows.into_iter()
            .map(|row| {
                let raw = first_value(row);
                match cast {
                    Some(cast) => cast_value(column, cast, &raw),
                    None => Ok(raw),
                }
            })
            .collect()
    }

    /// `value_column` keyed by `key_column`; later duplicates win
    pub async fn pluck_keyed(
        &self,
        value_column: &str,
        key_column: &str,
    ) -> OrmResult<Collection<DatabaseValue>> {
        let builder = self
            .builder
            .clone()
            .reselect(&format!("{} AS pluck_value", value_column))
            .select_raw(&format!("{} AS pluck_key", key_column));
        let rows = self.fetch_rows(&builder).await?;
        let cast = self.definition.cast_for(unqualified(value_column));

        let mut keyed = Collection::new();
        for mut row in rows {
            let key = row
                .shift_remove("pluck_key")
                .and_then(|k| k.key_string())
                .unwrap_or_default();
            let raw = row.shift_remove("pluck_value").unwrap_or(DatabaseValue::Null);
            let value = match cast {
                Some(cast) => cast_value(value_column, cast, &raw)?,
                None => raw,
            };
            keyed.insert(CollectionKey::Name(key), value);
        }
        Ok(keyed)
    }

    /// First column of the first row, e.g. after `select_raw("MAX(age)")`
    pub async fn scalar(&self) -> OrmResult<Option<DatabaseValue>> {
        let rows = self.fetch_rows(&self.builder.clone().limit(1)).await?;
        Ok(rows.into_iter().next().map(first_value))
    }

    /// First column of every row, uncast
    pub async fn column(&self) -> OrmResult<Vec<DatabaseValue>> {
        let rows = self.fetch_rows(&self.builder).await?;
        Ok(rows.into_iter().map(first_value).collect())
    }

    async fn aggregate(&self, function: &str, column: &str) -> OrmResult<DatabaseValue> {
        let builder = self
            .builder
            .clone()
            .without_ordering()
            .reselect(&format!("{}({}) AS aggregate", function, column));
        let rows = self.fetch_rows(&builder).await?;
        Ok(rows.into_iter().next().map(first_value).unwrap_or(DatabaseValue::Null))
    }

    /// SUM over the matching rows; 0 when none match
    pub async fn sum(&self, column: &str) -> OrmResult<f64> {
        Ok(self.aggregate("SUM", column).await?.as_f64().unwrap_or(0.0))
    }

    pub async fn avg(&self, column: &str) -> OrmResult<Option<f64>> {
        Ok(self.aggregate("AVG", column).await?.as_f64())
    }

    pub async fn min(&self, column: &str) -> OrmResult<DatabaseValue> {
        self.aggregate("MIN", column).await
    }

    pub async fn max(&self, column: &str) -> OrmResult<DatabaseValue> {
        self.aggregate("MAX", column).await
    }

    /// One page of records plus totals. Pages are 1-based; page 0 reads as 1.
    pub async fn paginate(&self, per_page: u64, page: u64) -> OrmResult<Paginator<Record<E>>> {
        if per_page == 0 {
            return Err(ModelError::usage("Page size must be greater than zero"));
        }
        let page = page.max(1);
        if page_offset(page, per_page).is_none() {
            return Err(ModelError::usage(format!(
                "Page {} of size {} is out of range",
                page, per_page
            )));
        }
        let total = self.count().await?;
        let items = self.clone().for_page(page, per_page).get().await?;
        let meta = PageMeta::new(total, per_page, page, items.len());
        Ok(Paginator { items, meta })
    }

    /// Feed matching records to `callback` in pages of `size`.
    /// Ordered by primary key unless an ordering is set; return
    /// `Ok(false)` from the callback to stop early.
    pub async fn chunk<F, Fut>(&self, size: u64, mut callback: F) -> OrmResult<()>
    where
        F: FnMut(Collection<Record<E>>) -> Fut,
        Fut: Future<Output = OrmResult<bool>>,
    {
        if size == 0 {
            return Err(ModelError::usage("Chunk size must be greater than zero"));
        }

        let mut base = self.clone();
        if !base.builder.has_ordering() {
            let primary_key = base.definition.primary_key_name().to_string();
            base = base.order_by(&primary_key);
        }

        let mut page = 1;
        loop {
            let items = base.clone().for_page(page, size).get().await?;
            let fetched = items.len() as u64;
            if fetched == 0 {
                break;
            }
            debug!("Processing {} chunk {} ({} records)", E::type_name(), page, fetched);
            if !callback(items).await? || fetched < size {
                break;
            }
            page += 1;
        }
        Ok(())
    }

    /// Mass UPDATE of the matching rows. Hooks and mutators are bypassed;
    /// a query without predicates is refused.
    pub async fn update<I, K, V>(&self, values: I) -> OrmResult<u64>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<DatabaseValue>,
    {
        if !self.builder.has_conditions() {
            return Err(ModelError::usage(format!(
                "Refusing to update every row of '{}' without a where clause",
                self.definition.table()
            )));
        }

        let mut sets: IndexMap<String, DatabaseValue> = values
            .into_iter()
            .map(|(column, value)| {
                let column = column.as_ref();
                let value = storage_form(self.definition.cast_for(column), value.into());
                (column.to_string(), value)
            })
            .collect();
        self.touch(&mut sets);
        self.run_update(self.builder.clone(), sets).await
    }

    /// Soft delete the matching rows when enabled (allowed without
    /// predicates), otherwise DELETE them (predicates required)
    pub async fn delete(&self) -> OrmResult<u64> {
        if self.definition.uses_soft_deletes() {
            let mut sets = IndexMap::new();
            sets.insert(
                self.definition.deleted_at_column_name().to_string(),
                now_value(),
            );
            self.touch(&mut sets);
            return self.run_update(self.builder.clone(), sets).await;
        }
        self.run_delete().await
    }

    /// Physically DELETE the matching rows; predicates required
    pub async fn force_delete(&self) -> OrmResult<u64> {
        self.run_delete().await
    }

    /// Clear the soft-delete column on matching trashed rows
    pub async fn restore(&self) -> OrmResult<u64> {
        if !self.definition.uses_soft_deletes() {
            return Err(ModelError::usage(format!(
                "{} does not use soft deletes",
                E::type_name()
            )));
        }
        let mut sets = IndexMap::new();
        sets.insert(
            self.definition.deleted_at_column_name().to_string(),
            DatabaseValue::Null,
        );
        self.touch(&mut sets);
        self.run_update(self.builder.clone().only_trashed(), sets).await
    }

    fn touch(&self, sets: &mut IndexMap<String, DatabaseValue>) {
        let column = self.definition.updated_at_column();
        if self.definition.uses_timestamps() && !sets.contains_key(column) {
            sets.insert(column.to_string(), now_value());
        }
    }

    async fn run_update(
        &self,
        builder: QueryBuilder,
        sets: IndexMap<String, DatabaseValue>,
    ) -> OrmResult<u64> {
        let (sql, params) = builder
            .without_ordering()
            .into_update()
            .set_values(sets)
            .to_sql_with_params()?;
        Ok(self.db.statement(&sql, &params).await?.rows_affected)
    }

    async fn run_delete(&self) -> OrmResult<u64> {
        if !self.builder.has_conditions() {
            return Err(ModelError::usage(format!(
                "Refusing to delete every row of '{}' without a where clause",
                self.definition.table()
            )));
        }
        let (sql, params) = self
            .builder
            .clone()
            .without_ordering()
            .into_delete()
            .to_sql_with_params()?;
        Ok(self.db.statement(&sql, &params).await?.rows_affected)
    }
}

impl<E: Entity> ArrayQuery<E> {
    pub async fn get(&self) -> OrmResult<Collection<Row>> {
        let rows = self.query.fetch_rows(&self.query.builder).await?;
        Ok(rows.into_iter().collect())
    }

    pub async fn first(&self) -> OrmResult<Option<Row>> {
        let builder = self.query.builder.clone().limit(1);
        Ok(self.query.fetch_rows(&builder).await?.into_iter().next())
    }

    pub fn to_sql(&self) -> OrmResult<String> {
        self.query.to_sql()
    }
}

fn first_value(row: Row) -> DatabaseValue {
    row.into_iter()
        .next()
        .map(|(_, value)| value)
        .unwrap_or(DatabaseValue::Null)
}

fn unqualified(column: &str) -> &str {
    column.rsplit('.').next().unwrap_or(column)
}
