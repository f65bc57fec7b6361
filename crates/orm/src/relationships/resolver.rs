//! Relation access on records: ad-hoc relation queries, on-demand loading
//! and typed reads of the relation cache

use std::sync::Arc;

use super::eager_loading::eager_load;
use super::types::{pivot_table_name, RelationValue};
use crate::backends::DatabaseValue;
use crate::database::Database;
use crate::error::{ModelError, OrmResult};
use crate::model::core_trait::key_stem;
use crate::model::{Entity, Record};
use crate::query::Query;

impl<E: Entity> Record<E> {
    /// The `R` this record points at through `foreign_key`.
    ///
    /// Defaults: `foreign_key` is `<r>_id`, `owner_key` is `R`'s primary
    /// key. Returns `None` without querying when the foreign key is unset.
    pub async fn belongs_to<R: Entity>(
        &self,
        db: &Database,
        foreign_key: Option<&str>,
        owner_key: Option<&str>,
    ) -> OrmResult<Option<Record<R>>> {
        let foreign_key = foreign_key
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}_id", key_stem::<R>()));

        let value = match self.raw(&foreign_key) {
            Some(value) if !value.is_null() => value.clone(),
            _ => return Ok(None),
        };

        let query = Query::<R>::new(db);
        let owner_key = owner_key
            .map(str::to_string)
            .unwrap_or_else(|| query.definition().primary_key_name().to_string());

        query.where_eq(&owner_key, value).first().await
    }

    /// First `R` whose `foreign_key` (default `<e>_id`) equals this
    /// record's `local_key` (default primary key)
    pub async fn has_one<R: Entity>(
        &self,
        db: &Database,
        foreign_key: Option<&str>,
        local_key: Option<&str>,
    ) -> OrmResult<Option<Record<R>>> {
        self.has_many::<R>(db, foreign_key, local_key).first().await
    }

    /// Query over the `R` rows pointing back at this record
    pub fn has_many<R: Entity>(
        &self,
        db: &Database,
        foreign_key: Option<&str>,
        local_key: Option<&str>,
    ) -> Query<R> {
        let foreign_key = foreign_key
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}_id", key_stem::<E>()));

        Query::<R>::new(db).where_eq(&foreign_key, self.local_value(local_key))
    }

    /// Query over the `R` rows linked to this record through a pivot table.
    ///
    /// Defaults: pivot named after both types in alphabetical order
    /// (`role_user`), keys `<e>_id` and `<r>_id`.
    pub fn belongs_to_many<R: Entity>(
        &self,
        db: &Database,
        pivot_table: Option<&str>,
        foreign_pivot_key: Option<&str>,
        related_pivot_key: Option<&str>,
    ) -> Query<R> {
        let owner_stem = key_stem::<E>();
        let related_stem = key_stem::<R>();

        let pivot = pivot_table
            .map(str::to_string)
            .unwrap_or_else(|| pivot_table_name(&owner_stem, &related_stem));
        let foreign_pivot_key = foreign_pivot_key
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}_id", owner_stem));
        let related_pivot_key = related_pivot_key
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}_id", related_stem));

        let query = Query::<R>::new(db);
        let related_table = query.definition().table().to_string();
        let related_key = query.definition().primary_key_name().to_string();

        query
            .select(&format!("{}.*", related_table))
            .join(
                &pivot,
                &format!("{}.{}", related_table, related_key),
                "=",
                &format!("{}.{}", pivot, related_pivot_key),
            )
            .where_eq(
                &format!("{}.{}", pivot, foreign_pivot_key),
                self.local_value(None),
            )
    }

    /// Eager load named relations onto this record
    pub async fn load<I, S>(&mut self, db: &Database, relations: I) -> OrmResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = relations.into_iter().map(Into::into).collect();
        let definition = Arc::clone(&self.definition);
        eager_load(db, &definition, std::slice::from_mut(self), &names).await?;
        Ok(self)
    }

    pub fn relation_loaded(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    /// Read a loaded single-valued relation
    pub fn related_one<R: Entity>(&self, name: &str) -> OrmResult<Option<&Record<R>>> {
        match self.loaded(name)? {
            RelationValue::One(None) => Ok(None),
            RelationValue::One(Some(record)) => record
                .as_any()
                .downcast_ref::<Record<R>>()
                .map(Some)
                .ok_or_else(|| type_mismatch::<R>(name)),
            RelationValue::Many(_) => Err(ModelError::Relationship(format!(
                "Relation '{}' holds many records; use related_many",
                name
            ))),
        }
    }

    /// Read a loaded collection relation
    pub fn related_many<R: Entity>(&self, name: &str) -> OrmResult<Vec<&Record<R>>> {
        match self.loaded(name)? {
            RelationValue::Many(records) => records
                .iter()
                .map(|record| {
                    record
                        .as_any()
                        .downcast_ref::<Record<R>>()
                        .ok_or_else(|| type_mismatch::<R>(name))
                })
                .collect(),
            RelationValue::One(_) => Err(ModelError::Relationship(format!(
                "Relation '{}' holds one record; use related_one",
                name
            ))),
        }
    }

    pub(crate) fn set_relation(&mut self, name: &str, value: RelationValue) {
        self.relations.insert(name.to_string(), value);
    }

    fn loaded(&self, name: &str) -> OrmResult<&RelationValue> {
        self.relations.get(name).ok_or_else(|| {
            ModelError::Relationship(format!(
                "Relation '{}' has not been loaded on {}",
                name,
                E::type_name()
            ))
        })
    }

    fn local_value(&self, local_key: Option<&str>) -> DatabaseValue {
        let column = local_key.unwrap_or_else(|| self.definition.primary_key_name());
        self.raw(column).cloned().unwrap_or(DatabaseValue::Null)
    }
}

fn type_mismatch<R: Entity>(name: &str) -> ModelError {
    ModelError::Relationship(format!(
        "Relation '{}' does not hold {} records",
        name,
        R::type_name()
    ))
}
