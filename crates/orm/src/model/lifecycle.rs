//! Persistence state machine: save, delete, restore, force delete, refresh

use std::sync::Arc;

use tracing::debug;

use crate::backends::DatabaseValue;
use crate::database::Database;
use crate::error::{ModelError, ModelResult};
use crate::events::LifecycleEvent;
use crate::model::attributes::{now_value, AttributeStore};
use crate::model::core_trait::Entity;
use crate::model::record::Record;
use crate::model::validation;
use crate::query::QueryBuilder;

impl<E: Entity> Record<E> {
    /// Insert or update, running validation rules first
    pub async fn save(&mut self, db: &Database) -> ModelResult<bool> {
        self.save_with(db, true).await
    }

    /// Insert or update. `validate` only toggles the validation rules;
    /// hooks always run. `Ok(false)` means a hook cancelled or a rule failed.
    pub async fn save_with(&mut self, db: &Database, validate: bool) -> ModelResult<bool> {
        if self.exists {
            self.perform_update(db, validate).await
        } else {
            self.perform_insert(db, validate).await
        }
    }

    fn passes_validation(&mut self) -> bool {
        let definition = Arc::clone(&self.definition);
        self.errors = validation::validate(definition.rules(), |field| self.store.raw(field));
        if !self.errors.is_empty() {
            debug!("{} failed validation: {}", E::type_name(), self.errors);
        }
        self.errors.is_empty()
    }

    async fn perform_insert(&mut self, db: &Database, validate: bool) -> ModelResult<bool> {
        if validate && !self.passes_validation() {
            return Ok(false);
        }

        let definition = Arc::clone(&self.definition);
        let observers = definition.observers();
        if !observers.before(LifecycleEvent::Saving, self).await? {
            return Ok(false);
        }
        if !observers.before(LifecycleEvent::Creating, self).await? {
            return Ok(false);
        }

        let snapshot = self.store.clone();
        if definition.uses_timestamps() {
            let now = now_value();
            for column in [definition.created_at_column(), definition.updated_at_column()] {
                if self.store.raw(column).map_or(true, DatabaseValue::is_null) {
                    self.store.set_raw(column, now.clone());
                }
            }
        }

        let (sql, params) = QueryBuilder::new()
            .with_dialect(db.dialect())
            .insert_into(definition.table())
            .values(self.store.attributes().clone())
            .to_sql_with_params()?;
        let result = match db.statement(&sql, &params).await {
            Ok(result) => result,
            Err(e) => {
                self.store = snapshot;
                return Err(e);
            }
        };

        let primary_key = definition.primary_key_name();
        if self.store.raw(primary_key).map_or(true, DatabaseValue::is_null) {
            match result.last_insert_id {
                Some(id) => self.store.set_raw(primary_key, DatabaseValue::Int64(id)),
                None => return Err(ModelError::MissingPrimaryKey),
            }
        }

        self.exists = true;
        self.store.sync_original();
        debug!("Inserted {} {}", E::type_name(), self.id());

        observers.after(LifecycleEvent::Created, self).await?;
        observers.after(LifecycleEvent::Saved, self).await?;
        Ok(true)
    }

    async fn perform_update(&mut self, db: &Database, validate: bool) -> ModelResult<bool> {
        if !self.store.is_dirty() {
            return Ok(true);
        }
        if validate && !self.passes_validation() {
            return Ok(false);
        }

        let definition = Arc::clone(&self.definition);
        let observers = definition.observers();
        if !observers.before(LifecycleEvent::Saving, self).await? {
            return Ok(false);
        }
        if !observers.before(LifecycleEvent::Updating, self).await? {
            return Ok(false);
        }

        // hooks may have changed attributes
        let changes = self.store.dirty();
        if changes.is_empty() {
            return Ok(true);
        }

        let snapshot = self.store.clone();
        let mut written = changes.clone();
        if definition.uses_timestamps() && !written.contains_key(definition.updated_at_column()) {
            let now = now_value();
            self.store.set_raw(definition.updated_at_column(), now.clone());
            written.insert(definition.updated_at_column().to_string(), now);
        }

        let key = self.key_value()?;
        let (sql, params) = QueryBuilder::new()
            .with_dialect(db.dialect())
            .update(definition.table())
            .set_values(written.clone())
            .where_eq(definition.primary_key_name(), key)
            .to_sql_with_params()?;
        if let Err(e) = db.statement(&sql, &params).await {
            self.store = snapshot;
            return Err(e);
        }

        self.store.sync_columns(written.keys());
        debug!("Updated {} {} ({} columns)", E::type_name(), self.id(), written.len());

        observers.updated(self, &changes).await?;
        observers.after(LifecycleEvent::Saved, self).await?;
        Ok(true)
    }

    /// Soft delete when enabled, physical delete otherwise
    pub async fn delete(&mut self, db: &Database) -> ModelResult<bool> {
        if !self.exists {
            return Err(ModelError::MissingPrimaryKey);
        }

        let definition = Arc::clone(&self.definition);
        if !definition.uses_soft_deletes() {
            return self.perform_hard_delete(db).await;
        }

        let observers = definition.observers();
        if !observers.before(LifecycleEvent::Deleting, self).await? {
            return Ok(false);
        }

        let snapshot = self.store.clone();
        self.store.set_raw(definition.deleted_at_column_name(), now_value());
        if !self.save_or_revert(db, snapshot).await? {
            return Ok(false);
        }

        observers.after(LifecycleEvent::Deleted, self).await?;
        Ok(true)
    }

    /// Save without validation; attributes go back to `snapshot` when the
    /// save fails or is cancelled
    async fn save_or_revert(
        &mut self,
        db: &Database,
        snapshot: AttributeStore,
    ) -> ModelResult<bool> {
        match self.save_with(db, false).await {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.store = snapshot;
                Ok(false)
            }
            Err(e) => {
                self.store = snapshot;
                Err(e)
            }
        }
    }

    /// Physically delete, even when soft deletes are enabled
    pub async fn force_delete(&mut self, db: &Database) -> ModelResult<bool> {
        if !self.exists {
            return Err(ModelError::MissingPrimaryKey);
        }
        self.perform_hard_delete(db).await
    }

    async fn perform_hard_delete(&mut self, db: &Database) -> ModelResult<bool> {
        let definition = Arc::clone(&self.definition);
        let observers = definition.observers();
        if !observers.before(LifecycleEvent::Deleting, self).await? {
            return Ok(false);
        }

        let key = self.key_value()?;
        let (sql, params) = QueryBuilder::new()
            .with_dialect(db.dialect())
            .delete_from(definition.table())
            .where_eq(definition.primary_key_name(), key)
            .to_sql_with_params()?;
        db.statement(&sql, &params).await?;

        self.exists = false;
        debug!("Deleted {} {}", E::type_name(), self.id());
        observers.after(LifecycleEvent::Deleted, self).await?;

        self.store.clear();
        self.relations.clear();
        Ok(true)
    }

    /// Clear the soft-delete column and save
    pub async fn restore(&mut self, db: &Database) -> ModelResult<bool> {
        let definition = Arc::clone(&self.definition);
        if !definition.uses_soft_deletes() {
            return Err(ModelError::usage(format!(
                "{} does not use soft deletes",
                E::type_name()
            )));
        }
        if !self.exists {
            return Err(ModelError::MissingPrimaryKey);
        }

        let observers = definition.observers();
        if !observers.before(LifecycleEvent::Restoring, self).await? {
            return Ok(false);
        }

        let snapshot = self.store.clone();
        self.store.set_raw(definition.deleted_at_column_name(), DatabaseValue::Null);
        if !self.save_or_revert(db, snapshot).await? {
            return Ok(false);
        }

        observers.after(LifecycleEvent::Restored, self).await?;
        Ok(true)
    }

    /// Reload every attribute from storage, trashed rows included
    pub async fn refresh(&mut self, db: &Database) -> ModelResult<()> {
        let key = self.key_value()?;
        let definition = Arc::clone(&self.definition);
        let (sql, params) = QueryBuilder::table(definition.table())
            .with_dialect(db.dialect())
            .where_eq(definition.primary_key_name(), key.clone())
            .limit(1)
            .to_sql_with_params()?;

        let row = db
            .select(&sql, &params)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::not_found(definition.table(), &key))?;

        self.store = AttributeStore::from_row(row);
        self.relations.clear();
        self.exists = true;
        Ok(())
    }
}
