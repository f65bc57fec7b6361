//! Record - one row of an entity's table, the Active Record instance

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};
use tracing::{trace, warn};

use crate::backends::{DatabaseValue, Row};
use crate::collection::Exportable;
use crate::database::Database;
use crate::error::{ModelError, ModelResult};
use crate::model::attributes::{cast_value, storage_form, AttributeStore};
use crate::model::core_trait::Entity;
use crate::model::definition::EntityDefinition;
use crate::model::validation::ValidationErrors;
use crate::relationships::{LoadedRecord, RelationValue};

pub struct Record<E: Entity> {
    pub(crate) definition: Arc<EntityDefinition<E>>,
    pub(crate) store: AttributeStore,
    pub(crate) exists: bool,
    pub(crate) relations: IndexMap<String, RelationValue>,
    pub(crate) errors: ValidationErrors,
}

impl<E: Entity> Clone for Record<E> {
    fn clone(&self) -> Self {
        Self {
            definition: Arc::clone(&self.definition),
            store: self.store.clone(),
            exists: self.exists,
            relations: self.relations.clone(),
            errors: self.errors.clone(),
        }
    }
}

impl<E: Entity> Record<E> {
    /// A transient record using the definition cached in `db`
    pub fn new(db: &Database) -> Self {
        Self::with_definition(db.definition::<E>())
    }

    pub fn with_definition(definition: Arc<EntityDefinition<E>>) -> Self {
        Self {
            definition,
            store: AttributeStore::new(),
            exists: false,
            relations: IndexMap::new(),
            errors: ValidationErrors::new(),
        }
    }

    /// Hydrate a persisted record; mutators are not applied
    pub(crate) fn from_row(definition: Arc<EntityDefinition<E>>, row: Row) -> Self {
        Self {
            definition,
            store: AttributeStore::from_row(row),
            exists: true,
            relations: IndexMap::new(),
            errors: ValidationErrors::new(),
        }
    }

    pub fn definition(&self) -> &EntityDefinition<E> {
        &self.definition
    }

    /// True once the record has been inserted or loaded
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Assign fillable columns; others are skipped silently
    pub fn fill<I, K, V>(&mut self, attributes: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<DatabaseValue>,
    {
        for (column, value) in attributes {
            let column = column.as_ref();
            if self.definition.is_fillable(column) {
                self.set(column, value);
            } else {
                trace!("Skipping guarded attribute '{}' on {}", column, E::type_name());
            }
        }
        self
    }

    /// Assign columns without the mass-assignment guard
    pub fn force_fill<I, K, V>(&mut self, attributes: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<DatabaseValue>,
    {
        for (column, value) in attributes {
            self.set(column.as_ref(), value);
        }
        self
    }

    /// Set one attribute through its mutator, if any
    pub fn set<V: Into<DatabaseValue>>(&mut self, column: &str, value: V) -> &mut Self {
        let mut value = value.into();
        if let Some(mutator) = self.definition.mutator_for(column) {
            value = mutator(value);
        }
        let value = storage_form(self.definition.cast_for(column), value);
        self.store.set_raw(column, value);
        self
    }

    /// Drop an attribute so it is neither read nor written
    pub fn unset(&mut self, column: &str) -> &mut Self {
        self.store.remove(column);
        self
    }

    /// Attribute value after accessor or cast. Unset columns read as `Null`.
    pub fn get(&self, column: &str) -> ModelResult<DatabaseValue> {
        let raw = self.store.raw(column);

        if let Some(accessor) = self.definition.accessor_for(column) {
            return Ok(match raw {
                Some(value) => accessor(value),
                None => accessor(&DatabaseValue::Null),
            });
        }

        match (raw, self.definition.cast_for(column)) {
            (None, _) => Ok(DatabaseValue::Null),
            (Some(value), Some(cast)) => cast_value(column, cast, value),
            (Some(value), None) => Ok(value.clone()),
        }
    }

    /// Attribute deserialized into `T`
    pub fn get_as<T: DeserializeOwned>(&self, column: &str) -> ModelResult<T> {
        let value = self.get(column)?;
        serde_json::from_value(value.to_json())
            .map_err(|e| ModelError::cast(column, e.to_string()))
    }

    /// Stored value without accessor or cast
    pub fn raw(&self, column: &str) -> Option<&DatabaseValue> {
        self.store.raw(column)
    }

    /// Primary key value, `Null` when unset
    pub fn id(&self) -> DatabaseValue {
        self.store
            .raw(self.definition.primary_key_name())
            .cloned()
            .unwrap_or(DatabaseValue::Null)
    }

    pub(crate) fn key_value(&self) -> ModelResult<DatabaseValue> {
        match self.id() {
            DatabaseValue::Null => Err(ModelError::MissingPrimaryKey),
            key => Ok(key),
        }
    }

    pub fn attributes(&self) -> &IndexMap<String, DatabaseValue> {
        self.store.attributes()
    }

    pub fn original(&self) -> &IndexMap<String, DatabaseValue> {
        self.store.original()
    }

    pub fn is_dirty(&self) -> bool {
        self.store.is_dirty()
    }

    pub fn is_column_dirty(&self, column: &str) -> bool {
        self.store.is_column_dirty(column)
    }

    pub fn dirty(&self) -> IndexMap<String, DatabaseValue> {
        self.store.dirty()
    }

    /// Soft-deleted: the entity uses soft deletes and the column is set
    pub fn is_trashed(&self) -> bool {
        self.definition.uses_soft_deletes()
            && self
                .store
                .raw(self.definition.deleted_at_column_name())
                .map(|value| !value.is_null())
                .unwrap_or(false)
    }

    /// Validation messages from the last validating `save`
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// Export visible attributes (cast) and loaded relations
    pub fn to_array(&self) -> JsonValue {
        let mut object = Map::new();

        for (column, raw) in self.store.attributes() {
            if self.definition.is_hidden(column) {
                continue;
            }
            let value = match self.get(column) {
                Ok(value) => value.to_json(),
                Err(err) => {
                    warn!("Exporting raw value for {}.{}: {}", E::type_name(), column, err);
                    raw.to_json()
                }
            };
            object.insert(column.clone(), value);
        }

        for (name, relation) in &self.relations {
            if !self.definition.is_hidden(name) {
                object.insert(name.clone(), relation.export());
            }
        }

        JsonValue::Object(object)
    }

    pub fn to_json(&self) -> String {
        self.to_array().to_string()
    }
}

impl<E: Entity> Exportable for Record<E> {
    fn export(&self) -> JsonValue {
        self.to_array()
    }
}

impl<E: Entity> LoadedRecord for Record<E> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn export(&self) -> JsonValue {
        self.to_array()
    }

    fn raw_attribute(&self, column: &str) -> DatabaseValue {
        self.store.raw(column).cloned().unwrap_or(DatabaseValue::Null)
    }
}

impl<E: Entity> fmt::Debug for Record<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(E::type_name())
            .field("exists", &self.exists)
            .field("attributes", self.store.attributes())
            .field("relations", &self.relations.keys().collect::<Vec<_>>())
            .finish()
    }
}
