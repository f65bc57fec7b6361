//! Entity definitions: table metadata, casts, guards, hooks and relations

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::backends::DatabaseValue;
use crate::events::ModelObserver;
use crate::model::attributes::CastType;
use crate::model::core_trait::Entity;
use crate::model::guard::MassAssignmentGuard;
use crate::model::validation::Rule;
use crate::observers::ObserverRegistry;
use crate::relationships::{Relation, TableMeta};

/// Read-side override for one column; receives the raw stored value
pub type Accessor = Arc<dyn Fn(&DatabaseValue) -> DatabaseValue + Send + Sync>;

/// Write-side override for one column; its result is stored
pub type Mutator = Arc<dyn Fn(DatabaseValue) -> DatabaseValue + Send + Sync>;

pub struct EntityDefinition<E: Entity> {
    table: String,
    primary_key: String,
    timestamps: bool,
    created_at_column: String,
    updated_at_column: String,
    soft_deletes: bool,
    deleted_at_column: String,
    guard: MassAssignmentGuard,
    hidden: Vec<String>,
    casts: HashMap<String, CastType>,
    accessors: HashMap<String, Accessor>,
    mutators: HashMap<String, Mutator>,
    rules: Vec<(String, Rule)>,
    observers: ObserverRegistry<E>,
    relations: IndexMap<String, Relation>,
}

impl<E: Entity> EntityDefinition<E> {
    /// Defaults: primary key `id`, timestamps on, soft deletes off
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            primary_key: "id".to_string(),
            timestamps: true,
            created_at_column: "created_at".to_string(),
            updated_at_column: "updated_at".to_string(),
            soft_deletes: false,
            deleted_at_column: "deleted_at".to_string(),
            guard: MassAssignmentGuard::default(),
            hidden: Vec::new(),
            casts: HashMap::new(),
            accessors: HashMap::new(),
            mutators: HashMap::new(),
            rules: Vec::new(),
            observers: ObserverRegistry::new(),
            relations: IndexMap::new(),
        }
    }

    pub fn primary_key(mut self, column: &str) -> Self {
        self.primary_key = column.to_string();
        self
    }

    pub fn timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    pub fn timestamp_columns(mut self, created_at: &str, updated_at: &str) -> Self {
        self.created_at_column = created_at.to_string();
        self.updated_at_column = updated_at.to_string();
        self
    }

    pub fn soft_deletes(mut self, enabled: bool) -> Self {
        self.soft_deletes = enabled;
        self
    }

    pub fn deleted_at_column(mut self, column: &str) -> Self {
        self.deleted_at_column = column.to_string();
        self
    }

    pub fn fillable<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.guard.add_fillable(columns.into_iter().map(Into::into));
        self
    }

    pub fn guarded<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.guard.add_guarded(columns.into_iter().map(Into::into));
        self
    }

    pub fn hidden<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hidden.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn cast(mut self, column: &str, cast: CastType) -> Self {
        self.casts.insert(column.to_string(), cast);
        self
    }

    pub fn accessor<F>(mut self, column: &str, accessor: F) -> Self
    where
        F: Fn(&DatabaseValue) -> DatabaseValue + Send + Sync + 'static,
    {
        self.accessors.insert(column.to_string(), Arc::new(accessor));
        self
    }

    pub fn mutator<F>(mut self, column: &str, mutator: F) -> Self
    where
        F: Fn(DatabaseValue) -> DatabaseValue + Send + Sync + 'static,
    {
        self.mutators.insert(column.to_string(), Arc::new(mutator));
        self
    }

    pub fn rule(mut self, column: &str, rule: Rule) -> Self {
        self.rules.push((column.to_string(), rule));
        self
    }

    /// Register an observer; observers run in registration order
    pub fn observer<O>(mut self, observer: O) -> Self
    where
        O: ModelObserver<E> + 'static,
    {
        self.observers.register(Arc::new(observer));
        self
    }

    /// Register a named relation for eager loading
    pub fn relation(mut self, name: &str, relation: Relation) -> Self {
        self.relations.insert(name.to_string(), relation);
        self
    }

    pub fn belongs_to<R: Entity>(self, name: &str) -> Self {
        self.relation(name, Relation::belongs_to::<R>())
    }

    pub fn has_one<R: Entity>(self, name: &str) -> Self {
        self.relation(name, Relation::has_one::<R>())
    }

    pub fn has_many<R: Entity>(self, name: &str) -> Self {
        self.relation(name, Relation::has_many::<R>())
    }

    pub fn belongs_to_many<R: Entity>(self, name: &str) -> Self {
        self.relation(name, Relation::belongs_to_many::<R>())
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key_name(&self) -> &str {
        &self.primary_key
    }

    pub fn uses_timestamps(&self) -> bool {
        self.timestamps
    }

    pub fn created_at_column(&self) -> &str {
        &self.created_at_column
    }

    pub fn updated_at_column(&self) -> &str {
        &self.updated_at_column
    }

    pub fn uses_soft_deletes(&self) -> bool {
        self.soft_deletes
    }

    pub fn deleted_at_column_name(&self) -> &str {
        &self.deleted_at_column
    }

    pub fn guard(&self) -> &MassAssignmentGuard {
        &self.guard
    }

    pub fn is_fillable(&self, column: &str) -> bool {
        self.guard.is_fillable(column)
    }

    pub fn is_hidden(&self, column: &str) -> bool {
        self.hidden.iter().any(|c| c == column)
    }

    pub fn cast_for(&self, column: &str) -> Option<CastType> {
        self.casts.get(column).copied()
    }

    pub fn accessor_for(&self, column: &str) -> Option<&Accessor> {
        self.accessors.get(column)
    }

    pub fn mutator_for(&self, column: &str) -> Option<&Mutator> {
        self.mutators.get(column)
    }

    pub fn rules(&self) -> &[(String, Rule)] {
        &self.rules
    }

    pub fn observers(&self) -> &ObserverRegistry<E> {
        &self.observers
    }

    pub fn relation_named(&self, name: &str) -> Option<&Relation> {
        self.relations.get(name)
    }

    pub fn relation_names(&self) -> impl Iterator<Item = &String> {
        self.relations.keys()
    }

    pub fn table_meta(&self) -> TableMeta {
        TableMeta {
            table: self.table.clone(),
            primary_key: self.primary_key.clone(),
            soft_delete_column: self
                .soft_deletes
                .then(|| self.deleted_at_column.clone()),
        }
    }
}

impl<E: Entity> fmt::Debug for EntityDefinition<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDefinition")
            .field("entity", &E::type_name())
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .field("timestamps", &self.timestamps)
            .field("soft_deletes", &self.soft_deletes)
            .field("guard", &self.guard)
            .field("hidden", &self.hidden)
            .field("casts", &self.casts)
            .field("observers", &self.observers.observer_count())
            .field("relations", &self.relations.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Account;

    impl Entity for Account {
        fn definition() -> EntityDefinition<Self> {
            EntityDefinition::new("accounts")
                .primary_key("account_id")
                .soft_deletes(true)
                .fillable(["name"])
                .hidden(["secret"])
                .cast("settings", CastType::Json)
        }
    }

    #[test]
    fn test_defaults() {
        let def = EntityDefinition::<Account>::new("accounts");
        assert_eq!(def.primary_key_name(), "id");
        assert!(def.uses_timestamps());
        assert!(!def.uses_soft_deletes());
        assert_eq!(def.created_at_column(), "created_at");
        assert_eq!(def.deleted_at_column_name(), "deleted_at");
        assert!(def.table_meta().soft_delete_column.is_none());
    }

    #[test]
    fn test_builder_settings() {
        let def = Account::definition();
        assert_eq!(def.table(), "accounts");
        assert_eq!(def.primary_key_name(), "account_id");
        assert!(def.is_fillable("name"));
        assert!(!def.is_fillable("secret"));
        assert!(def.is_hidden("secret"));
        assert_eq!(def.cast_for("settings"), Some(CastType::Json));
        assert_eq!(def.cast_for("name"), None);
        assert_eq!(
            def.table_meta().soft_delete_column.as_deref(),
            Some("deleted_at")
        );
    }
}
