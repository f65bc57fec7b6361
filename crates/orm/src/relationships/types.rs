//! Relationship Types - relation descriptors and loaded relation values

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::backends::{DatabaseValue, Row};
use crate::database::Database;
use crate::model::core_trait::key_stem;
use crate::model::{Entity, EntityDefinition, Record};
use crate::query::{Query, QueryBuilder};

/// The four supported relation shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// Foreign key on this table points at the related primary key
    BelongsTo,
    /// Foreign key on the related table points back at this record
    HasOne,
    HasMany,
    /// Linked through a pivot table holding both keys
    BelongsToMany,
}

impl RelationKind {
    pub fn is_collection(self) -> bool {
        matches!(self, Self::HasMany | Self::BelongsToMany)
    }

    pub fn requires_pivot(self) -> bool {
        matches!(self, Self::BelongsToMany)
    }
}

/// Table facts needed to build relation queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMeta {
    pub table: String,
    pub primary_key: String,
    pub soft_delete_column: Option<String>,
}

/// A hydrated record of some entity, stored type-erased in a relation cache
pub trait LoadedRecord: Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;

    /// Exported form, hidden columns omitted
    fn export(&self) -> JsonValue;

    /// Stored value of `column`, `Null` when absent
    fn raw_attribute(&self, column: &str) -> DatabaseValue;
}

/// Type-erased handle on the related entity of a [`Relation`]
pub trait RelatedEntity: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn key_stem(&self) -> String;

    fn table_meta(&self, db: &Database) -> TableMeta;

    /// SELECT over the related table with its soft-delete scope applied
    fn base_query(&self, db: &Database) -> QueryBuilder;

    fn hydrate(&self, db: &Database, row: Row) -> Arc<dyn LoadedRecord>;
}

/// [`RelatedEntity`] for the entity `R`
pub struct Related<R>(PhantomData<fn() -> R>);

impl<R> Related<R> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<R> Default for Related<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Entity> RelatedEntity for Related<R> {
    fn type_name(&self) -> &'static str {
        R::type_name()
    }

    fn key_stem(&self) -> String {
        key_stem::<R>()
    }

    fn table_meta(&self, db: &Database) -> TableMeta {
        db.definition::<R>().table_meta()
    }

    fn base_query(&self, db: &Database) -> QueryBuilder {
        Query::<R>::new(db).builder().clone()
    }

    fn hydrate(&self, db: &Database, row: Row) -> Arc<dyn LoadedRecord> {
        Arc::new(Record::<R>::from_row(db.definition::<R>(), row))
    }
}

/// A named relation registered on an [`EntityDefinition`].
///
/// Keys left unset are derived from the type names when the relation is
/// resolved: `<related>_id` for belongs-to, `<owner>_id` for has-one and
/// has-many, and for belongs-to-many a pivot named after both types in
/// alphabetical order.
#[derive(Clone)]
pub struct Relation {
    kind: RelationKind,
    related: Arc<dyn RelatedEntity>,
    foreign_key: Option<String>,
    local_key: Option<String>,
    owner_key: Option<String>,
    pivot_table: Option<String>,
    related_pivot_key: Option<String>,
}

impl Relation {
    fn new<R: Entity>(kind: RelationKind) -> Self {
        Self {
            kind,
            related: Arc::new(Related::<R>::new()),
            foreign_key: None,
            local_key: None,
            owner_key: None,
            pivot_table: None,
            related_pivot_key: None,
        }
    }

    pub fn belongs_to<R: Entity>() -> Self {
        Self::new::<R>(RelationKind::BelongsTo)
    }

    pub fn has_one<R: Entity>() -> Self {
        Self::new::<R>(RelationKind::HasOne)
    }

    pub fn has_many<R: Entity>() -> Self {
        Self::new::<R>(RelationKind::HasMany)
    }

    pub fn belongs_to_many<R: Entity>() -> Self {
        Self::new::<R>(RelationKind::BelongsToMany)
    }

    /// The foreign key column; for belongs-to-many, the pivot column
    /// pointing at the owner
    pub fn foreign_key(mut self, column: &str) -> Self {
        self.foreign_key = Some(column.to_string());
        self
    }

    /// Owner-side key for has-one, has-many and belongs-to-many
    pub fn local_key(mut self, column: &str) -> Self {
        self.local_key = Some(column.to_string());
        self
    }

    /// Related-side key a belongs-to foreign key refers to
    pub fn owner_key(mut self, column: &str) -> Self {
        self.owner_key = Some(column.to_string());
        self
    }

    pub fn pivot_table(mut self, table: &str) -> Self {
        self.pivot_table = Some(table.to_string());
        self
    }

    /// Pivot column pointing at the related table
    pub fn related_pivot_key(mut self, column: &str) -> Self {
        self.related_pivot_key = Some(column.to_string());
        self
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    pub fn related_type_name(&self) -> &'static str {
        self.related.type_name()
    }

    pub(crate) fn related(&self) -> &dyn RelatedEntity {
        self.related.as_ref()
    }

    /// Fill in default keys for an owner of type `E`
    pub(crate) fn resolve<E: Entity>(
        &self,
        db: &Database,
        owner: &EntityDefinition<E>,
    ) -> ResolvedRelation {
        let related = self.related.table_meta(db);
        let owner_stem = key_stem::<E>();
        let related_stem = self.related.key_stem();

        match self.kind {
            RelationKind::BelongsTo => ResolvedRelation {
                kind: self.kind,
                parent_column: self
                    .foreign_key
                    .clone()
                    .unwrap_or_else(|| format!("{}_id", related_stem)),
                related_column: self
                    .owner_key
                    .clone()
                    .unwrap_or_else(|| related.primary_key.clone()),
                pivot: None,
                related,
            },
            RelationKind::HasOne | RelationKind::HasMany => ResolvedRelation {
                kind: self.kind,
                parent_column: self
                    .local_key
                    .clone()
                    .unwrap_or_else(|| owner.primary_key_name().to_string()),
                related_column: self
                    .foreign_key
                    .clone()
                    .unwrap_or_else(|| format!("{}_id", owner_stem)),
                pivot: None,
                related,
            },
            RelationKind::BelongsToMany => {
                let pivot = PivotTable {
                    table: self
                        .pivot_table
                        .clone()
                        .unwrap_or_else(|| pivot_table_name(&owner_stem, &related_stem)),
                    foreign_key: self
                        .foreign_key
                        .clone()
                        .unwrap_or_else(|| format!("{}_id", owner_stem)),
                    related_key: self
                        .related_pivot_key
                        .clone()
                        .unwrap_or_else(|| format!("{}_id", related_stem)),
                };
                ResolvedRelation {
                    kind: self.kind,
                    parent_column: self
                        .local_key
                        .clone()
                        .unwrap_or_else(|| owner.primary_key_name().to_string()),
                    related_column: format!("{}.{}", pivot.table, pivot.foreign_key),
                    pivot: Some(pivot),
                    related,
                }
            }
        }
    }
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("kind", &self.kind)
            .field("related", &self.related.type_name())
            .field("foreign_key", &self.foreign_key)
            .field("local_key", &self.local_key)
            .field("owner_key", &self.owner_key)
            .field("pivot_table", &self.pivot_table)
            .field("related_pivot_key", &self.related_pivot_key)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PivotTable {
    pub table: String,
    pub foreign_key: String,
    pub related_key: String,
}

/// A relation with every key filled in
#[derive(Debug, Clone)]
pub(crate) struct ResolvedRelation {
    pub kind: RelationKind,
    pub related: TableMeta,
    /// Column on the owner whose values select the related rows
    pub parent_column: String,
    /// Column the owner values are matched against
    pub related_column: String,
    pub pivot: Option<PivotTable>,
}

/// Default pivot table: both stems sorted and joined with `_`
pub(crate) fn pivot_table_name(a: &str, b: &str) -> String {
    if a <= b {
        format!("{}_{}", a, b)
    } else {
        format!("{}_{}", b, a)
    }
}

/// Cached result of loading one relation on one record
#[derive(Debug, Clone)]
pub enum RelationValue {
    One(Option<Arc<dyn LoadedRecord>>),
    Many(Vec<Arc<dyn LoadedRecord>>),
}

impl RelationValue {
    pub fn export(&self) -> JsonValue {
        match self {
            Self::One(None) => JsonValue::Null,
            Self::One(Some(record)) => record.export(),
            Self::Many(records) => {
                JsonValue::Array(records.iter().map(|record| record.export()).collect())
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::One(record) => usize::from(record.is_some()),
            Self::Many(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pivot_name_is_alphabetical() {
        assert_eq!(pivot_table_name("user", "role"), "role_user");
        assert_eq!(pivot_table_name("role", "user"), "role_user");
        assert_eq!(pivot_table_name("post", "tag"), "post_tag");
    }

    #[test]
    fn test_kind_flags() {
        assert!(RelationKind::HasMany.is_collection());
        assert!(RelationKind::BelongsToMany.is_collection());
        assert!(!RelationKind::BelongsTo.is_collection());
        assert!(RelationKind::BelongsToMany.requires_pivot());
        assert!(!RelationKind::HasOne.requires_pivot());
    }

    #[test]
    fn test_empty_relation_values_export() {
        assert_eq!(RelationValue::One(None).export(), JsonValue::Null);
        assert_eq!(RelationValue::Many(Vec::new()).export(), serde_json::json!([]));
        assert!(RelationValue::Many(Vec::new()).is_empty());
    }
}
