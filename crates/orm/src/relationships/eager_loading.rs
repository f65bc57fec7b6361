//! Eager Loading - one query per relation for a whole set of owners

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use super::types::{LoadedRecord, RelationValue, ResolvedRelation};
use crate::backends::DatabaseValue;
use crate::database::Database;
use crate::error::{ModelError, OrmResult};
use crate::model::{Entity, EntityDefinition, Record};

const PIVOT_OWNER_KEY: &str = "pivot_owner_key";

/// Load each named relation for every record in `records`.
///
/// Distinct owner keys are collected in first-seen order and the related
/// rows fetched with a single `IN (...)` query per relation. Owners whose
/// key matches nothing get an empty value cached, so reading the relation
/// afterwards never queries again.
pub(crate) async fn eager_load<E: Entity>(
    db: &Database,
    definition: &EntityDefinition<E>,
    records: &mut [Record<E>],
    relations: &[String],
) -> OrmResult<()> {
    for name in relations {
        let relation = definition.relation_named(name).ok_or_else(|| {
            ModelError::Relationship(format!(
                "Relation '{}' is not defined on {}",
                name,
                E::type_name()
            ))
        })?;
        let resolved = relation.resolve(db, definition);

        let mut keys: IndexMap<String, DatabaseValue> = IndexMap::new();
        for record in records.iter() {
            if let Some(value) = record.raw(&resolved.parent_column) {
                if let Some(key) = value.key_string() {
                    keys.entry(key).or_insert_with(|| value.clone());
                }
            }
        }

        let grouped = if keys.is_empty() {
            IndexMap::new()
        } else {
            debug!(
                "Eager loading {}.{} for {} keys",
                E::type_name(),
                name,
                keys.len()
            );
            fetch_grouped(db, relation.related(), &resolved, keys.into_values()).await?
        };

        for record in records.iter_mut() {
            let matches = record
                .raw(&resolved.parent_column)
                .and_then(DatabaseValue::key_string)
                .and_then(|key| grouped.get(&key));

            let value = if resolved.kind.is_collection() {
                RelationValue::Many(matches.cloned().unwrap_or_default())
            } else {
                RelationValue::One(matches.and_then(|found| found.first().cloned()))
            };
            record.set_relation(name, value);
        }
    }

    Ok(())
}

/// Run the relation query and bucket hydrated records by owner key
async fn fetch_grouped(
    db: &Database,
    related: &dyn super::types::RelatedEntity,
    resolved: &ResolvedRelation,
    keys: impl Iterator<Item = DatabaseValue>,
) -> OrmResult<IndexMap<String, Vec<Arc<dyn LoadedRecord>>>> {
    let mut builder = related.base_query(db);

    if let Some(pivot) = &resolved.pivot {
        builder = builder
            .reselect(&format!("{}.*", resolved.related.table))
            .select_raw(&format!(
                "{}.{} AS {}",
                pivot.table, pivot.foreign_key, PIVOT_OWNER_KEY
            ))
            .join(
                &pivot.table,
                &format!("{}.{}", resolved.related.table, resolved.related.primary_key),
                "=",
                &format!("{}.{}", pivot.table, pivot.related_key),
            );
    }
    let builder = builder.where_in(&resolved.related_column, keys);

    let (sql, params) = builder.to_sql_with_params()?;
    let rows = db.select(&sql, &params).await?;

    let mut grouped: IndexMap<String, Vec<Arc<dyn LoadedRecord>>> = IndexMap::new();
    for mut row in rows {
        let owner_key = if resolved.pivot.is_some() {
            row.shift_remove(PIVOT_OWNER_KEY)
        } else {
            row.get(&resolved.related_column).cloned()
        };
        let Some(key) = owner_key.as_ref().and_then(DatabaseValue::key_string) else {
            continue;
        };
        grouped
            .entry(key)
            .or_default()
            .push(related.hydrate(db, row));
    }

    Ok(grouped)
}
