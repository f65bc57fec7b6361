//! Relationships Module - belongs-to, has-one, has-many and
//! belongs-to-many relations with batched eager loading

pub mod eager_loading;
pub mod resolver;
pub mod types;

pub use types::{
    LoadedRecord, Related, RelatedEntity, Relation, RelationKind, RelationValue, TableMeta,
};
