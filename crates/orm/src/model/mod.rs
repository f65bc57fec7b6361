//! Model System - entities, records and their persistence lifecycle
//!
//! - `core_trait`: the [`Entity`] trait implemented by table types
//! - `definition`: per-type metadata built once and cached
//! - `attributes`: raw attribute storage, dirty tracking and casts
//! - `guard`: mass-assignment protection
//! - `validation`: rules checked before a save
//! - `record`: the Active Record instance
//! - `lifecycle`: save / delete / restore / refresh
//! - `crud_operations`: static entry points such as `find` and `create`

pub mod attributes;
pub mod core_trait;
pub mod crud_operations;
pub mod definition;
pub mod guard;
pub mod lifecycle;
pub mod record;
pub mod validation;

pub use attributes::{AttributeStore, CastType};
pub use core_trait::Entity;
pub use crud_operations::CrudOperations;
pub use definition::{Accessor, EntityDefinition, Mutator};
pub use guard::MassAssignmentGuard;
pub use record::Record;
pub use validation::{Rule, ValidationErrors};
