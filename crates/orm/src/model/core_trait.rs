//! Core Entity Trait - static description of a database table

use crate::model::definition::EntityDefinition;

/// A type describing one table.
///
/// Entity types are usually unit structs; their rows live in
/// [`Record<E>`](crate::model::Record). The definition is built once per
/// [`Database`](crate::database::Database) and cached.
///
/// ```ignore
/// struct User;
///
/// impl Entity for User {
///     fn definition() -> EntityDefinition<Self> {
///         EntityDefinition::new("users")
///             .fillable(["name", "email"])
///             .hidden(["password"])
///             .has_many::<Post>("posts")
///     }
/// }
/// ```
pub trait Entity: Sized + Send + Sync + 'static {
    fn definition() -> EntityDefinition<Self>;

    /// Short type name, used to derive default relation keys
    fn type_name() -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }
}

/// Lowercased type name, the stem of default foreign keys and pivot tables
pub(crate) fn key_stem<E: Entity>() -> String {
    E::type_name().to_lowercase()
}
