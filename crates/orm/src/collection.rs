//! Ordered, optionally keyed collections of query results

use std::cmp::Ordering;
use std::fmt;

use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};

use crate::backends::{DatabaseValue, Row};

/// Anything that can be exported to JSON
pub trait Exportable {
    fn export(&self) -> JsonValue;
}

impl Exportable for JsonValue {
    fn export(&self) -> JsonValue {
        self.clone()
    }
}

impl Exportable for DatabaseValue {
    fn export(&self) -> JsonValue {
        self.to_json()
    }
}

impl Exportable for Row {
    fn export(&self) -> JsonValue {
        JsonValue::Object(
            self.iter()
                .map(|(column, value)| (column.clone(), value.to_json()))
                .collect(),
        )
    }
}

/// Position or name of an item in a [`Collection`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CollectionKey {
    Index(usize),
    Name(String),
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionKey::Index(index) => write!(f, "{}", index),
            CollectionKey::Name(name) => f.write_str(name),
        }
    }
}

impl From<usize> for CollectionKey {
    fn from(index: usize) -> Self {
        CollectionKey::Index(index)
    }
}

impl From<&str> for CollectionKey {
    fn from(name: &str) -> Self {
        CollectionKey::Name(name.to_string())
    }
}

impl From<String> for CollectionKey {
    fn from(name: String) -> Self {
        CollectionKey::Name(name)
    }
}

/// Insertion-ordered items with index or string keys.
///
/// Filtering, mapping and sorting keep each item's key; `values`, `pluck`
/// and `chunk` renumber from zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection<T> {
    items: IndexMap<CollectionKey, T>,
    next_index: usize,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Collection<T> {
    pub fn new() -> Self {
        Self {
            items: IndexMap::new(),
            next_index: 0,
        }
    }

    pub fn from_keyed<I, K>(items: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<CollectionKey>,
    {
        let mut collection = Self::new();
        for (key, item) in items {
            collection.insert(key.into(), item);
        }
        collection
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append under the next free index
    pub fn push(&mut self, item: T) {
        let key = CollectionKey::Index(self.next_index);
        self.insert(key, item);
    }

    /// Insert under `key`; an existing key keeps its position and is overwritten
    pub fn insert(&mut self, key: CollectionKey, item: T) {
        if let CollectionKey::Index(index) = key {
            self.next_index = self.next_index.max(index.saturating_add(1));
        }
        self.items.insert(key, item);
    }

    pub fn get(&self, key: &CollectionKey) -> Option<&T> {
        self.items.get(key)
    }

    /// Item at a position, ignoring keys
    pub fn nth(&self, position: usize) -> Option<&T> {
        self.items.get_index(position).map(|(_, item)| item)
    }

    pub fn first(&self) -> Option<&T> {
        self.nth(0)
    }

    pub fn last(&self) -> Option<&T> {
        self.items.last().map(|(_, item)| item)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.values_mut()
    }

    pub fn iter_keyed(&self) -> impl Iterator<Item = (&CollectionKey, &T)> {
        self.items.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &CollectionKey> {
        self.items.keys()
    }

    /// Items renumbered from zero
    pub fn values(self) -> Self {
        self.items.into_values().collect()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items.into_values().collect()
    }

    pub fn filter<F>(self, mut predicate: F) -> Self
    where
        F: FnMut(&T) -> bool,
    {
        self.retain_keyed(|item| predicate(item))
    }

    pub fn reject<F>(self, mut predicate: F) -> Self
    where
        F: FnMut(&T) -> bool,
    {
        self.retain_keyed(|item| !predicate(item))
    }

    fn retain_keyed<F>(mut self, mut keep: F) -> Self
    where
        F: FnMut(&T) -> bool,
    {
        self.items.retain(|_, item| keep(item));
        self
    }

    pub fn map<U, F>(self, mut f: F) -> Collection<U>
    where
        F: FnMut(T) -> U,
    {
        Collection {
            items: self
                .items
                .into_iter()
                .map(|(key, item)| (key, f(item)))
                .collect(),
            next_index: self.next_index,
        }
    }

    /// Visit items in order until `f` returns `false`
    pub fn each<F>(&self, mut f: F)
    where
        F: FnMut(&T) -> bool,
    {
        for item in self.items.values() {
            if !f(item) {
                break;
            }
        }
    }

    pub fn reduce<A, F>(&self, initial: A, mut f: F) -> A
    where
        F: FnMut(A, &T) -> A,
    {
        self.items.values().fold(initial, |acc, item| f(acc, item))
    }

    /// Buckets in first-seen group order; items keep their keys
    pub fn group_by<F>(self, mut group_of: F) -> Collection<Collection<T>>
    where
        F: FnMut(&T) -> String,
    {
        let mut groups: IndexMap<String, Collection<T>> = IndexMap::new();
        for (key, item) in self.items {
            groups
                .entry(group_of(&item))
                .or_default()
                .insert(key, item);
        }
        Collection::from_keyed(groups)
    }

    /// Stable sort with a comparison callback
    pub fn sort_by<F>(mut self, mut compare: F) -> Self
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.items.sort_by(|_, a, _, b| compare(a, b));
        self
    }

    pub fn reverse(mut self) -> Self {
        self.items.reverse();
        self
    }

    /// Keep the first item for each distinct callback result
    pub fn unique_by<F>(self, mut identity: F) -> Self
    where
        F: FnMut(&T) -> String,
    {
        let mut seen = std::collections::HashSet::new();
        self.retain_keyed(|item| seen.insert(identity(item)))
    }

    /// Re-key by the callback result; later items win on collision
    pub fn key_by<F>(self, mut key_of: F) -> Self
    where
        F: FnMut(&T) -> String,
    {
        let mut keyed = Self::new();
        for item in self.items.into_values() {
            keyed.insert(CollectionKey::Name(key_of(&item)), item);
        }
        keyed
    }

    /// Split into runs of `size` items; a size of zero is treated as one
    pub fn chunk(self, size: usize) -> Collection<Collection<T>> {
        let size = size.max(1);
        let mut chunks = Collection::new();
        let mut current = Collection::new();
        for item in self.items.into_values() {
            current.push(item);
            if current.len() == size {
                chunks.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }

    pub fn contains<F>(&self, mut predicate: F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        self.items.values().any(|item| predicate(item))
    }

    pub fn sum_by<F>(&self, mut value_of: F) -> f64
    where
        F: FnMut(&T) -> f64,
    {
        self.items.values().map(|item| value_of(item)).sum()
    }

    fn is_list(&self) -> bool {
        self.items
            .keys()
            .all(|key| matches!(key, CollectionKey::Index(_)))
    }
}

impl<T: PartialEq> Collection<T> {
    pub fn unique(self) -> Self {
        let mut kept: Vec<(CollectionKey, T)> = Vec::new();
        for (key, item) in self.items {
            if !kept.iter().any(|(_, existing)| *existing == item) {
                kept.push((key, item));
            }
        }
        Collection::from_keyed(kept)
    }

    /// Items not present in `other`
    pub fn diff(self, other: &Collection<T>) -> Self {
        self.retain_keyed(|item| !other.items.values().any(|candidate| candidate == item))
    }
}

impl<T: Exportable> Collection<T> {
    /// Value at a dotted path of each exported item; missing paths give `null`
    pub fn pluck(&self, path: &str) -> Collection<JsonValue> {
        self.items
            .values()
            .map(|item| lookup_path(&item.export(), path))
            .collect()
    }

    /// Ascending sort on a dotted path of the exported items
    pub fn sort_by_path(self, path: &str) -> Self {
        self.sort_by(|a, b| {
            compare_json(&lookup_path(&a.export(), path), &lookup_path(&b.export(), path))
        })
    }

    pub fn sort_by_path_desc(self, path: &str) -> Self {
        self.sort_by(|a, b| {
            compare_json(&lookup_path(&b.export(), path), &lookup_path(&a.export(), path))
        })
    }

    /// A JSON array when every key is an index, an object otherwise
    pub fn to_array(&self) -> JsonValue {
        if self.is_list() {
            JsonValue::Array(self.items.values().map(Exportable::export).collect())
        } else {
            let object: Map<String, JsonValue> = self
                .items
                .iter()
                .map(|(key, item)| (key.to_string(), item.export()))
                .collect();
            JsonValue::Object(object)
        }
    }

    pub fn to_json(&self) -> String {
        self.to_array().to_string()
    }
}

impl<T: Exportable> Exportable for Collection<T> {
    fn export(&self) -> JsonValue {
        self.to_array()
    }
}

impl<T> FromIterator<T> for Collection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut collection = Self::new();
        for item in iter {
            collection.push(item);
        }
        collection
    }
}

impl<T> IntoIterator for Collection<T> {
    type Item = T;
    type IntoIter = indexmap::map::IntoValues<CollectionKey, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_values()
    }
}

impl<'a, T> IntoIterator for &'a Collection<T> {
    type Item = &'a T;
    type IntoIter = indexmap::map::Values<'a, CollectionKey, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.values()
    }
}

fn lookup_path(value: &JsonValue, path: &str) -> JsonValue {
    let mut current = value;
    for segment in path.split('.') {
        let next = match current {
            JsonValue::Object(map) => map.get(segment),
            JsonValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(next) => current = next,
            None => return JsonValue::Null,
        }
    }
    current.clone()
}

/// Null < bool < number < string; arrays and objects compare by their text
fn compare_json(a: &JsonValue, b: &JsonValue) -> Ordering {
    fn rank(value: &JsonValue) -> u8 {
        match value {
            JsonValue::Null => 0,
            JsonValue::Bool(_) => 1,
            JsonValue::Number(_) => 2,
            JsonValue::String(_) => 3,
            JsonValue::Array(_) | JsonValue::Object(_) => 4,
        }
    }

    match (a, b) {
        (JsonValue::Bool(x), JsonValue::Bool(y)) => x.cmp(y),
        (JsonValue::Number(x), JsonValue::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (JsonValue::String(x), JsonValue::String(y)) => x.cmp(y),
        _ if rank(a) == rank(b) => a.to_string().cmp(&b.to_string()),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn people() -> Collection<JsonValue> {
        vec![
            json!({"name": "ann", "age": 31, "team": {"name": "red"}}),
            json!({"name": "bob", "age": 25, "team": {"name": "blue"}}),
            json!({"name": "cid", "age": 31, "team": {"name": "red"}}),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_insert_at_largest_index() {
        let mut items: Collection<JsonValue> = Collection::new();
        items.insert(CollectionKey::Index(usize::MAX), json!("last"));
        items.push(json!("next"));
        assert_eq!(items.get(&CollectionKey::Index(usize::MAX)), Some(&json!("next")));
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_filter_keeps_keys() {
        let old = people().filter(|p| p["age"] == json!(31));
        let keys: Vec<_> = old.keys().cloned().collect();
        assert_eq!(keys, [CollectionKey::Index(0), CollectionKey::Index(2)]);
        let renumbered: Vec<_> = old.values().keys().cloned().collect();
        assert_eq!(renumbered, [CollectionKey::Index(0), CollectionKey::Index(1)]);
    }

    #[test]
    fn test_reject_and_contains() {
        let young = people().reject(|p| p["age"] == json!(31));
        assert_eq!(young.len(), 1);
        assert!(young.contains(|p| p["name"] == json!("bob")));
        assert!(!young.contains(|p| p["name"] == json!("ann")));
    }

    #[test]
    fn test_group_by_in_first_seen_order() {
        let groups = people().group_by(|p| p["team"]["name"].as_str().unwrap_or("").to_string());
        let names: Vec<_> = groups.keys().map(|k| k.to_string()).collect();
        assert_eq!(names, ["red", "blue"]);
        assert_eq!(groups.get(&"red".into()).map(Collection::len), Some(2));
    }

    #[test]
    fn test_sort_by_path_is_stable() {
        let sorted = people().sort_by_path("age");
        assert_eq!(
            sorted.pluck("name").into_vec(),
            [json!("bob"), json!("ann"), json!("cid")]
        );

        let desc = people().sort_by_path_desc("team.name");
        assert_eq!(
            desc.pluck("name").into_vec(),
            [json!("ann"), json!("cid"), json!("bob")]
        );
    }

    #[test]
    fn test_pluck_missing_path_is_null() {
        assert_eq!(people().pluck("team.size").into_vec(), vec![JsonValue::Null; 3]);
    }

    #[test]
    fn test_reduce_and_sum_by() {
        let total = people().reduce(0, |acc, p| acc + p["age"].as_i64().unwrap_or(0));
        assert_eq!(total, 87);
        assert_eq!(people().sum_by(|p| p["age"].as_f64().unwrap_or(0.0)), 87.0);
    }

    #[test]
    fn test_unique_and_unique_by() {
        let numbers: Collection<i64> = vec![1, 2, 1, 3, 2].into_iter().collect();
        assert_eq!(numbers.unique().into_vec(), [1, 2, 3]);

        let by_age = people().unique_by(|p| p["age"].to_string());
        assert_eq!(by_age.pluck("name").into_vec(), [json!("ann"), json!("bob")]);
    }

    #[test]
    fn test_diff() {
        let a: Collection<i64> = vec![1, 2, 3, 4].into_iter().collect();
        let b: Collection<i64> = vec![2, 4].into_iter().collect();
        assert_eq!(a.diff(&b).into_vec(), [1, 3]);
    }

    #[test]
    fn test_key_by_later_wins() {
        let keyed = people().key_by(|p| p["age"].to_string());
        assert_eq!(keyed.len(), 2);
        assert_eq!(keyed.get(&"31".into()).map(|p| p["name"].clone()), Some(json!("cid")));
        assert!(keyed.to_array().is_object());
    }

    #[test]
    fn test_chunk() {
        let numbers: Collection<i64> = (1..=5).collect();
        let chunks = numbers.chunk(2);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.last().map(|c| c.clone().into_vec()), Some(vec![5]));
    }

    #[test]
    fn test_each_stops_early() {
        let mut seen = Vec::new();
        people().each(|p| {
            seen.push(p["name"].clone());
            seen.len() < 2
        });
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_map_reverse_first_last() {
        let names = people().map(|p| p["name"].clone()).reverse();
        assert_eq!(names.first(), Some(&json!("cid")));
        assert_eq!(names.last(), Some(&json!("ann")));
        assert_eq!(names.to_json(), r#"["cid","bob","ann"]"#);
    }

    #[test]
    fn test_export_nested_collections() {
        let inner: Collection<JsonValue> = vec![json!(1), json!(2)].into_iter().collect();
        let nested: Collection<Collection<JsonValue>> =
            vec![inner, Collection::new()].into_iter().collect();
        assert_eq!(nested.to_array(), json!([[1, 2], []]));
    }

    #[test]
    fn test_push_after_named_insert() {
        let mut items = Collection::new();
        items.insert("a".into(), 1);
        items.push(2);
        items.insert(CollectionKey::Index(5), 3);
        items.push(4);
        let keys: Vec<_> = items.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, ["a", "0", "5", "6"]);
    }
}
