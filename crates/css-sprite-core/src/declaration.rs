use crate::background::{self, Decomposition};
use serde::{Deserialize, Serialize};

/// Ordered property map of one style rule.
///
/// Insertion order is the serialization order. Names are stored lowercased by the
/// parser; lookups are exact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    props: Vec<(String, String)>,
}

impl Declaration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.props
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// True if `name` is present with a non-empty value.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some_and(|v| !v.trim().is_empty())
    }

    /// Index of `name` in property order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.props.iter().position(|(k, _)| k == name)
    }

    /// Replaces the value in place, or appends the property if absent.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.props.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.props.push((name, value)),
        }
    }

    /// Removes any existing `name` and appends it at the end of the property order.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.props.push((name, value.into()));
    }

    /// Inserts at `index` (clamped to the end). An existing `name` is removed first.
    pub fn insert_at(&mut self, index: usize, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        let index = index.min(self.props.len());
        self.props.insert(index, (name, value.into()));
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self.position(name)?;
        Some(self.props.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.props.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.props.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    /// Expands a single-layer `background` shorthand into longhands.
    pub fn decompose(&mut self) -> Decomposition {
        background::decompose(self)
    }

    /// Folds background longhands back into one `background` shorthand.
    pub fn merge(&mut self) {
        background::merge(self)
    }

    /// Splits `background-position` into `-x`/`-y` at the same position in the order.
    pub fn split_position(&mut self) {
        background::split_position(self)
    }

    /// Joins `background-position-x`/`-y` back into `background-position`.
    pub fn join_position(&mut self) {
        background::join_position(self)
    }

    /// Serializes as `name: value; ...` without braces.
    pub fn to_css(&self) -> String {
        self.props
            .iter()
            .map(|(k, v)| format!("{k}: {v};"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Declaration {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut decl = Declaration::new();
        for (k, v) in iter {
            decl.set(k, v);
        }
        decl
    }
}
