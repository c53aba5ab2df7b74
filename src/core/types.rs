use std::collections::HashMap;

use super::Value;

/// A full wire record: attribute name to attribute value.
pub type Item = HashMap<String, Value>;

/// The key attributes identifying one record. Structurally the same shape as
/// [`Item`], restricted to the table's key attributes.
pub type Key = HashMap<String, Value>;

/// Opaque expression carrier for conditional writes and updates.
///
/// Expressions are passed through to the backend verbatim; this layer does
/// not build or parse expression syntax.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expr {
    pub condition: Option<String>,
    pub update: Option<String>,
    pub values: HashMap<String, Value>,
}

impl Expr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn condition(mut self, expr: impl Into<String>) -> Self {
        self.condition = Some(expr.into());
        self
    }

    pub fn update(mut self, expr: impl Into<String>) -> Self {
        self.update = Some(expr.into());
        self
    }

    pub fn value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.condition.is_none() && self.update.is_none() && self.values.is_empty()
    }
}

/// Builds a [`Key`] from attribute name/value pairs.
pub fn key<const N: usize>(attrs: [(&str, Value); N]) -> Key {
    attrs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}
