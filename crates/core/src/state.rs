//! Scoped state bags
//!
//! Three scopes exist:
//! - `User`: keyed by user ID, survives dialog and conversation boundaries
//! - `Conversation`: keyed by conversation ID, survives dialog push/pop,
//!   cleared when the conversation ends
//! - `DialogStack`: keyed by conversation ID, holds the serialized dialog
//!   stack including each instance's private data

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// State scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateScope {
    User,
    Conversation,
    DialogStack,
}

impl StateScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Conversation => "conversation",
            Self::DialogStack => "dialog_stack",
        }
    }

    /// All scopes, in storage order
    pub fn all() -> [StateScope; 3] {
        [Self::User, Self::Conversation, Self::DialogStack]
    }
}

impl std::fmt::Display for StateScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key-value mapping stored per scope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateBag(Map<String, Value>);

impl StateBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a bag from a JSON value; non-objects yield an empty bag
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Boolean flag; missing or non-boolean values read as `false`
    pub fn flag(&self, key: &str) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Deserialize a stored value into `T`
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.0
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Serialize `value` and store it under `key`
    pub fn set_as<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.0.insert(key.into(), value);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }
}

/// One bag replacement inside a [`StateStore::commit`](crate::StateStore::commit)
#[derive(Debug, Clone, PartialEq)]
pub struct StateWrite {
    pub scope: StateScope,
    pub id: String,
    pub bag: StateBag,
}

impl StateWrite {
    pub fn new(scope: StateScope, id: impl Into<String>, bag: StateBag) -> Self {
        Self {
            scope,
            id: id.into(),
            bag,
        }
    }
}
