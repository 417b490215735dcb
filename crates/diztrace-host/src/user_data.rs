//! Script-visible key/value store.
//!
//! Scripts only ever see [`UserDataApi`], which holds the store through the [`UserDataStore`]
//! trait object and exposes get/set/remove/contains/clear.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserDataValue {
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
}

impl UserDataValue {
    /// `true`/`false`, then integers, then floats; anything else is text.
    pub fn parse_cli(raw: &str) -> Self {
        match raw {
            "true" => return UserDataValue::Bool(true),
            "false" => return UserDataValue::Bool(false),
            _ => {}
        }
        if let Ok(v) = raw.parse::<i64>() {
            return UserDataValue::Integer(v);
        }
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => UserDataValue::Number(v),
            _ => UserDataValue::Text(raw.to_owned()),
        }
    }
}

impl fmt::Display for UserDataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserDataValue::Bool(v) => write!(f, "{v}"),
            UserDataValue::Integer(v) => write!(f, "{v}"),
            UserDataValue::Number(v) => write!(f, "{v}"),
            UserDataValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for UserDataValue {
    fn from(v: &str) -> Self {
        UserDataValue::Text(v.to_owned())
    }
}

impl From<i64> for UserDataValue {
    fn from(v: i64) -> Self {
        UserDataValue::Integer(v)
    }
}

impl From<bool> for UserDataValue {
    fn from(v: bool) -> Self {
        UserDataValue::Bool(v)
    }
}

pub trait UserDataStore {
    fn get(&self, key: &str) -> Option<UserDataValue>;
    /// Adds or replaces the entry for `key`.
    fn set(&mut self, key: &str, value: UserDataValue);
    /// Returns whether an entry was present.
    fn remove(&mut self, key: &str) -> bool;
    fn contains_key(&self, key: &str) -> bool;
    fn clear(&mut self);
    fn keys(&self) -> Vec<String>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InMemoryUserData {
    entries: BTreeMap<String, UserDataValue>,
}

impl InMemoryUserData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn save_json<W: Write>(&self, w: W) -> Result<(), UserDataError> {
        serde_json::to_writer_pretty(w, &self.entries)?;
        Ok(())
    }

    pub fn load_json<R: Read>(r: R) -> Result<Self, UserDataError> {
        let entries = serde_json::from_reader(r)?;
        Ok(Self { entries })
    }
}

impl UserDataStore for InMemoryUserData {
    fn get(&self, key: &str) -> Option<UserDataValue> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: UserDataValue) {
        self.entries.insert(key.to_owned(), value);
    }

    fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

#[derive(Debug, Error)]
pub enum UserDataError {
    #[error("invalid user data file: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SharedUserData = Arc<Mutex<dyn UserDataStore + Send>>;

pub fn shared(store: impl UserDataStore + Send + 'static) -> SharedUserData {
    Arc::new(Mutex::new(store))
}

#[derive(Clone)]
pub struct UserDataApi {
    store: SharedUserData,
}

impl UserDataApi {
    pub fn new(store: SharedUserData) -> Self {
        Self { store }
    }

    fn lock(&self) -> MutexGuard<'_, dyn UserDataStore + Send + 'static> {
        // Poisoning is ignored; every store operation is a single map call.
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<UserDataValue> {
        self.lock().get(key)
    }

    pub fn set(&self, key: &str, value: impl Into<UserDataValue>) {
        self.lock().set(key, value.into());
    }

    pub fn remove(&self, key: &str) -> bool {
        self.lock().remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().keys()
    }
}

impl fmt::Debug for UserDataApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserDataApi").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cli_picks_narrowest_type() {
        assert_eq!(UserDataValue::parse_cli("true"), UserDataValue::Bool(true));
        assert_eq!(UserDataValue::parse_cli("-12"), UserDataValue::Integer(-12));
        assert_eq!(UserDataValue::parse_cli("1.5"), UserDataValue::Number(1.5));
        assert_eq!(UserDataValue::parse_cli("NaN"), UserDataValue::Text("NaN".into()));
        assert_eq!(
            UserDataValue::parse_cli("level 3"),
            UserDataValue::Text("level 3".into())
        );
    }

    #[test]
    fn store_operations() {
        let mut store = InMemoryUserData::new();
        assert!(!store.contains_key("lives"));
        store.set("lives", UserDataValue::Integer(3));
        store.set("lives", UserDataValue::Integer(4));
        assert_eq!(store.get("lives"), Some(UserDataValue::Integer(4)));
        assert!(store.remove("lives"));
        assert!(!store.remove("lives"));
        assert_eq!(store.get("lives"), None);

        store.set("a", true.into());
        store.set("b", "x".into());
        assert_eq!(store.keys(), vec!["a".to_string(), "b".to_string()]);
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn json_round_trip() {
        let mut store = InMemoryUserData::new();
        store.set("name", "mario".into());
        store.set("coins", UserDataValue::Integer(99));
        store.set("ratio", UserDataValue::Number(0.25));
        store.set("warp", false.into());

        let mut buf = Vec::new();
        store.save_json(&mut buf).unwrap();
        let loaded = InMemoryUserData::load_json(buf.as_slice()).unwrap();
        assert_eq!(loaded, store);
    }

    #[test]
    fn api_shares_one_store() {
        let store = shared(InMemoryUserData::new());
        let a = UserDataApi::new(store.clone());
        let b = UserDataApi::new(store);
        a.set("k", "v");
        assert!(b.contains_key("k"));
        assert_eq!(b.get("k").map(|v| v.to_string()), Some("v".to_string()));
        b.clear();
        assert!(!a.contains_key("k"));
    }
}
