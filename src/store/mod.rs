// Secret storage for tokens and role credentials
use crate::cache::persist;
use crate::error::{Result, SsoError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Key/value secret store
pub trait SecureStore {
    /// `Err(NotFound)` when the key is absent
    fn get(&self, key: &str) -> Result<Value>;
    fn save(&mut self, key: &str, value: Value) -> Result<()>;
    fn delete(&mut self, key: &str) -> Result<()>;
    fn keys(&self) -> Vec<String>;
}

/// Store key holding the SSO access token for a start URL
pub fn token_key(start_url: &str) -> String {
    format!("token:{}", start_url)
}

/// Store key holding credentials for a role
pub fn credentials_key(arn: &str) -> String {
    format!("credentials:{}", arn)
}

pub fn get_as<T: DeserializeOwned>(store: &dyn SecureStore, key: &str) -> Result<T> {
    let value = store.get(key)?;
    serde_json::from_value(value).map_err(|e| {
        SsoError::Persistence(format!("Unable to decode store entry {}: {}", key, e))
    })
}

pub fn save_as<T: Serialize>(store: &mut dyn SecureStore, key: &str, value: &T) -> Result<()> {
    store.save(key, serde_json::to_value(value)?)
}

/// Store backed by a JSON file readable only by the user
pub struct JsonStore {
    path: PathBuf,
    entries: BTreeMap<String, Value>,
}

impl JsonStore {
    pub fn open(path: &Path) -> Result<Self> {
        let entries = match fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                SsoError::CorruptCache(format!("{}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(SsoError::Io(e)),
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    fn flush(&self) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.entries)?;
        persist::write_atomic(&self.path, &json)
    }
}

impl SecureStore for JsonStore {
    fn get(&self, key: &str) -> Result<Value> {
        self.entries
            .get(key)
            .cloned()
            .ok_or_else(|| SsoError::NotFound(key.to_string()))
    }

    fn save(&mut self, key: &str, value: Value) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        self.flush()
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}
