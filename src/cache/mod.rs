//! Key/value persistence for offline fallback.
//!
//! Cache policy for payouts: a single entry under [`PAYOUTS_CACHE_KEY`]
//! holding the most recent page that was fetched and applied, whichever
//! page number that was. It is not a history and not the full list.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::error::{PayoutError, Result};

pub const PAYOUTS_CACHE_KEY: &str = "payouts_cache";

pub trait CacheStore {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<()>;
}

/// One `<key>.json` file per entry under a directory
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl CacheStore for FileCache {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_for(key), value).map_err(|e| PayoutError::Cache {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryCache {
    entries: HashMap<String, String>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCache {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
