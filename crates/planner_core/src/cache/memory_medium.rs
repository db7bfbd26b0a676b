//! Process-local cache medium.

use super::{CacheMedium, CacheResult};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct MemoryCacheMedium {
    entries: HashMap<String, String>,
}

impl MemoryCacheMedium {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheMedium for MemoryCacheMedium {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> CacheResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> CacheResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}
