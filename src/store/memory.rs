use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::AppResult;

use super::MappingStore;

/// Non-durable [`MappingStore`] for tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MappingStore for MemoryStore {
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        Ok(self.entries.lock().expect("store mutex poisoned").get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> AppResult<()> {
        self.entries
            .lock()
            .expect("store mutex poisoned")
            .insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.entries.lock().expect("store mutex poisoned").remove(key);
        Ok(())
    }

    async fn list_keys(&self, offset: i64, limit: i64) -> AppResult<Vec<String>> {
        Ok(self
            .entries
            .lock()
            .expect("store mutex poisoned")
            .keys()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}
