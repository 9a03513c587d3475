use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{validate_key, StorageBackend, StorageError, StoredObject};

/// In-memory backend for tests. Puts whose key contains `fail_marker`
/// fail with an I/O error.
#[derive(Default)]
pub struct MemoryBackend {
    objects: Mutex<HashMap<String, StoredObject>>,
    fail_marker: Option<String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(marker: &str) -> Self {
        Self {
            objects: Mutex::default(),
            fail_marker: Some(marker.to_string()),
        }
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        if let Some(marker) = &self.fail_marker {
            if key.contains(marker.as_str()) {
                return Err(StorageError::Io(std::io::Error::other("injected failure")));
            }
        }
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(key) {
            return Err(StorageError::AlreadyExists(key.to_string()));
        }
        objects.insert(
            key.to_string(),
            StoredObject {
                bytes: data.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<StoredObject, StorageError> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }

    fn public_url(&self, key: &str) -> String {
        format!("http://storage.test/{key}")
    }
}
