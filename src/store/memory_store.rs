use std::collections::HashMap;
use std::sync::Mutex;

use super::Storage;

/// Storage that lives exactly as long as the process, like a single tab.
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage {
            items: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn get_name(&self) -> &str {
        "memory"
    }

    fn get_item(&self, key: &str) -> Result<Option<String>, String> {
        let items = self
            .items
            .lock()
            .map_err(|_| "memory storage mutex poisoned".to_string())?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), String> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| "memory storage mutex poisoned".to_string())?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), String> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| "memory storage mutex poisoned".to_string())?;
        items.remove(key);
        Ok(())
    }
}
