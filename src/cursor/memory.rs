use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::{collections::HashMap, sync::Mutex};

use super::CursorStore;

/// Cursor that lives for the lifetime of the process.
///
/// A restart forgets every position, so the next invocation starts again
/// from the first data row.
#[derive(Default)]
pub struct MemoryCursorStore {
    positions: Mutex<HashMap<String, usize>>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn load(&self, key: &str) -> Result<Option<usize>> {
        let positions = self
            .positions
            .lock()
            .map_err(|_| anyhow!("cursor map lock poisoned"))?;
        Ok(positions.get(key).copied())
    }

    async fn store(&self, key: &str, next_start: usize) -> Result<()> {
        let mut positions = self
            .positions
            .lock()
            .map_err(|_| anyhow!("cursor map lock poisoned"))?;
        positions.insert(key.to_string(), next_start);
        Ok(())
    }
}
