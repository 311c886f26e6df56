use std::sync::Arc;
use std::time::Duration;

use crate::api::{DATA_COLUMN, Mutation, StorageBackend, Table, now_micros};
use crate::error::StoreError;

/// How long a cached value stays readable.
///
/// The store has no per-key TTL; each lifetime is a column family of the
/// cache table whose GC policy ages cells out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheLifetime {
    TenMinutes,
    OneHour,
    OneDay,
}

impl CacheLifetime {
    pub const ALL: [CacheLifetime; 3] = [
        CacheLifetime::TenMinutes,
        CacheLifetime::OneHour,
        CacheLifetime::OneDay,
    ];

    pub fn family(&self) -> &'static str {
        match self {
            CacheLifetime::TenMinutes => "10_min",
            CacheLifetime::OneHour => "1_hour",
            CacheLifetime::OneDay => "1_day",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            CacheLifetime::TenMinutes => Duration::from_secs(10 * 60),
            CacheLifetime::OneHour => Duration::from_secs(60 * 60),
            CacheLifetime::OneDay => Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Lifetime-tiered key/value cache over [`Table::Cache`].
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn StorageBackend>,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    pub fn set(&self, key: &str, value: Vec<u8>, lifetime: CacheLifetime) -> Result<(), StoreError> {
        let mutation = Mutation::new().set(lifetime.family(), DATA_COLUMN, now_micros(), value);
        let mut batch = self.backend.begin_write()?;
        batch.apply(Table::Cache, key, mutation)?;
        batch.commit()?;
        Ok(())
    }

    /// Newest value written with `lifetime` that has not expired yet.
    pub fn get(&self, key: &str, lifetime: CacheLifetime) -> Result<Option<Vec<u8>>, StoreError> {
        self.get_at(key, lifetime, now_micros())
    }

    fn get_at(
        &self,
        key: &str,
        lifetime: CacheLifetime,
        now: u64,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let view = self.backend.begin_read()?;
        let Some(row) = view.read_row(Table::Cache, key)? else {
            return Ok(None);
        };
        // The newest version is retained past its age, so expiry is checked here too
        let max_age = lifetime.duration().as_micros() as u64;
        Ok(row
            .latest(lifetime.family(), DATA_COLUMN)
            .filter(|cell| now.saturating_sub(cell.timestamp) <= max_age)
            .map(|cell| cell.value.clone()))
    }
}
