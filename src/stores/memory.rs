//! In-memory `ManifestStore` implementation. Used by unit tests and the
//! mock-collaborator end-to-end scenarios; not suitable for production since
//! all state is lost on restart.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::manifest::{DataType, ManifestId, StructuralManifest};
use crate::store::ManifestStore;

type Identity = (String, String, DataType);

/// All versions ever saved for every identity, in insertion order.
#[derive(Default)]
pub struct MemoryManifestStore {
    versions: RwLock<HashMap<Identity, Vec<StructuralManifest>>>,
}

impl MemoryManifestStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn identity(region_id: &str, source_url: &str, data_type: DataType) -> Identity {
        (region_id.to_string(), source_url.to_string(), data_type)
    }
}

#[async_trait]
impl ManifestStore for MemoryManifestStore {
    async fn find_latest(
        &self,
        region_id: &str,
        source_url: &str,
        data_type: DataType,
    ) -> Result<Option<StructuralManifest>, StoreError> {
        let key = Self::identity(region_id, source_url, data_type);
        let versions = self.versions.read().unwrap();
        Ok(versions
            .get(&key)
            .and_then(|v| v.iter().filter(|m| m.is_active).max_by_key(|m| m.version))
            .cloned())
    }

    async fn save(&self, manifest: StructuralManifest) -> Result<(), StoreError> {
        let key = Self::identity(&manifest.region_id, &manifest.source_url, manifest.data_type);
        let mut versions = self.versions.write().unwrap();
        let entry = versions.entry(key).or_default();

        if entry.iter().any(|m| m.id == manifest.id) {
            return Err(StoreError::Conflict(manifest.id.to_string()));
        }

        for existing in entry.iter_mut() {
            existing.is_active = false;
        }
        entry.push(manifest);
        Ok(())
    }

    async fn increment_success(&self, id: ManifestId, item_count: usize) -> Result<(), StoreError> {
        self.with_manifest_mut(id, |m| {
            m.success_count += 1;
            m.last_item_count = Some(item_count as u64);
            m.last_used_at = Some(crate::store::now());
        })
    }

    async fn increment_failure(&self, id: ManifestId) -> Result<(), StoreError> {
        self.with_manifest_mut(id, |m| {
            m.failure_count += 1;
            m.last_used_at = Some(crate::store::now());
        })
    }

    async fn mark_checked(&self, id: ManifestId) -> Result<(), StoreError> {
        self.with_manifest_mut(id, |m| {
            m.last_checked_at = Some(crate::store::now());
        })
    }

    async fn get_history(
        &self,
        region_id: &str,
        source_url: &str,
        data_type: DataType,
        limit: usize,
    ) -> Result<Vec<StructuralManifest>, StoreError> {
        let key = Self::identity(region_id, source_url, data_type);
        let versions = self.versions.read().unwrap();
        let mut history: Vec<StructuralManifest> = versions.get(&key).cloned().unwrap_or_default();
        history.sort_by(|a, b| b.version.cmp(&a.version));
        history.truncate(limit);
        Ok(history)
    }
}

impl MemoryManifestStore {
    fn with_manifest_mut(&self, id: ManifestId, f: impl FnOnce(&mut StructuralManifest)) -> Result<(), StoreError> {
        let mut versions = self.versions.write().unwrap();
        for entry in versions.values_mut() {
            if let Some(m) = entry.iter_mut().find(|m| m.id == id) {
                f(m);
                return Ok(());
            }
        }
        Err(StoreError::NotFound(id.to_string()))
    }
}
