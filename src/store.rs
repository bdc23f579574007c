//! A persistent map of
//! `(region_id, source_url, data_type)` identity to ordered manifest
//! versions. Implementations must serialize concurrent `save` calls on the
//! same identity and bump counters atomically.

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StoreError;
use crate::manifest::{DataType, ManifestId, StructuralManifest};

#[async_trait]
pub trait ManifestStore: Send + Sync {
    /// The highest-versioned, `is_active = true` manifest for this identity,
    /// if one exists.
    async fn find_latest(
        &self,
        region_id: &str,
        source_url: &str,
        data_type: DataType,
    ) -> Result<Option<StructuralManifest>, StoreError>;

    /// Persist a newly-derived manifest, atomically deactivating any prior
    /// active version for the same identity. Returns `StoreError::Conflict`
    /// if `manifest.id` already exists.
    async fn save(&self, manifest: StructuralManifest) -> Result<(), StoreError>;

    /// Bump the success counter and record `item_count` as the identity's
    /// `last_item_count` for the next run's count-drop check.
    async fn increment_success(&self, id: ManifestId, item_count: usize) -> Result<(), StoreError>;
    async fn increment_failure(&self, id: ManifestId) -> Result<(), StoreError>;
    async fn mark_checked(&self, id: ManifestId) -> Result<(), StoreError>;

    /// Manifest versions for this identity, most recent first, capped at
    /// `limit`.
    async fn get_history(
        &self,
        region_id: &str,
        source_url: &str,
        data_type: DataType,
        limit: usize,
    ) -> Result<Vec<StructuralManifest>, StoreError>;
}

/// Helper timestamp for store implementations that stamp `last_used_at`
/// alongside a counter bump.
pub(crate) fn now() -> chrono::DateTime<Utc> {
    Utc::now()
}
