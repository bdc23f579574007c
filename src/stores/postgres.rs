//! PostgreSQL `ManifestStore` implementation.
//!
//! Schema: a `manifests` table with a unique index on
//! `(region_id, source_url, data_type, version)` and a partial index on
//! `is_active = true` for the common `find_latest` lookup.
//!
//! ```sql
//! CREATE TABLE manifests (
//!     id UUID PRIMARY KEY,
//!     region_id TEXT NOT NULL,
//!     source_url TEXT NOT NULL,
//!     data_type TEXT NOT NULL,
//!     version INT NOT NULL,
//!     structure_hash TEXT NOT NULL,
//!     prompt_hash TEXT NOT NULL,
//!     extraction_rules JSONB NOT NULL,
//!     diagnostics JSONB NOT NULL,
//!     success_count BIGINT NOT NULL DEFAULT 0,
//!     failure_count BIGINT NOT NULL DEFAULT 0,
//!     last_item_count BIGINT,
//!     is_active BOOLEAN NOT NULL DEFAULT true,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
//!     last_used_at TIMESTAMPTZ,
//!     last_checked_at TIMESTAMPTZ
//! );
//! CREATE UNIQUE INDEX ON manifests (region_id, source_url, data_type, version);
//! CREATE UNIQUE INDEX ON manifests (region_id, source_url, data_type)
//!     WHERE is_active;
//! ```

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::StoreError;
use crate::manifest::{
    AnalysisDiagnostics, DataType, ExtractionRules, ManifestId, StructuralManifest,
};
use crate::store::ManifestStore;

pub struct PostgresManifestStore {
    pool: PgPool,
}

impl PostgresManifestStore {
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Backend(Box::new(e)))?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    fn data_type_str(data_type: DataType) -> &'static str {
        match data_type {
            DataType::Propositions => "propositions",
            DataType::Meetings => "meetings",
            DataType::Representatives => "representatives",
            DataType::CampaignFinance => "campaign_finance",
        }
    }

    fn parse_data_type(s: &str) -> DataType {
        match s {
            "meetings" => DataType::Meetings,
            "representatives" => DataType::Representatives,
            "campaign_finance" => DataType::CampaignFinance,
            _ => DataType::Propositions,
        }
    }

    fn row_to_manifest(row: &sqlx::postgres::PgRow) -> Result<StructuralManifest, StoreError> {
        let extraction_rules: serde_json::Value = row.try_get("extraction_rules").map_err(|e| StoreError::Backend(Box::new(e)))?;
        let diagnostics: serde_json::Value = row.try_get("diagnostics").map_err(|e| StoreError::Backend(Box::new(e)))?;

        Ok(StructuralManifest {
            id: ManifestId(row.try_get::<Uuid, _>("id").map_err(|e| StoreError::Backend(Box::new(e)))?),
            region_id: row.try_get("region_id").map_err(|e| StoreError::Backend(Box::new(e)))?,
            source_url: row.try_get("source_url").map_err(|e| StoreError::Backend(Box::new(e)))?,
            data_type: Self::parse_data_type(&row.try_get::<String, _>("data_type").map_err(|e| StoreError::Backend(Box::new(e)))?),
            version: row.try_get::<i32, _>("version").map_err(|e| StoreError::Backend(Box::new(e)))? as u32,
            structure_hash: row.try_get("structure_hash").map_err(|e| StoreError::Backend(Box::new(e)))?,
            prompt_hash: row.try_get("prompt_hash").map_err(|e| StoreError::Backend(Box::new(e)))?,
            extraction_rules: serde_json::from_value::<ExtractionRules>(extraction_rules)
                .map_err(|e| StoreError::Backend(Box::new(e)))?,
            diagnostics: serde_json::from_value::<AnalysisDiagnostics>(diagnostics)
                .map_err(|e| StoreError::Backend(Box::new(e)))?,
            success_count: row.try_get::<i64, _>("success_count").map_err(|e| StoreError::Backend(Box::new(e)))? as u64,
            failure_count: row.try_get::<i64, _>("failure_count").map_err(|e| StoreError::Backend(Box::new(e)))? as u64,
            last_item_count: row.try_get::<Option<i64>, _>("last_item_count").map_err(|e| StoreError::Backend(Box::new(e)))?.map(|n| n as u64),
            is_active: row.try_get("is_active").map_err(|e| StoreError::Backend(Box::new(e)))?,
            created_at: row.try_get("created_at").map_err(|e| StoreError::Backend(Box::new(e)))?,
            last_used_at: row.try_get("last_used_at").map_err(|e| StoreError::Backend(Box::new(e)))?,
            last_checked_at: row.try_get("last_checked_at").map_err(|e| StoreError::Backend(Box::new(e)))?,
        })
    }
}

#[async_trait]
impl ManifestStore for PostgresManifestStore {
    #[instrument(skip(self))]
    async fn find_latest(
        &self,
        region_id: &str,
        source_url: &str,
        data_type: DataType,
    ) -> Result<Option<StructuralManifest>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT * FROM manifests
            WHERE region_id = $1 AND source_url = $2 AND data_type = $3 AND is_active
            ORDER BY version DESC
            LIMIT 1
            "#,
        )
        .bind(region_id)
        .bind(source_url)
        .bind(Self::data_type_str(data_type))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(Box::new(e)))?;

        row.as_ref().map(Self::row_to_manifest).transpose()
    }

    #[instrument(skip(self, manifest))]
    async fn save(&self, manifest: StructuralManifest) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| StoreError::Backend(Box::new(e)))?;

        let existing = sqlx::query("SELECT 1 FROM manifests WHERE id = $1")
            .bind(manifest.id.0)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(Box::new(e)))?;
        if existing.is_some() {
            return Err(StoreError::Conflict(manifest.id.to_string()));
        }

        sqlx::query(
            "UPDATE manifests SET is_active = false WHERE region_id = $1 AND source_url = $2 AND data_type = $3",
        )
        .bind(&manifest.region_id)
        .bind(&manifest.source_url)
        .bind(Self::data_type_str(manifest.data_type))
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Backend(Box::new(e)))?;

        sqlx::query(
            r#"
            INSERT INTO manifests
                (id, region_id, source_url, data_type, version, structure_hash, prompt_hash,
                 extraction_rules, diagnostics, success_count, failure_count, last_item_count, is_active,
                 created_at, last_used_at, last_checked_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, true, $13, $14, $15)
            "#,
        )
        .bind(manifest.id.0)
        .bind(&manifest.region_id)
        .bind(&manifest.source_url)
        .bind(Self::data_type_str(manifest.data_type))
        .bind(manifest.version as i32)
        .bind(&manifest.structure_hash)
        .bind(&manifest.prompt_hash)
        .bind(serde_json::to_value(&manifest.extraction_rules).map_err(|e| StoreError::Backend(Box::new(e)))?)
        .bind(serde_json::to_value(&manifest.diagnostics).map_err(|e| StoreError::Backend(Box::new(e)))?)
        .bind(manifest.success_count as i64)
        .bind(manifest.failure_count as i64)
        .bind(manifest.last_item_count.map(|n| n as i64))
        .bind(manifest.created_at)
        .bind(manifest.last_used_at)
        .bind(manifest.last_checked_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Backend(Box::new(e)))?;

        tx.commit().await.map_err(|e| StoreError::Backend(Box::new(e)))?;
        debug!(manifest_id = %manifest.id, version = manifest.version, "saved manifest");
        Ok(())
    }

    async fn increment_success(&self, id: ManifestId, item_count: usize) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE manifests SET success_count = success_count + 1, last_item_count = $2, last_used_at = now() WHERE id = $1",
        )
        .bind(id.0)
        .bind(item_count as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(Box::new(e)))?;
        Ok(())
    }

    async fn increment_failure(&self, id: ManifestId) -> Result<(), StoreError> {
        sqlx::query("UPDATE manifests SET failure_count = failure_count + 1, last_used_at = now() WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(Box::new(e)))?;
        Ok(())
    }

    async fn mark_checked(&self, id: ManifestId) -> Result<(), StoreError> {
        sqlx::query("UPDATE manifests SET last_checked_at = now() WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(Box::new(e)))?;
        Ok(())
    }

    async fn get_history(
        &self,
        region_id: &str,
        source_url: &str,
        data_type: DataType,
        limit: usize,
    ) -> Result<Vec<StructuralManifest>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM manifests
            WHERE region_id = $1 AND source_url = $2 AND data_type = $3
            ORDER BY version DESC
            LIMIT $4
            "#,
        )
        .bind(region_id)
        .bind(source_url)
        .bind(Self::data_type_str(data_type))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(Box::new(e)))?;

        rows.iter().map(Self::row_to_manifest).collect::<Result<Vec<_>, _>>().map(|v| {
            info!(count = v.len(), "loaded manifest history");
            v
        })
    }
}
