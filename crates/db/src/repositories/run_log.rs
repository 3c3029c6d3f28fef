use chrono::{DateTime, Utc};
use sqlx::Row;

use coreflow_core::domain::bundle::BundleId;
use coreflow_core::domain::run::{OrchestrationRun, RunId};
use coreflow_core::domain::tenant::TenantId;

use super::{RepositoryError, RunLogRepository};
use crate::DbPool;

const RUN_COLUMNS: &str = "run_id, request_id, tenant_id, bundle_id, workflow, status, handler,
                           output_json, confidence, fallback_reason, duration_ms, completed_at";

pub struct SqlRunLogRepository {
    pool: DbPool,
}

impl SqlRunLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_err(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

fn row_to_run(row: &sqlx::sqlite::SqliteRow) -> Result<OrchestrationRun, RepositoryError> {
    let run_id: String = row.try_get("run_id").map_err(decode_err)?;
    let request_id: Option<String> = row.try_get("request_id").map_err(decode_err)?;
    let tenant_id: String = row.try_get("tenant_id").map_err(decode_err)?;
    let bundle_id: String = row.try_get("bundle_id").map_err(decode_err)?;
    let workflow: String = row.try_get("workflow").map_err(decode_err)?;
    let status: String = row.try_get("status").map_err(decode_err)?;
    let handler: Option<String> = row.try_get("handler").map_err(decode_err)?;
    let output_json: String = row.try_get("output_json").map_err(decode_err)?;
    let confidence: Option<f64> = row.try_get("confidence").map_err(decode_err)?;
    let fallback_reason: Option<String> = row.try_get("fallback_reason").map_err(decode_err)?;
    let duration_ms: i64 = row.try_get("duration_ms").map_err(decode_err)?;
    let completed_at: String = row.try_get("completed_at").map_err(decode_err)?;

    Ok(OrchestrationRun {
        run_id: RunId(run_id),
        request_id,
        tenant_id: TenantId(tenant_id),
        bundle_id: BundleId(bundle_id),
        workflow,
        status: status.parse().map_err(decode_err)?,
        handler,
        output: serde_json::from_str(&output_json).map_err(decode_err)?,
        confidence,
        fallback_reason,
        duration_ms: u64::try_from(duration_ms).map_err(decode_err)?,
        completed_at: DateTime::parse_from_rfc3339(&completed_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(decode_err)?,
    })
}

#[async_trait::async_trait]
impl RunLogRepository for SqlRunLogRepository {
    async fn find_by_request(
        &self,
        tenant_id: &TenantId,
        request_id: &str,
    ) -> Result<Option<OrchestrationRun>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {RUN_COLUMNS} FROM orchestration_run WHERE tenant_id = ? AND request_id = ?"
        ))
        .bind(&tenant_id.0)
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_run).transpose()
    }

    async fn record(&self, run: OrchestrationRun) -> Result<(), RepositoryError> {
        let output_json = serde_json::to_string(&run.output).map_err(decode_err)?;
        let duration_ms = i64::try_from(run.duration_ms).unwrap_or(i64::MAX);

        sqlx::query(
            "INSERT INTO orchestration_run (run_id, request_id, tenant_id, bundle_id, workflow,
                                            status, handler, output_json, confidence,
                                            fallback_reason, duration_ms, completed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&run.run_id.0)
        .bind(&run.request_id)
        .bind(&run.tenant_id.0)
        .bind(&run.bundle_id.0)
        .bind(&run.workflow)
        .bind(run.status.as_str())
        .bind(&run.handler)
        .bind(output_json)
        .bind(run.confidence)
        .bind(&run.fallback_reason)
        .bind(duration_ms)
        .bind(run.completed_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_recent(
        &self,
        tenant_id: &TenantId,
        limit: u32,
    ) -> Result<Vec<OrchestrationRun>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {RUN_COLUMNS} FROM orchestration_run
             WHERE tenant_id = ?
             ORDER BY completed_at DESC, rowid DESC
             LIMIT ?"
        ))
        .bind(&tenant_id.0)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_run).collect::<Result<Vec<_>, _>>()
    }
}
