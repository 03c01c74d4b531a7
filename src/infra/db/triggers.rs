use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{MarkProcessedParams, RepoError, TriggersRepo},
    domain::{entities::BuildTriggerRecord, types::BuildStatus},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct TriggerRow {
    id: Uuid,
    documentation_id: Uuid,
    triggered: bool,
    status: BuildStatus,
    last_error: Option<String>,
    created_at: Option<OffsetDateTime>,
    completed_at: Option<OffsetDateTime>,
}

impl From<TriggerRow> for BuildTriggerRecord {
    fn from(row: TriggerRow) -> Self {
        Self {
            id: row.id,
            documentation_id: row.documentation_id,
            triggered: row.triggered,
            status: row.status,
            last_error: row.last_error,
            created_at: row.created_at,
            completed_at: row.completed_at,
        }
    }
}

#[async_trait]
impl TriggersRepo for PostgresRepositories {
    async fn insert_trigger(
        &self,
        documentation_id: Uuid,
        created_at: OffsetDateTime,
    ) -> Result<BuildTriggerRecord, RepoError> {
        let row = sqlx::query_as::<_, TriggerRow>(
            r#"
            INSERT INTO build_triggers (id, documentation_id, triggered, status, created_at)
            VALUES ($1, $2, FALSE, $3, $4)
            RETURNING id, documentation_id, triggered, status, last_error, created_at, completed_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(documentation_id)
        .bind(BuildStatus::Pending)
        .bind(created_at)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn list_pending(&self) -> Result<Vec<BuildTriggerRecord>, RepoError> {
        let rows = sqlx::query_as::<_, TriggerRow>(
            r#"
            SELECT id, documentation_id, triggered, status, last_error, created_at, completed_at
            FROM build_triggers
            WHERE triggered = FALSE
            ORDER BY created_at ASC NULLS LAST, id ASC
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(BuildTriggerRecord::from).collect())
    }

    async fn mark_processed(&self, params: MarkProcessedParams) -> Result<u64, RepoError> {
        if params.ids.is_empty() {
            return Ok(0);
        }

        // Rows already settled by an earlier pass keep their outcome.
        let result = sqlx::query(
            r#"
            UPDATE build_triggers
            SET triggered = TRUE,
                status = $2,
                last_error = $3,
                completed_at = $4
            WHERE id = ANY($1) AND triggered = FALSE
            "#,
        )
        .bind(&params.ids)
        .bind(params.status)
        .bind(params.last_error)
        .bind(params.completed_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn latest_per_documentation(&self) -> Result<Vec<BuildTriggerRecord>, RepoError> {
        let rows = sqlx::query_as::<_, TriggerRow>(
            r#"
            SELECT DISTINCT ON (documentation_id)
                   id, documentation_id, triggered, status, last_error, created_at, completed_at
            FROM build_triggers
            ORDER BY documentation_id, created_at DESC NULLS LAST, id DESC
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(BuildTriggerRecord::from).collect())
    }
}
