use async_trait::async_trait;
use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{DocumentationRepo, RepoError},
    domain::entities::{DocumentationRecord, LanderMetadata},
};

use super::{PostgresRepositories, map_sqlx_error};

pub(super) const DOCUMENTATION_COLUMNS: &str = "id, name, version, base_url, cloned_from, \
    primary_color, logo_url, favicon_url, custom_css, lander, created_at, updated_at";

#[derive(sqlx::FromRow)]
pub(super) struct DocumentationRow {
    id: Uuid,
    name: String,
    version: String,
    base_url: String,
    cloned_from: Option<Uuid>,
    primary_color: Option<String>,
    logo_url: Option<String>,
    favicon_url: Option<String>,
    custom_css: Option<String>,
    lander: Option<serde_json::Value>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<DocumentationRow> for DocumentationRecord {
    type Error = RepoError;

    fn try_from(row: DocumentationRow) -> Result<Self, Self::Error> {
        let lander = row
            .lander
            .filter(|value| !value.is_null())
            .map(serde_json::from_value::<LanderMetadata>)
            .transpose()
            .map_err(|err| RepoError::Integrity {
                message: format!("documentation `{}` has malformed lander: {err}", row.id),
            })?;

        Ok(Self {
            id: row.id,
            name: row.name,
            version: row.version,
            base_url: row.base_url,
            cloned_from: row.cloned_from,
            primary_color: row.primary_color,
            logo_url: row.logo_url,
            favicon_url: row.favicon_url,
            custom_css: row.custom_css,
            lander,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub(super) fn lander_json(record: &DocumentationRecord) -> Option<Json<&LanderMetadata>> {
    record.lander.as_ref().map(Json)
}

fn convert_rows(rows: Vec<DocumentationRow>) -> Result<Vec<DocumentationRecord>, RepoError> {
    rows.into_iter().map(DocumentationRecord::try_from).collect()
}

#[async_trait]
impl DocumentationRepo for PostgresRepositories {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<DocumentationRecord>, RepoError> {
        let sql = format!("SELECT {DOCUMENTATION_COLUMNS} FROM documentations WHERE id = $1");
        let row = sqlx::query_as::<_, DocumentationRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(DocumentationRecord::try_from).transpose()
    }

    async fn list_lineage_roots(&self) -> Result<Vec<DocumentationRecord>, RepoError> {
        let sql = format!(
            "SELECT {DOCUMENTATION_COLUMNS} FROM documentations \
             WHERE cloned_from IS NULL \
             ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, DocumentationRow>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        convert_rows(rows)
    }

    async fn list_cloned_from(&self, id: Uuid) -> Result<Vec<DocumentationRecord>, RepoError> {
        let sql = format!(
            "SELECT {DOCUMENTATION_COLUMNS} FROM documentations \
             WHERE cloned_from = $1 \
             ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, DocumentationRow>(&sql)
            .bind(id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        convert_rows(rows)
    }
}
