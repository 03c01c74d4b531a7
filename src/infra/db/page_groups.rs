use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{PageGroupsRepo, RepoError},
    domain::entities::PageGroupRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
pub(super) struct PageGroupRow {
    id: Uuid,
    documentation_id: Uuid,
    parent_id: Option<Uuid>,
    name: String,
    order: Option<i32>,
    created_at: OffsetDateTime,
}

impl From<PageGroupRow> for PageGroupRecord {
    fn from(row: PageGroupRow) -> Self {
        Self {
            id: row.id,
            documentation_id: row.documentation_id,
            parent_id: row.parent_id,
            name: row.name,
            order: row.order,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl PageGroupsRepo for PostgresRepositories {
    async fn find_group(&self, id: Uuid) -> Result<Option<PageGroupRecord>, RepoError> {
        let row = sqlx::query_as::<_, PageGroupRow>(
            r#"
            SELECT id, documentation_id, parent_id, name, "order", created_at
            FROM page_groups
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PageGroupRecord::from))
    }

    async fn list_groups_for_documentation(
        &self,
        documentation_id: Uuid,
    ) -> Result<Vec<PageGroupRecord>, RepoError> {
        let rows = sqlx::query_as::<_, PageGroupRow>(
            r#"
            SELECT id, documentation_id, parent_id, name, "order", created_at
            FROM page_groups
            WHERE documentation_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(documentation_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PageGroupRecord::from).collect())
    }
}
