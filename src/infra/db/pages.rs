use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{PagesRepo, RepoError},
    domain::entities::PageRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct PageRow {
    id: Uuid,
    documentation_id: Uuid,
    page_group_id: Option<Uuid>,
    title: String,
    slug: String,
    content: String,
    order: Option<i32>,
    is_intro_page: bool,
    created_at: OffsetDateTime,
}

impl From<PageRow> for PageRecord {
    fn from(row: PageRow) -> Self {
        Self {
            id: row.id,
            documentation_id: row.documentation_id,
            page_group_id: row.page_group_id,
            title: row.title,
            slug: row.slug,
            content: row.content,
            order: row.order,
            is_intro_page: row.is_intro_page,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl PagesRepo for PostgresRepositories {
    async fn list_pages_for_documentation(
        &self,
        documentation_id: Uuid,
    ) -> Result<Vec<PageRecord>, RepoError> {
        let rows = sqlx::query_as::<_, PageRow>(
            r#"
            SELECT id, documentation_id, page_group_id, title, slug, content, "order",
                   is_intro_page, created_at
            FROM pages
            WHERE documentation_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(documentation_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PageRecord::from).collect())
    }
}
