use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    application::repos::{RepoError, StructureWriteRepo},
    domain::{
        entities::{DocumentationRecord, PageGroupRecord},
        tree::VersionFork,
    },
};

use super::{
    PostgresRepositories,
    documentations::{DOCUMENTATION_COLUMNS, DocumentationRow, lander_json},
    map_sqlx_error,
    page_groups::PageGroupRow,
};

#[async_trait]
impl StructureWriteRepo for PostgresRepositories {
    async fn update_group_parent(
        &self,
        group_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> Result<PageGroupRecord, RepoError> {
        let row = sqlx::query_as::<_, PageGroupRow>(
            r#"
            UPDATE page_groups
            SET parent_id = $2
            WHERE id = $1
            RETURNING id, documentation_id, parent_id, name, "order", created_at
            "#,
        )
        .bind(group_id)
        .bind(parent_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(PageGroupRecord::from).ok_or(RepoError::NotFound)
    }

    async fn insert_version(&self, fork: VersionFork) -> Result<DocumentationRecord, RepoError> {
        let VersionFork {
            documentation,
            groups,
            pages,
        } = fork;

        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;

        let sql = format!(
            "INSERT INTO documentations \
             (id, name, version, base_url, cloned_from, primary_color, logo_url, favicon_url, \
              custom_css, lander, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {DOCUMENTATION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DocumentationRow>(&sql)
            .bind(documentation.id)
            .bind(&documentation.name)
            .bind(&documentation.version)
            .bind(&documentation.base_url)
            .bind(documentation.cloned_from)
            .bind(&documentation.primary_color)
            .bind(&documentation.logo_url)
            .bind(&documentation.favicon_url)
            .bind(&documentation.custom_css)
            .bind(lander_json(&documentation))
            .bind(documentation.created_at)
            .bind(documentation.updated_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        // Parents precede children, so each parent row exists when referenced.
        for group in &groups {
            sqlx::query(
                r#"
                INSERT INTO page_groups (id, documentation_id, parent_id, name, "order", created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(group.id)
            .bind(group.documentation_id)
            .bind(group.parent_id)
            .bind(&group.name)
            .bind(group.order)
            .bind(group.created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        for page in &pages {
            sqlx::query(
                r#"
                INSERT INTO pages
                    (id, documentation_id, page_group_id, title, slug, content, "order",
                     is_intro_page, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(page.id)
            .bind(page.documentation_id)
            .bind(page.page_group_id)
            .bind(&page.title)
            .bind(&page.slug)
            .bind(&page.content)
            .bind(page.order)
            .bind(page.is_intro_page)
            .bind(page.created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;

        DocumentationRecord::try_from(row)
    }
}
