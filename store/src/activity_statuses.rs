use chrono::{DateTime, Utc};
use presence_core::error::RepoError;
use presence_core::models::ActivityStatus;
use presence_core::repository::ActivityStatusRepository;
use uuid::Uuid;

use crate::{PgRepo, map_sqlx};

#[derive(Debug, sqlx::FromRow)]
struct ActivityStatusRow {
    id: Uuid,
    tenant_id: Uuid,
    name: String,
    label: String,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ActivityStatusRow> for ActivityStatus {
    fn from(row: ActivityStatusRow) -> Self {
        ActivityStatus {
            id: row.id,
            tenant_id: row.tenant_id,
            name: row.name,
            label: row.label,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl ActivityStatusRepository for PgRepo<'_> {
    async fn persist(
        &mut self,
        tenant_id: Uuid,
        status: &ActivityStatus,
    ) -> Result<ActivityStatus, RepoError> {
        self.scope(tenant_id).await?;
        let row = sqlx::query_as::<_, ActivityStatusRow>(
            r#"
            INSERT INTO activity_statuses (id, tenant_id, name, label, description)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, tenant_id, name, label, description, created_at, updated_at
            "#,
        )
        .bind(status.id)
        .bind(tenant_id)
        .bind(&status.name)
        .bind(&status.label)
        .bind(&status.description)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(map_sqlx)?;
        Ok(row.into())
    }

    async fn get_by_name(
        &mut self,
        tenant_id: Uuid,
        name: &str,
    ) -> Result<Option<ActivityStatus>, RepoError> {
        self.scope(tenant_id).await?;
        let row = sqlx::query_as::<_, ActivityStatusRow>(
            r#"
            SELECT id, tenant_id, name, label, description, created_at, updated_at
            FROM activity_statuses
            WHERE tenant_id = $1 AND name = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(name)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(ActivityStatus::from))
    }

    async fn get_all(&mut self, tenant_id: Uuid) -> Result<Vec<ActivityStatus>, RepoError> {
        self.scope(tenant_id).await?;
        let rows = sqlx::query_as::<_, ActivityStatusRow>(
            r#"
            SELECT id, tenant_id, name, label, description, created_at, updated_at
            FROM activity_statuses
            WHERE tenant_id = $1 AND deleted_at IS NULL
            ORDER BY name
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&mut *self.conn)
        .await
        .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(ActivityStatus::from).collect())
    }
}
