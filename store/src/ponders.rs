use chrono::{DateTime, Utc};
use presence_core::error::RepoError;
use presence_core::models::{Ponder, PonderKey};
use presence_core::repository::PonderRepository;
use uuid::Uuid;

use crate::{PgRepo, map_sqlx};

const PONDER_COLUMNS: &str = "id, tenant_id, channel_id, skill_group_id, object, label, name, \
                              value, enabled, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct PonderRow {
    id: Uuid,
    tenant_id: Uuid,
    channel_id: Uuid,
    skill_group_id: Option<Uuid>,
    object: String,
    label: String,
    name: String,
    value: f64,
    enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PonderRow> for Ponder {
    fn from(row: PonderRow) -> Self {
        Ponder {
            id: row.id,
            tenant_id: row.tenant_id,
            channel_id: row.channel_id,
            skill_group_id: row.skill_group_id,
            object: row.object,
            label: row.label,
            name: row.name,
            value: row.value,
            enabled: row.enabled,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl PonderRepository for PgRepo<'_> {
    async fn persist(&mut self, tenant_id: Uuid, ponder: &Ponder) -> Result<Ponder, RepoError> {
        self.scope(tenant_id).await?;
        let row = sqlx::query_as::<_, PonderRow>(&format!(
            r#"
            INSERT INTO ponders (
                id, tenant_id, channel_id, skill_group_id, object, label, name, value, enabled
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {PONDER_COLUMNS}
            "#
        ))
        .bind(ponder.id)
        .bind(tenant_id)
        .bind(ponder.channel_id)
        .bind(ponder.skill_group_id)
        .bind(&ponder.object)
        .bind(&ponder.label)
        .bind(&ponder.name)
        .bind(ponder.value)
        .bind(ponder.enabled)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(map_sqlx)?;
        Ok(row.into())
    }

    async fn get_by_key(
        &mut self,
        tenant_id: Uuid,
        key: &PonderKey,
    ) -> Result<Option<Ponder>, RepoError> {
        self.scope(tenant_id).await?;
        let row = sqlx::query_as::<_, PonderRow>(&format!(
            "SELECT {PONDER_COLUMNS} FROM ponders \
             WHERE tenant_id = $1 AND channel_id = $2 \
               AND skill_group_id IS NOT DISTINCT FROM $3 \
               AND object = $4 AND name = $5 AND deleted_at IS NULL"
        ))
        .bind(tenant_id)
        .bind(key.channel_id)
        .bind(key.skill_group_id)
        .bind(&key.object)
        .bind(&key.name)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(Ponder::from))
    }

    async fn get_by_channel(
        &mut self,
        tenant_id: Uuid,
        channel_id: Uuid,
    ) -> Result<Vec<Ponder>, RepoError> {
        self.scope(tenant_id).await?;
        let rows = sqlx::query_as::<_, PonderRow>(&format!(
            "SELECT {PONDER_COLUMNS} FROM ponders \
             WHERE tenant_id = $1 AND channel_id = $2 AND deleted_at IS NULL \
             ORDER BY object, name, skill_group_id NULLS FIRST"
        ))
        .bind(tenant_id)
        .bind(channel_id)
        .fetch_all(&mut *self.conn)
        .await
        .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(Ponder::from).collect())
    }
}
