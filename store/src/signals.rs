use chrono::{DateTime, Utc};
use presence_core::error::RepoError;
use presence_core::models::Signal;
use presence_core::repository::SignalRepository;
use uuid::Uuid;

use crate::{PgRepo, map_sqlx};

const SIGNAL_COLUMNS: &str = "id, tenant_id, channel_id, status_id, service, model_name, action, \
                              signal_name, enabled, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct SignalRow {
    id: Uuid,
    tenant_id: Uuid,
    channel_id: Uuid,
    status_id: Option<Uuid>,
    service: String,
    model_name: String,
    action: String,
    signal_name: String,
    enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SignalRow> for Signal {
    fn from(row: SignalRow) -> Self {
        Signal {
            id: row.id,
            tenant_id: row.tenant_id,
            channel_id: row.channel_id,
            status_id: row.status_id,
            service: row.service,
            model_name: row.model_name,
            action: row.action,
            signal_name: row.signal_name,
            enabled: row.enabled,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl SignalRepository for PgRepo<'_> {
    async fn persist(&mut self, tenant_id: Uuid, signal: &Signal) -> Result<Signal, RepoError> {
        self.scope(tenant_id).await?;
        let row = sqlx::query_as::<_, SignalRow>(&format!(
            r#"
            INSERT INTO signals (
                id, tenant_id, channel_id, status_id, service, model_name, action,
                signal_name, enabled
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {SIGNAL_COLUMNS}
            "#
        ))
        .bind(signal.id)
        .bind(tenant_id)
        .bind(signal.channel_id)
        .bind(signal.status_id)
        .bind(&signal.service)
        .bind(&signal.model_name)
        .bind(&signal.action)
        .bind(&signal.signal_name)
        .bind(signal.enabled)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(map_sqlx)?;
        Ok(row.into())
    }

    async fn update(&mut self, tenant_id: Uuid, signal: &Signal) -> Result<Signal, RepoError> {
        self.scope(tenant_id).await?;
        let row = sqlx::query_as::<_, SignalRow>(&format!(
            r#"
            UPDATE signals SET
                status_id = $3, service = $4, model_name = $5, action = $6,
                signal_name = $7, enabled = $8, updated_at = now()
            WHERE id = $1 AND tenant_id = $2 AND deleted_at IS NULL
            RETURNING {SIGNAL_COLUMNS}
            "#
        ))
        .bind(signal.id)
        .bind(tenant_id)
        .bind(signal.status_id)
        .bind(&signal.service)
        .bind(&signal.model_name)
        .bind(&signal.action)
        .bind(&signal.signal_name)
        .bind(signal.enabled)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(map_sqlx)?
        .ok_or(RepoError::RowMissing {
            table: "signals",
            id: signal.id,
        })?;
        Ok(row.into())
    }

    async fn get_by_service_model_action_and_channel(
        &mut self,
        tenant_id: Uuid,
        service: &str,
        model_name: &str,
        action: &str,
        channel_id: Uuid,
    ) -> Result<Option<Signal>, RepoError> {
        self.scope(tenant_id).await?;
        let row = sqlx::query_as::<_, SignalRow>(&format!(
            "SELECT {SIGNAL_COLUMNS} FROM signals \
             WHERE tenant_id = $1 AND channel_id = $2 AND service = $3 \
               AND model_name = $4 AND action = $5 AND deleted_at IS NULL"
        ))
        .bind(tenant_id)
        .bind(channel_id)
        .bind(service)
        .bind(model_name)
        .bind(action)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(Signal::from))
    }

    async fn get_by_channel(
        &mut self,
        tenant_id: Uuid,
        channel_id: Uuid,
    ) -> Result<Vec<Signal>, RepoError> {
        self.scope(tenant_id).await?;
        let rows = sqlx::query_as::<_, SignalRow>(&format!(
            "SELECT {SIGNAL_COLUMNS} FROM signals \
             WHERE tenant_id = $1 AND channel_id = $2 AND deleted_at IS NULL \
             ORDER BY signal_name"
        ))
        .bind(tenant_id)
        .bind(channel_id)
        .fetch_all(&mut *self.conn)
        .await
        .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(Signal::from).collect())
    }

    async fn get_by_status(
        &mut self,
        tenant_id: Uuid,
        status_id: Uuid,
    ) -> Result<Vec<Signal>, RepoError> {
        self.scope(tenant_id).await?;
        let rows = sqlx::query_as::<_, SignalRow>(&format!(
            "SELECT {SIGNAL_COLUMNS} FROM signals \
             WHERE tenant_id = $1 AND status_id = $2 AND deleted_at IS NULL"
        ))
        .bind(tenant_id)
        .bind(status_id)
        .fetch_all(&mut *self.conn)
        .await
        .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(Signal::from).collect())
    }
}
