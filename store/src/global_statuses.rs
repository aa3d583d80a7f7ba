use chrono::{DateTime, Utc};
use presence_core::error::RepoError;
use presence_core::models::GlobalStatus;
use presence_core::repository::GlobalStatusRepository;
use uuid::Uuid;

use crate::{PgRepo, load_transitions, map_sqlx, replace_transitions};

const TRANSITIONS: &str = "global_status_transitions";

const GLOBAL_STATUS_COLUMNS: &str = "id, tenant_id, name, label, reason, blocked, system, \
                                     starting_status, timer, timer_transition_id, \
                                     created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct GlobalStatusRow {
    id: Uuid,
    tenant_id: Uuid,
    name: String,
    label: String,
    reason: String,
    blocked: bool,
    system: bool,
    starting_status: bool,
    timer: i64,
    timer_transition_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GlobalStatusRow {
    fn into_global_status(self, transitions: Vec<Uuid>) -> GlobalStatus {
        GlobalStatus {
            id: self.id,
            tenant_id: self.tenant_id,
            name: self.name,
            label: self.label,
            reason: self.reason,
            blocked: self.blocked,
            system: self.system,
            starting_status: self.starting_status,
            timer: self.timer,
            timer_transition_id: self.timer_transition_id,
            transitions,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl PgRepo<'_> {
    async fn hydrate_global_statuses(
        &mut self,
        rows: Vec<GlobalStatusRow>,
    ) -> Result<Vec<GlobalStatus>, RepoError> {
        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let mut edges = load_transitions(&mut *self.conn, TRANSITIONS, &ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let transitions = edges.remove(&row.id).unwrap_or_default();
                row.into_global_status(transitions)
            })
            .collect())
    }
}

impl GlobalStatusRepository for PgRepo<'_> {
    async fn persist(
        &mut self,
        tenant_id: Uuid,
        status: &GlobalStatus,
    ) -> Result<GlobalStatus, RepoError> {
        self.scope(tenant_id).await?;
        let row = sqlx::query_as::<_, GlobalStatusRow>(&format!(
            r#"
            INSERT INTO global_statuses (
                id, tenant_id, name, label, reason, blocked, system, starting_status,
                timer, timer_transition_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {GLOBAL_STATUS_COLUMNS}
            "#
        ))
        .bind(status.id)
        .bind(tenant_id)
        .bind(&status.name)
        .bind(&status.label)
        .bind(&status.reason)
        .bind(status.blocked)
        .bind(status.system)
        .bind(status.starting_status)
        .bind(status.timer)
        .bind(status.timer_transition_id)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(map_sqlx)?;

        replace_transitions(&mut *self.conn, TRANSITIONS, row.id, &status.transitions).await?;
        Ok(row.into_global_status(status.transitions.clone()))
    }

    async fn update(
        &mut self,
        tenant_id: Uuid,
        status: &GlobalStatus,
    ) -> Result<GlobalStatus, RepoError> {
        self.scope(tenant_id).await?;
        let row = sqlx::query_as::<_, GlobalStatusRow>(&format!(
            r#"
            UPDATE global_statuses SET
                name = $3, label = $4, reason = $5, blocked = $6, system = $7,
                starting_status = $8, timer = $9, timer_transition_id = $10,
                updated_at = now()
            WHERE id = $1 AND tenant_id = $2 AND deleted_at IS NULL
            RETURNING {GLOBAL_STATUS_COLUMNS}
            "#
        ))
        .bind(status.id)
        .bind(tenant_id)
        .bind(&status.name)
        .bind(&status.label)
        .bind(&status.reason)
        .bind(status.blocked)
        .bind(status.system)
        .bind(status.starting_status)
        .bind(status.timer)
        .bind(status.timer_transition_id)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(map_sqlx)?
        .ok_or(RepoError::RowMissing {
            table: "global_statuses",
            id: status.id,
        })?;

        replace_transitions(&mut *self.conn, TRANSITIONS, row.id, &status.transitions).await?;
        Ok(row.into_global_status(status.transitions.clone()))
    }

    async fn get(&mut self, tenant_id: Uuid, id: Uuid) -> Result<Option<GlobalStatus>, RepoError> {
        self.scope(tenant_id).await?;
        let rows = sqlx::query_as::<_, GlobalStatusRow>(&format!(
            "SELECT {GLOBAL_STATUS_COLUMNS} FROM global_statuses \
             WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_all(&mut *self.conn)
        .await
        .map_err(map_sqlx)?;
        Ok(self.hydrate_global_statuses(rows).await?.into_iter().next())
    }

    async fn get_by_name(
        &mut self,
        tenant_id: Uuid,
        name: &str,
    ) -> Result<Option<GlobalStatus>, RepoError> {
        self.scope(tenant_id).await?;
        let rows = sqlx::query_as::<_, GlobalStatusRow>(&format!(
            "SELECT {GLOBAL_STATUS_COLUMNS} FROM global_statuses \
             WHERE tenant_id = $1 AND name = $2 AND deleted_at IS NULL"
        ))
        .bind(tenant_id)
        .bind(name)
        .fetch_all(&mut *self.conn)
        .await
        .map_err(map_sqlx)?;
        Ok(self.hydrate_global_statuses(rows).await?.into_iter().next())
    }

    async fn get_starting(&mut self, tenant_id: Uuid) -> Result<Option<GlobalStatus>, RepoError> {
        self.scope(tenant_id).await?;
        let rows = sqlx::query_as::<_, GlobalStatusRow>(&format!(
            "SELECT {GLOBAL_STATUS_COLUMNS} FROM global_statuses \
             WHERE tenant_id = $1 AND starting_status AND deleted_at IS NULL"
        ))
        .bind(tenant_id)
        .fetch_all(&mut *self.conn)
        .await
        .map_err(map_sqlx)?;
        Ok(self.hydrate_global_statuses(rows).await?.into_iter().next())
    }

    async fn get_all(&mut self, tenant_id: Uuid) -> Result<Vec<GlobalStatus>, RepoError> {
        self.scope(tenant_id).await?;
        let rows = sqlx::query_as::<_, GlobalStatusRow>(&format!(
            "SELECT {GLOBAL_STATUS_COLUMNS} FROM global_statuses \
             WHERE tenant_id = $1 AND deleted_at IS NULL ORDER BY created_at, id"
        ))
        .bind(tenant_id)
        .fetch_all(&mut *self.conn)
        .await
        .map_err(map_sqlx)?;
        self.hydrate_global_statuses(rows).await
    }
}
