use chrono::{DateTime, Utc};
use presence_core::error::RepoError;
use presence_core::models::Status;
use presence_core::repository::StatusRepository;
use uuid::Uuid;

use crate::{PgRepo, load_transitions, map_sqlx, replace_transitions};

const TRANSITIONS: &str = "status_transitions";

const STATUS_COLUMNS: &str = "id, tenant_id, channel_id, name, label, reason, blocked, system, \
                              starting_status, on_reject, on_timeout, default_blocked, \
                              default_unblocked, timer, timer_transition_id, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct StatusRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub channel_id: Uuid,
    pub name: String,
    pub label: String,
    pub reason: String,
    pub blocked: bool,
    pub system: bool,
    pub starting_status: bool,
    pub on_reject: bool,
    pub on_timeout: bool,
    pub default_blocked: bool,
    pub default_unblocked: bool,
    pub timer: i64,
    pub timer_transition_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StatusRow {
    pub(crate) fn into_status(self, transitions: Vec<Uuid>) -> Status {
        Status {
            id: self.id,
            tenant_id: self.tenant_id,
            channel_id: self.channel_id,
            name: self.name,
            label: self.label,
            reason: self.reason,
            blocked: self.blocked,
            system: self.system,
            starting_status: self.starting_status,
            on_reject: self.on_reject,
            on_timeout: self.on_timeout,
            default_blocked: self.default_blocked,
            default_unblocked: self.default_unblocked,
            timer: self.timer,
            timer_transition_id: self.timer_transition_id,
            transitions,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Filter applied on top of the tenant and soft-delete predicates.
#[derive(Clone, Copy)]
enum StatusFilter<'q> {
    All,
    Id(Uuid),
    Channel(Uuid),
    Channels(&'q [Uuid]),
    Starting(Uuid, bool),
    OnReject(Uuid),
    OnTimeout(Uuid),
    NameInChannel(&'q str, Uuid),
}

impl PgRepo<'_> {
    async fn select_statuses(
        &mut self,
        tenant_id: Uuid,
        filter: StatusFilter<'_>,
    ) -> Result<Vec<Status>, RepoError> {
        self.scope(tenant_id).await?;
        let predicate = match filter {
            StatusFilter::All => "",
            StatusFilter::Id(_) => "AND id = $2",
            StatusFilter::Channel(_) => "AND channel_id = $2",
            StatusFilter::Channels(_) => "AND channel_id = ANY($2)",
            StatusFilter::Starting(..) => "AND channel_id = $2 AND starting_status = $3",
            StatusFilter::OnReject(_) => "AND channel_id = $2 AND on_reject",
            StatusFilter::OnTimeout(_) => "AND channel_id = $2 AND on_timeout",
            StatusFilter::NameInChannel(..) => "AND name = $2 AND channel_id = $3",
        };
        let sql = format!(
            "SELECT {STATUS_COLUMNS} FROM statuses \
             WHERE tenant_id = $1 AND deleted_at IS NULL {predicate} \
             ORDER BY created_at, id"
        );

        let query = sqlx::query_as::<_, StatusRow>(&sql).bind(tenant_id);
        let query = match filter {
            StatusFilter::All => query,
            StatusFilter::Id(id) => query.bind(id),
            StatusFilter::Channel(channel_id)
            | StatusFilter::OnReject(channel_id)
            | StatusFilter::OnTimeout(channel_id) => query.bind(channel_id),
            StatusFilter::Channels(channel_ids) => query.bind(channel_ids),
            StatusFilter::Starting(channel_id, starting) => query.bind(channel_id).bind(starting),
            StatusFilter::NameInChannel(name, channel_id) => query.bind(name).bind(channel_id),
        };
        let rows = query.fetch_all(&mut *self.conn).await.map_err(map_sqlx)?;

        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let mut edges = load_transitions(&mut *self.conn, TRANSITIONS, &ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let transitions = edges.remove(&row.id).unwrap_or_default();
                row.into_status(transitions)
            })
            .collect())
    }

    async fn first_status(
        &mut self,
        tenant_id: Uuid,
        filter: StatusFilter<'_>,
    ) -> Result<Option<Status>, RepoError> {
        let statuses = self.select_statuses(tenant_id, filter).await?;
        Ok(statuses.into_iter().next())
    }
}

impl StatusRepository for PgRepo<'_> {
    async fn persist(&mut self, tenant_id: Uuid, status: &Status) -> Result<Status, RepoError> {
        self.scope(tenant_id).await?;
        let row = sqlx::query_as::<_, StatusRow>(&format!(
            r#"
            INSERT INTO statuses (
                id, tenant_id, channel_id, name, label, reason, blocked, system,
                starting_status, on_reject, on_timeout, default_blocked, default_unblocked,
                timer, timer_transition_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {STATUS_COLUMNS}
            "#
        ))
        .bind(status.id)
        .bind(tenant_id)
        .bind(status.channel_id)
        .bind(&status.name)
        .bind(&status.label)
        .bind(&status.reason)
        .bind(status.blocked)
        .bind(status.system)
        .bind(status.starting_status)
        .bind(status.on_reject)
        .bind(status.on_timeout)
        .bind(status.default_blocked)
        .bind(status.default_unblocked)
        .bind(status.timer)
        .bind(status.timer_transition_id)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(map_sqlx)?;

        replace_transitions(&mut *self.conn, TRANSITIONS, row.id, &status.transitions).await?;
        Ok(row.into_status(status.transitions.clone()))
    }

    async fn update(&mut self, tenant_id: Uuid, status: &Status) -> Result<Status, RepoError> {
        self.scope(tenant_id).await?;
        let row = sqlx::query_as::<_, StatusRow>(&format!(
            r#"
            UPDATE statuses SET
                name = $3, label = $4, reason = $5, blocked = $6, system = $7,
                starting_status = $8, on_reject = $9, on_timeout = $10,
                default_blocked = $11, default_unblocked = $12,
                timer = $13, timer_transition_id = $14, updated_at = now()
            WHERE id = $1 AND tenant_id = $2 AND deleted_at IS NULL
            RETURNING {STATUS_COLUMNS}
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
        .bind(status.on_reject)
        .bind(status.on_timeout)
        .bind(status.default_blocked)
        .bind(status.default_unblocked)
        .bind(status.timer)
        .bind(status.timer_transition_id)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(map_sqlx)?
        .ok_or(RepoError::RowMissing {
            table: "statuses",
            id: status.id,
        })?;

        replace_transitions(&mut *self.conn, TRANSITIONS, row.id, &status.transitions).await?;
        Ok(row.into_status(status.transitions.clone()))
    }

    async fn delete(&mut self, tenant_id: Uuid, status: &Status) -> Result<(), RepoError> {
        self.scope(tenant_id).await?;
        let result = sqlx::query(
            r#"
            UPDATE statuses
            SET deleted_at = now(), starting_status = false, on_reject = false, on_timeout = false
            WHERE id = $1 AND tenant_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(status.id)
        .bind(tenant_id)
        .execute(&mut *self.conn)
        .await
        .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::RowMissing {
                table: "statuses",
                id: status.id,
            });
        }

        sqlx::query("DELETE FROM status_transitions WHERE status_id = $1 OR target_id = $1")
            .bind(status.id)
            .execute(&mut *self.conn)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn get(&mut self, tenant_id: Uuid, id: Uuid) -> Result<Option<Status>, RepoError> {
        self.first_status(tenant_id, StatusFilter::Id(id)).await
    }

    async fn get_all(&mut self, tenant_id: Uuid) -> Result<Vec<Status>, RepoError> {
        self.select_statuses(tenant_id, StatusFilter::All).await
    }

    async fn get_by_channel(
        &mut self,
        tenant_id: Uuid,
        channel_id: Uuid,
    ) -> Result<Vec<Status>, RepoError> {
        self.select_statuses(tenant_id, StatusFilter::Channel(channel_id))
            .await
    }

    async fn get_by_channels(
        &mut self,
        tenant_id: Uuid,
        channel_ids: &[Uuid],
    ) -> Result<Vec<Status>, RepoError> {
        if channel_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select_statuses(tenant_id, StatusFilter::Channels(channel_ids))
            .await
    }

    async fn get_by_channel_and_is_starting(
        &mut self,
        tenant_id: Uuid,
        channel_id: Uuid,
        starting: bool,
    ) -> Result<Option<Status>, RepoError> {
        self.first_status(tenant_id, StatusFilter::Starting(channel_id, starting))
            .await
    }

    async fn get_on_reject_status(
        &mut self,
        tenant_id: Uuid,
        channel_id: Uuid,
    ) -> Result<Option<Status>, RepoError> {
        self.first_status(tenant_id, StatusFilter::OnReject(channel_id))
            .await
    }

    async fn get_on_timeout_status(
        &mut self,
        tenant_id: Uuid,
        channel_id: Uuid,
    ) -> Result<Option<Status>, RepoError> {
        self.first_status(tenant_id, StatusFilter::OnTimeout(channel_id))
            .await
    }

    async fn get_by_name_and_channel(
        &mut self,
        tenant_id: Uuid,
        name: &str,
        channel_id: Uuid,
    ) -> Result<Option<Status>, RepoError> {
        self.first_status(tenant_id, StatusFilter::NameInChannel(name, channel_id))
            .await
    }
}
