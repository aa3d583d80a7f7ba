use std::collections::HashMap;

use chrono::{DateTime, Utc};
use presence_core::error::RepoError;
use presence_core::models::{Channel, ChannelKind};
use presence_core::repository::ChannelRepository;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{PgRepo, map_sqlx};

const CHANNEL_SELECT: &str = "SELECT id, tenant_id, name, label, kind, created_at, updated_at \
                              FROM channels";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ChannelRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub label: String,
    pub kind: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChannelRow {
    pub(crate) fn into_channel(self, skill_group_ids: Vec<Uuid>) -> Result<Channel, RepoError> {
        let kind = ChannelKind::parse(&self.kind).ok_or_else(|| {
            RepoError::backend(format!("channel {} has unknown kind `{}`", self.id, self.kind))
        })?;
        Ok(Channel {
            id: self.id,
            tenant_id: self.tenant_id,
            name: self.name,
            label: self.label,
            kind,
            skill_group_ids,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

async fn load_skill_groups(
    conn: &mut PgConnection,
    channel_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<Uuid>>, RepoError> {
    let mut groups = HashMap::<Uuid, Vec<Uuid>>::new();
    if channel_ids.is_empty() {
        return Ok(groups);
    }
    let rows = sqlx::query_as::<_, (Uuid, Uuid)>(
        "SELECT channel_id, skill_group_id FROM channel_skill_groups \
         WHERE channel_id = ANY($1) ORDER BY channel_id, position",
    )
    .bind(channel_ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(map_sqlx)?;
    for (channel_id, skill_group_id) in rows {
        groups.entry(channel_id).or_default().push(skill_group_id);
    }
    Ok(groups)
}

async fn replace_skill_groups(
    conn: &mut PgConnection,
    channel_id: Uuid,
    skill_group_ids: &[Uuid],
) -> Result<(), RepoError> {
    sqlx::query("DELETE FROM channel_skill_groups WHERE channel_id = $1")
        .bind(channel_id)
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx)?;
    if skill_group_ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        "INSERT INTO channel_skill_groups (channel_id, skill_group_id, position) \
         SELECT $1, g.skill_group_id, (g.ord - 1)::int \
         FROM unnest($2::uuid[]) WITH ORDINALITY AS g(skill_group_id, ord)",
    )
    .bind(channel_id)
    .bind(skill_group_ids)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx)?;
    Ok(())
}

impl PgRepo<'_> {
    async fn hydrate_channels(&mut self, rows: Vec<ChannelRow>) -> Result<Vec<Channel>, RepoError> {
        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let mut groups = load_skill_groups(&mut *self.conn, &ids).await?;
        rows.into_iter()
            .map(|row| {
                let skill_groups = groups.remove(&row.id).unwrap_or_default();
                row.into_channel(skill_groups)
            })
            .collect()
    }

    async fn channels_where(
        &mut self,
        tenant_id: Uuid,
        filter: &str,
        name: Option<&str>,
        id: Option<Uuid>,
    ) -> Result<Vec<Channel>, RepoError> {
        self.scope(tenant_id).await?;
        let sql = format!("{CHANNEL_SELECT} WHERE tenant_id = $1 AND deleted_at IS NULL {filter} ORDER BY name");
        let mut query = sqlx::query_as::<_, ChannelRow>(&sql).bind(tenant_id);
        if let Some(name) = name {
            query = query.bind(name);
        }
        if let Some(id) = id {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&mut *self.conn).await.map_err(map_sqlx)?;
        self.hydrate_channels(rows).await
    }
}

impl ChannelRepository for PgRepo<'_> {
    async fn persist(&mut self, tenant_id: Uuid, channel: &Channel) -> Result<Channel, RepoError> {
        self.scope(tenant_id).await?;
        let row = sqlx::query_as::<_, ChannelRow>(
            r#"
            INSERT INTO channels (id, tenant_id, name, label, kind)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, tenant_id, name, label, kind, created_at, updated_at
            "#,
        )
        .bind(channel.id)
        .bind(tenant_id)
        .bind(&channel.name)
        .bind(&channel.label)
        .bind(channel.kind.as_str())
        .fetch_one(&mut *self.conn)
        .await
        .map_err(map_sqlx)?;
        replace_skill_groups(&mut *self.conn, row.id, &channel.skill_group_ids).await?;
        row.into_channel(channel.skill_group_ids.clone())
    }

    async fn update(&mut self, tenant_id: Uuid, channel: &Channel) -> Result<Channel, RepoError> {
        self.scope(tenant_id).await?;
        let row = sqlx::query_as::<_, ChannelRow>(
            r#"
            UPDATE channels
            SET name = $3, label = $4, kind = $5, updated_at = now()
            WHERE id = $1 AND tenant_id = $2 AND deleted_at IS NULL
            RETURNING id, tenant_id, name, label, kind, created_at, updated_at
            "#,
        )
        .bind(channel.id)
        .bind(tenant_id)
        .bind(&channel.name)
        .bind(&channel.label)
        .bind(channel.kind.as_str())
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(map_sqlx)?
        .ok_or(RepoError::RowMissing {
            table: "channels",
            id: channel.id,
        })?;
        replace_skill_groups(&mut *self.conn, row.id, &channel.skill_group_ids).await?;
        row.into_channel(channel.skill_group_ids.clone())
    }

    async fn get(&mut self, tenant_id: Uuid, id: Uuid) -> Result<Option<Channel>, RepoError> {
        let channels = self.channels_where(tenant_id, "AND id = $2", None, Some(id)).await?;
        Ok(channels.into_iter().next())
    }

    async fn get_by_name(
        &mut self,
        tenant_id: Uuid,
        name: &str,
    ) -> Result<Option<Channel>, RepoError> {
        let channels = self
            .channels_where(tenant_id, "AND name = $2", Some(name), None)
            .await?;
        Ok(channels.into_iter().next())
    }

    async fn get_all(&mut self, tenant_id: Uuid) -> Result<Vec<Channel>, RepoError> {
        self.channels_where(tenant_id, "", None, None).await
    }
}
