//! PostgreSQL implementation of the presence repository contracts.
//!
//! One [`PgUnitOfWork`] wraps one database transaction. Tenant-scoped tables
//! are protected by row level security keyed on the
//! `presence.current_tenant_id` setting, which every repository sets with
//! `set_config(.., true)` before touching tenant data. Queries still filter by
//! `tenant_id` explicitly.

mod activity_statuses;
mod channels;
pub mod config;
mod global_statuses;
mod ponders;
mod signals;
mod statuses;
mod tenants;

use presence_core::error::RepoError;
use presence_core::repository::{Store, UnitOfWork};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

pub use config::{ConfigError, StoreConfig};

/// Translates driver errors. Unique violations (SQLSTATE 23505) become
/// [`RepoError::Conflict`] carrying the constraint name.
pub(crate) fn map_sqlx(err: sqlx::Error) -> RepoError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.code().as_deref() == Some("23505") {
            let constraint = db_err.constraint().unwrap_or("unique constraint");
            return RepoError::Conflict(constraint.to_string());
        }
    }
    RepoError::backend(err)
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &StoreConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await?;
        tracing::info!(max_connections = config.max_connections, "connected to database");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        tracing::debug!("migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Store for PgStore {
    type Tx = PgUnitOfWork;

    async fn begin(&self) -> Result<PgUnitOfWork, RepoError> {
        let tx = self.pool.begin().await.map_err(map_sqlx)?;
        Ok(PgUnitOfWork { tx, scope: None })
    }
}

/// A database transaction. Dropping it without `commit` rolls back.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
    /// Tenant the RLS setting currently points at
    scope: Option<Uuid>,
}

impl PgUnitOfWork {
    fn repo(&mut self) -> PgRepo<'_> {
        PgRepo {
            conn: &mut *self.tx,
            scope: &mut self.scope,
        }
    }
}

impl UnitOfWork for PgUnitOfWork {
    type Tenants<'a> = PgRepo<'a>;
    type Channels<'a> = PgRepo<'a>;
    type Statuses<'a> = PgRepo<'a>;
    type GlobalStatuses<'a> = PgRepo<'a>;
    type Signals<'a> = PgRepo<'a>;
    type ActivityStatuses<'a> = PgRepo<'a>;
    type Ponders<'a> = PgRepo<'a>;

    fn tenants(&mut self) -> PgRepo<'_> {
        self.repo()
    }

    fn channels(&mut self) -> PgRepo<'_> {
        self.repo()
    }

    fn statuses(&mut self) -> PgRepo<'_> {
        self.repo()
    }

    fn global_statuses(&mut self) -> PgRepo<'_> {
        self.repo()
    }

    fn signals(&mut self) -> PgRepo<'_> {
        self.repo()
    }

    fn activity_statuses(&mut self) -> PgRepo<'_> {
        self.repo()
    }

    fn ponders(&mut self) -> PgRepo<'_> {
        self.repo()
    }

    async fn commit(self) -> Result<(), RepoError> {
        self.tx.commit().await.map_err(map_sqlx)
    }
}

/// Repository view over the connection of one [`PgUnitOfWork`].
pub struct PgRepo<'a> {
    conn: &'a mut PgConnection,
    scope: &'a mut Option<Uuid>,
}

impl PgRepo<'_> {
    /// Points row level security at `tenant_id` for the rest of the transaction.
    async fn scope(&mut self, tenant_id: Uuid) -> Result<(), RepoError> {
        if *self.scope == Some(tenant_id) {
            return Ok(());
        }
        sqlx::query("SELECT set_config('presence.current_tenant_id', $1, true)")
            .bind(tenant_id.to_string())
            .execute(&mut *self.conn)
            .await
            .map_err(map_sqlx)?;
        *self.scope = Some(tenant_id);
        Ok(())
    }
}

/// Rewrites the ordered edge list of one row in a `*_transitions` join table.
pub(crate) async fn replace_transitions(
    conn: &mut PgConnection,
    table: &str,
    status_id: Uuid,
    targets: &[Uuid],
) -> Result<(), RepoError> {
    sqlx::query(&format!("DELETE FROM {table} WHERE status_id = $1"))
        .bind(status_id)
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx)?;
    if targets.is_empty() {
        return Ok(());
    }
    sqlx::query(&format!(
        "INSERT INTO {table} (status_id, target_id, position) \
         SELECT $1, t.target_id, (t.ord - 1)::int \
         FROM unnest($2::uuid[]) WITH ORDINALITY AS t(target_id, ord)"
    ))
    .bind(status_id)
    .bind(targets)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx)?;
    Ok(())
}

/// Ordered edge lists for `status_ids`, keyed by source status.
pub(crate) async fn load_transitions(
    conn: &mut PgConnection,
    table: &str,
    status_ids: &[Uuid],
) -> Result<std::collections::HashMap<Uuid, Vec<Uuid>>, RepoError> {
    let mut edges = std::collections::HashMap::<Uuid, Vec<Uuid>>::new();
    if status_ids.is_empty() {
        return Ok(edges);
    }
    let rows = sqlx::query_as::<_, (Uuid, Uuid)>(&format!(
        "SELECT status_id, target_id FROM {table} \
         WHERE status_id = ANY($1) ORDER BY status_id, position"
    ))
    .bind(status_ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(map_sqlx)?;
    for (status_id, target_id) in rows {
        edges.entry(status_id).or_default().push(target_id);
    }
    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_are_backend_failures() {
        let err = map_sqlx(sqlx::Error::RowNotFound);
        assert!(matches!(err, RepoError::Backend(_)));
    }
}
