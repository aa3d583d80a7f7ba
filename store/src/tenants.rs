use chrono::{DateTime, Utc};
use presence_core::error::RepoError;
use presence_core::models::Tenant;
use presence_core::repository::TenantRepository;
use uuid::Uuid;

use crate::{PgRepo, map_sqlx};

#[derive(Debug, sqlx::FromRow)]
struct TenantRow {
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TenantRow> for Tenant {
    fn from(row: TenantRow) -> Self {
        Tenant {
            id: row.id,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl TenantRepository for PgRepo<'_> {
    async fn persist(&mut self, tenant: &Tenant) -> Result<Tenant, RepoError> {
        let row = sqlx::query_as::<_, TenantRow>(
            r#"
            INSERT INTO tenants (id, name)
            VALUES ($1, $2)
            RETURNING id, name, created_at, updated_at
            "#,
        )
        .bind(tenant.id)
        .bind(&tenant.name)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(map_sqlx)?;
        Ok(row.into())
    }

    async fn get(&mut self, id: Uuid) -> Result<Option<Tenant>, RepoError> {
        let row = sqlx::query_as::<_, TenantRow>(
            "SELECT id, name, created_at, updated_at FROM tenants WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(Tenant::from))
    }

    async fn get_by_name(&mut self, name: &str) -> Result<Option<Tenant>, RepoError> {
        let row = sqlx::query_as::<_, TenantRow>(
            "SELECT id, name, created_at, updated_at FROM tenants WHERE name = $1 AND deleted_at IS NULL",
        )
        .bind(name)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(Tenant::from))
    }

    async fn delete(&mut self, tenant: &Tenant) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE tenants SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(tenant.id)
        .execute(&mut *self.conn)
        .await
        .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::RowMissing {
                table: "tenants",
                id: tenant.id,
            });
        }
        Ok(())
    }
}
