//! Persistence contracts. Services only ever talk to a [`UnitOfWork`]; every
//! repository it hands out is bound to the same transaction.
//!
//! Lookups return `Ok(None)` when nothing matches. Rows are always scoped by
//! tenant, and soft-deleted rows are invisible.

#![allow(async_fn_in_trait)]

use uuid::Uuid;

use crate::error::RepoError;
use crate::models::{
    ActivityStatus, Channel, GlobalStatus, Ponder, PonderKey, Signal, Status, Tenant,
};

pub trait TenantRepository {
    async fn persist(&mut self, tenant: &Tenant) -> Result<Tenant, RepoError>;
    async fn get(&mut self, id: Uuid) -> Result<Option<Tenant>, RepoError>;
    async fn get_by_name(&mut self, name: &str) -> Result<Option<Tenant>, RepoError>;
    async fn delete(&mut self, tenant: &Tenant) -> Result<(), RepoError>;
}

pub trait ChannelRepository {
    async fn persist(&mut self, tenant_id: Uuid, channel: &Channel) -> Result<Channel, RepoError>;
    async fn update(&mut self, tenant_id: Uuid, channel: &Channel) -> Result<Channel, RepoError>;
    async fn get(&mut self, tenant_id: Uuid, id: Uuid) -> Result<Option<Channel>, RepoError>;
    async fn get_by_name(&mut self, tenant_id: Uuid, name: &str)
    -> Result<Option<Channel>, RepoError>;
    async fn get_all(&mut self, tenant_id: Uuid) -> Result<Vec<Channel>, RepoError>;
}

pub trait StatusRepository {
    async fn persist(&mut self, tenant_id: Uuid, status: &Status) -> Result<Status, RepoError>;
    async fn update(&mut self, tenant_id: Uuid, status: &Status) -> Result<Status, RepoError>;
    async fn delete(&mut self, tenant_id: Uuid, status: &Status) -> Result<(), RepoError>;
    async fn get(&mut self, tenant_id: Uuid, id: Uuid) -> Result<Option<Status>, RepoError>;
    async fn get_all(&mut self, tenant_id: Uuid) -> Result<Vec<Status>, RepoError>;
    async fn get_by_channel(
        &mut self,
        tenant_id: Uuid,
        channel_id: Uuid,
    ) -> Result<Vec<Status>, RepoError>;
    async fn get_by_channels(
        &mut self,
        tenant_id: Uuid,
        channel_ids: &[Uuid],
    ) -> Result<Vec<Status>, RepoError>;
    async fn get_by_channel_and_is_starting(
        &mut self,
        tenant_id: Uuid,
        channel_id: Uuid,
        starting: bool,
    ) -> Result<Option<Status>, RepoError>;
    async fn get_on_reject_status(
        &mut self,
        tenant_id: Uuid,
        channel_id: Uuid,
    ) -> Result<Option<Status>, RepoError>;
    async fn get_on_timeout_status(
        &mut self,
        tenant_id: Uuid,
        channel_id: Uuid,
    ) -> Result<Option<Status>, RepoError>;
    async fn get_by_name_and_channel(
        &mut self,
        tenant_id: Uuid,
        name: &str,
        channel_id: Uuid,
    ) -> Result<Option<Status>, RepoError>;
}

pub trait GlobalStatusRepository {
    async fn persist(
        &mut self,
        tenant_id: Uuid,
        status: &GlobalStatus,
    ) -> Result<GlobalStatus, RepoError>;
    async fn update(
        &mut self,
        tenant_id: Uuid,
        status: &GlobalStatus,
    ) -> Result<GlobalStatus, RepoError>;
    async fn get(&mut self, tenant_id: Uuid, id: Uuid) -> Result<Option<GlobalStatus>, RepoError>;
    async fn get_by_name(
        &mut self,
        tenant_id: Uuid,
        name: &str,
    ) -> Result<Option<GlobalStatus>, RepoError>;
    async fn get_starting(&mut self, tenant_id: Uuid) -> Result<Option<GlobalStatus>, RepoError>;
    async fn get_all(&mut self, tenant_id: Uuid) -> Result<Vec<GlobalStatus>, RepoError>;
}

pub trait SignalRepository {
    async fn persist(&mut self, tenant_id: Uuid, signal: &Signal) -> Result<Signal, RepoError>;
    async fn update(&mut self, tenant_id: Uuid, signal: &Signal) -> Result<Signal, RepoError>;
    async fn get_by_service_model_action_and_channel(
        &mut self,
        tenant_id: Uuid,
        service: &str,
        model_name: &str,
        action: &str,
        channel_id: Uuid,
    ) -> Result<Option<Signal>, RepoError>;
    async fn get_by_channel(
        &mut self,
        tenant_id: Uuid,
        channel_id: Uuid,
    ) -> Result<Vec<Signal>, RepoError>;
    async fn get_by_status(
        &mut self,
        tenant_id: Uuid,
        status_id: Uuid,
    ) -> Result<Vec<Signal>, RepoError>;
}

pub trait ActivityStatusRepository {
    async fn persist(
        &mut self,
        tenant_id: Uuid,
        status: &ActivityStatus,
    ) -> Result<ActivityStatus, RepoError>;
    async fn get_by_name(
        &mut self,
        tenant_id: Uuid,
        name: &str,
    ) -> Result<Option<ActivityStatus>, RepoError>;
    async fn get_all(&mut self, tenant_id: Uuid) -> Result<Vec<ActivityStatus>, RepoError>;
}

pub trait PonderRepository {
    async fn persist(&mut self, tenant_id: Uuid, ponder: &Ponder) -> Result<Ponder, RepoError>;
    async fn get_by_key(
        &mut self,
        tenant_id: Uuid,
        key: &PonderKey,
    ) -> Result<Option<Ponder>, RepoError>;
    async fn get_by_channel(
        &mut self,
        tenant_id: Uuid,
        channel_id: Uuid,
    ) -> Result<Vec<Ponder>, RepoError>;
}

/// One store transaction. Dropping it without [`UnitOfWork::commit`] discards
/// every write made through it.
pub trait UnitOfWork {
    type Tenants<'a>: TenantRepository
    where
        Self: 'a;
    type Channels<'a>: ChannelRepository
    where
        Self: 'a;
    type Statuses<'a>: StatusRepository
    where
        Self: 'a;
    type GlobalStatuses<'a>: GlobalStatusRepository
    where
        Self: 'a;
    type Signals<'a>: SignalRepository
    where
        Self: 'a;
    type ActivityStatuses<'a>: ActivityStatusRepository
    where
        Self: 'a;
    type Ponders<'a>: PonderRepository
    where
        Self: 'a;

    fn tenants(&mut self) -> Self::Tenants<'_>;
    fn channels(&mut self) -> Self::Channels<'_>;
    fn statuses(&mut self) -> Self::Statuses<'_>;
    fn global_statuses(&mut self) -> Self::GlobalStatuses<'_>;
    fn signals(&mut self) -> Self::Signals<'_>;
    fn activity_statuses(&mut self) -> Self::ActivityStatuses<'_>;
    fn ponders(&mut self) -> Self::Ponders<'_>;

    async fn commit(self) -> Result<(), RepoError>;
}

/// Source of transactions.
pub trait Store {
    type Tx: UnitOfWork;

    async fn begin(&self) -> Result<Self::Tx, RepoError>;
}
