//! In-memory [`Store`] used by tests and by dry runs when no database is
//! configured. Transactions are serialized: `begin` takes the store lock,
//! works on a copy and `commit` swaps the copy in. Dropping an uncommitted
//! unit of work discards its writes.
//!
//! Natural-key uniqueness mirrors the partial unique indexes of the SQL schema.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::error::RepoError;
use crate::models::{
    ActivityStatus, Channel, GlobalStatus, Ponder, PonderKey, Signal, Status, Tenant,
};
use crate::repository::{
    ActivityStatusRepository, ChannelRepository, GlobalStatusRepository, PonderRepository,
    SignalRepository, StatusRepository, Store, TenantRepository, UnitOfWork,
};

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub tenants: BTreeMap<Uuid, Tenant>,
    pub channels: BTreeMap<Uuid, Channel>,
    pub statuses: BTreeMap<Uuid, Status>,
    pub global_statuses: BTreeMap<Uuid, GlobalStatus>,
    pub signals: BTreeMap<Uuid, Signal>,
    pub activity_statuses: BTreeMap<Uuid, ActivityStatus>,
    pub ponders: BTreeMap<Uuid, Ponder>,
}

impl MemoryState {
    pub fn statuses_of(&self, tenant_id: Uuid, channel_id: Uuid) -> Vec<&Status> {
        self.statuses
            .values()
            .filter(|s| s.tenant_id == tenant_id && s.channel_id == channel_id)
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the committed state.
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

impl Store for MemoryStore {
    type Tx = MemoryUnitOfWork;

    async fn begin(&self) -> Result<MemoryUnitOfWork, RepoError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(MemoryUnitOfWork { guard, working })
    }
}

pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

impl UnitOfWork for MemoryUnitOfWork {
    type Tenants<'a> = MemoryRepo<'a>;
    type Channels<'a> = MemoryRepo<'a>;
    type Statuses<'a> = MemoryRepo<'a>;
    type GlobalStatuses<'a> = MemoryRepo<'a>;
    type Signals<'a> = MemoryRepo<'a>;
    type ActivityStatuses<'a> = MemoryRepo<'a>;
    type Ponders<'a> = MemoryRepo<'a>;

    fn tenants(&mut self) -> MemoryRepo<'_> {
        MemoryRepo(&mut self.working)
    }

    fn channels(&mut self) -> MemoryRepo<'_> {
        MemoryRepo(&mut self.working)
    }

    fn statuses(&mut self) -> MemoryRepo<'_> {
        MemoryRepo(&mut self.working)
    }

    fn global_statuses(&mut self) -> MemoryRepo<'_> {
        MemoryRepo(&mut self.working)
    }

    fn signals(&mut self) -> MemoryRepo<'_> {
        MemoryRepo(&mut self.working)
    }

    fn activity_statuses(&mut self) -> MemoryRepo<'_> {
        MemoryRepo(&mut self.working)
    }

    fn ponders(&mut self) -> MemoryRepo<'_> {
        MemoryRepo(&mut self.working)
    }

    async fn commit(self) -> Result<(), RepoError> {
        let MemoryUnitOfWork { mut guard, working } = self;
        *guard = working;
        Ok(())
    }
}

/// Borrowed view over the working copy of one unit of work. Implements every
/// repository contract.
pub struct MemoryRepo<'a>(&'a mut MemoryState);

fn conflict(key: &str) -> RepoError {
    RepoError::Conflict(key.to_string())
}

fn first<T>(mut items: impl Iterator<Item = T>) -> Option<T> {
    items.next()
}

impl TenantRepository for MemoryRepo<'_> {
    async fn persist(&mut self, tenant: &Tenant) -> Result<Tenant, RepoError> {
        if self.0.tenants.values().any(|t| t.name == tenant.name) {
            return Err(conflict("tenants_name_key"));
        }
        let mut stored = tenant.clone();
        stored.created_at = Utc::now();
        stored.updated_at = stored.created_at;
        self.0.tenants.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get(&mut self, id: Uuid) -> Result<Option<Tenant>, RepoError> {
        Ok(self.0.tenants.get(&id).cloned())
    }

    async fn get_by_name(&mut self, name: &str) -> Result<Option<Tenant>, RepoError> {
        Ok(first(self.0.tenants.values().filter(|t| t.name == name).cloned()))
    }

    async fn delete(&mut self, tenant: &Tenant) -> Result<(), RepoError> {
        self.0
            .tenants
            .remove(&tenant.id)
            .map(|_| ())
            .ok_or(RepoError::RowMissing {
                table: "tenants",
                id: tenant.id,
            })
    }
}

impl ChannelRepository for MemoryRepo<'_> {
    async fn persist(&mut self, tenant_id: Uuid, channel: &Channel) -> Result<Channel, RepoError> {
        if self
            .0
            .channels
            .values()
            .any(|c| c.tenant_id == tenant_id && c.name == channel.name)
        {
            return Err(conflict("channels_tenant_name_key"));
        }
        let mut stored = channel.clone();
        stored.tenant_id = tenant_id;
        stored.created_at = Utc::now();
        stored.updated_at = stored.created_at;
        self.0.channels.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update(&mut self, tenant_id: Uuid, channel: &Channel) -> Result<Channel, RepoError> {
        match self.0.channels.get_mut(&channel.id) {
            Some(existing) if existing.tenant_id == tenant_id => {
                let mut stored = channel.clone();
                stored.tenant_id = tenant_id;
                stored.created_at = existing.created_at;
                stored.updated_at = Utc::now();
                *existing = stored.clone();
                Ok(stored)
            }
            _ => Err(RepoError::RowMissing {
                table: "channels",
                id: channel.id,
            }),
        }
    }

    async fn get(&mut self, tenant_id: Uuid, id: Uuid) -> Result<Option<Channel>, RepoError> {
        Ok(self
            .0
            .channels
            .get(&id)
            .filter(|c| c.tenant_id == tenant_id)
            .cloned())
    }

    async fn get_by_name(
        &mut self,
        tenant_id: Uuid,
        name: &str,
    ) -> Result<Option<Channel>, RepoError> {
        Ok(first(
            self.0
                .channels
                .values()
                .filter(|c| c.tenant_id == tenant_id && c.name == name)
                .cloned(),
        ))
    }

    async fn get_all(&mut self, tenant_id: Uuid) -> Result<Vec<Channel>, RepoError> {
        Ok(self
            .0
            .channels
            .values()
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .collect())
    }
}

impl MemoryRepo<'_> {
    fn statuses_where(&self, tenant_id: Uuid, pred: impl Fn(&Status) -> bool) -> Vec<Status> {
        self.0
            .statuses
            .values()
            .filter(|s| s.tenant_id == tenant_id && pred(s))
            .cloned()
            .collect()
    }
}

impl StatusRepository for MemoryRepo<'_> {
    async fn persist(&mut self, tenant_id: Uuid, status: &Status) -> Result<Status, RepoError> {
        if self.0.statuses.values().any(|s| {
            s.tenant_id == tenant_id && s.channel_id == status.channel_id && s.name == status.name
        }) {
            return Err(conflict("statuses_tenant_channel_name_key"));
        }
        let mut stored = status.clone();
        stored.tenant_id = tenant_id;
        stored.created_at = Utc::now();
        stored.updated_at = stored.created_at;
        self.0.statuses.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update(&mut self, tenant_id: Uuid, status: &Status) -> Result<Status, RepoError> {
        if self.0.statuses.values().any(|s| {
            s.id != status.id
                && s.tenant_id == tenant_id
                && s.channel_id == status.channel_id
                && s.name == status.name
        }) {
            return Err(conflict("statuses_tenant_channel_name_key"));
        }
        match self.0.statuses.get_mut(&status.id) {
            Some(existing) if existing.tenant_id == tenant_id => {
                let mut stored = status.clone();
                stored.tenant_id = tenant_id;
                stored.created_at = existing.created_at;
                stored.updated_at = Utc::now();
                *existing = stored.clone();
                Ok(stored)
            }
            _ => Err(RepoError::RowMissing {
                table: "statuses",
                id: status.id,
            }),
        }
    }

    async fn delete(&mut self, tenant_id: Uuid, status: &Status) -> Result<(), RepoError> {
        match self.0.statuses.get(&status.id) {
            Some(existing) if existing.tenant_id == tenant_id => {
                self.0.statuses.remove(&status.id);
                Ok(())
            }
            _ => Err(RepoError::RowMissing {
                table: "statuses",
                id: status.id,
            }),
        }
    }

    async fn get(&mut self, tenant_id: Uuid, id: Uuid) -> Result<Option<Status>, RepoError> {
        Ok(self
            .0
            .statuses
            .get(&id)
            .filter(|s| s.tenant_id == tenant_id)
            .cloned())
    }

    async fn get_all(&mut self, tenant_id: Uuid) -> Result<Vec<Status>, RepoError> {
        Ok(self.statuses_where(tenant_id, |_| true))
    }

    async fn get_by_channel(
        &mut self,
        tenant_id: Uuid,
        channel_id: Uuid,
    ) -> Result<Vec<Status>, RepoError> {
        Ok(self.statuses_where(tenant_id, |s| s.channel_id == channel_id))
    }

    async fn get_by_channels(
        &mut self,
        tenant_id: Uuid,
        channel_ids: &[Uuid],
    ) -> Result<Vec<Status>, RepoError> {
        Ok(self.statuses_where(tenant_id, |s| channel_ids.contains(&s.channel_id)))
    }

    async fn get_by_channel_and_is_starting(
        &mut self,
        tenant_id: Uuid,
        channel_id: Uuid,
        starting: bool,
    ) -> Result<Option<Status>, RepoError> {
        Ok(self
            .statuses_where(tenant_id, |s| {
                s.channel_id == channel_id && s.starting_status == starting
            })
            .into_iter()
            .next())
    }

    async fn get_on_reject_status(
        &mut self,
        tenant_id: Uuid,
        channel_id: Uuid,
    ) -> Result<Option<Status>, RepoError> {
        Ok(self
            .statuses_where(tenant_id, |s| s.channel_id == channel_id && s.on_reject)
            .into_iter()
            .next())
    }

    async fn get_on_timeout_status(
        &mut self,
        tenant_id: Uuid,
        channel_id: Uuid,
    ) -> Result<Option<Status>, RepoError> {
        Ok(self
            .statuses_where(tenant_id, |s| s.channel_id == channel_id && s.on_timeout)
            .into_iter()
            .next())
    }

    async fn get_by_name_and_channel(
        &mut self,
        tenant_id: Uuid,
        name: &str,
        channel_id: Uuid,
    ) -> Result<Option<Status>, RepoError> {
        Ok(self
            .statuses_where(tenant_id, |s| s.channel_id == channel_id && s.name == name)
            .into_iter()
            .next())
    }
}

impl GlobalStatusRepository for MemoryRepo<'_> {
    async fn persist(
        &mut self,
        tenant_id: Uuid,
        status: &GlobalStatus,
    ) -> Result<GlobalStatus, RepoError> {
        if self
            .0
            .global_statuses
            .values()
            .any(|s| s.tenant_id == tenant_id && s.name == status.name)
        {
            return Err(conflict("global_statuses_tenant_name_key"));
        }
        let mut stored = status.clone();
        stored.tenant_id = tenant_id;
        stored.created_at = Utc::now();
        stored.updated_at = stored.created_at;
        self.0.global_statuses.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update(
        &mut self,
        tenant_id: Uuid,
        status: &GlobalStatus,
    ) -> Result<GlobalStatus, RepoError> {
        match self.0.global_statuses.get_mut(&status.id) {
            Some(existing) if existing.tenant_id == tenant_id => {
                let mut stored = status.clone();
                stored.tenant_id = tenant_id;
                stored.created_at = existing.created_at;
                stored.updated_at = Utc::now();
                *existing = stored.clone();
                Ok(stored)
            }
            _ => Err(RepoError::RowMissing {
                table: "global_statuses",
                id: status.id,
            }),
        }
    }

    async fn get(&mut self, tenant_id: Uuid, id: Uuid) -> Result<Option<GlobalStatus>, RepoError> {
        Ok(self
            .0
            .global_statuses
            .get(&id)
            .filter(|s| s.tenant_id == tenant_id)
            .cloned())
    }

    async fn get_by_name(
        &mut self,
        tenant_id: Uuid,
        name: &str,
    ) -> Result<Option<GlobalStatus>, RepoError> {
        Ok(first(
            self.0
                .global_statuses
                .values()
                .filter(|s| s.tenant_id == tenant_id && s.name == name)
                .cloned(),
        ))
    }

    async fn get_starting(&mut self, tenant_id: Uuid) -> Result<Option<GlobalStatus>, RepoError> {
        Ok(first(
            self.0
                .global_statuses
                .values()
                .filter(|s| s.tenant_id == tenant_id && s.starting_status)
                .cloned(),
        ))
    }

    async fn get_all(&mut self, tenant_id: Uuid) -> Result<Vec<GlobalStatus>, RepoError> {
        Ok(self
            .0
            .global_statuses
            .values()
            .filter(|s| s.tenant_id == tenant_id)
            .cloned()
            .collect())
    }
}

impl SignalRepository for MemoryRepo<'_> {
    async fn persist(&mut self, tenant_id: Uuid, signal: &Signal) -> Result<Signal, RepoError> {
        if self.0.signals.values().any(|s| {
            s.tenant_id == tenant_id
                && s.channel_id == signal.channel_id
                && s.service == signal.service
                && s.model_name == signal.model_name
                && s.action == signal.action
        }) {
            return Err(conflict("signals_natural_key"));
        }
        let mut stored = signal.clone();
        stored.tenant_id = tenant_id;
        stored.created_at = Utc::now();
        stored.updated_at = stored.created_at;
        self.0.signals.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update(&mut self, tenant_id: Uuid, signal: &Signal) -> Result<Signal, RepoError> {
        match self.0.signals.get_mut(&signal.id) {
            Some(existing) if existing.tenant_id == tenant_id => {
                let mut stored = signal.clone();
                stored.tenant_id = tenant_id;
                stored.created_at = existing.created_at;
                stored.updated_at = Utc::now();
                *existing = stored.clone();
                Ok(stored)
            }
            _ => Err(RepoError::RowMissing {
                table: "signals",
                id: signal.id,
            }),
        }
    }

    async fn get_by_service_model_action_and_channel(
        &mut self,
        tenant_id: Uuid,
        service: &str,
        model_name: &str,
        action: &str,
        channel_id: Uuid,
    ) -> Result<Option<Signal>, RepoError> {
        Ok(first(
            self.0
                .signals
                .values()
                .filter(|s| {
                    s.tenant_id == tenant_id
                        && s.channel_id == channel_id
                        && s.service == service
                        && s.model_name == model_name
                        && s.action == action
                })
                .cloned(),
        ))
    }

    async fn get_by_channel(
        &mut self,
        tenant_id: Uuid,
        channel_id: Uuid,
    ) -> Result<Vec<Signal>, RepoError> {
        Ok(self
            .0
            .signals
            .values()
            .filter(|s| s.tenant_id == tenant_id && s.channel_id == channel_id)
            .cloned()
            .collect())
    }

    async fn get_by_status(
        &mut self,
        tenant_id: Uuid,
        status_id: Uuid,
    ) -> Result<Vec<Signal>, RepoError> {
        Ok(self
            .0
            .signals
            .values()
            .filter(|s| s.tenant_id == tenant_id && s.status_id == Some(status_id))
            .cloned()
            .collect())
    }
}

impl ActivityStatusRepository for MemoryRepo<'_> {
    async fn persist(
        &mut self,
        tenant_id: Uuid,
        status: &ActivityStatus,
    ) -> Result<ActivityStatus, RepoError> {
        if self
            .0
            .activity_statuses
            .values()
            .any(|s| s.tenant_id == tenant_id && s.name == status.name)
        {
            return Err(conflict("activity_statuses_tenant_name_key"));
        }
        let mut stored = status.clone();
        stored.tenant_id = tenant_id;
        stored.created_at = Utc::now();
        stored.updated_at = stored.created_at;
        self.0.activity_statuses.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_by_name(
        &mut self,
        tenant_id: Uuid,
        name: &str,
    ) -> Result<Option<ActivityStatus>, RepoError> {
        Ok(first(
            self.0
                .activity_statuses
                .values()
                .filter(|s| s.tenant_id == tenant_id && s.name == name)
                .cloned(),
        ))
    }

    async fn get_all(&mut self, tenant_id: Uuid) -> Result<Vec<ActivityStatus>, RepoError> {
        Ok(self
            .0
            .activity_statuses
            .values()
            .filter(|s| s.tenant_id == tenant_id)
            .cloned()
            .collect())
    }
}

impl PonderRepository for MemoryRepo<'_> {
    async fn persist(&mut self, tenant_id: Uuid, ponder: &Ponder) -> Result<Ponder, RepoError> {
        let key = ponder.key();
        if self
            .0
            .ponders
            .values()
            .any(|p| p.tenant_id == tenant_id && p.key() == key)
        {
            return Err(conflict("ponders_natural_key"));
        }
        let mut stored = ponder.clone();
        stored.tenant_id = tenant_id;
        stored.created_at = Utc::now();
        stored.updated_at = stored.created_at;
        self.0.ponders.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_by_key(
        &mut self,
        tenant_id: Uuid,
        key: &PonderKey,
    ) -> Result<Option<Ponder>, RepoError> {
        Ok(first(
            self.0
                .ponders
                .values()
                .filter(|p| p.tenant_id == tenant_id && p.key() == *key)
                .cloned(),
        ))
    }

    async fn get_by_channel(
        &mut self,
        tenant_id: Uuid,
        channel_id: Uuid,
    ) -> Result<Vec<Ponder>, RepoError> {
        Ok(self
            .0
            .ponders
            .values()
            .filter(|p| p.tenant_id == tenant_id && p.channel_id == channel_id)
            .cloned()
            .collect())
    }
}
