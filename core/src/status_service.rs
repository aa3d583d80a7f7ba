//! Create/update/delete of channel statuses with selector maintenance.
//!
//! Selector flags are last-write-wins: claiming one demotes whoever held it,
//! there is never a conflict error. Every public mutation runs in one store
//! transaction.

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::error::{Operation, StatusError};
use crate::graph::{self, Selector};
use crate::models::{CHANNEL_MODEL, SIGNAL_MODEL, STATUS_MODEL, Status};
use crate::repository::{ChannelRepository, SignalRepository, StatusRepository, Store, UnitOfWork};

/// Everything needed to create a status. The channel is passed separately.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewStatus {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub blocked: bool,
    #[serde(default)]
    pub system: bool,
    #[serde(default)]
    pub starting_status: bool,
    #[serde(default)]
    pub on_reject: bool,
    #[serde(default)]
    pub on_timeout: bool,
    #[serde(default)]
    pub default_blocked: bool,
    #[serde(default)]
    pub default_unblocked: bool,
    #[serde(default)]
    pub timer: i64,
    /// Only honoured when `timer` is non-zero
    #[serde(default)]
    pub timer_transition_id: Option<Uuid>,
    #[serde(default)]
    pub transitions: Vec<Uuid>,
}

impl NewStatus {
    fn into_status(self, tenant_id: Uuid, channel_id: Uuid) -> Status {
        let now = Utc::now();
        Status {
            id: Uuid::now_v7(),
            tenant_id,
            channel_id,
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
            transitions: self.transitions,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update. Absent fields keep their stored value; for
/// `timer_transition_id` an explicit `null` clears the edge.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusPatch {
    pub name: Option<String>,
    pub label: Option<String>,
    pub reason: Option<String>,
    pub blocked: Option<bool>,
    pub starting_status: Option<bool>,
    pub on_reject: Option<bool>,
    pub on_timeout: Option<bool>,
    pub default_blocked: Option<bool>,
    pub default_unblocked: Option<bool>,
    pub timer: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub timer_transition_id: Option<Option<Uuid>>,
    pub transitions: Option<Vec<Uuid>>,
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl StatusPatch {
    pub fn apply(&self, status: &mut Status) {
        if let Some(name) = &self.name {
            status.name = name.clone();
        }
        if let Some(label) = &self.label {
            status.label = label.clone();
        }
        if let Some(reason) = &self.reason {
            status.reason = reason.clone();
        }
        if let Some(blocked) = self.blocked {
            status.blocked = blocked;
        }
        if let Some(starting) = self.starting_status {
            status.starting_status = starting;
        }
        if let Some(on_reject) = self.on_reject {
            status.on_reject = on_reject;
        }
        if let Some(on_timeout) = self.on_timeout {
            status.on_timeout = on_timeout;
        }
        if let Some(default_blocked) = self.default_blocked {
            status.default_blocked = default_blocked;
        }
        if let Some(default_unblocked) = self.default_unblocked {
            status.default_unblocked = default_unblocked;
        }
        if let Some(timer) = self.timer {
            status.timer = timer;
        }
        if let Some(target) = self.timer_transition_id {
            status.timer_transition_id = target;
        }
        if let Some(transitions) = &self.transitions {
            status.transitions = transitions.clone();
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatusService<S> {
    store: S,
}

impl<S: Store> StatusService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        ctx: &RequestContext,
        channel_id: Uuid,
        draft: NewStatus,
    ) -> Result<Status, StatusError> {
        async {
            let mut tx = begin(&self.store).await?;
            let status = create_status(&mut tx, ctx.tenant_id(), channel_id, draft).await?;
            commit(tx).await?;
            tracing::info!(status_id = %status.id, name = %status.name, "status created");
            Ok::<_, StatusError>(status)
        }
        .instrument(ctx.span("status.create"))
        .await
    }

    pub async fn update(
        &self,
        ctx: &RequestContext,
        status_id: Uuid,
        patch: StatusPatch,
    ) -> Result<Status, StatusError> {
        async {
            let mut tx = begin(&self.store).await?;
            let status = update_status(&mut tx, ctx.tenant_id(), status_id, &patch).await?;
            commit(tx).await?;
            tracing::info!(status_id = %status.id, "status updated");
            Ok::<_, StatusError>(status)
        }
        .instrument(ctx.span("status.update"))
        .await
    }

    /// Clears the default flags `status` holds on every sibling.
    pub async fn sync_siblings(
        &self,
        ctx: &RequestContext,
        status: &Status,
    ) -> Result<(), StatusError> {
        async {
            let mut tx = begin(&self.store).await?;
            sync_siblings(&mut tx, ctx.tenant_id(), status).await?;
            commit(tx).await
        }
        .instrument(ctx.span("status.sync_siblings"))
        .await
    }

    /// Soft-deletes a status and unlinks every edge and signal pointing at it.
    pub async fn delete(&self, ctx: &RequestContext, status_id: Uuid) -> Result<(), StatusError> {
        async {
            let mut tx = begin(&self.store).await?;
            delete_status(&mut tx, ctx.tenant_id(), status_id).await?;
            commit(tx).await?;
            tracing::info!(%status_id, "status deleted");
            Ok::<_, StatusError>(())
        }
        .instrument(ctx.span("status.delete"))
        .await
    }

    pub async fn get(&self, ctx: &RequestContext, status_id: Uuid) -> Result<Status, StatusError> {
        let mut tx = begin(&self.store).await?;
        let status = tx
            .statuses()
            .get(ctx.tenant_id(), status_id)
            .await
            .map_err(StatusError::querying(STATUS_MODEL))?;
        status.ok_or_else(|| StatusError::not_found(STATUS_MODEL, "id", status_id))
    }

    pub async fn get_all(&self, ctx: &RequestContext) -> Result<Vec<Status>, StatusError> {
        let mut tx = begin(&self.store).await?;
        let statuses = tx
            .statuses()
            .get_all(ctx.tenant_id())
            .await
            .map_err(StatusError::querying(STATUS_MODEL))?;
        Ok(statuses)
    }

    pub async fn get_by_channel(
        &self,
        ctx: &RequestContext,
        channel_id: Uuid,
    ) -> Result<Vec<Status>, StatusError> {
        let mut tx = begin(&self.store).await?;
        let statuses = tx
            .statuses()
            .get_by_channel(ctx.tenant_id(), channel_id)
            .await
            .map_err(StatusError::querying(STATUS_MODEL))?;
        Ok(statuses)
    }

    pub async fn get_by_channels(
        &self,
        ctx: &RequestContext,
        channel_ids: &[Uuid],
    ) -> Result<Vec<Status>, StatusError> {
        let mut tx = begin(&self.store).await?;
        let statuses = tx
            .statuses()
            .get_by_channels(ctx.tenant_id(), channel_ids)
            .await
            .map_err(StatusError::querying(STATUS_MODEL))?;
        Ok(statuses)
    }

    pub async fn get_by_channel_and_is_starting(
        &self,
        ctx: &RequestContext,
        channel_id: Uuid,
        starting: bool,
    ) -> Result<Status, StatusError> {
        let mut tx = begin(&self.store).await?;
        let status = tx
            .statuses()
            .get_by_channel_and_is_starting(ctx.tenant_id(), channel_id, starting)
            .await
            .map_err(StatusError::querying(STATUS_MODEL))?;
        status.ok_or_else(|| StatusError::not_found(STATUS_MODEL, "starting_status", channel_id))
    }

    /// Current holder of the on-reject selector. `NotFound` means no holder yet.
    pub async fn get_on_reject_status(
        &self,
        ctx: &RequestContext,
        channel_id: Uuid,
    ) -> Result<Status, StatusError> {
        let mut tx = begin(&self.store).await?;
        let status = tx
            .statuses()
            .get_on_reject_status(ctx.tenant_id(), channel_id)
            .await
            .map_err(StatusError::querying(STATUS_MODEL))?;
        status.ok_or_else(|| StatusError::not_found(STATUS_MODEL, "on_reject", channel_id))
    }

    /// Current holder of the on-timeout selector. `NotFound` means no holder yet.
    pub async fn get_on_timeout_status(
        &self,
        ctx: &RequestContext,
        channel_id: Uuid,
    ) -> Result<Status, StatusError> {
        let mut tx = begin(&self.store).await?;
        let status = tx
            .statuses()
            .get_on_timeout_status(ctx.tenant_id(), channel_id)
            .await
            .map_err(StatusError::querying(STATUS_MODEL))?;
        status.ok_or_else(|| StatusError::not_found(STATUS_MODEL, "on_timeout", channel_id))
    }
}

pub(crate) async fn begin<S: Store>(store: &S) -> Result<S::Tx, StatusError> {
    store
        .begin()
        .await
        .map_err(StatusError::store(Operation::Beginning, "transaction"))
}

pub(crate) async fn commit<U: UnitOfWork>(tx: U) -> Result<(), StatusError> {
    tx.commit()
        .await
        .map_err(StatusError::store(Operation::Committing, "transaction"))
}

pub(crate) async fn create_status<U: UnitOfWork>(
    tx: &mut U,
    tenant_id: Uuid,
    channel_id: Uuid,
    draft: NewStatus,
) -> Result<Status, StatusError> {
    let channel = tx
        .channels()
        .get(tenant_id, channel_id)
        .await
        .map_err(StatusError::querying(CHANNEL_MODEL))?;
    if channel.is_none() {
        return Err(StatusError::not_found(CHANNEL_MODEL, "channel_id", channel_id));
    }

    let mut status = draft.into_status(tenant_id, channel_id);
    graph::drop_idle_timer_target(&mut status);
    graph::normalize_default_flags(&mut status);
    check_edges(tx, tenant_id, &status).await?;
    demote_previous_holders(tx, tenant_id, &status).await?;

    let status = tx
        .statuses()
        .persist(tenant_id, &status)
        .await
        .map_err(StatusError::persisting(STATUS_MODEL))?;
    sync_siblings(tx, tenant_id, &status).await?;
    Ok(status)
}

pub(crate) async fn update_status<U: UnitOfWork>(
    tx: &mut U,
    tenant_id: Uuid,
    status_id: Uuid,
    patch: &StatusPatch,
) -> Result<Status, StatusError> {
    let existing = tx
        .statuses()
        .get(tenant_id, status_id)
        .await
        .map_err(StatusError::querying(STATUS_MODEL))?
        .ok_or_else(|| StatusError::not_found(STATUS_MODEL, "id", status_id))?;

    let mut status = existing.clone();
    patch.apply(&mut status);
    graph::validate_rename(&existing, &status)?;
    graph::drop_idle_timer_target(&mut status);
    graph::normalize_default_flags(&mut status);
    check_edges(tx, tenant_id, &status).await?;
    demote_previous_holders(tx, tenant_id, &status).await?;

    let status = tx
        .statuses()
        .update(tenant_id, &status)
        .await
        .map_err(StatusError::updating(STATUS_MODEL))?;
    sync_siblings(tx, tenant_id, &status).await?;
    Ok(status)
}

/// Clears the starting, on-reject and on-timeout flags on whichever sibling
/// currently holds a selector `status` is claiming. Must run before `status`
/// is written so the holder queries cannot return it.
pub(crate) async fn demote_previous_holders<U: UnitOfWork>(
    tx: &mut U,
    tenant_id: Uuid,
    status: &Status,
) -> Result<(), StatusError> {
    for selector in [Selector::Starting, Selector::OnReject, Selector::OnTimeout] {
        if !selector.is_held_by(status) {
            continue;
        }
        let holder = match selector {
            Selector::Starting => {
                tx.statuses()
                    .get_by_channel_and_is_starting(tenant_id, status.channel_id, true)
                    .await
            }
            Selector::OnReject => {
                tx.statuses()
                    .get_on_reject_status(tenant_id, status.channel_id)
                    .await
            }
            Selector::OnTimeout => {
                tx.statuses()
                    .get_on_timeout_status(tenant_id, status.channel_id)
                    .await
            }
            Selector::DefaultBlocked | Selector::DefaultUnblocked => continue,
        }
        .map_err(StatusError::querying(STATUS_MODEL))?;

        let Some(mut holder) = holder else {
            continue;
        };
        if holder.id == status.id {
            continue;
        }
        selector.release(&mut holder);
        tx.statuses()
            .update(tenant_id, &holder)
            .await
            .map_err(StatusError::updating(STATUS_MODEL))?;
        tracing::debug!(
            demoted = %holder.id,
            holder = %status.id,
            selector = selector.field(),
            "selector moved"
        );
    }
    Ok(())
}

pub(crate) async fn sync_siblings<U: UnitOfWork>(
    tx: &mut U,
    tenant_id: Uuid,
    status: &Status,
) -> Result<(), StatusError> {
    let siblings = tx
        .statuses()
        .get_by_channel(tenant_id, status.channel_id)
        .await
        .map_err(StatusError::querying(STATUS_MODEL))?;

    for sibling in graph::compute_sibling_resets(status, &siblings) {
        tx.statuses()
            .update(tenant_id, &sibling)
            .await
            .map_err(StatusError::updating(STATUS_MODEL))?;
        tracing::debug!(sibling = %sibling.id, holder = %status.id, "default flag cleared");
    }
    Ok(())
}

/// Timer target must exist for the tenant and live in the same channel; so
/// must every manual transition target.
async fn check_edges<U: UnitOfWork>(
    tx: &mut U,
    tenant_id: Uuid,
    status: &Status,
) -> Result<(), StatusError> {
    if status.timer_transition_id.is_none() && status.transitions.is_empty() {
        return Ok(());
    }

    if let Some(target_id) = status.timer_transition_id {
        let target = tx
            .statuses()
            .get(tenant_id, target_id)
            .await
            .map_err(StatusError::querying(STATUS_MODEL))?;
        if target.is_none() {
            return Err(StatusError::not_found(
                STATUS_MODEL,
                "timer_transition_id",
                target_id,
            ));
        }
    }

    let in_channel = tx
        .statuses()
        .get_by_channel(tenant_id, status.channel_id)
        .await
        .map_err(StatusError::querying(STATUS_MODEL))?;
    if let Some(target_id) = status.timer_transition_id {
        graph::validate_timer_target(status, target_id, &in_channel)?;
    }
    graph::validate_transition_targets(status, &in_channel)
}

async fn delete_status<U: UnitOfWork>(
    tx: &mut U,
    tenant_id: Uuid,
    status_id: Uuid,
) -> Result<(), StatusError> {
    let status = tx
        .statuses()
        .get(tenant_id, status_id)
        .await
        .map_err(StatusError::querying(STATUS_MODEL))?
        .ok_or_else(|| StatusError::not_found(STATUS_MODEL, "id", status_id))?;

    let siblings = tx
        .statuses()
        .get_by_channel(tenant_id, status.channel_id)
        .await
        .map_err(StatusError::querying(STATUS_MODEL))?;
    for mut sibling in siblings.into_iter().filter(|s| s.id != status.id) {
        if graph::unlink_references(status.id, &mut sibling) {
            tx.statuses()
                .update(tenant_id, &sibling)
                .await
                .map_err(StatusError::updating(STATUS_MODEL))?;
        }
    }

    let signals = tx
        .signals()
        .get_by_status(tenant_id, status.id)
        .await
        .map_err(StatusError::querying(SIGNAL_MODEL))?;
    for mut signal in signals {
        signal.status_id = None;
        tx.signals()
            .update(tenant_id, &signal)
            .await
            .map_err(StatusError::updating(SIGNAL_MODEL))?;
    }

    tx.statuses()
        .delete(tenant_id, &status)
        .await
        .map_err(StatusError::deleting(STATUS_MODEL))
}
