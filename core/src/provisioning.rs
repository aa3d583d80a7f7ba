//! Tenant provisioning: materializes channels, status graphs, signals,
//! activity statuses and ponders from [`ProvisioningTemplates`].
//!
//! Provisioning is create-once. An existing tenant is returned untouched.
//! A new tenant is seeded inside one transaction, so a failed run leaves
//! nothing behind. Every row is looked up by its natural key before it is
//! inserted.

use tracing::Instrument;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::error::{SeedStage, StatusError};
use crate::graph;
use crate::models::{
    ACTIVITY_STATUS_MODEL, CHANNEL_MODEL, Channel, GLOBAL_STATUS_MODEL, GlobalStatus,
    PONDER_MODEL, SIGNAL_MODEL, STATUS_MODEL, Status, TENANT_MODEL, Tenant,
};
use crate::repository::{
    ActivityStatusRepository, ChannelRepository, GlobalStatusRepository, PonderRepository,
    SignalRepository, StatusRepository, Store, TenantRepository, UnitOfWork,
};
use crate::status_service::{begin, commit, demote_previous_holders, sync_siblings};
use crate::templates::{
    ActivityStatusTemplate, ChannelTemplate, PonderTemplate, ProvisioningTemplates,
    SignalTemplate, StatusTemplate,
};

#[derive(Debug, Clone)]
pub struct TenantProvisioner<S> {
    store: S,
}

impl<S: Store> TenantProvisioner<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn provision(
        &self,
        ctx: &RequestContext,
        tenant_name: &str,
        templates: &ProvisioningTemplates,
    ) -> Result<Tenant, StatusError> {
        async {
            let mut tx = begin(&self.store)
                .await
                .map_err(|e| e.in_stage(SeedStage::Tenant, tenant_name))?;

            let existing = tx
                .tenants()
                .get_by_name(tenant_name)
                .await
                .map_err(StatusError::querying(TENANT_MODEL))
                .map_err(|e| e.in_stage(SeedStage::Tenant, tenant_name))?;
            if let Some(tenant) = existing {
                tracing::info!(tenant_id = %tenant.id, tenant = tenant_name, "tenant exists, skipping provisioning");
                return Ok(tenant);
            }

            let tenant = tx
                .tenants()
                .persist(&Tenant::new(tenant_name))
                .await
                .map_err(StatusError::persisting(TENANT_MODEL))
                .map_err(|e| e.in_stage(SeedStage::Tenant, tenant_name))?;
            seed_tenant(&mut tx, &tenant, templates)
                .instrument(ctx.for_tenant(tenant.id).span("tenant.seed"))
                .await?;
            commit(tx)
                .await
                .map_err(|e| e.in_stage(SeedStage::Tenant, tenant_name))?;
            tracing::info!(tenant_id = %tenant.id, tenant = tenant_name, "tenant provisioned");
            Ok::<_, StatusError>(tenant)
        }
        .instrument(ctx.span("tenant.provision"))
        .await
        .inspect_err(|err| tracing::error!(error = %err, tenant = tenant_name, "provisioning failed"))
    }

    /// Provisions each tenant in its own transaction, stopping at the first failure.
    pub async fn provision_many(
        &self,
        ctx: &RequestContext,
        tenant_names: &[String],
        templates: &ProvisioningTemplates,
    ) -> Result<Vec<Tenant>, StatusError> {
        let mut tenants = Vec::with_capacity(tenant_names.len());
        for name in tenant_names {
            tenants.push(self.provision(ctx, name, templates).await?);
        }
        Ok(tenants)
    }
}

/// Seeds everything a freshly created tenant owns. Logs carry the new
/// tenant's id through the caller's span.
async fn seed_tenant<U: UnitOfWork>(
    tx: &mut U,
    tenant: &Tenant,
    templates: &ProvisioningTemplates,
) -> Result<(), StatusError> {
    tracing::debug!("tenant created, seeding");

    for template in &templates.global_statuses {
        seed_global_status(tx, tenant.id, template).await?;
    }
    for template in &templates.activity_statuses {
        seed_activity_status(tx, tenant.id, template).await?;
    }

    let mut channels = Vec::with_capacity(templates.channels.len());
    for template in &templates.channels {
        channels.push(seed_channel(tx, tenant.id, template, templates).await?);
    }

    let created = seed_ponders(tx, tenant.id, &templates.ponders, &channels).await?;
    tracing::debug!(channels = channels.len(), ponders = created, "tenant seeded");
    Ok(())
}

/// Edge targets resolved from a template's subtrees. `None` leaves the stored
/// edge untouched.
#[derive(Debug, Default)]
struct ResolvedEdges {
    transitions: Option<Vec<Uuid>>,
    timer_transition_id: Option<Uuid>,
}

impl ResolvedEdges {
    fn apply_to(&self, status: &mut Status) {
        if let Some(transitions) = &self.transitions {
            status.transitions = transitions.clone();
        }
        if let Some(target) = self.timer_transition_id {
            status.timer_transition_id = Some(target);
        }
    }

    fn apply_to_global(&self, status: &mut GlobalStatus) {
        if let Some(transitions) = &self.transitions {
            status.transitions = transitions.clone();
        }
        if let Some(target) = self.timer_transition_id {
            status.timer_transition_id = Some(target);
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Write {
    Insert,
    Update,
}

async fn seed_channel_status<U: UnitOfWork>(
    tx: &mut U,
    tenant_id: Uuid,
    channel_id: Uuid,
    template: &StatusTemplate,
) -> Result<Status, StatusError> {
    seed_channel_status_row(tx, tenant_id, channel_id, template)
        .await
        .map_err(|e| e.in_stage(SeedStage::ChannelStatuses, &template.name))
}

async fn seed_channel_status_row<U: UnitOfWork>(
    tx: &mut U,
    tenant_id: Uuid,
    channel_id: Uuid,
    template: &StatusTemplate,
) -> Result<Status, StatusError> {
    let existing = find_channel_status(tx, tenant_id, channel_id, &template.name).await?;

    let mut edges = ResolvedEdges::default();
    if !template.transitions.is_empty() {
        let mut targets = Vec::with_capacity(template.transitions.len());
        for child in &template.transitions {
            let target = Box::pin(seed_channel_status(tx, tenant_id, channel_id, child)).await?;
            if !targets.contains(&target.id) {
                targets.push(target.id);
            }
        }
        edges.transitions = Some(targets);
    }
    if let Some(child) = &template.timer_transition {
        let target = Box::pin(seed_channel_status(tx, tenant_id, channel_id, child)).await?;
        edges.timer_transition_id = Some(target.id);
    }

    if let Some(mut status) = existing {
        edges.apply_to(&mut status);
        return write_channel_status(tx, tenant_id, status, Write::Update).await;
    }

    // A cyclic subtree may have created the row in the meantime.
    if let Some(created) = find_channel_status(tx, tenant_id, channel_id, &template.name).await? {
        let mut status = template.bare_status(created.id, tenant_id, channel_id);
        status.transitions = created.transitions;
        status.timer_transition_id = created.timer_transition_id;
        edges.apply_to(&mut status);
        return write_channel_status(tx, tenant_id, status, Write::Update).await;
    }

    let bare = template.bare_status(Uuid::now_v7(), tenant_id, channel_id);
    let mut status = write_channel_status(tx, tenant_id, bare, Write::Insert).await?;
    tracing::debug!(status_id = %status.id, name = %status.name, "channel status created");
    if edges.transitions.is_none() && edges.timer_transition_id.is_none() {
        return Ok(status);
    }
    edges.apply_to(&mut status);
    write_channel_status(tx, tenant_id, status, Write::Update).await
}

async fn find_channel_status<U: UnitOfWork>(
    tx: &mut U,
    tenant_id: Uuid,
    channel_id: Uuid,
    name: &str,
) -> Result<Option<Status>, StatusError> {
    tx.statuses()
        .get_by_name_and_channel(tenant_id, name, channel_id)
        .await
        .map_err(StatusError::querying(STATUS_MODEL))
}

/// Writes a seeded status through the same selector rules the status service
/// applies.
async fn write_channel_status<U: UnitOfWork>(
    tx: &mut U,
    tenant_id: Uuid,
    mut status: Status,
    write: Write,
) -> Result<Status, StatusError> {
    graph::normalize_default_flags(&mut status);
    demote_previous_holders(tx, tenant_id, &status).await?;
    let stored = match write {
        Write::Insert => tx
            .statuses()
            .persist(tenant_id, &status)
            .await
            .map_err(StatusError::persisting(STATUS_MODEL))?,
        Write::Update => tx
            .statuses()
            .update(tenant_id, &status)
            .await
            .map_err(StatusError::updating(STATUS_MODEL))?,
    };
    sync_siblings(tx, tenant_id, &stored).await?;
    Ok(stored)
}

async fn seed_global_status<U: UnitOfWork>(
    tx: &mut U,
    tenant_id: Uuid,
    template: &StatusTemplate,
) -> Result<GlobalStatus, StatusError> {
    seed_global_status_row(tx, tenant_id, template)
        .await
        .map_err(|e| e.in_stage(SeedStage::GlobalStatuses, &template.name))
}

async fn seed_global_status_row<U: UnitOfWork>(
    tx: &mut U,
    tenant_id: Uuid,
    template: &StatusTemplate,
) -> Result<GlobalStatus, StatusError> {
    let existing = find_global_status(tx, tenant_id, &template.name).await?;

    let mut edges = ResolvedEdges::default();
    if !template.transitions.is_empty() {
        let mut targets = Vec::with_capacity(template.transitions.len());
        for child in &template.transitions {
            let target = Box::pin(seed_global_status(tx, tenant_id, child)).await?;
            if !targets.contains(&target.id) {
                targets.push(target.id);
            }
        }
        edges.transitions = Some(targets);
    }
    if let Some(child) = &template.timer_transition {
        let target = Box::pin(seed_global_status(tx, tenant_id, child)).await?;
        edges.timer_transition_id = Some(target.id);
    }

    if let Some(mut status) = existing {
        edges.apply_to_global(&mut status);
        return write_global_status(tx, tenant_id, status, Write::Update).await;
    }

    if let Some(created) = find_global_status(tx, tenant_id, &template.name).await? {
        let mut status = template.bare_global_status(created.id, tenant_id);
        status.transitions = created.transitions;
        status.timer_transition_id = created.timer_transition_id;
        edges.apply_to_global(&mut status);
        return write_global_status(tx, tenant_id, status, Write::Update).await;
    }

    let bare = template.bare_global_status(Uuid::now_v7(), tenant_id);
    let mut status = write_global_status(tx, tenant_id, bare, Write::Insert).await?;
    tracing::debug!(status_id = %status.id, name = %status.name, "global status created");
    if edges.transitions.is_none() && edges.timer_transition_id.is_none() {
        return Ok(status);
    }
    edges.apply_to_global(&mut status);
    write_global_status(tx, tenant_id, status, Write::Update).await
}

async fn find_global_status<U: UnitOfWork>(
    tx: &mut U,
    tenant_id: Uuid,
    name: &str,
) -> Result<Option<GlobalStatus>, StatusError> {
    tx.global_statuses()
        .get_by_name(tenant_id, name)
        .await
        .map_err(StatusError::querying(GLOBAL_STATUS_MODEL))
}

/// Global statuses only carry the starting selector, unique per tenant.
async fn write_global_status<U: UnitOfWork>(
    tx: &mut U,
    tenant_id: Uuid,
    status: GlobalStatus,
    write: Write,
) -> Result<GlobalStatus, StatusError> {
    if status.starting_status {
        let holder = tx
            .global_statuses()
            .get_starting(tenant_id)
            .await
            .map_err(StatusError::querying(GLOBAL_STATUS_MODEL))?;
        if let Some(mut holder) = holder.filter(|h| h.id != status.id) {
            holder.starting_status = false;
            tx.global_statuses()
                .update(tenant_id, &holder)
                .await
                .map_err(StatusError::updating(GLOBAL_STATUS_MODEL))?;
        }
    }
    match write {
        Write::Insert => tx
            .global_statuses()
            .persist(tenant_id, &status)
            .await
            .map_err(StatusError::persisting(GLOBAL_STATUS_MODEL)),
        Write::Update => tx
            .global_statuses()
            .update(tenant_id, &status)
            .await
            .map_err(StatusError::updating(GLOBAL_STATUS_MODEL)),
    }
}

async fn seed_activity_status<U: UnitOfWork>(
    tx: &mut U,
    tenant_id: Uuid,
    template: &ActivityStatusTemplate,
) -> Result<(), StatusError> {
    let stage = |e: StatusError| e.in_stage(SeedStage::ActivityStatuses, &template.name);
    let existing = tx
        .activity_statuses()
        .get_by_name(tenant_id, &template.name)
        .await
        .map_err(StatusError::querying(ACTIVITY_STATUS_MODEL))
        .map_err(stage)?;
    if existing.is_none() {
        tx.activity_statuses()
            .persist(tenant_id, &template.to_activity_status(tenant_id))
            .await
            .map_err(StatusError::persisting(ACTIVITY_STATUS_MODEL))
            .map_err(stage)?;
    }
    Ok(())
}

/// Lookup-or-create. Statuses and signals are only seeded for channels
/// created by this run.
async fn seed_channel<U: UnitOfWork>(
    tx: &mut U,
    tenant_id: Uuid,
    template: &ChannelTemplate,
    templates: &ProvisioningTemplates,
) -> Result<Channel, StatusError> {
    let stage = |e: StatusError| e.in_stage(SeedStage::Channels, &template.name);
    let existing = tx
        .channels()
        .get_by_name(tenant_id, &template.name)
        .await
        .map_err(StatusError::querying(CHANNEL_MODEL))
        .map_err(stage)?;
    if let Some(channel) = existing {
        return Ok(channel);
    }

    let channel = tx
        .channels()
        .persist(tenant_id, &template.to_channel(tenant_id))
        .await
        .map_err(StatusError::persisting(CHANNEL_MODEL))
        .map_err(stage)?;
    tracing::debug!(channel_id = %channel.id, name = %channel.name, kind = channel.kind.as_str(), "channel created");

    let real_time = channel.kind.is_real_time();
    let statuses = if real_time {
        &templates.system_statuses
    } else {
        &templates.basic_statuses
    };
    for status in statuses {
        seed_channel_status(tx, tenant_id, channel.id, status)
            .await
            .map_err(stage)?;
    }

    if real_time {
        for signal in &templates.signals {
            seed_signal(tx, tenant_id, &channel, signal).await.map_err(stage)?;
        }
    }
    Ok(channel)
}

async fn seed_signal<U: UnitOfWork>(
    tx: &mut U,
    tenant_id: Uuid,
    channel: &Channel,
    template: &SignalTemplate,
) -> Result<(), StatusError> {
    let stage = |e: StatusError| e.in_stage(SeedStage::Signals, &template.signal_name);
    let existing = tx
        .signals()
        .get_by_service_model_action_and_channel(
            tenant_id,
            &template.service,
            &template.model_name,
            &template.action,
            channel.id,
        )
        .await
        .map_err(StatusError::querying(SIGNAL_MODEL))
        .map_err(stage)?;
    if existing.is_some() {
        return Ok(());
    }

    let status_id = match &template.status {
        Some(name) => {
            let status = find_channel_status(tx, tenant_id, channel.id, name)
                .await
                .map_err(stage)?
                .ok_or_else(|| StatusError::not_found(STATUS_MODEL, "name", name))
                .map_err(stage)?;
            Some(status.id)
        }
        None => None,
    };

    tx.signals()
        .persist(tenant_id, &template.to_signal(tenant_id, channel.id, status_id))
        .await
        .map_err(StatusError::persisting(SIGNAL_MODEL))
        .map_err(stage)?;
    Ok(())
}

/// Every ponder template on every channel: one channel-wide row with the
/// template's `enabled`, plus a disabled row per skill group.
async fn seed_ponders<U: UnitOfWork>(
    tx: &mut U,
    tenant_id: Uuid,
    templates: &[PonderTemplate],
    channels: &[Channel],
) -> Result<usize, StatusError> {
    let mut created = 0;
    for template in templates {
        let stage = |e: StatusError| e.in_stage(SeedStage::Ponders, &template.name);
        for channel in channels {
            let rows = std::iter::once((None, template.enabled)).chain(
                channel
                    .skill_group_ids
                    .iter()
                    .map(|skill_group_id| (Some(*skill_group_id), false)),
            );
            for (skill_group_id, enabled) in rows {
                let ponder = template.to_ponder(tenant_id, channel.id, skill_group_id, enabled);
                let existing = tx
                    .ponders()
                    .get_by_key(tenant_id, &ponder.key())
                    .await
                    .map_err(StatusError::querying(PONDER_MODEL))
                    .map_err(stage)?;
                if existing.is_some() {
                    continue;
                }
                tx.ponders()
                    .persist(tenant_id, &ponder)
                    .await
                    .map_err(StatusError::persisting(PONDER_MODEL))
                    .map_err(stage)?;
                created += 1;
            }
        }
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Selector, holders};
    use crate::memory::{MemoryState, MemoryStore};
    use crate::models::ChannelKind;

    fn ctx() -> RequestContext {
        RequestContext::background()
    }

    fn counts(state: &MemoryState) -> [usize; 7] {
        [
            state.tenants.len(),
            state.channels.len(),
            state.statuses.len(),
            state.global_statuses.len(),
            state.signals.len(),
            state.activity_statuses.len(),
            state.ponders.len(),
        ]
    }

    fn voice_only(statuses: Vec<StatusTemplate>) -> ProvisioningTemplates {
        ProvisioningTemplates {
            channels: vec![ChannelTemplate {
                name: "voice".into(),
                label: "Voice".into(),
                kind: ChannelKind::Voice,
                skill_group_ids: Vec::new(),
            }],
            system_statuses: statuses,
            ..ProvisioningTemplates::default()
        }
    }

    fn available() -> StatusTemplate {
        StatusTemplate {
            starting_status: true,
            ..StatusTemplate::new("Available", "Available")
        }
    }

    fn status_named<'a>(state: &'a MemoryState, name: &str) -> &'a Status {
        state
            .statuses
            .values()
            .find(|s| s.name == name)
            .unwrap_or_else(|| panic!("status {name} was not seeded"))
    }

    #[tokio::test]
    async fn voice_channel_with_available_and_busy() {
        let store = MemoryStore::new();
        let provisioner = TenantProvisioner::new(store.clone());
        let busy = StatusTemplate {
            blocked: true,
            ..StatusTemplate::new("Busy", "Busy")
        }
        .with_timer(60, available());
        let templates = voice_only(vec![available(), busy]);

        let tenant = provisioner.provision(&ctx(), "t1", &templates).await.unwrap();
        let state = store.snapshot().await;
        assert_eq!(state.statuses.len(), 2);

        let available = status_named(&state, "Available");
        let busy = status_named(&state, "Busy");
        assert_eq!(available.tenant_id, tenant.id);
        assert!(available.starting_status);
        assert_eq!(busy.timer, 60);
        assert_eq!(busy.timer_transition_id, Some(available.id));

        let again = provisioner.provision(&ctx(), "t1", &templates).await.unwrap();
        assert_eq!(again.id, tenant.id);
        assert_eq!(counts(&store.snapshot().await), counts(&state));
    }

    #[tokio::test]
    async fn provisioning_standard_templates_is_idempotent() {
        let store = MemoryStore::new();
        let provisioner = TenantProvisioner::new(store.clone());
        let templates = ProvisioningTemplates::standard();

        let first = provisioner.provision(&ctx(), "acme", &templates).await.unwrap();
        let after_first = counts(&store.snapshot().await);
        let second = provisioner.provision(&ctx(), "acme", &templates).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(counts(&store.snapshot().await), after_first);
        assert_eq!(after_first[0], 1);
    }

    #[tokio::test]
    async fn standard_templates_seed_signals_only_on_real_time_channels() {
        let store = MemoryStore::new();
        let provisioner = TenantProvisioner::new(store.clone());
        let templates = ProvisioningTemplates::standard();
        provisioner.provision(&ctx(), "acme", &templates).await.unwrap();

        let state = store.snapshot().await;
        for channel in state.channels.values() {
            let signals = state.signals.values().filter(|s| s.channel_id == channel.id).count();
            let statuses = state.statuses_of(channel.tenant_id, channel.id);
            if channel.kind.is_real_time() {
                assert_eq!(signals, templates.signals.len());
                assert!(statuses.iter().any(|s| s.name == "Missed"));
            } else {
                assert_eq!(signals, 0);
                assert!(statuses.iter().any(|s| s.name == "Away"));
                assert!(!statuses.iter().any(|s| s.name == "Missed"));
            }
        }

        let voice = state.channels.values().find(|c| c.name == "voice").unwrap();
        let missed = state
            .statuses
            .values()
            .find(|s| s.channel_id == voice.id && s.name == "Missed")
            .unwrap();
        let rejected = state
            .signals
            .values()
            .find(|s| s.channel_id == voice.id && s.action == "rejected")
            .unwrap();
        assert_eq!(rejected.status_id, Some(missed.id));
    }

    #[tokio::test]
    async fn seeded_channels_respect_selector_invariants() {
        let store = MemoryStore::new();
        let provisioner = TenantProvisioner::new(store.clone());
        provisioner
            .provision(&ctx(), "acme", &ProvisioningTemplates::standard())
            .await
            .unwrap();

        let state = store.snapshot().await;
        for channel in state.channels.values() {
            let statuses: Vec<Status> = state
                .statuses_of(channel.tenant_id, channel.id)
                .into_iter()
                .cloned()
                .collect();
            for selector in Selector::ALL {
                assert!(holders(selector, &statuses).len() <= 1);
            }
            assert_eq!(holders(Selector::Starting, &statuses).len(), 1);
            for status in &statuses {
                for target in status.transitions.iter().chain(status.timer_transition_id.iter()) {
                    assert!(statuses.iter().any(|s| s.id == *target), "dangling edge from {}", status.name);
                }
            }
        }
        assert_eq!(
            state.global_statuses.values().filter(|s| s.starting_status).count(),
            1
        );
    }

    #[tokio::test]
    async fn global_timer_target_is_seeded_before_its_parent() {
        let store = MemoryStore::new();
        let provisioner = TenantProvisioner::new(store.clone());
        let online = || StatusTemplate {
            starting_status: true,
            ..StatusTemplate::new("Online", "Online")
        };
        let templates = ProvisioningTemplates {
            global_statuses: vec![
                StatusTemplate::new("Pause", "Pause").with_timer(900, online()),
                online().with_transitions(vec![StatusTemplate::new("Pause", "Pause")]),
            ],
            ..ProvisioningTemplates::default()
        };

        provisioner.provision(&ctx(), "acme", &templates).await.unwrap();
        let state = store.snapshot().await;
        assert_eq!(state.global_statuses.len(), 2);

        let online = state.global_statuses.values().find(|s| s.name == "Online").unwrap();
        let pause = state.global_statuses.values().find(|s| s.name == "Pause").unwrap();
        assert_eq!(pause.timer_transition_id, Some(online.id));
        assert_eq!(online.transitions, vec![pause.id]);
        assert!(online.starting_status);
    }

    #[tokio::test]
    async fn cyclic_templates_resolve_to_one_row_per_name() {
        let store = MemoryStore::new();
        let provisioner = TenantProvisioner::new(store.clone());
        let away = || StatusTemplate {
            blocked: true,
            ..StatusTemplate::new("Away", "Away")
        };
        let templates = voice_only(vec![
            available().with_transitions(vec![away().with_transitions(vec![available()])]),
            away().with_transitions(vec![available()]),
        ]);

        provisioner.provision(&ctx(), "acme", &templates).await.unwrap();
        let state = store.snapshot().await;
        assert_eq!(state.statuses.len(), 2);

        let available = status_named(&state, "Available");
        let away = status_named(&state, "Away");
        assert_eq!(available.transitions, vec![away.id]);
        assert_eq!(away.transitions, vec![available.id]);
    }

    #[tokio::test]
    async fn failed_provisioning_leaves_nothing_behind() {
        let store = MemoryStore::new();
        let provisioner = TenantProvisioner::new(store.clone());
        let mut templates = voice_only(vec![available()]);
        templates.signals = vec![SignalTemplate {
            service: "telephony".into(),
            model_name: "call".into(),
            action: "answered".into(),
            signal_name: "call_answered".into(),
            status: Some("Busy".into()),
            enabled: true,
        }];

        let err = provisioner.provision(&ctx(), "acme", &templates).await.unwrap_err();
        match &err {
            StatusError::ProvisioningFailure { stage, entity, .. } => {
                assert_eq!(*stage, SeedStage::Signals);
                assert_eq!(entity, "call_answered");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(err.root().code(), "not_found");
        assert_eq!(counts(&store.snapshot().await), [0; 7]);
    }

    #[tokio::test]
    async fn ponders_cover_skill_groups_without_duplicates() {
        let store = MemoryStore::new();
        let provisioner = TenantProvisioner::new(store.clone());
        let groups = vec![Uuid::now_v7(), Uuid::now_v7()];
        let priority = PonderTemplate {
            object: "skill_group".into(),
            label: "Priority".into(),
            name: "priority".into(),
            value: 1.0,
            enabled: true,
        };
        let templates = ProvisioningTemplates {
            channels: vec![ChannelTemplate {
                name: "chat".into(),
                label: "Chat".into(),
                kind: ChannelKind::Chat,
                skill_group_ids: groups.clone(),
            }],
            ponders: vec![priority.clone(), priority],
            ..ProvisioningTemplates::default()
        };

        provisioner.provision(&ctx(), "acme", &templates).await.unwrap();
        let state = store.snapshot().await;
        assert_eq!(state.ponders.len(), 3);

        let channel_wide = state.ponders.values().find(|p| p.skill_group_id.is_none()).unwrap();
        assert!(channel_wide.enabled);
        for group in groups {
            let ponder = state
                .ponders
                .values()
                .find(|p| p.skill_group_id == Some(group))
                .unwrap();
            assert!(!ponder.enabled);
        }
    }

    #[tokio::test]
    async fn provision_many_gives_each_tenant_its_own_graph() {
        let store = MemoryStore::new();
        let provisioner = TenantProvisioner::new(store.clone());
        let names = vec!["acme".to_string(), "globex".to_string()];

        let tenants = provisioner
            .provision_many(&ctx(), &names, &ProvisioningTemplates::standard())
            .await
            .unwrap();
        assert_eq!(tenants.len(), 2);

        let state = store.snapshot().await;
        let per_tenant = |tenant_id: Uuid| state.statuses.values().filter(|s| s.tenant_id == tenant_id).count();
        assert!(per_tenant(tenants[0].id) > 0);
        assert_eq!(per_tenant(tenants[0].id), per_tenant(tenants[1].id));
    }
}
