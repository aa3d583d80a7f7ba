use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TENANT_MODEL: &str = "tenant";
pub const CHANNEL_MODEL: &str = "channel";
pub const STATUS_MODEL: &str = "channel status";
pub const GLOBAL_STATUS_MODEL: &str = "global status";
pub const SIGNAL_MODEL: &str = "signal";
pub const ACTIVITY_STATUS_MODEL: &str = "activity status";
pub const PONDER_MODEL: &str = "ponder";

/// Isolation boundary. Every other entity carries its `tenant_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    /// Unique across the installation
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Communication medium a channel runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Voice,
    Video,
    Chat,
    Email,
    Sms,
    Ticket,
}

impl ChannelKind {
    /// Real-time communication channels get the system status set and signals.
    pub fn is_real_time(self) -> bool {
        matches!(self, ChannelKind::Voice | ChannelKind::Video)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChannelKind::Voice => "voice",
            ChannelKind::Video => "video",
            ChannelKind::Chat => "chat",
            ChannelKind::Email => "email",
            ChannelKind::Sms => "sms",
            ChannelKind::Ticket => "ticket",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "voice" => Some(ChannelKind::Voice),
            "video" => Some(ChannelKind::Video),
            "chat" => Some(ChannelKind::Chat),
            "email" => Some(ChannelKind::Email),
            "sms" => Some(ChannelKind::Sms),
            "ticket" => Some(ChannelKind::Ticket),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Unique per tenant
    pub name: String,
    pub label: String,
    pub kind: ChannelKind,
    /// Skill groups routed through this channel. Owned by the skill group service.
    pub skill_group_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A channel-scoped agent availability status.
///
/// `transitions` and `timer_transition_id` are weak edges stored as ids; the
/// graph they form may contain cycles. The five selector flags
/// (`starting_status`, `on_reject`, `on_timeout`, `default_blocked`,
/// `default_unblocked`) are each held by at most one status per channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub channel_id: Uuid,
    pub name: String,
    pub label: String,
    pub reason: String,
    /// Agents in a blocked status receive no routed work
    pub blocked: bool,
    /// Built-in status; cannot be renamed
    pub system: bool,
    /// Assigned to an agent right after login
    pub starting_status: bool,
    /// Assigned when the agent rejects an offered call
    pub on_reject: bool,
    /// Assigned when an offered call times out
    pub on_timeout: bool,
    /// Target when the agent is coarsely moved to "blocked"
    pub default_blocked: bool,
    /// Target when the agent is coarsely moved to "unblocked"
    pub default_unblocked: bool,
    /// Seconds before the automatic move to `timer_transition_id`; 0 disables
    pub timer: i64,
    pub timer_transition_id: Option<Uuid>,
    /// Statuses an agent may manually move to from this one
    pub transitions: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Tenant-scoped status shared by every channel. Only the starting selector
/// applies, and it is unique per tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalStatus {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub label: String,
    pub reason: String,
    pub blocked: bool,
    pub system: bool,
    pub starting_status: bool,
    pub timer: i64,
    pub timer_transition_id: Option<Uuid>,
    pub transitions: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Webhook-style rule notifying an external service about a state change on
/// a channel, optionally bound to one status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub channel_id: Uuid,
    pub status_id: Option<Uuid>,
    pub service: String,
    pub model_name: String,
    pub action: String,
    pub signal_name: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Why a customer-facing activity (call, chat) is in its current sub-state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityStatus {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Unique per tenant
    pub name: String,
    pub label: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Routing preference weight for a channel, or a channel/skill-group pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ponder {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub channel_id: Uuid,
    pub skill_group_id: Option<Uuid>,
    /// What is weighted: "agent" or "skill_group"
    pub object: String,
    pub label: String,
    pub name: String,
    pub value: f64,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ponder {
    pub fn key(&self) -> PonderKey {
        PonderKey {
            channel_id: self.channel_id,
            skill_group_id: self.skill_group_id,
            object: self.object.clone(),
            name: self.name.clone(),
        }
    }
}

/// Natural key of a ponder row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PonderKey {
    pub channel_id: Uuid,
    pub skill_group_id: Option<Uuid>,
    pub object: String,
    pub name: String,
}
