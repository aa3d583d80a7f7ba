//! Declarative seed data for a new tenant.
//!
//! Status templates are trees: `transitions` and `timer_transition` embed the
//! target status by value, and the provisioner resolves them by name. A target
//! that points back at an ancestor is written as a leaf copy (no edges of its
//! own); the ancestor's edges are attached when the ancestor itself is seeded.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ActivityStatus, Channel, ChannelKind, GlobalStatus, Ponder, Signal, Status};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusTemplate {
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
    pub transitions: Vec<StatusTemplate>,
    pub timer_transition: Option<Box<StatusTemplate>>,
}

impl StatusTemplate {
    pub fn new(name: &str, label: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            ..Self::default()
        }
    }

    pub fn with_transitions(mut self, transitions: Vec<StatusTemplate>) -> Self {
        self.transitions = transitions;
        self
    }

    pub fn with_timer(mut self, seconds: i64, target: StatusTemplate) -> Self {
        self.timer = seconds;
        self.timer_transition = Some(Box::new(target));
        self
    }

    /// Row for this template with every edge stripped.
    pub(crate) fn bare_status(&self, id: Uuid, tenant_id: Uuid, channel_id: Uuid) -> Status {
        let now = Utc::now();
        Status {
            id,
            tenant_id,
            channel_id,
            name: self.name.clone(),
            label: self.label.clone(),
            reason: self.reason.clone(),
            blocked: self.blocked,
            system: self.system,
            starting_status: self.starting_status,
            on_reject: self.on_reject,
            on_timeout: self.on_timeout,
            default_blocked: self.default_blocked,
            default_unblocked: self.default_unblocked,
            timer: self.timer,
            timer_transition_id: None,
            transitions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn bare_global_status(&self, id: Uuid, tenant_id: Uuid) -> GlobalStatus {
        let now = Utc::now();
        GlobalStatus {
            id,
            tenant_id,
            name: self.name.clone(),
            label: self.label.clone(),
            reason: self.reason.clone(),
            blocked: self.blocked,
            system: self.system,
            starting_status: self.starting_status,
            timer: self.timer,
            timer_transition_id: None,
            transitions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelTemplate {
    pub name: String,
    pub label: String,
    pub kind: ChannelKind,
    #[serde(default)]
    pub skill_group_ids: Vec<Uuid>,
}

impl ChannelTemplate {
    pub(crate) fn to_channel(&self, tenant_id: Uuid) -> Channel {
        let now = Utc::now();
        Channel {
            id: Uuid::now_v7(),
            tenant_id,
            name: self.name.clone(),
            label: self.label.clone(),
            kind: self.kind,
            skill_group_ids: self.skill_group_ids.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Signal seeded on every real-time channel. `status` names a channel status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalTemplate {
    pub service: String,
    pub model_name: String,
    pub action: String,
    pub signal_name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default = "enabled")]
    pub enabled: bool,
}

fn enabled() -> bool {
    true
}

impl SignalTemplate {
    pub(crate) fn to_signal(&self, tenant_id: Uuid, channel_id: Uuid, status_id: Option<Uuid>) -> Signal {
        let now = Utc::now();
        Signal {
            id: Uuid::now_v7(),
            tenant_id,
            channel_id,
            status_id,
            service: self.service.clone(),
            model_name: self.model_name.clone(),
            action: self.action.clone(),
            signal_name: self.signal_name.clone(),
            enabled: self.enabled,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityStatusTemplate {
    pub name: String,
    pub label: String,
    pub description: String,
}

impl ActivityStatusTemplate {
    pub(crate) fn to_activity_status(&self, tenant_id: Uuid) -> ActivityStatus {
        let now = Utc::now();
        ActivityStatus {
            id: Uuid::now_v7(),
            tenant_id,
            name: self.name.clone(),
            label: self.label.clone(),
            description: self.description.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PonderTemplate {
    pub object: String,
    pub label: String,
    pub name: String,
    pub value: f64,
    #[serde(default = "enabled")]
    pub enabled: bool,
}

impl PonderTemplate {
    pub(crate) fn to_ponder(
        &self,
        tenant_id: Uuid,
        channel_id: Uuid,
        skill_group_id: Option<Uuid>,
        enabled: bool,
    ) -> Ponder {
        let now = Utc::now();
        Ponder {
            id: Uuid::now_v7(),
            tenant_id,
            channel_id,
            skill_group_id,
            object: self.object.clone(),
            label: self.label.clone(),
            name: self.name.clone(),
            value: self.value,
            enabled,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Everything seeded into a freshly provisioned tenant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningTemplates {
    pub channels: Vec<ChannelTemplate>,
    /// Seeded into real-time channels
    pub system_statuses: Vec<StatusTemplate>,
    /// Seeded into every other channel
    pub basic_statuses: Vec<StatusTemplate>,
    pub global_statuses: Vec<StatusTemplate>,
    pub signals: Vec<SignalTemplate>,
    pub activity_statuses: Vec<ActivityStatusTemplate>,
    pub ponders: Vec<PonderTemplate>,
}

impl ProvisioningTemplates {
    /// Built-in set used when no template file is supplied.
    pub fn standard() -> Self {
        Self {
            channels: vec![
                channel("voice", "Voice", ChannelKind::Voice),
                channel("video", "Video", ChannelKind::Video),
                channel("chat", "Chat", ChannelKind::Chat),
                channel("email", "E-mail", ChannelKind::Email),
            ],
            system_statuses: system_statuses(),
            basic_statuses: basic_statuses(),
            global_statuses: global_statuses(),
            signals: signals(),
            activity_statuses: activity_statuses(),
            ponders: ponders(),
        }
    }
}

fn channel(name: &str, label: &str, kind: ChannelKind) -> ChannelTemplate {
    ChannelTemplate {
        name: name.to_string(),
        label: label.to_string(),
        kind,
        skill_group_ids: Vec::new(),
    }
}

fn available() -> StatusTemplate {
    StatusTemplate {
        system: true,
        starting_status: true,
        default_unblocked: true,
        ..StatusTemplate::new("Available", "Available")
    }
}

fn busy() -> StatusTemplate {
    StatusTemplate {
        system: true,
        blocked: true,
        ..StatusTemplate::new("Busy", "On a call")
    }
}

fn missed() -> StatusTemplate {
    StatusTemplate {
        system: true,
        blocked: true,
        on_reject: true,
        on_timeout: true,
        reason: "Offered call was not answered".into(),
        ..StatusTemplate::new("Missed", "Missed call")
    }
}

fn wrap_up() -> StatusTemplate {
    StatusTemplate {
        system: true,
        blocked: true,
        ..StatusTemplate::new("Wrap-up", "After call work")
    }
}

fn pause(name: &str, label: &str) -> StatusTemplate {
    StatusTemplate {
        blocked: true,
        ..StatusTemplate::new(name, label)
    }
}

fn break_status() -> StatusTemplate {
    StatusTemplate {
        default_blocked: true,
        ..pause("Break", "Break")
    }
}

fn system_statuses() -> Vec<StatusTemplate> {
    let back_to_work = || vec![available()];
    vec![
        available().with_transitions(vec![
            break_status().with_transitions(back_to_work()),
            pause("Lunch", "Lunch").with_transitions(back_to_work()),
            pause("Meeting", "Meeting").with_transitions(back_to_work()),
            pause("Training", "Training").with_transitions(back_to_work()),
        ]),
        busy(),
        wrap_up().with_timer(30, available()).with_transitions(back_to_work()),
        missed()
            .with_timer(120, available())
            .with_transitions(vec![available(), break_status()]),
    ]
}

fn basic_statuses() -> Vec<StatusTemplate> {
    let away = || StatusTemplate {
        system: true,
        default_blocked: true,
        ..pause("Away", "Away")
    };
    vec![
        available().with_transitions(vec![away().with_transitions(vec![available()])]),
        busy(),
    ]
}

fn global_statuses() -> Vec<StatusTemplate> {
    let online = || StatusTemplate {
        system: true,
        starting_status: true,
        ..StatusTemplate::new("Online", "Online")
    };
    let offline = || StatusTemplate {
        system: true,
        ..pause("Offline", "Offline")
    };
    vec![
        online().with_transitions(vec![
            pause("Pause", "Pause").with_timer(900, online()),
            offline().with_transitions(vec![online()]),
        ]),
    ]
}

fn signal(action: &str, signal_name: &str, status: Option<&str>) -> SignalTemplate {
    SignalTemplate {
        service: "telephony".into(),
        model_name: "call".into(),
        action: action.into(),
        signal_name: signal_name.into(),
        status: status.map(str::to_string),
        enabled: true,
    }
}

fn signals() -> Vec<SignalTemplate> {
    vec![
        signal("answered", "call_answered", Some("Busy")),
        signal("rejected", "call_rejected", Some("Missed")),
        signal("timed_out", "call_timed_out", Some("Missed")),
        signal("ended", "call_ended", Some("Wrap-up")),
        signal("offered", "call_offered", None),
    ]
}

fn activity_statuses() -> Vec<ActivityStatusTemplate> {
    [
        ("ringing", "Ringing", "Waiting for the agent to answer"),
        ("talking", "Talking", "Agent and customer are connected"),
        ("on_hold", "On hold", "Customer is parked by the agent"),
        ("transferring", "Transferring", "Activity is being handed over"),
        ("wrap_up", "Wrap-up", "Agent is finishing after-call work"),
    ]
    .into_iter()
    .map(|(name, label, description)| ActivityStatusTemplate {
        name: name.into(),
        label: label.into(),
        description: description.into(),
    })
    .collect()
}

fn ponders() -> Vec<PonderTemplate> {
    let ponder = |object: &str, name: &str, label: &str, value: f64, enabled: bool| PonderTemplate {
        object: object.into(),
        label: label.into(),
        name: name.into(),
        value,
        enabled,
    };
    vec![
        ponder("agent", "longest_idle", "Longest idle agent", 1.0, true),
        ponder("agent", "fewest_handled", "Fewest handled activities", 0.5, false),
        ponder("skill_group", "priority", "Skill group priority", 1.0, true),
        ponder("skill_group", "queue_size", "Queue size", 0.5, false),
    ]
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn names(templates: &[StatusTemplate], out: &mut BTreeSet<String>) {
        for template in templates {
            out.insert(template.name.clone());
            names(&template.transitions, out);
            if let Some(timer) = &template.timer_transition {
                names(std::slice::from_ref(timer.as_ref()), out);
            }
        }
    }

    #[test]
    fn standard_signals_point_at_system_statuses() {
        let templates = ProvisioningTemplates::standard();
        let mut known = BTreeSet::new();
        names(&templates.system_statuses, &mut known);

        for signal in &templates.signals {
            if let Some(status) = &signal.status {
                assert!(known.contains(status), "signal {} names unknown status {status}", signal.signal_name);
            }
        }
    }

    #[test]
    fn standard_has_real_time_and_basic_channels() {
        let templates = ProvisioningTemplates::standard();
        assert!(templates.channels.iter().any(|c| c.kind.is_real_time()));
        assert!(templates.channels.iter().any(|c| !c.kind.is_real_time()));
    }

    #[test]
    fn leaf_copies_share_flags_with_their_full_template() {
        let templates = ProvisioningTemplates::standard();
        let full = &templates.system_statuses[0];
        let leaf = &full.transitions[0].transitions[0];
        assert_eq!(leaf.name, full.name);
        assert_eq!(leaf.starting_status, full.starting_status);
        assert!(leaf.transitions.is_empty());
    }

    #[test]
    fn templates_deserialize_with_defaults() {
        let json = r#"{
            "channels": [{"name": "voice", "label": "Voice", "kind": "voice"}],
            "system_statuses": [
                {"name": "Available", "label": "Available", "starting_status": true},
                {"name": "Busy", "label": "Busy", "blocked": true, "timer": 60,
                 "timer_transition": {"name": "Available", "label": "Available", "starting_status": true}}
            ],
            "signals": [{"service": "telephony", "model_name": "call", "action": "answered",
                         "signal_name": "call_answered", "status": "Busy"}]
        }"#;
        let templates: ProvisioningTemplates = serde_json::from_str(json).unwrap();

        assert_eq!(templates.channels[0].kind, ChannelKind::Voice);
        assert!(templates.channels[0].skill_group_ids.is_empty());
        assert!(templates.basic_statuses.is_empty());
        assert!(templates.signals[0].enabled);
        let busy = &templates.system_statuses[1];
        assert_eq!(busy.timer, 60);
        assert_eq!(busy.timer_transition.as_ref().unwrap().name, "Available");
    }

    #[test]
    fn bare_status_has_no_edges() {
        let template = wrap_up().with_timer(30, available()).with_transitions(vec![available()]);
        let status = template.bare_status(Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
        assert!(status.transitions.is_empty());
        assert_eq!(status.timer_transition_id, None);
        assert_eq!(status.timer, 30);
    }
}
