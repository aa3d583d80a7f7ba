//! Pure invariant rules over one channel's status set. No I/O.

use uuid::Uuid;

use crate::error::StatusError;
use crate::models::Status;

/// Channel-wide singleton flags. Assigning one to a status implicitly
/// deselects the previous holder (last write wins).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    Starting,
    OnReject,
    OnTimeout,
    DefaultBlocked,
    DefaultUnblocked,
}

impl Selector {
    pub const ALL: [Selector; 5] = [
        Selector::Starting,
        Selector::OnReject,
        Selector::OnTimeout,
        Selector::DefaultBlocked,
        Selector::DefaultUnblocked,
    ];

    pub fn field(self) -> &'static str {
        match self {
            Selector::Starting => "starting_status",
            Selector::OnReject => "on_reject",
            Selector::OnTimeout => "on_timeout",
            Selector::DefaultBlocked => "default_blocked",
            Selector::DefaultUnblocked => "default_unblocked",
        }
    }

    pub fn is_held_by(self, status: &Status) -> bool {
        match self {
            Selector::Starting => status.starting_status,
            Selector::OnReject => status.on_reject,
            Selector::OnTimeout => status.on_timeout,
            Selector::DefaultBlocked => status.default_blocked,
            Selector::DefaultUnblocked => status.default_unblocked,
        }
    }

    pub fn release(self, status: &mut Status) {
        match self {
            Selector::Starting => status.starting_status = false,
            Selector::OnReject => status.on_reject = false,
            Selector::OnTimeout => status.on_timeout = false,
            Selector::DefaultBlocked => status.default_blocked = false,
            Selector::DefaultUnblocked => status.default_unblocked = false,
        }
    }
}

/// Every status in `statuses` holding `selector`. More than one entry means
/// the channel is inconsistent.
#[cfg(test)]
pub(crate) fn holders(selector: Selector, statuses: &[Status]) -> Vec<&Status> {
    statuses.iter().filter(|s| selector.is_held_by(s)).collect()
}

pub fn validate_rename(old: &Status, new: &Status) -> Result<(), StatusError> {
    if old.system && old.name != new.name {
        return Err(StatusError::invariant(
            "name",
            format!("can not rename system status `{}`", old.name),
        ));
    }
    Ok(())
}

/// `default_blocked` only sticks on blocked statuses and `default_unblocked`
/// only on unblocked ones.
pub fn normalize_default_flags(status: &mut Status) {
    if !status.blocked {
        status.default_blocked = false;
    }
    if status.blocked {
        status.default_unblocked = false;
    }
}

/// Siblings that must drop a default flag because `changed` now holds it,
/// returned with the flag already cleared. `changed` itself is never returned.
pub fn compute_sibling_resets(changed: &Status, siblings: &[Status]) -> Vec<Status> {
    siblings
        .iter()
        .filter(|sibling| sibling.id != changed.id && sibling.channel_id == changed.channel_id)
        .filter_map(|sibling| {
            let mut reset = sibling.clone();
            let mut mutated = false;
            for selector in [Selector::DefaultBlocked, Selector::DefaultUnblocked] {
                if selector.is_held_by(changed) && selector.is_held_by(&reset) {
                    selector.release(&mut reset);
                    mutated = true;
                }
            }
            mutated.then_some(reset)
        })
        .collect()
}

pub fn validate_timer_target(
    status: &Status,
    candidate_target_id: Uuid,
    all_in_channel: &[Status],
) -> Result<(), StatusError> {
    if all_in_channel.iter().any(|s| s.id == candidate_target_id) {
        return Ok(());
    }
    Err(StatusError::invariant(
        "timer_transition_id",
        format!(
            "unknown transition target {candidate_target_id} for status `{}`",
            status.name
        ),
    ))
}

/// A status without a timer has no timer edge.
pub fn drop_idle_timer_target(status: &mut Status) {
    if status.timer == 0 {
        status.timer_transition_id = None;
    }
}

pub fn validate_transition_targets(
    status: &Status,
    all_in_channel: &[Status],
) -> Result<(), StatusError> {
    if let Some((i, repeated)) = status
        .transitions
        .iter()
        .enumerate()
        .find(|&(i, target)| status.transitions[..i].contains(target))
    {
        return Err(StatusError::invariant(
            "transitions",
            format!(
                "transition target {repeated} is listed more than once for status `{}` (position {i})",
                status.name
            ),
        ));
    }
    match status
        .transitions
        .iter()
        .find(|target| !all_in_channel.iter().any(|s| s.id == **target))
    {
        Some(unknown) => Err(StatusError::invariant(
            "transitions",
            format!(
                "unknown transition target {unknown} for status `{}`",
                status.name
            ),
        )),
        None => Ok(()),
    }
}

/// Drops every edge from `status` to `target_id`. Returns whether anything changed.
pub fn unlink_references(target_id: Uuid, status: &mut Status) -> bool {
    let before = status.transitions.len();
    status.transitions.retain(|id| *id != target_id);
    let mut changed = status.transitions.len() != before;

    if status.timer_transition_id == Some(target_id) {
        status.timer_transition_id = None;
        status.timer = 0;
        changed = true;
    }
    changed
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::Utc;
    use uuid::Uuid;

    use crate::models::Status;

    pub fn status(channel_id: Uuid, name: &str) -> Status {
        let now = Utc::now();
        Status {
            id: Uuid::now_v7(),
            tenant_id: Uuid::nil(),
            channel_id,
            name: name.to_string(),
            label: name.to_string(),
            reason: String::new(),
            blocked: false,
            system: false,
            starting_status: false,
            on_reject: false,
            on_timeout: false,
            default_blocked: false,
            default_unblocked: false,
            timer: 0,
            timer_transition_id: None,
            transitions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::status;
    use super::*;

    #[test]
    fn rename_of_system_status_is_rejected() {
        let channel = Uuid::now_v7();
        let mut old = status(channel, "Available");
        old.system = true;
        let mut new = old.clone();
        new.name = "Ready".into();

        let err = validate_rename(&old, &new).unwrap_err();
        assert_eq!(err.code(), "invariant_violation");
        assert_eq!(err.field().as_deref(), Some("name"));
    }

    #[test]
    fn system_status_may_change_other_fields() {
        let mut old = status(Uuid::now_v7(), "Available");
        old.system = true;
        let mut new = old.clone();
        new.label = "Ready for calls".into();
        new.blocked = true;

        assert!(validate_rename(&old, &new).is_ok());
    }

    #[test]
    fn regular_status_may_be_renamed() {
        let old = status(Uuid::now_v7(), "Lunch");
        let mut new = old.clone();
        new.name = "Lunch break".into();
        assert!(validate_rename(&old, &new).is_ok());
    }

    #[test]
    fn sibling_resets_clear_only_the_flag_the_changed_status_holds() {
        let channel = Uuid::now_v7();
        let mut changed = status(channel, "Break");
        changed.blocked = true;
        changed.default_blocked = true;

        let mut away = status(channel, "Away");
        away.blocked = true;
        away.default_blocked = true;
        let mut available = status(channel, "Available");
        available.default_unblocked = true;

        let resets = compute_sibling_resets(&changed, &[away.clone(), available, changed.clone()]);
        assert_eq!(resets.len(), 1);
        assert_eq!(resets[0].id, away.id);
        assert!(!resets[0].default_blocked);
    }

    #[test]
    fn sibling_resets_exclude_the_changed_status() {
        let channel = Uuid::now_v7();
        let mut changed = status(channel, "Available");
        changed.default_unblocked = true;

        assert!(compute_sibling_resets(&changed, &[changed.clone()]).is_empty());
    }

    #[test]
    fn sibling_resets_ignore_other_channels() {
        let mut changed = status(Uuid::now_v7(), "Available");
        changed.default_unblocked = true;
        let mut elsewhere = status(Uuid::now_v7(), "Available");
        elsewhere.default_unblocked = true;

        assert!(compute_sibling_resets(&changed, &[elsewhere]).is_empty());
    }

    #[test]
    fn normalize_drops_incompatible_default_flags() {
        let mut s = status(Uuid::now_v7(), "Available");
        s.default_blocked = true;
        s.default_unblocked = true;
        normalize_default_flags(&mut s);
        assert!(!s.default_blocked);
        assert!(s.default_unblocked);

        s.blocked = true;
        s.default_blocked = true;
        normalize_default_flags(&mut s);
        assert!(s.default_blocked);
        assert!(!s.default_unblocked);
    }

    #[test]
    fn timer_target_must_live_in_channel() {
        let channel = Uuid::now_v7();
        let available = status(channel, "Available");
        let busy = status(channel, "Busy");
        let all = vec![available.clone(), busy.clone()];

        assert!(validate_timer_target(&busy, available.id, &all).is_ok());
        let err = validate_timer_target(&busy, Uuid::now_v7(), &all).unwrap_err();
        assert_eq!(err.field().as_deref(), Some("timer_transition_id"));
    }

    #[test]
    fn transition_targets_may_form_cycles() {
        let channel = Uuid::now_v7();
        let mut a = status(channel, "A");
        let mut b = status(channel, "B");
        a.transitions = vec![b.id];
        b.transitions = vec![a.id];
        let all = vec![a.clone(), b.clone()];

        assert!(validate_transition_targets(&a, &all).is_ok());
        assert!(validate_transition_targets(&b, &all).is_ok());

        a.transitions.push(Uuid::now_v7());
        let err = validate_transition_targets(&a, &all).unwrap_err();
        assert_eq!(err.field().as_deref(), Some("transitions"));
    }

    #[test]
    fn repeated_transition_target_is_rejected() {
        let channel = Uuid::now_v7();
        let target = status(channel, "Available");
        let mut s = status(channel, "Busy");
        s.transitions = vec![target.id, target.id];
        let all = vec![target.clone(), s.clone()];

        let err = validate_transition_targets(&s, &all).unwrap_err();
        assert_eq!(err.code(), "invariant_violation");
        assert_eq!(err.field().as_deref(), Some("transitions"));
    }

    #[test]
    fn idle_timer_drops_its_target() {
        let channel = Uuid::now_v7();
        let mut s = status(channel, "Busy");
        s.timer_transition_id = Some(Uuid::now_v7());
        drop_idle_timer_target(&mut s);
        assert_eq!(s.timer_transition_id, None);

        let target = Uuid::now_v7();
        s.timer = 30;
        s.timer_transition_id = Some(target);
        drop_idle_timer_target(&mut s);
        assert_eq!(s.timer_transition_id, Some(target));
    }

    #[test]
    fn unlink_removes_transition_and_timer_edges() {
        let channel = Uuid::now_v7();
        let target = status(channel, "Available");
        let mut s = status(channel, "Busy");
        s.transitions = vec![target.id, Uuid::now_v7()];
        s.timer = 60;
        s.timer_transition_id = Some(target.id);

        assert!(unlink_references(target.id, &mut s));
        assert_eq!(s.transitions.len(), 1);
        assert_eq!(s.timer_transition_id, None);
        assert_eq!(s.timer, 0);
        assert!(!unlink_references(target.id, &mut s));
    }

    #[test]
    fn holders_lists_every_flag_holder() {
        let channel = Uuid::now_v7();
        let mut a = status(channel, "A");
        a.on_reject = true;
        let b = status(channel, "B");
        let all = vec![a.clone(), b];
        let found = holders(Selector::OnReject, &all);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, a.id);
        assert!(holders(Selector::OnTimeout, &all).is_empty());
    }
}
