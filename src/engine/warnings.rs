use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};

use crate::storage::models::Identity;
use crate::storage::task_store::TaskStore;
use crate::utils::logging::{log_corrupt_record, log_moderation_action};

use super::bans::{BanRegistry, BanRequest, OwnedTasks};
use super::permissions::PermissionEvaluator;

pub const AUTO_BAN_REASON: &str = "Warning limit reached";

/// Outcome of a single `warn` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarnOutcome {
    /// Not permitted, or the auto-ban expiry does not fit in a timestamp.
    Rejected { count: u32 },
    Counted { count: u32 },
    /// The limit was hit: the count went back to zero and a temporary ban
    /// was issued, unless a longer ban was already in place.
    Escalated { banned: bool },
}

impl WarnOutcome {
    pub fn count(self) -> u32 {
        match self {
            WarnOutcome::Rejected { count } | WarnOutcome::Counted { count } => count,
            WarnOutcome::Escalated { .. } => 0,
        }
    }
}

/// Per-identity warning counts that turn into a temporary ban at `limit`.
#[derive(Debug, Clone)]
pub struct WarningTracker {
    counts: HashMap<Identity, u32>,
    limit: u32,
    auto_ban_duration: Duration,
}

impl WarningTracker {
    pub fn new(limit: u32, auto_ban_duration: Duration) -> Self {
        Self {
            counts: HashMap::new(),
            limit: limit.max(1),
            auto_ban_duration,
        }
    }

    /// Counts at or above the limit cannot exist at rest, so a stored count
    /// that high (say, after the limit was lowered) is clamped below it.
    pub fn restore(limit: u32, auto_ban_duration: Duration, persisted: BTreeMap<Identity, u32>) -> Self {
        let mut tracker = Self::new(limit, auto_ban_duration);
        for (id, count) in persisted {
            let clamped = count.min(tracker.limit - 1);
            if clamped != count {
                log_corrupt_record(
                    "warnings",
                    &id.to_string(),
                    &format!("count {count} clamped to {clamped}"),
                );
            }
            if clamped > 0 {
                tracker.counts.insert(id, clamped);
            }
        }
        tracker
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn auto_ban_duration(&self) -> Duration {
        self.auto_ban_duration
    }

    pub fn count_of(&self, id: Identity) -> u32 {
        self.counts.get(&id).copied().unwrap_or(0)
    }

    /// Adds a warning; on reaching the limit the count resets and the
    /// target is banned for the auto-ban duration in the same step. An
    /// escalation never purges owned tasks and never shortens a ban that
    /// already runs longer.
    #[allow(clippy::too_many_arguments)]
    pub fn warn(
        &mut self,
        permissions: &PermissionEvaluator<'_>,
        bans: &mut BanRegistry,
        tasks: &mut dyn TaskStore,
        actor: Identity,
        target: Identity,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> WarnOutcome {
        if !permissions.can_ban(actor, target) {
            return WarnOutcome::Rejected {
                count: self.count_of(target),
            };
        }

        let current = self.count_of(target);
        let count = current + 1;
        if count < self.limit {
            self.counts.insert(target, count);
            log_moderation_action(
                "warn",
                actor,
                target,
                Some(&format!("{}/{} {}", count, self.limit, reason.unwrap_or_default())),
            );
            return WarnOutcome::Counted { count };
        }

        let Some(auto_until) = now.checked_add_signed(self.auto_ban_duration) else {
            log_moderation_action("warn_rejected", actor, target, Some("auto-ban expiry out of range"));
            return WarnOutcome::Rejected { count: current };
        };
        self.counts.remove(&target);
        let outlasts = bans
            .record(target)
            .filter(|r| !r.is_expired_at(now))
            .is_some_and(|r| r.expires_at.map_or(true, |until| until >= auto_until));
        if outlasts {
            log_moderation_action("warn_escalation_skipped", actor, target, Some("longer ban in place"));
            return WarnOutcome::Escalated { banned: false };
        }

        let reason = reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or(AUTO_BAN_REASON);
        let banned = bans.ban(
            permissions,
            BanRequest {
                actor,
                target,
                reason,
                duration: Some(self.auto_ban_duration),
                owned_tasks: OwnedTasks::Keep,
            },
            tasks,
            now,
        );
        WarnOutcome::Escalated { banned }
    }

    pub fn clear(&mut self, permissions: &PermissionEvaluator<'_>, actor: Identity, target: Identity) -> bool {
        if !permissions.can_manage(actor, target) {
            return false;
        }
        self.counts.remove(&target);
        log_moderation_action("clear_warnings", actor, target, None);
        true
    }

    pub fn snapshot(&self) -> BTreeMap<Identity, u32> {
        self.counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(id, count)| (*id, *count))
            .collect()
    }
}
