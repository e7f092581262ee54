use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};

use crate::storage::models::{AuditAction, AuditEntry, BanRecord, Identity};
use crate::storage::task_store::TaskStore;
use crate::utils::logging::{log_corrupt_record, log_moderation_action};

use super::permissions::PermissionEvaluator;

/// Whether a ban also deletes everything the target owns.
///
/// There is no default: every ban states what happens to owned tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnedTasks {
    Keep,
    Purge,
}

#[derive(Debug, Clone)]
pub struct BanRequest<'r> {
    pub actor: Identity,
    pub target: Identity,
    pub reason: &'r str,
    /// `None` bans permanently.
    pub duration: Option<Duration>,
    pub owned_tasks: OwnedTasks,
}

/// Result of looking at a ban with expiry applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanStatus {
    NotBanned,
    Banned,
    /// A record existed but had run out; it has just been removed.
    Expired,
}

impl BanStatus {
    pub fn is_banned(self) -> bool {
        self == BanStatus::Banned
    }
}

/// Current bans plus the append-only trail of ban and unban actions.
#[derive(Debug, Clone, Default)]
pub struct BanRegistry {
    bans: HashMap<Identity, BanRecord>,
    audit: Vec<AuditEntry>,
}

impl BanRegistry {
    pub fn restore(
        creator: Identity,
        bans: BTreeMap<Identity, BanRecord>,
        audit: Vec<AuditEntry>,
    ) -> Self {
        let mut registry = Self {
            bans: HashMap::new(),
            audit,
        };
        for (id, record) in bans {
            if id == creator {
                log_corrupt_record("bans", &id.to_string(), "ban on the creator ignored");
                continue;
            }
            registry.bans.insert(id, record);
        }
        registry
    }

    /// Removes the record if it has run out by `now`. This is the only
    /// place expiry happens; there is no background sweep.
    pub fn check_and_maybe_expire(&mut self, id: Identity, now: DateTime<Utc>) -> BanStatus {
        match self.bans.get(&id) {
            None => BanStatus::NotBanned,
            Some(record) if record.is_expired_at(now) => {
                self.bans.remove(&id);
                log_moderation_action("ban_expired", id, id, None);
                BanStatus::Expired
            }
            Some(_) => BanStatus::Banned,
        }
    }

    /// The stored record as-is, without applying expiry.
    pub fn record(&self, id: Identity) -> Option<&BanRecord> {
        self.bans.get(&id)
    }

    /// Writes the ban and its audit entry, purging owned tasks when asked.
    /// Returns false if the actor may not ban the target or the expiry
    /// does not fit in a timestamp. An existing ban on the target is replaced.
    pub fn ban(
        &mut self,
        permissions: &PermissionEvaluator<'_>,
        request: BanRequest<'_>,
        tasks: &mut dyn TaskStore,
        now: DateTime<Utc>,
    ) -> bool {
        if !permissions.can_ban(request.actor, request.target) {
            return false;
        }

        let expires_at = match request.duration {
            Some(d) => match now.checked_add_signed(d) {
                Some(until) => Some(until),
                None => {
                    log_moderation_action(
                        "ban_rejected",
                        request.actor,
                        request.target,
                        Some("expiry out of range"),
                    );
                    return false;
                }
            },
            None => None,
        };
        self.bans.insert(
            request.target,
            BanRecord {
                reason: request.reason.to_string(),
                issued_by: request.actor,
                issued_at: now,
                expires_at,
            },
        );
        self.audit.push(AuditEntry {
            action: AuditAction::Ban,
            target: request.target,
            actor: request.actor,
            reason: request.reason.to_string(),
            at: now,
            until: expires_at,
        });

        let mut purged = 0;
        if request.owned_tasks == OwnedTasks::Purge {
            for task_id in tasks.list_tasks_owned_by(request.target) {
                if tasks.delete_task(task_id) {
                    purged += 1;
                }
            }
        }

        let until = expires_at.map_or_else(|| "permanent".to_string(), |t| t.to_rfc3339());
        log_moderation_action(
            "ban",
            request.actor,
            request.target,
            Some(&format!(
                "until {}, reason '{}', {} tasks purged",
                until, request.reason, purged
            )),
        );
        true
    }

    /// Lifts a live ban. Callers apply expiry first, so a ban that has
    /// already run out counts as absent.
    pub fn unban(
        &mut self,
        permissions: &PermissionEvaluator<'_>,
        actor: Identity,
        target: Identity,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> bool {
        if !permissions.can_unban(actor, target) || !self.bans.contains_key(&target) {
            return false;
        }
        self.bans.remove(&target);
        let reason = note.unwrap_or_default().to_string();
        self.audit.push(AuditEntry {
            action: AuditAction::Unban,
            target,
            actor,
            reason,
            at: now,
            until: None,
        });
        log_moderation_action("unban", actor, target, note);
        true
    }

    pub fn audit(&self) -> &[AuditEntry] {
        &self.audit
    }

    pub fn banned_ids(&self) -> Vec<Identity> {
        let mut ids: Vec<Identity> = self.bans.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn snapshot(&self) -> BTreeMap<Identity, BanRecord> {
        self.bans.iter().map(|(id, r)| (*id, r.clone())).collect()
    }
}
