//! Access control and moderation state.
//!
//! One `Engine` owns every store. Mutations are gated by the permission
//! rules, applied in memory, then written to disk before the call returns.
//! Callers that share an engine between tasks wrap it in [`SharedEngine`]
//! so that all of this, lazy ban expiry included, happens under one lock.

pub mod bans;
pub mod clock;
pub mod permissions;
pub mod roles;
pub mod warnings;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::services::stats::{AggregateStats, StatsAggregator};
use crate::storage::models::{
    AuditEntry, BanRecord, Identity, Priority, Role, SecurityState, TaskId, TaskRecord,
};
use crate::storage::persistence::{LoadReport, PersistenceError, PersistenceManager};
use crate::storage::task_store::{DataStore, TaskStore, UserProfile};
use crate::utils::logging::{
    log_moderation_action, log_permission_denied, log_persistence_error, log_system_event,
};

use bans::{BanRegistry, BanRequest, BanStatus};
use clock::{Clock, SystemClock};
use permissions::PermissionEvaluator;
use roles::RoleStore;
use warnings::{WarnOutcome, WarningTracker};

pub use bans::OwnedTasks;

pub const DEFAULT_WARN_LIMIT: u32 = 3;
pub const DEFAULT_AUTO_BAN_HOURS: i64 = 24;

/// Single-writer handle shared by the bot and the background services.
pub type SharedEngine = Arc<tokio::sync::Mutex<Engine>>;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub creator: Identity,
    pub data_dir: PathBuf,
    pub warn_limit: u32,
    pub auto_ban_duration: Duration,
}

impl EngineSettings {
    pub fn new(creator: Identity, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            creator,
            data_dir: data_dir.into(),
            warn_limit: DEFAULT_WARN_LIMIT,
            auto_ban_duration: Duration::hours(DEFAULT_AUTO_BAN_HOURS),
        }
    }
}

/// Whether memory and disk currently agree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Durability {
    Clean { saved_at: Option<DateTime<Utc>> },
    /// A save failed. Memory stays authoritative until the next save works.
    Dirty { since: DateTime<Utc>, error: String },
}

impl Durability {
    pub fn is_clean(&self) -> bool {
        matches!(self, Durability::Clean { .. })
    }
}

pub struct Engine {
    clock: Arc<dyn Clock>,
    persistence: PersistenceManager,
    roles: RoleStore,
    bans: BanRegistry,
    warnings: WarningTracker,
    data: DataStore,
    stats: AggregateStats,
    stats_day: NaiveDate,
    started_at: DateTime<Utc>,
    durability: Durability,
}

impl Engine {
    pub fn open(settings: EngineSettings) -> Self {
        Self::open_with_clock(settings, Arc::new(SystemClock)).0
    }

    /// Loads both documents and rebuilds the derived stats once. Missing or
    /// unreadable files give empty state; this never fails.
    pub fn open_with_clock(settings: EngineSettings, clock: Arc<dyn Clock>) -> (Self, LoadReport) {
        let persistence = PersistenceManager::new(settings.data_dir.clone());
        let (security, data, report) = persistence.load();
        let now = clock.now();

        let mut engine = Self {
            roles: RoleStore::restore(settings.creator, security.roles),
            bans: BanRegistry::restore(settings.creator, security.bans, security.audit),
            warnings: WarningTracker::restore(
                settings.warn_limit,
                settings.auto_ban_duration,
                security.warnings,
            ),
            data: DataStore::from_state(data),
            stats: AggregateStats::empty(now.date_naive()),
            stats_day: now.date_naive(),
            started_at: now,
            durability: Durability::Clean {
                saved_at: security.saved_at,
            },
            clock,
            persistence,
        };
        engine.rebuild_stats();

        log_system_event(
            "engine_opened",
            Some(&format!(
                "creator {}, {} admins, {} bans, {} users, {} tasks",
                settings.creator,
                engine.roles.admins().len(),
                engine.bans.banned_ids().len(),
                engine.stats.total_users,
                engine.stats.total_tasks
            )),
        );
        (engine, report)
    }

    pub fn into_shared(self) -> SharedEngine {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn creator(&self) -> Identity {
        self.roles.creator()
    }

    pub fn warn_limit(&self) -> u32 {
        self.warnings.limit()
    }

    pub fn auto_ban_duration(&self) -> Duration {
        self.warnings.auto_ban_duration()
    }

    /// Role-only rules, no ban status involved.
    pub fn permissions(&self) -> PermissionEvaluator<'_> {
        PermissionEvaluator::new(&self.roles)
    }

    // ----- queries -----

    pub fn role_of(&self, id: Identity) -> Role {
        self.roles.role_of(id)
    }

    pub fn admins(&self) -> Vec<Identity> {
        self.roles.admins()
    }

    pub fn warnings_of(&self, id: Identity) -> u32 {
        self.warnings.count_of(id)
    }

    /// Applies lazy expiry: an expired record is removed and the removal
    /// persisted before this returns.
    pub fn check_and_maybe_expire(&mut self, id: Identity) -> bool {
        let now = self.now();
        match self.bans.check_and_maybe_expire(id, now) {
            BanStatus::Expired => {
                self.rebuild_stats();
                self.persist();
                false
            }
            status => status.is_banned(),
        }
    }

    pub fn is_banned(&mut self, id: Identity) -> bool {
        self.check_and_maybe_expire(id)
    }

    pub fn ban_info(&mut self, id: Identity) -> Option<BanRecord> {
        if !self.check_and_maybe_expire(id) {
            return None;
        }
        self.bans.record(id).cloned()
    }

    /// Every live ban, expiring stale ones on the way.
    pub fn active_bans(&mut self) -> Vec<(Identity, BanRecord)> {
        let mut live = Vec::new();
        for id in self.bans.banned_ids() {
            if let Some(record) = self.ban_info(id) {
                live.push((id, record));
            }
        }
        live
    }

    /// Role rules plus the actor's own standing: a banned identity manages
    /// nobody. The creator cannot be banned, so it is always in standing.
    pub fn can_manage(&mut self, actor: Identity, target: Identity) -> bool {
        !self.is_banned(actor) && self.permissions().can_manage(actor, target)
    }

    /// Creator or admin in good standing; gates the bot-wide views.
    pub fn is_staff(&mut self, actor: Identity) -> bool {
        self.role_of(actor) != Role::User && !self.is_banned(actor)
    }

    pub fn audit_log(&self) -> &[AuditEntry] {
        self.bans.audit()
    }

    // ----- gated mutations -----

    /// Registers an identity on first contact. Refused while banned.
    pub fn add_identity(&mut self, id: Identity, profile: UserProfile) -> bool {
        if self.is_banned(id) {
            return false;
        }
        let now = self.now();
        self.roles.ensure(id);
        self.data.register_user(id, profile, now);
        self.rebuild_stats();
        self.persist();
        true
    }

    /// Grants admin. Needs `can_manage` with the actor in good standing,
    /// and a target that is neither the creator nor banned.
    pub fn promote(&mut self, actor: Identity, target: Identity) -> bool {
        if self.is_banned(target) {
            log_permission_denied("promote", actor, target, "target is banned");
            return false;
        }
        if !self.can_manage(actor, target) || !self.roles.promote(actor, target) {
            log_permission_denied("promote", actor, target, "not permitted");
            return false;
        }
        log_moderation_action("promote", actor, target, None);
        self.persist();
        true
    }

    /// Creator only. Admins cannot demote each other.
    pub fn demote(&mut self, actor: Identity, target: Identity) -> bool {
        if !self.roles.demote(actor, target) {
            log_permission_denied("demote", actor, target, "not permitted");
            return false;
        }
        log_moderation_action("demote", actor, target, None);
        self.persist();
        true
    }

    /// Bans `target`. `duration: None` is permanent. `owned_tasks` must be
    /// chosen explicitly; a purge deletes every task the target owns.
    pub fn ban(
        &mut self,
        actor: Identity,
        target: Identity,
        reason: &str,
        duration: Option<Duration>,
        owned_tasks: OwnedTasks,
    ) -> bool {
        let now = self.now();
        let expired = self.bans.check_and_maybe_expire(target, now) == BanStatus::Expired;
        let permissions = PermissionEvaluator::new(&self.roles);
        let request = BanRequest {
            actor,
            target,
            reason,
            duration,
            owned_tasks,
        };
        let banned = self.bans.ban(&permissions, request, &mut self.data, now);
        if !banned {
            log_permission_denied("ban", actor, target, "not permitted or expiry out of range");
        }
        if banned || expired {
            self.rebuild_stats();
            self.persist();
        }
        banned
    }

    /// Lifts a live ban. False if not permitted or there is nothing to lift.
    pub fn unban(&mut self, actor: Identity, target: Identity, note: Option<&str>) -> bool {
        let now = self.now();
        let expired = self.bans.check_and_maybe_expire(target, now) == BanStatus::Expired;
        let permissions = PermissionEvaluator::new(&self.roles);
        let lifted = self.bans.unban(&permissions, actor, target, note, now);
        if !lifted {
            log_permission_denied("unban", actor, target, "not permitted or not banned");
        }
        if lifted || expired {
            self.rebuild_stats();
            self.persist();
        }
        lifted
    }

    /// Adds a warning and returns the resulting count, which is 0 right
    /// after an escalation to an auto-ban. A rejected call returns the
    /// current count unchanged.
    pub fn warn(&mut self, actor: Identity, target: Identity, reason: Option<&str>) -> u32 {
        let now = self.now();
        let expired = self.bans.check_and_maybe_expire(target, now) == BanStatus::Expired;
        let permissions = PermissionEvaluator::new(&self.roles);
        let outcome = self.warnings.warn(
            &permissions,
            &mut self.bans,
            &mut self.data,
            actor,
            target,
            reason,
            now,
        );
        match outcome {
            WarnOutcome::Rejected { count } => {
                log_permission_denied("warn", actor, target, "not permitted or auto-ban out of range");
                if expired {
                    self.rebuild_stats();
                    self.persist();
                }
                count
            }
            WarnOutcome::Counted { count } => {
                if expired {
                    self.rebuild_stats();
                }
                self.persist();
                count
            }
            WarnOutcome::Escalated { .. } => {
                self.rebuild_stats();
                self.persist();
                outcome.count()
            }
        }
    }

    pub fn clear_warnings(&mut self, actor: Identity, target: Identity) -> bool {
        let permissions = PermissionEvaluator::new(&self.roles);
        if !self.warnings.clear(&permissions, actor, target) {
            log_permission_denied("clear_warnings", actor, target, "not permitted");
            return false;
        }
        self.persist();
        true
    }

    // ----- tasks -----

    pub fn data(&self) -> &DataStore {
        &self.data
    }

    pub fn tasks_of(&self, owner: Identity, completed: Option<bool>) -> Vec<&TaskRecord> {
        self.data.tasks_of(owner, completed)
    }

    /// Banned identities cannot create tasks. None also when task IDs are exhausted.
    pub fn add_task(&mut self, owner: Identity, text: &str, category: Option<&str>) -> Option<TaskId> {
        if self.is_banned(owner) {
            return None;
        }
        let now = self.now();
        self.roles.ensure(owner);
        let Some(id) = self.data.add_task(owner, text, category, now) else {
            log_system_event("task_counter_exhausted", Some(&owner.to_string()));
            return None;
        };
        self.rebuild_stats();
        self.persist();
        Some(id)
    }

    /// Owners toggle their own tasks. Returns the new completion state.
    pub fn toggle_task(&mut self, actor: Identity, task_id: TaskId) -> Option<bool> {
        if !self.owns_in_standing(actor, task_id) {
            return None;
        }
        let now = self.now();
        let completed = self.data.toggle_task(task_id, now)?;
        self.rebuild_stats();
        self.persist();
        Some(completed)
    }

    pub fn set_task_priority(&mut self, actor: Identity, task_id: TaskId, priority: Priority) -> bool {
        if !self.owns_in_standing(actor, task_id) || !self.data.set_priority(task_id, priority) {
            return false;
        }
        self.persist();
        true
    }

    pub fn set_task_text(&mut self, actor: Identity, task_id: TaskId, text: &str) -> bool {
        if !self.owns_in_standing(actor, task_id) || !self.data.set_text(task_id, text) {
            return false;
        }
        self.persist();
        true
    }

    pub fn set_task_category(&mut self, actor: Identity, task_id: TaskId, category: &str) -> bool {
        if !self.owns_in_standing(actor, task_id) || !self.data.set_category(task_id, category) {
            return false;
        }
        self.persist();
        true
    }

    fn owns_in_standing(&mut self, actor: Identity, task_id: TaskId) -> bool {
        let owned = self.data.task(task_id).is_some_and(|task| task.user_id == actor);
        owned && !self.is_banned(actor)
    }

    /// Owners delete their own tasks; anyone who can manage the owner may too.
    pub fn delete_task(&mut self, actor: Identity, task_id: TaskId) -> bool {
        let Some(owner) = self.data.task(task_id).map(|t| t.user_id) else {
            return false;
        };
        let allowed = if owner == actor {
            !self.is_banned(actor)
        } else {
            self.can_manage(actor, owner)
        };
        if !allowed || !self.data.delete_task(task_id) {
            return false;
        }
        self.rebuild_stats();
        self.persist();
        true
    }

    // ----- stats -----

    pub fn stats(&self) -> &AggregateStats {
        &self.stats
    }

    pub fn stats_day(&self) -> NaiveDate {
        self.stats_day
    }

    /// Recomputes every derived counter from the canonical records.
    pub fn rebuild_stats(&mut self) -> &AggregateStats {
        let banned: BTreeSet<Identity> = self.bans.banned_ids().into_iter().collect();
        let (users, tasks) = self.data.records_mut();
        self.stats = StatsAggregator::rebuild(users, tasks, self.stats_day, &banned);
        &self.stats
    }

    /// Moves the "today" counters to the clock's current date.
    pub fn roll_stats_day(&mut self) -> &AggregateStats {
        self.stats_day = self.now().date_naive();
        log_system_event("stats_day_rolled", Some(&self.stats_day.to_string()));
        self.rebuild_stats()
    }

    // ----- persistence -----

    pub fn durability(&self) -> &Durability {
        &self.durability
    }

    /// Writes both documents now. Mutations already do this; the explicit
    /// form is for shutdown and for retrying after a failure.
    pub fn save(&mut self) -> Result<(), PersistenceError> {
        let now = self.now();
        let security = SecurityState {
            roles: self.roles.snapshot(),
            bans: self.bans.snapshot(),
            warnings: self.warnings.snapshot(),
            audit: self.bans.audit().to_vec(),
            saved_at: Some(now),
        };
        let data = self.data.to_state(now);
        match self.persistence.save(&security, &data) {
            Ok(()) => {
                self.durability = Durability::Clean {
                    saved_at: Some(now),
                };
                Ok(())
            }
            Err(e) => {
                let since = match &self.durability {
                    Durability::Dirty { since, .. } => *since,
                    Durability::Clean { .. } => now,
                };
                self.durability = Durability::Dirty {
                    since,
                    error: e.to_string(),
                };
                Err(e)
            }
        }
    }

    fn persist(&mut self) {
        if let Err(e) = self.save() {
            log_persistence_error(
                "save",
                &self.persistence.data_dir().display().to_string(),
                &format!("{e}; in-memory state kept"),
            );
        }
    }
}
