use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::storage::models::{Identity, TaskId, TaskRecord, UserRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCounts {
    pub tasks: u64,
    pub completed: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCounters {
    pub new_users: u64,
    pub tasks_created: u64,
    pub tasks_completed: u64,
}

/// Derived counters. Never persisted as a source of truth; always
/// recomputable from users, tasks, the stats day and the banned set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub day: NaiveDate,
    pub total_users: u64,
    pub total_tasks: u64,
    pub completed_tasks: u64,
    /// Identities owning at least one task, minus anyone currently banned.
    pub active_identities: BTreeSet<Identity>,
    pub per_user: BTreeMap<Identity, UserCounts>,
    pub today: DailyCounters,
}

impl AggregateStats {
    pub fn empty(day: NaiveDate) -> Self {
        Self {
            day,
            total_users: 0,
            total_tasks: 0,
            completed_tasks: 0,
            active_identities: BTreeSet::new(),
            per_user: BTreeMap::new(),
            today: DailyCounters::default(),
        }
    }

    pub fn open_tasks(&self) -> u64 {
        self.total_tasks - self.completed_tasks
    }

    pub fn completion_rate(&self) -> f64 {
        if self.total_tasks == 0 {
            0.0
        } else {
            self.completed_tasks as f64 / self.total_tasks as f64 * 100.0
        }
    }
}

pub struct StatsAggregator;

impl StatsAggregator {
    /// One pass over the canonical records. Cached per-user counters on the
    /// user records are overwritten with the recomputed values, which is
    /// what heals drift left by an unclean shutdown. Same inputs, same output.
    pub fn rebuild(
        users: &mut BTreeMap<Identity, UserRecord>,
        tasks: &BTreeMap<TaskId, TaskRecord>,
        day: NaiveDate,
        banned: &BTreeSet<Identity>,
    ) -> AggregateStats {
        let mut stats = AggregateStats::empty(day);

        for task in tasks.values() {
            stats.total_tasks += 1;
            let counts = stats.per_user.entry(task.user_id).or_default();
            counts.tasks += 1;
            if task.completed {
                stats.completed_tasks += 1;
                counts.completed += 1;
            }
            if !banned.contains(&task.user_id) {
                stats.active_identities.insert(task.user_id);
            }
            if task.created.date_naive() == day {
                stats.today.tasks_created += 1;
            }
            if task.completed_at.is_some_and(|at| at.date_naive() == day) {
                stats.today.tasks_completed += 1;
            }
        }

        for (id, user) in users.iter_mut() {
            stats.total_users += 1;
            if user.joined.date_naive() == day {
                stats.today.new_users += 1;
            }
            let counts = stats.per_user.get(id).copied().unwrap_or_default();
            user.task_count = counts.tasks;
            user.completed_count = counts.completed;
        }

        stats
    }
}
