use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use super::models::{
    DataState, Identity, Priority, TaskId, TaskRecord, UserRecord, DEFAULT_CATEGORY,
};

/// What the ban registry needs from whoever owns people's tasks.
pub trait TaskStore {
    fn list_tasks_owned_by(&self, owner: Identity) -> Vec<TaskId>;
    fn delete_task(&mut self, task_id: TaskId) -> bool;
}

/// Profile details captured when an identity first talks to the bot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfile {
    pub username: String,
    pub full_name: String,
}

/// In-memory users and tasks, persisted as the data document.
///
/// Per-user counters are maintained incrementally here; they are a cache
/// and the stats rebuild overwrites them.
#[derive(Debug, Clone, Default)]
pub struct DataStore {
    task_counter: TaskId,
    users: BTreeMap<Identity, UserRecord>,
    tasks: BTreeMap<TaskId, TaskRecord>,
}

impl DataStore {
    pub fn from_state(state: DataState) -> Self {
        Self {
            task_counter: state.task_counter,
            users: state.users,
            tasks: state.tasks,
        }
    }

    pub fn to_state(&self, saved_at: DateTime<Utc>) -> DataState {
        DataState {
            task_counter: self.task_counter,
            users: self.users.clone(),
            tasks: self.tasks.clone(),
            saved_at: Some(saved_at),
        }
    }

    /// Returns true when the identity was not known before.
    pub fn register_user(&mut self, id: Identity, profile: UserProfile, now: DateTime<Utc>) -> bool {
        if let Some(existing) = self.users.get_mut(&id) {
            if !profile.username.is_empty() {
                existing.username = profile.username;
            }
            if !profile.full_name.is_empty() {
                existing.full_name = profile.full_name;
            }
            return false;
        }
        self.users.insert(
            id,
            UserRecord {
                user_id: id,
                username: profile.username,
                full_name: profile.full_name,
                joined: now,
                task_count: 0,
                completed_count: 0,
            },
        );
        true
    }

    /// Returns None once the ID counter is exhausted; no existing task is touched.
    pub fn add_task(
        &mut self,
        owner: Identity,
        text: &str,
        category: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<TaskId> {
        let id = self.task_counter.checked_add(1)?;
        self.task_counter = id;
        self.tasks.insert(
            id,
            TaskRecord {
                id,
                user_id: owner,
                text: text.to_string(),
                category: category.unwrap_or(DEFAULT_CATEGORY).to_string(),
                created: now,
                completed: false,
                completed_at: None,
                priority: Priority::default(),
            },
        );
        if let Some(user) = self.users.get_mut(&owner) {
            user.task_count += 1;
        }
        Some(id)
    }

    /// Flips completion. Returns the new state, or None for an unknown task.
    pub fn toggle_task(&mut self, task_id: TaskId, now: DateTime<Utc>) -> Option<bool> {
        let task = self.tasks.get_mut(&task_id)?;
        task.completed = !task.completed;
        task.completed_at = task.completed.then_some(now);

        if let Some(user) = self.users.get_mut(&task.user_id) {
            if task.completed {
                user.completed_count += 1;
            } else {
                user.completed_count = user.completed_count.saturating_sub(1);
            }
        }
        Some(task.completed)
    }

    pub fn set_priority(&mut self, task_id: TaskId, priority: Priority) -> bool {
        match self.tasks.get_mut(&task_id) {
            Some(task) => {
                task.priority = priority;
                true
            }
            None => false,
        }
    }

    pub fn set_text(&mut self, task_id: TaskId, text: &str) -> bool {
        match self.tasks.get_mut(&task_id) {
            Some(task) => {
                task.text = text.to_string();
                true
            }
            None => false,
        }
    }

    pub fn set_category(&mut self, task_id: TaskId, category: &str) -> bool {
        match self.tasks.get_mut(&task_id) {
            Some(task) => {
                task.category = category.to_string();
                true
            }
            None => false,
        }
    }

    pub fn task(&self, task_id: TaskId) -> Option<&TaskRecord> {
        self.tasks.get(&task_id)
    }

    /// Tasks owned by `owner`, newest first, optionally filtered by completion.
    pub fn tasks_of(&self, owner: Identity, completed: Option<bool>) -> Vec<&TaskRecord> {
        let mut tasks: Vec<&TaskRecord> = self
            .tasks
            .values()
            .filter(|t| t.user_id == owner)
            .filter(|t| completed.map_or(true, |c| t.completed == c))
            .collect();
        tasks.sort_by(|a, b| b.created.cmp(&a.created).then(b.id.cmp(&a.id)));
        tasks
    }

    pub fn user(&self, id: Identity) -> Option<&UserRecord> {
        self.users.get(&id)
    }

    pub fn users(&self) -> &BTreeMap<Identity, UserRecord> {
        &self.users
    }

    pub fn tasks(&self) -> &BTreeMap<TaskId, TaskRecord> {
        &self.tasks
    }

    pub fn task_counter(&self) -> TaskId {
        self.task_counter
    }

    /// Mutable users alongside read-only tasks, for the stats rebuild.
    pub fn records_mut(&mut self) -> (&mut BTreeMap<Identity, UserRecord>, &BTreeMap<TaskId, TaskRecord>) {
        (&mut self.users, &self.tasks)
    }
}

impl TaskStore for DataStore {
    fn list_tasks_owned_by(&self, owner: Identity) -> Vec<TaskId> {
        self.tasks
            .values()
            .filter(|t| t.user_id == owner)
            .map(|t| t.id)
            .collect()
    }

    fn delete_task(&mut self, task_id: TaskId) -> bool {
        let Some(task) = self.tasks.remove(&task_id) else {
            return false;
        };
        if let Some(user) = self.users.get_mut(&task.user_id) {
            user.task_count = user.task_count.saturating_sub(1);
            if task.completed {
                user.completed_count = user.completed_count.saturating_sub(1);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_task_ids_are_sequential_and_counters_follow() {
        let mut store = DataStore::default();
        store.register_user(7, UserProfile::default(), at(8));

        let first = store.add_task(7, "buy milk", None, at(9)).unwrap();
        let second = store.add_task(7, "call mom", Some("Personal"), at(10)).unwrap();
        assert_eq!((first, second), (1, 2));
        assert_eq!(store.task(2).unwrap().category, "Personal");
        assert_eq!(store.task(1).unwrap().category, DEFAULT_CATEGORY);

        assert_eq!(store.toggle_task(first, at(11)), Some(true));
        let user = store.user(7).unwrap();
        assert_eq!((user.task_count, user.completed_count), (2, 1));

        assert!(store.delete_task(first));
        let user = store.user(7).unwrap();
        assert_eq!((user.task_count, user.completed_count), (1, 0));
        assert!(!store.delete_task(first));
    }

    #[test]
    fn test_tasks_of_orders_newest_first_and_filters() {
        let mut store = DataStore::default();
        let old = store.add_task(1, "old", None, at(1)).unwrap();
        let new = store.add_task(1, "new", None, at(2)).unwrap();
        store.add_task(2, "someone else", None, at(3)).unwrap();
        store.toggle_task(old, at(4));

        let ids: Vec<TaskId> = store.tasks_of(1, None).iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![new, old]);
        assert_eq!(store.tasks_of(1, Some(true)).len(), 1);
        assert_eq!(store.list_tasks_owned_by(2).len(), 1);
    }

    #[test]
    fn test_exhausted_counter_refuses_new_tasks() {
        let mut store = DataStore::default();
        store.register_user(3, UserProfile::default(), at(1));
        let kept = store.add_task(3, "keep", None, at(2)).unwrap();
        store.task_counter = TaskId::MAX;

        assert_eq!(store.add_task(3, "one too many", None, at(3)), None);
        assert_eq!(store.task_counter(), TaskId::MAX);
        assert_eq!(store.tasks().len(), 1);
        assert_eq!(store.task(kept).unwrap().text, "keep");
        assert_eq!(store.user(3).unwrap().task_count, 1);
    }

    #[test]
    fn test_set_text_replaces_only_the_text() {
        let mut store = DataStore::default();
        let id = store.add_task(4, "draft", Some("Work"), at(1)).unwrap();

        assert!(store.set_text(id, "final"));
        let task = store.task(id).unwrap();
        assert_eq!((task.text.as_str(), task.category.as_str()), ("final", "Work"));
        assert!(!store.set_text(id + 1, "nothing"));
    }

    #[test]
    fn test_register_user_keeps_join_date() {
        let mut store = DataStore::default();
        assert!(store.register_user(5, UserProfile::default(), at(1)));
        let profile = UserProfile {
            username: "neo".to_string(),
            full_name: "Thomas Anderson".to_string(),
        };
        assert!(!store.register_user(5, profile, at(9)));

        let user = store.user(5).unwrap();
        assert_eq!(user.joined, at(1));
        assert_eq!(user.username, "neo");
    }
}
