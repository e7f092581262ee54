use chrono::{DateTime, Duration, TimeZone, Utc};
use std::fs;
use std::sync::Arc;
use taskkeeper_bot::engine::clock::ManualClock;
use taskkeeper_bot::engine::{Durability, Engine, EngineSettings, OwnedTasks};
use taskkeeper_bot::storage::models::{AuditAction, Priority, Role};
use taskkeeper_bot::storage::persistence::PersistenceManager;
use taskkeeper_bot::storage::task_store::UserProfile;
use tempfile::TempDir;

const CREATOR: i64 = 1;
const ADMIN_1: i64 = 10;
const ADMIN_2: i64 = 11;
const USER: i64 = 100;
const OTHER_USER: i64 = 101;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn open_engine(dir: &TempDir, clock: &ManualClock) -> Engine {
    let settings = EngineSettings::new(CREATOR, dir.path());
    Engine::open_with_clock(settings, Arc::new(clock.clone())).0
}

fn profile(name: &str) -> UserProfile {
    UserProfile {
        username: name.to_string(),
        full_name: name.to_string(),
    }
}

/// Creator plus two admins and two plain users.
fn seeded_engine(dir: &TempDir, clock: &ManualClock) -> Engine {
    let mut engine = open_engine(dir, clock);
    for (id, name) in [(ADMIN_1, "admin1"), (ADMIN_2, "admin2"), (USER, "user"), (OTHER_USER, "other")] {
        assert!(engine.add_identity(id, profile(name)));
    }
    assert!(engine.promote(CREATOR, ADMIN_1));
    assert!(engine.promote(CREATOR, ADMIN_2));
    engine
}

#[test]
fn test_fresh_engine_without_files() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start());
    let settings = EngineSettings::new(CREATOR, dir.path());

    let (engine, report) = Engine::open_with_clock(settings, Arc::new(clock));

    assert!(!report.security_found);
    assert!(!report.data_found);
    assert!(report.unreadable.is_empty());
    assert!(report.corrupt.is_empty());

    assert_eq!(engine.role_of(CREATOR), Role::Creator);
    assert!(engine.admins().is_empty());

    let stats = engine.stats();
    assert_eq!(stats.total_users, 0);
    assert_eq!(stats.total_tasks, 0);
    assert_eq!(stats.completed_tasks, 0);
    assert!(stats.active_identities.is_empty());
    assert!(stats.per_user.is_empty());
    assert_eq!(stats.today.new_users, 0);
    assert_eq!(stats.today.tasks_created, 0);
    assert_eq!(stats.today.tasks_completed, 0);
}

#[test]
fn test_creator_role_survives_everything() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start());
    let mut engine = seeded_engine(&dir, &clock);

    assert!(!engine.promote(CREATOR, CREATOR));
    assert!(!engine.promote(ADMIN_1, CREATOR));
    assert!(!engine.demote(CREATOR, CREATOR));
    assert!(!engine.demote(ADMIN_1, CREATOR));
    assert!(!engine.ban(CREATOR, CREATOR, "self", None, OwnedTasks::Keep));
    assert!(!engine.ban(ADMIN_1, CREATOR, "coup", None, OwnedTasks::Purge));
    assert_eq!(engine.warn(CREATOR, CREATOR, None), 0);
    assert!(engine.ban(CREATOR, ADMIN_1, "abuse", None, OwnedTasks::Keep));
    assert!(engine.demote(CREATOR, ADMIN_2));

    assert_eq!(engine.role_of(CREATOR), Role::Creator);
    assert!(!engine.is_banned(CREATOR));

    // And after a reload
    drop(engine);
    let engine = open_engine(&dir, &clock);
    assert_eq!(engine.role_of(CREATOR), Role::Creator);
}

#[test]
fn test_banned_admin_keeps_role_but_loses_standing() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start());
    let mut engine = seeded_engine(&dir, &clock);

    assert!(engine.ban(CREATOR, ADMIN_1, "abuse", None, OwnedTasks::Keep));
    // Actions are checked against the role only
    assert!(engine.ban(ADMIN_1, USER, "spam", None, OwnedTasks::Keep));
    assert!(engine.is_banned(USER));

    // Anything that checks standing now refuses
    assert!(engine.is_banned(ADMIN_1));
    assert_eq!(engine.role_of(ADMIN_1), Role::Admin);
    assert!(!engine.can_manage(ADMIN_1, OTHER_USER));
    assert!(!engine.promote(ADMIN_1, OTHER_USER));
    assert!(engine.can_manage(ADMIN_2, OTHER_USER));
}

#[test]
fn test_save_load_round_trip() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start());
    let mut engine = seeded_engine(&dir, &clock);

    assert!(engine.ban(CREATOR, USER, "spam", Some(Duration::hours(2)), OwnedTasks::Keep));
    assert!(engine.ban(ADMIN_1, OTHER_USER, "flood", None, OwnedTasks::Keep));
    assert!(engine.unban(CREATOR, OTHER_USER, Some("appeal accepted")));
    assert_eq!(engine.warn(ADMIN_1, OTHER_USER, Some("caps")), 1);
    assert!(engine.add_task(ADMIN_2, "Review reports", Some("Work")).is_some());
    assert!(engine.durability().is_clean());

    let manager = PersistenceManager::new(dir.path());
    let (before, data_before, _) = manager.load();

    drop(engine);
    let mut reopened = open_engine(&dir, &clock);
    reopened.save().unwrap();
    let (after, data_after, report) = manager.load();

    assert!(report.corrupt.is_empty());
    assert_eq!(before.roles, after.roles);
    assert_eq!(before.bans, after.bans);
    assert_eq!(before.warnings, after.warnings);
    assert_eq!(before.audit, after.audit);
    assert_eq!(data_before.users, data_after.users);
    assert_eq!(data_before.tasks, data_after.tasks);
    assert_eq!(data_before.task_counter, data_after.task_counter);

    assert_eq!(reopened.role_of(ADMIN_1), Role::Admin);
    assert_eq!(reopened.warnings_of(OTHER_USER), 1);
    let record = reopened.ban_info(USER).unwrap();
    assert_eq!(record.reason, "spam");
    assert_eq!(record.issued_by, CREATOR);
    assert_eq!(record.expires_at, Some(start() + Duration::hours(2)));
}

#[test]
fn test_lazy_expiry_removes_record_on_first_read() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start());
    let mut engine = seeded_engine(&dir, &clock);

    assert!(engine.ban(CREATOR, USER, "spam", Some(Duration::seconds(10)), OwnedTasks::Keep));
    assert!(engine.is_banned(USER));

    clock.advance(Duration::seconds(9));
    assert!(engine.is_banned(USER));

    // Still on disk until someone looks
    clock.advance(Duration::seconds(1));
    let manager = PersistenceManager::new(dir.path());
    assert!(manager.load().0.bans.contains_key(&USER));

    assert!(!engine.is_banned(USER));
    assert!(!engine.is_banned(USER));
    assert!(engine.ban_info(USER).is_none());
    assert!(!manager.load().0.bans.contains_key(&USER));

    // Expiry is not an audited action
    assert_eq!(engine.audit_log().len(), 1);
}

#[test]
fn test_expired_ban_counts_as_absent_for_unban() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start());
    let mut engine = seeded_engine(&dir, &clock);

    assert!(engine.ban(CREATOR, USER, "spam", Some(Duration::minutes(5)), OwnedTasks::Keep));
    clock.advance(Duration::minutes(6));

    assert!(!engine.unban(CREATOR, USER, None));
    assert!(!PersistenceManager::new(dir.path()).load().0.bans.contains_key(&USER));
}

#[test]
fn test_warning_escalates_to_auto_ban() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start());
    let mut engine = seeded_engine(&dir, &clock);

    assert_eq!(engine.warn(ADMIN_1, USER, Some("rule X")), 1);
    assert_eq!(engine.warn(ADMIN_1, USER, Some("rule X")), 2);
    assert!(!engine.is_banned(USER));
    assert_eq!(engine.warn(ADMIN_1, USER, Some("rule X")), 0);

    assert_eq!(engine.warnings_of(USER), 0);
    assert!(engine.is_banned(USER));
    let record = engine.ban_info(USER).unwrap();
    assert_eq!(record.reason, "rule X");
    assert_eq!(record.issued_by, ADMIN_1);
    assert_eq!(record.expires_at, Some(start() + engine.auto_ban_duration()));

    let persisted = PersistenceManager::new(dir.path()).load().0;
    assert!(!persisted.warnings.contains_key(&USER));
    assert!(persisted.bans.contains_key(&USER));
}

#[test]
fn test_auto_ban_keeps_owned_tasks() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start());
    let settings = EngineSettings {
        warn_limit: 1,
        ..EngineSettings::new(CREATOR, dir.path())
    };
    let mut engine = Engine::open_with_clock(settings, Arc::new(clock)).0;
    engine.add_task(USER, "Keep me", None).unwrap();

    assert_eq!(engine.warn(CREATOR, USER, None), 0);
    assert!(engine.is_banned(USER));
    assert_eq!(engine.tasks_of(USER, None).len(), 1);
}

#[test]
fn test_rejected_warning_leaves_count() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start());
    let mut engine = seeded_engine(&dir, &clock);

    assert_eq!(engine.warn(ADMIN_1, USER, None), 1);
    // Plain users and peers cannot warn
    assert_eq!(engine.warn(OTHER_USER, USER, None), 1);
    assert_eq!(engine.warn(ADMIN_2, ADMIN_1, None), 0);
    assert_eq!(engine.warnings_of(USER), 1);

    assert!(!engine.clear_warnings(OTHER_USER, USER));
    assert!(engine.clear_warnings(ADMIN_2, USER));
    assert_eq!(engine.warnings_of(USER), 0);
}

#[test]
fn test_peers_cannot_unban_each_other() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start());
    let mut engine = seeded_engine(&dir, &clock);

    assert!(engine.ban(CREATOR, ADMIN_2, "review", None, OwnedTasks::Keep));
    assert!(!engine.unban(ADMIN_1, ADMIN_2, None));
    assert!(engine.is_banned(ADMIN_2));
    assert!(engine.unban(CREATOR, ADMIN_2, Some("cleared")));
    assert!(!engine.is_banned(ADMIN_2));

    let actions: Vec<AuditAction> = engine.audit_log().iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![AuditAction::Ban, AuditAction::Unban]);
    assert_eq!(engine.audit_log()[1].reason, "cleared");
}

#[test]
fn test_promote_and_demote_rules() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start());
    let mut engine = seeded_engine(&dir, &clock);

    // Admins may promote plain users but not touch other admins
    assert!(engine.promote(ADMIN_1, USER));
    assert_eq!(engine.role_of(USER), Role::Admin);
    assert!(!engine.promote(ADMIN_1, ADMIN_2));
    assert!(!engine.demote(ADMIN_1, USER));
    assert!(!engine.promote(OTHER_USER, OTHER_USER));

    // Only the creator demotes, and only admins
    assert!(engine.demote(CREATOR, USER));
    assert_eq!(engine.role_of(USER), Role::User);
    assert!(!engine.demote(CREATOR, USER));

    // Banned targets cannot be promoted
    assert!(engine.ban(CREATOR, OTHER_USER, "spam", None, OwnedTasks::Keep));
    assert!(!engine.promote(CREATOR, OTHER_USER));
    assert_eq!(engine.admins(), vec![ADMIN_1, ADMIN_2]);
}

#[test]
fn test_ban_purge_is_explicit() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start());
    let mut engine = seeded_engine(&dir, &clock);

    engine.add_task(USER, "First", None).unwrap();
    engine.add_task(USER, "Second", None).unwrap();
    engine.add_task(OTHER_USER, "Theirs", None).unwrap();

    assert!(engine.ban(CREATOR, OTHER_USER, "spam", None, OwnedTasks::Keep));
    assert_eq!(engine.tasks_of(OTHER_USER, None).len(), 1);

    assert!(engine.ban(CREATOR, USER, "spam", None, OwnedTasks::Purge));
    assert!(engine.tasks_of(USER, None).is_empty());
    assert_eq!(engine.stats().total_tasks, 1);

    // The identity itself is retained for audit
    assert!(engine.data().user(USER).is_some());
    assert_eq!(PersistenceManager::new(dir.path()).load().1.tasks.len(), 1);
}

#[test]
fn test_banned_identity_cannot_register_or_add_tasks() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start());
    let mut engine = open_engine(&dir, &clock);

    assert!(engine.ban(CREATOR, USER, "spam", Some(Duration::hours(1)), OwnedTasks::Keep));
    assert!(!engine.add_identity(USER, profile("user")));
    assert!(engine.add_task(USER, "Sneaky", None).is_none());

    clock.advance(Duration::hours(1));
    assert!(engine.add_identity(USER, profile("user")));
    assert!(engine.add_task(USER, "Back again", None).is_some());
}

#[test]
fn test_task_ownership_rules() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start());
    let mut engine = seeded_engine(&dir, &clock);

    let task = engine.add_task(USER, "Mine", None).unwrap();
    assert_eq!(engine.toggle_task(OTHER_USER, task), None);
    assert_eq!(engine.toggle_task(USER, task), Some(true));
    assert_eq!(engine.toggle_task(USER, task), Some(false));

    assert!(!engine.delete_task(OTHER_USER, task));
    assert!(engine.delete_task(ADMIN_1, task));
    assert!(!engine.delete_task(USER, task));
}

#[test]
fn test_task_edits_are_owner_only() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start());
    let mut engine = seeded_engine(&dir, &clock);

    let task = engine.add_task(USER, "Plan trip", None).unwrap();
    assert!(engine.set_task_priority(USER, task, Priority::High));
    assert!(engine.set_task_category(USER, task, "Travel"));
    assert!(!engine.set_task_priority(ADMIN_1, task, Priority::Low));
    assert!(!engine.set_task_category(USER, task + 1, "Nowhere"));

    let (_, data, _) = PersistenceManager::new(dir.path()).load();
    let stored = &data.tasks[&task];
    assert_eq!(stored.priority, Priority::High);
    assert_eq!(stored.category, "Travel");

    assert!(engine.ban(CREATOR, USER, "spam", None, OwnedTasks::Keep));
    assert!(!engine.set_task_priority(USER, task, Priority::Low));
}

#[test]
fn test_task_text_edit_is_owner_only() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start());
    let mut engine = seeded_engine(&dir, &clock);

    let task = engine.add_task(USER, "Buy milk", Some("Home")).unwrap();
    assert!(engine.set_task_text(USER, task, "Buy oat milk"));
    assert!(!engine.set_task_text(OTHER_USER, task, "Hijacked"));
    assert!(!engine.set_task_text(CREATOR, task, "Moderated"));
    assert!(!engine.set_task_text(USER, task + 1, "Missing"));

    let (_, data, _) = PersistenceManager::new(dir.path()).load();
    assert_eq!(data.tasks[&task].text, "Buy oat milk");
    assert_eq!(data.tasks[&task].category, "Home");

    assert!(engine.ban(ADMIN_1, USER, "spam", Some(Duration::hours(1)), OwnedTasks::Keep));
    assert!(!engine.set_task_text(USER, task, "While banned"));
    clock.advance(Duration::hours(1));
    assert!(engine.set_task_text(USER, task, "After the ban"));
}

#[test]
fn test_staff_views_need_role_and_standing() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start());
    let mut engine = seeded_engine(&dir, &clock);

    assert!(engine.is_staff(CREATOR));
    assert!(engine.is_staff(ADMIN_1));
    assert!(!engine.is_staff(USER));

    assert!(engine.ban(CREATOR, ADMIN_2, "abuse", None, OwnedTasks::Keep));
    assert!(!engine.is_staff(ADMIN_2));
}

#[test]
fn test_ban_past_the_calendar_is_refused() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start());
    let mut engine = seeded_engine(&dir, &clock);

    let huge = Some(Duration::days(365_000_000));
    assert!(!engine.ban(CREATOR, USER, "forever and then some", huge, OwnedTasks::Purge));
    assert!(!engine.is_banned(USER));
    assert!(engine.audit_log().is_empty());
    assert!(engine.ban(CREATOR, USER, "spam", Some(Duration::days(365)), OwnedTasks::Keep));
}

#[test]
fn test_warning_with_unrepresentable_auto_ban_is_refused() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start());
    let mut settings = EngineSettings::new(CREATOR, dir.path());
    settings.warn_limit = 1;
    settings.auto_ban_duration = Duration::days(365_000_000);
    let mut engine = Engine::open_with_clock(settings, Arc::new(clock.clone())).0;
    assert!(engine.add_identity(USER, profile("user")));

    assert_eq!(engine.warn(CREATOR, USER, Some("spam")), 0);
    assert_eq!(engine.warnings_of(USER), 0);
    assert!(!engine.is_banned(USER));
}

#[test]
fn test_creator_cannot_be_warned_even_by_itself() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start());
    let mut engine = seeded_engine(&dir, &clock);

    // Managing oneself is allowed, but warning goes through the ban rules
    assert!(engine.can_manage(CREATOR, CREATOR));
    assert_eq!(engine.warn(CREATOR, CREATOR, Some("test")), 0);
    assert_eq!(engine.warn(ADMIN_1, CREATOR, Some("coup")), 0);
    assert_eq!(engine.warnings_of(CREATOR), 0);
    assert!(!engine.is_banned(CREATOR));
    assert_eq!(engine.warn(ADMIN_1, USER, None), 1);
}

#[test]
fn test_stats_follow_records() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start());
    let mut engine = seeded_engine(&dir, &clock);

    let task = engine.add_task(USER, "One", None).unwrap();
    engine.add_task(USER, "Two", None).unwrap();
    engine.add_task(OTHER_USER, "Three", None).unwrap();
    engine.toggle_task(USER, task).unwrap();

    let stats = engine.stats().clone();
    assert_eq!(stats.total_users, 4);
    assert_eq!(stats.total_tasks, 3);
    assert_eq!(stats.completed_tasks, 1);
    assert_eq!(stats.today.new_users, 4);
    assert_eq!(stats.today.tasks_created, 3);
    assert_eq!(stats.today.tasks_completed, 1);
    assert!(stats.active_identities.contains(&USER));

    // A ban drops the target out of the active set
    assert!(engine.ban(CREATOR, USER, "spam", None, OwnedTasks::Keep));
    assert!(!engine.stats().active_identities.contains(&USER));
    assert!(engine.stats().active_identities.contains(&OTHER_USER));

    // Cached per-user counters follow the tasks
    let user = engine.data().user(USER).unwrap();
    assert_eq!(user.task_count, 2);
    assert_eq!(user.completed_count, 1);

    let again = engine.rebuild_stats().clone();
    assert_eq!(&again, engine.stats());
}

#[test]
fn test_roll_stats_day_resets_today_counters() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start());
    let mut engine = seeded_engine(&dir, &clock);
    engine.add_task(USER, "Yesterday", None).unwrap();

    clock.advance(Duration::days(1));
    let stats = engine.roll_stats_day().clone();

    assert_eq!(stats.day, (start() + Duration::days(1)).date_naive());
    assert_eq!(stats.today.new_users, 0);
    assert_eq!(stats.today.tasks_created, 0);
    assert_eq!(stats.total_tasks, 1);
}

#[test]
fn test_failed_save_keeps_memory_authoritative() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, b"not a directory").unwrap();

    let clock = ManualClock::new(start());
    let settings = EngineSettings::new(CREATOR, blocker.join("data"));
    let mut engine = Engine::open_with_clock(settings, Arc::new(clock.clone())).0;

    assert!(engine.ban(CREATOR, USER, "spam", None, OwnedTasks::Keep));
    assert!(engine.is_banned(USER));
    match engine.durability() {
        Durability::Dirty { since, error } => {
            assert_eq!(*since, start());
            assert!(!error.is_empty());
        }
        other => panic!("expected dirty state, got {:?}", other),
    }

    // The first failure time sticks across later failures
    clock.advance(Duration::minutes(1));
    assert!(engine.save().is_err());
    assert!(matches!(engine.durability(), Durability::Dirty { since, .. } if *since == start()));
}
