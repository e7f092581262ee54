/// HTTP health endpoints
pub mod health;
/// Daily rollover of the "today" counters
pub mod rollover;
/// Derived counters rebuilt from task and user records
pub mod stats;
