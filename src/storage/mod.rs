/// Persisted documents and the records they hold
pub mod models;
/// Atomic save and tolerant load of both documents
pub mod persistence;
/// Task and user records owned by people in the chat
pub mod task_store;
