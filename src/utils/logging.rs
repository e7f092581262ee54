use tracing::{debug, error, info, warn};

/// Logs command start with consistent format
pub fn log_command_start(command: &str, user: &str, user_id: i64, chat_id: i64, details: Option<&str>) {
    match details {
        Some(d) => info!(
            "CMD_START: {} by {}({}) in chat {} - {}",
            command, user, user_id, chat_id, d
        ),
        None => info!(
            "CMD_START: {} by {}({}) in chat {}",
            command, user, user_id, chat_id
        ),
    }
}

/// Logs command completion with consistent format
pub fn log_command_success(command: &str, user: &str, user_id: i64, chat_id: i64) {
    info!(
        "CMD_SUCCESS: {} by {}({}) in chat {}",
        command, user, user_id, chat_id
    );
}

/// Logs command errors with consistent format
pub fn log_command_error(command: &str, user: &str, user_id: i64, chat_id: i64, error: &str) {
    error!(
        "CMD_ERROR: {} by {}({}) in chat {} - {}",
        command, user, user_id, chat_id, error
    );
}

/// Logs an applied ban, unban, warning or role change
pub fn log_moderation_action(action: &str, actor: i64, target: i64, details: Option<&str>) {
    match details {
        Some(d) => info!("MOD: {} by {} on {} - {}", action, actor, target, d),
        None => info!("MOD: {} by {} on {}", action, actor, target),
    }
}

/// Logs a request the permission rules turned down
pub fn log_permission_denied(action: &str, actor: i64, target: i64, why: &str) {
    warn!("DENIED: {} by {} on {} - {}", action, actor, target, why);
}

/// Logs persistence operations with consistent format
pub fn log_persistence_operation(operation: &str, document: &str, details: Option<&str>) {
    match details {
        Some(d) => debug!("PERSIST: {} on {} - {}", operation, document, d),
        None => debug!("PERSIST: {} on {}", operation, document),
    }
}

/// Logs persistence failures with consistent format
pub fn log_persistence_error(operation: &str, document: &str, error: &str) {
    error!("PERSIST_ERROR: {} on {} failed: {}", operation, document, error);
}

/// Logs a stored record skipped during load
pub fn log_corrupt_record(section: &str, key: &str, reason: &str) {
    warn!("CORRUPT: skipped {}[{}] - {}", section, key, reason);
}

/// Logs system events with consistent format
pub fn log_system_event(event: &str, details: Option<&str>) {
    match details {
        Some(d) => info!("SYSTEM: {} - {}", event, d),
        None => info!("SYSTEM: {}", event),
    }
}
