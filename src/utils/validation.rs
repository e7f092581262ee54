use anyhow::{anyhow, Result};
use chrono::Duration;

use crate::storage::models::{Identity, Priority, TaskId};

pub const MAX_REASON_LENGTH: usize = 200;
pub const MAX_TASK_TEXT_LENGTH: usize = 500;
pub const MAX_CATEGORY_LENGTH: usize = 30;
pub const MAX_BAN_DAYS: i64 = 365;
pub const PURGE_FLAG: &str = "--purge";

pub fn parse_identity(input: &str) -> Result<Identity> {
    let id: Identity = input
        .trim()
        .parse()
        .map_err(|_| anyhow!("'{}' is not a user ID", input.trim()))?;

    // Telegram user IDs are positive; negative IDs belong to chats
    if id <= 0 {
        return Err(anyhow!("User ID must be a positive number"));
    }

    Ok(id)
}

pub fn parse_task_id(input: &str) -> Result<TaskId> {
    let input = input.trim();
    if input.is_empty() {
        return Err(anyhow!("Task ID cannot be empty"));
    }
    input
        .trim_start_matches('#')
        .parse()
        .map_err(|_| anyhow!("'{}' is not a task ID", input))
}

/// `<n>s|m|h|d|w`, for example `30m` or `7d`. Capped at one year.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let input = input.trim().to_lowercase();
    let unit_start = match input.char_indices().last() {
        Some((index, _)) if index > 0 => index,
        _ => return Err(anyhow!("Invalid duration '{}'", input)),
    };

    let (amount, unit) = input.split_at(unit_start);
    let amount: i64 = amount
        .parse()
        .map_err(|_| anyhow!("Invalid duration '{}'", input))?;
    if amount <= 0 {
        return Err(anyhow!("Duration must be positive"));
    }

    let duration = match unit {
        "s" => Duration::try_seconds(amount),
        "m" => Duration::try_minutes(amount),
        "h" => Duration::try_hours(amount),
        "d" => Duration::try_days(amount),
        "w" => Duration::try_weeks(amount),
        _ => return Err(anyhow!("Unknown duration unit '{}' (use s, m, h, d or w)", unit)),
    }
    .ok_or_else(|| anyhow!("Duration '{}' is too long", input))?;

    if duration > Duration::days(MAX_BAN_DAYS) {
        return Err(anyhow!("Duration cannot exceed {} days", MAX_BAN_DAYS));
    }

    Ok(duration)
}

pub fn validate_reason(reason: &str) -> Result<String> {
    let reason = reason.trim();

    if reason.chars().count() > MAX_REASON_LENGTH {
        return Err(anyhow!("Reason cannot be longer than {} characters", MAX_REASON_LENGTH));
    }

    Ok(reason.to_string())
}

pub fn validate_task_text(text: &str) -> Result<String> {
    let text = text.trim();

    if text.is_empty() {
        return Err(anyhow!("Task text cannot be empty"));
    }

    if text.chars().count() > MAX_TASK_TEXT_LENGTH {
        return Err(anyhow!("Task text cannot be longer than {} characters", MAX_TASK_TEXT_LENGTH));
    }

    Ok(text.to_string())
}

pub fn validate_category(category: &str) -> Result<String> {
    let category = category.trim();

    if category.is_empty() {
        return Err(anyhow!("Category cannot be empty"));
    }

    if category.chars().count() > MAX_CATEGORY_LENGTH {
        return Err(anyhow!("Category cannot be longer than {} characters", MAX_CATEGORY_LENGTH));
    }

    Ok(category.to_string())
}

/// `<task_id> <value...>` for the task edit commands.
pub fn parse_task_edit(args: &str) -> Result<(TaskId, String)> {
    let (first, rest) = split_first(args);
    let task_id = parse_task_id(first.unwrap_or_default())?;
    Ok((task_id, rest.trim().to_string()))
}

pub fn parse_priority(input: &str) -> Result<Priority> {
    input
        .parse()
        .map_err(|e: String| anyhow!("{} (use high, medium or low)", e))
}

/// An optional leading user ID followed by free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetArgs {
    pub target: Option<Identity>,
    pub rest: String,
}

/// The target may be omitted when the command replies to the target's
/// message, so a first token that is not an ID is treated as text.
pub fn parse_target_args(args: &str) -> Result<TargetArgs> {
    let args = args.trim();
    let (first, rest) = split_first(args);

    match first.map(parse_identity) {
        Some(Ok(target)) => Ok(TargetArgs {
            target: Some(target),
            rest: validate_reason(rest)?,
        }),
        Some(Err(_)) if first.is_some_and(looks_numeric) => {
            Err(anyhow!("User ID must be a positive number"))
        }
        _ => Ok(TargetArgs {
            target: None,
            rest: validate_reason(args)?,
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanArgs {
    pub target: Option<Identity>,
    /// `None` means permanent.
    pub duration: Option<Duration>,
    pub purge: bool,
    pub reason: String,
}

/// `[id] [duration] [--purge] [reason...]`. The duration, if any, must come
/// right after the target; `--purge` may appear anywhere.
pub fn parse_ban_args(args: &str) -> Result<BanArgs> {
    let purge = args.split_whitespace().any(|token| token == PURGE_FLAG);
    let remaining: Vec<&str> = args
        .split_whitespace()
        .filter(|token| *token != PURGE_FLAG)
        .collect();

    let TargetArgs { target, rest } = parse_target_args(&remaining.join(" "))?;

    let (first, tail) = split_first(&rest);
    let (duration, reason) = match first {
        Some(token) if looks_like_duration(token) => (Some(parse_duration(token)?), tail.trim()),
        _ => (None, rest.as_str()),
    };

    Ok(BanArgs {
        target,
        duration,
        purge,
        reason: reason.to_string(),
    })
}

fn split_first(text: &str) -> (Option<&str>, &str) {
    let text = text.trim();
    if text.is_empty() {
        return (None, "");
    }
    match text.split_once(char::is_whitespace) {
        Some((first, rest)) => (Some(first), rest),
        None => (Some(text), ""),
    }
}

fn looks_numeric(token: &str) -> bool {
    let digits = token.strip_prefix('-').unwrap_or(token);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn looks_like_duration(token: &str) -> bool {
    let token = token.to_lowercase();
    match token.strip_suffix(['s', 'm', 'h', 'd', 'w']) {
        Some(amount) => !amount.is_empty() && amount.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}
