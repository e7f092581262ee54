use anyhow::anyhow;
use teloxide::prelude::*;

use crate::bot::{replied_identity, reply, sender, with_durability_note};
use crate::engine::{OwnedTasks, SharedEngine};
use crate::storage::models::{Identity, Role};
use crate::utils::datetime::{format_ban_expiry, format_datetime, format_duration};
use crate::utils::logging::{log_command_error, log_command_start, log_command_success};
use crate::utils::validation::{parse_ban_args, parse_target_args};

const DEFAULT_BAN_REASON: &str = "No reason given";

/// The explicit ID wins; otherwise the author of the replied-to message.
fn target_and_rest(msg: &Message, args: &str) -> anyhow::Result<(Identity, String)> {
    let parsed = parse_target_args(args)?;
    let target = parsed
        .target
        .or_else(|| replied_identity(msg))
        .ok_or_else(|| anyhow!("Specify a user ID or reply to the user's message"))?;
    Ok((target, parsed.rest))
}

async fn reply_invalid(bot: &Bot, msg: &Message, command: &str, who: (Identity, &str), error: anyhow::Error) -> ResponseResult<()> {
    log_command_error(command, who.1, who.0, msg.chat.id.0, &error.to_string());
    reply(bot, msg, format!("❌ {error}")).await
}

pub async fn handle_role(bot: Bot, msg: Message, args: String, engine: &SharedEngine) -> ResponseResult<()> {
    let Some((actor, name)) = sender(&msg) else {
        return Ok(());
    };
    log_command_start("role", &name, actor, msg.chat.id.0, Some(&args));

    let target = match parse_target_args(&args) {
        Ok(parsed) => parsed.target.or_else(|| replied_identity(&msg)).unwrap_or(actor),
        Err(e) => return reply_invalid(&bot, &msg, "role", (actor, name.as_str()), e).await,
    };

    let text = {
        let mut engine = engine.lock().await;
        let now = engine.now();
        let status = match engine.ban_info(target) {
            Some(record) => format!("banned, {}", format_ban_expiry(record.expires_at, now)),
            None => "in good standing".to_string(),
        };
        format!(
            "👤 User {}\nRole: {}\nWarnings: {}/{}\nStatus: {}",
            target,
            engine.role_of(target),
            engine.warnings_of(target),
            engine.warn_limit(),
            status
        )
    };

    reply(&bot, &msg, text).await?;
    log_command_success("role", &name, actor, msg.chat.id.0);
    Ok(())
}

pub async fn handle_promote(bot: Bot, msg: Message, args: String, engine: &SharedEngine) -> ResponseResult<()> {
    let Some((actor, name)) = sender(&msg) else {
        return Ok(());
    };
    log_command_start("promote", &name, actor, msg.chat.id.0, Some(&args));

    let target = match target_and_rest(&msg, &args) {
        Ok((target, _)) => target,
        Err(e) => return reply_invalid(&bot, &msg, "promote", (actor, name.as_str()), e).await,
    };

    let text = {
        let mut engine = engine.lock().await;
        if engine.role_of(target) == Role::Admin && engine.role_of(actor) == Role::Creator {
            format!("ℹ️ User {target} is already an admin.")
        } else if engine.promote(actor, target) {
            with_durability_note(format!("✅ User {target} is now an admin."), engine.durability())
        } else {
            format!("❌ You cannot promote user {target}.")
        }
    };

    reply(&bot, &msg, text).await?;
    log_command_success("promote", &name, actor, msg.chat.id.0);
    Ok(())
}

pub async fn handle_demote(bot: Bot, msg: Message, args: String, engine: &SharedEngine) -> ResponseResult<()> {
    let Some((actor, name)) = sender(&msg) else {
        return Ok(());
    };
    log_command_start("demote", &name, actor, msg.chat.id.0, Some(&args));

    let target = match target_and_rest(&msg, &args) {
        Ok((target, _)) => target,
        Err(e) => return reply_invalid(&bot, &msg, "demote", (actor, name.as_str()), e).await,
    };

    let text = {
        let mut engine = engine.lock().await;
        if engine.demote(actor, target) {
            with_durability_note(format!("✅ User {target} is no longer an admin."), engine.durability())
        } else if engine.role_of(actor) != Role::Creator {
            "❌ Only the creator can demote admins.".to_string()
        } else {
            format!("❌ User {target} is not an admin.")
        }
    };

    reply(&bot, &msg, text).await?;
    log_command_success("demote", &name, actor, msg.chat.id.0);
    Ok(())
}

pub async fn handle_ban(bot: Bot, msg: Message, args: String, engine: &SharedEngine) -> ResponseResult<()> {
    let Some((actor, name)) = sender(&msg) else {
        return Ok(());
    };
    log_command_start("ban", &name, actor, msg.chat.id.0, Some(&args));

    let parsed = match parse_ban_args(&args) {
        Ok(parsed) => parsed,
        Err(e) => return reply_invalid(&bot, &msg, "ban", (actor, name.as_str()), e).await,
    };
    let Some(target) = parsed.target.or_else(|| replied_identity(&msg)) else {
        let e = anyhow!("Specify a user ID or reply to the user's message");
        return reply_invalid(&bot, &msg, "ban", (actor, name.as_str()), e).await;
    };

    let reason = if parsed.reason.trim().is_empty() {
        DEFAULT_BAN_REASON
    } else {
        parsed.reason.trim()
    };
    let owned_tasks = if parsed.purge { OwnedTasks::Purge } else { OwnedTasks::Keep };

    let text = {
        let mut engine = engine.lock().await;
        let tasks_before = engine.tasks_of(target, None).len();
        if engine.ban(actor, target, reason, parsed.duration, owned_tasks) {
            let mut text = match parsed.duration {
                Some(duration) => format!("🚫 User {target} banned for {}.", format_duration(duration)),
                None => format!("🚫 User {target} banned permanently."),
            };
            text.push_str(&format!("\nReason: {reason}"));
            if parsed.purge {
                text.push_str(&format!("\nDeleted {tasks_before} task(s)."));
            }
            with_durability_note(text, engine.durability())
        } else if target == engine.creator() {
            "❌ The creator cannot be banned.".to_string()
        } else {
            format!("❌ You cannot ban user {target}.")
        }
    };

    reply(&bot, &msg, text).await?;
    log_command_success("ban", &name, actor, msg.chat.id.0);
    Ok(())
}

pub async fn handle_unban(bot: Bot, msg: Message, args: String, engine: &SharedEngine) -> ResponseResult<()> {
    let Some((actor, name)) = sender(&msg) else {
        return Ok(());
    };
    log_command_start("unban", &name, actor, msg.chat.id.0, Some(&args));

    let (target, note) = match target_and_rest(&msg, &args) {
        Ok(parsed) => parsed,
        Err(e) => return reply_invalid(&bot, &msg, "unban", (actor, name.as_str()), e).await,
    };
    let note = Some(note.as_str()).filter(|n| !n.is_empty());

    let text = {
        let mut engine = engine.lock().await;
        if !engine.is_banned(target) {
            format!("ℹ️ User {target} is not banned.")
        } else if engine.unban(actor, target, note) {
            with_durability_note(format!("✅ User {target} unbanned."), engine.durability())
        } else {
            format!("❌ You cannot unban user {target}.")
        }
    };

    reply(&bot, &msg, text).await?;
    log_command_success("unban", &name, actor, msg.chat.id.0);
    Ok(())
}

pub async fn handle_warn(bot: Bot, msg: Message, args: String, engine: &SharedEngine) -> ResponseResult<()> {
    let Some((actor, name)) = sender(&msg) else {
        return Ok(());
    };
    log_command_start("warn", &name, actor, msg.chat.id.0, Some(&args));

    let (target, reason) = match target_and_rest(&msg, &args) {
        Ok(parsed) => parsed,
        Err(e) => return reply_invalid(&bot, &msg, "warn", (actor, name.as_str()), e).await,
    };
    let reason = Some(reason.as_str()).filter(|r| !r.is_empty());

    let text = {
        let mut engine = engine.lock().await;
        if !engine.permissions().can_ban(actor, target) {
            format!("❌ You cannot warn user {target}.")
        } else {
            let limit = engine.warn_limit();
            let count = engine.warn(actor, target, reason);
            // A permitted warning only leaves zero behind when it hit the limit.
            let text = if count == 0 {
                let now = engine.now();
                match engine.ban_info(target) {
                    Some(record) => format!(
                        "🚫 User {} reached {} warnings and is banned, {}.",
                        target,
                        limit,
                        format_ban_expiry(record.expires_at, now)
                    ),
                    None => format!("⚠️ User {target} reached {limit} warnings; warnings reset."),
                }
            } else {
                format!("⚠️ User {target} warned ({count}/{limit}).")
            };
            with_durability_note(text, engine.durability())
        }
    };

    reply(&bot, &msg, text).await?;
    log_command_success("warn", &name, actor, msg.chat.id.0);
    Ok(())
}

pub async fn handle_clear_warns(bot: Bot, msg: Message, args: String, engine: &SharedEngine) -> ResponseResult<()> {
    let Some((actor, name)) = sender(&msg) else {
        return Ok(());
    };
    log_command_start("clearwarns", &name, actor, msg.chat.id.0, Some(&args));

    let target = match target_and_rest(&msg, &args) {
        Ok((target, _)) => target,
        Err(e) => return reply_invalid(&bot, &msg, "clearwarns", (actor, name.as_str()), e).await,
    };

    let text = {
        let mut engine = engine.lock().await;
        if engine.clear_warnings(actor, target) {
            with_durability_note(format!("✅ Warnings for user {target} cleared."), engine.durability())
        } else {
            format!("❌ You cannot clear warnings for user {target}.")
        }
    };

    reply(&bot, &msg, text).await?;
    log_command_success("clearwarns", &name, actor, msg.chat.id.0);
    Ok(())
}

pub async fn handle_ban_info(bot: Bot, msg: Message, args: String, engine: &SharedEngine) -> ResponseResult<()> {
    let Some((actor, name)) = sender(&msg) else {
        return Ok(());
    };
    log_command_start("baninfo", &name, actor, msg.chat.id.0, Some(&args));

    let target = match target_and_rest(&msg, &args) {
        Ok((target, _)) => target,
        Err(e) => return reply_invalid(&bot, &msg, "baninfo", (actor, name.as_str()), e).await,
    };

    let text = {
        let mut engine = engine.lock().await;
        let now = engine.now();
        match engine.ban_info(target) {
            Some(record) => format!(
                "🚫 User {}\nReason: {}\nBanned by: {}\nSince: {}\nExpires: {}",
                target,
                record.reason,
                record.issued_by,
                format_datetime(&record.issued_at),
                format_ban_expiry(record.expires_at, now)
            ),
            None => format!("✅ User {target} is not banned."),
        }
    };

    reply(&bot, &msg, text).await?;
    log_command_success("baninfo", &name, actor, msg.chat.id.0);
    Ok(())
}

pub async fn handle_warnings(bot: Bot, msg: Message, args: String, engine: &SharedEngine) -> ResponseResult<()> {
    let Some((actor, name)) = sender(&msg) else {
        return Ok(());
    };
    log_command_start("warnings", &name, actor, msg.chat.id.0, Some(&args));

    let target = match parse_target_args(&args) {
        Ok(parsed) => parsed.target.or_else(|| replied_identity(&msg)).unwrap_or(actor),
        Err(e) => return reply_invalid(&bot, &msg, "warnings", (actor, name.as_str()), e).await,
    };

    let text = {
        let engine = engine.lock().await;
        format!(
            "⚠️ User {} has {}/{} warnings.",
            target,
            engine.warnings_of(target),
            engine.warn_limit()
        )
    };

    reply(&bot, &msg, text).await?;
    log_command_success("warnings", &name, actor, msg.chat.id.0);
    Ok(())
}

pub async fn handle_stats(bot: Bot, msg: Message, engine: &SharedEngine) -> ResponseResult<()> {
    let Some((actor, name)) = sender(&msg) else {
        return Ok(());
    };
    log_command_start("stats", &name, actor, msg.chat.id.0, None);

    let text = {
        let mut engine = engine.lock().await;
        if !engine.is_staff(actor) {
            None
        } else {
            let active_bans = engine.active_bans().len();
            let admins = engine.admins().len();
            let stats = engine.stats();
            Some(format!(
                "📊 Bot statistics\n\n\
                Users: {} ({} active)\n\
                Admins: {}\n\
                Active bans: {}\n\n\
                Tasks: {} total, {} open, {} done ({:.1}%)\n\n\
                Today ({}):\n\
                • New users: {}\n\
                • Tasks created: {}\n\
                • Tasks completed: {}",
                stats.total_users,
                stats.active_identities.len(),
                admins,
                active_bans,
                stats.total_tasks,
                stats.open_tasks(),
                stats.completed_tasks,
                stats.completion_rate(),
                stats.day,
                stats.today.new_users,
                stats.today.tasks_created,
                stats.today.tasks_completed
            ))
        }
    };

    match text {
        Some(text) => {
            reply(&bot, &msg, text).await?;
            log_command_success("stats", &name, actor, msg.chat.id.0);
        }
        None => {
            log_command_error("stats", &name, actor, msg.chat.id.0, "admin role required");
            reply(&bot, &msg, "❌ Statistics are available to admins only.".to_string()).await?;
        }
    }
    Ok(())
}
