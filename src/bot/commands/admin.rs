use std::collections::BTreeSet;
use teloxide::prelude::*;

use crate::bot::commands::tasks::task_line;
use crate::bot::{reply, sender};
use crate::engine::{Engine, SharedEngine};
use crate::storage::models::Identity;
use crate::utils::logging::{log_command_error, log_command_start, log_command_success};

const MAX_LISTED: usize = 30;

fn users_overview(engine: &mut Engine) -> String {
    let banned: BTreeSet<Identity> = engine.active_bans().into_iter().map(|(id, _)| id).collect();
    let users = engine.data().users();
    if users.is_empty() {
        return "📭 No users yet.".to_string();
    }

    let mut text = format!("👥 Users ({})\n", users.len());
    for user in users.values().take(MAX_LISTED) {
        let display = if user.username.is_empty() {
            user.full_name.clone()
        } else {
            format!("@{}", user.username)
        };
        let ban_mark = if banned.contains(&user.user_id) { " 🚫" } else { "" };
        text.push_str(&format!(
            "\n• {} ({}) {}, {} tasks, {} done{}",
            display,
            user.user_id,
            engine.role_of(user.user_id),
            user.task_count,
            user.completed_count,
            ban_mark
        ));
    }
    if users.len() > MAX_LISTED {
        text.push_str(&format!("\n…and {} more", users.len() - MAX_LISTED));
    }
    text
}

/// Newest first.
fn all_tasks_overview(engine: &Engine) -> String {
    let tasks = engine.data().tasks();
    if tasks.is_empty() {
        return "📭 No tasks yet.".to_string();
    }

    let done = tasks.values().filter(|t| t.completed).count();
    let mut text = format!("🗂 All tasks ({} total, {} done)\n", tasks.len(), done);
    for task in tasks.values().rev().take(MAX_LISTED) {
        text.push_str(&format!("\n{} by {}", task_line(task), task.user_id));
    }
    if tasks.len() > MAX_LISTED {
        text.push_str(&format!("\n…and {} more", tasks.len() - MAX_LISTED));
    }
    text
}

pub async fn handle_users(bot: Bot, msg: Message, engine: &SharedEngine) -> ResponseResult<()> {
    let Some((actor, name)) = sender(&msg) else {
        return Ok(());
    };
    log_command_start("users", &name, actor, msg.chat.id.0, None);

    let text = {
        let mut engine = engine.lock().await;
        if engine.is_staff(actor) {
            Some(users_overview(&mut engine))
        } else {
            None
        }
    };

    match text {
        Some(text) => {
            reply(&bot, &msg, text).await?;
            log_command_success("users", &name, actor, msg.chat.id.0);
        }
        None => {
            log_command_error("users", &name, actor, msg.chat.id.0, "admin role required");
            reply(&bot, &msg, "❌ The user list is available to admins only.".to_string()).await?;
        }
    }
    Ok(())
}

pub async fn handle_all_tasks(bot: Bot, msg: Message, engine: &SharedEngine) -> ResponseResult<()> {
    let Some((actor, name)) = sender(&msg) else {
        return Ok(());
    };
    log_command_start("alltasks", &name, actor, msg.chat.id.0, None);

    let text = {
        let mut engine = engine.lock().await;
        if engine.is_staff(actor) {
            Some(all_tasks_overview(&engine))
        } else {
            None
        }
    };

    match text {
        Some(text) => {
            reply(&bot, &msg, text).await?;
            log_command_success("alltasks", &name, actor, msg.chat.id.0);
        }
        None => {
            log_command_error("alltasks", &name, actor, msg.chat.id.0, "admin role required");
            reply(&bot, &msg, "❌ The task list is available to admins only.".to_string()).await?;
        }
    }
    Ok(())
}
