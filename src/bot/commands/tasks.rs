use teloxide::prelude::*;

use crate::bot::{reply, sender, sender_profile, with_durability_note};
use crate::engine::SharedEngine;
use crate::storage::models::TaskRecord;
use crate::utils::datetime::format_datetime;
use crate::utils::logging::{log_command_error, log_command_start, log_command_success};
use crate::utils::validation::{
    parse_priority, parse_task_edit, parse_task_id, validate_category, validate_task_text,
};

const MAX_LISTED_TASKS: usize = 20;

pub async fn handle_start(bot: Bot, msg: Message, engine: &SharedEngine) -> ResponseResult<()> {
    let Some((actor, name)) = sender(&msg) else {
        return Ok(());
    };
    log_command_start("start", &name, actor, msg.chat.id.0, None);

    let text = {
        let mut engine = engine.lock().await;
        if engine.add_identity(actor, sender_profile(&msg)) {
            let text = format!(
                "👋 Welcome to Task Keeper Bot!\n\nYour role: {}\n\nUse /add <text> to create a task, /tasks to list them and /done <id> to complete one.\nUse /help to see all commands.",
                engine.role_of(actor)
            );
            with_durability_note(text, engine.durability())
        } else {
            "🚫 You are banned from using this bot.".to_string()
        }
    };

    reply(&bot, &msg, text).await?;
    log_command_success("start", &name, actor, msg.chat.id.0);
    Ok(())
}

pub async fn handle_add(bot: Bot, msg: Message, args: String, engine: &SharedEngine) -> ResponseResult<()> {
    let Some((actor, name)) = sender(&msg) else {
        return Ok(());
    };
    log_command_start("add", &name, actor, msg.chat.id.0, None);

    let task_text = match validate_task_text(&args) {
        Ok(text) => text,
        Err(e) => {
            log_command_error("add", &name, actor, msg.chat.id.0, &e.to_string());
            return reply(&bot, &msg, format!("❌ {e}\n\nUsage: /add <text>")).await;
        }
    };

    let text = {
        let mut engine = engine.lock().await;
        engine.add_identity(actor, sender_profile(&msg));
        match engine.add_task(actor, &task_text, None) {
            Some(id) => with_durability_note(format!("📝 Task #{id} added."), engine.durability()),
            None if engine.is_banned(actor) => "🚫 You are banned from using this bot.".to_string(),
            None => "❌ No more tasks can be created.".to_string(),
        }
    };

    reply(&bot, &msg, text).await?;
    log_command_success("add", &name, actor, msg.chat.id.0);
    Ok(())
}

pub(crate) fn task_line(task: &TaskRecord) -> String {
    let mark = if task.completed { "✅" } else { "▫️" };
    format!("{} #{} {} [{}, {}]", mark, task.id, task.text, task.category, task.priority)
}

pub async fn handle_tasks(bot: Bot, msg: Message, engine: &SharedEngine) -> ResponseResult<()> {
    let Some((actor, name)) = sender(&msg) else {
        return Ok(());
    };
    log_command_start("tasks", &name, actor, msg.chat.id.0, None);

    let text = {
        let engine = engine.lock().await;
        let open = engine.tasks_of(actor, Some(false));
        let done = engine.tasks_of(actor, Some(true));

        if open.is_empty() && done.is_empty() {
            "📭 You have no tasks yet. Add one with /add <text>.".to_string()
        } else {
            let mut text = format!("📋 Your tasks ({} open, {} done)\n", open.len(), done.len());
            for task in open.iter().take(MAX_LISTED_TASKS) {
                text.push_str(&format!("\n{}", task_line(task)));
            }
            if !done.is_empty() {
                text.push_str("\n\nRecently completed:");
                for task in done.iter().take(MAX_LISTED_TASKS) {
                    let when = task.completed_at.as_ref().map(format_datetime).unwrap_or_default();
                    text.push_str(&format!("\n{} {}", task_line(task), when));
                }
            }
            text
        }
    };

    reply(&bot, &msg, text).await?;
    log_command_success("tasks", &name, actor, msg.chat.id.0);
    Ok(())
}

pub async fn handle_done(bot: Bot, msg: Message, args: String, engine: &SharedEngine) -> ResponseResult<()> {
    let Some((actor, name)) = sender(&msg) else {
        return Ok(());
    };
    log_command_start("done", &name, actor, msg.chat.id.0, Some(&args));

    let task_id = match parse_task_id(&args) {
        Ok(id) => id,
        Err(e) => {
            log_command_error("done", &name, actor, msg.chat.id.0, &e.to_string());
            return reply(&bot, &msg, format!("❌ {e}\n\nUsage: /done <task_id>")).await;
        }
    };

    let text = {
        let mut engine = engine.lock().await;
        match engine.toggle_task(actor, task_id) {
            Some(true) => with_durability_note(format!("✅ Task #{task_id} completed."), engine.durability()),
            Some(false) => with_durability_note(format!("↩️ Task #{task_id} reopened."), engine.durability()),
            None => format!("❌ Task #{task_id} not found among your tasks."),
        }
    };

    reply(&bot, &msg, text).await?;
    log_command_success("done", &name, actor, msg.chat.id.0);
    Ok(())
}

pub async fn handle_edit(bot: Bot, msg: Message, args: String, engine: &SharedEngine) -> ResponseResult<()> {
    let Some((actor, name)) = sender(&msg) else {
        return Ok(());
    };
    log_command_start("edit", &name, actor, msg.chat.id.0, None);

    let parsed = parse_task_edit(&args).and_then(|(id, value)| Ok((id, validate_task_text(&value)?)));
    let (task_id, task_text) = match parsed {
        Ok(parsed) => parsed,
        Err(e) => {
            log_command_error("edit", &name, actor, msg.chat.id.0, &e.to_string());
            return reply(&bot, &msg, format!("❌ {e}\n\nUsage: /edit <task_id> <text>")).await;
        }
    };

    let text = {
        let mut engine = engine.lock().await;
        if engine.set_task_text(actor, task_id, &task_text) {
            with_durability_note(format!("✏️ Task #{task_id} updated."), engine.durability())
        } else {
            format!("❌ Task #{task_id} not found among your tasks.")
        }
    };

    reply(&bot, &msg, text).await?;
    log_command_success("edit", &name, actor, msg.chat.id.0);
    Ok(())
}

pub async fn handle_priority(bot: Bot, msg: Message, args: String, engine: &SharedEngine) -> ResponseResult<()> {
    let Some((actor, name)) = sender(&msg) else {
        return Ok(());
    };
    log_command_start("priority", &name, actor, msg.chat.id.0, Some(&args));

    let parsed = parse_task_edit(&args).and_then(|(id, value)| Ok((id, parse_priority(&value)?)));
    let (task_id, priority) = match parsed {
        Ok(parsed) => parsed,
        Err(e) => {
            log_command_error("priority", &name, actor, msg.chat.id.0, &e.to_string());
            return reply(&bot, &msg, format!("❌ {e}\n\nUsage: /priority <task_id> <high|medium|low>")).await;
        }
    };

    let text = {
        let mut engine = engine.lock().await;
        if engine.set_task_priority(actor, task_id, priority) {
            with_durability_note(format!("🏷 Task #{task_id} priority set to {priority}."), engine.durability())
        } else {
            format!("❌ Task #{task_id} not found among your tasks.")
        }
    };

    reply(&bot, &msg, text).await?;
    log_command_success("priority", &name, actor, msg.chat.id.0);
    Ok(())
}

pub async fn handle_category(bot: Bot, msg: Message, args: String, engine: &SharedEngine) -> ResponseResult<()> {
    let Some((actor, name)) = sender(&msg) else {
        return Ok(());
    };
    log_command_start("category", &name, actor, msg.chat.id.0, Some(&args));

    let parsed = parse_task_edit(&args).and_then(|(id, value)| Ok((id, validate_category(&value)?)));
    let (task_id, category) = match parsed {
        Ok(parsed) => parsed,
        Err(e) => {
            log_command_error("category", &name, actor, msg.chat.id.0, &e.to_string());
            return reply(&bot, &msg, format!("❌ {e}\n\nUsage: /category <task_id> <name>")).await;
        }
    };

    let text = {
        let mut engine = engine.lock().await;
        if engine.set_task_category(actor, task_id, &category) {
            with_durability_note(format!("📂 Task #{task_id} moved to {category}."), engine.durability())
        } else {
            format!("❌ Task #{task_id} not found among your tasks.")
        }
    };

    reply(&bot, &msg, text).await?;
    log_command_success("category", &name, actor, msg.chat.id.0);
    Ok(())
}

/// Admins may delete tasks of users they manage.
pub async fn handle_delete(bot: Bot, msg: Message, args: String, engine: &SharedEngine) -> ResponseResult<()> {
    let Some((actor, name)) = sender(&msg) else {
        return Ok(());
    };
    log_command_start("delete", &name, actor, msg.chat.id.0, Some(&args));

    let task_id = match parse_task_id(&args) {
        Ok(id) => id,
        Err(e) => {
            log_command_error("delete", &name, actor, msg.chat.id.0, &e.to_string());
            return reply(&bot, &msg, format!("❌ {e}\n\nUsage: /delete <task_id>")).await;
        }
    };

    let text = {
        let mut engine = engine.lock().await;
        if engine.delete_task(actor, task_id) {
            with_durability_note(format!("🗑 Task #{task_id} deleted."), engine.durability())
        } else {
            format!("❌ Task #{task_id} not found or not yours to delete.")
        }
    };

    reply(&bot, &msg, text).await?;
    log_command_success("delete", &name, actor, msg.chat.id.0);
    Ok(())
}
