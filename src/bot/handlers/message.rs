use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::bot::commands::{admin, moderation, tasks, Command};
use crate::bot::{sender, HandlerResult};
use crate::engine::SharedEngine;

/// False for banned senders. Messages without a sender pass through.
pub async fn sender_allowed(msg: &Message, engine: &SharedEngine) -> bool {
    let Some((id, name)) = sender(msg) else {
        return true;
    };
    let banned = engine.lock().await.is_banned(id);
    if banned {
        tracing::debug!("Dropping message from banned user {}({})", name, id);
    }
    !banned
}

pub async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    engine: SharedEngine,
) -> HandlerResult {
    match cmd {
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string()).await?;
        }
        Command::Start => tasks::handle_start(bot, msg, &engine).await?,
        Command::Role(args) => moderation::handle_role(bot, msg, args, &engine).await?,
        Command::Promote(args) => moderation::handle_promote(bot, msg, args, &engine).await?,
        Command::Demote(args) => moderation::handle_demote(bot, msg, args, &engine).await?,
        Command::Ban(args) => moderation::handle_ban(bot, msg, args, &engine).await?,
        Command::Unban(args) => moderation::handle_unban(bot, msg, args, &engine).await?,
        Command::Warn(args) => moderation::handle_warn(bot, msg, args, &engine).await?,
        Command::ClearWarns(args) => moderation::handle_clear_warns(bot, msg, args, &engine).await?,
        Command::BanInfo(args) => moderation::handle_ban_info(bot, msg, args, &engine).await?,
        Command::Warnings(args) => moderation::handle_warnings(bot, msg, args, &engine).await?,
        Command::Stats => moderation::handle_stats(bot, msg, &engine).await?,
        Command::Users => admin::handle_users(bot, msg, &engine).await?,
        Command::AllTasks => admin::handle_all_tasks(bot, msg, &engine).await?,
        Command::Add(args) => tasks::handle_add(bot, msg, args, &engine).await?,
        Command::Tasks => tasks::handle_tasks(bot, msg, &engine).await?,
        Command::Edit(args) => tasks::handle_edit(bot, msg, args, &engine).await?,
        Command::Done(args) => tasks::handle_done(bot, msg, args, &engine).await?,
        Command::Priority(args) => tasks::handle_priority(bot, msg, args, &engine).await?,
        Command::Category(args) => tasks::handle_category(bot, msg, args, &engine).await?,
        Command::Delete(args) => tasks::handle_delete(bot, msg, args, &engine).await?,
    }
    Ok(())
}
