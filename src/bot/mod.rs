/// Command definitions and per-command handlers
pub mod commands;
/// Update routing and the banned-sender gate
pub mod handlers;

use teloxide::prelude::*;

use crate::engine::Durability;
use crate::storage::models::Identity;
use crate::storage::task_store::UserProfile;

pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub(crate) async fn reply(bot: &Bot, msg: &Message, text: String) -> ResponseResult<()> {
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

/// Who sent the message, with a display name for logs.
pub(crate) fn sender(msg: &Message) -> Option<(Identity, String)> {
    msg.from().map(|user| {
        let name = user
            .username
            .clone()
            .unwrap_or_else(|| user.first_name.clone());
        (user.id.0 as Identity, name)
    })
}

pub(crate) fn sender_profile(msg: &Message) -> UserProfile {
    msg.from()
        .map(|user| UserProfile {
            username: user.username.clone().unwrap_or_default(),
            full_name: user.full_name(),
        })
        .unwrap_or_default()
}

/// The author of the message being replied to, if any.
pub(crate) fn replied_identity(msg: &Message) -> Option<Identity> {
    msg.reply_to_message()
        .and_then(|reply| reply.from())
        .map(|user| user.id.0 as Identity)
}

/// Appends a notice when the change only lives in memory.
pub(crate) fn with_durability_note(text: String, durability: &Durability) -> String {
    match durability {
        Durability::Clean { .. } => text,
        Durability::Dirty { .. } => format!("{text}\n\n⚠️ Applied, but not saved to disk yet."),
    }
}
