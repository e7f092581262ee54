pub mod admin;
pub mod moderation;
pub mod tasks;

use teloxide::utils::command::BotCommands;

/// Commands that take a target accept a numeric user ID, or act on the
/// author of the replied-to message when the ID is omitted.
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Task Keeper Bot commands:")]
pub enum Command {
    #[command(description = "Display this help message")]
    Help,
    #[command(description = "Register and start the bot")]
    Start,
    #[command(description = "Show the role, warnings and ban state of a user: /role [user_id]")]
    Role(String),
    #[command(description = "Make a user an admin: /promote <user_id>")]
    Promote(String),
    #[command(description = "Remove admin rights (creator only): /demote <user_id>")]
    Demote(String),
    #[command(description = "Ban a user: /ban <user_id> [30m|12h|7d] [--purge] [reason]")]
    Ban(String),
    #[command(description = "Lift a ban: /unban <user_id> [note]")]
    Unban(String),
    #[command(description = "Warn a user, banning them at the limit: /warn <user_id> [reason]")]
    Warn(String),
    #[command(description = "Reset a user's warnings: /clearwarns <user_id>")]
    ClearWarns(String),
    #[command(description = "Show ban details: /baninfo <user_id>")]
    BanInfo(String),
    #[command(description = "Show warning count: /warnings [user_id]")]
    Warnings(String),
    #[command(description = "Show bot statistics (admins)")]
    Stats,
    #[command(description = "List every registered user (admins)")]
    Users,
    #[command(description = "List every task (admins)")]
    AllTasks,
    #[command(description = "Add a task: /add <text>")]
    Add(String),
    #[command(description = "List your tasks")]
    Tasks,
    #[command(description = "Replace a task's text: /edit <task_id> <text>")]
    Edit(String),
    #[command(description = "Toggle a task done or open: /done <task_id>")]
    Done(String),
    #[command(description = "Set task priority: /priority <task_id> <high|medium|low>")]
    Priority(String),
    #[command(description = "Move a task to a category: /category <task_id> <name>")]
    Category(String),
    #[command(description = "Delete a task: /delete <task_id>")]
    Delete(String),
}
