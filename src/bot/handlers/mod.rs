pub mod message;

use teloxide::{dispatching::UpdateHandler, prelude::*};

use crate::bot::commands::Command;
use crate::engine::SharedEngine;

pub struct BotHandler {
    pub engine: SharedEngine,
}

impl BotHandler {
    pub fn new(engine: SharedEngine) -> Self {
        Self { engine }
    }

    /// Messages from banned senders stop at the gate; everything else is
    /// parsed as a command and dispatched.
    pub fn schema(&self) -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
        let engine = self.engine.clone();
        let gate_engine = self.engine.clone();

        Update::filter_message()
            .filter_async(move |msg: Message| {
                let engine = gate_engine.clone();
                async move { message::sender_allowed(&msg, &engine).await }
            })
            .filter_command::<Command>()
            .endpoint(move |bot: Bot, msg: Message, cmd: Command| {
                let engine = engine.clone();
                async move { message::command_handler(bot, msg, cmd, engine).await }
            })
    }
}
