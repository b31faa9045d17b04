use std::time::Instant;

use async_trait::async_trait;
use teloxide::prelude::*;

use super::{CommandResult, CommandTrait};
use crate::utilities::command_context::CommandContext;

pub struct Ping;

#[async_trait]
impl CommandTrait for Ping {
    fn command_names(&self) -> &[&str] {
        &["ping"]
    }

    fn description(&self) -> Option<&'static str> {
        Some("check the Bot API latency")
    }

    async fn execute(&self, ctx: &CommandContext, _: String) -> CommandResult {
        let start = Instant::now();
        ctx.bot_state.telegram.get_me().send().await?;
        let duration = start.elapsed();
        ctx.reply(format!("ping: {}ms", duration.as_millis())).await?;

        Ok(())
    }
}
