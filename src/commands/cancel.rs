use async_trait::async_trait;

use super::{CommandResult, CommandTrait};
use crate::utilities::command_context::CommandContext;

pub struct Cancel;

#[async_trait]
impl CommandTrait for Cancel {
    fn command_names(&self) -> &[&str] {
        &["cancel", "stop"]
    }

    fn description(&self) -> Option<&'static str> {
        Some("abort your running edit")
    }

    async fn execute(&self, ctx: &CommandContext, _: String) -> CommandResult {
        let cancelled = ctx.bot_state.flows.cancel(ctx.user.id);
        let dropped = ctx.bot_state.sessions.remove(ctx.user.id);

        let text = match (cancelled, dropped) {
            (true, _) => "cancelled.",
            (false, true) => "dropped the photo you sent.",
            (false, false) => "there is nothing to cancel.",
        };
        ctx.reply(text.into()).await?;

        Ok(())
    }
}
