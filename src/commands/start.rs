use async_trait::async_trait;

use super::{CommandResult, CommandTrait};
use crate::utilities::command_context::CommandContext;

pub struct Start;

#[async_trait]
impl CommandTrait for Start {
    fn command_names(&self) -> &[&str] {
        &["start", "help"]
    }

    async fn execute(&self, ctx: &CommandContext, _: String) -> CommandResult {
        ctx.reply(
            concat!(
                "send me a photo to edit it.\n",
                "with a caption, the caption is used as the prompt right away.\n",
                "without one, pick an editing mode and send the prompt afterwards.\n\n",
                "/generate <prompt> creates a new image from text.\n",
                "/cancel aborts the running edit."
            )
            .into(),
        )
        .await?;

        Ok(())
    }
}
