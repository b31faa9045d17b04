use teloxide::types::ChatAction;

use super::flow::{self, EditJob};
use super::tasks::FlowBusy;
use crate::commands::{CommandError, CommandResult};
use crate::utilities::command_context::CommandContext;

pub const FLOW_BUSY: &str = "still working on your previous image. send /cancel to abort it.";

/// shows a status message, runs the user's flow and waits for it
pub async fn launch(ctx: &CommandContext, job: EditJob) -> CommandResult {
    let variant = job.variant;
    if !ctx.bot_state.providers.supports(variant) {
        return Err(CommandError::Custom(format!("{variant} is not available on this bot.")));
    }

    if ctx.bot_state.flows.is_running(ctx.user.id) {
        return Err(FLOW_BUSY.into());
    }

    // sent before the flow can post anything
    let status_message = match ctx.reply(format!("processing with {variant}…")).await {
        Ok(message_id) => Some(message_id),
        Err(err) => {
            log::warn!("failed to send the status message: {err}");
            None
        }
    };
    if let Err(err) = ctx.send_action(ChatAction::UploadPhoto).await {
        log::warn!("failed to send a chat action: {err}");
    }

    let flow_ctx = ctx.clone();
    let spawned = ctx.bot_state.flows.spawn(ctx.user.id, async move {
        let settings = flow_ctx.bot_state.config.flow_settings();
        flow::run(flow_ctx.collaborators(), settings, flow_ctx.user.id, job).await
    });

    let result = match spawned {
        Ok(handle) => {
            log::info!("started {variant} for {} in {}", ctx.user, ctx.chat);

            match handle.await {
                Ok(Ok(())) => log::info!("finished {variant} for {}", ctx.user),
                Ok(Err(_)) => (),
                Err(err) if err.is_cancelled() => {
                    log::info!("{variant} for {} was cancelled", ctx.user);
                }
                Err(err) => log::error!("{variant} flow for {} panicked: {err}", ctx.user),
            }

            Ok(())
        }
        Err(FlowBusy) => Err(CommandError::Custom(FLOW_BUSY.into())),
    };

    if let Some(message_id) = status_message {
        ctx.delete_message(message_id).await?;
    }

    result
}
