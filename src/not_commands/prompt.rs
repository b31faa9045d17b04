use crate::commands::CommandResult;
use crate::editing::launch;
use crate::utilities::command_context::CommandContext;
use crate::utilities::{command_dispatcher, text_utils};

pub async fn prompt(ctx: CommandContext, text: String) {
    if let Err(err) = handle_prompt(&ctx, text).await {
        command_dispatcher::report_command_error("prompt", &ctx, err).await;
    }
}

async fn handle_prompt(ctx: &CommandContext, text: String) -> CommandResult {
    let text = text.trim();
    if let Some(issue) = text_utils::check_prompt(text) {
        log::info!("prompt rejected: {issue:?}");
        return Err(format!("{issue} send a different prompt.").into());
    }

    let Some(mut pending) = ctx.bot_state.sessions.take(ctx.user.id) else {
        return Err("this photo has expired, send it again.".into());
    };

    pending.prompt = Some(text.into());
    let Some(job) = pending.into_job() else {
        return Err("choose an editing mode first.".into());
    };

    launch::launch(ctx, job).await
}
