use async_trait::async_trait;

use super::{CommandError, CommandResult, CommandTrait};
use crate::editing::flow::EditJob;
use crate::editing::launch;
use crate::editing::variant::GenerationVariant;
use crate::utilities::command_context::CommandContext;
use crate::utilities::rate_limit::RateLimiter;
use crate::utilities::text_utils;

pub struct Generate;

#[async_trait]
impl CommandTrait for Generate {
    fn command_names(&self) -> &[&str] {
        &["generate", "g", "dalle"]
    }

    fn description(&self) -> Option<&'static str> {
        Some("generate an image using DALL·E 3")
    }

    fn rate_limit(&self) -> RateLimiter<u64> {
        RateLimiter::new(3, 60)
    }

    async fn execute(&self, ctx: &CommandContext, arguments: String) -> CommandResult {
        let prompt = arguments.trim();
        if prompt.is_empty() {
            return Err(CommandError::Custom("missing prompt to generate.".into()));
        }

        if let Some(issue) = text_utils::check_prompt(prompt) {
            log::info!("prompt rejected: {issue:?}");
            return Err(CommandError::Custom(issue.into()));
        }

        let job = EditJob {
            variant: GenerationVariant::DallEGenerate,
            prompt: prompt.into(),
            source: None,
        };

        launch::launch(ctx, job).await
    }
}
