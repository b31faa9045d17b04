use std::sync::Arc;

use teloxide::types::CallbackQuery;

use crate::apis::telegram::TelegramResult;
use crate::editing::variant::GenerationVariant;
use crate::utilities::bot_state::BotState;
use crate::utilities::telegram_utils::CompactUser;

pub async fn variant_choice(bot_state: Arc<BotState>, query: CallbackQuery) {
    if let Err(err) = handle_variant_choice(&bot_state, &query).await {
        log::error!("Bot API error occurred while handling a variant choice: {err}");
    }
}

async fn handle_variant_choice(bot_state: &BotState, query: &CallbackQuery) -> TelegramResult<()> {
    let user = CompactUser::from(&query.from);
    let choice = query.data.as_deref().and_then(GenerationVariant::from_callback_data);

    let notice = match choice {
        None => Some("this option no longer exists."),
        Some((_, owner)) if owner != user.id => Some("this menu belongs to someone else."),
        Some((variant, _)) if !bot_state.providers.supports(variant) => {
            Some("this option is not available.")
        }
        Some((variant, _)) if !bot_state.sessions.select_variant(user.id, variant) => {
            Some("there is no photo waiting for you, send one first.")
        }
        Some(_) => None,
    };

    bot_state.api.answer_query(query, notice.map(Into::into)).await?;

    let (Some((variant, _)), None, Some(message)) = (choice, notice, &query.message) else {
        return Ok(());
    };

    log::info!("{user} selected {variant}");
    bot_state
        .api
        .edit_text(
            message.chat().id,
            message.id(),
            format!("{variant} selected. now send a prompt describing the edit."),
        )
        .await
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::editing::session::PendingRequest;
    use crate::utilities::test_fixtures::{self, Sent, TestBot};

    fn waiting_for_variant(bot: &TestBot, user_id: u64) {
        let source = test_fixtures::source_image(1000, 800);
        bot.state.sessions.put(PendingRequest::new(user_id, 1, source));
    }

    #[tokio::test]
    async fn test_owner_selects_variant() {
        let bot = TestBot::serving_photos();
        waiting_for_variant(&bot, 1);

        let query = test_fixtures::callback_query(1, 1, "variant:dall_e_edit:1");
        variant_choice(bot.state.clone(), query).await;

        assert_eq!(
            bot.telegram.sent(),
            [
                Sent::Answer(None),
                Sent::Edit(
                    "DALL·E inpainting selected. now send a prompt describing the edit.".into()
                ),
            ]
        );
        assert!(bot.state.sessions.awaiting_prompt(1, 1));
    }

    #[tokio::test]
    async fn test_menu_of_another_user_is_refused() {
        let bot = TestBot::serving_photos();
        waiting_for_variant(&bot, 1);
        waiting_for_variant(&bot, 2);

        let query = test_fixtures::callback_query(2, 1, "variant:flux_kontext:1");
        variant_choice(bot.state.clone(), query).await;

        assert_eq!(
            bot.telegram.sent(),
            [Sent::Answer(Some("this menu belongs to someone else.".into()))]
        );
        assert!(!bot.state.sessions.awaiting_prompt(1, 1));
        assert!(!bot.state.sessions.awaiting_prompt(2, 1));
    }

    #[tokio::test]
    async fn test_stale_options_are_answered() {
        let bot = TestBot::serving_photos();

        let query = test_fixtures::callback_query(1, 1, "variant:outpaint:1");
        variant_choice(bot.state.clone(), query).await;

        let query = test_fixtures::callback_query(1, 1, "variant:flux_kontext:1");
        variant_choice(bot.state.clone(), query).await;

        assert_eq!(
            bot.telegram.sent(),
            [
                Sent::Answer(Some("this option no longer exists.".into())),
                Sent::Answer(Some("there is no photo waiting for you, send one first.".into())),
            ]
        );
    }
}
