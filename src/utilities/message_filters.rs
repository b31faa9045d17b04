use std::sync::Arc;

use teloxide::types::Message;

use super::bot_state::BotState;
use super::command_context::CommandContext;
use super::command_manager::{CommandInstance, CommandManager};
use super::parsed_command::ParsedCommand;
use super::telegram_utils::{self, CompactUser};

pub enum MessageDestination {
    Command { command: Arc<CommandInstance>, arguments: String, context: CommandContext },
    Photo { context: CommandContext },
    Prompt { text: String, context: CommandContext },
}

pub fn message_destination(
    command_manager: &CommandManager,
    bot_state: Arc<BotState>,
    message: Message,
) -> Option<MessageDestination> {
    if message.forward_origin().is_some() {
        return None; // ignore forwarded messages
    }

    let Some(sender) = &message.from else {
        return None; // ignore messages not sent by users
    };

    if sender.is_bot {
        return None; // ignore bots
    }

    let user = CompactUser::from(sender);

    if message.photo().is_some_and(|photo| !photo.is_empty()) {
        return Some(MessageDestination::Photo {
            context: CommandContext::new(message, user, bot_state),
        });
    }

    let (text, entities) = telegram_utils::get_message_text(&message)?;

    if let Some(parsed_command) = ParsedCommand::parse(text, entities) {
        if let Some(bot_username) = &parsed_command.bot_username {
            let Some(me) = bot_state.me.lock().unwrap().clone() else {
                log::warn!("client user not cached");
                return None; // return if the client user is not cached
            };

            let username = me.username?; // return if the client user has no username

            if !username.eq_ignore_ascii_case(bot_username) {
                return None; // ignore commands sent to other bots
            }
        }

        let Some(command) = command_manager.get_command(&parsed_command.name) else {
            return None; // ignore nonexistent commands
        };

        Some(MessageDestination::Command {
            command,
            arguments: parsed_command.arguments,
            context: CommandContext::new(message, user, bot_state),
        })
    } else {
        if !bot_state.sessions.awaiting_prompt(user.id, message.chat.id.0) {
            return None; // ignore chatter from users without a pending photo
        }

        let text = text.to_string();
        Some(MessageDestination::Prompt {
            text,
            context: CommandContext::new(message, user, bot_state),
        })
    }
}
