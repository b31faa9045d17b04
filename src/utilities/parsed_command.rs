use teloxide::types::{MessageEntity, MessageEntityKind};

pub struct ParsedCommand {
    pub name: String,
    pub bot_username: Option<String>,
    pub arguments: String,
}

impl ParsedCommand {
    pub fn parse(text: &str, entities: &[MessageEntity]) -> Option<Self> {
        let entity = entities.iter().find(|entity| {
            matches!(entity.kind, MessageEntityKind::BotCommand) && entity.offset == 0
        })?;

        let end = utf16_to_byte_index(text, entity.length)?;
        let command = text.get(1..end)?;

        let (command_name, username) =
            command.split_once('@').map_or((command, None), |parts| (parts.0, Some(parts.1)));

        let arguments = text[end..].trim_ascii_start().into();

        Some(Self {
            name: command_name.to_lowercase(),
            bot_username: username.map(str::to_string),
            arguments,
        })
    }
}

/// entity offsets count UTF-16 code units
fn utf16_to_byte_index(text: &str, units: usize) -> Option<usize> {
    let mut consumed = 0;
    for (index, ch) in text.char_indices() {
        if consumed == units {
            return Some(index);
        }
        consumed += ch.len_utf16();
    }

    (consumed == units).then_some(text.len())
}
