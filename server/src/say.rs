//! Interpretation of chat text sent with the Say packet.

use shared::game::{is_valid_say_text, GameMessage};

/// What a line of chat asks the server to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SayAction {
    /// Plain speech, broadcast to the map.
    Speak(String),
    /// `/me <action>`.
    Emote(String),
    /// `/who`.
    Who,
    /// Reply to the speaker only.
    Reply(GameMessage, Vec<String>),
}

pub fn parse_say(text: &str) -> SayAction {
    if !is_valid_say_text(text) {
        return SayAction::Reply(GameMessage::InvalidSayText, Vec::new());
    }

    let Some(command) = text.strip_prefix('/') else {
        return SayAction::Speak(text.to_string());
    };

    let (name, rest) = match command.split_once(' ') {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };

    match name.to_ascii_lowercase().as_str() {
        "who" => SayAction::Who,
        "me" if !rest.is_empty() => SayAction::Emote(rest.to_string()),
        _ => SayAction::Reply(GameMessage::UnknownCommand, vec![format!("/{name}")]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text() {
        assert_eq!(parse_say("hello"), SayAction::Speak("hello".into()));
    }

    #[test]
    fn test_commands() {
        assert_eq!(parse_say("/who"), SayAction::Who);
        assert_eq!(parse_say("/WHO"), SayAction::Who);
        assert_eq!(parse_say("/me waves"), SayAction::Emote("waves".into()));
        assert_eq!(
            parse_say("/me"),
            SayAction::Reply(GameMessage::UnknownCommand, vec!["/me".into()])
        );
        assert_eq!(
            parse_say("/dance now"),
            SayAction::Reply(GameMessage::UnknownCommand, vec!["/dance".into()])
        );
    }

    #[test]
    fn test_invalid_characters() {
        assert_eq!(
            parse_say("bad\ttext"),
            SayAction::Reply(GameMessage::InvalidSayText, Vec::new())
        );
    }
}
