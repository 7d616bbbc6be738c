use crate::command::model::{Command, CommandType};
use tracing::debug;

const TOKEN_PREFIX: &str = "token:";
const COMMAND_PREFIX: &str = "cmd:";

/// Split an optional leading `token:<token>` off a message
///
/// Returns the token (if any) and the rest of the message with leading
/// whitespace removed. The whole message is trimmed first.
pub fn split_token_prefix(message: &str) -> (Option<&str>, &str) {
    let message = message.trim();

    if let Some(rest) = message.strip_prefix(TOKEN_PREFIX) {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        if end > 0 {
            return (Some(&rest[..end]), rest[end..].trim_start());
        }
    }

    (None, message)
}

/// Map a verb to a command type; anything unmapped is CUSTOM
fn map_verb(verb: &str) -> CommandType {
    verb.parse().unwrap_or(CommandType::Custom)
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Match `cmd:<ws>*<verb><ws>*<remainder>` and return verb and remainder
fn match_command(body: &str) -> Option<(&str, &str)> {
    let rest = body.strip_prefix(COMMAND_PREFIX)?.trim_start();

    let verb_len = rest.find(|c: char| !is_word_char(c)).unwrap_or(rest.len());
    if verb_len == 0 {
        return None;
    }

    let (verb, remainder) = rest.split_at(verb_len);
    let remainder = remainder.trim_start();

    // The payload is a single line
    if remainder.contains(['\n', '\r']) {
        return None;
    }

    Some((verb, remainder.trim_end()))
}

/// Turns inbound message text into pending commands
#[derive(Debug, Clone)]
pub struct CommandParser {
    origin_address: String,
}

impl CommandParser {
    /// Commands produced by this parser carry `origin_address` as sender
    pub fn new(origin_address: impl Into<String>) -> Self {
        Self {
            origin_address: origin_address.into(),
        }
    }

    pub fn origin_address(&self) -> &str {
        &self.origin_address
    }

    /// Parse a message, returning `None` when it is not a command
    pub fn parse(&self, message: &str) -> Option<Command> {
        let (_, body) = split_token_prefix(message);
        let (verb, payload) = match_command(body)?;

        let command_type = map_verb(verb);
        if command_type == CommandType::Custom && !verb.eq_ignore_ascii_case("custom") {
            debug!(verb, "Unmapped verb, treating as custom command");
        }

        Some(Command::new(
            "cmd",
            command_type,
            payload,
            self.origin_address.as_str(),
        ))
    }
}
