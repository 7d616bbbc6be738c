use crate::command::Command;

/// Output excerpt length for successful results
pub const SUCCESS_EXCERPT_CHARS: usize = 500;
/// Error and output excerpt length for failed results
pub const FAILURE_EXCERPT_CHARS: usize = 300;

/// Render a settled command as a short chat notification
///
/// Returns `None` while the command has no result.
pub fn format_result(command: &Command) -> Option<String> {
    let result = command.result()?;

    let glyph = if result.success { "✅" } else { "❌" };
    let seconds = result.duration_ms as f64 / 1000.0;

    let mut message = format!(
        "{} {}: {}\n⏱️ {:.1}s",
        glyph,
        command.command_type().as_str().to_uppercase(),
        command.payload(),
        seconds
    );

    if result.success {
        if !result.output.is_empty() {
            message.push_str("\n📋 ");
            message.push_str(&excerpt(&result.output, SUCCESS_EXCERPT_CHARS));
        }
    } else {
        if let Some(error) = &result.error {
            message.push_str("\n❌ ");
            message.push_str(&excerpt(error, FAILURE_EXCERPT_CHARS));
        }
        if !result.output.is_empty() {
            message.push_str("\n📋 ");
            message.push_str(&excerpt(&result.output, FAILURE_EXCERPT_CHARS));
        }
    }

    Some(message)
}

/// First `max_chars` characters of `text`, with `...` when cut
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
