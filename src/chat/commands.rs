//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to control the chat session without sending messages
//! to the model.

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Show the conversation so far.
    History,

    /// Save the conversation as a named session.
    Save(String),

    /// Replace the conversation with a saved session.
    Load(String),

    /// List saved sessions.
    Sessions,

    /// Delete every saved session (after confirmation).
    ClearSessions,

    /// Attach an image to the next message.
    Upload(String),

    /// Show the attached image.
    Image,

    /// Remove the attached image.
    ClearImage,

    /// Toggle reasoning display.
    ToggleThinking,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it
/// should be sent as a message.  The bare words `quit` and `exit` also end
/// the session.
///
/// # Examples
///
/// ```
/// # use polychat::chat::parse_command;
/// assert!(parse_command("/history").is_some());
/// assert!(parse_command("exit").is_some());
/// assert!(parse_command("Hello there!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    if input.eq_ignore_ascii_case("quit") || input.eq_ignore_ascii_case("exit") {
        return Some(ChatCommand::Quit);
    }
    let rest = input.strip_prefix('/')?;

    let (command, argument) = match rest.split_once(char::is_whitespace) {
        Some((command, argument)) => (command, Some(argument.trim())),
        None => (rest, None),
    };
    let command = command.to_lowercase();
    let argument = argument.filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "history" => ChatCommand::History,
        "save" => match argument {
            Some(name) => ChatCommand::Save(name.to_string()),
            None => ChatCommand::Invalid("Usage: /save <name>".to_string()),
        },
        "load" => match argument {
            Some(name) => ChatCommand::Load(name.to_string()),
            None => ChatCommand::Invalid("Usage: /load <name>".to_string()),
        },
        "sessions" => ChatCommand::Sessions,
        "clear" => ChatCommand::ClearSessions,
        "upload" => match argument {
            Some(path) => ChatCommand::Upload(path.to_string()),
            None => ChatCommand::Invalid("Usage: /upload <image_path>".to_string()),
        },
        "image" => ChatCommand::Image,
        "clearimage" => ChatCommand::ClearImage,
        "togglethinking" => ChatCommand::ToggleThinking,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" => ChatCommand::Quit,
        _ => ChatCommand::Invalid(format!(
            "Unknown command '/{command}'. Type /help for a list."
        )),
    };

    Some(result)
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /history               Show conversation
  /save <name>           Save session (~/.chat_sessions/<name>.json)
  /load <name>           Load a saved session
  /sessions              List saved sessions
  /clear                 Delete all saved sessions
  /upload <path>         Attach an image to your next message
  /image                 Show attached image
  /clearimage            Remove attached image
  /togglethinking        Toggle reasoning display
  /help                  Show this help
  quit / exit            End session"#
}
