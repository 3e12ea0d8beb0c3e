//! Interactive chat with Gemini and OpenAI-compatible model providers.
//!
//! This binary provides a streaming REPL interface on top of the polychat
//! library.
//!
//! # Usage
//!
//! ```bash
//! # Pick a Groq model interactively
//! polychat groq
//!
//! # Only list models whose names contain the words "llama" and "70b"
//! polychat groq llama 70b
//!
//! # Gemini with search and URL context enabled up front
//! polychat --tools gemini flash
//!
//! # Disable colors (useful for piping output)
//! polychat --no-color ollama
//! ```
//!
//! The API key is read from `<PROVIDER>_API_KEY`, e.g. `GEMINI_API_KEY`.
//! Type `/help` in the chat for the available commands.

use std::path::Path;
use std::sync::{Arc, Mutex};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use polychat::chat::{
    ChatArgs, ChatCommand, ChatSession, Config, PlainTextRenderer, Renderer, help_text,
    parse_command,
};
use polychat::models::filter_models;
use polychat::render::ellipsize;
use polychat::{ChatTransport, HttpTransport, Provider, SessionStore};

const USAGE: &str = "polychat [OPTIONS] <provider> [filter]...";

/// File, under the home directory, holding the REPL's line history.
const LINE_HISTORY_FILE: &str = ".ai_cli_history";

/// Main entry point for the polychat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let (args, free) = ChatArgs::from_command_line_relaxed(USAGE);
    let config = match Config::try_from(args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Config error: {err}");
            std::process::exit(2);
        }
    };
    let mut renderer = PlainTextRenderer::with_color(config.use_color);

    let Some((provider_name, filters)) = free.split_first() else {
        print_usage();
        return Ok(());
    };
    let provider: Provider = match provider_name.parse() {
        Ok(provider) => provider,
        Err(err) => {
            renderer.print_error(&err.to_string());
            std::process::exit(1);
        }
    };

    let key_var = provider.api_key_env();
    let api_key = std::env::var(&key_var).unwrap_or_default();
    if let Some(reason) = provider.placeholder_key_reason(&api_key) {
        renderer.print_warning(&format!(
            "Warning: {key_var} {reason}. Requests to {} may be rejected.",
            provider.name().to_uppercase()
        ));
    }

    let mut rl = DefaultEditor::new()?;
    let line_history = dirs::home_dir().map(|home| home.join(LINE_HISTORY_FILE));
    if let Some(path) = &line_history
        && path.exists()
        && let Err(err) = rl.load_history(path)
    {
        tracing::debug!(error = %err, "could not read line history");
    }

    let tools = if provider.supports_tools() && !config.tools {
        match ask_tools(&mut rl, &mut renderer) {
            Some(tools) => tools,
            None => return Ok(()),
        }
    } else {
        config.tools
    };

    let transport = HttpTransport::with_options(
        provider,
        api_key,
        None,
        config.stream_timeout,
        config.list_timeout,
    )?;

    renderer.print_info(&format!(
        "Fetching models for {}...",
        provider.name().to_uppercase()
    ));
    let models = match transport.list_models().await {
        Ok(models) => models,
        Err(err) => {
            renderer.print_error(&format!("Error fetching models: {err}"));
            std::process::exit(1);
        }
    };
    if models.is_empty() {
        renderer.print_error(&format!(
            "No models returned by {}.",
            provider.name().to_uppercase()
        ));
        std::process::exit(1);
    }
    let models = filter_models(models, filters)?;
    if models.is_empty() {
        renderer.print_error(&format!("No models matched filter: {}", filters.join(" ")));
        renderer.print_info(
            "Tip: filters use word-boundary matching ('3' matches 'gpt-3' but not '13b').",
        );
        std::process::exit(1);
    }
    let Some(model) = select_model(&mut rl, &mut renderer, provider, &models) else {
        return Ok(());
    };
    renderer.print_info(&format!("Using model: {model}\n"));

    let store = SessionStore::in_home()?;
    let mut session = ChatSession::new(transport, provider, model, config, store).with_tools(tools);

    let current: Arc<Mutex<Option<CancellationToken>>> = Arc::new(Mutex::new(None));
    let handler_slot = Arc::clone(&current);
    ctrlc::set_handler(move || {
        let token = match handler_slot.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        match token {
            Some(token) => token.cancel(),
            None => {
                eprintln!("\nInterrupted.");
                std::process::exit(130);
            }
        }
    })?;

    print_banner(&mut renderer, &session);

    loop {
        let name = session.image().map(|image| image.file_name());
        let prompt = renderer.user_prompt(name.as_deref());
        let line = match rl.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                renderer.print_info("\nEnding session.");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        };
        let line = line.trim();
        if !line.is_empty() {
            let _ = rl.add_history_entry(line);
        }

        if let Some(command) = parse_command(line) {
            if command == ChatCommand::Quit {
                break;
            }
            handle_command(command, &mut session, &mut renderer, &mut rl);
            continue;
        }

        let token = CancellationToken::new();
        set_token(&current, Some(token.clone()));
        session.send(line, &mut renderer, &token).await;
        set_token(&current, None);
        println!();
    }

    if let Some(path) = &line_history {
        save_line_history(&mut rl, path);
    }
    renderer.print_info("Session ended.");
    Ok(())
}

fn set_token(slot: &Mutex<Option<CancellationToken>>, token: Option<CancellationToken>) {
    match slot.lock() {
        Ok(mut guard) => *guard = token,
        Err(poisoned) => *poisoned.into_inner() = token,
    }
}

fn save_line_history(rl: &mut DefaultEditor, path: &Path) {
    if let Err(err) = rl.save_history(path) {
        tracing::debug!(error = %err, "could not write line history");
    }
}

fn handle_command<T: ChatTransport>(
    command: ChatCommand,
    session: &mut ChatSession<T>,
    renderer: &mut PlainTextRenderer,
    rl: &mut DefaultEditor,
) {
    match command {
        ChatCommand::Help => {
            for line in help_text().lines() {
                println!("    {line}");
            }
        }
        ChatCommand::History => print_history(session, renderer),
        ChatCommand::Save(name) => match session.save(&name) {
            Ok(path) => renderer.print_info(&format!(
                "Session saved -> {} ({} messages)",
                path.display(),
                session.history().len()
            )),
            Err(err) => renderer.print_error(&format!("Error: {err}")),
        },
        ChatCommand::Load(name) => match session.load(&name) {
            Ok(count) => renderer.print_info(&format!(
                "Session loaded <- {} ({count} messages)",
                session.store().path_for(&name).display()
            )),
            Err(err) => renderer.print_error(&format!("Error: {err}")),
        },
        ChatCommand::Sessions => match session.sessions() {
            Ok(names) if names.is_empty() => renderer.print_info("No saved sessions."),
            Ok(names) => {
                renderer.print_info(&format!(
                    "Saved sessions in {}:",
                    session.store().dir().display()
                ));
                for name in names {
                    println!("  {name}");
                }
            }
            Err(err) => renderer.print_error(&format!("Error: {err}")),
        },
        ChatCommand::ClearSessions => clear_sessions(session, renderer, rl),
        ChatCommand::Upload(path) => {
            renderer.print_image_info("Encoding image...");
            match session.attach_image(&path) {
                Ok(image) => {
                    let line = format!(
                        "Attached: {} ({}, {} KB)",
                        image.file_name(),
                        image.mime_type,
                        image.size_bytes / 1024
                    );
                    renderer.print_image_info(&line);
                }
                Err(err) => renderer.print_error(&format!("Error: {err}")),
            }
        }
        ChatCommand::Image => match session.image() {
            Some(image) => {
                let line = format!("Attached: {} ({})", image.path.display(), image.mime_type);
                renderer.print_image_info(&line);
            }
            None => renderer.print_image_info("No image attached."),
        },
        ChatCommand::ClearImage => {
            session.clear_image();
            renderer.print_image_info("Image cleared.");
        }
        ChatCommand::ToggleThinking => {
            let state = if session.toggle_thinking() {
                "enabled"
            } else {
                "disabled"
            };
            renderer.print_info(&format!("Thinking output {state}."));
        }
        ChatCommand::Invalid(message) => renderer.print_warning(&message),
        ChatCommand::Quit => {}
    }
}

fn print_history<T: ChatTransport>(session: &ChatSession<T>, renderer: &mut PlainTextRenderer) {
    let family = session.provider().family();
    let turns = session.history();
    renderer.print_info(&format!("-- History ({} messages) --", turns.len()));
    if turns.is_empty() {
        println!("  (empty)");
    }
    for turn in turns {
        println!(
            "  [{}]  {}",
            turn.role.wire_name(family),
            ellipsize(&turn.display_text(), 500)
        );
    }
    renderer.print_info("--");
}

fn clear_sessions<T: ChatTransport>(
    session: &ChatSession<T>,
    renderer: &mut PlainTextRenderer,
    rl: &mut DefaultEditor,
) {
    let names = match session.sessions() {
        Ok(names) => names,
        Err(err) => {
            renderer.print_error(&format!("Error: {err}"));
            return;
        }
    };
    if names.is_empty() {
        renderer.print_info("No saved sessions to clear.");
        return;
    }
    renderer.print_warning(&format!(
        "This will permanently delete all sessions in {}:",
        session.store().dir().display()
    ));
    for name in &names {
        println!("  {name}");
    }
    let answer = rl.readline("Continue? (y/N): ").unwrap_or_default();
    if answer.trim().eq_ignore_ascii_case("y") {
        match session.clear_sessions() {
            Ok(_) => renderer.print_info("All sessions cleared."),
            Err(err) => renderer.print_error(&format!("Error: {err}")),
        }
    } else {
        renderer.print_info("Cancelled.");
    }
}

/// Asks whether to enable Gemini's built-in tools.  `None` when the user
/// gave up on the prompt.
fn ask_tools(rl: &mut DefaultEditor, renderer: &mut PlainTextRenderer) -> Option<bool> {
    loop {
        let answer = rl
            .readline("Enable Gemini tool calling (web search, URL context)? (y/n): ")
            .ok()?;
        match answer.trim().to_lowercase().as_str() {
            "y" | "1" | "yes" => {
                renderer.print_info("Tool calling enabled.");
                return Some(true);
            }
            "n" | "0" | "no" => {
                renderer.print_info("Tool calling disabled.");
                return Some(false);
            }
            _ => renderer.print_warning("Please enter y or n."),
        }
    }
}

fn select_model(
    rl: &mut DefaultEditor,
    renderer: &mut PlainTextRenderer,
    provider: Provider,
    models: &[String],
) -> Option<String> {
    if let [only] = models {
        renderer.print_info(&format!("Auto-selected: {only}"));
        return Some(only.clone());
    }
    renderer.print_info(&format!(
        "Available models for {}:",
        provider.name().to_uppercase()
    ));
    for (index, model) in models.iter().enumerate() {
        println!("  {:3}. {model}", index + 1);
    }
    loop {
        let choice = rl.readline("Select model number: ").ok()?;
        match choice.trim().parse::<usize>() {
            Ok(n) if (1..=models.len()).contains(&n) => return Some(models[n - 1].clone()),
            _ => renderer.print_warning(&format!(
                "Enter a number between 1 and {}.",
                models.len()
            )),
        }
    }
}

fn print_banner<T: ChatTransport>(renderer: &mut PlainTextRenderer, session: &ChatSession<T>) {
    let config = session.config();
    let provider = session.provider();
    let rule = "-".repeat(85);
    println!("\n{rule}");
    renderer.print_info(&format!(
        "  Provider: {}   Model: {}",
        provider.name().to_uppercase(),
        session.model()
    ));
    renderer.print_info(&format!(
        "  History: last {} turns | Temp: {} | Tokens: {} | TopP: {}",
        config.max_history,
        config.decoding.temperature,
        config.decoding.max_tokens,
        config.decoding.top_p
    ));
    renderer.print_info(&format!(
        "  Max message: {} characters",
        config.max_message_length
    ));
    let system = match (&config.system_prompt, provider.family().has_system_role()) {
        (None, _) => "inactive (empty)",
        (Some(_), true) => "active",
        (Some(_), false) => "prepended to first message",
    };
    renderer.print_info(&format!("  System prompt: {system}"));
    if provider.supports_tools() {
        let tools = if session.tools_enabled() {
            "enabled"
        } else {
            "disabled"
        };
        renderer.print_info(&format!("  Tool calling: {tools}"));
    }
    let thinking = if session.show_thinking() {
        "enabled"
    } else {
        "disabled"
    };
    renderer.print_info(&format!(
        "  Thinking output: {thinking} (toggle: /togglethinking)"
    ));
    renderer.print_info("  Type quit or exit to end | /help for all commands");
    println!("{rule}\n");
}

fn print_usage() {
    let providers: Vec<&str> = Provider::ALL.iter().map(|p| p.name()).collect();
    println!("USAGE: {USAGE}");
    println!();
    println!("Providers: {}", providers.join(", "));
    println!("The API key is read from <PROVIDER>_API_KEY, e.g. GEMINI_API_KEY.");
    println!();
    println!("Filters keep models whose names contain every filter as a word:");
    println!("  polychat groq llama 70b");
    println!();
    for line in help_text().lines() {
        println!("{line}");
    }
}
