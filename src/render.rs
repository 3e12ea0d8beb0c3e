//! Output rendering for streamed chat replies.
//!
//! The stream normalizer and the chat session write everything the user
//! sees through the [`Renderer`] trait, so tests can capture output and the
//! binary can choose between colored and plain terminals.

use std::io::{self, Stdout, Write};

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for bold text.
const ANSI_BOLD: &str = "\x1b[1m";

/// Bright green, used for the reply prefix and reply text.
const ANSI_REPLY: &str = "\x1b[38;5;40m";

/// Soft orange, used for reasoning text.
const ANSI_THINK: &str = "\x1b[38;5;214m";

/// Vivid red, used for errors.
const ANSI_ERROR: &str = "\x1b[38;5;203m";

/// Soft yellow, used for warnings and tool calls.
const ANSI_WARN: &str = "\x1b[38;5;221m";

/// Cyan-blue, used for informational messages.
const ANSI_INFO: &str = "\x1b[38;5;75m";

/// Bright magenta, used for the user prompt.
const ANSI_USER: &str = "\x1b[38;5;199m";

/// Orange, used for image attachment messages.
const ANSI_IMAGE: &str = "\x1b[38;5;208m";

/// Clears the current terminal line and returns the cursor.
const ANSI_CLEAR_LINE: &str = "\x1b[2K\r";

/// Shortens `text` to at most `max` characters, ending in `...` when cut.
pub fn ellipsize(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut short: String = text.chars().take(keep).collect();
    short.push_str("...");
    short
}

/// Trait for rendering a streamed reply and the messages around it.
///
/// Implementations decide how each kind of output looks; callers only say
/// what kind of output it is.
pub trait Renderer: Send {
    /// Called once when a request is sent, before any output arrives.
    fn start_response(&mut self) {}

    /// Called exactly once, before the first text or reasoning token.
    fn begin_reply(&mut self);

    /// Print a chunk of visible reply text.
    fn print_text(&mut self, text: &str);

    /// Print a chunk of reasoning text.
    ///
    /// Consecutive chunks form one reasoning span; the span ends with
    /// [`Renderer::end_reasoning`] or the next visible text.
    fn print_thinking(&mut self, text: &str);

    /// Called when an inline reasoning region opens and reasoning is shown.
    fn start_reasoning(&mut self) {}

    /// Called when an inline reasoning region closes.
    fn end_reasoning(&mut self) {}

    /// Print a tool call the model requested.  The call is never executed.
    fn print_tool_call(&mut self, call: &str);

    /// Print a warning.
    fn print_warning(&mut self, warning: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Called when the stream produced no reply text and no error.
    fn print_empty_response(&mut self) {}

    /// Called when a response is complete.  `produced_output` is false when
    /// nothing was written after [`Renderer::start_response`].
    fn finish_response(&mut self, produced_output: bool);

    /// Called when the user interrupted the request.  `streaming` tells
    /// whether output had started to arrive.
    fn print_interrupted(&mut self, streaming: bool) {
        _ = streaming;
    }
}

/// Plain text renderer with optional ANSI styling.
///
/// Replies go to stdout; warnings and errors go to stderr so they survive
/// redirection of the reply text.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    in_thinking: bool,
    waiting: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            in_thinking: false,
            waiting: false,
        }
    }

    /// Returns the prompt shown before user input.
    pub fn user_prompt(&self, attachment: Option<&str>) -> String {
        let tag = match attachment {
            Some(name) if self.use_color => format!("[{ANSI_IMAGE}image: {name}{ANSI_RESET}] "),
            Some(name) => format!("[image: {name}] "),
            None => String::new(),
        };
        if self.use_color {
            format!("{tag}{ANSI_BOLD}{ANSI_USER}You:{ANSI_RESET} ")
        } else {
            format!("{tag}You: ")
        }
    }

    /// Prints a line in the color reserved for image messages.
    pub fn print_image_info(&mut self, info: &str) {
        self.styled_line(ANSI_IMAGE, info);
    }

    /// Prints a line in the reply color.
    pub fn print_reply_line(&mut self, line: &str) {
        self.styled_line(ANSI_REPLY, line);
    }

    /// Prints a line in the reasoning color.
    pub fn print_reasoning_line(&mut self, line: &str) {
        self.styled_line(ANSI_THINK, line);
    }

    fn styled_line(&mut self, color: &str, line: &str) {
        if self.use_color {
            println!("{color}{line}{ANSI_RESET}");
        } else {
            println!("{line}");
        }
        self.flush();
    }

    /// Flushes stdout to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn paint(&self, color: &'static str) -> &'static str {
        if self.use_color { color } else { "" }
    }

    fn clear_waiting(&mut self) {
        if self.waiting {
            if self.use_color {
                print!("{ANSI_CLEAR_LINE}");
            } else {
                println!();
            }
            self.waiting = false;
        }
    }

    fn reset_thinking(&mut self) {
        if self.in_thinking {
            if self.use_color {
                print!("{ANSI_RESET}");
            }
            self.in_thinking = false;
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn start_response(&mut self) {
        let (reply, info, reset) = (
            self.paint(ANSI_REPLY),
            self.paint(ANSI_INFO),
            self.paint(ANSI_RESET),
        );
        print!("{reply}AI:{reset} {info}(waiting...){reset}");
        self.waiting = true;
        self.flush();
    }

    fn begin_reply(&mut self) {
        self.clear_waiting();
        let (reply, reset) = (self.paint(ANSI_REPLY), self.paint(ANSI_RESET));
        print!("{reply}AI:{reset}  ");
        self.flush();
    }

    fn print_text(&mut self, text: &str) {
        self.reset_thinking();
        print!("{}{text}", self.paint(ANSI_REPLY));
        self.flush();
    }

    fn print_thinking(&mut self, text: &str) {
        if !self.in_thinking {
            print!("{}[Thinking] ", self.paint(ANSI_THINK));
            self.in_thinking = true;
        }
        print!("{}{text}", self.paint(ANSI_THINK));
        self.flush();
    }

    fn start_reasoning(&mut self) {
        print!("{}<think", self.paint(ANSI_THINK));
        self.in_thinking = true;
        self.flush();
    }

    fn end_reasoning(&mut self) {
        self.in_thinking = false;
        print!("{}\n{}", self.paint(ANSI_RESET), self.paint(ANSI_REPLY));
        self.flush();
    }

    fn print_tool_call(&mut self, call: &str) {
        self.reset_thinking();
        let (warn, reset) = (self.paint(ANSI_WARN), self.paint(ANSI_RESET));
        println!("\n{warn}Tool call requested:{reset}");
        println!("{call}");
        println!("{warn}(Tool calls are not executed and no tool output is returned to the model.){reset}");
        self.flush();
    }

    fn print_warning(&mut self, warning: &str) {
        let (warn, reset) = (self.paint(ANSI_WARN), self.paint(ANSI_RESET));
        eprintln!("{warn}{warning}{reset}");
    }

    fn print_error(&mut self, error: &str) {
        self.clear_waiting();
        self.reset_thinking();
        let (color, reset) = (self.paint(ANSI_ERROR), self.paint(ANSI_RESET));
        eprintln!("{color}{error}{reset}");
    }

    fn print_info(&mut self, info: &str) {
        self.styled_line(ANSI_INFO, info);
    }

    fn print_empty_response(&mut self) {
        self.clear_waiting();
        let (reply, info, reset) = (
            self.paint(ANSI_REPLY),
            self.paint(ANSI_INFO),
            self.paint(ANSI_RESET),
        );
        println!("{reply}AI:{reset} {info}(empty response){reset}");
        self.flush();
    }

    fn finish_response(&mut self, produced_output: bool) {
        self.clear_waiting();
        self.in_thinking = false;
        if produced_output {
            println!("{}", self.paint(ANSI_RESET));
        }
        self.flush();
    }

    fn print_interrupted(&mut self, streaming: bool) {
        self.clear_waiting();
        self.reset_thinking();
        let (warn, reset) = (self.paint(ANSI_WARN), self.paint(ANSI_RESET));
        if streaming {
            println!("\n{warn}(Stream interrupted by user){reset}");
        } else {
            println!("\n{warn}(Request interrupted by user){reset}");
        }
        self.flush();
    }
}
