//! Console command adapter.
//!
//! A thin stand-in for a chat-platform integration: lines on stdin become
//! controller operations, replies and reminders print to stdout.

use async_trait::async_trait;

use bosswatch_agent::{Transport, TransportError};

/// One parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `<alias> d [time]`: report a death, optionally backdated. `suffixed`
    /// marks the `<alias>d` form, where the trailing marker may still belong
    /// to the alias itself.
    Death {
        alias: String,
        time: String,
        suffixed: bool,
    },
    /// `add <alias> <time>`: arm a timer at an explicit spawn time.
    Add { alias: String, time: String },
    /// `list`: show visible timers.
    List,
    /// `cancel <alias>`: drop this scope's timer for the entity.
    Cancel { alias: String },
    /// `reset`: clear every timer.
    Reset,
    /// `quit` / `exit`: shut the daemon down.
    Quit,
}

/// Parse one input line. None for blank lines and anything unrecognized.
pub fn parse(line: &str) -> Option<Command> {
    let mut tokens = line.split_whitespace();
    let first = tokens.next()?;

    match first.to_lowercase().as_str() {
        "list" => Some(Command::List),
        "reset" => Some(Command::Reset),
        "quit" | "exit" => Some(Command::Quit),
        "cancel" => {
            let alias = tokens.next()?;
            Some(Command::Cancel {
                alias: alias.to_string(),
            })
        }
        "add" => {
            let alias = tokens.next()?;
            let time: Vec<&str> = tokens.collect();
            if time.is_empty() {
                return None;
            }
            Some(Command::Add {
                alias: alias.to_string(),
                time: time.join(" "),
            })
        }
        _ => {
            // `<alias> d [time]`, or the suffixed `<alias>d [time]` form. The
            // suffixed alias is passed through whole; the executor tries it
            // as-is before stripping the marker (longest match first).
            let rest: Vec<&str> = tokens.collect();
            if let Some((marker, time)) = rest.split_first()
                && marker.eq_ignore_ascii_case("d")
            {
                return Some(Command::Death {
                    alias: first.to_string(),
                    time: time.join(" "),
                    suffixed: false,
                });
            }
            if first.len() > 1 && first.to_lowercase().ends_with('d') {
                return Some(Command::Death {
                    alias: first.to_string(),
                    time: rest.join(" "),
                    suffixed: true,
                });
            }
            None
        }
    }
}

/// Prints outbound messages instead of delivering them to a chat platform.
pub struct ConsoleTransport;

#[async_trait]
impl Transport for ConsoleTransport {
    async fn send(&self, destination: &str, text: &str) -> Result<(), TransportError> {
        println!("[{}] {}", destination, text);
        Ok(())
    }
}
