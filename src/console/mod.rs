pub mod render;

use crate::models::chat::ResponseMode;
use crate::session::{ ChatSession, SessionEvent };
use self::render::{ render_message, Renderer };

use log::{ debug, warn };
use std::error::Error;
use std::io::Write;
use tokio::io::{ AsyncBufReadExt, BufReader };
use tokio::sync::broadcast::error::RecvError;

pub const HELP: &str = "\
Type a message and press Enter to send it. Enter while a reply is running stops it.
  /stream    deliver replies as they are generated
  /oneshot   deliver replies once they are complete
  /mode      toggle between the two
  /stop      stop the running reply
  /clear     clear the chat
  /history   print the conversation
  /help      show this help
  /quit      exit";

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Send(String),
    Mode(ResponseMode),
    ToggleMode,
    Stop,
    Clear,
    History,
    Help,
    Quit,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Command {
        let trimmed = line.trim();
        if !trimmed.starts_with('/') {
            return Command::Send(line.to_string());
        }
        match trimmed {
            "/stream" | "/streaming" => Command::Mode(ResponseMode::Streaming),
            "/oneshot" | "/respond" => Command::Mode(ResponseMode::OneShot),
            "/mode" => Command::ToggleMode,
            "/stop" => Command::Stop,
            "/clear" => Command::Clear,
            "/history" => Command::History,
            "/help" => Command::Help,
            "/quit" | "/exit" => Command::Quit,
            other => Command::Unknown(other.to_string()),
        }
    }
}

fn print_flush(text: &str) {
    if text.is_empty() {
        return;
    }
    let mut stdout = std::io::stdout();
    let _ = stdout.write_all(text.as_bytes());
    let _ = stdout.flush();
}

fn print_conversation(session: &ChatSession) {
    let state = session.snapshot();
    for message in state.conversation().visible() {
        println!("{}", render_message(message));
    }
}

fn send(session: &ChatSession, text: String) {
    session.set_draft(text);
    if !session.can_send() {
        return;
    }
    let turn = session.clone();
    tokio::spawn(async move {
        match turn.send_draft().await {
            Ok(outcome) => debug!("Turn finished: {:?}", outcome),
            // Already shown to the user through the alert event.
            Err(e) => debug!("Turn failed: {}", e),
        }
    });
}

/// Interactive chat on stdin/stdout until `/quit` or end of input.
pub async fn run_console(session: ChatSession) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut events = session.events();
    let mut renderer = Renderer::default();

    println!("Chatting with {} ({} mode). Type /help for commands.", session.backend_name(), session.mode());
    print_conversation(&session);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match Command::parse(&line) {
                    Command::Send(text) => send(&session, text),
                    Command::Mode(mode) => session.set_mode(mode),
                    Command::ToggleMode => {
                        session.toggle_mode();
                    }
                    Command::Stop => {
                        if !session.stop() {
                            println!("Nothing to stop.");
                        }
                    }
                    Command::Clear => session.reset_conversation(),
                    Command::History => print_flush(&session.history()),
                    Command::Help => println!("{}", HELP),
                    Command::Quit => break,
                    Command::Unknown(cmd) => println!("Unknown command {}. Type /help.", cmd),
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        print_flush(&renderer.apply(&event));
                        if event == SessionEvent::ConversationReset {
                            print_conversation(&session);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Console fell behind by {} session events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    session.stop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_are_sent_verbatim() {
        assert_eq!(Command::parse("  hello "), Command::Send("  hello ".to_string()));
        assert_eq!(Command::parse(""), Command::Send(String::new()));
    }

    #[test]
    fn slash_commands_are_recognised() {
        assert_eq!(Command::parse("/oneshot"), Command::Mode(ResponseMode::OneShot));
        assert_eq!(Command::parse(" /stream "), Command::Mode(ResponseMode::Streaming));
        assert_eq!(Command::parse("/mode"), Command::ToggleMode);
        assert_eq!(Command::parse("/clear"), Command::Clear);
        assert_eq!(Command::parse("/exit"), Command::Quit);
        assert_eq!(Command::parse("/nope"), Command::Unknown("/nope".to_string()));
    }
}
