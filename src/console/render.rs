use crate::models::chat::Message;
use crate::session::{ Alert, SessionEvent, SessionPhase };
use uuid::Uuid;

pub const USER_PREFIX: &str = "you   › ";
pub const ASSISTANT_PREFIX: &str = "buddy › ";

pub fn render_message(message: &Message) -> String {
    let prefix = if message.is_from_user { USER_PREFIX } else { ASSISTANT_PREFIX };
    format!("{}{}", prefix, message.content)
}

pub fn render_alert(alert: &Alert) -> String {
    format!("! {}: {}", alert.title, alert.message)
}

/// How to move the terminal from the text already printed to the next
/// snapshot.
#[derive(Debug, PartialEq, Eq)]
pub enum StreamDelta<'a> {
    Append(&'a str),
    Rewrite(&'a str),
}

pub fn stream_delta<'a>(printed: &str, next: &'a str) -> StreamDelta<'a> {
    match next.strip_prefix(printed) {
        Some(suffix) => StreamDelta::Append(suffix),
        None => StreamDelta::Rewrite(next),
    }
}

struct LiveReply {
    message_id: Uuid,
    printed: String,
    started: bool,
}

/// Turns session events into terminal output. Assistant replies are printed
/// in place as snapshots arrive. User turns are not echoed since the terminal
/// already shows what was typed.
#[derive(Default)]
pub struct Renderer {
    live: Option<LiveReply>,
    stopping: bool,
}

impl Renderer {
    pub fn apply(&mut self, event: &SessionEvent) -> String {
        match event {
            SessionEvent::MessageAppended(message) if !message.is_from_user => {
                self.live = Some(LiveReply {
                    message_id: message.id,
                    printed: message.content.clone(),
                    started: false,
                });
                String::new()
            }
            SessionEvent::ContentReplaced { message_id, content } => {
                let Some(live) = self.live.as_mut().filter(|l| l.message_id == *message_id) else {
                    return String::new();
                };
                let out = if !live.started {
                    format!("{}{}", ASSISTANT_PREFIX, content)
                } else {
                    match stream_delta(&live.printed, content) {
                        StreamDelta::Append(suffix) => suffix.to_string(),
                        StreamDelta::Rewrite(text) => format!("\n{}{}", ASSISTANT_PREFIX, text),
                    }
                };
                live.started = true;
                live.printed = content.clone();
                out
            }
            SessionEvent::PhaseChanged(SessionPhase::Cancelling) => {
                self.stopping = true;
                String::new()
            }
            SessionEvent::PhaseChanged(SessionPhase::Idle) => {
                let started = self.live.take().map_or(false, |l| l.started);
                let stopped = std::mem::take(&mut self.stopping);
                match (started, stopped) {
                    (true, true) => " [stopped]\n".to_string(),
                    (true, false) => "\n".to_string(),
                    (false, true) => "[stopped]\n".to_string(),
                    (false, false) => String::new(),
                }
            }
            SessionEvent::ModeChanged(mode) => format!("mode: {}\n", mode),
            SessionEvent::AlertRaised(alert) => format!("{}\n", render_alert(alert)),
            SessionEvent::ConversationReset => {
                self.live = None;
                self.stopping = false;
                "--- chat cleared ---\n".to_string()
            }
            _ => String::new(),
        }
    }
}
