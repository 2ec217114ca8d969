use crate::history::ConversationStore;
use crate::models::chat::{ Message, ResponseMode };
use super::error::ChatError;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Requesting,
    Cancelling,
}

#[derive(Debug, Clone)]
pub(crate) struct ActiveRequest {
    pub(crate) id: u64,
    pub(crate) token: CancellationToken,
}

/// Non-blocking notification shown to the user. A newer alert replaces the
/// current one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub title: String,
    pub message: String,
}

impl From<&ChatError> for Alert {
    fn from(err: &ChatError) -> Self {
        match err {
            ChatError::Unavailable(reason) =>
                Alert {
                    title: "Model Unavailable".to_string(),
                    message: reason.to_string(),
                },
            ChatError::GenerationFailed(message) =>
                Alert {
                    title: "Something Went Wrong".to_string(),
                    message: message.clone(),
                },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    MessageAppended(Message),
    ContentReplaced {
        message_id: Uuid,
        content: String,
    },
    PhaseChanged(SessionPhase),
    ModeChanged(ResponseMode),
    DraftChanged(String),
    AlertRaised(Alert),
    AlertDismissed,
    ConversationReset,
}

/// Everything the chat screen renders. Owned by the session and only changed
/// through it.
#[derive(Debug, Clone)]
pub struct ChatState {
    pub(crate) conversation: ConversationStore,
    pub(crate) draft: String,
    pub(crate) mode: ResponseMode,
    pub(crate) active: Option<ActiveRequest>,
    pub(crate) alert: Option<Alert>,
    pub(crate) request_seq: u64,
}

impl ChatState {
    pub(crate) fn new(greeting: String, mode: ResponseMode) -> Self {
        Self {
            conversation: ConversationStore::new(greeting),
            draft: String::new(),
            mode,
            active: None,
            alert: None,
            request_seq: 0,
        }
    }

    pub fn conversation(&self) -> &ConversationStore {
        &self.conversation
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn mode(&self) -> ResponseMode {
        self.mode
    }

    pub fn alert(&self) -> Option<&Alert> {
        self.alert.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    pub fn phase(&self) -> SessionPhase {
        match &self.active {
            None => SessionPhase::Idle,
            Some(active) if active.token.is_cancelled() => SessionPhase::Cancelling,
            Some(_) => SessionPhase::Requesting,
        }
    }

    /// Send is enabled for a non-blank draft, and doubles as stop while busy.
    pub fn can_send(&self) -> bool {
        self.is_busy() || is_valid_input(&self.draft)
    }

    /// Id of the message the view keeps scrolled into view.
    pub fn scroll_anchor(&self) -> Option<Uuid> {
        self.conversation.last().map(|m| m.id)
    }

    pub(crate) fn is_current(&self, request_id: u64) -> bool {
        matches!(&self.active, Some(active) if active.id == request_id)
    }
}

pub fn is_valid_input(text: &str) -> bool {
    !text.trim().is_empty()
}
