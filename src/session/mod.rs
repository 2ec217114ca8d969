pub mod error;
pub mod state;

pub use error::{ ChatError, SubmitOutcome };
pub use state::{ is_valid_input, Alert, ChatState, SessionEvent, SessionPhase };

use crate::history::format_history;
use crate::llm::chat::{ BackendError, TextBackend };
use crate::llm::GenerationOptions;
use crate::models::chat::{ Message, ResponseMode };
use self::state::ActiveRequest;

use futures::StreamExt;
use log::{ debug, error, info, warn };
use std::sync::Arc;
use tokio::sync::{ broadcast, watch };
use tokio_util::sync::CancellationToken;

const EVENT_CAPACITY: usize = 256;

/// Drives one chat screen: owns the conversation and session state, runs at
/// most one generation at a time against the backend and publishes every
/// change.
///
/// All mutation goes through the watch sender's lock, so clones of the
/// session can be used from any task. A second send while a turn is running
/// stops that turn instead of starting another.
#[derive(Clone)]
pub struct ChatSession {
    backend: Arc<dyn TextBackend>,
    options: Arc<GenerationOptions>,
    state: Arc<watch::Sender<ChatState>>,
    events: broadcast::Sender<SessionEvent>,
}

/// Marks a running turn. Dropping it cancels the request and, if the turn is
/// still the active one, returns the session to idle.
struct RequestGuard<'a> {
    session: &'a ChatSession,
    id: u64,
    token: CancellationToken,
}

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        self.token.cancel();
        let id = self.id;
        self.session.mutate(|state, events| {
            if state.is_current(id) {
                state.active = None;
                events.push(SessionEvent::PhaseChanged(SessionPhase::Idle));
            }
        });
    }
}

impl ChatSession {
    pub fn new(
        backend: Arc<dyn TextBackend>,
        greeting: impl Into<String>,
        mode: ResponseMode,
        options: GenerationOptions
    ) -> Self {
        let (state, _) = watch::channel(ChatState::new(greeting.into(), mode));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            backend,
            options: Arc::new(options),
            state: Arc::new(state),
            events,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatState> {
        self.state.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> ChatState {
        self.state.borrow().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.state.borrow().is_busy()
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.borrow().phase()
    }

    pub fn mode(&self) -> ResponseMode {
        self.state.borrow().mode()
    }

    pub fn backend_name(&self) -> String {
        self.backend.name()
    }

    pub fn history(&self) -> String {
        format_history(self.state.borrow().conversation())
    }

    pub fn set_mode(&self, mode: ResponseMode) {
        self.mutate(|state, events| {
            if state.mode != mode {
                state.mode = mode;
                events.push(SessionEvent::ModeChanged(mode));
            }
        });
    }

    pub fn toggle_mode(&self) -> ResponseMode {
        self.mutate(|state, events| {
            state.mode = state.mode.toggled();
            events.push(SessionEvent::ModeChanged(state.mode));
            state.mode
        })
    }

    /// Updates the input buffer. Input is locked while a turn is running, in
    /// which case this returns false.
    pub fn set_draft(&self, text: impl Into<String>) -> bool {
        let text = text.into();
        self.mutate(|state, events| {
            if state.is_busy() {
                return false;
            }
            if state.draft != text {
                state.draft = text;
                events.push(SessionEvent::DraftChanged(state.draft.clone()));
            }
            true
        })
    }

    pub fn can_send(&self) -> bool {
        self.state.borrow().can_send()
    }

    /// The send control: submits the draft with the current mode, or stops
    /// the running turn.
    pub async fn send_draft(&self) -> Result<SubmitOutcome, ChatError> {
        let (draft, mode) = {
            let state = self.state.borrow();
            (state.draft.clone(), state.mode)
        };
        self.run_turn(&draft, mode, true).await
    }

    /// Runs one turn for `user_text`. Blank text is ignored. While another
    /// turn is running this stops it and returns `SubmitOutcome::Stopped`.
    pub async fn submit(
        &self,
        user_text: &str,
        mode: ResponseMode
    ) -> Result<SubmitOutcome, ChatError> {
        self.run_turn(user_text, mode, false).await
    }

    /// Requests cancellation of the running turn. Returns whether one was
    /// running. The turn itself returns the session to idle once it observes
    /// the cancellation.
    pub fn stop(&self) -> bool {
        self.mutate(stop_active)
    }

    /// Clear Chat: cancels any running turn, empties the input buffer and
    /// puts the conversation back to its greeting.
    pub fn reset_conversation(&self) {
        self.mutate(|state, events| {
            if let Some(active) = state.active.take() {
                info!("Cancelling request {} for conversation reset", active.id);
                active.token.cancel();
                events.push(SessionEvent::PhaseChanged(SessionPhase::Idle));
            }
            state.conversation.reset();
            state.draft.clear();
            events.push(SessionEvent::ConversationReset);
        });
    }

    pub fn dismiss_alert(&self) {
        self.mutate(|state, events| {
            if state.alert.take().is_some() {
                events.push(SessionEvent::AlertDismissed);
            }
        });
    }

    async fn run_turn(
        &self,
        text: &str,
        mode: ResponseMode,
        consume_draft: bool
    ) -> Result<SubmitOutcome, ChatError> {
        let request = match self.reserve_request(text) {
            Reservation::Started(active) =>
                RequestGuard {
                    session: self,
                    id: active.id,
                    token: active.token,
                },
            Reservation::Stopped => {
                return Ok(SubmitOutcome::Stopped);
            }
            Reservation::Ignored => {
                debug!("Ignoring blank input");
                return Ok(SubmitOutcome::Ignored);
            }
        };
        let request_id = request.id;

        // The turn is already busy here, so a send during the availability
        // check stops it like any other send while busy.
        let availability = tokio::select! {
            biased;
            _ = request.token.cancelled() => None,
            availability = self.backend.availability() => Some(availability),
        };
        let availability = match availability {
            Some(availability) => availability,
            None => {
                drop(request);
                info!("Request {} cancelled before it started", request_id);
                return Ok(SubmitOutcome::Cancelled);
            }
        };
        if let Some(reason) = availability.reason() {
            drop(request);
            let err = ChatError::Unavailable(reason);
            self.raise_alert(&err);
            return Err(err);
        }

        if !self.open_turn(&request, text, consume_draft) {
            drop(request);
            info!("Request {} cancelled before it started", request_id);
            return Ok(SubmitOutcome::Cancelled);
        }
        info!("Request {} started: backend={}, mode={}", request_id, self.backend.name(), mode);

        let result = match mode {
            ResponseMode::Streaming => self.stream_into_placeholder(&request, text).await,
            ResponseMode::OneShot => self.respond_into_placeholder(&request, text).await,
        };
        let cancelled = request.token.is_cancelled();
        drop(request);

        match result {
            Ok(Some(content)) => {
                info!("Request {} completed ({} chars)", request_id, content.len());
                Ok(SubmitOutcome::Completed(content))
            }
            Ok(None) | Err(BackendError::Cancelled) => {
                info!("Request {} cancelled", request_id);
                Ok(SubmitOutcome::Cancelled)
            }
            Err(e) if cancelled => {
                debug!("Request {} failed after cancellation: {}", request_id, e);
                Ok(SubmitOutcome::Cancelled)
            }
            Err(e) => {
                error!("Request {} failed: {}", request_id, e);
                let err = ChatError::from(e);
                self.raise_alert(&err);
                Err(err)
            }
        }
    }

    /// Decides, in one step under the lock, what a send does: stop the
    /// running turn, ignore blank text, or mark a new turn as running.
    fn reserve_request(&self, text: &str) -> Reservation {
        self.mutate(|state, events| {
            if stop_active(state, events) {
                return Reservation::Stopped;
            }
            if !is_valid_input(text) {
                return Reservation::Ignored;
            }

            state.request_seq += 1;
            let active = ActiveRequest {
                id: state.request_seq,
                token: CancellationToken::new(),
            };
            state.active = Some(active.clone());
            events.push(SessionEvent::PhaseChanged(SessionPhase::Requesting));
            Reservation::Started(active)
        })
    }

    /// Logs the user's message and the empty placeholder for a reserved
    /// turn. Returns false if the turn was stopped or replaced meanwhile.
    fn open_turn(&self, request: &RequestGuard<'_>, text: &str, consume_draft: bool) -> bool {
        let id = request.id;
        self.mutate(|state, events| {
            if !is_live(state, id) {
                return false;
            }
            if consume_draft && !state.draft.is_empty() {
                state.draft.clear();
                events.push(SessionEvent::DraftChanged(String::new()));
            }
            for message in [Message::user(text), Message::placeholder()] {
                state.conversation.append(message.clone());
                events.push(SessionEvent::MessageAppended(message));
            }
            true
        })
    }

    async fn stream_into_placeholder(
        &self,
        request: &RequestGuard<'_>,
        prompt: &str
    ) -> Result<Option<String>, BackendError> {
        let token = request.token.clone();
        let mut stream = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(None),
            stream = self.backend.stream_response(prompt, &self.options, token.clone()) => stream?,
        };

        let mut latest = String::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(None),
                next = stream.next() => next,
            };
            match next {
                Some(Ok(snapshot)) => {
                    debug!("Request {} snapshot: {} chars", request.id, snapshot.len());
                    if !self.write_placeholder(request, &snapshot) {
                        return Ok(None);
                    }
                    latest = snapshot;
                }
                Some(Err(e)) => {
                    return Err(e);
                }
                None => {
                    return Ok(Some(latest));
                }
            }
        }
    }

    async fn respond_into_placeholder(
        &self,
        request: &RequestGuard<'_>,
        prompt: &str
    ) -> Result<Option<String>, BackendError> {
        let token = request.token.clone();
        let reply = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(None),
            reply = self.backend.respond(prompt, &self.options, token.clone()) => reply?,
        };

        if self.write_placeholder(request, &reply) {
            Ok(Some(reply))
        } else {
            Ok(None)
        }
    }

    /// Rewrites the placeholder, unless the request has been cancelled or
    /// replaced. The check and the write happen under the same lock as
    /// `stop`, so nothing is written once a stop has been acknowledged.
    fn write_placeholder(&self, request: &RequestGuard<'_>, text: &str) -> bool {
        let id = request.id;
        self.mutate(|state, events| {
            if !is_live(state, id) {
                return false;
            }
            if let Some(message_id) = state.conversation.replace_last_content(text) {
                events.push(SessionEvent::ContentReplaced {
                    message_id,
                    content: text.to_string(),
                });
            }
            true
        })
    }

    fn raise_alert(&self, err: &ChatError) {
        warn!("Alerting user: {}", err);
        let alert = Alert::from(err);
        self.mutate(|state, events| {
            state.alert = Some(alert.clone());
            events.push(SessionEvent::AlertRaised(alert));
        });
    }

    /// Applies `f` under the state lock. Receivers are only notified when
    /// `f` emits events, and events go out in lock order.
    fn mutate<R: Default>(&self, f: impl FnOnce(&mut ChatState, &mut Vec<SessionEvent>) -> R) -> R {
        let mut result = R::default();
        self.state.send_if_modified(|state| {
            let mut emitted = Vec::new();
            result = f(state, &mut emitted);
            let modified = !emitted.is_empty();
            for event in emitted {
                let _ = self.events.send(event);
            }
            modified
        });
        result
    }
}

#[derive(Default)]
enum Reservation {
    Started(ActiveRequest),
    Stopped,
    #[default]
    Ignored,
}

/// Cancels the active request, if any. Returns whether one was running.
fn stop_active(state: &mut ChatState, events: &mut Vec<SessionEvent>) -> bool {
    match &state.active {
        Some(active) => {
            if !active.token.is_cancelled() {
                info!("Stopping request {}", active.id);
                active.token.cancel();
                events.push(SessionEvent::PhaseChanged(SessionPhase::Cancelling));
            }
            true
        }
        None => false,
    }
}

/// Whether request `id` is still the active one and has not been stopped.
fn is_live(state: &ChatState, id: u64) -> bool {
    matches!(
        &state.active,
        Some(active) if active.id == id && !active.token.is_cancelled()
    )
}
