#![allow(dead_code)]

use async_trait::async_trait;
use chat_buddy::llm::chat::{ create_snapshot_stream, BackendError, SnapshotStream, TextBackend };
use chat_buddy::llm::{ Availability, GenerationOptions, UnavailableReason };
use chat_buddy::models::chat::ResponseMode;
use chat_buddy::session::ChatSession;
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

pub const GREETING: &str = "Hello! How can I help you today?";

/// Backend that plays back a fixed script.
#[derive(Default)]
pub struct ScriptedBackend {
    availability: Option<UnavailableReason>,
    availability_delay: Duration,
    snapshots: Vec<String>,
    reply: String,
    failure: Option<String>,
    delay: Duration,
    hang: bool,
    gate: Option<Arc<Notify>>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn replying(reply: &str) -> Self {
        Self { reply: reply.to_string(), ..Self::default() }
    }

    pub fn streaming(snapshots: &[&str]) -> Self {
        Self {
            snapshots: snapshots
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ..Self::default()
        }
    }

    pub fn unavailable(reason: UnavailableReason) -> Self {
        Self { availability: Some(reason), ..Self::default() }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Takes `delay` to answer every availability check.
    pub fn slow_to_check(mut self, delay: Duration) -> Self {
        self.availability_delay = delay;
        self
    }

    /// Never finishes after the scripted output, and ignores cancellation.
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// Holds all output until the gate is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextBackend for ScriptedBackend {
    async fn availability(&self) -> Availability {
        tokio::time::sleep(self.availability_delay).await;
        match self.availability {
            Some(reason) => Availability::Unavailable(reason),
            None => Availability::Available,
        }
    }

    async fn respond(
        &self,
        _prompt: &str,
        _options: &GenerationOptions,
        _cancel: CancellationToken
    ) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.hang {
            futures::future::pending::<()>().await;
        }
        tokio::time::sleep(self.delay).await;
        match &self.failure {
            Some(message) => Err(BackendError::Generation(message.clone())),
            None => Ok(self.reply.clone()),
        }
    }

    async fn stream_response(
        &self,
        _prompt: &str,
        _options: &GenerationOptions,
        _cancel: CancellationToken
    ) -> Result<SnapshotStream, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let snapshots = self.snapshots.clone();
        let failure = self.failure.clone();
        let delay = self.delay;
        let hang = self.hang;
        let gate = self.gate.clone();

        Ok(
            create_snapshot_stream(move |tx| async move {
                if let Some(gate) = gate {
                    gate.notified().await;
                }
                for snapshot in snapshots {
                    tokio::time::sleep(delay).await;
                    if tx.send(Ok(snapshot)).await.is_err() {
                        return;
                    }
                }
                if let Some(message) = failure {
                    let _ = tx.send(Err(BackendError::Generation(message))).await;
                    return;
                }
                if hang {
                    let _keep_open = tx;
                    futures::future::pending::<()>().await;
                }
            })
        )
    }

    fn name(&self) -> String {
        "scripted".to_string()
    }
}

pub fn session_with(backend: ScriptedBackend) -> (ChatSession, Arc<ScriptedBackend>) {
    let backend = Arc::new(backend);
    let session = ChatSession::new(
        backend.clone(),
        GREETING,
        ResponseMode::Streaming,
        GenerationOptions::default()
    );
    (session, backend)
}

pub fn contents(session: &ChatSession) -> Vec<(bool, String)> {
    session
        .snapshot()
        .messages()
        .iter()
        .map(|m| (m.is_from_user, m.content.clone()))
        .collect()
}

pub fn last_content(session: &ChatSession) -> String {
    session
        .snapshot()
        .messages()
        .last()
        .map(|m| m.content.clone())
        .unwrap_or_default()
}
