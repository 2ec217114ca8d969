use async_trait::async_trait;
use log::debug;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use super::{ create_snapshot_stream, BackendError, SnapshotStream, TextBackend };
use crate::llm::{ Availability, BackendConfig, BackendType, GenerationOptions };

/// Offline backend. It answers every prompt with a canned reply that quotes
/// the prompt, streamed one word at a time.
#[derive(Debug, Clone)]
pub struct EchoBackend {
    word_delay: Duration,
}

impl EchoBackend {
    pub fn new(word_delay: Duration) -> Self {
        Self { word_delay }
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        if config.backend_type != BackendType::Echo {
            return Err(BackendError::Generation("Invalid config type for EchoBackend".into()));
        }
        Ok(Self::new(config.echo_delay))
    }

    pub fn reply_for(prompt: &str) -> String {
        format!("You said: \"{}\". This reply comes from the offline echo model.", prompt.trim())
    }

    /// Time a one-shot reply takes: one word delay per word, capped instead
    /// of overflowing for huge delays.
    fn reply_delay(&self, reply: &str) -> Duration {
        let words = u32::try_from(reply.split_whitespace().count()).unwrap_or(u32::MAX);
        self.word_delay.saturating_mul(words)
    }

    /// Cumulative prefixes of the reply, cut at word boundaries.
    fn snapshots(reply: &str) -> Vec<String> {
        let mut snapshots = Vec::new();
        let mut current = String::new();
        for word in reply.split_inclusive(' ') {
            current.push_str(word);
            snapshots.push(current.trim_end().to_string());
        }
        snapshots
    }
}

#[async_trait]
impl TextBackend for EchoBackend {
    async fn availability(&self) -> Availability {
        Availability::Available
    }

    async fn respond(
        &self,
        prompt: &str,
        _options: &GenerationOptions,
        cancel: CancellationToken
    ) -> Result<String, BackendError> {
        let reply = Self::reply_for(prompt);
        let total_delay = self.reply_delay(&reply);
        tokio::select! {
            _ = cancel.cancelled() => Err(BackendError::Cancelled),
            _ = tokio::time::sleep(total_delay) => Ok(reply),
        }
    }

    async fn stream_response(
        &self,
        prompt: &str,
        _options: &GenerationOptions,
        cancel: CancellationToken
    ) -> Result<SnapshotStream, BackendError> {
        let snapshots = Self::snapshots(&Self::reply_for(prompt));
        let delay = self.word_delay;

        Ok(
            create_snapshot_stream(move |tx| async move {
                for snapshot in snapshots {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            debug!("Echo stream cancelled");
                            return;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    if tx.send(Ok(snapshot)).await.is_err() {
                        return;
                    }
                }
            })
        )
    }

    fn name(&self) -> String {
        "echo".to_string()
    }
}
