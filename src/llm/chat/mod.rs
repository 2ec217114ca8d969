pub mod echo;
pub mod ollama;

use async_trait::async_trait;
use futures::{ Future, Stream };
use std::pin::Pin;
use std::sync::Arc;
use super::{ Availability, BackendConfig, BackendType, GenerationOptions, UnavailableReason };
use self::echo::EchoBackend;
use self::ollama::OllamaBackend;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{0}")]
    Unavailable(UnavailableReason),
    #[error("request to the model failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("could not decode the model response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0}")]
    Generation(String),
    #[error("request cancelled")]
    Cancelled,
}

/// Cumulative text snapshots: every item holds the whole reply so far.
pub type SnapshotStream = Pin<Box<dyn Stream<Item = Result<String, BackendError>> + Send>>;

#[async_trait]
pub trait TextBackend: Send + Sync {
    async fn availability(&self) -> Availability;

    async fn respond(
        &self,
        prompt: &str,
        options: &GenerationOptions,
        cancel: CancellationToken
    ) -> Result<String, BackendError>;

    async fn stream_response(
        &self,
        prompt: &str,
        options: &GenerationOptions,
        cancel: CancellationToken
    ) -> Result<SnapshotStream, BackendError>;

    fn name(&self) -> String;
}

/// Runs `producer` on its own task and exposes what it sends as a stream. The
/// producer should stop once `Sender::send` fails, which happens when the
/// stream has been dropped.
pub fn create_snapshot_stream<F, Fut>(producer: F) -> SnapshotStream
where
    F: FnOnce(mpsc::Sender<Result<String, BackendError>>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        producer(tx).await;
    });

    Box::pin(ReceiverStream::new(rx))
}

/// Folds token deltas into the cumulative snapshots the session expects.
#[derive(Debug, Default)]
pub struct SnapshotAccumulator {
    text: String,
}

impl SnapshotAccumulator {
    pub fn push(&mut self, delta: &str) -> Option<String> {
        if delta.is_empty() {
            return None;
        }
        self.text.push_str(delta);
        Some(self.text.clone())
    }
}

pub fn new_backend(config: &BackendConfig) -> Result<Arc<dyn TextBackend>, BackendError> {
    let backend: Arc<dyn TextBackend> = match config.backend_type {
        BackendType::Ollama => {
            let specific_backend = OllamaBackend::from_config(config)?;
            Arc::new(specific_backend)
        }
        BackendType::Echo => {
            let specific_backend = EchoBackend::from_config(config)?;
            Arc::new(specific_backend)
        }
    };
    Ok(backend)
}
