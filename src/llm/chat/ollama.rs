use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use async_trait::async_trait;
use super::{
    create_snapshot_stream,
    BackendError,
    SnapshotAccumulator,
    SnapshotStream,
    TextBackend,
};
use crate::llm::{ Availability, BackendConfig, BackendType, GenerationOptions, UnavailableReason };
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use log::{ debug, info, warn };

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "llama3.2";

#[derive(Debug, Clone)]
pub struct OllamaBackend {
    http: HttpClient,
    base_url: String,
    model: String,
}

#[derive(Serialize, Default)]
struct ModelOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    options: ModelOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize, Debug, PartialEq)]
struct StreamResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

impl OllamaBackend {
    pub fn new(base_url: Option<String>, model: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.into());

        Self {
            http: HttpClient::new(),
            base_url: url.trim_end_matches('/').to_string(),
            model,
        }
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        if config.backend_type != BackendType::Ollama {
            return Err(BackendError::Generation("Invalid config type for OllamaBackend".into()));
        }

        Ok(Self::new(config.base_url.clone(), config.model.clone()))
    }

    fn generate_request(&self, prompt: &str, options: &GenerationOptions, stream: bool) -> GenerateRequest {
        GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream,
            system: options.instructions.clone(),
            options: ModelOptions {
                temperature: options.temperature,
                num_predict: options.maximum_response_tokens,
            },
        }
    }

    fn has_model(&self, tags: &TagsResponse) -> bool {
        let tagged = format!("{}:latest", self.model);
        tags.models.iter().any(|m| m.name == self.model || m.name == tagged)
    }
}

fn map_send_error(err: reqwest::Error) -> BackendError {
    if err.is_connect() {
        BackendError::Unavailable(UnavailableReason::FeatureNotEnabled)
    } else {
        BackendError::Http(err)
    }
}

/// Pulls complete lines out of `buffer`, leaving a trailing partial line in
/// place for the next chunk.
/// Splits complete lines off the front of `buffer`, leaving any partial tail.
/// Lines stay as bytes until they are whole, so a multi-byte character split
/// across network chunks is never decoded in halves.
fn drain_lines(buffer: &mut Vec<u8>) -> Vec<Vec<u8>> {
    let mut lines = Vec::new();
    while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=pos).collect();
        if !is_blank(&line) {
            lines.push(line);
        }
    }
    lines
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

/// Handles one NDJSON line of a streamed reply. Returns false once the
/// stream is over: the model finished, reported an error, or the receiver
/// went away.
async fn forward_line(
    line: &[u8],
    acc: &mut SnapshotAccumulator,
    tx: &mpsc::Sender<Result<String, BackendError>>
) -> bool {
    let parsed = match serde_json::from_slice::<StreamResponse>(line) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("JSON parse error: {} for line: {}", e, String::from_utf8_lossy(line));
            return true;
        }
    };
    if let Some(message) = parsed.error {
        let _ = tx.send(Err(BackendError::Generation(message))).await;
        return false;
    }
    if let Some(snapshot) = acc.push(&parsed.response) {
        if tx.send(Ok(snapshot)).await.is_err() {
            return false;
        }
    }
    !parsed.done
}

#[async_trait]
impl TextBackend for OllamaBackend {
    async fn availability(&self) -> Availability {
        let url = format!("{}/api/tags", self.base_url);
        let resp = match self.http.get(&url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!("Ollama not reachable at {}: {}", self.base_url, e);
                return Availability::Unavailable(UnavailableReason::FeatureNotEnabled);
            }
        };
        if !resp.status().is_success() {
            warn!("Ollama availability check returned HTTP {}", resp.status());
            return Availability::Unavailable(UnavailableReason::Unknown);
        }
        match resp.json::<TagsResponse>().await {
            Ok(tags) if self.has_model(&tags) => Availability::Available,
            Ok(_) => {
                info!("Model '{}' is not pulled on {}", self.model, self.base_url);
                Availability::Unavailable(UnavailableReason::AssetsNotReady)
            }
            Err(e) => {
                warn!("Could not read Ollama model list: {}", e);
                Availability::Unavailable(UnavailableReason::Unknown)
            }
        }
    }

    async fn respond(
        &self,
        prompt: &str,
        options: &GenerationOptions,
        cancel: CancellationToken
    ) -> Result<String, BackendError> {
        let url = format!("{}/api/generate", self.base_url);
        let req = self.generate_request(prompt, options, false);
        let request = async {
            let resp = self.http
                .post(&url)
                .json(&req)
                .send().await
                .map_err(map_send_error)?
                .error_for_status()?;
            let data = resp.json::<GenerateResponse>().await?;
            Ok::<_, BackendError>(data.response)
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(BackendError::Cancelled),
            result = request => result,
        }
    }

    async fn stream_response(
        &self,
        prompt: &str,
        options: &GenerationOptions,
        cancel: CancellationToken
    ) -> Result<SnapshotStream, BackendError> {
        let url = format!("{}/api/generate", self.base_url);
        let req = self.generate_request(prompt, options, true);

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(BackendError::Cancelled),
            response = self.http.post(&url).json(&req).send() => response.map_err(map_send_error)?,
        };
        let response = response.error_for_status()?;

        Ok(
            create_snapshot_stream(move |tx| async move {
                let mut bytes = response.bytes_stream();
                let mut pending: Vec<u8> = Vec::new();
                let mut acc = SnapshotAccumulator::default();

                loop {
                    let chunk = tokio::select! {
                        _ = cancel.cancelled() => {
                            debug!("Ollama stream cancelled");
                            return;
                        }
                        chunk = bytes.next() => chunk,
                    };
                    let chunk = match chunk {
                        Some(Ok(chunk)) => chunk,
                        Some(Err(e)) => {
                            let _ = tx.send(Err(BackendError::Http(e))).await;
                            return;
                        }
                        None => {
                            // The last line may arrive without its newline.
                            if !is_blank(&pending) {
                                forward_line(&pending, &mut acc, &tx).await;
                            }
                            return;
                        }
                    };
                    pending.extend_from_slice(&chunk);

                    for line in drain_lines(&mut pending) {
                        if !forward_line(&line, &mut acc, &tx).await {
                            return;
                        }
                    }
                }
            })
        )
    }

    fn name(&self) -> String {
        format!("ollama:{}", self.model)
    }
}
