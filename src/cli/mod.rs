use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Backend Args ---
    /// Text generation backend (ollama, echo)
    #[arg(long, env = "BACKEND_TYPE", default_value = "echo")]
    pub backend_type: String,

    /// Base URL for the backend API (e.g., http://localhost:11434 for Ollama)
    #[arg(long, env = "BACKEND_BASE_URL")] // No default, let backends handle defaults if None
    pub base_url: Option<String>,

    /// Model name (e.g., llama3.2)
    #[arg(long, env = "BACKEND_MODEL")] // No default, rely on backend defaults if None
    pub model: Option<String>,

    /// Delay in milliseconds between words produced by the echo backend
    #[arg(long, env = "ECHO_DELAY_MS", default_value = "120")]
    pub echo_delay_ms: u64,

    // --- Generation Args ---
    /// How replies are delivered: streaming or oneshot
    #[arg(long, env = "RESPONSE_MODE", default_value = "streaming")]
    pub mode: String,

    /// Sampling temperature passed to the model
    #[arg(long, env = "TEMPERATURE")]
    pub temperature: Option<f64>,

    /// Upper bound on the number of tokens in a reply
    #[arg(long, env = "MAX_RESPONSE_TOKENS")]
    pub max_response_tokens: Option<u32>,

    /// Path to a JSON file with the greeting and model instructions.
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    // --- General App Args ---
    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,
}
