pub mod models;
pub mod config;
pub mod llm;
pub mod cli;
pub mod history;
pub mod session;
pub mod console;

use cli::Args;
use config::prompt::load_prompts_or_default;
use llm::chat::new_backend;
use llm::{ BackendConfig, BackendType, GenerationOptions };
use log::info;
use models::chat::ResponseMode;
use session::ChatSession;
use std::error::Error;
use std::time::Duration;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let backend_type: BackendType = args.backend_type.parse()?;
    let mode: ResponseMode = args.mode.parse()?;
    let prompts = load_prompts_or_default(args.prompts_path.as_deref())?;

    info!("--- Core Configuration ---");
    info!("Backend Type: {}", backend_type);
    info!("Backend Base URL: {}", args.base_url.as_deref().unwrap_or("backend default"));
    info!("Backend Model: {}", args.model.as_deref().unwrap_or("backend default"));
    info!("Response Mode: {}", mode);
    info!("Temperature: {:?}", args.temperature);
    info!("Max Response Tokens: {:?}", args.max_response_tokens);
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("built-in"));
    info!("Instructions Set: {}", prompts.instructions.is_some());
    info!("-------------------------");

    let backend_config = BackendConfig {
        backend_type,
        base_url: args.base_url.clone(),
        model: args.model.clone(),
        echo_delay: Duration::from_millis(args.echo_delay_ms),
    };
    let backend = new_backend(&backend_config)?;

    let options = GenerationOptions {
        instructions: prompts.instructions.clone(),
        temperature: args.temperature,
        maximum_response_tokens: args.max_response_tokens,
    };
    let session = ChatSession::new(backend, prompts.greeting, mode, options);
    console::run_console(session).await
}
