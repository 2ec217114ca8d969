use serde::Deserialize;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use log::info;
use crate::history::DEFAULT_GREETING;

#[derive(Debug)]
pub enum PromptError {
    EmptyGreeting,
    IoError(std::io::Error),
    JsonError(serde_json::Error),
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptError::EmptyGreeting => write!(f, "Prompt greeting must not be empty"),
            PromptError::IoError(e) => write!(f, "Prompt file IO error: {}", e),
            PromptError::JsonError(e) => write!(f, "Prompt JSON parsing error: {}", e),
        }
    }
}

impl Error for PromptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PromptError::IoError(e) => Some(e),
            PromptError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PromptError {
    fn from(err: std::io::Error) -> Self {
        PromptError::IoError(err)
    }
}

impl From<serde_json::Error> for PromptError {
    fn from(err: serde_json::Error) -> Self {
        PromptError::JsonError(err)
    }
}

fn default_greeting() -> String {
    DEFAULT_GREETING.to_string()
}

/// Text the app itself contributes to a conversation: the greeting that
/// opens every chat and optional instructions sent to the model.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PromptConfig {
    #[serde(default = "default_greeting")]
    pub greeting: String,
    #[serde(default)]
    pub instructions: Option<String>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            greeting: default_greeting(),
            instructions: None,
        }
    }
}

impl PromptConfig {
    fn validate(&self) -> Result<(), PromptError> {
        if self.greeting.trim().is_empty() {
            return Err(PromptError::EmptyGreeting);
        }
        Ok(())
    }
}

pub fn load_prompts<P: AsRef<Path>>(path: P) -> Result<PromptConfig, PromptError> {
    let file_content = fs::read_to_string(&path)?;
    let mut config: PromptConfig = serde_json::from_str(&file_content)?;
    config.validate()?;
    config.instructions = config.instructions.filter(|s| !s.trim().is_empty());
    info!("Loaded prompts from: {}", path.as_ref().display());
    Ok(config)
}

/// Loads the prompts file when one is configured, otherwise the built-in
/// greeting with no instructions.
pub fn load_prompts_or_default(path: Option<&str>) -> Result<PromptConfig, PromptError> {
    match path {
        Some(path) => load_prompts(path),
        None => Ok(PromptConfig::default()),
    }
}
