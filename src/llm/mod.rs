pub mod chat;
use serde::{ Deserialize, Serialize };
use std::str::FromStr;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    Ollama,
    Echo,
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendType::Ollama => write!(f, "ollama"),
            BackendType::Echo => write!(f, "echo"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseBackendTypeError {
    message: String,
}

impl fmt::Display for ParseBackendTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseBackendTypeError {}
impl FromStr for BackendType {
    type Err = ParseBackendTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(BackendType::Ollama),
            "echo" => Ok(BackendType::Echo),
            _ =>
                Err(ParseBackendTypeError {
                    message: format!("Invalid backend type: '{}'", s),
                }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub backend_type: BackendType,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub echo_delay: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            backend_type: BackendType::Echo,
            base_url: None,
            model: None,
            echo_delay: Duration::from_millis(120),
        }
    }
}

/// Why a backend cannot serve requests right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    DeviceNotEligible,
    FeatureNotEnabled,
    AssetsNotReady,
    Unknown,
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::DeviceNotEligible =>
                write!(f, "This device is not eligible to run the language model."),
            UnavailableReason::FeatureNotEnabled =>
                write!(f, "The language model is turned off or its service is not running."),
            UnavailableReason::AssetsNotReady =>
                write!(f, "The model is still downloading or is not installed yet."),
            UnavailableReason::Unknown =>
                write!(f, "The language model is unavailable for an unknown reason."),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Availability {
    Available,
    Unavailable(UnavailableReason),
}

impl Availability {
    pub fn reason(&self) -> Option<UnavailableReason> {
        match self {
            Availability::Available => None,
            Availability::Unavailable(reason) => Some(*reason),
        }
    }
}

/// Per-request knobs handed to the backend alongside the prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub instructions: Option<String>,
    pub temperature: Option<f64>,
    pub maximum_response_tokens: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_type_parses_case_insensitively() {
        assert_eq!("Ollama".parse::<BackendType>(), Ok(BackendType::Ollama));
        assert_eq!("echo".parse::<BackendType>(), Ok(BackendType::Echo));
        let err = "gpt".parse::<BackendType>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid backend type: 'gpt'");
    }

    #[test]
    fn availability_exposes_its_reason() {
        assert_eq!(Availability::Available.reason(), None);

        let unavailable = Availability::Unavailable(UnavailableReason::AssetsNotReady);
        assert_eq!(unavailable.reason(), Some(UnavailableReason::AssetsNotReady));
    }

    #[test]
    fn availability_serializes_as_tagged_status() {
        let json = serde_json::to_string(
            &Availability::Unavailable(UnavailableReason::DeviceNotEligible)
        ).unwrap();
        assert_eq!(json, r#"{"status":"unavailable","reason":"device_not_eligible"}"#);
    }
}
