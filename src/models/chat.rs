use chrono::{ DateTime, Utc };
use serde::{ Serialize, Deserialize };
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub content: String,
    pub is_from_user: bool,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(content: impl Into<String>, is_from_user: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            is_from_user,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(content, true)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(content, false)
    }

    /// Empty assistant turn that gets filled in while a reply is generated.
    pub fn placeholder() -> Self {
        Self::new(String::new(), false)
    }

    pub fn role(&self) -> &'static str {
        if self.is_from_user { "user" } else { "assistant" }
    }
}

/// How a reply is delivered: growing partial snapshots or one final answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    #[default]
    Streaming,
    OneShot,
}

impl ResponseMode {
    pub fn toggled(self) -> Self {
        match self {
            ResponseMode::Streaming => ResponseMode::OneShot,
            ResponseMode::OneShot => ResponseMode::Streaming,
        }
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseMode::Streaming => write!(f, "streaming"),
            ResponseMode::OneShot => write!(f, "oneshot"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseResponseModeError {
    message: String,
}

impl fmt::Display for ParseResponseModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseResponseModeError {}

impl FromStr for ResponseMode {
    type Err = ParseResponseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "streaming" | "stream" => Ok(ResponseMode::Streaming),
            "oneshot" | "one-shot" | "respond" => Ok(ResponseMode::OneShot),
            _ =>
                Err(ParseResponseModeError {
                    message: format!("Invalid response mode: '{}'", s),
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_an_empty_assistant_turn() {
        let message = Message::placeholder();
        assert!(message.content.is_empty());
        assert!(!message.is_from_user);
        assert_eq!(message.role(), "assistant");
    }

    #[test]
    fn messages_get_distinct_ids() {
        assert_ne!(Message::user("a").id, Message::user("a").id);
    }

    #[test]
    fn response_mode_parses_settings_names() {
        assert_eq!("Streaming".parse::<ResponseMode>(), Ok(ResponseMode::Streaming));
        assert_eq!("respond".parse::<ResponseMode>(), Ok(ResponseMode::OneShot));
        assert_eq!("one-shot".parse::<ResponseMode>(), Ok(ResponseMode::OneShot));
        assert!("batch".parse::<ResponseMode>().is_err());
    }

    #[test]
    fn toggling_flips_between_the_two_modes() {
        assert_eq!(ResponseMode::Streaming.toggled(), ResponseMode::OneShot);
        assert_eq!(ResponseMode::OneShot.toggled().toggled(), ResponseMode::OneShot);
    }
}
