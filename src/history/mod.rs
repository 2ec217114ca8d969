use crate::models::chat::Message;
use uuid::Uuid;

pub const DEFAULT_GREETING: &str = "Hello! How can I help you today?";

/// Ordered conversation log. It always holds at least the greeting, and only
/// the last entry's content is ever rewritten.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    greeting: String,
    messages: Vec<Message>,
}

impl ConversationStore {
    pub fn new(greeting: impl Into<String>) -> Self {
        let greeting = greeting.into();
        let messages = vec![Message::assistant(greeting.clone())];
        Self { greeting, messages }
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Overwrites the content of the final entry. Returns the id of the
    /// rewritten message.
    pub fn replace_last_content(&mut self, text: &str) -> Option<Uuid> {
        let last = self.messages.last_mut()?;
        if last.content != text {
            last.content.clear();
            last.content.push_str(text);
        }
        Some(last.id)
    }

    pub fn reset(&mut self) {
        self.messages.clear();
        self.messages.push(Message::assistant(self.greeting.clone()));
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Messages the view draws. Empty entries, such as a placeholder that has
    /// not received any text yet, stay in the log but are not rendered.
    pub fn visible(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| !m.content.is_empty())
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_GREETING)
    }
}

pub fn format_history(store: &ConversationStore) -> String {
    let mut result = String::new();
    for msg in store.visible() {
        let role_display = if msg.is_from_user { "User" } else { "Assistant" };
        result.push_str(&format!("{}: {}\n", role_display, msg.content));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_a_single_greeting() {
        let store = ConversationStore::new("Hi!");
        assert_eq!(store.messages().len(), 1);
        assert_eq!(store.messages()[0].content, "Hi!");
        assert!(!store.messages()[0].is_from_user);
    }

    #[test]
    fn replace_last_content_only_touches_the_final_entry() {
        let mut store = ConversationStore::default();
        store.append(Message::user("Hello"));
        let placeholder = Message::placeholder();
        let placeholder_id = placeholder.id;
        store.append(placeholder);

        assert_eq!(store.replace_last_content("Hi"), Some(placeholder_id));
        assert_eq!(store.replace_last_content("Hi there"), Some(placeholder_id));

        let contents: Vec<&str> = store
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec![DEFAULT_GREETING, "Hello", "Hi there"]);
    }

    #[test]
    fn reset_returns_to_a_fresh_greeting() {
        let mut store = ConversationStore::new("Welcome back");
        let first_greeting = store.messages()[0].id;
        store.append(Message::user("one"));
        store.append(Message::assistant("two"));

        store.reset();

        assert_eq!(store.messages().len(), 1);
        assert_eq!(store.messages()[0].content, "Welcome back");
        assert_ne!(store.messages()[0].id, first_greeting);
    }

    #[test]
    fn visible_hides_empty_messages_without_dropping_them() {
        let mut store = ConversationStore::default();
        store.append(Message::user("Hello"));
        store.append(Message::placeholder());

        assert_eq!(store.messages().len(), 3);
        assert_eq!(store.visible().count(), 2);
    }

    #[test]
    fn history_lists_rendered_turns_with_roles() {
        let mut store = ConversationStore::new("Hi");
        store.append(Message::user("Ping"));
        store.append(Message::placeholder());

        assert_eq!(format_history(&store), "Assistant: Hi\nUser: Ping\n");
    }
}
