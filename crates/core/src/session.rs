use crate::locale::Language;
use crate::models::{ConversationMessage, Role};
use uuid::Uuid;

/// One conversation: its history and the answer language.
///
/// History only grows through [`ConversationSession::record_turn`] and is
/// emptied only by [`ConversationSession::reset`].
#[derive(Debug, Clone)]
pub struct ConversationSession {
    id: Uuid,
    messages: Vec<ConversationMessage>,
    language: Option<Language>,
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ConversationSession {
    pub fn new(language: Option<Language>) -> Self {
        Self {
            id: Uuid::new_v4(),
            messages: Vec::new(),
            language,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn language(&self) -> Option<Language> {
        self.language
    }

    pub fn set_language(&mut self, language: Option<Language>) {
        self.language = language;
    }

    /// Appends a question and its answer together.
    pub fn record_turn(&mut self, question: &str, answer: &str) {
        self.messages.push(ConversationMessage {
            role: Role::User,
            content: question.to_string(),
        });
        self.messages.push(ConversationMessage {
            role: Role::Assistant,
            content: answer.to_string(),
        });
    }

    pub fn reset(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turns_append_in_order_and_reset_clears() {
        let mut session = ConversationSession::new(Some(Language::German));
        session.record_turn("first?", "one");
        session.record_turn("second?", "two");

        let roles = session
            .messages()
            .iter()
            .map(|message| message.role)
            .collect::<Vec<_>>();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        assert_eq!(session.messages()[3].content, "two");

        session.reset();
        assert!(session.messages().is_empty());
        assert_eq!(session.language(), Some(Language::German));
    }
}
