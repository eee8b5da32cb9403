//! Related discussion angles for a topic
//!
//! Asks the completion backend for a numbered list ("1. …", "2. …") and
//! turns it into plain strings. An empty list means "no suggestions".

use crate::llm::{CompletionOutcome, TextCompletion};
use crate::types::ChatMessage;

/// Angles requested per topic
pub const DEFAULT_SUBTOPIC_COUNT: usize = 5;

pub struct SubtopicSuggester<C> {
    client: Option<C>,
    count: usize,
}

impl<C: TextCompletion> SubtopicSuggester<C> {
    pub fn new(client: Option<C>) -> Self {
        Self {
            client,
            count: DEFAULT_SUBTOPIC_COUNT,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count.max(1);
        self
    }

    pub async fn suggest(&self, topic: &str) -> Vec<String> {
        let Some(client) = &self.client else {
            tracing::debug!(topic, "no completion backend, skipping subtopics");
            return Vec::new();
        };

        let prompt = format!(
            "Suggest {count} specific conversation angles related to \"{topic}\".\n\
             Each should be concrete and easy to build a conversation on.\n\n\
             Format:\n1. angle one\n2. angle two\n...",
            count = self.count,
        );
        let messages = [
            ChatMessage::system("You suggest engaging conversation topics."),
            ChatMessage::user(prompt),
        ];

        match client.complete(&messages).await {
            CompletionOutcome::Text(text) => {
                let mut subtopics = parse_numbered_list(&text);
                if subtopics.is_empty() {
                    tracing::debug!(topic, "subtopic response had no numbered items");
                }
                subtopics.truncate(self.count);
                subtopics
            }
            CompletionOutcome::Unavailable { reason } => {
                tracing::debug!(topic, %reason, "subtopic suggestion unavailable");
                Vec::new()
            }
        }
    }
}

/// Items of a "1. foo" / "2) bar" list, in order
pub fn parse_numbered_list(text: &str) -> Vec<String> {
    text.lines().filter_map(numbered_item).collect()
}

fn numbered_item(line: &str) -> Option<String> {
    let line = line.trim();
    let digits = line.find(|c: char| !c.is_ascii_digit())?;
    if digits == 0 {
        return None;
    }

    let rest = &line[digits..];
    let rest = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')'))?;
    // "1.5 hours" is a number, not a list marker
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let item = rest.trim();

    if item.is_empty() {
        None
    } else {
        Some(item.to_string())
    }
}
