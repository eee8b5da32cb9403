//! LLM-guided topic exploration
//!
//! An alternative to the bandit's own choice: ask the completion backend
//! which configured topic fits the conversation best. Falls back to a
//! uniformly random topic when the backend is missing or answers with
//! something that is not one of the topics. Never touches bandit state.

use crate::bandit::{TopicBandit, TopicIndex};
use crate::llm::{CompletionOutcome, TextCompletion};
use crate::types::ChatMessage;
use rand::Rng;

pub struct TopicExplorer<C> {
    client: Option<C>,
}

impl<C: TextCompletion> TopicExplorer<C> {
    pub fn new(client: Option<C>) -> Self {
        Self { client }
    }

    pub async fn explore<R: Rng + ?Sized>(
        &self,
        bandit: &TopicBandit,
        context: &str,
        rng: &mut R,
    ) -> (TopicIndex, String) {
        let topics = bandit.topics();

        if let Some(client) = &self.client {
            let prompt = format!(
                "Pick the topic that best fits the conversation below.\n\
                 Available topics: {}\n\n\
                 Conversation: {}\n\n\
                 Answer with exactly one topic from the list and nothing else.",
                topics.join(", "),
                context,
            );
            let messages = [
                ChatMessage::system("You choose the best conversation topic for the context."),
                ChatMessage::user(prompt),
            ];

            match client.complete(&messages).await {
                CompletionOutcome::Text(answer) => match match_topic(topics, &answer) {
                    Some(i) => return (TopicIndex(i), topics[i].clone()),
                    None => tracing::debug!(%answer, "explorer answer is not a known topic"),
                },
                CompletionOutcome::Unavailable { reason } => {
                    tracing::debug!(%reason, "topic exploration unavailable");
                }
            }
        } else {
            tracing::debug!("no completion backend, exploring at random");
        }

        let i = rng.gen_range(0..topics.len());
        (TopicIndex(i), topics[i].clone())
    }
}

/// Resolve a free-text answer to a topic position
fn match_topic(topics: &[String], answer: &str) -> Option<usize> {
    let cleaned = answer
        .trim()
        .trim_matches(|c: char| c.is_ascii_punctuation() || c == '「' || c == '」')
        .trim()
        .to_lowercase();

    if let Some(i) = topics.iter().position(|t| t.to_lowercase() == cleaned) {
        return Some(i);
    }

    // Accept a sentence that mentions exactly one topic
    let mut mentioned = topics
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.is_empty() && cleaned.contains(&t.to_lowercase()));
    match (mentioned.next(), mentioned.next()) {
        (Some((i, _)), None) => Some(i),
        _ => None,
    }
}
