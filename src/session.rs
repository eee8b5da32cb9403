//! Companion session: one conversation, one bandit
//!
//! Owns the topic bandit and the completion-backed adapters and runs a
//! full turn: build context → select topic → generate reply → evaluate →
//! update → suggest follow-up angles → record history.
//!
//! ```rust,ignore
//! let config = CompanionConfig::default();
//! let client = HttpCompletionClient::from_config(config.llm.clone());
//! let mut session = CompanionSession::new(config, client)?;
//!
//! let turn = session.take_turn("I went to a jazz bar yesterday", Some(Emotion::Joy)).await;
//! println!("[{}] {}", turn.topic, turn.reply);
//! ```

use crate::bandit::{ArmScore, TopicBandit, TopicIndex};
use crate::config::CompanionConfig;
use crate::explore::TopicExplorer;
use crate::llm::{CompletionOutcome, TextCompletion};
use crate::reward::RewardEvaluator;
use crate::subtopics::SubtopicSuggester;
use crate::types::{ChatMessage, ContextBundle, Emotion, TopicStats, TurnRecord};
use anyhow::{Context, Result};
use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Past turns replayed to the model when generating a reply
const REPLY_HISTORY_TURNS: usize = 3;

/// Result of one conversational turn
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub decision_id: Uuid,
    pub topic_index: TopicIndex,
    pub topic: String,
    pub score: ArmScore,
    pub reply: String,
    /// False when the backend was unavailable and a canned reply was used
    pub reply_generated: bool,
    pub reward: f64,
    /// Follow-up angles for the chosen topic; empty without a backend
    pub subtopics: Vec<String>,
}

pub struct CompanionSession<C> {
    config: CompanionConfig,
    bandit: TopicBandit,
    client: Option<Arc<C>>,
    evaluator: RewardEvaluator<Arc<C>>,
    suggester: SubtopicSuggester<Arc<C>>,
    explorer: TopicExplorer<Arc<C>>,
}

impl<C: TextCompletion + Send + Sync> CompanionSession<C> {
    pub fn new(config: CompanionConfig, client: Option<C>) -> Result<Self> {
        config.validate()?;
        let bandit = TopicBandit::new(config.topics.clone(), config.alpha)
            .context("Failed to create topic bandit")?;

        let client = client.map(Arc::new);

        Ok(Self {
            evaluator: RewardEvaluator::new(client.clone()),
            suggester: SubtopicSuggester::new(client.clone()),
            explorer: TopicExplorer::new(client.clone()),
            config,
            bandit,
            client,
        })
    }

    pub fn config(&self) -> &CompanionConfig {
        &self.config
    }

    pub fn bandit(&self) -> &TopicBandit {
        &self.bandit
    }

    pub fn has_backend(&self) -> bool {
        self.client.is_some()
    }

    pub fn stats(&self) -> BTreeMap<String, TopicStats> {
        self.bandit.stats()
    }

    pub fn history(&self) -> impl ExactSizeIterator<Item = &TurnRecord> + '_ {
        self.bandit.history()
    }

    /// Run one full turn. Never fails; backend trouble degrades to fallbacks.
    pub async fn take_turn(&mut self, user_text: &str, emotion: Option<Emotion>) -> TurnOutcome {
        let context = self.context_for(user_text, emotion);
        let decision = self.bandit.select(&context);

        let (reply, reply_generated) = self.generate_reply(&decision.topic, user_text).await;
        let reward = self.evaluator.evaluate(&reply, user_text).await;
        let subtopics = self.suggester.suggest(&decision.topic).await;

        let outcome = TurnOutcome {
            decision_id: decision.id,
            topic_index: decision.index,
            topic: decision.topic.clone(),
            score: decision.score,
            reply: reply.clone(),
            reply_generated,
            reward,
            subtopics,
        };

        self.bandit.resolve(decision, reward);
        self.bandit.record_turn(TurnRecord {
            user_text: user_text.to_string(),
            reply_text: reply,
            topic: outcome.topic.clone(),
            emotion,
            timestamp: Utc::now(),
        });

        tracing::info!(
            decision = %outcome.decision_id,
            topic = %outcome.topic,
            reward = outcome.reward,
            "turn complete"
        );

        outcome
    }

    pub async fn suggest_subtopics(&self, topic: &str) -> Vec<String> {
        self.suggester.suggest(topic).await
    }

    /// Ask the backend for a topic for the current conversation
    pub async fn explore<R: Rng + ?Sized>(&self, rng: &mut R) -> (TopicIndex, String) {
        let context = self.bandit.recent_context(self.config.context_turns);
        self.explorer.explore(&self.bandit, &context, rng).await
    }

    fn context_for(&self, user_text: &str, emotion: Option<Emotion>) -> ContextBundle {
        let history = self.bandit.recent_context(self.config.context_turns);
        let text = if history.is_empty() {
            user_text.to_string()
        } else {
            format!("{}\n{}", history, user_text)
        };
        ContextBundle::new(text, emotion)
    }

    async fn generate_reply(&self, topic: &str, user_text: &str) -> (String, bool) {
        let Some(client) = &self.client else {
            return (fallback_reply(topic), false);
        };

        let mut messages = vec![ChatMessage::system(format!(
            "{}\nCurrent topic: {}. Respond to the user and steer the conversation \
             naturally toward this topic.",
            self.config.persona, topic
        ))];

        let skip = self.bandit.history().len().saturating_sub(REPLY_HISTORY_TURNS);
        for record in self.bandit.history().skip(skip) {
            messages.push(ChatMessage::user(record.user_text.clone()));
            messages.push(ChatMessage::assistant(record.reply_text.clone()));
        }
        messages.push(ChatMessage::user(user_text));

        match client.complete(&messages).await {
            CompletionOutcome::Text(text) if !text.trim().is_empty() => (text, true),
            CompletionOutcome::Text(_) => {
                tracing::debug!(topic, "backend returned an empty reply");
                (fallback_reply(topic), false)
            }
            CompletionOutcome::Unavailable { reason } => {
                tracing::debug!(topic, %reason, "reply generation unavailable");
                (fallback_reply(topic), false)
            }
        }
    }
}

fn fallback_reply(topic: &str) -> String {
    format!("Let's talk about {}! What comes to mind for you?", topic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedCompletion;
    use crate::reward::NEUTRAL_REWARD;

    fn config(topics: &[&str]) -> CompanionConfig {
        CompanionConfig {
            topics: topics.iter().map(|t| t.to_string()).collect(),
            alpha: 0.1,
            ..CompanionConfig::default()
        }
    }

    #[test]
    fn test_rejects_empty_topics() {
        let result = CompanionSession::<ScriptedCompletion>::new(config(&[]), None);
        assert!(result.is_err());
    }

    #[test]
    fn test_turn_without_backend_uses_fallbacks() {
        let mut session =
            CompanionSession::<ScriptedCompletion>::new(config(&["music", "sports"]), None)
                .unwrap();
        let turn = tokio_test::block_on(session.take_turn("hello", None));

        assert_eq!(turn.topic, "music");
        assert!(!turn.reply_generated);
        assert!(turn.reply.contains("music"));
        assert_eq!(turn.reward, NEUTRAL_REWARD);
        assert!(turn.subtopics.is_empty());
        assert_eq!(session.stats()["music"].count, 1);
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_turn_with_backend() {
        let client = ScriptedCompletion::texts([
            "Oh, I love sushi too!",
            "1. 0.9 (naturalness)\nOverall: 0.9",
            "1. Street food\n2. Home cooking",
        ]);
        let mut session = CompanionSession::new(config(&["travel", "food"]), Some(client)).unwrap();

        let turn =
            tokio_test::block_on(session.take_turn("what food do you like?", Some(Emotion::Joy)));

        assert_eq!(turn.topic, "food");
        assert!(turn.reply_generated);
        assert_eq!(turn.reply, "Oh, I love sushi too!");
        assert_eq!(turn.reward, 0.9);
        assert_eq!(turn.subtopics, vec!["Street food", "Home cooking"]);

        let stats = session.stats();
        assert_eq!(stats["food"].count, 1);
        assert!((stats["food"].average_reward - 0.9).abs() < 1e-12);

        let record = session.history().next().unwrap();
        assert_eq!(record.topic, "food");
        assert_eq!(record.emotion, Some(Emotion::Joy));

        let client = session.client.as_ref().unwrap();
        assert_eq!(client.prompt_count(), 3);
        let prompts = client.prompts.lock().unwrap();
        assert!(prompts[0][0].content.contains("Current topic: food"));
        assert!(prompts[2][1].content.contains("\"food\""));
    }

    #[test]
    fn test_history_feeds_context() {
        let client = ScriptedCompletion::texts([
            "Travel sounds fun",
            "Overall: 0.2",
            "1. Trains",
            "Tell me more",
            "Overall: 0.2",
            "1. Beaches",
        ]);
        let mut session =
            CompanionSession::new(config(&["music", "travel"]), Some(client)).unwrap();

        tokio_test::block_on(session.take_turn("I want to travel", None));
        // second message has no keyword itself; the history still mentions travel
        let turn = tokio_test::block_on(session.take_turn("anyway", None));
        assert_eq!(turn.topic, "travel");

        let client = session.client.as_ref().unwrap();
        let prompts = client.prompts.lock().unwrap();
        // system + replayed turn + current message
        assert_eq!(prompts[3].len(), 4);
    }

    #[test]
    fn test_suggest_subtopics_passes_through() {
        let client = ScriptedCompletion::texts(["1. Jazz\n2. Vinyl"]);
        let session = CompanionSession::new(config(&["music"]), Some(client)).unwrap();
        let subtopics = tokio_test::block_on(session.suggest_subtopics("music"));
        assert_eq!(subtopics, vec!["Jazz", "Vinyl"]);
    }
}
