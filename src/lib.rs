//! recomate - conversational companion with a learning topic picker
//!
//! Each turn the companion picks a conversation topic with a contextual
//! LinUCB bandit, asks a language model for a reply grounded in that
//! topic, has the model judge the exchange, and feeds the judgment back
//! into the bandit.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use recomate::{CompanionConfig, CompanionSession, HttpCompletionClient, Emotion};
//!
//! let config = CompanionConfig::default();
//! let client = HttpCompletionClient::from_config(config.llm.clone());
//! let mut session = CompanionSession::new(config, client)?;
//!
//! let turn = session.take_turn("let's talk about food tonight", Some(Emotion::Joy)).await;
//! println!("{} -> {} (reward {:.2})", turn.topic, turn.reply, turn.reward);
//! ```
//!
//! The bandit can also be driven directly:
//!
//! ```rust,ignore
//! let mut bandit = TopicBandit::new(vec!["music".into(), "sports".into()], 0.1)?;
//! let decision = bandit.select(&ContextBundle::text("any good albums lately?"));
//! // ... produce and score a reply ...
//! bandit.resolve(decision, 0.8);
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────── CompanionSession ───────────────────────────┐
//! │  history ─▶ ContextBundle ─▶ TopicBandit::select ─▶ Decision            │
//! │                                   │                    │                │
//! │                        reply (TextCompletion)          │                │
//! │                                   │                    ▼                │
//! │                        RewardEvaluator ─▶ reward ─▶ TopicBandit::resolve│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod bandit;
pub mod config;
pub mod explore;
pub mod llm;
pub mod reward;
pub mod session;
pub mod subtopics;
pub mod types;

// Bandit engine
pub use bandit::{
    ArmScore, ArmState, Decision, FeatureEncoder, TopicBandit, TopicIndex, FEATURE_DIM,
};

// Completion backend and adapters
pub use explore::TopicExplorer;
pub use llm::{CompletionOutcome, HttpCompletionClient, LlmConfig, TextCompletion};
pub use reward::{parse_reward, RewardEvaluator, NEUTRAL_REWARD};
pub use subtopics::{parse_numbered_list, SubtopicSuggester};

// Session orchestration
pub use config::CompanionConfig;
pub use session::{CompanionSession, TurnOutcome};

pub use types::*;
