//! Core types shared by the bandit engine, the language-model adapters
//! and the companion session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Dominant emotion detected in the user's side of the conversation.
///
/// The declaration order is the order of the one-hot block in the
/// feature vector, so new variants must be appended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Joy,
    Sadness,
    Anger,
    Fear,
    Calm,
}

impl Emotion {
    pub const ALL: [Emotion; 5] = [
        Emotion::Joy,
        Emotion::Sadness,
        Emotion::Anger,
        Emotion::Fear,
        Emotion::Calm,
    ];

    /// Position inside the one-hot block
    pub fn index(self) -> usize {
        match self {
            Emotion::Joy => 0,
            Emotion::Sadness => 1,
            Emotion::Anger => 2,
            Emotion::Fear => 3,
            Emotion::Calm => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Joy => "joy",
            Emotion::Sadness => "sadness",
            Emotion::Anger => "anger",
            Emotion::Fear => "fear",
            Emotion::Calm => "calm",
        }
    }

    /// Parse a detector label or a companion mood-state name.
    ///
    /// Unknown labels yield `None`, which encodes as an all-zero block.
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        let emotion = match label.as_str() {
            "joy" | "happy" | "happiness" | "excited" | "cheerful" | "陽気" | "いたずら" => {
                Emotion::Joy
            }
            "sadness" | "sad" | "lonely" | "down" => Emotion::Sadness,
            "anger" | "angry" | "annoyed" | "frustrated" | "ツン" => Emotion::Anger,
            "fear" | "afraid" | "anxious" | "worried" | "nervous" | "心配" => Emotion::Fear,
            "calm" | "relaxed" | "neutral" | "content" | "穏やか" | "哲学" => Emotion::Calm,
            _ => return None,
        };
        Some(emotion)
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signals used to build a feature vector for every topic
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextBundle {
    /// Recent dialogue text (history plus the current user message)
    #[serde(default)]
    pub text: String,
    /// Dominant detected emotion, if any
    #[serde(default)]
    pub emotion: Option<Emotion>,
}

impl ContextBundle {
    pub fn new(text: impl Into<String>, emotion: Option<Emotion>) -> Self {
        Self {
            text: text.into(),
            emotion,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(text, None)
    }
}

/// One completed conversational turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    pub user_text: String,
    pub reply_text: String,
    pub topic: String,
    pub emotion: Option<Emotion>,
    pub timestamp: DateTime<Utc>,
}

/// Per-topic statistics reported by the engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopicStats {
    /// Completed reward observations
    pub count: u64,
    /// Mean of all observed rewards
    pub average_reward: f64,
    /// Exponentially smoothed reward estimate
    pub expected_reward: f64,
}

/// Role tag of a chat message sent to the completion backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emotion_indices_follow_declaration_order() {
        for (i, emotion) in Emotion::ALL.iter().enumerate() {
            assert_eq!(emotion.index(), i);
        }
    }

    #[test]
    fn test_emotion_parse() {
        assert_eq!(Emotion::parse("Happy"), Some(Emotion::Joy));
        assert_eq!(Emotion::parse("  worried "), Some(Emotion::Fear));
        assert_eq!(Emotion::parse("穏やか"), Some(Emotion::Calm));
        assert_eq!(Emotion::parse("ツン"), Some(Emotion::Anger));
        assert_eq!(Emotion::parse(""), None);
        assert_eq!(Emotion::parse("bewildered"), None);
    }

    #[test]
    fn test_chat_message_serializes_lowercase_role() {
        let json = serde_json::to_value(ChatMessage::system("hi")).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "hi");
    }
}
