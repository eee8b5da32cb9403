//! LLM-as-judge reward for a finished turn
//!
//! The completion backend rates the companion's reply on a small rubric
//! and reports an overall score. Anything that goes wrong (no backend,
//! failed call, unparsable rating) yields the neutral reward so a turn
//! is never blocked by evaluation.

use crate::llm::{CompletionOutcome, TextCompletion};
use crate::types::ChatMessage;
use serde::{Deserialize, Serialize};

/// Reward used whenever no rating can be obtained
pub const NEUTRAL_REWARD: f64 = 0.5;

/// Labels that introduce the overall rating, matched case-insensitively
const OVERALL_LABELS: [&str; 3] = ["overall score", "overall", "総合評価"];

/// One rubric criterion shown to the judge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardCriterion {
    pub name: String,
    pub description: String,
}

impl RewardCriterion {
    fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}

pub fn default_rubric() -> Vec<RewardCriterion> {
    vec![
        RewardCriterion::new(
            "naturalness",
            "Is the reply natural and appropriate for what the user said?",
        ),
        RewardCriterion::new(
            "expressiveness",
            "Does the reply express emotion in a warm, lively way?",
        ),
        RewardCriterion::new("continuity", "Does the reply invite the conversation to continue?"),
        RewardCriterion::new("relevance", "Does the reply stay on the chosen topic?"),
    ]
}

/// Scores replies in `[0, 1]`
pub struct RewardEvaluator<C> {
    client: Option<C>,
    rubric: Vec<RewardCriterion>,
}

impl<C: TextCompletion> RewardEvaluator<C> {
    pub fn new(client: Option<C>) -> Self {
        Self {
            client,
            rubric: default_rubric(),
        }
    }

    /// Rate `reply` as an answer to `user_input`. Never fails.
    pub async fn evaluate(&self, reply: &str, user_input: &str) -> f64 {
        let Some(client) = &self.client else {
            tracing::debug!("no completion backend, using neutral reward");
            return NEUTRAL_REWARD;
        };

        let messages = [
            ChatMessage::system(
                "You rate the quality of a conversational companion's replies. \
                 Return the score for each criterion and an overall score.",
            ),
            ChatMessage::user(build_prompt(&self.rubric, reply, user_input)),
        ];

        match client.complete(&messages).await {
            CompletionOutcome::Text(text) => {
                tracing::trace!(rating = %text, "judge response");
                match parse_reward(&text) {
                    Some(score) => score,
                    None => {
                        tracing::debug!("judge response had no score, using neutral reward");
                        NEUTRAL_REWARD
                    }
                }
            }
            CompletionOutcome::Unavailable { reason } => {
                tracing::debug!(%reason, "reward evaluation unavailable, using neutral reward");
                NEUTRAL_REWARD
            }
        }
    }
}

fn build_prompt(rubric: &[RewardCriterion], reply: &str, user_input: &str) -> String {
    let criteria = rubric
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {}: {}", i + 1, c.name, c.description))
        .collect::<Vec<_>>()
        .join("\n");

    let example = rubric
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. 0.8 ({})", i + 1, c.name))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Evaluate the companion's reply.

User said: {user_input}
Companion replied: {reply}

Rate each criterion from 0.0 to 1.0:
{criteria}

Respond in this format:
{example}

Overall: 0.8
"#,
    )
}

/// Recover a rating from the judge's text.
///
/// Prefers a labeled overall score and falls back to the first bare
/// number. The result is clamped to `[0, 1]`.
pub fn parse_reward(text: &str) -> Option<f64> {
    let lower = text.to_lowercase();

    let labeled = OVERALL_LABELS
        .iter()
        .find_map(|label| labeled_number(&lower, label));

    labeled
        .or_else(|| first_number(&lower))
        .map(|score| score.clamp(0.0, 1.0))
}

fn labeled_number(text: &str, label: &str) -> Option<f64> {
    text.match_indices(label).find_map(|(pos, _)| {
        let rest = text[pos + label.len()..].trim_start();
        let rest = rest.strip_prefix(':').or_else(|| rest.strip_prefix('：'))?;
        leading_number(rest.trim_start())
    })
}

fn first_number(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    leading_number(&text[start..])
}

/// Parse `\d+(\.\d*)?` at the start of `s`
fn leading_number(s: &str) -> Option<f64> {
    let int_len = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if int_len == 0 {
        return None;
    }

    let mut end = int_len;
    if s[int_len..].starts_with('.') {
        let frac = &s[int_len + 1..];
        let frac_len = frac.find(|c: char| !c.is_ascii_digit()).unwrap_or(frac.len());
        if frac_len > 0 {
            end = int_len + 1 + frac_len;
        }
    }

    s[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedCompletion;

    #[test]
    fn test_parse_labeled_overall() {
        let text = "1. 0.8 (naturalness)\n2. 0.7 (expressiveness)\n\
                    3. 0.9 (continuity)\n4. 0.8 (relevance)\n\nOverall: 0.75";
        assert_eq!(parse_reward(text), Some(0.75));
    }

    #[test]
    fn test_parse_label_variants() {
        assert_eq!(parse_reward("Overall score: 0.6"), Some(0.6));
        assert_eq!(parse_reward("OVERALL:0.9"), Some(0.9));
        assert_eq!(parse_reward("総合評価: 0.8"), Some(0.8));
        assert_eq!(parse_reward("総合評価：0.4"), Some(0.4));
    }

    #[test]
    fn test_parse_falls_back_to_first_number() {
        assert_eq!(parse_reward("I'd say 0.65 at best"), Some(0.65));
        // an overall mention without a value is skipped
        assert_eq!(parse_reward("overall it was fine, 0.7"), Some(0.7));
    }

    #[test]
    fn test_parse_clamps() {
        assert_eq!(parse_reward("Overall: 7"), Some(1.0));
        assert_eq!(parse_reward("score 3.5 out of 5"), Some(1.0));
    }

    #[test]
    fn test_parse_without_numbers() {
        assert_eq!(parse_reward("lovely reply"), None);
        assert_eq!(parse_reward(""), None);
    }

    #[test]
    fn test_leading_number() {
        assert_eq!(leading_number("0.8 (x)"), Some(0.8));
        assert_eq!(leading_number("1. item"), Some(1.0));
        assert_eq!(leading_number("42"), Some(42.0));
        assert_eq!(leading_number(".5"), None);
    }

    #[test]
    fn test_no_client_is_neutral() {
        let evaluator: RewardEvaluator<ScriptedCompletion> = RewardEvaluator::new(None);
        let reward = tokio_test::block_on(evaluator.evaluate("hi!", "hello"));
        assert_eq!(reward, NEUTRAL_REWARD);
    }

    #[test]
    fn test_unavailable_is_neutral() {
        let client = ScriptedCompletion::new([CompletionOutcome::unavailable("timeout")]);
        let evaluator = RewardEvaluator::new(Some(client));
        assert_eq!(tokio_test::block_on(evaluator.evaluate("hi", "hello")), NEUTRAL_REWARD);
    }

    #[test]
    fn test_unparsable_is_neutral() {
        let evaluator = RewardEvaluator::new(Some(ScriptedCompletion::texts(["great job"])));
        assert_eq!(tokio_test::block_on(evaluator.evaluate("hi", "hello")), NEUTRAL_REWARD);
    }

    #[test]
    fn test_evaluate_uses_judge_score() {
        let client = ScriptedCompletion::texts(["1. 0.9 (naturalness)\nOverall: 0.85"]);
        let evaluator = RewardEvaluator::new(Some(client));
        let reward = tokio_test::block_on(evaluator.evaluate("Jazz is lovely!", "I like jazz"));
        assert_eq!(reward, 0.85);

        let prompts = evaluator.client.as_ref().unwrap().prompts.lock().unwrap();
        let prompt = &prompts[0][1].content;
        assert!(prompt.contains("I like jazz"));
        assert!(prompt.contains("Jazz is lovely!"));
        assert!(prompt.contains("relevance"));
    }
}
