//! Feature encoding for topic arms
//!
//! Layout of the vector (d = 4 + number of emotion labels):
//!
//! ```text
//! [ bias | keyword | popularity | recency | joy sadness anger fear calm ]
//! ```

use crate::types::{ContextBundle, Emotion};
use chrono::{DateTime, Utc};
use ndarray::Array1;

/// Number of emotion labels in the one-hot block
pub const EMOTION_DIM: usize = Emotion::ALL.len();

/// Length of every feature vector
pub const FEATURE_DIM: usize = 4 + EMOTION_DIM;

/// Recency decay constant in seconds
pub const RECENCY_TAU_SECS: f64 = 300.0;

const BIAS: usize = 0;
const KEYWORD: usize = 1;
const POPULARITY: usize = 2;
const RECENCY: usize = 3;
const EMOTION_OFFSET: usize = 4;

/// What the encoder needs to know about one arm
#[derive(Debug, Clone, Copy)]
pub struct ArmSignals<'a> {
    pub label: &'a str,
    pub count: u64,
    pub last_selected_at: Option<DateTime<Utc>>,
}

/// Turns an arm plus a context bundle into a fixed-length vector
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    recency_tau_secs: f64,
}

impl Default for FeatureEncoder {
    fn default() -> Self {
        Self {
            recency_tau_secs: RECENCY_TAU_SECS,
        }
    }
}

impl FeatureEncoder {
    pub fn dim(&self) -> usize {
        FEATURE_DIM
    }

    /// Encode one arm against a context.
    ///
    /// Never fails: missing context fields encode as zeros.
    pub fn encode(
        &self,
        arm: ArmSignals<'_>,
        total_selections: u64,
        context: &ContextBundle,
        now: DateTime<Utc>,
    ) -> Array1<f64> {
        let mut x = Array1::zeros(FEATURE_DIM);

        x[BIAS] = 1.0;
        x[KEYWORD] = keyword_match(arm.label, &context.text);
        x[POPULARITY] = (arm.count as f64 / total_selections.max(1) as f64).clamp(0.0, 1.0);
        x[RECENCY] = arm
            .last_selected_at
            .map(|at| self.recency(at, now))
            .unwrap_or(0.0);

        if let Some(emotion) = context.emotion {
            x[EMOTION_OFFSET + emotion.index()] = 1.0;
        }

        x
    }

    /// Vector for an arm seen against an empty context
    pub fn context_free(
        &self,
        arm: ArmSignals<'_>,
        total_selections: u64,
        now: DateTime<Utc>,
    ) -> Array1<f64> {
        self.encode(arm, total_selections, &ContextBundle::default(), now)
    }

    fn recency(&self, last: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        // Clock skew can put `last` in the future; treat it as "just now".
        let elapsed = (now - last).num_milliseconds().max(0) as f64 / 1000.0;
        (-elapsed / self.recency_tau_secs).exp()
    }
}

fn keyword_match(label: &str, text: &str) -> f64 {
    let label = label.trim().to_lowercase();
    if label.is_empty() {
        return 0.0;
    }
    if text.to_lowercase().contains(&label) {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn signals(label: &str, count: u64, last: Option<DateTime<Utc>>) -> ArmSignals<'_> {
        ArmSignals {
            label,
            count,
            last_selected_at: last,
        }
    }

    #[test]
    fn test_dimension_is_constant() {
        let encoder = FeatureEncoder::default();
        let now = Utc::now();
        let contexts = [
            ContextBundle::default(),
            ContextBundle::text("music all day"),
            ContextBundle::new("", Some(Emotion::Fear)),
            ContextBundle::new("MUSIC", Some(Emotion::Calm)),
        ];

        for ctx in &contexts {
            for arm in [signals("music", 0, None), signals("", 7, Some(now))] {
                let x = encoder.encode(arm, 10, ctx, now);
                assert_eq!(x.len(), FEATURE_DIM);
                assert_eq!(x.len(), 4 + Emotion::ALL.len());
            }
        }
    }

    #[test]
    fn test_keyword_is_case_insensitive() {
        let encoder = FeatureEncoder::default();
        let ctx = ContextBundle::text("Let's talk about FOOD tonight");
        let x = encoder.encode(signals("Food", 0, None), 0, &ctx, Utc::now());
        assert_eq!(x[KEYWORD], 1.0);

        let x = encoder.encode(signals("travel", 0, None), 0, &ctx, Utc::now());
        assert_eq!(x[KEYWORD], 0.0);
    }

    #[test]
    fn test_popularity_uses_total_selections() {
        let encoder = FeatureEncoder::default();
        let ctx = ContextBundle::default();
        let now = Utc::now();

        let x = encoder.encode(signals("a", 3, None), 4, &ctx, now);
        assert!((x[POPULARITY] - 0.75).abs() < 1e-12);

        // Zero selections must not divide by zero
        let x = encoder.encode(signals("a", 0, None), 0, &ctx, now);
        assert_eq!(x[POPULARITY], 0.0);
    }

    #[test]
    fn test_recency_decays() {
        let encoder = FeatureEncoder::default();
        let ctx = ContextBundle::default();
        let now = Utc::now();

        let never = encoder.encode(signals("a", 0, None), 0, &ctx, now);
        assert_eq!(never[RECENCY], 0.0);

        let fresh = encoder.encode(signals("a", 0, Some(now)), 0, &ctx, now);
        assert!((fresh[RECENCY] - 1.0).abs() < 1e-12);

        let old = encoder.encode(signals("a", 0, Some(now - Duration::seconds(300))), 0, &ctx, now);
        assert!((old[RECENCY] - (-1.0f64).exp()).abs() < 1e-9);
        assert!(old[RECENCY] < fresh[RECENCY]);
    }

    #[test]
    fn test_recency_clamps_future_timestamps() {
        let encoder = FeatureEncoder::default();
        let now = Utc::now();
        let skewed = Some(now + Duration::seconds(10));

        let x = encoder.encode(signals("a", 0, skewed), 0, &ContextBundle::default(), now);
        assert_eq!(x[RECENCY], 1.0);
    }

    #[test]
    fn test_emotion_one_hot() {
        let encoder = FeatureEncoder::default();
        let ctx = ContextBundle::new("", Some(Emotion::Anger));
        let x = encoder.encode(signals("a", 0, None), 0, &ctx, Utc::now());

        let block = x.slice(ndarray::s![EMOTION_OFFSET..]);
        assert_eq!(block.sum(), 1.0);
        assert_eq!(x[EMOTION_OFFSET + Emotion::Anger.index()], 1.0);

        let none = encoder.encode(signals("a", 0, None), 0, &ContextBundle::default(), Utc::now());
        assert_eq!(none.slice(ndarray::s![EMOTION_OFFSET..]).sum(), 0.0);
    }
}
