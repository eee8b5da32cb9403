//! The topic bandit: LinUCB selection and online updates over a fixed
//! list of topics, plus the rolling conversation history the caller
//! uses to build context.

use super::arm::{ArmScore, ArmState, Observation};
use super::features::{ArmSignals, FeatureEncoder, FEATURE_DIM};
use crate::types::{ContextBundle, TopicStats, TurnRecord};
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use ndarray::{Array1, ArrayView1};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use uuid::Uuid;

/// Turns kept in the rolling history
pub const HISTORY_LIMIT: usize = 50;

/// Lower bound on the exploration weight
pub const MIN_ALPHA: f64 = 0.01;

/// Index of a topic, only minted by the engine that owns the topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TopicIndex(pub(crate) usize);

impl TopicIndex {
    pub fn get(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for TopicIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A pending selection.
///
/// Carries the exact feature vector that was scored so that
/// [`TopicBandit::resolve`] trains on it regardless of what happens to
/// the engine in between.
#[derive(Debug, Clone)]
pub struct Decision {
    pub id: Uuid,
    /// Engine that minted this decision
    pub engine_id: Uuid,
    pub index: TopicIndex,
    pub topic: String,
    /// Score of the chosen arm
    pub score: ArmScore,
    /// Scores of every arm, in topic order
    pub scores: Vec<ArmScore>,
    pub selected_at: DateTime<Utc>,
    features: Array1<f64>,
}

impl Decision {
    pub fn features(&self) -> ArrayView1<'_, f64> {
        self.features.view()
    }
}

/// LinUCB topic bandit for one companion session
#[derive(Debug, Clone)]
pub struct TopicBandit {
    id: Uuid,
    topics: Vec<String>,
    arms: Vec<ArmState>,
    encoder: FeatureEncoder,
    alpha: f64,
    total_selections: u64,
    last_features: Vec<Option<Array1<f64>>>,
    history: VecDeque<TurnRecord>,
}

impl TopicBandit {
    /// Create an engine over `topics` with exploration weight `alpha`.
    ///
    /// `alpha` is clamped to at least [`MIN_ALPHA`].
    pub fn new(topics: Vec<String>, alpha: f64) -> Result<Self> {
        if topics.is_empty() {
            bail!("topic bandit needs at least one topic");
        }

        let alpha = if alpha.is_finite() {
            alpha.max(MIN_ALPHA)
        } else {
            MIN_ALPHA
        };

        let encoder = FeatureEncoder::default();
        let arms = topics.iter().map(|_| ArmState::new(encoder.dim())).collect();
        let last_features = vec![None; topics.len()];

        let id = Uuid::new_v4();
        tracing::debug!(engine = %id, topics = topics.len(), alpha, "topic bandit created");

        Ok(Self {
            id,
            topics,
            arms,
            encoder,
            alpha,
            total_selections: 0,
            last_features,
            history: VecDeque::with_capacity(HISTORY_LIMIT),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Selections made so far, including ones never followed by an update
    pub fn total_selections(&self) -> u64 {
        self.total_selections
    }

    /// Validate a raw index against this engine's topics
    pub fn index(&self, raw: i64) -> Option<TopicIndex> {
        usize::try_from(raw)
            .ok()
            .filter(|&i| i < self.topics.len())
            .map(TopicIndex)
    }

    pub fn topic(&self, index: TopicIndex) -> Option<&str> {
        self.topics.get(index.0).map(String::as_str)
    }

    pub fn arm(&self, index: TopicIndex) -> Option<&ArmState> {
        self.arms.get(index.0)
    }

    /// Feature vector for a topic against a context, without side effects
    pub fn encode(
        &self,
        index: TopicIndex,
        context: &ContextBundle,
        now: DateTime<Utc>,
    ) -> Option<Array1<f64>> {
        let arm = self.arms.get(index.0)?;
        let signals = self.signals(index.0, arm);
        Some(self.encoder.encode(signals, self.total_selections, context, now))
    }

    pub fn select(&mut self, context: &ContextBundle) -> Decision {
        self.select_at(context, Utc::now())
    }

    /// Pick the arm with the greatest UCB score; ties go to the lowest index.
    pub fn select_at(&mut self, context: &ContextBundle, now: DateTime<Utc>) -> Decision {
        let mut features = Vec::with_capacity(self.arms.len());
        let mut scores = Vec::with_capacity(self.arms.len());

        for (i, arm) in self.arms.iter().enumerate() {
            let x = self
                .encoder
                .encode(self.signals(i, arm), self.total_selections, context, now);
            scores.push(arm.score(x.view(), self.alpha));
            features.push(x);
        }

        let mut best = 0;
        for (i, score) in scores.iter().enumerate().skip(1) {
            if score.total > scores[best].total {
                best = i;
            }
        }

        let x = features.swap_remove(best);
        self.last_features[best] = Some(x.clone());
        self.arms[best].last_selected_at = Some(now);
        self.total_selections += 1;

        let decision = Decision {
            id: Uuid::new_v4(),
            engine_id: self.id,
            index: TopicIndex(best),
            topic: self.topics[best].clone(),
            score: scores[best],
            scores,
            selected_at: now,
            features: x,
        };

        tracing::debug!(
            decision = %decision.id,
            topic = %decision.topic,
            score = decision.score.total,
            exploitation = decision.score.exploitation,
            exploration = decision.score.exploration,
            "topic selected"
        );

        decision
    }

    /// Fold a reward into a topic's statistics.
    ///
    /// Without explicit `features` the vector scored at the most recent
    /// selection of that topic is reused. Out-of-range indices,
    /// non-finite rewards and wrong-length feature vectors are ignored
    /// with a warning.
    pub fn update(&mut self, index: i64, reward: f64, features: Option<&[f64]>) {
        let Some(index) = self.index(index) else {
            tracing::warn!(
                index,
                topics = self.topics.len(),
                "ignoring update for unknown topic index"
            );
            return;
        };

        let x = match features {
            Some(values) if values.len() != FEATURE_DIM => {
                tracing::warn!(
                    topic = %self.topics[index.0],
                    got = values.len(),
                    expected = FEATURE_DIM,
                    "ignoring update with wrong feature length"
                );
                return;
            }
            Some(values) => Array1::from_vec(values.to_vec()),
            None => match &self.last_features[index.0] {
                Some(x) => x.clone(),
                None => {
                    let arm = &self.arms[index.0];
                    self.encoder
                        .context_free(self.signals(index.0, arm), self.total_selections, Utc::now())
                }
            },
        };

        self.apply(index, reward, x.view());
    }

    /// Settle a pending decision with its reward
    pub fn resolve(&mut self, decision: Decision, reward: f64) {
        if decision.engine_id != self.id {
            tracing::warn!(
                decision = %decision.id,
                engine = %decision.engine_id,
                "ignoring decision from another engine"
            );
            return;
        }
        tracing::debug!(decision = %decision.id, reward, "resolving decision");
        self.apply(decision.index, reward, decision.features.view());
    }

    fn apply(&mut self, index: TopicIndex, reward: f64, x: ArrayView1<'_, f64>) {
        let topic = &self.topics[index.0];
        if !reward.is_finite() {
            tracing::warn!(topic = %topic, reward, "ignoring non-finite reward");
            return;
        }

        match self.arms[index.0].observe(x, reward) {
            Observation::Learned => {
                let count = self.arms[index.0].count;
                tracing::trace!(topic = %topic, reward, count, "arm updated");
            }
            Observation::Reset => {
                tracing::error!(
                    topic = %topic,
                    "design matrix not invertible, arm reset to cold start"
                );
            }
        }
    }

    /// Per-topic counters and reward estimates
    pub fn stats(&self) -> BTreeMap<String, TopicStats> {
        self.topics
            .iter()
            .zip(&self.arms)
            .map(|(topic, arm)| {
                (
                    topic.clone(),
                    TopicStats {
                        count: arm.count,
                        average_reward: arm.average_reward(),
                        expected_reward: arm.value,
                    },
                )
            })
            .collect()
    }

    /// Append a finished turn, evicting the oldest beyond [`HISTORY_LIMIT`]
    pub fn record_turn(&mut self, record: TurnRecord) {
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(record);
    }

    pub fn history(&self) -> impl ExactSizeIterator<Item = &TurnRecord> + '_ {
        self.history.iter()
    }

    /// Text of the last `turns` turns, oldest first
    pub fn recent_context(&self, turns: usize) -> String {
        let skip = self.history.len().saturating_sub(turns);
        self.history
            .iter()
            .skip(skip)
            .flat_map(|r| [r.user_text.as_str(), r.reply_text.as_str()])
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn signals<'a>(&'a self, i: usize, arm: &ArmState) -> ArmSignals<'a> {
        ArmSignals {
            label: &self.topics[i],
            count: arm.count,
            last_selected_at: arm.last_selected_at,
        }
    }
}
