//! Topic-selection bandit
//!
//! Contextual LinUCB over a fixed list of conversation topics:
//! - `features`: arm + context → fixed-length vector
//! - `arm`: per-topic ridge statistics and the rank-one update
//! - `engine`: selection, updates, stats and rolling history
//!
//! Selection and updates are synchronous and never fail; numerical
//! trouble resets the affected arm instead of surfacing an error.

pub mod arm;
pub mod engine;
pub mod features;

pub use arm::{ArmScore, ArmState};
pub use engine::{Decision, TopicBandit, TopicIndex, HISTORY_LIMIT, MIN_ALPHA};
pub use features::{FeatureEncoder, FEATURE_DIM};
