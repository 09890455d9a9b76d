//! Static scoring tables and sub-score functions
//!
//! Everything here is pure; the resolver combines these into a [`ModelScore`].
//!
//! [`ModelScore`]: super::types::ModelScore

use serde::{Deserialize, Serialize};

use super::types::TaskType;
use crate::catalog::Model;

/// Typical request used to project cost against a budget
pub const TYPICAL_INPUT_TOKENS: u64 = 4_000;
pub const TYPICAL_OUTPUT_TOKENS: u64 = 1_000;

/// Combined (input + output) per-million rate at which the cost score hits zero
pub const DEFAULT_MAX_RATE_CEILING: f64 = 100.0;

/// Quality for models missing from the table
pub const DEFAULT_QUALITY: f64 = 0.80;

/// Largest preference bonus, given to the first model in a task's list
pub const MAX_PREFERENCE_BONUS: f64 = 0.3;

const PREFERENCE_WEIGHT: f64 = 0.2;
const SPEED_WEIGHT: f64 = 0.1;

const QUALITY_TABLE: &[(&str, f64)] = &[
    ("claude-opus-4-20250514", 0.98),
    ("o1", 0.96),
    ("claude-sonnet-4-20250514", 0.95),
    ("gemini-2.5-pro", 0.94),
    ("gpt-4o", 0.90),
    ("claude-3-5-haiku-latest", 0.85),
    ("gemini-2.0-flash", 0.83),
    ("gpt-4o-mini", 0.82),
];

/// Coarse capability class used for speed and cross-vendor equivalence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityTier {
    Premium,
    Standard,
    Fast,
}

impl CapabilityTier {
    /// Keywords identifying a tier from a model id
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Premium => &["opus", "o1", "o3", "ultra"],
            Self::Standard => &["sonnet", "gpt-4o", "gpt-4", "pro"],
            Self::Fast => &["haiku", "mini", "flash", "nano", "lite"],
        }
    }

    /// Classify a model id; fast keywords win over the others ("o1-mini" is fast)
    ///
    /// Keywords match whole id segments, so "mini" does not hit "gemini".
    pub fn classify(model_id: &str) -> Option<Self> {
        let id = model_id.to_lowercase();
        let segments = id_segments(&id);
        [Self::Fast, Self::Premium, Self::Standard]
            .into_iter()
            .find(|tier| {
                tier.keywords().iter().any(|k| {
                    let wanted = id_segments(k);
                    segments.windows(wanted.len()).any(|w| w == wanted.as_slice())
                })
            })
    }
}

fn id_segments(id: &str) -> Vec<&str> {
    id.split(['-', '.', '_']).filter(|s| !s.is_empty()).collect()
}

impl std::fmt::Display for CapabilityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Premium => write!(f, "premium"),
            Self::Standard => write!(f, "standard"),
            Self::Fast => write!(f, "fast"),
        }
    }
}

/// Ordered model preferences for a task type
pub fn task_preferences(task_type: TaskType) -> &'static [&'static str] {
    match task_type {
        TaskType::Coding => &[
            "claude-sonnet-4-20250514",
            "gpt-4o",
            "gemini-2.5-pro",
            "claude-opus-4-20250514",
            "o1",
            "claude-3-5-haiku-latest",
            "gpt-4o-mini",
            "gemini-2.0-flash",
        ],
        TaskType::Reasoning => &[
            "o1",
            "claude-opus-4-20250514",
            "gemini-2.5-pro",
            "claude-sonnet-4-20250514",
            "gpt-4o",
        ],
        TaskType::Chat => &[
            "claude-3-5-haiku-latest",
            "gpt-4o-mini",
            "gemini-2.0-flash",
            "claude-sonnet-4-20250514",
            "gpt-4o",
        ],
        TaskType::Analysis => &[
            "claude-sonnet-4-20250514",
            "gemini-2.5-pro",
            "gpt-4o",
            "claude-opus-4-20250514",
            "o1",
        ],
        TaskType::Creative => &[
            "claude-opus-4-20250514",
            "claude-sonnet-4-20250514",
            "gpt-4o",
            "gemini-2.5-pro",
        ],
        TaskType::Summarization => &[
            "gemini-2.0-flash",
            "claude-3-5-haiku-latest",
            "gpt-4o-mini",
            "gemini-2.5-pro",
            "claude-sonnet-4-20250514",
        ],
    }
}

/// `max(0, 1 - (input + output) / ceiling)`
pub fn cost_score(model: &Model, max_rate_ceiling: f64) -> f64 {
    if max_rate_ceiling <= 0.0 {
        return 0.0;
    }
    let rate = model.input_cost_per_million + model.output_cost_per_million;
    (1.0 - rate / max_rate_ceiling).clamp(0.0, 1.0)
}

/// Static quality lookup
pub fn quality_score(model_id: &str) -> f64 {
    QUALITY_TABLE
        .iter()
        .find(|(id, _)| *id == model_id)
        .map(|(_, q)| *q)
        .unwrap_or(DEFAULT_QUALITY)
}

/// Bonus shrinking linearly with rank in the task's preference list
pub fn preference_bonus(task_type: TaskType, model_id: &str) -> (f64, Option<usize>) {
    let prefs = task_preferences(task_type);
    match prefs.iter().position(|id| *id == model_id) {
        Some(rank) => {
            let bonus = MAX_PREFERENCE_BONUS * (1.0 - rank as f64 / prefs.len() as f64);
            (bonus, Some(rank))
        }
        None => (0.0, None),
    }
}

/// Name based speed heuristic
pub fn speed_score(model_id: &str) -> f64 {
    match CapabilityTier::classify(model_id) {
        Some(CapabilityTier::Fast) => 1.0,
        Some(CapabilityTier::Standard) => 0.7,
        Some(CapabilityTier::Premium) => 0.4,
        None => 0.6,
    }
}

/// Weighted combination of the sub-scores, clamped to [0, 1]
pub fn combine(
    cost: f64,
    quality: f64,
    preference: f64,
    speed: f64,
    cost_weight: f64,
    quality_weight: f64,
) -> f64 {
    let combined = cost * cost_weight
        + quality * quality_weight
        + preference * PREFERENCE_WEIGHT
        + speed * SPEED_WEIGHT;
    combined.clamp(0.0, 1.0)
}

/// Projected cost of a typical request
pub fn typical_request_cost(model: &Model) -> f64 {
    model.estimate_cost(TYPICAL_INPUT_TOKENS, TYPICAL_OUTPUT_TOKENS)
}
