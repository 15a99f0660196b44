use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DOMAIN: &str = "general";

/// Question id -> chosen choice label. Unanswered questions are absent.
pub type AnswerSet = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub prompt: String,
    pub choices: Vec<String>,
    pub weights: BTreeMap<String, i64>,
    pub domain: String,
    pub construct: Option<String>,
}

impl Question {
    /// Highest weight any choice of this question can award.
    pub fn max_weight(&self) -> i64 {
        self.weights.values().copied().max().unwrap_or(0)
    }
}

/// Validated question set. Top-level fields other than `items` are kept in
/// `extra` so the loaded document keeps its shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub items: Vec<Question>,
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Catalog {
    /// Distinct domains in first-seen order.
    pub fn domains(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for item in &self.items {
            if !seen.contains(&item.domain.as_str()) {
                seen.push(&item.domain);
            }
        }
        seen
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Band {
    Green,
    Yellow,
    Red,
    Unknown,
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Band::Green => "GREEN",
            Band::Yellow => "YELLOW",
            Band::Red => "RED",
            Band::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownEntry {
    pub id: String,
    pub domain: String,
    pub construct: Option<String>,
    pub answer: String,
    pub points: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainReportEntry {
    pub domain: String,
    pub points: i64,
    pub max_points: i64,
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub ts: DateTime<Utc>,
    pub total_points: i64,
    pub max_points: i64,
    pub ratio: f64,
    pub band: Band,
    pub band_note: String,
    pub domain_report: Vec<DomainReportEntry>,
    pub breakdown: Vec<BreakdownEntry>,
}

/// One line of the history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub ts: DateTime<Utc>,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub context: String,
    pub ratio: f64,
    pub band: Band,
    pub total_points: i64,
    pub max_points: i64,
    #[serde(default)]
    pub domain_report: Vec<DomainReportEntry>,
    #[serde(default)]
    pub answers: AnswerSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pattern {
    Rising,
    Falling,
    Mixed,
    Unknown,
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Pattern::Rising => "rising",
            Pattern::Falling => "falling",
            Pattern::Mixed => "mixed",
            Pattern::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TrendSummary {
    Insufficient {
        note: String,
    },
    Ok {
        last_ratio: f64,
        prev_mean_ratio: f64,
        delta_vs_mean: f64,
        last3_pattern: Pattern,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusDomain {
    pub domain: String,
    pub ratio: f64,
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillSwitchPlan {
    pub triggered: bool,
    pub reasons: Vec<String>,
    pub focus_domains: Vec<FocusDomain>,
}
