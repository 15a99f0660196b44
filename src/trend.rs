use crate::models::{HistoryRecord, Pattern, TrendSummary};
use crate::scoring::round3;

pub fn trend(history: &[HistoryRecord]) -> TrendSummary {
    let ratios: Vec<f64> = history.iter().map(|h| h.ratio).collect();
    trend_from_ratios(&ratios)
}

/// Trend over ratios in chronological order. Non-finite values are dropped.
pub fn trend_from_ratios(ratios: &[f64]) -> TrendSummary {
    let ratios: Vec<f64> = ratios.iter().copied().filter(|r| r.is_finite()).collect();
    if ratios.len() < 2 {
        return TrendSummary::Insufficient {
            note: "Need at least 2 runs.".to_string(),
        };
    }
    let last = ratios[ratios.len() - 1];
    let prev = &ratios[..ratios.len() - 1];

    let prev_mean = if prev.is_empty() {
        last
    } else {
        prev.iter().sum::<f64>() / prev.len() as f64
    };

    TrendSummary::Ok {
        last_ratio: round3(last),
        prev_mean_ratio: round3(prev_mean),
        delta_vs_mean: round3(last - prev_mean),
        last3_pattern: last3_pattern(&ratios),
    }
}

fn last3_pattern(ratios: &[f64]) -> Pattern {
    match ratios {
        [.., a, b, c] if c > b && b > a => Pattern::Rising,
        [.., a, b, c] if c < b && b < a => Pattern::Falling,
        [.., _, _, _] => Pattern::Mixed,
        _ => Pattern::Unknown,
    }
}
