use chrono::Utc;

use crate::error::StrainError;
use crate::models::{AnswerSet, Band, BreakdownEntry, Catalog, DomainReportEntry, ScoreResult};

pub const RED_THRESHOLD: f64 = 0.70;
pub const YELLOW_THRESHOLD: f64 = 0.45;

/// Rounds to 3 places, halves to even (0.3125 -> 0.312).
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round_ties_even() / 1000.0
}

fn ratio(points: i64, max_points: i64) -> f64 {
    if max_points == 0 {
        0.0
    } else {
        points as f64 / max_points as f64
    }
}

/// Strain model: a higher ratio is worse.
pub fn band(total: i64, max_total: i64) -> (Band, &'static str) {
    if max_total <= 0 {
        return (Band::Unknown, "No scoring range.");
    }
    band_for_ratio(total as f64 / max_total as f64)
}

pub fn band_for_ratio(ratio: f64) -> (Band, &'static str) {
    if ratio >= RED_THRESHOLD {
        (
            Band::Red,
            "Overload likely. Reduce scope and protect core functions.",
        )
    } else if ratio >= YELLOW_THRESHOLD {
        (Band::Yellow, "Strain rising. Simplify and tighten the loop.")
    } else {
        (Band::Green, "Stable relative to current load.")
    }
}

/// Scores `answers` against `catalog` in catalog order. Questions without an
/// answer are skipped; answers for ids outside the catalog are ignored.
pub fn compute_results(
    catalog: &Catalog,
    answers: &AnswerSet,
) -> Result<ScoreResult, StrainError> {
    let mut breakdown = Vec::new();
    // (domain, points, max) in first-seen order
    let mut domains: Vec<(String, i64, i64)> = Vec::new();
    let mut total = 0i64;
    let mut max_total = 0i64;

    for question in &catalog.items {
        let Some(answer) = answers.get(&question.id) else {
            continue;
        };

        let points = *question
            .weights
            .get(answer)
            .ok_or_else(|| StrainError::UnknownChoice {
                question: question.id.clone(),
                answer: answer.clone(),
            })?;
        let max_points = question.max_weight();

        total += points;
        max_total += max_points;

        match domains.iter_mut().find(|(d, _, _)| *d == question.domain) {
            Some(entry) => {
                entry.1 += points;
                entry.2 += max_points;
            }
            None => domains.push((question.domain.clone(), points, max_points)),
        }

        breakdown.push(BreakdownEntry {
            id: question.id.clone(),
            domain: question.domain.clone(),
            construct: question.construct.clone(),
            answer: answer.clone(),
            points,
        });
    }

    let mut domain_report: Vec<DomainReportEntry> = domains
        .into_iter()
        .map(|(domain, points, max_points)| DomainReportEntry {
            domain,
            points,
            max_points,
            ratio: round3(ratio(points, max_points)),
        })
        .collect();
    // stable: ties keep encounter order
    domain_report.sort_by(|a, b| {
        b.ratio
            .partial_cmp(&a.ratio)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let (band, note) = band(total, max_total);
    tracing::debug!(total, max_total, %band, answered = breakdown.len(), "scored run");

    Ok(ScoreResult {
        ts: Utc::now(),
        total_points: total,
        max_points: max_total,
        ratio: round3(ratio(total, max_total)),
        band,
        band_note: note.to_string(),
        domain_report,
        breakdown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::parse_catalog;
    use serde_json::json;

    fn catalog() -> Catalog {
        parse_catalog(json!({
            "items": [
                {
                    "id": "cap1", "type": "choice", "prompt": "Load?",
                    "choices": ["low", "mid", "high"],
                    "weights": { "low": 0, "mid": 2, "high": 4 },
                    "domain": "capacity"
                },
                {
                    "id": "fb1", "type": "choice", "prompt": "Signal?",
                    "choices": ["clear", "noisy"],
                    "weights": { "clear": 0, "noisy": 3 },
                    "domain": "feedback", "construct": "signal"
                },
                {
                    "id": "cap2", "type": "choice", "prompt": "Backlog?",
                    "choices": ["none", "some"],
                    "weights": { "none": 0, "some": 2 },
                    "domain": "capacity"
                },
                {
                    "id": "gen1", "type": "choice", "prompt": "Sleep?",
                    "choices": ["ok", "bad"],
                    "weights": { "ok": 0, "bad": 1 }
                }
            ]
        }))
        .unwrap()
    }

    fn answers(pairs: &[(&str, &str)]) -> AnswerSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn band_thresholds_are_inclusive() {
        assert_eq!(band(70, 100).0, Band::Red);
        assert_eq!(band(699, 1000).0, Band::Yellow);
        assert_eq!(band(45, 100).0, Band::Yellow);
        assert_eq!(band(449, 1000).0, Band::Green);
        assert_eq!(band(0, 10).0, Band::Green);
        assert_eq!(band(10, 10).0, Band::Red);
    }

    #[test]
    fn zero_range_is_unknown() {
        assert_eq!(band(5, 0), (Band::Unknown, "No scoring range."));
        assert_eq!(band(0, -3).0, Band::Unknown);
    }

    #[test]
    fn totals_match_domain_sums() {
        let result = compute_results(
            &catalog(),
            &answers(&[("cap1", "mid"), ("fb1", "noisy"), ("cap2", "some"), ("gen1", "ok")]),
        )
        .unwrap();

        assert_eq!(result.total_points, 7);
        assert_eq!(result.max_points, 10);
        assert_eq!(result.ratio, 0.7);
        assert_eq!(result.band, Band::Red);

        let points: i64 = result.domain_report.iter().map(|d| d.points).sum();
        let max: i64 = result.domain_report.iter().map(|d| d.max_points).sum();
        assert_eq!(points, result.total_points);
        assert_eq!(max, result.max_points);
        assert_eq!(result.breakdown.len(), 4);
        assert_eq!(result.breakdown[1].construct.as_deref(), Some("signal"));
    }

    #[test]
    fn domain_report_sorted_descending_and_stable() {
        let result = compute_results(
            &catalog(),
            &answers(&[("cap1", "high"), ("fb1", "noisy"), ("cap2", "none"), ("gen1", "ok")]),
        )
        .unwrap();

        let order: Vec<&str> = result
            .domain_report
            .iter()
            .map(|d| d.domain.as_str())
            .collect();
        assert_eq!(order, vec!["feedback", "capacity", "general"]);
        assert_eq!(result.domain_report[1].ratio, 0.667);

        let tied = compute_results(&catalog(), &answers(&[("cap1", "low"), ("fb1", "clear")]))
            .unwrap();
        let order: Vec<&str> = tied.domain_report.iter().map(|d| d.domain.as_str()).collect();
        assert_eq!(order, vec!["capacity", "feedback"]);
    }

    #[test]
    fn unanswered_and_unknown_ids_are_skipped() {
        let result = compute_results(
            &catalog(),
            &answers(&[("fb1", "noisy"), ("not-a-question", "whatever")]),
        )
        .unwrap();
        assert_eq!(result.total_points, 3);
        assert_eq!(result.max_points, 3);
        assert_eq!(result.breakdown.len(), 1);
        assert_eq!(result.domain_report.len(), 1);
    }

    #[test]
    fn empty_answers_have_zero_ratio() {
        let result = compute_results(&catalog(), &AnswerSet::new()).unwrap();
        assert_eq!(result.ratio, 0.0);
        assert_eq!(result.band, Band::Unknown);
        assert!(result.domain_report.is_empty());
    }

    #[test]
    fn undeclared_choice_is_a_lookup_failure() {
        let result = compute_results(&catalog(), &answers(&[("cap1", "extreme")]));
        assert!(matches!(
            result,
            Err(StrainError::UnknownChoice { ref question, ref answer })
                if question == "cap1" && answer == "extreme"
        ));
    }

    #[test]
    fn ratio_is_rounded_to_three_places() {
        let result = compute_results(&catalog(), &answers(&[("cap1", "mid"), ("cap2", "some")]))
            .unwrap();
        // 4 / 6
        assert_eq!(result.ratio, 0.667);
        assert_eq!(result.band, Band::Yellow);

        let result = compute_results(&catalog(), &answers(&[("fb1", "noisy"), ("cap2", "none")]))
            .unwrap();
        // 3 / 5
        assert_eq!(result.ratio, 0.6);
    }

    #[test]
    fn half_way_ratios_round_to_even() {
        let catalog = parse_catalog(json!({
            "items": [{
                "id": "q1", "type": "choice", "prompt": "Load?",
                "choices": ["x", "y"],
                "weights": { "x": 5, "y": 16 },
                "domain": "capacity"
            }]
        }))
        .unwrap();

        let result = compute_results(&catalog, &answers(&[("q1", "x")])).unwrap();
        // 5 / 16 = 0.3125
        assert_eq!(result.ratio, 0.312);
        assert_eq!(result.domain_report[0].ratio, 0.312);
        assert_eq!(round3(0.1875), 0.188);
    }
}
