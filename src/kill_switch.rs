use std::collections::HashMap;
use std::sync::LazyLock;

use crate::models::{Band, DomainReportEntry, FocusDomain, KillSwitchPlan, Pattern, TrendSummary};

pub const RISING_RATIO_THRESHOLD: f64 = 0.55;
pub const SPIKE_DELTA_THRESHOLD: f64 = 0.10;
pub const FOCUS_DOMAIN_COUNT: usize = 2;

const FALLBACK_STEPS: [&str; 3] = ["Cut scope.", "Protect core.", "Reduce complexity."];

static PLAYBOOK: LazyLock<HashMap<&'static str, [&'static str; 3]>> = LazyLock::new(|| {
    HashMap::from([
        (
            "capacity",
            [
                "Cut scope to the smallest shippable unit.",
                "Freeze new commitments for 24 hours.",
                "Protect 1–2 core tasks only.",
            ],
        ),
        (
            "feedback",
            [
                "Stop guessing. Create a single measurable test.",
                "Reduce to one feedback channel.",
                "Shorten the loop (smaller experiments).",
            ],
        ),
        (
            "coherence",
            [
                "Remove context switching: pick one thread and finish a chunk.",
                "Rewrite the goal in one sentence; delete tasks that don’t serve it.",
                "Schedule one deliberate block (no reacting).",
            ],
        ),
        (
            "control",
            [
                "Write the top 3 constraints explicitly.",
                "Make one decision irreversible for today; defer the rest.",
                "Set a hard boundary for time/attention.",
            ],
        ),
        (
            "persistence",
            [
                "Lower pace to sustainable minimum.",
                "Plan only the next 6–12 hours.",
                "If endurance is hours, stop non-essential work immediately.",
            ],
        ),
        (
            "recovery",
            [
                "Mandatory recovery block (20–40 minutes minimum).",
                "Reduce spiral inputs; increase passive recovery.",
                "If severely deprived, do not attempt complex tasks.",
            ],
        ),
        (
            "error",
            [
                "Stop shipping new changes; stabilize and fix leaks.",
                "Add a checklist step before ‘done’.",
                "If rework dominates, reduce complexity and revert risky changes.",
            ],
        ),
        (
            "adaptation",
            [
                "Change one variable at a time.",
                "Prefer simplification over intensity.",
                "If you’re adding complexity, you’re probably losing—cut it.",
            ],
        ),
    ])
});

/// Remediation steps for a domain, or the generic fallback.
pub fn playbook_steps(domain: &str) -> [&'static str; 3] {
    PLAYBOOK.get(domain).copied().unwrap_or(FALLBACK_STEPS)
}

pub fn kill_switch_plan(
    band: Band,
    domain_report: &[DomainReportEntry],
    trend: &TrendSummary,
) -> KillSwitchPlan {
    let mut reasons = Vec::new();

    if band == Band::Red {
        reasons.push("Band is RED (overload).".to_string());
    }

    if let TrendSummary::Ok {
        last_ratio,
        delta_vs_mean,
        last3_pattern,
        ..
    } = trend
    {
        if *last3_pattern == Pattern::Rising && *last_ratio >= RISING_RATIO_THRESHOLD {
            reasons.push("Trend rising with elevated strain.".to_string());
        }
        if *delta_vs_mean >= SPIKE_DELTA_THRESHOLD {
            reasons.push("Sharp spike vs recent baseline.".to_string());
        }
    }

    let mut worst: Vec<&DomainReportEntry> = domain_report.iter().collect();
    worst.sort_by(|a, b| {
        b.ratio
            .partial_cmp(&a.ratio)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let focus_domains = worst
        .into_iter()
        .take(FOCUS_DOMAIN_COUNT)
        .map(|entry| FocusDomain {
            domain: entry.domain.clone(),
            ratio: entry.ratio,
            steps: playbook_steps(&entry.domain)
                .iter()
                .map(|s| s.to_string())
                .collect(),
        })
        .collect();

    if !reasons.is_empty() {
        tracing::debug!(?reasons, "kill switch triggered");
    }

    KillSwitchPlan {
        triggered: !reasons.is_empty(),
        reasons,
        focus_domains,
    }
}
