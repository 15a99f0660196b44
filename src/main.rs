use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod catalog;
mod config;
mod error;
mod history;
mod kill_switch;
mod models;
mod report;
mod scoring;
mod session;
mod trend;

use config::{Settings, LIST_WINDOW, TREND_WINDOW};
use models::{AnswerSet, Catalog, TrendSummary};
use session::Session;

#[derive(Parser)]
#[command(name = "strain-check")]
#[command(
    about = "Capacity & strain self-check with run history and kill-switch alerts",
    long_about = None
)]
struct Cli {
    /// Directory holding history.jsonl and, by default, questions.json
    #[arg(long, global = true, env = "STRAIN_BASE", default_value = ".")]
    base: PathBuf,
    /// Question definition file (defaults to <base>/questions.json)
    #[arg(long, global = true, env = "STRAIN_QUESTIONS")]
    questions: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the question definition file
    Check,
    /// Answer the questions, score the run and save it
    Take {
        /// JSON object mapping question id to chosen answer; prompts on stdin when absent
        #[arg(long)]
        answers: Option<PathBuf>,
        #[arg(long, default_value = "")]
        label: String,
        #[arg(long, default_value = "")]
        context: String,
        /// Also write a markdown report
        #[arg(long)]
        report: Option<PathBuf>,
        /// Print the saved history record as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recent runs, newest first
    History {
        #[arg(long, default_value_t = LIST_WINDOW, value_parser = positive_limit)]
        limit: usize,
    },
    /// Show the trend and kill-switch state for recent runs
    Trend {
        #[arg(long, default_value_t = TREND_WINDOW, value_parser = positive_limit)]
        limit: usize,
    },
    /// Export recent runs as CSV
    Export {
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = usize::MAX, value_parser = positive_limit)]
        limit: usize,
    },
}

fn positive_limit(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("limit must be at least 1".to_string()),
        Ok(limit) => Ok(limit),
        Err(err) => Err(err.to_string()),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("STRAIN_LOG")
        .unwrap_or_else(|_| EnvFilter::new("strain_check=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = Settings::resolve(cli.base, cli.questions);

    match cli.command {
        Commands::Check => {
            let catalog = load_catalog(&settings)?;
            if let Some(title) = catalog.extra.get("title").and_then(|t| t.as_str()) {
                println!("{title}");
            }
            println!(
                "{} questions across {} domains ({}).",
                catalog.items.len(),
                catalog.domains().len(),
                catalog.domains().join(", ")
            );
        }
        Commands::Take {
            answers,
            label,
            context,
            report: report_path,
            json,
        } => {
            let catalog = load_catalog(&settings)?;
            let answers = match answers {
                Some(path) => read_answers(&path)?,
                None => prompt_answers(&catalog)?,
            };

            let results = scoring::compute_results(&catalog, &answers)
                .context("failed to score answers")?;
            let store = settings.history();
            let record =
                history::save_run(settings.base(), &label, &context, &answers, &results)
                    .with_context(|| {
                        format!("failed to save run to {}", store.path().display())
                    })?;

            let recent = history::read_history(settings.base(), TREND_WINDOW)
                .context("failed to read history")?;
            let summary = trend::trend(&recent);
            let plan =
                kill_switch::kill_switch_plan(results.band, &results.domain_report, &summary);

            println!("Run saved.");
            println!("{}: {}", results.band, results.band_note);
            println!(
                "Total {}/{}, ratio {:.3}",
                results.total_points, results.max_points, results.ratio
            );
            println!("Domain strain (highest first):");
            for entry in &results.domain_report {
                println!(
                    "- {} {}/{} ratio {:.3}",
                    entry.domain, entry.points, entry.max_points, entry.ratio
                );
            }
            print_trend_and_plan(&summary, &plan);

            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            }

            if let Some(out) = report_path {
                let text = report::build_report(
                    Some(&record.label),
                    &results,
                    &summary,
                    &plan,
                    &recent,
                );
                std::fs::write(&out, text)
                    .with_context(|| format!("failed to write report to {}", out.display()))?;
                println!("Report written to {}.", out.display());
            }
        }
        Commands::History { limit } => {
            let recent = history::read_history(settings.base(), limit)
                .context("failed to read history")?;
            if recent.is_empty() {
                println!("No history yet. Submit your first run.");
                return Ok(());
            }

            println!("Recent runs (newest first):");
            for record in recent.iter().rev() {
                println!("- {}", report::history_line(record));
            }
        }
        Commands::Trend { limit } => {
            let recent = history::read_history(settings.base(), limit)
                .context("failed to read history")?;
            let Some(latest) = recent.last() else {
                println!("No history yet. Submit your first run.");
                return Ok(());
            };

            let summary = trend::trend(&recent);
            let plan =
                kill_switch::kill_switch_plan(latest.band, &latest.domain_report, &summary);
            println!("Latest: {}", report::history_line(latest));
            print_trend_and_plan(&summary, &plan);
        }
        Commands::Export { out, limit } => {
            let recent = history::read_history(settings.base(), limit)
                .context("failed to read history")?;
            let written = report::export_csv(&recent, &out)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Exported {written} runs to {}.", out.display());
        }
    }

    Ok(())
}

fn load_catalog(settings: &Settings) -> anyhow::Result<Catalog> {
    catalog::load_questions(&settings.questions)
        .with_context(|| format!("question file problem: {}", settings.questions.display()))
}

fn read_answers(path: &std::path::Path) -> anyhow::Result<AnswerSet> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read answers from {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("{} must be a JSON object of id -> answer", path.display()))
}

/// Asks each question on stdin. A blank line skips the question.
fn prompt_answers(catalog: &Catalog) -> anyhow::Result<AnswerSet> {
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    let mut session = Session::new();

    while let Some(question) = session.current(catalog) {
        println!();
        println!("Question {}: {}", session.number(), question.prompt);
        for (index, choice) in question.choices.iter().enumerate() {
            println!("  {}) {}", index + 1, choice);
        }
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line.context("failed to read from stdin")?;
        let input = line.trim();

        if input.is_empty() {
            session.skip(catalog);
            continue;
        }

        let choice = match input.parse::<usize>() {
            Ok(n) if (1..=question.choices.len()).contains(&n) => {
                question.choices[n - 1].clone()
            }
            _ => input.to_string(),
        };
        if let Err(err) = session.answer(catalog, &choice) {
            println!("{err}; pick a number from the list.");
        }
    }

    tracing::debug!(answered = session.answers().len(), "questionnaire finished");
    Ok(session.into_answers())
}

fn print_trend_and_plan(summary: &TrendSummary, plan: &models::KillSwitchPlan) {
    let mut text = String::new();
    report::write_trend(&mut text, summary);
    println!("Trend:");
    print!("{text}");

    let mut text = String::new();
    report::write_plan(&mut text, plan);
    println!("Kill switch:");
    print!("{text}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::{Band, Pattern};
    use std::path::Path;

    fn bundled_catalog() -> Catalog {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(config::QUESTIONS_FILE);
        catalog::load_questions(&path).unwrap()
    }

    fn pick(catalog: &Catalog, choice_index: usize) -> AnswerSet {
        catalog
            .items
            .iter()
            .map(|q| (q.id.clone(), q.choices[choice_index].clone()))
            .collect()
    }

    #[test]
    fn bundled_questions_cover_every_playbook_domain() {
        let catalog = bundled_catalog();
        assert_eq!(catalog.domains().len(), 8);
        for domain in catalog.domains() {
            assert_ne!(
                kill_switch::playbook_steps(domain)[0],
                "Cut scope.",
                "{domain} falls back to generic steps"
            );
        }
    }

    #[test]
    fn escalating_runs_trip_the_kill_switch() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = bundled_catalog();

        let mut last = None;
        for choice_index in 0..3 {
            let answers = pick(&catalog, choice_index);
            let results = scoring::compute_results(&catalog, &answers).unwrap();
            history::save_run(dir.path(), "LT", "", &answers, &results).unwrap();
            last = Some(results);
        }
        let results = last.unwrap();
        assert_eq!(results.ratio, 1.0);
        assert_eq!(results.band, Band::Red);

        let recent = history::read_history(dir.path(), TREND_WINDOW).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[1].ratio, 0.5);
        assert_eq!(recent[1].band, Band::Yellow);

        let summary = trend::trend(&recent);
        assert_eq!(
            summary,
            TrendSummary::Ok {
                last_ratio: 1.0,
                prev_mean_ratio: 0.25,
                delta_vs_mean: 0.75,
                last3_pattern: Pattern::Rising,
            }
        );

        let plan = kill_switch::kill_switch_plan(results.band, &results.domain_report, &summary);
        assert!(plan.triggered);
        assert_eq!(plan.reasons.len(), 3);
        let focus: Vec<&str> = plan.focus_domains.iter().map(|f| f.domain.as_str()).collect();
        assert_eq!(focus, vec!["capacity", "feedback"]);
    }

    #[test]
    fn partial_answers_score_only_what_was_answered() {
        let catalog = bundled_catalog();
        let mut answers = AnswerSet::new();
        answers.insert("recovery_1".to_string(), "Depleted".to_string());
        answers.insert("retired_question".to_string(), "Yes".to_string());

        let results = scoring::compute_results(&catalog, &answers).unwrap();
        assert_eq!(results.total_points, 4);
        assert_eq!(results.max_points, 4);
        assert_eq!(results.domain_report.len(), 1);
        assert_eq!(results.domain_report[0].domain, "recovery");
    }

    #[test]
    fn cli_parses_take_options() {
        let cli = Cli::try_parse_from([
            "strain-check",
            "--base",
            "/tmp/strain",
            "take",
            "--answers",
            "a.json",
            "--label",
            "LT",
        ])
        .unwrap();
        assert_eq!(cli.base, PathBuf::from("/tmp/strain"));
        match cli.command {
            Commands::Take { answers, label, json, .. } => {
                assert_eq!(answers, Some(PathBuf::from("a.json")));
                assert_eq!(label, "LT");
                assert!(!json);
            }
            _ => panic!("expected take"),
        }
    }

    #[test]
    fn zero_limit_is_rejected() {
        for command in ["history", "trend", "export"] {
            let mut args = vec!["strain-check", command, "--limit", "0"];
            if command == "export" {
                args.extend(["--out", "runs.csv"]);
            }
            assert!(Cli::try_parse_from(args).is_err(), "{command} accepted --limit 0");
        }

        let cli = Cli::try_parse_from(["strain-check", "history", "--limit", "3"]).unwrap();
        assert!(matches!(cli.command, Commands::History { limit: 3 }));
        let cli = Cli::try_parse_from(["strain-check", "trend"]).unwrap();
        assert!(matches!(cli.command, Commands::Trend { limit: TREND_WINDOW }));
    }
}
