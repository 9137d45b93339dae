//! Terminal output utilities

use console::style;
use tagsync_image::{Decision, Outcome, PairReport, RunReport};

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", style("✗").red().bold(), msg);
}

/// Print a warning message
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("⚠").yellow().bold(), msg);
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Print a header
pub fn header(msg: &str) {
    println!("\n{}", style(msg).bold().underlined());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", style(key).dim(), value);
}

/// Print a report as pretty JSON on stdout
pub fn json(report: &RunReport) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// One line per triple, then totals
pub fn report(report: &RunReport) {
    header(if report.dry_run {
        "Reconciliation (dry run)"
    } else {
        "Reconciliation"
    });

    for pair in &report.pairs {
        pair_line(pair, report.dry_run);
    }

    let summary = report.summary;
    let tagged_label = if report.dry_run { "would tag" } else { "tagged" };
    println!();
    kv(tagged_label, &summary.tagged.to_string());
    kv("skipped", &summary.skipped.to_string());
    kv("failed", &summary.failed.to_string());

    if let Some(finished) = report.finished_at {
        let elapsed = finished - report.started_at;
        kv(
            "duration",
            &format!("{:.1}s", elapsed.num_milliseconds() as f64 / 1000.0),
        );
    }
}

fn pair_line(pair: &PairReport, dry_run: bool) {
    let target = format!("{}/{}:{}", pair.registry, pair.repository, pair.tag);
    match &pair.outcome {
        Outcome::Tagged if dry_run => info(&format!("{} would be tagged", target)),
        Outcome::Tagged => success(&format!("{} tagged", target)),
        Outcome::Skipped => println!("  {} {} up to date", style("·").dim(), target),
        Outcome::Failed(err) => error(&format!(
            "{} [{}]: {}",
            target,
            decision_label(pair.decision),
            err
        )),
    }
}

/// Triples whose tag is not at the configured digest
///
/// The all-clear is only printed when every triple was actually checked.
pub fn drift(report: &RunReport) {
    let drifted: Vec<&PairReport> = report.drift().collect();
    if drifted.is_empty() {
        if report.has_failures() {
            warning(&format!(
                "{} of {} tags could not be checked",
                report.summary.failed,
                report.pairs.len()
            ));
        } else {
            success("Every configured tag points at its digest");
        }
        return;
    }

    header("Drift");
    for pair in drifted {
        let digest = pair
            .digest
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| pair.prefix.clone());
        warning(&format!(
            "{}/{}:{} does not point at {}",
            pair.registry, pair.repository, pair.tag, digest
        ));
    }
}

/// Short label for the step a failed triple reached
fn decision_label(decision: Option<Decision>) -> &'static str {
    match decision {
        Some(Decision::Tag) => "tag",
        Some(Decision::SkipAlreadyCorrect) => "skip",
        Some(Decision::SkipNotFound) => "missing",
        Some(Decision::FailAmbiguousPrefix) => "ambiguous",
        Some(Decision::FailPrefixNotFound) => "unknown prefix",
        None => "unavailable",
    }
}
