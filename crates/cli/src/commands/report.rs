//! `scaffold report`: Learner progress report.

use super::{CliResult, build_cycle, load_config};
use scaffold_engine::LearningReport;

/// `learner` of `None` reports over the whole log.
pub async fn run(learner: Option<&str>, json: bool, analyze: bool) -> CliResult {
    let config = load_config()?;
    let cycle = build_cycle(&config).await?;

    let report = match (learner, analyze) {
        (Some(learner), true) => cycle.report(learner).await?,
        (Some(learner), false) => cycle.summary(learner).await?,
        (None, true) => cycle.report_all().await?,
        (None, false) => cycle.summary_all().await?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(learner.unwrap_or("all learners"), &report);
    }
    Ok(())
}

pub fn print_report(learner: &str, report: &LearningReport) {
    println!("📊 Learning Report — {learner}");
    println!("==============================");

    if report.units.is_empty() {
        println!("  No leveled interactions yet.");
        return;
    }

    let overall = &report.overall;
    println!("  Units studied:     {}", overall.units_studied);
    println!("  Interactions:      {}", overall.total_interactions);
    println!(
        "  Overall level:     {} ({:.2})",
        overall.overall_level.label(),
        overall.average_level
    );
    if let Some(unit) = &overall.most_discussed_unit {
        println!("  Most discussed:    {unit}");
    }
    if let Some(kind) = overall.main_scaffolding {
        println!("  Main scaffolding:  {}", kind.label());
    }

    println!();
    println!("  Scaffolding distribution:");
    for share in &report.distribution {
        println!(
            "    {:<8} {:>3}  ({:>5.1}%)",
            share.scaffolding.label(),
            share.count,
            share.percentage
        );
    }

    println!();
    println!("  Units:");
    for unit in &report.units {
        println!(
            "    {} — {} ({:.2}), {}, {} interaction(s), last {}",
            unit.unit,
            unit.current_level.label(),
            unit.average_level,
            unit.trend,
            unit.interactions,
            unit.last_studied.format("%Y-%m-%d"),
        );
        if let Some(analysis) = report.weaknesses.get(&unit.unit) {
            println!("      弱點：{}（信心：{}）", analysis.weakness, analysis.confidence);
            for suggestion in &analysis.suggestions {
                println!("      • {suggestion}");
            }
        }
    }

    if !report.timeline.is_empty() {
        println!();
        println!("  Recent timeline:");
        for entry in &report.timeline {
            println!(
                "    {}  {}  {}",
                entry.timestamp.format("%m-%d %H:%M"),
                entry.level.label(),
                entry.unit
            );
        }
    }
}
