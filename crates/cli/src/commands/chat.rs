//! `scaffold chat`: Interactive or single-message tutoring.

use super::{CliResult, build_cycle, load_config};
use scaffold_config::AppConfig;
use scaffold_core::ChatOutcome;
use scaffold_engine::ChatCycle;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(learner: &str, message: Option<String>, json: bool) -> CliResult {
    let config = load_config()?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  WARNING: No API key configured. Replies will use the offline fallback.");
        eprintln!("  Set SCAFFOLD_API_KEY / OPENAI_API_KEY / OPENROUTER_API_KEY, or edit:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
    }

    let cycle = build_cycle(&config).await?;

    if let Some(msg) = message {
        let outcome = cycle.run(learner, &msg).await?;
        print_outcome(&outcome, json)?;
        return Ok(());
    }

    interactive(&config, &cycle, learner, json).await
}

async fn interactive(config: &AppConfig, cycle: &ChatCycle, learner: &str, json: bool) -> CliResult {
    println!();
    println!("  Scaffold Tutor — Interactive Mode");
    println!();
    println!("  Learner:   {learner}");
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.active_model());
    println!("  Units:     {}", cycle.taxonomy().len());
    println!();
    println!("  Type your question and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        if text.eq_ignore_ascii_case("exit") || text.eq_ignore_ascii_case("quit") {
            break;
        }
        if !text.is_empty() {
            eprint!("  ...");
            match cycle.run(learner, text).await {
                Ok(outcome) => {
                    eprint!("\r     \r");
                    println!();
                    print_outcome(&outcome, json)?;
                    println!();
                }
                Err(e) => {
                    eprint!("\r     \r");
                    eprintln!("  [Error] {e}");
                    println!();
                }
            }
        }
        prompt()?;
    }

    println!();
    println!("  再見！");
    println!();
    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

fn print_outcome(outcome: &ChatOutcome, json: bool) -> CliResult {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    for line in outcome.reply.lines() {
        println!("  Tutor > {line}");
    }
    println!(
        "  [單元：{} | 鷹架：{} | 程度：{}]",
        outcome.learning_unit,
        outcome.scaffolding_type.label(),
        outcome.understanding_level.label()
    );
    Ok(())
}
