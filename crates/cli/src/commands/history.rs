//! `scaffold history`: Show a learner's conversation.

use super::{CliResult, build_cycle, load_config};
use scaffold_core::Role;

pub async fn run(learner: &str) -> CliResult {
    let config = load_config()?;
    let cycle = build_cycle(&config).await?;
    let turns = cycle.history(learner).await?;

    if turns.is_empty() {
        println!("  No conversation for {learner}.");
        return Ok(());
    }

    for turn in &turns {
        let speaker = match turn.role {
            Role::User => "學生",
            Role::Assistant => "老師",
            Role::System => continue,
        };
        let stamp = turn.timestamp.format("%Y-%m-%d %H:%M");
        for (i, line) in turn.content.lines().enumerate() {
            if i == 0 {
                println!("  [{stamp}] {speaker} > {line}");
            } else {
                println!("                     {line}");
            }
        }
    }
    Ok(())
}
