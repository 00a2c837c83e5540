//! `scaffold clear`: Redact a learner's conversation text.

use super::{CliResult, build_cycle, load_config};

pub async fn run(learner: &str) -> CliResult {
    let config = load_config()?;
    let cycle = build_cycle(&config).await?;
    let changed = cycle.clear(learner).await?;

    if changed == 0 {
        println!("  Nothing to clear for {learner}.");
    } else {
        println!("✅ Cleared {changed} conversation(s) for {learner}. Progress data is kept.");
    }
    Ok(())
}
