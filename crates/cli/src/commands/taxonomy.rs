//! `scaffold taxonomy`: Inspect the learning-unit taxonomy.

use super::{CliResult, load_config};
use scaffold_core::UnitMatch;
use scaffold_engine::match_unit;

pub async fn run(resolve: Option<&str>) -> CliResult {
    let config = load_config()?;
    let taxonomy = config.load_taxonomy()?;

    if let Some(text) = resolve {
        match match_unit(text, &taxonomy) {
            UnitMatch::Unit(unit) => {
                println!("  \"{text}\" → {} ({})", unit.name, unit.difficulty);
            }
            UnitMatch::General => println!("  \"{text}\" → general concept"),
        }
        return Ok(());
    }

    println!("📚 Learning Units ({})", taxonomy.len());
    println!("===================");
    for (i, unit) in taxonomy.units().iter().enumerate() {
        println!("  {:>2}. {} [{}]", i + 1, unit.name, unit.difficulty);
        if !unit.keywords.is_empty() {
            println!("      keywords:      {}", unit.keywords.join("、"));
        }
        if !unit.prerequisites.is_empty() {
            println!("      prerequisites: {}", unit.prerequisites.join(" → "));
        }
    }
    Ok(())
}
