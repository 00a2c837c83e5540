//! `scaffold onboard`: First-time setup.

use super::CliResult;
use scaffold_config::{AppConfig, default_taxonomy_toml};

pub async fn run() -> CliResult {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");
    let taxonomy_path = config_dir.join("taxonomy.toml");

    println!("Scaffold — First-Time Setup");
    println!("===========================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if taxonomy_path.exists() {
        println!("  Taxonomy already exists: {}", taxonomy_path.display());
    } else {
        std::fs::write(&taxonomy_path, default_taxonomy_toml())?;
        println!("✅ Created taxonomy.toml at: {}", taxonomy_path.display());
        println!("   To use it, set [taxonomy] path = \"{}\" in config.toml", taxonomy_path.display());
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
        println!("\n📝 Next steps:");
        println!("   1. Edit {} and add your API key", config_path.display());
        println!("   2. Run: scaffold chat --learner <name>");
        println!("   3. Ask about any unit, e.g. \"什麼是標準化?\"\n");
    }

    Ok(())
}
