//! Taxonomy loading.
//!
//! A taxonomy file is a list of `[[units]]` tables. The built-in course
//! taxonomy is embedded at compile time and used when no path is configured.

use crate::ConfigError;
use scaffold_core::taxonomy::{LearningUnit, Taxonomy};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

const DEFAULT_TAXONOMY: &str = include_str!("default_taxonomy.toml");

#[derive(Debug, Deserialize)]
struct TaxonomyFile {
    #[serde(default)]
    units: Vec<LearningUnit>,
}

/// Parse a taxonomy from TOML text.
pub fn parse_taxonomy(content: &str) -> Result<Taxonomy, ConfigError> {
    let file: TaxonomyFile =
        toml::from_str(content).map_err(|e| ConfigError::Taxonomy(e.to_string()))?;
    validate_units(&file.units)?;
    Ok(Taxonomy::new(file.units))
}

/// Load a taxonomy from a TOML file.
pub fn load_taxonomy(path: &Path) -> Result<Taxonomy, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let taxonomy = parse_taxonomy(&content)?;
    tracing::info!(units = taxonomy.len(), path = %path.display(), "Loaded taxonomy");
    Ok(taxonomy)
}

/// The embedded course taxonomy.
pub fn default_taxonomy() -> Taxonomy {
    // The embedded file is covered by `embedded_taxonomy_is_valid`.
    parse_taxonomy(DEFAULT_TAXONOMY).unwrap_or_default()
}

/// The embedded taxonomy as TOML text (for `onboard`).
pub fn default_taxonomy_toml() -> &'static str {
    DEFAULT_TAXONOMY
}

fn validate_units(units: &[LearningUnit]) -> Result<(), ConfigError> {
    if units.is_empty() {
        return Err(ConfigError::Taxonomy("taxonomy declares no units".into()));
    }

    let mut seen = HashSet::new();
    for unit in units {
        if unit.name.trim().is_empty() {
            return Err(ConfigError::Taxonomy("unit name must not be empty".into()));
        }
        if !seen.insert(unit.name.as_str()) {
            return Err(ConfigError::Taxonomy(format!("duplicate unit name: {}", unit.name)));
        }
        if unit.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::Taxonomy(format!(
                "unit {} has an empty keyword",
                unit.name
            )));
        }
    }

    for unit in units {
        for prereq in &unit.prerequisites {
            if !seen.contains(prereq.as_str()) {
                tracing::warn!(unit = %unit.name, prerequisite = %prereq, "Prerequisite is not a declared unit");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn embedded_taxonomy_is_valid() {
        let tax = parse_taxonomy(DEFAULT_TAXONOMY).unwrap();
        assert!(tax.len() >= 5);
        let prep = tax.get("資料前處理").unwrap();
        assert!(prep.keywords.iter().any(|k| k == "標準化"));
    }

    #[test]
    fn declaration_order_is_kept() {
        let tax = parse_taxonomy(
            r#"
[[units]]
name = "B"
keywords = ["x"]

[[units]]
name = "A"
keywords = ["x"]
difficulty = "進階"
prerequisites = ["B"]
"#,
        )
        .unwrap();
        assert_eq!(tax.units()[0].name, "B");
        assert_eq!(tax.units()[1].difficulty, "進階");
        assert_eq!(tax.units()[1].prerequisites, vec!["B".to_string()]);
    }

    #[test]
    fn duplicate_names_rejected() {
        let err = parse_taxonomy(
            r#"
[[units]]
name = "A"
[[units]]
name = "A"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn empty_taxonomy_rejected() {
        assert!(parse_taxonomy("").is_err());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[[units]]\nname = \"統計\"\nkeywords = [\"平均\"]\n").unwrap();
        let tax = load_taxonomy(file.path()).unwrap();
        assert_eq!(tax.units()[0].name, "統計");
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = load_taxonomy(Path::new("/nonexistent/taxonomy.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }
}
