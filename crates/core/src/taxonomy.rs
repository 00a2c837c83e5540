//! Learning-unit taxonomy.
//!
//! The taxonomy is an ordered, immutable list of units loaded once at startup
//! and passed explicitly to whoever needs it. Declaration order matters: unit
//! resolution is first-match-by-position.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Sentinel key returned when no unit matches.
pub const GENERAL_CONCEPT: &str = "general concept";

/// A named topic with keywords, a difficulty tier, and prerequisites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningUnit {
    /// Unit name (also the unit key)
    pub name: String,

    /// Keywords that identify the unit in free text
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Difficulty tier label (e.g. "基礎", "進階")
    #[serde(default = "default_difficulty")]
    pub difficulty: String,

    /// Ordered prerequisite unit names
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

fn default_difficulty() -> String {
    "基礎".into()
}

/// An ordered, immutable sequence of learning units.
///
/// Cloning is cheap: the units are shared behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    units: Arc<[LearningUnit]>,
}

impl Taxonomy {
    /// Build a taxonomy from units in declaration order.
    pub fn new(units: Vec<LearningUnit>) -> Self {
        Self {
            units: units.into(),
        }
    }

    /// Units in declaration order.
    pub fn units(&self) -> &[LearningUnit] {
        &self.units
    }

    /// Look up a unit by exact name.
    pub fn get(&self, name: &str) -> Option<&LearningUnit> {
        self.units.iter().find(|u| u.name == name)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// The outcome of resolving text against the taxonomy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitMatch {
    /// A declared unit.
    Unit(LearningUnit),
    /// Nothing matched.
    General,
}

impl UnitMatch {
    /// The unit key: the unit name or [`GENERAL_CONCEPT`].
    pub fn key(&self) -> &str {
        match self {
            UnitMatch::Unit(unit) => &unit.name,
            UnitMatch::General => GENERAL_CONCEPT,
        }
    }

    pub fn unit(&self) -> Option<&LearningUnit> {
        match self {
            UnitMatch::Unit(unit) => Some(unit),
            UnitMatch::General => None,
        }
    }

    pub fn is_general(&self) -> bool {
        matches!(self, UnitMatch::General)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(name: &str) -> LearningUnit {
        LearningUnit {
            name: name.into(),
            keywords: vec![],
            difficulty: "基礎".into(),
            prerequisites: vec![],
        }
    }

    #[test]
    fn taxonomy_preserves_declaration_order() {
        let tax = Taxonomy::new(vec![unit("b"), unit("a")]);
        let names: Vec<_> = tax.units().iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert!(tax.get("a").is_some());
        assert!(tax.get("c").is_none());
    }

    #[test]
    fn general_match_uses_sentinel_key() {
        assert_eq!(UnitMatch::General.key(), GENERAL_CONCEPT);
        assert_eq!(UnitMatch::Unit(unit("迴歸")).key(), "迴歸");
    }

    #[test]
    fn unit_deserializes_with_defaults() {
        let u: LearningUnit = serde_json::from_str(r#"{"name":"迴歸"}"#).unwrap();
        assert!(u.keywords.is_empty());
        assert_eq!(u.difficulty, "基礎");
    }
}
