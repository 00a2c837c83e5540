//! Learning-unit resolution.

use scaffold_core::taxonomy::{Taxonomy, UnitMatch};
use tracing::debug;

/// Resolve free text to a learning unit.
///
/// Units are tried in declaration order. For each unit the name is checked
/// first, then every keyword, as a case-insensitive substring. The first unit
/// that hits wins; nothing matching (including empty text) yields
/// [`UnitMatch::General`].
pub fn match_unit(text: &str, taxonomy: &Taxonomy) -> UnitMatch {
    let haystack = text.to_lowercase();
    if haystack.trim().is_empty() {
        return UnitMatch::General;
    }

    for unit in taxonomy.units() {
        let hit = contains(&haystack, &unit.name)
            || unit.keywords.iter().any(|keyword| contains(&haystack, keyword));
        if hit {
            debug!(unit = %unit.name, "Matched learning unit");
            return UnitMatch::Unit(unit.clone());
        }
    }

    UnitMatch::General
}

fn contains(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    !needle.is_empty() && haystack.contains(&needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scaffold_core::taxonomy::{GENERAL_CONCEPT, LearningUnit};

    fn unit(name: &str, keywords: &[&str]) -> LearningUnit {
        LearningUnit {
            name: name.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            difficulty: "基礎".into(),
            prerequisites: vec![],
        }
    }

    fn taxonomy() -> Taxonomy {
        Taxonomy::new(vec![
            unit("資料前處理", &["標準化", "缺失值", "Normalization"]),
            unit("線性迴歸", &["迴歸", "最小平方法"]),
            unit("邏輯迴歸", &["sigmoid", "分類"]),
        ])
    }

    #[test]
    fn exact_unit_name_matches() {
        let m = match_unit("請問線性迴歸是什麼", &taxonomy());
        assert_eq!(m.key(), "線性迴歸");
    }

    #[test]
    fn keyword_matches_case_insensitively() {
        let m = match_unit("what is NORMALIZATION for?", &taxonomy());
        assert_eq!(m.key(), "資料前處理");

        let m = match_unit("Sigmoid 的輸出範圍?", &taxonomy());
        assert_eq!(m.key(), "邏輯迴歸");
    }

    #[test]
    fn declaration_order_breaks_ties() {
        // "邏輯迴歸" contains the keyword "迴歸" of the earlier unit
        let m = match_unit("邏輯迴歸怎麼訓練", &taxonomy());
        assert_eq!(m.key(), "線性迴歸");
    }

    #[test]
    fn no_match_is_general_concept() {
        for text in ["", "   ", "今天天氣如何"] {
            let m = match_unit(text, &taxonomy());
            assert!(m.is_general());
            assert_eq!(m.key(), GENERAL_CONCEPT);
        }
    }

    #[test]
    fn empty_taxonomy_is_general_concept() {
        assert!(match_unit("標準化", &Taxonomy::default()).is_general());
    }
}
