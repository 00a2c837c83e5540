//! Scaffolding strategies and their canonicalization.
//!
//! This is the only place where loose strings from the classification service
//! are trusted. Everything downstream works with [`ScaffoldingType`].

use crate::level::fold;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three pedagogical strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaffoldingType {
    /// Foundational framing for learners unfamiliar with a concept.
    Differentiated,
    /// Consolidation framing for learners needing reinforcement.
    Repetitive,
    /// Exploratory framing for learners ready to integrate and apply.
    Collaborative,
}

/// Affixes dropped before stem lookup ("差異化鷹架" → "差異化").
const AFFIXES: &[&str] = &[
    "scaffolding", "scaffold", "strategy", "type", "鷹架", "鹰架", "支架", "策略", "類型", "类型",
];

const DIFFERENTIATED_STEMS: &[&str] = &[
    "differentiated", "differentiation", "差異化", "差异化", "差異", "差异", "個別化", "个别化",
];
const REPETITIVE_STEMS: &[&str] = &[
    "repetitive", "repetition", "重複性", "重复性", "重複", "重复", "反覆", "反复",
];
const COLLABORATIVE_STEMS: &[&str] = &[
    "collaborative", "collaboration", "cooperative", "合作性", "合作", "協作性", "协作性", "協作",
    "协作",
];

/// Stems per strategy. `recognize` matches them exactly after dropping
/// affixes, `scan` looks for them anywhere in free text.
const STEMS: [(ScaffoldingType, &[&str]); 3] = [
    (ScaffoldingType::Differentiated, DIFFERENTIATED_STEMS),
    (ScaffoldingType::Repetitive, REPETITIVE_STEMS),
    (ScaffoldingType::Collaborative, COLLABORATIVE_STEMS),
];

impl ScaffoldingType {
    pub const ALL: [ScaffoldingType; 3] = [
        ScaffoldingType::Differentiated,
        ScaffoldingType::Repetitive,
        ScaffoldingType::Collaborative,
    ];

    /// Stable machine key (also the serde name).
    pub fn as_str(self) -> &'static str {
        match self {
            ScaffoldingType::Differentiated => "differentiated",
            ScaffoldingType::Repetitive => "repetitive",
            ScaffoldingType::Collaborative => "collaborative",
        }
    }

    /// Canonical label used in prompts and shown to learners.
    pub fn label(self) -> &'static str {
        match self {
            ScaffoldingType::Differentiated => "差異化鷹架",
            ScaffoldingType::Repetitive => "重複性鷹架",
            ScaffoldingType::Collaborative => "合作性鷹架",
        }
    }

    /// The criterion the classifier is asked to apply for this strategy.
    pub fn criterion(self) -> &'static str {
        match self {
            ScaffoldingType::Differentiated => "學生對基礎概念仍不熟悉，需要從基本定義與生活例子開始",
            ScaffoldingType::Repetitive => "學生已接觸過此概念但尚未穩固，需要反覆練習與鞏固",
            ScaffoldingType::Collaborative => "學生已掌握基礎，準備好整合概念並應用到新情境",
        }
    }

    /// Recognize a label variant. `None` when the text is not a known variant.
    pub fn recognize(raw: &str) -> Option<Self> {
        let mut key = fold(raw);
        while let Some(stripped) = AFFIXES.iter().find_map(|affix| {
            key.strip_suffix(affix)
                .or_else(|| key.strip_prefix(affix))
                .filter(|rest| !rest.is_empty())
                .map(str::to_string)
        }) {
            key = stripped;
        }

        STEMS
            .iter()
            .find(|(_, stems)| stems.contains(&key.as_str()))
            .map(|(kind, _)| *kind)
    }

    /// Total, idempotent normalization: unknown input maps to `Differentiated`.
    pub fn normalize(raw: &str) -> Self {
        Self::recognize(raw).unwrap_or(ScaffoldingType::Differentiated)
    }

    /// Find the label that occurs earliest in free text.
    pub fn scan(text: &str) -> Option<Self> {
        let lowered = text.to_lowercase();
        let haystack = lowered.as_str();
        STEMS
            .iter()
            .flat_map(|&(kind, stems)| {
                stems.iter().filter_map(move |stem| haystack.find(*stem).map(|pos| (pos, kind)))
            })
            .min_by_key(|(pos, _)| *pos)
            .map(|(_, kind)| kind)
    }
}

impl fmt::Display for ScaffoldingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
