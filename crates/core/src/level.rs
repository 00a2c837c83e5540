//! Understanding levels and learning trends.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The quantized learner state, ordinal 1..=3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnderstandingLevel {
    Beginner,
    Intermediate,
    Proficient,
}

/// Recognized spellings per level, compared after [`fold`].
const BEGINNER_VARIANTS: &[&str] = &[
    "beginner", "novice", "basic", "1", "初學", "初学", "初學者", "初学者", "初級", "初级", "入門",
    "入门",
];
const INTERMEDIATE_VARIANTS: &[&str] = &[
    "intermediate", "2", "中等", "中級", "中级", "中階", "中阶",
];
const PROFICIENT_VARIANTS: &[&str] = &[
    "proficient", "advanced", "expert", "3", "熟練", "熟练", "精通", "高級", "高级",
];

impl UnderstandingLevel {
    pub const ALL: [UnderstandingLevel; 3] = [
        UnderstandingLevel::Beginner,
        UnderstandingLevel::Intermediate,
        UnderstandingLevel::Proficient,
    ];

    /// Ordinal value used for averaging.
    pub fn ordinal(self) -> u8 {
        match self {
            UnderstandingLevel::Beginner => 1,
            UnderstandingLevel::Intermediate => 2,
            UnderstandingLevel::Proficient => 3,
        }
    }

    /// Stable machine key (also the serde name).
    pub fn as_str(self) -> &'static str {
        match self {
            UnderstandingLevel::Beginner => "beginner",
            UnderstandingLevel::Intermediate => "intermediate",
            UnderstandingLevel::Proficient => "proficient",
        }
    }

    /// Label shown to learners and used in prompts.
    pub fn label(self) -> &'static str {
        match self {
            UnderstandingLevel::Beginner => "初學",
            UnderstandingLevel::Intermediate => "中等",
            UnderstandingLevel::Proficient => "熟練",
        }
    }

    /// Bucket an average ordinal: < 1.5 beginner, [1.5, 2.5) intermediate, else proficient.
    pub fn from_average(avg: f64) -> Self {
        if avg < 1.5 {
            UnderstandingLevel::Beginner
        } else if avg < 2.5 {
            UnderstandingLevel::Intermediate
        } else {
            UnderstandingLevel::Proficient
        }
    }

    /// Recognize a loosely formatted level label. `None` when unrecognized.
    pub fn recognize(raw: &str) -> Option<Self> {
        let folded = fold(raw);
        let key = folded
            .strip_suffix("level")
            .or_else(|| folded.strip_suffix("程度"))
            .unwrap_or(&folded);

        if BEGINNER_VARIANTS.contains(&key) {
            Some(UnderstandingLevel::Beginner)
        } else if INTERMEDIATE_VARIANTS.contains(&key) {
            Some(UnderstandingLevel::Intermediate)
        } else if PROFICIENT_VARIANTS.contains(&key) {
            Some(UnderstandingLevel::Proficient)
        } else {
            None
        }
    }
}

impl fmt::Display for UnderstandingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lowercase and drop whitespace, quotes, brackets and separator punctuation.
pub(crate) fn fold(raw: &str) -> String {
    raw.chars()
        .filter(|c| {
            !c.is_whitespace()
                && !matches!(
                    c,
                    '"' | '\'' | '`' | '*' | '_' | '-' | ':' | '：' | '「' | '」' | '『' | '』'
                        | '【' | '】' | '(' | ')' | '（' | '）' | '[' | ']' | '.' | '。' | ','
                        | '，'
                )
        })
        .flat_map(char::to_lowercase)
        .collect()
}

/// Direction of recent progress within a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    #[serde(rename = "improving")]
    Improving,
    #[serde(rename = "steady")]
    Steady,
    #[serde(rename = "needs reinforcement")]
    NeedsReinforcement,
}

impl Trend {
    pub fn as_str(self) -> &'static str {
        match self {
            Trend::Improving => "improving",
            Trend::Steady => "steady",
            Trend::NeedsReinforcement => "needs reinforcement",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_boundaries() {
        assert_eq!(UnderstandingLevel::from_average(1.0), UnderstandingLevel::Beginner);
        assert_eq!(UnderstandingLevel::from_average(1.49), UnderstandingLevel::Beginner);
        assert_eq!(UnderstandingLevel::from_average(1.5), UnderstandingLevel::Intermediate);
        assert_eq!(UnderstandingLevel::from_average(2.49), UnderstandingLevel::Intermediate);
        assert_eq!(UnderstandingLevel::from_average(2.5), UnderstandingLevel::Proficient);
    }

    #[test]
    fn recognizes_chinese_and_english_variants() {
        assert_eq!(UnderstandingLevel::recognize("初學"), Some(UnderstandingLevel::Beginner));
        assert_eq!(UnderstandingLevel::recognize(" Beginner "), Some(UnderstandingLevel::Beginner));
        assert_eq!(UnderstandingLevel::recognize("中等程度"), Some(UnderstandingLevel::Intermediate));
        assert_eq!(UnderstandingLevel::recognize("熟练"), Some(UnderstandingLevel::Proficient));
        assert_eq!(UnderstandingLevel::recognize("\"proficient\""), Some(UnderstandingLevel::Proficient));
        assert_eq!(UnderstandingLevel::recognize("3"), Some(UnderstandingLevel::Proficient));
        assert_eq!(UnderstandingLevel::recognize("genius"), None);
        assert_eq!(UnderstandingLevel::recognize(""), None);
    }

    #[test]
    fn labels_and_keys_are_recognized() {
        for level in UnderstandingLevel::ALL {
            assert_eq!(UnderstandingLevel::recognize(level.label()), Some(level));
            assert_eq!(UnderstandingLevel::recognize(level.as_str()), Some(level));
        }
    }

    #[test]
    fn trend_serializes_with_spaced_label() {
        let json = serde_json::to_string(&Trend::NeedsReinforcement).unwrap();
        assert_eq!(json, "\"needs reinforcement\"");
    }
}
