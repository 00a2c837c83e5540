//! Scaffolding strategy classification.
//!
//! The classifier asks the provider to pick one of the three strategies and
//! a level, then canonicalizes whatever comes back. It never returns an error:
//! transport failures, timeouts, empty replies and unreadable replies all
//! degrade to `(Differentiated, prior level, DEGRADED_RATIONALE)`.

use crate::reply::{DEFAULT_TIMEOUT, clip, extract_json_object, field_text, generate_within};
use scaffold_config::ClassifierConfig;
use scaffold_core::level::UnderstandingLevel;
use scaffold_core::provider::Provider;
use scaffold_core::record::{ClassificationResult, ConversationRecord};
use scaffold_core::scaffolding::ScaffoldingType;
use scaffold_core::taxonomy::UnitMatch;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Rationale attached to every fallback decision.
pub const DEGRADED_RATIONALE: &str = "分類服務暫時無法使用，先以差異化鷹架從基礎概念引導。";

/// Longest history message quoted in the prompt.
const HISTORY_MESSAGE_CHARS: usize = 80;

/// Longest free-text rationale kept from an unstructured reply.
const RATIONALE_CHARS: usize = 200;

/// Everything the classifier looks at for one message.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierInput<'a> {
    pub unit: &'a UnitMatch,
    pub prior_level: UnderstandingLevel,
    /// Recent records, oldest first. Only the last `history_window` are used.
    pub history: &'a [ConversationRecord],
    pub message: &'a str,
}

/// Picks a scaffolding strategy for a learner message.
pub struct ScaffoldingClassifier {
    provider: Arc<dyn Provider>,
    model: String,
    config: ClassifierConfig,
    timeout: Duration,
}

impl ScaffoldingClassifier {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self::from_config(provider, model, ClassifierConfig::default())
    }

    pub fn from_config(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        config: ClassifierConfig,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            config,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// How many recent records the prompt summarizes.
    pub fn history_window(&self) -> usize {
        self.config.history_window
    }

    /// Classify one message. Always returns a canonical decision.
    pub async fn classify(&self, input: ClassifierInput<'_>) -> ClassificationResult {
        let unit = input.unit.key().to_string();
        let prompt = self.build_prompt(&input);
        let user_message = format!("學生的提問：{}", input.message);

        let raw = match generate_within(
            self.provider.as_ref(),
            self.timeout,
            &self.model,
            &prompt,
            &user_message,
            self.config.max_tokens,
            self.config.temperature,
        )
        .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(provider = self.provider.name(), error = %e, unit = %unit, "Classification call failed, using fallback");
                return degraded(unit, input.prior_level);
            }
        };

        match parse_reply(&raw, input.prior_level) {
            Some((scaffolding, level, rationale)) => {
                debug!(unit = %unit, scaffolding = scaffolding.as_str(), level = level.as_str(), "Classified message");
                ClassificationResult {
                    unit,
                    scaffolding,
                    level,
                    rationale,
                    degraded: false,
                }
            }
            None => {
                warn!(unit = %unit, chars = raw.chars().count(), "Unreadable classification reply, using fallback");
                degraded(unit, input.prior_level)
            }
        }
    }

    /// The system prompt for one classification call.
    pub fn build_prompt(&self, input: &ClassifierInput<'_>) -> String {
        let mut prompt = String::from(
            "你是一位機器學習課程的教學策略分析師。請根據學生的提問與學習紀錄，判斷最適合的鷹架策略與學生目前的理解程度。\n\n",
        );

        let _ = writeln!(prompt, "學習單元：{}", input.unit.key());
        match input.unit.unit() {
            Some(unit) => {
                let _ = writeln!(prompt, "難度：{}", unit.difficulty);
                let prerequisites = if unit.prerequisites.is_empty() {
                    "無".to_string()
                } else {
                    unit.prerequisites.join("、")
                };
                let _ = writeln!(prompt, "先備單元：{prerequisites}");
            }
            None => {
                let _ = writeln!(prompt, "難度：未分類");
                let _ = writeln!(prompt, "先備單元：無");
            }
        }
        let _ = writeln!(prompt, "推估的先前程度：{}", input.prior_level.label());
        let _ = writeln!(prompt, "目前提問：{}", input.message);

        prompt.push_str("\n近期學習紀錄：\n");
        let start = input.history.len().saturating_sub(self.config.history_window);
        let window = &input.history[start..];
        if window.is_empty() {
            prompt.push_str("（尚無紀錄）\n");
        }
        for record in window {
            let message = if record.message.is_empty() {
                "（已清除）".to_string()
            } else {
                clip(&record.message, HISTORY_MESSAGE_CHARS)
            };
            let _ = writeln!(
                prompt,
                "- 提問：{message}｜單元：{}｜鷹架：{}｜程度：{}",
                record.unit.as_deref().unwrap_or("未知"),
                record.scaffolding.map_or("未知", ScaffoldingType::label),
                record.level.map_or("未知", UnderstandingLevel::label),
            );
        }

        prompt.push_str("\n鷹架策略只能從以下三種擇一：\n");
        for (i, kind) in ScaffoldingType::ALL.iter().enumerate() {
            let _ = writeln!(prompt, "{}. {}：{}", i + 1, kind.label(), kind.criterion());
        }
        prompt.push_str("\n理解程度只能是：初學、中等、熟練。\n\n");
        prompt.push_str("請只回覆一個 JSON 物件，不要加入其他文字：\n");
        prompt.push_str(
            r#"{"scaffolding_type": "差異化鷹架", "understanding_level": "初學", "reason": "一句話說明判斷依據"}"#,
        );
        prompt
    }
}

/// Read a classification reply. `None` when nothing usable is found.
///
/// A JSON object wins when its strategy is a known label, or when a label
/// can be found in the strategy field or the raw text. An unknown level keeps
/// the prior. Without JSON the raw text is scanned for the earliest strategy
/// label. A strategy outside the vocabulary yields `None`.
pub fn parse_reply(
    raw: &str,
    prior_level: UnderstandingLevel,
) -> Option<(ScaffoldingType, UnderstandingLevel, String)> {
    if raw.trim().is_empty() {
        return None;
    }

    if let Some(map) = extract_json_object(raw) {
        let scaffolding = match field_text(&map, "scaffolding_type") {
            Some(label) => ScaffoldingType::recognize(&label).or_else(|| ScaffoldingType::scan(&label)),
            None => ScaffoldingType::scan(raw),
        }?;
        let level = field_text(&map, "understanding_level")
            .and_then(|label| UnderstandingLevel::recognize(&label))
            .unwrap_or(prior_level);
        let rationale = field_text(&map, "reason").unwrap_or_default();
        return Some((scaffolding, level, rationale));
    }

    ScaffoldingType::scan(raw).map(|kind| (kind, prior_level, clip(raw.trim(), RATIONALE_CHARS)))
}

fn degraded(unit: String, prior_level: UnderstandingLevel) -> ClassificationResult {
    ClassificationResult {
        unit,
        scaffolding: ScaffoldingType::Differentiated,
        level: prior_level,
        rationale: DEGRADED_RATIONALE.to_string(),
        degraded: true,
    }
}
