//! Learner history aggregation and weakness analysis.
//!
//! [`aggregate`] is pure: it folds a learner's ordered log into per-unit
//! progress, a scaffolding distribution, overall stats and a timeline.
//! [`HistoryAggregator`] adds the provider-backed weakness narratives, one
//! call per unit, where a failing unit never affects the others.
//!
//! Records without a level are ignored throughout.

use crate::estimator::estimate;
use crate::reply::{DEFAULT_TIMEOUT, clip, extract_json_object, field_text, generate_within};
use chrono::{DateTime, Utc};
use scaffold_config::AnalysisConfig;
use scaffold_core::level::{Trend, UnderstandingLevel};
use scaffold_core::message::Message;
use scaffold_core::provider::Provider;
use scaffold_core::record::ConversationRecord;
use scaffold_core::scaffolding::ScaffoldingType;
use scaffold_core::taxonomy::GENERAL_CONCEPT;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How many recent leveled interactions the timeline keeps.
pub const TIMELINE_LEN: usize = 20;

/// Per-unit progress summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitProgress {
    pub unit: String,
    /// Leveled interactions in this unit
    pub interactions: usize,
    /// Mean ordinal over every leveled interaction
    pub average_level: f64,
    /// Bucket of the recent window
    pub current_level: UnderstandingLevel,
    pub trend: Trend,
    pub dominant_scaffolding: Option<ScaffoldingType>,
    pub last_studied: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaffoldingShare {
    pub scaffolding: ScaffoldingType,
    pub count: usize,
    /// Share of all typed interactions, one decimal place
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverallStats {
    pub units_studied: usize,
    pub total_interactions: usize,
    pub average_level: f64,
    pub overall_level: UnderstandingLevel,
    pub most_discussed_unit: Option<String>,
    pub main_scaffolding: Option<ScaffoldingType>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub unit: String,
    pub level: UnderstandingLevel,
    pub timestamp: DateTime<Utc>,
}

/// Everything known about one learner's progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearningReport {
    /// Units in order of first appearance
    pub units: Vec<UnitProgress>,
    pub distribution: Vec<ScaffoldingShare>,
    pub dominant_scaffolding: Option<ScaffoldingType>,
    pub overall: OverallStats,
    /// Oldest first
    pub timeline: Vec<TimelineEntry>,
    /// Filled by [`HistoryAggregator::report`]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub weaknesses: BTreeMap<String, WeaknessAnalysis>,
}

/// How sure the analysis is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn label(self) -> &'static str {
        match self {
            Confidence::Low => "低",
            Confidence::Medium => "中",
            Confidence::High => "高",
        }
    }

    /// Unknown text maps to `Low`.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "高" | "high" => Confidence::High,
            "中" | "medium" | "moderate" => Confidence::Medium,
            _ => Confidence::Low,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A weakness narrative for one unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeaknessAnalysis {
    pub weakness: String,
    pub suggestions: Vec<String>,
    pub confidence: Confidence,
}

impl WeaknessAnalysis {
    /// Returned without calling the provider when a unit has too little history.
    pub fn insufficient() -> Self {
        Self {
            weakness: "互動次數不足，暫時無法判斷弱點。".into(),
            suggestions: vec!["多就這個單元提出問題，累積更多學習紀錄。".into()],
            confidence: Confidence::Low,
        }
    }

    /// Returned when the provider call or its reply fails.
    pub fn failed() -> Self {
        Self {
            weakness: "分析失敗，請稍後再試。".into(),
            suggestions: Vec::new(),
            confidence: Confidence::Low,
        }
    }
}

/// Fold a learner's log (oldest first) into a report.
pub fn aggregate(records: &[ConversationRecord]) -> LearningReport {
    let groups = group_by_unit(records);

    let units: Vec<UnitProgress> = groups
        .iter()
        .map(|(unit, group)| {
            let recent: Vec<_> = group.iter().rev().map(|r| r.level).collect();
            let est = estimate(&recent);
            UnitProgress {
                unit: unit.clone(),
                interactions: group.len(),
                average_level: mean_level(group),
                current_level: est.level,
                trend: est.trend,
                dominant_scaffolding: dominant(group),
                // Groups are never empty
                last_studied: group.last().map_or_else(Utc::now, |r| r.timestamp),
            }
        })
        .collect();

    let leveled: Vec<&ConversationRecord> = records.iter().filter(|r| r.level.is_some()).collect();
    let distribution = distribution(&leveled);
    let dominant_scaffolding = dominant(&leveled);

    let mut most_discussed: Option<&UnitProgress> = None;
    for progress in &units {
        if most_discussed.is_none_or(|best| progress.interactions > best.interactions) {
            most_discussed = Some(progress);
        }
    }

    let average_level = if leveled.is_empty() { 1.0 } else { mean_level(&leveled) };
    let overall = OverallStats {
        units_studied: units.len(),
        total_interactions: leveled.len(),
        average_level,
        overall_level: UnderstandingLevel::from_average(average_level),
        most_discussed_unit: most_discussed.map(|p| p.unit.clone()),
        main_scaffolding: dominant_scaffolding,
    };

    let timeline = leveled[leveled.len().saturating_sub(TIMELINE_LEN)..]
        .iter()
        .filter_map(|r| {
            Some(TimelineEntry {
                unit: unit_key(r).to_string(),
                level: r.level?,
                timestamp: r.timestamp,
            })
        })
        .collect();

    LearningReport {
        units,
        distribution,
        dominant_scaffolding,
        overall,
        timeline,
        weaknesses: BTreeMap::new(),
    }
}

/// Levels of the most recent records in `unit`, most recent first.
pub fn recent_levels(
    records: &[ConversationRecord],
    unit: &str,
    limit: usize,
) -> Vec<Option<UnderstandingLevel>> {
    records
        .iter()
        .rev()
        .filter(|r| r.unit.as_deref() == Some(unit))
        .take(limit)
        .map(|r| r.level)
        .collect()
}

/// The last `limit` records, oldest first.
pub fn recent_history(records: &[ConversationRecord], limit: usize) -> &[ConversationRecord] {
    &records[records.len().saturating_sub(limit)..]
}

/// Alternating learner/tutor turns. Redacted records are left out.
pub fn transcript(records: &[ConversationRecord]) -> Vec<Message> {
    let mut turns = Vec::with_capacity(records.len() * 2);
    for record in records.iter().filter(|r| !r.is_redacted()) {
        let mut question = Message::user(&record.message);
        question.timestamp = record.timestamp;
        let mut answer = Message::assistant(&record.reply);
        answer.timestamp = record.timestamp;
        turns.push(question);
        turns.push(answer);
    }
    turns
}

fn unit_key(record: &ConversationRecord) -> &str {
    record.unit.as_deref().unwrap_or(GENERAL_CONCEPT)
}

/// Leveled records grouped by unit, in order of first appearance.
fn group_by_unit(records: &[ConversationRecord]) -> Vec<(String, Vec<&ConversationRecord>)> {
    let mut groups: Vec<(String, Vec<&ConversationRecord>)> = Vec::new();
    for record in records.iter().filter(|r| r.level.is_some()) {
        let key = unit_key(record);
        match groups.iter_mut().find(|(unit, _)| unit == key) {
            Some((_, group)) => group.push(record),
            None => groups.push((key.to_string(), vec![record])),
        }
    }
    groups
}

fn mean_level(records: &[&ConversationRecord]) -> f64 {
    let ordinals: Vec<f64> = records
        .iter()
        .filter_map(|r| r.level)
        .map(|level| f64::from(level.ordinal()))
        .collect();
    if ordinals.is_empty() {
        return 1.0;
    }
    ordinals.iter().sum::<f64>() / ordinals.len() as f64
}

fn scaffolding_counts(records: &[&ConversationRecord]) -> [usize; 3] {
    let mut counts = [0; 3];
    for kind in records.iter().filter_map(|r| r.scaffolding) {
        if let Some(i) = ScaffoldingType::ALL.iter().position(|k| *k == kind) {
            counts[i] += 1;
        }
    }
    counts
}

/// Most frequent type; ties go to the earlier of Differentiated, Repetitive,
/// Collaborative.
fn dominant(records: &[&ConversationRecord]) -> Option<ScaffoldingType> {
    let counts = scaffolding_counts(records);
    let mut best: Option<(ScaffoldingType, usize)> = None;
    for (kind, count) in ScaffoldingType::ALL.into_iter().zip(counts) {
        if count > 0 && best.is_none_or(|(_, top)| count > top) {
            best = Some((kind, count));
        }
    }
    best.map(|(kind, _)| kind)
}

fn distribution(records: &[&ConversationRecord]) -> Vec<ScaffoldingShare> {
    let counts = scaffolding_counts(records);
    let total: usize = counts.iter().sum();
    ScaffoldingType::ALL
        .into_iter()
        .zip(counts)
        .map(|(scaffolding, count)| ScaffoldingShare {
            scaffolding,
            count,
            percentage: if total == 0 {
                0.0
            } else {
                (count as f64 * 1000.0 / total as f64).round() / 10.0
            },
        })
        .collect()
}

/// Builds full learner reports, including weakness narratives.
pub struct HistoryAggregator {
    provider: Arc<dyn Provider>,
    model: String,
    config: AnalysisConfig,
    timeout: Duration,
}

impl HistoryAggregator {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self::from_config(provider, model, AnalysisConfig::default())
    }

    pub fn from_config(provider: Arc<dyn Provider>, model: impl Into<String>, config: AnalysisConfig) -> Self {
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

    /// [`aggregate`] plus one weakness narrative per unit.
    pub async fn report(&self, records: &[ConversationRecord]) -> LearningReport {
        let mut report = aggregate(records);
        report.weaknesses = self.analyze_weaknesses(records).await;
        report
    }

    /// One narrative per unit with leveled history. Units below the
    /// interaction threshold get a placeholder without a provider call.
    pub async fn analyze_weaknesses(
        &self,
        records: &[ConversationRecord],
    ) -> BTreeMap<String, WeaknessAnalysis> {
        let mut analyses = BTreeMap::new();
        for (unit, group) in group_by_unit(records) {
            let analysis = if group.len() < self.config.min_interactions {
                debug!(unit = %unit, interactions = group.len(), "Too few interactions to analyze");
                WeaknessAnalysis::insufficient()
            } else {
                let window = &group[group.len().saturating_sub(self.config.window)..];
                self.analyze_unit(&unit, window).await
            };
            analyses.insert(unit, analysis);
        }
        analyses
    }

    async fn analyze_unit(&self, unit: &str, window: &[&ConversationRecord]) -> WeaknessAnalysis {
        let system = format!(
            "你是一位機器學習課程的學習診斷老師。請根據學生在「{unit}」單元的近期互動，找出最主要的學習弱點，並提出具體可行的建議。\n\
             請只回覆一個 JSON 物件，不要加入其他文字：\n\
             {{\"weakness\": \"一句話描述弱點\", \"suggestions\": [\"建議一\", \"建議二\"], \"confidence\": \"低、中或高\"}}"
        );

        let mut interactions = String::new();
        for (i, record) in window.iter().enumerate() {
            let message = if record.message.is_empty() {
                "（已清除）".to_string()
            } else {
                clip(&record.message, 120)
            };
            let _ = writeln!(
                interactions,
                "{}. 提問：{message}｜鷹架：{}｜程度：{}",
                i + 1,
                record.scaffolding.map_or("未知", ScaffoldingType::label),
                record.level.map_or("未知", UnderstandingLevel::label),
            );
        }

        let raw = match generate_within(
            self.provider.as_ref(),
            self.timeout,
            &self.model,
            &system,
            &interactions,
            self.config.max_tokens,
            self.config.temperature,
        )
        .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(unit, error = %e, "Weakness analysis call failed");
                return WeaknessAnalysis::failed();
            }
        };

        parse_weakness(&raw).unwrap_or_else(|| {
            warn!(unit, "Unreadable weakness analysis reply");
            WeaknessAnalysis::failed()
        })
    }
}

/// Read a `{weakness, suggestions, confidence}` reply.
fn parse_weakness(raw: &str) -> Option<WeaknessAnalysis> {
    let map = extract_json_object(raw)?;
    let weakness = field_text(&map, "weakness").filter(|w| !w.is_empty())?;

    let suggestions = match map.get("suggestions") {
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                serde_json::Value::String(s) => Some(s.trim().to_string()),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    };

    let confidence = field_text(&map, "confidence")
        .map(|c| Confidence::normalize(&c))
        .unwrap_or(Confidence::Low);

    Some(WeaknessAnalysis {
        weakness,
        suggestions,
        confidence,
    })
}
