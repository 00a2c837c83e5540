//! The chat cycle: one learner message in, one persisted outcome out.

use crate::aggregator::{
    HistoryAggregator, LearningReport, aggregate, recent_history, recent_levels, transcript,
};
use crate::classifier::{ClassifierInput, ScaffoldingClassifier};
use crate::estimator::{MAX_LEVELS, estimate};
use crate::matcher::match_unit;
use crate::shaper::{ResponseShaper, ShapeInput};
use scaffold_config::AppConfig;
use scaffold_core::error::Result;
use scaffold_core::log::ConversationLog;
use scaffold_core::message::Message;
use scaffold_core::provider::Provider;
use scaffold_core::record::{ChatOutcome, ConversationRecord};
use scaffold_core::taxonomy::{Taxonomy, UnitMatch};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Runs chat cycles against one taxonomy, log and provider.
///
/// Stages are awaited in order. Provider trouble is absorbed by the
/// classifier and shaper fallbacks, so only log failures surface as errors.
/// Cycles for different learners may run concurrently.
pub struct ChatCycle {
    taxonomy: Taxonomy,
    log: Arc<dyn ConversationLog>,
    classifier: ScaffoldingClassifier,
    shaper: ResponseShaper,
    aggregator: HistoryAggregator,
}

impl ChatCycle {
    pub fn new(
        taxonomy: Taxonomy,
        log: Arc<dyn ConversationLog>,
        classifier: ScaffoldingClassifier,
        shaper: ResponseShaper,
        aggregator: HistoryAggregator,
    ) -> Self {
        Self {
            taxonomy,
            log,
            classifier,
            shaper,
            aggregator,
        }
    }

    /// Wire every stage from configuration, sharing one provider.
    pub fn from_config(
        config: &AppConfig,
        taxonomy: Taxonomy,
        provider: Arc<dyn Provider>,
        log: Arc<dyn ConversationLog>,
    ) -> Self {
        let model = config.active_model();
        let timeout = Duration::from_secs(config.request_timeout_secs);

        let classifier =
            ScaffoldingClassifier::from_config(provider.clone(), model, config.classifier.clone())
                .with_timeout(timeout);
        let shaper = ResponseShaper::from_config(provider.clone(), model, config.shaper.clone())
            .with_timeout(timeout);
        let aggregator = HistoryAggregator::from_config(provider, model, config.analysis.clone())
            .with_timeout(timeout);

        Self::new(taxonomy, log, classifier, shaper, aggregator)
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    /// Run one full cycle for `learner` and persist the outcome.
    pub async fn run(&self, learner: &str, message: &str) -> Result<ChatOutcome> {
        let unit: UnitMatch = match_unit(message, &self.taxonomy);
        let records = self.log.query_ordered(learner).await?;

        let prior = estimate(&recent_levels(&records, unit.key(), MAX_LEVELS));
        let classification = self
            .classifier
            .classify(ClassifierInput {
                unit: &unit,
                prior_level: prior.level,
                history: recent_history(&records, self.classifier.history_window()),
                message,
            })
            .await;

        let reply = self
            .shaper
            .shape(ShapeInput {
                message,
                unit: &classification.unit,
                scaffolding: classification.scaffolding,
                level: classification.level,
            })
            .await;

        let outcome = ChatOutcome {
            reply,
            learning_unit: classification.unit,
            scaffolding_type: classification.scaffolding,
            understanding_level: classification.level,
            rationale: classification.rationale,
        };

        let id = self
            .log
            .append(ConversationRecord::from_outcome(learner, message, &outcome))
            .await?;

        info!(
            learner,
            record = %id,
            unit = %outcome.learning_unit,
            scaffolding = outcome.scaffolding_type.as_str(),
            level = outcome.understanding_level.as_str(),
            prior = prior.level.as_str(),
            degraded = classification.degraded,
            "Chat cycle complete"
        );
        Ok(outcome)
    }

    /// The learner's conversation as alternating turns.
    pub async fn history(&self, learner: &str) -> Result<Vec<Message>> {
        let records = self.log.query_ordered(learner).await?;
        Ok(transcript(&records))
    }

    /// Blank the learner's message and reply text. Returns rows changed.
    pub async fn clear(&self, learner: &str) -> Result<usize> {
        Ok(self.log.redact(learner).await?)
    }

    /// Progress report without weakness narratives; never calls the provider.
    pub async fn summary(&self, learner: &str) -> Result<LearningReport> {
        let records = self.log.query_ordered(learner).await?;
        Ok(aggregate(&records))
    }

    /// Full progress report with weakness narratives.
    pub async fn report(&self, learner: &str) -> Result<LearningReport> {
        let records = self.log.query_ordered(learner).await?;
        Ok(self.aggregator.report(&records).await)
    }

    /// Summary over every learner in the log.
    pub async fn summary_all(&self) -> Result<LearningReport> {
        let records = self.log.query_all().await?;
        Ok(aggregate(&records))
    }

    /// Full report over every learner in the log.
    pub async fn report_all(&self) -> Result<LearningReport> {
        let records = self.log.query_all().await?;
        Ok(self.aggregator.report(&records).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::DEGRADED_RATIONALE;
    use crate::shaper::APOLOGY;
    use crate::test_helpers::{FailingProvider, ScriptedProvider};
    use async_trait::async_trait;
    use scaffold_core::error::{Error, LogError};
    use scaffold_core::taxonomy::LearningUnit;
    use scaffold_core::{ScaffoldingType, UnderstandingLevel};
    use scaffold_store::InMemoryLog;

    fn taxonomy() -> Taxonomy {
        Taxonomy::new(vec![
            LearningUnit {
                name: "資料前處理".into(),
                keywords: vec!["標準化".into(), "缺失值".into()],
                difficulty: "基礎".into(),
                prerequisites: vec![],
            },
            LearningUnit {
                name: "梯度下降".into(),
                keywords: vec!["學習率".into()],
                difficulty: "進階".into(),
                prerequisites: vec!["資料前處理".into()],
            },
        ])
    }

    fn cycle_with(provider: Arc<dyn Provider>, log: Arc<dyn ConversationLog>) -> ChatCycle {
        ChatCycle::from_config(&AppConfig::default(), taxonomy(), provider, log)
    }

    #[tokio::test]
    async fn unavailable_service_degrades_but_completes() {
        let log = Arc::new(InMemoryLog::new());
        let cycle = cycle_with(Arc::new(FailingProvider::network()), log.clone());

        let outcome = cycle.run("amy", "什麼是標準化?").await.unwrap();
        assert_eq!(outcome.learning_unit, "資料前處理");
        assert_eq!(outcome.scaffolding_type, ScaffoldingType::Differentiated);
        assert_eq!(outcome.understanding_level, UnderstandingLevel::Beginner);
        assert_eq!(outcome.rationale, DEGRADED_RATIONALE);
        assert_eq!(outcome.reply, APOLOGY);

        let records = log.query_ordered("amy").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].reply, APOLOGY);
        assert_eq!(records[0].scaffolding, Some(ScaffoldingType::Differentiated));
    }

    #[tokio::test]
    async fn classified_cycle_uses_prior_level_and_history() {
        let log = Arc::new(InMemoryLog::new());
        let provider = Arc::new(ScriptedProvider::new(vec![
            r#"{"scaffolding_type": "重複性鷹架", "understanding_level": "中等", "reason": "第一次"}"#,
            "先回想一下平均值。再除以標準差。",
            r#"{"scaffolding_type": "collaborative", "understanding_level": "proficient", "reason": "進步了"}"#,
            "想想看學習率太大時會發生什麼事？",
        ]));
        let cycle = cycle_with(provider.clone(), log.clone());

        let first = cycle.run("amy", "標準化要減平均嗎").await.unwrap();
        assert_eq!(first.scaffolding_type, ScaffoldingType::Repetitive);
        assert!(first.reply.starts_with("【重點複習】"));

        let second = cycle.run("amy", "學習率怎麼調").await.unwrap();
        assert_eq!(second.learning_unit, "梯度下降");
        assert_eq!(second.scaffolding_type, ScaffoldingType::Collaborative);
        assert_eq!(second.understanding_level, UnderstandingLevel::Proficient);
        assert_eq!(second.reply, "想想看學習率太大時會發生什麼事？");

        // Second classification saw the first exchange in its history and
        // a beginner prior for the new unit
        let prompt = provider.system_prompt(2);
        assert!(prompt.contains("標準化要減平均嗎"));
        assert!(prompt.contains("推估的先前程度：初學"));

        assert_eq!(log.count("amy").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn history_and_clear() {
        let log = Arc::new(InMemoryLog::new());
        let cycle = cycle_with(Arc::new(FailingProvider::network()), log.clone());
        cycle.run("amy", "缺失值怎麼補").await.unwrap();
        cycle.run("bob", "hello").await.unwrap();

        let turns = cycle.history("amy").await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content, "缺失值怎麼補");

        assert_eq!(cycle.clear("amy").await.unwrap(), 1);
        assert_eq!(cycle.clear("amy").await.unwrap(), 0);
        assert!(cycle.history("amy").await.unwrap().is_empty());
        assert_eq!(log.count("amy").await.unwrap(), 1);
        assert_eq!(cycle.history("bob").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn report_reflects_cycles() {
        let log = Arc::new(InMemoryLog::new());
        let cycle = cycle_with(Arc::new(FailingProvider::network()), log);
        cycle.run("amy", "標準化是什麼").await.unwrap();
        cycle.run("amy", "那正規化呢").await.unwrap();

        let report = cycle.report("amy").await.unwrap();
        assert_eq!(report.overall.total_interactions, 2);
        assert_eq!(report.units[0].unit, "資料前處理");
        assert_eq!(report.units[1].unit, "general concept");
        assert_eq!(report.dominant_scaffolding, Some(ScaffoldingType::Differentiated));
        assert!(!report.weaknesses.is_empty());

        let summary = cycle.summary("amy").await.unwrap();
        assert!(summary.weaknesses.is_empty());
        assert_eq!(summary.units, report.units);
    }

    #[tokio::test]
    async fn global_report_spans_learners() {
        let log = Arc::new(InMemoryLog::new());
        let cycle = cycle_with(Arc::new(FailingProvider::network()), log);
        cycle.run("amy", "標準化是什麼").await.unwrap();
        cycle.run("bob", "學習率怎麼調").await.unwrap();

        let summary = cycle.summary_all().await.unwrap();
        assert_eq!(summary.overall.total_interactions, 2);
        let units: Vec<_> = summary.units.iter().map(|u| u.unit.as_str()).collect();
        assert_eq!(units, vec!["資料前處理", "梯度下降"]);

        let report = cycle.report_all().await.unwrap();
        assert_eq!(report.units, summary.units);
        assert_eq!(report.weaknesses.len(), 2);
        assert_eq!(cycle.summary("amy").await.unwrap().overall.total_interactions, 1);
    }

    struct BrokenLog;

    #[async_trait]
    impl ConversationLog for BrokenLog {
        fn name(&self) -> &str {
            "broken"
        }
        async fn append(&self, _record: ConversationRecord) -> std::result::Result<String, LogError> {
            Err(LogError::Storage("disk full".into()))
        }
        async fn query_ordered(&self, _learner: &str) -> std::result::Result<Vec<ConversationRecord>, LogError> {
            Ok(vec![])
        }
        async fn query_all(&self) -> std::result::Result<Vec<ConversationRecord>, LogError> {
            Ok(vec![])
        }
        async fn redact(&self, _learner: &str) -> std::result::Result<usize, LogError> {
            Err(LogError::Storage("read only".into()))
        }
        async fn count(&self, _learner: &str) -> std::result::Result<usize, LogError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn log_failure_is_the_only_error() {
        let cycle = cycle_with(Arc::new(FailingProvider::network()), Arc::new(BrokenLog));
        let err = cycle.run("amy", "標準化").await.unwrap_err();
        assert!(matches!(err, Error::Log(LogError::Storage(_))));
        assert!(cycle.clear("amy").await.is_err());
    }
}
