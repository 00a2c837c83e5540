//! End-to-end integration tests for the Scaffold tutoring pipeline.
//!
//! These tests exercise full chat cycles from learner input to persisted
//! record, against both log backends, with scripted or failing providers.

use std::sync::{Arc, Mutex};

use scaffold_config::{AppConfig, default_taxonomy};
use scaffold_core::error::ProviderError;
use scaffold_core::log::ConversationLog;
use scaffold_core::message::Message;
use scaffold_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use scaffold_core::{ScaffoldingType, UnderstandingLevel};
use scaffold_engine::{APOLOGY, ChatCycle, Confidence, DEGRADED_RATIONALE, WeaknessAnalysis};
use scaffold_store::{InMemoryLog, SqliteLog};

// ── Mock Providers ───────────────────────────────────────────────────────

/// A mock provider that returns scripted replies in sequence.
struct ScriptedProvider {
    replies: Vec<String>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: replies.iter().map(|r| r.to_string()).collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let call = requests.len();
        if call >= self.replies.len() {
            panic!("ScriptedProvider exhausted: call #{call}, have {}", self.replies.len());
        }
        requests.push(request);
        Ok(ProviderResponse {
            message: Message::assistant(&self.replies[call]),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "mock".into(),
        })
    }
}

/// The generation service is down.
struct UnavailableProvider;

#[async_trait::async_trait]
impl Provider for UnavailableProvider {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::ApiError {
            status_code: 503,
            message: "service unavailable".into(),
        })
    }
}

fn cycle(provider: Arc<dyn Provider>, log: Arc<dyn ConversationLog>) -> ChatCycle {
    ChatCycle::from_config(&AppConfig::default(), default_taxonomy(), provider, log)
}

// ── E2E: degraded cycle ──────────────────────────────────────────────────

#[tokio::test]
async fn e2e_first_question_with_service_down() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(SqliteLog::open(&dir.path().join("log.sqlite")).await.unwrap());
    let cycle = cycle(Arc::new(UnavailableProvider), log.clone());

    let outcome = cycle.run("amy", "什麼是標準化?").await.unwrap();

    let taxonomy = default_taxonomy();
    let unit = taxonomy.get(&outcome.learning_unit).expect("declared unit");
    assert!(unit.keywords.iter().any(|k| k == "標準化"));
    assert_eq!(outcome.scaffolding_type, ScaffoldingType::Differentiated);
    assert_eq!(outcome.understanding_level, UnderstandingLevel::Beginner);
    assert_eq!(outcome.rationale, DEGRADED_RATIONALE);
    assert_eq!(outcome.reply, APOLOGY);

    let records = log.query_ordered("amy").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].unit.as_deref(), Some("資料前處理"));
    assert_eq!(records[0].level, Some(UnderstandingLevel::Beginner));
}

#[tokio::test]
async fn e2e_outcome_payload_shape() {
    let cycle = cycle(Arc::new(UnavailableProvider), Arc::new(InMemoryLog::new()));
    let outcome = cycle.run("amy", "今天要學什麼").await.unwrap();

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["learning_unit"], "general concept");
    assert_eq!(json["scaffolding_type"], "differentiated");
    assert_eq!(json["understanding_level"], "beginner");
    assert!(json["reply"].is_string());
    assert!(json["rationale"].is_string());
}

// ── E2E: redaction ───────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_clear_twice_keeps_records() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(SqliteLog::open(&dir.path().join("log.sqlite")).await.unwrap());
    let cycle = cycle(Arc::new(UnavailableProvider), log.clone());

    cycle.run("amy", "缺失值怎麼處理").await.unwrap();
    cycle.run("amy", "梯度是什麼").await.unwrap();
    cycle.run("bob", "決策樹怎麼剪枝").await.unwrap();

    assert_eq!(cycle.clear("amy").await.unwrap(), 2);
    assert_eq!(log.count("amy").await.unwrap(), 2);

    assert_eq!(cycle.clear("amy").await.unwrap(), 0);
    assert_eq!(log.count("amy").await.unwrap(), 2);

    assert!(cycle.history("amy").await.unwrap().is_empty());
    assert_eq!(cycle.history("bob").await.unwrap().len(), 2);

    // Levels survive redaction, so the report still has data
    let summary = cycle.summary("amy").await.unwrap();
    assert_eq!(summary.overall.total_interactions, 2);
}

// ── E2E: full tutoring session ───────────────────────────────────────────

#[tokio::test]
async fn e2e_session_progresses_and_reports() {
    let provider = Arc::new(ScriptedProvider::new(&[
        // cycle 1
        r#"{"scaffolding_type": "差異化鷹架", "understanding_level": "初學", "reason": "第一次接觸"}"#,
        "斜率代表輸入每增加一單位，輸出平均改變多少。你能舉一個生活中的例子嗎？",
        // cycle 2
        "建議使用 Repetitive scaffolding，學生需要鞏固。",
        "複習斜率與截距。斜率、截距、殘差。",
        // cycle 3
        "```json\n{\"scaffolding_type\": \"合作性\", \"understanding_level\": \"熟練\", \"reason\": \"能解釋殘差\"}\n```",
        "如果資料中有離群值，最小平方法的結果會怎麼改變？<|endoftext|>",
        // weakness analysis for 線性迴歸
        r#"{"weakness": "對殘差的意義還不夠熟悉", "suggestions": ["畫出殘差圖"], "confidence": "中"}"#,
    ]));
    let log = Arc::new(InMemoryLog::new());
    let cycle = cycle(provider.clone(), log.clone());

    let first = cycle.run("amy", "線性迴歸的斜率是什麼").await.unwrap();
    assert_eq!(first.learning_unit, "線性迴歸");
    assert_eq!(first.scaffolding_type, ScaffoldingType::Differentiated);
    assert!(first.reply.ends_with('？'));

    let second = cycle.run("amy", "截距呢").await.unwrap();
    assert_eq!(second.learning_unit, "線性迴歸");
    assert_eq!(second.scaffolding_type, ScaffoldingType::Repetitive);
    // Unstructured reply keeps the estimated prior level
    assert_eq!(second.understanding_level, UnderstandingLevel::Beginner);
    assert!(second.reply.starts_with("【重點複習】"));
    assert!(second.reply.lines().filter(|l| l.starts_with("• ")).count() <= 3);

    let third = cycle.run("amy", "最小平方法的殘差").await.unwrap();
    assert_eq!(third.scaffolding_type, ScaffoldingType::Collaborative);
    assert_eq!(third.understanding_level, UnderstandingLevel::Proficient);
    assert_eq!(third.reply, "如果資料中有離群值，最小平方法的結果會怎麼改變？");

    let report = cycle.report("amy").await.unwrap();
    assert_eq!(provider.calls(), 7);
    assert_eq!(report.units.len(), 1);
    assert_eq!(report.units[0].interactions, 3);
    assert_eq!(report.timeline.len(), 3);
    let analysis: &WeaknessAnalysis = &report.weaknesses["線性迴歸"];
    assert_eq!(analysis.weakness, "對殘差的意義還不夠熟悉");
    assert_eq!(analysis.confidence, Confidence::Medium);
}

// ── E2E: configuration ───────────────────────────────────────────────────

#[tokio::test]
async fn e2e_config_file_drives_taxonomy_and_layout() {
    let dir = tempfile::tempdir().unwrap();
    let taxonomy_path = dir.path().join("taxonomy.toml");
    std::fs::write(
        &taxonomy_path,
        r#"
[[units]]
name = "Rust 所有權"
keywords = ["borrow", "借用", "生命週期"]
difficulty = "進階"
"#,
    )
    .unwrap();

    let config_path = dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
default_model = "tutor-model"

[shaper]
presentation = "condensed"

[store]
backend = "memory"

[taxonomy]
path = "{}"
"#,
            taxonomy_path.display().to_string().replace('\\', "\\\\")
        ),
    )
    .unwrap();

    let config = AppConfig::load_from(&config_path).unwrap();
    let taxonomy = config.load_taxonomy().unwrap();
    assert_eq!(taxonomy.len(), 1);

    let provider = Arc::new(ScriptedProvider::new(&[
        r#"{"scaffolding_type": "collaborative", "understanding_level": "intermediate", "reason": "ok"}"#,
        "借用讓你不用轉移所有權。可變借用、不可變借用。",
    ]));
    let cycle = ChatCycle::from_config(&config, taxonomy, provider.clone(), Arc::new(InMemoryLog::new()));

    let outcome = cycle.run("amy", "什麼是 Borrow checker").await.unwrap();
    assert_eq!(outcome.learning_unit, "Rust 所有權");
    assert!(outcome.reply.starts_with("【延伸探究】"));

    let requests = provider.requests.lock().unwrap();
    assert!(requests.iter().all(|r| r.model == "tutor-model"));
    assert_eq!(requests[0].max_tokens, Some(300));
}
