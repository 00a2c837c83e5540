//! Reply generation and post-processing.
//!
//! Each scaffolding type gets a fixed framing (register per level, layout cue
//! and closing directive). The raw completion then goes through:
//!
//! 1. sentence completion, always
//! 2. condensation into a short point list, for the condensed layout
//! 3. code-fence rewriting, when a taught language is configured
//!
//! A failed call yields [`APOLOGY`] and skips post-processing.

use crate::reply::{DEFAULT_TIMEOUT, clip, generate_within};
use regex_lite::{Captures, Regex};
use scaffold_config::{Presentation, ShaperConfig};
use scaffold_core::level::UnderstandingLevel;
use scaffold_core::provider::Provider;
use scaffold_core::scaffolding::ScaffoldingType;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, warn};

/// Returned verbatim when no reply could be generated.
pub const APOLOGY: &str = "抱歉，目前無法產生回覆，請稍後再試。";

const PERSONA: &str = "你是一位有耐心、善於引導的機器學習老師。請用繁體中文回答，語氣像在課堂上啟發學生思考，幫助他們一步步理解概念，不能直接告訴學生最終答案。";

const END_MARKERS: &[&str] = &["<|endoftext|>", "<|im_end|>", "<|eot_id|>", "<|end|>", "</s>", "<eos>"];
const TERMINALS: &[char] = &['.', '!', '?', '。', '！', '？', '…'];
const CLOSERS: &[char] = &['"', '\'', '”', '’', ')', '）', '」', '』', '】', '*'];
const SENTENCE_DELIMITERS: &[char] = &['。', '！', '？', '!', '?', '；', ';', '\n'];
const LIST_DELIMITERS: &[char] = &['、', '，', ','];

const MAX_POINTS: usize = 3;
const MAX_LINE_CHARS: usize = 60;
const MAX_CONDENSED_CHARS: usize = 800;

static BULLET: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:#{1,6}|[-*+•·●▪◦]|[0-9]{1,2}[.)、]|[（(][0-9]{1,2}[)）]|[一二三四五六七八九十]{1,3}、)[ \t]*").ok()
});

static ENUMERATION: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(?:[-*+•·●▪◦]|[0-9]{1,2}(?:[.)](?:[ \t]|$)|、)|[（(][0-9]{1,2}[)）]|[一二三四五六七八九十]{1,3}[、.]|第[一二三四五六七八九十0-9]{1,2}[點个個步、，,：:]|首先|其次|再者|然後|接著|最後)[，,、：:. \t]*").ok()
});

static CODE_FENCE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?s)```[ \t]*([A-Za-z0-9_+#.-]+)[ \t]*\r?\n(.*?)```").ok()
});

/// What the shaper needs to frame one reply.
#[derive(Debug, Clone, Copy)]
pub struct ShapeInput<'a> {
    pub message: &'a str,
    pub unit: &'a str,
    pub scaffolding: ScaffoldingType,
    pub level: UnderstandingLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Prose,
    Condensed,
}

/// Produces the tutor's reply text.
pub struct ResponseShaper {
    provider: Arc<dyn Provider>,
    model: String,
    config: ShaperConfig,
    timeout: Duration,
}

impl ResponseShaper {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self::from_config(provider, model, ShaperConfig::default())
    }

    pub fn from_config(provider: Arc<dyn Provider>, model: impl Into<String>, config: ShaperConfig) -> Self {
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

    fn layout(&self, scaffolding: ScaffoldingType) -> Layout {
        match self.config.presentation {
            Presentation::Prose => Layout::Prose,
            Presentation::Condensed => Layout::Condensed,
            Presentation::Auto if scaffolding == ScaffoldingType::Repetitive => Layout::Condensed,
            Presentation::Auto => Layout::Prose,
        }
    }

    /// Generate and post-process a reply. Never fails.
    pub async fn shape(&self, input: ShapeInput<'_>) -> String {
        let framing = self.framing(&input);
        let raw = match generate_within(
            self.provider.as_ref(),
            self.timeout,
            &self.model,
            &framing,
            input.message,
            self.config.max_tokens,
            self.config.temperature,
        )
        .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(provider = self.provider.name(), error = %e, unit = input.unit, "Reply generation failed");
                return APOLOGY.to_string();
            }
        };

        let reply = self.post_process(&raw, input.scaffolding);
        if reply.is_empty() {
            warn!(unit = input.unit, "Reply was empty after post-processing");
            return APOLOGY.to_string();
        }
        debug!(
            unit = input.unit,
            scaffolding = input.scaffolding.as_str(),
            chars = reply.chars().count(),
            "Shaped reply"
        );
        reply
    }

    /// Apply the post-processing passes to a raw completion.
    pub fn post_process(&self, raw: &str, scaffolding: ScaffoldingType) -> String {
        let mut text = complete_sentences(raw);
        if text.is_empty() {
            return text;
        }
        if self.layout(scaffolding) == Layout::Condensed {
            text = condense(&text, scaffolding);
        }
        if let Some(language) = &self.config.code_language {
            text = normalize_code_fences(&text, language);
        }
        text
    }

    /// The system framing for one reply.
    pub fn framing(&self, input: &ShapeInput<'_>) -> String {
        let layout = self.layout(input.scaffolding);
        let mut parts = vec![
            PERSONA.to_string(),
            format!("本次學習單元：{}。", input.unit),
            register(input.level).to_string(),
            strategy(input.scaffolding).to_string(),
        ];
        parts.push(match layout {
            Layout::Prose => "請以連貫的段落書寫，不要使用條列或標題。".to_string(),
            Layout::Condensed => format!(
                "請先用一句話點出主題，接著列出最多{MAX_POINTS}個要點，每點一句，不要寫長段落。"
            ),
        });
        if let Some(language) = &self.config.code_language {
            parts.push(format!("若需要示範程式碼，請放在 ```{language} 區塊中。"));
        }
        parts.push(closing_directive(input.scaffolding).to_string());
        parts.push("回答請控制在三百字以內，每個句子都要完整結束。".to_string());
        parts.join("\n")
    }
}

fn register(level: UnderstandingLevel) -> &'static str {
    match level {
        UnderstandingLevel::Beginner => {
            "學生目前是初學程度：使用日常用語與生活化的比喻，避免數學符號，一次只介紹一個新名詞。"
        }
        UnderstandingLevel::Intermediate => {
            "學生目前是中等程度：可以使用正確的專有名詞，搭配簡短的公式或範例說明。"
        }
        UnderstandingLevel::Proficient => {
            "學生目前是熟練程度：使用精確的術語與數學表示，著重概念之間的關聯與取捨。"
        }
    }
}

fn strategy(scaffolding: ScaffoldingType) -> &'static str {
    match scaffolding {
        ScaffoldingType::Differentiated => {
            "採用差異化鷹架：從最基本的定義出發，用一個具體例子說明，不要一次丟出太多觀念。"
        }
        ScaffoldingType::Repetitive => {
            "採用重複性鷹架：先重述學生已接觸過的核心概念，再點出容易混淆的地方，幫助他鞏固理解。"
        }
        ScaffoldingType::Collaborative => {
            "採用合作性鷹架：以提問帶出概念之間的關聯，鼓勵學生把概念應用到新的情境。"
        }
    }
}

fn closing_directive(scaffolding: ScaffoldingType) -> &'static str {
    match scaffolding {
        ScaffoldingType::Differentiated => "最後一句必須給出明確的下一步，例如請學生用自己的話重述概念。",
        ScaffoldingType::Repetitive => "最後一句必須提供一個讓學生動手的小練習。",
        ScaffoldingType::Collaborative => "最後一句必須是一個延伸思考的問題。",
    }
}

fn condensed_header(scaffolding: ScaffoldingType) -> &'static str {
    match scaffolding {
        ScaffoldingType::Differentiated => "【基礎引導】",
        ScaffoldingType::Repetitive => "【重點複習】",
        ScaffoldingType::Collaborative => "【延伸探究】",
    }
}

fn condensed_directive(scaffolding: ScaffoldingType) -> &'static str {
    match scaffolding {
        ScaffoldingType::Differentiated => "下一步：試著用自己的話說明這個概念。",
        ScaffoldingType::Repetitive => "練習：找一個例子，套用上面的重點再做一次。",
        ScaffoldingType::Collaborative => "延伸思考：這個概念還能應用在哪些情境？",
    }
}

/// Make sure text ends on a complete sentence.
///
/// Everything from the first end-of-generation marker on is dropped. Text
/// that already ends in terminal punctuation (optionally followed by closing
/// quotes or brackets) or in a closed code fence is returned as is; otherwise
/// it is cut after the last terminal mark or closed fence, or a period is
/// appended when there is none. Marks inside fenced code never count.
pub fn complete_sentences(raw: &str) -> String {
    let cut = END_MARKERS
        .iter()
        .filter_map(|marker| raw.find(marker))
        .min()
        .unwrap_or(raw.len());
    let text = raw[..cut].trim();

    if text.is_empty() {
        return String::new();
    }

    let fences = fenced_spans(text);
    let open_tail = fences.last().filter(|span| !span.closed);
    let ends_in_fence = fences.last().is_some_and(|span| span.closed && span.end == text.len());
    if open_tail.is_none() && (ends_in_fence || is_terminated(text)) {
        return text.to_string();
    }
    if let Some(end) = last_sentence_end(text, &fences) {
        return text[..end].trim_end().to_string();
    }

    let mut out = text.to_string();
    if open_tail.is_some() {
        out.push_str("\n```");
        return out;
    }
    let period = if text.chars().next_back().is_some_and(is_cjk) { '。' } else { '.' };
    out.push(period);
    out
}

/// A fenced code block, from its opening fence to just past its closing one.
/// An unclosed block runs to the end of the text.
#[derive(Debug, Clone, Copy)]
struct FenceSpan {
    start: usize,
    end: usize,
    closed: bool,
}

fn fenced_spans(text: &str) -> Vec<FenceSpan> {
    let mut spans = Vec::new();
    let mut open = None;
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim_start().starts_with("```") {
            match open.take() {
                None => open = Some(offset),
                Some(start) => spans.push(FenceSpan {
                    start,
                    end: offset + line.trim_end().len(),
                    closed: true,
                }),
            }
        }
        offset += line.len();
    }
    if let Some(start) = open {
        spans.push(FenceSpan { start, end: text.len(), closed: false });
    }
    spans
}

fn is_terminated(text: &str) -> bool {
    text.trim_end_matches(CLOSERS).ends_with(TERMINALS)
}

/// Byte offset just past the last sentence end: a terminal mark outside code
/// (plus any closers after it) or a closed fence.
/// A '.' directly followed by a letter or digit ("3.14", "e.g") does not count.
fn last_sentence_end(text: &str, fences: &[FenceSpan]) -> Option<usize> {
    let in_code = |offset: usize| fences.iter().any(|span| (span.start..span.end).contains(&offset));
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut found = fences.iter().filter(|span| span.closed).map(|span| span.end).max();
    for (pos, &(offset, c)) in chars.iter().enumerate() {
        if !TERMINALS.contains(&c) || in_code(offset) {
            continue;
        }
        let next = chars.get(pos + 1).map(|&(_, n)| n);
        if c == '.' && next.is_some_and(|n| n.is_ascii_alphanumeric()) {
            continue;
        }
        let mut end = offset + c.len_utf8();
        for &(o, n) in &chars[pos + 1..] {
            if !CLOSERS.contains(&n) {
                break;
            }
            end = o + n.len_utf8();
        }
        found = found.max(Some(end));
    }
    found
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{3000}'..='\u{303F}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{FF00}'..='\u{FFEF}')
}

/// Rewrite prose into the condensed layout:
///
/// ```text
/// 【重點複習】
/// <title>
/// • <point>   (at most three)
/// <directive>
/// ```
///
/// Title and points are clipped to 60 characters and the whole to 800.
pub fn condense(text: &str, scaffolding: ScaffoldingType) -> String {
    let cleaned = text.replace("**", "");
    let cleaned = match BULLET.as_ref() {
        Some(re) => re.replace_all(&cleaned, "").into_owned(),
        None => cleaned,
    };

    let mut clauses = split_clauses(&cleaned).into_iter();
    let title = clauses.next().map(|c| clip(&c, MAX_LINE_CHARS)).unwrap_or_default();
    let points: Vec<String> = clauses
        .flat_map(|clause| {
            clause
                .split(LIST_DELIMITERS)
                .map(strip_enumeration)
                .filter(|piece| !piece.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .take(MAX_POINTS)
        .map(|point| clip(&point, MAX_LINE_CHARS))
        .collect();

    let mut lines = vec![condensed_header(scaffolding).to_string()];
    if !title.is_empty() {
        lines.push(title);
    }
    lines.extend(points.into_iter().map(|point| format!("• {point}")));
    lines.push(condensed_directive(scaffolding).to_string());

    clip(&lines.join("\n"), MAX_CONDENSED_CHARS)
}

/// Split on sentence delimiters (and ". " in Latin text), dropping
/// enumeration marks and empty clauses.
fn split_clauses(text: &str) -> Vec<String> {
    let mut clauses = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        let latin_stop = c == '.' && chars.peek().is_none_or(|n| n.is_whitespace());
        if SENTENCE_DELIMITERS.contains(&c) || latin_stop {
            push_clause(&mut clauses, &current);
            current.clear();
        } else {
            current.push(c);
        }
    }
    push_clause(&mut clauses, &current);
    clauses
}

fn push_clause(clauses: &mut Vec<String>, raw: &str) {
    let clause = strip_enumeration(raw);
    if !clause.is_empty() {
        clauses.push(clause.to_string());
    }
}

fn strip_enumeration(raw: &str) -> &str {
    let trimmed = raw.trim();
    match ENUMERATION.as_ref().and_then(|re| re.find(trimmed)) {
        Some(m) => trimmed[m.end()..].trim(),
        None => trimmed,
    }
}

/// Turn fenced blocks tagged with `language` into escaped display markup.
/// Blocks in other languages, or without a tag, pass through untouched.
pub fn normalize_code_fences(text: &str, language: &str) -> String {
    let Some(re) = CODE_FENCE.as_ref() else {
        return text.to_string();
    };
    let class = language.trim().to_lowercase();

    re.replace_all(text, |caps: &Captures<'_>| {
        let tag = caps.get(1).map_or("", |m| m.as_str());
        if !tag.eq_ignore_ascii_case(&class) {
            return caps[0].to_string();
        }
        let body = caps.get(2).map_or("", |m| m.as_str()).trim_end_matches(['\n', '\r']);
        format!("<pre><code class=\"language-{class}\">{}</code></pre>", escape_html(body))
    })
    .into_owned()
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
