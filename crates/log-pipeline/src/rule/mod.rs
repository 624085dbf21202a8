//! 규칙 엔진 -- 라인 패턴 컴파일 및 first-match 매칭
//!
//! 규칙은 시작 시 한 번 로드되어 선언 순서대로 컴파일됩니다.
//! 패턴 컴파일에 실패한 규칙은 경고 로그와 함께 건너뛰고 나머지 규칙 로딩은 계속됩니다.
//!
//! # 아키텍처
//! - [`RuleEngine`]: 컴파일된 규칙 목록과 매칭
//! - [`loader`]: YAML 파일 로딩
//! - [`types`]: 규칙 데이터 구조 정의
//! - [`builtin`]: 내장 Minecraft 규칙 세트

pub mod builtin;
pub mod loader;
pub mod types;

pub use loader::RuleLoader;
pub use types::LineRule;

use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;

use crate::error::LogPipelineError;

/// 규칙 매칭 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    /// 매칭된 규칙의 인덱스 (컴파일된 규칙 기준)
    pub rule_index: usize,
    /// 생성할 이벤트 종류
    pub event_kind: String,
    /// 캡처에서 추출한 필드
    pub fields: BTreeMap<String, String>,
}

/// 컴파일하지 못해 건너뛴 규칙
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("rule #{index} ({event_kind}) skipped: {reason}")]
pub struct RuleCompileError {
    /// 입력 목록에서의 인덱스
    pub index: usize,
    pub event_kind: String,
    pub pattern: String,
    pub reason: String,
}

struct CompiledRule {
    rule: LineRule,
    regex: Regex,
}

/// 규칙 엔진
///
/// # 사용 예시
/// ```
/// use warden_log_pipeline::rule::{LineRule, RuleEngine};
///
/// let engine = RuleEngine::compile(vec![LineRule::new(
///     r"(\w+) joined the game",
///     "PlayerJoin",
///     &["player_name"],
/// )]);
///
/// let m = engine
///     .match_line("[12:00:00] [Server thread/INFO]: Alice joined the game")
///     .unwrap();
/// assert_eq!(m.event_kind, "PlayerJoin");
/// assert_eq!(m.fields["player_name"], "Alice");
/// ```
pub struct RuleEngine {
    rules: Vec<CompiledRule>,
    skipped: Vec<RuleCompileError>,
}

impl RuleEngine {
    /// 규칙 없는 엔진을 생성합니다. 모든 라인이 `RawLogLine`이 됩니다.
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// 규칙 목록을 선언 순서대로 컴파일합니다.
    ///
    /// 검증 또는 컴파일에 실패한 규칙은 건너뛰고 [`skipped`](Self::skipped)에 기록합니다.
    pub fn compile(rules: Vec<LineRule>) -> Self {
        let mut compiled = Vec::with_capacity(rules.len());
        let mut skipped = Vec::new();

        for (index, rule) in rules.into_iter().enumerate() {
            let result = rule
                .validate()
                .and_then(|()| Regex::new(&rule.pattern).map_err(|e| e.to_string()));

            match result {
                Ok(regex) => {
                    warn_unresolvable_fields(index, &rule, &regex);
                    compiled.push(CompiledRule { rule, regex });
                }
                Err(reason) => {
                    tracing::warn!(
                        index,
                        event_kind = %rule.event_kind,
                        pattern = %rule.pattern,
                        reason = %reason,
                        "failed to compile line rule, skipping"
                    );
                    skipped.push(RuleCompileError {
                        index,
                        event_kind: rule.event_kind,
                        pattern: rule.pattern,
                        reason,
                    });
                }
            }
        }

        Self {
            rules: compiled,
            skipped,
        }
    }

    /// 내장 규칙 세트로 엔진을 생성합니다.
    pub fn with_default_rules() -> Self {
        Self::compile(builtin::default_rules())
    }

    /// 규칙 경로(파일 또는 디렉토리)와 내장 규칙을 합쳐 엔진을 생성합니다.
    ///
    /// 파일 규칙이 내장 규칙보다 먼저 평가됩니다.
    /// `rules_path`가 비어 있거나 존재하지 않으면 경고 후 파일 규칙 없이 진행합니다.
    pub async fn load(rules_path: &str, builtin_rules: bool) -> Result<Self, LogPipelineError> {
        let mut rules = Vec::new();

        if rules_path.is_empty() {
            tracing::debug!("no rules path configured");
        } else if !Path::new(rules_path).exists() {
            tracing::warn!(path = rules_path, "rules path does not exist, using no file rules");
        } else {
            rules.extend(RuleLoader::load_path(rules_path).await?);
        }

        if builtin_rules {
            rules.extend(builtin::default_rules());
        }

        Ok(Self::compile(rules))
    }

    /// 첫 번째로 매칭되는 규칙의 결과를 반환합니다.
    pub fn match_line(&self, line: &str) -> Option<RuleMatch> {
        self.rules.iter().enumerate().find_map(|(rule_index, compiled)| {
            let captures = compiled.regex.captures(line)?;
            Some(RuleMatch {
                rule_index,
                event_kind: compiled.rule.event_kind.clone(),
                fields: extract_fields(compiled, &captures),
            })
        })
    }

    /// 컴파일된 규칙 수
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// 컴파일된 규칙 목록 (선언 순서)
    pub fn rules(&self) -> impl Iterator<Item = &LineRule> {
        self.rules.iter().map(|c| &c.rule)
    }

    /// 컴파일 실패로 건너뛴 규칙 목록
    pub fn skipped(&self) -> &[RuleCompileError] {
        &self.skipped
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field("rules", &self.rules.len())
            .field("skipped", &self.skipped.len())
            .finish()
    }
}

fn extract_fields(compiled: &CompiledRule, captures: &regex::Captures<'_>) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();

    if compiled.rule.field_names.is_empty() {
        for name in compiled.regex.capture_names().flatten() {
            if let Some(m) = captures.name(name) {
                fields.insert(name.to_owned(), m.as_str().to_owned());
            }
        }
        return fields;
    }

    for (i, name) in compiled.rule.field_names.iter().enumerate() {
        let value = captures.name(name).or_else(|| captures.get(i + 1));
        if let Some(m) = value {
            fields.insert(name.clone(), m.as_str().to_owned());
        }
    }
    fields
}

/// `field_names`의 항목이 named group 도, 위치 그룹도 가리키지 못하면 경고합니다.
fn warn_unresolvable_fields(index: usize, rule: &LineRule, regex: &Regex) {
    let group_count = regex.captures_len() - 1;
    for (i, name) in rule.field_names.iter().enumerate() {
        let named = regex.capture_names().flatten().any(|n| n == name);
        if !named && i + 1 > group_count {
            tracing::warn!(
                index,
                event_kind = %rule.event_kind,
                field = %name,
                "field name has no matching capture group and will never be populated"
            );
        }
    }
}
