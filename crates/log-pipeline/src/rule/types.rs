//! 라인 규칙 데이터 타입
//!
//! YAML 규칙 파일에서 역직렬화되는 구조체들을 정의합니다.

use serde::{Deserialize, Serialize};

/// 라인 규칙 -- 출력 라인 하나를 이벤트로 바꾸는 패턴과 메타데이터
///
/// # YAML 스키마
/// ```yaml
/// rules:
///   - pattern: '(\w+) joined the game'
///     event_kind: PlayerJoin
///     field_names: [player_name]
/// ```
///
/// `field_names[i]`는 같은 이름의 named group 이 있으면 그 값을,
/// 없으면 i+1 번째 캡처 그룹의 값을 가져옵니다.
/// `field_names`가 비어 있으면 패턴의 모든 named group 을 필드로 사용합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRule {
    /// 정규식 패턴
    pub pattern: String,
    /// 매칭 시 생성할 이벤트 종류
    pub event_kind: String,
    /// 캡처 그룹 → 필드 이름 (순서 있음)
    #[serde(default)]
    pub field_names: Vec<String>,
}

impl LineRule {
    pub fn new(
        pattern: impl Into<String>,
        event_kind: impl Into<String>,
        field_names: &[&str],
    ) -> Self {
        Self {
            pattern: pattern.into(),
            event_kind: event_kind.into(),
            field_names: field_names.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    /// 패턴 컴파일 전 구조적 유효성을 검증합니다.
    ///
    /// 실패 사유를 문자열로 반환합니다.
    pub fn validate(&self) -> Result<(), String> {
        if self.pattern.is_empty() {
            return Err("pattern must not be empty".to_owned());
        }
        if self.event_kind.trim().is_empty() {
            return Err("event_kind must not be empty".to_owned());
        }
        if self.event_kind.len() > 128 {
            return Err("event_kind must not exceed 128 characters".to_owned());
        }
        for (i, name) in self.field_names.iter().enumerate() {
            if name.is_empty() {
                return Err(format!("field_names[{i}] must not be empty"));
            }
            if self.field_names[..i].contains(name) {
                return Err(format!("duplicate field name '{name}'"));
            }
        }
        Ok(())
    }
}

/// 규칙 파일 문서
///
/// `rules:` 키 아래의 목록과 최상위 목록 형식을 모두 허용합니다.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RuleDocument {
    Wrapped { rules: Vec<LineRule> },
    Bare(Vec<LineRule>),
}

impl RuleDocument {
    pub(crate) fn into_rules(self) -> Vec<LineRule> {
        match self {
            Self::Wrapped { rules } | Self::Bare(rules) => rules,
        }
    }
}
