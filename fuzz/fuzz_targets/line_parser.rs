#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use warden_log_pipeline::{LineRule, RuleEngine};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 규칙 목록 (최대 8개로 제한)
    rules: Vec<FuzzRule>,
    /// 내장 규칙도 함께 평가할지 여부
    with_builtin: bool,
    line: String,
}

#[derive(Arbitrary, Debug)]
struct FuzzRule {
    pattern: String,
    event_kind: String,
    field_names: Vec<String>,
}

fuzz_target!(|input: FuzzInput| {
    let mut rules: Vec<LineRule> = input
        .rules
        .into_iter()
        .take(8)
        .map(|r| LineRule {
            pattern: r.pattern,
            event_kind: r.event_kind,
            field_names: r.field_names.into_iter().take(8).collect(),
        })
        .collect();

    if input.with_builtin {
        rules.extend(RuleEngine::with_default_rules().rules().cloned());
    }

    let engine = RuleEngine::compile(rules);

    // 매칭 결과는 컴파일된 규칙 중 하나를 가리켜야 함
    if let Some(matched) = engine.match_line(&input.line) {
        assert!(matched.rule_index < engine.rule_count());
    }
});
