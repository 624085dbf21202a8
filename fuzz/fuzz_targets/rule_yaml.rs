#![no_main]

use libfuzzer_sys::fuzz_target;
use warden_log_pipeline::{RuleEngine, RuleLoader};

fuzz_target!(|data: &[u8]| {
    // YAML 파서는 &str을 받으므로 UTF-8 변환 필요
    if let Ok(yaml_str) = std::str::from_utf8(data) {
        if let Ok(rules) = RuleLoader::parse_yaml(yaml_str, "fuzz-input.yml") {
            // 잘못된 패턴은 건너뛰기만 해야 함
            let total = rules.len();
            let engine = RuleEngine::compile(rules);
            assert_eq!(engine.rule_count() + engine.skipped().len(), total);
        }
    }
});
