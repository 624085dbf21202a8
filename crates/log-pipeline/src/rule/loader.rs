//! 규칙 파일 로더 -- YAML 규칙 파일을 디스크에서 로드합니다.
//!
//! 단일 파일 또는 디렉토리 내의 `.yml`/`.yaml` 파일을 파싱합니다.
//! 디렉토리 모드에서는 파일 이름 순서로 로드하여 규칙 순서(first match wins)를
//! 결정적으로 유지하고, 개별 파일 파싱 실패는 경고 로그를 남기고 건너뜁니다.

use std::path::{Path, PathBuf};

use crate::error::LogPipelineError;

use super::types::{LineRule, RuleDocument};

/// 규칙 파일 로더 설정
const MAX_RULE_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB
const MAX_RULES_COUNT: usize = 10_000;

/// 규칙 파일 로더
pub struct RuleLoader;

impl RuleLoader {
    /// 경로가 디렉토리면 [`load_directory`](Self::load_directory),
    /// 파일이면 [`load_file`](Self::load_file)로 로드합니다.
    pub async fn load_path(path: impl AsRef<Path>) -> Result<Vec<LineRule>, LogPipelineError> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| LogPipelineError::RuleLoad {
                path: path.display().to_string(),
                reason: format!("failed to read metadata: {e}"),
            })?;

        if metadata.is_dir() {
            Self::load_directory(path).await
        } else {
            Self::load_file(path).await
        }
    }

    /// 디렉토리에서 모든 YAML 규칙 파일을 파일 이름 순서로 로드합니다.
    ///
    /// # Errors
    /// - 디렉토리를 읽을 수 없는 경우
    /// - 규칙 수가 `MAX_RULES_COUNT`를 초과하는 경우
    pub async fn load_directory(
        dir: impl AsRef<Path>,
    ) -> Result<Vec<LineRule>, LogPipelineError> {
        let dir = dir.as_ref();

        let mut entries =
            tokio::fs::read_dir(dir)
                .await
                .map_err(|e| LogPipelineError::RuleLoad {
                    path: dir.display().to_string(),
                    reason: format!("failed to read directory: {e}"),
                })?;

        let mut files: Vec<PathBuf> = Vec::new();
        while let Some(entry) =
            entries
                .next_entry()
                .await
                .map_err(|e| LogPipelineError::RuleLoad {
                    path: dir.display().to_string(),
                    reason: format!("failed to read directory entry: {e}"),
                })?
        {
            let path = entry.path();

            // .yml / .yaml 확장자만 처리
            let is_yaml = path
                .extension()
                .is_some_and(|ext| ext == "yml" || ext == "yaml");

            if is_yaml {
                files.push(path);
            }
        }
        files.sort();

        let mut rules = Vec::new();
        for path in files {
            match Self::load_file(&path).await {
                Ok(loaded) => rules.extend(loaded),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to load rule file, skipping"
                    );
                }
            }

            if rules.len() > MAX_RULES_COUNT {
                return Err(LogPipelineError::RuleLoad {
                    path: dir.display().to_string(),
                    reason: format!("too many rules: max {MAX_RULES_COUNT}"),
                });
            }
        }

        tracing::info!(
            dir = %dir.display(),
            count = rules.len(),
            "loaded line rules"
        );

        Ok(rules)
    }

    /// 단일 YAML 파일에서 규칙 목록을 로드합니다.
    pub async fn load_file(path: impl AsRef<Path>) -> Result<Vec<LineRule>, LogPipelineError> {
        let path = path.as_ref();

        // 파일 크기 검증
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| LogPipelineError::RuleLoad {
                path: path.display().to_string(),
                reason: format!("failed to read file metadata: {e}"),
            })?;

        if metadata.len() > MAX_RULE_FILE_SIZE {
            return Err(LogPipelineError::RuleLoad {
                path: path.display().to_string(),
                reason: format!(
                    "file too large: {} bytes (max: {MAX_RULE_FILE_SIZE})",
                    metadata.len()
                ),
            });
        }

        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| LogPipelineError::RuleLoad {
                    path: path.display().to_string(),
                    reason: format!("failed to read file: {e}"),
                })?;

        Self::parse_yaml(&content, &path.display().to_string())
    }

    /// YAML 문자열을 파싱하여 규칙 목록을 생성합니다.
    ///
    /// 구조적 검증과 정규식 컴파일은 [`RuleEngine::compile`](super::RuleEngine::compile)에서
    /// 규칙 단위로 수행되므로, 여기서는 문서 형식만 확인합니다.
    pub fn parse_yaml(yaml_str: &str, source: &str) -> Result<Vec<LineRule>, LogPipelineError> {
        if yaml_str.trim().is_empty() {
            return Ok(Vec::new());
        }

        let document: RuleDocument =
            serde_yaml::from_str(yaml_str).map_err(|e| LogPipelineError::RuleLoad {
                path: source.to_owned(),
                reason: format!("YAML parse error: {e}"),
            })?;

        let rules = document.into_rules();
        if rules.len() > MAX_RULES_COUNT {
            return Err(LogPipelineError::RuleLoad {
                path: source.to_owned(),
                reason: format!("too many rules: max {MAX_RULES_COUNT}"),
            });
        }

        Ok(rules)
    }
}
