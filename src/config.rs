use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CatalogResult, ConfigError};

/// 程序配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 题库服务 ---
    pub question_store_base_url: String,
    pub question_store_token: String,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
    /// 被限流时的最大重试次数
    pub max_retries: usize,
    // --- 校验 ---
    /// 是否校验快照学科 / 知识点与题库当前分类一致
    pub strict_taxonomy_check: bool,
    /// 单次批量加题的上限
    pub max_bulk_count: usize,
    // --- 蓝图批处理 ---
    /// 蓝图 TOML 存放目录
    pub blueprint_folder: String,
    /// 同时处理的蓝图数量
    pub max_concurrent_blueprints: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 运行日志文件
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            question_store_base_url: "http://localhost:8000/api/v1".to_string(),
            question_store_token: String::new(),
            request_timeout_secs: 10,
            max_retries: 3,
            strict_taxonomy_check: false,
            max_bulk_count: 200,
            blueprint_folder: "blueprints".to_string(),
            max_concurrent_blueprints: 8,
            verbose_logging: false,
            output_log_file: "catalog_run.log".to_string(),
        }
    }
}

impl Config {
    /// 读取环境变量，未设置或无法解析的项使用默认值
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            question_store_base_url: std::env::var("QUESTION_STORE_BASE_URL").unwrap_or(default.question_store_base_url),
            question_store_token: std::env::var("QUESTION_STORE_TOKEN").unwrap_or(default.question_store_token),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.request_timeout_secs),
            max_retries: std::env::var("MAX_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_retries),
            strict_taxonomy_check: std::env::var("STRICT_TAXONOMY_CHECK").ok().and_then(|v| v.parse().ok()).unwrap_or(default.strict_taxonomy_check),
            max_bulk_count: std::env::var("MAX_BULK_COUNT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_bulk_count),
            blueprint_folder: std::env::var("BLUEPRINT_FOLDER").unwrap_or(default.blueprint_folder),
            max_concurrent_blueprints: std::env::var("MAX_CONCURRENT_BLUEPRINTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent_blueprints),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
        }
    }

    /// 从 TOML 文件读取，缺省字段使用默认值
    pub fn from_toml_file(path: &Path) -> CatalogResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| {
            ConfigError::FileParseFailed {
                path: path.display().to_string(),
                source,
            }
            .into()
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 启动时读取：优先 `CATALOG_CONFIG` 指向的文件，否则读环境变量
    pub fn load() -> CatalogResult<Self> {
        match std::env::var("CATALOG_CONFIG") {
            Ok(path) => Self::from_toml_file(Path::new(&path)),
            Err(_) => Ok(Self::from_env()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml_str(
            r#"
question_store_base_url = "http://questions.internal/api"
strict_taxonomy_check = true
"#,
        )
        .unwrap();
        assert_eq!(config.question_store_base_url, "http://questions.internal/api");
        assert!(config.strict_taxonomy_check);
        assert_eq!(config.max_bulk_count, Config::default().max_bulk_count);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = Config::from_toml_file(Path::new("no/such/config.toml")).unwrap_err();
        assert!(matches!(
            err,
            crate::error::CatalogError::Config(ConfigError::FileReadFailed { .. })
        ));
    }
}
