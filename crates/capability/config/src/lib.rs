//! 应用运行配置加载。

use std::env;
use std::path::PathBuf;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    /// 未配置时使用内存存储。
    pub database_url: Option<String>,
    pub run_migrations: bool,
    /// 启动时加载的种子 JSON（仪器、映射、传输配置）。
    pub seed_file: Option<PathBuf>,
    pub astm_listen_addr: Option<String>,
    pub hl7_listen_addr: Option<String>,
    pub max_connections: usize,
    pub read_timeout_ms: u64,
    pub file_import_enabled: bool,
    pub file_poll_interval_secs: u64,
    pub serial_enabled: bool,
    pub lifecycle_sweep_secs: u64,
    pub offline_after_days: u64,
    pub preview_max_bytes: usize,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_addr = env::var("LIS_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let database_url = read_optional("LIS_DATABASE_URL");
        let run_migrations = read_bool_with_default("LIS_RUN_MIGRATIONS", false);
        let seed_file = read_optional("LIS_SEED_FILE").map(PathBuf::from);
        let astm_listen_addr = read_optional("LIS_ASTM_LISTEN_ADDR");
        let hl7_listen_addr = read_optional("LIS_HL7_LISTEN_ADDR");
        let max_connections = read_u64_with_default("LIS_MAX_CONNECTIONS", 100)? as usize;
        if max_connections == 0 {
            return Err(ConfigError::Invalid(
                "LIS_MAX_CONNECTIONS".to_string(),
                "0".to_string(),
            ));
        }
        let read_timeout_ms = read_u64_with_default("LIS_READ_TIMEOUT_MS", 5_000)?;
        let file_import_enabled = read_bool_with_default("LIS_FILE_IMPORT", false);
        let file_poll_interval_secs = read_u64_with_default("LIS_FILE_POLL_INTERVAL_SECS", 30)?;
        let serial_enabled = read_bool_with_default("LIS_SERIAL", false);
        let lifecycle_sweep_secs = read_u64_with_default("LIS_LIFECYCLE_SWEEP_SECS", 86_400)?;
        let offline_after_days = read_u64_with_default("LIS_OFFLINE_AFTER_DAYS", 7)?;
        let preview_max_bytes = read_u64_with_default("LIS_PREVIEW_MAX_BYTES", 10 * 1024)? as usize;

        Ok(Self {
            http_addr,
            database_url,
            run_migrations,
            seed_file,
            astm_listen_addr,
            hl7_listen_addr,
            max_connections,
            read_timeout_ms,
            file_import_enabled,
            file_poll_interval_secs,
            serial_enabled,
            lifecycle_sweep_secs,
            offline_after_days,
            preview_max_bytes,
        })
    }
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}
