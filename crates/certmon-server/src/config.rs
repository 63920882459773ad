use certmon_common::status::DEFAULT_EXPIRING_SOON_DAYS;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// CORS 允许的 origins 列表，为空时允许所有来源（开发模式）
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,

    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            cors_allowed_origins: Vec::new(),
            database: DatabaseConfig::default(),
            status: StatusConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// SQLite 连接串（`sqlite:` 开头）；为空时使用 data_dir 下的 SQLite 文件
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            url: None,
        }
    }
}

impl DatabaseConfig {
    pub fn connection_url(&self) -> String {
        match self.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => format!("sqlite://{}/certmon.db?mode=rwc", self.data_dir),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    /// 到期前多少天视为"即将过期"
    #[serde(default = "default_expiring_soon_days")]
    pub expiring_soon_days: u32,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            expiring_soon_days: default_expiring_soon_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_scheduler_enabled")]
    pub enabled: bool,
    /// 每日状态刷新时间（UTC，`HH:MM`）
    #[serde(default = "default_daily_refresh_at")]
    pub daily_refresh_at: String,
    /// 状态统计日志间隔（秒）
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_scheduler_enabled(),
            daily_refresh_at: default_daily_refresh_at(),
            stats_interval_secs: default_stats_interval_secs(),
        }
    }
}

impl SchedulerConfig {
    pub fn daily_refresh_time(&self) -> anyhow::Result<NaiveTime> {
        let raw = self.daily_refresh_at.trim();
        NaiveTime::parse_from_str(raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .map_err(|e| anyhow::anyhow!("invalid scheduler.daily_refresh_at '{raw}': {e}"))
    }
}

fn default_http_port() -> u16 {
    8080
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_expiring_soon_days() -> u32 {
    DEFAULT_EXPIRING_SOON_DAYS
}

fn default_scheduler_enabled() -> bool {
    true
}

fn default_daily_refresh_at() -> String {
    "01:00".to_string()
}

fn default_stats_interval_secs() -> u64 {
    3600
}

impl ServerConfig {
    /// Loads the TOML config at `path`. A missing file yields the defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        if !Path::new(path).exists() {
            tracing::warn!(path = %path, "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.scheduler.daily_refresh_time()?;
        let url = self.database.connection_url();
        if !url.starts_with("sqlite:") {
            anyhow::bail!("database.url must be a sqlite: URL, got '{url}'");
        }
        if self.scheduler.stats_interval_secs == 0 {
            anyhow::bail!("scheduler.stats_interval_secs must be greater than 0");
        }
        Ok(())
    }
}
