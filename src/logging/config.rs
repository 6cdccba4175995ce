use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use tracing_subscriber::filter::LevelFilter;
use zbroker_error::{ensure, BrokerResult, StatusCode};

/// Формат вывода событий.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// Настройки консольного вывода.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub with_ansi: bool,
    pub with_target: bool,
    pub with_thread_names: bool,
    pub with_line_numbers: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            with_ansi: true,
            with_target: true,
            with_thread_names: true,
            with_line_numbers: false,
        }
    }
}

/// Файловый вывод: ежедневная ротация в `dir/prefix.YYYY-MM-DD`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub dir: PathBuf,
    #[serde(default = "default_file_prefix")]
    pub prefix: String,
}

fn default_file_prefix() -> String {
    "zbroker.log".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Уровень по умолчанию (`trace`..`error`, `off`). `RUST_LOG` имеет
    /// приоритет.
    pub level: String,
    pub format: LogFormat,
    pub console: ConsoleConfig,
    pub file: Option<FileConfig>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            console: ConsoleConfig::default(),
            file: None,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> BrokerResult<()> {
        ensure!(
            self.level.parse::<LevelFilter>().is_ok(),
            StatusCode::InvalidConfig,
            "unknown log level '{}'",
            self.level
        );
        if let Some(file) = &self.file {
            ensure!(
                !file.prefix.is_empty(),
                StatusCode::InvalidConfig,
                "log file prefix is empty"
            );
        }
        Ok(())
    }

    /// Директива для `EnvFilter`: уровень для крейта и общий уровень.
    pub fn build_filter_directive(&self) -> String {
        format!("zbroker={0},{0}", self.level.to_lowercase())
    }
}
