use std::path::Path;

use config::{Config, ConfigBuilder, ConfigError, Environment, File, builder::DefaultState};
use serde::{Deserialize, Serialize};
use zbroker_error::{ensure, BrokerResult, GenericError, StackError, StatusCode};

use crate::logging::LoggingConfig;

/// Префикс переменных окружения: `ZBROKER_CORE__THREAD_NAME` и т.п.
pub const ENV_PREFIX: &str = "ZBROKER";

/// Разделитель вложенных ключей в именах переменных.
pub const ENV_SEPARATOR: &str = "__";

/// Настройки Core Actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Имя выделенного потока ядра.
    pub thread_name: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            thread_name: "zbroker-core".to_string(),
        }
    }
}

/// Настройки почтовых ящиков подписчиков.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    /// Создавать ли дескриптор для внешнего цикла опроса.
    pub pollable: bool,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self { pollable: true }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub core: CoreConfig,
    pub mailbox: MailboxConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Значения по умолчанию, перекрытые переменными окружения.
    pub fn load() -> BrokerResult<Self> {
        let settings: Settings = Self::builder()
            .build()
            .and_then(Config::try_deserialize)
            .map_err(config_error)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Файл (формат по расширению: toml, yaml, json), затем окружение.
    pub fn from_file(path: impl AsRef<Path>) -> BrokerResult<Self> {
        let path = path.as_ref();
        let settings: Settings = Config::builder()
            .add_source(File::from(path))
            .add_source(env_source())
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| config_error(e).context(format!("load {}", path.display())))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> BrokerResult<()> {
        ensure!(
            !self.core.thread_name.trim().is_empty(),
            StatusCode::InvalidConfig,
            "core thread name is empty"
        );
        self.logging.validate()
    }

    fn builder() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(env_source())
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}

fn config_error(err: ConfigError) -> StackError {
    StackError::new(GenericError::new(StatusCode::InvalidConfig, err.to_string()))
}
