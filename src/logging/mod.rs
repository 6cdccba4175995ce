//! Инициализация логирования на `tracing`.
//!
//! Библиотека только пишет события; подписчик устанавливает приложение через
//! [`init_logging`].

pub mod config;
mod filters;
mod formatter;
pub mod handle;

pub use self::config::{ConsoleConfig, FileConfig, LogFormat, LoggingConfig};
pub use handle::LoggingHandle;
use tracing_subscriber::{
    layer::{Layered, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};
use zbroker_error::{BrokerResult, GenericError, ResultExt, StatusCode};

type FilteredRegistry = Layered<EnvFilter, Registry>;

/// Устанавливает глобальный подписчик согласно конфигурации.
///
/// Повторный вызов возвращает ошибку и ничего не меняет.
pub fn init_logging(config: LoggingConfig) -> BrokerResult<LoggingHandle> {
    config.validate()?;

    let env_filter = filters::build_filter_from_config(&config);
    let mut layers: Vec<Box<dyn Layer<FilteredRegistry> + Send + Sync>> = Vec::new();

    if config.console.enabled {
        layers.push(formatter::build_console_layer(&config));
    }

    let file_guard = match &config.file {
        Some(file) => {
            std::fs::create_dir_all(&file.dir)
                .with_context(|| format!("create log dir {}", file.dir.display()))?;
            let appender = tracing_appender::rolling::daily(&file.dir, &file.prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(formatter::build_file_layer(&config, writer));
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()
        .map_err(|e| {
            GenericError::new(
                StatusCode::InvalidConfig,
                format!("global logger already installed: {e}"),
            )
        })?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        git_commit = env!("GIT_COMMIT"),
        build_time = env!("BUILD_TIME"),
        log_level = %config.level,
        log_format = config.format.as_ref(),
        file_enabled = config.file.is_some(),
        "Logging system initialized"
    );

    Ok(LoggingHandle::new(file_guard))
}
