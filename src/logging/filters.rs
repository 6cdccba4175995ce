use tracing_subscriber::EnvFilter;

use crate::logging::config::LoggingConfig;

/// Строит фильтр: `RUST_LOG`, если задан, иначе директива из конфигурации.
pub fn build_filter_from_config(config: &LoggingConfig) -> EnvFilter {
    if let Ok(env_filter) = EnvFilter::try_from_default_env() {
        return env_filter;
    }

    let directive = config.build_filter_directive();
    match EnvFilter::try_new(&directive) {
        Ok(filter) => filter,
        Err(e) => {
            // Подписчик ещё не установлен, сообщаем напрямую.
            eprintln!("Invalid log filter directive '{directive}': {e}; falling back to 'info'");
            EnvFilter::new("info")
        }
    }
}

#[cfg(test)]
mod tests {
    use std::env;

    use serial_test::serial;

    use super::*;

    /// Без RUST_LOG используется уровень из конфигурации.
    #[test]
    #[serial]
    fn test_filter_from_config() {
        env::remove_var("RUST_LOG");
        let cfg = LoggingConfig {
            level: "debug".to_string(),
            ..Default::default()
        };
        let filter = build_filter_from_config(&cfg);
        assert!(filter.to_string().contains("zbroker=debug"));
    }

    /// RUST_LOG имеет приоритет над конфигурацией.
    #[test]
    #[serial]
    fn test_env_overrides_config() {
        env::set_var("RUST_LOG", "warn");
        let filter = build_filter_from_config(&LoggingConfig::default());
        env::remove_var("RUST_LOG");
        assert_eq!(filter.to_string(), "warn");
    }
}
