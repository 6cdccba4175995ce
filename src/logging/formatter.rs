use std::io::{self, Stdout};

use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::Layer as LayerTrait,
    registry::LookupSpan,
};

use crate::logging::config::{LogFormat, LoggingConfig};

/// Консольный слой на основе конфигурации.
///
/// Boxed trait-объект стирает конкретный тип формата (json/pretty/compact).
pub fn build_console_layer<S>(config: &LoggingConfig) -> Box<dyn LayerTrait<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let writer: fn() -> Stdout = io::stdout;
    build_layer(config, writer, config.console.with_ansi)
}

/// Слой для файла: без ANSI, тот же формат.
pub fn build_file_layer<S, W>(
    config: &LoggingConfig,
    writer: W,
) -> Box<dyn LayerTrait<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    build_layer(config, writer, false)
}

fn build_layer<S, W>(
    config: &LoggingConfig,
    writer: W,
    with_ansi: bool,
) -> Box<dyn LayerTrait<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let console = &config.console;
    match config.format {
        LogFormat::Json => Box::new(
            fmt::layer()
                .event_format(fmt::format().json().with_current_span(true))
                .with_writer(writer)
                .with_ansi(false)
                .with_target(console.with_target)
                .with_thread_names(console.with_thread_names)
                .with_line_number(console.with_line_numbers),
        ),
        LogFormat::Pretty => Box::new(
            fmt::layer()
                .event_format(fmt::format().pretty())
                .with_span_events(FmtSpan::CLOSE)
                .with_writer(writer)
                .with_ansi(with_ansi)
                .with_target(console.with_target)
                .with_thread_names(console.with_thread_names)
                .with_line_number(console.with_line_numbers),
        ),
        LogFormat::Compact => Box::new(
            fmt::layer()
                .event_format(fmt::format().compact())
                .with_writer(writer)
                .with_ansi(with_ansi)
                .with_target(console.with_target)
                .with_thread_names(console.with_thread_names)
                .with_line_number(console.with_line_numbers),
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tracing::info;
    use tracing_subscriber::{prelude::*, registry::Registry};

    use super::*;

    #[derive(Clone, Default)]
    struct VecWriter(Arc<Mutex<Vec<u8>>>);

    impl io::Write for VecWriter {
        fn write(
            &mut self,
            buf: &[u8],
        ) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for VecWriter {
        type Writer = VecWriter;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture(format: LogFormat) -> String {
        let sink = VecWriter::default();
        let cfg = LoggingConfig {
            format,
            ..Default::default()
        };
        let layer = build_file_layer::<Registry, _>(&cfg, sink.clone());
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            info!(topic = "a/b", "routed element");
        });
        let bytes = sink.0.lock().clone();
        String::from_utf8(bytes).unwrap()
    }

    /// Тест проверяет, что каждый формат пишет событие вместе с полями.
    #[test]
    fn test_each_format_writes_fields() {
        for format in [LogFormat::Compact, LogFormat::Pretty, LogFormat::Json] {
            let out = capture(format);
            assert!(out.contains("routed element"), "{format:?}: {out}");
            assert!(out.contains("a/b"), "{format:?}: {out}");
        }
    }

    #[test]
    fn test_json_is_parseable() {
        let out = capture(LogFormat::Json);
        let line = out.lines().next().unwrap();
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(value["fields"]["message"], "routed element");
    }

    #[test]
    fn test_console_layer_builds() {
        let layer = build_console_layer::<Registry>(&LoggingConfig::default());
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            info!("console smoke test");
        });
    }
}
