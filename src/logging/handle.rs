use std::{fmt, time::Instant};

use tracing_appender::non_blocking::WorkerGuard;

/// Владеет ресурсами логирования, которые нужно сбросить при остановке.
///
/// Файловый вывод неблокирующий: пока жив `WorkerGuard`, фоновый поток
/// пишет накопленные строки. Drop или `shutdown()` дожидается записи.
pub struct LoggingHandle {
    file_guard: Option<WorkerGuard>,
}

impl LoggingHandle {
    pub fn new(file_guard: Option<WorkerGuard>) -> Self {
        Self { file_guard }
    }

    pub fn has_file_sink(&self) -> bool {
        self.file_guard.is_some()
    }

    /// Сбрасывает буферы файлового вывода.
    pub fn shutdown(mut self) {
        let start = Instant::now();
        let had_file = self.file_guard.is_some();
        drop(self.file_guard.take());
        tracing::info!(
            file_sink = had_file,
            shutdown_duration_ms = start.elapsed().as_millis() as u64,
            "Logging shutdown completed"
        );
    }
}

impl fmt::Debug for LoggingHandle {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("LoggingHandle")
            .field("file_sink", &self.file_guard.is_some())
            .finish()
    }
}
