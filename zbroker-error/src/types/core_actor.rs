use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки жизненного цикла ядра маршрутизации.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Ядро остановлено и больше не отвечает на запросы.
    #[error("core actor is not running")]
    Unavailable,

    /// Не удалось запустить поток ядра.
    #[error("failed to spawn core actor thread: {0}")]
    Spawn(String),
}

impl ErrorExt for CoreError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unavailable => StatusCode::CoreUnavailable,
            Self::Spawn(_) => StatusCode::Io,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            Self::Unavailable => "broker core stopped".to_string(),
            Self::Spawn(_) => "broker core failed to start".to_string(),
        }
    }
}
