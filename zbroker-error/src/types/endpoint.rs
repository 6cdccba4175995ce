use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки, видимые потребителю endpoint'а.
///
/// Управляющие операции (`subscribe`/`unsubscribe`/`publish`) ошибок не
/// возвращают; сюда попадают только отказы приёма.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EndpointError {
    /// Endpoint не привязан к ядру.
    #[error("endpoint not initialized")]
    NotInitialized,

    /// Почтовый ящик закрыт и пуст: ядро или сам endpoint остановлены.
    #[error("mailbox is closed")]
    Closed,
}

impl ErrorExt for EndpointError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotInitialized => StatusCode::NotInitialized,
            Self::Closed => StatusCode::MailboxClosed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn tags(&self) -> Vec<(&'static str, String)> {
        vec![
            ("error_type", "endpoint".to_string()),
            ("status_code", self.status_code().to_string()),
        ]
    }
}
