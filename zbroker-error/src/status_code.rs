use std::fmt;

use num_enum::TryFromPrimitive;
#[cfg(feature = "strum")]
use strum_macros::{AsRefStr, EnumIter};

/// Коды статуса для категоризации ошибок брокера.
///
/// # Диапазоны:
/// - 0xxx: Успех
/// - 1xxx: Общие ошибки
/// - 2xxx: Ошибки данных (топики, конвертация)
/// - 3xxx: Маршрутизация и доставка
/// - 6xxx: IO / ожидание
///
/// `num_enum::TryFromPrimitive` даёт `TryFrom<u32>`, опционально `strum`
/// добавляет `AsRefStr`/`EnumIter` (feature = "strum").
#[cfg_attr(feature = "strum", derive(AsRefStr, EnumIter))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 0xxx: Успех ===
    Success = 0,

    // === 1xxx: Общие ошибки ===
    Unknown = 1000,
    Internal = 1001,
    InvalidArgs = 1002,
    InvalidConfig = 1003,
    NotInitialized = 1004,

    // === 2xxx: Ошибки данных ===
    ConversionFailed = 2000,

    // === 3xxx: Маршрутизация/доставка ===
    CoreUnavailable = 3000,
    MailboxClosed = 3001,

    // === 6xxx: IO ===
    Io = 6000,
    Timeout = 6001,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    /// Числовое представление кода статуса.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Пытается получить вариант `StatusCode` из `u32`; `None`, если
    /// значение не соответствует ни одному варианту.
    pub fn from_u32(v: u32) -> Option<Self> {
        Self::try_from(v).ok()
    }

    /// Вернёт `true`, если переданный `code` означает успешный результат.
    pub fn is_success(code: u32) -> bool {
        Self::Success as u32 == code
    }

    /// Имеет ли смысл повторить операцию.
    ///
    /// Брокер сам ничего не повторяет (доставка at-most-once), решение
    /// остаётся за вызывающим кодом.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Ошибка вызывающей стороны: неверные аргументы, данные или порядок
    /// вызовов (endpoint без ядра).
    pub fn is_client_error(&self) -> bool {
        if (2000..=2999).contains(&self.code()) {
            return true;
        }
        matches!(
            self,
            Self::InvalidArgs | Self::InvalidConfig | Self::NotInitialized
        )
    }

    /// Ошибка на стороне брокера или окружения.
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error() && !matches!(self, Self::Success)
    }

    /// Требуется ли логировать как критическую ошибку.
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Internal | Self::Io)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StatusCode
////////////////////////////////////////////////////////////////////////////////

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        #[cfg(feature = "strum")]
        {
            write!(f, "{} ({})", self.as_ref(), self.code())
        }
        #[cfg(not(feature = "strum"))]
        {
            write!(f, "{:?} ({})", self, self.code())
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет разделение клиентских и серверных ошибок.
    #[test]
    fn test_client_vs_server() {
        assert!(StatusCode::NotInitialized.is_client_error());
        assert!(StatusCode::ConversionFailed.is_client_error());
        assert!(StatusCode::CoreUnavailable.is_server_error());
        assert!(StatusCode::Io.is_server_error());
        assert!(!StatusCode::Success.is_server_error());
    }

    /// Тест проверяет конвертацию через `TryFrom<u32>` и `from_u32`.
    #[test]
    fn test_from_try_from_u32() {
        let n = StatusCode::MailboxClosed.code();
        assert_eq!(StatusCode::try_from(n).unwrap(), StatusCode::MailboxClosed);
        assert!(StatusCode::from_u32(99999).is_none());
    }

    #[test]
    fn test_code_and_into() {
        let c = StatusCode::NotInitialized;
        assert_eq!(c.code(), 1004);
        let n: u32 = c.into();
        assert_eq!(n, 1004);
        assert!(StatusCode::is_success(StatusCode::Success.code()));
        assert!(!StatusCode::is_success(n));
    }

    #[test]
    fn test_retryable_and_critical() {
        assert!(StatusCode::Timeout.is_retryable());
        assert!(!StatusCode::NotInitialized.is_retryable());
        assert!(StatusCode::Internal.is_critical());
        assert!(!StatusCode::MailboxClosed.is_critical());
    }

    /// `Display` содержит имя варианта и числовой код.
    #[test]
    fn test_display_contains_name_and_code() {
        let s = format!("{}", StatusCode::ConversionFailed);
        assert!(s.contains("2000"), "got: {s}");
        assert!(s.contains("ConversionFailed"), "got: {s}");
    }
}
