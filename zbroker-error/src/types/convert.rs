use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Неудачная конвертация значения.
///
/// Сами функции конвертации ошибок не возвращают (пустой `Option`); этот тип
/// нужен вызывающему коду, который хочет поднять отказ через `?`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot convert {from} to {to}")]
pub struct ConvertError {
    pub from: &'static str,
    pub to: &'static str,
}

impl ConvertError {
    pub fn new<F: ?Sized, T>() -> Self {
        Self {
            from: short_type_name::<F>(),
            to: short_type_name::<T>(),
        }
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

impl ErrorExt for ConvertError {
    fn status_code(&self) -> StatusCode {
        StatusCode::ConversionFailed
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
