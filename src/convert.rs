//! Конвертация значений без ошибок и паник.
//!
//! Возможность конвертации задаётся реализацией [`Convert<T>`] для пары
//! (источник, цель) и разрешается на этапе компиляции. Неудача выражается
//! через `false`, пустой `Option` или пустую строку; для кода, который
//! хочет поднять отказ через `?`, есть [`parse_as`].

use std::fmt;

use zbroker_error::ConvertError;

use crate::{Element, ErrorElement, ErrorKind, Status, StatusKind, Topic};

/// Конвертация `self` в `T`.
///
/// При неудаче возвращает `false`; содержимое `target` в этом случае не
/// определено и не должно использоваться.
pub trait Convert<T: ?Sized> {
    fn convert(
        &self,
        target: &mut T,
    ) -> bool;
}

/// `Some(T)` при успешной конвертации.
pub fn to<T, F>(from: &F) -> Option<T>
where
    T: Default,
    F: Convert<T> + ?Sized,
{
    let mut target = T::default();
    from.convert(&mut target).then_some(target)
}

/// Строковое представление или пустая строка, если конвертация не удалась.
pub fn to_string<F>(x: &F) -> String
where
    F: Convert<String> + ?Sized,
{
    try_to_string(x).unwrap_or_default()
}

pub fn try_to_string<F>(x: &F) -> Option<String>
where
    F: Convert<String> + ?Sized,
{
    to::<String, F>(x)
}

/// Обратная к [`to_string`]: разбор `T` из строки.
pub fn from_string<T>(s: &str) -> Option<T>
where
    T: Default,
    str: Convert<T>,
{
    to::<T, str>(s)
}

/// То же, что [`from_string`], но с ошибкой вместо `None`.
pub fn parse_as<T>(s: &str) -> Result<T, ConvertError>
where
    T: Default,
    str: Convert<T>,
{
    from_string(s).ok_or_else(ConvertError::new::<str, T>)
}

/// Пишет строковое представление в `out`; неудача даёт `fmt::Error`.
pub fn write_converted<W, F>(
    out: &mut W,
    x: &F,
) -> fmt::Result
where
    W: fmt::Write + ?Sized,
    F: Convert<String> + ?Sized,
{
    match try_to_string(x) {
        Some(s) => out.write_str(&s),
        None => Err(fmt::Error),
    }
}

/// Адаптер `Display` для любого типа с конвертацией в строку.
///
/// ```ignore
/// println!("{}", Converted(&status));
/// ```
pub struct Converted<'a, F: ?Sized>(pub &'a F);

impl<F> fmt::Display for Converted<'_, F>
where
    F: Convert<String> + ?Sized,
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write_converted(f, self.0)
    }
}

/// Методы конвертации на любом значении: `"42".to::<u16>()`.
pub trait ConvertExt {
    fn to<T>(&self) -> Option<T>
    where
        T: Default,
        Self: Convert<T>,
    {
        to::<T, Self>(self)
    }

    fn converted(&self) -> Converted<'_, Self> {
        Converted(self)
    }
}

impl<F: ?Sized> ConvertExt for F {}

////////////////////////////////////////////////////////////////////////////////
// Встроенные конвертации
////////////////////////////////////////////////////////////////////////////////

macro_rules! numeric_conversions {
    ($($t:ty),* $(,)?) => {
        $(
            impl Convert<String> for $t {
                fn convert(
                    &self,
                    target: &mut String,
                ) -> bool {
                    *target = self.to_string();
                    true
                }
            }

            impl Convert<$t> for str {
                fn convert(
                    &self,
                    target: &mut $t,
                ) -> bool {
                    match self.parse::<$t>() {
                        Ok(v) => {
                            *target = v;
                            true
                        }
                        Err(_) => false,
                    }
                }
            }

            impl Convert<$t> for String {
                fn convert(
                    &self,
                    target: &mut $t,
                ) -> bool {
                    self.as_str().convert(target)
                }
            }
        )*
    };
}

numeric_conversions!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

impl Convert<String> for bool {
    fn convert(
        &self,
        target: &mut String,
    ) -> bool {
        *target = self.to_string();
        true
    }
}

impl Convert<bool> for str {
    fn convert(
        &self,
        target: &mut bool,
    ) -> bool {
        match self {
            "true" | "T" => *target = true,
            "false" | "F" => *target = false,
            _ => return false,
        }
        true
    }
}

impl Convert<String> for str {
    fn convert(
        &self,
        target: &mut String,
    ) -> bool {
        self.clone_into(target);
        true
    }
}

impl Convert<String> for String {
    fn convert(
        &self,
        target: &mut String,
    ) -> bool {
        self.as_str().convert(target)
    }
}

impl Convert<String> for Topic {
    fn convert(
        &self,
        target: &mut String,
    ) -> bool {
        self.as_str().convert(target)
    }
}

impl Convert<Topic> for str {
    fn convert(
        &self,
        target: &mut Topic,
    ) -> bool {
        *target = Topic::new(self);
        true
    }
}

macro_rules! kind_conversions {
    ($($t:ty),*) => {
        $(
            impl Convert<String> for $t {
                fn convert(
                    &self,
                    target: &mut String,
                ) -> bool {
                    AsRef::<str>::as_ref(self).convert(target)
                }
            }

            impl Convert<$t> for str {
                fn convert(
                    &self,
                    target: &mut $t,
                ) -> bool {
                    match self.parse::<$t>() {
                        Ok(kind) => {
                            *target = kind;
                            true
                        }
                        Err(_) => false,
                    }
                }
            }
        )*
    };
}

kind_conversions!(StatusKind, ErrorKind);

fn kind_with_message(
    kind: &str,
    message: &str,
    target: &mut String,
) -> bool {
    *target = if message.is_empty() {
        kind.to_string()
    } else {
        format!("{kind}: {message}")
    };
    true
}

impl Convert<String> for Status {
    fn convert(
        &self,
        target: &mut String,
    ) -> bool {
        kind_with_message(self.kind.as_ref(), &self.message, target)
    }
}

impl Convert<String> for ErrorElement {
    fn convert(
        &self,
        target: &mut String,
    ) -> bool {
        kind_with_message(self.kind.as_ref(), &self.message, target)
    }
}

impl Convert<String> for Element {
    fn convert(
        &self,
        target: &mut String,
    ) -> bool {
        match self {
            Element::Data(msg) => {
                *target = format!("data({}, {:?})", msg.topic, msg.payload);
                true
            }
            Element::Status(status) => {
                let mut inner = String::new();
                status.convert(&mut inner) && {
                    *target = format!("status({inner})");
                    true
                }
            }
            Element::Error(err) => {
                let mut inner = String::new();
                err.convert(&mut inner) && {
                    *target = format!("error({inner})");
                    true
                }
            }
        }
    }
}
