//! Загрузка настроек брокера.

pub mod settings;

pub use settings::{CoreConfig, MailboxConfig, Settings};
