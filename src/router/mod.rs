//! Ядро маршрутизации (Core Actor).
//!
//! Один выделенный поток владеет [`SubscriptionTable`] и обрабатывает
//! команды строго по одной в порядке поступления. Это даёт сериализуемые
//! изменения таблицы без блокировок: публикация, пришедшая после подписки,
//! обязательно её видит.
//!
//! Команды отправляются через [`CoreHandle`] и никогда не возвращают ошибку
//! вызывающему; отправка в остановленное ядро ничего не делает.

mod actor;
mod stats;
mod table;

pub use actor::{Core, CoreActor, CoreHandle};
pub use stats::{RouterStats, RouterStatsSnapshot};
pub use table::{SubscriptionTable, TableSnapshot};
