use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Счётчики маршрутизации. Пишет только поток ядра, читать можно откуда
/// угодно.
#[derive(Debug, Default)]
pub struct RouterStats {
    /// Обработанные публикации.
    pub published: AtomicU64,
    /// Элементы, положенные в ящики.
    pub delivered: AtomicU64,
    /// Совпавшие подписчики, которым доставить не удалось (ящик закрыт или
    /// уничтожен).
    pub dropped: AtomicU64,
    /// Публикации без единого совпавшего подписчика.
    pub unrouted: AtomicU64,
}

/// Согласованная только поштучно копия [`RouterStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RouterStatsSnapshot {
    pub published: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub unrouted: u64,
}

impl RouterStats {
    pub fn snapshot(&self) -> RouterStatsSnapshot {
        RouterStatsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            unrouted: self.unrouted.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn bump(
        counter: &AtomicU64,
        n: u64,
    ) {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}
