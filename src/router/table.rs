use std::{
    collections::BTreeMap,
    sync::{Arc, Weak},
};

use ahash::{AHashMap, AHashSet};
use serde::Serialize;

use crate::{Mailbox, SubscriberId, Topic};

/// Наименьший размер реестра, при котором регистрация запускает чистку.
const SWEEP_MIN: usize = 64;

/// Таблица подписок: топик -> множество подписчиков.
///
/// Ядро держит только слабые ссылки на ящики: endpoint владеет своим ящиком,
/// а мёртвая ссылка означает, что подписчик уже уничтожен.
#[derive(Debug, Default)]
pub struct SubscriptionTable {
    topics: AHashMap<Topic, AHashSet<SubscriberId>>,
    registry: AHashMap<SubscriberId, Weak<Mailbox>>,
    /// Размер реестра, при достижении которого следующая регистрация
    /// удаляет мёртвых подписчиков.
    sweep_at: usize,
}

/// Копия состояния таблицы для диагностики и тестов.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableSnapshot {
    /// Топик -> подписчики, отсортированные по id.
    pub topics: BTreeMap<Topic, Vec<SubscriberId>>,
    /// Все зарегистрированные подписчики.
    pub subscribers: Vec<SubscriberId>,
}

impl TableSnapshot {
    pub fn subscribers_of(
        &self,
        topic: &Topic,
    ) -> &[SubscriberId] {
        self.topics.get(topic).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_subscribed(
        &self,
        topic: &Topic,
        id: SubscriberId,
    ) -> bool {
        self.subscribers_of(topic).contains(&id)
    }

    /// Число пар (топик, подписчик).
    pub fn entry_count(&self) -> usize {
        self.topics.values().map(Vec::len).sum()
    }
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Регистрирует подписчика без топиков. `false`, если он уже известен.
    pub fn attach(
        &mut self,
        mailbox: &Arc<Mailbox>,
    ) -> bool {
        self.register(mailbox.id(), Arc::downgrade(mailbox))
    }

    pub(crate) fn register(
        &mut self,
        id: SubscriberId,
        handle: Weak<Mailbox>,
    ) -> bool {
        if self.registry.contains_key(&id) {
            return false;
        }
        if self.registry.len() >= self.sweep_at {
            self.prune_dead();
        }
        self.registry.insert(id, handle);
        true
    }

    /// Удаляет подписчиков, чьи ящики уже уничтожены, вместе с их записями.
    ///
    /// Регистрация вызывает чистку сама, когда реестр вырастает вдвое с
    /// прошлой чистки, так что стоимость на одну регистрацию O(1).
    pub fn prune_dead(&mut self) -> Vec<SubscriberId> {
        let dead: AHashSet<SubscriberId> = self
            .registry
            .iter()
            .filter(|(_, handle)| handle.strong_count() == 0)
            .map(|(id, _)| *id)
            .collect();
        if !dead.is_empty() {
            self.registry.retain(|id, _| !dead.contains(id));
            self.topics.retain(|_, ids| {
                ids.retain(|id| !dead.contains(id));
                !ids.is_empty()
            });
        }
        self.sweep_at = (self.registry.len() * 2).max(SWEEP_MIN);

        let mut dead: Vec<SubscriberId> = dead.into_iter().collect();
        dead.sort_unstable();
        dead
    }

    /// Удаляет подписчика вместе со всеми его записями.
    ///
    /// Возвращает слабую ссылку, если подписчик был зарегистрирован.
    pub fn detach(
        &mut self,
        id: SubscriberId,
    ) -> Option<Weak<Mailbox>> {
        let handle = self.registry.remove(&id)?;
        self.topics.retain(|_, ids| {
            ids.remove(&id);
            !ids.is_empty()
        });
        Some(handle)
    }

    /// Добавляет запись (topic, id). Идемпотентно: `true` только для новой
    /// записи. Неизвестный подписчик регистрируется.
    pub fn subscribe(
        &mut self,
        topic: Topic,
        id: SubscriberId,
        handle: &Weak<Mailbox>,
    ) -> bool {
        self.register(id, handle.clone());
        self.topics.entry(topic).or_default().insert(id)
    }

    /// Удаляет запись. Отсутствующая запись не ошибка. Опустевший топик
    /// удаляется из таблицы.
    pub fn unsubscribe(
        &mut self,
        topic: &Topic,
        id: SubscriberId,
    ) -> bool {
        let Some(ids) = self.topics.get_mut(topic) else {
            return false;
        };
        let removed = ids.remove(&id);
        if ids.is_empty() {
            self.topics.remove(topic);
        }
        removed
    }

    /// Подписчики, чей топик совпадает с опубликованным.
    ///
    /// Просматривает каждый префикс `published` (O(глубина) поисков), поэтому
    /// стоимость не зависит от общего числа топиков. Результат без повторов и
    /// упорядочен по id.
    pub fn route(
        &self,
        published: &Topic,
    ) -> Vec<(SubscriberId, Weak<Mailbox>)> {
        let mut ids: Vec<SubscriberId> = published
            .prefixes()
            .filter_map(|prefix| self.topics.get(&prefix))
            .flat_map(|set| set.iter().copied())
            .collect();
        ids.sort_unstable();
        ids.dedup();

        ids.into_iter()
            .filter_map(|id| self.registry.get(&id).map(|h| (id, h.clone())))
            .collect()
    }

    /// Топики подписчика в порядке сортировки.
    pub fn topics_of(
        &self,
        id: SubscriberId,
    ) -> Vec<Topic> {
        let mut out: Vec<Topic> = self
            .topics
            .iter()
            .filter(|(_, ids)| ids.contains(&id))
            .map(|(topic, _)| topic.clone())
            .collect();
        out.sort();
        out
    }

    pub fn subscribers(&self) -> Vec<SubscriberId> {
        let mut ids: Vec<SubscriberId> = self.registry.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn contains(
        &self,
        id: SubscriberId,
    ) -> bool {
        self.registry.contains_key(&id)
    }

    /// Число пар (топик, подписчик).
    pub fn len(&self) -> usize {
        self.topics.values().map(|ids| ids.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    pub fn snapshot(&self) -> TableSnapshot {
        let topics = self
            .topics
            .iter()
            .map(|(topic, ids)| {
                let mut ids: Vec<SubscriberId> = ids.iter().copied().collect();
                ids.sort_unstable();
                (topic.clone(), ids)
            })
            .collect();
        TableSnapshot {
            topics,
            subscribers: self.subscribers(),
        }
    }

    /// Очищает таблицу, возвращая слабые ссылки всех подписчиков.
    pub(crate) fn drain(&mut self) -> Vec<Weak<Mailbox>> {
        self.topics.clear();
        self.registry.drain().map(|(_, handle)| handle).collect()
    }
}
