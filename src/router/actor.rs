use std::{
    sync::{Arc, Weak},
    thread::{self, JoinHandle},
};

use tokio::sync::{
    mpsc::{self, UnboundedReceiver, UnboundedSender},
    oneshot,
};
use tracing::{debug, error, info, trace, warn};
use zbroker_error::{ensure, BrokerResult, CoreError, StatusCode};

use super::{
    stats::{RouterStats, RouterStatsSnapshot},
    table::{SubscriptionTable, TableSnapshot},
};
use crate::{config::CoreConfig, Element, Mailbox, SubscriberId, Topic};

#[derive(Debug)]
pub(crate) enum Command {
    Attach {
        id: SubscriberId,
        handle: Weak<Mailbox>,
    },
    Detach(SubscriberId),
    Subscribe {
        topics: Vec<Topic>,
        id: SubscriberId,
        handle: Weak<Mailbox>,
    },
    Unsubscribe {
        topics: Vec<Topic>,
        id: SubscriberId,
    },
    Publish {
        topic: Topic,
        element: Element,
    },
    Snapshot(oneshot::Sender<TableSnapshot>),
    Shutdown,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Attach { .. } => "attach",
            Command::Detach(_) => "detach",
            Command::Subscribe { .. } => "subscribe",
            Command::Unsubscribe { .. } => "unsubscribe",
            Command::Publish { .. } => "publish",
            Command::Snapshot(_) => "snapshot",
            Command::Shutdown => "shutdown",
        }
    }

    /// Ящик, на который ссылается команда, если он ещё жив.
    fn mailbox(&self) -> Option<Arc<Mailbox>> {
        match self {
            Command::Attach { handle, .. } | Command::Subscribe { handle, .. } => handle.upgrade(),
            _ => None,
        }
    }
}

/// Цикл ядра. Создаётся только через [`CoreActor::spawn`].
pub struct CoreActor {
    table: SubscriptionTable,
    rx: UnboundedReceiver<Command>,
    stats: Arc<RouterStats>,
    name: String,
}

impl CoreActor {
    /// Запускает ядро в отдельном именованном потоке.
    pub fn spawn(config: &CoreConfig) -> BrokerResult<Core> {
        let name = config.thread_name.trim().to_string();
        ensure!(
            !name.is_empty() && !name.contains('\0'),
            StatusCode::InvalidConfig,
            "invalid core thread name {:?}",
            config.thread_name
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(RouterStats::default());
        let actor = CoreActor {
            table: SubscriptionTable::new(),
            rx,
            stats: Arc::clone(&stats),
            name: name.clone(),
        };

        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || actor.run())
            .map_err(|e| CoreError::Spawn(e.to_string()))?;

        info!(thread = %name, "Core actor started");
        Ok(Core {
            handle: CoreHandle {
                tx,
                stats,
                name: Arc::from(name),
            },
            thread: Some(thread),
        })
    }

    fn run(mut self) {
        while let Some(cmd) = self.rx.blocking_recv() {
            trace!(command = cmd.name(), "Core actor command");
            match cmd {
                Command::Shutdown => break,
                cmd => self.handle(cmd),
            }
        }
        self.finish();
    }

    fn handle(
        &mut self,
        cmd: Command,
    ) {
        match cmd {
            Command::Attach { id, handle } => {
                if self.table.register(id, handle) {
                    debug!(subscriber = %id, "Subscriber attached");
                }
            }
            Command::Detach(id) => {
                if self.table.detach(id).is_some() {
                    debug!(subscriber = %id, "Subscriber detached");
                }
            }
            Command::Subscribe { topics, id, handle } => {
                for topic in topics {
                    if self.table.subscribe(topic.clone(), id, &handle) {
                        debug!(subscriber = %id, %topic, "Subscribed");
                    }
                }
            }
            Command::Unsubscribe { topics, id } => {
                for topic in topics {
                    if self.table.unsubscribe(&topic, id) {
                        debug!(subscriber = %id, %topic, "Unsubscribed");
                    }
                }
            }
            Command::Publish { topic, element } => self.publish(&topic, element),
            Command::Snapshot(reply) => {
                for id in self.table.prune_dead() {
                    debug!(subscriber = %id, "Pruned dropped subscriber");
                }
                // Запрашивающий мог уже уйти.
                let _ = reply.send(self.table.snapshot());
            }
            Command::Shutdown => {}
        }
    }

    fn publish(
        &mut self,
        topic: &Topic,
        element: Element,
    ) {
        RouterStats::bump(&self.stats.published, 1);

        let routes = self.table.route(topic);
        if routes.is_empty() {
            RouterStats::bump(&self.stats.unrouted, 1);
            trace!(%topic, "Publish matched no subscribers");
            return;
        }

        let mut delivered = 0u64;
        let mut stale = Vec::new();
        for (id, handle) in routes {
            match handle.upgrade() {
                Some(mailbox) if mailbox.enqueue(element.clone()) => delivered += 1,
                Some(_) => stale.push((id, "closed")),
                None => stale.push((id, "gone")),
            }
        }

        RouterStats::bump(&self.stats.delivered, delivered);
        RouterStats::bump(&self.stats.dropped, stale.len() as u64);
        for (id, reason) in stale {
            warn!(subscriber = %id, %topic, reason, "Pruning stale subscriber");
            self.table.detach(id);
        }
        trace!(%topic, kind = element.tag(), delivered, "Published");
    }

    /// Закрывает все ящики, затем канал команд, затем вычитывает то, что
    /// успели отправить до закрытия. После этого ни один потребитель не может
    /// зависнуть в ожидании.
    fn finish(mut self) {
        let handles = self.table.drain();
        let mut closed = 0usize;
        for mailbox in handles.iter().filter_map(Weak::upgrade) {
            mailbox.close();
            closed += 1;
        }

        self.rx.close();
        let mut late = 0usize;
        while let Ok(cmd) = self.rx.try_recv() {
            late += 1;
            if let Some(mailbox) = cmd.mailbox() {
                mailbox.close();
                closed += 1;
            }
        }

        let stats = self.stats.snapshot();
        info!(
            thread = %self.name,
            closed_mailboxes = closed,
            late_commands = late,
            published = stats.published,
            delivered = stats.delivered,
            dropped = stats.dropped,
            "Core actor stopped"
        );
    }
}

/// Клонируемый адрес ядра.
#[derive(Debug, Clone)]
pub struct CoreHandle {
    tx: UnboundedSender<Command>,
    stats: Arc<RouterStats>,
    name: Arc<str>,
}

impl CoreHandle {
    fn send(
        &self,
        cmd: Command,
    ) -> bool {
        match self.tx.send(cmd) {
            Ok(()) => true,
            Err(err) => {
                trace!(core = %self.name, command = err.0.name(), "Core stopped, command ignored");
                false
            }
        }
    }

    /// Регистрирует ящик в ядре.
    ///
    /// Если ядро уже остановлено, ящик закрывается сразу: его потребитель
    /// получит признак закрытия вместо вечного ожидания.
    pub fn attach(
        &self,
        mailbox: &Arc<Mailbox>,
    ) {
        let sent = self.send(Command::Attach {
            id: mailbox.id(),
            handle: Arc::downgrade(mailbox),
        });
        if !sent {
            mailbox.close();
        }
    }

    pub fn detach(
        &self,
        id: SubscriberId,
    ) {
        self.send(Command::Detach(id));
    }

    pub fn subscribe<I, T>(
        &self,
        topics: I,
        subscriber: &Arc<Mailbox>,
    ) where
        I: IntoIterator<Item = T>,
        T: Into<Topic>,
    {
        let topics: Vec<Topic> = topics.into_iter().map(Into::into).collect();
        if topics.is_empty() {
            return;
        }
        self.send(Command::Subscribe {
            topics,
            id: subscriber.id(),
            handle: Arc::downgrade(subscriber),
        });
    }

    pub fn unsubscribe<I, T>(
        &self,
        topics: I,
        id: SubscriberId,
    ) where
        I: IntoIterator<Item = T>,
        T: Into<Topic>,
    {
        let topics: Vec<Topic> = topics.into_iter().map(Into::into).collect();
        if topics.is_empty() {
            return;
        }
        self.send(Command::Unsubscribe { topics, id });
    }

    /// Публикует элемент. Без подтверждения: доставка асинхронна и
    /// best-effort.
    pub fn publish(
        &self,
        topic: impl Into<Topic>,
        element: impl Into<Element>,
    ) {
        self.send(Command::Publish {
            topic: topic.into(),
            element: element.into(),
        });
    }

    /// Копия таблицы подписок, упорядоченная относительно ранее отправленных
    /// команд этого же потока.
    ///
    /// Блокирует поток; внутри async-рантайма используйте
    /// [`snapshot_async`](Self::snapshot_async).
    pub fn snapshot(&self) -> BrokerResult<TableSnapshot> {
        let (reply, rx) = oneshot::channel();
        if !self.send(Command::Snapshot(reply)) {
            return Err(CoreError::Unavailable.into());
        }
        rx.blocking_recv()
            .map_err(|_| CoreError::Unavailable.into())
    }

    pub async fn snapshot_async(&self) -> BrokerResult<TableSnapshot> {
        let (reply, rx) = oneshot::channel();
        if !self.send(Command::Snapshot(reply)) {
            return Err(CoreError::Unavailable.into());
        }
        rx.await.map_err(|_| CoreError::Unavailable.into())
    }

    pub fn stats(&self) -> RouterStatsSnapshot {
        self.stats.snapshot()
    }

    /// `true`, когда ядро больше не принимает команды.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn shutdown_signal(&self) {
        self.send(Command::Shutdown);
    }
}

/// Владелец потока ядра. Остановка по `shutdown()` или при уничтожении.
#[derive(Debug)]
pub struct Core {
    handle: CoreHandle,
    thread: Option<JoinHandle<()>>,
}

impl Core {
    pub fn handle(&self) -> CoreHandle {
        self.handle.clone()
    }

    /// Останавливает ядро и дожидается завершения его потока.
    ///
    /// Все зарегистрированные ящики закрываются.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.handle.shutdown_signal();
        if thread.join().is_err() {
            error!(core = %self.handle.name, "Core actor thread panicked");
        }
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn core() -> Core {
        CoreActor::spawn(&CoreConfig::default()).unwrap()
    }

    fn recv(mb: &Mailbox) -> Option<Element> {
        mb.dequeue_timeout(Duration::from_secs(5))
    }

    #[test]
    fn test_subscribe_then_publish_is_ordered() {
        let core = core();
        let h = core.handle();
        let mb = Mailbox::blocking();
        h.attach(&mb);
        h.subscribe(["news"], &mb);
        h.publish("news/today", Element::data("news/today", &b"x"[..]));

        let el = recv(&mb).unwrap();
        assert_eq!(el.topic(), Some(&Topic::new("news/today")));
        assert!(mb.try_dequeue().is_none());
    }

    /// Тест проверяет счётчики: доставка, публикация в пустоту.
    #[test]
    fn test_stats_counters() {
        let core = core();
        let h = core.handle();
        let mb = Mailbox::blocking();
        h.subscribe(["a", "a/b"], &mb);
        h.publish("a/b/c", Element::data("a/b/c", "one"));
        h.publish("zzz", Element::data("zzz", "none"));

        // snapshot упорядочен после публикаций.
        let snap = h.snapshot().unwrap();
        assert_eq!(snap.entry_count(), 2);
        assert_eq!(
            h.stats(),
            RouterStatsSnapshot {
                published: 2,
                delivered: 1,
                dropped: 0,
                unrouted: 1,
            }
        );
        assert_eq!(mb.len(), 1);
    }

    #[test]
    fn test_dead_subscriber_is_pruned() {
        let core = core();
        let h = core.handle();
        let mb = Mailbox::blocking();
        let id = mb.id();
        h.subscribe(["t"], &mb);
        drop(mb);
        h.publish("t", Element::data("t", "x"));

        let snap = h.snapshot().unwrap();
        assert!(!snap.subscribers.contains(&id));
        assert!(snap.topics.is_empty());
        assert_eq!(h.stats().dropped, 1);
    }

    /// Ящик, отданный в attach и уничтоженный без detach, не остаётся в
    /// реестре.
    #[test]
    fn test_attached_then_dropped_is_released() {
        let core = core();
        let h = core.handle();
        for _ in 0..100 {
            let mb = Mailbox::blocking();
            h.attach(&mb);
            drop(mb);
        }
        h.publish("t", Element::data("t", "x"));

        let snap = h.snapshot().unwrap();
        assert!(snap.subscribers.is_empty());
        assert_eq!(h.stats().dropped, 0);
    }

    #[test]
    fn test_shutdown_closes_mailboxes() {
        let core = core();
        let h = core.handle();
        let mb = Mailbox::blocking();
        h.attach(&mb);
        h.publish("", Element::status(crate::StatusKind::PeerAdded, "p"));

        core.shutdown();
        assert!(h.is_closed());
        assert!(mb.is_closed());

        // Ящик, прикреплённый после остановки, закрывается сразу.
        let late = Mailbox::blocking();
        h.attach(&late);
        assert!(late.is_closed());
        assert!(late.dequeue().is_none());

        assert!(h.snapshot().is_err());
        h.publish("x", Element::data("x", "ignored"));
    }

    #[test]
    fn test_blocked_consumer_wakes_on_drop() {
        let core = core();
        let mb = Mailbox::blocking();
        core.handle().attach(&mb);
        let consumer = {
            let mb = Arc::clone(&mb);
            thread::spawn(move || mb.dequeue())
        };
        thread::sleep(Duration::from_millis(20));
        drop(core);
        assert!(consumer.join().unwrap().is_none());
    }

    #[test]
    fn test_invalid_thread_name() {
        let cfg = CoreConfig {
            thread_name: "bad\0name".to_string(),
        };
        let err = CoreActor::spawn(&cfg).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::InvalidConfig);
    }

    #[tokio::test]
    async fn test_snapshot_async() {
        let core = core();
        let h = core.handle();
        let mb = Mailbox::blocking();
        h.subscribe(["x/y"], &mb);
        let snap = h.snapshot_async().await.unwrap();
        assert!(snap.is_subscribed(&Topic::new("x/y"), mb.id()));
        assert_eq!(h.name(), "zbroker-core");
    }
}
