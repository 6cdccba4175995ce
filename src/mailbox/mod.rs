//! Почтовый ящик подписчика.
//!
//! Очередь MPSC: доставляет ядро (и любые другие производители), читает один
//! потребитель, владелец endpoint'а. Поддерживаются три способа ожидания над
//! одной и той же очередью:
//!
//! - блокирующий: `await_data`/`dequeue` на `Condvar`;
//! - асинхронный: `dequeue_async` на `tokio::sync::Notify`;
//! - опрос дескриптора: [`PollableMailbox`] для внешнего `select`/`poll`.
//!
//! Дескриптор готов ровно тогда, когда очередь не пуста или ящик закрыт.
//! Переходы флага выполняются под замком очереди, поэтому пробуждения не
//! теряются и не остаются висеть после полной выборки.

mod flare;

use std::{
    collections::VecDeque,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

#[cfg(unix)]
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{trace, warn};
use zbroker_error::BrokerResult;

pub use self::flare::Flare;
use crate::{config::MailboxConfig, Element};

/// Уникальный в пределах процесса идентификатор подписчика.
///
/// Дедупликация при маршрутизации выполняется по нему.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SubscriberId(u64);

impl SubscriberId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

#[derive(Debug, Default)]
struct MailboxState {
    queue: VecDeque<Element>,
    closed: bool,
    /// Зажжён ли flare.
    lit: bool,
}

/// Очередь элементов одного подписчика с сигналом пробуждения.
pub struct Mailbox {
    id: SubscriberId,
    state: Mutex<MailboxState>,
    ready: Condvar,
    notify: Notify,
    flare: Option<Arc<Flare>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Mailbox {
    /// Создаёт почтовый ящик согласно конфигурации.
    ///
    /// Опрашиваемый ящик открывает пару сокетов; ошибка ОС поднимается
    /// наверх.
    pub fn new(config: &MailboxConfig) -> BrokerResult<Arc<Self>> {
        let flare = if config.pollable {
            Some(Arc::new(Flare::new()?))
        } else {
            None
        };
        Ok(Self::with_flare(flare))
    }

    /// Ящик только для блокирующего и асинхронного ожидания, без дескриптора.
    pub fn blocking() -> Arc<Self> {
        Self::with_flare(None)
    }

    fn with_flare(flare: Option<Arc<Flare>>) -> Arc<Self> {
        Arc::new(Self {
            id: SubscriberId::next(),
            state: Mutex::new(MailboxState::default()),
            ready: Condvar::new(),
            notify: Notify::new(),
            flare,
        })
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Кладёт элемент в конец очереди.
    ///
    /// Возвращает `false`, если ящик закрыт: доставка в закрытый ящик ничего
    /// не делает.
    pub fn enqueue(
        &self,
        element: Element,
    ) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        state.queue.push_back(element);
        self.light(&mut state);
        drop(state);

        self.ready.notify_one();
        self.notify.notify_one();
        true
    }

    /// Забирает первый элемент, не блокируясь.
    pub fn try_dequeue(&self) -> Option<Element> {
        let mut state = self.state.lock();
        let element = state.queue.pop_front();
        self.dim(&mut state);
        element
    }

    /// Блокирует поток, пока очередь пуста и ящик открыт.
    ///
    /// Возвращает `true`, если есть данные; `false` значит ящик закрыт и пуст.
    pub fn await_data(&self) -> bool {
        let mut state = self.state.lock();
        while state.queue.is_empty() && !state.closed {
            self.ready.wait(&mut state);
        }
        !state.queue.is_empty()
    }

    /// То же, что [`await_data`](Self::await_data), но не дольше `timeout`.
    pub fn await_data_timeout(
        &self,
        timeout: Duration,
    ) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.await_data();
        };
        let mut state = self.state.lock();
        while state.queue.is_empty() && !state.closed {
            if self.ready.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        !state.queue.is_empty()
    }

    /// Блокирующая выборка. `None` только когда ящик закрыт и пуст.
    pub fn dequeue(&self) -> Option<Element> {
        let mut state = self.state.lock();
        loop {
            if let Some(element) = state.queue.pop_front() {
                self.dim(&mut state);
                return Some(element);
            }
            if state.closed {
                return None;
            }
            self.ready.wait(&mut state);
        }
    }

    /// Блокирующая выборка с таймаутом. `None` при таймауте или если ящик
    /// закрыт и пуст; различить можно через [`is_closed`](Self::is_closed).
    pub fn dequeue_timeout(
        &self,
        timeout: Duration,
    ) -> Option<Element> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.dequeue();
        };
        let mut state = self.state.lock();
        loop {
            if let Some(element) = state.queue.pop_front() {
                self.dim(&mut state);
                return Some(element);
            }
            if state.closed {
                return None;
            }
            if self.ready.wait_until(&mut state, deadline).timed_out() {
                let element = state.queue.pop_front();
                self.dim(&mut state);
                return element;
            }
        }
    }

    /// Асинхронная выборка. `None` когда ящик закрыт и пуст.
    pub async fn dequeue_async(&self) -> Option<Element> {
        loop {
            let notified = self.notify.notified();
            if let Some(element) = self.try_dequeue() {
                return Some(element);
            }
            if self.is_closed() {
                return None;
            }
            notified.await;
        }
    }

    /// Закрывает ящик и будит всех ожидающих.
    ///
    /// Уже лежащие элементы остаются доступны для чтения. Повторный вызов
    /// ничего не делает.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        self.light(&mut state);
        let pending = state.queue.len();
        drop(state);

        trace!(subscriber = %self.id, pending, "Mailbox closed");
        self.ready.notify_all();
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().queue.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Есть ли у ящика дескриптор для внешнего цикла опроса.
    pub fn is_pollable(&self) -> bool {
        self.flare.is_some()
    }

    #[cfg(unix)]
    pub fn descriptor(&self) -> Option<RawFd> {
        self.flare.as_ref().map(|f| f.as_raw_fd())
    }

    fn light(
        &self,
        state: &mut MailboxState,
    ) {
        if state.lit {
            return;
        }
        if let Some(flare) = &self.flare {
            if let Err(e) = flare.fire() {
                warn!(subscriber = %self.id, error = %e, "Failed to fire mailbox flare");
                return;
            }
        }
        state.lit = true;
    }

    fn dim(
        &self,
        state: &mut MailboxState,
    ) {
        if !state.lit || state.closed || !state.queue.is_empty() {
            return;
        }
        if let Some(flare) = &self.flare {
            if let Err(e) = flare.extinguish() {
                warn!(subscriber = %self.id, error = %e, "Failed to extinguish mailbox flare");
                return;
            }
        }
        state.lit = false;
    }
}

impl fmt::Debug for Mailbox {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Mailbox")
            .field("id", &self.id)
            .field("len", &state.queue.len())
            .field("closed", &state.closed)
            .field("pollable", &self.flare.is_some())
            .finish()
    }
}

/// Внешний вид почтового ящика для потребителя, встроенного в свой цикл
/// событий.
#[derive(Debug, Clone)]
pub struct MailboxHandle {
    inner: Arc<Mailbox>,
}

impl MailboxHandle {
    pub(crate) fn new(inner: Arc<Mailbox>) -> Self {
        Self { inner }
    }

    /// Дескриптор, готовый к чтению пока в ящике есть данные (или он
    /// закрыт). `None` для неопрашиваемого ящика.
    #[cfg(unix)]
    pub fn descriptor(&self) -> Option<RawFd> {
        self.inner.descriptor()
    }

    /// Обёртка с `AsRawFd`/`AsFd` для регистрации в `poll`/epoll.
    #[cfg(unix)]
    pub fn pollable(&self) -> Option<PollableMailbox> {
        self.inner.flare.as_ref().map(|flare| PollableMailbox {
            mailbox: Arc::clone(&self.inner),
            flare: Arc::clone(flare),
        })
    }

    /// Количество элементов в очереди.
    pub fn size(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    pub fn try_dequeue(&self) -> Option<Element> {
        self.inner.try_dequeue()
    }
}

/// Опрашиваемый почтовый ящик: дескриптор плюс доступ к очереди.
#[cfg(unix)]
#[derive(Debug, Clone)]
pub struct PollableMailbox {
    mailbox: Arc<Mailbox>,
    flare: Arc<Flare>,
}

#[cfg(unix)]
impl PollableMailbox {
    pub fn try_dequeue(&self) -> Option<Element> {
        self.mailbox.try_dequeue()
    }

    pub fn is_closed(&self) -> bool {
        self.mailbox.is_closed()
    }
}

#[cfg(unix)]
impl AsRawFd for PollableMailbox {
    fn as_raw_fd(&self) -> RawFd {
        self.flare.as_raw_fd()
    }
}

#[cfg(unix)]
impl AsFd for PollableMailbox {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.flare.as_fd()
    }
}
