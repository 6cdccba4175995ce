//! Endpoint: точка подписки, публикации и приёма.
//!
//! Endpoint владеет почтовым ящиком своего подписчика и ссылкой на ядро.
//! Ядро либо создаётся самим endpoint'ом ([`Endpoint::new`]), либо общее для
//! нескольких endpoint'ов ([`Endpoint::attach`]). Endpoint без ядра
//! ([`Endpoint::inert`]) допустим: управляющие операции ничего не делают, а
//! приём сразу возвращает [`EndpointError::NotInitialized`].
//!
//! # Один потребитель
//!
//! Приём (`receive*`, `try_receive`, а также выборка через
//! [`MailboxHandle`]) рассчитан на одного потребителя. Несколько потоков,
//! читающих один endpoint, не получат ни ошибки, ни гарантий о том, кому
//! достанется какой элемент.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use tracing::debug;
use zbroker_error::{BrokerResult, EndpointError};

use crate::{
    config::{MailboxConfig, Settings},
    router::{Core, CoreActor, CoreHandle},
    Element, Mailbox, MailboxHandle, SubscriberId, Topic,
};

#[derive(Debug, Default)]
pub struct Endpoint {
    core: Option<CoreHandle>,
    /// Собственное ядро, если endpoint его запускал.
    owned_core: Option<Core>,
    subscriber: Option<Arc<Mailbox>>,
}

impl Endpoint {
    /// Создаёт ящик, затем запускает собственное ядро и регистрируется в нём.
    pub fn new(settings: &Settings) -> BrokerResult<Self> {
        let mailbox = Mailbox::new(&settings.mailbox)?;
        let core = CoreActor::spawn(&settings.core)?;
        let handle = core.handle();
        handle.attach(&mailbox);
        debug!(subscriber = %mailbox.id(), core = handle.name(), "Endpoint created with own core");

        Ok(Self {
            core: Some(handle),
            owned_core: Some(core),
            subscriber: Some(mailbox),
        })
    }

    /// Создаёт ящик и регистрируется в общем ядре.
    pub fn attach(
        core: &CoreHandle,
        config: &MailboxConfig,
    ) -> BrokerResult<Self> {
        let mailbox = Mailbox::new(config)?;
        core.attach(&mailbox);
        debug!(subscriber = %mailbox.id(), core = core.name(), "Endpoint attached");

        Ok(Self {
            core: Some(core.clone()),
            owned_core: None,
            subscriber: Some(mailbox),
        })
    }

    /// Endpoint без ядра и ящика.
    pub fn inert() -> Self {
        Self::default()
    }

    /// `true`, если endpoint был привязан к ядру (в том числе уже
    /// остановленный).
    pub fn is_initialized(&self) -> bool {
        self.subscriber.is_some()
    }

    pub fn id(&self) -> Option<SubscriberId> {
        self.subscriber.as_ref().map(|mb| mb.id())
    }

    /// Ядро, к которому привязан endpoint; `None` для inert и после
    /// `shutdown()`.
    pub fn core(&self) -> Option<&CoreHandle> {
        self.core.as_ref()
    }

    fn control(&self) -> Option<(&CoreHandle, &Arc<Mailbox>)> {
        self.core.as_ref().zip(self.subscriber.as_ref())
    }

    fn consumer(&self) -> Result<&Arc<Mailbox>, EndpointError> {
        self.subscriber.as_ref().ok_or(EndpointError::NotInitialized)
    }

    pub fn subscribe(
        &self,
        topic: impl Into<Topic>,
    ) {
        self.subscribe_many([topic.into()]);
    }

    pub fn unsubscribe(
        &self,
        topic: impl Into<Topic>,
    ) {
        self.unsubscribe_many([topic.into()]);
    }

    pub fn subscribe_many<I, T>(
        &self,
        topics: I,
    ) where
        I: IntoIterator<Item = T>,
        T: Into<Topic>,
    {
        if let Some((core, mailbox)) = self.control() {
            core.subscribe(topics, mailbox);
        }
    }

    pub fn unsubscribe_many<I, T>(
        &self,
        topics: I,
    ) where
        I: IntoIterator<Item = T>,
        T: Into<Topic>,
    {
        if let Some((core, mailbox)) = self.control() {
            core.unsubscribe(topics, mailbox.id());
        }
    }

    /// Публикует данные в топик. Подписчики, включая сам endpoint, получат
    /// `Element::Data`.
    pub fn publish(
        &self,
        topic: impl Into<Topic>,
        payload: impl Into<Bytes>,
    ) {
        if let Some(core) = &self.core {
            let topic = topic.into();
            core.publish(topic.clone(), Element::data(topic, payload));
        }
    }

    /// Публикует произвольный элемент (например, статус) в топик.
    pub fn publish_element(
        &self,
        topic: impl Into<Topic>,
        element: impl Into<Element>,
    ) {
        if let Some(core) = &self.core {
            core.publish(topic, element);
        }
    }

    /// Блокирует поток до появления элемента.
    ///
    /// # Возвращает
    /// - `Ok(Element)`: данные, статус или ошибка брокера, по тегу
    /// - `Err(EndpointError::NotInitialized)` сразу, если ядра нет
    /// - `Err(EndpointError::Closed)` когда ящик закрыт и пуст
    pub fn receive(&self) -> Result<Element, EndpointError> {
        self.consumer()?.dequeue().ok_or(EndpointError::Closed)
    }

    /// Элемент, если он уже есть; `Ok(None)` для пустого открытого ящика.
    pub fn try_receive(&self) -> Result<Option<Element>, EndpointError> {
        let mailbox = self.consumer()?;
        match mailbox.try_dequeue() {
            Some(element) => Ok(Some(element)),
            None => closed_or_empty(mailbox),
        }
    }

    /// Как [`receive`](Self::receive), но `Ok(None)` по истечении `timeout`.
    pub fn receive_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Option<Element>, EndpointError> {
        let mailbox = self.consumer()?;
        match mailbox.dequeue_timeout(timeout) {
            Some(element) => Ok(Some(element)),
            None => closed_or_empty(mailbox),
        }
    }

    pub async fn receive_async(&self) -> Result<Element, EndpointError> {
        self.consumer()?
            .dequeue_async()
            .await
            .ok_or(EndpointError::Closed)
    }

    /// Вид ящика для внешнего цикла событий.
    pub fn mailbox(&self) -> Result<MailboxHandle, EndpointError> {
        self.consumer().map(|mb| MailboxHandle::new(Arc::clone(mb)))
    }

    /// Отписывается от ядра, закрывает свой ящик и останавливает собственное
    /// ядро. Повторный вызов ничего не делает.
    ///
    /// Элементы, уже лежащие в ящике, остаются доступны для чтения.
    pub fn shutdown(&mut self) {
        let core = self.core.take();
        if let Some(mailbox) = &self.subscriber {
            if let Some(core) = &core {
                core.detach(mailbox.id());
            }
            mailbox.close();
        }
        if let Some(owned) = self.owned_core.take() {
            owned.shutdown();
        }
        if core.is_some() {
            debug!(subscriber = ?self.id(), "Endpoint shut down");
        }
    }
}

/// Пустой ящик: закрыт ли он? Между пустой выборкой и проверкой мог прийти
/// последний элемент, поэтому после закрытия выборка повторяется.
fn closed_or_empty(mailbox: &Mailbox) -> Result<Option<Element>, EndpointError> {
    if !mailbox.is_closed() {
        return Ok(None);
    }
    mailbox
        .try_dequeue()
        .map(Some)
        .ok_or(EndpointError::Closed)
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, StatusKind};

    fn settings() -> Settings {
        let mut s = Settings::default();
        s.mailbox.pollable = false;
        s
    }

    #[test]
    fn test_inert_endpoint() {
        let ep = Endpoint::inert();
        assert!(!ep.is_initialized());
        assert!(ep.id().is_none());
        assert_eq!(ep.receive(), Err(EndpointError::NotInitialized));
        assert_eq!(ep.try_receive(), Err(EndpointError::NotInitialized));
        assert_eq!(ep.mailbox().unwrap_err(), EndpointError::NotInitialized);
        // Управляющие операции молча игнорируются.
        ep.subscribe("a");
        ep.publish("a", "x");
        ep.unsubscribe("a");
    }

    #[test]
    fn test_self_delivery() {
        let ep = Endpoint::new(&settings()).unwrap();
        ep.subscribe("a/b");
        ep.publish("a/b", "hello");
        let el = ep.receive().unwrap();
        let msg = el.into_data().unwrap();
        assert_eq!(msg.topic, Topic::new("a/b"));
        assert_eq!(msg.payload, Bytes::from_static(b"hello"));
        assert_eq!(ep.try_receive(), Ok(None));
    }

    /// Статусы и ошибки приходят по тому же пути, что и данные.
    #[test]
    fn test_status_and_error_elements() {
        let ep = Endpoint::new(&settings()).unwrap();
        ep.subscribe("");
        ep.publish_element("peers", Element::status(StatusKind::PeerLost, "n1"));
        ep.publish_element("store", Element::error(ErrorKind::NoSuchKey, "k"));

        let first = ep.receive().unwrap();
        let second = ep.receive().unwrap();
        assert!(first.is_status());
        assert!(second.is_error());
    }

    #[test]
    fn test_receive_timeout_on_empty() {
        let ep = Endpoint::new(&settings()).unwrap();
        let got = ep.receive_timeout(Duration::from_millis(20)).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn test_receive_timeout_max_duration() {
        let ep = Endpoint::new(&settings()).unwrap();
        ep.subscribe("t");
        ep.publish("t", "x");
        let el = ep.receive_timeout(Duration::MAX).unwrap().unwrap();
        assert!(el.is_data());
    }

    #[test]
    fn test_shutdown_drains_then_reports_closed() {
        let mut ep = Endpoint::new(&settings()).unwrap();
        ep.subscribe("t");
        ep.publish("t", "last");
        // Дождаться доставки до остановки.
        let handle = ep.mailbox().unwrap();
        assert!(ep.receive_timeout(Duration::from_secs(5)).unwrap().is_some());
        ep.publish("t", "after");
        let _ = ep.core().unwrap().snapshot();

        ep.shutdown();
        assert!(ep.core().is_none());
        assert!(ep.is_initialized());
        assert!(handle.is_closed());
        assert!(ep.receive().unwrap().is_data());
        assert_eq!(ep.receive(), Err(EndpointError::Closed));
        assert_eq!(ep.try_receive(), Err(EndpointError::Closed));

        ep.shutdown();
    }

    #[test]
    fn test_shared_core() {
        let core = CoreActor::spawn(&Default::default()).unwrap();
        let cfg = MailboxConfig { pollable: false };
        let a = Endpoint::attach(&core.handle(), &cfg).unwrap();
        let b = Endpoint::attach(&core.handle(), &cfg).unwrap();
        b.subscribe_many(["x", "y/z"]);
        a.publish("y/z/w", "hi");

        let el = b.receive_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert_eq!(el.topic(), Some(&Topic::new("y/z/w")));
        assert_eq!(a.try_receive(), Ok(None));

        b.unsubscribe_many(["x", "y/z"]);
        let snap = core.handle().snapshot().unwrap();
        assert!(snap.topics.is_empty());
        assert_eq!(snap.subscribers.len(), 2);

        drop(b);
        let snap = core.handle().snapshot().unwrap();
        assert_eq!(snap.subscribers, vec![a.id().unwrap()]);
    }
}
