//! Элементы, которые брокер доставляет подписчикам.
//!
//! Элемент это размеченное объединение: прикладные данные, статус жизненного
//! цикла брокера или структурированная ошибка. Статусы и ошибки приходят по
//! тому же пути, что и данные; потребитель различает их по тегу.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::Topic;

/// Прикладные данные вместе с топиком, в который они опубликованы.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataMessage {
    pub topic: Topic,
    pub payload: Bytes,
}

impl DataMessage {
    pub fn new(
        topic: impl Into<Topic>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Вид статусного уведомления.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StatusKind {
    #[default]
    Unspecified,
    PeerAdded,
    PeerRemoved,
    PeerLost,
    PeerRecovered,
    EndpointShutdown,
}

/// Статус жизненного цикла (например, смена состояния пира).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub kind: StatusKind,
    pub message: String,
}

impl Status {
    pub fn new(
        kind: StatusKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Вид ошибки, доставляемой как элемент.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    #[default]
    Unspecified,
    PeerIncompatible,
    PeerInvalid,
    PeerUnavailable,
    PeerTimeout,
    MasterExists,
    NoSuchMaster,
    NoSuchKey,
    RequestTimeout,
    TypeClash,
    InvalidData,
    BackendFailure,
    StaleData,
    NotInitialized,
}

/// Структурированное описание сбоя: вид и сообщение.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorElement {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorElement {
    pub fn new(
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// То, что лежит в почтовом ящике подписчика.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    Data(DataMessage),
    Status(Status),
    Error(ErrorElement),
}

impl Element {
    pub fn data(
        topic: impl Into<Topic>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Element::Data(DataMessage::new(topic, payload))
    }

    pub fn status(
        kind: StatusKind,
        message: impl Into<String>,
    ) -> Self {
        Element::Status(Status::new(kind, message))
    }

    pub fn error(
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Element::Error(ErrorElement::new(kind, message))
    }

    /// Топик для данных; у статусов и ошибок его нет.
    pub fn topic(&self) -> Option<&Topic> {
        match self {
            Element::Data(msg) => Some(&msg.topic),
            _ => None,
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(self, Element::Data(_))
    }

    pub fn is_status(&self) -> bool {
        matches!(self, Element::Status(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Element::Error(_))
    }

    pub fn into_data(self) -> Option<DataMessage> {
        match self {
            Element::Data(msg) => Some(msg),
            _ => None,
        }
    }

    /// Короткое имя тега для логов.
    pub fn tag(&self) -> &'static str {
        match self {
            Element::Data(_) => "data",
            Element::Status(_) => "status",
            Element::Error(_) => "error",
        }
    }
}

impl From<DataMessage> for Element {
    fn from(msg: DataMessage) -> Self {
        Element::Data(msg)
    }
}

impl From<Status> for Element {
    fn from(s: Status) -> Self {
        Element::Status(s)
    }
}

impl From<ErrorElement> for Element {
    fn from(e: ErrorElement) -> Self {
        Element::Error(e)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    /// Тест проверяет создание данных с &str и &'static [u8].
    #[test]
    fn test_data_creation() {
        let el = Element::data("/news/", Bytes::from_static(b"hello"));
        assert!(el.is_data());
        assert_eq!(el.topic(), Some(&Topic::new("news")));
        let msg = el.into_data().unwrap();
        assert_eq!(msg.payload, Bytes::from_static(b"hello"));
    }

    #[test]
    fn test_data_with_empty_payload() {
        let msg = DataMessage::new("system", Vec::<u8>::new());
        assert!(msg.payload.is_empty());
    }

    /// Тест проверяет классификацию по тегу.
    #[test]
    fn test_tags() {
        let status = Element::status(StatusKind::PeerAdded, "peer 1 up");
        let error = Element::error(ErrorKind::PeerTimeout, "no heartbeat");
        assert!(status.is_status() && !status.is_data());
        assert!(error.is_error() && error.topic().is_none());
        assert_eq!(status.tag(), "status");
        assert_eq!(error.tag(), "error");
        assert!(error.into_data().is_none());
    }

    /// Виды статусов и ошибок сериализуются в snake_case и обратно.
    #[test]
    fn test_kind_names_roundtrip() {
        for kind in StatusKind::iter() {
            assert_eq!(StatusKind::from_str(kind.as_ref()).unwrap(), kind);
        }
        for kind in ErrorKind::iter() {
            assert_eq!(ErrorKind::from_str(&kind.to_string()).unwrap(), kind);
        }
        assert_eq!(ErrorKind::PeerIncompatible.as_ref(), "peer_incompatible");
        assert!(ErrorKind::from_str("no_such_kind").is_err());
    }

    #[test]
    fn test_serde_tagged_layout() {
        let el = Element::error(ErrorKind::NoSuchKey, "k");
        let json = serde_json::to_value(&el).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["kind"], "no_such_key");
    }
}
