//! Иерархические топики.
//!
//! Топик это путь из сегментов, разделённых `/`. Нормализация выполняется
//! один раз при создании: пустые сегменты (ведущий, завершающий или двойной
//! разделитель) отбрасываются, поэтому `"/a//b/"` и `"a/b"` это один и тот же
//! топик с одинаковым хешем.
//!
//! Подписка на топик `R` получает публикации в топик `P`, если `R` является
//! посегментным префиксом `P` (включая `R == P`). Пустая строка даёт корневой
//! топик, префикс любого другого.

use std::{convert::Infallible, fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Неизменяемый нормализованный путь.
///
/// Клонирование дешёвое: внутри `Arc<str>`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic {
    path: Arc<str>,
}

impl Topic {
    /// Разделитель сегментов.
    pub const SEPARATOR: char = '/';

    pub fn new(path: impl AsRef<str>) -> Self {
        let raw = path.as_ref();
        let canonical = if is_canonical(raw) {
            Arc::from(raw)
        } else {
            let joined = raw
                .split(Self::SEPARATOR)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("/");
            Arc::from(joined)
        };
        Self { path: canonical }
    }

    /// Корневой топик: ноль сегментов, совпадает с любой публикацией.
    pub fn root() -> Self {
        Self {
            path: Arc::from(""),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> + '_ {
        self.path.split(Self::SEPARATOR).filter(|s| !s.is_empty())
    }

    /// Количество сегментов.
    pub fn depth(&self) -> usize {
        if self.is_root() {
            0
        } else {
            self.path.matches(Self::SEPARATOR).count() + 1
        }
    }

    /// `true`, если `self` посегментный префикс `other` (или равен ему).
    ///
    /// `a/b` префикс `a/b/c`, но не `a/bc`.
    pub fn is_prefix_of(
        &self,
        other: &Topic,
    ) -> bool {
        if self.is_root() {
            return true;
        }
        let (prefix, full) = (self.as_str(), other.as_str());
        full.starts_with(prefix)
            && (full.len() == prefix.len()
                || full.as_bytes()[prefix.len()] == Self::SEPARATOR as u8)
    }

    /// Правило маршрутизации: зарегистрированный топик `self` совпадает с
    /// опубликованным `published`.
    pub fn matches(
        &self,
        published: &Topic,
    ) -> bool {
        self.is_prefix_of(published)
    }

    /// Добавляет сегмент(ы) в конец.
    pub fn join(
        &self,
        suffix: impl AsRef<str>,
    ) -> Topic {
        Topic::new(format!("{}/{}", self.path, suffix.as_ref()))
    }

    /// Топик без последнего сегмента; `None` для корня.
    pub fn parent(&self) -> Option<Topic> {
        if self.is_root() {
            return None;
        }
        match self.path.rfind(Self::SEPARATOR) {
            Some(pos) => Some(Topic {
                path: Arc::from(&self.path[..pos]),
            }),
            None => Some(Topic::root()),
        }
    }

    /// Все префиксы от корня до самого топика включительно.
    ///
    /// `a/b` даёт `""`, `"a"`, `"a/b"`. Длина результата `depth() + 1`.
    pub fn prefixes(&self) -> impl Iterator<Item = Topic> + '_ {
        let separators = self
            .path
            .char_indices()
            .filter(|(_, c)| *c == Self::SEPARATOR)
            .map(|(i, _)| i);
        let ends = std::iter::once(0)
            .chain(separators)
            .chain((!self.is_root()).then_some(self.path.len()));
        ends.map(move |end| {
            if end == self.path.len() {
                self.clone()
            } else {
                Topic {
                    path: Arc::from(&self.path[..end]),
                }
            }
        })
    }
}

fn is_canonical(raw: &str) -> bool {
    !raw.starts_with(Topic::SEPARATOR) && !raw.ends_with(Topic::SEPARATOR) && !raw.contains("//")
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для Topic
////////////////////////////////////////////////////////////////////////////////

impl Default for Topic {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Debug for Topic {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "Topic({:?})", self.as_str())
    }
}

impl fmt::Display for Topic {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Topic::new(s))
    }
}

impl From<&str> for Topic {
    fn from(s: &str) -> Self {
        Topic::new(s)
    }
}

impl From<String> for Topic {
    fn from(s: String) -> Self {
        Topic::new(s)
    }
}

impl From<&Topic> for Topic {
    fn from(t: &Topic) -> Self {
        t.clone()
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Serialize for Topic {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Topic {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Topic::new(raw))
    }
}
