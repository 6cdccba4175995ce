/// Broker settings loading (environment, files).
pub mod config;
/// Error-free value conversion (`Convert<T>`, `to`, `to_string`).
pub mod convert;
/// Elements delivered to subscribers: data, status, error.
pub mod element;
/// Endpoint: subscribe, publish, receive.
pub mod endpoint;
/// Logging initialization on top of `tracing`.
pub mod logging;
/// Subscriber mailboxes with blocking, async and pollable wakeups.
pub mod mailbox;
/// Core Actor: subscription table and routing thread.
pub mod router;
/// Hierarchical topics and prefix matching.
pub mod topic;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Settings.
pub use self::config::{CoreConfig, MailboxConfig, Settings};
/// Conversion API.
pub use convert::{
    from_string, parse_as, to, to_string, try_to_string, write_converted, Convert, ConvertExt,
    Converted,
};
/// Element model.
pub use element::{DataMessage, Element, ErrorElement, ErrorKind, Status, StatusKind};
pub use endpoint::Endpoint;
pub use logging::{init_logging, LogFormat, LoggingConfig, LoggingHandle};
#[cfg(unix)]
pub use mailbox::PollableMailbox;
pub use mailbox::{Mailbox, MailboxHandle, SubscriberId};
/// Routing core.
pub use router::{
    Core, CoreActor, CoreHandle, RouterStats, RouterStatsSnapshot, SubscriptionTable,
    TableSnapshot,
};
pub use topic::Topic;
/// Error types shared with the `zbroker-error` crate.
pub use zbroker_error::{BrokerResult, CoreError, EndpointError, StackError, StatusCode};
