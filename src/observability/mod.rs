//! Observability: subscriber setup and logging middleware.
//!
//! The transport emits `tracing` spans and events on its own.
//! [`LoggingConfig`] installs a subscriber for applications that want one, and
//! [`RequestLogger`] can be installed through the transport hook to trace each
//! exchange with credentials masked.

mod logging;
mod middleware;

pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use middleware::{redact, ErrorLogger, RequestLogger};
