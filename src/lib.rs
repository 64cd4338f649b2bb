pub mod bridge;
pub mod codes;
pub mod commands;
pub mod config;
pub mod constants;
pub mod error;
pub mod session;
pub mod shutdown;
pub mod transport;

pub use bridge::{ConnectionEvent, ConnectionEvents, DataHandler, LinkMonitor, StreamBridge};
pub use codes::{LoginOutcome, describe_login_error, resolve_stream_variant};
pub use commands::*;
pub use config::Config;
pub use error::{DHStreamError, Result};
pub use session::{Session, SessionState};
pub use shutdown::Shutdown;
pub use transport::{LoginHandle, MemoryTransport, StreamHandle, StreamVariant, Transport};
