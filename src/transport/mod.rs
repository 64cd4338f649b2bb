//! The device SDK boundary.
//!
//! Everything that actually talks to a device goes through [`Transport`]. The
//! trait mirrors the shape of the vendor's C API: blocking calls, zero handles
//! on failure, and callbacks delivered on SDK-owned threads.

pub mod memory;
#[cfg(feature = "netsdk")]
pub mod netsdk;

use crate::bridge::{ConnectionEvents, DataHandler};
use crate::commands::Credentials;
use crate::constants::{DH_RTYPE_REALPLAY, DH_RTYPE_REALPLAY_1, DH_RTYPE_REALPLAY_2, DH_RTYPE_REALPLAY_3};
use crate::error::Result;
use std::fmt;
use std::num::NonZeroI64;
use std::sync::Arc;
use strum_macros::{AsRefStr, EnumIter, FromRepr};

pub use memory::{MemoryTransport, TransportCall};
#[cfg(feature = "netsdk")]
pub use netsdk::NetSdkTransport;

/// Opaque handle returned by a successful login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoginHandle(NonZeroI64);

/// Opaque handle of a running real-time stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle(NonZeroI64);

macro_rules! sdk_handle {
    ($name:ident) => {
        impl $name {
            /// `None` for the SDK's zero "failed" handle.
            pub fn from_raw(raw: i64) -> Option<Self> {
                NonZeroI64::new(raw).map(Self)
            }

            pub fn raw(self) -> i64 {
                self.0.get()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

sdk_handle!(LoginHandle);
sdk_handle!(StreamHandle);

/// One of the four real-time stream variants, selected by `0..=3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, EnumIter, AsRefStr)]
#[repr(i32)]
pub enum StreamVariant {
    #[strum(serialize = "main")]
    Main = 0,
    #[strum(serialize = "extra1")]
    Extra1 = 1,
    #[strum(serialize = "extra2")]
    Extra2 = 2,
    #[strum(serialize = "extra3")]
    Extra3 = 3,
}

impl StreamVariant {
    pub fn from_selector(selector: i32) -> Option<Self> {
        Self::from_repr(selector)
    }

    pub fn selector(self) -> i32 {
        self as i32
    }

    /// The `DH_RealPlayType` passed to `CLIENT_RealPlayEx`.
    pub fn realplay_type(self) -> i32 {
        match self {
            StreamVariant::Main => DH_RTYPE_REALPLAY,
            StreamVariant::Extra1 => DH_RTYPE_REALPLAY_1,
            StreamVariant::Extra2 => DH_RTYPE_REALPLAY_2,
            StreamVariant::Extra3 => DH_RTYPE_REALPLAY_3,
        }
    }
}

impl fmt::Display for StreamVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// What the device answered to a login request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginReply {
    pub handle: Option<LoginHandle>,
    pub error_code: i32,
}

pub trait Transport: Send + Sync + 'static {
    /// Process-wide SDK setup. Registers the disconnect and auto-reconnect hooks.
    fn init(&self, events: Arc<dyn ConnectionEvents>) -> Result<()>;

    /// Process-wide SDK teardown.
    fn cleanup(&self);

    fn login(&self, credentials: &Credentials) -> LoginReply;

    /// Last SDK error on the calling thread.
    fn last_error(&self) -> u32;

    /// Open a raw stream. `None` when the device rejected it.
    fn start_realplay(
        &self,
        login: LoginHandle,
        channel: u32,
        variant: StreamVariant,
    ) -> Option<StreamHandle>;

    /// Bind the data-arrival handler to a running stream.
    fn set_data_handler(&self, stream: StreamHandle, handler: Arc<dyn DataHandler>) -> Result<()>;

    /// Once this returns the handler bound to `stream` is no longer called.
    fn stop_realplay(&self, stream: StreamHandle) -> Result<()>;

    fn logout(&self, login: LoginHandle) -> Result<()>;
}
