//! A scriptable in-process transport.
//!
//! Useful to drive a [`Session`](crate::Session) without a device: login and
//! realplay outcomes are configured up front, frames and link events are
//! injected by the caller, and every SDK call is recorded in order.

use super::{LoginHandle, LoginReply, StreamHandle, StreamVariant, Transport};
use crate::bridge::{ConnectionEvent, ConnectionEvents, DataHandler};
use crate::commands::Credentials;
use crate::error::{DHStreamError, Result};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Init,
    Login { address: String, port: u16, username: String },
    LastError,
    StartRealplay { channel: u32, variant: StreamVariant },
    SetDataHandler(StreamHandle),
    StopRealplay(StreamHandle),
    Logout(LoginHandle),
    Cleanup,
}

#[derive(Debug, Clone, Copy)]
enum LoginScript {
    Accept,
    Reject { error_code: i32, last_error: u32 },
}

pub struct MemoryTransport {
    next_handle: AtomicI64,
    login: Mutex<LoginScript>,
    reject_realplay: AtomicBool,
    reject_handler: AtomicBool,
    last_error: AtomicU32,
    handlers: DashMap<StreamHandle, Arc<dyn DataHandler>>,
    events: RwLock<Option<Arc<dyn ConnectionEvents>>>,
    logins: Mutex<Vec<(LoginHandle, String, i32)>>,
    calls: Mutex<Vec<TransportCall>>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self {
            next_handle: AtomicI64::new(1),
            login: Mutex::new(LoginScript::Accept),
            reject_realplay: AtomicBool::new(false),
            reject_handler: AtomicBool::new(false),
            last_error: AtomicU32::new(0),
            handlers: DashMap::new(),
            events: RwLock::new(None),
            logins: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse logins with the given `nError`.
    pub fn reject_login(self, error_code: i32) -> Self {
        self.reject_login_with_last_error(error_code, 0)
    }

    /// Refuse logins with `error_code`; `last_error` is what the SDK reports afterwards.
    pub fn reject_login_with_last_error(self, error_code: i32, last_error: u32) -> Self {
        *self.login.lock().unwrap_or_else(PoisonError::into_inner) = LoginScript::Reject {
            error_code,
            last_error,
        };
        self
    }

    /// Answer every realplay request with a null handle.
    pub fn reject_realplay(self) -> Self {
        self.reject_realplay.store(true, Ordering::Release);
        self
    }

    /// Fail data handler registration.
    pub fn reject_data_handler(self) -> Self {
        self.reject_handler.store(true, Ordering::Release);
        self
    }

    /// Every SDK call made so far, in order.
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Streams that currently have a data handler.
    pub fn active_streams(&self) -> Vec<StreamHandle> {
        self.handlers.iter().map(|entry| *entry.key()).collect()
    }

    /// Deliver one buffer the way the SDK's delivery thread would.
    /// Returns false when no handler is bound to `stream`.
    pub fn deliver(&self, stream: StreamHandle, data: &[u8]) -> bool {
        // Clone out of the map so the shard lock is not held during the callback.
        let Some(handler) = self.handlers.get(&stream).map(|h| Arc::clone(h.value())) else {
            return false;
        };
        handler.on_data(stream, 0, data);
        true
    }

    pub fn disconnect(&self) {
        self.notify(|events, event| events.on_disconnect(event));
    }

    pub fn reconnect(&self) {
        self.notify(|events, event| events.on_reconnect(event));
    }

    fn notify(&self, f: impl Fn(&dyn ConnectionEvents, &ConnectionEvent)) {
        let Some(events) = self
            .events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        else {
            return;
        };
        let logins = self
            .logins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for (login, address, port) in logins {
            f(events.as_ref(), &ConnectionEvent::new(Some(login), address, port));
        }
    }

    fn record(&self, call: TransportCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    fn allocate(&self) -> i64 {
        self.next_handle.fetch_add(1, Ordering::AcqRel)
    }
}

impl Transport for MemoryTransport {
    fn init(&self, events: Arc<dyn ConnectionEvents>) -> Result<()> {
        self.record(TransportCall::Init);
        *self.events.write().unwrap_or_else(PoisonError::into_inner) = Some(events);
        Ok(())
    }

    fn cleanup(&self) {
        self.record(TransportCall::Cleanup);
        self.handlers.clear();
        *self.events.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn login(&self, credentials: &Credentials) -> LoginReply {
        self.record(TransportCall::Login {
            address: credentials.address.clone(),
            port: credentials.port,
            username: credentials.username.clone(),
        });

        let script = *self.login.lock().unwrap_or_else(PoisonError::into_inner);
        match script {
            LoginScript::Accept => {
                let handle = LoginHandle::from_raw(self.allocate());
                if let Some(handle) = handle {
                    self.logins
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push((handle, credentials.address.clone(), credentials.port.into()));
                }
                LoginReply {
                    handle,
                    error_code: 0,
                }
            }
            LoginScript::Reject {
                error_code,
                last_error,
            } => {
                self.last_error.store(last_error, Ordering::Release);
                LoginReply {
                    handle: None,
                    error_code,
                }
            }
        }
    }

    fn last_error(&self) -> u32 {
        self.record(TransportCall::LastError);
        self.last_error.load(Ordering::Acquire)
    }

    fn start_realplay(
        &self,
        _login: LoginHandle,
        channel: u32,
        variant: StreamVariant,
    ) -> Option<StreamHandle> {
        self.record(TransportCall::StartRealplay { channel, variant });
        if self.reject_realplay.load(Ordering::Acquire) {
            return None;
        }
        StreamHandle::from_raw(self.allocate())
    }

    fn set_data_handler(&self, stream: StreamHandle, handler: Arc<dyn DataHandler>) -> Result<()> {
        self.record(TransportCall::SetDataHandler(stream));
        if self.reject_handler.load(Ordering::Acquire) {
            return Err(DHStreamError::TransportError(
                "CLIENT_SetRealDataCallBackEx2 failed".to_string(),
            ));
        }
        self.handlers.insert(stream, handler);
        Ok(())
    }

    fn stop_realplay(&self, stream: StreamHandle) -> Result<()> {
        self.record(TransportCall::StopRealplay(stream));
        self.handlers.remove(&stream);
        Ok(())
    }

    fn logout(&self, login: LoginHandle) -> Result<()> {
        self.record(TransportCall::Logout(login));
        let mut logins = self.logins.lock().unwrap_or_else(PoisonError::into_inner);
        let before = logins.len();
        logins.retain(|(handle, _, _)| *handle != login);
        if logins.len() == before {
            return Err(DHStreamError::TransportError(format!("unknown login {login}")));
        }
        Ok(())
    }
}
