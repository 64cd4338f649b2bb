use crate::bridge::{LinkMonitor, StreamBridge};
use crate::error::{DHStreamError, Result};
use crate::transport::{LoginHandle, StreamHandle, Transport};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
    Streaming,
    Stopped,
}

/// One authenticated connection to a device and at most one running stream.
///
/// Dropping a session performs the same teardown as [`Session::stop`].
pub struct Session {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) bridge: Arc<StreamBridge>,
    pub(crate) monitor: Arc<LinkMonitor>,

    pub(crate) login_handle: Option<LoginHandle>,
    pub(crate) stream_handle: Option<StreamHandle>,

    initialized: bool,
    stopped: bool,
}

impl Session {
    /// Initialise the transport and bind the session to `bridge`'s sink.
    pub fn new(transport: Arc<dyn Transport>, bridge: StreamBridge) -> Result<Self> {
        let monitor = Arc::new(LinkMonitor::new());
        transport.init(monitor.clone())?;

        Ok(Self {
            transport,
            bridge: Arc::new(bridge),
            monitor,
            login_handle: None,
            stream_handle: None,
            initialized: true,
            stopped: false,
        })
    }

    pub fn state(&self) -> SessionState {
        if self.stopped {
            SessionState::Stopped
        } else if self.stream_handle.is_some() {
            SessionState::Streaming
        } else if self.login_handle.is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Unauthenticated
        }
    }

    pub fn bridge(&self) -> &StreamBridge {
        &self.bridge
    }

    pub fn link_monitor(&self) -> &LinkMonitor {
        &self.monitor
    }

    pub(crate) fn ensure_active(&self) -> Result<()> {
        if self.stopped {
            return Err(DHStreamError::Stopped);
        }
        Ok(())
    }

    /// Stop the stream, log out and release the SDK, in that order.
    ///
    /// Safe to call any number of times, in any state. The SDK calls are made
    /// on the calling thread and block it; unlike `login` and `start_stream`
    /// this does not go through `spawn_blocking`, so it can also run from
    /// `Drop` and outside a runtime.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        debug!(state = ?self.state(), "stopping session");

        self.release_stream();
        self.release_login();

        if self.initialized {
            self.transport.cleanup();
            self.initialized = false;
        }
        self.stopped = true;
    }

    pub(crate) fn release_stream(&mut self) {
        if let Some(stream) = self.stream_handle.take()
            && let Err(e) = self.transport.stop_realplay(stream)
        {
            warn!(handle = %stream, error = %e, "failed to stop realplay");
        }
    }

    pub(crate) fn release_login(&mut self) {
        // A stream may never outlive its login.
        self.release_stream();
        if let Some(login) = self.login_handle.take()
            && let Err(e) = self.transport.logout(login)
        {
            warn!(handle = %login, error = %e, "failed to log out");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}
