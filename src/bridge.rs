//! Handlers invoked by the transport on its own threads.
//!
//! [`StreamBridge`] moves every received buffer into the output sink before
//! returning to the SDK. [`LinkMonitor`] reports connection loss and recovery.
//! Neither touches session handles.

use crate::constants::DATE_FORMAT;
use crate::shutdown::Shutdown;
use crate::transport::{LoginHandle, StreamHandle};
use chrono::{DateTime, Local};
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error, info, warn};

/// Receives raw stream buffers. The slice is only valid for the duration of the call.
pub trait DataHandler: Send + Sync {
    fn on_data(&self, stream: StreamHandle, data_type: u32, data: &[u8]);
}

pub trait ConnectionEvents: Send + Sync {
    fn on_disconnect(&self, event: &ConnectionEvent);
    fn on_reconnect(&self, event: &ConnectionEvent);
}

#[derive(Debug, Clone)]
pub struct ConnectionEvent {
    pub login: Option<LoginHandle>,
    pub address: String,
    pub port: i32,
    pub at: DateTime<Local>,
}

impl ConnectionEvent {
    pub fn new(login: Option<LoginHandle>, address: impl Into<String>, port: i32) -> Self {
        Self {
            login,
            address: address.into(),
            port,
            at: Local::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub frames: u64,
    pub bytes: u64,
}

pub type Sink = Box<dyn Write + Send>;

pub struct StreamBridge {
    sink: Mutex<Sink>,
    debug: bool,
    shutdown: Option<Shutdown>,
    failed: AtomicBool,
    frames: AtomicU64,
    bytes: AtomicU64,
}

impl StreamBridge {
    pub fn new(sink: impl Write + Send + 'static) -> Self {
        Self {
            sink: Mutex::new(Box::new(sink)),
            debug: false,
            shutdown: None,
            failed: AtomicBool::new(false),
            frames: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
        }
    }

    /// Emit one record per received buffer.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Request a process shutdown when the sink stops accepting data.
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// True once a sink write has failed. Later frames are dropped.
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> StreamStats {
        StreamStats {
            frames: self.frames.load(Ordering::Acquire),
            bytes: self.bytes.load(Ordering::Acquire),
        }
    }

    fn write_frame(&self, data: &[u8]) -> std::io::Result<()> {
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        sink.write_all(data)?;
        sink.flush()
    }

    fn fail(&self, stream: StreamHandle, err: std::io::Error) {
        if self.failed.swap(true, Ordering::AcqRel) {
            return;
        }
        error!(handle = %stream, error = %err, "output sink failed, stopping");
        if let Some(shutdown) = &self.shutdown {
            shutdown.trigger();
        }
    }
}

impl DataHandler for StreamBridge {
    fn on_data(&self, stream: StreamHandle, data_type: u32, data: &[u8]) {
        if self.debug {
            debug!(handle = %stream, data_type, size = data.len(), "received buffer");
        }
        if self.has_failed() {
            return;
        }
        if let Err(err) = self.write_frame(data) {
            self.fail(stream, err);
            return;
        }
        self.frames.fetch_add(1, Ordering::AcqRel);
        self.bytes.fetch_add(data.len() as u64, Ordering::AcqRel);
    }
}

/// Logs link events. The stream is left alone; the SDK resumes it on reconnect.
#[derive(Debug, Default)]
pub struct LinkMonitor {
    disconnects: AtomicU64,
    reconnects: AtomicU64,
}

impl LinkMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disconnects(&self) -> u64 {
        self.disconnects.load(Ordering::Acquire)
    }

    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Acquire)
    }
}

impl ConnectionEvents for LinkMonitor {
    fn on_disconnect(&self, event: &ConnectionEvent) {
        self.disconnects.fetch_add(1, Ordering::AcqRel);
        warn!(
            address = %event.address,
            port = event.port,
            at = %event.at.format(DATE_FORMAT),
            "disconnected"
        );
    }

    fn on_reconnect(&self, event: &ConnectionEvent) {
        self.reconnects.fetch_add(1, Ordering::AcqRel);
        info!(
            address = %event.address,
            port = event.port,
            at = %event.at.format(DATE_FORMAT),
            "reconnected"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> Vec<u8> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Accepts `limit` bytes, then fails every write.
    struct BrokenPipe {
        limit: usize,
        written: usize,
    }

    impl Write for BrokenPipe {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.written + buf.len() > self.limit {
                return Err(io::Error::from(io::ErrorKind::BrokenPipe));
            }
            self.written += buf.len();
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn handle(raw: i64) -> StreamHandle {
        StreamHandle::from_raw(raw).unwrap()
    }

    #[test]
    fn output_is_concatenation_in_arrival_order() {
        let out = SharedBuffer::default();
        let bridge = StreamBridge::new(out.clone());
        let frames: [&[u8]; 5] = [b"abc", b"", b"\x00\x01\x02", b"", b"tail"];

        for frame in frames {
            bridge.on_data(handle(1), 0, frame);
        }

        assert_eq!(out.contents(), frames.concat());
        assert_eq!(bridge.stats(), StreamStats { frames: 5, bytes: 10 });
    }

    #[test]
    fn debug_mode_does_not_change_output() {
        let out = SharedBuffer::default();
        let bridge = StreamBridge::new(out.clone()).with_debug(true);
        assert!(bridge.is_debug());

        bridge.on_data(handle(9), 0, b"frame");
        assert_eq!(out.contents(), b"frame");
    }

    #[test]
    fn sink_failure_triggers_shutdown_and_drops_later_frames() {
        let shutdown = Shutdown::new();
        let bridge = StreamBridge::new(BrokenPipe { limit: 4, written: 0 })
            .with_shutdown(shutdown.clone());

        bridge.on_data(handle(1), 0, b"1234");
        assert!(!bridge.has_failed());
        assert!(!shutdown.is_triggered());

        bridge.on_data(handle(1), 0, b"5");
        assert!(bridge.has_failed());
        assert!(shutdown.is_triggered());

        bridge.on_data(handle(1), 0, b"6");
        assert_eq!(bridge.stats(), StreamStats { frames: 1, bytes: 4 });
    }

    #[test]
    fn link_monitor_counts_events() {
        let monitor = LinkMonitor::new();
        let event = ConnectionEvent::new(LoginHandle::from_raw(1), "10.0.0.2", 37777);

        monitor.on_disconnect(&event);
        monitor.on_disconnect(&event);
        monitor.on_reconnect(&event);

        assert_eq!(monitor.disconnects(), 2);
        assert_eq!(monitor.reconnects(), 1);
    }
}
