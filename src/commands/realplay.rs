use crate::bridge::DataHandler;
use crate::codes::resolve_stream_variant;
use crate::error::{DHStreamError, Result};
use crate::session::Session;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRequest {
    pub channel: u32,
    /// Selector in `0..=3`, see [`crate::transport::StreamVariant`].
    pub stream_type: i32,
}

impl StreamRequest {
    pub fn new(channel: u32, stream_type: i32) -> Self {
        Self {
            channel,
            stream_type,
        }
    }
}

#[async_trait]
pub trait Realplay: Send {
    /// Open a raw stream and route its buffers into the session's sink.
    async fn start_stream(&mut self, request: StreamRequest) -> Result<()>;

    /// Stop the running stream, if any. Stays logged in.
    fn stop_stream(&mut self);

    fn is_streaming(&self) -> bool;
}

#[async_trait]
impl Realplay for Session {
    async fn start_stream(&mut self, request: StreamRequest) -> Result<()> {
        self.ensure_active()?;
        let Some(login) = self.login_handle else {
            return Err(DHStreamError::NotLoggedIn);
        };
        if self.stream_handle.is_some() {
            return Err(DHStreamError::AlreadyStreaming);
        }
        let variant = resolve_stream_variant(request.stream_type)
            .ok_or(DHStreamError::InvalidStreamType(request.stream_type))?;

        let transport = self.transport.clone();
        let handler: Arc<dyn DataHandler> = self.bridge.clone();
        let channel = request.channel;
        let stream = tokio::task::spawn_blocking(move || {
            let stream = transport
                .start_realplay(login, channel, variant)
                .ok_or(DHStreamError::StreamStartFailed)?;

            if let Err(e) = transport.set_data_handler(stream, handler) {
                warn!(handle = %stream, error = %e, "failed to register data handler");
                if let Err(e) = transport.stop_realplay(stream) {
                    warn!(handle = %stream, error = %e, "failed to stop realplay");
                }
                return Err(DHStreamError::StreamStartFailed);
            }
            Ok(stream)
        })
        .await??;

        info!(channel, %variant, handle = %stream, "realplay started");
        self.stream_handle = Some(stream);
        Ok(())
    }

    fn stop_stream(&mut self) {
        self.release_stream();
    }

    fn is_streaming(&self) -> bool {
        self.stream_handle.is_some()
    }
}
