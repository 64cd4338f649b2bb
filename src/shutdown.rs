use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::info;

/// Set-once stop request shared between signal handling, the stream bridge and
/// the main poll loop.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true for the call that actually raised the flag.
    pub fn trigger(&self) -> bool {
        !self.flag.swap(true, Ordering::AcqRel)
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Sleep in `interval` steps until the flag is raised.
    pub async fn wait(&self, interval: Duration) {
        while !self.is_triggered() {
            tokio::time::sleep(interval).await;
        }
    }

    /// Raise the flag on SIGINT, SIGTERM or SIGQUIT.
    ///
    /// Must be called from within a tokio runtime. The handlers are installed
    /// before this returns.
    pub fn listen_for_signals(&self) -> std::io::Result<JoinHandle<()>> {
        let shutdown = self.clone();
        let received = termination_signal()?;

        Ok(tokio::spawn(async move {
            let name = received.await;
            info!(signal = name, "shutdown requested");
            shutdown.trigger();
        }))
    }
}

#[cfg(unix)]
fn termination_signal() -> std::io::Result<impl Future<Output = &'static str>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
            _ = quit.recv() => "SIGQUIT",
        }
    })
}

#[cfg(not(unix))]
fn termination_signal() -> std::io::Result<impl Future<Output = &'static str>> {
    Ok(async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        "ctrl-c"
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn trigger_is_set_once() {
        let shutdown = Shutdown::new();
        let other = shutdown.clone();
        assert!(!shutdown.is_triggered());

        assert!(other.trigger());
        assert!(!shutdown.trigger());
        assert!(shutdown.is_triggered());
        assert!(other.is_triggered());
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_already_triggered() {
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let started = Instant::now();
        shutdown.wait(Duration::from_secs(10)).await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn wait_exits_within_one_interval() {
        let shutdown = Shutdown::new();
        let waiter = shutdown.clone();
        let task = tokio::spawn(async move {
            waiter.wait(Duration::from_millis(100)).await;
            Instant::now()
        });

        tokio::time::sleep(Duration::from_millis(250)).await;
        let raised = Instant::now();
        shutdown.trigger();

        let finished = task.await.unwrap();
        assert!(finished.duration_since(raised) <= Duration::from_millis(150));
    }
}
