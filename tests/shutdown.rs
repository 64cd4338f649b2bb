use dhstream::{
    Authentication, Credentials, MemoryTransport, Realplay, Session, Shutdown, StreamBridge,
    StreamRequest,
};
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

struct FailingSink;

impl Write for FailingSink {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::from(io::ErrorKind::BrokenPipe))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn poll_loop_exits_within_one_interval_while_streaming() {
    let transport = Arc::new(MemoryTransport::new());
    let shutdown = Shutdown::new();
    let bridge = StreamBridge::new(io::sink()).with_shutdown(shutdown.clone());
    let mut session = Session::new(transport.clone(), bridge).unwrap();

    session
        .login(&Credentials::new("10.0.0.2", 37777, "admin", "password"))
        .await
        .unwrap();
    session.start_stream(StreamRequest::new(0, 0)).await.unwrap();
    let stream = transport.active_streams()[0];

    let delivering = Arc::new(AtomicBool::new(true));
    let feeder = {
        let transport = transport.clone();
        let delivering = delivering.clone();
        std::thread::spawn(move || {
            while delivering.load(Ordering::Acquire) {
                transport.deliver(stream, &[0u8; 512]);
                std::thread::sleep(Duration::from_millis(1));
            }
        })
    };

    let trigger = shutdown.clone();
    let raised = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(220)).await;
        trigger.trigger();
        Instant::now()
    });

    shutdown.wait(Duration::from_millis(100)).await;
    let exited = Instant::now();
    let raised = raised.await.unwrap();

    assert!(exited.duration_since(raised) <= Duration::from_millis(150));
    assert!(session.bridge().stats().frames > 0);

    session.stop();
    delivering.store(false, Ordering::Release);
    feeder.join().unwrap();
}

#[tokio::test]
async fn broken_sink_requests_shutdown() {
    let transport = Arc::new(MemoryTransport::new());
    let shutdown = Shutdown::new();
    let bridge = StreamBridge::new(FailingSink).with_shutdown(shutdown.clone());
    let mut session = Session::new(transport.clone(), bridge).unwrap();

    session
        .login(&Credentials::new("10.0.0.2", 37777, "admin", "password"))
        .await
        .unwrap();
    session.start_stream(StreamRequest::new(0, 0)).await.unwrap();
    let stream = transport.active_streams()[0];

    transport.deliver(stream, b"frame");

    tokio::time::timeout(Duration::from_secs(1), shutdown.wait(Duration::from_millis(10)))
        .await
        .unwrap();
    assert!(session.bridge().has_failed());
    assert_eq!(session.bridge().stats().frames, 0);
}
