//! Capture session lifecycle for one claimed dongle.
//!
//! A [`Session`] walks the device through
//! `Closed -> Opening -> Claimed -> Configured -> Active` on open and
//! `Active -> Closing -> Closed` on shutdown. While active, the IO task
//! owns the transport; this type is the handle other tasks use to queue
//! channel changes, re-enter capture modes, and signal shutdown.

use std::fmt;
use std::time::Duration;

use rusb::Context;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use nrfcap_core::channel::Channel;
use nrfcap_core::error::{Error, Result};
use nrfcap_core::locator::{Locator, MatchedDevice};
use nrfcap_core::source::CapturedFrame;
use nrfcap_core::transport::UsbTransport;
use nrfcap_usb::device::UsbDeviceTransport;
use nrfcap_usb::matcher;

use crate::io::{self, Request, SessionIo};
use crate::protocol::{CommandEngine, COMMAND_TIMEOUT};

/// Tunables for a capture session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Deadline for each command/response exchange.
    pub command_timeout: Duration,
    /// Captured-frame channel depth before backpressure stalls polling.
    pub frame_capacity: usize,
    /// Address-prefix filter applied when entering promiscuous mode at
    /// open. Empty means capture everything.
    pub promiscuous_prefix: Vec<u8>,
    /// Pause between empty frame polls.
    pub frame_poll_interval: Duration,
    /// Read deadline for a single frame poll.
    pub frame_read_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            command_timeout: COMMAND_TIMEOUT,
            frame_capacity: 256,
            promiscuous_prefix: Vec::new(),
            frame_poll_interval: io::FRAME_POLL_INTERVAL,
            frame_read_timeout: io::FRAME_READ_TIMEOUT,
        }
    }
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No device held.
    Closed,
    /// Resolving and opening the USB handle.
    Opening,
    /// Interface claimed, not yet configured.
    Claimed,
    /// Configured and in promiscuous mode, capture loop not yet running.
    Configured,
    /// Capture loop live.
    Active,
    /// Shutdown signalled, capture loop draining.
    Closing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Closed => "closed",
            SessionState::Opening => "opening",
            SessionState::Claimed => "claimed",
            SessionState::Configured => "configured",
            SessionState::Active => "active",
            SessionState::Closing => "closing",
        };
        f.write_str(s)
    }
}

/// One exclusive open-to-close lifetime of a dongle.
#[derive(Debug)]
pub struct Session {
    device: MatchedDevice,
    io: SessionIo,
    command_timeout: Duration,
    frames: Option<mpsc::Receiver<CapturedFrame>>,
}

impl Session {
    /// Resolve `locator`, claim and configure the device, and start the
    /// capture loop.
    ///
    /// Resolution and the libusb open sequence are blocking and run on the
    /// blocking pool.
    pub async fn open(ctx: &Context, locator: &Locator, config: &SessionConfig) -> Result<Session> {
        debug!(locator = %locator, state = %SessionState::Opening, "opening capture session");

        let ctx_clone = ctx.clone();
        let locator = *locator;
        let (device, transport) = tokio::task::spawn_blocking(move || {
            let device = matcher::resolve(&ctx_clone, &locator)?;
            let transport = UsbDeviceTransport::open(&ctx_clone, &device)?;
            Ok::<_, Error>((device, transport))
        })
        .await
        .map_err(|e| Error::Open(format!("open task failed: {e}")))??;

        debug!(interface = %device.interface_name(), state = %SessionState::Claimed, "device claimed");

        Session::start(Box::new(transport), device, config).await
    }

    /// Configure an already-claimed transport and start the capture loop.
    ///
    /// This is the hardware-free entry point: tests hand in a mock
    /// transport here and exercise the full session lifecycle.
    pub async fn start(
        transport: Box<dyn UsbTransport>,
        device: MatchedDevice,
        config: &SessionConfig,
    ) -> Result<Session> {
        let mut engine = CommandEngine::with_timeout(transport, config.command_timeout);

        // Promiscuous mode is the post-open baseline; a dongle left in an
        // earlier mode would sit silent.
        if let Err(e) = engine.enter_promiscuous_mode(&config.promiscuous_prefix).await {
            // Release the claim before reporting: a half-configured
            // session must not hold the device.
            let _ = engine.close().await;
            return Err(match e {
                Error::InvalidPayloadLength(_) => e,
                other => {
                    Error::Configuration(format!("entering promiscuous mode failed: {other}"))
                }
            });
        }

        debug!(interface = %device.interface_name(), state = %SessionState::Configured, "promiscuous mode entered");

        let (frame_tx, frame_rx) = mpsc::channel(config.frame_capacity);
        let cancel = CancellationToken::new();
        let io = io::spawn_io_task(
            engine,
            frame_tx,
            cancel,
            config.frame_poll_interval,
            config.frame_read_timeout,
        );

        info!(interface = %device.interface_name(), state = %SessionState::Active, "capture session started");

        Ok(Session {
            device,
            io,
            command_timeout: config.command_timeout,
            frames: Some(frame_rx),
        })
    }

    /// The device this session holds.
    pub fn device(&self) -> &MatchedDevice {
        &self.device
    }

    /// Current lifecycle state.
    ///
    /// The open-phase states are transient inside [`open`](Session::open);
    /// an existing `Session` is active, closing, or closed.
    pub fn state(&self) -> SessionState {
        if self.io.is_finished() {
            SessionState::Closed
        } else if self.io.cancel.is_cancelled() {
            SessionState::Closing
        } else {
            SessionState::Active
        }
    }

    /// Queue a channel change.
    ///
    /// Applied by the IO task ahead of the next frame poll, even when a
    /// poll is already mid-read.
    pub async fn set_channel(&self, channel: Channel) -> Result<()> {
        self.io
            .request(
                |reply| Request::SetChannel { channel, reply },
                self.command_timeout,
            )
            .await
    }

    /// Re-enter promiscuous mode with a new prefix filter.
    pub async fn enter_promiscuous(&self, prefix: Vec<u8>) -> Result<()> {
        self.io
            .request(
                |reply| Request::EnterPromiscuous { prefix, reply },
                self.command_timeout,
            )
            .await
    }

    /// Switch to sniffer mode locked to `address`.
    pub async fn enter_sniffer(&self, address: Vec<u8>) -> Result<()> {
        self.io
            .request(
                |reply| Request::EnterSniffer { address, reply },
                self.command_timeout,
            )
            .await
    }

    /// Take the captured-frame receiver. Yields `Some` exactly once.
    pub fn take_frames(&mut self) -> Option<mpsc::Receiver<CapturedFrame>> {
        self.frames.take()
    }

    /// Signal the capture loop to spin down. Idempotent; an in-flight
    /// transfer completes or times out before the loop observes this.
    pub fn shutdown(&self) {
        if !self.io.cancel.is_cancelled() {
            info!(interface = %self.device.interface_name(), state = %SessionState::Closing, "capture session shutting down");
        }
        self.io.cancel.cancel();
    }

    /// Wait for the capture loop to exit and the device to be released.
    pub async fn wait(&mut self) -> Result<()> {
        (&mut self.io.task)
            .await
            .map_err(|e| Error::Transfer(format!("capture task failed: {e}")))?;
        debug!(interface = %self.device.interface_name(), state = %SessionState::Closed, "capture session closed");
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Dropping without wait() still releases the device: the IO task
        // observes the cancellation and closes the transport on its own.
        self.io.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nrfcap_test_harness::MockUsbTransport;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Wraps a mock and counts `close()` calls, for asserting that failed
    /// opens release the device.
    struct CloseCounting {
        inner: MockUsbTransport,
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl UsbTransport for CloseCounting {
        async fn send(&mut self, data: &[u8]) -> Result<()> {
            self.inner.send(data).await
        }

        async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
            self.inner.receive(buf, timeout).await
        }

        async fn close(&mut self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            self.inner.close().await
        }

        fn is_open(&self) -> bool {
            self.inner.is_open()
        }
    }

    fn test_device() -> MatchedDevice {
        MatchedDevice {
            bus: 3,
            address: 12,
            vendor_id: 0x1915,
            product_id: 0x0102,
        }
    }

    /// Config with polling effectively disabled, so command expectations
    /// are not raced by background frame polls.
    fn quiet_config() -> SessionConfig {
        SessionConfig {
            frame_poll_interval: Duration::from_secs(3600),
            ..SessionConfig::default()
        }
    }

    #[tokio::test]
    async fn start_enters_promiscuous_mode() {
        let mut mock = MockUsbTransport::new();
        mock.expect(&[0x06, 0x00], &[0x00]);

        let session = Session::start(Box::new(mock), test_device(), &quiet_config())
            .await
            .unwrap();
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.device().interface_name(), "mousejack-3-12");
    }

    #[tokio::test]
    async fn start_with_prefix_filter() {
        let mut mock = MockUsbTransport::new();
        mock.expect(&[0x06, 0x02, 0xAA, 0x55], &[0x00]);

        let config = SessionConfig {
            promiscuous_prefix: vec![0xAA, 0x55],
            ..quiet_config()
        };
        Session::start(Box::new(mock), test_device(), &config)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn start_rejects_oversized_prefix_and_releases_device() {
        let closes = Arc::new(AtomicUsize::new(0));
        let transport = CloseCounting {
            inner: MockUsbTransport::new(),
            closes: closes.clone(),
        };

        let config = SessionConfig {
            promiscuous_prefix: vec![0; 6],
            ..quiet_config()
        };
        let err = Session::start(Box::new(transport), test_device(), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPayloadLength(_)));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn start_configure_failure_releases_device() {
        // No expectations loaded: the mode-entry send fails.
        let closes = Arc::new(AtomicUsize::new(0));
        let transport = CloseCounting {
            inner: MockUsbTransport::new(),
            closes: closes.clone(),
        };

        let err = Session::start(Box::new(transport), test_device(), &quiet_config())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn set_channel_round_trip() {
        let mut mock = MockUsbTransport::new();
        mock.expect(&[0x06, 0x00], &[0x00]);
        mock.expect(&[0x09, 42], &[0x00]);

        let session = Session::start(Box::new(mock), test_device(), &quiet_config())
            .await
            .unwrap();
        session.set_channel(Channel::new(42).unwrap()).await.unwrap();
    }

    #[tokio::test]
    async fn queued_channel_changes_apply_in_order() {
        let mut mock = MockUsbTransport::new();
        mock.expect(&[0x06, 0x00], &[0x00]);
        mock.expect(&[0x09, 5], &[0x00]);
        mock.expect(&[0x09, 7], &[0x00]);

        let session = Session::start(Box::new(mock), test_device(), &quiet_config())
            .await
            .unwrap();
        session.set_channel(Channel::new(5).unwrap()).await.unwrap();
        session.set_channel(Channel::new(7).unwrap()).await.unwrap();
    }

    #[tokio::test]
    async fn mode_changes_after_start() {
        let mut mock = MockUsbTransport::new();
        mock.expect(&[0x06, 0x00], &[0x00]);
        mock.expect(&[0x05, 0x03, 0x01, 0x02, 0x03], &[0x00]);
        mock.expect(&[0x06, 0x01, 0xCD], &[0x00]);

        let session = Session::start(Box::new(mock), test_device(), &quiet_config())
            .await
            .unwrap();
        session.enter_sniffer(vec![0x01, 0x02, 0x03]).await.unwrap();
        session.enter_promiscuous(vec![0xCD]).await.unwrap();
    }

    #[tokio::test]
    async fn frames_are_delivered() {
        let mut mock = MockUsbTransport::new();
        mock.expect(&[0x06, 0x00], &[0x00]);
        // First poll yields a frame; later polls fail against the drained
        // mock and are logged and skipped.
        mock.expect(&[0x10], &[0xDE, 0xAD, 0xBE, 0xEF]);

        let config = SessionConfig {
            frame_poll_interval: Duration::from_millis(1),
            ..SessionConfig::default()
        };
        let mut session = Session::start(Box::new(mock), test_device(), &config)
            .await
            .unwrap();

        let mut frames = session.take_frames().unwrap();
        let frame = frames.recv().await.unwrap();
        assert_eq!(frame.bytes.as_ref(), &[0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[tokio::test]
    async fn frames_receiver_takes_once() {
        let mut mock = MockUsbTransport::new();
        mock.expect(&[0x06, 0x00], &[0x00]);

        let mut session = Session::start(Box::new(mock), test_device(), &quiet_config())
            .await
            .unwrap();
        assert!(session.take_frames().is_some());
        assert!(session.take_frames().is_none());
    }

    #[tokio::test]
    async fn shutdown_is_idempotent_and_closes() {
        let mut mock = MockUsbTransport::new();
        mock.expect(&[0x06, 0x00], &[0x00]);

        let mut session = Session::start(Box::new(mock), test_device(), &quiet_config())
            .await
            .unwrap();
        session.shutdown();
        session.shutdown();
        session.wait().await.unwrap();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn commands_after_shutdown_fail() {
        let mut mock = MockUsbTransport::new();
        mock.expect(&[0x06, 0x00], &[0x00]);

        let mut session = Session::start(Box::new(mock), test_device(), &quiet_config())
            .await
            .unwrap();
        session.shutdown();
        session.wait().await.unwrap();

        let err = session
            .set_channel(Channel::new(2).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }

    #[test]
    fn state_display() {
        assert_eq!(SessionState::Active.to_string(), "active");
        assert_eq!(SessionState::Closing.to_string(), "closing");
    }
}
