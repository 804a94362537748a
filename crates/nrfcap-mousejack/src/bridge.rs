//! The bridge adapter: [`CaptureSource`] over the matcher and session.
//!
//! [`MousejackSource`] is what the orchestration host talks to. Probe and
//! list run read-only matcher passes on the blocking pool; open hands the
//! matched device to [`Session`]; channel control and frame delivery
//! forward to the live session. One source drives at most one session at a
//! time.

use async_trait::async_trait;
use rusb::Context;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use nrfcap_core::channel::{self, Channel};
use nrfcap_core::error::{Error, Result};
use nrfcap_core::ident::HARDWARE_TAG;
use nrfcap_core::locator::{self, MatchedDevice};
use nrfcap_core::source::{CaptureSource, CapturedFrame, ListEntry, OpenReport, ProbeReport};
use nrfcap_core::transport::UsbTransport;
use nrfcap_usb::matcher;

use crate::session::{Session, SessionConfig, SessionState};

/// Capture bridge for mousejack dongles.
pub struct MousejackSource {
    ctx: Context,
    config: SessionConfig,
    session: Option<Session>,
}

impl MousejackSource {
    /// Create a source with its own libusb context and default config.
    pub fn new() -> Result<Self> {
        Self::with_config(SessionConfig::default())
    }

    /// Create a source with its own libusb context.
    pub fn with_config(config: SessionConfig) -> Result<Self> {
        let ctx = Context::new().map_err(|e| Error::Enumeration(e.to_string()))?;
        Ok(Self::with_context(ctx, config))
    }

    /// Create a source over an existing libusb context.
    ///
    /// All USB state flows through this context; nothing global is touched,
    /// so multiple sources can coexist in one process.
    pub fn with_context(ctx: Context, config: SessionConfig) -> Self {
        MousejackSource {
            ctx,
            config,
            session: None,
        }
    }

    /// Open over an already-claimed transport instead of resolving real
    /// hardware. Used by tests and by callers that manage USB acquisition
    /// themselves.
    pub async fn open_with_transport(
        &mut self,
        transport: Box<dyn UsbTransport>,
        device: MatchedDevice,
    ) -> Result<OpenReport> {
        self.check_not_busy()?;
        let session = Session::start(transport, device, &self.config).await?;
        Ok(self.install(session))
    }

    fn check_not_busy(&self) -> Result<()> {
        if let Some(session) = &self.session {
            if session.state() != SessionState::Closed {
                return Err(Error::DeviceBusy(format!(
                    "{} already open",
                    session.device().interface_name()
                )));
            }
        }
        Ok(())
    }

    fn install(&mut self, session: Session) -> OpenReport {
        let device = *session.device();
        self.session = Some(session);

        info!(interface = %device.interface_name(), uuid = %device.uuid(), "capture source opened");

        OpenReport {
            uuid: device.uuid(),
            capture_interface: device.interface_name(),
            hardware: HARDWARE_TAG.to_string(),
            channels: channel::channel_list(),
        }
    }
}

#[async_trait]
impl CaptureSource for MousejackSource {
    async fn probe(&self, definition: &str) -> Result<Option<ProbeReport>> {
        // A definition we cannot parse is simply not ours.
        let loc = match locator::parse_definition(definition) {
            Ok(loc) => loc,
            Err(_) => {
                debug!(definition, "definition is not a mousejack locator");
                return Ok(None);
            }
        };

        let ctx = self.ctx.clone();
        let resolved =
            tokio::task::spawn_blocking(move || matcher::resolve(&ctx, &loc))
                .await
                .map_err(|e| Error::Enumeration(format!("probe task failed: {e}")))?;

        match resolved {
            Ok(device) => Ok(Some(ProbeReport {
                uuid: device.uuid(),
                channels: channel::channel_list(),
            })),
            Err(Error::DeviceNotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list(&self) -> Result<Vec<ListEntry>> {
        let ctx = self.ctx.clone();
        let devices = tokio::task::spawn_blocking(move || matcher::list_matching(&ctx))
            .await
            .map_err(|e| Error::Enumeration(format!("list task failed: {e}")))??;

        Ok(devices
            .into_iter()
            .map(|d| ListEntry {
                interface: d.interface_name(),
                hardware: HARDWARE_TAG.to_string(),
            })
            .collect())
    }

    async fn open(&mut self, definition: &str) -> Result<OpenReport> {
        self.check_not_busy()?;

        let loc = locator::parse_definition(definition)?;
        let session = Session::open(&self.ctx, &loc, &self.config).await?;
        Ok(self.install(session))
    }

    fn translate_channel(&self, chanstr: &str) -> Result<Channel> {
        chanstr.trim().parse()
    }

    async fn control_channel(&self, channel: Option<Channel>) -> Result<()> {
        // "No channel yet" is a valid transient during startup.
        let Some(channel) = channel else {
            return Ok(());
        };

        match &self.session {
            Some(session) => session.set_channel(channel).await,
            None => Err(Error::NotConnected),
        }
    }

    fn frames(&mut self) -> Result<mpsc::Receiver<CapturedFrame>> {
        self.session
            .as_mut()
            .and_then(Session::take_frames)
            .ok_or(Error::NotConnected)
    }

    async fn run_capture(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            return Err(Error::NotConnected);
        };

        let result = session.wait().await;
        if let Err(ref e) = result {
            warn!(error = %e, "capture session exited abnormally");
        }
        result
    }

    fn shutdown(&self) {
        if let Some(session) = &self.session {
            session.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nrfcap_test_harness::MockUsbTransport;
    use std::time::Duration;

    fn test_device() -> MatchedDevice {
        MatchedDevice {
            bus: 3,
            address: 12,
            vendor_id: 0x1915,
            product_id: 0x0102,
        }
    }

    fn quiet_source() -> MousejackSource {
        let config = SessionConfig {
            frame_poll_interval: Duration::from_secs(3600),
            ..SessionConfig::default()
        };
        MousejackSource::with_config(config).unwrap()
    }

    fn promiscuous_mock() -> MockUsbTransport {
        let mut mock = MockUsbTransport::new();
        mock.expect(&[0x06, 0x00], &[0x00]);
        mock
    }

    #[tokio::test]
    async fn probe_foreign_definition_is_none() {
        let source = quiet_source();
        assert!(source.probe("rtl433-1-2").await.unwrap().is_none());
        assert!(source.probe("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn probe_absent_device_is_none() {
        let source = quiet_source();
        // Slot 250/250 cannot be a real dongle on test hosts. In sandboxes
        // without USB access, enumeration itself errors, which is also a
        // valid outcome per contract.
        match source.probe("mousejack-250-250").await {
            Ok(None) | Err(Error::Enumeration(_)) => {}
            Ok(Some(r)) => panic!("probed a device that cannot exist: {}", r.uuid),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[tokio::test]
    async fn list_without_hardware_is_empty_not_error() {
        let source = quiet_source();
        if let Ok(entries) = source.list().await {
            for entry in entries {
                assert_eq!(entry.hardware, "nrfmousejack");
                assert!(entry.interface.starts_with("mousejack-"));
            }
        }
    }

    #[test]
    fn translate_channel_bounds() {
        let source = quiet_source();
        assert_eq!(source.translate_channel("2").unwrap().value(), 2);
        assert_eq!(source.translate_channel("83").unwrap().value(), 83);
        assert_eq!(source.translate_channel(" 42 ").unwrap().value(), 42);

        for bad in ["1", "84", "abc", "", "-3"] {
            assert!(matches!(
                source.translate_channel(bad),
                Err(Error::InvalidChannel(_))
            ));
        }
    }

    #[tokio::test]
    async fn open_reports_identity_and_channels() {
        let mut source = quiet_source();
        let report = source
            .open_with_transport(Box::new(promiscuous_mock()), test_device())
            .await
            .unwrap();

        assert_eq!(report.uuid, "7C0A09E6-0000-0000-0000-00000300000C");
        assert_eq!(report.capture_interface, "mousejack-3-12");
        assert_eq!(report.hardware, "nrfmousejack");
        assert_eq!(report.channels.len(), 82);
        assert_eq!(report.channels.first().map(String::as_str), Some("2"));
        assert_eq!(report.channels.last().map(String::as_str), Some("83"));
    }

    #[tokio::test]
    async fn second_open_is_busy() {
        let mut source = quiet_source();
        source
            .open_with_transport(Box::new(promiscuous_mock()), test_device())
            .await
            .unwrap();

        let err = source
            .open_with_transport(Box::new(promiscuous_mock()), test_device())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DeviceBusy(_)));
    }

    #[tokio::test]
    async fn control_channel_none_is_noop() {
        let source = quiet_source();
        // Succeeds even with no session: nothing is requested.
        source.control_channel(None).await.unwrap();
    }

    #[tokio::test]
    async fn control_channel_without_session_fails() {
        let source = quiet_source();
        let err = source
            .control_channel(Some(Channel::new(42).unwrap()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }

    #[tokio::test]
    async fn control_channel_reaches_device() {
        let mut mock = promiscuous_mock();
        mock.expect(&[0x09, 42], &[0x00]);

        let mut source = quiet_source();
        source
            .open_with_transport(Box::new(mock), test_device())
            .await
            .unwrap();

        let channel = source.translate_channel("42").unwrap();
        source.control_channel(Some(channel)).await.unwrap();
    }

    #[tokio::test]
    async fn frames_take_once_per_open() {
        let mut source = quiet_source();
        assert!(matches!(source.frames(), Err(Error::NotConnected)));

        source
            .open_with_transport(Box::new(promiscuous_mock()), test_device())
            .await
            .unwrap();
        assert!(source.frames().is_ok());
        assert!(matches!(source.frames(), Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn shutdown_then_run_capture_completes() {
        let mut source = quiet_source();
        source
            .open_with_transport(Box::new(promiscuous_mock()), test_device())
            .await
            .unwrap();

        source.shutdown();
        source.shutdown();
        source.run_capture().await.unwrap();

        // The session is released; a new open succeeds.
        source
            .open_with_transport(Box::new(promiscuous_mock()), test_device())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn run_capture_without_session_fails() {
        let mut source = quiet_source();
        assert!(matches!(
            source.run_capture().await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn captured_frames_flow_to_receiver() {
        let mut mock = promiscuous_mock();
        mock.expect(&[0x10], &[0x01, 0x02, 0x03]);

        let config = SessionConfig {
            frame_poll_interval: Duration::from_millis(1),
            ..SessionConfig::default()
        };
        let mut source = MousejackSource::with_config(config).unwrap();
        source
            .open_with_transport(Box::new(mock), test_device())
            .await
            .unwrap();

        let mut frames = source.frames().unwrap();
        let frame = frames.recv().await.unwrap();
        assert_eq!(frame.bytes.as_ref(), &[0x01, 0x02, 0x03]);
    }
}
