//! The `CaptureSource` trait -- the capability set a capture bridge
//! exposes to its orchestration host.
//!
//! The host glue invokes `probe`/`list`/`open`/channel operations and
//! drains [`frames`](CaptureSource::frames) while
//! [`run_capture`](CaptureSource::run_capture) is live. Frame payloads are
//! raw captured bytes; decoding them is the host's problem, not ours.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::channel::Channel;
use crate::error::Result;

/// Result of a successful, read-only probe of a source definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    /// Synthesized identifier for the matched device slot.
    pub uuid: String,
    /// Supported channels, ascending decimal strings.
    pub channels: Vec<String>,
}

/// One entry in a device listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    /// Fully-qualified interface name, e.g. `mousejack-3-12`.
    pub interface: String,
    /// Hardware-class tag, e.g. `nrfmousejack`.
    pub hardware: String,
}

/// Result of a successful open: the device is claimed, configured, and
/// capturing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenReport {
    /// Synthesized identifier for the opened device.
    pub uuid: String,
    /// Capture interface name the session is bound to.
    pub capture_interface: String,
    /// Hardware-class tag.
    pub hardware: String,
    /// Supported channels, ascending decimal strings.
    pub channels: Vec<String>,
}

/// One raw frame captured from the air.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    /// Raw bytes as returned by the dongle; no payload decoding applied.
    pub bytes: Bytes,
}

/// Capability set implemented by a capture bridge.
///
/// `probe` and `list` are read-only and never open a device. `open`
/// establishes the exclusive session; channel control and frame delivery
/// are only meaningful after a successful open.
#[async_trait]
pub trait CaptureSource: Send + Sync {
    /// Check whether a source definition refers to hardware this bridge
    /// can drive, without opening it.
    ///
    /// Returns `Ok(None)` when the definition is not ours or no matching
    /// device is present; errors are reserved for enumeration failures.
    async fn probe(&self, definition: &str) -> Result<Option<ProbeReport>>;

    /// Enumerate all matching devices, ignoring any locator.
    ///
    /// Zero matches is an empty list, not an error.
    async fn list(&self) -> Result<Vec<ListEntry>>;

    /// Resolve, claim, and configure the device described by `definition`,
    /// then start the capture session.
    async fn open(&mut self, definition: &str) -> Result<OpenReport>;

    /// Validate a channel string into an opaque channel token.
    ///
    /// Invalid input is reported as
    /// [`Error::InvalidChannel`](crate::error::Error::InvalidChannel) and
    /// never reaches the device.
    fn translate_channel(&self, chanstr: &str) -> Result<Channel>;

    /// Tune the device to `channel`.
    ///
    /// A `None` channel is a no-op success: "no channel requested yet" is
    /// a valid transient state during startup. Requests arriving while the
    /// capture loop is mid-read queue and apply before the next frame read.
    async fn control_channel(&self, channel: Option<Channel>) -> Result<()>;

    /// Take the captured-frame receiver for the current session.
    ///
    /// The receiver can be taken once per open; a second call (or a call
    /// with no open session) returns
    /// [`Error::NotConnected`](crate::error::Error::NotConnected).
    fn frames(&mut self) -> Result<mpsc::Receiver<CapturedFrame>>;

    /// Run until the shutdown signal is observed, then release the device.
    async fn run_capture(&mut self) -> Result<()>;

    /// Signal the capture loop to spin down.
    ///
    /// Cooperative: an in-flight transfer is allowed to complete or time
    /// out before the loop observes the signal. Idempotent.
    fn shutdown(&self);
}
