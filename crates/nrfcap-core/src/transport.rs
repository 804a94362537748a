//! Transport trait for dongle communication.
//!
//! The [`UsbTransport`] trait abstracts over the claimed bulk endpoints of
//! an open device. The production implementation lives in `nrfcap-usb`
//! (libusb bulk transfers); `nrfcap-test-harness` provides a mock for
//! deterministic protocol testing without hardware.
//!
//! The command protocol engine in `nrfcap-mousejack` operates on a
//! `UsbTransport` rather than directly on a libusb handle, so the exact
//! same engine code runs against real dongles and pre-loaded byte
//! expectations.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous bulk-endpoint transport to a claimed device.
///
/// Exactly one component may own a transport at a time; all transfers
/// against one handle are serialized by that ownership (a single in-flight
/// transfer per direction is a USB-level constraint).
#[async_trait]
pub trait UsbTransport: Send + Sync {
    /// Write `data` to the bulk OUT endpoint.
    ///
    /// Implementations bound the write with the fixed command timeout and
    /// return [`Error::Timeout`](crate::error::Error::Timeout) if it does
    /// not complete in time. The full slice must be accepted; short writes
    /// are a transfer error.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Read from the bulk IN endpoint into `buf`.
    ///
    /// Returns the number of bytes actually read. Waits up to `timeout`;
    /// returns [`Error::Timeout`](crate::error::Error::Timeout) if nothing
    /// arrives within the deadline.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Release the claimed interface and close the device handle.
    ///
    /// Idempotent: closing an already-closed transport is a no-op.
    /// After `close()`, `send()` and `receive()` return
    /// [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Whether the device handle is currently open.
    fn is_open(&self) -> bool;
}
