//! Claimed-device transport over libusb bulk endpoints.
//!
//! [`UsbDeviceTransport::open`] performs the full acquisition sequence for
//! a matched device: open the handle, claim interface 0 (detaching a
//! conflicting kernel driver once if the claim reports busy), and select
//! configuration 1. The resulting transport owns the handle exclusively;
//! every transfer against it goes through `&mut self`, which serializes
//! command sends, response reads, and frame reads on the session task.
//!
//! libusb calls are blocking, so the async trait methods wrap them in
//! `spawn_blocking` with the handle behind an `Arc`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rusb::{Context, DeviceHandle};
use tracing::{debug, info, trace, warn};

use nrfcap_core::error::{Error, Result};
use nrfcap_core::locator::MatchedDevice;
use nrfcap_core::transport::UsbTransport;

use crate::matcher;

/// Bulk OUT endpoint carrying command frames.
pub const ENDPOINT_OUT: u8 = 0x01;

/// Bulk IN endpoint carrying responses and captured frames.
pub const ENDPOINT_IN: u8 = 0x81;

/// Fixed deadline for every bulk transfer in either direction.
pub const TRANSFER_TIMEOUT: Duration = Duration::from_millis(2500);

/// The single vendor interface on the dongle.
const CLAIM_INTERFACE: u8 = 0;

/// The only configuration the research firmware exposes.
const CONFIGURATION: u8 = 1;

/// Claim/detach surface of an open device handle.
///
/// The busy-recovery policy in [`claim_with_detach`] runs against this
/// trait instead of a concrete handle so the policy is testable without
/// hardware.
trait InterfaceClaim {
    fn claim(&mut self, iface: u8) -> rusb::Result<()>;
    fn detach_driver(&mut self, iface: u8) -> rusb::Result<()>;
}

impl InterfaceClaim for DeviceHandle<Context> {
    fn claim(&mut self, iface: u8) -> rusb::Result<()> {
        self.claim_interface(iface)
    }

    fn detach_driver(&mut self, iface: u8) -> rusb::Result<()> {
        self.detach_kernel_driver(iface)
    }
}

/// Claim `iface`, detaching a conflicting kernel driver once if the first
/// claim reports busy.
///
/// A failed detach, or a claim that stays busy after a successful detach,
/// is [`Error::DeviceBusy`]; any other claim failure is [`Error::Open`].
fn claim_with_detach(handle: &mut impl InterfaceClaim, iface: u8) -> Result<()> {
    match handle.claim(iface) {
        Ok(()) => Ok(()),
        Err(rusb::Error::Busy) => {
            handle.detach_driver(iface).map_err(|e| {
                Error::DeviceBusy(format!("unable to disconnect existing driver: {e}"))
            })?;
            handle
                .claim(iface)
                .map_err(|e| Error::DeviceBusy(e.to_string()))?;
            debug!(interface = iface, "claimed interface after kernel driver detach");
            Ok(())
        }
        Err(e) => Err(Error::Open(e.to_string())),
    }
}

/// Bulk-endpoint transport to an open, claimed mousejack dongle.
pub struct UsbDeviceTransport {
    /// The open handle; `None` once closed.
    handle: Option<Arc<DeviceHandle<Context>>>,
    /// Interface name for logging, e.g. `mousejack-3-12`.
    name: String,
}

impl UsbDeviceTransport {
    /// Open and claim a previously matched device.
    ///
    /// Blocking; callers on the async side wrap this in `spawn_blocking`.
    /// The device is re-found in a fresh enumeration snapshot first, so a
    /// dongle that vanished between match and open surfaces as
    /// [`Error::DeviceNotFound`] rather than a stale-handle failure.
    pub fn open(ctx: &Context, target: &MatchedDevice) -> Result<Self> {
        let name = target.interface_name();
        let device = matcher::find_device(ctx, target)?;

        debug!(interface = %name, "opening mousejack USB device");

        let mut handle = device.open().map_err(|e| Error::Open(e.to_string()))?;

        claim_with_detach(&mut handle, CLAIM_INTERFACE)?;

        match handle.set_active_configuration(CONFIGURATION) {
            Ok(()) => {}
            // Busy here means configuration 1 is already active underneath
            // our claim, which is the state we wanted.
            Err(rusb::Error::Busy) => {
                trace!(interface = %name, "configuration already active");
            }
            Err(e) => return Err(Error::Configuration(e.to_string())),
        }

        info!(interface = %name, "mousejack USB device claimed and configured");

        Ok(Self {
            handle: Some(Arc::new(handle)),
            name,
        })
    }

    /// The capture interface name this transport is bound to.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Map a transfer-level rusb error into the bridge taxonomy.
fn transfer_error(e: rusb::Error) -> Error {
    match e {
        rusb::Error::Timeout => Error::Timeout,
        rusb::Error::NoDevice => Error::NotConnected,
        other => Error::Transfer(other.to_string()),
    }
}

#[async_trait]
impl UsbTransport for UsbDeviceTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let handle = self.handle.clone().ok_or(Error::NotConnected)?;
        let out = data.to_vec();

        trace!(interface = %self.name, bytes = out.len(), data = ?out, "bulk OUT");

        let wrote = tokio::task::spawn_blocking(move || {
            handle.write_bulk(ENDPOINT_OUT, &out, TRANSFER_TIMEOUT)
        })
        .await
        .map_err(|e| Error::Transfer(format!("transfer task failed: {e}")))?
        .map_err(transfer_error)?;

        if wrote != data.len() {
            return Err(Error::Transfer(format!(
                "short bulk write: {wrote} of {} bytes",
                data.len()
            )));
        }

        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let handle = self.handle.clone().ok_or(Error::NotConnected)?;
        let len = buf.len();

        let read = tokio::task::spawn_blocking(move || {
            let mut tmp = vec![0u8; len];
            handle
                .read_bulk(ENDPOINT_IN, &mut tmp, timeout)
                .map(|n| {
                    tmp.truncate(n);
                    tmp
                })
        })
        .await
        .map_err(|e| Error::Transfer(format!("transfer task failed: {e}")))?
        .map_err(transfer_error)?;

        trace!(interface = %self.name, bytes = read.len(), "bulk IN");

        buf[..read.len()].copy_from_slice(&read);
        Ok(read.len())
    }

    async fn close(&mut self) -> Result<()> {
        // Idempotent: a second close finds no handle and does nothing.
        if let Some(handle) = self.handle.take() {
            let name = self.name.clone();
            tokio::task::spawn_blocking(move || {
                match Arc::try_unwrap(handle) {
                    Ok(mut h) => {
                        if let Err(e) = h.release_interface(CLAIM_INTERFACE) {
                            warn!(interface = %name, error = %e, "failed to release interface");
                        }
                    }
                    // A transfer still holds a clone; the handle closes
                    // when the last clone drops.
                    Err(_) => {
                        warn!(interface = %name, "handle still in use at close, deferring to drop");
                    }
                }
            })
            .await
            .map_err(|e| Error::Transfer(format!("close task failed: {e}")))?;

            info!(interface = %self.name, "mousejack USB device closed");
        }

        Ok(())
    }

    fn is_open(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for UsbDeviceTransport {
    fn drop(&mut self) {
        if self.handle.is_some() {
            debug!(interface = %self.name, "UsbDeviceTransport dropped, handle closes with last reference");
        }
    }
}
