//! nrfcap-core: Core traits, types, and error definitions for nrfcap.
//!
//! This crate defines the hardware-agnostic abstractions that the nrfcap
//! backends implement. Capture applications depend on these types without
//! pulling in libusb or any specific device driver.
//!
//! # Key types
//!
//! - [`CaptureSource`] -- the capability set a capture bridge exposes to its
//!   orchestration host (probe, list, open, channel control, frame delivery)
//! - [`UsbTransport`] -- bulk-endpoint communication channel with bounded
//!   timeouts
//! - [`Locator`] / [`MatchedDevice`] -- resolving a caller-supplied device
//!   description to one physical USB slot
//! - [`Channel`] -- a validated radio channel token
//! - [`Error`] / [`Result`] -- error handling

pub mod channel;
pub mod checksum;
pub mod error;
pub mod ident;
pub mod locator;
pub mod source;
pub mod transport;

// Re-export key types at crate root for ergonomic `use nrfcap_core::*`.
pub use channel::{CHANNEL_MAX, CHANNEL_MIN, Channel, channel_list};
pub use checksum::adler32_rolling;
pub use error::{Error, Result};
pub use ident::{HARDWARE_TAG, INTERFACE_PREFIX, SOURCE_NAME, capture_interface, synthesize_uuid};
pub use locator::{Locator, MatchedDevice, parse_definition};
pub use source::{CaptureSource, CapturedFrame, ListEntry, OpenReport, ProbeReport};
pub use transport::UsbTransport;
