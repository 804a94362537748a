//! nrfcap-usb: libusb-backed device resolution and transport.
//!
//! Two pieces live here:
//!
//! - [`matcher`] -- read-only resolution of a [`Locator`](nrfcap_core::Locator)
//!   against the current USB topology, filtered to the mousejack
//!   vendor/product pair.
//! - [`device`] -- [`UsbDeviceTransport`], which opens and claims a matched
//!   device (detaching a conflicting kernel driver if needed) and implements
//!   the [`UsbTransport`](nrfcap_core::UsbTransport) trait over its bulk
//!   endpoints.
//!
//! The `rusb` context is created once by the caller and passed by reference
//! into every operation; nothing in this crate holds global state.

pub mod device;
pub mod matcher;

pub use device::{ENDPOINT_IN, ENDPOINT_OUT, TRANSFER_TIMEOUT, UsbDeviceTransport};
pub use matcher::{MOUSEJACK_USB_PRODUCT, MOUSEJACK_USB_VENDOR, list_matching, resolve};
