//! nrfcap-test-harness: deterministic test doubles for nrfcap.
//!
//! Provides [`MockUsbTransport`], an in-memory
//! [`UsbTransport`](nrfcap_core::UsbTransport) with pre-loaded
//! request/response byte pairs for testing the command protocol engine and
//! session logic without a dongle attached.

pub mod mock_usb;

pub use mock_usb::MockUsbTransport;
