//! # nrfcap -- nRF24 Mousejack Capture Bridge
//!
//! `nrfcap` is an asynchronous Rust library for driving nRF24LU1+ dongles
//! flashed with the Bastille research firmware ("mousejack" dongles) as
//! packet capture sources. It handles device discovery, exclusive USB
//! acquisition, the vendor command protocol, channel control, and raw
//! frame delivery to a host application.
//!
//! ## Quick Start
//!
//! Add `nrfcap` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! nrfcap = "0.1"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! Open the first attached dongle and print captured frames:
//!
//! ```no_run
//! use nrfcap::CaptureSource;
//! use nrfcap::mousejack::MousejackBuilder;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut source = MousejackBuilder::new().build()?;
//!
//!     let report = source.open("mousejack").await?;
//!     println!("opened {} ({})", report.capture_interface, report.uuid);
//!
//!     let channel = source.translate_channel("42")?;
//!     source.control_channel(Some(channel)).await?;
//!
//!     let mut frames = source.frames()?;
//!     while let Some(frame) = frames.recv().await {
//!         println!("{} bytes: {:02X?}", frame.bytes.len(), frame.bytes);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized as a workspace of focused crates:
//!
//! | Crate                 | Purpose                                          |
//! |-----------------------|--------------------------------------------------|
//! | `nrfcap-core`         | Traits ([`CaptureSource`], [`UsbTransport`]), locators, channels, errors |
//! | `nrfcap-usb`          | libusb device matching and bulk-endpoint transport |
//! | `nrfcap-mousejack`    | Vendor command protocol, session, bridge adapter |
//! | `nrfcap-test-harness` | Mock USB transport for hardware-free tests       |
//! | **`nrfcap`**          | This facade crate -- re-exports everything       |
//!
//! The bridge implements the [`CaptureSource`] trait, so host glue can work
//! with `dyn CaptureSource` and stay hardware-agnostic.
//!
//! ## Feature Flags
//!
//! | Feature        | Enables                                  | Default |
//! |----------------|------------------------------------------|---------|
//! | `mousejack`    | [`mousejack`] and [`usb`] modules        | yes     |
//! | `test-harness` | [`test_harness`] mock transport          | no      |

pub use nrfcap_core::*;

/// Mousejack protocol backend.
///
/// Provides [`MousejackSource`](mousejack::MousejackSource) and
/// [`MousejackBuilder`](mousejack::MousejackBuilder), plus the raw
/// [`CommandEngine`](mousejack::CommandEngine) and command frame builders
/// for callers that drive the firmware directly.
#[cfg(feature = "mousejack")]
pub mod mousejack {
    pub use nrfcap_mousejack::*;
}

/// libusb device matching and the claimed bulk-endpoint transport.
#[cfg(feature = "mousejack")]
pub mod usb {
    pub use nrfcap_usb::*;
}

/// Mock USB transport for deterministic, hardware-free tests.
#[cfg(feature = "test-harness")]
pub mod test_harness {
    pub use nrfcap_test_harness::*;
}
