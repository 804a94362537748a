//! Mousejack protocol backend for nrfcap.
//!
//! This crate drives the vendor command set of the nRF24LU1+ research
//! firmware over bulk USB endpoints. It provides:
//!
//! - **Command builders** ([`commands`]) -- construct correctly-formatted
//!   command frames (single-byte opcode plus optional payload, with the
//!   length-prefixed encodings used for mode entry) and the full
//!   research-firmware opcode table.
//! - **CommandEngine** ([`protocol`]) -- the request/response engine over a
//!   [`UsbTransport`](nrfcap_core::UsbTransport): fire-and-forget sends,
//!   response-bearing round trips, mode entry, and channel control.
//! - **Session** ([`session`]) -- the exclusive open-claim-configure-capture
//!   lifetime of one dongle, backed by an IO task that owns the transport
//!   and serializes every transfer.
//! - **MousejackSource** ([`bridge`]) -- the
//!   [`CaptureSource`](nrfcap_core::CaptureSource) implementation mapping
//!   probe/list/open/channel-control onto the matcher and session.
//! - **MousejackBuilder** ([`builder`]) -- fluent configuration with a
//!   mock-transport entry point for tests.
//!
//! # Example
//!
//! ```
//! use nrfcap_mousejack::commands::{self, ENTER_PROMISCUOUS_MODE};
//!
//! // Promiscuous mode with a two-byte address prefix:
//! let frame = commands::length_prefixed_frame(ENTER_PROMISCUOUS_MODE, &[0xAA, 0x55]).unwrap();
//! assert_eq!(frame, vec![0x06, 0x02, 0xAA, 0x55]);
//! ```

pub mod bridge;
pub mod builder;
pub mod commands;
mod io;
pub mod protocol;
pub mod session;

pub use bridge::MousejackSource;
pub use builder::MousejackBuilder;
pub use protocol::CommandEngine;
pub use session::{Session, SessionConfig, SessionState};
