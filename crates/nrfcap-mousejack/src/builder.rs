//! Fluent construction of a [`MousejackSource`].
//!
//! ```no_run
//! use std::time::Duration;
//! use nrfcap_mousejack::MousejackBuilder;
//!
//! # fn main() -> nrfcap_core::Result<()> {
//! let source = MousejackBuilder::new()
//!     .command_timeout(Duration::from_millis(2500))
//!     .frame_capacity(512)
//!     .build()?;
//! # let _ = source;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use rusb::Context;

use nrfcap_core::error::Result;

use crate::bridge::MousejackSource;
use crate::session::SessionConfig;

/// Builder for [`MousejackSource`].
#[derive(Debug, Clone, Default)]
pub struct MousejackBuilder {
    config: SessionConfig,
}

impl MousejackBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deadline for each command/response exchange. Default 2500 ms.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout = timeout;
        self
    }

    /// Captured-frame channel depth. Default 256. A full channel stalls
    /// frame polling until the consumer catches up; frames are never
    /// silently dropped.
    pub fn frame_capacity(mut self, capacity: usize) -> Self {
        self.config.frame_capacity = capacity;
        self
    }

    /// Address-prefix filter applied when entering promiscuous mode at
    /// open, at most 5 bytes. Default empty (capture everything).
    pub fn promiscuous_prefix(mut self, prefix: Vec<u8>) -> Self {
        self.config.promiscuous_prefix = prefix;
        self
    }

    /// Pause between empty frame polls. Default 5 ms.
    pub fn frame_poll_interval(mut self, interval: Duration) -> Self {
        self.config.frame_poll_interval = interval;
        self
    }

    /// Build a source with its own libusb context.
    pub fn build(self) -> Result<MousejackSource> {
        MousejackSource::with_config(self.config)
    }

    /// Build a source over an existing libusb context.
    pub fn build_with_context(self, ctx: Context) -> MousejackSource {
        MousejackSource::with_context(ctx, self.config)
    }

    /// The accumulated session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}
