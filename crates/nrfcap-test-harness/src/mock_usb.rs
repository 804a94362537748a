//! Mock USB transport for deterministic testing without hardware.
//!
//! [`MockUsbTransport`] implements the [`UsbTransport`] trait over a queue
//! of expected command/response exchanges. An OUT transfer is matched
//! byte-for-byte against the next expected command and queues the paired
//! response; the following IN read returns that response whole, the way a
//! single bulk packet arrives. An empty response, or a read with nothing
//! queued, times out, mirroring an idle IN endpoint.
//!
//! # Example
//!
//! ```
//! use nrfcap_test_harness::MockUsbTransport;
//!
//! let mut mock = MockUsbTransport::new();
//! // When the engine sends SET_CHANNEL for channel 42, answer with an
//! // empty status frame.
//! mock.expect(&[0x09, 42], &[0x00]);
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;

use nrfcap_core::error::{Error, Result};
use nrfcap_core::transport::UsbTransport;

/// Bulk packet limit on the dongle's endpoints, enforced on every send.
const MAX_TRANSFER: usize = 64;

/// One expected command/response exchange.
#[derive(Debug, Clone)]
struct Exchange {
    command: Vec<u8>,
    response: Vec<u8>,
}

/// A mock [`UsbTransport`] for testing without hardware.
///
/// Exchanges are consumed in order; a send with unexpected bytes, or with
/// no exchange remaining, fails as a transfer error the same way a real
/// dongle would reject traffic the scripted session does not cover.
#[derive(Debug, Default)]
pub struct MockUsbTransport {
    exchanges: VecDeque<Exchange>,
    /// Response queued by the last matched send, served by one IN read.
    pending: Option<Vec<u8>>,
    closed: bool,
}

impl MockUsbTransport {
    /// Create a new mock transport in the open state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an expected command and the response the following IN read
    /// should return. An empty response models a command the dongle
    /// accepts but never answers.
    pub fn expect(&mut self, command: &[u8], response: &[u8]) {
        self.exchanges.push_back(Exchange {
            command: command.to_vec(),
            response: response.to_vec(),
        });
    }
}

#[async_trait]
impl UsbTransport for MockUsbTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::NotConnected);
        }
        if data.len() > MAX_TRANSFER {
            return Err(Error::Transfer(format!(
                "bulk transfer of {} bytes exceeds {MAX_TRANSFER} byte endpoint limit",
                data.len()
            )));
        }

        let exchange = self.exchanges.pop_front().ok_or_else(|| {
            Error::Transfer(format!("unexpected command: {data:02X?}"))
        })?;
        if data != exchange.command.as_slice() {
            return Err(Error::Transfer(format!(
                "unexpected command: expected {:02X?}, got {data:02X?}",
                exchange.command
            )));
        }

        self.pending = Some(exchange.response);
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        if self.closed {
            return Err(Error::NotConnected);
        }

        match self.pending.take() {
            Some(response) if !response.is_empty() => {
                let n = response.len().min(buf.len());
                buf[..n].copy_from_slice(&response[..n]);
                Ok(n)
            }
            _ => Err(Error::Timeout),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.pending = None;
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.closed
    }
}
