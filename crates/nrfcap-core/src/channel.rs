//! Radio channel validation.
//!
//! The nRF24 dongle tunes channels 2 through 83 inclusive. [`Channel`] is
//! the validated token for one of those; out-of-range or unparsable input
//! never reaches the command protocol engine.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Lowest tunable channel.
pub const CHANNEL_MIN: u8 = 2;

/// Highest tunable channel.
pub const CHANNEL_MAX: u8 = 83;

/// A validated radio channel in `[2, 83]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Channel(u8);

impl Channel {
    /// Validate a raw channel number.
    pub fn new(channel: u8) -> Result<Self> {
        if (CHANNEL_MIN..=CHANNEL_MAX).contains(&channel) {
            Ok(Channel(channel))
        } else {
            Err(Error::InvalidChannel(channel.to_string()))
        }
    }

    /// The raw channel number, as transmitted to the dongle.
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl FromStr for Channel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let n: u8 = s
            .trim()
            .parse()
            .map_err(|_| Error::InvalidChannel(s.to_string()))?;
        Channel::new(n)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The fixed channel capability list advertised during probe/open:
/// ascending decimal strings `"2"` through `"83"`, 82 entries.
pub fn channel_list() -> Vec<String> {
    (CHANNEL_MIN..=CHANNEL_MAX).map(|c| c.to_string()).collect()
}
