//! Device locators and matched devices.
//!
//! A [`Locator`] is the caller-supplied description of which physical dongle
//! to use: either "any mousejack device" or an exact USB bus/address slot.
//! A [`MatchedDevice`] is the concrete resolution of a locator against one
//! enumeration snapshot; device addresses are not stable across re-plugs,
//! so a matched device must be re-resolved on every probe/list/open.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::ident::{self, INTERFACE_PREFIX};

/// Which physical device slot an operation should target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    /// Match the first device passing the vendor/product filter.
    Any,
    /// Match exactly this bus/address slot.
    Exact { bus: u8, address: u8 },
}

impl FromStr for Locator {
    type Err = Error;

    /// Parse an interface name of the form `mousejack` or
    /// `mousejack-<bus>-<address>` (decimal, non-negative).
    ///
    /// A locator with only one of bus/address present is malformed, as is
    /// any trailing garbage.
    fn from_str(s: &str) -> Result<Self> {
        if s == INTERFACE_PREFIX {
            return Ok(Locator::Any);
        }

        let rest = s
            .strip_prefix(INTERFACE_PREFIX)
            .and_then(|r| r.strip_prefix('-'))
            .ok_or_else(|| Error::MalformedLocator(s.to_string()))?;

        let mut parts = rest.split('-');
        let bus = parts.next().and_then(|p| p.parse::<u8>().ok());
        let address = parts.next().and_then(|p| p.parse::<u8>().ok());

        match (bus, address, parts.next()) {
            (Some(bus), Some(address), None) => Ok(Locator::Exact { bus, address }),
            _ => Err(Error::MalformedLocator(s.to_string())),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Any => write!(f, "{INTERFACE_PREFIX}"),
            Locator::Exact { bus, address } => {
                write!(f, "{INTERFACE_PREFIX}-{bus}-{address}")
            }
        }
    }
}

/// Extract the locator from a host-supplied source definition.
///
/// Definitions may carry `:key=value` option suffixes from the
/// orchestration host (`mousejack-1-4:name=upstairs`); everything after
/// the first `:` is ignored for device resolution.
pub fn parse_definition(definition: &str) -> Result<Locator> {
    let interface = definition.split(':').next().unwrap_or("").trim();
    if interface.is_empty() {
        return Err(Error::MalformedLocator(definition.to_string()));
    }
    interface.parse()
}

/// One physical device resolved from an enumeration snapshot.
///
/// Valid only for the snapshot it came from: the same dongle re-plugged
/// will usually enumerate at a different address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchedDevice {
    /// USB bus number.
    pub bus: u8,
    /// Device address on that bus.
    pub address: u8,
    /// Vendor ID from the device descriptor.
    pub vendor_id: u16,
    /// Product ID from the device descriptor.
    pub product_id: u16,
}

impl MatchedDevice {
    /// The synthesized identifier for this device slot.
    ///
    /// Deterministic for a given bus/address within a process run; not
    /// stable across re-plugs (the address may change), which is accepted
    /// behavior.
    pub fn uuid(&self) -> String {
        ident::synthesize_uuid(self.bus, self.address)
    }

    /// The fully-qualified capture interface name, e.g. `mousejack-3-12`.
    pub fn interface_name(&self) -> String {
        ident::capture_interface(self.bus, self.address)
    }
}

impl fmt::Display for MatchedDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:04x}:{:04x})",
            self.interface_name(),
            self.vendor_id,
            self.product_id
        )
    }
}
