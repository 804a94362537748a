//! Identity constants and synthesized identifiers.
//!
//! The dongle has no serial number the orchestration host can use, so the
//! bridge fabricates a consistent identifier from a fixed source-name
//! checksum plus the device's bus/address slot. Identical slot, identical
//! identifier within a process run; a re-plugged dongle may move to a new
//! address and get a new identifier, which is accepted behavior.

use crate::checksum::adler32_rolling;

/// Fixed source name checksummed into every synthesized UUID.
pub const SOURCE_NAME: &str = "kismet_cap_nrf_mousejack";

/// Hardware-class tag reported in probe/list/open results.
pub const HARDWARE_TAG: &str = "nrfmousejack";

/// Interface-name prefix for locators and capture interface names.
pub const INTERFACE_PREFIX: &str = "mousejack";

/// Synthesize the UUID for a device slot.
///
/// Format: `XXXXXXXX-0000-0000-0000-YYYYYYZZZZZZ` where `XXXXXXXX` is the
/// rolling adler32 of [`SOURCE_NAME`] and `YYYYYY`/`ZZZZZZ` are the
/// zero-padded hex bus and address.
///
/// # Example
///
/// ```
/// use nrfcap_core::synthesize_uuid;
///
/// assert_eq!(
///     synthesize_uuid(3, 12),
///     "7C0A09E6-0000-0000-0000-00000300000C"
/// );
/// ```
pub fn synthesize_uuid(bus: u8, address: u8) -> String {
    format!(
        "{:08X}-0000-0000-0000-{:06X}{:06X}",
        adler32_rolling(SOURCE_NAME.as_bytes()),
        bus,
        address
    )
}

/// The capture interface name for a device slot, e.g. `mousejack-3-12`.
pub fn capture_interface(bus: u8, address: u8) -> String {
    format!("{INTERFACE_PREFIX}-{bus}-{address}")
}
