//! Error types for nrfcap.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Locator parsing, USB enumeration,
//! session setup, and transfer-level errors are all captured here.

/// The error type for all nrfcap operations.
///
/// Caller-input errors ([`MalformedLocator`](Error::MalformedLocator),
/// [`InvalidChannel`](Error::InvalidChannel),
/// [`InvalidPayloadLength`](Error::InvalidPayloadLength)) are rejected
/// before any USB I/O is issued. Open-path errors abort the open attempt
/// but leave the process usable for another attempt. Transfer errors abort
/// only the single command in progress; the session stays up.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The interface definition was not `mousejack` or `mousejack-<bus>-<addr>`.
    #[error("malformed locator: {0}, expected 'mousejack' or 'mousejack-bus#-dev#'")]
    MalformedLocator(String),

    /// No device matching the vendor/product filter and locator was found.
    #[error("unable to find mousejack USB device")]
    DeviceNotFound,

    /// The USB device list could not be enumerated. Non-fatal; the caller
    /// may retry on the next probe/list/open.
    #[error("unable to enumerate USB devices: {0}")]
    Enumeration(String),

    /// Opening the matched device failed (vanished, permission denied).
    #[error("unable to open mousejack USB interface: {0}")]
    Open(String),

    /// The interface is claimed by another driver and a kernel-driver
    /// detach did not free it.
    #[error("mousejack USB interface busy: {0}")]
    DeviceBusy(String),

    /// Post-claim device configuration failed (set-configuration or the
    /// initial mode command).
    #[error("unable to configure mousejack USB interface: {0}")]
    Configuration(String),

    /// A bulk transfer did not complete within the timeout.
    ///
    /// Treated as a failed command, not a session failure; the dongle is
    /// most likely wedged or was yanked mid-transfer.
    #[error("timeout waiting for USB transfer")]
    Timeout,

    /// A bulk transfer failed at the transport level.
    #[error("USB transfer error: {0}")]
    Transfer(String),

    /// The requested channel was unparsable or outside 2-83.
    #[error("invalid channel '{0}': nrf channels are from 2 to 83")]
    InvalidChannel(String),

    /// A command payload exceeded its encoding limit (promiscuous prefix
    /// over 5 bytes, or total transfer over 64 bytes).
    #[error("invalid payload length: {0}")]
    InvalidPayloadLength(String),

    /// No open device handle (session closed or never opened).
    #[error("not connected")]
    NotConnected,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
