//! Command frame builders for the nRF24 research firmware.
//!
//! All functions are pure -- they produce byte vectors without performing
//! any I/O. The caller sends the bytes over a transport and reads the
//! fixed 64-byte response where the command is response-bearing.
//!
//! Wire format: a single opcode byte on the bulk OUT endpoint, optionally
//! followed by up to 63 payload bytes. Mode-entry commands carry a
//! length-prefixed byte sequence (`[len][bytes...]`) as their payload.

use nrfcap_core::error::{Error, Result};

// ---------------------------------------------------------------
// Research-firmware opcodes
// ---------------------------------------------------------------

/// Transmit an Enhanced ShockBurst payload (cmd 0x04).
pub const TRANSMIT_PAYLOAD: u8 = 0x04;

/// Enter sniffer mode locked to a specific address (cmd 0x05).
/// Payload: `[addr_len][addr_bytes...]`.
pub const ENTER_SNIFFER_MODE: u8 = 0x05;

/// Enter promiscuous mode with an optional address-prefix filter
/// (cmd 0x06). Payload: `[prefix_len][prefix_bytes...]`, prefix at most
/// [`MAX_PROMISCUOUS_PREFIX`] bytes.
pub const ENTER_PROMISCUOUS_MODE: u8 = 0x06;

/// Enter continuous tone test mode (cmd 0x07).
pub const ENTER_TONE_TEST_MODE: u8 = 0x07;

/// Transmit an ACK payload for the sniffed address (cmd 0x08).
pub const TRANSMIT_ACK_PAYLOAD: u8 = 0x08;

/// Tune to a channel (cmd 0x09). Payload: `[channel]`.
pub const SET_CHANNEL: u8 = 0x09;

/// Read back the currently tuned channel (cmd 0x0A).
pub const GET_CHANNEL: u8 = 0x0A;

/// Enable the LNA/PA on dongles that have one (cmd 0x0B).
pub const ENABLE_LNA_PA: u8 = 0x0B;

/// Transmit a payload without ShockBurst framing (cmd 0x0C).
pub const TRANSMIT_PAYLOAD_GENERIC: u8 = 0x0C;

/// Enter promiscuous mode without ShockBurst framing (cmd 0x0D).
pub const ENTER_PROMISCUOUS_MODE_GENERIC: u8 = 0x0D;

/// Fetch a captured payload, if one is waiting (cmd 0x10).
pub const RECEIVE_PAYLOAD: u8 = 0x10;

// ---------------------------------------------------------------
// Transfer limits
// ---------------------------------------------------------------

/// Maximum single bulk transfer in either direction.
pub const MAX_TRANSFER: usize = 64;

/// Fixed size of every response read from the IN endpoint.
pub const RESPONSE_LEN: usize = 64;

/// Maximum promiscuous-mode address-prefix length.
pub const MAX_PROMISCUOUS_PREFIX: usize = 5;

/// Build a command frame: opcode followed by a raw payload.
///
/// The payload may be empty, producing the 1-byte frame used by
/// fire-and-forget and query commands. Total frame length is bounds
/// checked against [`MAX_TRANSFER`] before any buffer is built.
pub fn frame(opcode: u8, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() + 1 > MAX_TRANSFER {
        return Err(Error::InvalidPayloadLength(format!(
            "command payload of {} bytes exceeds {} byte transfer",
            payload.len(),
            MAX_TRANSFER
        )));
    }

    let mut buf = Vec::with_capacity(payload.len() + 1);
    buf.push(opcode);
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Build a mode-entry frame: opcode, length byte, then the byte sequence.
///
/// Used for sniffer addresses and promiscuous prefixes, which the firmware
/// expects as `[len][bytes...]`. The sequence must fit the transfer with
/// the opcode and length byte included (62 bytes).
pub fn length_prefixed_frame(opcode: u8, bytes: &[u8]) -> Result<Vec<u8>> {
    if bytes.len() + 2 > MAX_TRANSFER {
        return Err(Error::InvalidPayloadLength(format!(
            "length-prefixed payload of {} bytes exceeds {} byte transfer",
            bytes.len(),
            MAX_TRANSFER
        )));
    }

    let mut buf = Vec::with_capacity(bytes.len() + 2);
    buf.push(opcode);
    buf.push(bytes.len() as u8);
    buf.extend_from_slice(bytes);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_opcode_frame() {
        assert_eq!(frame(SET_CHANNEL, &[]).unwrap(), vec![0x09]);
    }

    #[test]
    fn opcode_with_payload() {
        assert_eq!(frame(SET_CHANNEL, &[42]).unwrap(), vec![0x09, 42]);
        assert_eq!(
            frame(TRANSMIT_PAYLOAD, &[0xDE, 0xAD]).unwrap(),
            vec![0x04, 0xDE, 0xAD]
        );
    }

    #[test]
    fn payload_at_transfer_limit() {
        let payload = [0u8; MAX_TRANSFER - 1];
        let f = frame(TRANSMIT_PAYLOAD, &payload).unwrap();
        assert_eq!(f.len(), MAX_TRANSFER);
    }

    #[test]
    fn payload_over_transfer_limit() {
        let payload = [0u8; MAX_TRANSFER];
        assert!(matches!(
            frame(TRANSMIT_PAYLOAD, &payload),
            Err(Error::InvalidPayloadLength(_))
        ));
    }

    #[test]
    fn length_prefixed_empty() {
        // Empty prefix: opcode + zero length byte.
        assert_eq!(
            length_prefixed_frame(ENTER_PROMISCUOUS_MODE, &[]).unwrap(),
            vec![0x06, 0x00]
        );
    }

    #[test]
    fn length_prefixed_five_byte_prefix() {
        // opcode + len + 5 bytes = 7-byte OUT transfer.
        let f = length_prefixed_frame(ENTER_PROMISCUOUS_MODE, &[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(f, vec![0x06, 0x05, 1, 2, 3, 4, 5]);
        assert_eq!(f.len(), 7);
    }

    #[test]
    fn length_prefixed_sniffer_address() {
        let f = length_prefixed_frame(ENTER_SNIFFER_MODE, &[0xA1, 0xB2, 0xC3, 0xD4, 0xE5]).unwrap();
        assert_eq!(f, vec![0x05, 0x05, 0xA1, 0xB2, 0xC3, 0xD4, 0xE5]);
    }

    #[test]
    fn length_prefixed_over_limit() {
        let bytes = [0u8; MAX_TRANSFER - 1];
        assert!(matches!(
            length_prefixed_frame(ENTER_SNIFFER_MODE, &bytes),
            Err(Error::InvalidPayloadLength(_))
        ));
    }

    #[test]
    fn opcode_table() {
        // Pin the vendor opcode values; the firmware is not versioned.
        assert_eq!(TRANSMIT_PAYLOAD, 0x04);
        assert_eq!(ENTER_SNIFFER_MODE, 0x05);
        assert_eq!(ENTER_PROMISCUOUS_MODE, 0x06);
        assert_eq!(ENTER_TONE_TEST_MODE, 0x07);
        assert_eq!(TRANSMIT_ACK_PAYLOAD, 0x08);
        assert_eq!(SET_CHANNEL, 0x09);
        assert_eq!(GET_CHANNEL, 0x0A);
        assert_eq!(ENABLE_LNA_PA, 0x0B);
        assert_eq!(TRANSMIT_PAYLOAD_GENERIC, 0x0C);
        assert_eq!(ENTER_PROMISCUOUS_MODE_GENERIC, 0x0D);
        assert_eq!(RECEIVE_PAYLOAD, 0x10);
    }
}
