use crate::prelude::*;

use bytes::{BufMut, Bytes, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};

pub const HEADER: [u8; 2] = [0xAA, 0x55];
/// header marker + addresses + control/function codes + data length byte
pub const PREAMBLE_LENGTH: usize = 9;
pub const CHECKSUM_LENGTH: usize = 2;
pub const MIN_FRAME_LENGTH: usize = PREAMBLE_LENGTH + CHECKSUM_LENGTH;
pub const MAX_DATA_LENGTH: usize = 100;
pub const MAX_FRAME_LENGTH: usize = MIN_FRAME_LENGTH + MAX_DATA_LENGTH;

// {{{ ControlCode
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ControlCode {
    Register = 0x10,
    Read = 0x11,
}
// }}}

// {{{ FunctionCode
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum FunctionCode {
    Discover = 0x00,
    AssignAddress = 0x01,
    QueryLiveData = 0x02,
    DiscoverResponse = 0x80,
    AssignAddressResponse = 0x81,
    LiveDataResponse = 0x82,
}
// }}}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("no data received")]
    NoData,
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    #[error("checksum mismatch - got {received:#06X}, expected {calculated:#06X}")]
    ChecksumError { received: u16, calculated: u16 },
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum EncodeError {
    #[error("payload of {0} bytes exceeds the 100 byte limit")]
    PayloadTooLong(usize),
}

/// One protocol message as exchanged on the bus.
///
/// Control and function codes are kept as raw bytes so that frames with codes
/// we don't know about still decode and re-encode unchanged; use
/// [`Frame::control`] and [`Frame::function`] to match against known codes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Frame {
    pub source: u16,
    pub destination: u16,
    pub control_code: u8,
    pub function_code: u8,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(
        source: u16,
        destination: u16,
        control: ControlCode,
        function: FunctionCode,
        data: Vec<u8>,
    ) -> Self {
        Self {
            source,
            destination,
            control_code: control.into(),
            function_code: function.into(),
            data,
        }
    }

    pub fn control(&self) -> Option<ControlCode> {
        ControlCode::try_from(self.control_code).ok()
    }

    pub fn function(&self) -> Option<FunctionCode> {
        FunctionCode::try_from(self.function_code).ok()
    }

    pub fn is(&self, control: ControlCode, function: FunctionCode) -> bool {
        self.control() == Some(control) && self.function() == Some(function)
    }

    pub fn encode(&self) -> Result<Bytes, EncodeError> {
        let data_length = self.data.len();
        if data_length > MAX_DATA_LENGTH {
            return Err(EncodeError::PayloadTooLong(data_length));
        }

        let mut r = BytesMut::with_capacity(data_length + MIN_FRAME_LENGTH);
        r.put_slice(&HEADER);
        r.put_u16(self.source);
        r.put_u16(self.destination);
        r.put_u8(self.control_code);
        r.put_u8(self.function_code);
        r.put_u8(data_length as u8);
        r.put_slice(&self.data);

        let checksum = checksum(&r, data_length + PREAMBLE_LENGTH - 1);
        r.put_u16(checksum);

        Ok(r.freeze())
    }

    /// Decodes one frame from the start of `raw`. Trailing bytes after the
    /// checksum are ignored; there is no reassembly across reads.
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        if raw.is_empty() {
            return Err(DecodeError::NoData);
        }

        if raw.len() < MIN_FRAME_LENGTH {
            return Err(DecodeError::InvalidFrame(format!(
                "frame too short ({} bytes)",
                raw.len()
            )));
        }

        if raw[0..2] != HEADER {
            return Err(DecodeError::InvalidFrame(format!(
                "invalid header {:02X} {:02X}",
                raw[0], raw[1]
            )));
        }

        let data_length = raw[8] as usize;
        if data_length > MAX_DATA_LENGTH {
            return Err(DecodeError::InvalidFrame(format!(
                "declared data length {} exceeds {}",
                data_length, MAX_DATA_LENGTH
            )));
        }

        let frame_length = data_length + MIN_FRAME_LENGTH;
        if frame_length > raw.len() {
            return Err(DecodeError::InvalidFrame(format!(
                "declared frame length {} exceeds received {} bytes",
                frame_length,
                raw.len()
            )));
        }

        let payload_end = PREAMBLE_LENGTH + data_length;
        let calculated = checksum(raw, payload_end - 1);
        let received = u16::from_be_bytes([raw[payload_end], raw[payload_end + 1]]);
        if received != calculated {
            return Err(DecodeError::ChecksumError {
                received,
                calculated,
            });
        }

        Ok(Self {
            source: u16::from_be_bytes([raw[2], raw[3]]),
            destination: u16::from_be_bytes([raw[4], raw[5]]),
            control_code: raw[6],
            function_code: raw[7],
            data: raw[PREAMBLE_LENGTH..payload_end].to_vec(),
        })
    }
}

/// 16-bit running sum over `bytes[0..=length]`, i.e. `length + 1` bytes.
///
/// Callers pass the index of the last payload byte, so the sum covers the
/// header through the end of the payload. Keep the inclusive bound: the
/// inverter firmware computes it the same way.
pub fn checksum(bytes: &[u8], length: usize) -> u16 {
    bytes
        .iter()
        .take(length + 1)
        .fold(0u16, |sum, b| sum.wrapping_add(u16::from(*b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS_ACK: [u8; 12] = [
        0xAA, 0x55, 0x00, 0x0A, 0x00, 0x00, 0x10, 0x81, 0x01, 0x06, 0x01, 0xA1,
    ];

    #[test]
    fn encode_discover_broadcast() {
        let frame = Frame::new(
            0x0100,
            0x0000,
            ControlCode::Register,
            FunctionCode::Discover,
            vec![],
        );
        let bytes = frame.encode().unwrap();
        assert_eq!(
            bytes.as_ref(),
            &[0xAA, 0x55, 0x01, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x01, 0x10]
        );
    }

    #[test]
    fn decode_address_ack() {
        let frame = Frame::decode(&ADDRESS_ACK).unwrap();
        assert_eq!(frame.source, 0x000A);
        assert_eq!(frame.destination, 0x0000);
        assert!(frame.is(ControlCode::Register, FunctionCode::AssignAddressResponse));
        assert_eq!(frame.data, vec![0x06]);
    }

    #[test]
    fn checksum_covers_length_plus_one_bytes() {
        assert_eq!(checksum(&[1, 2, 3, 4], 0), 1);
        assert_eq!(checksum(&[1, 2, 3, 4], 2), 6);
        // never reads past the slice
        assert_eq!(checksum(&[1, 2], 10), 3);
        assert_eq!(checksum(&[0xFF; 300], 299), (0xFF * 300u32) as u16);
    }

    #[test]
    fn decode_errors() {
        assert_eq!(Frame::decode(&[]), Err(DecodeError::NoData));
        assert!(matches!(
            Frame::decode(&ADDRESS_ACK[..10]),
            Err(DecodeError::InvalidFrame(_))
        ));

        let mut bad_header = ADDRESS_ACK;
        bad_header[1] = 0x56;
        assert!(matches!(
            Frame::decode(&bad_header),
            Err(DecodeError::InvalidFrame(_))
        ));

        // declares two data bytes but only one is present before the checksum
        let mut truncated = ADDRESS_ACK;
        truncated[8] = 0x02;
        assert!(matches!(
            Frame::decode(&truncated),
            Err(DecodeError::InvalidFrame(_))
        ));

        let mut corrupt = ADDRESS_ACK;
        corrupt[9] = 0x15;
        assert_eq!(
            Frame::decode(&corrupt),
            Err(DecodeError::ChecksumError {
                received: 0x01A1,
                calculated: 0x01B0,
            })
        );
    }

    #[test]
    fn decode_rejects_oversized_length() {
        let mut raw = vec![0xAA, 0x55, 0x00, 0x0A, 0x01, 0x00, 0x11, 0x82, 0x65];
        raw.resize(200, 0);
        assert!(matches!(
            Frame::decode(&raw),
            Err(DecodeError::InvalidFrame(_))
        ));
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let frame = Frame::new(
            0x0100,
            0x000A,
            ControlCode::Read,
            FunctionCode::QueryLiveData,
            vec![0; 101],
        );
        assert_eq!(frame.encode(), Err(EncodeError::PayloadTooLong(101)));
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut raw = ADDRESS_ACK.to_vec();
        raw.extend_from_slice(&[0xDE, 0xAD]);
        assert_eq!(Frame::decode(&raw), Frame::decode(&ADDRESS_ACK));
    }
}
