use std::fmt;

use super::crc;

/// Largest RTU frame, address and CRC included.
pub const MAX_FRAME_LEN: usize = 256;
/// Address, function code and CRC.
pub const MIN_FRAME_LEN: usize = 4;

/// Why a received buffer was dropped without a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRejection {
    Empty,
    TooShort(usize),
    TooLong(usize),
    ForeignAddress(u8),
    BadCrc,
}

impl fmt::Display for FrameRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameRejection::Empty => write!(f, "empty frame"),
            FrameRejection::TooShort(len) => write!(f, "frame too short ({len} bytes)"),
            FrameRejection::TooLong(len) => write!(f, "frame too long ({len} bytes)"),
            FrameRejection::ForeignAddress(addr) => {
                write!(f, "frame addressed to station {addr}")
            }
            FrameRejection::BadCrc => write!(f, "CRC mismatch"),
        }
    }
}

/// A received frame that passed address and CRC checks.
///
/// Offsets used by the accessors are absolute positions in the frame, so
/// `word(2)` is the first field after the function code.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    body: &'a [u8],
    crc: u16,
}

impl<'a> Frame<'a> {
    pub fn address(&self) -> u8 {
        self.body[0]
    }

    pub fn function(&self) -> u8 {
        self.body[1]
    }

    /// Everything between the function code and the CRC.
    pub fn payload(&self) -> &'a [u8] {
        &self.body[2..]
    }

    pub fn crc(&self) -> u16 {
        self.crc
    }

    /// Big-endian word starting at `offset`.
    pub fn word(&self, offset: usize) -> Option<u16> {
        let bytes = self.body.get(offset..offset + 2)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn slice(&self, range: std::ops::Range<usize>) -> Option<&'a [u8]> {
        self.body.get(range)
    }
}

/// Run the integrity checks of an RTU slave on a raw receive buffer.
///
/// Order matters: length, then station address, then CRC.
pub fn validate(raw: &[u8], slave_address: u8) -> Result<Frame<'_>, FrameRejection> {
    match raw.len() {
        0 => return Err(FrameRejection::Empty),
        len if len > MAX_FRAME_LEN => return Err(FrameRejection::TooLong(len)),
        len if len < MIN_FRAME_LEN => return Err(FrameRejection::TooShort(len)),
        _ => {}
    }

    if raw[0] != slave_address {
        return Err(FrameRejection::ForeignAddress(raw[0]));
    }

    if !crc::verify(raw) {
        return Err(FrameRejection::BadCrc);
    }

    let split = raw.len() - 2;
    Ok(Frame {
        body: &raw[..split],
        crc: u16::from_le_bytes([raw[split], raw[split + 1]]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_crc(bytes: &[u8]) -> Vec<u8> {
        let mut buf = bytes.to_vec();
        crc::append(&mut buf);
        buf
    }

    #[test]
    fn test_accepts_valid_frame() {
        let raw = with_crc(&[0x01, 0x03, 0x00, 0x10, 0x00, 0x02]);
        let frame = validate(&raw, 1).unwrap();
        assert_eq!(frame.address(), 1);
        assert_eq!(frame.function(), 0x03);
        assert_eq!(frame.payload(), &[0x00, 0x10, 0x00, 0x02]);
        assert_eq!(frame.word(2), Some(0x0010));
        assert_eq!(frame.word(4), Some(0x0002));
        assert_eq!(frame.word(6), None);
        assert_eq!(frame.crc(), crc::compute(&raw[..6]));
    }

    #[test]
    fn test_length_limits() {
        assert_eq!(validate(&[], 1).unwrap_err(), FrameRejection::Empty);
        assert_eq!(
            validate(&[0x01, 0x03, 0x00], 1).unwrap_err(),
            FrameRejection::TooShort(3)
        );
        let long = vec![0x01; MAX_FRAME_LEN + 1];
        assert_eq!(
            validate(&long, 1).unwrap_err(),
            FrameRejection::TooLong(MAX_FRAME_LEN + 1)
        );
    }

    #[test]
    fn test_rejects_foreign_address_before_crc() {
        let mut raw = with_crc(&[0x02, 0x03, 0x00, 0x00, 0x00, 0x01]);
        assert_eq!(
            validate(&raw, 1).unwrap_err(),
            FrameRejection::ForeignAddress(2)
        );
        raw[6] ^= 0xFF;
        assert_eq!(
            validate(&raw, 1).unwrap_err(),
            FrameRejection::ForeignAddress(2)
        );
    }

    #[test]
    fn test_single_bit_flip_is_rejected() {
        let raw = with_crc(&[0x01, 0x10, 0x00, 0x04, 0x00, 0x01, 0x02, 0x12, 0x34]);
        // Skip the address byte: flipping it is a foreign-address drop instead
        for byte in 1..raw.len() - 2 {
            for bit in 0..8 {
                let mut corrupt = raw.clone();
                corrupt[byte] ^= 1 << bit;
                assert_eq!(
                    validate(&corrupt, 1).unwrap_err(),
                    FrameRejection::BadCrc,
                    "byte {byte} bit {bit}"
                );
            }
        }
    }
}
