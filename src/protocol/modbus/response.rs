use super::{
    crc,
    exception::{exception_pdu, ExceptionCode},
    frame::{Frame, MAX_FRAME_LEN},
};

/// Largest PDU that still fits a frame once address and CRC are added.
pub const MAX_PDU_LEN: usize = MAX_FRAME_LEN - 3;

/// Reply PDU under construction: function code followed by its data.
///
/// It only becomes a wire frame through [`PendingResponse::into_frame`], so a
/// partially assembled reply can never reach the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingResponse {
    pdu: Vec<u8>,
}

impl PendingResponse {
    pub fn new(function: u8) -> Self {
        let mut pdu = Vec::with_capacity(MAX_PDU_LEN);
        pdu.push(function);
        Self { pdu }
    }

    pub fn exception(function: u8, code: ExceptionCode) -> Self {
        Self {
            pdu: exception_pdu(function, code).to_vec(),
        }
    }

    /// Mirror the function code and the four header bytes of a write request.
    pub fn echo(frame: &Frame<'_>) -> Option<Self> {
        let header = frame.slice(1..6)?;
        Some(Self {
            pdu: header.to_vec(),
        })
    }

    pub fn push(&mut self, byte: u8) {
        self.pdu.push(byte);
    }

    pub fn push_word(&mut self, word: u16) {
        self.pdu.extend_from_slice(&word.to_be_bytes());
    }

    pub fn function(&self) -> u8 {
        self.pdu[0]
    }

    pub fn is_exception(&self) -> bool {
        self.function() & 0x80 != 0
    }

    pub fn pdu(&self) -> &[u8] {
        &self.pdu
    }

    /// Prepend the station address and append the CRC.
    pub fn into_frame(self, slave_address: u8) -> Vec<u8> {
        debug_assert!(self.pdu.len() <= MAX_PDU_LEN, "reply PDU exceeds frame size");
        let mut frame = Vec::with_capacity(self.pdu.len() + 3);
        frame.push(slave_address);
        frame.extend_from_slice(&self.pdu);
        crc::append(&mut frame);
        frame
    }
}
