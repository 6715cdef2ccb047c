use super::{
    check_range, exception::ExceptionCode, frame::Frame, read_header,
    response::PendingResponse, DATA_OFFSET,
};
use crate::protocol::store::CoilFile;

const COIL_ON: usize = 0xFF00;
const COIL_OFF: usize = 0x0000;

/// Function 0x01 / 0x02.
///
/// A range running past the coil file is reported as an illegal data value,
/// unlike the register path; masters deployed against this device expect it.
pub fn read_coils(frame: &Frame<'_>, coils: &CoilFile) -> Result<PendingResponse, ExceptionCode> {
    let (start, count) = read_header(frame)?;
    check_range(start, count, coils.capacity(), ExceptionCode::IllegalDataValue)?;

    // Modbus pack: first coil goes to bit 0 of the first data byte.
    let mut packed = vec![0u8; count.div_ceil(8)];
    for offset in 0..count {
        if coils.get(start + offset) {
            packed[offset / 8] |= 1 << (offset % 8);
        }
    }

    let mut response = PendingResponse::new(frame.function());
    response.push(packed.len() as u8);
    for byte in packed {
        response.push(byte);
    }

    Ok(response)
}

/// Function 0x05.
///
/// Only `FF 00` and `00 00` change the coil. Any other value is answered
/// like a successful write but leaves the coil untouched.
pub fn write_single_coil(
    frame: &Frame<'_>,
    coils: &mut CoilFile,
) -> Result<PendingResponse, ExceptionCode> {
    let (address, value) = read_header(frame)?;

    if address >= coils.capacity() || coils.access(address).is_read_only() {
        return Err(ExceptionCode::IllegalDataAddress);
    }

    match value {
        COIL_ON => coils.set(address),
        COIL_OFF => coils.clear(address),
        other => log::debug!("Ignoring non-canonical coil value {other:04x}"),
    }

    PendingResponse::echo(frame).ok_or(ExceptionCode::IllegalDataValue)
}

/// Function 0x0F.
///
/// Coils are written in address order; reaching a read-only coil aborts with
/// the earlier writes left in place.
pub fn write_multiple_coils(
    frame: &Frame<'_>,
    coils: &mut CoilFile,
) -> Result<PendingResponse, ExceptionCode> {
    let (start, count) = read_header(frame)?;
    check_range(start, count, coils.capacity(), ExceptionCode::IllegalDataAddress)?;

    let data = frame
        .slice(DATA_OFFSET..DATA_OFFSET + count.div_ceil(8))
        .ok_or(ExceptionCode::IllegalDataValue)?;

    for offset in 0..count {
        let id = start + offset;
        if coils.access(id).is_read_only() {
            log::debug!("Coil {id} is read-only, aborting multi-write at it");
            return Err(ExceptionCode::IllegalDataAddress);
        }
        let on = (data[offset / 8] >> (offset % 8)) & 0x01 != 0;
        coils.write(id, on);
    }

    PendingResponse::echo(frame).ok_or(ExceptionCode::IllegalDataValue)
}
