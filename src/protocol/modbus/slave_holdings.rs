use super::{
    check_range, exception::ExceptionCode, frame::Frame, read_header,
    response::PendingResponse, DATA_OFFSET,
};
use crate::protocol::store::RegisterFile;

/// Function 0x03 / 0x04.
pub fn read_registers(
    frame: &Frame<'_>,
    registers: &RegisterFile,
) -> Result<PendingResponse, ExceptionCode> {
    let (start, count) = read_header(frame)?;
    check_range(start, count, registers.capacity(), ExceptionCode::IllegalDataAddress)?;

    let mut response = PendingResponse::new(frame.function());
    response.push((count * 2) as u8);
    for id in start..start + count {
        response.push_word(registers.get(id));
    }

    Ok(response)
}

/// Function 0x06. Returns the reply and the id that was written.
pub fn write_single_register(
    frame: &Frame<'_>,
    registers: &mut RegisterFile,
) -> Result<(PendingResponse, u16), ExceptionCode> {
    let (address, value) = read_header(frame)?;

    if address >= registers.capacity() || registers.access(address).is_read_only() {
        return Err(ExceptionCode::IllegalDataAddress);
    }
    registers.set(address, value as u16);

    let response = PendingResponse::echo(frame).ok_or(ExceptionCode::IllegalDataValue)?;
    Ok((response, address as u16))
}

/// Function 0x10.
///
/// Registers are written in address order; reaching a read-only register
/// aborts with the earlier writes left in place.
pub fn write_multiple_registers(
    frame: &Frame<'_>,
    registers: &mut RegisterFile,
) -> Result<PendingResponse, ExceptionCode> {
    let (start, count) = read_header(frame)?;
    check_range(start, count, registers.capacity(), ExceptionCode::IllegalDataAddress)?;

    let data = frame
        .slice(DATA_OFFSET..DATA_OFFSET + count * 2)
        .ok_or(ExceptionCode::IllegalDataValue)?;

    for (id, value) in (start..start + count).zip(data.chunks_exact(2)) {
        if registers.access(id).is_read_only() {
            log::debug!("Register {id} is read-only, aborting multi-write at it");
            return Err(ExceptionCode::IllegalDataAddress);
        }
        registers.set(id, u16::from_be_bytes([value[0], value[1]]));
    }

    PendingResponse::echo(frame).ok_or(ExceptionCode::IllegalDataValue)
}
